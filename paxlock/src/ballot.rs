//! # Summary
//!
//! A ballot is uniquely determined by its number and its leader's ID.
//! Ballots are totally ordered by number first, leader ID second, which
//! gives every leader a disjoint, strictly-increasing sequence of rounds
//! it can win outright.

use serde::{Deserialize, Serialize};

/// Paxos proposal round identifier.
#[derive(Copy, Clone, Default, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[derive(Serialize, Deserialize)]
pub struct Ballot {
    /// Leader-local, strictly increasing sequence number.
    pub number: i64,
    /// ID of the leader that owns this ballot.
    pub leader_id: u64,
}

impl Ballot {
    /// The very first ballot a leader proposes with.
    pub fn initial(leader_id: u64) -> Self {
        Ballot { number: 0, leader_id }
    }

    /// The smallest ballot that can never have been promised by any acceptor,
    /// used to seed an acceptor's `current_ballot` before it has seen anything.
    pub fn none() -> Self {
        Ballot { number: -1, leader_id: u64::MAX }
    }

    /// Next ballot this leader can use to out-compete `observed`.
    pub fn succeeding(self, observed: Ballot) -> Self {
        Ballot { number: observed.number + 1, leader_id: self.leader_id }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orders_by_number_then_leader() {
        assert!(Ballot { number: 1, leader_id: 0 } < Ballot { number: 2, leader_id: 0 });
        assert!(Ballot { number: 1, leader_id: 0 } < Ballot { number: 1, leader_id: 1 });
        assert!(Ballot::none() < Ballot::initial(0));
    }

    #[test]
    fn succeeding_bumps_number_keeps_leader() {
        let mine = Ballot::initial(7);
        let next = mine.succeeding(Ballot { number: 4, leader_id: 99 });
        assert_eq!(next, Ballot { number: 5, leader_id: 7 });
    }
}
