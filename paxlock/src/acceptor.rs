//! # Summary
//!
//! This module defines the `Acceptor` role: Paxos's distributed memory.
//! Acceptors vote on ballots and values per slot and never roll back a
//! promise. Handlers are pure local mutation under one lock; an acceptor
//! never dials out and never retries on the caller's behalf — loss or
//! duplication of requests is handled entirely by the leaders counting
//! majorities.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::ballot::Ballot;
use crate::command::Command;
use crate::error::SetupError;
use crate::message::{
    AcceptorRequest, AcceptorResponse, CommanderRequest, CommanderResponse, ScoutRequest, ScoutResponse,
};
use crate::rpc;

/// Distributed memory: tracks the highest ballot ever promised and the
/// commands accepted per slot.
pub struct Acceptor<C: Command> {
    id: u64,
    state: Mutex<State<C>>,
}

struct State<C: Command> {
    /// Highest ballot ever promised. Starts below every real ballot so the
    /// first scout to arrive always wins.
    ballot: Ballot,
    /// Every command accepted under some ballot no greater than `ballot`.
    accepted: HashMap<usize, C>,
}

impl<C: Command> Acceptor<C> {
    pub fn new(id: u64) -> Arc<Self> {
        Arc::new(Acceptor {
            id,
            state: Mutex::new(State { ballot: Ballot::none(), accepted: HashMap::new() }),
        })
    }

    /// Bind `addr` and serve `Acceptor.ExecutePropose`/`Acceptor.ExecuteAccept`
    /// until the process exits.
    pub async fn serve(self: Arc<Self>, addr: SocketAddr) -> Result<(), SetupError> {
        let listener = rpc::bind(addr).await?;
        log::info!("acceptor {} listening on {}", self.id, addr);
        rpc::serve(listener, move |request: AcceptorRequest<C>| {
            let acceptor = Arc::clone(&self);
            async move {
                match request {
                    AcceptorRequest::Propose(req) => AcceptorResponse::Propose(acceptor.execute_propose(req)),
                    AcceptorRequest::Accept(req) => AcceptorResponse::Accept(acceptor.execute_accept(req)),
                }
            }
        })
        .await
    }

    /// `Propose(ballot) -> (current_ballot, accepted_map, acceptor_id)`.
    ///
    /// Returning the full accepted map lets a newly-adopted leader learn
    /// every slot any acceptor has seen, so no chosen value is ever lost.
    pub fn execute_propose(&self, request: ScoutRequest) -> ScoutResponse<C> {
        let mut state = self.state.lock();
        if request.ballot > state.ballot {
            state.ballot = request.ballot;
        }
        log::trace!("acceptor {} promised {:?}", self.id, state.ballot);
        ScoutResponse { ballot: state.ballot, accepted: state.accepted.clone(), acceptor_id: self.id }
    }

    /// `Accept(ballot, slot, command) -> (current_ballot, acceptor_id)`.
    ///
    /// Equal-ballot accepts are permitted: the leader that owns `ballot`
    /// may issue many accepts — one per slot — within the same round.
    pub fn execute_accept(&self, request: CommanderRequest<C>) -> CommanderResponse {
        let mut state = self.state.lock();
        if request.ballot >= state.ballot {
            state.ballot = request.ballot;
            state.accepted.insert(request.slot, request.command);
            log::trace!("acceptor {} accepted slot {} under {:?}", self.id, request.slot, request.ballot);
        }
        CommanderResponse { ballot: state.ballot, acceptor_id: self.id }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
    struct Noop { client_id: u64, msg_id: u64 }

    impl Command for Noop {
        fn client_id(&self) -> u64 { self.client_id }
        fn msg_id(&self) -> u64 { self.msg_id }
    }

    #[test]
    fn promises_the_highest_ballot_seen() {
        let acceptor: Arc<Acceptor<Noop>> = Acceptor::new(0);
        let low = Ballot { number: 1, leader_id: 1 };
        let high = Ballot { number: 5, leader_id: 1 };

        let response = acceptor.execute_propose(ScoutRequest { ballot: high });
        assert_eq!(response.ballot, high);

        // A lower ballot than what's promised never wins the promise back.
        let response = acceptor.execute_propose(ScoutRequest { ballot: low });
        assert_eq!(response.ballot, high);
    }

    #[test]
    fn never_rolls_back_ballot_on_stale_accept() {
        let acceptor: Arc<Acceptor<Noop>> = Acceptor::new(0);
        let high = Ballot { number: 5, leader_id: 1 };
        let low = Ballot { number: 1, leader_id: 1 };
        acceptor.execute_propose(ScoutRequest { ballot: high });

        let command = Noop { client_id: 1, msg_id: 1 };
        let response = acceptor.execute_accept(CommanderRequest { ballot: low, slot: 1, command: command.clone() });
        assert_eq!(response.ballot, high);

        let promise = acceptor.execute_propose(ScoutRequest { ballot: Ballot::none() });
        assert!(promise.accepted.is_empty(), "stale accept below the promised ballot must not be recorded");
    }

    #[test]
    fn equal_ballot_accepts_all_count() {
        let acceptor: Arc<Acceptor<Noop>> = Acceptor::new(0);
        let ballot = Ballot { number: 1, leader_id: 1 };
        acceptor.execute_propose(ScoutRequest { ballot });

        let c1 = Noop { client_id: 1, msg_id: 1 };
        let c2 = Noop { client_id: 2, msg_id: 1 };
        acceptor.execute_accept(CommanderRequest { ballot, slot: 1, command: c1.clone() });
        acceptor.execute_accept(CommanderRequest { ballot, slot: 2, command: c2.clone() });

        let promise = acceptor.execute_propose(ScoutRequest { ballot });
        assert_eq!(promise.accepted.get(&1), Some(&c1));
        assert_eq!(promise.accepted.get(&2), Some(&c2));
    }
}
