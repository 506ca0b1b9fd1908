//! # Summary
//!
//! This module defines the `Leader` role: the active-leader election and
//! replication protocol. A leader runs one long-lived `Scout` task that
//! acquires (and re-acquires, after preemption) a ballot from a majority of
//! acceptors, and one `Commander` task per slot it is actively trying to
//! commit. `Leader.ExecutePropose` is the replica-facing entry point: it
//! registers a proposal and blocks until that slot is decided, by anyone.

mod commander;
mod scout;

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::ballot::Ballot;
use crate::command::Command;
use crate::error::SetupError;
use crate::message::{ReplicaRequest, ReplicaResponse};
use crate::rpc;

/// Initial AIMD backoff before the first scout attempt, matching the
/// reference implementation's fixed starting timeout.
const INITIAL_BACKOFF: Duration = Duration::from_millis(1000);
/// Additive increase applied to the backoff after a failed scout round.
const ADDITIVE_INCREASE: Duration = Duration::from_millis(500);
/// Multiplicative decrease factor applied to the backoff once a scout
/// round succeeds.
const MULTIPLICATIVE_DECREASE: u32 = 2;
/// How long a commander waits before re-broadcasting `Accept` to acceptors
/// that haven't yet answered. Unlike the scout, a commander never gives up
/// a slot to backoff — it keeps probing until the slot is decided or the
/// leader is preempted, since a replica may be blocked on this slot.
const COMMANDER_RESEND_INTERVAL: Duration = Duration::from_millis(250);

pub struct Leader<C: Command> {
    id: u64,
    acceptors: Vec<SocketAddr>,
    state: Mutex<State<C>>,
    /// Signalled whenever `active` flips to `false`, waking the scout loop.
    need_to_scout: Notify,
    /// Signalled whenever a slot is decided, waking every blocked
    /// `execute_propose` call.
    something_decided: Notify,
}

struct State<C: Command> {
    ballot: Ballot,
    active: bool,
    backoff: Duration,
    /// Commands this leader is currently trying to get decided, keyed by
    /// slot. Entries here may come from a replica's proposal or from a
    /// scout round's merged `accepted` maps (a value some acceptor already
    /// accepted under an earlier ballot takes precedence over this
    /// leader's own proposal for the same slot).
    proposals: HashMap<usize, C>,
    /// Slots this leader has observed reach a majority accept.
    decided: HashMap<usize, C>,
}

impl<C: Command> Leader<C> {
    pub fn new(id: u64, acceptors: Vec<SocketAddr>) -> Arc<Self> {
        let leader = Arc::new(Leader {
            id,
            acceptors,
            state: Mutex::new(State {
                ballot: Ballot::initial(id),
                active: false,
                backoff: INITIAL_BACKOFF,
                proposals: HashMap::new(),
                decided: HashMap::new(),
            }),
            need_to_scout: Notify::new(),
            something_decided: Notify::new(),
        });
        tokio::spawn(scout::run(Arc::clone(&leader)));
        leader
    }

    /// Bind `addr` and serve `Leader.ExecutePropose` until the process
    /// exits.
    pub async fn serve(self: Arc<Self>, addr: SocketAddr) -> Result<(), SetupError> {
        let listener = rpc::bind(addr).await?;
        log::info!("leader {} listening on {}", self.id, addr);
        rpc::serve(listener, move |request: ReplicaRequest<C>| {
            let leader = Arc::clone(&self);
            async move { leader.execute_propose(request).await }
        })
        .await
    }

    fn majority(&self) -> usize {
        self.acceptors.len() / 2 + 1
    }

    /// `Propose(slot, command) -> (slot, decided_command)`.
    ///
    /// Registers `command` as this leader's proposal for `slot` (unless a
    /// command with the same client/msg_id is already proposed under a
    /// different slot, or `slot` is already claimed by a different
    /// command), spawns a commander if this leader is currently active,
    /// then blocks until `slot` is decided — by this leader or another.
    pub async fn execute_propose(self: &Arc<Self>, request: ReplicaRequest<C>) -> ReplicaResponse<C> {
        if let Some(decided) = self.decided_command(request.slot) {
            return ReplicaResponse { slot: request.slot, command: decided };
        }

        let spawn = {
            let mut state = self.state.lock();
            let already_proposed = state.proposals.values().any(|c| c.same_identity(&request.command));
            let slot_claimed = state
                .proposals
                .get(&request.slot)
                .map_or(false, |c| !c.same_identity(&request.command));

            if already_proposed || slot_claimed {
                None
            } else {
                state.proposals.insert(request.slot, request.command.clone());
                state.active.then(|| state.ballot)
            }
        };
        if let Some(ballot) = spawn {
            self.spawn_commander(request.slot, request.command.clone(), ballot);
        }

        loop {
            let notified = self.something_decided.notified();
            if let Some(decided) = self.decided_command(request.slot) {
                return ReplicaResponse { slot: request.slot, command: decided };
            }
            notified.await;
        }
    }

    fn decided_command(&self, slot: usize) -> Option<C> {
        self.state.lock().decided.get(&slot).cloned()
    }

    fn is_proposal_live(&self, slot: usize, command: &C) -> bool {
        self.state.lock().proposals.get(&slot).map_or(false, |c| c.same_identity(command))
    }

    fn spawn_commander(self: &Arc<Self>, slot: usize, command: C, ballot: Ballot) {
        let leader = Arc::clone(self);
        tokio::spawn(async move { commander::run(leader, slot, command, ballot).await });
    }

    /// A scout or commander observed a strictly higher ballot: step down
    /// and bump our ballot to one this leader could plausibly win next.
    /// Ignored if we've already moved past `observed_as` (another task won
    /// the race to react to the same preemption).
    fn preempt(&self, observed_as: Ballot, other: Ballot) {
        let mut state = self.state.lock();
        if state.ballot != observed_as {
            return;
        }
        state.active = false;
        state.ballot = state.ballot.succeeding(other);
        drop(state);
        self.need_to_scout.notify_one();
    }

    /// A scout round under `ballot` reached a majority: adopt every
    /// learned proposal and spawn a commander for each undecided slot.
    fn adopt(self: &Arc<Self>, ballot: Ballot, learned: HashMap<usize, C>) {
        let to_spawn = {
            let mut state = self.state.lock();
            if state.ballot != ballot {
                return;
            }
            for (slot, command) in learned {
                state.proposals.insert(slot, command);
            }
            state.active = true;
            state.backoff = std::cmp::max(
                state.backoff / MULTIPLICATIVE_DECREASE,
                Duration::from_millis(1),
            );
            state
                .proposals
                .iter()
                .filter(|(slot, _)| !state.decided.contains_key(*slot))
                .map(|(slot, command)| (*slot, command.clone()))
                .collect::<Vec<_>>()
        };
        for (slot, command) in to_spawn {
            self.spawn_commander(slot, command, ballot);
        }
    }

    /// A commander reached a majority accept for `slot`: record the
    /// decision and wake every replica blocked on it.
    fn decide(&self, slot: usize, command: C) {
        let mut state = self.state.lock();
        state.decided.insert(slot, command);
        state.proposals.remove(&slot);
        drop(state);
        self.something_decided.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
    struct Noop {
        client_id: u64,
        msg_id: u64,
    }

    impl Command for Noop {
        fn client_id(&self) -> u64 {
            self.client_id
        }
        fn msg_id(&self) -> u64 {
            self.msg_id
        }
    }

    #[tokio::test]
    async fn execute_propose_returns_immediately_once_already_decided() {
        let leader: Arc<Leader<Noop>> = Leader::new(1, vec![]);
        leader.decide(3, Noop { client_id: 9, msg_id: 1 });

        let response = leader
            .execute_propose(ReplicaRequest { slot: 3, command: Noop { client_id: 9, msg_id: 1 } })
            .await;
        assert_eq!(response.slot, 3);
        assert_eq!(response.command, Noop { client_id: 9, msg_id: 1 });
    }

    #[tokio::test]
    async fn decide_wakes_a_pending_execute_propose() {
        let leader: Arc<Leader<Noop>> = Leader::new(1, vec![]);
        let waiter = Arc::clone(&leader);
        let handle = tokio::spawn(async move {
            waiter.execute_propose(ReplicaRequest { slot: 7, command: Noop { client_id: 1, msg_id: 1 } }).await
        });

        tokio::task::yield_now().await;
        leader.decide(7, Noop { client_id: 1, msg_id: 1 });

        let response = handle.await.unwrap();
        assert_eq!(response.slot, 7);
    }

    #[tokio::test]
    async fn preempt_ignores_stale_observations() {
        let leader: Arc<Leader<Noop>> = Leader::new(1, vec![]);
        let original = leader.state.lock().ballot;
        let higher = Ballot { number: original.number + 10, leader_id: 99 };

        // Preempting against a ballot we've already moved past is a no-op.
        let stale = Ballot { number: original.number - 1, leader_id: original.leader_id };
        leader.preempt(stale, higher);
        assert_eq!(leader.state.lock().ballot, original);

        leader.preempt(original, higher);
        let state = leader.state.lock();
        assert!(!state.active);
        assert_eq!(state.ballot.number, higher.number + 1);
    }
}
