//! # Summary
//!
//! This module defines the `Replica` role: the client-facing front end.
//! It assigns client commands to log slots, proposes them to every leader
//! until they're decided, applies decided commands to the injected
//! `StateMachine` in slot order, and answers each client's blocking
//! request by replaying the decided log from scratch — never by caching
//! an incremental result — so that a client which reconnects mid-request
//! still gets the exact answer its command produced.

use std::collections::{HashMap, HashSet, VecDeque};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::sync::Notify;

use crate::command::Command;
use crate::error::SetupError;
use crate::message::{ClientRequest, ClientResponse, ReplicaRequest, ReplicaResponse};
use crate::rpc::{self, Outcome};
use crate::state::StateMachine;

/// How long a replica waits before retrying a proposal after every leader
/// in `leaders` failed to answer (all leaders down, or a total network
/// partition). Retrying immediately would just busy-loop.
const RETRY_INTERVAL: Duration = Duration::from_millis(250);

pub struct Replica<M: StateMachine> {
    id: u64,
    leaders: Vec<SocketAddr>,
    state: Mutex<State<M>>,
    /// Signalled whenever a command is pushed onto `requests`.
    new_request: Notify,
    /// Signalled whenever `decisions` gains an entry.
    something_decided: Notify,
}

struct State<M: StateMachine> {
    /// Next slot this replica will assign to an outgoing proposal.
    slot_in: usize,
    /// Next slot `perform` needs applied, in order.
    slot_out: usize,
    /// Every slot this replica has learned a decision for, from any
    /// leader.
    decisions: HashMap<usize, M::Command>,
    /// Slots this replica currently has an in-flight proposal for.
    proposals: HashMap<usize, M::Command>,
    /// Client commands waiting for a slot assignment.
    requests: VecDeque<M::Command>,
    /// (client_id, msg_id) of every command currently queued or proposed
    /// but not yet decided — guards against enqueueing the same command
    /// twice when a client's request races its own retry.
    pending: HashSet<(u64, u64)>,
    /// The replicated application. Applied incrementally, in slot order,
    /// as the durable source of truth; never consulted directly to answer
    /// a client, since `execute_request` replays into a throwaway
    /// instance instead (see module docs).
    machine: M,
}

impl<M: StateMachine> Replica<M> {
    pub fn new(id: u64, leaders: Vec<SocketAddr>) -> Arc<Self> {
        let replica = Arc::new(Replica {
            id,
            leaders,
            state: Mutex::new(State {
                slot_in: 0,
                slot_out: 0,
                decisions: HashMap::new(),
                proposals: HashMap::new(),
                requests: VecDeque::new(),
                pending: HashSet::new(),
                machine: M::default(),
            }),
            new_request: Notify::new(),
            something_decided: Notify::new(),
        });
        tokio::spawn(propose_loop(Arc::clone(&replica)));
        tokio::spawn(perform_loop(Arc::clone(&replica)));
        replica
    }

    /// Bind `addr` and serve `Replica.ExecuteRequest` until the process
    /// exits.
    pub async fn serve(self: Arc<Self>, addr: SocketAddr) -> Result<(), SetupError> {
        let listener = rpc::bind(addr).await?;
        log::info!("replica {} listening on {}", self.id, addr);
        rpc::serve(listener, move |request: ClientRequest<M::Command>| {
            let replica = Arc::clone(&self);
            async move {
                let msg_id = request.command.msg_id();
                let outcome = replica.execute_request(request.command).await;
                ClientResponse { msg_id, outcome }
            }
        })
        .await
    }

    /// `ExecuteRequest(command) -> outcome`.
    ///
    /// Blocks until `command` (identified by client id + msg id) has a
    /// decided slot, then returns the outcome of applying it — computed
    /// by replaying the decided log into a fresh state machine, never by
    /// reading the live `machine`.
    pub async fn execute_request(self: &Arc<Self>, command: M::Command) -> M::Outcome {
        loop {
            let notified = self.something_decided.notified();
            {
                let mut state = self.state.lock();
                if let Some(outcome) = replay_result(&state, &command) {
                    return outcome;
                }
                let identity = (command.client_id(), command.msg_id());
                if state.pending.insert(identity) {
                    state.requests.push_back(command.clone());
                    drop(state);
                    self.new_request.notify_one();
                }
            }
            notified.await;
        }
    }

    fn record_decision(&self, slot: usize, decided: M::Command) {
        let mut state = self.state.lock();
        state.proposals.remove(&slot);
        state.pending.remove(&(decided.client_id(), decided.msg_id()));
        state.decisions.insert(slot, decided);
        drop(state);
        self.something_decided.notify_waiters();
    }

    /// Put `command` back on the request queue (its slot was claimed by a
    /// different command, or every leader failed to answer). `pending`
    /// keeps its identity marked, so a concurrent `execute_request` call
    /// for the same command doesn't double-enqueue it.
    fn requeue(&self, command: M::Command) {
        let mut state = self.state.lock();
        state.requests.push_back(command);
        drop(state);
        self.new_request.notify_one();
    }

    fn clear_proposal(&self, slot: usize) {
        self.state.lock().proposals.remove(&slot);
    }
}

/// Replays `state.decisions[0..slot_out)` into a fresh state machine,
/// returning `command`'s outcome as soon as a decided slot with the same
/// identity is reached. `None` means `command` hasn't been decided yet.
fn replay_result<M: StateMachine>(state: &State<M>, command: &M::Command) -> Option<M::Outcome> {
    let mut shadow = M::default();
    for slot in 0..state.slot_out {
        let decided = state.decisions.get(&slot).expect("every slot below slot_out is decided");
        let outcome = shadow.apply(decided);
        if decided.same_identity(command) {
            return Some(outcome);
        }
    }
    None
}

/// Pulls queued commands, assigns each the next unused slot in order, and
/// spawns a proposer for it. Slot numbers are handed out by this replica
/// alone and never reused, so `slot_in` can only ever collide with a slot
/// this same replica already assigned.
async fn propose_loop<M: StateMachine>(replica: Arc<Replica<M>>) {
    loop {
        let notified = replica.new_request.notified();
        let assigned = {
            let mut state = replica.state.lock();
            loop {
                let command = match state.requests.pop_front() {
                    Some(command) => command,
                    None => break None,
                };
                if state.decisions.values().any(|decided| decided.same_identity(&command)) {
                    // Already decided under some other slot (e.g. this
                    // replica is catching up); drop the duplicate.
                    state.pending.remove(&(command.client_id(), command.msg_id()));
                    continue;
                }
                let slot = state.slot_in;
                state.slot_in = slot + 1;
                state.proposals.insert(slot, command.clone());
                break Some((slot, command));
            }
        };
        match assigned {
            Some((slot, command)) => {
                tokio::spawn(propose_slot(Arc::clone(&replica), slot, command));
            }
            None => notified.await,
        }
    }
}

/// Proposes `command` for `slot` to every leader and waits for the first
/// to answer. If the decided command for `slot` turns out to be a
/// different one (this replica's proposal lost the slot), `command` is
/// requeued for a fresh slot. If every leader fails to answer, `command`
/// is requeued for the same slot after a short delay.
async fn propose_slot<M: StateMachine>(replica: Arc<Replica<M>>, slot: usize, command: M::Command) {
    let request = ReplicaRequest { slot, command: command.clone() };
    let mut rx: mpsc::UnboundedReceiver<Outcome<ReplicaResponse<M::Command>>> =
        rpc::broadcast(replica.leaders.clone(), request);

    while let Some(outcome) = rx.recv().await {
        if let Outcome::Ok(response) = outcome {
            let displaced = !response.command.same_identity(&command);
            replica.record_decision(slot, response.command);
            if displaced {
                replica.requeue(command);
            }
            return;
        }
    }

    tokio::time::sleep(RETRY_INTERVAL).await;
    replica.clear_proposal(slot);
    replica.requeue(command);
}

/// Applies every contiguous decided slot starting at `slot_out` to the
/// canonical `machine`, then waits for the next decision.
async fn perform_loop<M: StateMachine>(replica: Arc<Replica<M>>) {
    loop {
        let notified = replica.something_decided.notified();
        loop {
            let mut state = replica.state.lock();
            let slot = state.slot_out;
            let command = match state.decisions.get(&slot).cloned() {
                Some(command) => command,
                None => break,
            };
            state.machine.apply(&command);
            state.slot_out = slot + 1;
        }
        notified.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    struct Incr {
        client_id: u64,
        msg_id: u64,
    }

    impl Command for Incr {
        fn client_id(&self) -> u64 {
            self.client_id
        }
        fn msg_id(&self) -> u64 {
            self.msg_id
        }
    }

    #[derive(Default)]
    struct Counter(u64);

    impl StateMachine for Counter {
        type Command = Incr;
        type Outcome = u64;

        fn apply(&mut self, _command: &Incr) -> u64 {
            self.0 += 1;
            self.0
        }
    }

    #[test]
    fn replay_returns_none_for_an_undecided_command() {
        let state: State<Counter> = State {
            slot_in: 0,
            slot_out: 0,
            decisions: HashMap::new(),
            proposals: HashMap::new(),
            requests: VecDeque::new(),
            pending: HashSet::new(),
            machine: Counter::default(),
        };
        assert!(replay_result(&state, &Incr { client_id: 1, msg_id: 1 }).is_none());
    }

    #[test]
    fn replay_stops_at_the_matching_identity_not_the_log_end() {
        let mut decisions = HashMap::new();
        decisions.insert(0, Incr { client_id: 1, msg_id: 1 });
        decisions.insert(1, Incr { client_id: 2, msg_id: 1 });
        let state: State<Counter> = State {
            slot_in: 2,
            slot_out: 2,
            decisions,
            proposals: HashMap::new(),
            requests: VecDeque::new(),
            pending: HashSet::new(),
            machine: Counter::default(),
        };

        let outcome = replay_result(&state, &Incr { client_id: 1, msg_id: 1 });
        assert_eq!(outcome, Some(1), "must report the count as of slot 0, not after replaying slot 1 too");
    }

    #[tokio::test]
    async fn execute_request_returns_once_a_matching_decision_lands() {
        let replica: Arc<Replica<Counter>> = Replica::new(1, vec![]);
        let command = Incr { client_id: 5, msg_id: 1 };

        let waiter = Arc::clone(&replica);
        let cloned = command.clone();
        let handle = tokio::spawn(async move { waiter.execute_request(cloned).await });

        tokio::task::yield_now().await;
        {
            let mut state = replica.state.lock();
            state.decisions.insert(0, command.clone());
            state.slot_out = 1;
        }
        replica.something_decided.notify_waiters();

        assert_eq!(handle.await.unwrap(), 1);
    }
}
