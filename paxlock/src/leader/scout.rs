//! # Summary
//!
//! The scout: phase 1 of Multi-Paxos. Runs forever for the lifetime of a
//! `Leader`, alternating between waiting for a reason to scout (this
//! leader has never been active, or was just preempted) and broadcasting
//! `Propose(ballot)` to every acceptor until a majority promises it.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::ballot::Ballot;
use crate::command::Command;
use crate::leader::Leader;
use crate::message::{ScoutRequest, ScoutResponse};
use crate::rpc::Outcome;
use tokio::sync::mpsc;

enum RoundOutcome<C> {
    Adopted(HashMap<usize, C>),
    Preempted,
    NoMajority,
}

/// Drives the scout state machine for `leader` until the task is dropped
/// (which only happens when the leader itself is dropped).
pub(super) async fn run<C: Command>(leader: Arc<Leader<C>>) {
    loop {
        wait_until_inactive(&leader).await;

        loop {
            let ballot = leader.state.lock().ballot;
            match scout_round(&leader, ballot).await {
                RoundOutcome::Adopted(learned) => {
                    leader.adopt(ballot, learned);
                    break;
                }
                RoundOutcome::Preempted => {
                    // `leader.preempt` already ran inside `scout_round`;
                    // the outer loop's `wait_until_inactive` picks this up
                    // on the next iteration via the `need_to_scout` signal.
                    break;
                }
                RoundOutcome::NoMajority => {
                    let backoff = leader.state.lock().backoff;
                    tokio::time::sleep(backoff).await;
                    let mut state = leader.state.lock();
                    if state.ballot == ballot {
                        state.backoff += super::ADDITIVE_INCREASE;
                    }
                }
            }
        }
    }
}

async fn wait_until_inactive<C: Command>(leader: &Arc<Leader<C>>) {
    loop {
        let notified = leader.need_to_scout.notified();
        if !leader.state.lock().active {
            return;
        }
        notified.await;
    }
}

/// One broadcast round: propose `ballot` to every acceptor and tally
/// responses as they arrive. Stops as soon as either a majority has
/// promised `ballot` or a higher ballot is observed; acceptors that never
/// answer simply don't count, per the "no retry within the round" model.
async fn scout_round<C: Command>(leader: &Arc<Leader<C>>, ballot: Ballot) -> RoundOutcome<C> {
    let majority = leader.majority();
    let mut rx: mpsc::UnboundedReceiver<Outcome<ScoutResponse<C>>> =
        crate::rpc::broadcast(leader.acceptors.clone(), ScoutRequest { ballot });

    let mut seen = HashSet::new();
    let mut merged = HashMap::new();

    while let Some(outcome) = rx.recv().await {
        let response = match outcome {
            Outcome::Ok(response) => response,
            Outcome::Failed => continue,
        };
        if response.ballot > ballot {
            leader.preempt(ballot, response.ballot);
            return RoundOutcome::Preempted;
        }
        if response.ballot == ballot && seen.insert(response.acceptor_id) {
            merged.extend(response.accepted);
            if seen.len() >= majority {
                return RoundOutcome::Adopted(merged);
            }
        }
    }

    RoundOutcome::NoMajority
}
