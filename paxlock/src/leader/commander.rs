//! # Summary
//!
//! The commander: phase 2 of Multi-Paxos. One commander runs per
//! (slot, command, ballot) a leader is actively trying to commit. It keeps
//! broadcasting `Accept` until either a majority of acceptors have voted
//! for it, a higher ballot preempts it, or the slot is claimed by a
//! different proposal (this leader re-scouted and adopted someone else's
//! value for the same slot).

use std::collections::HashSet;
use std::sync::Arc;

use crate::ballot::Ballot;
use crate::command::Command;
use crate::leader::Leader;
use crate::message::{CommanderRequest, CommanderResponse};
use crate::rpc::Outcome;
use tokio::sync::mpsc;

pub(super) async fn run<C: Command>(leader: Arc<Leader<C>>, slot: usize, command: C, ballot: Ballot) {
    let majority = leader.majority();
    let mut counted = HashSet::new();

    loop {
        let request = CommanderRequest { ballot, slot, command: command.clone() };
        let mut rx: mpsc::UnboundedReceiver<Outcome<CommanderResponse>> =
            crate::rpc::broadcast(leader.acceptors.clone(), request);

        while let Some(outcome) = rx.recv().await {
            let response = match outcome {
                Outcome::Ok(response) => response,
                Outcome::Failed => continue,
            };
            if response.ballot > ballot {
                leader.preempt(ballot, response.ballot);
                return;
            }
            if response.ballot == ballot {
                counted.insert(response.acceptor_id);
            }
        }

        if counted.len() >= majority {
            leader.decide(slot, command);
            return;
        }

        // Fewer than a majority answered this round (dead or unreachable
        // acceptors) and nobody preempted us. Wait for stragglers to
        // recover and try again — abandoning here would let the slot hang
        // forever even after the acceptors come back.
        tokio::time::sleep(super::COMMANDER_RESEND_INTERVAL).await;
        if !leader.is_proposal_live(slot, &command) {
            return;
        }
    }
}
