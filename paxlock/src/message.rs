//! # Summary
//!
//! Wire message shapes for the four RPC procedures in the external
//! interface: `Acceptor.ExecutePropose`, `Acceptor.ExecuteAccept`,
//! `Leader.ExecutePropose`, and `Replica.ExecuteRequest`. Names mirror
//! Paxos Made Moderately Complex's P1A/P1B/P2A/P2B terminology where it
//! doesn't collide with the RPC procedure names spec'd for this service.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::ballot::Ballot;
use crate::command::Command;

/// Scout -> Acceptor: "what's the highest ballot you've promised?"
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScoutRequest {
    pub ballot: Ballot,
}

/// Acceptor -> Scout: current ballot plus every command this acceptor has
/// ever accepted, so an adopting leader never loses a chosen value.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(bound = "C: Command")]
pub struct ScoutResponse<C: Command> {
    pub ballot: Ballot,
    pub accepted: HashMap<usize, C>,
    pub acceptor_id: u64,
}

/// Commander -> Acceptor: "accept this command for this slot under this
/// ballot."
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(bound = "C: Command")]
pub struct CommanderRequest<C: Command> {
    pub ballot: Ballot,
    pub slot: usize,
    pub command: C,
}

/// Acceptor -> Commander: current ballot. Equal to the commander's ballot
/// means the vote counted; greater means the commander has been preempted.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CommanderResponse {
    pub ballot: Ballot,
    pub acceptor_id: u64,
}

/// Multiplexes `Acceptor.ExecutePropose` and `Acceptor.ExecuteAccept` onto
/// the acceptor's single listening port.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(bound = "C: Command")]
pub enum AcceptorRequest<C: Command> {
    Propose(ScoutRequest),
    Accept(CommanderRequest<C>),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(bound = "C: Command")]
pub enum AcceptorResponse<C: Command> {
    Propose(ScoutResponse<C>),
    Accept(CommanderResponse),
}

/// Replica -> Leader: propose `command` for `slot`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(bound = "C: Command")]
pub struct ReplicaRequest<C: Command> {
    pub slot: usize,
    pub command: C,
}

/// Leader -> Replica: `slot` has been decided with `command`, which may
/// differ from the command the replica originally proposed for that slot.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(bound = "C: Command")]
pub struct ReplicaResponse<C: Command> {
    pub slot: usize,
    pub command: C,
}

/// Client -> Replica: execute `command` and report its outcome.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(bound = "C: Command")]
pub struct ClientRequest<C: Command> {
    pub command: C,
}

/// Replica -> Client: the outcome of the command identified by `msg_id`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(bound = "E: crate::state::Outcome")]
pub struct ClientResponse<E> {
    pub msg_id: u64,
    pub outcome: E,
}
