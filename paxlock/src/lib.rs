//! # Summary
//!
//! This crate implements the replicated state-machine engine described by
//! Lamport's Paxos Made Moderately Complex: an `Acceptor` that votes on
//! ballots and values per slot, a `Leader` that runs a `Scout` (phase 1) and
//! one `Commander` (phase 2) per proposal, and a `Replica` that assigns
//! slots to client commands and applies decided commands to a caller-supplied
//! `StateMachine`, in order.
//!
//! The engine is generic over the command/state-machine types so that the
//! consensus protocol never needs to know the shape of the commands it is
//! ordering. `lockservice` plugs in the lock-table application; a different
//! replicated service could plug in something else.

pub mod acceptor;
pub mod ballot;
pub mod client;
pub mod command;
pub mod error;
pub mod leader;
pub mod message;
pub mod replica;
pub mod rpc;
pub mod state;

pub use crate::acceptor::Acceptor;
pub use crate::ballot::Ballot;
pub use crate::client::Client;
pub use crate::command::Command;
pub use crate::error::SetupError;
pub use crate::leader::Leader;
pub use crate::replica::Replica;
pub use crate::state::StateMachine;
