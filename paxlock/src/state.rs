//! # Summary
//!
//! This module defines the trait a replicated application implements to
//! plug itself into the engine. A `StateMachine` consumes decided commands
//! in slot order and produces the outcome reported back to the client that
//! issued each command.

use std::fmt::Debug;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::command::Command;

/// Result of applying one command to a state machine.
pub trait Outcome: Clone + Debug + Send + Serialize + DeserializeOwned + 'static {}

impl<T> Outcome for T where T: Clone + Debug + Send + Serialize + DeserializeOwned + 'static {}

/// Replicated application state.
///
/// Replicas call `apply` once per decided command, strictly in slot order,
/// and also re-run it from a fresh `Default` instance to answer a client's
/// blocking request (see `replica::Replica::execute_request`) — `apply`
/// must therefore be a pure function of the command and prior commands
/// applied to the same instance.
pub trait StateMachine: Default + Send + 'static {
    type Command: Command;
    type Outcome: Outcome;

    fn apply(&mut self, command: &Self::Command) -> Self::Outcome;
}
