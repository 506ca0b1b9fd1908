//! # Summary
//!
//! The JSON scenario format a harness run consumes: a flat list of
//! commands executed in order, covering process lifecycle (start/crash a
//! role), client operations (lock/unlock with an expected outcome), and
//! timing (sleep). Mirrors the reference harness's `Execution(Vec<Command>)`
//! shape, with `Connect`/`Disconnect`/`Get`/`Put` replaced by this
//! service's process roles and lock operations.

use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize)]
pub struct Execution(pub Vec<Command>);

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Command {
    /// Spawn an acceptor process, registered under `id` for later `Crash`.
    StartAcceptor { id: u64, listen: String },

    /// Spawn a leader process.
    StartLeader { id: u64, listen: String, acceptors: Vec<String> },

    /// Spawn a replica process.
    StartReplica { id: u64, listen: String, leaders: Vec<String> },

    /// Kill the process registered under `id`.
    Crash { id: u64 },

    /// Issue `Lock(name)` as `client_id` against `replicas` and assert the
    /// outcome matches `expect`.
    Lock { client_id: u64, replicas: Vec<String>, name: String, expect: Expect },

    /// Issue `Unlock(name)` as `client_id` against `replicas` and assert
    /// the outcome matches `expect`.
    Unlock { client_id: u64, replicas: Vec<String>, name: String, expect: Expect },

    /// Issue `Lock(name)` as `client_id` in the background, registered
    /// under `handle` for a later `AwaitLock`. Needed for scenarios where
    /// one client's retry-with-backoff must be in flight while a later
    /// step (e.g. another client's `Unlock`) runs concurrently with it.
    LockAsync { handle: String, client_id: u64, replicas: Vec<String>, name: String },

    /// Block until the `Lock` started by the matching `LockAsync` returns,
    /// and assert its outcome matches `expect`.
    AwaitLock { handle: String, expect: Expect },

    /// Pause the harness for `ms` milliseconds, e.g. to let a new leader
    /// win an election before issuing the next client call.
    Sleep { ms: u64 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Expect {
    Ok,
    ErrInvalidUnlock,
    ErrConnectionError,
}

impl From<lockservice::LockResult> for Expect {
    fn from(result: lockservice::LockResult) -> Self {
        match result {
            lockservice::LockResult::Ok => Expect::Ok,
            lockservice::LockResult::ErrInvalidUnlock => Expect::ErrInvalidUnlock,
            lockservice::LockResult::ErrConnectionError => Expect::ErrConnectionError,
        }
    }
}
