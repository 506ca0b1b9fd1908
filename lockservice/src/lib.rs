//! # Summary
//!
//! The lock table application: the concrete command and state-machine
//! types that plug into `paxlock`'s generic replication engine. A lock is
//! identified by name; `Lock` grants it to whichever client's command is
//! decided first, `Unlock` releases it only for the client currently
//! holding it.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LockOp {
    Lock,
    Unlock,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockCommand {
    pub client_id: u64,
    pub msg_id: u64,
    pub lock_name: String,
    pub op: LockOp,
}

impl paxlock::Command for LockCommand {
    fn client_id(&self) -> u64 {
        self.client_id
    }

    fn msg_id(&self) -> u64 {
        self.msg_id
    }
}

/// Outcome of applying one `LockCommand` to the lock table.
///
/// `ErrConnectionError` is deliberately absent here: it's a transport-level
/// outcome the client wrapper synthesizes when no replica answers at all,
/// never something the replicated state machine produces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LockOutcome {
    Ok,
    ErrLockHeld,
    ErrInvalidUnlock,
}

#[derive(Default)]
pub struct LockTable {
    held: HashMap<String, u64>,
}

impl paxlock::StateMachine for LockTable {
    type Command = LockCommand;
    type Outcome = LockOutcome;

    fn apply(&mut self, command: &LockCommand) -> LockOutcome {
        match command.op {
            LockOp::Lock => match self.held.get(&command.lock_name) {
                Some(&holder) if holder != command.client_id => LockOutcome::ErrLockHeld,
                _ => {
                    self.held.insert(command.lock_name.clone(), command.client_id);
                    LockOutcome::Ok
                }
            },
            LockOp::Unlock => match self.held.get(&command.lock_name) {
                Some(&holder) if holder == command.client_id => {
                    self.held.remove(&command.lock_name);
                    LockOutcome::Ok
                }
                _ => LockOutcome::ErrInvalidUnlock,
            },
        }
    }
}

/// Initial backoff before a client's first retry of a contended lock
/// request, and the per-retry additive increase. Mirrors the leader's
/// scout backoff in spirit (additive increase on failure) but tuned for
/// a human-facing retry loop rather than a ballot contest: small initial
/// delay, capped growth.
const CLIENT_INITIAL_BACKOFF: Duration = Duration::from_millis(100);
const CLIENT_ADDITIVE_INCREASE: Duration = Duration::from_millis(100);
const CLIENT_MAX_BACKOFF: Duration = Duration::from_secs(2);
const CLIENT_MULTIPLICATIVE_DECREASE: u32 = 2;

/// Outcome reported to whoever is driving a `LockClient`. `ErrLockHeld` is
/// never returned here: `lock` retries transparently (with backoff) until
/// the lock is granted or the connection to every replica fails, since a
/// held lock is a transient contention condition, not a client error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LockResult {
    Ok,
    ErrInvalidUnlock,
    ErrConnectionError,
}

impl From<LockOutcome> for LockResult {
    fn from(outcome: LockOutcome) -> Self {
        match outcome {
            LockOutcome::Ok => LockResult::Ok,
            LockOutcome::ErrInvalidUnlock => LockResult::ErrInvalidUnlock,
            LockOutcome::ErrLockHeld => unreachable!("ErrLockHeld is retried inside LockClient::lock"),
        }
    }
}

/// A lock-service client: assigns each request a fresh message id and
/// retries contended `Lock` calls with AIMD backoff. The backoff timer is
/// shared across every call this client makes, not reset each time —
/// a client that just backed off from contention on one lock starts its
/// next call at that same elevated timeout, per spec.
pub struct LockClient {
    client: paxlock::Client<LockTable>,
    client_id: u64,
    next_msg_id: AtomicU64,
    backoff: parking_lot::Mutex<Duration>,
}

impl LockClient {
    pub fn new(client_id: u64, replicas: Vec<SocketAddr>) -> Self {
        LockClient {
            client: paxlock::Client::new(replicas),
            client_id,
            next_msg_id: AtomicU64::new(1),
            backoff: parking_lot::Mutex::new(CLIENT_INITIAL_BACKOFF),
        }
    }

    fn next_command(&self, lock_name: &str, op: LockOp) -> LockCommand {
        let msg_id = self.next_msg_id.fetch_add(1, Ordering::Relaxed);
        LockCommand { client_id: self.client_id, msg_id, lock_name: lock_name.to_string(), op }
    }

    /// Acquire `lock_name`, retrying with AIMD backoff for as long as it's
    /// held by someone else. Each retry is a distinct command (a fresh
    /// msg id): a decided command's outcome is fixed forever, so
    /// re-attempting contention requires proposing a new one.
    pub async fn lock(&self, lock_name: &str) -> LockResult {
        loop {
            let command = self.next_command(lock_name, LockOp::Lock);
            match self.client.call(command).await {
                None => return LockResult::ErrConnectionError,
                Some(LockOutcome::ErrLockHeld) => {
                    let wait = {
                        let mut backoff = self.backoff.lock();
                        *backoff = std::cmp::min(*backoff + CLIENT_ADDITIVE_INCREASE, CLIENT_MAX_BACKOFF);
                        *backoff
                    };
                    tokio::time::sleep(wait).await;
                }
                Some(outcome) => {
                    self.decrease_backoff();
                    return outcome.into();
                }
            }
        }
    }

    /// Release `lock_name`. Unlike `lock`, never retried on its own
    /// result: an invalid unlock is a client bug, not contention.
    pub async fn unlock(&self, lock_name: &str) -> LockResult {
        let command = self.next_command(lock_name, LockOp::Unlock);
        match self.client.call(command).await {
            None => LockResult::ErrConnectionError,
            Some(outcome) => {
                self.decrease_backoff();
                outcome.into()
            }
        }
    }

    fn decrease_backoff(&self) {
        let mut backoff = self.backoff.lock();
        *backoff = std::cmp::max(*backoff / CLIENT_MULTIPLICATIVE_DECREASE, CLIENT_INITIAL_BACKOFF);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use paxlock::StateMachine;

    fn lock(client_id: u64, msg_id: u64, name: &str) -> LockCommand {
        LockCommand { client_id, msg_id, lock_name: name.to_string(), op: LockOp::Lock }
    }

    fn unlock(client_id: u64, msg_id: u64, name: &str) -> LockCommand {
        LockCommand { client_id, msg_id, lock_name: name.to_string(), op: LockOp::Unlock }
    }

    #[test]
    fn second_lock_on_a_held_name_is_rejected() {
        let mut table = LockTable::default();
        assert_eq!(table.apply(&lock(1, 1, "a")), LockOutcome::Ok);
        assert_eq!(table.apply(&lock(2, 1, "a")), LockOutcome::ErrLockHeld);
    }

    #[test]
    fn relock_of_a_held_name_by_its_own_holder_is_a_no_op_success() {
        let mut table = LockTable::default();
        assert_eq!(table.apply(&lock(1, 1, "a")), LockOutcome::Ok);
        assert_eq!(table.apply(&lock(1, 2, "a")), LockOutcome::Ok);
        assert_eq!(table.apply(&lock(2, 1, "a")), LockOutcome::ErrLockHeld);
    }

    #[test]
    fn unlock_by_a_non_holder_is_rejected() {
        let mut table = LockTable::default();
        table.apply(&lock(1, 1, "a"));
        assert_eq!(table.apply(&unlock(2, 1, "a")), LockOutcome::ErrInvalidUnlock);
    }

    #[test]
    fn unlock_of_an_unheld_name_is_rejected() {
        let mut table = LockTable::default();
        assert_eq!(table.apply(&unlock(1, 1, "a")), LockOutcome::ErrInvalidUnlock);
    }

    #[test]
    fn unlock_then_relock_by_a_different_client_succeeds() {
        let mut table = LockTable::default();
        table.apply(&lock(1, 1, "a"));
        assert_eq!(table.apply(&unlock(1, 2, "a")), LockOutcome::Ok);
        assert_eq!(table.apply(&lock(2, 1, "a")), LockOutcome::Ok);
    }
}
