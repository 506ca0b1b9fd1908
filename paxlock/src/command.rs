//! # Summary
//!
//! A `Command` is whatever the replicated log orders and the state machine
//! applies. The engine only needs to know a command's identity — the
//! `(client_id, msg_id)` pair duplicate detection is keyed on — everything
//! else is opaque to it.

use std::fmt::Debug;

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Operation ordered by the replicated log.
///
/// Identity, not structural equality, is what the engine cares about: two
/// commands are the same command if they carry the same `(client_id,
/// msg_id)` pair, even if re-serialized or re-proposed at a different slot.
pub trait Command: Clone + Debug + Send + Sync + Serialize + DeserializeOwned + 'static {
    fn client_id(&self) -> u64;
    fn msg_id(&self) -> u64;

    /// True if `self` and `other` are the same client request.
    fn same_identity(&self, other: &Self) -> bool {
        self.client_id() == other.client_id() && self.msg_id() == other.msg_id()
    }
}
