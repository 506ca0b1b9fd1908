//! # Summary
//!
//! Fatal, non-retryable failures a role can hit at startup. Everything
//! else — a dropped connection, a timed-out acceptor, a preempted leader —
//! is transient and handled by the protocol itself (see `rpc::Outcome`),
//! never surfaced as a Rust `Error`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SetupError {
    #[error("failed to bind listening socket on {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid socket address {addr:?}: {source}")]
    InvalidAddress {
        addr: String,
        #[source]
        source: std::net::AddrParseError,
    },
}
