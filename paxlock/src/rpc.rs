//! # Summary
//!
//! This module abstracts over the RPC transport: a reliable,
//! connection-oriented request/response channel. Every call is one dial,
//! one length-prefixed bincode-encoded request, one length-prefixed
//! bincode-encoded response, then close — the same one-call-per-connection
//! model the reference implementation uses for its `net/rpc` calls.
//!
//! Failures (dial, write, read, decode) are never distinguished from each
//! other by callers: a failed call becomes `Outcome::Failed` and the caller
//! treats it as "no vote" or "no response", per the liveness model in the
//! spec this crate implements.

use std::future::Future;
use std::net::SocketAddr;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

use crate::error::SetupError;

/// Result of one RPC call over an otherwise value-carrying channel.
///
/// Re-architected from the reference implementation's single sentinel
/// `false` value sent down an `interface{}` channel: every response site
/// matches both arms explicitly instead of type-asserting a boxed value.
#[derive(Debug)]
pub enum Outcome<T> {
    Ok(T),
    Failed,
}

impl<T> Outcome<T> {
    pub fn ok(self) -> Option<T> {
        match self {
            Outcome::Ok(value) => Some(value),
            Outcome::Failed => None,
        }
    }
}

fn framed(stream: TcpStream) -> Framed<TcpStream, LengthDelimitedCodec> {
    Framed::new(stream, LengthDelimitedCodec::new())
}

/// Parse a `host:port` string into a socket address.
pub fn parse_addr(addr: &str) -> Result<SocketAddr, SetupError> {
    addr.parse().map_err(|source| SetupError::InvalidAddress { addr: addr.to_string(), source })
}

/// Bind a listening socket, translating the I/O error into a `SetupError`.
pub async fn bind(addr: SocketAddr) -> Result<TcpListener, SetupError> {
    TcpListener::bind(addr).await.map_err(|source| SetupError::Bind { addr, source })
}

/// Issue one blocking RPC call: dial, send `request`, await one `Resp`.
pub async fn call<Req, Resp>(addr: SocketAddr, request: &Req) -> Outcome<Resp>
where
    Req: Serialize + Sync,
    Resp: DeserializeOwned,
{
    let stream = match TcpStream::connect(addr).await {
        Ok(stream) => stream,
        Err(_) => return Outcome::Failed,
    };
    let mut channel = framed(stream);

    let payload = match bincode::serialize(request) {
        Ok(payload) => payload,
        Err(_) => return Outcome::Failed,
    };
    if channel.send(Bytes::from(payload)).await.is_err() {
        return Outcome::Failed;
    }

    match channel.next().await {
        Some(Ok(buf)) => bincode::deserialize(&buf).map(Outcome::Ok).unwrap_or(Outcome::Failed),
        _ => Outcome::Failed,
    }
}

/// Fire `request` at every address in `addrs` concurrently. Each call's
/// outcome is posted to the returned channel as it completes — callers
/// count votes off this channel rather than waiting on a `JoinAll`, since a
/// single slow or dead peer must never block the others (spec's "RPC calls
/// are never issued while holding the mutex" liveness requirement).
pub fn broadcast<Req, Resp>(addrs: Vec<SocketAddr>, request: Req) -> mpsc::UnboundedReceiver<Outcome<Resp>>
where
    Req: Serialize + Clone + Send + Sync + 'static,
    Resp: DeserializeOwned + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    for addr in addrs {
        let tx = tx.clone();
        let request = request.clone();
        tokio::spawn(async move {
            let outcome = call(addr, &request).await;
            let _ = tx.send(outcome);
        });
    }
    rx
}

/// Accept connections on `listener` forever, handing each framed request to
/// `handler` and writing back whatever it returns. One task per connection;
/// a connection serves exactly one request/response pair, matching the
/// one-shot `call` above.
pub async fn serve<Req, Resp, F, Fut>(listener: TcpListener, handler: F) -> !
where
    Req: DeserializeOwned + Send + 'static,
    Resp: Serialize + Send + 'static,
    F: Fn(Req) -> Fut + Clone + Send + 'static,
    Fut: Future<Output = Resp> + Send + 'static,
{
    loop {
        let (stream, _) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(error) => {
                log::warn!("failed to accept connection: {}", error);
                continue;
            }
        };
        let handler = handler.clone();
        tokio::spawn(async move {
            let mut channel = framed(stream);
            let request = match channel.next().await {
                Some(Ok(buf)) => match bincode::deserialize::<Req>(&buf) {
                    Ok(request) => request,
                    Err(error) => {
                        log::warn!("failed to decode request: {}", error);
                        return;
                    }
                },
                _ => return,
            };
            let response = handler(request).await;
            if let Ok(payload) = bincode::serialize(&response) {
                let _ = channel.send(Bytes::from(payload)).await;
            }
        });
    }
}
