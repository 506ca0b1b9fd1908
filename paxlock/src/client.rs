//! # Summary
//!
//! A thin, transport-level client: send a command to every known replica
//! concurrently, return whichever outcome comes back first. Because every
//! command carries a stable (client id, msg id) identity and replicas
//! suppress duplicates by that identity, retrying — against the same
//! replica or a different one — is always safe, so this client does not
//! need to track which replica is "the" leader of anything.
//!
//! Policy for *when* to retry (a lock call came back held, a dropped
//! connection needs a fresh msg id, how long to back off) is
//! application-specific and lives above this crate; `Client` only knows
//! how to get one command answered.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::message::ClientRequest;
use crate::rpc::{self, Outcome};
use crate::state::StateMachine;

pub struct Client<M: StateMachine> {
    replicas: Arc<Vec<SocketAddr>>,
    _marker: std::marker::PhantomData<M>,
}

impl<M: StateMachine> Clone for Client<M> {
    fn clone(&self) -> Self {
        Client { replicas: Arc::clone(&self.replicas), _marker: std::marker::PhantomData }
    }
}

impl<M: StateMachine> Client<M> {
    pub fn new(replicas: Vec<SocketAddr>) -> Self {
        Client { replicas: Arc::new(replicas), _marker: std::marker::PhantomData }
    }

    /// Sends `command` to every replica and returns the first outcome any
    /// of them reports. `None` means every replica failed to answer —
    /// callers decide whether and how to retry.
    pub async fn call(&self, command: M::Command) -> Option<M::Outcome> {
        let mut rx: mpsc::UnboundedReceiver<Outcome<crate::message::ClientResponse<M::Outcome>>> =
            rpc::broadcast(self.replicas.as_ref().clone(), ClientRequest { command });
        while let Some(outcome) = rx.recv().await {
            if let Outcome::Ok(response) = outcome {
                return Some(response.outcome);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Command;
    use crate::message::ClientResponse;
    use serde::{Deserialize, Serialize};
    use tokio::net::TcpListener;

    #[derive(Clone, Debug, Serialize, Deserialize)]
    struct Echo {
        client_id: u64,
        msg_id: u64,
    }

    impl Command for Echo {
        fn client_id(&self) -> u64 {
            self.client_id
        }
        fn msg_id(&self) -> u64 {
            self.msg_id
        }
    }

    #[derive(Default)]
    struct EchoMachine;

    impl StateMachine for EchoMachine {
        type Command = Echo;
        type Outcome = u64;

        fn apply(&mut self, command: &Echo) -> u64 {
            command.msg_id
        }
    }

    #[tokio::test]
    async fn call_returns_the_first_reachable_replicas_outcome() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(rpc::serve(listener, |request: ClientRequest<Echo>| async move {
            ClientResponse { msg_id: request.command.msg_id, outcome: request.command.msg_id * 10 }
        }));

        // One address never answers (nothing listens there); the other
        // does. `call` must not block on the dead one.
        let dead: SocketAddr = "127.0.0.1:1".parse().unwrap();
        let client: Client<EchoMachine> = Client::new(vec![dead, addr]);

        let outcome = client.call(Echo { client_id: 1, msg_id: 7 }).await;
        assert_eq!(outcome, Some(70));
    }

    #[tokio::test]
    async fn call_returns_none_when_every_replica_is_unreachable() {
        let dead: SocketAddr = "127.0.0.1:1".parse().unwrap();
        let client: Client<EchoMachine> = Client::new(vec![dead]);
        assert_eq!(client.call(Echo { client_id: 1, msg_id: 1 }).await, None);
    }
}
