//! Exercises the engine's public API end to end: real acceptors and a real
//! leader bound on loopback TCP, with two independently constructed
//! `Replica`s driving requests against them. Covers the properties no
//! in-crate unit test reaches — agreement and prefix consistency across
//! replicas, and idempotent replay of an already-decided command.

use std::net::SocketAddr;
use std::sync::Arc;

use paxlock::{Acceptor, Command, Leader, Replica, StateMachine};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
struct Incr {
    client_id: u64,
    msg_id: u64,
}

impl Command for Incr {
    fn client_id(&self) -> u64 {
        self.client_id
    }
    fn msg_id(&self) -> u64 {
        self.msg_id
    }
}

#[derive(Default)]
struct Counter(u64);

impl StateMachine for Counter {
    type Command = Incr;
    type Outcome = u64;

    fn apply(&mut self, _command: &Incr) -> u64 {
        self.0 += 1;
        self.0
    }
}

fn addr(port: u16) -> SocketAddr {
    format!("127.0.0.1:{}", port).parse().unwrap()
}

async fn start_cluster(base_port: u16) -> SocketAddr {
    let acceptors = vec![addr(base_port), addr(base_port + 1), addr(base_port + 2)];
    for (index, &acceptor_addr) in acceptors.iter().enumerate() {
        let acceptor = Acceptor::<Incr>::new(index as u64);
        tokio::spawn(acceptor.serve(acceptor_addr));
    }

    let leader_addr = addr(base_port + 3);
    let leader = Leader::<Incr>::new(0, acceptors);
    tokio::spawn(leader.serve(leader_addr));

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    leader_addr
}

#[tokio::test]
async fn replicas_agree_on_decided_commands_in_order() {
    let leader_addr = start_cluster(43100).await;

    let replica_a: Arc<Replica<Counter>> = Replica::new(1, vec![leader_addr]);
    let replica_b: Arc<Replica<Counter>> = Replica::new(2, vec![leader_addr]);

    let first = Incr { client_id: 9, msg_id: 1 };
    let (outcome_a, outcome_b) =
        tokio::join!(replica_a.execute_request(first.clone()), replica_b.execute_request(first.clone()));
    assert_eq!(outcome_a, outcome_b, "two replicas must agree on the outcome of the same decided command");
    assert_eq!(outcome_a, 1);

    let second = Incr { client_id: 9, msg_id: 2 };
    let (outcome_a, outcome_b) =
        tokio::join!(replica_a.execute_request(second.clone()), replica_b.execute_request(second.clone()));
    assert_eq!(outcome_a, outcome_b, "agreement must hold across a prefix of decided commands, not just one slot");
    assert_eq!(outcome_a, 2);
}

#[tokio::test]
async fn replaying_an_already_decided_command_returns_its_original_outcome() {
    let leader_addr = start_cluster(43200).await;
    let replica: Arc<Replica<Counter>> = Replica::new(1, vec![leader_addr]);

    let command = Incr { client_id: 7, msg_id: 1 };
    let first = replica.execute_request(command.clone()).await;
    let replayed = replica.execute_request(command).await;

    assert_eq!(first, replayed, "re-submitting a decided command must replay its recorded outcome, not apply again");
}
