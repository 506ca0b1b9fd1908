//! # Summary
//!
//! Scenario runner: reads a JSON `Execution` (see `command`), spawns and
//! kills `lockservice-server` processes as instructed, and issues client
//! lock/unlock calls in-process against whichever replicas the scenario
//! names, asserting each one's outcome against the scenario's expectation.
//! Exposed as a library so both the `harness` binary and this crate's own
//! integration tests can drive the same scenario files.

use std::collections::HashMap as Map;
use std::path::PathBuf;

use structopt::StructOpt;
use tokio::task::JoinHandle;

pub mod command;
pub mod server;

use crate::command::{Command, Execution, Expect};
use crate::server::Server;

#[derive(StructOpt)]
#[structopt(name = "harness")]
pub struct Opt {
    /// Path to the lockservice-server binary
    #[structopt(short = "s", long = "server")]
    pub server: PathBuf,

    /// Scenario file
    #[structopt(short = "f", long = "file")]
    pub file: PathBuf,

    /// Logging verbosity passed through to spawned servers
    #[structopt(short = "v", long = "verbose", parse(from_occurrences))]
    pub verbose: u8,
}

fn parse_addrs(addrs: &[String]) -> Result<Vec<std::net::SocketAddr>, paxlock::SetupError> {
    addrs.iter().map(|addr| paxlock::rpc::parse_addr(addr)).collect()
}

pub async fn run(opt: Opt) -> Result<(), paxlock::SetupError> {
    let execution: Execution = std::fs::File::open(&opt.file)
        .map(serde_json::from_reader)
        .expect("[INTERNAL ERROR]: could not open scenario file")
        .expect("[INTERNAL ERROR]: could not parse scenario file");

    let mut servers: Map<u64, Server> = Map::default();
    let mut pending: Map<String, JoinHandle<lockservice::LockResult>> = Map::default();
    let mut step = 0;

    for command in execution.0 {
        step += 1;
        println!("[{}] {:?}", step, command);
        match command {
            Command::StartAcceptor { id, listen } => {
                servers.insert(id, Server::acceptor(&opt.server, id, &listen, opt.verbose));
            }
            Command::StartLeader { id, listen, acceptors } => {
                servers.insert(id, Server::leader(&opt.server, id, &listen, &acceptors, opt.verbose));
            }
            Command::StartReplica { id, listen, leaders } => {
                servers.insert(id, Server::replica(&opt.server, id, &listen, &leaders, opt.verbose));
            }
            Command::Crash { id } => {
                servers.remove(&id).expect("[INTERNAL ERROR]: crash of a process never started");
            }
            Command::Lock { client_id, replicas, name, expect } => {
                let client = lockservice::LockClient::new(client_id, parse_addrs(&replicas)?);
                let result = client.lock(&name).await;
                assert_outcome(step, expect, result);
            }
            Command::Unlock { client_id, replicas, name, expect } => {
                let client = lockservice::LockClient::new(client_id, parse_addrs(&replicas)?);
                let result = client.unlock(&name).await;
                assert_outcome(step, expect, result);
            }
            Command::LockAsync { handle, client_id, replicas, name } => {
                let replicas = parse_addrs(&replicas)?;
                let task = tokio::spawn(async move {
                    let client = lockservice::LockClient::new(client_id, replicas);
                    client.lock(&name).await
                });
                pending.insert(handle, task);
            }
            Command::AwaitLock { handle, expect } => {
                let task = pending.remove(&handle).expect("[INTERNAL ERROR]: await of an unstarted LockAsync");
                let result = task.await.expect("[INTERNAL ERROR]: LockAsync task panicked");
                assert_outcome(step, expect, result);
            }
            Command::Sleep { ms } => {
                tokio::time::sleep(std::time::Duration::from_millis(ms)).await;
            }
        }
    }

    println!("scenario passed: {} steps", step);
    Ok(())
}

fn assert_outcome(step: usize, expect: Expect, result: lockservice::LockResult) {
    let actual = Expect::from(result);
    assert_eq!(actual, expect, "[{}] expected {:?}, got {:?}", step, expect, actual);
}
