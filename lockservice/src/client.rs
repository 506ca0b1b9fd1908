//! # Summary
//!
//! Client binary: either a small REPL over `LockClient`, or a script runner
//! that replays `Lock <name>` / `Unlock <name>` lines from a file. Unlike
//! the reference chat client, there's no `connect`/`disconnect` step —
//! every call already fans out to the full replica list given on the
//! command line, so reconnecting on failure is just "try again."

use std::path::PathBuf;

use structopt::StructOpt;
use tokio::io::{AsyncBufReadExt, BufReader};

use lockservice::{LockClient, LockResult};

#[derive(StructOpt)]
#[structopt(name = "lockservice-client")]
struct Opt {
    /// Unique client id
    #[structopt(short = "i", long = "id")]
    id: u64,

    /// Comma-separated replica addresses
    #[structopt(short = "r", long = "replicas", use_delimiter = true)]
    replicas: Vec<String>,

    /// Replay `Lock <name>` / `Unlock <name>` lines from a script file
    /// instead of reading an interactive REPL from stdin.
    #[structopt(short = "f", long = "file")]
    script: Option<PathBuf>,
}

fn usage() {
    println!(
        "{}{}{}{}{}",
        "--------------------------------------------------------------\n",
        "Possible commands:\n",
        "lock <NAME>    | l <NAME>  -- Acquire the named lock\n",
        "unlock <NAME>  | u <NAME>  -- Release the named lock\n",
        "--------------------------------------------------------------",
    );
}

enum Line {
    Lock(String),
    Unlock(String),
    Help,
}

impl std::str::FromStr for Line {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut iter = s.trim().splitn(2, ' ');
        match iter.next() {
            Some("help") | Some("h") => Ok(Line::Help),
            Some("lock") | Some("l") => iter.next().map(|name| Line::Lock(name.to_string())).ok_or(()),
            Some("unlock") | Some("u") => iter.next().map(|name| Line::Unlock(name.to_string())).ok_or(()),
            _ => Err(()),
        }
    }
}

fn report(lock_name: &str, op: &str, result: LockResult) {
    match result {
        LockResult::Ok => println!("[OK]: {} {}", op, lock_name),
        LockResult::ErrInvalidUnlock => println!("[ERROR]: {} is not held by this client", lock_name),
        LockResult::ErrConnectionError => println!("[ERROR]: could not reach any replica"),
    }
}

async fn execute(client: &LockClient, line: &str) {
    match line.parse::<Line>() {
        Ok(Line::Lock(name)) => report(&name, "lock", client.lock(&name).await),
        Ok(Line::Unlock(name)) => report(&name, "unlock", client.unlock(&name).await),
        Ok(Line::Help) => usage(),
        Err(()) => println!("[ERROR]: could not parse command"),
    }
}

/// Interactive REPL: prompt, read a line, execute, repeat until stdin closes.
async fn run_repl(client: &LockClient) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        use std::io::Write;
        std::io::stdout().flush().ok();

        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            _ => break,
        };
        execute(client, &line).await;
    }
}

/// Non-interactive script runner: replay every line of `path` in order,
/// blank lines skipped, no prompt.
async fn run_script(client: &LockClient, path: &std::path::Path) {
    let contents = std::fs::read_to_string(path).expect("[INTERNAL ERROR]: could not read script file");
    for line in contents.lines() {
        if line.trim().is_empty() {
            continue;
        }
        println!("> {}", line);
        execute(client, line).await;
    }
}

async fn run(opt: Opt) -> Result<(), paxlock::SetupError> {
    let replicas =
        opt.replicas.iter().map(|addr| paxlock::rpc::parse_addr(addr)).collect::<Result<Vec<_>, _>>()?;
    let client = LockClient::new(opt.id, replicas);

    match &opt.script {
        Some(path) => run_script(&client, path).await,
        None => run_repl(&client).await,
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(error) = run(Opt::from_args()).await {
        log::error!("lockservice-client exiting: {}", error);
        eprintln!("[ERROR]: {}", error);
        std::process::exit(1);
    }
}
