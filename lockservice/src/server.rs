//! # Summary
//!
//! Server binary: launches exactly one Paxos role (acceptor, leader, or
//! replica) bound to its own listening address. The reference
//! implementation instead starts every role as goroutines inside one
//! process; this binary deliberately departs from that and gives each
//! role its own addressable process, so a real deployment runs several
//! of these, one per acceptor/leader/replica, with no process
//! discovering its peers except through the addresses given on its own
//! command line.

use structopt::StructOpt;

use lockservice::LockTable;
use paxlock::{Acceptor, Leader, Replica};

#[derive(StructOpt)]
#[structopt(name = "lockservice-server")]
struct Opt {
    #[structopt(subcommand)]
    role: Role,

    /// Logging verbosity; repeat for more detail (-v, -vv, -vvv)
    #[structopt(short = "v", long = "verbose", parse(from_occurrences))]
    verbosity: u8,
}

#[derive(StructOpt)]
enum Role {
    /// Votes on ballots and values per slot.
    Acceptor {
        #[structopt(long)]
        id: u64,
        #[structopt(long)]
        listen: String,
    },

    /// Runs phase 1 (scout) and phase 2 (commander) of Multi-Paxos.
    Leader {
        #[structopt(long)]
        id: u64,
        #[structopt(long)]
        listen: String,
        #[structopt(long, use_delimiter = true)]
        acceptors: Vec<String>,
    },

    /// Assigns slots, proposes to leaders, and answers clients.
    Replica {
        #[structopt(long)]
        id: u64,
        #[structopt(long)]
        listen: String,
        #[structopt(long, use_delimiter = true)]
        leaders: Vec<String>,
    },
}

fn init_logging(id: u64, verbosity: u8) {
    let level = match verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    fern::Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!("[{}][{}][{}]: {}", id, record.level(), record.target(), message))
        })
        .level_for("paxlock", level)
        .level_for("lockservice", level)
        .level_for("mio", log::LevelFilter::Off)
        .chain(std::io::stdout())
        .apply()
        .expect("logging can only be initialized once per process");
}

fn parse_addrs(addrs: &[String]) -> Result<Vec<std::net::SocketAddr>, paxlock::SetupError> {
    addrs.iter().map(|addr| paxlock::rpc::parse_addr(addr)).collect()
}

async fn run(opt: Opt) -> Result<(), paxlock::SetupError> {
    match opt.role {
        Role::Acceptor { id, listen } => {
            init_logging(id, opt.verbosity);
            let addr = paxlock::rpc::parse_addr(&listen)?;
            Acceptor::<lockservice::LockCommand>::new(id).serve(addr).await
        }
        Role::Leader { id, listen, acceptors } => {
            init_logging(id, opt.verbosity);
            let addr = paxlock::rpc::parse_addr(&listen)?;
            let acceptors = parse_addrs(&acceptors)?;
            Leader::<lockservice::LockCommand>::new(id, acceptors).serve(addr).await
        }
        Role::Replica { id, listen, leaders } => {
            init_logging(id, opt.verbosity);
            let addr = paxlock::rpc::parse_addr(&listen)?;
            let leaders = parse_addrs(&leaders)?;
            Replica::<LockTable>::new(id, leaders).serve(addr).await
        }
    }
}

#[tokio::main]
async fn main() {
    if let Err(error) = run(Opt::from_args()).await {
        log::error!("server exiting: {}", error);
        eprintln!("[ERROR]: {}", error);
        std::process::exit(1);
    }
}
