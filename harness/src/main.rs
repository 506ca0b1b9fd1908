//! # Summary
//!
//! Thin CLI wrapper around the `harness` library's scenario runner.

use structopt::StructOpt;

#[tokio::main]
async fn main() {
    if let Err(error) = harness::run(harness::Opt::from_args()).await {
        eprintln!("[ERROR]: {}", error);
        std::process::exit(1);
    }
}
