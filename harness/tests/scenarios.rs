//! Drives each committed scenario fixture through `harness::run`, matching
//! spec.md §8's six end-to-end scenarios (basic lock/unlock, invalid unlock,
//! contention with backoff, leader failover, acceptor-minority loss, and
//! replica loss) against a freshly built `lockservice-server`.

use std::path::PathBuf;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
}

fn server_binary() -> PathBuf {
    let profile = if cfg!(debug_assertions) { "debug" } else { "release" };
    let name = if cfg!(windows) { "lockservice-server.exe" } else { "lockservice-server" };
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("..").join("target").join(profile).join(name)
}

async fn run_scenario(fixture_name: &str) {
    let opt = harness::Opt { server: server_binary(), file: fixture(fixture_name), verbose: 0 };
    harness::run(opt).await.expect("scenario failed");
}

#[tokio::test]
async fn basic_lock_unlock() {
    run_scenario("scenario_1_basic_lock_unlock.json").await;
}

#[tokio::test]
async fn invalid_unlock_is_rejected() {
    run_scenario("scenario_2_invalid_unlock.json").await;
}

#[tokio::test]
async fn contention_resolves_via_backoff() {
    run_scenario("scenario_3_contention_backoff.json").await;
}

#[tokio::test]
async fn survives_leader_failover() {
    run_scenario("scenario_4_leader_failover.json").await;
}

#[tokio::test]
async fn survives_acceptor_minority_loss() {
    run_scenario("scenario_5_acceptor_minority_loss.json").await;
}

#[tokio::test]
async fn survives_replica_loss() {
    run_scenario("scenario_6_replica_loss.json").await;
}
