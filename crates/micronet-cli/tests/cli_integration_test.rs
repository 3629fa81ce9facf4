//! CLI Integration Tests
//!
//! Runs the built `micronet` binary against servers started in-process.

use micronet_common::Address;
use micronet_server::Server;
use std::process::{Command, Output};

fn micronet(args: &[&str]) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_micronet"));
    command.args(args);
    command
}

async fn run(mut command: Command) -> Output {
    tokio::task::spawn_blocking(move || command.output().unwrap())
        .await
        .unwrap()
}

async fn start_server() -> (Server, String) {
    let server = Server::new(Address::tcp("127.0.0.1", "0"));
    let running = server.clone();
    tokio::spawn(async move { running.start().await });
    let bound = server.wait_listening().await.unwrap();
    (server, format!("tcp://127.0.0.1:{}", bound.port()))
}

#[test]
fn test_help_lists_subcommands() {
    let output = micronet(&["--help"]).output().unwrap();
    let stdout = String::from_utf8_lossy(&output.stdout);

    for subcommand in ["publisher", "subscriber", "ping", "call"] {
        assert!(stdout.contains(subcommand), "missing {} in:\n{}", subcommand, stdout);
    }
}

#[test]
fn test_subscriber_requires_publisher() {
    let output = micronet(&["subscriber", "-l", "tcp://127.0.0.1:4321"]).output().unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("publisher"));
}

#[test]
fn test_malformed_address_is_rejected() {
    let output = micronet(&["ping", "127.0.0.1:1234"]).output().unwrap();
    assert!(!output.status.success());
}

#[tokio::test]
async fn test_ping_unreachable_node_fails() {
    let port = {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };

    let output = run(micronet(&["ping", &format!("tcp://127.0.0.1:{}", port)])).await;
    assert!(!output.status.success());
}

#[tokio::test]
async fn test_ping_live_node() {
    let (server, address) = start_server().await;

    let output = run(micronet(&["ping", &address])).await;
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    server.stop();
}

#[tokio::test]
async fn test_call_prints_raw_json() {
    let (server, address) = start_server().await;

    let output = run(micronet(&["call", &address, "PingHandler.Ping", "-a", r#"{"data":"PING"}"#])).await;
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), r#"{"data":"PONG"}"#);

    let output = run(micronet(&["call", &address, "Nobody.Home"])).await;
    assert!(!output.status.success());

    server.stop();
}
