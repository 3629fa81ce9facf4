//! # micronet CLI Entry Point
//!
//! ## Usage
//!
//! ```bash
//! # Publish every stdin line to whoever subscribes
//! micronet publisher -l tcp://127.0.0.1:1234
//!
//! # Subscribe and print updates, one JSON document per line
//! micronet subscriber -l tcp://127.0.0.1:4321 -p tcp://127.0.0.1:1234
//!
//! # Check that a node is alive
//! micronet ping tcp://127.0.0.1:1234
//!
//! # Make a single call (outputs raw JSON)
//! micronet call tcp://127.0.0.1:1234 PingHandler.Ping -a '{"data": "PING"}'
//! ```
//!
//! ## Address Format
//!
//! Addresses are written `protocol://host:port`; only `tcp` is supported.

use anyhow::Result;
use argh::FromArgs;
use micronet_cli::named;
use micronet_cli::observe::{run_publisher, run_subscriber, SubscriberOptions};
use micronet_client::{ReconnectPolicy, ResilientClient};
use micronet_common::Address;
use std::time::Duration;
use tokio::io::BufReader;

#[derive(FromArgs)]
/// micronet - resilient RPC with publish/subscribe
struct Cli {
    #[argh(subcommand)]
    command: Commands,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum Commands {
    Publisher(PublisherArgs),
    Subscriber(SubscriberArgs),
    Ping(PingArgs),
    Call(CallArgs),
}

// Every line read from stdin is published as a JSON string to all current
// subscribers. The publisher stops at end of input or on Ctrl-C.
#[derive(FromArgs)]
#[argh(subcommand, name = "publisher")]
/// serve subscriptions and publish stdin lines
struct PublisherArgs {
    /// address to listen on, e.g. tcp://127.0.0.1:1234
    #[argh(option, short = 'l')]
    listen: Address,
}

// The subscriber's calls to its publisher reconnect on connection loss, up to
// `--retry-limit` attempts spaced by `--retry-interval-ms`.
#[derive(FromArgs)]
#[argh(subcommand, name = "subscriber")]
/// subscribe to a publisher and print its updates
struct SubscriberArgs {
    /// address to receive updates on, e.g. tcp://127.0.0.1:4321
    #[argh(option, short = 'l')]
    listen: Address,

    /// address of the publisher, e.g. tcp://127.0.0.1:1234
    #[argh(option, short = 'p')]
    publisher: Address,

    /// reconnection attempts before giving up
    #[argh(option, long = "retry-limit", default = "3")]
    retry_limit: u32,

    /// pause between reconnection attempts in milliseconds
    #[argh(option, long = "retry-interval-ms", default = "1000")]
    retry_interval_ms: u64,
}

#[derive(FromArgs)]
#[argh(subcommand, name = "ping")]
/// check that a node answers PingHandler.Ping
struct PingArgs {
    /// address of the node
    #[argh(positional)]
    address: Address,
}

// Outputs raw JSON to stdout; errors go to stderr with a non-zero exit code.
#[derive(FromArgs)]
#[argh(subcommand, name = "call")]
/// call a Handler.Method on a node
struct CallArgs {
    /// address of the node
    #[argh(positional)]
    address: Address,

    /// method to call, e.g. PingHandler.Ping
    #[argh(positional)]
    method: String,

    /// arguments as JSON, defaults to null
    #[argh(option, short = 'a', long = "args", default = "\"null\".into()")]
    args: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli: Cli = argh::from_env();

    // Keep `call` output clean for piping
    if !matches!(cli.command, Commands::Call(_)) {
        let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    }

    match cli.command {
        Commands::Publisher(args) => {
            let listen = named(&args.listen, "Publisher");
            let stdin = BufReader::new(tokio::io::stdin());
            run_publisher(listen, stdin, ctrl_c()).await
        }
        Commands::Subscriber(args) => {
            let options = SubscriberOptions {
                listen: named(&args.listen, "Subscriber"),
                publisher: named(&args.publisher, "Publisher"),
                policy: ReconnectPolicy::new(args.retry_limit, Duration::from_millis(args.retry_interval_ms)),
            };
            tracing::info!(
                retry_limit = options.policy.retry_limit,
                retry_interval_ms = args.retry_interval_ms,
                "Starting subscriber"
            );
            run_subscriber(options, tokio::io::stdout(), ctrl_c()).await
        }
        Commands::Ping(args) => {
            let client = ResilientClient::connect(args.address).await?;
            client.ping().await?;
            client.close().await?;
            Ok(())
        }
        Commands::Call(args) => run_call(args).await,
    }
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}

/// Executes the `call` subcommand and prints the raw JSON result.
///
/// # Errors
///
/// Returns an error if the args are not valid JSON, the node cannot be
/// reached, or the call itself fails.
async fn run_call(args: CallArgs) -> Result<()> {
    let args_value: serde_json::Value = serde_json::from_str(&args.args)
        .map_err(|e| anyhow::anyhow!("Invalid JSON in args: {}", e))?;

    let client = ResilientClient::connect(args.address).await?;
    let result = client.call_value(&args.method, args_value).await?;
    println!("{}", serde_json::to_string(&result)?);

    client.close().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_publisher() {
        let args: Cli = Cli::from_args(&["micronet"], &["publisher", "-l", "tcp://127.0.0.1:1234"]).unwrap();
        match args.command {
            Commands::Publisher(PublisherArgs { listen }) => {
                assert_eq!(listen, Address::tcp("127.0.0.1", "1234"));
            }
            _ => panic!("Expected Publisher command"),
        }
    }

    #[test]
    fn test_cli_parse_subscriber_defaults() {
        let args: Cli = Cli::from_args(&["micronet"], &[
            "subscriber",
            "-l", "tcp://127.0.0.1:4321",
            "-p", "tcp://127.0.0.1:1234",
        ]).unwrap();
        match args.command {
            Commands::Subscriber(SubscriberArgs { listen, publisher, retry_limit, retry_interval_ms }) => {
                assert_eq!(listen.port(), "4321");
                assert_eq!(publisher.port(), "1234");
                assert_eq!(retry_limit, 3);
                assert_eq!(retry_interval_ms, 1000);
            }
            _ => panic!("Expected Subscriber command"),
        }
    }

    #[test]
    fn test_cli_parse_subscriber_retry_flags() {
        let args: Cli = Cli::from_args(&["micronet"], &[
            "subscriber",
            "--listen", "tcp://localhost:4321",
            "--publisher", "tcp://localhost:1234",
            "--retry-limit", "10",
            "--retry-interval-ms", "250",
        ]).unwrap();
        match args.command {
            Commands::Subscriber(SubscriberArgs { retry_limit, retry_interval_ms, .. }) => {
                assert_eq!(retry_limit, 10);
                assert_eq!(retry_interval_ms, 250);
            }
            _ => panic!("Expected Subscriber command"),
        }
    }

    #[test]
    fn test_cli_parse_ping() {
        let args: Cli = Cli::from_args(&["micronet"], &["ping", "tcp://10.0.0.1:99"]).unwrap();
        match args.command {
            Commands::Ping(PingArgs { address }) => {
                assert_eq!(address.host(), "10.0.0.1");
                assert_eq!(address.port(), "99");
            }
            _ => panic!("Expected Ping command"),
        }
    }

    #[test]
    fn test_cli_parse_call() {
        let args: Cli = Cli::from_args(&["micronet"], &[
            "call",
            "tcp://127.0.0.1:1234",
            "PingHandler.Ping",
            "-a", "{\"data\":\"PING\"}",
        ]).unwrap();
        match args.command {
            Commands::Call(CallArgs { method, args, .. }) => {
                assert_eq!(method, "PingHandler.Ping");
                assert_eq!(args, "{\"data\":\"PING\"}");
            }
            _ => panic!("Expected Call command"),
        }
    }

    #[test]
    fn test_cli_parse_call_default_args() {
        let args: Cli = Cli::from_args(&["micronet"], &["call", "tcp://127.0.0.1:1234", "A.B"]).unwrap();
        match args.command {
            Commands::Call(CallArgs { args, .. }) => assert_eq!(args, "null"),
            _ => panic!("Expected Call command"),
        }
    }

    #[test]
    fn test_cli_rejects_malformed_address() {
        assert!(Cli::from_args(&["micronet"], &["ping", "127.0.0.1:1234"]).is_err());
        assert!(Cli::from_args(&["micronet"], &["publisher", "-l", "tcp://127.0.0.1"]).is_err());
    }

    #[test]
    fn test_cli_requires_publisher_for_subscriber() {
        assert!(Cli::from_args(&["micronet"], &["subscriber", "-l", "tcp://127.0.0.1:1"]).is_err());
    }
}
