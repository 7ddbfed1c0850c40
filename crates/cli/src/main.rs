//! CLI binary to run the relay broker and talk to it.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::redundant_pub_crate)]

use std::net::SocketAddr;
use std::time::Duration;

use clap::{Parser, Subcommand};
use relay_broker::{BrokerConfig, BrokerServer};
use relay_client::{BrokerClient, PollResult};
use tokio_util::sync::CancellationToken;
use tracing::{Level, info, warn};
use tracing_subscriber::EnvFilter;

/// CLI-specific error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Broker error
    #[error(transparent)]
    Broker(#[from] relay_broker::Error),

    /// Client error
    #[error(transparent)]
    Client(#[from] relay_client::Error),
}

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the broker
    Serve(ServeArgs),

    /// Publish a message to a topic
    Write {
        /// Broker address
        #[arg(long, default_value = "127.0.0.1:9090", env = "RELAY_ADDR")]
        addr: String,

        /// Topic to publish to
        topic: String,

        /// Message body
        payload: String,
    },

    /// Poll a topic once and print the result
    Poll {
        /// Broker address
        #[arg(long, default_value = "127.0.0.1:9090", env = "RELAY_ADDR")]
        addr: String,

        /// Topic to poll
        topic: String,
    },
}

#[derive(Debug, clap::Args)]
struct ServeArgs {
    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0:9090", env = "RELAY_LISTEN_ADDR")]
    listen_addr: SocketAddr,

    /// Long-poll wait in milliseconds
    #[arg(long, default_value_t = 2000, env = "RELAY_POLL_TIMEOUT_MS")]
    poll_timeout_ms: u64,

    /// Messages held per topic before publishers wait
    #[arg(long, default_value_t = 1024, env = "RELAY_QUEUE_CAPACITY")]
    queue_capacity: usize,

    /// Maximum concurrent connections
    #[arg(long, default_value_t = 1024, env = "RELAY_MAX_CONNECTIONS")]
    max_connections: usize,

    /// Maximum request line length in bytes
    #[arg(long, default_value_t = 65536, env = "RELAY_MAX_LINE_LENGTH")]
    max_line_length: usize,

    /// Maximum in-flight operations per connection
    #[arg(long, default_value_t = 256, env = "RELAY_MAX_IN_FLIGHT")]
    max_in_flight: usize,
}

impl From<ServeArgs> for BrokerConfig {
    fn from(args: ServeArgs) -> Self {
        Self {
            listen_addr: args.listen_addr,
            poll_timeout: Duration::from_millis(args.poll_timeout_ms),
            queue_capacity: args.queue_capacity,
            max_connections: args.max_connections,
            max_line_length: args.max_line_length,
            max_in_flight: args.max_in_flight,
        }
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => info!("Received SIGTERM"),
                    _ = sigint.recv() => info!("Received SIGINT"),
                }
                return;
            }
            (Err(e), _) | (_, Err(e)) => {
                warn!("failed to install signal handlers, falling back to ctrl-c: {}", e);
            }
        }
    }

    let _ = tokio::signal::ctrl_c().await;
    info!("Received interrupt signal");
}

async fn serve(args: ServeArgs) -> Result<(), Error> {
    let server = BrokerServer::new(args.into());
    server.start().await?;

    let shutdown_token = CancellationToken::new();

    let signal_shutdown_token = shutdown_token.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutting down");
        signal_shutdown_token.cancel();
    });

    tokio::select! {
        () = shutdown_token.cancelled() => {}
        () = server.wait() => {}
    }

    server.shutdown().await;

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let args = Args::parse();

    let level = if args.debug { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    match args.command {
        Command::Serve(serve_args) => serve(serve_args).await,
        Command::Write {
            addr,
            topic,
            payload,
        } => {
            let mut client = BrokerClient::connect(addr).await?;
            client.write(&topic, &payload).await?;
            client.close().await?;
            Ok(())
        }
        Command::Poll { addr, topic } => {
            let mut client = BrokerClient::connect(addr).await?;
            match client.poll(&topic).await? {
                PollResult::Message(payload) => println!("{payload}"),
                PollResult::NoMessages => println!("NO_MESSAGES"),
                PollResult::TopicDoesNotExist => println!("TOPIC_DOES_NOT_EXIST"),
            }
            Ok(())
        }
    }
}
