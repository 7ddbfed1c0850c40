//! TCP message broker serving the relay line protocol.
//!
//! A [`BrokerServer`] accepts connections and runs one handler per
//! connection. Handlers decode `WRITE`/`POLL` requests and dispatch them
//! against a shared [`BrokerContext`], which holds the topic registry and
//! the set of connected clients.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::redundant_pub_crate)]

mod config;
mod connection;
mod context;
mod error;
mod server;

pub use config::{BrokerConfig, DEFAULT_POLL_TIMEOUT, DEFAULT_PORT};
pub use context::BrokerContext;
pub use error::{Error, Result};
pub use server::BrokerServer;

pub use relay_topics::{PollOutcome, TopicQueue, TopicRegistry};
pub use relay_wire::{Intent, Message, Response};
