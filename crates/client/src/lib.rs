//! Async client for the relay broker.
//!
//! ```no_run
//! use relay_client::{BrokerClient, PollResult};
//!
//! async fn example() -> Result<(), relay_client::Error> {
//!     let mut client = BrokerClient::connect("127.0.0.1:9090").await?;
//!
//!     client.write("orders", "order-42").await?;
//!
//!     if let PollResult::Message(payload) = client.poll("orders").await? {
//!         println!("got {payload}");
//!     }
//!
//!     Ok(())
//! }
//! ```
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;

pub use error::{Error, Result};

use futures::{SinkExt, StreamExt};
use relay_wire::{ClientCodec, Message, Response};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio_util::codec::Framed;
use tracing::debug;

/// What a poll returned.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PollResult {
    /// The next message on the topic.
    Message(String),

    /// The broker's poll timeout elapsed with nothing to deliver.
    NoMessages,

    /// Nothing has ever been written to the topic.
    TopicDoesNotExist,
}

/// A single connection to a broker.
///
/// `write` is fire-and-forget: the broker sends no acknowledgement. `poll`
/// waits for the next response line, so one client should only have one
/// poll outstanding at a time.
#[derive(Debug)]
pub struct BrokerClient {
    framed: Framed<TcpStream, ClientCodec>,
}

impl BrokerClient {
    /// Connects to a broker.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        debug!("connected to broker at {}", stream.peer_addr()?);

        Ok(Self {
            framed: Framed::new(stream, ClientCodec::new()),
        })
    }

    /// Publishes `payload` to `topic`, creating the topic if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the topic is empty or the connection fails.
    pub async fn write(&mut self, topic: &str, payload: &str) -> Result<()> {
        let message = Message::write(topic, payload)?;
        self.framed.send(message).await?;
        Ok(())
    }

    /// Long-polls `topic` for its next message.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Rejected`] if the broker answered with `ERR`, or an
    /// error if the connection fails or closes first.
    pub async fn poll(&mut self, topic: &str) -> Result<PollResult> {
        let message = Message::poll(topic)?;
        self.framed.send(message).await?;

        match self.framed.next().await {
            Some(Ok(Response::Delivered(payload))) => Ok(PollResult::Message(payload)),
            Some(Ok(Response::NoMessages)) => Ok(PollResult::NoMessages),
            Some(Ok(Response::TopicDoesNotExist)) => Ok(PollResult::TopicDoesNotExist),
            Some(Ok(Response::Error(reason))) => Err(Error::Rejected(reason)),
            Some(Err(e)) => Err(e.into()),
            None => Err(Error::ConnectionClosed),
        }
    }

    /// Flushes pending writes and closes the connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the final flush fails.
    pub async fn close(mut self) -> Result<()> {
        self.framed.close().await?;
        Ok(())
    }
}
