use std::sync::Arc;
use std::time::Duration;

use relay_wire::Message;
use tokio::time::timeout;
use tracing::trace;

use crate::error::{Error, Result};

/// A bounded multi-producer, multi-consumer FIFO queue for one topic.
///
/// Clones share the same underlying channel. Each message is received by
/// exactly one caller.
#[derive(Clone, Debug)]
pub struct TopicQueue {
    name: Arc<str>,
    capacity: usize,
    sender: flume::Sender<Message>,
    receiver: flume::Receiver<Message>,
}

impl TopicQueue {
    /// Creates an empty queue holding at most `capacity` messages.
    ///
    /// A capacity of zero is raised to one so that publishing never needs a
    /// poller to be waiting at the same moment.
    #[must_use]
    pub fn new(name: &str, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, receiver) = flume::bounded(capacity);

        Self {
            name: Arc::from(name),
            capacity,
            sender,
            receiver,
        }
    }

    /// The topic this queue belongs to.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Maximum number of messages held at once.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of messages currently waiting to be polled.
    #[must_use]
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    /// Returns `true` if no message is waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    /// Appends a message, waiting for room if the queue is full.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Closed`] if every receiver has been dropped, which
    /// cannot happen while this queue is alive.
    pub async fn publish(&self, message: Message) -> Result<()> {
        self.sender
            .send_async(message)
            .await
            .map_err(|_| Error::Closed(self.name.to_string()))?;

        trace!(topic = %self.name, depth = self.len(), "enqueued message");

        Ok(())
    }

    /// Appends a message without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Full`] if the queue is at capacity.
    pub fn try_publish(&self, message: Message) -> Result<()> {
        self.sender.try_send(message).map_err(|e| match e {
            flume::TrySendError::Full(_) => Error::Full(self.name.to_string()),
            flume::TrySendError::Disconnected(_) => Error::Closed(self.name.to_string()),
        })
    }

    /// Removes the next message, waiting up to `wait` for one to arrive.
    ///
    /// Returns `None` when the wait elapses. A timed-out wait is dropped and
    /// leaves no waiter registered on the queue.
    pub async fn receive(&self, wait: Duration) -> Option<Message> {
        match timeout(wait, self.receiver.recv_async()).await {
            Ok(Ok(message)) => Some(message),
            Ok(Err(flume::RecvError::Disconnected)) | Err(_) => None,
        }
    }

    /// Removes the next message if one is already waiting.
    #[must_use]
    pub fn try_receive(&self) -> Option<Message> {
        self.receiver.try_recv().ok()
    }
}
