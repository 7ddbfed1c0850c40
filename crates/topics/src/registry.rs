use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use relay_wire::Message;
use tracing::{debug, info};

use crate::error::Result;
use crate::queue::TopicQueue;

/// Default number of messages a topic holds before publishers wait.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Result of a single long-poll.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PollOutcome {
    /// A message arrived within the timeout and was removed from the topic.
    Delivered(Message),

    /// The timeout elapsed with nothing to deliver.
    TimedOut,

    /// Nothing has ever been published to the topic.
    TopicDoesNotExist,
}

/// Maps topic names to their queues.
///
/// Clones share the same map. Creation of a topic is atomic: when several
/// publishers race on a new name, exactly one queue is installed and all of
/// them use it.
#[derive(Clone, Debug)]
pub struct TopicRegistry {
    topics: Arc<DashMap<String, TopicQueue>>,
    queue_capacity: usize,
}

impl Default for TopicRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}

impl TopicRegistry {
    /// Creates an empty registry whose topics hold `queue_capacity` messages.
    #[must_use]
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            topics: Arc::new(DashMap::new()),
            queue_capacity,
        }
    }

    /// Looks up a topic without creating it.
    #[must_use]
    pub fn get(&self, topic: &str) -> Option<TopicQueue> {
        self.topics.get(topic).map(|entry| entry.value().clone())
    }

    /// Returns the topic's queue, creating it if this is the first use.
    #[must_use]
    pub fn get_or_create(&self, topic: &str) -> TopicQueue {
        if let Some(queue) = self.get(topic) {
            return queue;
        }

        self.topics
            .entry(topic.to_string())
            .or_insert_with(|| {
                info!(topic, capacity = self.queue_capacity, "creating topic");
                TopicQueue::new(topic, self.queue_capacity)
            })
            .value()
            .clone()
    }

    /// Publishes a message to its topic, creating the topic if needed.
    ///
    /// Waits while the topic's queue is full.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue has been closed.
    pub async fn publish(&self, message: Message) -> Result<()> {
        let queue = self.get_or_create(message.topic());
        queue.publish(message).await
    }

    /// Waits up to `wait` for the next message on `topic`.
    ///
    /// Unknown topics are answered immediately rather than waited on, since
    /// no publisher has ever written to them.
    pub async fn poll(&self, topic: &str, wait: Duration) -> PollOutcome {
        let Some(queue) = self.get(topic) else {
            debug!(topic, "poll on unknown topic");
            return PollOutcome::TopicDoesNotExist;
        };

        match queue.receive(wait).await {
            Some(message) => PollOutcome::Delivered(message),
            None => PollOutcome::TimedOut,
        }
    }

    /// Snapshot of the current topic names.
    #[must_use]
    pub fn topic_names(&self) -> BTreeSet<String> {
        self.topics.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Number of topics.
    #[must_use]
    pub fn len(&self) -> usize {
        self.topics.len()
    }

    /// Returns `true` if no topic exists.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    /// Drops every topic.
    ///
    /// Pollers already waiting on a dropped queue keep their handle and run
    /// out their timeout.
    pub fn clear(&self) {
        self.topics.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn write(topic: &str, payload: &str) -> Message {
        Message::write(topic, payload).unwrap()
    }

    #[tokio::test]
    async fn test_publish_creates_topic() {
        let registry = TopicRegistry::default();
        assert!(registry.get("orders").is_none());

        registry.publish(write("orders", "order-42")).await.unwrap();

        assert_eq!(
            registry.topic_names(),
            BTreeSet::from(["orders".to_string()])
        );
        assert_eq!(registry.get("orders").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_poll_unknown_topic_is_immediate() {
        let registry = TopicRegistry::default();

        let outcome = tokio::time::timeout(
            Duration::from_millis(100),
            registry.poll("missing", Duration::from_secs(60)),
        )
        .await
        .unwrap();

        assert_eq!(outcome, PollOutcome::TopicDoesNotExist);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_polls_return_publish_order() {
        let registry = TopicRegistry::default();
        let payloads: Vec<String> = (0..20).map(|i| format!("m{i}")).collect();

        for payload in &payloads {
            registry.publish(write("t", payload)).await.unwrap();
        }

        for payload in &payloads {
            match registry.poll("t", Duration::from_millis(10)).await {
                PollOutcome::Delivered(message) => assert_eq!(message.payload(), payload),
                other => panic!("unexpected outcome: {other:?}"),
            }
        }

        assert_eq!(
            registry.poll("t", Duration::from_millis(10)).await,
            PollOutcome::TimedOut
        );
    }

    #[tokio::test]
    async fn test_poll_times_out_after_wait() {
        let registry = TopicRegistry::default();
        let _ = registry.get_or_create("empty");

        let start = std::time::Instant::now();
        let outcome = registry.poll("empty", Duration::from_millis(200)).await;
        let elapsed = start.elapsed();

        assert_eq!(outcome, PollOutcome::TimedOut);
        assert!(elapsed >= Duration::from_millis(200));
        assert!(elapsed < Duration::from_millis(1000));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_racing_creators_share_one_queue() {
        let registry = TopicRegistry::default();

        let handles: Vec<_> = (0..64)
            .map(|i| {
                let registry = registry.clone();
                tokio::spawn(async move {
                    registry.publish(write("race", &format!("m{i}"))).await.unwrap();
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("race").unwrap().len(), 64);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_pollers_never_share_a_message() {
        let registry = TopicRegistry::default();

        for i in 0..200 {
            registry.publish(write("shared", &format!("m{i}"))).await.unwrap();
        }

        let pollers: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                tokio::spawn(async move {
                    let mut received = Vec::new();
                    while let PollOutcome::Delivered(message) =
                        registry.poll("shared", Duration::from_millis(50)).await
                    {
                        received.push(message.into_payload());
                    }
                    received
                })
            })
            .collect();

        let mut all = Vec::new();
        for poller in futures::future::join_all(pollers).await {
            all.extend(poller.unwrap());
        }

        let unique: HashSet<_> = all.iter().cloned().collect();
        assert_eq!(all.len(), 200);
        assert_eq!(unique.len(), 200);
    }

    #[tokio::test]
    async fn test_clear_removes_topics() {
        let registry = TopicRegistry::default();
        registry.publish(write("a", "1")).await.unwrap();
        registry.publish(write("b", "2")).await.unwrap();
        assert_eq!(registry.len(), 2);

        registry.clear();

        assert!(registry.is_empty());
        assert_eq!(
            registry.poll("a", Duration::from_millis(10)).await,
            PollOutcome::TopicDoesNotExist
        );
    }
}
