use std::net::SocketAddr;
use std::sync::Arc;

use dashmap::DashMap;
use relay_topics::TopicRegistry;
use tracing::debug;
use uuid::Uuid;

/// State shared by every connection of one broker.
#[derive(Clone, Debug)]
pub struct BrokerContext {
    registry: TopicRegistry,
    clients: Arc<DashMap<Uuid, SocketAddr>>,
}

impl BrokerContext {
    /// Creates a context around an existing registry.
    #[must_use]
    pub fn new(registry: TopicRegistry) -> Self {
        Self {
            registry,
            clients: Arc::new(DashMap::new()),
        }
    }

    /// The topic registry.
    #[must_use]
    pub const fn registry(&self) -> &TopicRegistry {
        &self.registry
    }

    /// Number of currently connected clients.
    #[must_use]
    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Snapshot of connected clients and their peer addresses.
    #[must_use]
    pub fn clients(&self) -> Vec<(Uuid, SocketAddr)> {
        self.clients
            .iter()
            .map(|entry| (*entry.key(), *entry.value()))
            .collect()
    }

    /// Records a client until the returned guard is dropped.
    pub(crate) fn register_client(&self, id: Uuid, peer: SocketAddr) -> ClientGuard {
        self.clients.insert(id, peer);

        ClientGuard {
            id,
            clients: Arc::clone(&self.clients),
        }
    }

    /// Forgets every client and topic.
    pub fn reset(&self) {
        self.clients.clear();
        self.registry.clear();
    }
}

/// Removes a client from its context when dropped.
#[derive(Debug)]
pub(crate) struct ClientGuard {
    id: Uuid,
    clients: Arc<DashMap<Uuid, SocketAddr>>,
}

impl Drop for ClientGuard {
    fn drop(&mut self) {
        if self.clients.remove(&self.id).is_some() {
            debug!(client = %self.id, "client released");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_releases_client() {
        let context = BrokerContext::new(TopicRegistry::default());
        let peer = SocketAddr::from(([127, 0, 0, 1], 4000));

        let first = context.register_client(Uuid::new_v4(), peer);
        let second = context.register_client(Uuid::new_v4(), peer);
        assert_eq!(context.client_count(), 2);

        drop(first);
        assert_eq!(context.client_count(), 1);

        drop(second);
        assert_eq!(context.client_count(), 0);
    }

    #[tokio::test]
    async fn test_reset_clears_everything() {
        let context = BrokerContext::new(TopicRegistry::default());
        let _guard = context.register_client(Uuid::new_v4(), SocketAddr::from(([127, 0, 0, 1], 4000)));
        context
            .registry()
            .publish(relay_wire::Message::write("orders", "order-42").unwrap())
            .await
            .unwrap();

        context.reset();

        assert_eq!(context.client_count(), 0);
        assert!(context.registry().is_empty());
    }
}
