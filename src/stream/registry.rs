//! Process-local registry of live stream clients.
//!
//! Registrations exist only for the lifetime of a connection and are never
//! persisted. The registry is owned by the bridge instance and mutated only
//! through its API.

use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::metrics::STREAM_METRICS;

/// One registered live client: an output sink plus an optional allow-list
/// of subscription keys.
struct StreamClient {
    sender: mpsc::Sender<Arc<str>>,
    filter: Option<HashSet<String>>,
}

/// Concurrency-safe client registry; reads during every broadcast, mutations
/// on every connect/disconnect.
pub struct ClientRegistry {
    clients: DashMap<Uuid, StreamClient>,
    buffer: usize,
}

impl ClientRegistry {
    pub fn new(buffer: usize) -> Self {
        Self {
            clients: DashMap::new(),
            buffer: buffer.max(1),
        }
    }

    /// Register a client, returning its id and the receiving end of its sink
    pub fn register(&self, filter: Option<HashSet<String>>) -> (Uuid, mpsc::Receiver<Arc<str>>) {
        let (tx, rx) = mpsc::channel(self.buffer);
        let id = Uuid::new_v4();
        self.clients.insert(
            id,
            StreamClient {
                sender: tx,
                filter,
            },
        );
        STREAM_METRICS.connected_clients.inc();
        tracing::info!(client_id = %id, clients = self.clients.len(), "Stream client registered");
        (id, rx)
    }

    /// Remove a client on transport disconnect
    pub fn remove(&self, id: &Uuid) {
        if self.clients.remove(id).is_some() {
            STREAM_METRICS.connected_clients.dec();
            tracing::info!(client_id = %id, clients = self.clients.len(), "Stream client removed");
        }
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Deliver a once-serialized payload to every client whose filter is
    /// null or contains `key`. One slow or broken client never blocks
    /// delivery to the others.
    pub fn broadcast(&self, topic: &str, key: &str, payload: Arc<str>) -> usize {
        let mut delivered = 0;

        for entry in self.clients.iter() {
            let client = entry.value();

            if let Some(filter) = &client.filter {
                if !filter.contains(key) {
                    STREAM_METRICS
                        .frames_filtered
                        .with_label_values(&[topic])
                        .inc();
                    continue;
                }
            }

            match client.sender.try_send(Arc::clone(&payload)) {
                Ok(()) => {
                    delivered += 1;
                    STREAM_METRICS
                        .frames_delivered
                        .with_label_values(&[topic])
                        .inc();
                }
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::warn!(client_id = %entry.key(), "Client sink full; frame dropped");
                    STREAM_METRICS
                        .frames_dropped
                        .with_label_values(&[topic, "full"])
                        .inc();
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    // Disconnect cleanup races the broadcast; skip quietly
                    STREAM_METRICS
                        .frames_dropped
                        .with_label_values(&[topic, "closed"])
                        .inc();
                }
            }
        }

        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(keys: &[&str]) -> Option<HashSet<String>> {
        Some(keys.iter().map(|k| k.to_string()).collect())
    }

    #[tokio::test]
    async fn test_filtered_client_never_sees_other_keys() {
        let registry = ClientRegistry::new(8);
        let (_id, mut rx) = registry.register(filter(&["VIN1"]));

        registry.broadcast("t", "VIN2", Arc::from("{\"vin\":\"VIN2\"}"));
        registry.broadcast("t", "VIN1", Arc::from("{\"vin\":\"VIN1\"}"));

        let frame = rx.recv().await.unwrap();
        assert!(frame.contains("VIN1"));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_null_filter_receives_everything() {
        let registry = ClientRegistry::new(8);
        let (_id, mut rx) = registry.register(None);

        registry.broadcast("t", "VIN1", Arc::from("a"));
        registry.broadcast("t", "VIN2", Arc::from("b"));

        assert_eq!(&*rx.recv().await.unwrap(), "a");
        assert_eq!(&*rx.recv().await.unwrap(), "b");
    }

    #[tokio::test]
    async fn test_removed_client_gets_no_deliveries() {
        let registry = ClientRegistry::new(8);
        let (id, mut rx) = registry.register(None);
        registry.remove(&id);

        let delivered = registry.broadcast("t", "VIN1", Arc::from("x"));
        assert_eq!(delivered, 0);
        assert!(registry.is_empty());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_full_sink_does_not_block_others() {
        let registry = ClientRegistry::new(1);
        let (_slow, _slow_rx) = registry.register(None);
        let (_fast, mut fast_rx) = registry.register(None);

        // Saturate the slow client's single-slot buffer, then keep going
        registry.broadcast("t", "VIN1", Arc::from("1"));
        registry.broadcast("t", "VIN1", Arc::from("2"));

        assert_eq!(&*fast_rx.recv().await.unwrap(), "1");
        assert_eq!(&*fast_rx.recv().await.unwrap(), "2");
    }
}
