//! Fan-out bridge: one shared broker subscription replicated to every
//! registered live client.
//!
//! The shared subscription starts lazily on the first client connect, exactly
//! once even under concurrent first-connects, and is never torn down for the
//! process lifetime — an empty registry keeps consuming.

use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::OnceCell;
use uuid::Uuid;

use crate::broker::{BrokerConfig, BrokerError, BrokerResult, EventEnvelope};

use super::registry::ClientRegistry;

/// Live streaming configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamingConfig {
    /// Broadcast topic consumed by the bridge (unprefixed)
    pub topic: String,

    /// Payload field used as the subscription key (filter key)
    pub key_field: String,

    /// Keep-alive interval for client connections, in seconds
    pub keep_alive_secs: u64,

    /// Per-client sink capacity
    pub client_buffer: usize,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            topic: "telemetry".to_string(),
            key_field: "vin".to_string(),
            keep_alive_secs: 30,
            client_buffer: 64,
        }
    }
}

/// Bridge between the broadcast topic and the live client registry
pub struct FanOutBridge {
    registry: Arc<ClientRegistry>,
    broker: BrokerConfig,
    config: StreamingConfig,
    subscription: OnceCell<()>,
}

impl FanOutBridge {
    pub fn new(broker: BrokerConfig, config: StreamingConfig) -> Self {
        Self {
            registry: Arc::new(ClientRegistry::new(config.client_buffer)),
            broker,
            config,
            subscription: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &StreamingConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ClientRegistry> {
        &self.registry
    }

    /// Register a live client, starting the shared subscription if this is
    /// the first connect. Returns the client id and its frame receiver; the
    /// caller must call [`FanOutBridge::disconnect`] when the transport
    /// closes.
    pub async fn connect(
        &self,
        filter: Option<HashSet<String>>,
    ) -> BrokerResult<(Uuid, mpsc::Receiver<Arc<str>>)> {
        self.ensure_subscribed().await?;
        Ok(self.registry.register(filter))
    }

    /// Remove a client on transport disconnect
    pub fn disconnect(&self, client_id: &Uuid) {
        self.registry.remove(client_id);
    }

    /// Start the shared consumption task exactly once
    async fn ensure_subscribed(&self) -> BrokerResult<()> {
        self.subscription
            .get_or_try_init(|| async {
                let consumer = self.create_consumer()?;
                let registry = Arc::clone(&self.registry);
                let topic = self.broker.full_topic(&self.config.topic);
                let key_field = self.config.key_field.clone();

                tracing::info!(topic = %topic, "Starting shared fan-out subscription");
                tokio::spawn(consume_loop(consumer, registry, topic, key_field));
                Ok(())
            })
            .await
            .map(|_| ())
    }

    fn create_consumer(&self) -> BrokerResult<StreamConsumer> {
        // Unique group per process: every instance sees the full broadcast
        // topic instead of sharing partitions with its peers
        let group_id = format!("{}-stream-{}", self.broker.group_id, Uuid::new_v4());

        let mut client_config = ClientConfig::new();
        client_config
            .set("bootstrap.servers", &self.broker.bootstrap_servers)
            .set("group.id", &group_id)
            .set("client.id", &self.broker.client_id)
            .set("enable.auto.commit", "true")
            .set("auto.offset.reset", "latest")
            .set("session.timeout.ms", self.broker.session_timeout_ms.to_string());

        if self.broker.enable_sasl {
            if let (Some(mechanism), Some(username), Some(password)) = (
                &self.broker.sasl_mechanism,
                &self.broker.sasl_username,
                &self.broker.sasl_password,
            ) {
                client_config
                    .set("security.protocol", "SASL_SSL")
                    .set("sasl.mechanism", mechanism)
                    .set("sasl.username", username)
                    .set("sasl.password", password);
            }
        }

        client_config.create().map_err(|e| {
            BrokerError::ConnectionFailed(format!("Fan-out consumer creation failed: {}", e))
        })
    }
}

async fn consume_loop(
    consumer: StreamConsumer,
    registry: Arc<ClientRegistry>,
    topic: String,
    key_field: String,
) {
    if let Err(e) = consumer.subscribe(&[topic.as_str()]) {
        tracing::error!(topic = %topic, error = %e, "Fan-out subscribe failed");
        return;
    }

    loop {
        let message = match consumer.recv().await {
            Ok(m) => m,
            Err(e) => {
                tracing::error!(error = %e, "Fan-out receive failed");
                continue;
            }
        };

        let envelope = match EventEnvelope::decode(&message) {
            Ok(envelope) => envelope,
            Err(e) => {
                // Tolerate malformed upstream data; never surface it to clients
                tracing::debug!(error = %e, "Skipping undecodable broadcast message");
                continue;
            }
        };

        dispatch(&registry, &topic, &key_field, &envelope);
    }
}

/// Extract the subscription key and fan the frame out. Separated from the
/// consume loop so filtering semantics are testable without a broker.
fn dispatch(
    registry: &ClientRegistry,
    topic: &str,
    key_field: &str,
    envelope: &EventEnvelope,
) -> usize {
    let key = match envelope.value.get(key_field).and_then(|v| v.as_str()) {
        Some(key) => key.to_string(),
        None => {
            // Payloads without the filtering key are dropped silently
            tracing::debug!(topic = %topic, "Broadcast payload lacks key field; dropping");
            return 0;
        }
    };

    // Serialize once, deliver to every interested client
    let payload: Arc<str> = match serde_json::to_string(&envelope.value) {
        Ok(json) => Arc::from(json),
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize broadcast payload");
            return 0;
        }
    };

    registry.broadcast(topic, &key, payload)
}
