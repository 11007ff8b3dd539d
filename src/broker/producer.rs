//! Kafka event producer

use rdkafka::config::ClientConfig;
use rdkafka::message::OwnedHeaders;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::config::BrokerConfig;
use super::error::{BrokerError, BrokerResult};
use super::metrics::BROKER_METRICS;

/// Broker coordinates assigned to a published message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryMetadata {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
}

/// Kafka producer for keyed domain events.
///
/// Duplicate suppression is connection-level only (idempotent producer);
/// there is no application-level idempotency.
pub struct EventProducer {
    producer: Arc<FutureProducer>,
    config: BrokerConfig,
}

impl EventProducer {
    /// Connect a new producer. A creation failure is fatal to the caller.
    pub fn connect(config: BrokerConfig) -> BrokerResult<Self> {
        let mut client_config = ClientConfig::new();
        client_config
            .set("bootstrap.servers", &config.bootstrap_servers)
            .set("client.id", &config.client_id)
            .set("compression.type", &config.compression_type)
            .set("message.timeout.ms", config.message_timeout_ms.to_string())
            .set("enable.idempotence", "true");

        if config.enable_sasl {
            if let (Some(mechanism), Some(username), Some(password)) = (
                &config.sasl_mechanism,
                &config.sasl_username,
                &config.sasl_password,
            ) {
                client_config
                    .set("security.protocol", "SASL_SSL")
                    .set("sasl.mechanism", mechanism)
                    .set("sasl.username", username)
                    .set("sasl.password", password);
            }
        }

        let producer: FutureProducer = client_config.create().map_err(|e| {
            BrokerError::ConnectionFailed(format!("Kafka producer creation failed: {}", e))
        })?;

        Ok(Self {
            producer: Arc::new(producer),
            config,
        })
    }

    /// Publish a keyed message to a topic, returning its delivery coordinates
    pub async fn send<T: Serialize + Send + Sync>(
        &self,
        topic: &str,
        key: Option<&str>,
        value: &T,
        headers: Option<&HashMap<String, String>>,
    ) -> BrokerResult<DeliveryMetadata> {
        let payload = serde_json::to_string(value)?;
        self.send_serialized(topic, key, &payload, headers).await
    }

    /// Publish an already-serialized payload
    pub async fn send_serialized(
        &self,
        topic: &str,
        key: Option<&str>,
        payload: &str,
        headers: Option<&HashMap<String, String>>,
    ) -> BrokerResult<DeliveryMetadata> {
        let start = Instant::now();

        let mut record: FutureRecord<'_, str, str> = FutureRecord::to(topic).payload(payload);
        if let Some(key) = key {
            record = record.key(key);
        }
        if let Some(headers) = headers {
            let mut owned = OwnedHeaders::new();
            for (name, value) in headers {
                owned = owned.insert(rdkafka::message::Header {
                    key: name,
                    value: Some(value.as_str()),
                });
            }
            record = record.headers(owned);
        }

        let (partition, offset) = self
            .producer
            .send(record, Duration::from_secs(0))
            .await
            .map_err(|(e, _)| BrokerError::PublishFailed(format!("Kafka publish failed: {}", e)))?;

        BROKER_METRICS
            .messages_published
            .with_label_values(&[topic])
            .inc();
        BROKER_METRICS
            .publish_latency
            .with_label_values(&[topic])
            .observe(start.elapsed().as_secs_f64());

        Ok(DeliveryMetadata {
            topic: topic.to_string(),
            partition,
            offset,
        })
    }

    /// Broker configuration this producer was created with
    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    /// Flush outstanding deliveries before shutdown; best-effort
    pub fn close(&self, timeout: Duration) {
        if let Err(e) = self.producer.flush(timeout) {
            tracing::warn!(error = %e, "Producer flush failed during shutdown");
        }
    }
}
