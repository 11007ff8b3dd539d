//! Canonical event envelope and dead-letter record

use chrono::{DateTime, TimeZone, Utc};
use rdkafka::message::{Headers, Message};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::error::BrokerError;

/// Canonical envelope every consumed message is decoded into before
/// handlers see it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Topic the message was consumed from
    pub topic: String,

    /// Partition within the topic
    pub partition: i32,

    /// Offset within the partition
    pub offset: i64,

    /// Optional message key
    pub key: Option<String>,

    /// Structured payload
    pub value: serde_json::Value,

    /// Message headers
    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// Broker delivery timestamp (falls back to receive time)
    pub timestamp: DateTime<Utc>,
}

impl EventEnvelope {
    /// Decode a raw broker message. A missing or non-JSON payload is a
    /// malformed message; the caller logs and drops it.
    pub fn decode<M: Message>(message: &M) -> Result<Self, BrokerError> {
        let topic = message.topic().to_string();
        let partition = message.partition();
        let offset = message.offset();

        let payload = message
            .payload()
            .ok_or_else(|| BrokerError::MalformedMessage {
                topic: topic.clone(),
                partition,
                offset,
                reason: "empty payload".to_string(),
            })?;

        let value: serde_json::Value =
            serde_json::from_slice(payload).map_err(|e| BrokerError::MalformedMessage {
                topic: topic.clone(),
                partition,
                offset,
                reason: e.to_string(),
            })?;

        let key = message
            .key()
            .map(|k| String::from_utf8_lossy(k).into_owned());

        let mut headers = HashMap::new();
        if let Some(raw) = message.headers() {
            for header in raw.iter() {
                if let Some(value) = header.value {
                    headers.insert(
                        header.key.to_string(),
                        String::from_utf8_lossy(value).into_owned(),
                    );
                }
            }
        }

        let timestamp = message
            .timestamp()
            .to_millis()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
            .unwrap_or_else(Utc::now);

        Ok(Self {
            topic,
            partition,
            offset,
            key,
            value,
            headers,
            timestamp,
        })
    }
}

/// Append-only record published to `<topic>.dlq` when every retry attempt
/// for a message has been exhausted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetterRecord {
    /// Topic the message originally arrived on
    pub original_topic: String,

    /// Original partition
    pub partition: i32,

    /// Original offset
    pub offset: i64,

    /// Original message key
    pub key: Option<String>,

    /// Original payload
    pub value: serde_json::Value,

    /// Last handler error before giving up
    pub error: String,

    /// When retries were exhausted
    pub failed_at: DateTime<Utc>,
}

impl DeadLetterRecord {
    pub fn from_envelope(envelope: &EventEnvelope, error: String) -> Self {
        Self {
            original_topic: envelope.topic.clone(),
            partition: envelope.partition,
            offset: envelope.offset,
            key: envelope.key.clone(),
            value: envelope.value.clone(),
            error,
            failed_at: Utc::now(),
        }
    }
}
