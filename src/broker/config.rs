//! Broker configuration

use serde::{Deserialize, Serialize};

use super::retry::RetryBackoff;

/// Kafka connection configuration shared by producers and consumers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Kafka bootstrap servers
    pub bootstrap_servers: String,

    /// Client ID
    pub client_id: String,

    /// Consumer group ID
    pub group_id: String,

    /// Session timeout in milliseconds
    pub session_timeout_ms: u64,

    /// Enable SASL authentication
    pub enable_sasl: bool,

    /// SASL mechanism (PLAIN, SCRAM-SHA-256, SCRAM-SHA-512)
    pub sasl_mechanism: Option<String>,

    /// SASL username
    pub sasl_username: Option<String>,

    /// SASL password
    pub sasl_password: Option<String>,

    /// Compression type (none, gzip, snappy, lz4, zstd)
    pub compression_type: String,

    /// Message timeout in milliseconds
    pub message_timeout_ms: u64,

    /// Default topic prefix
    pub topic_prefix: String,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            bootstrap_servers: "localhost:9092".to_string(),
            client_id: "fleet-telemetry-backbone".to_string(),
            group_id: "fleet-backbone-group".to_string(),
            session_timeout_ms: 30000,
            enable_sasl: false,
            sasl_mechanism: None,
            sasl_username: None,
            sasl_password: None,
            compression_type: "snappy".to_string(),
            message_timeout_ms: 30000,
            topic_prefix: "fleet".to_string(),
        }
    }
}

impl BrokerConfig {
    /// Get full topic name with prefix
    pub fn full_topic(&self, topic: &str) -> String {
        format!("{}.{}", self.topic_prefix, topic)
    }
}

/// Reliable subscriber configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriberConfig {
    /// Maximum handler attempts per message
    pub max_retries: u32,

    /// Publish exhausted messages to `<topic>.dlq` instead of dropping them
    pub dead_letter_enabled: bool,

    /// Delay between handler attempts
    #[serde(default)]
    pub backoff: RetryBackoff,

    /// Per-partition worker channel capacity
    pub partition_queue_capacity: usize,
}

impl Default for SubscriberConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            dead_letter_enabled: true,
            backoff: RetryBackoff::None,
            partition_queue_capacity: 256,
        }
    }
}

/// Dead-letter topic naming: `<originalTopic>.dlq`
pub fn dead_letter_topic(topic: &str) -> String {
    format!("{}.dlq", topic)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broker_config_defaults() {
        let config = BrokerConfig::default();
        assert_eq!(config.bootstrap_servers, "localhost:9092");
        assert_eq!(config.client_id, "fleet-telemetry-backbone");
        assert_eq!(config.compression_type, "snappy");
    }

    #[test]
    fn test_topic_prefix() {
        let config = BrokerConfig {
            topic_prefix: "prod".to_string(),
            ..Default::default()
        };
        assert_eq!(config.full_topic("telemetry"), "prod.telemetry");
        assert_eq!(config.full_topic("issues"), "prod.issues");
    }

    #[test]
    fn test_subscriber_defaults() {
        let config = SubscriberConfig::default();
        assert_eq!(config.max_retries, 3);
        assert!(config.dead_letter_enabled);
        assert_eq!(config.backoff, RetryBackoff::None);
    }

    #[test]
    fn test_dead_letter_topic_naming() {
        assert_eq!(dead_letter_topic("fleet.telemetry"), "fleet.telemetry.dlq");
    }
}
