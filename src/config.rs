use serde::{Deserialize, Serialize};

use crate::broker::{BrokerConfig, SubscriberConfig};
use crate::stream::StreamingConfig;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server configuration
    pub server: ServerConfig,

    /// Broker connection configuration
    #[serde(default)]
    pub broker: BrokerConfig,

    /// Reliable subscriber configuration
    #[serde(default)]
    pub subscriber: SubscriberConfig,

    /// Live streaming configuration
    #[serde(default)]
    pub streaming: StreamingConfig,

    /// Consumed topic names (unprefixed)
    #[serde(default)]
    pub topics: TopicsConfig,

    /// Observability configuration
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from embedded defaults, an optional file, and
    /// environment variables (prefix: FLEET_TB_)
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_path =
            std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config/default.toml".to_string());

        config::Config::builder()
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            .add_source(config::File::with_name(&config_path).required(false))
            .add_source(
                config::Environment::with_prefix("FLEET_TB")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_http_port")]
    pub http_port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicsConfig {
    /// Issue-report ingest topic
    #[serde(default = "default_issue_reports_topic")]
    pub issue_reports: String,

    /// Transition-command ingest topic
    #[serde(default = "default_issue_transitions_topic")]
    pub issue_transitions: String,
}

impl Default for TopicsConfig {
    fn default() -> Self {
        Self {
            issue_reports: default_issue_reports_topic(),
            issue_transitions: default_issue_transitions_topic(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Expose prometheus metrics at /metrics
    #[serde(default = "default_true")]
    pub prometheus_enabled: bool,

    /// Emit logs as JSON
    #[serde(default)]
    pub log_json: bool,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    8080
}

fn default_issue_reports_topic() -> String {
    "issue-reports".to_string()
}

fn default_issue_transitions_topic() -> String {
    "issue-transitions".to_string()
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_defaults_parse() {
        let config: Config = config::Config::builder()
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.server.http_port, 8080);
        assert_eq!(config.broker.bootstrap_servers, "localhost:9092");
        assert_eq!(config.subscriber.max_retries, 3);
        assert!(config.subscriber.dead_letter_enabled);
        assert_eq!(config.streaming.key_field, "vin");
        assert_eq!(config.topics.issue_reports, "issue-reports");
        assert_eq!(config.topics.issue_transitions, "issue-transitions");
    }
}
