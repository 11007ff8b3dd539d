//! Prometheus metrics for broker operations

use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, HistogramVec,
};

/// Broker metrics
pub struct BrokerMetrics {
    /// Messages published counter
    pub messages_published: CounterVec,

    /// Messages consumed counter
    pub messages_consumed: CounterVec,

    /// Handler retry attempts beyond the first
    pub handler_retries: CounterVec,

    /// Messages diverted to a dead-letter topic
    pub dead_letters: CounterVec,

    /// Messages dropped (malformed, or exhausted with DLQ disabled)
    pub messages_dropped: CounterVec,

    /// Message publish latency
    pub publish_latency: HistogramVec,
}

lazy_static! {
    pub static ref BROKER_METRICS: BrokerMetrics = BrokerMetrics {
        messages_published: register_counter_vec!(
            "broker_messages_published_total",
            "Total number of messages published",
            &["topic"]
        )
        .unwrap(),

        messages_consumed: register_counter_vec!(
            "broker_messages_consumed_total",
            "Total number of messages consumed",
            &["topic"]
        )
        .unwrap(),

        handler_retries: register_counter_vec!(
            "broker_handler_retries_total",
            "Handler attempts beyond the first, per topic",
            &["topic"]
        )
        .unwrap(),

        dead_letters: register_counter_vec!(
            "broker_dead_letters_total",
            "Messages published to a dead-letter topic",
            &["topic"]
        )
        .unwrap(),

        messages_dropped: register_counter_vec!(
            "broker_messages_dropped_total",
            "Messages dropped without processing",
            &["topic", "reason"]
        )
        .unwrap(),

        publish_latency: register_histogram_vec!(
            "broker_publish_latency_seconds",
            "Publish latency in seconds",
            &["topic"]
        )
        .unwrap(),
    };
}
