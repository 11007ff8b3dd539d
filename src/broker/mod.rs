//! Broker primitives and reliable consumption.
//!
//! Producers publish keyed domain events to named topics. The
//! [`ReliableSubscriber`] wraps raw delivery with per-message bounded retry
//! and republishes exhausted messages to a companion `<topic>.dlq` topic.
//! Delivery is at-least-once: a crash mid-retry causes redelivery.

mod config;
mod envelope;
mod error;
mod metrics;
mod producer;
mod retry;
mod subscriber;

pub use config::{dead_letter_topic, BrokerConfig, SubscriberConfig};
pub use envelope::{DeadLetterRecord, EventEnvelope};
pub use error::{BrokerError, BrokerResult};
pub use metrics::BROKER_METRICS;
pub use producer::{DeliveryMetadata, EventProducer};
pub use retry::RetryBackoff;
pub use subscriber::{
    DeadLetterSink, EventHandler, FnHandler, ProcessOutcome, ReliableSubscriber, RetryRunner,
};
