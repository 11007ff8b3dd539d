//! Error types for broker operations

use crate::error::AppError;

/// Result type for broker operations
pub type BrokerResult<T> = std::result::Result<T, BrokerError>;

/// Errors that can occur during broker operations
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    /// Connection failed; fatal at startup for the owning component
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Producer used before connecting
    #[error("Producer is not connected")]
    NotConnected,

    /// Publish failed
    #[error("Publish failed: {0}")]
    PublishFailed(String),

    /// Subscribe failed
    #[error("Subscribe failed: {0}")]
    SubscribeFailed(String),

    /// Consume failed
    #[error("Consume failed: {0}")]
    ConsumeFailed(String),

    /// Offset commit/store failed
    #[error("Commit failed: {0}")]
    CommitFailed(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Inbound message could not be decoded into the canonical envelope
    #[error("Malformed message on {topic}[{partition}]@{offset}: {reason}")]
    MalformedMessage {
        topic: String,
        partition: i32,
        offset: i64,
        reason: String,
    },
}

impl From<serde_json::Error> for BrokerError {
    fn from(err: serde_json::Error) -> Self {
        BrokerError::SerializationError(err.to_string())
    }
}

impl From<BrokerError> for AppError {
    fn from(err: BrokerError) -> Self {
        AppError::Broker(err.to_string())
    }
}
