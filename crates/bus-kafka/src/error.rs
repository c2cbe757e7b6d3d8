//! Error types for the bus client.

use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use thiserror::Error;

/// Result type alias for bus operations.
pub type Result<T> = std::result::Result<T, BusError>;

/// Whether the consumer should keep polling after a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusRetryClass {
    Retryable,
    Fatal,
}

/// Errors that can occur while talking to the bus.
#[derive(Debug, Error)]
pub enum BusError {
    /// Client-level error surfaced by the broker library
    #[error("bus error: {0}")]
    Kafka(#[from] KafkaError),

    /// Broker stayed unreachable through the whole startup retry budget
    #[error("bus unreachable after {attempts} attempts: {source}")]
    Startup {
        attempts: u32,
        #[source]
        source: KafkaError,
    },
}

impl BusError {
    /// Classify for the consumer loop's keep-going-or-die decision.
    pub fn retry_class(&self) -> BusRetryClass {
        match self {
            BusError::Startup { .. } => BusRetryClass::Fatal,
            BusError::Kafka(err) => match err {
                KafkaError::ClientCreation(_) | KafkaError::Subscription(_) => BusRetryClass::Fatal,
                KafkaError::MessageConsumption(RDKafkaErrorCode::Fatal) => BusRetryClass::Fatal,
                _ => BusRetryClass::Retryable,
            },
        }
    }
}
