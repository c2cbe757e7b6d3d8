//! Kafka client for the inbound change processor: a stream consumer bound to
//! the sync topics, with startup backoff and manual offset commits.

pub mod consumer;
pub mod error;

pub use consumer::{backoff_delay, BusConfig, BusConsumer, MAX_CONNECT_ATTEMPTS};
pub use error::{BusError, BusRetryClass, Result};

// Accessors on received messages (topic/key/payload) live on this trait.
pub use rdkafka::message::Message;
