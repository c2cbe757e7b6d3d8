//! Stream consumer with startup backoff, live tailing, and manual commits.

use std::time::Duration;

use log::{info, warn};
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::BorrowedMessage;

use crate::error::{BusError, Result};

/// First retry delay when the broker is unreachable at startup.
pub const INITIAL_RETRY_DELAY: Duration = Duration::from_millis(300);

/// Ceiling for the startup retry delay.
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Connect attempts before startup is reported failed.
pub const MAX_CONNECT_ATTEMPTS: u32 = 15;

const METADATA_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection settings for the bus client.
#[derive(Debug, Clone)]
pub struct BusConfig {
    pub broker: String,
    pub client_id: String,
    pub group_id: String,
}

/// Delay before connect attempt `attempt` (0-based): doubling from the
/// initial delay, capped.
pub fn backoff_delay(attempt: u32) -> Duration {
    INITIAL_RETRY_DELAY
        .saturating_mul(2_u32.saturating_pow(attempt))
        .min(MAX_RETRY_DELAY)
}

/// Consumer bound to the sync topics, tailing live messages only.
pub struct BusConsumer {
    inner: StreamConsumer,
}

impl BusConsumer {
    /// Create the client, verify the broker answers metadata requests
    /// (retrying with backoff), and subscribe.
    pub async fn connect(config: &BusConfig, topics: &[String]) -> Result<Self> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &config.broker)
            .set("client.id", &config.client_id)
            .set("group.id", &config.group_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "latest")
            .create()?;

        let mut attempt = 0;
        loop {
            match consumer.fetch_metadata(None, METADATA_TIMEOUT) {
                Ok(_) => break,
                Err(source) if attempt + 1 >= MAX_CONNECT_ATTEMPTS => {
                    return Err(BusError::Startup {
                        attempts: MAX_CONNECT_ATTEMPTS,
                        source,
                    });
                }
                Err(err) => {
                    let delay = backoff_delay(attempt);
                    warn!(
                        "broker {} not reachable (attempt {}/{}): {}; retrying in {:?}",
                        config.broker,
                        attempt + 1,
                        MAX_CONNECT_ATTEMPTS,
                        err,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }

        let topic_refs: Vec<&str> = topics.iter().map(String::as_str).collect();
        consumer.subscribe(&topic_refs)?;
        info!("subscribed to {:?} as group {}", topics, config.group_id);
        Ok(Self { inner: consumer })
    }

    /// Await the next message from any subscribed partition.
    pub async fn recv(&self) -> Result<BorrowedMessage<'_>> {
        Ok(self.inner.recv().await?)
    }

    /// Commit the offset of a fully handled message.
    pub fn commit(&self, message: &BorrowedMessage<'_>) -> Result<()> {
        self.inner.commit_message(message, CommitMode::Async)?;
        Ok(())
    }
}
