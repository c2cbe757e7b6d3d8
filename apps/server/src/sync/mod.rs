//! Consumer task: pulls bus messages in partition order and drives the
//! change pipeline.

pub mod processor;

use anyhow::anyhow;
use log::{error, info, warn};
use tokio::sync::watch;

use regionsync_bus_kafka::{BusConsumer, BusRetryClass, Message};
use regionsync_core::SyncTable;

use processor::ChangeProcessor;

/// Topics the consumer tails.
pub fn sync_topics() -> Vec<String> {
    SyncTable::ALL.iter().map(SyncTable::topic).collect()
}

/// Run the consumer until shutdown is signalled or the bus fails fatally.
///
/// The offset of a message is committed once it is fully handled, whether it
/// was written or deliberately skipped; a poison message never wedges the
/// loop.
pub async fn run_consumer(
    bus: BusConsumer,
    processor: ChangeProcessor,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    info!("consumer stopping");
                    return Ok(());
                }
            }
            received = bus.recv() => {
                let message = match received {
                    Ok(message) => message,
                    Err(err) if err.retry_class() == BusRetryClass::Fatal => {
                        error!("bus failed fatally: {err}");
                        return Err(anyhow!(err));
                    }
                    Err(err) => {
                        warn!("bus receive error: {err}");
                        continue;
                    }
                };

                processor
                    .handle(message.topic(), message.key(), message.payload())
                    .await;
                if let Err(err) = bus.commit(&message) {
                    warn!("offset commit failed: {err}");
                }
            }
        }
    }
}
