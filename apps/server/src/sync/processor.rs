//! Per-message pipeline: decode, policy gate, conflict resolution, privacy
//! filtering, sink write, metrics.

use std::sync::Arc;

use chrono::Utc;
use log::{debug, info, warn};
use serde_json::Value;

use regionsync_core::{
    decode_message, filter_after, resolve, Change, ChangeOp, DecodeSkip, Decoded, PolicyDecision,
    PolicyGate, RegionPair, Resolution, SyncMetrics,
};
use regionsync_storage_postgres::{
    build_delete, build_upsert, schema_for, ErrorClass, PgSink, StorageError,
};

/// What became of one bus message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handled {
    Applied,
    Skipped(&'static str),
}

/// Drives one change event through the full inbound pipeline.
pub struct ChangeProcessor {
    regions: RegionPair,
    gate: PolicyGate,
    sink: PgSink,
    metrics: Arc<SyncMetrics>,
}

impl ChangeProcessor {
    pub fn new(regions: RegionPair, sink: PgSink, metrics: Arc<SyncMetrics>) -> Self {
        Self {
            gate: PolicyGate::new(regions.clone()),
            regions,
            sink,
            metrics,
        }
    }

    /// Handle one raw message end to end.
    ///
    /// Message-level problems never bubble out as errors; they are logged and
    /// reported as skips so the offset always advances.
    pub async fn handle(
        &self,
        topic: &str,
        key: Option<&[u8]>,
        payload: Option<&[u8]>,
    ) -> Handled {
        let received_at_ms = Utc::now().timestamp_millis();

        let change = match decode_message(topic, key, payload) {
            Decoded::Change(change) => change,
            Decoded::Skip(DecodeSkip::Tombstone) => {
                debug!("tombstone on {topic}");
                return Handled::Skipped(DecodeSkip::Tombstone.as_str());
            }
            Decoded::Skip(reason) => {
                warn!("skipping message on {topic}: {}", reason.as_str());
                return Handled::Skipped(reason.as_str());
            }
        };

        if let PolicyDecision::Reject(reason) = self.gate.evaluate(
            change.table,
            &change.sync_origin,
            change.op,
        ) {
            info!(
                "policy rejected {} {} from {}: {}",
                change.op.as_str(),
                change.table,
                change.sync_origin,
                reason.as_str()
            );
            return Handled::Skipped(reason.as_str());
        }

        let local = match self.sink.row_state(change.table, &change.primary_key).await {
            Ok(state) => state,
            Err(err) => return self.sink_failure("row state read", &change, err),
        };

        let incoming_version = change
            .after
            .as_ref()
            .and_then(|a| a.get("version"))
            .and_then(Value::as_i64)
            .unwrap_or(0);
        let resolution = resolve(change.op, local, change.source_timestamp_ms, incoming_version);
        let record_id = key_display(&change.primary_key);
        match resolution {
            Resolution::Skip(reason) => {
                info!(
                    "resolver skipped {}/{}: {}",
                    change.table,
                    record_id,
                    reason.as_str()
                );
                return Handled::Skipped(reason.as_str());
            }
            Resolution::Apply(reason) => {
                debug!(
                    "resolver applying {}/{}: {}",
                    change.table,
                    record_id,
                    reason.as_str()
                );
            }
        }

        let schema = match schema_for(change.table) {
            Some(schema) => schema,
            None => {
                // The gate keeps users out; anything else here is a bug.
                warn!("no writable schema for table {}", change.table);
                return Handled::Skipped("unsynced_table");
            }
        };

        let write = match change.op {
            ChangeOp::Delete => {
                self.sink
                    .execute(&build_delete(schema, &change.primary_key))
                    .await
            }
            ChangeOp::Create | ChangeOp::Update => {
                let after = change.after.as_ref().cloned().unwrap_or_default();
                let filtered = filter_after(&after);
                let plan = build_upsert(schema, &change.primary_key, &filtered);
                if !plan.dropped_columns.is_empty() {
                    warn!(
                        "dropped unknown columns {:?} for {}",
                        plan.dropped_columns, change.table
                    );
                }
                self.sink.execute(&plan.statement).await
            }
        };

        match write {
            Ok(rows) => {
                let now_ms = Utc::now().timestamp_millis();
                let latency_ms = now_ms - change.source_timestamp_ms.unwrap_or(received_at_ms);
                self.metrics.record(
                    change.sync_origin.as_str(),
                    self.regions.local.as_str(),
                    change.table.as_str(),
                    &record_id,
                    latency_ms,
                );
                info!(
                    "applied {} {}/{} from {} ({} rows, {} ms behind source)",
                    change.op.as_str(),
                    change.table,
                    record_id,
                    change.sync_origin,
                    rows,
                    latency_ms
                );
                Handled::Applied
            }
            Err(err) => self.sink_failure("mutation", &change, err),
        }
    }

    fn sink_failure(&self, stage: &str, change: &Change, err: StorageError) -> Handled {
        let shape: Vec<&String> = change
            .after
            .as_ref()
            .map(|a| a.keys().collect())
            .unwrap_or_default();
        match err.class() {
            ErrorClass::Schema => warn!(
                "schema error during {stage} for {} (payload columns {:?}): {err}",
                change.table, shape
            ),
            ErrorClass::Transient => warn!(
                "transient sink error during {stage} for {}: {err}; dropping, CDC will redeliver",
                change.table
            ),
            ErrorClass::Other => warn!(
                "sink error during {stage} for {} (payload columns {:?}): {err}",
                change.table, shape
            ),
        }
        Handled::Skipped("sink_error")
    }
}

fn key_display(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
