//! Process-local sync observability: bounded per-direction event rings and a
//! per-record latest-sync map.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// Capacity of each per-direction event ring.
pub const DIRECTION_RING_CAPACITY: usize = 100;

/// Bound on the per-(table, id) latest-event map.
pub const RECORD_MAP_CAPACITY: usize = 1_000;

/// How many events `stats` reports verbatim.
const RECENT_SYNCS_LIMIT: usize = 10;

/// One completed sync, as recorded by the sink writer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncEventRecord {
    pub source: String,
    pub destination: String,
    pub table: String,
    pub record_id: String,
    pub latency_ms: i64,
    pub timestamp: DateTime<Utc>,
}

/// Aggregates for one direction, computed on demand from ring contents.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectionStats {
    pub total_syncs: usize,
    pub avg_latency_ms: f64,
    pub min_latency_ms: i64,
    pub max_latency_ms: i64,
    pub last_sync_time: Option<DateTime<Utc>>,
    pub last_sync_latency_ms: Option<i64>,
    pub syncs_last_minute: usize,
    pub avg_last_minute_ms: f64,
    pub recent_syncs: Vec<SyncEventRecord>,
}

#[derive(Default)]
struct MetricsInner {
    directions: HashMap<String, VecDeque<SyncEventRecord>>,
    record_latest: HashMap<(String, String), SyncEventRecord>,
    record_order: VecDeque<(String, String)>,
}

/// Thread-safe, in-process sync metrics store.
///
/// Mutated by the consumer, read by the API; share it as an `Arc` rather than
/// through module globals.
#[derive(Default)]
pub struct SyncMetrics {
    inner: Mutex<MetricsInner>,
}

impl SyncMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Direction key for a (source, destination) pair.
    pub fn direction_key(source: &str, destination: &str) -> String {
        format!("{source}-to-{destination}")
    }

    /// Record one completed sync.
    pub fn record(
        &self,
        source: &str,
        destination: &str,
        table: &str,
        record_id: &str,
        latency_ms: i64,
    ) {
        let event = SyncEventRecord {
            source: source.to_string(),
            destination: destination.to_string(),
            table: table.to_string(),
            record_id: record_id.to_string(),
            latency_ms,
            timestamp: Utc::now(),
        };

        let mut inner = match self.inner.lock() {
            Ok(guard) => guard,
            // A poisoned store loses this event, nothing else.
            Err(_) => return,
        };

        let ring = inner
            .directions
            .entry(Self::direction_key(source, destination))
            .or_default();
        if ring.len() == DIRECTION_RING_CAPACITY {
            ring.pop_front();
        }
        ring.push_back(event.clone());

        let key = (table.to_string(), record_id.to_string());
        if !inner.record_latest.contains_key(&key) {
            inner.record_order.push_back(key.clone());
            if inner.record_order.len() > RECORD_MAP_CAPACITY {
                if let Some(evicted) = inner.record_order.pop_front() {
                    inner.record_latest.remove(&evicted);
                }
            }
        }
        inner.record_latest.insert(key, event);
    }

    /// Aggregate stats for one direction key, e.g. `india-to-china`.
    pub fn stats(&self, direction: &str) -> DirectionStats {
        let inner = match self.inner.lock() {
            Ok(guard) => guard,
            Err(_) => return Self::empty_stats(),
        };
        let ring = match inner.directions.get(direction) {
            Some(ring) if !ring.is_empty() => ring,
            _ => return Self::empty_stats(),
        };

        let total = ring.len();
        let sum: i64 = ring.iter().map(|e| e.latency_ms).sum();
        let min = ring.iter().map(|e| e.latency_ms).min().unwrap_or(0);
        let max = ring.iter().map(|e| e.latency_ms).max().unwrap_or(0);
        let last = ring.back();

        let minute_ago = Utc::now() - Duration::seconds(60);
        let last_minute: Vec<&SyncEventRecord> =
            ring.iter().filter(|e| e.timestamp > minute_ago).collect();
        let minute_sum: i64 = last_minute.iter().map(|e| e.latency_ms).sum();

        DirectionStats {
            total_syncs: total,
            avg_latency_ms: sum as f64 / total as f64,
            min_latency_ms: min,
            max_latency_ms: max,
            last_sync_time: last.map(|e| e.timestamp),
            last_sync_latency_ms: last.map(|e| e.latency_ms),
            syncs_last_minute: last_minute.len(),
            avg_last_minute_ms: if last_minute.is_empty() {
                0.0
            } else {
                minute_sum as f64 / last_minute.len() as f64
            },
            recent_syncs: ring
                .iter()
                .rev()
                .take(RECENT_SYNCS_LIMIT)
                .cloned()
                .collect(),
        }
    }

    /// Latest sync event for a (table, id), if still tracked.
    pub fn record_sync_time(&self, table: &str, record_id: &str) -> Option<SyncEventRecord> {
        let inner = self.inner.lock().ok()?;
        inner
            .record_latest
            .get(&(table.to_string(), record_id.to_string()))
            .cloned()
    }

    fn empty_stats() -> DirectionStats {
        DirectionStats {
            total_syncs: 0,
            avg_latency_ms: 0.0,
            min_latency_ms: 0,
            max_latency_ms: 0,
            last_sync_time: None,
            last_sync_latency_ms: None,
            syncs_last_minute: 0,
            avg_last_minute_ms: 0.0,
            recent_syncs: Vec::new(),
        }
    }
}
