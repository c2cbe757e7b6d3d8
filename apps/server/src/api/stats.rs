//! Handlers backed by the in-process metrics store.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use regionsync_core::{DirectionStats, SyncEventRecord};

use super::AppState;

#[derive(Debug, Serialize)]
pub struct SyncStatsResponse {
    pub direction: String,
    pub receives_from: String,
    #[serde(flatten)]
    pub stats: DirectionStats,
}

/// `GET /api/stats/sync`: aggregates for the inbound direction.
pub async fn sync_stats(State(state): State<AppState>) -> Json<SyncStatsResponse> {
    let direction = state.regions.inbound_direction();
    let stats = state.metrics.stats(&direction);
    Json(SyncStatsResponse {
        direction,
        receives_from: state.regions.peer.to_string(),
        stats,
    })
}

#[derive(Debug, Deserialize)]
pub struct RecordQuery {
    pub table: String,
    pub id: String,
}

/// `GET /api/stats/sync/record`: latest sync event for one row.
pub async fn record_sync_time(
    State(state): State<AppState>,
    Query(query): Query<RecordQuery>,
) -> Result<Json<SyncEventRecord>, StatusCode> {
    state
        .metrics
        .record_sync_time(&query.table, &query.id)
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub region: String,
}

/// `GET /api/health`: liveness probe.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        region: state.regions.local.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use regionsync_core::{Region, RegionPair, SyncMetrics};
    use std::sync::Arc;

    fn state() -> AppState {
        AppState {
            regions: RegionPair::new(Region::new("china"), Region::new("india")),
            metrics: Arc::new(SyncMetrics::new()),
        }
    }

    #[tokio::test]
    async fn stats_report_the_inbound_direction() {
        let state = state();
        state.metrics.record("india", "china", "products", "7", 42);

        let Json(body) = sync_stats(State(state)).await;
        assert_eq!(body.direction, "india-to-china");
        assert_eq!(body.receives_from, "india");
        assert_eq!(body.stats.total_syncs, 1);
        assert_eq!(body.stats.last_sync_latency_ms, Some(42));
    }

    #[tokio::test]
    async fn stats_serialize_with_wire_field_names() {
        let state = state();
        state.metrics.record("india", "china", "products", "7", 42);
        let Json(body) = sync_stats(State(state)).await;

        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["direction"], "india-to-china");
        assert_eq!(value["receives_from"], "india");
        assert_eq!(value["totalSyncs"], 1);
        assert_eq!(value["lastSyncLatencyMs"], 42);
        assert!(value["recentSyncs"].is_array());
    }

    #[tokio::test]
    async fn record_lookup_misses_with_not_found() {
        let state = state();
        state.metrics.record("india", "china", "products", "7", 42);

        let hit = record_sync_time(
            State(state.clone()),
            Query(RecordQuery {
                table: "products".to_string(),
                id: "7".to_string(),
            }),
        )
        .await;
        assert!(hit.is_ok());

        let miss = record_sync_time(
            State(state),
            Query(RecordQuery {
                table: "products".to_string(),
                id: "8".to_string(),
            }),
        )
        .await;
        assert!(matches!(miss, Err(StatusCode::NOT_FOUND)));
    }

    #[tokio::test]
    async fn health_reports_local_region() {
        let Json(body) = health(State(state())).await;
        assert_eq!(body.status, "ok");
        assert_eq!(body.region, "china");
    }
}
