//! Read API for sync observability.

pub mod stats;

use std::sync::Arc;

use axum::routing::get;
use axum::Router;

use regionsync_core::{RegionPair, SyncMetrics};

/// Shared state handed to API handlers.
#[derive(Clone)]
pub struct AppState {
    pub regions: RegionPair,
    pub metrics: Arc<SyncMetrics>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/stats/sync", get(stats::sync_stats))
        .route("/api/stats/sync/record", get(stats::record_sync_time))
        .route("/api/health", get(stats::health))
        .with_state(state)
}
