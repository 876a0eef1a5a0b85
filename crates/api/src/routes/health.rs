use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::engine::TimelineSnapshot;
use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// `ok`, or `degraded` when the store is unreachable.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Registered display connections.
    pub displays: usize,
    pub timeline: TimelineSnapshot,
    pub store_healthy: bool,
}

/// GET /health -- returns service, timeline and store health.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let coordinator = &state.coordinator;
    let store_healthy = match coordinator.store().health_check().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Store health check failed");
            false
        }
    };

    Json(HealthResponse {
        status: if store_healthy { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        displays: coordinator.hub().connection_count().await,
        timeline: coordinator.scheduler().snapshot().await,
        store_healthy,
    })
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
