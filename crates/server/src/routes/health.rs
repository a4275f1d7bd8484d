use std::sync::Arc;
use std::time::SystemTime;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::error::ServerResult;
use crate::state::ServerState;

static SERVER_START_TIME: std::sync::OnceLock<SystemTime> = std::sync::OnceLock::new();

fn uptime_seconds() -> u64 {
    SERVER_START_TIME
        .get_or_init(SystemTime::now)
        .elapsed()
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// `GET /health` — liveness plus corpus counters.
pub async fn health_check(
    State(state): State<Arc<ServerState>>,
) -> ServerResult<impl IntoResponse> {
    let report = state.engine.health()?;
    Ok(Json(json!({
        "status": "healthy",
        "service": "siteprint-server",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": uptime_seconds(),
        "templates_indexed": report.templates_indexed,
        "pages_indexed": report.pages_indexed,
        "band_rows": report.band_rows,
        "version": report.version,
    })))
}

/// `GET /ready` — readiness: the store must answer.
pub async fn readiness_check(
    State(state): State<Arc<ServerState>>,
) -> ServerResult<impl IntoResponse> {
    let store_ready = state.engine.health().is_ok();
    Ok(Json(json!({
        "status": if store_ready { "ready" } else { "degraded" },
        "uptime_seconds": uptime_seconds(),
        "components": {
            "api": "ready",
            "store": if store_ready { "ready" } else { "unavailable" },
        }
    })))
}
