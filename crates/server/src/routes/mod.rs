pub mod cases;
pub mod health;
pub mod index;
pub mod similarity;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

/// `GET /` — service identification.
pub async fn api_info() -> impl IntoResponse {
    Json(json!({
        "service": "siteprint-server",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": [
            "POST /api/v1/fingerprint",
            "POST /api/v1/compare",
            "POST /api/v1/scan",
            "POST /api/v1/index",
            "POST /api/v1/cases",
            "POST /api/v1/rescan",
            "GET /health",
        ],
    }))
}

pub async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": { "code": "NOT_FOUND", "message": "unknown route" }
        })),
    )
}
