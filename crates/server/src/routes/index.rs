use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::error::ServerResult;
use crate::state::ServerState;

#[derive(Debug, Deserialize)]
pub struct IndexRequest {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub creator: Option<String>,
}

/// `POST /api/v1/index` — fetch, fingerprint, and persist a template.
pub async fn index_template(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<IndexRequest>,
) -> ServerResult<impl IntoResponse> {
    let outcome = state
        .engine
        .index_template(&request.id, &request.url, request.creator.as_deref())
        .await?;
    Ok(Json(json!({
        "ok": true,
        "id": outcome.id,
        "url": outcome.url,
        "pages_indexed": outcome.pages_indexed,
        "shingle_counts": {
            "css": outcome.shingle_counts.0,
            "html": outcome.shingle_counts.1,
            "combined": outcome.shingle_counts.2,
        },
        "band_count": outcome.band_count,
        "complete": outcome.complete,
    })))
}

#[derive(Debug, Deserialize)]
pub struct ReindexRequest {
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    25
}

/// `POST /api/v1/reindex` — one page of sketch-algorithm backfill. The
/// caller drives `(limit, offset)` until `processed` comes back empty.
pub async fn reindex(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<ReindexRequest>,
) -> ServerResult<impl IntoResponse> {
    let processed = state
        .engine
        .reindex_page(request.limit, request.offset)
        .await?;
    Ok(Json(json!({
        "processed": processed,
        "count": processed.len(),
    })))
}
