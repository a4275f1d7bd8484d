use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use crate::error::ServerResult;
use crate::state::ServerState;

#[derive(Debug, Deserialize)]
pub struct OpenCaseRequest {
    pub case_id: String,
    pub original_template_id: String,
    pub alleged_url: String,
}

/// `POST /api/v1/cases` — open a case and freeze its baseline.
pub async fn open_case(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<OpenCaseRequest>,
) -> ServerResult<impl IntoResponse> {
    let opened = state
        .engine
        .open_case(
            &request.case_id,
            &request.original_template_id,
            &request.alleged_url,
        )
        .await?;
    Ok(Json(opened))
}

#[derive(Debug, Deserialize)]
pub struct RescanRequest {
    pub case_id: String,
}

/// `POST /api/v1/rescan` — re-fetch the alleged copy and evaluate drift.
pub async fn rescan(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<RescanRequest>,
) -> ServerResult<impl IntoResponse> {
    let report = state.engine.rescan(&request.case_id).await?;
    Ok(Json(report))
}
