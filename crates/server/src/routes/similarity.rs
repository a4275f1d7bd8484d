use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use fingerprint::{Sketch, SketchVariant};
use siteprint::Captured;

use crate::error::ServerResult;
use crate::state::ServerState;

#[derive(Debug, Serialize)]
pub struct SketchDigest {
    pub variant: SketchVariant,
    pub dimension: usize,
    pub shingle_count: u32,
}

impl From<&Sketch> for SketchDigest {
    fn from(sketch: &Sketch) -> Self {
        Self {
            variant: sketch.variant,
            dimension: sketch.dimension(),
            shingle_count: sketch.shingle_count,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PageDigest {
    pub path: String,
    pub page_type: fingerprint::PageType,
    pub type_confidence: f32,
    pub shingle_count: u32,
    pub html_bytes: usize,
    pub unique_class_count: usize,
    pub max_dom_depth: usize,
}

#[derive(Debug, Serialize)]
pub struct FingerprintResponse {
    pub url: String,
    pub complete: bool,
    pub template_sketch: TemplateSketchDigest,
    pub page_sketches: Vec<PageDigest>,
    pub rule_map_handle: RuleMapHandle,
    pub structural_summary: StructuralSummary,
}

#[derive(Debug, Serialize)]
pub struct TemplateSketchDigest {
    pub css: SketchDigest,
    pub html: SketchDigest,
    pub combined: SketchDigest,
}

#[derive(Debug, Serialize)]
pub struct RuleMapHandle {
    pub rules: usize,
    pub parse_tolerated: u32,
    pub config_version: u32,
    pub noise_version: u32,
}

#[derive(Debug, Serialize)]
pub struct StructuralSummary {
    pub patterns: usize,
    pub total_weight: f64,
    pub max_depth: usize,
    pub unique_class_count: usize,
}

impl FingerprintResponse {
    fn from_captured(captured: &Captured) -> Self {
        let doc = &captured.fingerprint.document;
        Self {
            url: captured.url.clone(),
            complete: captured.complete,
            template_sketch: TemplateSketchDigest {
                css: (&doc.css_sketch).into(),
                html: (&doc.html_sketch).into(),
                combined: (&doc.combined_sketch).into(),
            },
            page_sketches: captured
                .fingerprint
                .pages
                .iter()
                .map(|p| PageDigest {
                    path: p.path.clone(),
                    page_type: p.page_type,
                    type_confidence: p.type_confidence,
                    shingle_count: p.sketch.shingle_count,
                    html_bytes: p.html_bytes,
                    unique_class_count: p.unique_class_count,
                    max_dom_depth: p.max_dom_depth,
                })
                .collect(),
            rule_map_handle: RuleMapHandle {
                rules: doc.rule_map.len(),
                parse_tolerated: doc.parse_stats.tolerated(),
                config_version: doc.config_version,
                noise_version: doc.noise_version,
            },
            structural_summary: StructuralSummary {
                patterns: doc.structure.patterns.len(),
                total_weight: doc.structure.total_weight,
                max_depth: doc.structure.max_depth,
                unique_class_count: doc.structure.unique_class_count,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct FingerprintRequest {
    pub url: String,
}

/// `POST /api/v1/fingerprint` — fetch and fingerprint without indexing.
pub async fn fingerprint_url(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<FingerprintRequest>,
) -> ServerResult<impl IntoResponse> {
    let captured = state.engine.fingerprint_url(&request.url).await?;
    Ok(Json(FingerprintResponse::from_captured(&captured)))
}

#[derive(Debug, Deserialize)]
pub struct CompareRequest {
    /// Owner id or URL.
    pub a: String,
    /// Owner id or URL.
    pub b: String,
}

/// `POST /api/v1/compare` — full evidence comparison of two sides.
pub async fn compare(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<CompareRequest>,
) -> ServerResult<impl IntoResponse> {
    let outcome = state.engine.compare(&request.a, &request.b).await?;
    Ok(Json(outcome))
}

#[derive(Debug, Deserialize)]
pub struct ScanRequest {
    pub url: String,
    /// Optional override of the candidate threshold.
    #[serde(default)]
    pub threshold: Option<f64>,
}

/// `POST /api/v1/scan` — rank the indexed corpus against a URL.
pub async fn scan(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<ScanRequest>,
) -> ServerResult<impl IntoResponse> {
    let report = state.engine.scan(&request.url, request.threshold).await?;
    Ok(Json(report))
}
