//! In-process route tests: the full router against a stub fetcher and an
//! in-memory store.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tower::util::ServiceExt;
use url::Url;

use fetch::{FetchError, Fetcher, FetchedDocument, PageDiscoverer, PageInfo};
use server::{build_router, ServerConfig, ServerState};
use siteprint::{EngineConfig, SimilarityEngine};
use store::MemoryStore;

const API_KEY: &str = "test-key";

const ORIGINAL_HTML: &str = r#"<html><body>
<section class="hero"><h1>Welcome</h1><p>Hand-built landing page</p><a class="cta">Go</a></section>
<section class="features"><h2>Features</h2><ul class="grid"><li>a</li><li>b</li><li>c</li><li>d</li></ul></section>
</body></html>"#;

const ORIGINAL_CSS: &str = r#"
.hero { color: #f00; padding: 8px; margin: 0 auto; max-width: 960px }
.cta { background: #f00; border-radius: 4px; padding: 12px 24px }
.features { display: flex; gap: 16px; padding: 48px 0 }
.grid { display: grid; grid-template-columns: repeat(4, 1fr) }
"#;

const UNRELATED_HTML: &str = r#"<html><body>
<main><article class="post"><h1>Journal</h1><p>Completely different site</p></article></main>
<footer><nav><a>Archive</a></nav></footer>
</body></html>"#;

const UNRELATED_CSS: &str = r#"
.post { font-family: serif; line-height: 1.8; max-width: 640px }
.byline { font-style: italic; color: #666 }
"#;

struct MapFetcher {
    by_host: HashMap<String, FetchedDocument>,
}

#[async_trait]
impl Fetcher for MapFetcher {
    async fn fetch(&self, url: &Url, _timeout: Duration) -> Result<FetchedDocument, FetchError> {
        let host = url.host_str().unwrap_or_default();
        self.by_host
            .get(host)
            .cloned()
            .ok_or_else(|| FetchError::failed(url.as_str(), "unknown host in test fixture"))
    }
}

struct NoDiscovery;

#[async_trait]
impl PageDiscoverer for NoDiscovery {
    async fn discover(&self, _url: &Url, _budget: usize) -> Result<Vec<PageInfo>, FetchError> {
        Ok(Vec::new())
    }
}

fn doc(html: &str, css: &str) -> FetchedDocument {
    FetchedDocument {
        html: html.to_string(),
        css: css.to_string(),
        js: String::new(),
    }
}

fn test_router() -> Router {
    let mut by_host = HashMap::new();
    by_host.insert("original.example.com".to_string(), doc(ORIGINAL_HTML, ORIGINAL_CSS));
    by_host.insert("copycat.example.net".to_string(), doc(ORIGINAL_HTML, ORIGINAL_CSS));
    by_host.insert("unrelated.example.org".to_string(), doc(UNRELATED_HTML, UNRELATED_CSS));

    let engine = SimilarityEngine::new(
        Arc::new(MapFetcher { by_host }),
        Arc::new(NoDiscovery),
        Arc::new(MemoryStore::new()),
        EngineConfig::default(),
    )
    .expect("engine construction");

    let mut config = ServerConfig::default();
    config.api_keys.insert(API_KEY.to_string());
    build_router(Arc::new(ServerState::with_engine(config, Arc::new(engine))))
}

async fn post_json(router: &Router, path: &str, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(path)
                .header(header::CONTENT_TYPE, "application/json")
                .header("x-api-key", API_KEY)
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, value)
}

#[tokio::test]
async fn health_is_public_and_reports_counters() {
    let router = test_router();
    let response = router
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["templates_indexed"], 0);
    assert_eq!(body["band_rows"], 0);
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn api_routes_require_a_key() {
    let router = test_router();
    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/scan")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"url":"https://original.example.com"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn fingerprint_reports_sketches_and_rules() {
    let router = test_router();
    let (status, body) = post_json(
        &router,
        "/api/v1/fingerprint",
        serde_json::json!({ "url": "https://original.example.com" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["template_sketch"]["combined"]["dimension"], 128);
    assert!(body["rule_map_handle"]["rules"].as_u64().unwrap() >= 4);
    assert_eq!(body["page_sketches"][0]["page_type"], "home");
}

#[tokio::test]
async fn index_then_scan_flags_a_copy() {
    let router = test_router();
    let (status, body) = post_json(
        &router,
        "/api/v1/index",
        serde_json::json!({
            "id": "tpl-original",
            "url": "https://original.example.com",
            "creator": "studio-a",
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert_eq!(body["band_count"], 16);

    let (status, body) = post_json(
        &router,
        "/api/v1/scan",
        serde_json::json!({ "url": "https://copycat.example.net" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["recommendation"], "likely_derivative");
    assert_eq!(body["matches"][0]["owner_id"], "tpl-original");
    assert!(body["matches"][0]["jaccard"].as_f64().unwrap() > 0.9);
}

#[tokio::test]
async fn scan_of_unrelated_site_appears_original() {
    let router = test_router();
    post_json(
        &router,
        "/api/v1/index",
        serde_json::json!({
            "id": "tpl-original",
            "url": "https://original.example.com",
        }),
    )
    .await;

    let (status, body) = post_json(
        &router,
        "/api/v1/scan",
        serde_json::json!({ "url": "https://unrelated.example.org" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["recommendation"], "appears_original");
}

#[tokio::test]
async fn compare_identical_content_scores_high_with_evidence() {
    let router = test_router();
    let (status, body) = post_json(
        &router,
        "/api/v1/compare",
        serde_json::json!({
            "a": "https://original.example.com",
            "b": "https://copycat.example.net",
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "scored");
    assert!(body["combined"]["jaccard"].as_f64().unwrap() >= 0.95);
    let selectors: Vec<&str> = body["evidence"]["identical_rules"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["selector"].as_str().unwrap())
        .collect();
    assert!(selectors.contains(&".hero"));
    assert_eq!(body["verdict"], "high_similarity");
}

#[tokio::test]
async fn compare_with_unknown_id_is_indeterminate() {
    let router = test_router();
    let (status, body) = post_json(
        &router,
        "/api/v1/compare",
        serde_json::json!({ "a": "tpl-not-indexed", "b": "also-unknown" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "indeterminate");
    let missing = body["missing"].as_array().unwrap();
    assert_eq!(missing.len(), 2);
}

#[tokio::test]
async fn case_lifecycle_open_then_rescan() {
    let router = test_router();
    post_json(
        &router,
        "/api/v1/index",
        serde_json::json!({
            "id": "tpl-original",
            "url": "https://original.example.com",
        }),
    )
    .await;

    let (status, body) = post_json(
        &router,
        "/api/v1/cases",
        serde_json::json!({
            "case_id": "case-9",
            "original_template_id": "tpl-original",
            "alleged_url": "https://copycat.example.net",
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["baseline_similarity"].as_f64().unwrap() > 0.9);

    // Nothing changed on the copycat's side: insufficient changes.
    let (status, body) = post_json(
        &router,
        "/api/v1/rescan",
        serde_json::json!({ "case_id": "case-9" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["verdict"], "insufficient_changes");
    assert!(body["drift"].as_f64().unwrap() < 0.05);
}

#[tokio::test]
async fn rescan_without_baseline_reports_no_baseline() {
    let router = test_router();
    let (status, body) = post_json(
        &router,
        "/api/v1/rescan",
        serde_json::json!({ "case_id": "case-unknown" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["verdict"], "no_baseline");
}

#[tokio::test]
async fn fetch_failure_maps_to_bad_gateway() {
    let router = test_router();
    let (status, body) = post_json(
        &router,
        "/api/v1/scan",
        serde_json::json!({ "url": "https://nonexistent.example.zz" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["code"], "FETCH_FAILED");
}
