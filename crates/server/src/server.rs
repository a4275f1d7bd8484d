//! Router construction, request admission, and server lifecycle.
//!
//! Every `/api/v1` request is priced by the number of remote crawls it
//! triggers; admission debits that cost from the key's per-minute crawl
//! budget before the handler runs.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::{from_fn, from_fn_with_state, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::routes::{api_info, cases, health, index, not_found, similarity};
use crate::state::ServerState;

/// Crawl cost of one request, in budget units. Anything that fetches a
/// live site costs at least one; `/compare` crawls both sides and a
/// `/reindex` page re-crawls a whole batch of templates.
fn crawl_cost(path: &str) -> u32 {
    match path {
        "/api/v1/compare" => 2,
        "/api/v1/reindex" => 4,
        _ => 1,
    }
}

/// Admission for `/api/v1` routes: validate the key, then debit the
/// route's crawl cost from its budget window.
async fn admit_request(
    State(state): State<Arc<ServerState>>,
    request: Request,
    next: Next,
) -> Result<Response, ServerError> {
    let Some(key) = request
        .headers()
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
    else {
        return Err(ServerError::Authentication(
            "set the X-Api-Key header".to_string(),
        ));
    };
    if !state.is_valid_api_key(&key) {
        return Err(ServerError::Authentication("unknown API key".to_string()));
    }

    let cost = crawl_cost(request.uri().path());
    if !state.debit_crawl_budget(&key, cost) {
        tracing::debug!(path = %request.uri().path(), cost, "crawl budget exhausted");
        return Err(ServerError::RateLimitExceeded);
    }

    Ok(next.run(request).await)
}

/// Tag every request (public routes included) with an id, propagate it in
/// the response, and emit one structured completion line. Case triage
/// tooling correlates engine log lines through this id.
async fn track_request(mut request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    request.extensions_mut().insert(request_id.clone());

    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = std::time::Instant::now();

    let mut response = next.run(request).await;

    if let Ok(value) = request_id.parse() {
        response.headers_mut().insert("x-request-id", value);
    }
    tracing::info!(
        method = %method,
        path = %path,
        status = %response.status(),
        elapsed_ms = %started.elapsed().as_millis(),
        request_id = %request_id,
        "request completed"
    );
    response
}

/// Build the router: public health surface plus the admitted API.
pub fn build_router(state: Arc<ServerState>) -> Router {
    let public_routes = Router::new()
        .route("/", get(api_info))
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check));

    let protected_routes = Router::new()
        .route("/api/v1/fingerprint", post(similarity::fingerprint_url))
        .route("/api/v1/compare", post(similarity::compare))
        .route("/api/v1/scan", post(similarity::scan))
        .route("/api/v1/index", post(index::index_template))
        .route("/api/v1/reindex", post(index::reindex))
        .route("/api/v1/cases", post(cases::open_case))
        .route("/api/v1/rescan", post(cases::rescan))
        .layer(from_fn_with_state(state.clone(), admit_request));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .fallback(not_found)
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            state.config.request_timeout(),
        ))
        .layer(CompressionLayer::new())
        .layer(from_fn(track_request))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the server and block until shutdown.
pub async fn start_server(config: ServerConfig) -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(&config.log_filter)
        .with_target(false)
        .json()
        .init();

    let state = Arc::new(ServerState::new(config.clone())?);
    let app = build_router(state);
    let addr: SocketAddr = config.socket_addr()?;

    tracing::info!(
        addr = %addr,
        request_timeout_secs = config.request_timeout_secs,
        api_keys = config.api_keys.len(),
        crawl_budget_per_minute = config.crawl_budget_per_minute,
        "starting siteprint server"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => tracing::error!(error = %err, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
