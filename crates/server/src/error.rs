use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use siteprint::EngineError;

pub type ServerResult<T> = Result<T, ServerError>;

/// Server error envelope.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("rate limit exceeded")]
    RateLimitExceeded,

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("internal server error: {0}")]
    Internal(String),
}

impl ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServerError::Authentication(_) => StatusCode::UNAUTHORIZED,
            ServerError::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Engine(engine) => match engine {
                EngineError::Fetch(fetch::FetchError::FetchTimeout { .. }) => {
                    StatusCode::GATEWAY_TIMEOUT
                }
                EngineError::Fetch(_) => StatusCode::BAD_GATEWAY,
                err if err.is_caller_fault() => StatusCode::UNPROCESSABLE_ENTITY,
                EngineError::ConfigInvalid(_) => StatusCode::INTERNAL_SERVER_ERROR,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            ServerError::Authentication(_) => "AUTH_FAILED",
            ServerError::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            ServerError::BadRequest(_) => "BAD_REQUEST",
            ServerError::Engine(engine) => match engine {
                EngineError::Fetch(fetch::FetchError::FetchTimeout { .. }) => "FETCH_TIMEOUT",
                EngineError::Fetch(_) => "FETCH_FAILED",
                EngineError::Fingerprint(_) => "FINGERPRINT_ERROR",
                EngineError::Store(store::StoreError::NotFound { .. }) => "NOT_FOUND",
                EngineError::Store(store::StoreError::BaselineFrozen { .. }) => "BASELINE_FROZEN",
                EngineError::Store(_) => "STORE_ERROR",
                EngineError::Retrieve(_) => "RETRIEVE_ERROR",
                EngineError::Analyze(_) => "ANALYZE_ERROR",
                EngineError::ConfigInvalid(_) => "CONFIG_INVALID",
            },
            ServerError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({
            "error": {
                "code": self.error_code(),
                "message": self.to_string(),
            }
        }));
        (status, body).into_response()
    }
}
