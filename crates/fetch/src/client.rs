//! Shared reqwest client construction.

use std::time::Duration;

use reqwest::{redirect, Client};

use crate::types::FetchError;

const DEFAULT_TIMEOUT_MS: u64 = 30_000;
const REDIRECT_LIMIT: usize = 10;
const POOL_IDLE_TIMEOUT_SEC: u64 = 90;
const POOL_MAX_IDLE_PER_HOST: usize = 32;
const USER_AGENT: &str = concat!("siteprint/", env!("CARGO_PKG_VERSION"));

/// Build the pooled HTTP client used for all static fetching.
pub fn build_client() -> Result<Client, FetchError> {
    Client::builder()
        .user_agent(USER_AGENT)
        .redirect(redirect::Policy::limited(REDIRECT_LIMIT))
        .gzip(true)
        .brotli(true)
        .deflate(true)
        .timeout(Duration::from_millis(DEFAULT_TIMEOUT_MS))
        .pool_idle_timeout(Duration::from_secs(POOL_IDLE_TIMEOUT_SEC))
        .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
        .build()
        .map_err(|e| FetchError::FetchFailed {
            url: String::new(),
            reason: format!("failed to build http client: {e}"),
        })
}
