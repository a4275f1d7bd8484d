use std::collections::HashSet;
use std::net::SocketAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Server configuration, loaded from a `siteprint-server.*` file and
/// `SITEPRINT_SERVER__*` environment variables.
///
/// The request timeout must outlast the engine's multi-page fetch
/// deadline: a `/scan` legitimately spends most of that budget crawling.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Socket address to listen on.
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Per-request timeout. Keep this above the engine's
    /// `fetch_deadline_secs` plus headroom for analysis.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Keys accepted on `/api/v1` routes. At least one is required; the
    /// server refuses to start without any.
    #[serde(default)]
    pub api_keys: HashSet<String>,

    /// Per-key crawl budget per minute, in route-cost units (see
    /// the router's cost table: a compare debits two, a reindex page four).
    #[serde(default = "default_crawl_budget_per_minute")]
    pub crawl_budget_per_minute: u32,

    /// tracing env-filter expression.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,

    /// YAML pipeline config for the engine; engine defaults when unset.
    #[serde(default)]
    pub engine_config_path: Option<String>,

    /// redb database file; the in-memory store when unset.
    #[serde(default)]
    pub store_path: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            request_timeout_secs: default_request_timeout_secs(),
            api_keys: HashSet::new(),
            crawl_budget_per_minute: default_crawl_budget_per_minute(),
            log_filter: default_log_filter(),
            engine_config_path: None,
            store_path: None,
        }
    }
}

impl ServerConfig {
    /// Load configuration from files and environment, then validate it.
    pub fn load() -> anyhow::Result<Self> {
        let builder = config::Config::builder()
            .add_source(config::File::with_name("siteprint-server").required(false))
            .add_source(config::Environment::with_prefix("SITEPRINT_SERVER").separator("__"));

        let config: ServerConfig = builder.build()?.try_deserialize()?;

        if config.api_keys.is_empty() {
            anyhow::bail!(
                "no API keys configured; set SITEPRINT_SERVER__API_KEYS or \
                 `api_keys` in siteprint-server.yaml before starting"
            );
        }
        if config.crawl_budget_per_minute == 0 {
            anyhow::bail!("crawl_budget_per_minute must be >= 1");
        }

        Ok(config)
    }

    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.listen.parse()?)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn default_listen() -> String {
    "0.0.0.0:8080".to_string()
}

/// Engine fetch deadline (60s) plus headroom for analysis and evidence
/// mining on large stylesheets.
fn default_request_timeout_secs() -> u64 {
    90
}

fn default_crawl_budget_per_minute() -> u32 {
    60
}

fn default_log_filter() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_leave_headroom_over_the_fetch_deadline() {
        let cfg = ServerConfig::default();
        assert!(cfg.request_timeout_secs > 60);
        assert!(cfg.crawl_budget_per_minute >= 1);
        assert!(cfg.api_keys.is_empty());
        assert!(cfg.store_path.is_none());
    }

    #[test]
    fn listen_address_parses() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.socket_addr().unwrap().port(), 8080);
    }

    #[test]
    fn bad_listen_address_is_an_error() {
        let cfg = ServerConfig {
            listen: "not-an-address".into(),
            ..ServerConfig::default()
        };
        assert!(cfg.socket_addr().is_err());
    }
}
