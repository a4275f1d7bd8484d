use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use fetch::{HttpFetcher, LinkDiscoverer};
use siteprint::{EngineConfig, SimilarityEngine};
use store::{MemoryStore, RedbStore, SketchStore};

use crate::config::ServerConfig;

const BUDGET_WINDOW: Duration = Duration::from_secs(60);

/// Shared application state.
#[derive(Clone)]
pub struct ServerState {
    pub config: Arc<ServerConfig>,
    /// API key -> (crawl cost spent, window start).
    crawl_budgets: Arc<DashMap<String, (u32, Instant)>>,
    pub engine: Arc<SimilarityEngine>,
}

impl ServerState {
    /// Build the engine from server configuration: durable redb storage
    /// when a path is configured, in-memory otherwise.
    pub fn new(config: ServerConfig) -> anyhow::Result<Self> {
        let engine_config = match &config.engine_config_path {
            Some(path) => EngineConfig::load(path)?,
            None => EngineConfig::default(),
        };

        let store: Arc<dyn SketchStore> = match &config.store_path {
            Some(path) => Arc::new(RedbStore::open(path)?),
            None => Arc::new(MemoryStore::new()),
        };

        let engine = SimilarityEngine::new(
            Arc::new(HttpFetcher::new()?),
            Arc::new(LinkDiscoverer::new()?),
            store,
            engine_config,
        )?;

        Ok(Self {
            config: Arc::new(config),
            crawl_budgets: Arc::new(DashMap::new()),
            engine: Arc::new(engine),
        })
    }

    /// Build state around an existing engine (tests inject stub fetchers).
    pub fn with_engine(config: ServerConfig, engine: Arc<SimilarityEngine>) -> Self {
        Self {
            config: Arc::new(config),
            crawl_budgets: Arc::new(DashMap::new()),
            engine,
        }
    }

    pub fn is_valid_api_key(&self, key: &str) -> bool {
        self.config.api_keys.contains(key)
    }

    /// Debit `cost` crawl units from the key's fixed per-minute window.
    /// Returns false when the debit would overdraw the budget; the window
    /// state is untouched in that case so cheaper requests can still pass.
    pub fn debit_crawl_budget(&self, key: &str, cost: u32) -> bool {
        let now = Instant::now();
        let budget = self.config.crawl_budget_per_minute;

        let mut entry = self
            .crawl_budgets
            .entry(key.to_string())
            .or_insert((0, now));
        let (spent, window_start) = entry.value_mut();

        if now.duration_since(*window_start) > BUDGET_WINDOW {
            *spent = 0;
            *window_start = now;
        }
        if spent.saturating_add(cost) > budget {
            return false;
        }
        *spent += cost;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fetch::{FetchError, Fetcher, FetchedDocument, PageDiscoverer, PageInfo};
    use async_trait::async_trait;
    use url::Url;

    struct NoFetch;

    #[async_trait]
    impl Fetcher for NoFetch {
        async fn fetch(&self, url: &Url, _t: Duration) -> Result<FetchedDocument, FetchError> {
            Err(FetchError::failed(url.as_str(), "test fetcher"))
        }
    }

    struct NoDiscovery;

    #[async_trait]
    impl PageDiscoverer for NoDiscovery {
        async fn discover(&self, _url: &Url, _k: usize) -> Result<Vec<PageInfo>, FetchError> {
            Ok(Vec::new())
        }
    }

    fn state(budget: u32) -> ServerState {
        let engine = SimilarityEngine::new(
            Arc::new(NoFetch),
            Arc::new(NoDiscovery),
            Arc::new(MemoryStore::new()),
            EngineConfig::default(),
        )
        .unwrap();
        let config = ServerConfig {
            crawl_budget_per_minute: budget,
            ..ServerConfig::default()
        };
        ServerState::with_engine(config, Arc::new(engine))
    }

    #[test]
    fn budget_debits_until_exhausted() {
        let state = state(5);
        assert!(state.debit_crawl_budget("key", 2));
        assert!(state.debit_crawl_budget("key", 2));
        // 4 of 5 spent; a 2-unit debit overdraws, a 1-unit one still fits.
        assert!(!state.debit_crawl_budget("key", 2));
        assert!(state.debit_crawl_budget("key", 1));
        assert!(!state.debit_crawl_budget("key", 1));
    }

    #[test]
    fn budgets_are_per_key() {
        let state = state(2);
        assert!(state.debit_crawl_budget("alpha", 2));
        assert!(state.debit_crawl_budget("beta", 2));
        assert!(!state.debit_crawl_budget("alpha", 1));
    }
}
