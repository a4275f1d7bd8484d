//! # Siteprint
//!
//! A similarity engine for hand-authored web templates: content-agnostic
//! near-duplicate detection built on MinHash/LSH sketches, depth-weighted
//! structural fingerprints, and CSS rule-level identity matching, with
//! page-type-aware decomposition of multi-page templates and drift tracking
//! against frozen case baselines.
//!
//! The umbrella crate re-exports the stage crates and hosts the
//! [`SimilarityEngine`] orchestrator:
//!
//! - [`fetch`]: URL normalization and content retrieval.
//! - [`fingerprint`]: shingling, MinHash sketches, LSH bands, rule maps,
//!   structural fingerprints.
//! - [`store`]: durable sketch storage and the band inverted index.
//! - [`retrieve`]: banded LSH candidate lookup.
//! - [`analyze`]: scoring, evidence mining, page alignment, drift.
//!
//! ## Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//! use siteprint::{EngineConfig, SimilarityEngine};
//!
//! # async fn demo() -> Result<(), siteprint::EngineError> {
//! let fetcher = Arc::new(siteprint::fetch::HttpFetcher::new()?);
//! let discoverer = Arc::new(siteprint::fetch::LinkDiscoverer::new()?);
//! let store = Arc::new(siteprint::store::MemoryStore::new());
//!
//! let engine = SimilarityEngine::new(fetcher, discoverer, store, EngineConfig::default())?;
//! engine
//!     .index_template("portfolio-a", "https://portfolio-a.example.com", Some("studio-a"))
//!     .await?;
//! let report = engine.scan("https://suspect.example.net", None).await?;
//! println!("{:?}", report.recommendation);
//! # Ok(())
//! # }
//! ```

pub use analyze;
pub use fetch;
pub use fingerprint;
pub use retrieve;
pub use store;

mod config;
mod engine;

use thiserror::Error;

pub use config::EngineConfig;
pub use engine::{
    CaseOpened, Captured, CompareOutcome, CompareReport, HealthReport, IndexOutcome,
    RescanReport, ScanRecommendation, ScanReport, SimilarityEngine,
};

/// Errors from any engine operation, converging the stage crates' failures.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("fetch failure: {0}")]
    Fetch(#[from] fetch::FetchError),

    #[error("fingerprint failure: {0}")]
    Fingerprint(#[from] fingerprint::FingerprintError),

    #[error("store failure: {0}")]
    Store(#[from] store::StoreError),

    #[error("retrieval failure: {0}")]
    Retrieve(#[from] retrieve::RetrieveError),

    #[error("analysis failure: {0}")]
    Analyze(#[from] analyze::AnalyzeError),

    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),
}

impl EngineError {
    /// True for failures the caller caused (bad input, unknown ids) rather
    /// than internal faults; the HTTP layer maps these to 4xx.
    pub fn is_caller_fault(&self) -> bool {
        matches!(
            self,
            EngineError::Fetch(fetch::FetchError::InvalidUrl { .. })
                | EngineError::Store(store::StoreError::NotFound { .. })
                | EngineError::Store(store::StoreError::BaselineFrozen { .. })
        )
    }
}
