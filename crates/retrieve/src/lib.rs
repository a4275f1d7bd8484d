//! # Siteprint Retriever
//!
//! Narrows the corpus to a handful of candidates for a query sketch via the
//! banded LSH inverted index. The retriever never scores: it computes the
//! query's band hashes, unions the owners sharing at least one band, drops
//! the query's own owner, optionally drops same-creator owners (legitimate
//! self-similarity), and hands the set to the analyzer.

use std::collections::BTreeSet;
use std::sync::Arc;

use thiserror::Error;

use fingerprint::{band_hashes, FingerprintConfig, FingerprintError, Sketch};
use store::{OwnerKind, SketchStore, StoreError};

/// Errors surfaced during candidate retrieval.
#[derive(Debug, Error)]
pub enum RetrieveError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Fingerprint(#[from] FingerprintError),
}

/// Banded LSH candidate lookup over a [`SketchStore`].
pub struct Retriever {
    store: Arc<dyn SketchStore>,
    cfg: FingerprintConfig,
}

impl Retriever {
    pub fn new(store: Arc<dyn SketchStore>, cfg: FingerprintConfig) -> Result<Self, RetrieveError> {
        cfg.validate()?;
        Ok(Self { store, cfg })
    }

    /// Candidate owners for a query sketch.
    ///
    /// `exclude_owner` removes the query's own id from the result;
    /// `exclude_creator` suppresses owners whose template shares a creator
    /// with the query (a studio's own variations are not plagiarism).
    pub fn candidates(
        &self,
        query: &Sketch,
        kind: OwnerKind,
        exclude_owner: Option<&str>,
        exclude_creator: Option<&str>,
    ) -> Result<BTreeSet<String>, RetrieveError> {
        let hashes = band_hashes(query, &self.cfg)?;
        if hashes.is_empty() {
            return Ok(BTreeSet::new());
        }
        let mut owners = self.store.lookup_candidates(&hashes, kind)?;

        if let Some(own) = exclude_owner {
            owners.remove(own);
        }

        if let Some(creator) = exclude_creator {
            owners = self.drop_same_creator(owners, kind, creator)?;
        }

        tracing::debug!(kind = ?kind, candidates = owners.len(), "band lookup complete");
        Ok(owners)
    }

    fn drop_same_creator(
        &self,
        owners: BTreeSet<String>,
        kind: OwnerKind,
        creator: &str,
    ) -> Result<BTreeSet<String>, RetrieveError> {
        let mut kept = BTreeSet::new();
        for owner in owners {
            let template_id = match kind {
                OwnerKind::Template => owner.as_str(),
                OwnerKind::Page => owner.split_once("::").map(|(t, _)| t).unwrap_or(&owner),
            };
            match self.store.get_template(template_id) {
                Ok(record) => {
                    if record.creator.as_deref() != Some(creator) {
                        kept.insert(owner);
                    }
                }
                // A candidate without a template row cannot be attributed;
                // keep it rather than silently hiding a potential match.
                Err(StoreError::NotFound { .. }) => {
                    kept.insert(owner);
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(kept)
    }
}
