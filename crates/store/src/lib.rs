//! # Siteprint Sketch Store
//!
//! Durable persistence for per-template and per-page sketches plus the LSH
//! band inverted index, case baselines, and rescan history.
//!
//! Two backends implement the same [`SketchStore`] trait:
//!
//! - [`RedbStore`]: redb-backed, ACID, one write transaction per owner
//!   mutation so readers never observe a sketch without its band rows (or
//!   a partial band set).
//! - [`MemoryStore`]: hashbrown-backed, for tests and ephemeral use.
//!
//! Record payloads are bincode-encoded; sketch blobs travel through the
//! fingerprint crate's binary codec, so decoding validates dimension,
//! variant, and format version on every read.

mod disk;
mod memory;
mod records;

use std::collections::BTreeSet;

use thiserror::Error;

pub use disk::RedbStore;
pub use memory::MemoryStore;
pub use records::{
    CaseBaseline, OwnerKind, PageRecord, RescanRecord, RescanVerdict, StoreStats, TemplateRecord,
    TemplateSketches,
};

use fingerprint::FingerprintError;

/// Errors surfaced by either store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("record encode error: {0}")]
    Encode(String),

    #[error("record decode error: {0}")]
    Decode(String),

    #[error("concurrent writer won the race for {0}")]
    Conflict(String),

    #[error("case baseline already captured for {case_id}; baselines are immutable")]
    BaselineFrozen { case_id: String },

    #[error("sketch validation failed: {0}")]
    Sketch(#[from] FingerprintError),
}

impl StoreError {
    pub fn backend<E: std::fmt::Display>(err: E) -> Self {
        StoreError::Backend(err.to_string())
    }

    fn not_found(kind: &'static str, id: &str) -> Self {
        StoreError::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}

/// Durable storage surface consumed by the retriever, analyzer, and engine.
///
/// Band slices are positional: `bands[i]` is the hash of band `i`. A caller
/// passing an empty slice (the empty-sketch case) stores no band rows; any
/// other length must equal the corpus band count — the store records what it
/// is given atomically either way.
pub trait SketchStore: Send + Sync {
    /// Atomically replace a template's record, sketches, and band rows.
    fn put_template(
        &self,
        record: &TemplateRecord,
        sketches: &TemplateSketches,
        bands: &[u64],
    ) -> Result<(), StoreError>;

    /// Atomically replace a page's record and band rows.
    fn put_page(&self, record: &PageRecord, bands: &[u64]) -> Result<(), StoreError>;

    fn get_template(&self, id: &str) -> Result<TemplateRecord, StoreError>;

    fn get_template_sketches(&self, id: &str) -> Result<TemplateSketches, StoreError>;

    fn get_page(&self, page_id: &str) -> Result<PageRecord, StoreError>;

    /// All pages of a template, ordered by page id.
    fn list_pages(&self, template_id: &str) -> Result<Vec<PageRecord>, StoreError>;

    /// Delete a template, cascading to its pages and both band indexes, in
    /// one transaction.
    fn delete_template(&self, id: &str) -> Result<(), StoreError>;

    /// Owners sharing at least one band hash with the query. Positional:
    /// `band_hashes[i]` is only matched against rows of band index `i`.
    fn lookup_candidates(
        &self,
        band_hashes: &[u64],
        kind: OwnerKind,
    ) -> Result<BTreeSet<String>, StoreError>;

    /// Capture a case baseline. Fails with [`StoreError::BaselineFrozen`] if
    /// one already exists; baselines are immutable once written.
    fn put_case_baseline(&self, baseline: &CaseBaseline) -> Result<(), StoreError>;

    fn get_case_baseline(&self, case_id: &str) -> Result<CaseBaseline, StoreError>;

    /// Append one rescan record to the case's history.
    fn append_rescan(&self, record: &RescanRecord) -> Result<(), StoreError>;

    /// Rescan history in append order.
    fn list_rescans(&self, case_id: &str) -> Result<Vec<RescanRecord>, StoreError>;

    /// Page through template ids for batch backfill; callers drive
    /// `(limit, offset)` until the returned page is empty.
    fn list_template_ids(&self, limit: usize, offset: usize) -> Result<Vec<String>, StoreError>;

    fn stats(&self) -> Result<StoreStats, StoreError>;
}
