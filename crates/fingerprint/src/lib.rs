//! # Siteprint Fingerprinting
//!
//! Converts raw template content (HTML, CSS, script text) into the compact
//! structures the rest of the system compares:
//!
//! - **MinHash sketches** in three variants (`css`, `html`, `combined`),
//!   fixed dimension corpus-wide, with a binary wire codec.
//! - **LSH band hashes** over those sketches for sub-linear candidate
//!   retrieval.
//! - **CSS rule maps** (`selector -> normalized declarations`) for
//!   identical-rule mining.
//! - **Structural fingerprints**: depth-weighted `(parent, children)`
//!   patterns from a streaming tag-stack pass.
//! - **Page-type classification** from URL paths.
//!
//! The whole crate is deterministic and free of I/O: fingerprints are a pure
//! function of `(content, FingerprintConfig, NoiseConfig)`, and both config
//! versions are stamped into the output so stale sketches can be recognized
//! and re-indexed after any algorithm or noise-table change.

pub mod bands;
pub mod config;
pub mod css;
pub mod minhash;
pub mod page_type;
pub mod pipeline;
pub mod shingle;
pub mod sketch;
pub mod structure;

pub use bands::band_hashes;
pub use config::{FingerprintConfig, FingerprintError, NoiseConfig};
pub use css::{parse_rules, ParseStats, RuleMap};
pub use minhash::{minhash_signature, EMPTY_SLOT};
pub use page_type::{classify_path, PageType};
pub use pipeline::{
    fingerprint_document, fingerprint_page, fingerprint_template, retrieval_bands,
    DocumentFingerprint, PageContent, PageFingerprint, TemplateFingerprint,
};
pub use shingle::{hash_shingle, normalize_text, truncate_blob};
pub use sketch::{Confidence, Sketch, SketchVariant, SKETCH_FORMAT_VERSION};
pub use structure::{structural_fingerprint, PatternStats, StructuralFingerprint, StructuralLevel};
