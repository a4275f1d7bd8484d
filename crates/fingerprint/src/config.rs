//! Configuration and error types for siteprint fingerprinting.
//!
//! The fingerprinting layer is a pure function of `(content blobs, config,
//! noise table)`. Nothing in this module performs I/O; all tunables that can
//! change a sketch are carried here so that sketches remain replayable.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sketch::SketchVariant;

/// Tunables for shingling, MinHash, and LSH banding.
///
/// `dimension` is corpus-wide immutable after deployment: sketches of mixed
/// dimension are never comparable and the store rejects them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FingerprintConfig {
    /// Configuration schema version. Any change that can affect a sketch
    /// must bump this so old sketches remain recognizable.
    pub version: u32,
    /// MinHash signature length N.
    pub dimension: usize,
    /// Number of LSH bands b.
    pub bands: usize,
    /// Rows per band r. Must satisfy `bands * rows_per_band == dimension`.
    pub rows_per_band: usize,
    /// Character shingle window over normalized CSS text.
    pub css_shingle_k: usize,
    /// Character shingle window over normalized HTML text.
    pub html_shingle_k: usize,
    /// Seed for shingle hashing and the MinHash permutation family.
    pub seed: u64,
    /// Compute MinHash slots on the rayon pool.
    pub use_parallel: bool,
    /// Per-blob byte ceiling. Oversize blobs are truncated at the shingler
    /// (never at the parser) so the sketch stays stable across runs.
    pub max_blob_bytes: usize,
    /// Maximum direct children recorded in a structural child signature.
    /// Changing this invalidates stored structural fingerprints, though not
    /// MinHash sketches.
    pub structural_arity_cap: usize,
}

impl FingerprintConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the sketch dimension N.
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension;
        self
    }

    /// Set the number of LSH bands.
    pub fn with_bands(mut self, bands: usize) -> Self {
        self.bands = bands;
        self
    }

    /// Set the rows per band.
    pub fn with_rows_per_band(mut self, rows: usize) -> Self {
        self.rows_per_band = rows;
        self
    }

    /// Set the hash seed for reproducible sketches.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Enable or disable parallel MinHash computation.
    pub fn with_parallel(mut self, use_parallel: bool) -> Self {
        self.use_parallel = use_parallel;
        self
    }

    /// Validate the configuration. `bands * rows_per_band` must equal
    /// `dimension` or the LSH S-curve guarantees do not hold.
    pub fn validate(&self) -> Result<(), FingerprintError> {
        if self.dimension == 0 {
            return Err(FingerprintError::InvalidConfig {
                field: "dimension",
                reason: "must be >= 1".into(),
            });
        }
        if self.bands == 0 || self.rows_per_band == 0 {
            return Err(FingerprintError::InvalidConfig {
                field: "bands/rows_per_band",
                reason: "must be >= 1".into(),
            });
        }
        if self.bands * self.rows_per_band != self.dimension {
            return Err(FingerprintError::BandShapeMismatch {
                bands: self.bands,
                rows: self.rows_per_band,
                dimension: self.dimension,
            });
        }
        if self.css_shingle_k == 0 || self.html_shingle_k == 0 {
            return Err(FingerprintError::InvalidConfig {
                field: "css_shingle_k/html_shingle_k",
                reason: "must be >= 1".into(),
            });
        }
        if self.max_blob_bytes == 0 {
            return Err(FingerprintError::InvalidConfig {
                field: "max_blob_bytes",
                reason: "must be >= 1".into(),
            });
        }
        if self.structural_arity_cap == 0 {
            return Err(FingerprintError::InvalidConfig {
                field: "structural_arity_cap",
                reason: "must be >= 1".into(),
            });
        }
        Ok(())
    }
}

impl Default for FingerprintConfig {
    fn default() -> Self {
        Self {
            version: 1,
            dimension: 128,
            bands: 16,
            rows_per_band: 8,
            css_shingle_k: 5,
            html_shingle_k: 7,
            seed: 0x5EED_0F_7E_A4_B1_D0_0D,
            use_parallel: false,
            max_blob_bytes: 2 * 1024 * 1024,
            structural_arity_cap: 10,
        }
    }
}

/// Framework / reset / generic-pattern deny lists.
///
/// These are configuration, not code: the table is versioned and the version
/// is stamped into every fingerprint so sketches built against a stale table
/// can be found and re-indexed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NoiseConfig {
    /// Noise table version.
    pub version: u32,
    /// Class-name prefixes emitted by site builders and utility frameworks.
    pub framework_class_prefixes: Vec<String>,
    /// Selectors belonging to CSS resets rather than authored styling.
    pub reset_selectors: Vec<String>,
    /// Structural patterns that appear in essentially every template.
    pub generic_structural_patterns: Vec<String>,
}

impl NoiseConfig {
    /// A class name is framework noise if it carries a known prefix.
    pub fn is_framework_class(&self, class: &str) -> bool {
        self.framework_class_prefixes
            .iter()
            .any(|p| class.starts_with(p.as_str()))
    }

    /// A selector is reset noise if it is the universal selector, a bare tag
    /// name, a configured reset selector, or a pseudo-element on `*`.
    pub fn is_reset_selector(&self, selector: &str) -> bool {
        let sel = selector.trim();
        if sel == "*" || sel.starts_with("*::") || sel.starts_with("*:") {
            return true;
        }
        if self.reset_selectors.iter().any(|r| r == sel) {
            return true;
        }
        // Bare tag names: all-ascii-alphabetic, no class/id/combinator syntax.
        !sel.is_empty() && sel.chars().all(|c| c.is_ascii_alphanumeric())
    }

    /// A selector is framework noise if any of its class components carries a
    /// framework prefix.
    pub fn is_framework_selector(&self, selector: &str) -> bool {
        selector
            .split('.')
            .skip(1)
            .map(|frag| {
                frag.split(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_'))
                    .next()
                    .unwrap_or("")
            })
            .any(|class| self.is_framework_class(class))
    }

    pub fn is_generic_pattern(&self, pattern: &str) -> bool {
        self.generic_structural_patterns.iter().any(|g| g == pattern)
    }
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            version: 1,
            framework_class_prefixes: vec![
                "w-".into(),
                "wf-".into(),
                "is-".into(),
                "has-".into(),
                "u-".into(),
                "js-".into(),
            ],
            reset_selectors: vec!["html".into(), "body".into()],
            generic_structural_patterns: vec![
                "div[div]".into(),
                "div[div,div]".into(),
                "div[div,div,div]".into(),
                "ul[li]".into(),
                "ul[li,li]".into(),
                "ol[li]".into(),
            ],
        }
    }
}

/// Errors produced by the fingerprinting layer.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FingerprintError {
    #[error("invalid config: {field} {reason}")]
    InvalidConfig {
        field: &'static str,
        reason: String,
    },

    #[error("band shape mismatch: {bands} bands x {rows} rows != dimension {dimension}")]
    BandShapeMismatch {
        bands: usize,
        rows: usize,
        dimension: usize,
    },

    #[error(
        "sketch mismatch: cannot compare {left_variant:?}/{left_dim} against {right_variant:?}/{right_dim}"
    )]
    DimensionMismatch {
        left_variant: SketchVariant,
        left_dim: usize,
        right_variant: SketchVariant,
        right_dim: usize,
    },

    #[error("unsupported sketch format version {0}")]
    UnsupportedFormatVersion(u8),

    #[error("unknown sketch variant tag {0}")]
    UnknownVariant(u8),

    #[error("corrupt sketch blob: {0}")]
    CorruptSketch(String),
}
