//! End-to-end fingerprinting of documents, pages, and templates.
//!
//! Everything here is a pure function of `(content, config, noise table)`.
//! Incomplete content is always accepted: an empty CSS blob produces an
//! empty rule map and an empty css sketch, never an error.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::bands::band_hashes;
use crate::config::{FingerprintConfig, FingerprintError, NoiseConfig};
use crate::css::{parse_rules, ParseStats, RuleMap};
use crate::minhash::minhash_signature;
use crate::page_type::{classify_path, PageType};
use crate::shingle::{char_kgram_hashes, custom_classes, hash_shingle, truncate_blob};
use crate::sketch::{Sketch, SketchVariant};
use crate::structure::{structural_fingerprint, StructuralFingerprint};

/// One page's raw content blobs, keyed by its URL path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageContent {
    pub path: String,
    pub html: String,
    pub css: String,
    pub js: String,
}

/// Full fingerprint of a single document (or of a template's concatenated
/// content): the three sketch variants plus the evidence structures the
/// analyzer mines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentFingerprint {
    pub css_sketch: Sketch,
    pub html_sketch: Sketch,
    pub combined_sketch: Sketch,
    /// Selector -> normalized declarations, for identical-rule mining.
    pub rule_map: RuleMap,
    pub structure: StructuralFingerprint,
    /// Exact custom-class shingle set (for exact sub-scores in evidence).
    pub class_shingles: BTreeSet<String>,
    /// Exact declaration shingle set.
    pub declaration_shingles: BTreeSet<String>,
    pub parse_stats: ParseStats,
    /// Versions stamped so stale sketches can be found and re-indexed.
    pub config_version: u32,
    pub noise_version: u32,
}

/// Per-page fingerprint and metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageFingerprint {
    pub path: String,
    pub page_type: PageType,
    pub type_confidence: f32,
    /// Combined-variant sketch over the page's own content.
    pub sketch: Sketch,
    pub html_bytes: usize,
    pub unique_class_count: usize,
    pub max_dom_depth: usize,
}

/// Aggregate fingerprint of a multi-page template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateFingerprint {
    /// Fingerprint of the concatenated page content.
    pub document: DocumentFingerprint,
    pub pages: Vec<PageFingerprint>,
}

impl DocumentFingerprint {
    /// Shingle counts per variant, in (css, html, combined) order.
    pub fn shingle_counts(&self) -> (u32, u32, u32) {
        (
            self.css_sketch.shingle_count,
            self.html_sketch.shingle_count,
            self.combined_sketch.shingle_count,
        )
    }
}

fn sketch_from_hashes(
    variant: SketchVariant,
    hashes: &BTreeSet<u64>,
    cfg: &FingerprintConfig,
) -> Sketch {
    let unique: Vec<u64> = hashes.iter().copied().collect();
    Sketch {
        variant,
        values: minhash_signature(&unique, cfg.dimension, cfg.seed, cfg.use_parallel),
        shingle_count: unique.len() as u32,
    }
}

/// Fingerprint one document's blobs.
pub fn fingerprint_document(
    html: &str,
    css: &str,
    js: &str,
    cfg: &FingerprintConfig,
    noise: &NoiseConfig,
) -> DocumentFingerprint {
    let html = truncate_blob(html, cfg.max_blob_bytes);
    let css = truncate_blob(css, cfg.max_blob_bytes);
    let js = truncate_blob(js, cfg.max_blob_bytes);

    let mut parse_stats = ParseStats::default();
    let rule_map = parse_rules(css, &mut parse_stats);
    if parse_stats.tolerated() > 0 {
        tracing::debug!(
            tolerated = parse_stats.tolerated(),
            "css extraction tolerated malformed content"
        );
    }

    let class_shingles = custom_classes(rule_map.keys(), noise);
    let declaration_shingles: BTreeSet<String> =
        rule_map.values().flat_map(|decls| decls.iter().cloned()).collect();

    // Css variant: class names plus bare declarations.
    let css_hashes: BTreeSet<u64> = class_shingles
        .iter()
        .map(|c| hash_shingle(c, cfg.seed))
        .chain(declaration_shingles.iter().map(|d| hash_shingle(d, cfg.seed)))
        .collect();

    // Html variant: retained structural pattern keys.
    let structure = structural_fingerprint(html, cfg, noise);
    let html_hashes: BTreeSet<u64> = structure
        .pattern_keys()
        .map(|k| hash_shingle(k, cfg.seed))
        .collect();

    // Combined variant: character k-grams over all three blobs.
    let mut combined_hashes = char_kgram_hashes(css, cfg.css_shingle_k, cfg.max_blob_bytes, cfg.seed);
    combined_hashes.extend(char_kgram_hashes(
        html,
        cfg.html_shingle_k,
        cfg.max_blob_bytes,
        cfg.seed,
    ));
    combined_hashes.extend(char_kgram_hashes(
        js,
        cfg.html_shingle_k,
        cfg.max_blob_bytes,
        cfg.seed,
    ));

    DocumentFingerprint {
        css_sketch: sketch_from_hashes(SketchVariant::Css, &css_hashes, cfg),
        html_sketch: sketch_from_hashes(SketchVariant::Html, &html_hashes, cfg),
        combined_sketch: sketch_from_hashes(SketchVariant::Combined, &combined_hashes, cfg),
        rule_map,
        structure,
        class_shingles,
        declaration_shingles,
        parse_stats,
        config_version: cfg.version,
        noise_version: noise.version,
    }
}

/// Fingerprint one page: combined sketch plus page metadata.
pub fn fingerprint_page(
    content: &PageContent,
    cfg: &FingerprintConfig,
    noise: &NoiseConfig,
) -> PageFingerprint {
    let html = truncate_blob(&content.html, cfg.max_blob_bytes);
    let css = truncate_blob(&content.css, cfg.max_blob_bytes);
    let js = truncate_blob(&content.js, cfg.max_blob_bytes);

    let mut hashes = char_kgram_hashes(css, cfg.css_shingle_k, cfg.max_blob_bytes, cfg.seed);
    hashes.extend(char_kgram_hashes(html, cfg.html_shingle_k, cfg.max_blob_bytes, cfg.seed));
    hashes.extend(char_kgram_hashes(js, cfg.html_shingle_k, cfg.max_blob_bytes, cfg.seed));

    let structure = structural_fingerprint(html, cfg, noise);
    let (page_type, type_confidence) = classify_path(&content.path);

    PageFingerprint {
        path: content.path.clone(),
        page_type,
        type_confidence,
        sketch: sketch_from_hashes(SketchVariant::Combined, &hashes, cfg),
        html_bytes: content.html.len(),
        unique_class_count: structure.unique_class_count,
        max_dom_depth: structure.max_depth,
    }
}

/// Fingerprint a template from its fetched pages.
///
/// The aggregate document is the concatenation of every page's blobs;
/// per-page sketches are computed alongside. Partial crawls are fine: the
/// fingerprint covers whatever pages are present.
pub fn fingerprint_template(
    pages: &[PageContent],
    cfg: &FingerprintConfig,
    noise: &NoiseConfig,
) -> TemplateFingerprint {
    let mut html = String::new();
    let mut css = String::new();
    let mut js = String::new();
    for page in pages {
        html.push_str(&page.html);
        html.push('\n');
        css.push_str(&page.css);
        css.push('\n');
        js.push_str(&page.js);
        js.push('\n');
    }

    TemplateFingerprint {
        document: fingerprint_document(&html, &css, &js, cfg, noise),
        pages: pages.iter().map(|p| fingerprint_page(p, cfg, noise)).collect(),
    }
}

/// Band hashes for every variant sketch of a template fingerprint, used by
/// the store to maintain the LSH inverted index. The combined sketch drives
/// retrieval; this helper exists so indexing and querying cannot drift.
pub fn retrieval_bands(
    fp: &TemplateFingerprint,
    cfg: &FingerprintConfig,
) -> Result<Vec<u64>, FingerprintError> {
    band_hashes(&fp.document.combined_sketch, cfg)
}
