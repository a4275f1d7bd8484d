//! The similarity engine: orchestration of fetch, fingerprint, store,
//! retrieve, and analyze.
//!
//! All collaborators are injected — the engine owns no process-global
//! state. Fetching is the async suspension surface; fingerprinting and
//! analysis run synchronously inside the calling task; store writes are
//! per-owner transactions with a single retry on write conflicts.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use analyze::{
    align_pages, estimate, evaluate_rescan, mine_identical_rules, mine_renamed_blocks,
    rank_candidates, match_structures, PageAlignment, PageSketchInfo, RankedCandidate,
    RuleEvidence, SimilarityResult, StructuralReport, Verdict,
};
use fetch::{extract_url, fetch_pages, Fetcher, PageDiscoverer};
use fingerprint::{band_hashes, fingerprint_template, PageContent, TemplateFingerprint};
use retrieve::Retriever;
use store::{
    CaseBaseline, OwnerKind, PageRecord, RescanRecord, RescanVerdict, SketchStore, StoreError,
    TemplateRecord, TemplateSketches,
};

use crate::{EngineConfig, EngineError};

/// One captured URL: fetched pages plus their template fingerprint.
pub struct Captured {
    pub url: String,
    pub fingerprint: TemplateFingerprint,
    /// path -> page url, for building page records.
    pub page_urls: Vec<(String, String)>,
    /// Whether the crawl finished inside the global deadline.
    pub complete: bool,
}

/// Result of indexing one template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexOutcome {
    pub id: String,
    pub url: String,
    pub pages_indexed: usize,
    /// (css, html, combined) shingle cardinalities.
    pub shingle_counts: (u32, u32, u32),
    pub band_count: usize,
    /// False when the crawl hit the deadline; `last_full_index_at` stays
    /// unset so a later pass can upgrade the template.
    pub complete: bool,
}

/// Full comparison report between two resolved sides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompareReport {
    pub a: String,
    pub b: String,
    pub combined: SimilarityResult,
    pub css: SimilarityResult,
    pub html: SimilarityResult,
    /// Exact Jaccard over custom class names.
    pub class_jaccard: f64,
    /// Exact Jaccard over normalized declarations.
    pub declaration_jaccard: f64,
    pub verdict: Verdict,
    pub evidence: RuleEvidence,
    pub structural: StructuralReport,
    pub page_alignment: Option<PageAlignment>,
}

/// Comparison either scores or states exactly what was missing — scores are
/// never fabricated for an unknown side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CompareOutcome {
    Scored(Box<CompareReport>),
    Indeterminate { missing: Vec<String> },
}

/// Scan recommendation band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanRecommendation {
    LikelyDerivative,
    NeedsReview,
    AppearsOriginal,
}

impl ScanRecommendation {
    pub fn as_str(self) -> &'static str {
        match self {
            ScanRecommendation::LikelyDerivative => "likely_derivative",
            ScanRecommendation::NeedsReview => "needs_review",
            ScanRecommendation::AppearsOriginal => "appears_original",
        }
    }
}

/// Result of scanning a URL against the indexed corpus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanReport {
    pub url: String,
    pub matches: Vec<RankedCandidate>,
    pub recommendation: ScanRecommendation,
}

/// Result of opening a case: the frozen baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseOpened {
    pub case_id: String,
    pub baseline_similarity: f64,
    pub captured_at: DateTime<Utc>,
}

/// Result of one rescan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RescanReport {
    pub case_id: String,
    pub drift: f64,
    pub current_similarity: f64,
    pub previous_similarity: Option<f64>,
    pub verdict: RescanVerdict,
    pub explanation: String,
}

/// Corpus counters for `/health`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub templates_indexed: u64,
    pub pages_indexed: u64,
    pub band_rows: u64,
    pub version: String,
}

/// Retry an owner-scoped store write once when a concurrent writer won.
fn retry_once<T>(mut op: impl FnMut() -> Result<T, StoreError>) -> Result<T, StoreError> {
    match op() {
        Err(StoreError::Conflict(detail)) => {
            tracing::warn!(conflict = %detail, "store write conflict; retrying once");
            op()
        }
        other => other,
    }
}

fn exact_jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let shared = a.intersection(b).count();
    let union = a.len() + b.len() - shared;
    shared as f64 / union as f64
}

/// The engine. See crate docs for the component map.
pub struct SimilarityEngine {
    fetcher: Arc<dyn Fetcher>,
    discoverer: Arc<dyn PageDiscoverer>,
    store: Arc<dyn SketchStore>,
    retriever: Retriever,
    config: EngineConfig,
}

impl SimilarityEngine {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        discoverer: Arc<dyn PageDiscoverer>,
        store: Arc<dyn SketchStore>,
        config: EngineConfig,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let retriever = Retriever::new(store.clone(), config.fingerprint.clone())?;
        Ok(Self {
            fetcher,
            discoverer,
            store,
            retriever,
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn SketchStore> {
        &self.store
    }

    /// Fetch a URL (multi-page, global deadline) and fingerprint it.
    pub async fn capture(&self, url_text: &str) -> Result<Captured, EngineError> {
        let url = extract_url(url_text)?;
        let deadline = Duration::from_secs(self.config.fetch_deadline_secs);
        let started = Instant::now();
        let fetched = fetch_pages(
            self.fetcher.as_ref(),
            self.discoverer.as_ref(),
            &url,
            self.config.page_budget,
            deadline,
        )
        .await?;
        let complete = started.elapsed() < deadline;

        let contents: Vec<PageContent> = fetched
            .iter()
            .map(|page| PageContent {
                path: page.info.path.clone(),
                html: page.document.html.clone(),
                css: page.document.css.clone(),
                js: page.document.js.clone(),
            })
            .collect();
        let fingerprint =
            fingerprint_template(&contents, &self.config.fingerprint, &self.config.noise);

        Ok(Captured {
            url: url.to_string(),
            page_urls: fetched
                .into_iter()
                .map(|page| (page.info.path, page.info.url))
                .collect(),
            fingerprint,
            complete,
        })
    }

    /// Fetch and fingerprint without touching the store.
    pub async fn fingerprint_url(&self, url_text: &str) -> Result<Captured, EngineError> {
        self.capture(url_text).await
    }

    /// Index (or re-index) a template under the given id.
    ///
    /// Idempotent for identical content: the same bytes produce the same
    /// sketches and the same band rows, and the per-owner transaction
    /// replaces rather than accumulates.
    pub async fn index_template(
        &self,
        id: &str,
        url_text: &str,
        creator: Option<&str>,
    ) -> Result<IndexOutcome, EngineError> {
        let captured = self.capture(url_text).await?;
        let now = Utc::now();

        // created_at is immutable; carry it (and any prior full-index stamp)
        // across re-indexing.
        let (created_at, prior_full) = match self.store.get_template(id) {
            Ok(existing) => (existing.created_at, existing.last_full_index_at),
            Err(StoreError::NotFound { .. }) => (now, None),
            Err(err) => return Err(err.into()),
        };

        let doc = &captured.fingerprint.document;
        let sketches = TemplateSketches {
            css: doc.css_sketch.clone(),
            html: doc.html_sketch.clone(),
            combined: doc.combined_sketch.clone(),
            updated_at: now,
        };
        let bands = band_hashes(&sketches.combined, &self.config.fingerprint)?;
        let record = TemplateRecord {
            id: id.to_string(),
            url: captured.url.clone(),
            creator: creator.map(str::to_string),
            created_at,
            last_full_index_at: if captured.complete {
                Some(now)
            } else {
                prior_full
            },
        };
        retry_once(|| self.store.put_template(&record, &sketches, &bands))?;

        for page in &captured.fingerprint.pages {
            let page_bands = band_hashes(&page.sketch, &self.config.fingerprint)?;
            let url = captured
                .page_urls
                .iter()
                .find(|(path, _)| path == &page.path)
                .map(|(_, url)| url.clone())
                .unwrap_or_else(|| captured.url.clone());
            let page_record = PageRecord {
                page_id: format!("{id}::{}", page.path),
                template_id: id.to_string(),
                url,
                path: page.path.clone(),
                page_type: page.page_type,
                type_confidence: page.type_confidence,
                sketch: page.sketch.clone(),
                html_bytes: page.html_bytes as u64,
                unique_class_count: page.unique_class_count as u32,
                max_dom_depth: page.max_dom_depth as u32,
                indexed_at: now,
            };
            retry_once(|| self.store.put_page(&page_record, &page_bands))?;
        }

        tracing::info!(
            template = id,
            pages = captured.fingerprint.pages.len(),
            complete = captured.complete,
            "indexed template"
        );

        Ok(IndexOutcome {
            id: id.to_string(),
            url: captured.url,
            pages_indexed: captured.fingerprint.pages.len(),
            shingle_counts: doc.shingle_counts(),
            band_count: bands.len(),
            complete: captured.complete,
        })
    }

    /// Resolve a compare side to a fetchable URL. Anything that names an
    /// indexed template resolves to its canonical URL; otherwise the text
    /// must itself contain a URL. A bare token that is neither is reported
    /// as missing, never guessed into a hostname.
    fn resolve_side(&self, side: &str) -> Result<Option<String>, EngineError> {
        match self.store.get_template(side) {
            Ok(record) => Ok(Some(record.url)),
            Err(StoreError::NotFound { .. }) => {
                if !side.contains("://") && !side.contains('.') {
                    return Ok(None);
                }
                match extract_url(side) {
                    Ok(url) => Ok(Some(url.to_string())),
                    Err(_) => Ok(None),
                }
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Compare two sides (owner ids or URLs) on live content.
    pub async fn compare(&self, a: &str, b: &str) -> Result<CompareOutcome, EngineError> {
        let mut missing = Vec::new();
        let url_a = self.resolve_side(a)?;
        if url_a.is_none() {
            missing.push(a.to_string());
        }
        let url_b = self.resolve_side(b)?;
        if url_b.is_none() {
            missing.push(b.to_string());
        }
        let (Some(url_a), Some(url_b)) = (url_a, url_b) else {
            return Ok(CompareOutcome::Indeterminate { missing });
        };

        let side_a = self.capture(&url_a).await?;
        let side_b = self.capture(&url_b).await?;
        let doc_a = &side_a.fingerprint.document;
        let doc_b = &side_b.fingerprint.document;

        let combined = estimate(&doc_a.combined_sketch, &doc_b.combined_sketch)?;
        let css = estimate(&doc_a.css_sketch, &doc_b.css_sketch)?;
        let html = estimate(&doc_a.html_sketch, &doc_b.html_sketch)?;

        let mut evidence = mine_identical_rules(
            &doc_a.rule_map,
            &doc_b.rule_map,
            &self.config.noise,
            &self.config.analyze,
        );
        // Class renames empty the selector intersection; shared declaration
        // blocks under different names are still evidence.
        if evidence.identical_rules.is_empty() {
            evidence.property_combinations.extend(mine_renamed_blocks(
                &doc_a.rule_map,
                &doc_b.rule_map,
                &self.config.noise,
                &self.config.analyze,
            ));
        }

        let structural = match_structures(&doc_a.structure, &doc_b.structure, &self.config.analyze);

        let page_alignment = if side_a.fingerprint.pages.len() > 1
            && side_b.fingerprint.pages.len() > 1
        {
            let to_infos = |captured: &Captured, label: &str| -> Vec<PageSketchInfo> {
                captured
                    .fingerprint
                    .pages
                    .iter()
                    .map(|p| PageSketchInfo {
                        page_id: format!("{label}::{}", p.path),
                        page_type: p.page_type,
                        sketch: p.sketch.clone(),
                    })
                    .collect()
            };
            Some(align_pages(
                &to_infos(&side_a, a),
                &to_infos(&side_b, b),
                &self.config.analyze,
            )?)
        } else {
            None
        };

        Ok(CompareOutcome::Scored(Box::new(CompareReport {
            a: a.to_string(),
            b: b.to_string(),
            class_jaccard: exact_jaccard(&doc_a.class_shingles, &doc_b.class_shingles),
            declaration_jaccard: exact_jaccard(
                &doc_a.declaration_shingles,
                &doc_b.declaration_shingles,
            ),
            verdict: Verdict::from_jaccard(combined.jaccard, &self.config.analyze),
            combined,
            css,
            html,
            evidence,
            structural,
            page_alignment,
        })))
    }

    /// Scan a URL against the indexed corpus.
    pub async fn scan(
        &self,
        url_text: &str,
        threshold: Option<f64>,
    ) -> Result<ScanReport, EngineError> {
        let captured = self.capture(url_text).await?;
        let query = &captured.fingerprint.document.combined_sketch;

        let candidate_ids =
            self.retriever
                .candidates(query, OwnerKind::Template, None, None)?;
        let mut candidates = Vec::with_capacity(candidate_ids.len());
        for id in candidate_ids {
            match self.store.get_template_sketches(&id) {
                Ok(sketches) => candidates.push((id, sketches.combined)),
                // A band row without a sketch row cannot happen inside one
                // owner transaction; if observed, skip rather than abort.
                Err(StoreError::NotFound { .. }) => {
                    tracing::warn!(template = %id, "candidate without stored sketches; skipped");
                }
                Err(err) => return Err(err.into()),
            }
        }

        let mut analyze_cfg = self.config.analyze.clone();
        if let Some(threshold) = threshold {
            analyze_cfg.candidate_threshold = threshold;
        }
        let matches = rank_candidates(query, candidates, &analyze_cfg)?;

        let recommendation = match matches.first().map(|m| m.verdict) {
            Some(Verdict::HighSimilarity) => ScanRecommendation::LikelyDerivative,
            Some(Verdict::Moderate) => ScanRecommendation::NeedsReview,
            _ => ScanRecommendation::AppearsOriginal,
        };

        Ok(ScanReport {
            url: captured.url,
            matches,
            recommendation,
        })
    }

    /// Open a case: freeze the alleged copy's sketch as the baseline.
    pub async fn open_case(
        &self,
        case_id: &str,
        original_template_id: &str,
        alleged_url: &str,
    ) -> Result<CaseOpened, EngineError> {
        let original = self.store.get_template_sketches(original_template_id)?;
        let captured = self.capture(alleged_url).await?;
        let baseline_sketch = captured.fingerprint.document.combined_sketch.clone();
        let baseline_similarity = baseline_sketch.estimate_jaccard(&original.combined)?;
        let captured_at = Utc::now();

        self.store.put_case_baseline(&CaseBaseline {
            case_id: case_id.to_string(),
            original_template_id: original_template_id.to_string(),
            alleged_url: captured.url,
            baseline_sketch,
            baseline_similarity,
            captured_at,
        })?;

        Ok(CaseOpened {
            case_id: case_id.to_string(),
            baseline_similarity,
            captured_at,
        })
    }

    /// Re-fetch a case's alleged copy and evaluate drift against the frozen
    /// baseline. Appends one rescan record regardless of verdict.
    pub async fn rescan(&self, case_id: &str) -> Result<RescanReport, EngineError> {
        let baseline = match self.store.get_case_baseline(case_id) {
            Ok(baseline) => baseline,
            Err(StoreError::NotFound { .. }) => {
                let record = RescanRecord {
                    case_id: case_id.to_string(),
                    drift: 0.0,
                    current_similarity: 0.0,
                    previous_similarity: None,
                    verdict: RescanVerdict::NoBaseline,
                    scanned_at: Utc::now(),
                };
                self.store.append_rescan(&record)?;
                return Ok(RescanReport {
                    case_id: case_id.to_string(),
                    drift: 0.0,
                    current_similarity: 0.0,
                    previous_similarity: None,
                    verdict: RescanVerdict::NoBaseline,
                    explanation: "no baseline sketch was captured for this case".into(),
                });
            }
            Err(err) => return Err(err.into()),
        };

        let original = self
            .store
            .get_template_sketches(&baseline.original_template_id)?;
        let captured = self.capture(&baseline.alleged_url).await?;
        let current = &captured.fingerprint.document.combined_sketch;

        let outcome = evaluate_rescan(
            Some(&baseline.baseline_sketch),
            current,
            &original.combined,
            &self.config.analyze,
        )?;

        let previous_similarity = self
            .store
            .list_rescans(case_id)?
            .last()
            .map(|r| r.current_similarity)
            .or(Some(baseline.baseline_similarity));

        self.store.append_rescan(&RescanRecord {
            case_id: case_id.to_string(),
            drift: outcome.drift,
            current_similarity: outcome.current_similarity,
            previous_similarity,
            verdict: outcome.verdict,
            scanned_at: Utc::now(),
        })?;

        Ok(RescanReport {
            case_id: case_id.to_string(),
            drift: outcome.drift,
            current_similarity: outcome.current_similarity,
            previous_similarity,
            verdict: outcome.verdict,
            explanation: outcome.explanation(),
        })
    }

    /// One page of sketch-algorithm backfill: re-index `limit` templates
    /// starting at `offset`. The caller drives until the returned page is
    /// empty; each template commits in its own transactions.
    pub async fn reindex_page(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<String>, EngineError> {
        let ids = self.store.list_template_ids(limit, offset)?;
        let mut processed = Vec::with_capacity(ids.len());
        for id in ids {
            let record = self.store.get_template(&id)?;
            match self
                .index_template(&id, &record.url, record.creator.as_deref())
                .await
            {
                Ok(_) => processed.push(id),
                Err(EngineError::Fetch(err)) => {
                    // Unreachable URL: the prior sketch stays untouched.
                    tracing::warn!(template = %id, error = %err, "backfill fetch failed; keeping prior sketch");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(processed)
    }

    pub fn health(&self) -> Result<HealthReport, EngineError> {
        let stats = self.store.stats()?;
        Ok(HealthReport {
            templates_indexed: stats.templates,
            pages_indexed: stats.pages,
            band_rows: stats.template_band_rows + stats.page_band_rows,
            version: env!("CARGO_PKG_VERSION").to_string(),
        })
    }
}
