//! # Siteprint Analyzer
//!
//! Stateless scoring and evidence over the structures the fingerprinter
//! produces: Jaccard estimation with typed verdicts, candidate ranking,
//! identical-rule mining, depth-weighted structural matching, page-type
//! alignment, and the drift decision tree for case rescans.
//!
//! The analyzer holds no corpus state. It consumes sketches, rule maps, and
//! structural fingerprints handed to it and returns derived results; its
//! only persistent effect — appending rescan records — is performed by the
//! engine using the outcome types defined here.

pub mod drift;
pub mod pages;
pub mod rules;
pub mod similarity;
pub mod structural;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use fingerprint::FingerprintError;

pub use drift::{evaluate_rescan, RescanOutcome};
pub use pages::{align_pages, PageAlignment, PagePair, PageSketchInfo};
pub use rules::{
    mine_identical_rules, mine_renamed_blocks, IdenticalRule, PropertyCombination, RuleEvidence,
};
pub use similarity::{estimate, rank_candidates, RankedCandidate, SimilarityResult, Verdict};
pub use structural::{match_structures, StructuralMatch, StructuralReport};

/// Scoring thresholds. Every constant that appears anywhere in the analysis
/// lives here, so operators tune centrally instead of chasing duplicated
/// literals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzeConfig {
    /// Candidates below this Jaccard are dropped from scan results.
    pub candidate_threshold: f64,
    /// At or above: `high_similarity`.
    pub high_similarity_floor: f64,
    /// At or above: `moderate`.
    pub moderate_similarity_floor: f64,
    /// Minimum shared declarations for an identical rule.
    pub rule_min_common_decls: usize,
    /// Minimum declaration overlap ratio for an identical rule.
    pub rule_overlap_floor: f64,
    /// Identical rules retained per comparison.
    pub max_identical_rules: usize,
    /// Structural matches retained per comparison.
    pub max_structural_matches: usize,
    /// Cross-template page pairs at or above this Jaccard are suspicious.
    pub suspicious_page_floor: f64,
    /// Rescan: below this similarity (with enough drift) a case resolves.
    pub drift_resolved_similarity: f64,
    /// Rescan: minimum drift for resolution.
    pub drift_resolved_minimum_drift: f64,
    /// Rescan: below this drift the changes are insufficient.
    pub drift_insufficient_max: f64,
}

impl Default for AnalyzeConfig {
    fn default() -> Self {
        Self {
            candidate_threshold: 0.30,
            high_similarity_floor: 0.70,
            moderate_similarity_floor: 0.50,
            rule_min_common_decls: 2,
            rule_overlap_floor: 0.50,
            max_identical_rules: 30,
            max_structural_matches: 20,
            suspicious_page_floor: 0.50,
            drift_resolved_similarity: 0.35,
            drift_resolved_minimum_drift: 0.20,
            drift_insufficient_max: 0.10,
        }
    }
}

impl AnalyzeConfig {
    pub fn validate(&self) -> Result<(), AnalyzeError> {
        let unit = [
            ("candidate_threshold", self.candidate_threshold),
            ("high_similarity_floor", self.high_similarity_floor),
            ("moderate_similarity_floor", self.moderate_similarity_floor),
            ("rule_overlap_floor", self.rule_overlap_floor),
            ("suspicious_page_floor", self.suspicious_page_floor),
            ("drift_resolved_similarity", self.drift_resolved_similarity),
            (
                "drift_resolved_minimum_drift",
                self.drift_resolved_minimum_drift,
            ),
            ("drift_insufficient_max", self.drift_insufficient_max),
        ];
        for (name, value) in unit {
            if !(0.0..=1.0).contains(&value) {
                return Err(AnalyzeError::InvalidConfig {
                    field: name,
                    reason: format!("{value} is outside [0, 1]"),
                });
            }
        }
        if self.moderate_similarity_floor > self.high_similarity_floor {
            return Err(AnalyzeError::InvalidConfig {
                field: "moderate_similarity_floor",
                reason: "must not exceed high_similarity_floor".into(),
            });
        }
        if self.rule_min_common_decls == 0 {
            return Err(AnalyzeError::InvalidConfig {
                field: "rule_min_common_decls",
                reason: "must be >= 1".into(),
            });
        }
        Ok(())
    }
}

/// Errors surfaced by analysis.
#[derive(Debug, Error)]
pub enum AnalyzeError {
    #[error("invalid analyze config: {field} {reason}")]
    InvalidConfig {
        field: &'static str,
        reason: String,
    },

    /// Sketches of differing dimension or variant reached a comparison;
    /// this indicates a migration bug, not a low similarity.
    #[error(transparent)]
    Fingerprint(#[from] FingerprintError),
}
