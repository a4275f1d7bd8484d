//! Depth-weighted structural matching between two documents.

use serde::{Deserialize, Serialize};

use fingerprint::{StructuralFingerprint, StructuralLevel};

use crate::AnalyzeConfig;

/// One pattern present in both documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuralMatch {
    pub pattern: String,
    pub level: StructuralLevel,
    /// `min(weight_a, weight_b)` — the weight actually credited.
    pub weight: f64,
}

/// Structural comparison summary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuralReport {
    /// `matched_weight / total_weight(a)`, 0 when `a` has no patterns.
    pub score: f64,
    pub matched_weight: f64,
    pub total_weight: f64,
    /// Top matches by credited weight.
    pub matches: Vec<StructuralMatch>,
}

/// Compare two structural fingerprints.
///
/// The score is asymmetric by design: it answers "how much of `a`'s
/// structure reappears in `b`", which is the reporter's question when `a`
/// is the original.
pub fn match_structures(
    a: &StructuralFingerprint,
    b: &StructuralFingerprint,
    cfg: &AnalyzeConfig,
) -> StructuralReport {
    let mut matches = Vec::new();
    let mut matched_weight = 0.0;

    for (pattern, stats_a) in &a.patterns {
        let Some(stats_b) = b.patterns.get(pattern) else {
            continue;
        };
        let weight = stats_a.weight.min(stats_b.weight);
        matched_weight += weight;
        matches.push(StructuralMatch {
            pattern: pattern.clone(),
            level: stats_a.level,
            weight,
        });
    }

    matches.sort_by(|x, y| {
        y.weight
            .partial_cmp(&x.weight)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| x.pattern.cmp(&y.pattern))
    });
    matches.truncate(cfg.max_structural_matches);

    let score = if a.total_weight > 0.0 {
        matched_weight / a.total_weight
    } else {
        0.0
    };

    StructuralReport {
        score,
        matched_weight,
        total_weight: a.total_weight,
        matches,
    }
}
