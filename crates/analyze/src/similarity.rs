//! Jaccard scoring, verdict bands, and candidate ranking.

use serde::{Deserialize, Serialize};

use fingerprint::{Confidence, Sketch};

use crate::{AnalyzeConfig, AnalyzeError};

/// One Jaccard estimate with its interpretation context.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimilarityResult {
    pub jaccard: f64,
    pub confidence: Confidence,
    /// Shingle cardinalities of the two sides, in query/candidate order.
    pub shingle_counts: (u32, u32),
}

/// Typed similarity band. Never stringly-typed at internal boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    HighSimilarity,
    Moderate,
    Low,
    Distinct,
}

impl Verdict {
    pub fn from_jaccard(jaccard: f64, cfg: &AnalyzeConfig) -> Self {
        if jaccard >= cfg.high_similarity_floor {
            Verdict::HighSimilarity
        } else if jaccard >= cfg.moderate_similarity_floor {
            Verdict::Moderate
        } else if jaccard >= cfg.candidate_threshold {
            Verdict::Low
        } else {
            Verdict::Distinct
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::HighSimilarity => "high_similarity",
            Verdict::Moderate => "moderate",
            Verdict::Low => "low",
            Verdict::Distinct => "distinct",
        }
    }
}

/// Estimate similarity between two sketches of the same variant/dimension.
pub fn estimate(query: &Sketch, candidate: &Sketch) -> Result<SimilarityResult, AnalyzeError> {
    let jaccard = query.estimate_jaccard(candidate)?;
    let min_cardinality = query.shingle_count.min(candidate.shingle_count) as usize;
    Ok(SimilarityResult {
        jaccard,
        confidence: Confidence::from_cardinality(min_cardinality),
        shingle_counts: (query.shingle_count, candidate.shingle_count),
    })
}

/// One scored candidate from a scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedCandidate {
    pub owner_id: String,
    pub jaccard: f64,
    pub confidence: Confidence,
    pub verdict: Verdict,
}

/// Score every candidate against the query, keep those at or above the
/// candidate threshold, and sort best-first.
pub fn rank_candidates(
    query: &Sketch,
    candidates: impl IntoIterator<Item = (String, Sketch)>,
    cfg: &AnalyzeConfig,
) -> Result<Vec<RankedCandidate>, AnalyzeError> {
    let mut ranked = Vec::new();
    for (owner_id, sketch) in candidates {
        let result = estimate(query, &sketch)?;
        if result.jaccard < cfg.candidate_threshold {
            continue;
        }
        ranked.push(RankedCandidate {
            owner_id,
            jaccard: result.jaccard,
            confidence: result.confidence,
            verdict: Verdict::from_jaccard(result.jaccard, cfg),
        });
    }
    ranked.sort_by(|a, b| {
        b.jaccard
            .partial_cmp(&a.jaccard)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.owner_id.cmp(&b.owner_id))
    });
    Ok(ranked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fingerprint::{minhash_signature, SketchVariant};

    fn sketch(shingles: &[u64]) -> Sketch {
        Sketch {
            variant: SketchVariant::Combined,
            values: minhash_signature(shingles, 128, 42, false),
            shingle_count: shingles.len() as u32,
        }
    }

    #[test]
    fn estimate_reports_confidence_from_smaller_side() {
        let a = sketch(&(0..1000).collect::<Vec<_>>());
        let b = sketch(&(0..30).collect::<Vec<_>>());
        let result = estimate(&a, &b).unwrap();
        assert_eq!(result.confidence, Confidence::Low);
        assert_eq!(result.shingle_counts, (1000, 30));
    }

    #[test]
    fn verdict_bands_follow_thresholds() {
        let cfg = AnalyzeConfig::default();
        assert_eq!(Verdict::from_jaccard(0.95, &cfg), Verdict::HighSimilarity);
        assert_eq!(Verdict::from_jaccard(0.70, &cfg), Verdict::HighSimilarity);
        assert_eq!(Verdict::from_jaccard(0.55, &cfg), Verdict::Moderate);
        assert_eq!(Verdict::from_jaccard(0.35, &cfg), Verdict::Low);
        assert_eq!(Verdict::from_jaccard(0.10, &cfg), Verdict::Distinct);
    }

    #[test]
    fn ranking_filters_below_threshold_and_sorts_descending() {
        let cfg = AnalyzeConfig::default();
        let query_shingles: Vec<u64> = (0..200).collect();
        let query = sketch(&query_shingles);
        let near = sketch(&(0..190).chain(1000..1010).collect::<Vec<_>>());
        let far = sketch(&(5000..5200).collect::<Vec<_>>());
        let ranked = rank_candidates(
            &query,
            vec![
                ("tpl-far".to_string(), far),
                ("tpl-near".to_string(), near),
            ],
            &cfg,
        )
        .unwrap();
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].owner_id, "tpl-near");
        assert_eq!(ranked[0].verdict, Verdict::HighSimilarity);
    }

    #[test]
    fn mismatched_candidates_surface_errors() {
        let cfg = AnalyzeConfig::default();
        let query = sketch(&[1, 2, 3]);
        let wrong = Sketch {
            variant: SketchVariant::Css,
            ..sketch(&[1, 2, 3])
        };
        assert!(rank_candidates(&query, vec![("x".to_string(), wrong)], &cfg).is_err());
    }

    #[test]
    fn verdict_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&Verdict::HighSimilarity).unwrap(),
            "\"high_similarity\""
        );
    }
}
