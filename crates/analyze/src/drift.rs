//! Drift evaluation: the rescan decision tree.
//!
//! A case freezes the alleged copy's sketch at report time. Weeks later the
//! same URL is fetched again and three numbers decide the outcome: how far
//! the copy drifted from its own baseline, and how similar it still is to
//! the original.

use serde::{Deserialize, Serialize};

use fingerprint::Sketch;
use store::RescanVerdict;

use crate::{AnalyzeConfig, AnalyzeError};

/// Outcome of evaluating one rescan.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RescanOutcome {
    /// `1 - jaccard(baseline, current)`; 0 when no baseline exists.
    pub drift: f64,
    /// `jaccard(current, original)`.
    pub current_similarity: f64,
    pub verdict: RescanVerdict,
}

impl RescanOutcome {
    /// Human-readable explanation for case narration layers. Advisory text
    /// only; the verdict itself is the typed field.
    pub fn explanation(&self) -> String {
        match self.verdict {
            RescanVerdict::Resolved => format!(
                "content drifted {:.0}% from the reported state and similarity to the original dropped to {:.2}",
                self.drift * 100.0,
                self.current_similarity
            ),
            RescanVerdict::InsufficientChanges => format!(
                "only {:.0}% of the reported content changed; similarity to the original is still {:.2}",
                self.drift * 100.0,
                self.current_similarity
            ),
            RescanVerdict::StillSimilar => format!(
                "content changed ({:.0}% drift) but similarity to the original remains {:.2}",
                self.drift * 100.0,
                self.current_similarity
            ),
            RescanVerdict::NoBaseline => {
                "no baseline sketch was captured for this case".to_string()
            }
        }
    }
}

/// Run the drift decision tree.
///
/// `baseline` is the frozen captured-at-report sketch (None when the case
/// predates baseline capture), `current` is the fresh fetch of the alleged
/// copy, `original` is the complainant's template sketch.
pub fn evaluate_rescan(
    baseline: Option<&Sketch>,
    current: &Sketch,
    original: &Sketch,
    cfg: &AnalyzeConfig,
) -> Result<RescanOutcome, AnalyzeError> {
    let current_similarity = current.estimate_jaccard(original)?;

    let Some(baseline) = baseline else {
        return Ok(RescanOutcome {
            drift: 0.0,
            current_similarity,
            verdict: RescanVerdict::NoBaseline,
        });
    };

    let drift = 1.0 - baseline.estimate_jaccard(current)?;

    let verdict = if current_similarity < cfg.drift_resolved_similarity
        && drift >= cfg.drift_resolved_minimum_drift
    {
        RescanVerdict::Resolved
    } else if drift < cfg.drift_insufficient_max {
        RescanVerdict::InsufficientChanges
    } else {
        RescanVerdict::StillSimilar
    };

    Ok(RescanOutcome {
        drift,
        current_similarity,
        verdict,
    })
}
