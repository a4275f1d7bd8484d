//! Page-type alignment across two multi-page templates.
//!
//! Cross-template page pairs are scored pairwise; same-type pairs carry the
//! aggregate signal (a copied pricing page should look like the original's
//! pricing page, not its blog). Pairs of `Unknown` pages are scored but
//! excluded from the same-type mean — two unclassifiable pages agreeing on
//! type is not evidence of anything.

use serde::{Deserialize, Serialize};

use fingerprint::{PageType, Sketch};

use crate::{AnalyzeConfig, AnalyzeError};

/// The slice of a page the aligner needs.
#[derive(Debug, Clone, PartialEq)]
pub struct PageSketchInfo {
    pub page_id: String,
    pub page_type: PageType,
    pub sketch: Sketch,
}

/// One scored cross-template page pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PagePair {
    pub a: String,
    pub b: String,
    pub page_type_a: PageType,
    pub page_type_b: PageType,
    pub jaccard: f64,
}

impl PagePair {
    pub fn same_type(&self) -> bool {
        self.page_type_a == self.page_type_b && self.page_type_a != PageType::Unknown
    }
}

/// Alignment summary for two page sets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageAlignment {
    /// Mean Jaccard over same-type pairs; `None` when no pair aligned.
    pub same_type_mean: Option<f64>,
    /// Every cross pair, best first.
    pub pairs: Vec<PagePair>,
    /// Pairs at or above the suspicion threshold.
    pub suspicious: Vec<PagePair>,
}

/// Score all cross-template page pairs.
pub fn align_pages(
    a_pages: &[PageSketchInfo],
    b_pages: &[PageSketchInfo],
    cfg: &AnalyzeConfig,
) -> Result<PageAlignment, AnalyzeError> {
    let mut pairs = Vec::with_capacity(a_pages.len() * b_pages.len());
    for a in a_pages {
        for b in b_pages {
            let jaccard = a.sketch.estimate_jaccard(&b.sketch)?;
            pairs.push(PagePair {
                a: a.page_id.clone(),
                b: b.page_id.clone(),
                page_type_a: a.page_type,
                page_type_b: b.page_type,
                jaccard,
            });
        }
    }
    pairs.sort_by(|x, y| {
        y.jaccard
            .partial_cmp(&x.jaccard)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| (x.a.as_str(), x.b.as_str()).cmp(&(y.a.as_str(), y.b.as_str())))
    });

    let same_type: Vec<&PagePair> = pairs.iter().filter(|p| p.same_type()).collect();
    let same_type_mean = if same_type.is_empty() {
        None
    } else {
        Some(same_type.iter().map(|p| p.jaccard).sum::<f64>() / same_type.len() as f64)
    };

    let suspicious: Vec<PagePair> = pairs
        .iter()
        .filter(|p| p.jaccard >= cfg.suspicious_page_floor)
        .cloned()
        .collect();

    Ok(PageAlignment {
        same_type_mean,
        pairs,
        suspicious,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use fingerprint::{minhash_signature, SketchVariant};

    fn page(id: &str, page_type: PageType, shingles: &[u64]) -> PageSketchInfo {
        PageSketchInfo {
            page_id: id.to_string(),
            page_type,
            sketch: Sketch {
                variant: SketchVariant::Combined,
                values: minhash_signature(shingles, 128, 42, false),
                shingle_count: shingles.len() as u32,
            },
        }
    }

    #[test]
    fn identical_same_type_pages_align_at_one() {
        let shingles: Vec<u64> = (0..200).collect();
        let a = vec![page("a::/", PageType::Home, &shingles)];
        let b = vec![page("b::/", PageType::Home, &shingles)];
        let alignment = align_pages(&a, &b, &AnalyzeConfig::default()).unwrap();
        assert_eq!(alignment.same_type_mean, Some(1.0));
        assert_eq!(alignment.suspicious.len(), 1);
    }

    #[test]
    fn cross_type_pairs_do_not_enter_the_mean() {
        let shingles: Vec<u64> = (0..200).collect();
        let a = vec![page("a::/", PageType::Home, &shingles)];
        let b = vec![page("b::/about", PageType::About, &shingles)];
        let alignment = align_pages(&a, &b, &AnalyzeConfig::default()).unwrap();
        assert_eq!(alignment.same_type_mean, None);
        assert_eq!(alignment.pairs.len(), 1);
        // Still suspicious: a home page cloned into an about page is a clone.
        assert_eq!(alignment.suspicious.len(), 1);
    }

    #[test]
    fn unknown_pairs_are_scored_but_excluded_from_mean() {
        let shingles: Vec<u64> = (0..200).collect();
        let a = vec![page("a::/x", PageType::Unknown, &shingles)];
        let b = vec![page("b::/y", PageType::Unknown, &shingles)];
        let alignment = align_pages(&a, &b, &AnalyzeConfig::default()).unwrap();
        assert_eq!(alignment.same_type_mean, None);
        assert_eq!(alignment.pairs.len(), 1);
    }

    #[test]
    fn mean_averages_only_same_type_pairs() {
        let home: Vec<u64> = (0..200).collect();
        let about: Vec<u64> = (1000..1200).collect();
        let a = vec![
            page("a::/", PageType::Home, &home),
            page("a::/about", PageType::About, &about),
        ];
        let b = vec![
            page("b::/", PageType::Home, &home),
            page("b::/about", PageType::About, &(1000..1100).collect::<Vec<_>>()),
        ];
        let alignment = align_pages(&a, &b, &AnalyzeConfig::default()).unwrap();
        assert_eq!(alignment.pairs.len(), 4);
        let mean = alignment.same_type_mean.unwrap();
        // Home pair scores 1.0; about pair is partial; mean sits between.
        assert!(mean < 1.0 && mean > 0.3, "mean was {mean}");
    }

    #[test]
    fn empty_sides_align_trivially() {
        let alignment = align_pages(&[], &[], &AnalyzeConfig::default()).unwrap();
        assert!(alignment.pairs.is_empty());
        assert_eq!(alignment.same_type_mean, None);
    }
}
