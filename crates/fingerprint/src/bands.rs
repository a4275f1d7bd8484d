//! LSH band hashing over MinHash signatures.
//!
//! The signature is partitioned into `b` contiguous bands of `r` values and
//! each band is hashed to a single u64. Two sketches collide on a band iff
//! their full r-tuples coincide, which gives the S-curve retrieval
//! probability the (b, r) pair was chosen for.
//!
//! Band hashes are derived from the MinHash vector exclusively, never from
//! raw shingle sets; the sketch format version guards against blobs built
//! under any other scheme.

use xxhash_rust::xxh3::xxh3_64_with_seed;

use crate::config::{FingerprintConfig, FingerprintError};
use crate::sketch::Sketch;

/// Compute the `b` band hashes for a sketch.
///
/// An empty sketch yields no band hashes at all: indexing every empty page
/// under the same sentinel bands would make them all mutual candidates.
pub fn band_hashes(sketch: &Sketch, cfg: &FingerprintConfig) -> Result<Vec<u64>, FingerprintError> {
    if cfg.bands * cfg.rows_per_band != sketch.dimension() {
        return Err(FingerprintError::BandShapeMismatch {
            bands: cfg.bands,
            rows: cfg.rows_per_band,
            dimension: sketch.dimension(),
        });
    }
    if sketch.is_empty() {
        return Ok(Vec::new());
    }

    let mut hashes = Vec::with_capacity(cfg.bands);
    // The band index leads the hashed message, so the same r-tuple under a
    // different band index lands in a different bucket.
    let mut buf = Vec::with_capacity((cfg.rows_per_band + 1) * 8);
    for band in 0..cfg.bands {
        buf.clear();
        buf.extend_from_slice(&(band as u64).to_le_bytes());
        let start = band * cfg.rows_per_band;
        for &v in &sketch.values[start..start + cfg.rows_per_band] {
            buf.extend_from_slice(&v.to_le_bytes());
        }
        hashes.push(xxh3_64_with_seed(&buf, cfg.seed));
    }
    Ok(hashes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::minhash::minhash_signature;
    use crate::sketch::SketchVariant;

    fn sketch_of(shingles: &[u64]) -> Sketch {
        Sketch {
            variant: SketchVariant::Combined,
            values: minhash_signature(shingles, 128, 42, false),
            shingle_count: shingles.len() as u32,
        }
    }

    #[test]
    fn produces_exactly_b_hashes() {
        let cfg = FingerprintConfig::default();
        let hashes = band_hashes(&sketch_of(&[1, 2, 3, 4, 5]), &cfg).unwrap();
        assert_eq!(hashes.len(), cfg.bands);
    }

    #[test]
    fn empty_sketch_produces_no_hashes() {
        let cfg = FingerprintConfig::default();
        let empty = Sketch::empty(SketchVariant::Combined, 128);
        assert!(band_hashes(&empty, &cfg).unwrap().is_empty());
    }

    #[test]
    fn identical_sketches_collide_on_all_bands() {
        let cfg = FingerprintConfig::default();
        let a = band_hashes(&sketch_of(&[9, 8, 7]), &cfg).unwrap();
        let b = band_hashes(&sketch_of(&[9, 8, 7]), &cfg).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_inputs_rarely_collide() {
        let cfg = FingerprintConfig::default();
        let a = band_hashes(&sketch_of(&(0..100).collect::<Vec<_>>()), &cfg).unwrap();
        let b = band_hashes(&sketch_of(&(1000..1100).collect::<Vec<_>>()), &cfg).unwrap();
        let shared = a.iter().filter(|h| b.contains(h)).count();
        assert_eq!(shared, 0);
    }

    #[test]
    fn similar_inputs_share_at_least_one_band() {
        let cfg = FingerprintConfig::default();
        let base: Vec<u64> = (0..200).collect();
        let mut near = base.clone();
        near[0] = 9999; // one substitution; Jaccard ~0.99
        let a = band_hashes(&sketch_of(&base), &cfg).unwrap();
        let b = band_hashes(&sketch_of(&near), &cfg).unwrap();
        let shared = a.iter().zip(&b).filter(|(x, y)| x == y).count();
        assert!(shared > 0, "near-identical sets should collide on a band");
    }

    #[test]
    fn shape_mismatch_rejected() {
        let cfg = FingerprintConfig::default().with_rows_per_band(16);
        assert!(matches!(
            band_hashes(&sketch_of(&[1, 2]), &cfg),
            Err(FingerprintError::BandShapeMismatch { .. })
        ));
    }
}
