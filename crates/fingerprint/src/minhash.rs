//! MinHash signatures over shingle-hash sets.
//!
//! Slot `i` of a signature is the minimum, over the shingle set, of that
//! slot's permutation of the shingle hashes. A permutation here is the
//! keyed hash of the `(shingle, slot)` pair under the corpus seed: folding
//! the slot index into the hashed bytes gives `n` independent permutations
//! without any per-slot key schedule, and equal inputs under equal configs
//! always yield bit-identical sketches.

use rayon::prelude::*;
use xxhash_rust::xxh3::xxh3_64_with_seed;

/// Sentinel value filling every slot of a signature over the empty set.
pub const EMPTY_SLOT: u64 = u64::MAX;

/// Compute a MinHash signature of length `n` over unique shingle hashes.
///
/// The empty set maps to a vector of [`EMPTY_SLOT`] sentinels; Jaccard
/// against such a signature is defined as zero.
pub fn minhash_signature(unique_shingles: &[u64], n: usize, seed: u64, parallel: bool) -> Vec<u64> {
    if n == 0 {
        return Vec::new();
    }
    if unique_shingles.is_empty() {
        return vec![EMPTY_SLOT; n];
    }

    let mut out = Vec::with_capacity(n);
    if parallel {
        (0..n)
            .into_par_iter()
            .map(|slot| slot_minimum(unique_shingles, slot as u64, seed))
            .collect_into_vec(&mut out);
    } else {
        out.extend((0..n as u64).map(|slot| slot_minimum(unique_shingles, slot, seed)));
    }
    out
}

/// The minimum of one slot's permutation over the whole shingle set.
fn slot_minimum(unique_shingles: &[u64], slot: u64, seed: u64) -> u64 {
    unique_shingles
        .iter()
        .map(|&shingle| permute(shingle, slot, seed))
        .min()
        .unwrap_or(EMPTY_SLOT)
}

/// One slot's permutation of one shingle hash: the two values are hashed
/// together as a 16-byte message so the slot index participates in every
/// round of the hash rather than only keying it.
#[inline]
pub(crate) fn permute(shingle: u64, slot: u64, seed: u64) -> u64 {
    let mut message = [0u8; 16];
    message[..8].copy_from_slice(&shingle.to_le_bytes());
    message[8..].copy_from_slice(&slot.to_le_bytes());
    xxh3_64_with_seed(&message, seed)
}
