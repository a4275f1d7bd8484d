//! Sketch representation, Jaccard estimation, and the binary codec.
//!
//! A sketch is the unit of comparison everywhere in the system: a fixed
//! dimension vector of MinHash minima plus the cardinality of the shingle
//! set it summarizes. Two sketches estimate the Jaccard similarity of their
//! underlying sets if and only if they share a variant and a dimension.

use serde::{Deserialize, Serialize};

use crate::config::FingerprintError;
use crate::minhash::EMPTY_SLOT;

/// On-disk sketch format version. Bumped whenever the byte layout or the
/// band-hash derivation changes; decode rejects foreign versions so stale
/// sketches are re-indexed instead of silently compared.
pub const SKETCH_FORMAT_VERSION: u8 = 1;

/// Which shingle family a sketch summarizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SketchVariant {
    /// Custom class names plus normalized CSS declarations.
    Css,
    /// Retained structural patterns of the DOM.
    Html,
    /// Character k-grams over normalized CSS, HTML, and script text.
    Combined,
}

impl SketchVariant {
    pub fn as_u8(self) -> u8 {
        match self {
            SketchVariant::Css => 0,
            SketchVariant::Html => 1,
            SketchVariant::Combined => 2,
        }
    }

    pub fn from_u8(tag: u8) -> Result<Self, FingerprintError> {
        match tag {
            0 => Ok(SketchVariant::Css),
            1 => Ok(SketchVariant::Html),
            2 => Ok(SketchVariant::Combined),
            other => Err(FingerprintError::UnknownVariant(other)),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SketchVariant::Css => "css",
            SketchVariant::Html => "html",
            SketchVariant::Combined => "combined",
        }
    }
}

impl std::fmt::Display for SketchVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How much to trust a Jaccard estimate, from the smaller of the two
/// shingle cardinalities involved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    /// Below 50 shingles an estimate is noisy; up to 500 it is serviceable;
    /// beyond that the 1/sqrt(N) error bound dominates.
    pub fn from_cardinality(min_shingles: usize) -> Self {
        if min_shingles < 50 {
            Confidence::Low
        } else if min_shingles <= 500 {
            Confidence::Medium
        } else {
            Confidence::High
        }
    }
}

/// A MinHash sketch of one shingle family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sketch {
    pub variant: SketchVariant,
    /// Signature values, length == corpus dimension N.
    pub values: Vec<u64>,
    /// Cardinality of the shingle set the sketch was built from.
    pub shingle_count: u32,
}

impl Sketch {
    pub fn dimension(&self) -> usize {
        self.values.len()
    }

    /// True when the sketch summarizes the empty shingle set.
    pub fn is_empty(&self) -> bool {
        self.shingle_count == 0
    }

    /// Estimated Jaccard similarity: the fraction of matching slots.
    ///
    /// Variant or dimension disagreement is a migration bug, not a zero
    /// score, and surfaces as [`FingerprintError::DimensionMismatch`]. An
    /// empty sketch on either side scores 0 by definition, including the
    /// both-empty case.
    pub fn estimate_jaccard(&self, other: &Sketch) -> Result<f64, FingerprintError> {
        if self.variant != other.variant || self.dimension() != other.dimension() {
            return Err(FingerprintError::DimensionMismatch {
                left_variant: self.variant,
                left_dim: self.dimension(),
                right_variant: other.variant,
                right_dim: other.dimension(),
            });
        }
        if self.is_empty() || other.is_empty() {
            return Ok(0.0);
        }
        let matched = self
            .values
            .iter()
            .zip(&other.values)
            .filter(|(a, b)| a == b)
            .count();
        Ok(matched as f64 / self.dimension() as f64)
    }

    /// Serialize to the wire layout:
    /// `[format u8, variant u8, dimension u16 LE, values (N x u64 LE),
    /// shingle_count u32 LE]`.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(4 + self.values.len() * 8 + 4);
        buf.push(SKETCH_FORMAT_VERSION);
        buf.push(self.variant.as_u8());
        buf.extend_from_slice(&(self.values.len() as u16).to_le_bytes());
        for v in &self.values {
            buf.extend_from_slice(&v.to_le_bytes());
        }
        buf.extend_from_slice(&self.shingle_count.to_le_bytes());
        buf
    }

    /// Deserialize and validate a wire blob.
    pub fn decode(bytes: &[u8]) -> Result<Self, FingerprintError> {
        if bytes.len() < 4 {
            return Err(FingerprintError::CorruptSketch(format!(
                "blob too short: {} bytes",
                bytes.len()
            )));
        }
        let format = bytes[0];
        if format != SKETCH_FORMAT_VERSION {
            return Err(FingerprintError::UnsupportedFormatVersion(format));
        }
        let variant = SketchVariant::from_u8(bytes[1])?;
        let dimension = u16::from_le_bytes([bytes[2], bytes[3]]) as usize;
        let expected = 4 + dimension * 8 + 4;
        if bytes.len() != expected {
            return Err(FingerprintError::CorruptSketch(format!(
                "expected {expected} bytes for dimension {dimension}, got {}",
                bytes.len()
            )));
        }
        let mut values = Vec::with_capacity(dimension);
        let mut off = 4;
        for _ in 0..dimension {
            let mut word = [0u8; 8];
            word.copy_from_slice(&bytes[off..off + 8]);
            values.push(u64::from_le_bytes(word));
            off += 8;
        }
        let mut count = [0u8; 4];
        count.copy_from_slice(&bytes[off..off + 4]);
        Ok(Sketch {
            variant,
            values,
            shingle_count: u32::from_le_bytes(count),
        })
    }

    /// Build an all-sentinel sketch for the empty shingle set.
    pub fn empty(variant: SketchVariant, dimension: usize) -> Self {
        Sketch {
            variant,
            values: vec![EMPTY_SLOT; dimension],
            shingle_count: 0,
        }
    }
}
