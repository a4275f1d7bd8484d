//! Persisted record types and their byte-level encoding.
//!
//! Record payloads are bincode-encoded serde structs; sketches inside them
//! are carried as blobs in the fingerprint crate's wire format so every read
//! path re-validates format version, variant, and dimension.

use bincode::config::standard;
use bincode::serde::{decode_from_slice, encode_to_vec};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use fingerprint::{PageType, Sketch};

use crate::StoreError;

/// Which band index a lookup or row belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OwnerKind {
    Template,
    Page,
}

/// A template's identity row. `id`, `url`, `creator`, and `created_at` are
/// immutable after first write; `last_full_index_at` records the last crawl
/// that completed within budget (None while the template is partial).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateRecord {
    pub id: String,
    pub url: String,
    pub creator: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_full_index_at: Option<DateTime<Utc>>,
}

/// The three variant sketches of a template.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateSketches {
    pub css: Sketch,
    pub html: Sketch,
    pub combined: Sketch,
    pub updated_at: DateTime<Utc>,
}

/// One page of a template.
#[derive(Debug, Clone, PartialEq)]
pub struct PageRecord {
    /// `template_id::path`.
    pub page_id: String,
    pub template_id: String,
    pub url: String,
    pub path: String,
    pub page_type: PageType,
    pub type_confidence: f32,
    pub sketch: Sketch,
    pub html_bytes: u64,
    pub unique_class_count: u32,
    pub max_dom_depth: u32,
    pub indexed_at: DateTime<Utc>,
}

/// Captured-at-report state of a case. Immutable once written.
///
/// Besides the frozen sketch and similarity, the baseline carries what a
/// rescan needs to run unattended: which template the complaint names as
/// original and where the alleged copy lives.
#[derive(Debug, Clone, PartialEq)]
pub struct CaseBaseline {
    pub case_id: String,
    pub original_template_id: String,
    pub alleged_url: String,
    pub baseline_sketch: Sketch,
    pub baseline_similarity: f64,
    pub captured_at: DateTime<Utc>,
}

/// Outcome of one rescan against a case baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RescanVerdict {
    Resolved,
    InsufficientChanges,
    StillSimilar,
    NoBaseline,
}

impl RescanVerdict {
    pub fn as_str(self) -> &'static str {
        match self {
            RescanVerdict::Resolved => "resolved",
            RescanVerdict::InsufficientChanges => "insufficient_changes",
            RescanVerdict::StillSimilar => "still_similar",
            RescanVerdict::NoBaseline => "no_baseline",
        }
    }
}

/// One entry of a case's append-only rescan series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RescanRecord {
    pub case_id: String,
    pub drift: f64,
    pub current_similarity: f64,
    pub previous_similarity: Option<f64>,
    pub verdict: RescanVerdict,
    pub scanned_at: DateTime<Utc>,
}

/// Corpus-level counters for `/health`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub templates: u64,
    pub pages: u64,
    pub template_band_rows: u64,
    pub page_band_rows: u64,
}

// ---------------------------------------------------------------------------
// Wire forms. Sketches cross the storage boundary as codec blobs.

#[derive(Serialize, Deserialize)]
struct TemplateSketchesWire {
    css: Vec<u8>,
    html: Vec<u8>,
    combined: Vec<u8>,
    updated_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize)]
struct PageRecordWire {
    page_id: String,
    template_id: String,
    url: String,
    path: String,
    page_type: PageType,
    type_confidence: f32,
    sketch: Vec<u8>,
    html_bytes: u64,
    unique_class_count: u32,
    max_dom_depth: u32,
    indexed_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize)]
struct CaseBaselineWire {
    case_id: String,
    original_template_id: String,
    alleged_url: String,
    baseline_sketch: Vec<u8>,
    baseline_similarity: f64,
    captured_at: DateTime<Utc>,
}

pub(crate) fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
    encode_to_vec(value, standard()).map_err(|e| StoreError::Encode(e.to_string()))
}

pub(crate) fn decode<T: for<'de> Deserialize<'de>>(bytes: &[u8]) -> Result<T, StoreError> {
    let (value, _) =
        decode_from_slice(bytes, standard()).map_err(|e| StoreError::Decode(e.to_string()))?;
    Ok(value)
}

impl TemplateSketches {
    pub(crate) fn to_bytes(&self) -> Result<Vec<u8>, StoreError> {
        encode(&TemplateSketchesWire {
            css: self.css.encode(),
            html: self.html.encode(),
            combined: self.combined.encode(),
            updated_at: self.updated_at,
        })
    }

    pub(crate) fn from_bytes(bytes: &[u8]) -> Result<Self, StoreError> {
        let wire: TemplateSketchesWire = decode(bytes)?;
        Ok(TemplateSketches {
            css: Sketch::decode(&wire.css)?,
            html: Sketch::decode(&wire.html)?,
            combined: Sketch::decode(&wire.combined)?,
            updated_at: wire.updated_at,
        })
    }
}

impl PageRecord {
    pub(crate) fn to_bytes(&self) -> Result<Vec<u8>, StoreError> {
        encode(&PageRecordWire {
            page_id: self.page_id.clone(),
            template_id: self.template_id.clone(),
            url: self.url.clone(),
            path: self.path.clone(),
            page_type: self.page_type,
            type_confidence: self.type_confidence,
            sketch: self.sketch.encode(),
            html_bytes: self.html_bytes,
            unique_class_count: self.unique_class_count,
            max_dom_depth: self.max_dom_depth,
            indexed_at: self.indexed_at,
        })
    }

    pub(crate) fn from_bytes(bytes: &[u8]) -> Result<Self, StoreError> {
        let wire: PageRecordWire = decode(bytes)?;
        Ok(PageRecord {
            page_id: wire.page_id,
            template_id: wire.template_id,
            url: wire.url,
            path: wire.path,
            page_type: wire.page_type,
            type_confidence: wire.type_confidence,
            sketch: Sketch::decode(&wire.sketch)?,
            html_bytes: wire.html_bytes,
            unique_class_count: wire.unique_class_count,
            max_dom_depth: wire.max_dom_depth,
            indexed_at: wire.indexed_at,
        })
    }
}

impl CaseBaseline {
    pub(crate) fn to_bytes(&self) -> Result<Vec<u8>, StoreError> {
        encode(&CaseBaselineWire {
            case_id: self.case_id.clone(),
            original_template_id: self.original_template_id.clone(),
            alleged_url: self.alleged_url.clone(),
            baseline_sketch: self.baseline_sketch.encode(),
            baseline_similarity: self.baseline_similarity,
            captured_at: self.captured_at,
        })
    }

    pub(crate) fn from_bytes(bytes: &[u8]) -> Result<Self, StoreError> {
        let wire: CaseBaselineWire = decode(bytes)?;
        Ok(CaseBaseline {
            case_id: wire.case_id,
            original_template_id: wire.original_template_id,
            alleged_url: wire.alleged_url,
            baseline_sketch: Sketch::decode(&wire.baseline_sketch)?,
            baseline_similarity: wire.baseline_similarity,
            captured_at: wire.captured_at,
        })
    }
}

/// Key prefix under which a template's pages sort contiguously.
pub(crate) fn page_prefix(template_id: &str) -> String {
    format!("{template_id}::")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use fingerprint::{minhash_signature, SketchVariant};

    fn sample_sketch() -> Sketch {
        Sketch {
            variant: SketchVariant::Combined,
            values: minhash_signature(&[1, 2, 3], 128, 42, false),
            shingle_count: 3,
        }
    }

    #[test]
    fn template_sketches_roundtrip() {
        let sketches = TemplateSketches {
            css: Sketch {
                variant: SketchVariant::Css,
                ..sample_sketch()
            },
            html: Sketch {
                variant: SketchVariant::Html,
                ..sample_sketch()
            },
            combined: sample_sketch(),
            updated_at: Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
        };
        let bytes = sketches.to_bytes().unwrap();
        let back = TemplateSketches::from_bytes(&bytes).unwrap();
        assert_eq!(sketches, back);
    }

    #[test]
    fn page_record_roundtrip() {
        let record = PageRecord {
            page_id: "tpl::/about".into(),
            template_id: "tpl".into(),
            url: "https://x.example.com/about".into(),
            path: "/about".into(),
            page_type: PageType::About,
            type_confidence: 0.9,
            sketch: sample_sketch(),
            html_bytes: 2048,
            unique_class_count: 9,
            max_dom_depth: 11,
            indexed_at: Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
        };
        let back = PageRecord::from_bytes(&record.to_bytes().unwrap()).unwrap();
        assert_eq!(record, back);
    }

    #[test]
    fn corrupt_sketch_blob_fails_decode() {
        let record = CaseBaseline {
            case_id: "c".into(),
            original_template_id: "tpl-orig".into(),
            alleged_url: "https://copy.example.net/".into(),
            baseline_sketch: sample_sketch(),
            baseline_similarity: 0.5,
            captured_at: Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
        };
        let mut wire: CaseBaselineWire = decode(&record.to_bytes().unwrap()).unwrap();
        wire.baseline_sketch[0] = 99; // foreign format version
        let bytes = encode(&wire).unwrap();
        assert!(matches!(
            CaseBaseline::from_bytes(&bytes),
            Err(StoreError::Sketch(_))
        ));
    }

    #[test]
    fn verdict_strings() {
        assert_eq!(RescanVerdict::Resolved.as_str(), "resolved");
        assert_eq!(
            RescanVerdict::InsufficientChanges.as_str(),
            "insufficient_changes"
        );
    }
}
