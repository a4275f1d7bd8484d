//! Depth-weighted structural fingerprints of HTML documents.
//!
//! A single streaming pass over the markup maintains a tag stack and, for
//! every element that closes, records a `(parent_tag, child-tag-sequence)`
//! pattern weighted by its DOM level and discounted by depth. No regex is
//! involved anywhere in this pass; the tokenizer is linear in input bytes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::{FingerprintConfig, NoiseConfig};

/// Coarse role of a tag in the document hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StructuralLevel {
    Page,
    Section,
    Component,
    Element,
}

impl StructuralLevel {
    pub fn of_tag(tag: &str) -> Self {
        match tag {
            "body" | "main" => StructuralLevel::Page,
            "header" | "footer" | "nav" | "section" | "article" | "aside" => {
                StructuralLevel::Section
            }
            "div" | "form" | "ul" | "ol" | "table" | "figure" => StructuralLevel::Component,
            _ => StructuralLevel::Element,
        }
    }

    pub fn weight(self) -> f64 {
        match self {
            StructuralLevel::Page => 10.0,
            StructuralLevel::Section => 7.0,
            StructuralLevel::Component => 4.0,
            StructuralLevel::Element => 1.0,
        }
    }
}

/// Aggregate occurrence data for one retained pattern.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PatternStats {
    pub level: StructuralLevel,
    /// Depth-discounted weight of the shallowest occurrence.
    pub weight: f64,
    pub count: u32,
}

/// The structural fingerprint of one document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuralFingerprint {
    /// `"parent[c1,c2,…]"` -> stats, for every retained pattern.
    pub patterns: BTreeMap<String, PatternStats>,
    /// Sum of retained pattern weights; denominator for structural scores.
    pub total_weight: f64,
    /// Deepest element nesting observed.
    pub max_depth: usize,
    /// Distinct `class` attribute values observed in the markup.
    pub unique_class_count: usize,
}

impl StructuralFingerprint {
    /// Pattern keys, for the Html sketch variant's shingle set.
    pub fn pattern_keys(&self) -> impl Iterator<Item = &str> {
        self.patterns.keys().map(String::as_str)
    }
}

const SEMANTIC_CHILDREN: [&str; 12] = [
    "h1", "h2", "h3", "h4", "h5", "h6", "nav", "header", "footer", "section", "article", "form",
];

const VOID_TAGS: [&str; 14] = [
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

struct Frame {
    tag: String,
    depth: usize,
    children: Vec<String>,
}

/// Run the streaming structural pass.
pub fn structural_fingerprint(
    html: &str,
    cfg: &FingerprintConfig,
    noise: &NoiseConfig,
) -> StructuralFingerprint {
    let mut fp = StructuralFingerprint {
        unique_class_count: crate::shingle::html_classes(html).len(),
        ..Default::default()
    };
    let bytes = html.as_bytes();
    let mut stack: Vec<Frame> = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'<' {
            i += 1;
            continue;
        }
        // Comments, doctype, processing instructions.
        if bytes[i..].starts_with(b"<!--") {
            i = find_sub(bytes, i + 4, b"-->").map_or(bytes.len(), |p| p + 3);
            continue;
        }
        if i + 1 < bytes.len() && (bytes[i + 1] == b'!' || bytes[i + 1] == b'?') {
            i = find_byte(bytes, i + 1, b'>').map_or(bytes.len(), |p| p + 1);
            continue;
        }

        let closing = i + 1 < bytes.len() && bytes[i + 1] == b'/';
        let name_start = if closing { i + 2 } else { i + 1 };
        let (tag, name_end) = read_tag_name(bytes, name_start);
        if tag.is_empty() {
            i += 1;
            continue;
        }
        let Some(tag_end) = find_byte(bytes, name_end, b'>') else {
            break;
        };
        let self_closed = tag_end > i && bytes[tag_end - 1] == b'/';

        if closing {
            close_tag(&mut stack, &tag, &mut fp, cfg, noise);
            i = tag_end + 1;
            continue;
        }

        // Record this element as a child of its parent.
        if let Some(parent) = stack.last_mut() {
            parent.children.push(tag.clone());
        }
        let depth = stack.len() + 1;
        fp.max_depth = fp.max_depth.max(depth);

        if self_closed || VOID_TAGS.contains(&tag.as_str()) {
            i = tag_end + 1;
            continue;
        }

        // Raw-text elements: skip straight to the matching close tag.
        if tag == "script" || tag == "style" {
            let close_marker = format!("</{tag}");
            i = find_sub_ignore_case(bytes, tag_end + 1, close_marker.as_bytes())
                .and_then(|p| find_byte(bytes, p, b'>').map(|q| q + 1))
                .unwrap_or(bytes.len());
            continue;
        }

        stack.push(Frame {
            tag,
            depth,
            children: Vec::new(),
        });
        i = tag_end + 1;
    }

    // Close anything the document left open.
    while let Some(frame) = stack.pop() {
        emit(frame, &mut fp, cfg, noise);
    }
    fp
}

fn close_tag(
    stack: &mut Vec<Frame>,
    tag: &str,
    fp: &mut StructuralFingerprint,
    cfg: &FingerprintConfig,
    noise: &NoiseConfig,
) {
    // Tolerant matching: pop frames until the named tag closes. A stray
    // close tag with no open counterpart is ignored.
    if !stack.iter().any(|f| f.tag == tag) {
        return;
    }
    while let Some(frame) = stack.pop() {
        let done = frame.tag == tag;
        emit(frame, fp, cfg, noise);
        if done {
            break;
        }
    }
}

fn emit(frame: Frame, fp: &mut StructuralFingerprint, cfg: &FingerprintConfig, noise: &NoiseConfig) {
    if frame.children.is_empty() {
        return;
    }
    let capped: Vec<&str> = frame
        .children
        .iter()
        .take(cfg.structural_arity_cap)
        .map(String::as_str)
        .collect();
    let key = format!("{}[{}]", frame.tag, capped.join(","));

    if noise.is_generic_pattern(&key) {
        return;
    }
    // Short child lists only carry signal when a semantic element anchors them.
    if capped.len() < 3 && !capped.iter().any(|c| SEMANTIC_CHILDREN.contains(c)) {
        return;
    }

    let level = StructuralLevel::of_tag(&frame.tag);
    let weight = level.weight() / frame.depth.max(1) as f64;
    match fp.patterns.get_mut(&key) {
        Some(stats) => {
            stats.count += 1;
            if weight > stats.weight {
                fp.total_weight += weight - stats.weight;
                stats.weight = weight;
            }
        }
        None => {
            fp.patterns.insert(
                key,
                PatternStats {
                    level,
                    weight,
                    count: 1,
                },
            );
            fp.total_weight += weight;
        }
    }
}

fn read_tag_name(bytes: &[u8], start: usize) -> (String, usize) {
    let mut end = start;
    while end < bytes.len()
        && (bytes[end].is_ascii_alphanumeric() || bytes[end] == b'-' || bytes[end] == b':')
    {
        end += 1;
    }
    let name = std::str::from_utf8(&bytes[start..end])
        .map(|s| s.to_ascii_lowercase())
        .unwrap_or_default();
    (name, end)
}

fn find_byte(bytes: &[u8], from: usize, needle: u8) -> Option<usize> {
    bytes.get(from..)?.iter().position(|&b| b == needle).map(|p| from + p)
}

fn find_sub(bytes: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    if from >= bytes.len() {
        return None;
    }
    bytes[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| from + p)
}

fn find_sub_ignore_case(bytes: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    if from >= bytes.len() || needle.is_empty() {
        return None;
    }
    bytes[from..]
        .windows(needle.len())
        .position(|w| w.eq_ignore_ascii_case(needle))
        .map(|p| from + p)
}
