//! Tolerant CSS rule extraction.
//!
//! This is deliberately not a spec-grade CSS parser: shingling tolerates
//! noise, and everything the rest of the system consumes goes through the
//! [`RuleMap`] produced here, so the extraction strategy can be swapped for
//! a real tokenizer without touching any caller.
//!
//! `@`-rules are skipped whole (including nested blocks), selector groups
//! are split on commas into individual rules, and malformed declarations
//! are dropped with a counter bump rather than failing the document.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::shingle::normalize_declaration;

/// `selector -> ordered normalized declarations`.
pub type RuleMap = BTreeMap<String, Vec<String>>;

/// Counters for content the extractor tolerated rather than parsed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseStats {
    /// Declarations dropped for having no `prop:value` shape.
    pub malformed_declarations: u32,
    /// `@`-rule blocks skipped whole.
    pub skipped_at_rules: u32,
    /// Blocks abandoned because braces never balanced.
    pub unbalanced_blocks: u32,
}

impl ParseStats {
    pub fn tolerated(&self) -> u32 {
        self.malformed_declarations + self.skipped_at_rules + self.unbalanced_blocks
    }
}

/// Parse CSS text into a rule map, accumulating tolerance counters.
pub fn parse_rules(css: &str, stats: &mut ParseStats) -> RuleMap {
    let css = strip_comments(css);
    let bytes = css.as_bytes();
    let mut rules = RuleMap::new();
    let mut i = 0;

    while i < bytes.len() {
        // Selector runs up to the next '{'.
        let Some(open) = find_byte(bytes, i, b'{') else {
            break;
        };
        let mut selector_text = css[i..open].trim();

        // Statement at-rules (`@import …;`, `@charset …;`) terminate with a
        // semicolon before any block; drop them from the selector run.
        if let Some(semi) = selector_text.rfind(';') {
            for stmt in selector_text[..semi].split(';') {
                if stmt.trim_start().starts_with('@') {
                    stats.skipped_at_rules += 1;
                }
            }
            selector_text = selector_text[semi + 1..].trim();
        }

        if selector_text.starts_with('@') {
            // Skip the whole at-rule, nested blocks included.
            match skip_block(bytes, open) {
                Some(end) => {
                    stats.skipped_at_rules += 1;
                    i = end;
                    continue;
                }
                None => {
                    stats.unbalanced_blocks += 1;
                    break;
                }
            }
        }

        let Some(close) = find_byte(bytes, open + 1, b'}') else {
            stats.unbalanced_blocks += 1;
            break;
        };
        let body = &css[open + 1..close];
        let declarations = parse_declarations(body, stats);

        if !declarations.is_empty() {
            for selector in selector_text.split(',') {
                let selector = normalize_selector(selector);
                if selector.is_empty() {
                    continue;
                }
                let entry = rules.entry(selector).or_default();
                for decl in &declarations {
                    if !entry.contains(decl) {
                        entry.push(decl.clone());
                    }
                }
            }
        }
        i = close + 1;
    }

    rules
}

fn parse_declarations(body: &str, stats: &mut ParseStats) -> Vec<String> {
    let mut out = Vec::new();
    for raw in body.split(';') {
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }
        let Some((prop, value)) = raw.split_once(':') else {
            stats.malformed_declarations += 1;
            continue;
        };
        match normalize_declaration(prop, value) {
            Some(decl) => {
                if !out.contains(&decl) {
                    out.push(decl);
                }
            }
            None => stats.malformed_declarations += 1,
        }
    }
    out
}

/// Collapse internal whitespace of a selector and lowercase it.
fn normalize_selector(selector: &str) -> String {
    crate::shingle::normalize_text(selector)
}

fn strip_comments(css: &str) -> String {
    let mut out = String::with_capacity(css.len());
    let mut rest = css;
    while let Some(start) = rest.find("/*") {
        out.push_str(&rest[..start]);
        match rest[start + 2..].find("*/") {
            Some(end) => rest = &rest[start + 2 + end + 2..],
            None => return out,
        }
    }
    out.push_str(rest);
    out
}

fn find_byte(bytes: &[u8], from: usize, needle: u8) -> Option<usize> {
    bytes[from..].iter().position(|&b| b == needle).map(|p| from + p)
}

/// Skip a `{ ... }` block starting at the opening brace, returning the index
/// just past its matching close. Handles nesting.
fn skip_block(bytes: &[u8], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (offset, &b) in bytes[open..].iter().enumerate() {
        match b {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + offset + 1);
                }
            }
            _ => {}
        }
    }
    None
}
