//! Shingle extraction: text normalization, character k-grams, custom class
//! names, and normalized CSS declarations.
//!
//! Oversize blobs are truncated here, before any hashing, so a 2 MB ceiling
//! produces the same sketch on every run regardless of how much trailing
//! content an origin serves.

use std::collections::BTreeSet;

use xxhash_rust::xxh3::xxh3_64_with_seed;

use crate::config::NoiseConfig;

const VENDOR_PREFIXES: [&str; 4] = ["-webkit-", "-moz-", "-ms-", "-o-"];

/// Hash one shingle string into the u64 space MinHash operates on.
#[inline]
pub fn hash_shingle(text: &str, seed: u64) -> u64 {
    xxh3_64_with_seed(text.as_bytes(), seed)
}

/// Lowercase and collapse all whitespace runs to single spaces.
/// Idempotent: `normalize_text(normalize_text(x)) == normalize_text(x)`.
pub fn normalize_text(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut pending_space = false;
    for c in input.chars() {
        if c.is_whitespace() {
            pending_space = !out.is_empty();
        } else {
            if pending_space {
                out.push(' ');
                pending_space = false;
            }
            for lc in c.to_lowercase() {
                out.push(lc);
            }
        }
    }
    out
}

/// Truncate a blob to at most `max_bytes`, respecting char boundaries.
pub fn truncate_blob(input: &str, max_bytes: usize) -> &str {
    if input.len() <= max_bytes {
        return input;
    }
    let mut end = max_bytes;
    while end > 0 && !input.is_char_boundary(end) {
        end -= 1;
    }
    &input[..end]
}

/// Overlapping character k-gram hashes over normalized, truncated text.
pub fn char_kgram_hashes(text: &str, k: usize, max_bytes: usize, seed: u64) -> BTreeSet<u64> {
    let mut out = BTreeSet::new();
    if k == 0 {
        return out;
    }
    let normalized = normalize_text(truncate_blob(text, max_bytes));
    let chars: Vec<char> = normalized.chars().collect();
    if chars.len() < k {
        if !chars.is_empty() {
            out.insert(hash_shingle(&normalized, seed));
        }
        return out;
    }
    let mut window = String::with_capacity(k * 4);
    for start in 0..=chars.len() - k {
        window.clear();
        window.extend(&chars[start..start + k]);
        out.insert(hash_shingle(&window, seed));
    }
    out
}

/// Extract custom (non-framework) class names from CSS selector text.
///
/// Every `.class` component of every selector contributes one shingle;
/// framework and utility prefixes from the noise table are dropped.
pub fn custom_classes(selectors: impl Iterator<Item = impl AsRef<str>>, noise: &NoiseConfig) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    for selector in selectors {
        let selector = selector.as_ref();
        let mut rest = selector;
        while let Some(dot) = rest.find('.') {
            rest = &rest[dot + 1..];
            let end = rest
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_'))
                .unwrap_or(rest.len());
            let class = &rest[..end];
            if !class.is_empty() && !noise.is_framework_class(class) {
                out.insert(class.to_string());
            }
            rest = &rest[end..];
        }
    }
    out
}

/// Extract class attribute values from HTML, for the per-page
/// `unique_class_count` metric and class-shingle extraction from markup.
pub fn html_classes(html: &str) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    let lower = html.as_bytes();
    let mut i = 0;
    while i + 6 < lower.len() {
        if lower[i..].len() >= 6 && lower[i..i + 5].eq_ignore_ascii_case(b"class") {
            let mut j = i + 5;
            while j < lower.len() && (lower[j] as char).is_whitespace() {
                j += 1;
            }
            if j < lower.len() && lower[j] == b'=' {
                j += 1;
                while j < lower.len() && (lower[j] as char).is_whitespace() {
                    j += 1;
                }
                if j < lower.len() && (lower[j] == b'"' || lower[j] == b'\'') {
                    let quote = lower[j];
                    j += 1;
                    let start = j;
                    while j < lower.len() && lower[j] != quote {
                        j += 1;
                    }
                    if let Ok(value) = std::str::from_utf8(&lower[start..j]) {
                        for class in value.split_whitespace() {
                            out.insert(class.to_string());
                        }
                    }
                    i = j;
                }
            }
        }
        i += 1;
    }
    out
}

/// Normalize one CSS declaration into its shingle form:
/// lowercased, vendor prefix stripped, whitespace collapsed, `prop:value`.
///
/// The selector scopes extraction (it bounds which rule a declaration came
/// from) but is not part of the shingle text: renaming a class must not
/// disturb the declaration shingles.
pub fn normalize_declaration(property: &str, value: &str) -> Option<String> {
    let mut prop = normalize_text(property);
    let value = normalize_text(value);
    if prop.is_empty() || value.is_empty() {
        return None;
    }
    for prefix in VENDOR_PREFIXES {
        if let Some(stripped) = prop.strip_prefix(prefix) {
            prop = stripped.to_string();
            break;
        }
    }
    Some(format!("{prop}:{value}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_is_idempotent() {
        let raw = "  .Hero {  Color : RED; }\n\n";
        let once = normalize_text(raw);
        assert_eq!(normalize_text(&once), once);
        assert_eq!(once, ".hero { color : red; }");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let s = "aé😀bc";
        for max in 0..=s.len() {
            let t = truncate_blob(s, max);
            assert!(t.len() <= max);
            assert!(s.starts_with(t));
        }
    }

    #[test]
    fn kgrams_count_and_determinism() {
        let a = char_kgram_hashes("abcdefg", 5, 1 << 20, 42);
        assert_eq!(a.len(), 3); // abcde, bcdef, cdefg
        let b = char_kgram_hashes("abcdefg", 5, 1 << 20, 42);
        assert_eq!(a, b);
    }

    #[test]
    fn kgrams_short_input_hashes_whole_text() {
        let set = char_kgram_hashes("ab", 7, 1 << 20, 42);
        assert_eq!(set.len(), 1);
        assert!(char_kgram_hashes("", 7, 1 << 20, 42).is_empty());
    }

    #[test]
    fn kgrams_stable_under_truncation() {
        let long = "x".repeat(4096);
        let a = char_kgram_hashes(&long, 5, 1024, 42);
        let b = char_kgram_hashes(&long, 5, 1024, 42);
        assert_eq!(a, b);
        // Truncation means the extra tail contributes nothing.
        let longer = format!("{long}{}", "y".repeat(512));
        assert_eq!(char_kgram_hashes(&longer, 5, 1024, 42), a);
    }

    #[test]
    fn custom_classes_filters_framework_prefixes() {
        let noise = NoiseConfig::default();
        let selectors = vec![".hero .w-container", ".is-active", ".card-title:hover", "div.hero"];
        let classes = custom_classes(selectors.iter(), &noise);
        assert!(classes.contains("hero"));
        assert!(classes.contains("card-title"));
        assert!(!classes.contains("w-container"));
        assert!(!classes.contains("is-active"));
    }

    #[test]
    fn html_classes_parses_both_quote_styles() {
        let html = r#"<div class="hero main"><span class='badge'></span></div>"#;
        let classes = html_classes(html);
        assert_eq!(
            classes,
            ["hero", "main", "badge"].iter().map(|s| s.to_string()).collect()
        );
    }

    #[test]
    fn declarations_normalize_and_strip_vendor_prefixes() {
        assert_eq!(
            normalize_declaration(" Color ", " #F00 ").unwrap(),
            "color:#f00"
        );
        assert_eq!(
            normalize_declaration("-webkit-transform", "scale(2)").unwrap(),
            "transform:scale(2)"
        );
        assert!(normalize_declaration("", "red").is_none());
        assert!(normalize_declaration("color", "  ").is_none());
    }
}
