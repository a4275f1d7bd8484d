//! URL normalization and extraction from operator-provided text.
//!
//! Complaint forms arrive with URLs in every imaginable dressing:
//! `"original: https://site.example/"`, `<https://site.example>`, bare
//! hosts without a scheme. Everything the engine compares or stores goes
//! through [`normalize_url`] first so that trailing-slash and case variants
//! of one address collapse to a single canonical form.

use url::Url;

use crate::types::FetchError;

/// Canonicalize a URL: default the scheme to https, lowercase the host,
/// strip the fragment, and collapse a trailing slash on the root path.
pub fn normalize_url(input: &str) -> Result<Url, FetchError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(FetchError::InvalidUrl {
            input: input.to_string(),
            reason: "empty".into(),
        });
    }
    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };
    let mut url = Url::parse(&with_scheme).map_err(|e| FetchError::InvalidUrl {
        input: input.to_string(),
        reason: e.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(FetchError::InvalidUrl {
            input: input.to_string(),
            reason: format!("unsupported scheme {:?}", url.scheme()),
        });
    }
    url.set_fragment(None);
    // The `url` crate already lowercases registered hosts; normalize the
    // path's trailing slash so `/about/` and `/about` compare equal.
    let path = url.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        url.set_path(path.trim_end_matches('/'));
    }
    Ok(url)
}

/// Extract the bare URL from an operator-provided text field.
///
/// Recognizes the labeling convention `"label: https://…"` and
/// angle-bracketed URLs, then normalizes whatever was found.
pub fn extract_url(input: &str) -> Result<Url, FetchError> {
    let text = input.trim();

    if let (Some(open), Some(close)) = (text.find('<'), text.rfind('>')) {
        if open < close {
            return normalize_url(&text[open + 1..close]);
        }
    }

    if let Some(scheme_pos) = text.find("http://").or_else(|| text.find("https://")) {
        let candidate = &text[scheme_pos..];
        let end = candidate
            .find(|c: char| c.is_whitespace() || c == '>' || c == ')')
            .unwrap_or(candidate.len());
        return normalize_url(&candidate[..end]);
    }

    // "label: host.example/path" without a scheme.
    if let Some((_, rest)) = text.split_once(':') {
        let rest = rest.trim();
        if !rest.is_empty() && rest.contains('.') && !rest.contains(' ') {
            return normalize_url(rest);
        }
    }

    normalize_url(text)
}

/// The normalized path of a URL, for page ids and classification.
pub fn url_path(url: &Url) -> String {
    let path = url.path();
    if path.is_empty() {
        "/".to_string()
    } else {
        path.to_string()
    }
}
