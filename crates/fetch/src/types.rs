//! Fetcher data types and errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The three text blobs extracted from one live page.
///
/// A missing stylesheet or script is an empty blob, not an error; downstream
/// fingerprinting tolerates incomplete content.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FetchedDocument {
    /// Document markup as served (or browser-rendered via the fallback).
    pub html: String,
    /// Inline `<style>` text plus resolved external stylesheets, concatenated.
    pub css: String,
    /// Inline `<script>` text, concatenated.
    pub js: String,
}

impl FetchedDocument {
    pub fn is_empty(&self) -> bool {
        self.html.is_empty() && self.css.is_empty() && self.js.is_empty()
    }
}

/// One discovered page of a multi-page template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageInfo {
    pub url: String,
    /// Path component, normalized to start with `/`.
    pub path: String,
}

/// A fetched page: its identity plus content.
#[derive(Debug, Clone, PartialEq)]
pub struct PageFetch {
    pub info: PageInfo,
    pub document: FetchedDocument,
}

/// Errors surfaced by the fetching layer.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to fetch {url}: {reason}")]
    FetchFailed { url: String, reason: String },

    #[error("fetch deadline elapsed for {url}")]
    FetchTimeout { url: String },

    #[error("invalid url {input:?}: {reason}")]
    InvalidUrl { input: String, reason: String },

    #[error("no pages could be fetched for {url}")]
    NoPages { url: String },
}

impl FetchError {
    pub fn failed(url: &str, reason: impl std::fmt::Display) -> Self {
        FetchError::FetchFailed {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }
}
