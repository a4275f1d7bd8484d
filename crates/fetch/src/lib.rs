//! # Siteprint Fetcher
//!
//! Retrieves the live content of a template URL as three text blobs —
//! rendered HTML, concatenated stylesheet text, concatenated inline script
//! text — plus multi-page crawling under a global deadline.
//!
//! Acquisition is static-first (plain HTTP GET through a pooled client); a
//! [`BrowserRenderer`] collaborator can be plugged in for templates that
//! only materialize client-side. Page enumeration is likewise behind the
//! [`PageDiscoverer`] interface, with [`LinkDiscoverer`] as the built-in
//! same-host default.
//!
//! Partial content is never an error here: missing stylesheets yield empty
//! CSS blobs and failed pages are skipped, because the fingerprinting layer
//! downstream is specified to accept incomplete input.

mod client;
mod discover;
mod http;
mod types;
mod url_norm;

pub use discover::LinkDiscoverer;
pub use http::{fetch_pages, BrowserRenderer, Fetcher, HttpFetcher, PageDiscoverer};
pub use types::{FetchError, FetchedDocument, PageFetch, PageInfo};
pub use url_norm::{extract_url, normalize_url, url_path};
