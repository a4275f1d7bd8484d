//! Default page discovery: same-host links from the home page.
//!
//! Real deployments plug in a crawler through the [`PageDiscoverer`]
//! interface; this implementation covers the common case of hand-authored
//! templates whose navigation links every page from the home page.

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use url::Url;

use crate::client::build_client;
use crate::http::PageDiscoverer;
use crate::types::{FetchError, PageInfo};
use crate::url_norm::{normalize_url, url_path};

const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Extracts same-host links from the root document, shallowest paths first.
pub struct LinkDiscoverer {
    client: Client,
}

impl LinkDiscoverer {
    pub fn new() -> Result<Self, FetchError> {
        Ok(Self {
            client: build_client()?,
        })
    }
}

fn same_host_paths(base: &Url, html: &str) -> Vec<Url> {
    let doc = Html::parse_document(html);
    let anchor_sel = Selector::parse("a[href]").expect("static selector");
    let mut seen = BTreeSet::new();
    let mut out = Vec::new();
    for anchor in doc.select(&anchor_sel) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        if href.starts_with('#') || href.starts_with("mailto:") || href.starts_with("tel:") {
            continue;
        }
        let Ok(resolved) = base.join(href) else {
            continue;
        };
        let Ok(normalized) = normalize_url(resolved.as_str()) else {
            continue;
        };
        if normalized.host_str() != base.host_str() {
            continue;
        }
        if normalized.path() == base.path() {
            continue;
        }
        if seen.insert(normalized.to_string()) {
            out.push(normalized);
        }
    }
    // Shallow navigation targets first: a template's primary pages sit at
    // depth one, deep content pages are sampled after them.
    out.sort_by_key(|u| (u.path().matches('/').count(), u.path().to_string()));
    out
}

#[async_trait]
impl PageDiscoverer for LinkDiscoverer {
    async fn discover(&self, url: &Url, budget: usize) -> Result<Vec<PageInfo>, FetchError> {
        let response = self
            .client
            .get(url.clone())
            .timeout(DISCOVERY_TIMEOUT)
            .send()
            .await
            .map_err(|e| FetchError::failed(url.as_str(), e))?;
        let html = response
            .text()
            .await
            .map_err(|e| FetchError::failed(url.as_str(), e))?;

        Ok(same_host_paths(url, &html)
            .into_iter()
            .take(budget.saturating_sub(1))
            .map(|link| PageInfo {
                path: url_path(&link),
                url: link.to_string(),
            })
            .collect())
    }
}
