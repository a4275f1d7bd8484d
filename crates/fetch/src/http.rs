//! Static HTTP fetching and multi-page crawling.
//!
//! The static path is a plain GET plus asset extraction; templates that ship
//! an empty shell and render client-side can be routed through an optional
//! [`BrowserRenderer`] collaborator. Multi-page crawls run under one global
//! deadline and return whatever pages succeeded in time — partial results
//! are valid indexing input.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use tokio::time::Instant;
use url::Url;

use crate::client::build_client;
use crate::types::{FetchError, FetchedDocument, PageFetch, PageInfo};
use crate::url_norm::url_path;

/// Retrieves the blob triple for one URL.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &Url, timeout: Duration) -> Result<FetchedDocument, FetchError>;
}

/// External collaborator that runs a real browser for client-rendered
/// templates. Consumed as an interface only; the engine never assumes one
/// is present.
#[async_trait]
pub trait BrowserRenderer: Send + Sync {
    async fn render(&self, url: &Url, timeout: Duration) -> Result<String, FetchError>;
}

/// External collaborator enumerating a template's pages.
#[async_trait]
pub trait PageDiscoverer: Send + Sync {
    async fn discover(&self, url: &Url, budget: usize) -> Result<Vec<PageInfo>, FetchError>;
}

/// Assets pulled out of a parsed document in one pass. Owned strings only:
/// the DOM handle itself must not cross an await point.
struct ExtractedAssets {
    inline_css: String,
    stylesheet_urls: Vec<Url>,
    inline_js: String,
    looks_unrendered: bool,
}

fn extract_assets(base: &Url, html: &str) -> ExtractedAssets {
    let doc = Html::parse_document(html);
    let style_sel = Selector::parse("style").expect("static selector");
    let link_sel = Selector::parse("link[rel=\"stylesheet\"]").expect("static selector");
    let script_sel = Selector::parse("script").expect("static selector");

    let mut inline_css = String::new();
    for style in doc.select(&style_sel) {
        inline_css.push_str(&style.text().collect::<String>());
        inline_css.push('\n');
    }

    let mut stylesheet_urls = Vec::new();
    for link in doc.select(&link_sel) {
        if let Some(href) = link.value().attr("href") {
            if let Ok(resolved) = base.join(href) {
                stylesheet_urls.push(resolved);
            }
        }
    }

    let mut inline_js = String::new();
    let mut script_count = 0usize;
    for script in doc.select(&script_sel) {
        script_count += 1;
        if script.value().attr("src").is_none() {
            inline_js.push_str(&script.text().collect::<String>());
            inline_js.push('\n');
        }
    }

    // An empty shell with scripts is the signature of a client-rendered
    // template: hand it to the browser collaborator when one is wired in.
    let marker = html.len() >= 500
        || html.to_ascii_lowercase().contains("<html")
        || html.to_ascii_lowercase().contains("<!doctype");
    let body_text_len: usize = doc.root_element().text().map(str::len).sum();
    let looks_unrendered = (!marker || body_text_len < 64) && script_count > 0;

    ExtractedAssets {
        inline_css,
        stylesheet_urls,
        inline_js,
        looks_unrendered,
    }
}

/// Static-first fetcher with an optional browser-rendered fallback.
pub struct HttpFetcher {
    client: Client,
    renderer: Option<Arc<dyn BrowserRenderer>>,
    /// External stylesheets resolved per page.
    max_stylesheets: usize,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, FetchError> {
        Ok(Self {
            client: build_client()?,
            renderer: None,
            max_stylesheets: 8,
        })
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn BrowserRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    async fn get_text(&self, url: &Url, timeout: Duration) -> Result<String, FetchError> {
        let request = self.client.get(url.clone()).timeout(timeout);
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::FetchTimeout {
                    url: url.to_string(),
                }
            } else {
                FetchError::failed(url.as_str(), e)
            }
        })?;
        if !response.status().is_success() {
            return Err(FetchError::failed(
                url.as_str(),
                format!("status {}", response.status()),
            ));
        }
        response
            .text()
            .await
            .map_err(|e| FetchError::failed(url.as_str(), e))
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &Url, timeout: Duration) -> Result<FetchedDocument, FetchError> {
        let started = Instant::now();
        let mut html = self.get_text(url, timeout).await?;
        let mut assets = extract_assets(url, &html);

        if assets.looks_unrendered {
            if let Some(renderer) = &self.renderer {
                let remaining = timeout.saturating_sub(started.elapsed());
                match renderer.render(url, remaining).await {
                    Ok(rendered) => {
                        tracing::debug!(url = %url, "static fetch looked unrendered; used browser fallback");
                        html = rendered;
                        assets = extract_assets(url, &html);
                    }
                    Err(err) => {
                        tracing::warn!(url = %url, error = %err, "browser fallback failed; keeping static html");
                    }
                }
            }
        }

        let mut css = assets.inline_css;
        for sheet_url in assets.stylesheet_urls.iter().take(self.max_stylesheets) {
            let remaining = timeout.saturating_sub(started.elapsed());
            if remaining.is_zero() {
                break;
            }
            // A stylesheet that cannot be fetched contributes nothing; the
            // fingerprint tolerates the gap.
            match self.get_text(sheet_url, remaining).await {
                Ok(text) => {
                    css.push_str(&text);
                    css.push('\n');
                }
                Err(err) => {
                    tracing::debug!(stylesheet = %sheet_url, error = %err, "stylesheet fetch failed");
                }
            }
        }

        Ok(FetchedDocument {
            html,
            css,
            js: assets.inline_js,
        })
    }
}

/// Crawl up to `budget` pages of a template under one global deadline.
///
/// The root URL is always fetched first. Pages that fail individually are
/// skipped; once the deadline elapses the pages gathered so far are
/// returned. Zero successful pages is an error.
pub async fn fetch_pages(
    fetcher: &dyn Fetcher,
    discoverer: &dyn PageDiscoverer,
    url: &Url,
    budget: usize,
    deadline: Duration,
) -> Result<Vec<PageFetch>, FetchError> {
    let started = Instant::now();
    let budget = budget.max(1);

    let mut infos = vec![PageInfo {
        url: url.to_string(),
        path: url_path(url),
    }];
    match discoverer.discover(url, budget).await {
        Ok(discovered) => {
            for info in discovered {
                if infos.len() == budget {
                    break;
                }
                if infos.iter().all(|existing| existing.url != info.url) {
                    infos.push(info);
                }
            }
        }
        Err(err) => {
            tracing::warn!(url = %url, error = %err, "page discovery failed; indexing root only");
        }
    }

    let mut pages = Vec::new();
    for info in infos {
        let remaining = deadline.saturating_sub(started.elapsed());
        if remaining.is_zero() {
            tracing::debug!(fetched = pages.len(), "multi-page deadline elapsed");
            break;
        }
        let page_url = match Url::parse(&info.url) {
            Ok(u) => u,
            Err(_) => continue,
        };
        match fetcher.fetch(&page_url, remaining).await {
            Ok(document) => pages.push(PageFetch { info, document }),
            Err(err) => {
                tracing::debug!(page = %info.url, error = %err, "page fetch failed; skipping");
            }
        }
    }

    if pages.is_empty() {
        if started.elapsed() >= deadline {
            return Err(FetchError::FetchTimeout {
                url: url.to_string(),
            });
        }
        return Err(FetchError::NoPages {
            url: url.to_string(),
        });
    }
    Ok(pages)
}
