//! Shared fixtures for engine integration tests: a mutable in-memory
//! fetcher keyed by host, a static page discoverer, and template content.

// Each test binary uses a different slice of these helpers.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use siteprint::fetch::{FetchError, Fetcher, FetchedDocument, PageDiscoverer, PageInfo};
use siteprint::store::MemoryStore;
use siteprint::{EngineConfig, SimilarityEngine};

pub const ORIGINAL_HTML: &str = r#"<html><body>
<header class="topbar"><nav><a class="logo">Acme</a><a>Work</a><a>Contact</a></nav></header>
<section class="hero"><h1>Design studio</h1><p>We build honest sites.</p><a class="cta">Hire us</a></section>
<section class="features"><h2>What we do</h2><ul class="grid"><li>Brand</li><li>Web</li><li>Print</li><li>Motion</li></ul></section>
<footer class="footer"><p>All rights reserved.</p></footer>
</body></html>"#;

pub const ORIGINAL_CSS: &str = r#"
.topbar { position: sticky; top: 0; background: #fff; box-shadow: 0 1px 4px rgba(0,0,0,.1) }
.logo { font-weight: 700; letter-spacing: 2px; color: #111 }
.hero { color: #f00; padding: 8px; margin: 0 auto; max-width: 960px }
.cta { background: #f00; border-radius: 4px; padding: 12px 24px; color: #fff }
.features { display: flex; gap: 16px; padding: 48px 0 }
.grid { display: grid; grid-template-columns: repeat(4, 1fr); gap: 12px }
.footer { border-top: 1px solid #eee; padding: 24px; color: #888 }
"#;

pub const UNRELATED_HTML: &str = r#"<html><body>
<main><article class="post"><h1>Field notes</h1><p>A quiet journal about walking.</p>
<blockquote class="pull">Slow down.</blockquote></article></main>
<footer><nav><a>Archive</a><a>About</a></nav></footer>
</body></html>"#;

pub const UNRELATED_CSS: &str = r#"
.post { font-family: serif; line-height: 1.8; max-width: 640px; margin: 0 auto }
.pull { font-size: 1.4rem; font-style: italic; border-left: 3px solid #333; padding-left: 16px }
.byline { color: #666; text-transform: uppercase; font-size: .8rem }
"#;

pub fn doc(html: &str, css: &str) -> FetchedDocument {
    FetchedDocument {
        html: html.to_string(),
        css: css.to_string(),
        js: String::new(),
    }
}

/// Fetcher serving canned documents by `host` or `host/path`, mutable so
/// drift tests can change what a URL serves between fetches.
#[derive(Default)]
pub struct FixtureFetcher {
    docs: RwLock<HashMap<String, FetchedDocument>>,
}

impl FixtureFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serve(&self, key: &str, document: FetchedDocument) {
        self.docs
            .write()
            .expect("fixture lock")
            .insert(key.to_string(), document);
    }

    pub fn remove(&self, key: &str) {
        self.docs.write().expect("fixture lock").remove(key);
    }

    fn lookup(&self, url: &Url) -> Option<FetchedDocument> {
        let host = url.host_str().unwrap_or_default();
        let docs = self.docs.read().expect("fixture lock");
        docs.get(&format!("{host}{}", url.path()))
            .or_else(|| docs.get(host))
            .cloned()
    }
}

#[async_trait]
impl Fetcher for FixtureFetcher {
    async fn fetch(&self, url: &Url, _timeout: Duration) -> Result<FetchedDocument, FetchError> {
        self.lookup(url)
            .ok_or_else(|| FetchError::failed(url.as_str(), "no fixture for url"))
    }
}

/// Discoverer returning a fixed path list for every host.
pub struct FixtureDiscoverer(pub Vec<&'static str>);

#[async_trait]
impl PageDiscoverer for FixtureDiscoverer {
    async fn discover(&self, url: &Url, _budget: usize) -> Result<Vec<PageInfo>, FetchError> {
        Ok(self
            .0
            .iter()
            .map(|path| PageInfo {
                url: url.join(path).expect("fixture path").to_string(),
                path: path.to_string(),
            })
            .collect())
    }
}

pub fn engine_with(
    fetcher: Arc<FixtureFetcher>,
    discoverer: Arc<FixtureDiscoverer>,
) -> SimilarityEngine {
    SimilarityEngine::new(
        fetcher,
        discoverer,
        Arc::new(MemoryStore::new()),
        EngineConfig::default(),
    )
    .expect("engine construction")
}

/// Single-page engine serving the original and an identical copy.
pub fn single_page_engine() -> (SimilarityEngine, Arc<FixtureFetcher>) {
    let fetcher = Arc::new(FixtureFetcher::new());
    fetcher.serve("original.example.com", doc(ORIGINAL_HTML, ORIGINAL_CSS));
    fetcher.serve("copycat.example.net", doc(ORIGINAL_HTML, ORIGINAL_CSS));
    fetcher.serve("unrelated.example.org", doc(UNRELATED_HTML, UNRELATED_CSS));
    let engine = engine_with(fetcher.clone(), Arc::new(FixtureDiscoverer(vec![])));
    (engine, fetcher)
}
