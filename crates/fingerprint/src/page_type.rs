//! Page-type classification from URL paths.
//!
//! Deterministic keyword heuristics only; anything the heuristics cannot
//! place falls back to `Unknown` with zero confidence. The labels exist so
//! the analyzer can align same-purpose pages across templates.

use serde::{Deserialize, Serialize};

/// Coarse functional label for a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageType {
    Home,
    About,
    Contact,
    Pricing,
    Blog,
    BlogPost,
    Portfolio,
    PortfolioItem,
    Services,
    ServiceDetail,
    Team,
    Faq,
    Legal,
    Shop,
    Product,
    Unknown,
}

impl PageType {
    pub fn as_str(self) -> &'static str {
        match self {
            PageType::Home => "home",
            PageType::About => "about",
            PageType::Contact => "contact",
            PageType::Pricing => "pricing",
            PageType::Blog => "blog",
            PageType::BlogPost => "blog_post",
            PageType::Portfolio => "portfolio",
            PageType::PortfolioItem => "portfolio_item",
            PageType::Services => "services",
            PageType::ServiceDetail => "service_detail",
            PageType::Team => "team",
            PageType::Faq => "faq",
            PageType::Legal => "legal",
            PageType::Shop => "shop",
            PageType::Product => "product",
            PageType::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for PageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a URL path into a page type with a confidence score.
pub fn classify_path(path: &str) -> (PageType, f32) {
    let segments: Vec<String> = path
        .trim_matches('/')
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| {
            // Drop extensions and normalize separators.
            let s = s.rsplit_once('.').map_or(s, |(stem, _)| stem);
            s.to_ascii_lowercase().replace('_', "-")
        })
        .collect();

    if segments.is_empty() || segments[0] == "index" || segments[0] == "home" {
        return (PageType::Home, 1.0);
    }

    let head = segments[0].as_str();
    let has_child = segments.len() > 1;

    let (page_type, confidence) = match head {
        "about" | "about-us" | "company" => (PageType::About, 0.9),
        "contact" | "contact-us" => (PageType::Contact, 0.9),
        "pricing" | "plans" | "prices" => (PageType::Pricing, 0.9),
        "blog" | "news" | "articles" | "journal" => {
            if has_child {
                (PageType::BlogPost, 0.85)
            } else {
                (PageType::Blog, 0.9)
            }
        }
        "portfolio" | "work" | "projects" | "showcase" => {
            if has_child {
                (PageType::PortfolioItem, 0.85)
            } else {
                (PageType::Portfolio, 0.9)
            }
        }
        "services" | "service" => {
            if has_child {
                (PageType::ServiceDetail, 0.85)
            } else {
                (PageType::Services, 0.9)
            }
        }
        "team" | "people" | "staff" => (PageType::Team, 0.9),
        "faq" | "faqs" | "help" => (PageType::Faq, 0.85),
        "legal" | "privacy" | "privacy-policy" | "terms" | "terms-of-service" | "imprint" => {
            (PageType::Legal, 0.9)
        }
        "shop" | "store" | "catalog" => (PageType::Shop, 0.9),
        "product" | "products" | "item" => (PageType::Product, 0.85),
        _ => (PageType::Unknown, 0.0),
    };

    // Common suffix fallbacks for single-segment vanity paths.
    if page_type == PageType::Unknown && segments.len() == 1 {
        if head.ends_with("-policy") {
            return (PageType::Legal, 0.6);
        }
        if head.starts_with("blog-") {
            return (PageType::BlogPost, 0.6);
        }
    }

    (page_type, confidence)
}
