//! Reporter-facing scenarios: identical copies, class renames, color swaps,
//! unrelated sites, and the two drift outcomes.

mod common;

use std::sync::Arc;

use common::{doc, engine_with, FixtureDiscoverer, FixtureFetcher};
use siteprint::analyze::Verdict;
use siteprint::fingerprint::StructuralLevel;
use siteprint::store::RescanVerdict;
use siteprint::{CompareOutcome, CompareReport, ScanRecommendation, SimilarityEngine};

const HERO_HTML: &str =
    r#"<html><body><section class="hero"><h1>Launch</h1><p>Copy</p><a class="cta">Go</a></section></body></html>"#;
const HERO_CSS: &str =
    ".hero { color: #f00; padding: 8px; margin: 0 auto; max-width: 960px }\n.cta { background: #f00; border-radius: 4px }";

fn scenario_engine(pairs: &[(&str, &str, &str)]) -> (SimilarityEngine, Arc<FixtureFetcher>) {
    let fetcher = Arc::new(FixtureFetcher::new());
    for (host, html, css) in pairs {
        fetcher.serve(host, doc(html, css));
    }
    let engine = engine_with(fetcher.clone(), Arc::new(FixtureDiscoverer(vec![])));
    (engine, fetcher)
}

async fn compare(engine: &SimilarityEngine, a: &str, b: &str) -> CompareReport {
    match engine.compare(a, b).await.unwrap() {
        CompareOutcome::Scored(report) => *report,
        CompareOutcome::Indeterminate { missing } => {
            panic!("comparison unexpectedly indeterminate: {missing:?}")
        }
    }
}

#[tokio::test]
async fn scenario_identical_content() {
    let (engine, _f) = scenario_engine(&[
        ("url-a.example.com", HERO_HTML, HERO_CSS),
        ("url-a-dup.example.com", HERO_HTML, HERO_CSS),
    ]);
    let report = compare(
        &engine,
        "https://url-a.example.com",
        "https://url-a-dup.example.com",
    )
    .await;

    assert!(report.combined.jaccard >= 0.95);
    assert!(report.css.jaccard >= 0.95);
    assert!(report.html.jaccard >= 0.95);

    let hero = report
        .evidence
        .identical_rules
        .iter()
        .find(|r| r.selector == ".hero")
        .expect(".hero should be shared evidence");
    assert!(hero.shared_declarations.contains(&"color:#f00".to_string()));
    assert!(hero.shared_declarations.contains(&"padding:8px".to_string()));

    let body_section = report
        .structural
        .matches
        .iter()
        .find(|m| m.pattern == "body[section]")
        .expect("body[section] should match");
    assert_eq!(body_section.level, StructuralLevel::Page);
    assert_eq!(report.verdict, Verdict::HighSimilarity);
}

#[tokio::test]
async fn scenario_class_rename_only() {
    let renamed_html = HERO_HTML.replace("hero", "foo").replace("cta", "zap");
    let renamed_css = HERO_CSS.replace(".hero", ".foo").replace(".cta", ".zap");
    let (engine, _f) = scenario_engine(&[
        ("url-a.example.com", HERO_HTML, HERO_CSS),
        ("url-b.example.com", &renamed_html, &renamed_css),
    ]);
    let report = compare(
        &engine,
        "https://url-a.example.com",
        "https://url-b.example.com",
    )
    .await;

    // The custom-class signal collapses; the declaration signal survives.
    assert!(report.class_jaccard < 0.5);
    assert!(report.declaration_jaccard > 0.8);
    assert!(report.evidence.identical_rules.is_empty());
    // The renamed block still surfaces as a shared declaration combination.
    assert!(!report.evidence.property_combinations.is_empty());
    let block = &report.evidence.property_combinations[0];
    assert!(block.selector.contains(".hero") && block.selector.contains(".foo"));
    assert!(matches!(
        report.verdict,
        Verdict::HighSimilarity | Verdict::Moderate
    ));
}

#[tokio::test]
async fn scenario_color_swap_only() {
    let swapped_css = HERO_CSS
        .replace("color: #f00", "color: #0f0")
        .replace("margin: 0 auto", "margin: 4px auto");
    let (engine, _f) = scenario_engine(&[
        ("url-a.example.com", HERO_HTML, HERO_CSS),
        ("url-b.example.com", HERO_HTML, &swapped_css),
    ]);
    let report = compare(
        &engine,
        "https://url-a.example.com",
        "https://url-b.example.com",
    )
    .await;

    let hero = report
        .evidence
        .identical_rules
        .iter()
        .find(|r| r.selector == ".hero")
        .expect(".hero survives a color swap");
    assert!((hero.overlap - 0.5).abs() < 1e-9);
    assert!(hero.shared_declarations.contains(&"padding:8px".to_string()));
    assert!(!hero
        .shared_declarations
        .iter()
        .any(|d| d.starts_with("color:")));
    // Cosmetic swaps barely move the full-content similarity.
    assert!(report.combined.jaccard > 0.7);
}

#[tokio::test]
async fn scenario_unrelated_templates() {
    let (engine, _f) = scenario_engine(&[
        ("site-a.example.com", common::ORIGINAL_HTML, common::ORIGINAL_CSS),
        ("site-b.example.org", common::UNRELATED_HTML, common::UNRELATED_CSS),
    ]);
    engine
        .index_template("tpl-a", "https://site-a.example.com", Some("alice"))
        .await
        .unwrap();

    let scan = engine.scan("https://site-b.example.org", None).await.unwrap();
    assert!(scan.matches.iter().all(|m| m.jaccard < 0.20));
    assert_eq!(scan.recommendation, ScanRecommendation::AppearsOriginal);

    let report = compare(
        &engine,
        "https://site-a.example.com",
        "https://site-b.example.org",
    )
    .await;
    assert!(report.combined.jaccard < 0.20);
    assert_eq!(report.verdict, Verdict::Distinct);
    assert!(report.evidence.identical_rules.is_empty());
}

#[tokio::test]
async fn scenario_drift_resolved() {
    let rewritten_html = r#"<html><body><main><article class="fresh"><h1>New thing</h1>
<p>Entirely rebuilt from scratch with different bones.</p></article></main></body></html>"#;
    let rewritten_css =
        ".fresh { font-family: serif; color: #222; line-height: 1.7 }\n.aside { float: right }";

    let (engine, fetcher) = scenario_engine(&[
        ("original.example.com", common::ORIGINAL_HTML, common::ORIGINAL_CSS),
        ("copycat.example.net", common::ORIGINAL_HTML, common::ORIGINAL_CSS),
    ]);
    engine
        .index_template("tpl-original", "https://original.example.com", None)
        .await
        .unwrap();
    let opened = engine
        .open_case("case-drift", "tpl-original", "https://copycat.example.net")
        .await
        .unwrap();
    assert!(opened.baseline_similarity > 0.8);

    // Two weeks later the alleged copy has been rewritten from scratch.
    fetcher.serve("copycat.example.net", doc(rewritten_html, rewritten_css));
    let report = engine.rescan("case-drift").await.unwrap();

    assert_eq!(report.verdict, RescanVerdict::Resolved);
    assert!(report.drift > 0.6, "drift was {}", report.drift);
    assert!(
        report.current_similarity < 0.35,
        "current similarity was {}",
        report.current_similarity
    );
}

#[tokio::test]
async fn scenario_drift_insufficient() {
    let touched_css = common::ORIGINAL_CSS.replace("color: #f00", "color: #e00");

    let (engine, fetcher) = scenario_engine(&[
        ("original.example.com", common::ORIGINAL_HTML, common::ORIGINAL_CSS),
        ("copycat.example.net", common::ORIGINAL_HTML, common::ORIGINAL_CSS),
    ]);
    engine
        .index_template("tpl-original", "https://original.example.com", None)
        .await
        .unwrap();
    engine
        .open_case("case-touchup", "tpl-original", "https://copycat.example.net")
        .await
        .unwrap();

    // A token color tweak, nothing more.
    fetcher.serve(
        "copycat.example.net",
        doc(common::ORIGINAL_HTML, &touched_css),
    );
    let report = engine.rescan("case-touchup").await.unwrap();

    assert_eq!(report.verdict, RescanVerdict::InsufficientChanges);
    assert!(report.drift < 0.10, "drift was {}", report.drift);
    assert!(
        report.current_similarity > 0.7,
        "current similarity was {}",
        report.current_similarity
    );
}
