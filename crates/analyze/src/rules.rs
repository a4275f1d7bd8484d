//! Identical-rule mining: the tangible evidence layer.
//!
//! Shared selectors whose declaration blocks substantially overlap are the
//! strongest human-checkable signal two stylesheets have a common ancestor.
//! Framework and reset selectors are filtered first — every site built on
//! the same kit shares those, and they prove nothing.

use serde::{Deserialize, Serialize};

use fingerprint::{NoiseConfig, RuleMap};

use crate::AnalyzeConfig;

/// A selector present in both documents with overlapping declarations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdenticalRule {
    pub selector: String,
    /// Declarations present in both rule bodies, in the first document's order.
    pub shared_declarations: Vec<String>,
    /// `|common| / max(|a|, |b|)`.
    pub overlap: f64,
}

/// A high-signal shared declaration block (three or more declarations).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyCombination {
    pub selector: String,
    pub declarations: Vec<String>,
    /// `decl_count * overlap` ranking score.
    pub score: f64,
}

/// Everything rule mining produced for one comparison.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleEvidence {
    pub identical_rules: Vec<IdenticalRule>,
    pub property_combinations: Vec<PropertyCombination>,
}

/// Intersect two rule maps into filtered, ranked evidence.
pub fn mine_identical_rules(
    a: &RuleMap,
    b: &RuleMap,
    noise: &NoiseConfig,
    cfg: &AnalyzeConfig,
) -> RuleEvidence {
    let mut rules = Vec::new();

    for (selector, decls_a) in a {
        let Some(decls_b) = b.get(selector) else {
            continue;
        };
        if noise.is_reset_selector(selector) || noise.is_framework_selector(selector) {
            continue;
        }
        let shared: Vec<String> = decls_a
            .iter()
            .filter(|d| decls_b.contains(*d))
            .cloned()
            .collect();
        if shared.len() < cfg.rule_min_common_decls {
            continue;
        }
        let overlap = shared.len() as f64 / decls_a.len().max(decls_b.len()) as f64;
        if overlap < cfg.rule_overlap_floor {
            continue;
        }
        rules.push(IdenticalRule {
            selector: selector.clone(),
            shared_declarations: shared,
            overlap,
        });
    }

    rules.sort_by(|x, y| {
        y.overlap
            .partial_cmp(&x.overlap)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                y.shared_declarations
                    .len()
                    .cmp(&x.shared_declarations.len())
            })
            .then_with(|| x.selector.cmp(&y.selector))
    });
    rules.truncate(cfg.max_identical_rules);

    let mut combinations: Vec<PropertyCombination> = rules
        .iter()
        .filter(|r| r.shared_declarations.len() >= 3)
        .map(|r| PropertyCombination {
            selector: r.selector.clone(),
            declarations: r.shared_declarations.clone(),
            score: r.shared_declarations.len() as f64 * r.overlap,
        })
        .collect();
    combinations.sort_by(|x, y| {
        y.score
            .partial_cmp(&x.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| x.selector.cmp(&y.selector))
    });

    RuleEvidence {
        identical_rules: rules,
        property_combinations: combinations,
    }
}

/// Shared declaration blocks independent of selector names.
///
/// When a copyist renames every class, selector intersection goes dark but
/// the declaration blocks themselves survive. This mines rule bodies whose
/// normalized declaration sets coincide across the two documents under
/// different selectors.
pub fn mine_renamed_blocks(
    a: &RuleMap,
    b: &RuleMap,
    noise: &NoiseConfig,
    cfg: &AnalyzeConfig,
) -> Vec<PropertyCombination> {
    let mut out = Vec::new();
    for (sel_a, decls_a) in a {
        if decls_a.len() < 3 || noise.is_reset_selector(sel_a) || noise.is_framework_selector(sel_a)
        {
            continue;
        }
        let mut sorted_a = decls_a.clone();
        sorted_a.sort();
        for (sel_b, decls_b) in b {
            if sel_a == sel_b || decls_b.len() != decls_a.len() {
                continue;
            }
            if noise.is_reset_selector(sel_b) || noise.is_framework_selector(sel_b) {
                continue;
            }
            let mut sorted_b = decls_b.clone();
            sorted_b.sort();
            if sorted_a == sorted_b {
                out.push(PropertyCombination {
                    selector: format!("{sel_a} ~ {sel_b}"),
                    declarations: decls_a.clone(),
                    score: decls_a.len() as f64,
                });
            }
        }
    }
    out.sort_by(|x, y| {
        y.score
            .partial_cmp(&x.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| x.selector.cmp(&y.selector))
    });
    out.truncate(cfg.max_identical_rules);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use fingerprint::{parse_rules, ParseStats};

    fn rules_of(css: &str) -> RuleMap {
        parse_rules(css, &mut ParseStats::default())
    }

    fn mine(a: &str, b: &str) -> RuleEvidence {
        mine_identical_rules(
            &rules_of(a),
            &rules_of(b),
            &NoiseConfig::default(),
            &AnalyzeConfig::default(),
        )
    }

    #[test]
    fn identical_rule_with_full_overlap() {
        let css = ".hero { color: #f00; padding: 8px }";
        let evidence = mine(css, css);
        assert_eq!(evidence.identical_rules.len(), 1);
        let rule = &evidence.identical_rules[0];
        assert_eq!(rule.selector, ".hero");
        assert_eq!(rule.overlap, 1.0);
        assert_eq!(rule.shared_declarations.len(), 2);
    }

    #[test]
    fn color_swap_keeps_half_overlap() {
        let evidence = mine(
            ".hero { color: #f00; padding: 8px }",
            ".hero { color: #0f0; padding: 8px }",
        );
        // Only padding survives; 1 common declaration is below the floor of 2.
        assert!(evidence.identical_rules.is_empty());
        let evidence = mine(
            ".hero { color: #f00; padding: 8px; margin: 0; border: none }",
            ".hero { color: #0f0; padding: 8px; margin: 0; border: none }",
        );
        assert_eq!(evidence.identical_rules.len(), 1);
        assert!((evidence.identical_rules[0].overlap - 0.75).abs() < 1e-9);
    }

    #[test]
    fn class_rename_produces_no_identical_rules() {
        let evidence = mine(
            ".hero { color: #f00; padding: 8px; margin: 0 }",
            ".foo { color: #f00; padding: 8px; margin: 0 }",
        );
        assert!(evidence.identical_rules.is_empty());
    }

    #[test]
    fn renamed_blocks_surface_shared_declarations() {
        let a = rules_of(".hero { color: #f00; padding: 8px; margin: 0 }");
        let b = rules_of(".foo { color: #f00; padding: 8px; margin: 0 }");
        let blocks = mine_renamed_blocks(
            &a,
            &b,
            &NoiseConfig::default(),
            &AnalyzeConfig::default(),
        );
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].declarations.len(), 3);
        assert!(blocks[0].selector.contains(".hero"));
        assert!(blocks[0].selector.contains(".foo"));
    }

    #[test]
    fn reset_and_framework_selectors_are_filtered() {
        let shared = "* { margin: 0; padding: 0 } body { margin: 0; font-size: 16px } \
                      .w-container { max-width: 940px; margin: 0 auto } \
                      .hero { color: #f00; padding: 8px }";
        let evidence = mine(shared, shared);
        assert_eq!(evidence.identical_rules.len(), 1);
        assert_eq!(evidence.identical_rules[0].selector, ".hero");
    }

    #[test]
    fn property_combinations_require_three_shared_declarations() {
        let evidence = mine(
            ".a { color: red; margin: 0 } .b { color: blue; padding: 1px; border: none; width: 50% }",
            ".a { color: red; margin: 0 } .b { color: blue; padding: 1px; border: none; width: 50% }",
        );
        assert_eq!(evidence.identical_rules.len(), 2);
        assert_eq!(evidence.property_combinations.len(), 1);
        assert_eq!(evidence.property_combinations[0].selector, ".b");
        assert!((evidence.property_combinations[0].score - 4.0).abs() < 1e-9);
    }

    #[test]
    fn output_capped_at_configured_maximum() {
        let mut a = String::new();
        for i in 0..50 {
            a.push_str(&format!(".rule-{i} {{ color: #111; padding: {i}px }} "));
        }
        let evidence = mine(&a, &a);
        assert_eq!(
            evidence.identical_rules.len(),
            AnalyzeConfig::default().max_identical_rules
        );
    }

    #[test]
    fn empty_css_yields_empty_evidence() {
        let evidence = mine("", ".hero { color: #f00; padding: 8px }");
        assert!(evidence.identical_rules.is_empty());
        assert!(evidence.property_combinations.is_empty());
    }
}
