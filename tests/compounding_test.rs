//! Integration tests for compounding rules.

mod common;

use common::{allomorph_chains, entries, Fixture};
use hermitcrab::prelude::*;

fn compounding_language(fx: &Fixture) -> Language {
    let noun = fx.syn(&[("pos", "n")]);
    let nn = CompoundingRule::new("nn")
        .subrule(CompoundingSubrule::new(
            "nn1",
            vec![fx.stem("head")],
            vec![fx.stem("nonhead")],
            vec![MorphologicalOutput::copy("nonhead"), MorphologicalOutput::copy("head")],
        ))
        .max_application_count(2)
        .head_required_syntactic(noun.clone())
        .non_head_required_syntactic(noun.clone());
    let stratum = fx
        .stratum("surface")
        .morphological_rule(nn)
        .entry(fx.root("pa", "pa", noun.clone()))
        .entry(fx.root("tak", "tak", noun))
        .entry(fx.root("ki", "ki", fx.syn(&[("pos", "v")])));
    fx.language(vec![stratum])
}

#[test]
fn test_two_stem_compound_parses_to_head() {
    let fx = Fixture::new();
    let morpher = fx.morpher(compounding_language(&fx));

    let words = morpher.parse_word("patak").unwrap();
    assert_eq!(entries(&words), vec!["tak"]);
    assert_eq!(fx.forms(&words), vec!["patak"]);
    assert_eq!(allomorph_chains(&words), vec![vec!["pa".to_string(), "tak".to_string()]]);
}

#[test]
fn test_reversed_compound_parses_to_other_head() {
    let fx = Fixture::new();
    let morpher = fx.morpher(compounding_language(&fx));

    let words = morpher.parse_word("takpa").unwrap();
    assert_eq!(entries(&words), vec!["pa"]);
}

#[test]
fn test_max_stem_count_limits_compounding() {
    let fx = Fixture::new();
    let morpher = MorpherBuilder::new(compounding_language(&fx))
        .max_stem_count(1)
        .build()
        .unwrap();

    assert!(morpher.parse_word("patak").unwrap().is_empty());
    assert_eq!(entries(&morpher.parse_word("tak").unwrap()), vec!["tak"]);
}

#[test]
fn test_three_stems_need_a_larger_limit() {
    let fx = Fixture::new();
    let default = fx.morpher(compounding_language(&fx));
    assert!(default.parse_word("papatak").unwrap().is_empty());

    let wide = MorpherBuilder::new(compounding_language(&fx))
        .max_stem_count(3)
        .build()
        .unwrap();
    assert_eq!(entries(&wide.parse_word("papatak").unwrap()), vec!["tak"]);
}

#[test]
fn test_non_head_must_satisfy_requirements() {
    let fx = Fixture::new();
    let morpher = fx.morpher(compounding_language(&fx));

    // ki is a verb; the rule only takes nominal non-heads.
    assert!(morpher.parse_word("kitak").unwrap().is_empty());
}
