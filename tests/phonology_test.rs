//! Integration tests for phonological rules through the full parse pipeline.

mod common;

use common::{entries, Fixture};
use hermitcrab::prelude::*;

fn voicing_morpher(fx: &Fixture) -> Morpher {
    let stratum = fx
        .stratum("surface")
        .phonological_rule(fx.voicing())
        .entry(fx.root("apa", "apa", FeatureStruct::new()))
        .entry(fx.root("tak", "tak", FeatureStruct::new()));
    fx.morpher(fx.language(vec![stratum]))
}

#[test]
fn test_intervocalic_voicing_parses_surface_form() {
    let fx = Fixture::new();
    let morpher = voicing_morpher(&fx);

    let words = morpher.parse_word("aba").unwrap();
    assert_eq!(entries(&words), vec!["apa"]);
    assert_eq!(fx.forms(&words), vec!["aba"]);
}

#[test]
fn test_underlying_form_does_not_parse_when_rule_applies() {
    let fx = Fixture::new();
    let morpher = voicing_morpher(&fx);

    // apa always surfaces as aba
    assert!(morpher.parse_word("apa").unwrap().is_empty());
}

#[test]
fn test_rule_outside_environment_is_vacuous() {
    let fx = Fixture::new();
    let morpher = voicing_morpher(&fx);

    let words = morpher.parse_word("tak").unwrap();
    assert_eq!(entries(&words), vec!["tak"]);
}

#[test]
fn test_generate_applies_phonology() {
    let fx = Fixture::new();
    let morpher = voicing_morpher(&fx);

    let forms = morpher.generate_words("apa", &[], FeatureStruct::new()).unwrap();
    assert_eq!(forms, vec!["aba"]);
}

#[test]
fn test_mpr_gated_subrule_unapplies_before_lookup() {
    let fx = Fixture::new();
    let lenis: MprFeatureSet = ["lenis"].into_iter().collect();
    let vowel = || Pattern::new().with(PatternNode::segment(fx.seg(&[("cons", "-")])));
    let voicing = RewriteRule::new("voicing", vec![Constraint::segment(fx.seg(&[("cons", "+")]))]).subrule(
        RewriteSubrule::new(vec![Constraint::segment(fx.seg(&[("voice", "+")]))])
            .left(vowel())
            .right(vowel())
            .required_mpr(lenis.clone()),
    );
    let stratum = fx
        .stratum("surface")
        .phonological_rule(voicing)
        .entry(fx.root("apa", "apa", FeatureStruct::new()).with_mpr_features(lenis))
        .entry(fx.root("ipi", "ipi", FeatureStruct::new()));
    let morpher = fx.morpher(fx.language(vec![stratum]));

    assert_eq!(morpher.generate_words("apa", &[], FeatureStruct::new()).unwrap(), vec!["aba"]);
    assert_eq!(morpher.generate_words("ipi", &[], FeatureStruct::new()).unwrap(), vec!["ipi"]);
    assert_eq!(entries(&morpher.parse_word("aba").unwrap()), vec!["apa"]);
    assert_eq!(entries(&morpher.parse_word("ipi").unwrap()), vec!["ipi"]);
    // ipi lacks the feature, so its voiced variant is never produced.
    assert!(morpher.parse_word("ibi").unwrap().is_empty());
}

#[test]
fn test_surface_mismatch_is_traced() {
    let fx = Fixture::new();
    let morpher = voicing_morpher(&fx);

    let (words, events) = morpher.parse_word_traced("apa").unwrap();
    assert!(words.is_empty());
    assert!(events.iter().any(|e| matches!(
        e,
        TraceEvent::ParseFailed {
            reason: FailureReason::SurfaceFormMismatch,
            ..
        }
    )));
}

#[test]
fn test_unknown_segment_is_an_error() {
    let fx = Fixture::new();
    let morpher = voicing_morpher(&fx);

    match morpher.parse_word("axa") {
        Err(MorphError::InvalidSegment { position, .. }) => assert_eq!(position, 1),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_self_feeding_insertion_terminates() {
    // ∅ → a / a _ : every inserted a is itself a trigger.
    let fx = Fixture::new();
    let a = fx.seg(&[("cons", "-"), ("high", "-")]);
    let epenthesis = RewriteRule::new("epenthesis", vec![]).subrule(
        RewriteSubrule::new(vec![Constraint::segment(a.clone())])
            .left(Pattern::new().with(PatternNode::segment(a))),
    );
    let stratum = fx
        .stratum("surface")
        .phonological_rule(epenthesis)
        .entry(fx.root("ta", "ta", FeatureStruct::new()));
    let morpher = fx.morpher(fx.language(vec![stratum]));

    let forms = morpher.generate_words("ta", &[], FeatureStruct::new()).unwrap();
    assert_eq!(forms, vec!["taa"]);
}

#[test]
fn test_self_feeding_feature_rule_terminates() {
    // i → a / a _ ; applying left to right each output re-triggers the rule.
    let fx = Fixture::new();
    let low_vowel = fx.seg(&[("cons", "-"), ("high", "-")]);
    let lowering = RewriteRule::new("lowering", vec![Constraint::segment(fx.seg(&[("cons", "-")]))]).subrule(
        RewriteSubrule::new(vec![Constraint::segment(fx.seg(&[("high", "-")]))])
            .left(Pattern::new().with(PatternNode::segment(low_vowel))),
    );
    let stratum = fx
        .stratum("surface")
        .phonological_rule(lowering)
        .entry(fx.root("taii", "taii", FeatureStruct::new()));
    let morpher = fx.morpher(fx.language(vec![stratum]));

    let forms = morpher.generate_words("taii", &[], FeatureStruct::new()).unwrap();
    assert_eq!(forms, vec!["taaa"]);
}
