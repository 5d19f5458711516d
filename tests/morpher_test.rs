//! Integration tests for morpher construction, configuration and concurrency.

mod common;

use std::sync::Arc;
use std::thread;

use common::{allomorph_chains, entries, Fixture};
use hermitcrab::prelude::*;

/// A grammar with enough ambiguity to produce several candidates per parse.
fn ambiguous_language(fx: &Fixture) -> Language {
    let plural = AffixProcessRule::new("pl").allomorph(fx.suffix("pl1", "i"));
    let stratum = fx
        .stratum("surface")
        .phonological_rule(fx.voicing())
        .morphological_rule(plural)
        .morphological_rule(fx.reduplication("redup"))
        .entry(fx.root("tak", "tak", FeatureStruct::new()))
        .entry(fx.root("taka", "taka", FeatureStruct::new()))
        .entry(fx.root("tag", "tag", FeatureStruct::new()))
        .entry(fx.root("apa", "apa", FeatureStruct::new()));
    fx.language(vec![stratum])
}

#[test]
fn test_ambiguous_parse_returns_every_analysis() {
    let fx = Fixture::new();
    let morpher = fx.morpher(ambiguous_language(&fx));

    // Voicing neutralizes k and g between vowels.
    let words = morpher.parse_word("tagi").unwrap();
    assert_eq!(entries(&words), vec!["tag", "tak"]);
}

#[test]
fn test_parallel_and_sequential_agree() {
    let fx = Fixture::new();
    let parallel = fx.morpher(ambiguous_language(&fx));
    let sequential = MorpherBuilder::new(ambiguous_language(&fx))
        .parallel(false)
        .build()
        .unwrap();

    for surface in ["tagi", "tagai", "takaktakak", "aba", "tagtag", "pa"] {
        let a = parallel.parse_word(surface).unwrap();
        let b = sequential.parse_word(surface).unwrap();
        assert_eq!(allomorph_chains(&a), allomorph_chains(&b), "surface {}", surface);
        assert_eq!(fx.forms(&a), fx.forms(&b), "surface {}", surface);
    }
}

#[test]
fn test_repeated_parses_are_deterministic() {
    let fx = Fixture::new();
    let morpher = fx.morpher(ambiguous_language(&fx));

    let first = allomorph_chains(&morpher.parse_word("tagi").unwrap());
    for _ in 0..20 {
        assert_eq!(allomorph_chains(&morpher.parse_word("tagi").unwrap()), first);
    }
}

#[test]
fn test_concurrent_parse_calls() {
    let fx = Fixture::new();
    let morpher = Arc::new(fx.morpher(ambiguous_language(&fx)));
    let expected = allomorph_chains(&morpher.parse_word("tagi").unwrap());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let morpher = Arc::clone(&morpher);
            thread::spawn(move || allomorph_chains(&morpher.parse_word("tagi").unwrap()))
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), expected);
    }
}

#[test]
fn test_results_are_frozen() {
    let fx = Fixture::new();
    let morpher = fx.morpher(ambiguous_language(&fx));

    let mut words = morpher.parse_word("aba").unwrap();
    let word = &mut words[0];
    assert!(word.is_frozen());

    let before = word.content_hash();
    assert_eq!(word.set_stratum(0), Err(MorphError::Frozen("word")));
    assert!(word.shape_mut().is_err());
    assert!(word.syntactic_mut().is_err());
    assert_eq!(word.content_hash(), before);

    let mut copy = word.deep_clone();
    assert!(!copy.is_frozen());
    assert!(copy.set_stratum(0).is_ok());
}

#[test]
fn test_lex_entry_selector_filters_roots() {
    let fx = Fixture::new();
    let morpher = MorpherBuilder::new(ambiguous_language(&fx))
        .lex_entry_selector(|entry| entry.id() != "tag")
        .build()
        .unwrap();

    assert_eq!(entries(&morpher.parse_word("tagi").unwrap()), vec!["tak"]);
}

#[test]
fn test_trace_manager_receives_events() {
    let fx = Fixture::new();
    let recorder = Arc::new(RecordingTraceManager::new());
    let morpher = MorpherBuilder::new(ambiguous_language(&fx))
        .trace_manager(recorder.clone())
        .build()
        .unwrap();

    let words = morpher.parse_word("aba").unwrap();
    let events = recorder.events();
    assert!(matches!(events.first(), Some(TraceEvent::AnalyzeWord { .. })));
    let successes = events
        .iter()
        .filter(|e| matches!(e, TraceEvent::ParseSuccessful { .. }))
        .count();
    assert_eq!(successes, words.len());
}

#[test]
fn test_search_root_allomorphs() {
    let fx = Fixture::new();
    let morpher = fx.morpher(ambiguous_language(&fx));

    let found = morpher.search_root_allomorphs(0, &fx.shape("tak")).unwrap();
    let ids: Vec<&str> = found.iter().map(|(entry, _)| entry.id()).collect();
    assert_eq!(ids, vec!["tak"]);
    assert!(morpher.search_root_allomorphs(0, &fx.shape("pa")).unwrap().is_empty());
    assert!(morpher.search_root_allomorphs(3, &fx.shape("tak")).is_err());
}

#[test]
fn test_duplicate_rule_names_are_rejected() {
    let fx = Fixture::new();
    let stratum = fx
        .stratum("surface")
        .morphological_rule(fx.reduplication("redup"))
        .morphological_rule(fx.reduplication("redup"));
    let result = MorpherBuilder::new(fx.language(vec![stratum])).build();
    assert_eq!(result.unwrap_err(), BuilderError::DuplicateRule("redup".to_string()));
}

#[test]
fn test_invalid_pattern_is_a_grammar_error() {
    let fx = Fixture::new();
    let empty_loop = PatternNode::zero_or_more(PatternNode::optional(PatternNode::segment(FeatureStruct::new())));
    let rule = AffixProcessRule::new("bad").allomorph(AffixProcessAllomorph::new(
        "bad1",
        vec![PatternPart::new("stem", Pattern::new().with(empty_loop))],
        vec![MorphologicalOutput::copy("stem")],
    ));
    let stratum = fx.stratum("surface").morphological_rule(rule);
    let result = MorpherBuilder::new(fx.language(vec![stratum])).build();
    assert!(matches!(
        result.unwrap_err(),
        BuilderError::InvalidGrammar(MorphError::InvalidPattern(_))
    ));
}

#[cfg(feature = "serialization")]
#[test]
fn test_config_serialization() {
    let config = MorpherConfig {
        max_stem_count: 3,
        deletion_reapplications: 1,
        parallel: false,
    };
    let json = serde_json::to_string(&config).unwrap();
    let back: MorpherConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(back, config);
}
