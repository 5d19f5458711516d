//! Property-based tests for the feature structure algebra.
//!
//! Structures are drawn over three symbolic features of three symbols each,
//! with every feature either absent or constrained to a non-empty subset.

use hermitcrab::error::MorphError;
use hermitcrab::feature::{FeatureStruct, FeatureSystem};
use proptest::prelude::*;

const FEATURES: [&str; 3] = ["place", "height", "tone"];
const SYMBOLS: [&str; 3] = ["a", "b", "c"];

fn system() -> FeatureSystem {
    let mut sys = FeatureSystem::new();
    for name in FEATURES {
        sys.add_symbolic(name, &SYMBOLS).unwrap();
    }
    sys
}

fn build(sys: &FeatureSystem, masks: &[u8]) -> FeatureStruct {
    let mut builder = FeatureStruct::builder(sys);
    for (feature, mask) in FEATURES.iter().zip(masks) {
        let picked: Vec<&str> = SYMBOLS
            .iter()
            .enumerate()
            .filter(|(i, _)| mask & (1 << i) != 0)
            .map(|(_, s)| *s)
            .collect();
        if !picked.is_empty() {
            builder = builder.symbols(feature, &picked);
        }
    }
    builder.build().unwrap()
}

// ============================================================================
// GENERATORS
// ============================================================================

/// Per-feature masks; 0 leaves the feature unspecified.
fn masks() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(0u8..8, FEATURES.len())
}

/// Masks whose specified features are never the full symbol set.
fn partial_masks() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(0u8..7, FEATURES.len())
}

// ============================================================================
// PROPERTIES
// ============================================================================

proptest! {
    #[test]
    fn unification_is_commutative(a in masks(), b in masks()) {
        let sys = system();
        let (x, y) = (build(&sys, &a), build(&sys, &b));
        prop_assert_eq!(x.unify(&y), y.unify(&x));
        prop_assert_eq!(x.is_unifiable(&y), x.unify(&y).is_some());
    }

    #[test]
    fn unification_is_subsumed_by_both_inputs(a in masks(), b in masks()) {
        let sys = system();
        let (x, y) = (build(&sys, &a), build(&sys, &b));
        if let Some(u) = x.unify(&y) {
            prop_assert!(x.subsumes(&u));
            prop_assert!(y.subsumes(&u));
        }
    }

    #[test]
    fn subsumption_implies_unifiability(a in masks(), b in masks()) {
        let sys = system();
        let (x, y) = (build(&sys, &a), build(&sys, &b));
        if x.subsumes(&y) {
            prop_assert!(x.is_unifiable(&y));
            prop_assert_eq!(x.unify(&y), Some(y.clone()));
        }
    }

    #[test]
    fn subsumption_is_reflexive(a in masks()) {
        let sys = system();
        let x = build(&sys, &a);
        prop_assert!(x.subsumes(&x));
        prop_assert!(FeatureStruct::new().subsumes(&x));
    }

    #[test]
    fn double_negation_is_identity(a in partial_masks()) {
        let sys = system();
        let x = build(&sys, &a);
        prop_assert_eq!(x.anti().anti(), x.clone());
        // A structure never unifies with its own negation unless it is empty.
        prop_assert_eq!(x.is_unifiable(&x.anti()), x.is_empty());
    }

    #[test]
    fn freezing_keeps_the_content_hash(a in masks()) {
        let sys = system();
        let mut x = build(&sys, &a);
        let before = x.content_hash();
        prop_assert_eq!(x.freeze(), before);
        prop_assert_eq!(x.content_hash(), before);
        prop_assert_eq!(x.deep_clone().content_hash(), before);
    }

    #[test]
    fn frozen_structures_reject_mutation(a in masks(), b in masks()) {
        let sys = system();
        let mut x = build(&sys, &a);
        let y = build(&sys, &b);
        x.freeze();
        prop_assert_eq!(x.add(&y), Err(MorphError::Frozen("feature structure")));
        prop_assert_eq!(x.clear(), Err(MorphError::Frozen("feature structure")));
        let mut copy = x.deep_clone();
        prop_assert!(copy.clear().is_ok());
    }
}
