//! Shared fixture grammar for integration tests.
//!
//! Segments: p b t d k g (consonants, voiceless/voiced pairs by place) and
//! a i (vowels), plus the boundary `+`.

#![allow(dead_code)]

use std::sync::Arc;

use hermitcrab::prelude::*;

pub struct Fixture {
    pub phonetic: FeatureSystem,
    pub syntactic: FeatureSystem,
    pub table: Arc<CharacterDefinitionTable>,
}

impl Fixture {
    pub fn new() -> Self {
        let mut phonetic = FeatureSystem::new();
        phonetic.add_symbolic("cons", &["+", "-"]).unwrap();
        phonetic.add_symbolic("voice", &["+", "-"]).unwrap();
        phonetic.add_symbolic("place", &["lab", "cor", "vel"]).unwrap();
        phonetic.add_symbolic("high", &["+", "-"]).unwrap();

        let mut syntactic = FeatureSystem::new();
        syntactic.add_symbolic("pos", &["n", "v"]).unwrap();
        syntactic.add_symbolic("tense", &["past", "pres"]).unwrap();
        syntactic.add_symbolic("num", &["sg", "pl"]).unwrap();
        syntactic.add_complex("agr");

        let consonant = |voice: &str, place: &str| {
            FeatureStruct::builder(&phonetic)
                .symbol("cons", "+")
                .symbol("voice", voice)
                .symbol("place", place)
                .build()
                .unwrap()
        };
        let vowel = |high: &str| {
            FeatureStruct::builder(&phonetic)
                .symbol("cons", "-")
                .symbol("voice", "+")
                .symbol("high", high)
                .build()
                .unwrap()
        };

        let mut table = CharacterDefinitionTable::new("surface");
        table.add_segment(&["p"], consonant("-", "lab"));
        table.add_segment(&["b"], consonant("+", "lab"));
        table.add_segment(&["t"], consonant("-", "cor"));
        table.add_segment(&["d"], consonant("+", "cor"));
        table.add_segment(&["k"], consonant("-", "vel"));
        table.add_segment(&["g"], consonant("+", "vel"));
        table.add_segment(&["a"], vowel("-"));
        table.add_segment(&["i"], vowel("+"));
        table.add_boundary(&["+"]);

        Self {
            phonetic,
            syntactic,
            table: Arc::new(table),
        }
    }

    /// Phonetic structure from `(feature, symbol)` pairs.
    pub fn seg(&self, pairs: &[(&str, &str)]) -> FeatureStruct {
        pairs
            .iter()
            .fold(FeatureStruct::builder(&self.phonetic), |b, (f, s)| b.symbol(f, s))
            .build()
            .unwrap()
    }

    /// Syntactic structure from `(feature, symbol)` pairs.
    pub fn syn(&self, pairs: &[(&str, &str)]) -> FeatureStruct {
        pairs
            .iter()
            .fold(FeatureStruct::builder(&self.syntactic), |b, (f, s)| b.symbol(f, s))
            .build()
            .unwrap()
    }

    pub fn shape(&self, text: &str) -> Shape {
        self.table.segment(text).unwrap()
    }

    pub fn stratum(&self, name: &str) -> Stratum {
        Stratum::new(name, self.table.clone())
    }

    pub fn language(&self, strata: Vec<Stratum>) -> Language {
        strata.into_iter().fold(
            Language::new("test")
                .with_phonetic_system(self.phonetic.clone())
                .with_syntactic_system(self.syntactic.clone()),
            Language::with_stratum,
        )
    }

    /// Entry `id` with a single allomorph `id` spelled `text`.
    pub fn root(&self, id: &str, text: &str, syntactic: FeatureStruct) -> LexEntry {
        LexEntry::new(id, syntactic).with_allomorph(RootAllomorph::new(id, self.shape(text)))
    }

    /// One or more segments of any kind, captured as `name`.
    pub fn stem(&self, name: &str) -> PatternPart {
        PatternPart::new(
            name,
            Pattern::new().with(PatternNode::one_or_more(PatternNode::segment(FeatureStruct::new()))),
        )
    }

    /// Allomorph adding `text` after the stem.
    pub fn suffix(&self, id: &str, text: &str) -> AffixProcessAllomorph {
        AffixProcessAllomorph::new(
            id,
            vec![self.stem("stem")],
            vec![
                MorphologicalOutput::copy("stem"),
                MorphologicalOutput::insert_shape(&self.shape(text)),
            ],
        )
    }

    /// Allomorph adding `text` before the stem.
    pub fn prefix(&self, id: &str, text: &str) -> AffixProcessAllomorph {
        AffixProcessAllomorph::new(
            id,
            vec![self.stem("stem")],
            vec![
                MorphologicalOutput::insert_shape(&self.shape(text)),
                MorphologicalOutput::copy("stem"),
            ],
        )
    }

    /// Whole-stem reduplication.
    pub fn reduplication(&self, name: &str) -> AffixProcessRule {
        AffixProcessRule::new(name).allomorph(
            AffixProcessAllomorph::new(
                name,
                vec![self.stem("stem")],
                vec![MorphologicalOutput::copy("stem"), MorphologicalOutput::copy("stem")],
            )
            .with_reduplication_hint(ReduplicationHint::Prefix),
        )
    }

    /// Intervocalic voicing: [+cons] → [+voice] / [-cons] _ [-cons].
    pub fn voicing(&self) -> RewriteRule {
        let vowel = || Pattern::new().with(PatternNode::segment(self.seg(&[("cons", "-")])));
        RewriteRule::new("voicing", vec![Constraint::segment(self.seg(&[("cons", "+")]))]).subrule(
            RewriteSubrule::new(vec![Constraint::segment(self.seg(&[("voice", "+")]))])
                .left(vowel())
                .right(vowel()),
        )
    }

    pub fn morpher(&self, language: Language) -> Morpher {
        MorpherBuilder::new(language).build().unwrap()
    }

    /// Sorted surface renderings.
    pub fn forms(&self, words: &[Word]) -> Vec<String> {
        let mut forms: Vec<String> = words.iter().map(|w| self.table.render(w.shape())).collect();
        forms.sort();
        forms
    }
}

/// Sorted, deduplicated root entry ids.
pub fn entries(words: &[Word]) -> Vec<String> {
    let mut ids: Vec<String> = words.iter().filter_map(|w| w.entry().map(str::to_string)).collect();
    ids.sort();
    ids.dedup();
    ids
}

/// Allomorph ids of each word in morph order, sorted.
pub fn allomorph_chains(words: &[Word]) -> Vec<Vec<String>> {
    let mut chains: Vec<Vec<String>> = words
        .iter()
        .map(|w| {
            w.allomorphs_in_morph_order()
                .iter()
                .map(|a| a.as_str().to_string())
                .collect()
        })
        .collect();
    chains.sort();
    chains
}
