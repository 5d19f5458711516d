//! Ordered composition of rules.

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::error::Result;
use crate::rule::comparer::{ValueComparer, WordComparer, WordSet};
use crate::rule::{Rule, RuleContext};
use crate::word::Word;

/// How the rules of a cascade combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serialization", derive(serde::Serialize, serde::Deserialize))]
pub enum CascadeOrder {
    /// Rules apply in list order; each may be skipped.
    #[default]
    Linear,
    /// Rules apply in any order, each at most once.
    Permutation,
    /// Every rule applies to the original input; outputs are pooled.
    Simultaneous,
}

/// Decides whether rules after rule `i` may still be tried when rule `i`
/// was tried on `word`. Returning `false` makes rule `i` obligatory.
pub type ContinueFn = Arc<dyn Fn(usize, &Word) -> bool + Send + Sync>;

/// A list of rules applied as one.
///
/// For linear and permutation order the cascade explores every sequence of
/// applications. A word is emitted when at least one rule applied and every
/// rule it did not get to is skippable. Permutation order deduplicates
/// intermediate states, so each distinct word is explored once per set of
/// remaining rules.
///
/// # Example
///
/// ```rust,ignore
/// let cascade = RuleCascade::new(slot_rules, CascadeOrder::Linear)
///     .with_continue(Arc::new(move |i, _| optional[i]));
/// let outputs = cascade.apply(&word, &ctx)?;
/// ```
pub struct RuleCascade<R, C = ValueComparer> {
    rules: Vec<R>,
    order: CascadeOrder,
    cont: Option<ContinueFn>,
    comparer: C,
}

impl<R: Rule> RuleCascade<R, ValueComparer> {
    /// Cascade over `rules` using value equality.
    pub fn new(rules: Vec<R>, order: CascadeOrder) -> Self {
        Self::with_comparer(rules, order, ValueComparer)
    }
}

impl<R: Rule, C: WordComparer + Clone> RuleCascade<R, C> {
    /// Cascade with an explicit comparer.
    pub fn with_comparer(rules: Vec<R>, order: CascadeOrder, comparer: C) -> Self {
        Self {
            rules,
            order,
            cont: None,
            comparer,
        }
    }

    /// Install the continue predicate (default: every rule is skippable).
    pub fn with_continue(mut self, cont: ContinueFn) -> Self {
        self.cont = Some(cont);
        self
    }

    /// The rules.
    pub fn rules(&self) -> &[R] {
        &self.rules
    }

    /// The combination order.
    pub fn order(&self) -> CascadeOrder {
        self.order
    }

    fn should_continue(&self, index: usize, word: &Word) -> bool {
        self.cont.as_ref().map_or(true, |cont| cont(index, word))
    }

    fn explore(
        &self,
        input: &Word,
        candidates: &[usize],
        applied: bool,
        ctx: &RuleContext<'_>,
        out: &mut WordSet<C>,
        visited: &mut FxHashMap<Vec<usize>, WordSet<C>>,
    ) -> Result<()> {
        let mut all_skippable = true;
        for (k, &i) in candidates.iter().enumerate() {
            let rule = &self.rules[i];
            if rule.is_applicable(input, ctx) {
                let next: Vec<usize> = match self.order {
                    CascadeOrder::Permutation => candidates.iter().copied().filter(|&j| j != i).collect(),
                    _ => candidates[k + 1..].to_vec(),
                };
                for word in rule.apply(input, ctx)? {
                    if self.order == CascadeOrder::Permutation {
                        let seen = visited
                            .entry(next.clone())
                            .or_insert_with(|| WordSet::with_comparer(self.comparer.clone()));
                        if !seen.insert(word.clone()) {
                            continue;
                        }
                    }
                    self.explore(&word, &next, true, ctx, out, visited)?;
                }
            }
            if !self.should_continue(i, input) {
                all_skippable = false;
                break;
            }
        }
        if applied && all_skippable {
            out.insert(input.clone());
        }
        Ok(())
    }
}

impl<R: Rule, C: WordComparer + Clone> Rule for RuleCascade<R, C> {
    fn is_applicable(&self, input: &Word, ctx: &RuleContext<'_>) -> bool {
        self.rules.iter().any(|r| r.is_applicable(input, ctx))
    }

    fn apply(&self, input: &Word, ctx: &RuleContext<'_>) -> Result<Vec<Word>> {
        let mut out = WordSet::with_comparer(self.comparer.clone());
        match self.order {
            CascadeOrder::Simultaneous => {
                for rule in &self.rules {
                    if rule.is_applicable(input, ctx) {
                        for word in rule.apply(input, ctx)? {
                            out.insert(word);
                        }
                    }
                }
            }
            CascadeOrder::Linear | CascadeOrder::Permutation => {
                let candidates: Vec<usize> = (0..self.rules.len()).collect();
                let mut visited = FxHashMap::default();
                self.explore(input, &candidates, false, ctx, &mut out, &mut visited)?;
            }
        }
        Ok(out.into_vec())
    }
}

impl<R, C> fmt::Debug for RuleCascade<R, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleCascade")
            .field("rules", &self.rules.len())
            .field("order", &self.order)
            .field("continue", &self.cont.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::{GrammarIndex, Language};
    use crate::morpher::MorpherConfig;
    use crate::shape::Shape;
    use crate::trace::NullTraceManager;

    /// Appends digit `n` to the stratum number, so outputs record the
    /// sequence of rules that produced them.
    struct Step(usize);

    impl Rule for Step {
        fn apply(&self, input: &Word, _ctx: &RuleContext<'_>) -> Result<Vec<Word>> {
            let mut word = input.deep_clone();
            word.set_stratum(input.stratum() * 10 + self.0)?;
            word.freeze();
            Ok(vec![word])
        }
    }

    fn run(cascade: &RuleCascade<Step>) -> Vec<usize> {
        let language = Language::new("test");
        let index = GrammarIndex::build(&language).unwrap();
        let config = MorpherConfig::default();
        let ctx = RuleContext {
            language: &language,
            index: &index,
            config: &config,
            trace: &NullTraceManager,
            rule_selector: None,
            entry_selector: None,
        };
        let mut input = Word::new(0, Shape::new());
        input.freeze();
        let mut out: Vec<usize> = cascade.apply(&input, &ctx).unwrap().iter().map(Word::stratum).collect();
        out.sort_unstable();
        out
    }

    #[test]
    fn test_linear_explores_every_subsequence() {
        let cascade = RuleCascade::new(vec![Step(1), Step(2)], CascadeOrder::Linear);
        assert_eq!(run(&cascade), vec![1, 2, 12]);
    }

    #[test]
    fn test_obligatory_rule_cannot_be_skipped() {
        let cascade = RuleCascade::new(vec![Step(1), Step(2)], CascadeOrder::Linear)
            .with_continue(Arc::new(|i, _| i != 0));
        assert_eq!(run(&cascade), vec![1, 12]);
    }

    #[test]
    fn test_permutation_tries_both_orders() {
        let cascade = RuleCascade::new(vec![Step(1), Step(2)], CascadeOrder::Permutation);
        assert_eq!(run(&cascade), vec![1, 2, 12, 21]);
    }

    #[test]
    fn test_simultaneous_pools_single_applications() {
        let cascade = RuleCascade::new(vec![Step(1), Step(2)], CascadeOrder::Simultaneous);
        assert_eq!(run(&cascade), vec![1, 2]);
    }

    #[test]
    fn test_empty_cascade_has_no_output() {
        let cascade: RuleCascade<Step> = RuleCascade::new(Vec::new(), CascadeOrder::Linear);
        assert!(run(&cascade).is_empty());
    }
}
