//! Forward application of rewrite rules.

use log::{trace, warn};
use rustc_hash::FxHashSet;

use crate::error::Result;
use crate::feature::FeatureStruct;
use crate::lexicon::MprFeatureSet;
use crate::pattern::{Constraint, Match, Matcher, MatcherSettings, NodeFilter, Pattern, PatternNode};
use crate::phonology::rewrite::{ApplicationMode, RewriteRule, RewriteSubrule};
use crate::phonology::{LEFT_ENV, RIGHT_ENV, TARGET};
use crate::rule::{Rule, RuleContext};
use crate::shape::{Direction, NodeId, Shape};
use crate::word::Word;

#[derive(Debug)]
enum Action {
    /// Priority-union each target node with the matching structure.
    Feature(Vec<FeatureStruct>),
    /// Insert new nodes after the target and delete the target.
    Narrow(Vec<Constraint>),
}

#[derive(Debug)]
struct Subrule {
    matcher: Matcher,
    action: Action,
    required_syntactic: FeatureStruct,
    required_mpr: MprFeatureSet,
    excluded_mpr: MprFeatureSet,
}

impl Subrule {
    fn is_applicable(&self, word: &Word) -> bool {
        self.required_syntactic.is_unifiable(word.syntactic())
            && word.mpr_features().contains_all(&self.required_mpr)
            && word.mpr_features().is_disjoint(&self.excluded_mpr)
    }
}

/// A rewrite rule compiled for synthesis.
#[derive(Debug)]
pub struct SynthesisRewriteRule {
    name: String,
    direction: Direction,
    mode: ApplicationMode,
    required_syntactic: FeatureStruct,
    subrules: Vec<Subrule>,
}

impl SynthesisRewriteRule {
    /// Compile `rule`.
    ///
    /// Insertion subrules without any environment have no place to insert
    /// and are skipped with a warning.
    pub fn new(rule: &RewriteRule) -> Result<Self> {
        let iterative = rule.mode == ApplicationMode::Iterative;
        let mut subrules = Vec::with_capacity(rule.subrules.len());
        for sr in &rule.subrules {
            if rule.lhs.is_empty() && !sr.has_environment() {
                warn!("rule '{}': insertion subrule without an environment ignored", rule.name);
                continue;
            }
            let pattern = Self::pattern(rule, sr, iterative);
            let settings = MatcherSettings {
                direction: rule.direction,
                filter: NodeFilter::ALL,
                ..MatcherSettings::default()
            };
            let action = if rule.is_feature_subrule(sr) {
                Action::Feature(sr.rhs.iter().map(|c| c.fs.clone()).collect())
            } else {
                Action::Narrow(sr.rhs.clone())
            };
            subrules.push(Subrule {
                matcher: Matcher::new(&pattern, settings)?,
                action,
                required_syntactic: sr.required_syntactic.clone(),
                required_mpr: sr.required_mpr.clone(),
                excluded_mpr: sr.excluded_mpr.clone(),
            });
        }
        Ok(Self {
            name: rule.name.clone(),
            direction: rule.direction,
            mode: rule.mode,
            required_syntactic: rule.required_syntactic.clone(),
            subrules,
        })
    }

    fn pattern(rule: &RewriteRule, sr: &RewriteSubrule, iterative: bool) -> Pattern {
        let mut pattern = Pattern::new();
        if !sr.left.is_empty() {
            pattern.push(PatternNode::group(LEFT_ENV, sr.left.nodes().to_vec()));
        }
        let target = rule
            .lhs
            .iter()
            .map(|c| {
                PatternNode::Constraint(Constraint {
                    unsearched_only: iterative,
                    ..c.clone()
                })
            })
            .collect();
        pattern.push(PatternNode::group(TARGET, target));
        if !sr.right.is_empty() {
            pattern.push(PatternNode::group(RIGHT_ENV, sr.right.nodes().to_vec()));
        }
        pattern
    }

    /// Rule name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Earliest match in scan direction over all active subrules; ties go to
    /// the earlier subrule.
    fn earliest_match(&self, shape: &Shape, from: Option<NodeId>, active: &[bool]) -> Option<(usize, Match)> {
        let order = shape.order();
        let key = |m: &Match| -> isize {
            match m.origin() {
                Some(node) => {
                    let pos = order[node.0 as usize] as isize;
                    match self.direction {
                        Direction::LeftToRight => pos,
                        Direction::RightToLeft => -pos,
                    }
                }
                None => isize::MAX,
            }
        };
        let mut best: Option<(usize, Match)> = None;
        for (i, sr) in self.subrules.iter().enumerate() {
            if !active[i] {
                continue;
            }
            if let Some(m) = sr.matcher.first_match(shape, from) {
                if best.as_ref().map_or(true, |(_, b)| key(&m) < key(b)) {
                    best = Some((i, m));
                }
            }
        }
        best
    }

    /// Apply one match; returns the node scanning resumes from.
    fn apply_match(&self, shape: &mut Shape, sr: &Subrule, m: &Match, iterative: bool) -> Result<Option<NodeId>> {
        let target: Vec<NodeId> = m.group(TARGET).map(<[NodeId]>::to_vec).unwrap_or_default();
        match &sr.action {
            Action::Feature(rhs) => {
                for (&node, fs) in target.iter().zip(rhs) {
                    shape.fs_mut(node)?.priority_union(fs, m.bindings())?;
                    if iterative {
                        shape.set_dirty(node, true)?;
                    }
                }
                Ok(m.origin().and_then(|o| shape.step(o, self.direction)))
            }
            Action::Narrow(rhs) => {
                let anchor = if let Some(&last) = target.last() {
                    Some(last)
                } else if let Some(left) = m.group(LEFT_ENV) {
                    left.last().copied()
                } else {
                    m.group(RIGHT_ENV).and_then(|right| shape.prev(right[0]))
                };
                let Some(mut cur) = anchor else {
                    return Ok(None);
                };
                let mut inserted = Vec::with_capacity(rhs.len());
                for c in rhs {
                    let fs = c.fs.instantiate(m.bindings())?;
                    cur = shape.add_after(cur, c.kind, fs)?;
                    if iterative {
                        shape.set_dirty(cur, true)?;
                    }
                    inserted.push(cur);
                }
                for &node in &target {
                    shape.set_deleted(node, true)?;
                }
                if iterative {
                    for &node in target.iter().chain(&inserted) {
                        shape.set_searched(node, true)?;
                    }
                }
                let order = shape.order();
                let furthest = m
                    .origin()
                    .into_iter()
                    .chain(target.iter().copied())
                    .chain(inserted.iter().copied())
                    .max_by_key(|n| {
                        let pos = order[n.0 as usize] as isize;
                        match self.direction {
                            Direction::LeftToRight => pos,
                            Direction::RightToLeft => -pos,
                        }
                    });
                Ok(furthest.and_then(|n| shape.step(n, self.direction)))
            }
        }
    }

    fn apply_iterative(&self, shape: &mut Shape, active: &[bool]) -> Result<bool> {
        let mut from = None;
        let mut changed = false;
        while let Some((i, m)) = self.earliest_match(shape, from, active) {
            let resume = self.apply_match(shape, &self.subrules[i], &m, true)?;
            changed = true;
            match resume {
                Some(node) => from = Some(node),
                None => break,
            }
        }
        Ok(changed)
    }

    fn apply_simultaneous(&self, shape: &mut Shape, active: &[bool]) -> Result<bool> {
        let mut found = Vec::new();
        let mut from = None;
        while let Some((i, m)) = self.earliest_match(shape, from, active) {
            let next = m.origin().and_then(|o| shape.step(o, self.direction));
            found.push((i, m));
            match next {
                Some(node) => from = Some(node),
                None => break,
            }
        }

        let mut claimed = FxHashSet::default();
        let mut kept = Vec::with_capacity(found.len());
        for (i, m) in found {
            let target = m.group(TARGET).unwrap_or(&[]);
            if target.iter().any(|n| claimed.contains(n)) {
                continue;
            }
            claimed.extend(target.iter().copied());
            kept.push((i, m));
        }
        for (i, m) in &kept {
            self.apply_match(shape, &self.subrules[*i], m, false)?;
        }
        Ok(!kept.is_empty())
    }
}

impl Rule for SynthesisRewriteRule {
    fn is_applicable(&self, input: &Word, _ctx: &RuleContext<'_>) -> bool {
        self.required_syntactic.is_unifiable(input.syntactic())
    }

    fn apply(&self, input: &Word, ctx: &RuleContext<'_>) -> Result<Vec<Word>> {
        let active: Vec<bool> = self.subrules.iter().map(|sr| sr.is_applicable(input)).collect();
        if !active.contains(&true) {
            return Ok(vec![input.clone()]);
        }
        let mut output = input.deep_clone();
        let shape = output.shape_mut()?;
        let changed = match self.mode {
            ApplicationMode::Iterative => self.apply_iterative(shape, &active)?,
            ApplicationMode::Simultaneous => self.apply_simultaneous(shape, &active)?,
        };
        if !changed {
            return Ok(vec![input.clone()]);
        }
        shape.reset_flags()?;
        output.freeze();
        trace!("applied phonological rule '{}'", self.name);
        ctx.trace.phonological_rule_applied(&self.name, input, &output);
        Ok(vec![output])
    }
}
