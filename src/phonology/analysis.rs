//! Unapplication of rewrite rules.
//!
//! Feature-changing subrules are undone in place: every segment the rule
//! could have produced is widened to also admit what it could have come
//! from. Structure-changing subrules cannot be undone in place, so they
//! produce variants (one per choice of sites) alongside the unchanged word.

use log::trace;
use rustc_hash::FxHashSet;

use crate::error::Result;
use crate::feature::{FeatureStruct, VariableBindings};
use crate::pattern::{acceptable, Constraint, Match, Matcher, MatcherSettings, NodeFilter, Pattern, PatternNode};
use crate::phonology::rewrite::{AnalysisReapplyType, RewriteRule, RewriteSubrule};
use crate::phonology::{LEFT_ENV, RIGHT_ENV, TARGET};
use crate::rule::{Rule, RuleContext, WordSet};
use crate::shape::{Direction, NodeId, NodeKind, Shape};
use crate::word::Word;

fn target_group(i: usize) -> String {
    format!("{}{}", TARGET, i)
}

#[derive(Debug)]
struct FeatureSubrule {
    matcher: Matcher,
    deltas: Vec<FeatureStruct>,
    required_syntactic: FeatureStruct,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NarrowKind {
    /// Synthesis inserted nodes; analysis removes them.
    Insertion,
    /// Synthesis deleted nodes; analysis restores them.
    Deletion,
    /// Synthesis replaced nodes by a different sequence.
    Replacement,
}

#[derive(Debug)]
struct NarrowSubrule {
    matcher: Matcher,
    kind: NarrowKind,
    lhs: Vec<Constraint>,
    required_syntactic: FeatureStruct,
}

/// Where a narrow subrule may have applied.
struct Site {
    remove: Vec<NodeId>,
    insert_after: NodeId,
    bindings: VariableBindings,
}

/// A rewrite rule compiled for analysis.
#[derive(Debug)]
pub struct AnalysisRewriteRule {
    name: String,
    direction: Direction,
    reapply: AnalysisReapplyType,
    required_syntactic: FeatureStruct,
    features: Vec<FeatureSubrule>,
    narrow: Vec<NarrowSubrule>,
}

fn env_pattern(sr: &RewriteSubrule, middle: Vec<PatternNode>) -> Pattern {
    let mut pattern = Pattern::new();
    if !sr.left.is_empty() {
        pattern.push(PatternNode::group(LEFT_ENV, sr.left.nodes().to_vec()));
    }
    for node in middle {
        pattern.push(node);
    }
    if !sr.right.is_empty() {
        pattern.push(PatternNode::group(RIGHT_ENV, sr.right.nodes().to_vec()));
    }
    pattern
}

impl AnalysisRewriteRule {
    /// Compile `rule` for unapplication.
    pub fn new(rule: &RewriteRule) -> Result<Self> {
        let direction = rule.direction.reverse();
        let mut features = Vec::new();
        let mut narrow = Vec::new();
        // MPR features are unknown until lexical lookup; synthesis checks them.
        for sr in &rule.subrules {
            if rule.is_feature_subrule(sr) {
                features.push(Self::compile_feature(rule, sr, direction)?);
            } else if let Some(n) = Self::compile_narrow(rule, sr)? {
                narrow.push(n);
            }
        }
        Ok(Self {
            name: rule.name.clone(),
            direction,
            reapply: rule.analysis_reapply_type(),
            required_syntactic: rule.required_syntactic.clone(),
            features,
            narrow,
        })
    }

    fn compile_feature(rule: &RewriteRule, sr: &RewriteSubrule, direction: Direction) -> Result<FeatureSubrule> {
        let mut targets = Vec::with_capacity(rule.lhs.len());
        let mut anti_rhs = Vec::with_capacity(rule.lhs.len());
        let mut deltas = Vec::with_capacity(rule.lhs.len());
        for (i, (l, r)) in rule.lhs.iter().zip(&sr.rhs).enumerate() {
            let target = Constraint {
                kind: NodeKind::Segment,
                fs: l.fs.overlaid(&r.fs),
                unsearched_only: true,
            };
            targets.push(PatternNode::group(&target_group(i), vec![PatternNode::Constraint(target)]));
            let anti = r.fs.anti();
            let mut delta = anti.deep_clone();
            delta.subtract(&l.fs.anti())?;
            anti_rhs.push(anti);
            deltas.push(delta);
        }

        // Only unapply where the rule could actually have changed something.
        let nonvacuous = acceptable(move |shape: &Shape, m: &Match| {
            anti_rhs.iter().enumerate().any(|(i, anti)| match m.group(&target_group(i)) {
                Some(nodes) => {
                    let mut bindings = m.bindings().clone();
                    !shape.fs(nodes[0]).is_unifiable_bound(anti, &mut bindings)
                }
                None => false,
            })
        });
        let settings = MatcherSettings {
            direction,
            filter: NodeFilter::ALL,
            acceptable: Some(nonvacuous),
            ..MatcherSettings::default()
        };
        Ok(FeatureSubrule {
            matcher: Matcher::new(&env_pattern(sr, targets), settings)?,
            deltas,
            required_syntactic: sr.required_syntactic.clone(),
        })
    }

    fn compile_narrow(rule: &RewriteRule, sr: &RewriteSubrule) -> Result<Option<NarrowSubrule>> {
        let kind = match (rule.lhs.is_empty(), sr.rhs.is_empty()) {
            (true, true) => return Ok(None),
            (true, false) => NarrowKind::Insertion,
            (false, true) => NarrowKind::Deletion,
            (false, false) => NarrowKind::Replacement,
        };
        if kind == NarrowKind::Deletion && !sr.has_environment() {
            // Nothing marks where the deleted material stood.
            return Ok(None);
        }
        let middle = match kind {
            NarrowKind::Deletion => Vec::new(),
            _ => vec![PatternNode::group(
                TARGET,
                sr.rhs.iter().cloned().map(PatternNode::Constraint).collect(),
            )],
        };
        let settings = MatcherSettings {
            filter: NodeFilter::ALL,
            ..MatcherSettings::default()
        };
        Ok(Some(NarrowSubrule {
            matcher: Matcher::new(&env_pattern(sr, middle), settings)?,
            kind,
            lhs: rule.lhs.clone(),
            required_syntactic: sr.required_syntactic.clone(),
        }))
    }

    /// Rule name.
    pub fn name(&self) -> &str {
        &self.name
    }

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
        for (i, sr) in self.features.iter().enumerate() {
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

    /// Mark every node from `from` through `to` (in scan direction) searched.
    fn mark_searched(&self, shape: &mut Shape, from: Option<NodeId>, to: NodeId) -> Result<()> {
        let order = shape.order();
        let before_or_at = |a: NodeId| match self.direction {
            Direction::LeftToRight => order[a.0 as usize] <= order[to.0 as usize],
            Direction::RightToLeft => order[a.0 as usize] >= order[to.0 as usize],
        };
        let mut cur = from;
        while let Some(node) = cur {
            if !before_or_at(node) {
                break;
            }
            shape.set_searched(node, true)?;
            cur = shape.step(node, self.direction);
        }
        Ok(())
    }

    fn unapply_pass(&self, shape: &mut Shape, active: &[bool]) -> Result<bool> {
        let mut from = None;
        let mut changed = false;
        while let Some((i, m)) = self.earliest_match(shape, from, active) {
            let sr = &self.features[i];
            let order = shape.order();
            let mut end: Option<NodeId> = None;
            for (k, delta) in sr.deltas.iter().enumerate() {
                let Some(&node) = m.group(&target_group(k)).and_then(|g| g.first()) else {
                    continue;
                };
                shape.fs_mut(node)?.merge(delta, m.bindings())?;
                let further = end.map_or(true, |e| match self.direction {
                    Direction::LeftToRight => order[node.0 as usize] > order[e.0 as usize],
                    Direction::RightToLeft => order[node.0 as usize] < order[e.0 as usize],
                });
                if further {
                    end = Some(node);
                }
            }
            changed = true;
            let resume = m.origin().and_then(|o| shape.step(o, self.direction));
            if let Some(end) = end {
                self.mark_searched(shape, resume, end)?;
            }
            match resume {
                Some(node) => from = Some(node),
                None => break,
            }
        }
        Ok(changed)
    }

    fn unapply_features(&self, input: &Word) -> Result<Option<Word>> {
        let active: Vec<bool> = self
            .features
            .iter()
            .map(|sr| sr.required_syntactic.is_unifiable(input.syntactic()))
            .collect();
        if !active.contains(&true) {
            return Ok(None);
        }
        let mut output = input.deep_clone();
        let shape = output.shape_mut()?;
        let mut changed = false;
        loop {
            let pass = self.unapply_pass(shape, &active)?;
            shape.reset_flags()?;
            changed |= pass;
            if !pass || self.reapply == AnalysisReapplyType::Normal {
                break;
            }
        }
        if !changed {
            return Ok(None);
        }
        output.freeze();
        Ok(Some(output))
    }

    fn sites(&self, sr: &NarrowSubrule, shape: &Shape) -> Vec<Site> {
        let mut sites = Vec::new();
        let mut claimed = FxHashSet::default();
        for m in sr.matcher.all_matches(shape) {
            match sr.kind {
                NarrowKind::Insertion | NarrowKind::Replacement => {
                    let Some(target) = m.group(TARGET) else {
                        continue;
                    };
                    if target.iter().any(|n| claimed.contains(n)) {
                        continue;
                    }
                    claimed.extend(target.iter().copied());
                    sites.push(Site {
                        remove: target.to_vec(),
                        insert_after: target[target.len() - 1],
                        bindings: m.bindings().clone(),
                    });
                }
                NarrowKind::Deletion => {
                    let point = match m.group(LEFT_ENV) {
                        Some(left) => Some(left[left.len() - 1]),
                        None => m.group(RIGHT_ENV).and_then(|right| shape.prev(right[0])),
                    };
                    let Some(point) = point else {
                        continue;
                    };
                    if !claimed.insert(point) {
                        continue;
                    }
                    sites.push(Site {
                        remove: Vec::new(),
                        insert_after: point,
                        bindings: m.bindings().clone(),
                    });
                }
            }
        }
        sites
    }

    fn insert_lhs(shape: &mut Shape, lhs: &[Constraint], after: NodeId, copies: usize, bindings: &VariableBindings) -> Result<()> {
        let mut cur = after;
        for _ in 0..copies {
            for c in lhs {
                cur = shape.add_after(cur, c.kind, c.fs.instantiate_lenient(bindings))?;
            }
        }
        Ok(())
    }

    fn unapply_narrow(&self, sr: &NarrowSubrule, input: &Word, reapplications: usize) -> Result<Vec<Word>> {
        let sites = self.sites(sr, input.shape());
        let mut variants = vec![input.deep_clone()];
        for site in &sites {
            let mut added = Vec::new();
            for v in &variants {
                match sr.kind {
                    NarrowKind::Insertion => {
                        let mut nv = v.deep_clone();
                        let shape = nv.shape_mut()?;
                        for &node in &site.remove {
                            shape.set_deleted(node, true)?;
                        }
                        added.push(nv);
                    }
                    NarrowKind::Deletion => {
                        for copies in 1..=reapplications + 1 {
                            let mut nv = v.deep_clone();
                            Self::insert_lhs(nv.shape_mut()?, &sr.lhs, site.insert_after, copies, &site.bindings)?;
                            added.push(nv);
                        }
                    }
                    NarrowKind::Replacement => {
                        let mut nv = v.deep_clone();
                        let shape = nv.shape_mut()?;
                        Self::insert_lhs(shape, &sr.lhs, site.insert_after, 1, &site.bindings)?;
                        for &node in &site.remove {
                            shape.set_deleted(node, true)?;
                        }
                        added.push(nv);
                    }
                }
            }
            variants.extend(added);
        }
        Ok(variants
            .into_iter()
            .map(|mut w| {
                w.freeze();
                w
            })
            .collect())
    }
}

impl Rule for AnalysisRewriteRule {
    fn is_applicable(&self, input: &Word, _ctx: &RuleContext<'_>) -> bool {
        self.required_syntactic.is_unifiable(input.syntactic())
    }

    fn apply(&self, input: &Word, ctx: &RuleContext<'_>) -> Result<Vec<Word>> {
        let mut words = vec![match self.unapply_features(input)? {
            Some(output) => output,
            None => input.clone(),
        }];
        for sr in self.narrow.iter().rev() {
            if !sr.required_syntactic.is_unifiable(input.syntactic()) {
                continue;
            }
            let mut next = WordSet::new();
            for word in &words {
                next.extend(self.unapply_narrow(sr, word, ctx.config.deletion_reapplications)?);
            }
            words = next.into_vec();
        }
        for output in &words {
            if !output.value_eq(input) {
                trace!("unapplied phonological rule '{}'", self.name);
                ctx.trace.phonological_rule_unapplied(&self.name, input, output);
            }
        }
        Ok(words)
    }
}
