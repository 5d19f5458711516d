//! Feature structures and their algebra.
//!
//! All operations treat a missing feature as "unconstrained". Unification
//! intersects symbol sets, so a failed unification always means some feature
//! was narrowed to the empty set.

use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use rustc_hash::FxHasher;

use crate::error::{MorphError, Result};
use crate::feature::bindings::VariableBindings;
use crate::feature::system::{FeatureId, FeatureKind, FeatureSystem};
use crate::feature::value::{SymbolSet, Value, Variable};

/// A mapping from features to values.
///
/// Mutating methods return [`MorphError::Frozen`] once [`freeze`](Self::freeze)
/// has been called. [`deep_clone`](Self::deep_clone) always yields a mutable
/// copy; plain `clone` preserves the frozen flag so frozen structures can be
/// shared cheaply.
#[derive(Debug, Clone, Default)]
pub struct FeatureStruct {
    values: BTreeMap<FeatureId, Value>,
    frozen: bool,
    hash: u64,
}

impl FeatureStruct {
    /// Create an empty structure.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a builder that resolves names against `system`.
    pub fn builder(system: &FeatureSystem) -> FeatureStructBuilder<'_> {
        FeatureStructBuilder::new(system)
    }

    /// Whether no feature has a value.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Number of features with a value.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Value of a feature.
    pub fn get(&self, feature: FeatureId) -> Option<&Value> {
        self.values.get(&feature)
    }

    /// Symbol set of a symbolic feature.
    pub fn symbols(&self, feature: FeatureId) -> Option<SymbolSet> {
        self.get(feature).and_then(Value::as_symbols)
    }

    /// Whether the feature has a value at this level.
    pub fn contains(&self, feature: FeatureId) -> bool {
        self.values.contains_key(&feature)
    }

    /// Whether the feature has a value at this level or inside any nested structure.
    pub fn contains_deep(&self, feature: FeatureId) -> bool {
        self.contains(feature)
            || self
                .values
                .values()
                .filter_map(Value::as_complex)
                .any(|fs| fs.contains_deep(feature))
    }

    /// Iterate in canonical (declaration) order.
    pub fn iter(&self) -> impl Iterator<Item = (FeatureId, &Value)> {
        self.values.iter().map(|(f, v)| (*f, v))
    }

    /// Whether any value is a variable.
    pub fn has_variables(&self) -> bool {
        self.values.values().any(Value::has_variables)
    }

    // ========================================================================
    // Mutation
    // ========================================================================

    fn check_frozen(&self) -> Result<()> {
        if self.frozen {
            Err(MorphError::Frozen("feature structure"))
        } else {
            Ok(())
        }
    }

    /// Set a feature value, replacing any previous one.
    pub fn set(&mut self, feature: FeatureId, value: Value) -> Result<()> {
        self.check_frozen()?;
        self.values.insert(feature, value);
        Ok(())
    }

    /// Remove a feature value.
    pub fn remove(&mut self, feature: FeatureId) -> Result<Option<Value>> {
        self.check_frozen()?;
        Ok(self.values.remove(&feature))
    }

    /// Remove every value.
    pub fn clear(&mut self) -> Result<()> {
        self.check_frozen()?;
        self.values.clear();
        Ok(())
    }

    /// Unify `other` into `self` in place.
    ///
    /// Returns `Ok(false)` and leaves `self` unchanged if the two are not unifiable.
    pub fn add(&mut self, other: &FeatureStruct) -> Result<bool> {
        self.check_frozen()?;
        match self.unify(other) {
            Some(result) => {
                self.values = result.values;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Overwrite `self` with the values specified by `other`.
    ///
    /// Variables in `other` are resolved against `bindings`; an unbound one is
    /// a grammar error and yields [`MorphError::UninstantiatedFeature`].
    pub fn priority_union(&mut self, other: &FeatureStruct, bindings: &VariableBindings) -> Result<()> {
        self.check_frozen()?;
        for (feature, value) in &other.values {
            let resolved = match value {
                Value::Symbolic(set) => Value::Symbolic(*set),
                Value::Variable(var) => Value::Symbolic(resolve_strict(var, bindings)?),
                Value::Complex(nested) => {
                    if let Some(Value::Complex(mine)) = self.values.get_mut(feature) {
                        mine.priority_union(nested, bindings)?;
                        continue;
                    }
                    Value::Complex(nested.instantiate(bindings)?)
                }
            };
            self.values.insert(*feature, resolved);
        }
        Ok(())
    }

    /// Widen `self` by adding the symbols of `other`.
    ///
    /// Only features `self` already constrains are touched: a feature missing
    /// from `self` already admits every symbol. Unbound variables are ignored.
    pub fn merge(&mut self, other: &FeatureStruct, bindings: &VariableBindings) -> Result<()> {
        self.check_frozen()?;
        for (feature, value) in &other.values {
            let Some(mine) = self.values.get_mut(feature) else {
                continue;
            };
            match (mine, value) {
                (Value::Symbolic(a), Value::Symbolic(b)) if a.compatible(b) => *a = a.union(b),
                (Value::Symbolic(a), Value::Variable(var)) => {
                    if let Some(set) = var.resolve(bindings) {
                        *a = a.union(&set);
                    }
                }
                (Value::Complex(a), Value::Complex(b)) => a.merge(b, bindings)?,
                _ => {}
            }
        }
        Ok(())
    }

    /// Remove the symbols of `other` from `self`; features left empty are dropped.
    pub fn subtract(&mut self, other: &FeatureStruct) -> Result<()> {
        self.check_frozen()?;
        let mut emptied = Vec::new();
        for (feature, value) in &other.values {
            let Some(mine) = self.values.get_mut(feature) else {
                continue;
            };
            match (mine, value) {
                (Value::Symbolic(a), Value::Symbolic(b)) if a.compatible(b) => {
                    *a = a.difference(b);
                    if a.is_empty() {
                        emptied.push(*feature);
                    }
                }
                (Value::Complex(a), Value::Complex(b)) => {
                    a.subtract(b)?;
                    if a.is_empty() {
                        emptied.push(*feature);
                    }
                }
                _ => {}
            }
        }
        for feature in emptied {
            self.values.remove(&feature);
        }
        Ok(())
    }

    /// Replace every bound variable by its value; unbound variables stay.
    pub fn replace_variables(&mut self, bindings: &VariableBindings) -> Result<()> {
        self.check_frozen()?;
        for value in self.values.values_mut() {
            match value {
                Value::Variable(var) => {
                    if let Some(set) = var.resolve(bindings) {
                        *value = Value::Symbolic(set);
                    }
                }
                Value::Complex(nested) => nested.replace_variables(bindings)?,
                Value::Symbolic(_) => {}
            }
        }
        Ok(())
    }

    // ========================================================================
    // Derived structures
    // ========================================================================

    /// Mutable copy with every variable replaced; fails on an unbound variable.
    pub fn instantiate(&self, bindings: &VariableBindings) -> Result<FeatureStruct> {
        let mut values = BTreeMap::new();
        for (feature, value) in &self.values {
            let v = match value {
                Value::Symbolic(set) => Value::Symbolic(*set),
                Value::Variable(var) => Value::Symbolic(resolve_strict(var, bindings)?),
                Value::Complex(nested) => Value::Complex(nested.instantiate(bindings)?),
            };
            values.insert(*feature, v);
        }
        Ok(FeatureStruct::from_values(values))
    }

    /// Mutable copy with bound variables replaced and unbound ones dropped.
    pub fn instantiate_lenient(&self, bindings: &VariableBindings) -> FeatureStruct {
        let mut values = BTreeMap::new();
        for (feature, value) in &self.values {
            let v = match value {
                Value::Symbolic(set) => Value::Symbolic(*set),
                Value::Variable(var) => match var.resolve(bindings) {
                    Some(set) => Value::Symbolic(set),
                    None => continue,
                },
                Value::Complex(nested) => Value::Complex(nested.instantiate_lenient(bindings)),
            };
            values.insert(*feature, v);
        }
        FeatureStruct::from_values(values)
    }

    /// The anti-feature-structure: every symbol set complemented, every
    /// variable negated. A full set has an empty complement and is left out.
    pub fn anti(&self) -> FeatureStruct {
        let mut values = BTreeMap::new();
        for (feature, value) in &self.values {
            let v = match value {
                Value::Symbolic(set) => {
                    let c = set.complement();
                    if c.is_empty() {
                        continue;
                    }
                    Value::Symbolic(c)
                }
                Value::Variable(var) => Value::Variable(var.negated()),
                Value::Complex(nested) => {
                    let a = nested.anti();
                    if a.is_empty() {
                        continue;
                    }
                    Value::Complex(a)
                }
            };
            values.insert(*feature, v);
        }
        FeatureStruct::from_values(values)
    }

    /// Mutable copy without the features `other` specifies.
    pub fn without_features_of(&self, other: &FeatureStruct) -> FeatureStruct {
        let values = self
            .values
            .iter()
            .filter(|(f, _)| !other.contains(**f))
            .map(|(f, v)| (*f, v.unfrozen()))
            .collect();
        FeatureStruct::from_values(values)
    }

    /// Mutable copy of `self` with the values of `other` written over it.
    ///
    /// Unlike [`priority_union`](Self::priority_union), variables are copied
    /// as-is, so the result can still serve as a pattern constraint.
    pub fn overlaid(&self, other: &FeatureStruct) -> FeatureStruct {
        let mut values: BTreeMap<FeatureId, Value> =
            self.values.iter().map(|(f, v)| (*f, v.unfrozen())).collect();
        for (feature, value) in &other.values {
            let v = match (values.get(feature), value) {
                (Some(Value::Complex(mine)), Value::Complex(theirs)) => Value::Complex(mine.overlaid(theirs)),
                _ => value.unfrozen(),
            };
            values.insert(*feature, v);
        }
        FeatureStruct::from_values(values)
    }

    /// Unfrozen structural copy.
    pub fn deep_clone(&self) -> FeatureStruct {
        FeatureStruct::from_values(self.values.iter().map(|(f, v)| (*f, v.unfrozen())).collect())
    }

    fn from_values(values: BTreeMap<FeatureId, Value>) -> Self {
        Self {
            values,
            frozen: false,
            hash: 0,
        }
    }

    // ========================================================================
    // Unification and subsumption
    // ========================================================================

    /// Whether `self` and `other` are mutually consistent.
    pub fn is_unifiable(&self, other: &FeatureStruct) -> bool {
        let mut scratch = VariableBindings::new();
        self.unifiable_inner(other, &mut scratch)
    }

    /// Like [`is_unifiable`](Self::is_unifiable), extending `bindings` on success only.
    pub fn is_unifiable_bound(&self, other: &FeatureStruct, bindings: &mut VariableBindings) -> bool {
        let mut scratch = bindings.clone();
        if self.unifiable_inner(other, &mut scratch) {
            *bindings = scratch;
            true
        } else {
            false
        }
    }

    /// Most general structure consistent with both, if any.
    pub fn unify(&self, other: &FeatureStruct) -> Option<FeatureStruct> {
        let mut scratch = VariableBindings::new();
        self.unify_inner(other, &mut scratch)
    }

    /// Like [`unify`](Self::unify), extending `bindings` on success only.
    pub fn unify_bound(&self, other: &FeatureStruct, bindings: &mut VariableBindings) -> Option<FeatureStruct> {
        let mut scratch = bindings.clone();
        let result = self.unify_inner(other, &mut scratch)?;
        *bindings = scratch;
        Some(result)
    }

    fn unifiable_inner(&self, other: &FeatureStruct, bindings: &mut VariableBindings) -> bool {
        for (feature, b) in &other.values {
            if let Some(a) = self.values.get(feature) {
                if unify_values(a, b, bindings).is_none() {
                    return false;
                }
            }
        }
        true
    }

    fn unify_inner(&self, other: &FeatureStruct, bindings: &mut VariableBindings) -> Option<FeatureStruct> {
        let mut values: BTreeMap<FeatureId, Value> =
            self.values.iter().map(|(f, v)| (*f, v.unfrozen())).collect();
        for (feature, b) in &other.values {
            let merged = match values.get(feature) {
                Some(a) => unify_values(a, b, bindings)?,
                None => b.unfrozen(),
            };
            values.insert(*feature, merged);
        }
        Some(FeatureStruct::from_values(values))
    }

    /// Whether `self` is at least as general as `other`: every symbol set of
    /// `self` contains the corresponding set of `other`.
    pub fn subsumes(&self, other: &FeatureStruct) -> bool {
        let mut scratch = VariableBindings::new();
        self.subsumes_inner(other, &mut scratch)
    }

    /// Like [`subsumes`](Self::subsumes), binding variables of `self` on success only.
    pub fn subsumes_bound(&self, other: &FeatureStruct, bindings: &mut VariableBindings) -> bool {
        let mut scratch = bindings.clone();
        if self.subsumes_inner(other, &mut scratch) {
            *bindings = scratch;
            true
        } else {
            false
        }
    }

    fn subsumes_inner(&self, other: &FeatureStruct, bindings: &mut VariableBindings) -> bool {
        for (feature, a) in &self.values {
            let Some(b) = other.values.get(feature) else {
                return false;
            };
            let ok = match (a, b) {
                (Value::Symbolic(x), Value::Symbolic(y)) => x.compatible(y) && x.is_superset(y),
                (Value::Variable(var), Value::Symbolic(y)) => match var.resolve(bindings) {
                    Some(x) => x.is_superset(y),
                    None => {
                        var.bind(*y, bindings);
                        true
                    }
                },
                (Value::Variable(_), Value::Variable(_)) => true,
                (Value::Complex(x), Value::Complex(y)) => x.subsumes_inner(y, bindings),
                _ => false,
            };
            if !ok {
                return false;
            }
        }
        true
    }

    // ========================================================================
    // Freezing and hashing
    // ========================================================================

    /// Make this structure (and everything nested) immutable; returns the content hash.
    pub fn freeze(&mut self) -> u64 {
        if self.frozen {
            return self.hash;
        }
        for value in self.values.values_mut() {
            if let Value::Complex(nested) = value {
                nested.freeze();
            }
        }
        self.hash = self.compute_hash();
        self.frozen = true;
        self.hash
    }

    /// Whether [`freeze`](Self::freeze) has been called.
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Content hash; cached once frozen.
    pub fn content_hash(&self) -> u64 {
        if self.frozen {
            self.hash
        } else {
            self.compute_hash()
        }
    }

    fn compute_hash(&self) -> u64 {
        let mut hasher = FxHasher::default();
        for (feature, value) in &self.values {
            feature.hash(&mut hasher);
            match value {
                Value::Symbolic(set) => {
                    0u8.hash(&mut hasher);
                    set.hash(&mut hasher);
                }
                Value::Variable(var) => {
                    1u8.hash(&mut hasher);
                    var.hash(&mut hasher);
                }
                Value::Complex(nested) => {
                    2u8.hash(&mut hasher);
                    nested.content_hash().hash(&mut hasher);
                }
            }
        }
        hasher.finish()
    }

    /// Human-readable rendering using names from `system`.
    pub fn describe(&self, system: &FeatureSystem) -> String {
        let parts: Vec<String> = self
            .values
            .iter()
            .map(|(feature, value)| {
                let name = system.name(*feature);
                match value {
                    Value::Symbolic(set) => {
                        let symbols = system.symbol_names(*feature, *set);
                        if symbols.len() == 1 {
                            format!("{}:{}", name, symbols[0])
                        } else {
                            format!("{}:{{{}}}", name, symbols.join(","))
                        }
                    }
                    Value::Variable(var) => {
                        format!("{}:{}{}", name, if var.agree() { "" } else { "-" }, var.name())
                    }
                    Value::Complex(nested) => format!("{}:{}", name, nested.describe(system)),
                }
            })
            .collect();
        format!("[{}]", parts.join(", "))
    }
}

fn resolve_strict(var: &Variable, bindings: &VariableBindings) -> Result<SymbolSet> {
    var.resolve(bindings)
        .ok_or_else(|| MorphError::UninstantiatedFeature(var.name().to_string()))
}

fn unify_with_variable(set: SymbolSet, var: &Variable, bindings: &mut VariableBindings) -> Option<Value> {
    if set.universe() != var.universe() {
        return None;
    }
    match var.resolve(bindings) {
        Some(bound) => {
            let narrowed = set.intersect(&bound);
            (!narrowed.is_empty()).then_some(Value::Symbolic(narrowed))
        }
        None => {
            var.bind(set, bindings);
            Some(Value::Symbolic(set))
        }
    }
}

fn unify_values(a: &Value, b: &Value, bindings: &mut VariableBindings) -> Option<Value> {
    match (a, b) {
        (Value::Symbolic(x), Value::Symbolic(y)) => {
            if !x.compatible(y) {
                return None;
            }
            let r = x.intersect(y);
            (!r.is_empty()).then_some(Value::Symbolic(r))
        }
        (Value::Symbolic(x), Value::Variable(var)) | (Value::Variable(var), Value::Symbolic(x)) => {
            unify_with_variable(*x, var, bindings)
        }
        (Value::Variable(v), Value::Variable(w)) => match (v.resolve(bindings), w.resolve(bindings)) {
            (Some(set), _) => unify_with_variable(set, w, bindings),
            (None, Some(set)) => unify_with_variable(set, v, bindings),
            (None, None) => Some(Value::Variable(v.clone())),
        },
        (Value::Complex(x), Value::Complex(y)) => x.unify_inner(y, bindings).map(Value::Complex),
        _ => None,
    }
}

impl PartialEq for FeatureStruct {
    fn eq(&self, other: &Self) -> bool {
        if self.frozen && other.frozen && self.hash != other.hash {
            return false;
        }
        self.values == other.values
    }
}

impl Eq for FeatureStruct {}

impl Hash for FeatureStruct {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.content_hash());
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Fluent construction of a [`FeatureStruct`] from feature and symbol names.
///
/// The first resolution error is kept and returned by [`build`](Self::build).
///
/// # Example
///
/// ```rust,ignore
/// let fs = FeatureStruct::builder(&system)
///     .symbol("cons", "+")
///     .symbol("voice", "-")
///     .build()?;
/// ```
pub struct FeatureStructBuilder<'a> {
    system: &'a FeatureSystem,
    fs: FeatureStruct,
    error: Option<MorphError>,
}

impl<'a> FeatureStructBuilder<'a> {
    /// Create an empty builder.
    pub fn new(system: &'a FeatureSystem) -> Self {
        Self {
            system,
            fs: FeatureStruct::new(),
            error: None,
        }
    }

    fn record<T>(&mut self, result: Result<T>) -> Option<T> {
        match result {
            Ok(v) => Some(v),
            Err(e) => {
                self.error.get_or_insert(e);
                None
            }
        }
    }

    fn insert(&mut self, feature: FeatureId, value: Value) {
        self.fs.values.insert(feature, value);
    }

    /// `feature` has exactly `symbol`.
    pub fn symbol(self, feature: &str, symbol: &str) -> Self {
        self.symbols(feature, &[symbol])
    }

    /// `feature` has one of `symbols`.
    pub fn symbols(mut self, feature: &str, symbols: &[&str]) -> Self {
        let resolved = self
            .system
            .feature(feature)
            .and_then(|id| self.system.symbols(id, symbols).map(|set| (id, set)));
        if let Some((id, set)) = self.record(resolved) {
            self.insert(id, Value::Symbolic(set));
        }
        self
    }

    /// `feature` has any symbol except `symbols`.
    pub fn not_symbols(mut self, feature: &str, symbols: &[&str]) -> Self {
        let resolved = self
            .system
            .feature(feature)
            .and_then(|id| self.system.symbols(id, symbols).map(|set| (id, set)));
        if let Some((id, set)) = self.record(resolved) {
            self.insert(id, Value::Symbolic(set.complement()));
        }
        self
    }

    /// `feature` is the variable `name` (`α`).
    pub fn variable(self, feature: &str, name: &str) -> Self {
        self.variable_with(feature, name, true)
    }

    /// `feature` is the negated variable `-name` (`-α`).
    pub fn neg_variable(self, feature: &str, name: &str) -> Self {
        self.variable_with(feature, name, false)
    }

    fn variable_with(mut self, feature: &str, name: &str, agree: bool) -> Self {
        let resolved = self.system.feature(feature).and_then(|id| {
            let def = self
                .system
                .def(id)
                .ok_or_else(|| MorphError::UnknownFeature(feature.to_string()))?;
            match def.kind() {
                FeatureKind::Symbolic { .. } => Ok((id, def.universe())),
                FeatureKind::Complex => Err(MorphError::FeatureKindMismatch(feature.to_string())),
            }
        });
        if let Some((id, universe)) = self.record(resolved) {
            self.insert(id, Value::Variable(Variable::new(name, agree, universe)));
        }
        self
    }

    /// `feature` holds the nested structure `value`.
    pub fn complex(mut self, feature: &str, value: FeatureStruct) -> Self {
        let resolved = self.system.feature(feature).and_then(|id| {
            match self.system.def(id).map(|d| d.kind()) {
                Some(FeatureKind::Complex) => Ok(id),
                _ => Err(MorphError::FeatureKindMismatch(feature.to_string())),
            }
        });
        if let Some(id) = self.record(resolved) {
            self.insert(id, Value::Complex(value));
        }
        self
    }

    /// Finish, returning the first resolution error if any occurred.
    pub fn build(self) -> Result<FeatureStruct> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.fs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn system() -> FeatureSystem {
        let mut system = FeatureSystem::new();
        system.add_symbolic("voice", &["+", "-"]).unwrap();
        system.add_symbolic("place", &["lab", "cor", "dor"]).unwrap();
        system.add_symbolic("cons", &["+", "-"]).unwrap();
        system.add_complex("agr");
        system
    }

    #[test]
    fn test_unify_intersects() {
        let sys = system();
        let a = FeatureStruct::builder(&sys).symbols("place", &["lab", "cor"]).build().unwrap();
        let b = FeatureStruct::builder(&sys).symbols("place", &["cor", "dor"]).symbol("voice", "+").build().unwrap();
        let u = a.unify(&b).unwrap();
        let place = sys.feature("place").unwrap();
        assert_eq!(sys.symbol_names(place, u.symbols(place).unwrap()), vec!["cor"]);
        assert_eq!(u.len(), 2);
    }

    #[test]
    fn test_unify_conflict() {
        let sys = system();
        let a = FeatureStruct::builder(&sys).symbol("voice", "+").build().unwrap();
        let b = FeatureStruct::builder(&sys).symbol("voice", "-").build().unwrap();
        assert!(!a.is_unifiable(&b));
        assert!(a.unify(&b).is_none());
    }

    #[test]
    fn test_variable_binding_committed_only_on_success() {
        let sys = system();
        let constraint = FeatureStruct::builder(&sys)
            .variable("voice", "a")
            .symbol("cons", "+")
            .build()
            .unwrap();
        let vowel = FeatureStruct::builder(&sys).symbol("voice", "+").symbol("cons", "-").build().unwrap();
        let mut bindings = VariableBindings::new();
        assert!(!constraint.is_unifiable_bound(&vowel, &mut bindings));
        assert!(bindings.is_empty());

        let b = FeatureStruct::builder(&sys).symbol("voice", "+").symbol("cons", "+").build().unwrap();
        assert!(constraint.is_unifiable_bound(&b, &mut bindings));
        assert!(bindings.contains("a"));

        let p = FeatureStruct::builder(&sys).symbol("voice", "-").symbol("cons", "+").build().unwrap();
        assert!(!constraint.is_unifiable_bound(&p, &mut bindings));
    }

    #[test]
    fn test_priority_union_overrides() {
        let sys = system();
        let mut target = FeatureStruct::builder(&sys).symbol("voice", "-").symbol("place", "lab").build().unwrap();
        let rhs = FeatureStruct::builder(&sys).symbol("voice", "+").build().unwrap();
        target.priority_union(&rhs, &VariableBindings::new()).unwrap();
        let expected = FeatureStruct::builder(&sys).symbol("voice", "+").symbol("place", "lab").build().unwrap();
        assert_eq!(target, expected);
    }

    #[test]
    fn test_priority_union_unbound_variable_fails() {
        let sys = system();
        let mut target = FeatureStruct::builder(&sys).symbol("voice", "-").build().unwrap();
        let rhs = FeatureStruct::builder(&sys).variable("voice", "a").build().unwrap();
        assert_eq!(
            target.priority_union(&rhs, &VariableBindings::new()),
            Err(MorphError::UninstantiatedFeature("a".to_string()))
        );
    }

    #[test]
    fn test_merge_widens_existing_only() {
        let sys = system();
        let mut node = FeatureStruct::builder(&sys).symbol("voice", "+").build().unwrap();
        let widen = FeatureStruct::builder(&sys).symbol("voice", "-").symbol("place", "lab").build().unwrap();
        node.merge(&widen, &VariableBindings::new()).unwrap();
        let voice = sys.feature("voice").unwrap();
        assert!(node.symbols(voice).unwrap().is_full());
        assert!(!node.contains(sys.feature("place").unwrap()));
    }

    #[test]
    fn test_anti_and_subtract() {
        let sys = system();
        let rhs = FeatureStruct::builder(&sys).symbol("voice", "+").build().unwrap();
        let lhs = FeatureStruct::builder(&sys).symbol("voice", "-").symbol("cons", "+").build().unwrap();
        let mut delta = rhs.anti();
        delta.subtract(&lhs.anti()).unwrap();
        let expected = FeatureStruct::builder(&sys).symbol("voice", "-").build().unwrap();
        assert_eq!(delta, expected);

        let mut same = lhs.anti();
        same.subtract(&lhs.anti()).unwrap();
        assert!(same.is_empty());
    }

    #[test]
    fn test_subsumption() {
        let sys = system();
        let general = FeatureStruct::builder(&sys).symbols("place", &["lab", "cor"]).build().unwrap();
        let specific = FeatureStruct::builder(&sys).symbol("place", "lab").symbol("voice", "+").build().unwrap();
        assert!(general.subsumes(&specific));
        assert!(!specific.subsumes(&general));
        assert!(FeatureStruct::new().subsumes(&specific));
    }

    #[test]
    fn test_frozen_rejects_mutation() {
        let sys = system();
        let mut fs = FeatureStruct::builder(&sys).symbol("voice", "+").build().unwrap();
        let before = fs.clone();
        fs.freeze();
        let voice = sys.feature("voice").unwrap();
        assert_eq!(fs.remove(voice), Err(MorphError::Frozen("feature structure")));
        assert_eq!(fs, before);

        let mut copy = fs.deep_clone();
        assert!(!copy.is_frozen());
        assert!(copy.remove(voice).is_ok());
    }

    #[test]
    fn test_nested_structures() {
        let sys = system();
        let inner_a = FeatureStruct::builder(&sys).symbol("voice", "+").build().unwrap();
        let inner_b = FeatureStruct::builder(&sys).symbol("voice", "-").build().unwrap();
        let a = FeatureStruct::builder(&sys).complex("agr", inner_a).build().unwrap();
        let b = FeatureStruct::builder(&sys).complex("agr", inner_b).build().unwrap();
        assert!(!a.is_unifiable(&b));
        assert!(a.contains_deep(sys.feature("voice").unwrap()));
    }

    #[test]
    fn test_builder_reports_first_error() {
        let sys = system();
        let result = FeatureStruct::builder(&sys)
            .symbol("nasal", "+")
            .symbol("voice", "x")
            .build();
        assert_eq!(result, Err(MorphError::UnknownFeature("nasal".to_string())));
    }

    #[test]
    fn test_frozen_hash_matches_content() {
        let sys = system();
        let mut a = FeatureStruct::builder(&sys).symbol("voice", "+").symbol("place", "cor").build().unwrap();
        let b = FeatureStruct::builder(&sys).symbol("place", "cor").symbol("voice", "+").build().unwrap();
        assert_eq!(a.freeze(), b.content_hash());
        assert_eq!(a, b);
    }
}
