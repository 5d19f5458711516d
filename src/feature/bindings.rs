//! Variable bindings produced by a match attempt.

use rustc_hash::FxHashMap;

use crate::feature::value::SymbolSet;

/// Map from variable name to the symbol set it is bound to.
///
/// One instance is threaded through a single match attempt; unification
/// extends it only when the whole attempt succeeds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariableBindings {
    values: FxHashMap<String, SymbolSet>,
}

impl VariableBindings {
    /// Create an empty binding set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound value of a variable.
    pub fn get(&self, name: &str) -> Option<SymbolSet> {
        self.values.get(name).copied()
    }

    /// Bind or rebind a variable.
    pub fn bind(&mut self, name: &str, value: SymbolSet) {
        self.values.insert(name.to_string(), value);
    }

    /// Whether a variable is bound.
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Number of bound variables.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether nothing is bound.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over the bindings in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, SymbolSet)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Copy every binding of `other` into `self`, overwriting duplicates.
    pub fn extend(&mut self, other: &VariableBindings) {
        for (name, value) in &other.values {
            self.values.insert(name.clone(), *value);
        }
    }
}
