//! Feature values: symbol sets, variables and nested structures.

use std::sync::Arc;

use crate::feature::bindings::VariableBindings;
use crate::feature::structure::FeatureStruct;

/// A set of symbols of one symbolic feature, stored as a bit mask.
///
/// `universe` holds every declared symbol of the feature so that negation
/// never needs the feature system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SymbolSet {
    mask: u64,
    universe: u64,
}

impl SymbolSet {
    /// Create a set; bits outside `universe` are dropped.
    pub fn new(mask: u64, universe: u64) -> Self {
        Self {
            mask: mask & universe,
            universe,
        }
    }

    /// The set containing every symbol of the feature.
    pub fn full(universe: u64) -> Self {
        Self::new(universe, universe)
    }

    /// Raw bit mask.
    pub fn mask(&self) -> u64 {
        self.mask
    }

    /// Bit mask of all declared symbols.
    pub fn universe(&self) -> u64 {
        self.universe
    }

    /// Whether no symbol is contained.
    pub fn is_empty(&self) -> bool {
        self.mask == 0
    }

    /// Whether every declared symbol is contained.
    pub fn is_full(&self) -> bool {
        self.mask == self.universe
    }

    /// Number of contained symbols.
    pub fn len(&self) -> u32 {
        self.mask.count_ones()
    }

    /// Symbols in both sets.
    pub fn intersect(&self, other: &SymbolSet) -> SymbolSet {
        SymbolSet::new(self.mask & other.mask, self.universe)
    }

    /// Symbols in either set.
    pub fn union(&self, other: &SymbolSet) -> SymbolSet {
        SymbolSet::new(self.mask | other.mask, self.universe)
    }

    /// Symbols in `self` but not in `other`.
    pub fn difference(&self, other: &SymbolSet) -> SymbolSet {
        SymbolSet::new(self.mask & !other.mask, self.universe)
    }

    /// Symbols of the feature not in `self`.
    pub fn complement(&self) -> SymbolSet {
        SymbolSet::new(!self.mask, self.universe)
    }

    /// Whether every symbol of `other` is in `self`.
    pub fn is_superset(&self, other: &SymbolSet) -> bool {
        other.mask & !self.mask == 0
    }

    pub(crate) fn compatible(&self, other: &SymbolSet) -> bool {
        self.universe == other.universe
    }
}

/// An `α`-style variable over a symbolic feature.
///
/// A variable with `agree == false` (written `-α`) stands for the complement of
/// whatever `α` is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Variable {
    name: Arc<str>,
    agree: bool,
    universe: u64,
}

impl Variable {
    /// Create a variable over a feature with the given universe.
    pub fn new(name: &str, agree: bool, universe: u64) -> Self {
        Self {
            name: Arc::from(name),
            agree,
            universe,
        }
    }

    /// Variable name (shared by `α` and `-α`).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `true` for `α`, `false` for `-α`.
    pub fn agree(&self) -> bool {
        self.agree
    }

    /// Universe of the feature the variable ranges over.
    pub fn universe(&self) -> u64 {
        self.universe
    }

    /// Same variable with the opposite polarity.
    pub fn negated(&self) -> Variable {
        Variable {
            name: Arc::clone(&self.name),
            agree: !self.agree,
            universe: self.universe,
        }
    }

    /// The symbol set this variable denotes under `bindings`, if bound.
    pub fn resolve(&self, bindings: &VariableBindings) -> Option<SymbolSet> {
        let bound = bindings.get(&self.name)?;
        if bound.universe() != self.universe {
            return None;
        }
        Some(if self.agree { bound } else { bound.complement() })
    }

    /// Bind this variable so that it denotes `value`.
    ///
    /// Binding `-α` to a full set would leave `α` empty; such a binding is
    /// skipped and the variable stays unbound.
    pub(crate) fn bind(&self, value: SymbolSet, bindings: &mut VariableBindings) {
        let stored = if self.agree { value } else { value.complement() };
        if !stored.is_empty() {
            bindings.bind(&self.name, stored);
        }
    }
}

/// The value of one feature in a [`FeatureStruct`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    /// A (possibly underspecified) set of symbols.
    Symbolic(SymbolSet),
    /// A variable resolved against match bindings.
    Variable(Variable),
    /// A nested structure.
    Complex(FeatureStruct),
}

impl Value {
    /// Symbol set if this is a symbolic value.
    pub fn as_symbols(&self) -> Option<SymbolSet> {
        match self {
            Value::Symbolic(set) => Some(*set),
            _ => None,
        }
    }

    /// Nested structure if this is a complex value.
    pub fn as_complex(&self) -> Option<&FeatureStruct> {
        match self {
            Value::Complex(fs) => Some(fs),
            _ => None,
        }
    }

    /// Whether this value or anything nested in it is a variable.
    pub fn has_variables(&self) -> bool {
        match self {
            Value::Symbolic(_) => false,
            Value::Variable(_) => true,
            Value::Complex(fs) => fs.has_variables(),
        }
    }

    pub(crate) fn unfrozen(&self) -> Value {
        match self {
            Value::Complex(fs) => Value::Complex(fs.deep_clone()),
            other => other.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_operations() {
        let a = SymbolSet::new(0b011, 0b111);
        let b = SymbolSet::new(0b110, 0b111);
        assert_eq!(a.intersect(&b).mask(), 0b010);
        assert_eq!(a.union(&b).mask(), 0b111);
        assert_eq!(a.difference(&b).mask(), 0b001);
        assert_eq!(a.complement().mask(), 0b100);
        assert!(a.union(&b).is_full());
        assert!(a.union(&b).is_superset(&a));
        assert!(!a.is_superset(&b));
    }

    #[test]
    fn test_mask_clipped_to_universe() {
        let s = SymbolSet::new(0b1111, 0b011);
        assert_eq!(s.mask(), 0b011);
        assert_eq!(s.len(), 2);
    }

    #[test]
    fn test_variable_resolution() {
        let mut bindings = VariableBindings::new();
        let alpha = Variable::new("a", true, 0b11);
        let neg = alpha.negated();
        assert_eq!(alpha.resolve(&bindings), None);

        alpha.bind(SymbolSet::new(0b01, 0b11), &mut bindings);
        assert_eq!(alpha.resolve(&bindings).map(|s| s.mask()), Some(0b01));
        assert_eq!(neg.resolve(&bindings).map(|s| s.mask()), Some(0b10));
    }

    #[test]
    fn test_negative_variable_binds_complement() {
        let mut bindings = VariableBindings::new();
        let neg = Variable::new("b", false, 0b11);
        neg.bind(SymbolSet::new(0b10, 0b11), &mut bindings);
        assert_eq!(bindings.get("b").map(|s| s.mask()), Some(0b01));

        let mut untouched = VariableBindings::new();
        neg.bind(SymbolSet::full(0b11), &mut untouched);
        assert!(untouched.is_empty());
    }
}
