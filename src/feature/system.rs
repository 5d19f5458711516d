//! Feature declarations.
//!
//! A [`FeatureSystem`] names every feature a grammar may use. Symbolic
//! features carry a closed list of symbols (at most 64, one bit each);
//! complex features hold nested feature structures.

use rustc_hash::FxHashMap;

use crate::error::{MorphError, Result};
use crate::feature::value::SymbolSet;

/// Maximum number of symbols a symbolic feature can declare.
pub const MAX_SYMBOLS: usize = 64;

/// Compact handle for a declared feature.
///
/// Ordering follows declaration order, which gives every feature structure a
/// canonical iteration order for hashing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct FeatureId(pub(crate) u16);

impl FeatureId {
    /// Raw declaration index.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// What kind of value a feature accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeatureKind {
    /// One or more symbols out of a closed list.
    Symbolic {
        /// Declared symbols, bit `i` of a [`SymbolSet`] stands for `symbols[i]`
        symbols: Vec<String>,
    },
    /// A nested feature structure.
    Complex,
}

/// A declared feature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureDef {
    name: String,
    kind: FeatureKind,
}

impl FeatureDef {
    /// Feature name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Feature kind.
    pub fn kind(&self) -> &FeatureKind {
        &self.kind
    }

    /// Bit mask with one bit set per declared symbol; zero for complex features.
    pub fn universe(&self) -> u64 {
        match &self.kind {
            FeatureKind::Symbolic { symbols } => universe_of(symbols.len()),
            FeatureKind::Complex => 0,
        }
    }
}

fn universe_of(count: usize) -> u64 {
    if count >= MAX_SYMBOLS {
        u64::MAX
    } else {
        (1u64 << count) - 1
    }
}

/// Registry of the features used by a grammar.
///
/// # Example
///
/// ```rust,ignore
/// let mut system = FeatureSystem::new();
/// let voice = system.add_symbolic("voice", &["+", "-"])?;
/// let set = system.symbols(voice, &["+"])?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct FeatureSystem {
    features: Vec<FeatureDef>,
    by_name: FxHashMap<String, FeatureId>,
}

impl FeatureSystem {
    /// Create an empty feature system.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a symbolic feature. Re-declaring an existing name returns its id.
    pub fn add_symbolic(&mut self, name: &str, symbols: &[&str]) -> Result<FeatureId> {
        if let Some(&id) = self.by_name.get(name) {
            return Ok(id);
        }
        if symbols.len() > MAX_SYMBOLS {
            return Err(MorphError::TooManySymbols(name.to_string()));
        }
        Ok(self.push(FeatureDef {
            name: name.to_string(),
            kind: FeatureKind::Symbolic {
                symbols: symbols.iter().map(|s| s.to_string()).collect(),
            },
        }))
    }

    /// Declare a complex feature. Re-declaring an existing name returns its id.
    pub fn add_complex(&mut self, name: &str) -> FeatureId {
        if let Some(&id) = self.by_name.get(name) {
            return id;
        }
        self.push(FeatureDef {
            name: name.to_string(),
            kind: FeatureKind::Complex,
        })
    }

    fn push(&mut self, def: FeatureDef) -> FeatureId {
        let id = FeatureId(self.features.len() as u16);
        self.by_name.insert(def.name.clone(), id);
        self.features.push(def);
        id
    }

    /// Look up a feature by name.
    pub fn feature(&self, name: &str) -> Result<FeatureId> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| MorphError::UnknownFeature(name.to_string()))
    }

    /// Declaration for a feature id.
    pub fn def(&self, id: FeatureId) -> Option<&FeatureDef> {
        self.features.get(id.index())
    }

    /// Feature name, or `"?"` for an id from another system.
    pub fn name(&self, id: FeatureId) -> &str {
        self.def(id).map(FeatureDef::name).unwrap_or("?")
    }

    /// Number of declared features.
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Whether no features are declared.
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Build a symbol set for `feature` containing the named symbols.
    pub fn symbols(&self, feature: FeatureId, names: &[&str]) -> Result<SymbolSet> {
        let def = self
            .def(feature)
            .ok_or_else(|| MorphError::UnknownFeature(format!("#{}", feature.index())))?;
        let FeatureKind::Symbolic { symbols } = &def.kind else {
            return Err(MorphError::FeatureKindMismatch(def.name.clone()));
        };
        let mut mask = 0u64;
        for name in names {
            let bit = symbols
                .iter()
                .position(|s| s == name)
                .ok_or_else(|| MorphError::UnknownSymbol {
                    feature: def.name.clone(),
                    symbol: name.to_string(),
                })?;
            mask |= 1 << bit;
        }
        Ok(SymbolSet::new(mask, def.universe()))
    }

    /// Symbol names contained in `set`, in declaration order.
    pub fn symbol_names(&self, feature: FeatureId, set: SymbolSet) -> Vec<&str> {
        match self.def(feature).map(FeatureDef::kind) {
            Some(FeatureKind::Symbolic { symbols }) => symbols
                .iter()
                .enumerate()
                .filter(|(i, _)| set.mask() & (1 << i) != 0)
                .map(|(_, s)| s.as_str())
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Iterate over all declared features.
    pub fn iter(&self) -> impl Iterator<Item = (FeatureId, &FeatureDef)> {
        self.features
            .iter()
            .enumerate()
            .map(|(i, def)| (FeatureId(i as u16), def))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_lookup() {
        let mut system = FeatureSystem::new();
        let place = system.add_symbolic("place", &["lab", "cor", "dor"]).unwrap();
        let set = system.symbols(place, &["lab", "dor"]).unwrap();
        assert_eq!(set.mask(), 0b101);
        assert_eq!(set.universe(), 0b111);
        assert_eq!(system.symbol_names(place, set), vec!["lab", "dor"]);
    }

    #[test]
    fn test_unknown_symbol() {
        let mut system = FeatureSystem::new();
        let voice = system.add_symbolic("voice", &["+", "-"]).unwrap();
        assert_eq!(
            system.symbols(voice, &["x"]),
            Err(MorphError::UnknownSymbol {
                feature: "voice".to_string(),
                symbol: "x".to_string()
            })
        );
        assert!(system.feature("nasal").is_err());
    }

    #[test]
    fn test_redeclare_returns_same_id() {
        let mut system = FeatureSystem::new();
        let a = system.add_symbolic("cons", &["+", "-"]).unwrap();
        let b = system.add_symbolic("cons", &["+", "-"]).unwrap();
        assert_eq!(a, b);
        assert_eq!(system.len(), 1);
    }

    #[test]
    fn test_complex_rejects_symbols() {
        let mut system = FeatureSystem::new();
        let agr = system.add_complex("agr");
        assert_eq!(
            system.symbols(agr, &["+"]),
            Err(MorphError::FeatureKindMismatch("agr".to_string()))
        );
    }
}
