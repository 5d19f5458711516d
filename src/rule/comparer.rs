//! Word identity for deduplication.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::word::Word;

/// Equality and hashing policy for collections of words.
pub trait WordComparer: Send + Sync {
    /// Whether two words count as the same.
    fn equals(&self, a: &Word, b: &Word) -> bool;

    /// Hash consistent with [`equals`](Self::equals).
    fn hash_word(&self, word: &Word) -> u64;
}

/// Full value equality (see [`Word::value_eq`]).
#[derive(Debug, Clone, Copy, Default)]
pub struct ValueComparer;

impl WordComparer for ValueComparer {
    fn equals(&self, a: &Word, b: &Word) -> bool {
        a.value_eq(b)
    }

    fn hash_word(&self, word: &Word) -> u64 {
        word.content_hash()
    }
}

/// Insertion-ordered set of words.
#[derive(Debug, Clone, Default)]
pub struct WordSet<C: WordComparer = ValueComparer> {
    words: Vec<Word>,
    buckets: FxHashMap<u64, SmallVec<[usize; 2]>>,
    comparer: C,
}

impl WordSet<ValueComparer> {
    /// Empty set using value equality.
    pub fn new() -> Self {
        Self::with_comparer(ValueComparer)
    }
}

impl<C: WordComparer> WordSet<C> {
    /// Empty set using `comparer`.
    pub fn with_comparer(comparer: C) -> Self {
        Self {
            words: Vec::new(),
            buckets: FxHashMap::default(),
            comparer,
        }
    }

    /// Add `word` unless an equal one is present; returns whether it was added.
    pub fn insert(&mut self, word: Word) -> bool {
        let hash = self.comparer.hash_word(&word);
        let bucket = self.buckets.entry(hash).or_default();
        if bucket.iter().any(|&i| self.comparer.equals(&self.words[i], &word)) {
            return false;
        }
        bucket.push(self.words.len());
        self.words.push(word);
        true
    }

    /// Whether an equal word is present.
    pub fn contains(&self, word: &Word) -> bool {
        let hash = self.comparer.hash_word(word);
        self.buckets
            .get(&hash)
            .map_or(false, |b| b.iter().any(|&i| self.comparer.equals(&self.words[i], word)))
    }

    /// Number of words.
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Words in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Word> {
        self.words.iter()
    }

    /// Words in insertion order.
    pub fn into_vec(self) -> Vec<Word> {
        self.words
    }
}

impl Extend<Word> for WordSet<ValueComparer> {
    fn extend<I: IntoIterator<Item = Word>>(&mut self, iter: I) {
        for word in iter {
            self.insert(word);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::Shape;

    #[test]
    fn test_insert_dedupes_by_value() {
        let mut set = WordSet::new();
        let mut a = Word::new(0, Shape::new());
        a.freeze();
        let b = Word::new(0, Shape::new());
        let c = Word::new(1, Shape::new());
        assert!(set.insert(a));
        assert!(!set.insert(b.clone()));
        assert!(set.contains(&b));
        assert!(set.insert(c));
        assert_eq!(set.len(), 2);
        assert_eq!(set.into_vec()[1].stratum(), 1);
    }
}
