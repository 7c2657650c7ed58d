//! Stamp-validated memo tables

use crate::cache::{CacheKey, CacheLut};
use crate::foundation::version::SeqPos;

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    resolved_at: SeqPos,
}

/// Memoized values keyed by entity identities
///
/// An entry is valid while it is as recent as every source stamp the caller
/// presents on lookup; an older entry is ignored and overwritten by the next
/// insert under the same key.
#[derive(Debug, Clone)]
pub(crate) struct Memo<const N: usize, V> {
    lut: CacheLut<N>,
    entries: Vec<Entry<V>>,
}

impl<const N: usize, V: Clone> Memo<N, V> {
    pub(crate) fn new() -> Self {
        Self { lut: CacheLut::new(), entries: Vec::new() }
    }

    pub(crate) fn get(&self, key: &CacheKey<N>, sources: &[SeqPos]) -> Option<V> {
        let entry = self.entries.get(self.lut.find(key)?)?;
        sources
            .iter()
            .all(|source| entry.resolved_at.as_recent_as(source))
            .then(|| entry.value.clone())
    }

    pub(crate) fn insert(&mut self, key: CacheKey<N>, value: V) -> V {
        let entry = Entry { value: value.clone(), resolved_at: SeqPos::new() };
        match self.lut.find(&key) {
            Some(index) if index < self.entries.len() => self.entries[index] = entry,
            _ => {
                self.lut.insert(key, self.entries.len());
                self.entries.push(entry);
            }
        }
        value
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn clear(&mut self) {
        self.lut.clear();
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::Identity;

    #[test]
    fn test_newer_source_invalidates_entry() {
        let mut memo: Memo<1, &str> = Memo::new();
        let key = CacheKey::new([Identity::tag(3)]);
        let before = SeqPos::new();
        memo.insert(key, "first");
        assert_eq!(memo.get(&key, &[before]), Some("first"));

        let edited = SeqPos::new();
        assert_eq!(memo.get(&key, &[before, edited]), None);

        memo.insert(key, "second");
        assert_eq!(memo.get(&key, &[edited]), Some("second"));
        assert_eq!(memo.len(), 1);
    }

    #[test]
    fn test_invalid_source_always_misses() {
        let mut memo: Memo<1, u32> = Memo::new();
        let key = CacheKey::new([Identity::tag(1)]);
        memo.insert(key, 7);
        assert_eq!(memo.get(&key, &[SeqPos::INVALID]), None);
        memo.clear();
        assert_eq!(memo.get(&key, &[]), None);
    }
}
