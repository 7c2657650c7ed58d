//! Cache keys and lookup tables

use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use crate::foundation::collections::{handle_bits, Key};

/// Opaque identity of a scene entity or cached value
///
/// Built from the raw bits of a generation-checked arena handle, so two
/// identities are equal only when they name the same live entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identity(u64);

impl Identity {
    /// The absent operand; never produced by a real handle
    pub const NONE: Identity = Identity(0);

    /// Identity of an arena handle
    pub fn of<K: Key>(key: K) -> Self {
        Self(handle_bits(key))
    }

    /// Identity of a plain discriminant (operation tags, enum values, indices)
    pub const fn tag(value: u64) -> Self {
        Self(value)
    }

    /// Raw bits
    pub fn raw(&self) -> u64 {
        self.0
    }
}

const ROTATE: u32 = 5;
const SEED: u64 = 0x51_7c_c1_b7_27_22_0a_95;

/// Immutable N-tuple of identities with a position-sensitive hash
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheKey<const N: usize> {
    ids: [Identity; N],
}

impl<const N: usize> CacheKey<N> {
    /// Create a key from its identities
    pub fn new(ids: [Identity; N]) -> Self {
        Self { ids }
    }

    /// The identities making up this key
    pub fn ids(&self) -> &[Identity; N] {
        &self.ids
    }

    /// Combining hash: each identity XORed into a rotated accumulator
    pub fn combined_hash(&self) -> u64 {
        self.ids.iter().fold(0u64, |acc, id| {
            (acc.rotate_left(ROTATE) ^ id.0).wrapping_mul(SEED)
        })
    }
}

impl<const N: usize> Hash for CacheKey<N> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.combined_hash());
    }
}

/// Maps a [`CacheKey`] to an index into a caller-owned dense vector
///
/// Stores indices rather than references, so growing the backing vector
/// never invalidates the table.
#[derive(Debug, Clone)]
pub struct CacheLut<const N: usize> {
    table: HashMap<CacheKey<N>, usize>,
}

impl<const N: usize> CacheLut<N> {
    /// Create an empty table
    pub fn new() -> Self {
        Self {
            table: HashMap::new(),
        }
    }

    /// Probe for a key
    pub fn find(&self, key: &CacheKey<N>) -> Option<usize> {
        self.table.get(key).copied()
    }

    /// Record the index of a freshly created item
    pub fn insert(&mut self, key: CacheKey<N>, index: usize) {
        self.table.insert(key, index);
    }

    /// Forget every key; the backing vector is cleared by its owner
    pub fn clear(&mut self) {
        self.table.clear();
    }

    /// Number of keys
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

impl<const N: usize> Default for CacheLut<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_position_sensitive() {
        let a = CacheKey::new([Identity::tag(1), Identity::tag(2)]);
        let b = CacheKey::new([Identity::tag(2), Identity::tag(1)]);
        assert_ne!(a, b);
        assert_ne!(a.combined_hash(), b.combined_hash());
    }

    #[test]
    fn test_lut_find_insert_clear() {
        let mut lut = CacheLut::<3>::new();
        let key = CacheKey::new([Identity::tag(7), Identity::NONE, Identity::tag(9)]);
        assert_eq!(lut.find(&key), None);

        lut.insert(key, 4);
        assert_eq!(lut.find(&key), Some(4));
        assert_eq!(lut.find(&CacheKey::new([Identity::tag(7), Identity::NONE, Identity::NONE])), None);

        lut.clear();
        assert!(lut.is_empty());
        assert_eq!(lut.find(&key), None);
    }

    #[test]
    fn test_identity_of_handle_is_never_none() {
        use slotmap::{DefaultKey, SlotMap};
        let mut map: SlotMap<DefaultKey, ()> = SlotMap::new();
        let key = map.insert(());
        assert_ne!(Identity::of(key), Identity::NONE);

        map.remove(key);
        let reused = map.insert(());
        assert_ne!(Identity::of(key), Identity::of(reused));
    }
}
