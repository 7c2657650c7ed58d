//! Specialized collection types

pub use slotmap::{Key, KeyData, SlotMap};

/// Generation-checked arena keyed by a typed handle
pub type HandleMap<K, T> = SlotMap<K, T>;

/// Raw 64-bit form of an arena handle (index and generation)
pub fn handle_bits<K: Key>(key: K) -> u64 {
    key.data().as_ffi()
}
