//! Monotonic version stamps
//!
//! Every mutable scene entity carries two [`SeqPos`] counters, one for
//! structural edits and one for value edits. Caches store the stamp they were
//! computed at and compare it against the current stamp of their sources.

use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide source of stamps. 0 is reserved for "invalid", 1 for origin.
static NEXT_STAMP: AtomicU64 = AtomicU64::new(2);

/// A lightweight timestamp drawn from a process-wide monotonic counter
///
/// An invalidated stamp compares as stale against everything, including
/// another invalidated stamp, so anything keyed on it gets recomputed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SeqPos(u64);

impl SeqPos {
    /// The "always stale" sentinel
    pub const INVALID: SeqPos = SeqPos(0);

    /// The oldest valid stamp; every `touch()` is more recent than this
    pub const ORIGIN: SeqPos = SeqPos(1);

    /// Create a stamp that is already more recent than any stamp seen so far
    pub fn new() -> Self {
        let mut pos = Self::INVALID;
        pos.touch();
        pos
    }

    /// Advance to a new unique value, strictly greater than every value
    /// previously handed out in this process
    pub fn touch(&mut self) {
        self.0 = NEXT_STAMP.fetch_add(1, Ordering::Relaxed);
    }

    /// Mark this stamp as older than anything
    pub fn invalidate(&mut self) {
        self.0 = Self::INVALID.0;
    }

    /// Whether this stamp is the invalid sentinel
    pub fn is_invalid(&self) -> bool {
        self.0 == Self::INVALID.0
    }

    /// True if this stamp is at least as recent as `other`
    ///
    /// Returns false whenever either side is invalidated.
    pub fn as_recent_as(&self, other: &SeqPos) -> bool {
        !self.is_invalid() && !other.is_invalid() && self.0 >= other.0
    }

    /// Adopt `child` if it is more recent than `self`
    ///
    /// Used to bubble a leaf edit up into the aggregates that own it. An
    /// invalidated child poisons the aggregate; an invalidated aggregate stays
    /// invalid until it is touched.
    pub fn move_forward(&mut self, child: &SeqPos) {
        if child.is_invalid() {
            self.invalidate();
        } else if !self.is_invalid() && child.0 > self.0 {
            self.0 = child.0;
        }
    }

    /// Raw counter value, mostly useful for logging
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for SeqPos {
    fn default() -> Self {
        Self::INVALID
    }
}

/// Structure and value stamps attached to every scene entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Versions {
    /// Bumped on topology or binding edits
    pub structure: SeqPos,
    /// Bumped on numeric payload edits only
    pub value: SeqPos,
}

impl Versions {
    /// Fresh versions, both stamped now
    pub fn new() -> Self {
        let stamp = SeqPos::new();
        Self {
            structure: stamp,
            value: stamp,
        }
    }

    /// Record a structural edit; a structural edit is also a value edit
    pub fn touch_structure(&mut self) {
        self.structure.touch();
        self.value = self.structure;
    }

    /// Record a value-only edit
    pub fn touch_value(&mut self) {
        self.value.touch();
    }

    /// Propagate a child's stamps into this aggregate
    pub fn move_forward(&mut self, child: &Versions) {
        self.structure.move_forward(&child.structure);
        self.value.move_forward(&child.value);
    }
}

impl Default for Versions {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_touch_is_strictly_increasing() {
        let mut a = SeqPos::new();
        let b = a;
        a.touch();
        assert!(a.raw() > b.raw());
        assert!(a.as_recent_as(&b));
        assert!(!b.as_recent_as(&a));
        assert!(a.as_recent_as(&a));
    }

    #[test]
    fn test_invalid_is_never_recent() {
        let valid = SeqPos::new();
        let invalid = SeqPos::INVALID;
        assert!(!invalid.as_recent_as(&valid));
        assert!(!valid.as_recent_as(&invalid));
        assert!(!invalid.as_recent_as(&SeqPos::INVALID));
    }

    #[test]
    fn test_move_forward_adopts_newer_child() {
        let mut parent = SeqPos::new();
        let mut child = SeqPos::new();
        child.touch();
        parent.move_forward(&child);
        assert_eq!(parent, child);

        let older = SeqPos::ORIGIN;
        parent.move_forward(&older);
        assert_eq!(parent, child);
    }

    #[test]
    fn test_move_forward_invalid_child_poisons_parent() {
        let mut parent = SeqPos::new();
        parent.move_forward(&SeqPos::INVALID);
        assert!(parent.is_invalid());
    }

    #[test]
    fn test_structure_edit_bumps_value() {
        let mut versions = Versions::new();
        let before = versions;
        versions.touch_structure();
        assert!(!before.value.as_recent_as(&versions.value));
        assert_eq!(versions.structure, versions.value);
    }
}
