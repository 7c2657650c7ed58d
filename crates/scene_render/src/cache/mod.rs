//! Identity-keyed memoization tables
//!
//! Every memo table in the crate is keyed by a fixed-arity tuple of opaque
//! entity identities and maps to a dense index owned by the caller.

mod key;

pub use key::{CacheKey, CacheLut, Identity};
