//! # Render Core
//!
//! Turns a visual scene into an ordered list of render actions and keeps the
//! derived matrices and vectors those actions reference up to date.
//!
//! ## Architecture
//!
//! - **RenderList**: walks the node hierarchy and records a change-coalesced
//!   action sequence
//! - **Resolver**: builds and memoizes the individual actions
//! - **TransformCache**: owns every derived value, refreshed by `update()`
//!
//! ```text
//! RenderList::build ──► Resolver ──► TransformCache (uniforms, culling)
//!        │
//!        ▼
//!   Vec<RenderAction> ──► executor (outside this crate)
//! ```

pub mod action;
pub mod error;
pub mod render_list;
pub mod resolver;
pub mod transform_cache;

#[cfg(test)]
mod tests;

pub use action::{ActionKind, DefaultActions, RenderAction};
pub use error::{CacheError, ResolveError};
pub use render_list::{BuildStats, RenderList};
pub use resolver::{Batch, Resolver};
pub use transform_cache::{
    LocalCoords, MatrixRef, NodePath, RuntimeSemantic, TransformCache, Value, ValueRef, ViewCoords,
};
