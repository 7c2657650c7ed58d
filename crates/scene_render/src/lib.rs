//! # Scene Render
//!
//! Render-list resolution and transform caching for declarative 3-D scenes.
//!
//! ## Features
//!
//! - **Render lists**: a visual scene flattened into an ordered, change-coalesced
//!   sequence of render actions
//! - **Memoized resolution**: every action is built once and reused until the
//!   entities it came from change structurally
//! - **Transform cache**: derived matrices, vectors and visibility flags kept
//!   up to date by a staged, optionally parallel `update()`
//! - **Arena handles**: scene entities are addressed by generation-checked keys
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use scene_render::prelude::*;
//! use scene_render::scene::builders::{add_constant_material, add_quad_geometry};
//!
//! let mut db = SceneDatabase::new();
//! let geometry = add_quad_geometry(&mut db, 1.0, "surface");
//! let material = add_constant_material(&mut db, "red", Vec4::new(1.0, 0.0, 0.0, 1.0))
//!     .expect("fresh effect");
//! let binding = db.add_binding(MaterialBinding::new("surface", material));
//! let root = db.add_node(Node::new("root"));
//! db.instance_geometry(root, GeometryInstance { geometry, bindings: vec![binding] });
//! let scene = db.add_visual_scene(VisualScene::new("main", root));
//!
//! let mut cache = TransformCache::new();
//! let mut list = RenderList::new();
//! list.build(&db, &mut cache, scene);
//! cache.update(&db, 1280, 720);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod cache;
pub mod config;
pub mod foundation;
pub mod render;
pub mod scene;

/// Common imports for crate users
pub mod prelude {
    pub use crate::{
        config::{Config, RenderListConfig, RendererConfig, TransformCacheConfig},
        foundation::{
            math::{Mat4, Vec3, Vec4},
            version::{SeqPos, Versions},
        },
        render::{
            CacheError, RenderAction, RenderList, ResolveError, RuntimeSemantic, TransformCache, Value,
            ValueRef,
        },
        scene::{
            Edit, GeometryInstance, MaterialBinding, Node, SceneDatabase, TransformElement, VisualScene,
            VisualSceneId,
        },
    };
}
