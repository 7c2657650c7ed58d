//! Scene graph data model
//!
//! The entities the render core reads: a node hierarchy with transform
//! stacks, cameras, lights, effects down to individual passes, materials and
//! their bindings, geometry with its source buffers, images, and visual
//! scenes. Everything lives in a [`SceneDatabase`] and is addressed through
//! generation-checked handles.
//!
//! ## Versioning
//!
//! ```text
//! SourceBuffer edit
//!      ↓ move_forward
//! Geometry versions
//!      ↓ move_forward
//! SceneDatabase versions  →  RenderList rebuild / TransformCache refresh
//! ```

pub mod builders;
pub mod camera;
pub mod database;
pub mod effect;
pub mod geometry;
pub mod handles;
pub mod image;
pub mod light;
pub mod material;
pub mod node;
pub mod pass;
pub mod visual_scene;

pub use camera::{Camera, Optics};
pub use database::{Edit, SceneDatabase, Versioned, FULLSCREEN_QUAD_SYMBOL};
pub use effect::{
    Effect, Filter, ParamDecl, ParamValue, Profile, ProfileKind, ProfileMask, SamplerDesc,
    Technique, Wrap,
};
pub use geometry::{Geometry, PrimitiveSet, SourceBuffer, SourceData, Topology, VertexInput};
pub use handles::{
    BindingId, CameraId, EffectId, GeometryId, ImageId, LightId, MaterialId, NodeId, PassId,
    ProfileId, SourceId, VisualSceneId,
};
pub use image::Image;
pub use light::{Light, LightKind};
pub use material::{BindVertexInput, Material, MaterialBinding};
pub use node::{compose_transform_stack, GeometryInstance, Node, TransformElement, TransformError};
pub use pass::{
    AttributeDecl, BlendFactor, CompareFunc, CubeFace, DrawMode, Face, Pass, PassState,
    PolygonMode, PrimitiveOverride, Program, RenderTargetDecl, StateArg, TargetSlot, TargetSource,
    UniformDecl, UniformSource,
};
pub use visual_scene::{EvaluateScene, InstanceMaterial, RenderItem, VisualScene};
