//! # Render Actions
//!
//! The immutable records a render list is made of. Each payload lives behind
//! an `Arc` so the resolver can hand the same action to many lists and the
//! list can detect redundant state changes by pointer identity.
//!
//! ## Categories
//!
//! Every state-setting action belongs to a category and persists until the
//! next action of the same category. Draws consume the current state.

use std::sync::Arc;

use crate::foundation::math::{Vec2, Vec4};
use crate::render::transform_cache::{LocalCoords, RuntimeSemantic, ValueRef, ViewCoords};
use crate::scene::{
    BlendFactor, CompareFunc, CubeFace, DrawMode, Face, GeometryId, ImageId, ParamValue, PassId,
    PolygonMode, SamplerDesc, SourceId, TargetSlot,
};

/// Category of a render action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    /// Camera placement
    ViewCoords,
    /// Object placement
    LocalCoords,
    /// Shader program
    Pass,
    /// Vertex attribute streams
    Inputs,
    /// Render targets
    Framebuffer,
    /// Uniform values
    Uniforms,
    /// Texture units
    Samplers,
    /// Rasterizer state
    Raster,
    /// Blend and depth state
    PixelOps,
    /// Buffer clears
    FbCtrl,
    /// Non-indexed draw
    Draw,
    /// Indexed draw
    DrawIndexed,
}

/// Sets the view coordinate system
#[derive(Debug, Clone, PartialEq)]
pub struct SetViewCoords {
    /// Camera and the path to its node
    pub coords: ViewCoords,
}

/// Sets the local coordinate system
#[derive(Debug, Clone, PartialEq)]
pub struct SetLocalCoords {
    /// Path to the node being drawn
    pub coords: LocalCoords,
}

/// Selects a technique pass
#[derive(Debug, Clone, PartialEq)]
pub struct SetPass {
    /// The pass
    pub pass: PassId,
    /// Pass sid, for diagnostics
    pub sid: String,
    /// How the pass produces geometry
    pub draw: DrawMode,
}

/// One vertex attribute bound to a source buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputBinding {
    /// Shader attribute symbol
    pub symbol: String,
    /// Geometry semantic that satisfied it
    pub semantic: String,
    /// Geometry input set
    pub set: u32,
    /// Backing buffer
    pub source: SourceId,
    /// Scalars per vertex
    pub stride: u32,
}

/// Binds vertex attribute streams
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetInputs {
    /// Pass whose attributes are bound
    pub pass: PassId,
    /// Geometry providing the streams
    pub geometry: GeometryId,
    /// One binding per pass attribute
    pub bindings: Vec<InputBinding>,
}

/// One render target attachment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetBinding {
    /// Attachment point
    pub slot: TargetSlot,
    /// Written image
    pub image: ImageId,
    /// Cube face
    pub face: Option<CubeFace>,
    /// Array layer or depth slice
    pub layer: u32,
    /// Mip level
    pub mip: u32,
}

/// Selects render targets; no targets means the default framebuffer
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SetFramebuffer {
    /// Attachments sorted by slot
    pub targets: Vec<TargetBinding>,
}

impl SetFramebuffer {
    /// Image of the first color attachment
    pub fn first_color_target(&self) -> Option<ImageId> {
        self.targets
            .iter()
            .find(|t| matches!(t.slot, TargetSlot::Color(_)))
            .map(|t| t.image)
    }
}

/// Where a uniform's value comes from at execution time
#[derive(Debug, Clone, PartialEq)]
pub enum UniformValue {
    /// A literal parameter value
    Constant(ParamValue),
    /// A derived value read from the transform cache
    Semantic {
        /// Semantic that produced the reference
        semantic: RuntimeSemantic,
        /// Cache slot holding the value
        value: ValueRef,
    },
    /// Texture unit assigned by the samplers action
    SamplerUnit(u32),
}

/// One uniform of a pass's program
#[derive(Debug, Clone, PartialEq)]
pub struct UniformBinding {
    /// Shader symbol
    pub symbol: String,
    /// Value source
    pub value: UniformValue,
}

/// Sets every uniform a pass declares
#[derive(Debug, Clone, PartialEq)]
pub struct SetUniforms {
    /// Pass whose uniforms are set
    pub pass: PassId,
    /// One binding per declared uniform
    pub uniforms: Vec<UniformBinding>,
}

/// One sampler bound to a texture unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplerBinding {
    /// Shader symbol
    pub symbol: String,
    /// Texture unit
    pub unit: u32,
    /// Sampled image and filtering
    pub sampler: SamplerDesc,
}

/// Binds samplers to texture units
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetSamplers {
    /// Bindings in unit order
    pub samplers: Vec<SamplerBinding>,
}

impl SetSamplers {
    /// Unit assigned to a shader symbol
    pub fn unit_of(&self, symbol: &str) -> Option<u32> {
        self.samplers.iter().find(|s| s.symbol == symbol).map(|s| s.unit)
    }
}

/// Rasterizer state
#[derive(Debug, Clone, PartialEq)]
pub struct SetRaster {
    /// Rasterized point size
    pub point_size: f32,
    /// Polygon offset (factor, units) when enabled
    pub polygon_offset: Option<Vec2>,
    /// Culled faces when culling is enabled
    pub cull: Option<Face>,
    /// Faces and their rasterization mode
    pub polygon_mode: (Face, PolygonMode),
}

impl Default for SetRaster {
    fn default() -> Self {
        Self {
            point_size: 1.0,
            polygon_offset: None,
            cull: None,
            polygon_mode: (Face::FrontAndBack, PolygonMode::Fill),
        }
    }
}

/// Blend, depth and color-mask state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetPixelOps {
    /// Blend factors when blending is enabled
    pub blend: Option<(BlendFactor, BlendFactor)>,
    /// Depth comparison when depth testing is enabled
    pub depth_test: Option<CompareFunc>,
    /// Depth writes
    pub depth_mask: bool,
    /// Color channel writes
    pub color_mask: [bool; 4],
}

impl Default for SetPixelOps {
    fn default() -> Self {
        Self {
            blend: None,
            depth_test: Some(CompareFunc::Less),
            depth_mask: true,
            color_mask: [true; 4],
        }
    }
}

/// Buffer clears performed before drawing
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SetFbCtrl {
    /// Clear color
    pub clear_color: Option<Vec4>,
    /// Clear depth
    pub clear_depth: Option<f32>,
    /// Clear stencil
    pub clear_stencil: Option<i32>,
}

/// Topology handed to the GPU
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpuPrimitive {
    /// Points
    Points,
    /// Line list
    Lines,
    /// Line strip
    LineStrip,
    /// Triangle list
    Triangles,
    /// Triangle strip
    TriangleStrip,
    /// Triangle fan
    TriangleFan,
    /// Tessellation patches
    Patches {
        /// Control points per patch
        vertices: u32,
    },
}

/// Element type of an index buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexType {
    /// 16-bit indices
    U16,
    /// 32-bit indices
    U32,
}

/// Non-indexed draw
#[derive(Debug, Clone, PartialEq)]
pub struct Draw {
    /// Drawn geometry
    pub geometry: GeometryId,
    /// Topology
    pub primitive: GpuPrimitive,
    /// Vertices to draw
    pub vertex_count: u32,
    /// Visibility flag from the transform cache; `None` draws unconditionally
    pub visible: Option<ValueRef>,
}

/// Indexed draw
#[derive(Debug, Clone, PartialEq)]
pub struct DrawIndexed {
    /// Drawn geometry
    pub geometry: GeometryId,
    /// Topology
    pub primitive: GpuPrimitive,
    /// Indices to draw
    pub index_count: u32,
    /// Index buffer
    pub indices: SourceId,
    /// Index element type
    pub index_type: IndexType,
    /// Visibility flag from the transform cache; `None` draws unconditionally
    pub visible: Option<ValueRef>,
}

/// A single render list entry
#[derive(Debug, Clone)]
pub enum RenderAction {
    /// Set the view coordinate system
    SetViewCoords(Arc<SetViewCoords>),
    /// Set the local coordinate system
    SetLocalCoords(Arc<SetLocalCoords>),
    /// Select a pass
    SetPass(Arc<SetPass>),
    /// Bind vertex inputs
    SetInputs(Arc<SetInputs>),
    /// Select render targets
    SetFramebuffer(Arc<SetFramebuffer>),
    /// Set uniforms
    SetUniforms(Arc<SetUniforms>),
    /// Bind samplers
    SetSamplers(Arc<SetSamplers>),
    /// Set rasterizer state
    SetRaster(Arc<SetRaster>),
    /// Set blend and depth state
    SetPixelOps(Arc<SetPixelOps>),
    /// Clear buffers
    SetFbCtrl(Arc<SetFbCtrl>),
    /// Draw
    Draw(Arc<Draw>),
    /// Draw indexed
    DrawIndexed(Arc<DrawIndexed>),
}

impl RenderAction {
    /// Category of this action
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::SetViewCoords(_) => ActionKind::ViewCoords,
            Self::SetLocalCoords(_) => ActionKind::LocalCoords,
            Self::SetPass(_) => ActionKind::Pass,
            Self::SetInputs(_) => ActionKind::Inputs,
            Self::SetFramebuffer(_) => ActionKind::Framebuffer,
            Self::SetUniforms(_) => ActionKind::Uniforms,
            Self::SetSamplers(_) => ActionKind::Samplers,
            Self::SetRaster(_) => ActionKind::Raster,
            Self::SetPixelOps(_) => ActionKind::PixelOps,
            Self::SetFbCtrl(_) => ActionKind::FbCtrl,
            Self::Draw(_) => ActionKind::Draw,
            Self::DrawIndexed(_) => ActionKind::DrawIndexed,
        }
    }

    /// Whether both actions are the very same resolved record
    pub fn same_as(&self, other: &RenderAction) -> bool {
        match (self, other) {
            (Self::SetViewCoords(a), Self::SetViewCoords(b)) => Arc::ptr_eq(a, b),
            (Self::SetLocalCoords(a), Self::SetLocalCoords(b)) => Arc::ptr_eq(a, b),
            (Self::SetPass(a), Self::SetPass(b)) => Arc::ptr_eq(a, b),
            (Self::SetInputs(a), Self::SetInputs(b)) => Arc::ptr_eq(a, b),
            (Self::SetFramebuffer(a), Self::SetFramebuffer(b)) => Arc::ptr_eq(a, b),
            (Self::SetUniforms(a), Self::SetUniforms(b)) => Arc::ptr_eq(a, b),
            (Self::SetSamplers(a), Self::SetSamplers(b)) => Arc::ptr_eq(a, b),
            (Self::SetRaster(a), Self::SetRaster(b)) => Arc::ptr_eq(a, b),
            (Self::SetPixelOps(a), Self::SetPixelOps(b)) => Arc::ptr_eq(a, b),
            (Self::SetFbCtrl(a), Self::SetFbCtrl(b)) => Arc::ptr_eq(a, b),
            (Self::Draw(a), Self::Draw(b)) => Arc::ptr_eq(a, b),
            (Self::DrawIndexed(a), Self::DrawIndexed(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Whether this action consumes state rather than setting it
    pub fn is_draw(&self) -> bool {
        matches!(self, Self::Draw(_) | Self::DrawIndexed(_))
    }
}

/// Shared "restore the default" actions
///
/// Resolving a state block equal to the default returns one of these instead
/// of a fresh record, so change detection sees them as identical.
#[derive(Debug, Clone)]
pub struct DefaultActions {
    /// Default framebuffer
    pub framebuffer: Arc<SetFramebuffer>,
    /// Default rasterizer state
    pub raster: Arc<SetRaster>,
    /// Default blend and depth state
    pub pixel_ops: Arc<SetPixelOps>,
    /// No clears
    pub fb_ctrl: Arc<SetFbCtrl>,
}

impl Default for DefaultActions {
    fn default() -> Self {
        Self {
            framebuffer: Arc::new(SetFramebuffer::default()),
            raster: Arc::new(SetRaster::default()),
            pixel_ops: Arc::new(SetPixelOps::default()),
            fb_ctrl: Arc::new(SetFbCtrl::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equal_payloads_are_not_the_same_action() {
        let a = RenderAction::SetRaster(Arc::new(SetRaster::default()));
        let b = RenderAction::SetRaster(Arc::new(SetRaster::default()));
        assert!(!a.same_as(&b));
        assert!(a.same_as(&a.clone()));
    }

    #[test]
    fn test_different_categories_never_match() {
        let defaults = DefaultActions::default();
        let raster = RenderAction::SetRaster(defaults.raster);
        let fb_ctrl = RenderAction::SetFbCtrl(defaults.fb_ctrl);
        assert!(!raster.same_as(&fb_ctrl));
        assert_eq!(raster.kind(), ActionKind::Raster);
        assert!(!fb_ctrl.is_draw());
    }
}
