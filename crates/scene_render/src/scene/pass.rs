//! Technique passes: program interface, state block and render targets

use super::effect::ParamValue;
use super::handles::ImageId;
use crate::foundation::math::{Vec2, Vec4};
use crate::foundation::version::Versions;

/// A state value given literally or through a parameter reference
#[derive(Debug, Clone, PartialEq)]
pub enum StateArg<T> {
    /// Literal value
    Value(T),
    /// Name of a parameter holding the value
    Param(String),
}

/// Polygon face selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Face {
    /// Front faces
    Front,
    /// Back faces
    #[default]
    Back,
    /// Both faces
    FrontAndBack,
}

/// Rasterization mode of polygons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PolygonMode {
    /// Vertices only
    Point,
    /// Edges only
    Line,
    /// Filled
    #[default]
    Fill,
}

/// Blend factor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    /// 0
    Zero,
    /// 1
    One,
    /// Source alpha
    SrcAlpha,
    /// 1 - source alpha
    OneMinusSrcAlpha,
    /// Destination alpha
    DstAlpha,
    /// 1 - destination alpha
    OneMinusDstAlpha,
    /// Source color
    SrcColor,
    /// 1 - source color
    OneMinusSrcColor,
}

/// Depth comparison function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CompareFunc {
    /// Never passes
    Never,
    /// Passes when less
    #[default]
    Less,
    /// Passes when equal
    Equal,
    /// Passes when less or equal
    LessEqual,
    /// Passes when greater
    Greater,
    /// Passes when not equal
    NotEqual,
    /// Passes when greater or equal
    GreaterEqual,
    /// Always passes
    Always,
}

/// One entry of a pass's declarative state block
#[derive(Debug, Clone, PartialEq)]
pub enum PassState {
    /// Rasterized point size
    PointSize(StateArg<f32>),
    /// Polygon offset (factor, units)
    PolygonOffset(StateArg<Vec2>),
    /// Enable polygon offset for filled polygons
    PolygonOffsetFillEnable(StateArg<bool>),
    /// Enable face culling
    CullFaceEnable(StateArg<bool>),
    /// Which faces to cull
    CullFace(Face),
    /// Polygon rasterization mode
    PolygonMode {
        /// Affected faces
        face: Face,
        /// Mode
        mode: PolygonMode,
    },
    /// Enable blending
    BlendEnable(StateArg<bool>),
    /// Blend function
    BlendFunc {
        /// Source factor
        src: BlendFactor,
        /// Destination factor
        dest: BlendFactor,
    },
    /// Enable depth testing
    DepthTestEnable(StateArg<bool>),
    /// Depth comparison
    DepthFunc(CompareFunc),
    /// Enable depth writes
    DepthMask(StateArg<bool>),
    /// Color channel write mask
    ColorMask([bool; 4]),
    /// Clear the color buffer to this value before drawing
    ClearColor(StateArg<Vec4>),
    /// Clear the depth buffer to this value before drawing
    ClearDepth(StateArg<f32>),
    /// Clear the stencil buffer to this value before drawing
    ClearStencil(StateArg<i32>),
}

/// Vertex attribute consumed by a pass's program
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeDecl {
    /// Shader symbol
    pub symbol: String,
    /// Geometry semantic it reads, e.g. `POSITION`
    pub semantic: String,
    /// Input set for multi-set semantics such as `TEXCOORD`
    pub set: Option<u32>,
}

impl AttributeDecl {
    /// Attribute reading the first set of `semantic`
    pub fn new(symbol: impl Into<String>, semantic: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            semantic: semantic.into(),
            set: None,
        }
    }
}

/// Where a uniform takes its value from
#[derive(Debug, Clone, PartialEq)]
pub enum UniformSource {
    /// A named parameter of the material/effect/profile
    Param(String),
    /// A literal value
    Value(ParamValue),
}

/// Uniform or sampler consumed by a pass's program
#[derive(Debug, Clone, PartialEq)]
pub struct UniformDecl {
    /// Shader symbol
    pub symbol: String,
    /// Value source
    pub source: UniformSource,
}

impl UniformDecl {
    /// Uniform bound to a named parameter
    pub fn param(symbol: impl Into<String>, param: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            source: UniformSource::Param(param.into()),
        }
    }

    /// Uniform bound to a literal value
    pub fn value(symbol: impl Into<String>, value: ParamValue) -> Self {
        Self {
            symbol: symbol.into(),
            source: UniformSource::Value(value),
        }
    }
}

/// Program interface of a pass
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    /// Vertex attributes
    pub attributes: Vec<AttributeDecl>,
    /// Uniforms and samplers
    pub uniforms: Vec<UniformDecl>,
}

/// Attachment point of a render target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TargetSlot {
    /// Color attachment by index
    Color(u8),
    /// Depth attachment
    Depth,
    /// Stencil attachment
    Stencil,
}

/// Face of a cube map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CubeFace {
    /// +X
    PositiveX,
    /// -X
    NegativeX,
    /// +Y
    PositiveY,
    /// -Y
    NegativeY,
    /// +Z
    PositiveZ,
    /// -Z
    NegativeZ,
}

/// Image written by a render target
#[derive(Debug, Clone, PartialEq)]
pub enum TargetSource {
    /// A specific image
    Image(ImageId),
    /// A parameter holding a surface or sampler
    Param(String),
}

/// Render target declared by a pass
#[derive(Debug, Clone, PartialEq)]
pub struct RenderTargetDecl {
    /// Attachment point
    pub slot: TargetSlot,
    /// Image source
    pub source: TargetSource,
    /// Cube face, for cube images
    pub face: Option<CubeFace>,
    /// Array layer or depth slice
    pub layer: u32,
    /// Mip level
    pub mip: u32,
}

impl RenderTargetDecl {
    /// Color target at mip 0, layer 0
    pub fn color(index: u8, source: TargetSource) -> Self {
        Self {
            slot: TargetSlot::Color(index),
            source,
            face: None,
            layer: 0,
            mip: 0,
        }
    }
}

/// How a pass produces geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DrawMode {
    /// Draw whatever geometry the material is bound to
    #[default]
    Geometry,
    /// Draw the whole scene with this pass substituted for every material
    SceneGeometry,
    /// Draw the whole scene normally into this pass's render targets
    SceneImage,
    /// Draw a single full-screen quad
    FullScreenQuad,
    /// Full-screen quad offset by half a pixel
    FullScreenQuadPlusHalfPixel,
}

/// Pass-level override of the primitive topology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveOverride {
    /// Draw every primitive as tessellation patches
    Patches {
        /// Control points per patch
        vertices: u32,
    },
    /// Draw every primitive as points
    Points,
}

/// A technique pass
#[derive(Debug, Clone)]
pub struct Pass {
    /// Pass sid
    pub sid: String,
    /// Program interface
    pub program: Program,
    /// Declarative state block
    pub states: Vec<PassState>,
    /// Render targets; empty renders to the default framebuffer
    pub render_targets: Vec<RenderTargetDecl>,
    /// Geometry source
    pub draw: DrawMode,
    /// Primitive topology override
    pub primitive_override: Option<PrimitiveOverride>,
    /// Structure and value stamps
    pub versions: Versions,
}

impl Pass {
    /// A pass with an empty program and default state
    pub fn new(sid: impl Into<String>) -> Self {
        Self {
            sid: sid.into(),
            program: Program::default(),
            states: Vec::new(),
            render_targets: Vec::new(),
            draw: DrawMode::default(),
            primitive_override: None,
            versions: Versions::new(),
        }
    }
}
