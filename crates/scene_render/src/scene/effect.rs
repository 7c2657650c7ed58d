//! Effects, profiles, techniques and parameter values

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use super::handles::{ImageId, PassId, ProfileId};
use crate::foundation::math::{Mat4, Vec2, Vec3, Vec4};
use crate::foundation::version::Versions;

bitflags! {
    /// Set of shader profiles
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct ProfileMask: u32 {
        /// Fixed shading models (constant, lambert, phong, blinn)
        const COMMON = 1 << 0;
        /// Desktop GLSL
        const GLSL = 1 << 1;
        /// GLSL ES 2
        const GLES2 = 1 << 2;
        /// Cg
        const CG = 1 << 3;
    }
}

/// Kind of a single profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProfileKind {
    /// Fixed shading models
    Common,
    /// Desktop GLSL
    Glsl,
    /// GLSL ES 2
    Gles2,
    /// Cg
    Cg,
}

impl ProfileKind {
    /// The mask bit for this kind
    pub fn mask(self) -> ProfileMask {
        match self {
            Self::Common => ProfileMask::COMMON,
            Self::Glsl => ProfileMask::GLSL,
            Self::Gles2 => ProfileMask::GLES2,
            Self::Cg => ProfileMask::CG,
        }
    }
}

/// Texture filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Filter {
    /// Nearest texel
    Nearest,
    /// Linear interpolation
    #[default]
    Linear,
    /// Trilinear with mipmaps
    LinearMipmapLinear,
}

/// Texture coordinate wrapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Wrap {
    /// Repeat the texture
    #[default]
    Repeat,
    /// Clamp to the edge texel
    ClampToEdge,
    /// Mirror on every repeat
    MirroredRepeat,
}

/// Sampler state bound to an image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SamplerDesc {
    /// Sampled image
    pub image: ImageId,
    /// Minification filter
    pub min_filter: Filter,
    /// Magnification filter
    pub mag_filter: Filter,
    /// Wrap mode for s and t
    pub wrap: Wrap,
}

impl SamplerDesc {
    /// Sampler with default filtering and wrapping
    pub fn new(image: ImageId) -> Self {
        Self {
            image,
            min_filter: Filter::default(),
            mag_filter: Filter::default(),
            wrap: Wrap::default(),
        }
    }
}

/// Value of an effect, profile or material parameter
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    /// Boolean
    Bool(bool),
    /// Signed integer
    Int(i32),
    /// Scalar
    Float(f32),
    /// 2-vector
    Float2(Vec2),
    /// 3-vector
    Float3(Vec3),
    /// 4-vector
    Float4(Vec4),
    /// 4x4 matrix
    Float4x4(Mat4),
    /// Sampler bound to an image
    Sampler(SamplerDesc),
    /// Image used as a render target or sampler source
    Surface(ImageId),
    /// A runtime semantic by name, e.g. `MODELVIEW_MATRIX`
    Semantic(String),
    /// Reference to another parameter by name
    Param(String),
}

impl ParamValue {
    /// Short type name for diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Float2(_) => "float2",
            Self::Float3(_) => "float3",
            Self::Float4(_) => "float4",
            Self::Float4x4(_) => "float4x4",
            Self::Sampler(_) => "sampler",
            Self::Surface(_) => "surface",
            Self::Semantic(_) => "semantic",
            Self::Param(_) => "param",
        }
    }
}

/// A named parameter declaration
#[derive(Debug, Clone, PartialEq)]
pub struct ParamDecl {
    /// Parameter name (sid)
    pub name: String,
    /// Declared value
    pub value: ParamValue,
}

impl ParamDecl {
    /// Create a declaration
    pub fn new(name: impl Into<String>, value: ParamValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// A technique: an ordered list of passes
#[derive(Debug, Clone, PartialEq)]
pub struct Technique {
    /// Technique sid
    pub sid: String,
    /// Whether this is a fixed shading model rendered in a single pass
    pub common: bool,
    /// Ordered passes
    pub passes: Vec<PassId>,
}

/// A profile: parameters plus techniques for one shading language
#[derive(Debug, Clone)]
pub struct Profile {
    /// Shading language
    pub kind: ProfileKind,
    /// Profile-level parameter overrides
    pub params: Vec<ParamDecl>,
    /// Techniques in declaration order
    pub techniques: Vec<Technique>,
    /// Structure and value stamps
    pub versions: Versions,
}

impl Profile {
    /// Create an empty profile
    pub fn new(kind: ProfileKind) -> Self {
        Self {
            kind,
            params: Vec::new(),
            techniques: Vec::new(),
            versions: Versions::new(),
        }
    }

    /// Technique by sid, or the first one when no sid is given
    pub fn technique(&self, sid: Option<&str>) -> Option<&Technique> {
        match sid {
            Some(sid) => self.techniques.iter().find(|t| t.sid == sid),
            None => self.techniques.first(),
        }
    }
}

/// An effect: default parameters plus one profile per shading language
#[derive(Debug, Clone)]
pub struct Effect {
    /// Effect name, used in log lines
    pub name: String,
    /// Effect-level parameter defaults
    pub params: Vec<ParamDecl>,
    /// Profiles in preference order
    pub profiles: Vec<ProfileId>,
    /// Structure and value stamps
    pub versions: Versions,
}

impl Effect {
    /// Create an effect with no profiles yet
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            profiles: Vec::new(),
            versions: Versions::new(),
        }
    }
}
