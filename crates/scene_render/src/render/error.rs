//! Error types for the render core

use thiserror::Error;

use crate::config::ConfigError;
use crate::scene::{
    BindingId, CameraId, EffectId, GeometryId, ImageId, LightId, MaterialId, NodeId, PassId,
    ProfileId, SourceId, TransformError, VisualSceneId,
};

/// Errors raised by the transform cache
#[derive(Error, Debug)]
pub enum CacheError {
    /// A value reference from before the last purge
    #[error("stale cache reference: epoch {epoch}, cache is at epoch {current}")]
    StaleHandle {
        /// Epoch the reference was issued in
        epoch: u64,
        /// Current cache epoch
        current: u64,
    },

    /// Node handle not present in the scene database
    #[error("unknown node {0:?}")]
    UnknownNode(NodeId),

    /// Camera handle not present in the scene database
    #[error("unknown camera {0:?}")]
    UnknownCamera(CameraId),

    /// Light handle not present in the scene database
    #[error("unknown light {0:?}")]
    UnknownLight(LightId),

    /// Geometry handle not present in the scene database
    #[error("unknown geometry {0:?}")]
    UnknownGeometry(GeometryId),

    /// Image handle not present in the scene database
    #[error("unknown image {0:?}")]
    UnknownImage(ImageId),

    /// `root` is not an ancestor of `leaf`
    #[error("node {leaf:?} does not descend from {root:?}")]
    NotABranch {
        /// Requested branch root
        root: NodeId,
        /// Requested branch leaf
        leaf: NodeId,
    },

    /// A node path with an odd number of nodes
    #[error("node path of {0} nodes is not a sequence of (root, leaf) pairs")]
    MalformedPath(usize),

    /// The referenced slot does not hold a matrix
    #[error("cache slot holds a {found}, expected a matrix")]
    NotAMatrix {
        /// Kind actually stored
        found: &'static str,
    },

    /// A node's transform stack cannot be composed
    #[error(transparent)]
    Transform(#[from] TransformError),

    /// Invalid cache configuration
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The worker pool could not be created
    #[error("failed to build worker pool: {0}")]
    ThreadPool(String),
}

/// Errors raised while resolving render actions
///
/// The render list treats every one of these as "skip this batch": it logs
/// the error and keeps building.
#[derive(Error, Debug)]
pub enum ResolveError {
    /// Visual scene handle not present in the scene database
    #[error("unknown visual scene {0:?}")]
    UnknownVisualScene(VisualSceneId),

    /// Node handle not present in the scene database
    #[error("unknown node {0:?}")]
    UnknownNode(NodeId),

    /// Material handle not present in the scene database
    #[error("unknown material {0:?}")]
    UnknownMaterial(MaterialId),

    /// Material binding handle not present in the scene database
    #[error("unknown material binding {0:?}")]
    UnknownBinding(BindingId),

    /// Effect handle not present in the scene database
    #[error("unknown effect {0:?}")]
    UnknownEffect(EffectId),

    /// Profile handle not present in the scene database
    #[error("unknown profile {0:?}")]
    UnknownProfile(ProfileId),

    /// Pass handle not present in the scene database
    #[error("unknown pass {0:?}")]
    UnknownPass(PassId),

    /// Geometry handle not present in the scene database
    #[error("unknown geometry {0:?}")]
    UnknownGeometry(GeometryId),

    /// Source buffer handle not present in the scene database
    #[error("unknown source buffer {0:?}")]
    UnknownSource(SourceId),

    /// Image handle not present in the scene database
    #[error("unknown image {0:?}")]
    UnknownImage(ImageId),

    /// No primitive-set material binding for a symbol
    #[error("no material bound to symbol '{0}'")]
    UnboundSymbol(String),

    /// The material's effect has no usable technique for the active profiles
    #[error("material {material:?} has no technique for the active profiles")]
    NoTechnique {
        /// Material being resolved
        material: MaterialId,
    },

    /// An instance material names a pass its technique lacks
    #[error("technique '{technique}' has no pass '{pass}'")]
    NoSuchPass {
        /// Technique sid
        technique: String,
        /// Requested pass sid
        pass: String,
    },

    /// A pass attribute has no matching geometry input
    #[error("pass {pass:?} needs vertex semantic '{semantic}' which geometry {geometry:?} lacks")]
    MissingSemantic {
        /// Pass declaring the attribute
        pass: PassId,
        /// Geometry being bound
        geometry: GeometryId,
        /// Semantic that could not be matched
        semantic: String,
    },

    /// A parameter reference that resolves to nothing
    #[error("unresolved parameter '{0}'")]
    UnresolvedParam(String),

    /// A chain of parameter references that loops
    #[error("parameter reference cycle through '{0}'")]
    ParamCycle(String),

    /// A parameter holds the wrong kind of value
    #[error("parameter '{name}' is a {found}, expected {expected}")]
    ParamType {
        /// Parameter name
        name: String,
        /// Expected kind
        expected: &'static str,
        /// Kind found
        found: &'static str,
    },

    /// An unknown runtime semantic name
    #[error("unknown runtime semantic '{0}'")]
    UnknownSemantic(String),

    /// Index buffer with an element type that cannot index vertices
    #[error("index source {0:?} must hold unsigned integers")]
    IndexType(SourceId),

    /// Primitive set with no vertex data
    #[error("primitive set of geometry {0:?} has no POSITION input")]
    NoVertices(GeometryId),

    /// Derived-value lookup failed
    #[error(transparent)]
    Cache(#[from] CacheError),
}
