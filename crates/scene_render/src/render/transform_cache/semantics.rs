//! Runtime semantics: named derived values a shader parameter can request
//!
//! Every semantic is expressed as a combination of the cache's primitive
//! accessors, so it shares items with everything else that needs the same
//! matrices.

use std::fmt;
use std::str::FromStr;

use super::items::{ConstId, LeafSource};
use super::{LightInstance, LocalCoords, MatrixRef, NodePath, TransformCache, Value, ValueRef, ViewCoords};
use crate::cache::{CacheKey, Identity};
use crate::render::error::{CacheError, ResolveError};
use crate::scene::{ImageId, SceneDatabase};

/// Number of lights addressable through `LIGHTn_*` semantics
pub const MAX_SEMANTIC_LIGHTS: u8 = 4;

/// Per-light semantic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LightSemantic {
    /// RGB color, alpha 1
    Color,
    /// (constant, linear, quadratic, 0)
    Attenuation,
    /// Spot cone half-angle in degrees
    FalloffAngle,
    /// Spot falloff exponent
    FalloffExponent,
    /// World-space position
    Position,
    /// Eye-space position
    PositionEye,
    /// World-space direction
    Direction,
    /// Eye-space direction
    DirectionEye,
    /// World to light space
    ViewMatrix,
    /// Object to light clip space
    WorldViewProjectionMatrix,
    /// Eye space to biased light clip space, for shadow map lookups
    ShadowMatrix,
}

impl LightSemantic {
    /// Every light semantic
    pub const ALL: [LightSemantic; 11] = [
        Self::Color,
        Self::Attenuation,
        Self::FalloffAngle,
        Self::FalloffExponent,
        Self::Position,
        Self::PositionEye,
        Self::Direction,
        Self::DirectionEye,
        Self::ViewMatrix,
        Self::WorldViewProjectionMatrix,
        Self::ShadowMatrix,
    ];

    fn name(self) -> &'static str {
        match self {
            Self::Color => "COLOR",
            Self::Attenuation => "ATTENUATION",
            Self::FalloffAngle => "FALLOFF_ANGLE",
            Self::FalloffExponent => "FALLOFF_EXPONENT",
            Self::Position => "POSITION",
            Self::PositionEye => "POSITION_EYE",
            Self::Direction => "DIRECTION",
            Self::DirectionEye => "DIRECTION_EYE",
            Self::ViewMatrix => "VIEW_MATRIX",
            Self::WorldViewProjectionMatrix => "WORLD_VIEW_PROJECTION_MATRIX",
            Self::ShadowMatrix => "SHADOW_MATRIX",
        }
    }

    fn missing_light_value(self) -> ConstId {
        match self {
            Self::FalloffAngle | Self::FalloffExponent => ConstId::ZeroScalar,
            Self::ViewMatrix | Self::WorldViewProjectionMatrix | Self::ShadowMatrix => ConstId::Zero,
            _ => ConstId::ZeroVector,
        }
    }
}

/// A named runtime semantic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuntimeSemantic {
    /// View to clip
    Projection,
    /// Clip to view
    ProjectionInverse,
    /// World to view
    View,
    /// View to world
    ViewInverse,
    /// Object to world
    World,
    /// World to object
    WorldInverse,
    /// Transposed world-to-object
    WorldInverseTranspose,
    /// Object to view
    ModelView,
    /// View to object
    ModelViewInverse,
    /// Object to clip
    ModelViewProjection,
    /// Clip to object
    ModelViewProjectionInverse,
    /// World to clip
    ViewProjection,
    /// Clip to world
    ViewProjectionInverse,
    /// Normal matrix for view-space lighting
    Normal,
    /// Normal matrix for world-space lighting
    WorldNormal,
    /// Camera position in world space
    CameraPosition,
    /// Camera viewing direction in world space
    CameraDirection,
    /// Render target size in pixels
    FramebufferSize,
    /// Reciprocal of the render target size
    FramebufferSizeInverse,
    /// A per-light value for light `0..MAX_SEMANTIC_LIGHTS`
    Light(u8, LightSemantic),
}

const GENERAL: [(RuntimeSemantic, &str); 19] = [
    (RuntimeSemantic::Projection, "PROJECTION_MATRIX"),
    (RuntimeSemantic::ProjectionInverse, "PROJECTION_MATRIX_INVERSE"),
    (RuntimeSemantic::View, "VIEW_MATRIX"),
    (RuntimeSemantic::ViewInverse, "VIEW_MATRIX_INVERSE"),
    (RuntimeSemantic::World, "WORLD_MATRIX"),
    (RuntimeSemantic::WorldInverse, "WORLD_MATRIX_INVERSE"),
    (RuntimeSemantic::WorldInverseTranspose, "WORLD_INVERSE_TRANSPOSE_MATRIX"),
    (RuntimeSemantic::ModelView, "MODELVIEW_MATRIX"),
    (RuntimeSemantic::ModelViewInverse, "MODELVIEW_MATRIX_INVERSE"),
    (RuntimeSemantic::ModelViewProjection, "MODELVIEWPROJECTION_MATRIX"),
    (RuntimeSemantic::ModelViewProjectionInverse, "MODELVIEWPROJECTION_MATRIX_INVERSE"),
    (RuntimeSemantic::ViewProjection, "VIEWPROJECTION_MATRIX"),
    (RuntimeSemantic::ViewProjectionInverse, "VIEWPROJECTION_MATRIX_INVERSE"),
    (RuntimeSemantic::Normal, "NORMAL_MATRIX"),
    (RuntimeSemantic::WorldNormal, "WORLD_NORMAL_MATRIX"),
    (RuntimeSemantic::CameraPosition, "CAMERA_POSITION"),
    (RuntimeSemantic::CameraDirection, "CAMERA_DIRECTION"),
    (RuntimeSemantic::FramebufferSize, "FRAMEBUFFER_SIZE"),
    (RuntimeSemantic::FramebufferSizeInverse, "FRAMEBUFFER_SIZE_INVERSE"),
];

impl RuntimeSemantic {
    /// Every semantic, general ones first
    pub fn all() -> Vec<RuntimeSemantic> {
        let lights = (0..MAX_SEMANTIC_LIGHTS)
            .flat_map(|index| LightSemantic::ALL.iter().map(move |kind| Self::Light(index, *kind)));
        GENERAL.iter().map(|(semantic, _)| *semantic).chain(lights).collect()
    }

    /// Stable numeric code, used in cache keys
    fn code(self) -> u64 {
        match self {
            Self::Light(index, kind) => {
                let kind = LightSemantic::ALL.iter().position(|k| *k == kind).unwrap_or(0) as u64;
                0x100 + u64::from(index) * 0x10 + kind
            }
            general => GENERAL
                .iter()
                .position(|(s, _)| *s == general)
                .map_or(0, |i| i as u64 + 1),
        }
    }

    fn uses_view(self) -> bool {
        !matches!(
            self,
            Self::World
                | Self::WorldInverse
                | Self::WorldInverseTranspose
                | Self::WorldNormal
                | Self::FramebufferSize
                | Self::FramebufferSizeInverse
        ) && !matches!(
            self,
            Self::Light(
                _,
                LightSemantic::Color
                    | LightSemantic::Attenuation
                    | LightSemantic::FalloffAngle
                    | LightSemantic::FalloffExponent
                    | LightSemantic::Position
                    | LightSemantic::Direction
                    | LightSemantic::ViewMatrix
                    | LightSemantic::WorldViewProjectionMatrix
            )
        )
    }

    fn uses_local(self) -> bool {
        matches!(
            self,
            Self::World
                | Self::WorldInverse
                | Self::WorldInverseTranspose
                | Self::ModelView
                | Self::ModelViewInverse
                | Self::ModelViewProjection
                | Self::ModelViewProjectionInverse
                | Self::Normal
                | Self::WorldNormal
                | Self::Light(_, LightSemantic::WorldViewProjectionMatrix)
        )
    }
}

impl FromStr for RuntimeSemantic {
    type Err = ResolveError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        if let Some((semantic, _)) = GENERAL.iter().find(|(_, n)| *n == name) {
            return Ok(*semantic);
        }
        let unknown = || ResolveError::UnknownSemantic(name.to_string());
        let rest = name.strip_prefix("LIGHT").ok_or_else(unknown)?;
        let (index, kind) = rest.split_once('_').ok_or_else(unknown)?;
        let index: u8 = index.parse().map_err(|_| unknown())?;
        if index >= MAX_SEMANTIC_LIGHTS {
            return Err(unknown());
        }
        let kind = LightSemantic::ALL
            .iter()
            .find(|k| k.name() == kind)
            .ok_or_else(unknown)?;
        Ok(Self::Light(index, *kind))
    }
}

impl fmt::Display for RuntimeSemantic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Light(index, kind) => write!(f, "LIGHT{}_{}", index, kind.name()),
            general => {
                let name = GENERAL.iter().find(|(s, _)| s == general).map_or("?", |(_, n)| *n);
                f.write_str(name)
            }
        }
    }
}

/// Everything a semantic can depend on for one draw
#[derive(Debug, Clone, Copy)]
pub struct SemanticContext<'a> {
    /// First color render target, `None` for the default framebuffer
    pub target: Option<ImageId>,
    /// Viewer placement
    pub view: &'a ViewCoords,
    /// Object placement
    pub local: &'a LocalCoords,
    /// Lights of the visual scene, indexed by `LIGHTn`
    pub lights: &'a [LightInstance],
}

impl<'a> SemanticContext<'a> {
    fn light(&self, semantic: RuntimeSemantic) -> Option<&'a LightInstance> {
        match semantic {
            RuntimeSemantic::Light(index, _) => self.lights.get(usize::from(index)),
            _ => None,
        }
    }
}

impl TransformCache {
    /// Memo key of a semantic; `None` while any of its paths is unknown
    fn semantic_key(&self, semantic: RuntimeSemantic, ctx: &SemanticContext<'_>) -> Option<CacheKey<7>> {
        let path_id = |path: &NodePath| self.find_path_id(path);
        let mut ids = [Identity::NONE; 7];
        ids[0] = Identity::tag(semantic.code());
        if matches!(semantic, RuntimeSemantic::FramebufferSize | RuntimeSemantic::FramebufferSizeInverse) {
            ids[1] = ctx.target.map_or(Identity::NONE, Identity::of);
        }
        if semantic.uses_view() {
            ids[2] = path_id(&ctx.view.path)?;
            ids[3] = ctx.view.camera.map_or(Identity::NONE, Identity::of);
        }
        if semantic.uses_local() {
            ids[4] = path_id(&ctx.local.path)?;
        }
        if let Some(light) = ctx.light(semantic) {
            ids[5] = Identity::of(light.light);
            ids[6] = path_id(&light.path)?;
        }
        Some(CacheKey::new(ids))
    }

    /// Get or create the value of a runtime semantic for one draw
    pub fn runtime_semantic(
        &mut self,
        db: &SceneDatabase,
        semantic: RuntimeSemantic,
        ctx: &SemanticContext<'_>,
    ) -> Result<ValueRef, CacheError> {
        // Intern every path the key may name before building it
        self.path_id(&ctx.view.path);
        self.path_id(&ctx.local.path);
        if let Some(light) = ctx.light(semantic) {
            self.path_id(&light.path);
        }
        let key = self.semantic_key(semantic, ctx);
        if let Some(key) = &key {
            if let Some(index) = self.semantic_lut.find(key) {
                if let Some(reference) = self.semantic_refs.get(index) {
                    return Ok(*reference);
                }
            }
        }

        let reference = self.derive_semantic(db, semantic, ctx)?;
        if let Some(key) = key {
            self.semantic_lut.insert(key, self.semantic_refs.len());
            self.semantic_refs.push(reference);
        }
        Ok(reference)
    }

    /// Current value of a semantic that was resolved earlier, without creating anything
    pub fn find_runtime_semantic(&self, semantic: RuntimeSemantic, ctx: &SemanticContext<'_>) -> Option<Value> {
        let key = self.semantic_key(semantic, ctx)?;
        let index = self.semantic_lut.find(&key)?;
        let reference = self.semantic_refs.get(index)?;
        self.value(*reference).ok()
    }

    fn derive_semantic(
        &mut self,
        db: &SceneDatabase,
        semantic: RuntimeSemantic,
        ctx: &SemanticContext<'_>,
    ) -> Result<ValueRef, CacheError> {
        use RuntimeSemantic as S;

        let view = ctx.view;
        let local = ctx.local;
        let m = |r: MatrixRef| Ok::<ValueRef, CacheError>(r.into());

        match semantic {
            S::Projection => m(self.view_projection(db, view)?),
            S::ProjectionInverse => match view.camera {
                Some(camera) => m(self.camera_projection_matrix_inverse(db, camera)?),
                None => m(self.identity()),
            },
            S::View => m(self.path_transform_inverse_matrix(db, &view.path)?),
            S::ViewInverse => m(self.path_transform_matrix(db, &view.path)?),
            S::World => m(self.path_transform_matrix(db, &local.path)?),
            S::WorldInverse => m(self.path_transform_inverse_matrix(db, &local.path)?),
            S::WorldInverseTranspose => {
                let world_inverse = self.path_transform_inverse_matrix(db, &local.path)?;
                m(self.matrix_transpose(world_inverse)?)
            }
            S::ModelView => {
                let view_inverse = self.path_transform_inverse_matrix(db, &view.path)?;
                let world = self.path_transform_matrix(db, &local.path)?;
                m(self.matrix_composition(view_inverse, world, None, None)?)
            }
            S::ModelViewInverse => {
                let world_inverse = self.path_transform_inverse_matrix(db, &local.path)?;
                let camera_world = self.path_transform_matrix(db, &view.path)?;
                m(self.matrix_composition(world_inverse, camera_world, None, None)?)
            }
            S::ModelViewProjection => {
                let projection = self.view_projection(db, view)?;
                let view_inverse = self.path_transform_inverse_matrix(db, &view.path)?;
                let world = self.path_transform_matrix(db, &local.path)?;
                m(self.matrix_composition(projection, view_inverse, Some(world), None)?)
            }
            S::ModelViewProjectionInverse => {
                let world_inverse = self.path_transform_inverse_matrix(db, &local.path)?;
                let camera_world = self.path_transform_matrix(db, &view.path)?;
                let projection_inverse = self.derive_semantic(db, S::ProjectionInverse, ctx)?;
                m(self.matrix_composition(
                    world_inverse,
                    camera_world,
                    Some(MatrixRef(projection_inverse)),
                    None,
                )?)
            }
            S::ViewProjection => {
                let projection = self.view_projection(db, view)?;
                let view_inverse = self.path_transform_inverse_matrix(db, &view.path)?;
                m(self.matrix_composition(projection, view_inverse, None, None)?)
            }
            S::ViewProjectionInverse => {
                let camera_world = self.path_transform_matrix(db, &view.path)?;
                let projection_inverse = self.derive_semantic(db, S::ProjectionInverse, ctx)?;
                m(self.matrix_composition(camera_world, MatrixRef(projection_inverse), None, None)?)
            }
            S::Normal => {
                let world_inverse = self.path_transform_inverse_matrix(db, &local.path)?;
                let camera_world = self.path_transform_matrix(db, &view.path)?;
                m(self.matrix_product_upper3x3_transpose(world_inverse, camera_world)?)
            }
            S::WorldNormal => {
                let world_inverse = self.path_transform_inverse_matrix(db, &local.path)?;
                let identity = self.identity();
                m(self.matrix_product_upper3x3_transpose(world_inverse, identity)?)
            }
            S::CameraPosition => {
                let camera_world = self.path_transform_matrix(db, &view.path)?;
                let identity = self.identity();
                self.matrix_subset_postmultiply_origin(camera_world, identity)
            }
            S::CameraDirection => {
                let camera_world = self.path_transform_matrix(db, &view.path)?;
                let identity = self.identity();
                self.matrix_subset_premultiply_z(camera_world, identity)
            }
            S::FramebufferSize => Ok(match ctx.target {
                Some(image) => {
                    db.image(image).ok_or(CacheError::UnknownImage(image))?;
                    self.leaf_value(LeafSource::ImageSize(image))
                }
                None => self.leaf_value(LeafSource::FramebufferSize),
            }),
            S::FramebufferSizeInverse => Ok(match ctx.target {
                Some(image) => {
                    db.image(image).ok_or(CacheError::UnknownImage(image))?;
                    self.leaf_value(LeafSource::ImageSizeInverse(image))
                }
                None => self.leaf_value(LeafSource::FramebufferSizeInverse),
            }),
            S::Light(index, kind) => {
                let Some(instance) = ctx.light(semantic) else {
                    log::debug!("{} requested but the scene has only {} lights", semantic, ctx.lights.len());
                    return Ok(self.reference(super::items::Slot::Constant(kind.missing_light_value())));
                };
                let light = instance.light;
                db.light(light).ok_or(CacheError::UnknownLight(light))?;
                log::trace!("Resolving {} from light {:?} (index {})", semantic, light, index);
                self.derive_light(db, kind, instance, view, local)
            }
        }
    }

    fn derive_light(
        &mut self,
        db: &SceneDatabase,
        kind: LightSemantic,
        instance: &LightInstance,
        view: &ViewCoords,
        local: &LocalCoords,
    ) -> Result<ValueRef, CacheError> {
        let light = instance.light;
        match kind {
            LightSemantic::Color => Ok(self.leaf_value(LeafSource::LightColor(light))),
            LightSemantic::Attenuation => Ok(self.leaf_value(LeafSource::LightAttenuation(light))),
            LightSemantic::FalloffAngle => Ok(self.leaf_value(LeafSource::LightFalloffAngle(light))),
            LightSemantic::FalloffExponent => Ok(self.leaf_value(LeafSource::LightFalloffExponent(light))),
            LightSemantic::Position => {
                let light_world = self.path_transform_matrix(db, &instance.path)?;
                let identity = self.identity();
                self.matrix_subset_postmultiply_origin(light_world, identity)
            }
            LightSemantic::PositionEye => {
                let view_inverse = self.path_transform_inverse_matrix(db, &view.path)?;
                let light_world = self.path_transform_matrix(db, &instance.path)?;
                self.matrix_subset_postmultiply_origin(view_inverse, light_world)
            }
            LightSemantic::Direction => {
                let light_world = self.path_transform_matrix(db, &instance.path)?;
                let identity = self.identity();
                self.matrix_subset_premultiply_z(light_world, identity)
            }
            LightSemantic::DirectionEye => {
                let view_inverse = self.path_transform_inverse_matrix(db, &view.path)?;
                let light_world = self.path_transform_matrix(db, &instance.path)?;
                self.matrix_subset_premultiply_z(view_inverse, light_world)
            }
            LightSemantic::ViewMatrix => Ok(self.path_transform_inverse_matrix(db, &instance.path)?.into()),
            LightSemantic::WorldViewProjectionMatrix => {
                let projection = MatrixRef(self.leaf_value(LeafSource::LightProjection(light)));
                let light_view = self.path_transform_inverse_matrix(db, &instance.path)?;
                let world = self.path_transform_matrix(db, &local.path)?;
                Ok(self.matrix_composition(projection, light_view, Some(world), None)?.into())
            }
            LightSemantic::ShadowMatrix => {
                let bias = self.constant(ConstId::ShadowBias);
                let projection = MatrixRef(self.leaf_value(LeafSource::LightProjection(light)));
                let light_view = self.path_transform_inverse_matrix(db, &instance.path)?;
                let camera_world = self.path_transform_matrix(db, &view.path)?;
                Ok(self
                    .matrix_composition(bias, projection, Some(light_view), Some(camera_world))?
                    .into())
            }
        }
    }
}
