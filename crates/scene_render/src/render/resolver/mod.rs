//! # Action Resolver
//!
//! Turns scene constructs into memoized, immutable [`RenderAction`] records.
//!
//! ## Cache lifetimes
//!
//! ```text
//! persistent   params, pass, raster, pixel-ops, fb-ctrl, framebuffer,
//!              samplers, inputs, layer bits and node masks
//!              (validated against source structure stamps on every lookup)
//! per build    view and local coordinate systems, uniforms, draws, lights
//!              (they hold transform cache references, which a rebuild purges)
//! ```
//!
//! State blocks equal to the default resolve to the shared default actions so
//! the render list can suppress them by identity.

mod layers;
mod memo;
mod node_path;
mod params;

use std::collections::HashMap;
use std::sync::Arc;

use crate::cache::{CacheKey, Identity};
use crate::config::RenderListConfig;
use crate::foundation::math::{Vec2, Vec4};
use crate::foundation::version::SeqPos;
use crate::render::action::{
    DefaultActions, Draw, DrawIndexed, GpuPrimitive, IndexType, InputBinding, RenderAction,
    SamplerBinding, SetFbCtrl, SetFramebuffer, SetInputs, SetLocalCoords, SetPass, SetPixelOps,
    SetRaster, SetSamplers, SetUniforms, SetViewCoords, TargetBinding, UniformBinding, UniformValue,
};
use crate::render::error::ResolveError;
use crate::render::transform_cache::{
    LightInstance, LocalCoords, NodePath, RuntimeSemantic, SemanticContext, TransformCache, ValueRef,
    ViewCoords,
};
use crate::scene::{
    BindingId, BlendFactor, CompareFunc, Face, GeometryId, ImageId, MaterialId, NodeId, ParamValue,
    Pass, PassId, PassState, PrimitiveOverride, ProfileId, ProfileMask, RenderItem, SamplerDesc,
    SceneDatabase, SourceData, TargetSource, Topology, UniformSource, VisualSceneId,
};

pub use layers::{layer_included, LayerRegistry, MAX_LAYERS};
pub use node_path::{find_node_path, gather_lights, walk_hierarchy, InstanceCycle};
pub use params::{select_technique, ResolvedParams, TechniqueChoice};

use memo::Memo;

/// One draw to resolve: a primitive set of a geometry drawn with one pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Batch {
    /// Material supplying parameters
    pub material: MaterialId,
    /// Profile holding the technique
    pub profile: ProfileId,
    /// Pass to draw with
    pub pass: PassId,
    /// Drawn geometry
    pub geometry: GeometryId,
    /// Index of the primitive set within the geometry
    pub primitive: usize,
    /// Material binding that selected the material, for vertex input remaps
    pub binding: Option<BindingId>,
}

fn float(value: &ParamValue) -> Option<f32> {
    match value {
        ParamValue::Float(v) => Some(*v),
        _ => None,
    }
}

fn float2(value: &ParamValue) -> Option<Vec2> {
    match value {
        ParamValue::Float2(v) => Some(*v),
        _ => None,
    }
}

fn float4(value: &ParamValue) -> Option<Vec4> {
    match value {
        ParamValue::Float4(v) => Some(*v),
        _ => None,
    }
}

fn boolean(value: &ParamValue) -> Option<bool> {
    match value {
        ParamValue::Bool(v) => Some(*v),
        _ => None,
    }
}

fn int(value: &ParamValue) -> Option<i32> {
    match value {
        ParamValue::Int(v) => Some(*v),
        _ => None,
    }
}

/// Memoizing builder of render actions
#[derive(Debug)]
pub struct Resolver {
    defaults: DefaultActions,
    active_profiles: ProfileMask,
    frustum_culling: bool,

    params: Memo<2, Arc<ResolvedParams>>,
    passes: Memo<1, Arc<SetPass>>,
    raster: Memo<2, Arc<SetRaster>>,
    pixel_ops: Memo<2, Arc<SetPixelOps>>,
    fb_ctrl: Memo<2, Arc<SetFbCtrl>>,
    framebuffers: Memo<2, Arc<SetFramebuffer>>,
    samplers: Memo<2, Option<Arc<SetSamplers>>>,
    inputs: Memo<3, Arc<SetInputs>>,
    layers: LayerRegistry,
    item_masks: HashMap<(VisualSceneId, usize, usize), (u64, SeqPos)>,

    lights: Vec<LightInstance>,
    views: HashMap<ViewCoords, (u32, Arc<SetViewCoords>)>,
    locals: HashMap<LocalCoords, (u32, Arc<SetLocalCoords>)>,
    uniforms: Memo<5, Arc<SetUniforms>>,
    draws: Memo<5, RenderAction>,
}

impl Resolver {
    /// Resolver drawing every profile, with culling
    pub fn new() -> Self {
        Self::with_config(&RenderListConfig::default())
    }

    /// Resolver for the given list configuration
    pub fn with_config(config: &RenderListConfig) -> Self {
        Self {
            defaults: DefaultActions::default(),
            active_profiles: config.active_profiles,
            frustum_culling: config.frustum_culling,
            params: Memo::new(),
            passes: Memo::new(),
            raster: Memo::new(),
            pixel_ops: Memo::new(),
            fb_ctrl: Memo::new(),
            framebuffers: Memo::new(),
            samplers: Memo::new(),
            inputs: Memo::new(),
            layers: LayerRegistry::new(),
            item_masks: HashMap::new(),
            lights: Vec::new(),
            views: HashMap::new(),
            locals: HashMap::new(),
            uniforms: Memo::new(),
            draws: Memo::new(),
        }
    }

    /// The shared default actions
    pub fn defaults(&self) -> &DefaultActions {
        &self.defaults
    }

    /// Profiles techniques are selected from
    pub fn active_profiles(&self) -> ProfileMask {
        self.active_profiles
    }

    /// Lights of the visual scene being built
    pub fn lights(&self) -> &[LightInstance] {
        &self.lights
    }

    /// Drop per-build caches and gather the lights under `root`
    pub fn begin_build(&mut self, db: &SceneDatabase, root: NodeId) {
        self.views.clear();
        self.locals.clear();
        self.uniforms.clear();
        self.draws.clear();
        self.lights = gather_lights(db, root);
        log::trace!("Resolver build started with {} lights", self.lights.len());
    }

    // ------------------------------------------------------------------
    // Layers and paths

    /// Mask bit of a layer name
    pub fn layer_mask(&mut self, name: &str) -> Option<u64> {
        self.layers.layer_mask(name)
    }

    /// Mask of a node's own layers; `None` when it declares none
    pub fn node_layer_mask(&mut self, db: &SceneDatabase, node: NodeId) -> Result<Option<u64>, ResolveError> {
        self.layers.node_mask(db, node)
    }

    /// Mask requested by the render item at (`block`, `index`) of a visual scene
    pub fn render_item_mask(
        &mut self,
        db: &SceneDatabase,
        visual_scene: VisualSceneId,
        block: usize,
        index: usize,
        item: &RenderItem,
    ) -> Result<u64, ResolveError> {
        let scene = db
            .visual_scene(visual_scene)
            .ok_or(ResolveError::UnknownVisualScene(visual_scene))?;
        let key = (visual_scene, block, index);
        if let Some((mask, resolved_at)) = self.item_masks.get(&key) {
            if resolved_at.as_recent_as(&scene.versions.structure) {
                return Ok(*mask);
            }
        }
        let mask = self.layers.names_mask(item.layers.as_slice());
        self.item_masks.insert(key, (mask, SeqPos::new()));
        Ok(mask)
    }

    /// Path from `source` to `target` through children and instancing
    pub fn find_node_path(&self, db: &SceneDatabase, source: NodeId, target: NodeId) -> Option<NodePath> {
        find_node_path(db, source, target)
    }

    // ------------------------------------------------------------------
    // Coordinate systems

    /// The view coordinate system action for `coords`
    pub fn view_coords(&mut self, coords: &ViewCoords) -> Arc<SetViewCoords> {
        self.view_entry(coords).1
    }

    fn view_entry(&mut self, coords: &ViewCoords) -> (u32, Arc<SetViewCoords>) {
        let next = self.views.len() as u32 + 1;
        self.views
            .entry(coords.clone())
            .or_insert_with(|| (next, Arc::new(SetViewCoords { coords: coords.clone() })))
            .clone()
    }

    /// The local coordinate system action for `coords`
    pub fn local_coords(&mut self, coords: &LocalCoords) -> Arc<SetLocalCoords> {
        self.local_entry(coords).1
    }

    fn local_entry(&mut self, coords: &LocalCoords) -> (u32, Arc<SetLocalCoords>) {
        let next = self.locals.len() as u32 + 1;
        self.locals
            .entry(coords.clone())
            .or_insert_with(|| (next, Arc::new(SetLocalCoords { coords: coords.clone() })))
            .clone()
    }

    // ------------------------------------------------------------------
    // Parameters and passes

    /// Structure stamps every per-(material, pass) action depends on
    fn batch_sources(&self, db: &SceneDatabase, batch: &Batch) -> Result<[SeqPos; 4], ResolveError> {
        let material = db.material(batch.material).ok_or(ResolveError::UnknownMaterial(batch.material))?;
        let effect = db.effect(material.effect).ok_or(ResolveError::UnknownEffect(material.effect))?;
        let profile = db.profile(batch.profile).ok_or(ResolveError::UnknownProfile(batch.profile))?;
        let pass = db.pass(batch.pass).ok_or(ResolveError::UnknownPass(batch.pass))?;
        Ok([
            material.versions.structure,
            effect.versions.structure,
            profile.versions.structure,
            pass.versions.structure,
        ])
    }

    fn pair_key(batch: &Batch) -> CacheKey<2> {
        CacheKey::new([Identity::of(batch.material), Identity::of(batch.pass)])
    }

    /// Merged parameters of the batch's (material, pass)
    pub fn resolve_params(&mut self, db: &SceneDatabase, batch: &Batch) -> Result<Arc<ResolvedParams>, ResolveError> {
        let sources = self.batch_sources(db, batch)?;
        let key = Self::pair_key(batch);
        if let Some(params) = self.params.get(&key, &sources[..3]) {
            return Ok(params);
        }
        let material = db.material(batch.material).ok_or(ResolveError::UnknownMaterial(batch.material))?;
        let effect = db.effect(material.effect).ok_or(ResolveError::UnknownEffect(material.effect))?;
        let profile = db.profile(batch.profile).ok_or(ResolveError::UnknownProfile(batch.profile))?;
        let params = ResolvedParams::merge(batch.material, batch.pass, effect, profile, material);
        log::trace!("Resolved {} parameters for material '{}'", params.len(), material.name);
        Ok(self.params.insert(key, Arc::new(params)))
    }

    fn pass(db: &SceneDatabase, id: PassId) -> Result<&Pass, ResolveError> {
        db.pass(id).ok_or(ResolveError::UnknownPass(id))
    }

    /// The pass-selection action
    pub fn set_pass(&mut self, db: &SceneDatabase, id: PassId) -> Result<Arc<SetPass>, ResolveError> {
        let pass = Self::pass(db, id)?;
        let key = CacheKey::new([Identity::of(id)]);
        if let Some(action) = self.passes.get(&key, &[pass.versions.structure]) {
            return Ok(action);
        }
        let action = SetPass { pass: id, sid: pass.sid.clone(), draw: pass.draw };
        Ok(self.passes.insert(key, Arc::new(action)))
    }

    // ------------------------------------------------------------------
    // State blocks

    /// Rasterizer state of the batch's pass
    pub fn set_raster(
        &mut self,
        db: &SceneDatabase,
        batch: &Batch,
        params: &ResolvedParams,
    ) -> Result<Arc<SetRaster>, ResolveError> {
        let sources = self.batch_sources(db, batch)?;
        let key = Self::pair_key(batch);
        if let Some(action) = self.raster.get(&key, &sources) {
            return Ok(action);
        }

        let mut raster = SetRaster::default();
        let mut offset = Vec2::zeros();
        let mut offset_enabled = false;
        let mut cull_enabled = false;
        let mut cull_face = Face::Back;
        for state in &Self::pass(db, batch.pass)?.states {
            match state {
                PassState::PointSize(arg) => raster.point_size = params.state_arg(arg, "float", float)?,
                PassState::PolygonOffset(arg) => offset = params.state_arg(arg, "float2", float2)?,
                PassState::PolygonOffsetFillEnable(arg) => offset_enabled = params.state_arg(arg, "bool", boolean)?,
                PassState::CullFaceEnable(arg) => cull_enabled = params.state_arg(arg, "bool", boolean)?,
                PassState::CullFace(face) => cull_face = *face,
                PassState::PolygonMode { face, mode } => raster.polygon_mode = (*face, *mode),
                _ => {}
            }
        }
        raster.polygon_offset = offset_enabled.then_some(offset);
        raster.cull = cull_enabled.then_some(cull_face);

        let action = if raster == *self.defaults.raster {
            self.defaults.raster.clone()
        } else {
            Arc::new(raster)
        };
        Ok(self.raster.insert(key, action))
    }

    /// Blend, depth and color-mask state of the batch's pass
    pub fn set_pixel_ops(
        &mut self,
        db: &SceneDatabase,
        batch: &Batch,
        params: &ResolvedParams,
    ) -> Result<Arc<SetPixelOps>, ResolveError> {
        let sources = self.batch_sources(db, batch)?;
        let key = Self::pair_key(batch);
        if let Some(action) = self.pixel_ops.get(&key, &sources) {
            return Ok(action);
        }

        let mut ops = SetPixelOps::default();
        let mut blend_enabled = false;
        let mut blend_func = (BlendFactor::One, BlendFactor::Zero);
        let mut depth_enabled = true;
        let mut depth_func = CompareFunc::Less;
        for state in &Self::pass(db, batch.pass)?.states {
            match state {
                PassState::BlendEnable(arg) => blend_enabled = params.state_arg(arg, "bool", boolean)?,
                PassState::BlendFunc { src, dest } => blend_func = (*src, *dest),
                PassState::DepthTestEnable(arg) => depth_enabled = params.state_arg(arg, "bool", boolean)?,
                PassState::DepthFunc(func) => depth_func = *func,
                PassState::DepthMask(arg) => ops.depth_mask = params.state_arg(arg, "bool", boolean)?,
                PassState::ColorMask(mask) => ops.color_mask = *mask,
                _ => {}
            }
        }
        ops.blend = blend_enabled.then_some(blend_func);
        ops.depth_test = depth_enabled.then_some(depth_func);

        let action = if ops == *self.defaults.pixel_ops {
            self.defaults.pixel_ops.clone()
        } else {
            Arc::new(ops)
        };
        Ok(self.pixel_ops.insert(key, action))
    }

    /// Buffer clears of the batch's pass
    pub fn set_fb_ctrl(
        &mut self,
        db: &SceneDatabase,
        batch: &Batch,
        params: &ResolvedParams,
    ) -> Result<Arc<SetFbCtrl>, ResolveError> {
        let sources = self.batch_sources(db, batch)?;
        let key = Self::pair_key(batch);
        if let Some(action) = self.fb_ctrl.get(&key, &sources) {
            return Ok(action);
        }

        let mut ctrl = SetFbCtrl::default();
        for state in &Self::pass(db, batch.pass)?.states {
            match state {
                PassState::ClearColor(arg) => ctrl.clear_color = Some(params.state_arg(arg, "float4", float4)?),
                PassState::ClearDepth(arg) => ctrl.clear_depth = Some(params.state_arg(arg, "float", float)?),
                PassState::ClearStencil(arg) => ctrl.clear_stencil = Some(params.state_arg(arg, "int", int)?),
                _ => {}
            }
        }

        let action = if ctrl == *self.defaults.fb_ctrl {
            self.defaults.fb_ctrl.clone()
        } else {
            Arc::new(ctrl)
        };
        Ok(self.fb_ctrl.insert(key, action))
    }

    /// Render targets of the batch's pass; the default framebuffer when none are declared
    pub fn set_render_target(
        &mut self,
        db: &SceneDatabase,
        batch: &Batch,
        params: &ResolvedParams,
    ) -> Result<Arc<SetFramebuffer>, ResolveError> {
        let sources = self.batch_sources(db, batch)?;
        let key = Self::pair_key(batch);
        if let Some(action) = self.framebuffers.get(&key, &sources) {
            return Ok(action);
        }

        let pass = Self::pass(db, batch.pass)?;
        if pass.render_targets.is_empty() {
            return Ok(self.framebuffers.insert(key, self.defaults.framebuffer.clone()));
        }

        let mut targets = Vec::with_capacity(pass.render_targets.len());
        for decl in &pass.render_targets {
            let image = match &decl.source {
                TargetSource::Image(id) => *id,
                TargetSource::Param(name) => match params.lookup(name)? {
                    ParamValue::Surface(id) => *id,
                    ParamValue::Sampler(sampler) => sampler.image,
                    other => {
                        return Err(ResolveError::ParamType {
                            name: name.clone(),
                            expected: "surface",
                            found: other.type_name(),
                        })
                    }
                },
            };
            db.image(image).ok_or(ResolveError::UnknownImage(image))?;
            targets.push(TargetBinding { slot: decl.slot, image, face: decl.face, layer: decl.layer, mip: decl.mip });
        }
        targets.sort_by_key(|t| t.slot);
        Ok(self.framebuffers.insert(key, Arc::new(SetFramebuffer { targets })))
    }

    // ------------------------------------------------------------------
    // Program inputs

    /// Samplers the batch's pass declares; `None` when it declares none
    pub fn set_samplers(
        &mut self,
        db: &SceneDatabase,
        batch: &Batch,
        params: &ResolvedParams,
    ) -> Result<Option<Arc<SetSamplers>>, ResolveError> {
        let sources = self.batch_sources(db, batch)?;
        let key = Self::pair_key(batch);
        if let Some(action) = self.samplers.get(&key, &sources) {
            return Ok(action);
        }

        let mut samplers = Vec::new();
        for decl in &Self::pass(db, batch.pass)?.program.uniforms {
            let sampler = match Self::uniform_value(params, &decl.source)? {
                ParamValue::Sampler(sampler) => *sampler,
                ParamValue::Surface(image) => SamplerDesc::new(*image),
                _ => continue,
            };
            db.image(sampler.image).ok_or(ResolveError::UnknownImage(sampler.image))?;
            samplers.push(SamplerBinding { symbol: decl.symbol.clone(), unit: samplers.len() as u32, sampler });
        }

        let action = (!samplers.is_empty()).then(|| Arc::new(SetSamplers { samplers }));
        Ok(self.samplers.insert(key, action))
    }

    fn uniform_value<'a>(params: &'a ResolvedParams, source: &'a UniformSource) -> Result<&'a ParamValue, ResolveError> {
        match source {
            UniformSource::Param(name) => params.lookup(name),
            UniformSource::Value(value) => params.resolve(value),
        }
    }

    /// Every uniform of the batch's pass for one view and local coordinate system
    ///
    /// Semantic uniforms become transform cache references; samplers take the
    /// unit assigned by `samplers`.
    pub fn set_uniforms(
        &mut self,
        db: &SceneDatabase,
        cache: &mut TransformCache,
        batch: &Batch,
        params: &ResolvedParams,
        samplers: Option<&SetSamplers>,
        view: &ViewCoords,
        local: &LocalCoords,
        target: Option<ImageId>,
    ) -> Result<Arc<SetUniforms>, ResolveError> {
        let sources = self.batch_sources(db, batch)?;
        let (view_index, _) = self.view_entry(view);
        let (local_index, _) = self.local_entry(local);
        let key = CacheKey::new([
            Identity::of(batch.material),
            Identity::of(batch.pass),
            Identity::tag(u64::from(view_index)),
            Identity::tag(u64::from(local_index)),
            target.map_or(Identity::NONE, Identity::of),
        ]);
        if let Some(action) = self.uniforms.get(&key, &sources) {
            return Ok(action);
        }

        let ctx = SemanticContext { target, view, local, lights: &self.lights };
        let pass = Self::pass(db, batch.pass)?;
        let mut uniforms = Vec::with_capacity(pass.program.uniforms.len());
        for decl in &pass.program.uniforms {
            let value = match Self::uniform_value(params, &decl.source)? {
                ParamValue::Semantic(name) => {
                    let semantic: RuntimeSemantic = name.parse()?;
                    let value = cache.runtime_semantic(db, semantic, &ctx)?;
                    UniformValue::Semantic { semantic, value }
                }
                ParamValue::Sampler(_) | ParamValue::Surface(_) => UniformValue::SamplerUnit(
                    samplers
                        .and_then(|s| s.unit_of(&decl.symbol))
                        .ok_or_else(|| ResolveError::UnresolvedParam(decl.symbol.clone()))?,
                ),
                other => UniformValue::Constant(other.clone()),
            };
            uniforms.push(UniformBinding { symbol: decl.symbol.clone(), value });
        }
        Ok(self.uniforms.insert(key, Arc::new(SetUniforms { pass: batch.pass, uniforms })))
    }

    /// Vertex attribute bindings of the batch's pass against its geometry
    pub fn set_inputs(&mut self, db: &SceneDatabase, batch: &Batch) -> Result<Arc<SetInputs>, ResolveError> {
        let pass = Self::pass(db, batch.pass)?;
        let geometry = db.geometry(batch.geometry).ok_or(ResolveError::UnknownGeometry(batch.geometry))?;
        let binding = match batch.binding {
            Some(id) => Some(db.binding(id).ok_or(ResolveError::UnknownBinding(id))?),
            None => None,
        };
        let sources = [
            pass.versions.structure,
            geometry.versions.structure,
            binding.map_or(SeqPos::ORIGIN, |b| b.versions.structure),
        ];
        let key = CacheKey::new([
            Identity::of(batch.pass),
            Identity::of(batch.geometry),
            batch.binding.map_or(Identity::NONE, Identity::of),
        ]);
        if let Some(action) = self.inputs.get(&key, &sources) {
            return Ok(action);
        }

        let mut bindings = Vec::with_capacity(pass.program.attributes.len());
        for attribute in &pass.program.attributes {
            let remap = binding.and_then(|b| b.vertex_inputs.iter().find(|r| r.semantic == attribute.semantic));
            let (semantic, set) = match remap {
                Some(remap) => (remap.input_semantic.as_str(), Some(remap.input_set)),
                None => (attribute.semantic.as_str(), attribute.set),
            };
            let input = geometry.vertex_input(semantic, set).ok_or_else(|| ResolveError::MissingSemantic {
                pass: batch.pass,
                geometry: batch.geometry,
                semantic: semantic.to_string(),
            })?;
            let source = db.source(input.source).ok_or(ResolveError::UnknownSource(input.source))?;
            bindings.push(InputBinding {
                symbol: attribute.symbol.clone(),
                semantic: input.semantic.clone(),
                set: input.set,
                source: input.source,
                stride: source.stride,
            });
        }
        let action = SetInputs { pass: batch.pass, geometry: batch.geometry, bindings };
        Ok(self.inputs.insert(key, Arc::new(action)))
    }

    // ------------------------------------------------------------------
    // Draws

    fn gpu_primitive(topology: Topology, primitive_override: Option<PrimitiveOverride>) -> GpuPrimitive {
        match primitive_override {
            Some(PrimitiveOverride::Patches { vertices }) => GpuPrimitive::Patches { vertices },
            Some(PrimitiveOverride::Points) => GpuPrimitive::Points,
            None => match topology {
                Topology::Points => GpuPrimitive::Points,
                Topology::Lines => GpuPrimitive::Lines,
                Topology::LineStrip => GpuPrimitive::LineStrip,
                Topology::Triangles => GpuPrimitive::Triangles,
                Topology::TriangleStrip => GpuPrimitive::TriangleStrip,
                Topology::TriangleFan => GpuPrimitive::TriangleFan,
            },
        }
    }

    /// The draw or indexed draw of the batch's primitive set
    ///
    /// With culling enabled and a camera in `view`, the draw carries the
    /// bounding-box visibility flag of the geometry at `local` seen from that
    /// camera. The builtin full-screen quad is never culled.
    pub fn draw(
        &mut self,
        db: &SceneDatabase,
        cache: &mut TransformCache,
        batch: &Batch,
        view: &ViewCoords,
        local: &LocalCoords,
    ) -> Result<RenderAction, ResolveError> {
        let pass = Self::pass(db, batch.pass)?;
        let geometry = db.geometry(batch.geometry).ok_or(ResolveError::UnknownGeometry(batch.geometry))?;
        let cull = self.frustum_culling && view.camera.is_some() && batch.geometry != db.fullscreen_quad();
        let (view_index, local_index) = if cull {
            (self.view_entry(view).0, self.local_entry(local).0)
        } else {
            (0, 0)
        };
        let key = CacheKey::new([
            Identity::of(batch.geometry),
            Identity::tag(batch.primitive as u64),
            Identity::of(batch.pass),
            if cull { Identity::tag(u64::from(view_index)) } else { Identity::NONE },
            if cull { Identity::tag(u64::from(local_index)) } else { Identity::NONE },
        ]);
        if let Some(action) = self.draws.get(&key, &[pass.versions.structure, geometry.versions.structure]) {
            return Ok(action);
        }

        let set = geometry
            .primitives
            .get(batch.primitive)
            .ok_or(ResolveError::NoVertices(batch.geometry))?;
        let position = geometry
            .vertex_input("POSITION", None)
            .ok_or(ResolveError::NoVertices(batch.geometry))?;
        let vertices = db.source(position.source).ok_or(ResolveError::UnknownSource(position.source))?;
        let primitive = Self::gpu_primitive(set.topology, pass.primitive_override);
        let wanted = set.topology.element_count(set.count);
        let visible: Option<ValueRef> = if cull {
            Some(cache.check_bounding_box(db, view, local, batch.geometry)?)
        } else {
            None
        };

        let action = match set.indices {
            Some(id) => {
                let indices = db.source(id).ok_or(ResolveError::UnknownSource(id))?;
                let index_type = match indices.data {
                    SourceData::UShort(_) => IndexType::U16,
                    SourceData::UInt(_) => IndexType::U32,
                    _ => return Err(ResolveError::IndexType(id)),
                };
                let available = indices.data.len() as u32;
                if available < wanted {
                    log::warn!(
                        "Geometry '{}' wants {} indices but {:?} holds {}; drawing what is there",
                        geometry.name,
                        wanted,
                        id,
                        available
                    );
                }
                RenderAction::DrawIndexed(Arc::new(DrawIndexed {
                    geometry: batch.geometry,
                    primitive,
                    index_count: wanted.min(available),
                    indices: id,
                    index_type,
                    visible,
                }))
            }
            None => {
                let available = vertices.count() as u32;
                if available < wanted {
                    log::warn!(
                        "Geometry '{}' wants {} vertices but holds {}; drawing what is there",
                        geometry.name,
                        wanted,
                        available
                    );
                }
                RenderAction::Draw(Arc::new(Draw {
                    geometry: batch.geometry,
                    primitive,
                    vertex_count: wanted.min(available),
                    visible,
                }))
            }
        };
        Ok(self.draws.insert(key, action))
    }

    /// Number of memoized persistent actions, for diagnostics
    pub fn cached_actions(&self) -> usize {
        self.passes.len()
            + self.raster.len()
            + self.pixel_ops.len()
            + self.fb_ctrl.len()
            + self.framebuffers.len()
            + self.samplers.len()
            + self.inputs.len()
    }
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}
