//! # Render List Builder
//!
//! Walks a visual scene and records the flat action sequence an executor
//! replays. Every state category remembers the last action pushed; a new
//! action of the same category is only recorded when it is a different
//! resolved record, so runs of batches sharing a pass, inputs or state
//! produce one state change. Uniforms are the exception and are recorded
//! before every draw.
//!
//! The list is rebuilt wholesale whenever the visual scene changes or the
//! scene database records a structural edit.

use std::collections::HashMap;
use std::ops::Index;
use std::sync::Arc;

use crate::config::RenderListConfig;
use crate::foundation::version::SeqPos;
use crate::render::action::{ActionKind, RenderAction, SetFramebuffer};
use crate::render::error::ResolveError;
use crate::render::resolver::{layer_included, select_technique, Batch, Resolver, TechniqueChoice};
use crate::render::transform_cache::{LocalCoords, NodePath, TransformCache, ViewCoords};
use crate::scene::{
    DrawMode, GeometryInstance, InstanceMaterial, MaterialId, NodeId, PassId, ProfileId,
    RenderItem, SceneDatabase, VisualSceneId,
};

/// Counters of the last build
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildStats {
    /// Draws recorded
    pub render_items: usize,
    /// Batches dropped because they failed to resolve
    pub skipped_batches: usize,
}

/// Material forced onto every batch of a traversal
#[derive(Debug, Clone)]
struct MaterialOverride {
    material: MaterialId,
    profile: ProfileId,
    pass: PassId,
}

/// Per render item traversal settings
#[derive(Debug, Clone)]
struct Traversal {
    mask: u64,
    view: ViewCoords,
    material: Option<MaterialOverride>,
    target: Option<Arc<SetFramebuffer>>,
}

/// Every action one batch needs, resolved before any is recorded
struct ItemActions {
    framebuffer: RenderAction,
    raster: RenderAction,
    pixel_ops: RenderAction,
    fb_ctrl: RenderAction,
    local: RenderAction,
    pass: RenderAction,
    samplers: Option<RenderAction>,
    uniforms: RenderAction,
    inputs: RenderAction,
    draw: RenderAction,
}

/// Ordered render actions for one visual scene
#[derive(Debug)]
pub struct RenderList {
    actions: Vec<RenderAction>,
    visual_scene: Option<VisualSceneId>,
    built_at: SeqPos,
    resolver: Resolver,
    current: HashMap<ActionKind, RenderAction>,
    stats: BuildStats,
}

impl RenderList {
    /// Empty list with default settings
    pub fn new() -> Self {
        Self::with_config(&RenderListConfig::default())
    }

    /// Empty list with the given settings
    pub fn with_config(config: &RenderListConfig) -> Self {
        Self {
            actions: Vec::new(),
            visual_scene: None,
            built_at: SeqPos::INVALID,
            resolver: Resolver::with_config(config),
            current: HashMap::new(),
            stats: BuildStats::default(),
        }
    }

    /// Recorded actions in execution order
    pub fn actions(&self) -> &[RenderAction] {
        &self.actions
    }

    /// Number of recorded actions
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Whether nothing is recorded
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Visual scene the list was last built for
    pub fn visual_scene(&self) -> Option<VisualSceneId> {
        self.visual_scene
    }

    /// Stamp of the last rebuild
    pub fn built_at(&self) -> SeqPos {
        self.built_at
    }

    /// Counters of the last rebuild
    pub fn stats(&self) -> BuildStats {
        self.stats
    }

    /// The resolver backing this list
    pub fn resolver(&mut self) -> &mut Resolver {
        &mut self.resolver
    }

    /// Forget the recorded actions; the next build always rebuilds
    pub fn clear(&mut self) {
        self.actions.clear();
        self.current.clear();
        self.visual_scene = None;
        self.built_at = SeqPos::INVALID;
        self.stats = BuildStats::default();
    }

    /// Bring the list up to date with `visual_scene`
    ///
    /// Returns true when the list was rebuilt. A rebuild purges `cache`, so
    /// value references from earlier builds become stale.
    pub fn build(&mut self, db: &SceneDatabase, cache: &mut TransformCache, visual_scene: VisualSceneId) -> bool {
        if self.visual_scene == Some(visual_scene) && self.built_at.as_recent_as(&db.versions().structure) {
            return false;
        }
        let Some(scene) = db.visual_scene(visual_scene) else {
            log::warn!("Render list build: unknown visual scene {:?}", visual_scene);
            self.clear();
            return false;
        };

        self.actions.clear();
        self.current.clear();
        self.stats = BuildStats::default();
        cache.purge();
        self.resolver.begin_build(db, scene.root);

        if scene.evaluate_scenes.is_empty() {
            self.render_item(db, cache, visual_scene, None, &RenderItem::default());
        }
        for (block_index, block) in scene.evaluate_scenes.iter().enumerate() {
            if !block.enabled {
                log::trace!("Skipping disabled evaluate scene '{}'", block.name);
                continue;
            }
            for (item_index, item) in block.render_items.iter().enumerate() {
                self.render_item(db, cache, visual_scene, Some((block_index, item_index)), item);
            }
        }
        self.restore_defaults();

        self.visual_scene = Some(visual_scene);
        self.built_at = SeqPos::new();
        log::debug!(
            "Render list for '{}' built: {} actions, {} draws, {} batches skipped",
            scene.name,
            self.actions.len(),
            self.stats.render_items,
            self.stats.skipped_batches
        );
        true
    }

    fn push_if_changed(&mut self, action: RenderAction) {
        let kind = action.kind();
        if self.current.get(&kind).is_some_and(|current| current.same_as(&action)) {
            return;
        }
        self.push(action);
    }

    fn push(&mut self, action: RenderAction) {
        self.current.insert(action.kind(), action.clone());
        self.actions.push(action);
    }

    /// Append the default state for every category left in a non-default state
    fn restore_defaults(&mut self) {
        if self.actions.is_empty() {
            return;
        }
        let defaults = self.resolver.defaults().clone();
        let restore = [
            RenderAction::SetFramebuffer(defaults.framebuffer),
            RenderAction::SetRaster(defaults.raster),
            RenderAction::SetPixelOps(defaults.pixel_ops),
            RenderAction::SetFbCtrl(defaults.fb_ctrl),
        ];
        for action in restore {
            if self.current.get(&action.kind()).is_some_and(|current| !current.same_as(&action)) {
                self.push(action);
            }
        }
    }

    // ------------------------------------------------------------------
    // Render items

    fn render_item(
        &mut self,
        db: &SceneDatabase,
        cache: &mut TransformCache,
        visual_scene: VisualSceneId,
        position: Option<(usize, usize)>,
        item: &RenderItem,
    ) {
        let Some(root) = db.visual_scene(visual_scene).map(|scene| scene.root) else {
            return;
        };
        let mask = match position {
            Some((block, index)) => match self.resolver.render_item_mask(db, visual_scene, block, index, item) {
                Ok(mask) => mask,
                Err(err) => {
                    log::warn!("Render item skipped: {}", err);
                    return;
                }
            },
            None => 0,
        };

        let view = match item.camera_node {
            Some(camera_node) => {
                let Some(path) = self.resolver.find_node_path(db, root, camera_node) else {
                    log::warn!("Render item skipped: camera node {:?} is not reachable from {:?}", camera_node, root);
                    return;
                };
                let camera = db.node(camera_node).and_then(|node| node.instance_cameras.first().copied());
                if camera.is_none() {
                    log::debug!("Camera node {:?} instances no camera; using identity projection", camera_node);
                }
                ViewCoords { camera, path }
            }
            None => ViewCoords::default(),
        };
        if view.camera.is_some() {
            let action = RenderAction::SetViewCoords(self.resolver.view_coords(&view));
            self.push_if_changed(action);
        }

        let traversal = Traversal { mask, view, material: None, target: None };
        match &item.instance_material {
            None => self.traverse(db, cache, root, &traversal),
            Some(instance) => self.instance_material(db, cache, root, traversal, instance),
        }
    }

    /// Run a render item that names its own material
    fn instance_material(
        &mut self,
        db: &SceneDatabase,
        cache: &mut TransformCache,
        root: NodeId,
        traversal: Traversal,
        instance: &InstanceMaterial,
    ) {
        let choice = match select_technique(db, instance.material, instance.technique.as_deref(), self.resolver.active_profiles()) {
            Ok(choice) => choice,
            Err(err) => {
                log::warn!("Instance material {:?} skipped: {}", instance.material, err);
                self.stats.skipped_batches += 1;
                return;
            }
        };
        let passes = match Self::instance_passes(db, &choice, instance.pass.as_deref()) {
            Ok(passes) => passes,
            Err(err) => {
                log::warn!("Instance material {:?} skipped: {}", instance.material, err);
                self.stats.skipped_batches += 1;
                return;
            }
        };

        for pass in passes {
            let Some(draw) = db.pass(pass).map(|p| p.draw) else {
                log::warn!("Instance material {:?} skipped: unknown pass {:?}", instance.material, pass);
                self.stats.skipped_batches += 1;
                continue;
            };
            let batch = Batch {
                material: instance.material,
                profile: choice.profile,
                pass,
                geometry: db.fullscreen_quad(),
                primitive: 0,
                binding: None,
            };
            match draw {
                DrawMode::Geometry | DrawMode::SceneGeometry => {
                    let material = MaterialOverride { material: instance.material, profile: choice.profile, pass };
                    let traversal = Traversal { material: Some(material), ..traversal.clone() };
                    self.traverse(db, cache, root, &traversal);
                }
                DrawMode::SceneImage => {
                    let target = self
                        .resolver
                        .resolve_params(db, &batch)
                        .and_then(|params| self.resolver.set_render_target(db, &batch, &params));
                    match target {
                        Ok(target) => {
                            let traversal = Traversal { target: Some(target), ..traversal.clone() };
                            self.traverse(db, cache, root, &traversal);
                        }
                        Err(err) => {
                            log::warn!("Scene image pass {:?} skipped: {}", pass, err);
                            self.stats.skipped_batches += 1;
                        }
                    }
                }
                DrawMode::FullScreenQuad | DrawMode::FullScreenQuadPlusHalfPixel => {
                    self.add_render_item(db, cache, &batch, &traversal, &LocalCoords::default());
                }
            }
        }
    }

    fn instance_passes(db: &SceneDatabase, choice: &TechniqueChoice, pass: Option<&str>) -> Result<Vec<PassId>, ResolveError> {
        match pass {
            Some(sid) => choice
                .passes
                .iter()
                .copied()
                .find(|id| db.pass(*id).is_some_and(|p| p.sid == sid))
                .map(|id| vec![id])
                .ok_or_else(|| ResolveError::NoSuchPass { technique: choice.sid.clone(), pass: sid.to_string() }),
            None if choice.common => Ok(choice.passes.iter().copied().take(1).collect()),
            None => Ok(choice.passes.clone()),
        }
    }

    // ------------------------------------------------------------------
    // Hierarchy traversal

    fn traverse(&mut self, db: &SceneDatabase, cache: &mut TransformCache, root: NodeId, traversal: &Traversal) {
        let mut pairs = Vec::new();
        let mut instancees = Vec::new();
        self.visit(db, cache, root, root, &mut pairs, &mut instancees, traversal);
    }

    fn visit(
        &mut self,
        db: &SceneDatabase,
        cache: &mut TransformCache,
        node: NodeId,
        branch_root: NodeId,
        pairs: &mut Vec<(NodeId, NodeId)>,
        instancees: &mut Vec<NodeId>,
        traversal: &Traversal,
    ) {
        let Some(entity) = db.node(node) else {
            log::warn!("Traversal: unknown node {:?}", node);
            return;
        };
        match self.resolver.node_layer_mask(db, node) {
            Ok(mask) if layer_included(mask, traversal.mask) => {}
            Ok(_) => return,
            Err(err) => {
                log::warn!("Traversal: {}", err);
                return;
            }
        }
        if !entity.profiles.intersects(self.resolver.active_profiles()) {
            log::trace!("Node '{}' excluded by profile mask", entity.name);
            return;
        }

        if !entity.instance_geometries.is_empty() {
            pairs.push((branch_root, node));
            let local = LocalCoords { path: NodePath::from_pairs(pairs) };
            pairs.pop();
            for instance in &entity.instance_geometries {
                self.geometry_instance(db, cache, instance, &local, traversal);
            }
        }

        for &instancee in &entity.instance_nodes {
            if instancees.contains(&instancee) {
                log::warn!("Node instancing cycle: {:?} instances {:?} which is already being drawn", node, instancee);
                continue;
            }
            pairs.push((branch_root, node));
            instancees.push(instancee);
            self.visit(db, cache, instancee, instancee, pairs, instancees, traversal);
            instancees.pop();
            pairs.pop();
        }

        for &child in &entity.children {
            self.visit(db, cache, child, branch_root, pairs, instancees, traversal);
        }
    }

    fn geometry_instance(
        &mut self,
        db: &SceneDatabase,
        cache: &mut TransformCache,
        instance: &GeometryInstance,
        local: &LocalCoords,
        traversal: &Traversal,
    ) {
        let Some(geometry) = db.geometry(instance.geometry) else {
            log::warn!("Geometry instance skipped: unknown geometry {:?}", instance.geometry);
            self.stats.skipped_batches += 1;
            return;
        };

        for (primitive, set) in geometry.primitives.iter().enumerate() {
            if let Some(material) = &traversal.material {
                let batch = Batch {
                    material: material.material,
                    profile: material.profile,
                    pass: material.pass,
                    geometry: instance.geometry,
                    primitive,
                    binding: None,
                };
                self.add_render_item(db, cache, &batch, traversal, local);
                continue;
            }

            let binding = instance
                .bindings
                .iter()
                .copied()
                .find(|id| db.binding(*id).is_some_and(|b| b.symbol == set.material_symbol));
            let Some((binding, material)) = binding.and_then(|id| db.binding(id).map(|b| (id, b.material))) else {
                log::warn!(
                    "Primitive set {} of geometry '{}' skipped: {}",
                    primitive,
                    geometry.name,
                    ResolveError::UnboundSymbol(set.material_symbol.clone())
                );
                self.stats.skipped_batches += 1;
                continue;
            };
            let choice = match select_technique(db, material, None, self.resolver.active_profiles()) {
                Ok(choice) => choice,
                Err(err) => {
                    log::warn!("Primitive set {} of geometry '{}' skipped: {}", primitive, geometry.name, err);
                    self.stats.skipped_batches += 1;
                    continue;
                }
            };
            let passes = if choice.common { &choice.passes[..choice.passes.len().min(1)] } else { &choice.passes[..] };
            for &pass in passes {
                let batch = Batch {
                    material,
                    profile: choice.profile,
                    pass,
                    geometry: instance.geometry,
                    primitive,
                    binding: Some(binding),
                };
                self.add_render_item(db, cache, &batch, traversal, local);
            }
        }
    }

    // ------------------------------------------------------------------
    // Batches

    fn add_render_item(
        &mut self,
        db: &SceneDatabase,
        cache: &mut TransformCache,
        batch: &Batch,
        traversal: &Traversal,
        local: &LocalCoords,
    ) {
        let actions = match self.resolve_item(db, cache, batch, traversal, local) {
            Ok(actions) => actions,
            Err(err) => {
                log::warn!(
                    "Batch skipped (material {:?}, pass {:?}, geometry {:?}): {}",
                    batch.material,
                    batch.pass,
                    batch.geometry,
                    err
                );
                self.stats.skipped_batches += 1;
                return;
            }
        };

        self.push_if_changed(actions.framebuffer);
        self.push_if_changed(actions.raster);
        self.push_if_changed(actions.pixel_ops);
        self.push_if_changed(actions.fb_ctrl);
        self.push_if_changed(actions.local);
        self.push_if_changed(actions.pass);
        if let Some(samplers) = actions.samplers {
            self.push_if_changed(samplers);
        }
        self.push(actions.uniforms);
        self.push_if_changed(actions.inputs);
        self.push(actions.draw);
        self.stats.render_items += 1;
    }

    fn resolve_item(
        &mut self,
        db: &SceneDatabase,
        cache: &mut TransformCache,
        batch: &Batch,
        traversal: &Traversal,
        local: &LocalCoords,
    ) -> Result<ItemActions, ResolveError> {
        let resolver = &mut self.resolver;
        let params = resolver.resolve_params(db, batch)?;
        let framebuffer = match &traversal.target {
            Some(target) => target.clone(),
            None => resolver.set_render_target(db, batch, &params)?,
        };
        let raster = resolver.set_raster(db, batch, &params)?;
        let pixel_ops = resolver.set_pixel_ops(db, batch, &params)?;
        let fb_ctrl = resolver.set_fb_ctrl(db, batch, &params)?;
        let pass = resolver.set_pass(db, batch.pass)?;
        let samplers = resolver.set_samplers(db, batch, &params)?;
        let uniforms = resolver.set_uniforms(
            db,
            cache,
            batch,
            &params,
            samplers.as_deref(),
            &traversal.view,
            local,
            framebuffer.first_color_target(),
        )?;
        let inputs = resolver.set_inputs(db, batch)?;
        let draw = resolver.draw(db, cache, batch, &traversal.view, local)?;
        let local = resolver.local_coords(local);

        Ok(ItemActions {
            framebuffer: RenderAction::SetFramebuffer(framebuffer),
            raster: RenderAction::SetRaster(raster),
            pixel_ops: RenderAction::SetPixelOps(pixel_ops),
            fb_ctrl: RenderAction::SetFbCtrl(fb_ctrl),
            local: RenderAction::SetLocalCoords(local),
            pass: RenderAction::SetPass(pass),
            samplers: samplers.map(RenderAction::SetSamplers),
            uniforms: RenderAction::SetUniforms(uniforms),
            inputs: RenderAction::SetInputs(inputs),
            draw,
        })
    }
}

impl Default for RenderList {
    fn default() -> Self {
        Self::new()
    }
}

impl Index<usize> for RenderList {
    type Output = RenderAction;

    fn index(&self, index: usize) -> &Self::Output {
        &self.actions[index]
    }
}
