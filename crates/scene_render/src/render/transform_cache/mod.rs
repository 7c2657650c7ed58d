//! # Transform Cache
//!
//! Memoized derived values (matrices, vectors, scalars, visibility flags)
//! computed from scene entities and from each other, refreshed once per frame
//! by [`TransformCache::update`].
//!
//! ## Passes
//!
//! ```text
//! pass 1   camera projections, node transforms, light and target parameters
//!   ↓
//! pass 2   branches: products of pass-1 node transforms along a parent chain
//!   ↓
//! pass 3   paths: products of branches across node instancing boundaries
//!   ↓
//! pass 4/5 composites over earlier passes, in dependency waves
//! ```
//!
//! Accessors are get-or-create: they return a [`ValueRef`]/[`MatrixRef`]
//! naming a slot, creating the item on first use. A new item is stale until
//! the next `update()`. References stay valid until [`TransformCache::purge`];
//! afterwards they are rejected with [`CacheError::StaleHandle`].

mod coords;
mod items;
mod parallel;
mod semantics;

use std::collections::HashMap;

use crate::cache::{CacheKey, CacheLut, Identity};
use crate::config::TransformCacheConfig;
use crate::foundation::math::Mat4;
use crate::foundation::version::SeqPos;
use crate::render::error::CacheError;
use crate::scene::{CameraId, GeometryId, NodeId, SceneDatabase};

pub use coords::{LightInstance, LocalCoords, NodePath, ViewCoords};
pub use items::{MatrixRef, Value, ValueRef, SCENE_PATH_MAX};
pub use parallel::{StageStats, UpdateStage, UpdateStats};
pub use semantics::{LightSemantic, RuntimeSemantic, SemanticContext};

use items::{
    CompositeItem, CompositeOp, ConstId, FrameInfo, LeafItem, LeafSource, ProductItem, Slot,
    SlotReader,
};
use parallel::PassRunner;

/// Multi-pass cache of derived transform values
#[derive(Debug)]
pub struct TransformCache {
    epoch: u64,
    leaves: Vec<LeafItem>,
    branches: Vec<ProductItem>,
    paths: Vec<ProductItem>,
    waves: Vec<Vec<CompositeItem>>,
    leaf_lut: HashMap<LeafSource, u32>,
    branch_lut: CacheLut<3>,
    path_lut: HashMap<(NodePath, bool), u32>,
    composite_lut: CacheLut<6>,
    composite_slots: Vec<Slot>,
    path_ids: HashMap<NodePath, u32>,
    semantic_lut: CacheLut<7>,
    semantic_refs: Vec<ValueRef>,
    frame: FrameInfo,
    runner: PassRunner,
    stats: UpdateStats,
}

impl TransformCache {
    /// Cache that evaluates every pass on the calling thread
    pub fn new() -> Self {
        Self::with_runner(PassRunner::inline())
    }

    /// Cache configured for optional parallel evaluation
    pub fn with_config(config: &TransformCacheConfig) -> Result<Self, CacheError> {
        Ok(Self::with_runner(PassRunner::new(config)?))
    }

    fn with_runner(runner: PassRunner) -> Self {
        Self {
            epoch: 1,
            leaves: Vec::new(),
            branches: Vec::new(),
            paths: Vec::new(),
            waves: Vec::new(),
            leaf_lut: HashMap::new(),
            branch_lut: CacheLut::new(),
            path_lut: HashMap::new(),
            composite_lut: CacheLut::new(),
            composite_slots: Vec::new(),
            path_ids: HashMap::new(),
            semantic_lut: CacheLut::new(),
            semantic_refs: Vec::new(),
            frame: FrameInfo::default(),
            runner,
            stats: UpdateStats::default(),
        }
    }

    /// Current purge epoch
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Number of live items across all passes
    pub fn len(&self) -> usize {
        self.leaves.len()
            + self.branches.len()
            + self.paths.len()
            + self.waves.iter().map(Vec::len).sum::<usize>()
    }

    /// Whether the cache holds no items
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Statistics of the last update
    pub fn stats(&self) -> &UpdateStats {
        &self.stats
    }

    fn reference(&self, slot: Slot) -> ValueRef {
        ValueRef { epoch: self.epoch, slot }
    }

    fn matrix_reference(&self, slot: Slot) -> MatrixRef {
        MatrixRef(self.reference(slot))
    }

    fn resolve(&self, reference: ValueRef) -> Result<Slot, CacheError> {
        if reference.epoch == self.epoch {
            Ok(reference.slot)
        } else {
            Err(CacheError::StaleHandle { epoch: reference.epoch, current: self.epoch })
        }
    }

    fn reader(&self) -> SlotReader<'_> {
        SlotReader {
            leaves: &self.leaves,
            branches: &self.branches,
            paths: &self.paths,
            waves: &self.waves,
        }
    }

    // ------------------------------------------------------------------
    // Pass 1

    fn leaf(&mut self, source: LeafSource) -> Slot {
        if let Some(&index) = self.leaf_lut.get(&source) {
            return Slot::Leaf(index);
        }
        let index = self.leaves.len() as u32;
        self.leaves.push(LeafItem::new(source));
        self.leaf_lut.insert(source, index);
        Slot::Leaf(index)
    }

    fn constant(&self, id: ConstId) -> MatrixRef {
        self.matrix_reference(Slot::Constant(id))
    }

    /// Identity matrix constant
    pub fn identity(&self) -> MatrixRef {
        self.constant(ConstId::Identity)
    }

    /// Projection matrix of a camera for the current target aspect
    pub fn camera_projection_matrix(
        &mut self,
        db: &SceneDatabase,
        camera: CameraId,
    ) -> Result<MatrixRef, CacheError> {
        db.camera(camera).ok_or(CacheError::UnknownCamera(camera))?;
        let slot = self.leaf(LeafSource::Projection(camera));
        Ok(self.matrix_reference(slot))
    }

    /// Inverse projection matrix of a camera
    pub fn camera_projection_matrix_inverse(
        &mut self,
        db: &SceneDatabase,
        camera: CameraId,
    ) -> Result<MatrixRef, CacheError> {
        db.camera(camera).ok_or(CacheError::UnknownCamera(camera))?;
        let slot = self.leaf(LeafSource::ProjectionInverse(camera));
        Ok(self.matrix_reference(slot))
    }

    fn node_slot(&mut self, db: &SceneDatabase, node: NodeId, inverse: bool) -> Result<Slot, CacheError> {
        let source = if inverse { LeafSource::TransformInverse(node) } else { LeafSource::Transform(node) };
        if let Some(&index) = self.leaf_lut.get(&source) {
            return Ok(Slot::Leaf(index));
        }
        let entity = db.node(node).ok_or(CacheError::UnknownNode(node))?;
        entity.local_matrix()?;
        Ok(self.leaf(source))
    }

    /// Local transform of a node, composed from its transform stack
    pub fn node_transform_matrix(&mut self, db: &SceneDatabase, node: NodeId) -> Result<MatrixRef, CacheError> {
        let slot = self.node_slot(db, node, false)?;
        Ok(self.matrix_reference(slot))
    }

    /// Inverse local transform of a node
    pub fn node_transform_inverse_matrix(
        &mut self,
        db: &SceneDatabase,
        node: NodeId,
    ) -> Result<MatrixRef, CacheError> {
        let slot = self.node_slot(db, node, true)?;
        Ok(self.matrix_reference(slot))
    }

    pub(crate) fn leaf_value(&mut self, source: LeafSource) -> ValueRef {
        let slot = self.leaf(source);
        self.reference(slot)
    }

    // ------------------------------------------------------------------
    // Pass 2

    fn branch_slot(
        &mut self,
        db: &SceneDatabase,
        root: NodeId,
        leaf: NodeId,
        inverse: bool,
    ) -> Result<Slot, CacheError> {
        let key = CacheKey::new([Identity::of(root), Identity::of(leaf), Identity::tag(u64::from(inverse))]);
        if let Some(index) = self.branch_lut.find(&key) {
            return Ok(Slot::Branch(index as u32));
        }

        // Leaf first, walking up the parent chain
        let mut chain = Vec::new();
        let mut current = Some(leaf);
        loop {
            let Some(id) = current else {
                return Err(CacheError::NotABranch { root, leaf });
            };
            let node = db.node(id).ok_or(CacheError::UnknownNode(id))?;
            chain.push(id);
            if id == root {
                break;
            }
            current = node.parent;
        }
        if chain.len() > SCENE_PATH_MAX {
            log::error!(
                "Branch {:?} -> {:?} spans {} nodes, truncating to {}",
                root,
                leaf,
                chain.len(),
                SCENE_PATH_MAX
            );
            chain.truncate(SCENE_PATH_MAX);
        }

        let mut operands = Vec::with_capacity(chain.len());
        if inverse {
            for id in &chain {
                operands.push(self.node_slot(db, *id, true)?);
            }
        } else {
            for id in chain.iter().rev() {
                operands.push(self.node_slot(db, *id, false)?);
            }
        }

        let index = self.branches.len();
        self.branches.push(ProductItem::new(operands));
        self.branch_lut.insert(key, index);
        Ok(Slot::Branch(index as u32))
    }

    /// Transform from `leaf`'s space to `root`'s parent space, `root` inclusive
    pub fn branch_transform_matrix(
        &mut self,
        db: &SceneDatabase,
        root: NodeId,
        leaf: NodeId,
    ) -> Result<MatrixRef, CacheError> {
        let slot = self.branch_slot(db, root, leaf, false)?;
        Ok(self.matrix_reference(slot))
    }

    /// Inverse of [`Self::branch_transform_matrix`]
    pub fn branch_transform_inverse_matrix(
        &mut self,
        db: &SceneDatabase,
        root: NodeId,
        leaf: NodeId,
    ) -> Result<MatrixRef, CacheError> {
        let slot = self.branch_slot(db, root, leaf, true)?;
        Ok(self.matrix_reference(slot))
    }

    // ------------------------------------------------------------------
    // Pass 3

    fn path_slot(&mut self, db: &SceneDatabase, path: &NodePath, inverse: bool) -> Result<Slot, CacheError> {
        let key = (path.clone(), inverse);
        if let Some(&index) = self.path_lut.get(&key) {
            return Ok(Slot::Path(index));
        }

        let mut pairs: Vec<(NodeId, NodeId)> = path.pairs().collect();
        if pairs.len() > SCENE_PATH_MAX {
            log::error!(
                "Node path of {} branches exceeds {}, truncating",
                pairs.len(),
                SCENE_PATH_MAX
            );
            pairs.truncate(SCENE_PATH_MAX);
        }

        let mut operands = Vec::with_capacity(pairs.len());
        if inverse {
            for (root, leaf) in pairs.iter().rev() {
                operands.push(self.branch_slot(db, *root, *leaf, true)?);
            }
        } else {
            for (root, leaf) in &pairs {
                operands.push(self.branch_slot(db, *root, *leaf, false)?);
            }
        }

        let index = self.paths.len() as u32;
        self.paths.push(ProductItem::new(operands));
        self.path_lut.insert(key, index);
        Ok(Slot::Path(index))
    }

    /// World transform along a node path
    pub fn path_transform_matrix(&mut self, db: &SceneDatabase, path: &NodePath) -> Result<MatrixRef, CacheError> {
        let slot = self.path_slot(db, path, false)?;
        Ok(self.matrix_reference(slot))
    }

    /// Inverse world transform along a node path
    pub fn path_transform_inverse_matrix(
        &mut self,
        db: &SceneDatabase,
        path: &NodePath,
    ) -> Result<MatrixRef, CacheError> {
        let slot = self.path_slot(db, path, true)?;
        Ok(self.matrix_reference(slot))
    }

    fn path_id(&mut self, path: &NodePath) -> Identity {
        let next = self.path_ids.len() as u32;
        let id = *self.path_ids.entry(path.clone()).or_insert(next);
        Identity::tag(u64::from(id) + 1)
    }

    fn find_path_id(&self, path: &NodePath) -> Option<Identity> {
        self.path_ids.get(path).map(|id| Identity::tag(u64::from(*id) + 1))
    }

    // ------------------------------------------------------------------
    // Passes 4 and 5

    fn composite(&mut self, op: CompositeOp, operands: Vec<Slot>) -> Slot {
        let mut ids = [Identity::NONE; 6];
        ids[0] = Identity::tag(op.tag());
        if let CompositeOp::BoundingBox(geometry) = op {
            ids[1] = Identity::of(geometry);
        }
        for (id, slot) in ids[2..].iter_mut().zip(&operands) {
            *id = slot.identity();
        }
        let key = CacheKey::new(ids);
        if let Some(index) = self.composite_lut.find(&key) {
            if let Some(slot) = self.composite_slots.get(index) {
                return *slot;
            }
        }

        let wave = operands.iter().map(|s| s.dependent_wave()).max().unwrap_or(0);
        if self.waves.len() <= wave as usize {
            self.waves.resize_with(wave as usize + 1, Vec::new);
        }
        let items = &mut self.waves[wave as usize];
        let slot = Slot::Composite { wave, index: items.len() as u32 };
        items.push(CompositeItem::new(op, operands));

        self.composite_lut.insert(key, self.composite_slots.len());
        self.composite_slots.push(slot);
        slot
    }

    /// Product `m0 · m1 · m2 · m3`; absent trailing operands are ignored
    pub fn matrix_composition(
        &mut self,
        m0: MatrixRef,
        m1: MatrixRef,
        m2: Option<MatrixRef>,
        m3: Option<MatrixRef>,
    ) -> Result<MatrixRef, CacheError> {
        let mut operands = vec![self.resolve(m0.0)?, self.resolve(m1.0)?];
        for m in [m2, m3].into_iter().flatten() {
            operands.push(self.resolve(m.0)?);
        }
        let slot = self.composite(CompositeOp::Product, operands);
        Ok(self.matrix_reference(slot))
    }

    /// Transposed upper 3x3 block of `a · b`, as a homogeneous matrix
    pub fn matrix_product_upper3x3_transpose(
        &mut self,
        a: MatrixRef,
        b: MatrixRef,
    ) -> Result<MatrixRef, CacheError> {
        let operands = vec![self.resolve(a.0)?, self.resolve(b.0)?];
        let slot = self.composite(CompositeOp::Upper3x3Transpose, operands);
        Ok(self.matrix_reference(slot))
    }

    /// Transpose of `a`
    pub fn matrix_transpose(&mut self, a: MatrixRef) -> Result<MatrixRef, CacheError> {
        let operands = vec![self.resolve(a.0)?];
        let slot = self.composite(CompositeOp::Transpose, operands);
        Ok(self.matrix_reference(slot))
    }

    /// The point `(a · b) · (0, 0, 0, 1)`
    pub fn matrix_subset_postmultiply_origin(&mut self, a: MatrixRef, b: MatrixRef) -> Result<ValueRef, CacheError> {
        let operands = vec![self.resolve(a.0)?, self.resolve(b.0)?];
        let slot = self.composite(CompositeOp::PostmultiplyOrigin, operands);
        Ok(self.reference(slot))
    }

    /// The normalized axis `(a · b) · (0, 0, -1, 0)`
    pub fn matrix_subset_premultiply_z(&mut self, a: MatrixRef, b: MatrixRef) -> Result<ValueRef, CacheError> {
        let operands = vec![self.resolve(a.0)?, self.resolve(b.0)?];
        let slot = self.composite(CompositeOp::PremultiplyZ, operands);
        Ok(self.reference(slot))
    }

    /// Whether a geometry's bounding box may be visible from `view`
    ///
    /// Geometry without a bounding box is always reported visible.
    pub fn check_bounding_box(
        &mut self,
        db: &SceneDatabase,
        view: &ViewCoords,
        local: &LocalCoords,
        geometry: GeometryId,
    ) -> Result<ValueRef, CacheError> {
        db.geometry(geometry).ok_or(CacheError::UnknownGeometry(geometry))?;
        let projection = self.view_projection(db, view)?;
        let view_inverse = self.path_slot(db, &view.path, true)?;
        let world = self.path_slot(db, &local.path, false)?;
        let projection = self.resolve(projection.0)?;
        let slot = self.composite(CompositeOp::BoundingBox(geometry), vec![projection, view_inverse, world]);
        Ok(self.reference(slot))
    }

    /// Camera projection, or identity when the view has no camera
    fn view_projection(&mut self, db: &SceneDatabase, view: &ViewCoords) -> Result<MatrixRef, CacheError> {
        match view.camera {
            Some(camera) => self.camera_projection_matrix(db, camera),
            None => Ok(self.identity()),
        }
    }

    // ------------------------------------------------------------------
    // Reading and updating

    /// Current value behind a reference
    ///
    /// Items created since the last update hold a placeholder until then.
    pub fn value(&self, reference: ValueRef) -> Result<Value, CacheError> {
        let slot = self.resolve(reference)?;
        Ok(self.reader().read(slot).0)
    }

    /// Current matrix behind a matrix reference
    pub fn matrix(&self, reference: MatrixRef) -> Result<Mat4, CacheError> {
        match self.value(reference.0)? {
            Value::Matrix(m) => Ok(m),
            other => Err(CacheError::NotAMatrix { found: other.kind() }),
        }
    }

    /// Recompute every stale item, pass by pass
    ///
    /// `width` and `height` are the default framebuffer size; cameras without
    /// an explicit aspect ratio use it.
    pub fn update(&mut self, db: &SceneDatabase, width: u32, height: u32) {
        if width != self.frame.width || height != self.frame.height {
            self.frame = FrameInfo { width, height, stamp: SeqPos::new() };
        }
        let frame = self.frame;
        let mut stats = UpdateStats::default();

        stats.record(
            UpdateStage::ComputePass1,
            self.runner.run(&mut self.leaves, |item| item.refresh(db, &frame)),
        );

        let reader = SlotReader { leaves: &self.leaves, branches: &[], paths: &[], waves: &[] };
        stats.record(
            UpdateStage::ComputeBranch,
            self.runner.run(&mut self.branches, |item| item.refresh(&reader)),
        );

        let reader = SlotReader { leaves: &self.leaves, branches: &self.branches, paths: &[], waves: &[] };
        stats.record(
            UpdateStage::ComputePath,
            self.runner.run(&mut self.paths, |item| item.refresh(&reader)),
        );

        for wave in 0..self.waves.len() {
            let (done, rest) = self.waves.split_at_mut(wave);
            let Some(current) = rest.first_mut() else {
                break;
            };
            let reader = SlotReader {
                leaves: &self.leaves,
                branches: &self.branches,
                paths: &self.paths,
                waves: done,
            };
            stats.record(
                UpdateStage::ComputePass45,
                self.runner.run(current, |item| item.refresh(&reader, db)),
            );
        }

        log::trace!(
            "Transform cache update {}x{}: {} of {} items recomputed",
            width,
            height,
            stats.recomputed(),
            self.len()
        );
        self.stats = stats;
    }

    /// Discard every item; all outstanding references become stale
    pub fn purge(&mut self) {
        self.epoch += 1;
        self.leaves.clear();
        self.branches.clear();
        self.paths.clear();
        self.waves.clear();
        self.leaf_lut.clear();
        self.branch_lut.clear();
        self.path_lut.clear();
        self.composite_lut.clear();
        self.composite_slots.clear();
        self.path_ids.clear();
        self.semantic_lut.clear();
        self.semantic_refs.clear();
        self.stats = UpdateStats::default();
        log::debug!("Transform cache purged, now at epoch {}", self.epoch);
    }
}

impl Default for TransformCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{Aabb, Vec3};
    use crate::scene::{Camera, Edit, Geometry, Node, TransformElement, TransformError};
    use approx::assert_relative_eq;

    /// A parent chain of `len` nodes with mixed transforms, root first
    fn chain(db: &mut SceneDatabase, len: usize) -> Vec<NodeId> {
        let mut nodes = Vec::new();
        for i in 0..len {
            let f = i as f32;
            let node = db.add_node(
                Node::new(format!("n{i}"))
                    .with_transform(TransformElement::Translate(Vec3::new(0.1, 0.05, -0.1)))
                    .with_transform(TransformElement::Rotate { axis: Vec3::new(1.0, f, 0.5), degrees: 10.0 * f })
                    .with_transform(TransformElement::Scale(Vec3::new(1.01, 1.02, 1.0))),
            );
            if let Some(&parent) = nodes.last() {
                assert!(db.add_child(parent, node));
            }
            nodes.push(node);
        }
        nodes
    }

    #[test]
    fn test_branch_times_inverse_is_identity() {
        for len in [1, 2, 5, SCENE_PATH_MAX] {
            let mut db = SceneDatabase::new();
            let nodes = chain(&mut db, len);
            let (root, leaf) = (nodes[0], nodes[len - 1]);

            let mut cache = TransformCache::new();
            let forward = cache.branch_transform_matrix(&db, root, leaf).unwrap();
            let inverse = cache.branch_transform_inverse_matrix(&db, root, leaf).unwrap();
            cache.update(&db, 640, 480);

            let product = cache.matrix(forward).unwrap() * cache.matrix(inverse).unwrap();
            assert_relative_eq!(product, Mat4::identity(), epsilon = 1e-3);
        }
    }

    #[test]
    fn test_branch_composes_parent_first() {
        let mut db = SceneDatabase::new();
        let parent = db.add_node(Node::new("p").with_transform(TransformElement::Scale(Vec3::new(2.0, 2.0, 2.0))));
        let child = db.add_node(Node::new("c").with_transform(TransformElement::Translate(Vec3::x())));
        db.add_child(parent, child);

        let mut cache = TransformCache::new();
        let branch = cache.branch_transform_matrix(&db, parent, child).unwrap();
        cache.update(&db, 1, 1);
        let origin = cache.matrix(branch).unwrap() * crate::foundation::math::Vec4::new(0.0, 0.0, 0.0, 1.0);
        assert_relative_eq!(origin.x, 2.0);
    }

    #[test]
    fn test_branch_outside_hierarchy_is_rejected() {
        let mut db = SceneDatabase::new();
        let a = db.add_node(Node::new("a"));
        let b = db.add_node(Node::new("b"));
        let mut cache = TransformCache::new();
        assert!(matches!(
            cache.branch_transform_matrix(&db, a, b),
            Err(CacheError::NotABranch { .. })
        ));
    }

    #[test]
    fn test_overlong_branch_is_truncated_not_dropped() {
        let mut db = SceneDatabase::new();
        let nodes = chain(&mut db, SCENE_PATH_MAX + 3);
        let mut cache = TransformCache::new();
        let branch = cache.branch_transform_matrix(&db, nodes[0], nodes[nodes.len() - 1]);
        assert!(branch.is_ok());
        assert_eq!(cache.branches[0].operands.len(), SCENE_PATH_MAX);
    }

    #[test]
    fn test_skew_is_rejected_at_lookup() {
        let mut db = SceneDatabase::new();
        let node = db.add_node(Node::new("skewed").with_transform(TransformElement::Skew {
            degrees: 30.0,
            rotation_axis: Vec3::y(),
            translation_axis: Vec3::x(),
        }));
        let mut cache = TransformCache::new();
        assert!(matches!(
            cache.node_transform_matrix(&db, node),
            Err(CacheError::Transform(TransformError::UnsupportedSkew { .. }))
        ));
    }

    #[test]
    fn test_purge_then_requery_recomputes_same_value() {
        let mut db = SceneDatabase::new();
        let nodes = chain(&mut db, 4);
        let path = NodePath::branch(nodes[0], nodes[3]);

        let mut cache = TransformCache::new();
        let before = cache.path_transform_matrix(&db, &path).unwrap();
        cache.update(&db, 800, 600);
        let expected = cache.matrix(before).unwrap();

        cache.purge();
        assert!(matches!(cache.matrix(before), Err(CacheError::StaleHandle { .. })));
        assert!(cache.is_empty());

        let after = cache.path_transform_matrix(&db, &path).unwrap();
        cache.update(&db, 800, 600);
        assert_eq!(cache.matrix(after).unwrap(), expected);
    }

    #[test]
    fn test_second_update_is_bit_identical_and_free() {
        let mut db = SceneDatabase::new();
        let nodes = chain(&mut db, 3);
        let camera = db.add_camera(Camera::perspective("cam", 45.0, 0.1, 100.0));
        let mut cache = TransformCache::new();
        let world = cache.path_transform_matrix(&db, &NodePath::branch(nodes[0], nodes[2])).unwrap();
        let proj = cache.camera_projection_matrix(&db, camera).unwrap();
        let mvp = cache.matrix_composition(proj, world, None, None).unwrap();

        cache.update(&db, 1024, 768);
        let first = cache.matrix(mvp).unwrap();
        cache.update(&db, 1024, 768);
        assert_eq!(cache.matrix(mvp).unwrap(), first);
        assert_eq!(cache.stats().recomputed(), 0);
        assert_eq!(cache.stats().stage(UpdateStage::ComputePass45).items, 1);
    }

    #[test]
    fn test_value_edit_recomputes_only_dependents() {
        let mut db = SceneDatabase::new();
        let a = db.add_node(Node::new("a"));
        let b = db.add_node(Node::new("b"));
        let mut cache = TransformCache::new();
        let ta = cache.node_transform_matrix(&db, a).unwrap();
        cache.node_transform_matrix(&db, b).unwrap();
        cache.update(&db, 1, 1);

        db.edit_node(a, Edit::Value, |n| n.transforms.push(TransformElement::Translate(Vec3::y())));
        cache.update(&db, 1, 1);
        assert_eq!(cache.stats().stage(UpdateStage::ComputePass1).recomputed, 1);
        assert_relative_eq!(cache.matrix(ta).unwrap(), Mat4::new_translation(&Vec3::y()));
    }

    #[test]
    fn test_framebuffer_resize_refreshes_open_aspect_projection() {
        let mut db = SceneDatabase::new();
        let camera = db.add_camera(Camera::perspective("cam", 60.0, 0.1, 10.0));
        let mut cache = TransformCache::new();
        let proj = cache.camera_projection_matrix(&db, camera).unwrap();

        cache.update(&db, 100, 100);
        let square = cache.matrix(proj).unwrap();
        cache.update(&db, 200, 100);
        let wide = cache.matrix(proj).unwrap();
        assert_relative_eq!(wide[(0, 0)] * 2.0, square[(0, 0)], epsilon = 1e-5);
    }

    #[test]
    fn test_composites_of_composites_run_in_later_waves() {
        let mut db = SceneDatabase::new();
        let nodes = chain(&mut db, 2);
        let mut cache = TransformCache::new();
        let a = cache.node_transform_matrix(&db, nodes[0]).unwrap();
        let b = cache.node_transform_matrix(&db, nodes[1]).unwrap();
        let ab = cache.matrix_composition(a, b, None, None).unwrap();
        let abab = cache.matrix_composition(ab, ab, None, None).unwrap();
        assert_eq!(cache.waves.len(), 2);

        cache.update(&db, 1, 1);
        let single = cache.matrix(ab).unwrap();
        assert_relative_eq!(cache.matrix(abab).unwrap(), single * single, epsilon = 1e-4);
    }

    #[test]
    fn test_composition_is_memoized() {
        let mut db = SceneDatabase::new();
        let node = db.add_node(Node::new("n"));
        let mut cache = TransformCache::new();
        let m = cache.node_transform_matrix(&db, node).unwrap();
        let first = cache.matrix_composition(m, m, None, None).unwrap();
        let second = cache.matrix_composition(m, m, None, None).unwrap();
        assert_eq!(first, second);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_bounding_box_without_box_is_visible() {
        let mut db = SceneDatabase::new();
        let node = db.add_node(Node::new("n"));
        let geometry = db.add_geometry(Geometry::new("empty"));
        let camera = db.add_camera(Camera::perspective("cam", 45.0, 0.1, 10.0));
        let view = ViewCoords { camera: Some(camera), path: NodePath::empty() };
        let local = LocalCoords { path: NodePath::branch(node, node) };

        let mut cache = TransformCache::new();
        let visible = cache.check_bounding_box(&db, &view, &local, geometry).unwrap();
        cache.update(&db, 1, 1);
        assert_eq!(cache.value(visible).unwrap(), Value::Flag(true));
    }

    #[test]
    fn test_bounding_box_behind_camera_is_culled() {
        let mut db = SceneDatabase::new();
        let node = db.add_node(Node::new("behind").with_transform(TransformElement::Translate(Vec3::new(0.0, 0.0, 5.0))));
        let mut geometry = Geometry::new("box");
        geometry.bounding_box = Some(Aabb::from_center_extents(Vec3::zeros(), Vec3::new(0.5, 0.5, 0.5)));
        let geometry = db.add_geometry(geometry);
        let camera = db.add_camera(Camera::perspective("cam", 45.0, 0.1, 10.0));
        let view = ViewCoords { camera: Some(camera), path: NodePath::empty() };
        let local = LocalCoords { path: NodePath::branch(node, node) };

        let mut cache = TransformCache::new();
        let visible = cache.check_bounding_box(&db, &view, &local, geometry).unwrap();
        cache.update(&db, 1, 1);
        assert_eq!(cache.value(visible).unwrap(), Value::Flag(false));

        db.edit_node(node, Edit::Value, |n| n.transforms = vec![TransformElement::Translate(Vec3::new(0.0, 0.0, -5.0))]);
        cache.update(&db, 1, 1);
        assert_eq!(cache.value(visible).unwrap(), Value::Flag(true));
    }

    #[test]
    fn test_parallel_update_matches_inline() {
        let mut db = SceneDatabase::new();
        let nodes = chain(&mut db, 8);
        let config = TransformCacheConfig {
            parallel: true,
            worker_threads: 3,
            chunk_size: 2,
            parallel_threshold: 1,
        };
        let mut parallel = TransformCache::with_config(&config).unwrap();
        let mut inline = TransformCache::new();

        let mut refs = Vec::new();
        for cache in [&mut parallel, &mut inline] {
            let mut mine = Vec::new();
            for leaf in &nodes {
                let m = cache.branch_transform_matrix(&db, nodes[0], *leaf).unwrap();
                let inv = cache.branch_transform_inverse_matrix(&db, nodes[0], *leaf).unwrap();
                mine.push(cache.matrix_composition(m, inv, None, None).unwrap());
            }
            cache.update(&db, 320, 200);
            refs.push(mine);
        }

        for (p, i) in refs[0].iter().zip(&refs[1]) {
            assert_eq!(parallel.matrix(*p).unwrap(), inline.matrix(*i).unwrap());
        }
        assert!(parallel.stats().stage(UpdateStage::ComputeBranch).parallel);
    }
}
