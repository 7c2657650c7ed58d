//! Cache slots, values and the per-item recompute rules

use crate::cache::Identity;
use crate::foundation::math::{Mat4, Mat4Ext, Vec4};
use crate::foundation::version::SeqPos;
use crate::scene::{CameraId, GeometryId, ImageId, Light, LightId, LightKind, NodeId, SceneDatabase};

/// Longest branch (in nodes) or path (in pairs) the cache composes
pub const SCENE_PATH_MAX: usize = 32;

const LIGHT_ZNEAR: f32 = 0.1;
const LIGHT_ZFAR: f32 = 1000.0;
const LIGHT_ORTHO_EXTENT: f32 = 50.0;

/// A derived value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    /// 4x4 matrix
    Matrix(Mat4),
    /// 4-vector
    Vector(Vec4),
    /// Scalar
    Scalar(f32),
    /// Boolean, e.g. a visibility test result
    Flag(bool),
}

impl Value {
    /// Short kind name for diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Matrix(_) => "matrix",
            Self::Vector(_) => "vector",
            Self::Scalar(_) => "scalar",
            Self::Flag(_) => "flag",
        }
    }

    /// The matrix, if this is one
    pub fn as_matrix(&self) -> Option<&Mat4> {
        match self {
            Self::Matrix(m) => Some(m),
            _ => None,
        }
    }

    /// The vector, if this is one
    pub fn as_vector(&self) -> Option<&Vec4> {
        match self {
            Self::Vector(v) => Some(v),
            _ => None,
        }
    }

    /// The scalar, if this is one
    pub fn as_scalar(&self) -> Option<f32> {
        match self {
            Self::Scalar(s) => Some(*s),
            _ => None,
        }
    }

    /// The flag, if this is one
    pub fn as_flag(&self) -> Option<bool> {
        match self {
            Self::Flag(f) => Some(*f),
            _ => None,
        }
    }
}

/// Values that never change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum ConstId {
    Identity,
    Zero,
    ZeroVector,
    ZeroScalar,
    /// Maps clip space [-1, 1] onto texture space [0, 1]
    ShadowBias,
}

impl ConstId {
    pub(crate) fn value(self) -> Value {
        match self {
            Self::Identity => Value::Matrix(Mat4::identity()),
            Self::Zero => Value::Matrix(Mat4::zeros()),
            Self::ZeroVector => Value::Vector(Vec4::zeros()),
            Self::ZeroScalar => Value::Scalar(0.0),
            Self::ShadowBias => Value::Matrix(Mat4::new(
                0.5, 0.0, 0.0, 0.5, //
                0.0, 0.5, 0.0, 0.5, //
                0.0, 0.0, 0.5, 0.5, //
                0.0, 0.0, 0.0, 1.0,
            )),
        }
    }
}

/// Location of a value inside the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Slot {
    Leaf(u32),
    Branch(u32),
    Path(u32),
    Composite { wave: u32, index: u32 },
    Constant(ConstId),
}

impl Slot {
    /// Identity used when the slot is an operand of a cache key
    pub(crate) fn identity(self) -> Identity {
        let (kind, high, low): (u64, u32, u32) = match self {
            Self::Leaf(index) => (1, 0, index),
            Self::Branch(index) => (2, 0, index),
            Self::Path(index) => (3, 0, index),
            Self::Composite { wave, index } => (4, wave, index),
            Self::Constant(c) => (5, 0, c as u32),
        };
        Identity::tag((kind << 60) | (u64::from(high) << 32) | u64::from(low))
    }

    /// Wave a composite reading this slot has to run in, at least
    pub(crate) fn dependent_wave(self) -> u32 {
        match self {
            Self::Composite { wave, .. } => wave + 1,
            _ => 0,
        }
    }
}

/// Handle to a cached value, valid until the next purge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ValueRef {
    pub(crate) epoch: u64,
    pub(crate) slot: Slot,
}

impl ValueRef {
    /// Purge epoch this reference was issued in
    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

/// Handle to a cached value known to be a matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MatrixRef(pub(crate) ValueRef);

impl MatrixRef {
    /// The untyped reference
    pub fn value_ref(self) -> ValueRef {
        self.0
    }
}

impl From<MatrixRef> for ValueRef {
    fn from(matrix: MatrixRef) -> Self {
        matrix.0
    }
}

/// Render target size as of the current update
#[derive(Debug, Clone, Copy)]
pub(crate) struct FrameInfo {
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) stamp: SeqPos,
}

impl FrameInfo {
    pub(crate) fn aspect(&self) -> f32 {
        if self.height == 0 {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }
}

impl Default for FrameInfo {
    fn default() -> Self {
        Self { width: 1, height: 1, stamp: SeqPos::new() }
    }
}

/// What a first-pass item reads straight from the scene
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum LeafSource {
    Projection(CameraId),
    ProjectionInverse(CameraId),
    Transform(NodeId),
    TransformInverse(NodeId),
    LightProjection(LightId),
    LightColor(LightId),
    LightAttenuation(LightId),
    LightFalloffAngle(LightId),
    LightFalloffExponent(LightId),
    FramebufferSize,
    FramebufferSizeInverse,
    ImageSize(ImageId),
    ImageSizeInverse(ImageId),
}

impl LeafSource {
    fn placeholder(self) -> Value {
        match self {
            Self::Projection(_)
            | Self::ProjectionInverse(_)
            | Self::Transform(_)
            | Self::TransformInverse(_)
            | Self::LightProjection(_) => Value::Matrix(Mat4::identity()),
            Self::LightFalloffAngle(_) | Self::LightFalloffExponent(_) => Value::Scalar(0.0),
            _ => Value::Vector(Vec4::zeros()),
        }
    }

    /// Whether a value computed at `stamp` still reflects the scene
    fn is_fresh(self, stamp: &SeqPos, db: &SceneDatabase, frame: &FrameInfo) -> bool {
        let source_stamp = match self {
            Self::Projection(id) | Self::ProjectionInverse(id) => db.camera(id).map(|camera| {
                if camera.depends_on_target_aspect() && !stamp.as_recent_as(&frame.stamp) {
                    SeqPos::INVALID
                } else {
                    camera.versions.value
                }
            }),
            Self::Transform(id) | Self::TransformInverse(id) => db.node(id).map(|n| n.versions.value),
            Self::LightProjection(id)
            | Self::LightColor(id)
            | Self::LightAttenuation(id)
            | Self::LightFalloffAngle(id)
            | Self::LightFalloffExponent(id) => db.light(id).map(|l| l.versions.value),
            Self::FramebufferSize | Self::FramebufferSizeInverse => Some(frame.stamp),
            Self::ImageSize(id) | Self::ImageSizeInverse(id) => db.image(id).map(|i| i.versions.value),
        };
        match source_stamp {
            Some(source_stamp) => stamp.as_recent_as(&source_stamp),
            // Removed entities keep whatever was computed last
            None => !stamp.is_invalid(),
        }
    }

    fn compute(self, db: &SceneDatabase, frame: &FrameInfo) -> Value {
        let missing = |what: &str| {
            log::warn!("Transform cache source {:?} vanished ({})", self, what);
            self.placeholder()
        };
        match self {
            Self::Projection(id) => db.camera(id).map_or_else(
                || missing("camera"),
                |camera| Value::Matrix(camera.projection_matrix(frame.aspect())),
            ),
            Self::ProjectionInverse(id) => db.camera(id).map_or_else(
                || missing("camera"),
                |camera| Value::Matrix(camera.projection_matrix(frame.aspect()).inverse_or_identity()),
            ),
            Self::Transform(id) => db
                .node(id)
                .map_or_else(|| missing("node"), |node| Value::Matrix(local_matrix(node))),
            Self::TransformInverse(id) => db.node(id).map_or_else(
                || missing("node"),
                |node| Value::Matrix(local_matrix(node).inverse_or_identity()),
            ),
            Self::LightProjection(id) => db
                .light(id)
                .map_or_else(|| missing("light"), |light| Value::Matrix(light_projection(light))),
            Self::LightColor(id) => db.light(id).map_or_else(
                || missing("light"),
                |light| Value::Vector(light.color.push(1.0)),
            ),
            Self::LightAttenuation(id) => db.light(id).map_or_else(
                || missing("light"),
                |light| {
                    Value::Vector(Vec4::new(
                        light.constant_attenuation,
                        light.linear_attenuation,
                        light.quadratic_attenuation,
                        0.0,
                    ))
                },
            ),
            Self::LightFalloffAngle(id) => db
                .light(id)
                .map_or_else(|| missing("light"), |light| Value::Scalar(light.falloff_angle)),
            Self::LightFalloffExponent(id) => db
                .light(id)
                .map_or_else(|| missing("light"), |light| Value::Scalar(light.falloff_exponent)),
            Self::FramebufferSize => Value::Vector(size_vector(frame.width, frame.height)),
            Self::FramebufferSizeInverse => Value::Vector(inverse_size_vector(frame.width, frame.height)),
            Self::ImageSize(id) => db.image(id).map_or_else(
                || missing("image"),
                |image| Value::Vector(size_vector(image.width, image.height)),
            ),
            Self::ImageSizeInverse(id) => db.image(id).map_or_else(
                || missing("image"),
                |image| Value::Vector(inverse_size_vector(image.width, image.height)),
            ),
        }
    }
}

fn local_matrix(node: &crate::scene::Node) -> Mat4 {
    node.local_matrix().unwrap_or_else(|err| {
        log::error!("Node '{}': {}; using identity", node.name, err);
        Mat4::identity()
    })
}

fn size_vector(width: u32, height: u32) -> Vec4 {
    Vec4::new(width as f32, height as f32, 0.0, 0.0)
}

fn inverse_size_vector(width: u32, height: u32) -> Vec4 {
    let recip = |v: u32| if v == 0 { 0.0 } else { 1.0 / v as f32 };
    Vec4::new(recip(width), recip(height), 0.0, 0.0)
}

/// Projection used when rendering from a light's point of view
pub(crate) fn light_projection(light: &Light) -> Mat4 {
    match light.kind {
        LightKind::Spot => {
            let fov = (2.0 * light.falloff_angle).clamp(1.0, 179.0);
            Mat4::perspective_gl(fov, 1.0, LIGHT_ZNEAR, LIGHT_ZFAR)
        }
        LightKind::Point => Mat4::perspective_gl(90.0, 1.0, LIGHT_ZNEAR, LIGHT_ZFAR),
        LightKind::Directional | LightKind::Ambient => {
            Mat4::orthographic_gl(LIGHT_ORTHO_EXTENT, LIGHT_ORTHO_EXTENT, LIGHT_ZNEAR, LIGHT_ZFAR)
        }
    }
}

/// First-pass item: a value read directly from one scene entity
#[derive(Debug, Clone)]
pub(crate) struct LeafItem {
    pub(crate) source: LeafSource,
    pub(crate) value: Value,
    pub(crate) stamp: SeqPos,
}

impl LeafItem {
    pub(crate) fn new(source: LeafSource) -> Self {
        Self { source, value: source.placeholder(), stamp: SeqPos::INVALID }
    }

    /// Recompute if stale; returns whether work was done
    pub(crate) fn refresh(&mut self, db: &SceneDatabase, frame: &FrameInfo) -> bool {
        if self.source.is_fresh(&self.stamp, db, frame) {
            return false;
        }
        self.value = self.source.compute(db, frame);
        self.stamp = SeqPos::new();
        true
    }
}

/// Read access to the passes that are already final during an update
#[derive(Clone, Copy)]
pub(crate) struct SlotReader<'a> {
    pub(crate) leaves: &'a [LeafItem],
    pub(crate) branches: &'a [ProductItem],
    pub(crate) paths: &'a [ProductItem],
    pub(crate) waves: &'a [Vec<CompositeItem>],
}

impl<'a> SlotReader<'a> {
    pub(crate) fn read(&self, slot: Slot) -> (Value, SeqPos) {
        let found = match slot {
            Slot::Leaf(i) => self.leaves.get(i as usize).map(|item| (item.value, item.stamp)),
            Slot::Branch(i) => self.branches.get(i as usize).map(|item| (item.value, item.stamp)),
            Slot::Path(i) => self.paths.get(i as usize).map(|item| (item.value, item.stamp)),
            Slot::Composite { wave, index } => self
                .waves
                .get(wave as usize)
                .and_then(|items| items.get(index as usize))
                .map(|item| (item.value, item.stamp)),
            Slot::Constant(c) => Some((c.value(), SeqPos::ORIGIN)),
        };
        found.unwrap_or_else(|| {
            log::error!("Transform cache read of unfinished slot {:?}", slot);
            (ConstId::Identity.value(), SeqPos::ORIGIN)
        })
    }

    fn matrix(&self, slot: Slot) -> Mat4 {
        match self.read(slot).0 {
            Value::Matrix(m) => m,
            other => {
                log::error!("Transform cache slot {:?} holds a {}, expected a matrix", slot, other.kind());
                Mat4::identity()
            }
        }
    }

    /// Left-to-right product of the operands' matrices
    pub(crate) fn product(&self, operands: &[Slot]) -> Mat4 {
        operands
            .iter()
            .fold(Mat4::identity(), |acc, slot| acc * self.matrix(*slot))
    }

    fn all_older_than(&self, stamp: &SeqPos, operands: &[Slot]) -> bool {
        operands.iter().all(|slot| stamp.as_recent_as(&self.read(*slot).1))
    }
}

/// Branch and path item: an ordered product of earlier-pass matrices
#[derive(Debug, Clone)]
pub(crate) struct ProductItem {
    pub(crate) operands: Vec<Slot>,
    pub(crate) value: Value,
    pub(crate) stamp: SeqPos,
}

impl ProductItem {
    pub(crate) fn new(operands: Vec<Slot>) -> Self {
        Self { operands, value: Value::Matrix(Mat4::identity()), stamp: SeqPos::INVALID }
    }

    pub(crate) fn refresh(&mut self, reader: &SlotReader<'_>) -> bool {
        if reader.all_older_than(&self.stamp, &self.operands) {
            return false;
        }
        self.value = Value::Matrix(reader.product(&self.operands));
        self.stamp = SeqPos::new();
        true
    }
}

/// Operation of a composite item; operands are multiplied left to right first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum CompositeOp {
    Product,
    Transpose,
    Upper3x3Transpose,
    PostmultiplyOrigin,
    PremultiplyZ,
    BoundingBox(GeometryId),
}

impl CompositeOp {
    pub(crate) fn tag(self) -> u64 {
        match self {
            Self::Product => 1,
            Self::Transpose => 2,
            Self::Upper3x3Transpose => 3,
            Self::PostmultiplyOrigin => 4,
            Self::PremultiplyZ => 5,
            Self::BoundingBox(_) => 6,
        }
    }

    fn placeholder(self) -> Value {
        match self {
            Self::Product | Self::Transpose | Self::Upper3x3Transpose => {
                Value::Matrix(Mat4::identity())
            }
            Self::PostmultiplyOrigin | Self::PremultiplyZ => Value::Vector(Vec4::zeros()),
            Self::BoundingBox(_) => Value::Flag(true),
        }
    }
}

/// Pass-four and pass-five item: an operation over earlier values
#[derive(Debug, Clone)]
pub(crate) struct CompositeItem {
    pub(crate) op: CompositeOp,
    pub(crate) operands: Vec<Slot>,
    pub(crate) value: Value,
    pub(crate) stamp: SeqPos,
}

impl CompositeItem {
    pub(crate) fn new(op: CompositeOp, operands: Vec<Slot>) -> Self {
        Self { op, operands, value: op.placeholder(), stamp: SeqPos::INVALID }
    }

    pub(crate) fn refresh(&mut self, reader: &SlotReader<'_>, db: &SceneDatabase) -> bool {
        let geometry_fresh = match self.op {
            CompositeOp::BoundingBox(id) => db
                .geometry(id)
                .map_or(!self.stamp.is_invalid(), |g| self.stamp.as_recent_as(&g.versions.value)),
            _ => true,
        };
        if geometry_fresh && reader.all_older_than(&self.stamp, &self.operands) {
            return false;
        }

        let product = reader.product(&self.operands);
        self.value = match self.op {
            CompositeOp::Product => Value::Matrix(product),
            CompositeOp::Transpose => Value::Matrix(product.transpose()),
            CompositeOp::Upper3x3Transpose => Value::Matrix(product.upper3x3().transpose()),
            CompositeOp::PostmultiplyOrigin => Value::Vector(product * Vec4::new(0.0, 0.0, 0.0, 1.0)),
            CompositeOp::PremultiplyZ => {
                let axis = (product * Vec4::new(0.0, 0.0, -1.0, 0.0)).xyz();
                let axis = axis.try_normalize(f32::EPSILON).unwrap_or_else(|| axis * 0.0);
                Value::Vector(axis.push(0.0))
            }
            CompositeOp::BoundingBox(id) => Value::Flag(
                db.geometry(id)
                    .and_then(|g| g.bounding_box)
                    .map_or(true, |aabb| aabb.intersects_clip_volume(&product)),
            ),
        };
        self.stamp = SeqPos::new();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;
    use crate::scene::{Edit, Node, TransformElement};
    use approx::assert_relative_eq;

    #[test]
    fn test_new_leaf_always_computes_once() {
        let mut db = SceneDatabase::new();
        let node = db.add_node(Node::new("n").with_transform(TransformElement::Translate(Vec3::x())));
        let frame = FrameInfo::default();
        let mut item = LeafItem::new(LeafSource::Transform(node));

        assert!(item.refresh(&db, &frame));
        assert!(!item.refresh(&db, &frame));
        assert_relative_eq!(
            *item.value.as_matrix().unwrap(),
            Mat4::new_translation(&Vec3::x())
        );

        db.edit_node(node, Edit::Value, |n| n.transforms.clear());
        assert!(item.refresh(&db, &frame));
        assert_eq!(*item.value.as_matrix().unwrap(), Mat4::identity());
    }

    #[test]
    fn test_slot_identities_are_distinct() {
        let slots = [
            Slot::Leaf(0),
            Slot::Branch(0),
            Slot::Path(0),
            Slot::Composite { wave: 0, index: 0 },
            Slot::Composite { wave: 1, index: 0 },
            Slot::Constant(ConstId::Identity),
        ];
        for (i, a) in slots.iter().enumerate() {
            assert_ne!(a.identity(), Identity::NONE);
            for b in &slots[i + 1..] {
                assert_ne!(a.identity(), b.identity());
            }
        }
    }

    #[test]
    fn test_premultiply_z_normalizes() {
        let db = SceneDatabase::new();
        let scale = Mat4::new_scaling(3.0);
        let leaves = vec![LeafItem {
            source: LeafSource::FramebufferSize,
            value: Value::Matrix(scale),
            stamp: SeqPos::new(),
        }];
        let reader = SlotReader { leaves: &leaves, branches: &[], paths: &[], waves: &[] };
        let mut item = CompositeItem::new(CompositeOp::PremultiplyZ, vec![Slot::Leaf(0)]);
        assert!(item.refresh(&reader, &db));
        assert_relative_eq!(*item.value.as_vector().unwrap(), Vec4::new(0.0, 0.0, -1.0, 0.0));
    }
}
