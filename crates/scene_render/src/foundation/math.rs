//! Math utilities and types
//!
//! Thin aliases over nalgebra plus the handful of projection, transform and
//! bounding-volume helpers the transform cache needs.

pub use nalgebra::{Isometry3, Matrix4, Unit, Vector2, Vector3, Vector4};

/// 2D vector type
pub type Vec2 = Vector2<f32>;

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f32>;

/// Math constants
pub mod constants {
    /// Pi constant
    pub const PI: f32 = std::f32::consts::PI;

    /// Degrees to radians conversion factor
    pub const DEG_TO_RAD: f32 = PI / 180.0;

    /// Radians to degrees conversion factor
    pub const RAD_TO_DEG: f32 = 180.0 / PI;
}

/// Math utility functions
pub mod utils {
    use super::constants;

    /// Convert degrees to radians
    pub fn deg_to_rad(degrees: f32) -> f32 {
        degrees * constants::DEG_TO_RAD
    }

    /// Convert radians to degrees
    pub fn rad_to_deg(radians: f32) -> f32 {
        radians * constants::RAD_TO_DEG
    }
}

/// Extension trait for Mat4 with the constructors scene transforms need
///
/// All matrices follow the right-handed, column-vector, OpenGL clip-space
/// convention (camera looks down -Z, clip z in [-w, w]).
pub trait Mat4Ext {
    /// Rotation of `degrees` around `axis`; a zero axis yields identity
    fn rotation_axis_degrees(axis: &Vec3, degrees: f32) -> Mat4;

    /// Model matrix placing an object at `eye` looking towards `target`
    fn look_at_model(eye: &Vec3, target: &Vec3, up: &Vec3) -> Mat4;

    /// Perspective projection from a vertical field of view in degrees
    fn perspective_gl(yfov_degrees: f32, aspect: f32, znear: f32, zfar: f32) -> Mat4;

    /// Orthographic projection from half-extents
    fn orthographic_gl(xmag: f32, ymag: f32, znear: f32, zfar: f32) -> Mat4;

    /// The upper-left 3x3 block, embedded in an otherwise identity matrix
    fn upper3x3(&self) -> Mat4;

    /// Inverse, or identity with a warning when the matrix is singular
    fn inverse_or_identity(&self) -> Mat4;
}

impl Mat4Ext for Mat4 {
    fn rotation_axis_degrees(axis: &Vec3, degrees: f32) -> Mat4 {
        match Unit::try_new(*axis, f32::EPSILON) {
            Some(axis) => Mat4::from_axis_angle(&axis, utils::deg_to_rad(degrees)),
            None => Mat4::identity(),
        }
    }

    fn look_at_model(eye: &Vec3, target: &Vec3, up: &Vec3) -> Mat4 {
        let eye = Point3::from(*eye);
        let target = Point3::from(*target);
        Isometry3::look_at_rh(&eye, &target, up).inverse().to_homogeneous()
    }

    fn perspective_gl(yfov_degrees: f32, aspect: f32, znear: f32, zfar: f32) -> Mat4 {
        let f = 1.0 / (utils::deg_to_rad(yfov_degrees) * 0.5).tan();
        let depth = znear - zfar;

        let mut result = Mat4::zeros();
        result[(0, 0)] = f / aspect;
        result[(1, 1)] = f;
        result[(2, 2)] = (zfar + znear) / depth;
        result[(2, 3)] = (2.0 * zfar * znear) / depth;
        result[(3, 2)] = -1.0;
        result
    }

    fn orthographic_gl(xmag: f32, ymag: f32, znear: f32, zfar: f32) -> Mat4 {
        let depth = zfar - znear;

        let mut result = Mat4::identity();
        result[(0, 0)] = 1.0 / xmag;
        result[(1, 1)] = 1.0 / ymag;
        result[(2, 2)] = -2.0 / depth;
        result[(2, 3)] = -(zfar + znear) / depth;
        result
    }

    fn upper3x3(&self) -> Mat4 {
        let mut result = Mat4::identity();
        result
            .fixed_view_mut::<3, 3>(0, 0)
            .copy_from(&self.fixed_view::<3, 3>(0, 0));
        result
    }

    fn inverse_or_identity(&self) -> Mat4 {
        self.try_inverse().unwrap_or_else(|| {
            log::warn!("Singular matrix in inverse, substituting identity");
            Mat4::identity()
        })
    }
}

/// Axis-aligned bounding box in object space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    /// Minimum corner of the bounding box
    pub min: Vec3,
    /// Maximum corner of the bounding box
    pub max: Vec3,
}

impl Aabb {
    /// Create a new AABB from min and max points
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Create an AABB centered at a point with given extents
    pub fn from_center_extents(center: Vec3, extents: Vec3) -> Self {
        Self {
            min: center - extents,
            max: center + extents,
        }
    }

    /// The eight corners as homogeneous points
    pub fn corners(&self) -> [Vec4; 8] {
        let (lo, hi) = (self.min, self.max);
        [
            Vec4::new(lo.x, lo.y, lo.z, 1.0),
            Vec4::new(hi.x, lo.y, lo.z, 1.0),
            Vec4::new(lo.x, hi.y, lo.z, 1.0),
            Vec4::new(hi.x, hi.y, lo.z, 1.0),
            Vec4::new(lo.x, lo.y, hi.z, 1.0),
            Vec4::new(hi.x, lo.y, hi.z, 1.0),
            Vec4::new(lo.x, hi.y, hi.z, 1.0),
            Vec4::new(hi.x, hi.y, hi.z, 1.0),
        ]
    }

    /// Conservative clip-space visibility test
    ///
    /// Transforms the corners by `clip_from_object` and reports the box as
    /// hidden only when every corner lies outside the same face of the
    /// canonical `-w <= x, y, z <= w` cube.
    pub fn intersects_clip_volume(&self, clip_from_object: &Mat4) -> bool {
        let clip: Vec<Vec4> = self
            .corners()
            .iter()
            .map(|corner| clip_from_object * corner)
            .collect();

        for axis in 0..3 {
            if clip.iter().all(|p| p[axis] > p.w) || clip.iter().all(|p| p[axis] < -p.w) {
                return false;
            }
        }
        true
    }
}
