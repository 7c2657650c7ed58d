//! Cameras and their projection parameters

use crate::foundation::math::{utils, Mat4, Mat4Ext};
use crate::foundation::version::Versions;

const DEFAULT_YFOV_DEGREES: f32 = 45.0;

/// Projection parameters as declared; any unspecified aspect falls back to
/// the aspect of the render target at evaluation time
#[derive(Debug, Clone, PartialEq)]
pub enum Optics {
    /// Perspective projection, angles in degrees
    Perspective {
        /// Horizontal field of view
        xfov: Option<f32>,
        /// Vertical field of view
        yfov: Option<f32>,
        /// Width over height
        aspect: Option<f32>,
        /// Near clip distance
        znear: f32,
        /// Far clip distance
        zfar: f32,
    },
    /// Orthographic projection, magnifications are half-extents
    Orthographic {
        /// Horizontal half-extent
        xmag: Option<f32>,
        /// Vertical half-extent
        ymag: Option<f32>,
        /// Width over height
        aspect: Option<f32>,
        /// Near clip distance
        znear: f32,
        /// Far clip distance
        zfar: f32,
    },
}

/// A camera entity
#[derive(Debug, Clone)]
pub struct Camera {
    /// Camera name, used in log lines
    pub name: String,
    /// Projection parameters
    pub optics: Optics,
    /// Structure and value stamps
    pub versions: Versions,
}

impl Camera {
    /// Perspective camera from a vertical field of view in degrees
    pub fn perspective(name: impl Into<String>, yfov: f32, znear: f32, zfar: f32) -> Self {
        Self {
            name: name.into(),
            optics: Optics::Perspective {
                xfov: None,
                yfov: Some(yfov),
                aspect: None,
                znear,
                zfar,
            },
            versions: Versions::new(),
        }
    }

    /// Orthographic camera from a vertical half-extent
    pub fn orthographic(name: impl Into<String>, ymag: f32, znear: f32, zfar: f32) -> Self {
        Self {
            name: name.into(),
            optics: Optics::Orthographic {
                xmag: None,
                ymag: Some(ymag),
                aspect: None,
                znear,
                zfar,
            },
            versions: Versions::new(),
        }
    }

    /// Whether the projection reads the render target's aspect
    pub fn depends_on_target_aspect(&self) -> bool {
        match &self.optics {
            Optics::Perspective { xfov, yfov, aspect, .. } => {
                aspect.is_none() && !(xfov.is_some() && yfov.is_some())
            }
            Optics::Orthographic { xmag, ymag, aspect, .. } => {
                aspect.is_none() && !(xmag.is_some() && ymag.is_some())
            }
        }
    }

    /// Projection matrix, using `target_aspect` where the optics leave it open
    pub fn projection_matrix(&self, target_aspect: f32) -> Mat4 {
        match self.optics {
            Optics::Perspective { xfov, yfov, aspect, znear, zfar } => {
                let half_tan = |degrees: f32| (utils::deg_to_rad(degrees) * 0.5).tan();
                let (yfov, aspect) = match (xfov, yfov, aspect) {
                    (_, Some(y), Some(a)) => (y, a),
                    (Some(x), Some(y), None) => (y, half_tan(x) / half_tan(y)),
                    (Some(x), None, a) => {
                        let a = a.unwrap_or(target_aspect);
                        let y = 2.0 * utils::rad_to_deg((half_tan(x) / a).atan());
                        (y, a)
                    }
                    (None, Some(y), None) => (y, target_aspect),
                    (None, None, a) => (DEFAULT_YFOV_DEGREES, a.unwrap_or(target_aspect)),
                };
                Mat4::perspective_gl(yfov, aspect, znear, zfar)
            }
            Optics::Orthographic { xmag, ymag, aspect, znear, zfar } => {
                let (xmag, ymag) = match (xmag, ymag, aspect) {
                    (Some(x), Some(y), _) => (x, y),
                    (Some(x), None, a) => (x, x / a.unwrap_or(target_aspect)),
                    (None, Some(y), a) => (y * a.unwrap_or(target_aspect), y),
                    (None, None, a) => (a.unwrap_or(target_aspect), 1.0),
                };
                Mat4::orthographic_gl(xmag, ymag, znear, zfar)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_perspective_uses_target_aspect_when_unspecified() {
        let camera = Camera::perspective("cam", 60.0, 0.1, 100.0);
        assert!(camera.depends_on_target_aspect());
        let wide = camera.projection_matrix(2.0);
        let square = camera.projection_matrix(1.0);
        assert_relative_eq!(wide[(0, 0)] * 2.0, square[(0, 0)], epsilon = 1e-6);
        assert_relative_eq!(wide[(1, 1)], square[(1, 1)]);
    }

    #[test]
    fn test_xfov_and_yfov_fix_the_aspect() {
        let camera = Camera {
            name: "cam".into(),
            optics: Optics::Perspective {
                xfov: Some(90.0),
                yfov: Some(90.0),
                aspect: None,
                znear: 1.0,
                zfar: 10.0,
            },
            versions: Versions::new(),
        };
        assert!(!camera.depends_on_target_aspect());
        assert_relative_eq!(camera.projection_matrix(3.0), camera.projection_matrix(1.0));
        assert_relative_eq!(camera.projection_matrix(3.0)[(0, 0)], 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_orthographic_half_extents() {
        let camera = Camera::orthographic("ortho", 2.0, 0.0, 10.0);
        let p = camera.projection_matrix(2.0);
        assert_relative_eq!(p[(0, 0)], 0.25);
        assert_relative_eq!(p[(1, 1)], 0.5);
    }
}
