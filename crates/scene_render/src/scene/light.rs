//! Light sources

use crate::foundation::math::Vec3;
use crate::foundation::version::Versions;

/// Kind of light source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightKind {
    /// Uniform ambient contribution
    Ambient,
    /// Infinitely distant, shines down the node's -Z axis
    Directional,
    /// Omnidirectional point source
    Point,
    /// Cone along the node's -Z axis
    Spot,
}

/// A light entity
#[derive(Debug, Clone)]
pub struct Light {
    /// Light name, used in log lines
    pub name: String,
    /// Kind of source
    pub kind: LightKind,
    /// Linear RGB color
    pub color: Vec3,
    /// Constant attenuation factor
    pub constant_attenuation: f32,
    /// Linear attenuation factor
    pub linear_attenuation: f32,
    /// Quadratic attenuation factor
    pub quadratic_attenuation: f32,
    /// Full cone angle in degrees (spot lights)
    pub falloff_angle: f32,
    /// Falloff exponent (spot lights)
    pub falloff_exponent: f32,
    /// Structure and value stamps
    pub versions: Versions,
}

impl Light {
    /// Create a light with neutral attenuation and a 180 degree cone
    pub fn new(name: impl Into<String>, kind: LightKind, color: Vec3) -> Self {
        Self {
            name: name.into(),
            kind,
            color,
            constant_attenuation: 1.0,
            linear_attenuation: 0.0,
            quadratic_attenuation: 0.0,
            falloff_angle: 180.0,
            falloff_exponent: 0.0,
            versions: Versions::new(),
        }
    }
}
