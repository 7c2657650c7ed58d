//! Scene nodes and their transform stacks

use thiserror::Error;

use super::effect::ProfileMask;
use super::handles::{BindingId, CameraId, GeometryId, LightId, NodeId};
use crate::foundation::math::{Mat4, Mat4Ext, Vec3};
use crate::foundation::version::Versions;

/// Errors raised while composing a node's transform stack
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransformError {
    /// Skew elements have no supported matrix form
    #[error("skew transform ({degrees} degrees) is not supported")]
    UnsupportedSkew {
        /// Skew angle as declared
        degrees: f32,
    },
}

/// One element of a node's ordered transform stack
#[derive(Debug, Clone, PartialEq)]
pub enum TransformElement {
    /// Translation by a vector
    Translate(Vec3),
    /// Rotation around an axis, angle in degrees
    Rotate {
        /// Rotation axis (need not be normalized)
        axis: Vec3,
        /// Angle in degrees
        degrees: f32,
    },
    /// Non-uniform scale
    Scale(Vec3),
    /// Arbitrary matrix
    Matrix(Mat4),
    /// Place the node at `eye` looking at `target`
    LookAt {
        /// Eye position
        eye: Vec3,
        /// Point of interest
        target: Vec3,
        /// Up direction
        up: Vec3,
    },
    /// Skew; accepted by the data model, rejected when composed
    Skew {
        /// Skew angle in degrees
        degrees: f32,
        /// Axis of rotation
        rotation_axis: Vec3,
        /// Axis of translation
        translation_axis: Vec3,
    },
}

impl TransformElement {
    /// Matrix form of this element
    pub fn to_matrix(&self) -> Result<Mat4, TransformError> {
        Ok(match self {
            Self::Translate(offset) => Mat4::new_translation(offset),
            Self::Rotate { axis, degrees } => Mat4::rotation_axis_degrees(axis, *degrees),
            Self::Scale(factors) => Mat4::new_nonuniform_scaling(factors),
            Self::Matrix(matrix) => *matrix,
            Self::LookAt { eye, target, up } => Mat4::look_at_model(eye, target, up),
            Self::Skew { degrees, .. } => {
                return Err(TransformError::UnsupportedSkew { degrees: *degrees })
            }
        })
    }
}

/// Compose an ordered transform stack into a single matrix
///
/// Elements apply in declaration order from the parent's point of view, so
/// the first element is the outermost factor.
pub fn compose_transform_stack(stack: &[TransformElement]) -> Result<Mat4, TransformError> {
    stack
        .iter()
        .try_fold(Mat4::identity(), |acc, element| Ok(acc * element.to_matrix()?))
}

/// Geometry instantiated under a node with its material bindings
#[derive(Debug, Clone, PartialEq)]
pub struct GeometryInstance {
    /// The instanced geometry
    pub geometry: GeometryId,
    /// Symbol-to-material bindings for this instance
    pub bindings: Vec<BindingId>,
}

/// A node of the scene hierarchy
#[derive(Debug, Clone)]
pub struct Node {
    /// Node name, used in log lines
    pub name: String,
    /// Owning parent, `None` for roots and library nodes
    pub parent: Option<NodeId>,
    /// Ordered children
    pub children: Vec<NodeId>,
    /// Ordered transform stack
    pub transforms: Vec<TransformElement>,
    /// Nodes instanced under this node
    pub instance_nodes: Vec<NodeId>,
    /// Cameras instanced under this node
    pub instance_cameras: Vec<CameraId>,
    /// Lights instanced under this node
    pub instance_lights: Vec<LightId>,
    /// Geometry instanced under this node
    pub instance_geometries: Vec<GeometryInstance>,
    /// Layer names this node belongs to; empty means "every layer"
    pub layers: Vec<String>,
    /// Profiles this node may be rendered with
    pub profiles: ProfileMask,
    /// Structure and value stamps
    pub versions: Versions,
}

impl Node {
    /// Create an empty node
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            children: Vec::new(),
            transforms: Vec::new(),
            instance_nodes: Vec::new(),
            instance_cameras: Vec::new(),
            instance_lights: Vec::new(),
            instance_geometries: Vec::new(),
            layers: Vec::new(),
            profiles: ProfileMask::all(),
            versions: Versions::new(),
        }
    }

    /// Builder-style transform element
    pub fn with_transform(mut self, element: TransformElement) -> Self {
        self.transforms.push(element);
        self
    }

    /// Builder-style layer membership
    pub fn with_layer(mut self, layer: impl Into<String>) -> Self {
        self.layers.push(layer.into());
        self
    }

    /// Local transform matrix
    pub fn local_matrix(&self) -> Result<Mat4, TransformError> {
        compose_transform_stack(&self.transforms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec4;
    use approx::assert_relative_eq;

    #[test]
    fn test_stack_applies_in_declaration_order() {
        let stack = vec![
            TransformElement::Translate(Vec3::new(1.0, 0.0, 0.0)),
            TransformElement::Scale(Vec3::new(2.0, 2.0, 2.0)),
        ];
        let m = compose_transform_stack(&stack).unwrap();
        let p = m * Vec4::new(1.0, 0.0, 0.0, 1.0);
        assert_relative_eq!(p, Vec4::new(3.0, 0.0, 0.0, 1.0));
    }

    #[test]
    fn test_empty_stack_is_identity() {
        assert_eq!(compose_transform_stack(&[]).unwrap(), Mat4::identity());
    }

    #[test]
    fn test_skew_is_rejected() {
        let stack = vec![
            TransformElement::Translate(Vec3::x()),
            TransformElement::Skew {
                degrees: 45.0,
                rotation_axis: Vec3::y(),
                translation_axis: Vec3::x(),
            },
        ];
        assert_eq!(
            compose_transform_stack(&stack),
            Err(TransformError::UnsupportedSkew { degrees: 45.0 })
        );
    }
}
