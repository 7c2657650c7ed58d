//! Geometry, primitive sets and source buffers

use super::handles::SourceId;
use crate::foundation::math::Aabb;
use crate::foundation::version::Versions;

/// Element storage of a source buffer
#[derive(Debug, Clone, PartialEq)]
pub enum SourceData {
    /// 32-bit floats
    Float(Vec<f32>),
    /// 32-bit unsigned integers
    UInt(Vec<u32>),
    /// 16-bit unsigned integers
    UShort(Vec<u16>),
    /// 32-bit signed integers
    Int(Vec<i32>),
}

impl SourceData {
    /// Number of scalar elements
    pub fn len(&self) -> usize {
        match self {
            Self::Float(data) => data.len(),
            Self::UInt(data) => data.len(),
            Self::UShort(data) => data.len(),
            Self::Int(data) => data.len(),
        }
    }

    /// Whether the buffer holds no elements
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A typed buffer of vertex or index data
#[derive(Debug, Clone)]
pub struct SourceBuffer {
    /// Element storage
    pub data: SourceData,
    /// Scalars per element (3 for a position, 1 for an index)
    pub stride: u32,
    /// Structure and value stamps
    pub versions: Versions,
}

impl SourceBuffer {
    /// Create a buffer
    pub fn new(data: SourceData, stride: u32) -> Self {
        Self {
            data,
            stride,
            versions: Versions::new(),
        }
    }

    /// Number of whole elements
    pub fn count(&self) -> usize {
        if self.stride == 0 {
            0
        } else {
            self.data.len() / self.stride as usize
        }
    }
}

/// A per-vertex input stream of a geometry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexInput {
    /// Semantic, e.g. `POSITION`, `NORMAL`, `TEXCOORD`
    pub semantic: String,
    /// Set index for multi-set semantics
    pub set: u32,
    /// Backing buffer
    pub source: SourceId,
}

impl VertexInput {
    /// Input in set 0
    pub fn new(semantic: impl Into<String>, source: SourceId) -> Self {
        Self {
            semantic: semantic.into(),
            set: 0,
            source,
        }
    }
}

/// Primitive topology as authored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topology {
    /// Independent points
    Points,
    /// Independent line segments
    Lines,
    /// Connected line strip
    LineStrip,
    /// Independent triangles
    Triangles,
    /// Triangle strip
    TriangleStrip,
    /// Triangle fan
    TriangleFan,
}

impl Topology {
    /// Vertices (or indices) needed to draw `primitives` primitives
    pub fn element_count(self, primitives: u32) -> u32 {
        if primitives == 0 {
            return 0;
        }
        match self {
            Self::Points => primitives,
            Self::Lines => primitives * 2,
            Self::LineStrip => primitives + 1,
            Self::Triangles => primitives * 3,
            Self::TriangleStrip | Self::TriangleFan => primitives + 2,
        }
    }
}

/// A batch of primitives sharing one material symbol
#[derive(Debug, Clone, PartialEq)]
pub struct PrimitiveSet {
    /// Topology
    pub topology: Topology,
    /// Number of primitives (points, lines or triangles)
    pub count: u32,
    /// Material symbol resolved through the instance's bindings
    pub material_symbol: String,
    /// Optional index buffer
    pub indices: Option<SourceId>,
}

/// A geometry entity
#[derive(Debug, Clone)]
pub struct Geometry {
    /// Geometry name, used in log lines
    pub name: String,
    /// Vertex input streams
    pub vertex_inputs: Vec<VertexInput>,
    /// Primitive sets
    pub primitives: Vec<PrimitiveSet>,
    /// Object-space bounds, if known
    pub bounding_box: Option<Aabb>,
    /// Structure and value stamps
    pub versions: Versions,
}

impl Geometry {
    /// Empty geometry
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            vertex_inputs: Vec::new(),
            primitives: Vec::new(),
            bounding_box: None,
            versions: Versions::new(),
        }
    }

    /// Input stream by semantic and set
    pub fn vertex_input(&self, semantic: &str, set: Option<u32>) -> Option<&VertexInput> {
        self.vertex_inputs
            .iter()
            .find(|input| input.semantic == semantic && set.map_or(true, |s| s == input.set))
    }

    /// Whether any input stream reads `source`
    pub fn references_source(&self, source: SourceId) -> bool {
        self.vertex_inputs.iter().any(|input| input.source == source)
            || self.primitives.iter().any(|p| p.indices == Some(source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_count_per_topology() {
        assert_eq!(Topology::Triangles.element_count(2), 6);
        assert_eq!(Topology::TriangleStrip.element_count(2), 4);
        assert_eq!(Topology::LineStrip.element_count(3), 4);
        assert_eq!(Topology::Points.element_count(0), 0);
    }

    #[test]
    fn test_partial_trailing_element_is_not_counted() {
        let buffer = SourceBuffer::new(SourceData::Float(vec![0.0; 10]), 3);
        assert_eq!(buffer.count(), 3);
        assert_eq!(SourceBuffer::new(SourceData::UShort(vec![1, 2]), 0).count(), 0);
    }
}
