//! Materials and instance bindings

use super::effect::ParamDecl;
use super::handles::{EffectId, MaterialId};
use crate::foundation::version::Versions;

/// A material: an effect plus parameter overrides
#[derive(Debug, Clone)]
pub struct Material {
    /// Material name, used in log lines
    pub name: String,
    /// Instantiated effect
    pub effect: EffectId,
    /// Preferred technique sid
    pub technique_hint: Option<String>,
    /// Parameter overrides, highest precedence
    pub set_params: Vec<ParamDecl>,
    /// Structure and value stamps
    pub versions: Versions,
}

impl Material {
    /// Material instantiating `effect` with no overrides
    pub fn new(name: impl Into<String>, effect: EffectId) -> Self {
        Self {
            name: name.into(),
            effect,
            technique_hint: None,
            set_params: Vec::new(),
            versions: Versions::new(),
        }
    }
}

/// Remaps a pass attribute semantic onto a geometry input semantic and set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindVertexInput {
    /// Semantic requested by the pass
    pub semantic: String,
    /// Geometry semantic that satisfies it
    pub input_semantic: String,
    /// Geometry input set
    pub input_set: u32,
}

/// Binds a primitive set's material symbol to a concrete material
#[derive(Debug, Clone)]
pub struct MaterialBinding {
    /// Symbol used by primitive sets
    pub symbol: String,
    /// Target material
    pub material: MaterialId,
    /// Vertex input remaps
    pub vertex_inputs: Vec<BindVertexInput>,
    /// Structure and value stamps
    pub versions: Versions,
}

impl MaterialBinding {
    /// Bind `symbol` to `material` with no remaps
    pub fn new(symbol: impl Into<String>, material: MaterialId) -> Self {
        Self {
            symbol: symbol.into(),
            material,
            vertex_inputs: Vec::new(),
            versions: Versions::new(),
        }
    }
}
