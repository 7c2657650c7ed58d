//! Visual scenes: a root hierarchy plus render instructions

use super::handles::{MaterialId, NodeId};
use crate::foundation::version::Versions;

/// Forces a material (and optionally one technique/pass) onto a render item
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceMaterial {
    /// Material to apply
    pub material: MaterialId,
    /// Technique sid; the first technique when `None`
    pub technique: Option<String>,
    /// Pass sid; every pass of the technique when `None`
    pub pass: Option<String>,
}

/// One render instruction of an evaluate-scene block
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RenderItem {
    /// Node instancing the camera to render from
    pub camera_node: Option<NodeId>,
    /// Layers to draw; empty draws every layer
    pub layers: Vec<String>,
    /// Material override pipeline
    pub instance_material: Option<InstanceMaterial>,
}

/// An ordered group of render items
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluateScene {
    /// Name, used in log lines
    pub name: String,
    /// Disabled blocks are skipped entirely
    pub enabled: bool,
    /// Render items in execution order
    pub render_items: Vec<RenderItem>,
}

impl EvaluateScene {
    /// An enabled block
    pub fn new(name: impl Into<String>, render_items: Vec<RenderItem>) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            render_items,
        }
    }
}

/// The unit a render list is built for
#[derive(Debug, Clone)]
pub struct VisualScene {
    /// Name, used in log lines
    pub name: String,
    /// Root of the node hierarchy
    pub root: NodeId,
    /// Render instructions; an empty list renders the hierarchy once with
    /// default settings
    pub evaluate_scenes: Vec<EvaluateScene>,
    /// Structure and value stamps
    pub versions: Versions,
}

impl VisualScene {
    /// A visual scene with no explicit render instructions
    pub fn new(name: impl Into<String>, root: NodeId) -> Self {
        Self {
            name: name.into(),
            root,
            evaluate_scenes: Vec::new(),
            versions: Versions::new(),
        }
    }
}
