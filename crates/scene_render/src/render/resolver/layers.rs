//! Layer name to bit assignment and per-node masks

use std::collections::HashMap;

use crate::foundation::version::SeqPos;
use crate::render::error::ResolveError;
use crate::scene::{NodeId, SceneDatabase};

/// Widest mask a layer set can occupy
pub const MAX_LAYERS: usize = u64::BITS as usize;

/// Bit per distinct layer name, assigned on first sight and never reused
#[derive(Debug, Default)]
pub struct LayerRegistry {
    bits: HashMap<String, u32>,
    node_masks: HashMap<NodeId, (Option<u64>, SeqPos)>,
}

impl LayerRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Mask bit of a layer name; `None` once every bit is taken
    pub fn layer_mask(&mut self, name: &str) -> Option<u64> {
        if let Some(bit) = self.bits.get(name) {
            return Some(1 << bit);
        }
        if self.bits.len() >= MAX_LAYERS {
            log::warn!("Layer '{}' ignored: all {} layer bits are in use", name, MAX_LAYERS);
            return None;
        }
        let bit = self.bits.len() as u32;
        self.bits.insert(name.to_string(), bit);
        log::trace!("Layer '{}' assigned bit {}", name, bit);
        Some(1 << bit)
    }

    /// OR of the masks of `names`
    pub fn names_mask<S: AsRef<str>>(&mut self, names: &[S]) -> u64 {
        names.iter().filter_map(|name| self.layer_mask(name.as_ref())).fold(0, |acc, bit| acc | bit)
    }

    /// Mask of a node's own layers; `None` when it declares none
    pub fn node_mask(&mut self, db: &SceneDatabase, id: NodeId) -> Result<Option<u64>, ResolveError> {
        let node = db.node(id).ok_or(ResolveError::UnknownNode(id))?;
        if let Some((mask, resolved_at)) = self.node_masks.get(&id) {
            if resolved_at.as_recent_as(&node.versions.structure) {
                return Ok(*mask);
            }
        }
        let mask = (!node.layers.is_empty()).then(|| self.names_mask(node.layers.as_slice()));
        self.node_masks.insert(id, (mask, SeqPos::new()));
        Ok(mask)
    }

    /// Number of assigned layer bits
    pub fn len(&self) -> usize {
        self.bits.len()
    }

    /// Whether no layer has been seen yet
    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }
}

/// Whether a node with `node_mask` is drawn for a render item requesting `requested`
///
/// An empty request draws every layer and a node without layers is always drawn.
pub fn layer_included(node_mask: Option<u64>, requested: u64) -> bool {
    match node_mask {
        None => true,
        Some(_) if requested == 0 => true,
        Some(mask) => mask & requested != 0,
    }
}
