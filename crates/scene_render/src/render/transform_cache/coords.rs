//! Node paths and the coordinate systems built from them

use std::sync::Arc;

use crate::render::error::CacheError;
use crate::scene::{CameraId, LightId, NodeId};

/// A sequence of (branch root, branch leaf) node pairs
///
/// Each pair is a parent chain inside one subtree; node instancing starts a
/// new pair at the instanced node. The forward transform of a path is the
/// product of its branch transforms in order. Cloning shares the storage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct NodePath(Arc<[NodeId]>);

impl NodePath {
    /// The empty path; its transform is the identity
    pub fn empty() -> Self {
        Self::default()
    }

    /// A path made of a single branch
    pub fn branch(root: NodeId, leaf: NodeId) -> Self {
        Self(Arc::from([root, leaf]))
    }

    /// Build a path from (root, leaf) pairs
    pub fn from_pairs(pairs: &[(NodeId, NodeId)]) -> Self {
        Self(pairs.iter().flat_map(|&(root, leaf)| [root, leaf]).collect())
    }

    /// Flat node list, always of even length
    pub fn nodes(&self) -> &[NodeId] {
        &self.0
    }

    /// The (root, leaf) pairs
    pub fn pairs(&self) -> impl Iterator<Item = (NodeId, NodeId)> + '_ {
        self.0.chunks_exact(2).map(|pair| (pair[0], pair[1]))
    }

    /// Number of (root, leaf) pairs
    pub fn pair_count(&self) -> usize {
        self.0.len() / 2
    }

    /// Whether the path has no pairs
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The node the path ends at
    pub fn leaf(&self) -> Option<NodeId> {
        self.0.last().copied()
    }
}

impl TryFrom<Vec<NodeId>> for NodePath {
    type Error = CacheError;

    fn try_from(nodes: Vec<NodeId>) -> Result<Self, Self::Error> {
        if nodes.len() % 2 != 0 {
            return Err(CacheError::MalformedPath(nodes.len()));
        }
        Ok(Self(nodes.into()))
    }
}

/// Viewer placement: the camera and the path to the node instancing it
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ViewCoords {
    /// Camera providing the projection; `None` renders with identity view and projection
    pub camera: Option<CameraId>,
    /// Path from the visual scene root to the camera's node
    pub path: NodePath,
}

/// Object placement: the path to the node instancing the geometry
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct LocalCoords {
    /// Path from the visual scene root to the geometry's node
    pub path: NodePath,
}

/// A light found in a visual scene and the path to its node
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LightInstance {
    /// The light
    pub light: LightId,
    /// Path from the visual scene root to the light's node
    pub path: NodePath,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::collections::HandleMap;

    #[test]
    fn test_odd_node_list_is_rejected() {
        let mut nodes: HandleMap<NodeId, ()> = HandleMap::with_key();
        let a = nodes.insert(());
        let b = nodes.insert(());
        assert!(NodePath::try_from(vec![a, b]).is_ok());
        assert!(matches!(
            NodePath::try_from(vec![a, b, a]),
            Err(CacheError::MalformedPath(3))
        ));
    }

    #[test]
    fn test_equal_paths_hash_equal() {
        use std::collections::HashSet;

        let mut nodes: HandleMap<NodeId, ()> = HandleMap::with_key();
        let a = nodes.insert(());
        let b = nodes.insert(());
        let mut set = HashSet::new();
        set.insert(NodePath::branch(a, b));
        assert!(set.contains(&NodePath::from_pairs(&[(a, b)])));
        assert!(!set.contains(&NodePath::branch(b, a)));
    }
}
