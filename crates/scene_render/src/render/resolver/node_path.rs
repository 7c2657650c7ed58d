//! Node path search through children and node instancing

use crate::render::transform_cache::{LightInstance, NodePath};
use crate::scene::{NodeId, SceneDatabase};

/// An instancing edge that leads back into an instance already on the stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstanceCycle {
    /// Node holding the instancing edge
    pub instancer: NodeId,
    /// Instanced node already being visited
    pub instancee: NodeId,
}

/// Depth-first walk state: the closed branches so far plus the open one
struct Walk<'a> {
    db: &'a SceneDatabase,
    pairs: Vec<(NodeId, NodeId)>,
    instancees: Vec<NodeId>,
}

impl<'a> Walk<'a> {
    fn new(db: &'a SceneDatabase) -> Self {
        Self { db, pairs: Vec::new(), instancees: Vec::new() }
    }

    fn path_to(&self, branch_root: NodeId, node: NodeId) -> NodePath {
        let mut pairs = self.pairs.clone();
        pairs.push((branch_root, node));
        NodePath::from_pairs(&pairs)
    }

    /// Visit `node` and everything below it; stops early when `visit` returns true
    fn visit(
        &mut self,
        node: NodeId,
        branch_root: NodeId,
        visit: &mut dyn FnMut(NodeId, &NodePath) -> bool,
    ) -> Result<bool, InstanceCycle> {
        let db = self.db;
        let Some(entity) = db.node(node) else {
            log::warn!("Node path search: unknown node {:?}", node);
            return Ok(false);
        };
        if visit(node, &self.path_to(branch_root, node)) {
            return Ok(true);
        }

        for &instancee in &entity.instance_nodes {
            if self.instancees.contains(&instancee) {
                return Err(InstanceCycle { instancer: node, instancee });
            }
            self.pairs.push((branch_root, node));
            self.instancees.push(instancee);
            let found = self.visit(instancee, instancee, visit);
            self.instancees.pop();
            self.pairs.pop();
            if found? {
                return Ok(true);
            }
        }

        for &child in &entity.children {
            if self.visit(child, branch_root, visit)? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// Visit every node reachable from `root` with its path, in depth-first order
///
/// Instanced subtrees are visited before children, and a subtree instanced
/// twice is visited once per instance.
pub fn walk_hierarchy(
    db: &SceneDatabase,
    root: NodeId,
    mut visit: impl FnMut(NodeId, &NodePath),
) -> Result<(), InstanceCycle> {
    Walk::new(db)
        .visit(root, root, &mut |node, path| {
            visit(node, path);
            false
        })
        .map(|_| ())
}

/// Path from `source` down to `target` through children and instancing
///
/// Returns `None` when `target` is unreachable or the search runs into an
/// instancing cycle.
pub fn find_node_path(db: &SceneDatabase, source: NodeId, target: NodeId) -> Option<NodePath> {
    let mut found = None;
    let result = Walk::new(db).visit(source, source, &mut |node, path| {
        if node == target {
            found = Some(path.clone());
            true
        } else {
            false
        }
    });
    match result {
        Ok(_) => found,
        Err(cycle) => {
            log::warn!(
                "Node instancing cycle: {:?} instances {:?} which is already being visited",
                cycle.instancer,
                cycle.instancee
            );
            None
        }
    }
}

/// Every light instanced in the hierarchy under `root`, in traversal order
pub fn gather_lights(db: &SceneDatabase, root: NodeId) -> Vec<LightInstance> {
    let mut lights = Vec::new();
    let result = walk_hierarchy(db, root, |node, path| {
        if let Some(entity) = db.node(node) {
            lights.extend(entity.instance_lights.iter().map(|light| LightInstance {
                light: *light,
                path: path.clone(),
            }));
        }
    });
    if let Err(cycle) = result {
        log::warn!("Light gathering stopped at instancing cycle {:?} -> {:?}", cycle.instancer, cycle.instancee);
    }
    lights
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;
    use crate::scene::{Light, LightKind, Node};

    #[test]
    fn test_path_through_children_is_one_branch() {
        let mut db = SceneDatabase::new();
        let root = db.add_node(Node::new("root"));
        let mid = db.add_node(Node::new("mid"));
        let leaf = db.add_node(Node::new("leaf"));
        db.add_child(root, mid);
        db.add_child(mid, leaf);

        let path = find_node_path(&db, root, leaf).unwrap();
        assert_eq!(path.nodes(), &[root, leaf]);
    }

    #[test]
    fn test_instancing_closes_the_branch() {
        let mut db = SceneDatabase::new();
        let root = db.add_node(Node::new("root"));
        let holder = db.add_node(Node::new("holder"));
        let library = db.add_node(Node::new("library"));
        let part = db.add_node(Node::new("part"));
        db.add_child(root, holder);
        db.add_child(library, part);
        db.instance_node(holder, library);

        let path = find_node_path(&db, root, part).unwrap();
        assert_eq!(path.nodes(), &[root, holder, library, part]);
        assert_eq!(path.nodes().len() % 2, 0);
    }

    #[test]
    fn test_unreachable_target_is_none() {
        let mut db = SceneDatabase::new();
        let root = db.add_node(Node::new("root"));
        let stray = db.add_node(Node::new("stray"));
        assert!(find_node_path(&db, root, stray).is_none());
    }

    #[test]
    fn test_instancing_cycle_terminates() {
        let mut db = SceneDatabase::new();
        let root = db.add_node(Node::new("root"));
        let a = db.add_node(Node::new("a"));
        let b = db.add_node(Node::new("b"));
        let target = db.add_node(Node::new("unreachable"));
        db.instance_node(root, a);
        db.instance_node(a, b);
        db.instance_node(b, a);

        assert!(find_node_path(&db, root, target).is_none());
        assert!(walk_hierarchy(&db, root, |_, _| {}).is_err());
    }

    #[test]
    fn test_shared_instance_is_not_a_cycle() {
        let mut db = SceneDatabase::new();
        let root = db.add_node(Node::new("root"));
        let left = db.add_node(Node::new("left"));
        let right = db.add_node(Node::new("right"));
        let shared = db.add_node(Node::new("shared"));
        db.add_child(root, left);
        db.add_child(root, right);
        db.instance_node(left, shared);
        db.instance_node(right, shared);

        let mut visits = 0;
        walk_hierarchy(&db, root, |node, _| visits += usize::from(node == shared)).unwrap();
        assert_eq!(visits, 2);
    }

    #[test]
    fn test_lights_are_gathered_with_paths() {
        let mut db = SceneDatabase::new();
        let root = db.add_node(Node::new("root"));
        let lamp = db.add_node(Node::new("lamp"));
        db.add_child(root, lamp);
        let light = db.add_light(Light::new("key", LightKind::Point, Vec3::new(1.0, 1.0, 1.0)));
        db.instance_light(lamp, light);

        let lights = gather_lights(&db, root);
        assert_eq!(lights.len(), 1);
        assert_eq!(lights[0].light, light);
        assert_eq!(lights[0].path, NodePath::branch(root, lamp));
    }
}
