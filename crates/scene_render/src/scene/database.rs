//! The scene database: arena storage for every scene entity
//!
//! All mutation goes through the database so that entity version stamps are
//! bumped and moved forward into the owning aggregates. That stamp traffic is
//! the only channel through which caches learn about edits.

use super::camera::Camera;
use super::effect::{Effect, Profile};
use super::geometry::{Geometry, PrimitiveSet, SourceBuffer, SourceData, Topology, VertexInput};
use super::handles::{
    BindingId, CameraId, EffectId, GeometryId, ImageId, LightId, MaterialId, NodeId, PassId,
    ProfileId, SourceId, VisualSceneId,
};
use super::image::Image;
use super::light::Light;
use super::material::{Material, MaterialBinding};
use super::node::{GeometryInstance, Node};
use super::pass::Pass;
use super::visual_scene::VisualScene;
use crate::foundation::collections::{HandleMap, Key};
use crate::foundation::math::{Aabb, Vec3};
use crate::foundation::version::Versions;

/// Access to an entity's version stamps
pub trait Versioned {
    /// Current stamps
    fn versions(&self) -> &Versions;
    /// Mutable stamps
    fn versions_mut(&mut self) -> &mut Versions;
}

macro_rules! impl_versioned {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Versioned for $ty {
                fn versions(&self) -> &Versions {
                    &self.versions
                }
                fn versions_mut(&mut self) -> &mut Versions {
                    &mut self.versions
                }
            }
        )*
    };
}

impl_versioned!(
    Node,
    Camera,
    Light,
    Effect,
    Profile,
    Pass,
    Material,
    MaterialBinding,
    Geometry,
    SourceBuffer,
    Image,
    VisualScene,
);

/// Granularity of an edit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edit {
    /// Topology or binding change; invalidates render lists
    Structure,
    /// Numeric payload change; picked up by the next transform update
    Value,
}

/// Symbol carried by the builtin full-screen quad's primitive set
pub const FULLSCREEN_QUAD_SYMBOL: &str = "fullscreen_quad";

fn apply_edit<K: Key, T: Versioned>(
    map: &mut HandleMap<K, T>,
    database: &mut Versions,
    id: K,
    edit: Edit,
    f: impl FnOnce(&mut T),
) -> bool {
    let Some(entity) = map.get_mut(id) else {
        log::warn!("Edit of stale or unknown handle {:?}", id.data());
        return false;
    };
    f(entity);
    match edit {
        Edit::Structure => entity.versions_mut().touch_structure(),
        Edit::Value => entity.versions_mut().touch_value(),
    }
    database.move_forward(entity.versions());
    true
}

/// Owner of every scene entity
#[derive(Debug)]
pub struct SceneDatabase {
    nodes: HandleMap<NodeId, Node>,
    cameras: HandleMap<CameraId, Camera>,
    lights: HandleMap<LightId, Light>,
    effects: HandleMap<EffectId, Effect>,
    profiles: HandleMap<ProfileId, Profile>,
    passes: HandleMap<PassId, Pass>,
    materials: HandleMap<MaterialId, Material>,
    bindings: HandleMap<BindingId, MaterialBinding>,
    geometries: HandleMap<GeometryId, Geometry>,
    sources: HandleMap<SourceId, SourceBuffer>,
    images: HandleMap<ImageId, Image>,
    visual_scenes: HandleMap<VisualSceneId, VisualScene>,
    fullscreen_quad: GeometryId,
    versions: Versions,
}

macro_rules! entity_access {
    ($get:ident, $insert:ident, $edit:ident, $field:ident, $id:ty, $ty:ty) => {
        /// Look up an entity; `None` for stale or unknown handles
        pub fn $get(&self, id: $id) -> Option<&$ty> {
            self.$field.get(id)
        }

        /// Insert an entity
        pub fn $insert(&mut self, entity: $ty) -> $id {
            let id = self.$field.insert(entity);
            self.versions.touch_structure();
            id
        }

        /// Edit an entity in place, bumping its stamps; false for stale handles
        pub fn $edit(&mut self, id: $id, edit: Edit, f: impl FnOnce(&mut $ty)) -> bool {
            apply_edit(&mut self.$field, &mut self.versions, id, edit, f)
        }
    };
}

impl SceneDatabase {
    /// Create an empty database holding only the builtin full-screen quad
    pub fn new() -> Self {
        let mut sources = HandleMap::with_key();
        let positions = sources.insert(SourceBuffer::new(
            SourceData::Float(vec![
                -1.0, -1.0, 0.0, //
                1.0, -1.0, 0.0, //
                -1.0, 1.0, 0.0, //
                1.0, 1.0, 0.0,
            ]),
            3,
        ));
        let texcoords = sources.insert(SourceBuffer::new(
            SourceData::Float(vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 1.0]),
            2,
        ));

        let mut quad = Geometry::new("builtin_fullscreen_quad");
        quad.vertex_inputs.push(VertexInput::new("POSITION", positions));
        quad.vertex_inputs.push(VertexInput::new("TEXCOORD", texcoords));
        quad.primitives.push(PrimitiveSet {
            topology: Topology::TriangleStrip,
            count: 2,
            material_symbol: FULLSCREEN_QUAD_SYMBOL.to_string(),
            indices: None,
        });
        quad.bounding_box = Some(Aabb::new(Vec3::new(-1.0, -1.0, 0.0), Vec3::new(1.0, 1.0, 0.0)));

        let mut geometries = HandleMap::with_key();
        let fullscreen_quad = geometries.insert(quad);

        Self {
            nodes: HandleMap::with_key(),
            cameras: HandleMap::with_key(),
            lights: HandleMap::with_key(),
            effects: HandleMap::with_key(),
            profiles: HandleMap::with_key(),
            passes: HandleMap::with_key(),
            materials: HandleMap::with_key(),
            bindings: HandleMap::with_key(),
            geometries,
            sources,
            images: HandleMap::with_key(),
            visual_scenes: HandleMap::with_key(),
            fullscreen_quad,
            versions: Versions::new(),
        }
    }

    /// Aggregate stamps of the whole database
    pub fn versions(&self) -> &Versions {
        &self.versions
    }

    /// The builtin full-screen quad geometry
    pub fn fullscreen_quad(&self) -> GeometryId {
        self.fullscreen_quad
    }

    entity_access!(node, add_node, edit_node, nodes, NodeId, Node);
    entity_access!(camera, add_camera, edit_camera, cameras, CameraId, Camera);
    entity_access!(light, add_light, edit_light, lights, LightId, Light);
    entity_access!(effect, add_effect, edit_effect, effects, EffectId, Effect);
    entity_access!(pass, add_pass, edit_pass, passes, PassId, Pass);
    entity_access!(material, add_material, edit_material, materials, MaterialId, Material);
    entity_access!(binding, add_binding, edit_binding, bindings, BindingId, MaterialBinding);
    entity_access!(geometry, add_geometry, edit_geometry, geometries, GeometryId, Geometry);
    entity_access!(source, add_source, edit_source_raw, sources, SourceId, SourceBuffer);
    entity_access!(image, add_image, edit_image, images, ImageId, Image);
    entity_access!(visual_scene, add_visual_scene, edit_visual_scene, visual_scenes, VisualSceneId, VisualScene);

    /// Look up a profile
    pub fn profile(&self, id: ProfileId) -> Option<&Profile> {
        self.profiles.get(id)
    }

    /// Add a profile to an effect; `None` when the effect handle is stale
    pub fn add_profile(&mut self, effect: EffectId, profile: Profile) -> Option<ProfileId> {
        if !self.effects.contains_key(effect) {
            log::warn!("add_profile: unknown effect {:?}", effect);
            return None;
        }
        let id = self.profiles.insert(profile);
        self.edit_effect(effect, Edit::Structure, |e| e.profiles.push(id));
        Some(id)
    }

    /// Edit a profile in place
    pub fn edit_profile(&mut self, id: ProfileId, edit: Edit, f: impl FnOnce(&mut Profile)) -> bool {
        apply_edit(&mut self.profiles, &mut self.versions, id, edit, f)
    }

    /// Edit a source buffer and move its stamps into every geometry reading it
    pub fn edit_source(&mut self, id: SourceId, edit: Edit, f: impl FnOnce(&mut SourceBuffer)) -> bool {
        if !self.edit_source_raw(id, edit, f) {
            return false;
        }
        let Some(source_versions) = self.sources.get(id).map(|s| s.versions) else {
            return false;
        };
        for (_, geometry) in self.geometries.iter_mut() {
            if geometry.references_source(id) {
                geometry.versions.move_forward(&source_versions);
            }
        }
        true
    }

    /// Attach `child` under `parent`, detaching it from any previous parent
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        if parent == child || !self.nodes.contains_key(parent) || !self.nodes.contains_key(child) {
            log::warn!("add_child: invalid pair {:?} -> {:?}", parent, child);
            return false;
        }
        if self.is_ancestor(child, parent) {
            log::warn!("add_child: {:?} is an ancestor of {:?}", child, parent);
            return false;
        }
        if let Some(old) = self.nodes.get(child).and_then(|n| n.parent) {
            self.edit_node(old, Edit::Structure, |n| n.children.retain(|c| *c != child));
        }
        self.edit_node(child, Edit::Structure, |n| n.parent = Some(parent));
        self.edit_node(parent, Edit::Structure, |n| n.children.push(child))
    }

    /// Instance `target` (and its subtree) under `node`
    pub fn instance_node(&mut self, node: NodeId, target: NodeId) -> bool {
        if !self.nodes.contains_key(target) {
            log::warn!("instance_node: unknown target {:?}", target);
            return false;
        }
        self.edit_node(node, Edit::Structure, |n| n.instance_nodes.push(target))
    }

    /// Instance a camera under `node`
    pub fn instance_camera(&mut self, node: NodeId, camera: CameraId) -> bool {
        self.edit_node(node, Edit::Structure, |n| n.instance_cameras.push(camera))
    }

    /// Instance a light under `node`
    pub fn instance_light(&mut self, node: NodeId, light: LightId) -> bool {
        self.edit_node(node, Edit::Structure, |n| n.instance_lights.push(light))
    }

    /// Instance geometry under `node`
    pub fn instance_geometry(&mut self, node: NodeId, instance: GeometryInstance) -> bool {
        self.edit_node(node, Edit::Structure, |n| n.instance_geometries.push(instance))
    }

    /// Remove a node, detaching it from its parent; children become roots
    pub fn remove_node(&mut self, id: NodeId) -> Option<Node> {
        let node = self.nodes.remove(id)?;
        if let Some(parent) = node.parent {
            self.edit_node(parent, Edit::Structure, |n| n.children.retain(|c| *c != id));
        }
        for child in &node.children {
            self.edit_node(*child, Edit::Structure, |n| n.parent = None);
        }
        self.versions.touch_structure();
        Some(node)
    }

    /// Whether `ancestor` lies on the parent chain of `node` (inclusive)
    pub fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.nodes.get(id).and_then(|n| n.parent);
        }
        false
    }

    /// Number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

impl Default for SceneDatabase {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::node::TransformElement;

    #[test]
    fn test_value_edit_moves_database_forward() {
        let mut db = SceneDatabase::new();
        let node = db.add_node(Node::new("n"));
        let structure_before = db.versions().structure;
        let value_before = db.versions().value;

        assert!(db.edit_node(node, Edit::Value, |n| {
            n.transforms.push(TransformElement::Translate(Vec3::x()));
        }));

        assert_eq!(db.versions().structure, structure_before);
        assert!(!value_before.as_recent_as(&db.versions().value));
        assert!(db.versions().value.as_recent_as(&db.node(node).unwrap().versions.value));
    }

    #[test]
    fn test_source_edit_bumps_owning_geometry() {
        let mut db = SceneDatabase::new();
        let source = db.add_source(SourceBuffer::new(SourceData::Float(vec![0.0; 9]), 3));
        let mut geometry = Geometry::new("tri");
        geometry.vertex_inputs.push(VertexInput::new("POSITION", source));
        let geometry = db.add_geometry(geometry);
        let before = db.geometry(geometry).unwrap().versions.value;

        db.edit_source(source, Edit::Value, |s| s.data = SourceData::Float(vec![1.0; 9]));

        let after = db.geometry(geometry).unwrap().versions.value;
        assert!(!before.as_recent_as(&after));
        assert_eq!(after, db.source(source).unwrap().versions.value);
    }

    #[test]
    fn test_add_child_rejects_cycles() {
        let mut db = SceneDatabase::new();
        let a = db.add_node(Node::new("a"));
        let b = db.add_node(Node::new("b"));
        assert!(db.add_child(a, b));
        assert!(!db.add_child(b, a));
        assert_eq!(db.node(b).unwrap().parent, Some(a));
    }

    #[test]
    fn test_removed_node_handle_is_stale() {
        let mut db = SceneDatabase::new();
        let a = db.add_node(Node::new("a"));
        assert!(db.remove_node(a).is_some());
        assert!(db.node(a).is_none());
        let b = db.add_node(Node::new("b"));
        assert_ne!(a, b);
        assert!(!db.edit_node(a, Edit::Value, |_| {}));
    }
}
