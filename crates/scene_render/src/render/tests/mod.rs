//! Render list scenarios built through the public scene database API

mod instance_material;
mod scenarios;

use crate::foundation::logging;
use crate::foundation::math::Vec4;
use crate::render::action::{ActionKind, RenderAction};
use crate::render::render_list::RenderList;
use crate::scene::builders::{add_constant_material, add_quad_geometry};
use crate::scene::{
    GeometryId, GeometryInstance, MaterialBinding, MaterialId, Node, NodeId, SceneDatabase,
    VisualScene, VisualSceneId,
};

/// A root with one child drawing the shared quad
pub(super) struct QuadScene {
    pub db: SceneDatabase,
    pub scene: VisualSceneId,
    pub root: NodeId,
    pub geometry: GeometryId,
    pub material: MaterialId,
}

impl QuadScene {
    pub fn new() -> Self {
        logging::init_for_tests();
        let mut db = SceneDatabase::new();
        let geometry = add_quad_geometry(&mut db, 1.0, "surface");
        let material = add_constant_material(&mut db, "red", Vec4::new(1.0, 0.0, 0.0, 1.0)).unwrap();
        let root = db.add_node(Node::new("root"));
        let scene = db.add_visual_scene(VisualScene::new("main", root));
        let mut quad = Self { db, scene, root, geometry, material };
        quad.add_quad_node("quad", root, material);
        quad
    }

    /// Add a child of `parent` drawing the quad with `material`
    pub fn add_quad_node(&mut self, name: &str, parent: NodeId, material: MaterialId) -> NodeId {
        let node = self.db.add_node(Node::new(name));
        self.db.add_child(parent, node);
        self.instance_quad(node, material);
        node
    }

    /// Draw the quad at `node` with `material`
    pub fn instance_quad(&mut self, node: NodeId, material: MaterialId) {
        let binding = self.db.add_binding(MaterialBinding::new("surface", material));
        self.db.instance_geometry(node, GeometryInstance { geometry: self.geometry, bindings: vec![binding] });
    }
}

pub(super) fn kinds(list: &RenderList) -> Vec<ActionKind> {
    list.actions().iter().map(RenderAction::kind).collect()
}

pub(super) fn count(list: &RenderList, kind: ActionKind) -> usize {
    list.actions().iter().filter(|a| a.kind() == kind).count()
}
