//! Whole-list scenarios: action order, rebuild rules, layers and culling

use super::{count, kinds, QuadScene};
use crate::foundation::math::{Mat4, Vec3};
use crate::render::action::{ActionKind, RenderAction, UniformValue};
use crate::render::render_list::RenderList;
use crate::render::transform_cache::{TransformCache, Value};
use crate::scene::builders::{add_pass_material, add_textured_material};
use crate::scene::{
    AttributeDecl, Camera, Edit, EvaluateScene, GeometryInstance, Image, Node, Pass, RenderItem,
    SceneDatabase, TransformElement, VisualScene,
};

#[test]
fn test_single_quad_produces_minimal_sequence() {
    let quad = QuadScene::new();
    let mut cache = TransformCache::new();
    let mut list = RenderList::new();

    assert!(list.build(&quad.db, &mut cache, quad.scene));
    assert_eq!(
        kinds(&list),
        vec![
            ActionKind::Framebuffer,
            ActionKind::Raster,
            ActionKind::PixelOps,
            ActionKind::FbCtrl,
            ActionKind::LocalCoords,
            ActionKind::Pass,
            ActionKind::Uniforms,
            ActionKind::Inputs,
            ActionKind::DrawIndexed,
        ]
    );
    match &list[8] {
        RenderAction::DrawIndexed(draw) => {
            assert_eq!(draw.geometry, quad.geometry);
            assert_eq!(draw.index_count, 6);
        }
        other => panic!("expected an indexed draw, got {other:?}"),
    }
    assert_eq!(list.stats().render_items, 1);
    assert_eq!(list.stats().skipped_batches, 0);
    assert_eq!(list.visual_scene(), Some(quad.scene));
}

#[test]
fn test_second_build_without_edits_is_a_no_op() {
    let quad = QuadScene::new();
    let mut cache = TransformCache::new();
    let mut list = RenderList::new();

    assert!(list.build(&quad.db, &mut cache, quad.scene));
    let before: Vec<RenderAction> = list.actions().to_vec();
    let built_at = list.built_at();

    assert!(!list.build(&quad.db, &mut cache, quad.scene));
    assert_eq!(list.len(), before.len());
    assert!(list.actions().iter().zip(&before).all(|(a, b)| a.same_as(b)));
    assert_eq!(list.built_at(), built_at);
}

#[test]
fn test_structure_edit_triggers_rebuild() {
    let mut quad = QuadScene::new();
    let mut cache = TransformCache::new();
    let mut list = RenderList::new();
    assert!(list.build(&quad.db, &mut cache, quad.scene));

    let material = quad.material;
    let root = quad.root;
    quad.add_quad_node("second", root, material);
    assert!(list.build(&quad.db, &mut cache, quad.scene));
    assert_eq!(count(&list, ActionKind::DrawIndexed), 2);
}

#[test]
fn test_value_edit_does_not_rebuild() {
    let mut quad = QuadScene::new();
    let mut cache = TransformCache::new();
    let mut list = RenderList::new();
    assert!(list.build(&quad.db, &mut cache, quad.scene));

    let root = quad.root;
    quad.db.edit_node(root, Edit::Value, |n| {
        n.transforms.push(TransformElement::Translate(Vec3::new(1.0, 0.0, 0.0)));
    });
    assert!(!list.build(&quad.db, &mut cache, quad.scene));
}

#[test]
fn test_unknown_visual_scene_clears_the_list() {
    let quad = QuadScene::new();
    let mut cache = TransformCache::new();
    let mut list = RenderList::new();
    assert!(list.build(&quad.db, &mut cache, quad.scene));

    let mut other = SceneDatabase::new();
    let stray_root = other.add_node(Node::new("stray"));
    let stray = other.add_visual_scene(VisualScene::new("stray", stray_root));

    let empty = SceneDatabase::new();
    assert!(!list.build(&empty, &mut cache, stray));
    assert!(list.is_empty());
    assert_eq!(list.visual_scene(), None);
}

#[test]
fn test_layerless_node_is_drawn_for_disjoint_layer_requests() {
    let mut quad = QuadScene::new();
    let only_a = quad.db.add_node(Node::new("only_a").with_layer("a"));
    quad.db.add_child(quad.root, only_a);
    let material = quad.material;
    quad.instance_quad(only_a, material);

    let items = vec![
        RenderItem { layers: vec!["a".into()], ..Default::default() },
        RenderItem { layers: vec!["b".into()], ..Default::default() },
    ];
    quad.db.edit_visual_scene(quad.scene, Edit::Structure, |s| {
        s.evaluate_scenes.push(EvaluateScene::new("layers", items));
    });

    let mut cache = TransformCache::new();
    let mut list = RenderList::new();
    assert!(list.build(&quad.db, &mut cache, quad.scene));
    // layerless quad twice, the "a" quad once
    assert_eq!(count(&list, ActionKind::DrawIndexed), 3);
}

#[test]
fn test_disabled_evaluate_scene_is_skipped() {
    let mut quad = QuadScene::new();
    let mut block = EvaluateScene::new("off", vec![RenderItem::default()]);
    block.enabled = false;
    quad.db.edit_visual_scene(quad.scene, Edit::Structure, |s| s.evaluate_scenes.push(block));

    let mut cache = TransformCache::new();
    let mut list = RenderList::new();
    assert!(list.build(&quad.db, &mut cache, quad.scene));
    assert!(list.is_empty());
}

#[test]
fn test_textured_material_binds_samplers_before_uniforms() {
    let mut quad = QuadScene::new();
    let image = quad.db.add_image(Image::new_2d("checker", 32, 32));
    let textured = add_textured_material(&mut quad.db, "checker", image).unwrap();
    let root = quad.root;
    quad.add_quad_node("textured", root, textured);

    let mut cache = TransformCache::new();
    let mut list = RenderList::new();
    assert!(list.build(&quad.db, &mut cache, quad.scene));

    let order = kinds(&list);
    let samplers = order.iter().position(|k| *k == ActionKind::Samplers).unwrap();
    let uniforms = order.iter().rposition(|k| *k == ActionKind::Uniforms).unwrap();
    assert!(samplers < uniforms);
    assert_eq!(count(&list, ActionKind::Samplers), 1);
    assert_eq!(count(&list, ActionKind::Pass), 2);
}

#[test]
fn test_batch_missing_vertex_semantic_is_skipped() {
    let mut quad = QuadScene::new();
    let mut pass = Pass::new("lit");
    pass.program.attributes.push(AttributeDecl::new("a_normal", "NORMAL"));
    let (lit, _) = add_pass_material(&mut quad.db, "lit", Vec::new(), pass).unwrap();
    let root = quad.root;
    quad.add_quad_node("lit_quad", root, lit);

    let mut cache = TransformCache::new();
    let mut list = RenderList::new();
    assert!(list.build(&quad.db, &mut cache, quad.scene));
    assert_eq!(list.stats().render_items, 1);
    assert_eq!(list.stats().skipped_batches, 1);
    assert_eq!(count(&list, ActionKind::DrawIndexed), 1);
}

#[test]
fn test_unbound_symbol_is_skipped() {
    let mut quad = QuadScene::new();
    let bare = quad.db.add_node(Node::new("bare"));
    quad.db.add_child(quad.root, bare);
    let geometry = quad.geometry;
    quad.db.instance_geometry(bare, GeometryInstance { geometry, bindings: Vec::new() });

    let mut cache = TransformCache::new();
    let mut list = RenderList::new();
    assert!(list.build(&quad.db, &mut cache, quad.scene));
    assert_eq!(list.stats().skipped_batches, 1);
    assert_eq!(list.stats().render_items, 1);
}

#[test]
fn test_instancing_cycle_does_not_hang_the_build() {
    let mut quad = QuadScene::new();
    let a = quad.db.add_node(Node::new("a"));
    let b = quad.db.add_node(Node::new("b"));
    quad.db.add_child(quad.root, a);
    quad.db.instance_node(a, b);
    quad.db.instance_node(b, a);
    let material = quad.material;
    quad.instance_quad(b, material);

    let mut cache = TransformCache::new();
    let mut list = RenderList::new();
    assert!(list.build(&quad.db, &mut cache, quad.scene));
    assert!(count(&list, ActionKind::DrawIndexed) >= 2);
}

#[test]
fn test_camera_item_sets_view_and_culls() {
    let mut quad = QuadScene::new();
    let camera = quad.db.add_camera(Camera::perspective("eye", 60.0, 0.1, 100.0));
    let eye = quad
        .db
        .add_node(Node::new("eye").with_transform(TransformElement::Translate(Vec3::new(0.0, 0.0, 5.0))));
    quad.db.add_child(quad.root, eye);
    quad.db.instance_camera(eye, camera);

    let behind = quad
        .db
        .add_node(Node::new("behind").with_transform(TransformElement::Translate(Vec3::new(0.0, 0.0, 20.0))));
    quad.db.add_child(quad.root, behind);
    let material = quad.material;
    quad.instance_quad(behind, material);

    let item = RenderItem { camera_node: Some(eye), ..Default::default() };
    quad.db.edit_visual_scene(quad.scene, Edit::Structure, |s| {
        s.evaluate_scenes.push(EvaluateScene::new("camera", vec![item]));
    });

    let mut cache = TransformCache::new();
    let mut list = RenderList::new();
    assert!(list.build(&quad.db, &mut cache, quad.scene));
    assert_eq!(list[0].kind(), ActionKind::ViewCoords);
    cache.update(&quad.db, 640, 480);

    let visibility: Vec<bool> = list
        .actions()
        .iter()
        .filter_map(|action| match action {
            RenderAction::DrawIndexed(draw) => draw.visible,
            _ => None,
        })
        .map(|flag| cache.value(flag).unwrap().as_flag().unwrap())
        .collect();
    assert_eq!(visibility, vec![true, false]);

    let mvp = list
        .actions()
        .iter()
        .find_map(|action| match action {
            RenderAction::SetUniforms(uniforms) => match uniforms.uniforms[0].value {
                UniformValue::Semantic { value, .. } => Some(value),
                _ => None,
            },
            _ => None,
        })
        .unwrap();
    assert!(matches!(cache.value(mvp).unwrap(), Value::Matrix(m) if m != Mat4::identity()));
}

#[test]
fn test_each_camera_item_culls_from_its_own_view() {
    let mut quad = QuadScene::new();
    let camera = quad.db.add_camera(Camera::perspective("eye", 60.0, 0.1, 100.0));
    let mut eyes = Vec::new();
    for (name, z) in [("front", 5.0), ("past", -5.0)] {
        let eye = quad
            .db
            .add_node(Node::new(name).with_transform(TransformElement::Translate(Vec3::new(0.0, 0.0, z))));
        quad.db.add_child(quad.root, eye);
        quad.db.instance_camera(eye, camera);
        eyes.push(eye);
    }

    let items = eyes
        .iter()
        .map(|eye| RenderItem { camera_node: Some(*eye), ..Default::default() })
        .collect();
    quad.db.edit_visual_scene(quad.scene, Edit::Structure, |s| {
        s.evaluate_scenes.push(EvaluateScene::new("two_views", items));
    });

    let mut cache = TransformCache::new();
    let mut list = RenderList::new();
    assert!(list.build(&quad.db, &mut cache, quad.scene));
    assert_eq!(count(&list, ActionKind::ViewCoords), 2);
    cache.update(&quad.db, 640, 480);

    let flags: Vec<_> = list
        .actions()
        .iter()
        .filter_map(|action| match action {
            RenderAction::DrawIndexed(draw) => Some(draw.visible),
            _ => None,
        })
        .collect();
    assert_eq!(flags.len(), 2);
    assert_ne!(flags[0], flags[1]);
    let visibility: Vec<_> = flags
        .into_iter()
        .map(|flag| flag.and_then(|flag| cache.value(flag).ok()).and_then(|v| v.as_flag()))
        .collect();
    assert_eq!(visibility, vec![Some(true), Some(false)]);
}

#[test]
fn test_clear_forces_a_rebuild() {
    let quad = QuadScene::new();
    let mut cache = TransformCache::new();
    let mut list = RenderList::new();
    assert!(list.build(&quad.db, &mut cache, quad.scene));
    list.clear();
    assert!(list.is_empty());
    assert!(list.build(&quad.db, &mut cache, quad.scene));
    assert!(!list.is_empty());
}
