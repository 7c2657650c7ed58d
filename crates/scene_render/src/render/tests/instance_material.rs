//! Render items that name their own material

use std::sync::Arc;

use super::{count, QuadScene};
use crate::render::action::{ActionKind, GpuPrimitive, RenderAction};
use crate::render::render_list::RenderList;
use crate::foundation::math::Vec3;
use crate::render::transform_cache::TransformCache;
use crate::scene::builders::add_pass_material;
use crate::scene::{
    AttributeDecl, Camera, DrawMode, Edit, EvaluateScene, Image, InstanceMaterial, MaterialId, Node,
    NodeId, ParamValue, Pass, RenderItem, RenderTargetDecl, TargetSource, TransformElement, UniformDecl,
};

fn pass_with_draw(sid: &str, draw: DrawMode) -> Pass {
    let mut pass = Pass::new(sid);
    pass.program.attributes.push(AttributeDecl::new("a_position", "POSITION"));
    pass.program.uniforms.push(UniformDecl::value("u_strength", ParamValue::Float(0.5)));
    pass.draw = draw;
    pass
}

fn render_with(quad: &mut QuadScene, material: MaterialId, pass: Option<&str>) {
    render_from(quad, None, material, pass);
}

fn render_from(quad: &mut QuadScene, camera_node: Option<NodeId>, material: MaterialId, pass: Option<&str>) {
    let item = RenderItem {
        camera_node,
        instance_material: Some(InstanceMaterial {
            material,
            technique: None,
            pass: pass.map(str::to_string),
        }),
        ..Default::default()
    };
    quad.db.edit_visual_scene(quad.scene, Edit::Structure, |s| {
        s.evaluate_scenes.push(EvaluateScene::new("post", vec![item]));
    });
}

#[test]
fn test_full_screen_quad_pass_draws_the_builtin_quad() {
    let mut quad = QuadScene::new();
    let pass = pass_with_draw("post", DrawMode::FullScreenQuad);
    let (post, post_pass) = add_pass_material(&mut quad.db, "post", Vec::new(), pass).unwrap();
    render_with(&mut quad, post, None);

    let mut cache = TransformCache::new();
    let mut list = RenderList::new();
    assert!(list.build(&quad.db, &mut cache, quad.scene));

    assert_eq!(list.stats().render_items, 1);
    assert_eq!(count(&list, ActionKind::DrawIndexed), 0);
    let draw = list
        .actions()
        .iter()
        .find_map(|action| match action {
            RenderAction::Draw(draw) => Some(draw.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(draw.geometry, quad.db.fullscreen_quad());
    assert_eq!(draw.primitive, GpuPrimitive::TriangleStrip);
    assert_eq!(draw.vertex_count, 4);

    let pass = list
        .actions()
        .iter()
        .find_map(|action| match action {
            RenderAction::SetPass(pass) => Some(pass.pass),
            _ => None,
        })
        .unwrap();
    assert_eq!(pass, post_pass);
    let local = list
        .actions()
        .iter()
        .find_map(|action| match action {
            RenderAction::SetLocalCoords(local) => Some(local.coords.path.is_empty()),
            _ => None,
        })
        .unwrap();
    assert!(local);
}

#[test]
fn test_full_screen_quad_is_never_culled() {
    let mut quad = QuadScene::new();
    let camera = quad.db.add_camera(Camera::perspective("eye", 60.0, 0.1, 100.0));
    let eye = quad
        .db
        .add_node(Node::new("eye").with_transform(TransformElement::Translate(Vec3::new(0.0, 0.0, -5.0))));
    let root = quad.root;
    quad.db.add_child(root, eye);
    quad.db.instance_camera(eye, camera);
    let pass = pass_with_draw("post", DrawMode::FullScreenQuad);
    let (post, _) = add_pass_material(&mut quad.db, "post", Vec::new(), pass).unwrap();
    render_from(&mut quad, Some(eye), post, None);

    let mut cache = TransformCache::new();
    let mut list = RenderList::new();
    assert!(list.build(&quad.db, &mut cache, quad.scene));
    cache.update(&quad.db, 640, 480);

    assert_eq!(count(&list, ActionKind::ViewCoords), 1);
    let draws: Vec<_> = list
        .actions()
        .iter()
        .filter_map(|action| match action {
            RenderAction::Draw(draw) => Some(draw.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(draws.len(), 1);
    assert_eq!(draws[0].geometry, quad.db.fullscreen_quad());
    assert!(draws[0].visible.is_none());
}

#[test]
fn test_scene_geometry_pass_overrides_every_material() {
    let mut quad = QuadScene::new();
    let pass = pass_with_draw("depth_only", DrawMode::SceneGeometry);
    let (depth, depth_pass) = add_pass_material(&mut quad.db, "depth", Vec::new(), pass).unwrap();
    render_with(&mut quad, depth, None);

    let mut cache = TransformCache::new();
    let mut list = RenderList::new();
    assert!(list.build(&quad.db, &mut cache, quad.scene));

    let passes: Vec<_> = list
        .actions()
        .iter()
        .filter_map(|action| match action {
            RenderAction::SetPass(pass) => Some(pass.pass),
            _ => None,
        })
        .collect();
    assert_eq!(passes, vec![depth_pass]);
    assert_eq!(count(&list, ActionKind::DrawIndexed), 1);
}

#[test]
fn test_scene_image_pass_redirects_output() {
    let mut quad = QuadScene::new();
    let image = quad.db.add_image(Image::new_2d("reflection", 256, 256));
    let mut pass = pass_with_draw("reflect", DrawMode::SceneImage);
    pass.render_targets.push(RenderTargetDecl::color(0, TargetSource::Image(image)));
    let (reflect, _) = add_pass_material(&mut quad.db, "reflect", Vec::new(), pass).unwrap();
    render_with(&mut quad, reflect, None);

    let mut cache = TransformCache::new();
    let mut list = RenderList::new();
    assert!(list.build(&quad.db, &mut cache, quad.scene));

    match &list[0] {
        RenderAction::SetFramebuffer(fb) => assert_eq!(fb.first_color_target(), Some(image)),
        other => panic!("expected the redirected framebuffer first, got {other:?}"),
    }
    let defaults = list.resolver().defaults().clone();
    match list.actions().last().unwrap() {
        RenderAction::SetFramebuffer(fb) => assert!(Arc::ptr_eq(fb, &defaults.framebuffer)),
        other => panic!("expected the default framebuffer to be restored, got {other:?}"),
    }
    assert_eq!(count(&list, ActionKind::DrawIndexed), 1);
}

#[test]
fn test_unknown_pass_sid_skips_the_item() {
    let mut quad = QuadScene::new();
    let pass = pass_with_draw("post", DrawMode::FullScreenQuad);
    let (post, _) = add_pass_material(&mut quad.db, "post", Vec::new(), pass).unwrap();
    render_with(&mut quad, post, Some("missing"));

    let mut cache = TransformCache::new();
    let mut list = RenderList::new();
    assert!(list.build(&quad.db, &mut cache, quad.scene));
    assert!(list.is_empty());
    assert_eq!(list.stats().skipped_batches, 1);
}

#[test]
fn test_named_pass_is_selected() {
    let mut quad = QuadScene::new();
    let pass = pass_with_draw("post", DrawMode::FullScreenQuad);
    let (post, post_pass) = add_pass_material(&mut quad.db, "post", Vec::new(), pass).unwrap();
    render_with(&mut quad, post, Some("post"));

    let mut cache = TransformCache::new();
    let mut list = RenderList::new();
    assert!(list.build(&quad.db, &mut cache, quad.scene));
    assert!(list.actions().iter().any(|a| matches!(a, RenderAction::SetPass(p) if p.pass == post_pass)));
    assert_eq!(count(&list, ActionKind::Draw), 1);
}
