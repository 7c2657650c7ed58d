//! Quad demo application
//!
//! Builds a one-quad scene seen through a perspective camera, resolves its
//! render list, refreshes the transform cache and logs every action the
//! executor would replay.
//!
//! Usage: `quad_app [renderer.toml|renderer.ron]`

use scene_render::config::{Config, ConfigError, RendererConfig};
use scene_render::foundation::logging;
use scene_render::foundation::math::{Vec3, Vec4};
use scene_render::render::action::{RenderAction, UniformValue};
use scene_render::render::{CacheError, RenderList, TransformCache};
use scene_render::scene::builders::{add_constant_material, add_quad_geometry};
use scene_render::scene::{
    Camera, Edit, EvaluateScene, GeometryInstance, Light, LightKind, MaterialBinding, Node, RenderItem,
    SceneDatabase, TransformElement, VisualScene, VisualSceneId,
};
use thiserror::Error;

const WIDTH: u32 = 800;
const HEIGHT: u32 = 600;

#[derive(Debug, Error)]
enum AppError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("transform cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("scene setup failed: {0}")]
    Setup(&'static str),
}

fn build_scene(db: &mut SceneDatabase) -> Result<VisualSceneId, AppError> {
    let geometry = add_quad_geometry(db, 1.0, "surface");
    let material = add_constant_material(db, "warm", Vec4::new(0.8, 0.7, 0.5, 1.0))
        .ok_or(AppError::Setup("constant material"))?;
    let binding = db.add_binding(MaterialBinding::new("surface", material));

    let root = db.add_node(Node::new("root"));
    let quad = db.add_node(Node::new("quad").with_transform(TransformElement::Rotate {
        axis: Vec3::new(0.0, 1.0, 0.0),
        degrees: 30.0,
    }));
    db.add_child(root, quad);
    db.instance_geometry(quad, GeometryInstance { geometry, bindings: vec![binding] });

    let camera = db.add_camera(Camera::perspective("main_camera", 45.0, 0.1, 100.0));
    let eye = db.add_node(Node::new("eye").with_transform(TransformElement::LookAt {
        eye: Vec3::new(2.0, 2.0, 10.0),
        target: Vec3::zeros(),
        up: Vec3::new(0.0, 1.0, 0.0),
    }));
    db.add_child(root, eye);
    db.instance_camera(eye, camera);

    let sun = db.add_light(Light::new("sun", LightKind::Directional, Vec3::new(1.0, 1.0, 1.0)));
    let sun_node = db.add_node(Node::new("sun").with_transform(TransformElement::Rotate {
        axis: Vec3::new(1.0, 0.0, 0.0),
        degrees: -45.0,
    }));
    db.add_child(root, sun_node);
    db.instance_light(sun_node, sun);

    let scene = db.add_visual_scene(VisualScene::new("quad_scene", root));
    let item = RenderItem { camera_node: Some(eye), ..Default::default() };
    db.edit_visual_scene(scene, Edit::Structure, |s| {
        s.evaluate_scenes.push(EvaluateScene::new("main", vec![item]));
    });
    Ok(scene)
}

fn log_action(index: usize, action: &RenderAction, cache: &TransformCache) {
    match action {
        RenderAction::SetUniforms(uniforms) => {
            log::info!("{:3}: {:?} ({} uniforms)", index, action.kind(), uniforms.uniforms.len());
            for binding in &uniforms.uniforms {
                match &binding.value {
                    UniformValue::Semantic { semantic, value } => match cache.value(*value) {
                        Ok(value) => log::info!("       {} = {} {:?}", binding.symbol, semantic, value),
                        Err(err) => log::warn!("       {} = {}: {}", binding.symbol, semantic, err),
                    },
                    other => log::info!("       {} = {:?}", binding.symbol, other),
                }
            }
        }
        RenderAction::DrawIndexed(draw) => {
            let visible = draw.visible.and_then(|flag| cache.value(flag).ok()).and_then(|v| v.as_flag());
            log::info!(
                "{:3}: {:?} {:?} x{} visible={:?}",
                index,
                action.kind(),
                draw.primitive,
                draw.index_count,
                visible
            );
        }
        _ => log::info!("{:3}: {:?}", index, action.kind()),
    }
}

fn run() -> Result<(), AppError> {
    let config = match std::env::args().nth(1) {
        Some(path) => {
            log::info!("Loading renderer configuration from {}", path);
            RendererConfig::load_from_file(path)?
        }
        None => RendererConfig::default(),
    };
    config.validate()?;

    let mut db = SceneDatabase::new();
    let scene = build_scene(&mut db)?;

    let mut cache = TransformCache::with_config(&config.transform_cache)?;
    let mut list = RenderList::with_config(&config.render_list);
    if !list.build(&db, &mut cache, scene) {
        return Err(AppError::Setup("render list was not built"));
    }
    cache.update(&db, WIDTH, HEIGHT);

    let memoized = list.resolver().cached_actions();
    log::info!(
        "Render list: {} actions, {} draws, {} memoized actions, {} cached values",
        list.len(),
        list.stats().render_items,
        memoized,
        cache.len()
    );
    for (index, action) in list.actions().iter().enumerate() {
        log_action(index, action, &cache);
    }

    // A second build sees no edits and keeps the list
    if list.build(&db, &mut cache, scene) {
        log::warn!("Render list rebuilt without scene edits");
    }
    Ok(())
}

fn main() {
    logging::init();
    log::info!("Starting quad demo...");

    if let Err(err) = run() {
        log::error!("Quad demo failed: {}", err);
        std::process::exit(1);
    }
    log::info!("Quad demo finished");
}
