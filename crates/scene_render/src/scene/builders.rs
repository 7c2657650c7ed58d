//! Convenience constructors for common scene content
//!
//! Used by the demo binary and by tests to assemble small scenes without
//! repeating the effect/profile/technique/pass boilerplate.

use super::database::SceneDatabase;
use super::effect::{Effect, ParamDecl, ParamValue, Profile, ProfileKind, SamplerDesc, Technique};
use super::geometry::{Geometry, PrimitiveSet, SourceBuffer, SourceData, Topology, VertexInput};
use super::handles::{GeometryId, ImageId, MaterialId, PassId};
use super::material::Material;
use super::pass::{AttributeDecl, Pass, UniformDecl};
use crate::foundation::math::{Aabb, Vec3, Vec4};

/// Add a two-triangle quad in the XY plane, indexed with 16-bit indices
pub fn add_quad_geometry(db: &mut SceneDatabase, half_extent: f32, symbol: &str) -> GeometryId {
    let h = half_extent;
    let positions = db.add_source(SourceBuffer::new(
        SourceData::Float(vec![
            -h, -h, 0.0, //
            h, -h, 0.0, //
            -h, h, 0.0, //
            h, h, 0.0,
        ]),
        3,
    ));
    let texcoords = db.add_source(SourceBuffer::new(
        SourceData::Float(vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 1.0]),
        2,
    ));
    let indices = db.add_source(SourceBuffer::new(SourceData::UShort(vec![0, 1, 2, 2, 1, 3]), 1));

    let mut quad = Geometry::new("quad");
    quad.vertex_inputs.push(VertexInput::new("POSITION", positions));
    quad.vertex_inputs.push(VertexInput::new("TEXCOORD", texcoords));
    quad.primitives.push(PrimitiveSet {
        topology: Topology::Triangles,
        count: 2,
        material_symbol: symbol.to_string(),
        indices: Some(indices),
    });
    quad.bounding_box = Some(Aabb::new(Vec3::new(-h, -h, 0.0), Vec3::new(h, h, 0.0)));
    db.add_geometry(quad)
}

/// Add a single-pass GLSL effect with the given pass, returning the pass id
fn add_single_pass_effect(
    db: &mut SceneDatabase,
    name: &str,
    params: Vec<ParamDecl>,
    pass: Pass,
) -> Option<(MaterialId, PassId)> {
    let pass = db.add_pass(pass);
    let mut effect = Effect::new(name);
    effect.params = params;
    let effect = db.add_effect(effect);

    let mut profile = Profile::new(ProfileKind::Glsl);
    profile.techniques.push(Technique {
        sid: "default".to_string(),
        common: false,
        passes: vec![pass],
    });
    db.add_profile(effect, profile)?;

    Some((db.add_material(Material::new(name, effect)), pass))
}

/// Add an untextured, flat-colored material
pub fn add_constant_material(db: &mut SceneDatabase, name: &str, color: Vec4) -> Option<MaterialId> {
    let mut pass = Pass::new("main");
    pass.program.attributes.push(AttributeDecl::new("a_position", "POSITION"));
    pass.program.uniforms.push(UniformDecl::param("u_mvp", "mvp"));
    pass.program.uniforms.push(UniformDecl::param("u_color", "color"));

    let params = vec![
        ParamDecl::new("mvp", ParamValue::Semantic("MODELVIEWPROJECTION_MATRIX".to_string())),
        ParamDecl::new("color", ParamValue::Float4(color)),
    ];
    add_single_pass_effect(db, name, params, pass).map(|(material, _)| material)
}

/// Add a material sampling `image` through its first texture coordinate set
pub fn add_textured_material(db: &mut SceneDatabase, name: &str, image: ImageId) -> Option<MaterialId> {
    let mut pass = Pass::new("main");
    pass.program.attributes.push(AttributeDecl::new("a_position", "POSITION"));
    pass.program.attributes.push(AttributeDecl::new("a_uv", "TEXCOORD"));
    pass.program.uniforms.push(UniformDecl::param("u_mvp", "mvp"));
    pass.program.uniforms.push(UniformDecl::param("u_diffuse", "diffuse"));

    let params = vec![
        ParamDecl::new("mvp", ParamValue::Semantic("MODELVIEWPROJECTION_MATRIX".to_string())),
        ParamDecl::new("diffuse", ParamValue::Sampler(SamplerDesc::new(image))),
    ];
    add_single_pass_effect(db, name, params, pass).map(|(material, _)| material)
}

/// Add a material around a caller-built pass, returning both ids
pub fn add_pass_material(
    db: &mut SceneDatabase,
    name: &str,
    params: Vec<ParamDecl>,
    pass: Pass,
) -> Option<(MaterialId, PassId)> {
    add_single_pass_effect(db, name, params, pass)
}
