//! Parameter merging and technique selection

use std::collections::HashMap;

use crate::render::error::ResolveError;
use crate::scene::{
    Effect, Material, MaterialId, ParamValue, PassId, Profile, ProfileId, ProfileMask,
    SceneDatabase, StateArg,
};

/// Longest parameter reference chain followed before giving up
const MAX_PARAM_DEPTH: usize = 16;

/// The merged parameter table of one (material, pass) pair
///
/// Precedence, lowest first: effect defaults, profile overrides, material
/// `set_param` overrides.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedParams {
    /// Material the table was merged for
    pub material: MaterialId,
    /// Pass the table was merged for
    pub pass: PassId,
    values: HashMap<String, ParamValue>,
}

impl ResolvedParams {
    pub(crate) fn merge(
        material_id: MaterialId,
        pass: PassId,
        effect: &Effect,
        profile: &Profile,
        material: &Material,
    ) -> Self {
        let values = effect
            .params
            .iter()
            .chain(&profile.params)
            .chain(&material.set_params)
            .map(|decl| (decl.name.clone(), decl.value.clone()))
            .collect();
        Self { material: material_id, pass, values }
    }

    /// Declared value of a parameter, without following references
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    /// Number of parameters
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value of a parameter, following parameter references
    pub fn lookup(&self, name: &str) -> Result<&ParamValue, ResolveError> {
        let value = self
            .values
            .get(name)
            .ok_or_else(|| ResolveError::UnresolvedParam(name.to_string()))?;
        self.resolve(value)
    }

    /// Follow `value` through parameter references to a concrete value
    pub fn resolve<'a>(&'a self, value: &'a ParamValue) -> Result<&'a ParamValue, ResolveError> {
        let mut current = value;
        let mut seen: Vec<&str> = Vec::new();
        while let ParamValue::Param(name) = current {
            if seen.contains(&name.as_str()) || seen.len() >= MAX_PARAM_DEPTH {
                return Err(ResolveError::ParamCycle(name.clone()));
            }
            seen.push(name);
            current = self
                .values
                .get(name)
                .ok_or_else(|| ResolveError::UnresolvedParam(name.clone()))?;
        }
        Ok(current)
    }

    /// Resolve a state-block argument that may name a parameter
    pub fn state_arg<T: Clone>(
        &self,
        arg: &StateArg<T>,
        expected: &'static str,
        extract: impl Fn(&ParamValue) -> Option<T>,
    ) -> Result<T, ResolveError> {
        match arg {
            StateArg::Value(value) => Ok(value.clone()),
            StateArg::Param(name) => {
                let value = self.lookup(name)?;
                extract(value).ok_or_else(|| ResolveError::ParamType {
                    name: name.clone(),
                    expected,
                    found: value.type_name(),
                })
            }
        }
    }
}

/// The technique chosen for a material
#[derive(Debug, Clone, PartialEq)]
pub struct TechniqueChoice {
    /// Profile holding the technique
    pub profile: ProfileId,
    /// Technique sid
    pub sid: String,
    /// Fixed shading model, drawn with its first pass only
    pub common: bool,
    /// Passes in order
    pub passes: Vec<PassId>,
}

/// Pick a technique of `material` usable with the `active` profiles
///
/// A technique matching `hint` (or the material's own hint) wins; otherwise
/// the first technique of the first usable profile is taken.
pub fn select_technique(
    db: &SceneDatabase,
    material_id: MaterialId,
    hint: Option<&str>,
    active: ProfileMask,
) -> Result<TechniqueChoice, ResolveError> {
    let material = db.material(material_id).ok_or(ResolveError::UnknownMaterial(material_id))?;
    let effect = db.effect(material.effect).ok_or(ResolveError::UnknownEffect(material.effect))?;
    let hint = hint.or(material.technique_hint.as_deref());

    let mut usable = Vec::with_capacity(effect.profiles.len());
    for id in &effect.profiles {
        let profile = db.profile(*id).ok_or(ResolveError::UnknownProfile(*id))?;
        if active.intersects(profile.kind.mask()) {
            usable.push((*id, profile));
        }
    }

    let choose = |(id, profile): &(ProfileId, &Profile), sid: Option<&str>| {
        profile.technique(sid).map(|technique| TechniqueChoice {
            profile: *id,
            sid: technique.sid.clone(),
            common: technique.common,
            passes: technique.passes.clone(),
        })
    };

    if let Some(sid) = hint {
        if let Some(choice) = usable.iter().find_map(|entry| choose(entry, Some(sid))) {
            return Ok(choice);
        }
        log::debug!("Technique '{}' not found for material {:?}, using the first one", sid, material_id);
    }
    usable
        .iter()
        .find_map(|entry| choose(entry, None))
        .ok_or(ResolveError::NoTechnique { material: material_id })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec4;
    use crate::scene::{ParamDecl, Pass, ProfileKind, Technique};

    fn table(entries: Vec<(&str, ParamValue)>) -> ResolvedParams {
        let mut db = SceneDatabase::new();
        let pass = db.add_pass(Pass::new("p"));
        let effect = Effect::new("e");
        let profile = Profile::new(ProfileKind::Glsl);
        let mut material = Material::new("m", db.add_effect(Effect::new("unused")));
        material.set_params = entries.into_iter().map(|(n, v)| ParamDecl::new(n, v)).collect();
        let material_id = db.add_material(material.clone());
        ResolvedParams::merge(material_id, pass, &effect, &profile, &material)
    }

    #[test]
    fn test_material_overrides_profile_overrides_effect() {
        let mut db = SceneDatabase::new();
        let pass = db.add_pass(Pass::new("p"));
        let mut effect = Effect::new("e");
        effect.params.push(ParamDecl::new("a", ParamValue::Float(1.0)));
        effect.params.push(ParamDecl::new("b", ParamValue::Float(1.0)));
        effect.params.push(ParamDecl::new("c", ParamValue::Float(1.0)));
        let mut profile = Profile::new(ProfileKind::Glsl);
        profile.params.push(ParamDecl::new("b", ParamValue::Float(2.0)));
        profile.params.push(ParamDecl::new("c", ParamValue::Float(2.0)));
        let effect_id = db.add_effect(effect.clone());
        let mut material = Material::new("m", effect_id);
        material.set_params.push(ParamDecl::new("c", ParamValue::Float(3.0)));
        let material_id = db.add_material(material.clone());

        let params = ResolvedParams::merge(material_id, pass, &effect, &profile, &material);
        assert_eq!(params.lookup("a").unwrap(), &ParamValue::Float(1.0));
        assert_eq!(params.lookup("b").unwrap(), &ParamValue::Float(2.0));
        assert_eq!(params.lookup("c").unwrap(), &ParamValue::Float(3.0));
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn test_references_are_followed_and_cycles_reported() {
        let params = table(vec![
            ("color", ParamValue::Param("base".into())),
            ("base", ParamValue::Float4(Vec4::x())),
            ("loop_a", ParamValue::Param("loop_b".into())),
            ("loop_b", ParamValue::Param("loop_a".into())),
            ("dangling", ParamValue::Param("nowhere".into())),
        ]);
        assert_eq!(params.lookup("color").unwrap(), &ParamValue::Float4(Vec4::x()));
        assert!(matches!(params.lookup("loop_a"), Err(ResolveError::ParamCycle(_))));
        assert!(matches!(params.lookup("dangling"), Err(ResolveError::UnresolvedParam(n)) if n == "nowhere"));
    }

    #[test]
    fn test_state_arg_type_mismatch() {
        let params = table(vec![("size", ParamValue::Float(4.0)), ("flag", ParamValue::Bool(true))]);
        let float = |v: &ParamValue| match v {
            ParamValue::Float(f) => Some(*f),
            _ => None,
        };
        assert_eq!(params.state_arg(&StateArg::Param("size".into()), "float", float).unwrap(), 4.0);
        assert_eq!(params.state_arg(&StateArg::Value(2.0), "float", float).unwrap(), 2.0);
        assert!(matches!(
            params.state_arg(&StateArg::Param("flag".into()), "float", float),
            Err(ResolveError::ParamType { found: "bool", .. })
        ));
    }

    #[test]
    fn test_technique_selection_honors_profiles_and_hint() {
        let mut db = SceneDatabase::new();
        let p1 = db.add_pass(Pass::new("p1"));
        let p2 = db.add_pass(Pass::new("p2"));
        let effect = db.add_effect(Effect::new("e"));

        let mut common = Profile::new(ProfileKind::Common);
        common.techniques.push(Technique { sid: "fixed".into(), common: true, passes: vec![p1] });
        db.add_profile(effect, common).unwrap();
        let mut glsl = Profile::new(ProfileKind::Glsl);
        glsl.techniques.push(Technique { sid: "fast".into(), common: false, passes: vec![p1] });
        glsl.techniques.push(Technique { sid: "fancy".into(), common: false, passes: vec![p1, p2] });
        db.add_profile(effect, glsl).unwrap();
        let material = db.add_material(Material::new("m", effect));

        let all = select_technique(&db, material, None, ProfileMask::all()).unwrap();
        assert_eq!(all.sid, "fixed");
        assert!(all.common);

        let glsl_only = select_technique(&db, material, None, ProfileMask::GLSL).unwrap();
        assert_eq!(glsl_only.sid, "fast");

        let hinted = select_technique(&db, material, Some("fancy"), ProfileMask::all()).unwrap();
        assert_eq!(hinted.passes, vec![p1, p2]);

        let unknown_hint = select_technique(&db, material, Some("missing"), ProfileMask::GLSL).unwrap();
        assert_eq!(unknown_hint.sid, "fast");

        assert!(matches!(
            select_technique(&db, material, None, ProfileMask::CG),
            Err(ResolveError::NoTechnique { .. })
        ));
    }
}
