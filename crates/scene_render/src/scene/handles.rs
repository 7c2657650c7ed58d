//! Generation-checked handles for every scene entity type
//!
//! A handle is an arena index plus a generation counter, so comparing or
//! hashing handles is always safe and a handle to a removed entity is
//! detected as stale instead of aliasing whatever reuses its slot.

use slotmap::new_key_type;

new_key_type! {
    /// Handle to a [`Node`](super::Node)
    pub struct NodeId;
    /// Handle to a [`Camera`](super::Camera)
    pub struct CameraId;
    /// Handle to a [`Light`](super::Light)
    pub struct LightId;
    /// Handle to an [`Effect`](super::Effect)
    pub struct EffectId;
    /// Handle to a [`Profile`](super::Profile)
    pub struct ProfileId;
    /// Handle to a technique [`Pass`](super::Pass)
    pub struct PassId;
    /// Handle to a [`Material`](super::Material)
    pub struct MaterialId;
    /// Handle to a [`MaterialBinding`](super::MaterialBinding)
    pub struct BindingId;
    /// Handle to a [`Geometry`](super::Geometry)
    pub struct GeometryId;
    /// Handle to a [`SourceBuffer`](super::SourceBuffer)
    pub struct SourceId;
    /// Handle to an [`Image`](super::Image)
    pub struct ImageId;
    /// Handle to a [`VisualScene`](super::VisualScene)
    pub struct VisualSceneId;
}
