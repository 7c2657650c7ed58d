//! Images used as textures and render targets

use crate::foundation::version::Versions;

/// An image entity
#[derive(Debug, Clone)]
pub struct Image {
    /// Image name, used in log lines
    pub name: String,
    /// Width of mip 0 in pixels
    pub width: u32,
    /// Height of mip 0 in pixels
    pub height: u32,
    /// Array layers or depth slices
    pub layers: u32,
    /// Mip levels
    pub mip_levels: u32,
    /// Whether this is a cube map
    pub cube: bool,
    /// Structure and value stamps
    pub versions: Versions,
}

impl Image {
    /// A single-layer 2D image without mips
    pub fn new_2d(name: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            name: name.into(),
            width,
            height,
            layers: 1,
            mip_levels: 1,
            cube: false,
            versions: Versions::new(),
        }
    }

    /// Size of a mip level, never smaller than one pixel
    pub fn mip_size(&self, mip: u32) -> (u32, u32) {
        let shift = mip.min(31);
        ((self.width >> shift).max(1), (self.height >> shift).max(1))
    }
}
