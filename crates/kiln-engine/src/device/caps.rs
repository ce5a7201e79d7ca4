/// What the device can do. Queried once at context creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceCaps {
    /// Largest width or height of a texture.
    pub max_texture_size: u32,
    /// Largest width or height of a render target.
    pub max_render_target_size: u32,
    /// Multisampled render targets are supported.
    pub hw_antialias: bool,
    /// Programmable sampling (4x4 downsample, convolution) is supported.
    pub shader_support: bool,
    /// Non-power-of-two textures can be created.
    pub npot_texture_support: bool,
    /// Non-power-of-two textures can be sampled with repeat/mirror wrapping.
    pub npot_texture_tile_support: bool,
    /// 8-bit palette textures are supported.
    pub index8_support: bool,
}

impl Default for DeviceCaps {
    fn default() -> Self {
        Self {
            max_texture_size: 4096,
            max_render_target_size: 4096,
            hw_antialias: false,
            shader_support: true,
            npot_texture_support: true,
            npot_texture_tile_support: true,
            index8_support: false,
        }
    }
}
