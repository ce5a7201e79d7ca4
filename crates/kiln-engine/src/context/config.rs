/// Tunables of a [`Context`](super::Context).
///
/// Defaults suit a desktop GPU; hosts with tighter memory lower the cache
/// limits.
#[derive(Debug, Clone)]
pub struct ContextConfig {
    /// Most resources the cache keeps resident.
    pub max_texture_count: usize,
    /// Most bytes the cache keeps resident.
    pub max_texture_bytes: usize,

    /// Render antialiased paths through a supersampled offscreen surface
    /// when the path renderer cannot antialias them.
    pub offscreen_aa: bool,
    /// Largest offscreen tile edge, before supersampling.
    pub max_offscreen_aa_size: u32,
    /// Prefer a multisampled offscreen surface when the device supports it.
    pub prefer_msaa_offscreen: bool,

    /// Smallest edge of an approximately matched scratch texture.
    pub min_scratch_size: u32,

    /// Vertex capacity of the draw buffer.
    pub vertex_pool_size: usize,
    /// Index capacity of the draw buffer.
    pub index_pool_size: usize,

    /// Batch glyphs until the text category is left.
    pub defer_text: bool,
    /// Send textured rect-to-rect draws through the draw buffer.
    pub batch_rect_to_rect: bool,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_texture_count: 256,
            max_texture_bytes: 16 * 1024 * 1024,
            offscreen_aa: true,
            max_offscreen_aa_size: 256,
            prefer_msaa_offscreen: false,
            min_scratch_size: 256,
            vertex_pool_size: 8192,
            index_pool_size: 16384,
            defer_text: true,
            batch_rect_to_rect: true,
        }
    }
}
