use crate::coords::IRect;
use crate::draw::{DrawState, PrimitiveType, Vertex};
use crate::paint::Color;

use super::{DeviceCaps, PixelConfig, RenderTarget, StencilBuffer, StencilId, Texture, TextureDesc, TextureId};

/// One draw submitted to a device.
#[derive(Debug, Copy, Clone)]
pub struct DeviceDraw<'a> {
    pub state: &'a DrawState,
    pub primitive: PrimitiveType,
    pub vertices: &'a [Vertex],
    pub indices: Option<&'a [u16]>,
}

impl DeviceDraw<'_> {
    /// Number of vertices the draw consumes (index count when indexed).
    #[inline]
    pub fn element_count(&self) -> usize {
        self.indices.map_or(self.vertices.len(), <[u16]>::len)
    }
}

/// The graphics device a context drives.
///
/// Allocation failures are reported as `None` / `false`; a device never
/// panics on them. Pixel transfer buffers are tightly packed unless a
/// `row_bytes` is given (0 means tight).
pub trait Device {
    fn caps(&self) -> &DeviceCaps;

    /// The surface draws go to when no other target is bound.
    fn default_render_target(&self) -> RenderTarget;

    /// Allocates a texture, optionally initialized from `data`.
    fn create_texture(&mut self, desc: &TextureDesc, data: Option<&[u8]>, row_bytes: usize) -> Option<Texture>;

    fn destroy_texture(&mut self, id: TextureId);

    fn create_stencil_buffer(&mut self, width: u32, height: u32, sample_count: u32) -> Option<StencilBuffer>;

    fn destroy_stencil_buffer(&mut self, id: StencilId);

    /// Attaches (or with `None` detaches) a stencil buffer to a render target.
    fn attach_stencil_buffer(&mut self, target: TextureId, stencil: Option<StencilId>) -> bool;

    /// Makes `target` current even when no draw follows.
    fn bind_render_target(&mut self, target: &RenderTarget);

    /// Clears `rect` (or the whole target) to `color`, ignoring blend state.
    fn clear(&mut self, target: &RenderTarget, rect: Option<IRect>, color: Color);

    fn draw(&mut self, draw: &DeviceDraw<'_>);

    /// Reads `rect` of `texture` into `dst` as tightly packed `config` rows.
    fn read_pixels(&mut self, texture: TextureId, rect: IRect, config: PixelConfig, dst: &mut [u8]) -> bool;

    fn write_pixels(
        &mut self,
        texture: TextureId,
        rect: IRect,
        config: PixelConfig,
        src: &[u8],
        row_bytes: usize,
    ) -> bool;

    /// Pushes recorded work to the hardware.
    fn submit(&mut self);

    /// Forgets any cached native state (another client touched the device).
    fn reset_state(&mut self);

    /// Drops every handle without freeing native objects.
    fn abandon_resources(&mut self);

    /// Releases internal objects (pipelines, staging buffers).
    fn release_resources(&mut self);
}

/// Row stride of a transfer buffer.
#[inline]
pub fn row_stride(row_bytes: usize, width: u32, config: PixelConfig) -> usize {
    if row_bytes == 0 {
        width as usize * config.bytes_per_pixel()
    } else {
        row_bytes
    }
}
