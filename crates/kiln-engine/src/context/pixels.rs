//! Pixel readback and upload.

use crate::cache::ScratchTexMatch;
use crate::coords::{IRect, Matrix, Rect};
use crate::device::{row_stride, Device, PixelConfig, RenderTarget, Texture, TextureDesc};
use crate::draw::{rect_vertices, DrawState, DrawTarget, Immediate, PrimitiveType, StageState};
use crate::paint::{BlendFunc, Color, SamplerState};

use super::{AutoScratchTexture, Context, FlushFlags};

/// Checks a readback request against the source bounds.
fn validate_read(bounds: IRect, rect: IRect, config: PixelConfig, len: usize) -> bool {
    if !config.is_readable() {
        log::warn!("readback in {config:?} is not supported");
        return false;
    }
    if !bounds.contains_rect(rect) {
        log::warn!("readback rect {rect:?} is outside {bounds:?}");
        return false;
    }
    let needed = rect.width() as usize * rect.height() as usize * config.bytes_per_pixel();
    if len < needed {
        log::warn!("readback buffer holds {len} bytes, {needed} needed");
        return false;
    }
    true
}

impl<D: Device> Context<D> {
    /// Reads `rect` of `target` (the current render target when `None`)
    /// into `dst` as tightly packed rows. Pending draws are flushed first.
    pub fn read_render_target_pixels(
        &mut self,
        target: Option<&RenderTarget>,
        rect: IRect,
        config: PixelConfig,
        dst: &mut [u8],
    ) -> bool {
        let source = target.copied().unwrap_or(self.state.render_target);
        if !validate_read(source.bounds(), rect, config, dst.len()) {
            return false;
        }
        let flags = if target.is_none() { FlushFlags::FORCE_CURRENT_RENDER_TARGET } else { FlushFlags::NONE };
        self.flush(flags);
        self.device.read_pixels(source.texture, rect, config, dst)
    }

    /// Reads `rect` of `texture` into `dst`.
    pub fn read_texture_pixels(&mut self, texture: &Texture, rect: IRect, config: PixelConfig, dst: &mut [u8]) -> bool {
        let bounds = IRect::from_wh(texture.width() as i32, texture.height() as i32);
        if !validate_read(bounds, rect, config, dst.len()) {
            return false;
        }
        self.flush(FlushFlags::NONE);
        self.device.read_pixels(texture.id, rect, config, dst)
    }

    /// Replaces `rect` of the current render target with `data`, ignoring
    /// the clip and blend state.
    pub fn write_pixels(&mut self, rect: IRect, config: PixelConfig, data: &[u8], row_bytes: usize) -> bool {
        if rect.is_empty() {
            return false;
        }
        if !config.is_readable() {
            log::warn!("pixel upload in {config:?} is not supported");
            return false;
        }
        let (w, h) = (rect.width() as u32, rect.height() as u32);
        let stride = row_stride(row_bytes, w, config);
        let needed = stride * (h as usize - 1) + w as usize * config.bytes_per_pixel();
        if data.len() < needed {
            log::warn!("pixel upload holds {} bytes, {needed} needed", data.len());
            return false;
        }
        self.flush(FlushFlags::NONE);

        let desc = TextureDesc::new(w, h, PixelConfig::Rgba8888);
        let mut scratch = AutoScratchTexture::new(self, &desc, ScratchTexMatch::Approx);
        let Some(texture) = scratch.texture() else {
            log::warn!("pixel upload skipped: no {w}x{h} scratch texture");
            return false;
        };
        if !scratch.device.write_pixels(texture.id, IRect::from_wh(w as i32, h as i32), config, data, row_bytes) {
            return false;
        }

        let mut st = DrawState::new(scratch.state.render_target);
        st.view_matrix = Matrix::translate(rect.left as f32, rect.top as f32);
        st.blend = BlendFunc::SRC;
        let sampler = SamplerState::clamp_no_filter().with_matrix(Matrix::idiv(texture.width(), texture.height()));
        st.stages[0] = Some(StageState::new(texture, sampler));
        let verts = rect_vertices(Rect::new(0.0, 0.0, w as f32, h as f32), Color::WHITE);
        scratch.stats.immediate_draws += 1;
        Immediate::new(&mut scratch.device, &mut st).draw(PrimitiveType::TriangleFan, &verts, None);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_validation_checks_config_bounds_and_size() {
        let bounds = IRect::from_wh(8, 8);
        let rect = IRect::from_xywh(2, 2, 4, 4);
        assert!(validate_read(bounds, rect, PixelConfig::Rgba8888, 64));
        assert!(!validate_read(bounds, rect, PixelConfig::Rgba8888, 63));
        assert!(!validate_read(bounds, rect, PixelConfig::Alpha8, 64));
        assert!(!validate_read(bounds, IRect::from_xywh(6, 6, 4, 4), PixelConfig::Bgra8888, 64));
    }
}
