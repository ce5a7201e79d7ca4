//! Offscreen antialiasing.
//!
//! A path is drawn in white into a supersampled scratch surface (pass 1),
//! then the surface is sampled as coverage while the tile rect is drawn
//! with the original paint into the real target (pass 2). Large bounds are
//! split into tiles, each with its own scratch lock.

use crate::cache::ScratchTexMatch;
use crate::coords::{IRect, Matrix, Rect, Vec2};
use crate::device::{AaLevel, Device, PixelConfig, RenderTarget, Texture, TextureDesc, TextureFlags};
use crate::draw::{rect_vertices, DrawState, DrawTarget, Immediate, PrimitiveType, StageState, COVERAGE_STAGE, MAX_STAGES};
use crate::paint::{BlendFunc, Color, Filter, Paint, SamplerState, WrapMode, PAINT_STAGES};
use crate::path::{Path, PathFill};

use super::{AutoScratchTexture, Context};

/// Supersampling of the 4x4 modes.
const SUPERSAMPLE_SCALE: u32 = 4;

/// How the offscreen surface is reduced to coverage.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum DownsampleMode {
    /// Multisampled scratch at scale 1.
    Fsaa,
    /// 4x supersampled scratch resolved by one 4x4 box filter.
    FourByFourSinglePass,
    /// 4x supersampled scratch reduced by bilinear into a half-size second
    /// scratch, then composited bilinearly.
    FourByFourTwoPass,
}

impl DownsampleMode {
    #[inline]
    pub fn scale(self) -> u32 {
        match self {
            DownsampleMode::Fsaa => 1,
            DownsampleMode::FourByFourSinglePass | DownsampleMode::FourByFourTwoPass => SUPERSAMPLE_SCALE,
        }
    }
}

/// Per-draw parameters shared by every tile.
struct OffscreenRecord {
    mode: DownsampleMode,
    scale: u32,
    needs_stencil: bool,
    saved: DrawState,
    inverse_view: Matrix,
}

/// Tiles covering `bounds`: the tile edge, then the tile counts.
pub(crate) fn tile_grid(bounds: IRect, max_tile: u32) -> (u32, u32, u32, u32) {
    let (w, h) = (bounds.width().max(0) as u32, bounds.height().max(0) as u32);
    let tile_w = max_tile.max(1).min(w.max(1));
    let tile_h = max_tile.max(1).min(h.max(1));
    (tile_w, tile_h, w.div_ceil(tile_w), h.div_ceil(tile_h))
}

impl<D: Device> Context<D> {
    /// True when an antialiased draw with `paint` on `target` must go
    /// through the offscreen pipeline.
    pub fn needs_offscreen_aa(&self, target: &RenderTarget, paint: &Paint, is_hairline: bool) -> bool {
        if !self.config.offscreen_aa
            || !paint.anti_alias
            || target.is_multisampled()
            || !paint.blend.can_tweak_alpha_for_coverage()
        {
            return false;
        }
        if is_hairline {
            return self.config.prefer_msaa_offscreen && self.device.caps().hw_antialias;
        }
        true
    }

    pub fn downsample_mode(&self) -> DownsampleMode {
        let caps = self.device.caps();
        if self.config.prefer_msaa_offscreen && caps.hw_antialias {
            DownsampleMode::Fsaa
        } else if caps.shader_support {
            DownsampleMode::FourByFourSinglePass
        } else {
            DownsampleMode::FourByFourTwoPass
        }
    }

    /// Draws `path` through the offscreen pipeline with the prepared draw
    /// state. Returns false when the pipeline cannot run at all (the caller
    /// then draws directly).
    pub(crate) fn draw_path_offscreen_aa(&mut self, path: &Path, fill: PathFill, translate: Option<Vec2>) -> bool {
        let saved = self.draw_state;
        let Some(inverse_view) = saved.view_matrix.invert() else {
            log::warn!("offscreen AA skipped: view matrix is not invertible");
            return false;
        };
        let Some(local) = path.bounds() else {
            return true;
        };
        let mut device_bounds = saved.view_matrix.map_rect(local.offset(translate.unwrap_or_default()));
        if fill.is_hairline() {
            device_bounds = device_bounds.outset(1.0, 1.0);
        }
        let Some(bounds) = self
            .state
            .clip
            .bounds(&saved.render_target)
            .and_then(|clip| clip.intersect(device_bounds.round_out()))
        else {
            return true;
        };

        let mode = self.downsample_mode();
        let scale = mode.scale();
        let max_tile = self.config.max_offscreen_aa_size.min(self.device.caps().max_render_target_size / scale);
        let (tile_w, tile_h, tiles_x, tiles_y) = tile_grid(bounds, max_tile);
        let needs_stencil = {
            let target = Immediate::new(&mut self.device, &mut self.draw_state);
            self.path_renderer.requires_stencil_pass(&target, path, fill)
        };
        let record = OffscreenRecord { mode, scale, needs_stencil, saved, inverse_view };
        log::debug!("offscreen AA {mode:?}: {}x{} bounds in {tiles_x}x{tiles_y} tiles", bounds.width(), bounds.height());

        for tx in 0..tiles_x {
            for ty in 0..tiles_y {
                let tile = IRect::from_xywh(
                    bounds.left + (tx * tile_w) as i32,
                    bounds.top + (ty * tile_h) as i32,
                    tile_w as i32,
                    tile_h as i32,
                );
                let Some(tile) = tile.intersect(bounds) else {
                    continue;
                };
                if self.draw_offscreen_tile(&record, tile, path, fill, translate) {
                    self.stats.offscreen_aa_tiles += 1;
                } else {
                    self.draw_offscreen_fallback(&record, tile, path, fill, translate);
                }
                self.draw_state = record.saved;
            }
        }
        true
    }

    fn draw_offscreen_tile(
        &mut self,
        rec: &OffscreenRecord,
        tile: IRect,
        path: &Path,
        fill: PathFill,
        translate: Option<Vec2>,
    ) -> bool {
        let (w, h) = (tile.width() as u32, tile.height() as u32);
        let mut flags = TextureFlags::RENDER_TARGET;
        if !rec.needs_stencil {
            flags = flags | TextureFlags::NO_STENCIL;
        }
        let aa_level = if rec.mode == DownsampleMode::Fsaa { AaLevel::Med } else { AaLevel::None };
        let desc = TextureDesc::new(w * rec.scale, h * rec.scale, PixelConfig::Rgba8888)
            .with_flags(flags)
            .with_aa_level(aa_level);

        let mut scratch = AutoScratchTexture::new(self, &desc, ScratchTexMatch::Approx);
        let Some(surface) = scratch.texture() else {
            return false;
        };
        if !scratch.offscreen_coverage_pass(rec, &surface, tile, path, fill, translate) {
            return false;
        }
        match rec.mode {
            DownsampleMode::Fsaa => scratch.offscreen_composite_pass(rec, tile, &surface, 1, Filter::Nearest),
            DownsampleMode::FourByFourSinglePass => {
                scratch.offscreen_composite_pass(rec, tile, &surface, SUPERSAMPLE_SCALE, Filter::Downsample4x4)
            }
            DownsampleMode::FourByFourTwoPass => {
                let half = TextureDesc::new(w * 2, h * 2, PixelConfig::Rgba8888)
                    .with_flags(TextureFlags::RENDER_TARGET | TextureFlags::NO_STENCIL);
                let mut reduced = AutoScratchTexture::new(&mut *scratch, &half, ScratchTexMatch::Approx);
                let Some(half_surface) = reduced.texture() else {
                    return false;
                };
                reduced.offscreen_reduce_pass(&surface, &half_surface, w * 2, h * 2);
                reduced.offscreen_composite_pass(rec, tile, &half_surface, 2, Filter::Bilinear);
            }
        }
        true
    }

    /// Pass 1: white path coverage into the scratch surface.
    fn offscreen_coverage_pass(
        &mut self,
        rec: &OffscreenRecord,
        surface: &Texture,
        tile: IRect,
        path: &Path,
        fill: PathFill,
        translate: Option<Vec2>,
    ) -> bool {
        let Some(target) = surface.as_render_target() else {
            return false;
        };
        let s = rec.scale as f32;
        let mut view = rec.saved.view_matrix;
        view.post_concat(&Matrix::translate(-tile.left as f32, -tile.top as f32));
        view.post_concat(&Matrix::scale(s, s));
        let clip = IRect::from_wh(tile.width() * rec.scale as i32, tile.height() * rec.scale as i32);

        let st = &mut self.draw_state;
        *st = rec.saved;
        st.render_target = target;
        st.view_matrix = view;
        st.clip = Some(clip);
        st.stages = [None; MAX_STAGES];
        st.blend = BlendFunc::SRC;
        st.color = Color::WHITE;
        st.dither = false;
        st.hw_antialias = rec.mode == DownsampleMode::Fsaa;

        self.device.clear(&target, Some(clip), Color::TRANSPARENT);
        self.draw_path_direct(path, fill, translate)
    }

    /// Two-pass mode: bilinear 2x reduction of `src` into `dst`.
    fn offscreen_reduce_pass(&mut self, src: &Texture, dst: &Texture, w: u32, h: u32) {
        let Some(target) = dst.as_render_target() else {
            return;
        };
        let mut st = DrawState::new(target);
        st.blend = BlendFunc::SRC;
        st.clip = Some(IRect::from_wh(w as i32, h as i32));
        let m = Matrix::concat(&Matrix::idiv(src.width(), src.height()), &Matrix::scale(2.0, 2.0));
        st.stages[0] = Some(StageState::new(
            *src,
            SamplerState::new(WrapMode::Clamp, WrapMode::Clamp, Filter::Bilinear).with_matrix(m),
        ));
        let verts = rect_vertices(Rect::new(0.0, 0.0, w as f32, h as f32), Color::WHITE);
        Immediate::new(&mut self.device, &mut st).draw(PrimitiveType::TriangleFan, &verts, None);
    }

    /// Pass 2: draw the tile into the real target with the coverage stage
    /// sampling `coverage` (`scale` texels per device pixel).
    fn offscreen_composite_pass(&mut self, rec: &OffscreenRecord, tile: IRect, coverage: &Texture, scale: u32, filter: Filter) {
        let s = scale as f32;
        let mut m = Matrix::idiv(coverage.width(), coverage.height());
        m.pre_concat(&Matrix::scale(s, s));
        m.pre_concat(&Matrix::translate(-tile.left as f32, -tile.top as f32));

        let st = &mut self.draw_state;
        *st = rec.saved;
        st.view_matrix = Matrix::IDENTITY;
        st.pre_concat_sampler_matrices((1 << PAINT_STAGES) - 1, &rec.inverse_view);
        st.stages[COVERAGE_STAGE] = Some(StageState::new(
            *coverage,
            SamplerState::new(WrapMode::Clamp, WrapMode::Clamp, filter).with_matrix(m),
        ));
        let verts = rect_vertices(Rect::from(tile), rec.saved.color);
        Immediate::new(&mut self.device, &mut self.draw_state).draw(PrimitiveType::TriangleFan, &verts, None);
    }

    /// Draws the tile's part of the path directly, without antialiasing.
    fn draw_offscreen_fallback(
        &mut self,
        rec: &OffscreenRecord,
        tile: IRect,
        path: &Path,
        fill: PathFill,
        translate: Option<Vec2>,
    ) {
        log::warn!("offscreen AA unavailable for tile {tile:?}; drawing without AA");
        self.stats.offscreen_fallback_tiles += 1;
        self.draw_state = rec.saved;
        let clip = rec.saved.clip.map_or(Some(tile), |c| c.intersect(tile));
        self.draw_state.clip = Some(clip.unwrap_or_default());
        self.draw_path_direct(path, fill, translate);
    }
}
