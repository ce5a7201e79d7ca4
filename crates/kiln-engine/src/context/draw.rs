use crate::coords::{IRect, Matrix, Rect, Vec2};
use crate::device::{Device, Texture};
use crate::draw::{
    rect_vertices, textured_rect_vertices, CoordSource, DrawTarget, Immediate, PrimitiveType, Vertex,
};
use crate::paint::{Color, Paint, PAINT_STAGES};
use crate::path::{Path, PathFill};
use crate::text::{GlyphBatch, GlyphQuad};

use super::aa_rect::{fill_aa_rect_geometry, stroke_aa_rect_geometry, AaRect};
use super::{Context, DrawCategory};

/// Mask of the paint stages.
const PAINT_STAGE_MASK: u32 = (1 << PAINT_STAGES) - 1;

impl<D: Device> Context<D> {
    /// Clears `rect` (or the whole render target) after flushing pending
    /// draws. Blend and clip are ignored.
    pub fn clear(&mut self, rect: Option<IRect>, color: Color) {
        self.emit_glyphs();
        self.flush_draw_buffer();
        let target = self.state.render_target;
        self.device.clear(&target, rect, color);
    }

    /// Fills the whole render target with `paint`; never antialiased.
    pub fn draw_paint(&mut self, paint: &Paint) {
        let Some(inverse) = self.state.matrix.invert() else {
            log::warn!("draw_paint skipped: matrix is not invertible");
            return;
        };
        let rect = inverse.map_rect(Rect::from(self.state.render_target.bounds()));
        let mut paint = *paint;
        paint.anti_alias = false;
        self.draw_rect(&paint, rect, -1.0, None);
    }

    /// Draws a rect: filled when `stroke_width < 0`, hairline when `0`,
    /// mitered stroke otherwise. `matrix` applies before the context matrix.
    pub fn draw_rect(&mut self, paint: &Paint, rect: Rect, stroke_width: f32, matrix: Option<&Matrix>) {
        self.prepare_to_draw(paint, DrawCategory::Unbuffered);
        let mut combined = self.state.matrix;
        if let Some(m) = matrix {
            combined.pre_concat(m);
        }

        let aa = self.aa_rect_plan(paint, rect, stroke_width, &combined);
        if let (Some(aa), Some(inverse)) = (aa, self.state.matrix.invert()) {
            let st = &mut self.draw_state;
            st.view_matrix = Matrix::IDENTITY;
            st.pre_concat_sampler_matrices(PAINT_STAGE_MASK, &inverse);
            let (vertices, indices) = match aa {
                AaRect::Fill { device } => fill_aa_rect_geometry(device, paint.color),
                AaRect::Stroke { device, stroke } => stroke_aa_rect_geometry(device, stroke, paint.color),
            };
            self.with_target(DrawCategory::Unbuffered, |t| {
                t.draw(PrimitiveType::Triangles, &vertices, Some(&indices))
            });
            return;
        }

        if let Some(m) = matrix {
            self.draw_state.view_matrix = combined;
            self.draw_state.pre_concat_sampler_matrices(PAINT_STAGE_MASK, m);
        }
        let color = paint.color;
        self.with_target(DrawCategory::Unbuffered, |t| draw_plain_rect(t, rect, stroke_width, color));
    }

    /// Draws `src` of the stage-0 texture into `dst`.
    ///
    /// Without a stage-0 texture this is a filled [`draw_rect`](Self::draw_rect).
    /// `dst_matrix` applies to the destination before the context matrix;
    /// `src_matrix` maps source coordinates before the stage's sampler matrix.
    pub fn draw_rect_to_rect(
        &mut self,
        paint: &Paint,
        dst: Rect,
        src: Rect,
        dst_matrix: Option<&Matrix>,
        src_matrix: Option<&Matrix>,
    ) {
        if paint.texture(0).is_none() {
            self.draw_rect(paint, dst, -1.0, dst_matrix);
            return;
        }
        let category = if self.config.batch_rect_to_rect { DrawCategory::Buffered } else { DrawCategory::Unbuffered };
        self.prepare_to_draw(paint, category);

        let st = &mut self.draw_state;
        if let Some(m) = dst_matrix {
            st.view_matrix.pre_concat(m);
            st.pre_concat_sampler_matrices(PAINT_STAGE_MASK & !1, m);
        }
        if let Some(stage) = st.stages[0].as_mut() {
            stage.coords = CoordSource::TexCoord;
            if let Some(m) = src_matrix {
                stage.sampler.pre_concat_matrix(m);
            }
        }
        let corners = textured_rect_vertices(dst, src, paint.color);
        self.with_target(category, |t| t.draw_quad(corners));
    }

    /// Draws `path` offset by `translate`.
    ///
    /// Antialiased paths the path renderer cannot antialias go through the
    /// offscreen pipeline.
    pub fn draw_path(&mut self, paint: &Paint, path: &Path, fill: PathFill, translate: Option<Vec2>) {
        if path.is_empty() {
            if fill.is_inverse() {
                self.draw_paint(paint);
            }
            return;
        }
        if !self.path_renderer.can_draw_path(path, fill) {
            log::warn!("path renderer cannot draw this path ({fill:?})");
            return;
        }
        self.prepare_to_draw(paint, DrawCategory::Unbuffered);
        self.stats.immediate_draws += 1;

        let native_aa = {
            let target = Immediate::new(&mut self.device, &mut self.draw_state);
            self.path_renderer.supports_aa(&target, path, fill)
        };
        let target = self.state.render_target;
        if !native_aa
            && !fill.is_inverse()
            && self.needs_offscreen_aa(&target, paint, fill.is_hairline())
            && self.draw_path_offscreen_aa(path, fill, translate)
        {
            return;
        }
        self.draw_path_direct(path, fill, translate);
    }

    /// Runs the path renderer against the device with the current draw
    /// state, attaching a stencil buffer first when needed.
    pub(crate) fn draw_path_direct(&mut self, path: &Path, fill: PathFill, translate: Option<Vec2>) -> bool {
        let needs_stencil = {
            let target = Immediate::new(&mut self.device, &mut self.draw_state);
            self.path_renderer.requires_stencil_pass(&target, path, fill)
        };
        let render_target = self.draw_state.render_target;
        if needs_stencil && !self.ensure_stencil(&render_target) {
            log::warn!("path skipped: no stencil buffer for {}x{} target", render_target.width, render_target.height);
            return false;
        }
        let mut target = Immediate::new(&mut self.device, &mut self.draw_state);
        self.path_renderer.draw_path(&mut target, path, fill, translate);
        true
    }

    /// Draws raw geometry. Texture coordinates, when given, feed the paint
    /// stages; per-vertex colors replace the paint color.
    pub fn draw_vertices(
        &mut self,
        paint: &Paint,
        primitive: PrimitiveType,
        positions: &[Vec2],
        tex_coords: Option<&[Vec2]>,
        colors: Option<&[Color]>,
        indices: Option<&[u16]>,
    ) {
        if positions.is_empty() {
            return;
        }
        let n = positions.len();
        if tex_coords.is_some_and(|t| t.len() != n) || colors.is_some_and(|c| c.len() != n) {
            log::warn!("draw_vertices skipped: attribute arrays differ in length");
            return;
        }
        if indices.is_some_and(|idx| idx.iter().any(|&i| i as usize >= n)) {
            log::warn!("draw_vertices skipped: index out of range");
            return;
        }
        self.prepare_to_draw(paint, DrawCategory::Unbuffered);
        if tex_coords.is_some() {
            for stage in self.draw_state.stages.iter_mut().take(PAINT_STAGES).flatten() {
                stage.coords = CoordSource::TexCoord;
            }
        }
        let vertices: Vec<Vertex> = positions
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let color = colors.map_or(paint.color, |c| c[i]);
                let v = Vertex::new(*p, color);
                match tex_coords {
                    Some(t) => v.with_tex_coord(t[i]),
                    None => v,
                }
            })
            .collect();
        self.with_target(DrawCategory::Unbuffered, |t| t.draw(primitive, &vertices, indices));
    }

    /// Draws glyph quads masked by `atlas` (an alpha texture).
    ///
    /// Glyphs are batched per atlas and draw state until another category
    /// is drawn or the context is flushed.
    pub fn draw_glyphs(&mut self, paint: &Paint, atlas: &Texture, glyphs: &[GlyphQuad]) {
        if glyphs.is_empty() {
            return;
        }
        if !self.config.defer_text {
            self.prepare_to_draw(paint, DrawCategory::Unbuffered);
            let mut batch = GlyphBatch::new();
            batch.push(atlas, &self.draw_state, glyphs);
            self.with_target(DrawCategory::Unbuffered, |t| batch.emit(t));
            return;
        }
        self.prepare_to_draw(paint, DrawCategory::Text);
        if !self.glyphs.accepts(atlas, &self.draw_state) {
            self.emit_glyphs();
        }
        self.pin_texture(atlas.id);
        self.pin_stage_textures();
        self.glyphs.push(atlas, &self.draw_state, glyphs);
    }
}

/// Non-antialiased rect: fan fill, 10-vertex stroke strip or 5-vertex
/// hairline loop.
fn draw_plain_rect(target: &mut dyn DrawTarget, rect: Rect, stroke_width: f32, color: Color) {
    if stroke_width < 0.0 {
        target.draw(PrimitiveType::TriangleFan, &rect_vertices(rect, color), None);
        return;
    }
    if stroke_width == 0.0 {
        let c = rect.corners();
        let verts = [c[0], c[1], c[2], c[3], c[0]].map(|p| Vertex::new(p, color));
        target.draw(PrimitiveType::LineStrip, &verts, None);
        return;
    }
    let half = stroke_width * 0.5;
    let outer = rect.outset(half, half);
    let inner = rect.outset(-half, -half);
    if inner.is_empty() {
        target.draw(PrimitiveType::TriangleFan, &rect_vertices(outer, color), None);
        return;
    }
    let (o, i) = (outer.corners(), inner.corners());
    let verts = [o[0], i[0], o[1], i[1], o[2], i[2], o[3], i[3], o[0], i[0]].map(|p| Vertex::new(p, color));
    target.draw(PrimitiveType::TriangleStrip, &verts, None);
}
