use crate::coords::{Matrix, Rect, Vec2};
use crate::draw::{fan_to_list_indices, DrawTarget, PrimitiveType, StencilSettings, Vertex};

use super::{Contour, Path, PathFill};

/// Strategy that turns a path into device draws.
pub trait PathRenderer {
    fn can_draw_path(&self, path: &Path, fill: PathFill) -> bool;

    /// True when the renderer antialiases `path` itself on `target`.
    fn supports_aa(&self, target: &dyn DrawTarget, path: &Path, fill: PathFill) -> bool;

    /// True when drawing needs a stencil buffer on the current render target.
    fn requires_stencil_pass(&self, target: &dyn DrawTarget, path: &Path, fill: PathFill) -> bool;

    /// Draws `path` (offset by `translate`) with the target's current state.
    fn draw_path(&mut self, target: &mut dyn DrawTarget, path: &Path, fill: PathFill, translate: Option<Vec2>);
}

/// Screen-space flattening tolerance, in pixels.
const TOLERANCE_PX: f32 = 0.25;

/// Default renderer: convex single pass, otherwise stencil then cover.
///
/// Concave fills accumulate winding (or parity) into the stencil with
/// color writes off, then a cover rect draws where the stencil is set and
/// zeroes it again. Inverse fills cover the whole target where the stencil
/// stayed zero.
#[derive(Debug, Default)]
pub struct StencilAndCoverRenderer;

impl StencilAndCoverRenderer {
    pub fn new() -> Self {
        Self
    }

    fn single_pass(path: &Path, fill: PathFill) -> bool {
        !fill.is_inverse() && path.is_convex()
    }
}

fn local_tolerance(view: &Matrix) -> f32 {
    let scale = view.max_scale();
    if scale > f32::EPSILON { TOLERANCE_PX / scale } else { TOLERANCE_PX }
}

fn contour_vertices(contour: &Contour, translate: Vec2, close: bool, color: crate::paint::Color) -> Vec<Vertex> {
    let mut out: Vec<Vertex> = contour.points.iter().map(|p| Vertex::new(*p + translate, color)).collect();
    if close
        && let Some(first) = out.first().copied()
    {
        out.push(first);
    }
    out
}

impl PathRenderer for StencilAndCoverRenderer {
    fn can_draw_path(&self, _path: &Path, _fill: PathFill) -> bool {
        true
    }

    fn supports_aa(&self, target: &dyn DrawTarget, _path: &Path, _fill: PathFill) -> bool {
        target.state().render_target.is_multisampled()
    }

    fn requires_stencil_pass(&self, _target: &dyn DrawTarget, path: &Path, fill: PathFill) -> bool {
        !fill.is_hairline() && !Self::single_pass(path, fill)
    }

    fn draw_path(&mut self, target: &mut dyn DrawTarget, path: &Path, fill: PathFill, translate: Option<Vec2>) {
        let translate = translate.unwrap_or_default();
        let color = target.state().color;
        let contours = path.flatten(local_tolerance(&target.state().view_matrix));

        if fill.is_hairline() {
            for c in &contours {
                let verts = contour_vertices(c, translate, c.closed, color);
                target.draw(PrimitiveType::LineStrip, &verts, None);
            }
            return;
        }

        if Self::single_pass(path, fill) {
            for c in contours.iter().filter(|c| c.points.len() >= 3) {
                let verts = contour_vertices(c, translate, false, color);
                target.draw(PrimitiveType::TriangleFan, &verts, None);
            }
            return;
        }

        let saved_stencil = target.state().stencil;
        let saved_writes = target.state().color_writes;

        let pass = match fill.non_inverse() {
            PathFill::EvenOdd => StencilSettings::EVEN_ODD_PASS,
            _ => StencilSettings::WINDING_PASS,
        };
        {
            let st = target.state_mut();
            st.stencil = pass;
            st.color_writes = false;
        }
        for c in contours.iter().filter(|c| c.points.len() >= 3) {
            let verts = contour_vertices(c, translate, false, color);
            let indices = fan_to_list_indices(verts.len());
            target.draw(PrimitiveType::Triangles, &verts, Some(&indices));
        }

        let cover = if fill.is_inverse() {
            let st = target.state();
            st.view_matrix.invert().map(|inv| inv.map_rect(st.render_target.bounds().into()))
        } else {
            path.bounds().map(|b| b.offset(translate))
        };
        {
            let st = target.state_mut();
            st.stencil = if fill.is_inverse() { StencilSettings::INVERSE_COVER } else { StencilSettings::COVER };
            st.color_writes = saved_writes;
        }
        match cover {
            Some(rect) => draw_cover(target, rect, color),
            None => log::warn!("inverse path fill skipped: view matrix is not invertible"),
        }

        let st = target.state_mut();
        st.stencil = saved_stencil;
        st.color_writes = saved_writes;
    }
}

fn draw_cover(target: &mut dyn DrawTarget, rect: Rect, color: crate::paint::Color) {
    let verts = rect.corners().map(|p| Vertex::new(p, color));
    target.draw(PrimitiveType::TriangleFan, &verts, None);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::recording::{DeviceEvent, RecordingDevice};
    use crate::device::Device;
    use crate::draw::{DrawState, Immediate};

    fn concave() -> Path {
        Path::polygon(&[
            Vec2::new(0.0, 0.0),
            Vec2::new(10.0, 0.0),
            Vec2::new(5.0, 2.0),
            Vec2::new(10.0, 10.0),
            Vec2::new(0.0, 10.0),
        ])
    }

    fn draws(dev: &RecordingDevice) -> Vec<(PrimitiveType, StencilSettings, bool)> {
        dev.draws().map(|d| (d.primitive, d.stencil, d.color_writes)).collect()
    }

    #[test]
    fn convex_fill_is_one_fan() {
        let mut dev = RecordingDevice::new(32, 32);
        let mut state = DrawState::new(dev.default_render_target());
        let mut pr = StencilAndCoverRenderer::new();
        let path = Path::rect(Rect::new(2.0, 2.0, 8.0, 8.0));
        let mut target = Immediate::new(&mut dev, &mut state);
        assert!(!pr.requires_stencil_pass(&target, &path, PathFill::Winding));
        pr.draw_path(&mut target, &path, PathFill::Winding, None);
        assert_eq!(draws(&dev), vec![(PrimitiveType::TriangleFan, StencilSettings::DISABLED, true)]);
        assert_eq!(dev.pixel(crate::device::recording::DEFAULT_TARGET, 5, 5), Some([255; 4]));
    }

    #[test]
    fn concave_fill_stencils_then_covers() {
        let mut dev = RecordingDevice::new(32, 32);
        let mut state = DrawState::new(dev.default_render_target());
        let mut pr = StencilAndCoverRenderer::new();
        let mut target = Immediate::new(&mut dev, &mut state);
        assert!(pr.requires_stencil_pass(&target, &concave(), PathFill::EvenOdd));
        pr.draw_path(&mut target, &concave(), PathFill::EvenOdd, Some(Vec2::new(1.0, 1.0)));
        assert!(state.stencil.is_disabled());
        assert_eq!(
            draws(&dev),
            vec![
                (PrimitiveType::Triangles, StencilSettings::EVEN_ODD_PASS, false),
                (PrimitiveType::TriangleFan, StencilSettings::COVER, true),
            ]
        );
        let cover = dev.draws().nth(1).and_then(|d| d.bounds);
        assert_eq!(cover, Some(Rect::new(1.0, 1.0, 10.0, 10.0)));
    }

    #[test]
    fn inverse_fill_covers_the_target() {
        let mut dev = RecordingDevice::new(32, 16);
        let mut state = DrawState::new(dev.default_render_target());
        state.view_matrix = Matrix::scale(2.0, 2.0);
        let mut pr = StencilAndCoverRenderer::new();
        let path = Path::rect(Rect::new(2.0, 2.0, 4.0, 4.0));
        let mut target = Immediate::new(&mut dev, &mut state);
        pr.draw_path(&mut target, &path, PathFill::InverseWinding, None);
        let last = dev.draws().last().cloned().unwrap();
        assert_eq!(last.stencil, StencilSettings::INVERSE_COVER);
        assert_eq!(last.bounds, Some(Rect::new(0.0, 0.0, 32.0, 16.0)));
    }

    #[test]
    fn hairline_closes_contours_as_line_strips() {
        let mut dev = RecordingDevice::new(32, 32);
        let mut state = DrawState::new(dev.default_render_target());
        let mut pr = StencilAndCoverRenderer::new();
        let mut target = Immediate::new(&mut dev, &mut state);
        pr.draw_path(&mut target, &Path::rect(Rect::new(0.0, 0.0, 4.0, 4.0)), PathFill::Hairline, None);
        let d = dev.draws().next().cloned().unwrap();
        assert_eq!(d.primitive, PrimitiveType::LineStrip);
        assert_eq!(d.vertex_count, 5);
        assert!(!dev.events().iter().any(|e| matches!(e, DeviceEvent::Clear { .. })));
    }
}
