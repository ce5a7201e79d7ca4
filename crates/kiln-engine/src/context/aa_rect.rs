//! Coverage-ramped rect geometry.
//!
//! Rects are emitted in device space with a half-pixel ramp on every edge:
//! vertices on the outer ring carry coverage 0, the inner ring coverage 1.

use crate::coords::{Matrix, Rect, Vec2};
use crate::device::Device;
use crate::draw::Vertex;
use crate::paint::{Color, Paint};

use super::Context;

/// 8 vertices: outer ring (coverage 0) then inner ring.
pub(crate) const FILL_AA_VERTICES: usize = 8;
/// 4 ramp quads plus the interior.
pub(crate) const FILL_AA_INDICES: usize = 30;
/// 16 vertices: four nested rings.
pub(crate) const STROKE_AA_VERTICES: usize = 16;
/// 3 rings of 4 ramp quads.
pub(crate) const STROKE_AA_INDICES: usize = 72;

/// How an antialiased rect is drawn, in device space.
#[derive(Debug, Copy, Clone, PartialEq)]
pub(crate) enum AaRect {
    Fill { device: Rect },
    Stroke { device: Rect, stroke: Vec2 },
}

fn ring(rect: Rect, coverage: f32, color: Color) -> [Vertex; 4] {
    rect.corners().map(|p| Vertex::new(p, color).with_coverage(coverage))
}

/// Triangles joining ring `a` (vertices `a..a+4`) to ring `b`.
fn ring_indices(a: u16, b: u16, out: &mut Vec<u16>) {
    for i in 0..4u16 {
        let j = (i + 1) % 4;
        out.extend_from_slice(&[a + i, a + j, b + j, a + i, b + j, b + i]);
    }
}

pub(crate) fn fill_aa_rect_geometry(device: Rect, color: Color) -> (Vec<Vertex>, Vec<u16>) {
    let mut vertices = Vec::with_capacity(FILL_AA_VERTICES);
    vertices.extend(ring(device.outset(0.5, 0.5), 0.0, color));
    vertices.extend(ring(device.outset(-0.5, -0.5), 1.0, color));
    let mut indices = Vec::with_capacity(FILL_AA_INDICES);
    ring_indices(0, 4, &mut indices);
    indices.extend_from_slice(&[4, 5, 6, 4, 6, 7]);
    (vertices, indices)
}

pub(crate) fn stroke_aa_rect_geometry(device: Rect, stroke: Vec2, color: Color) -> (Vec<Vertex>, Vec<u16>) {
    let (rx, ry) = (stroke.x * 0.5, stroke.y * 0.5);
    let mut vertices = Vec::with_capacity(STROKE_AA_VERTICES);
    vertices.extend(ring(device.outset(rx + 0.5, ry + 0.5), 0.0, color));
    vertices.extend(ring(device.outset(rx - 0.5, ry - 0.5), 1.0, color));
    vertices.extend(ring(device.outset(0.5 - rx, 0.5 - ry), 1.0, color));
    vertices.extend(ring(device.outset(-rx - 0.5, -ry - 0.5), 0.0, color));
    let mut indices = Vec::with_capacity(STROKE_AA_INDICES);
    ring_indices(0, 4, &mut indices);
    ring_indices(4, 8, &mut indices);
    ring_indices(8, 12, &mut indices);
    (vertices, indices)
}

impl<D: Device> Context<D> {
    /// Decides whether a rect gets coverage-ramped geometry.
    ///
    /// Requires an antialiased paint on a single-sampled target, a matrix
    /// that keeps the rect axis-aligned and a blend that can fold coverage
    /// into alpha. Pixel-aligned fills need no ramp.
    pub(crate) fn aa_rect_plan(&self, paint: &Paint, rect: Rect, stroke_width: f32, combined: &Matrix) -> Option<AaRect> {
        if !paint.anti_alias
            || self.state.render_target.is_multisampled()
            || !paint.blend.can_tweak_alpha_for_coverage()
            || !combined.preserves_axis_alignment()
        {
            return None;
        }
        let device = combined.map_rect(rect);
        if stroke_width < 0.0 {
            return (!device.is_pixel_aligned()).then_some(AaRect::Fill { device });
        }
        let stroke = if stroke_width == 0.0 {
            Vec2::new(1.0, 1.0)
        } else {
            combined.map_vector(Vec2::new(stroke_width, stroke_width)).abs()
        };
        Some(AaRect::Stroke { device, stroke })
    }
}
