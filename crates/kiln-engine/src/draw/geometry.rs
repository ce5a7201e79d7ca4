use bytemuck::{Pod, Zeroable};

use crate::coords::{Rect, Vec2};
use crate::paint::Color;

/// Vertex layout shared by every draw.
///
/// `position` is in the draw's local space (before the view matrix); `color`
/// is premultiplied; `coverage` scales the final fragment.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 2],
    pub tex_coord: [f32; 2],
    pub color: [f32; 4],
    pub coverage: f32,
}

impl Vertex {
    #[inline]
    pub fn new(position: Vec2, color: Color) -> Self {
        Self {
            position: position.to_array(),
            tex_coord: position.to_array(),
            color: color.to_array(),
            coverage: 1.0,
        }
    }

    #[inline]
    pub fn with_tex_coord(mut self, uv: Vec2) -> Self {
        self.tex_coord = uv.to_array();
        self
    }

    #[inline]
    pub fn with_coverage(mut self, coverage: f32) -> Self {
        self.coverage = coverage;
        self
    }

    #[inline]
    pub fn pos(&self) -> Vec2 {
        Vec2::new(self.position[0], self.position[1])
    }
}

/// How vertices are assembled.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum PrimitiveType {
    Triangles,
    TriangleStrip,
    TriangleFan,
    Points,
    Lines,
    LineStrip,
}

impl PrimitiveType {
    #[inline]
    pub fn is_lines(self) -> bool {
        matches!(self, PrimitiveType::Lines | PrimitiveType::LineStrip)
    }
}

/// Two triangles over the corners of a rect: `0-1-2, 0-2-3`.
pub const QUAD_INDICES: [u16; 6] = [0, 1, 2, 0, 2, 3];

/// Four corner vertices of `rect` in fan order.
pub fn rect_vertices(rect: Rect, color: Color) -> [Vertex; 4] {
    rect.corners().map(|p| Vertex::new(p, color))
}

/// Four corner vertices of `dst` with texture coordinates from `src`.
pub fn textured_rect_vertices(dst: Rect, src: Rect, color: Color) -> [Vertex; 4] {
    let uv = src.corners();
    let mut out = rect_vertices(dst, color);
    for (v, t) in out.iter_mut().zip(uv) {
        v.tex_coord = t.to_array();
    }
    out
}

/// Triangle-list indices equivalent to a fan of `count` vertices.
pub fn fan_to_list_indices(count: usize) -> Vec<u16> {
    let mut out = Vec::with_capacity(count.saturating_sub(2) * 3);
    for i in 1..count.saturating_sub(1) {
        out.extend_from_slice(&[0, i as u16, i as u16 + 1]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_is_tightly_packed() {
        assert_eq!(std::mem::size_of::<Vertex>(), 36);
    }

    #[test]
    fn fan_indices_cover_every_triangle() {
        assert_eq!(fan_to_list_indices(4), vec![0, 1, 2, 0, 2, 3]);
        assert!(fan_to_list_indices(2).is_empty());
    }

    #[test]
    fn textured_rect_maps_corners() {
        let v = textured_rect_vertices(
            Rect::new(10.0, 10.0, 5.0, 5.0),
            Rect::new(0.0, 0.0, 1.0, 1.0),
            Color::WHITE,
        );
        assert_eq!(v[2].position, [15.0, 15.0]);
        assert_eq!(v[2].tex_coord, [1.0, 1.0]);
    }
}
