use super::{Rect, Vec2};

/// 2D affine transform.
///
/// Maps `(x, y)` to `(sx*x + kx*y + tx, ky*x + sy*y + ty)`. Perspective is not
/// represented.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Matrix {
    pub sx: f32,
    pub kx: f32,
    pub tx: f32,
    pub ky: f32,
    pub sy: f32,
    pub ty: f32,
}

impl Default for Matrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Matrix {
    pub const IDENTITY: Matrix = Matrix { sx: 1.0, kx: 0.0, tx: 0.0, ky: 0.0, sy: 1.0, ty: 0.0 };

    #[inline]
    pub const fn translate(dx: f32, dy: f32) -> Self {
        Matrix { sx: 1.0, kx: 0.0, tx: dx, ky: 0.0, sy: 1.0, ty: dy }
    }

    #[inline]
    pub const fn scale(sx: f32, sy: f32) -> Self {
        Matrix { sx, kx: 0.0, tx: 0.0, ky: 0.0, sy, ty: 0.0 }
    }

    /// Scale by `1/w, 1/h`; maps texel space to normalized texture coordinates.
    #[inline]
    pub fn idiv(w: u32, h: u32) -> Self {
        Matrix::scale(1.0 / w.max(1) as f32, 1.0 / h.max(1) as f32)
    }

    /// Returns `a * b`: `b` is applied first, then `a`.
    pub fn concat(a: &Matrix, b: &Matrix) -> Matrix {
        Matrix {
            sx: a.sx * b.sx + a.kx * b.ky,
            kx: a.sx * b.kx + a.kx * b.sy,
            tx: a.sx * b.tx + a.kx * b.ty + a.tx,
            ky: a.ky * b.sx + a.sy * b.ky,
            sy: a.ky * b.kx + a.sy * b.sy,
            ty: a.ky * b.tx + a.sy * b.ty + a.ty,
        }
    }

    /// `self = self * m` (m applies before the existing transform).
    #[inline]
    pub fn pre_concat(&mut self, m: &Matrix) {
        *self = Matrix::concat(self, m);
    }

    /// `self = m * self` (m applies after the existing transform).
    #[inline]
    pub fn post_concat(&mut self, m: &Matrix) {
        *self = Matrix::concat(m, self);
    }

    #[inline]
    pub fn is_identity(&self) -> bool {
        *self == Matrix::IDENTITY
    }

    /// True when axis-aligned rects stay axis-aligned (scale/translate or a
    /// 90° rotation).
    #[inline]
    pub fn preserves_axis_alignment(&self) -> bool {
        (self.kx == 0.0 && self.ky == 0.0) || (self.sx == 0.0 && self.sy == 0.0)
    }

    pub fn invert(&self) -> Option<Matrix> {
        let det = self.sx * self.sy - self.kx * self.ky;
        if det.abs() <= f32::EPSILON * f32::EPSILON || !det.is_finite() {
            return None;
        }
        let inv = 1.0 / det;
        Some(Matrix {
            sx: self.sy * inv,
            kx: -self.kx * inv,
            tx: (self.kx * self.ty - self.sy * self.tx) * inv,
            ky: -self.ky * inv,
            sy: self.sx * inv,
            ty: (self.ky * self.tx - self.sx * self.ty) * inv,
        })
    }

    #[inline]
    pub fn map_point(&self, p: Vec2) -> Vec2 {
        Vec2::new(
            self.sx * p.x + self.kx * p.y + self.tx,
            self.ky * p.x + self.sy * p.y + self.ty,
        )
    }

    /// Maps a vector (translation ignored).
    #[inline]
    pub fn map_vector(&self, v: Vec2) -> Vec2 {
        Vec2::new(self.sx * v.x + self.kx * v.y, self.ky * v.x + self.sy * v.y)
    }

    /// Bounds of the four mapped corners.
    pub fn map_rect(&self, r: Rect) -> Rect {
        let c = r.corners().map(|p| self.map_point(p));
        Rect::bounds_of(&c).unwrap_or_default()
    }

    /// Largest stretch applied to a unit vector; used to pick curve
    /// flattening tolerances.
    pub fn max_scale(&self) -> f32 {
        let a = self.sx * self.sx + self.ky * self.ky;
        let b = self.kx * self.kx + self.sy * self.sy;
        a.max(b).sqrt()
    }

    /// Column-major 3x3 with each column padded to 4 floats (WGSL `mat3x3<f32>`).
    pub fn to_columns(&self) -> [[f32; 4]; 3] {
        [
            [self.sx, self.ky, 0.0, 0.0],
            [self.kx, self.sy, 0.0, 0.0],
            [self.tx, self.ty, 1.0, 0.0],
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: Vec2, b: Vec2) -> bool {
        (a.x - b.x).abs() < 1e-4 && (a.y - b.y).abs() < 1e-4
    }

    #[test]
    fn concat_applies_right_operand_first() {
        let m = Matrix::concat(&Matrix::translate(10.0, 0.0), &Matrix::scale(2.0, 2.0));
        assert_eq!(m.map_point(Vec2::new(1.0, 1.0)), Vec2::new(12.0, 2.0));
    }

    #[test]
    fn post_concat_applies_last() {
        let mut m = Matrix::translate(-5.0, -5.0);
        m.post_concat(&Matrix::scale(4.0, 4.0));
        assert_eq!(m.map_point(Vec2::new(6.0, 7.0)), Vec2::new(4.0, 8.0));
    }

    #[test]
    fn invert_round_trips() {
        let m = Matrix { sx: 2.0, kx: 0.5, tx: 3.0, ky: -0.25, sy: 1.5, ty: -7.0 };
        let inv = m.invert().unwrap();
        let p = Vec2::new(4.0, -2.0);
        assert!(approx(inv.map_point(m.map_point(p)), p));
    }

    #[test]
    fn singular_matrix_has_no_inverse() {
        assert!(Matrix::scale(0.0, 1.0).invert().is_none());
    }

    #[test]
    fn map_rect_bounds_rotated_corners() {
        let rot = Matrix { sx: 0.0, kx: -1.0, tx: 0.0, ky: 1.0, sy: 0.0, ty: 0.0 };
        assert!(rot.preserves_axis_alignment());
        let r = rot.map_rect(Rect::new(0.0, 0.0, 4.0, 2.0));
        assert_eq!(r, Rect::from_ltrb(-2.0, 0.0, 0.0, 4.0));
    }
}
