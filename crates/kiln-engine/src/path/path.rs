use crate::coords::{Rect, Vec2};

/// Path construction verb.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PathVerb {
    Move,
    Line,
    Quad,
    Cubic,
    Close,
}

impl PathVerb {
    /// Points the verb consumes.
    #[inline]
    fn point_count(self) -> usize {
        match self {
            PathVerb::Move | PathVerb::Line => 1,
            PathVerb::Quad => 2,
            PathVerb::Cubic => 3,
            PathVerb::Close => 0,
        }
    }
}

/// How a path's interior is determined.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum PathFill {
    Winding,
    EvenOdd,
    InverseWinding,
    InverseEvenOdd,
    /// Zero-width stroke of every contour.
    Hairline,
}

impl PathFill {
    #[inline]
    pub fn is_inverse(self) -> bool {
        matches!(self, PathFill::InverseWinding | PathFill::InverseEvenOdd)
    }

    #[inline]
    pub fn is_hairline(self) -> bool {
        self == PathFill::Hairline
    }

    /// The same fill rule without inversion.
    #[inline]
    pub fn non_inverse(self) -> PathFill {
        match self {
            PathFill::InverseWinding => PathFill::Winding,
            PathFill::InverseEvenOdd => PathFill::EvenOdd,
            other => other,
        }
    }
}

/// A flattened contour.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Contour {
    pub points: Vec<Vec2>,
    pub closed: bool,
}

/// Sequence of contours made of lines and Bézier curves.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Path {
    verbs: Vec<PathVerb>,
    points: Vec<Vec2>,
}

const MAX_CURVE_SEGMENTS: u32 = 256;

impl Path {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Closed rect contour (clockwise in y-down space).
    pub fn rect(r: Rect) -> Self {
        Self::polygon(&r.corners())
    }

    /// Closed polygon through `points`.
    pub fn polygon(points: &[Vec2]) -> Self {
        let mut path = Path::new();
        if let Some((first, rest)) = points.split_first() {
            path.move_to(*first);
            for p in rest {
                path.line_to(*p);
            }
            path.close();
        }
        path
    }

    pub fn move_to(&mut self, p: Vec2) -> &mut Self {
        self.verbs.push(PathVerb::Move);
        self.points.push(p);
        self
    }

    fn ensure_started(&mut self) {
        if self.verbs.is_empty() || self.verbs.last() == Some(&PathVerb::Close) {
            let start = self.contour_start().unwrap_or_default();
            self.move_to(start);
        }
    }

    fn contour_start(&self) -> Option<Vec2> {
        let mut at = 0;
        let mut start = None;
        for v in &self.verbs {
            if *v == PathVerb::Move {
                start = self.points.get(at).copied();
            }
            at += v.point_count();
        }
        start
    }

    pub fn line_to(&mut self, p: Vec2) -> &mut Self {
        self.ensure_started();
        self.verbs.push(PathVerb::Line);
        self.points.push(p);
        self
    }

    pub fn quad_to(&mut self, c: Vec2, p: Vec2) -> &mut Self {
        self.ensure_started();
        self.verbs.push(PathVerb::Quad);
        self.points.extend_from_slice(&[c, p]);
        self
    }

    pub fn cubic_to(&mut self, c1: Vec2, c2: Vec2, p: Vec2) -> &mut Self {
        self.ensure_started();
        self.verbs.push(PathVerb::Cubic);
        self.points.extend_from_slice(&[c1, c2, p]);
        self
    }

    pub fn close(&mut self) -> &mut Self {
        if matches!(self.verbs.last(), Some(v) if *v != PathVerb::Close) {
            self.verbs.push(PathVerb::Close);
        }
        self
    }

    #[inline]
    pub fn verbs(&self) -> &[PathVerb] {
        &self.verbs
    }

    #[inline]
    pub fn points(&self) -> &[Vec2] {
        &self.points
    }

    /// True when the path encloses nothing and draws nothing.
    pub fn is_empty(&self) -> bool {
        !self.verbs.iter().any(|v| !matches!(v, PathVerb::Move | PathVerb::Close))
    }

    /// Bounds of every point, control points included.
    #[inline]
    pub fn bounds(&self) -> Option<Rect> {
        Rect::bounds_of(&self.points)
    }

    /// Approximates the path with polylines whose deviation from the curves
    /// stays under `tolerance`.
    pub fn flatten(&self, tolerance: f32) -> Vec<Contour> {
        let tol = tolerance.max(1e-3);
        let mut out: Vec<Contour> = Vec::new();
        let mut current = Contour::default();
        let mut at = 0;
        for verb in &self.verbs {
            let pts = &self.points[at..at + verb.point_count()];
            at += verb.point_count();
            let last = current.points.last().copied().unwrap_or_default();
            match verb {
                PathVerb::Move => {
                    if current.points.len() > 1 {
                        out.push(std::mem::take(&mut current));
                    }
                    current = Contour { points: vec![pts[0]], closed: false };
                }
                PathVerb::Line => current.points.push(pts[0]),
                PathVerb::Quad => {
                    let dd = (last - pts[0] * 2.0 + pts[1]).length();
                    let n = segments(dd, tol);
                    for i in 1..=n {
                        let t = i as f32 / n as f32;
                        let a = last.lerp(pts[0], t);
                        let b = pts[0].lerp(pts[1], t);
                        current.points.push(a.lerp(b, t));
                    }
                }
                PathVerb::Cubic => {
                    let dd = (last - pts[0] * 2.0 + pts[1]).length().max((pts[0] - pts[1] * 2.0 + pts[2]).length());
                    let n = segments(dd * 3.0, tol);
                    for i in 1..=n {
                        let t = i as f32 / n as f32;
                        let mt = 1.0 - t;
                        let p = last * (mt * mt * mt)
                            + pts[0] * (3.0 * mt * mt * t)
                            + pts[1] * (3.0 * mt * t * t)
                            + pts[2] * (t * t * t);
                        current.points.push(p);
                    }
                }
                PathVerb::Close => {
                    current.closed = true;
                    let start = current.points.first().copied();
                    if current.points.len() > 1 {
                        out.push(std::mem::take(&mut current));
                    }
                    if let Some(start) = start {
                        current = Contour { points: vec![start], closed: false };
                    }
                }
            }
        }
        if current.points.len() > 1 {
            out.push(current);
        }
        out
    }

    /// True for a single contour whose turns all go the same way.
    pub fn is_convex(&self) -> bool {
        let contours = self.flatten(0.25);
        let [contour] = contours.as_slice() else {
            return false;
        };
        let pts = &contour.points;
        let n = pts.len();
        if n < 3 {
            return false;
        }
        let mut sign = 0.0f32;
        for i in 0..n {
            let a = pts[i];
            let b = pts[(i + 1) % n];
            let c = pts[(i + 2) % n];
            let turn = (b - a).cross(c - b);
            if turn.abs() <= f32::EPSILON {
                continue;
            }
            if sign == 0.0 {
                sign = turn.signum();
            } else if turn.signum() != sign {
                return false;
            }
        }
        sign != 0.0
    }
}

fn segments(deviation: f32, tolerance: f32) -> u32 {
    let n = (deviation / (4.0 * tolerance)).sqrt().ceil();
    if n.is_finite() { (n as u32).clamp(1, MAX_CURVE_SEGMENTS) } else { 1 }
}
