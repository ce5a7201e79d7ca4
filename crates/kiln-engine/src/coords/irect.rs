/// Integer rectangle in device pixels, stored as edges (`right`/`bottom`
/// exclusive).
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct IRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl IRect {
    #[inline]
    pub const fn from_ltrb(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self { left, top, right, bottom }
    }

    #[inline]
    pub const fn from_xywh(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self::from_ltrb(x, y, x + w, y + h)
    }

    #[inline]
    pub const fn from_wh(w: i32, h: i32) -> Self {
        Self::from_ltrb(0, 0, w, h)
    }

    #[inline]
    pub const fn width(self) -> i32 {
        self.right - self.left
    }

    #[inline]
    pub const fn height(self) -> i32 {
        self.bottom - self.top
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.left >= self.right || self.top >= self.bottom
    }

    #[inline]
    pub fn intersect(self, other: IRect) -> Option<IRect> {
        let r = IRect::from_ltrb(
            self.left.max(other.left),
            self.top.max(other.top),
            self.right.min(other.right),
            self.bottom.min(other.bottom),
        );
        if r.is_empty() { None } else { Some(r) }
    }

    /// True when `other` lies entirely inside `self`.
    #[inline]
    pub fn contains_rect(self, other: IRect) -> bool {
        !other.is_empty()
            && other.left >= self.left
            && other.top >= self.top
            && other.right <= self.right
            && other.bottom <= self.bottom
    }

    #[inline]
    pub fn offset(self, dx: i32, dy: i32) -> IRect {
        IRect::from_ltrb(self.left + dx, self.top + dy, self.right + dx, self.bottom + dy)
    }
}
