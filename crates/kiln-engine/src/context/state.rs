use core::ops::BitOr;

use crate::coords::{IRect, Matrix};
use crate::device::RenderTarget;

/// Which path a draw takes to the device.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum DrawCategory {
    /// Recorded into the draw buffer.
    Buffered,
    /// Submitted to the device immediately.
    Unbuffered,
    /// Accumulated in the glyph batch.
    Text,
}

/// Device-space clip of the context.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum Clip {
    #[default]
    WideOpen,
    Rect(IRect),
}

impl Clip {
    /// Clip bounds within `target` (`None` when nothing is visible).
    pub fn bounds(&self, target: &RenderTarget) -> Option<IRect> {
        match self {
            Clip::WideOpen => Some(target.bounds()),
            Clip::Rect(r) => r.intersect(target.bounds()),
        }
    }

    /// Scissor for a draw state.
    #[inline]
    pub fn scissor(&self) -> Option<IRect> {
        match self {
            Clip::WideOpen => None,
            Clip::Rect(r) => Some(*r),
        }
    }
}

/// Context-wide state: target, matrix, clip and the last draw category.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ContextState {
    pub render_target: RenderTarget,
    pub matrix: Matrix,
    pub clip: Clip,
    pub last_category: DrawCategory,
}

impl ContextState {
    pub fn new(render_target: RenderTarget) -> Self {
        Self {
            render_target,
            matrix: Matrix::IDENTITY,
            clip: Clip::WideOpen,
            last_category: DrawCategory::Unbuffered,
        }
    }
}

/// Options for [`Context::flush`](super::Context::flush).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub struct FlushFlags(u8);

impl FlushFlags {
    pub const NONE: FlushFlags = FlushFlags(0);
    /// Bind the current render target even if nothing is drawn.
    pub const FORCE_CURRENT_RENDER_TARGET: FlushFlags = FlushFlags(1 << 0);
    /// Drop buffered work instead of submitting it.
    pub const DISCARD: FlushFlags = FlushFlags(1 << 1);

    #[inline]
    pub const fn contains(self, other: FlushFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for FlushFlags {
    type Output = FlushFlags;
    #[inline]
    fn bitor(self, rhs: FlushFlags) -> FlushFlags {
        FlushFlags(self.0 | rhs.0)
    }
}

/// Counters kept by the context. Reset with
/// [`Context::reset_stats`](super::Context::reset_stats).
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct ContextStats {
    pub draw_buffer_flushes: u64,
    pub buffered_draws: u64,
    pub immediate_draws: u64,
    pub offscreen_aa_tiles: u64,
    pub offscreen_fallback_tiles: u64,
    pub texture_creates: u64,
    pub stencil_creates: u64,
}
