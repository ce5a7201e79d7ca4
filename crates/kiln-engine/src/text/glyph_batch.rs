use crate::coords::Rect;
use crate::device::Texture;
use crate::draw::{textured_rect_vertices, CoordSource, DrawState, DrawTarget, StageState, COVERAGE_STAGE};
use crate::paint::SamplerState;

/// One glyph to draw: where it lands and where it sits in the atlas.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct GlyphQuad {
    /// Destination in local coordinates.
    pub dst: Rect,
    /// Source in normalized atlas coordinates.
    pub uv: Rect,
}

/// Glyph quads sharing one atlas and one draw state.
///
/// The atlas is an alpha mask bound to the coverage stage, so paint stages
/// stay available for the text's fill.
#[derive(Debug, Default)]
pub struct GlyphBatch {
    atlas: Option<Texture>,
    state: Option<DrawState>,
    quads: Vec<GlyphQuad>,
}

impl GlyphBatch {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.quads.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.quads.len()
    }

    /// True when glyphs from `atlas` drawn with `state` can join the batch.
    pub fn accepts(&self, atlas: &Texture, state: &DrawState) -> bool {
        self.is_empty() || (self.atlas.as_ref() == Some(atlas) && self.state.as_ref() == Some(state))
    }

    /// Appends glyphs; the caller emits first when [`accepts`](Self::accepts)
    /// is false.
    pub fn push(&mut self, atlas: &Texture, state: &DrawState, glyphs: &[GlyphQuad]) {
        if self.is_empty() {
            self.atlas = Some(*atlas);
            self.state = Some(*state);
        }
        self.quads.extend_from_slice(glyphs);
    }

    /// Draws every pending glyph into `target` and empties the batch.
    /// Returns the number of glyphs drawn.
    pub fn emit(&mut self, target: &mut dyn DrawTarget) -> usize {
        let (Some(atlas), Some(state)) = (self.atlas.take(), self.state.take()) else {
            self.quads.clear();
            return 0;
        };
        let count = self.quads.len();
        let saved = *target.state();
        let st = target.state_mut();
        *st = state;
        st.stages[COVERAGE_STAGE] =
            Some(StageState::new(atlas, SamplerState::clamp_no_filter()).with_coords(CoordSource::TexCoord));
        for q in self.quads.drain(..) {
            target.draw_quad(textured_rect_vertices(q.dst, q.uv, state.color));
        }
        *target.state_mut() = saved;
        count
    }

    /// Drops pending glyphs without drawing them.
    pub fn reset(&mut self) {
        self.atlas = None;
        self.state = None;
        self.quads.clear();
    }
}
