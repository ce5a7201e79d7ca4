use crate::coords::Matrix;
use crate::device::Texture;
use crate::paint::{BlendFunc, Color, SamplerState};

/// Number of texture stages a paint can use.
pub const PAINT_STAGES: usize = 2;

/// One textured input of a paint.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PaintStage {
    pub texture: Texture,
    pub sampler: SamplerState,
}

/// Describes how to color the pixels a draw covers.
///
/// Stage colors are modulated with `color`; stage inputs default to the
/// draw's positions (pre view-matrix) unless the draw supplies texture
/// coordinates.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Paint {
    pub color: Color,
    pub blend: BlendFunc,
    pub anti_alias: bool,
    pub dither: bool,
    pub stages: [Option<PaintStage>; PAINT_STAGES],
}

impl Default for Paint {
    fn default() -> Self {
        Self {
            color: Color::WHITE,
            blend: BlendFunc::SRC_OVER,
            anti_alias: false,
            dither: false,
            stages: [None; PAINT_STAGES],
        }
    }
}

impl Paint {
    #[inline]
    pub fn solid(color: Color) -> Self {
        Self { color, ..Self::default() }
    }

    #[inline]
    pub fn with_anti_alias(mut self, aa: bool) -> Self {
        self.anti_alias = aa;
        self
    }

    #[inline]
    pub fn with_blend(mut self, blend: BlendFunc) -> Self {
        self.blend = blend;
        self
    }

    /// Sets texture stage `stage`; out-of-range stages are ignored.
    #[inline]
    pub fn with_texture(mut self, stage: usize, texture: Texture, sampler: SamplerState) -> Self {
        if let Some(slot) = self.stages.get_mut(stage) {
            *slot = Some(PaintStage { texture, sampler });
        }
        self
    }

    #[inline]
    pub fn texture(&self, stage: usize) -> Option<&Texture> {
        self.stages.get(stage)?.as_ref().map(|s| &s.texture)
    }

    /// Bit `i` set when stage `i` has a texture.
    pub fn active_stage_mask(&self) -> u32 {
        self.stages
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_some())
            .fold(0, |mask, (i, _)| mask | (1 << i))
    }

    /// Pre-concatenates `m` onto the sampler matrix of every active stage.
    pub fn pre_concat_sampler_matrices(&mut self, m: &Matrix) {
        for stage in self.stages.iter_mut().flatten() {
            stage.sampler.pre_concat_matrix(m);
        }
    }

    #[inline]
    pub fn is_opaque(&self) -> bool {
        self.color.is_opaque() && self.stages.iter().all(Option::is_none)
    }
}
