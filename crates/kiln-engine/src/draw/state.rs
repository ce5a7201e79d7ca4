use crate::coords::{IRect, Matrix};
use crate::device::{PixelConfig, RenderTarget, Texture};
use crate::paint::{BlendFunc, Color, Paint, SamplerState, PAINT_STAGES};

/// Total texture stages: the paint stages plus one coverage stage.
pub const MAX_STAGES: usize = PAINT_STAGES + 1;

/// Stage whose sampled alpha scales coverage instead of color.
pub const COVERAGE_STAGE: usize = PAINT_STAGES;

/// Where a stage reads its input coordinates from.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub enum CoordSource {
    /// The vertex position before the view matrix.
    #[default]
    Position,
    /// The vertex texture coordinate.
    TexCoord,
}

/// A bound texture stage.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct StageState {
    pub texture: Texture,
    pub sampler: SamplerState,
    pub coords: CoordSource,
}

impl StageState {
    #[inline]
    pub fn new(texture: Texture, sampler: SamplerState) -> Self {
        Self { texture, sampler, coords: CoordSource::Position }
    }

    #[inline]
    pub fn with_coords(mut self, coords: CoordSource) -> Self {
        self.coords = coords;
        self
    }

    /// Alpha-only textures sample as `(a, a, a, a)`.
    #[inline]
    pub fn is_alpha_only(&self) -> bool {
        self.texture.desc.config == PixelConfig::Alpha8
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum StencilFunc {
    Always,
    Never,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum StencilOp {
    Keep,
    Zero,
    Replace,
    IncWrap,
    DecWrap,
    IncClamp,
    DecClamp,
    Invert,
}

/// Stencil behavior for one triangle facing.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct StencilFace {
    pub func: StencilFunc,
    pub fail_op: StencilOp,
    pub pass_op: StencilOp,
}

impl StencilFace {
    const PASS_THROUGH: StencilFace =
        StencilFace { func: StencilFunc::Always, fail_op: StencilOp::Keep, pass_op: StencilOp::Keep };
}

/// Stencil test and update applied by a draw.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct StencilSettings {
    pub front: StencilFace,
    pub back: StencilFace,
    pub reference: u8,
    pub read_mask: u8,
    pub write_mask: u8,
}

impl Default for StencilSettings {
    fn default() -> Self {
        Self::DISABLED
    }
}

impl StencilSettings {
    pub const DISABLED: StencilSettings = StencilSettings {
        front: StencilFace::PASS_THROUGH,
        back: StencilFace::PASS_THROUGH,
        reference: 0,
        read_mask: 0xff,
        write_mask: 0,
    };

    /// Accumulates the nonzero winding number: front faces increment, back
    /// faces decrement.
    pub const WINDING_PASS: StencilSettings = StencilSettings {
        front: StencilFace { func: StencilFunc::Always, fail_op: StencilOp::Keep, pass_op: StencilOp::IncWrap },
        back: StencilFace { func: StencilFunc::Always, fail_op: StencilOp::Keep, pass_op: StencilOp::DecWrap },
        reference: 0,
        read_mask: 0xff,
        write_mask: 0xff,
    };

    /// Accumulates even-odd parity in the low bit.
    pub const EVEN_ODD_PASS: StencilSettings = StencilSettings {
        front: StencilFace { func: StencilFunc::Always, fail_op: StencilOp::Keep, pass_op: StencilOp::Invert },
        back: StencilFace { func: StencilFunc::Always, fail_op: StencilOp::Keep, pass_op: StencilOp::Invert },
        reference: 0,
        read_mask: 0xff,
        write_mask: 0x01,
    };

    /// Draws where the stencil is nonzero and resets it to zero.
    pub const COVER: StencilSettings = StencilSettings {
        front: StencilFace { func: StencilFunc::NotEqual, fail_op: StencilOp::Keep, pass_op: StencilOp::Zero },
        back: StencilFace { func: StencilFunc::NotEqual, fail_op: StencilOp::Keep, pass_op: StencilOp::Zero },
        reference: 0,
        read_mask: 0xff,
        write_mask: 0xff,
    };

    /// Draws where the stencil is zero and resets the rest to zero.
    pub const INVERSE_COVER: StencilSettings = StencilSettings {
        front: StencilFace { func: StencilFunc::Equal, fail_op: StencilOp::Zero, pass_op: StencilOp::Keep },
        back: StencilFace { func: StencilFunc::Equal, fail_op: StencilOp::Zero, pass_op: StencilOp::Keep },
        reference: 0,
        read_mask: 0xff,
        write_mask: 0xff,
    };

    #[inline]
    pub fn is_disabled(&self) -> bool {
        self.front == StencilFace::PASS_THROUGH && self.back == StencilFace::PASS_THROUGH
    }
}

/// Everything a device needs to execute one draw.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct DrawState {
    pub render_target: RenderTarget,
    pub view_matrix: Matrix,
    /// Device-space scissor; `None` draws everywhere.
    pub clip: Option<IRect>,
    pub blend: BlendFunc,
    /// Color given to generated vertices.
    pub color: Color,
    pub stages: [Option<StageState>; MAX_STAGES],
    pub stencil: StencilSettings,
    pub hw_antialias: bool,
    pub dither: bool,
    pub color_writes: bool,
}

impl DrawState {
    pub fn new(render_target: RenderTarget) -> Self {
        Self {
            render_target,
            view_matrix: Matrix::IDENTITY,
            clip: None,
            blend: BlendFunc::SRC_OVER,
            color: Color::WHITE,
            stages: [None; MAX_STAGES],
            stencil: StencilSettings::DISABLED,
            hw_antialias: false,
            dither: false,
            color_writes: true,
        }
    }

    /// Copies color, blend, dither and paint stages from `paint`. The
    /// coverage stage is cleared.
    pub fn set_paint(&mut self, paint: &Paint) {
        self.color = paint.color;
        self.blend = paint.blend;
        self.dither = paint.dither;
        for (i, slot) in self.stages.iter_mut().enumerate() {
            *slot = paint
                .stages
                .get(i)
                .copied()
                .flatten()
                .map(|s| StageState::new(s.texture, s.sampler));
        }
    }

    /// Disables every paint stage; the coverage stage is kept.
    pub fn disable_paint_stages(&mut self) {
        for slot in self.stages.iter_mut().take(PAINT_STAGES) {
            *slot = None;
        }
    }

    /// Bit `i` set when stage `i` is bound.
    pub fn stage_mask(&self) -> u32 {
        self.stages
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_some())
            .fold(0, |mask, (i, _)| mask | (1 << i))
    }

    /// Pre-concatenates `m` onto the sampler matrices of the stages in `mask`
    /// that read positions.
    pub fn pre_concat_sampler_matrices(&mut self, mask: u32, m: &Matrix) {
        for (i, slot) in self.stages.iter_mut().enumerate() {
            if mask & (1 << i) == 0 {
                continue;
            }
            if let Some(stage) = slot
                && stage.coords == CoordSource::Position
            {
                stage.sampler.pre_concat_matrix(m);
            }
        }
    }

    /// Textures bound per stage.
    pub fn stage_textures(&self) -> [Option<crate::device::TextureId>; MAX_STAGES] {
        self.stages.map(|s| s.map(|s| s.texture.id))
    }

    #[inline]
    pub fn can_tweak_alpha_for_coverage(&self) -> bool {
        self.blend.can_tweak_alpha_for_coverage()
    }
}
