/// Blend coefficient applied to the source or destination color.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum BlendCoeff {
    Zero,
    One,
    /// Source color.
    Sc,
    /// One minus source color.
    Isc,
    /// Destination color.
    Dc,
    /// One minus destination color.
    Idc,
    /// Source alpha.
    Sa,
    /// One minus source alpha.
    Isa,
    /// Destination alpha.
    Da,
    /// One minus destination alpha.
    Ida,
}

/// `out = src * src_coeff + dst * dst_coeff`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct BlendFunc {
    pub src: BlendCoeff,
    pub dst: BlendCoeff,
}

impl Default for BlendFunc {
    fn default() -> Self {
        Self::SRC_OVER
    }
}

impl BlendFunc {
    /// Premultiplied source-over.
    pub const SRC_OVER: BlendFunc = BlendFunc { src: BlendCoeff::One, dst: BlendCoeff::Isa };
    /// Replaces the destination.
    pub const SRC: BlendFunc = BlendFunc { src: BlendCoeff::One, dst: BlendCoeff::Zero };

    #[inline]
    pub const fn new(src: BlendCoeff, dst: BlendCoeff) -> Self {
        Self { src, dst }
    }

    /// True when partial coverage can be folded into the source color before
    /// blending without changing the result for fully covered pixels.
    ///
    /// This holds when the destination term is `One`, `ISA` or `ISC`: scaling
    /// the source by coverage then yields `lerp(dst, blend(src, dst), coverage)`.
    #[inline]
    pub fn can_tweak_alpha_for_coverage(self) -> bool {
        matches!(self.dst, BlendCoeff::One | BlendCoeff::Isa | BlendCoeff::Isc)
    }
}
