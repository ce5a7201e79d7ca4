use core::ops::BitOr;

/// Pixel layout of a texture or a pixel transfer buffer.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum PixelConfig {
    Alpha8,
    /// 8-bit palette index.
    Index8,
    Rgb565,
    Rgba4444,
    /// Premultiplied RGBA, 8 bits per channel.
    Rgba8888,
    /// Premultiplied BGRA, 8 bits per channel.
    Bgra8888,
}

impl PixelConfig {
    #[inline]
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            PixelConfig::Alpha8 | PixelConfig::Index8 => 1,
            PixelConfig::Rgb565 | PixelConfig::Rgba4444 => 2,
            PixelConfig::Rgba8888 | PixelConfig::Bgra8888 => 4,
        }
    }

    #[inline]
    pub const fn is_alpha_only(self) -> bool {
        matches!(self, PixelConfig::Alpha8)
    }

    /// Configs pixel readback can produce.
    #[inline]
    pub const fn is_readable(self) -> bool {
        matches!(self, PixelConfig::Rgba8888 | PixelConfig::Bgra8888)
    }
}

/// Texture creation flags.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub struct TextureFlags(u8);

impl TextureFlags {
    pub const NONE: TextureFlags = TextureFlags(0);
    /// The texture can be bound as a render target.
    pub const RENDER_TARGET: TextureFlags = TextureFlags(1 << 0);
    /// A render target that never needs a stencil buffer.
    pub const NO_STENCIL: TextureFlags = TextureFlags(1 << 1);

    #[inline]
    pub const fn contains(self, other: TextureFlags) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub const fn without(self, other: TextureFlags) -> TextureFlags {
        TextureFlags(self.0 & !other.0)
    }

    #[inline]
    pub const fn bits(self) -> u8 {
        self.0
    }
}

impl BitOr for TextureFlags {
    type Output = TextureFlags;
    #[inline]
    fn bitor(self, rhs: TextureFlags) -> TextureFlags {
        TextureFlags(self.0 | rhs.0)
    }
}

/// Multisample level requested for a render target.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default, PartialOrd, Ord)]
pub enum AaLevel {
    #[default]
    None,
    Low,
    Med,
    High,
}

impl AaLevel {
    #[inline]
    pub const fn sample_count(self) -> u32 {
        match self {
            AaLevel::None => 1,
            AaLevel::Low => 2,
            AaLevel::Med => 4,
            AaLevel::High => 8,
        }
    }
}

/// Describes a texture to allocate.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct TextureDesc {
    pub flags: TextureFlags,
    pub aa_level: AaLevel,
    pub width: u32,
    pub height: u32,
    pub config: PixelConfig,
}

impl TextureDesc {
    #[inline]
    pub const fn new(width: u32, height: u32, config: PixelConfig) -> Self {
        Self { flags: TextureFlags::NONE, aa_level: AaLevel::None, width, height, config }
    }

    #[inline]
    pub const fn with_flags(mut self, flags: TextureFlags) -> Self {
        self.flags = flags;
        self
    }

    #[inline]
    pub const fn with_aa_level(mut self, aa_level: AaLevel) -> Self {
        self.aa_level = aa_level;
        self
    }

    #[inline]
    pub const fn is_render_target(&self) -> bool {
        self.flags.contains(TextureFlags::RENDER_TARGET)
    }

    /// A render target that has not opted out of stenciling.
    #[inline]
    pub const fn needs_stencil(&self) -> bool {
        self.is_render_target() && !self.flags.contains(TextureFlags::NO_STENCIL)
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// GPU memory estimate: the color storage plus the multisample surface
    /// for antialiased render targets.
    pub fn byte_size(&self) -> usize {
        let base = self.width as usize * self.height as usize * self.config.bytes_per_pixel();
        let samples = self.aa_level.sample_count() as usize;
        if self.is_render_target() && samples > 1 {
            base + base * samples
        } else {
            base
        }
    }
}
