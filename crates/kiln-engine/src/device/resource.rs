use super::{TextureDesc, TextureFlags};

/// Device handle of a texture.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u64);

/// Device handle of a stencil buffer.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct StencilId(pub u64);

/// A texture allocated by a device. `desc` holds the allocated size, which
/// may exceed what was requested.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct Texture {
    pub id: TextureId,
    pub desc: TextureDesc,
}

impl Texture {
    #[inline]
    pub fn width(&self) -> u32 {
        self.desc.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.desc.height
    }

    /// The render-target view of this texture, when it has one.
    #[inline]
    pub fn as_render_target(&self) -> Option<RenderTarget> {
        self.desc.is_render_target().then(|| RenderTarget {
            texture: self.id,
            width: self.desc.width,
            height: self.desc.height,
            sample_count: self.desc.aa_level.sample_count(),
            needs_stencil: !self.desc.flags.contains(TextureFlags::NO_STENCIL),
        })
    }
}

/// A surface that draws can be directed at.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct RenderTarget {
    pub texture: TextureId,
    pub width: u32,
    pub height: u32,
    pub sample_count: u32,
    /// False for targets created with [`TextureFlags::NO_STENCIL`].
    pub needs_stencil: bool,
}

impl RenderTarget {
    #[inline]
    pub fn is_multisampled(&self) -> bool {
        self.sample_count > 1
    }

    #[inline]
    pub fn bounds(&self) -> crate::coords::IRect {
        crate::coords::IRect::from_wh(self.width as i32, self.height as i32)
    }
}

/// A stencil buffer allocated by a device.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct StencilBuffer {
    pub id: StencilId,
    pub width: u32,
    pub height: u32,
    pub sample_count: u32,
}

impl StencilBuffer {
    /// One byte per sample.
    #[inline]
    pub fn byte_size(&self) -> usize {
        self.width as usize * self.height as usize * self.sample_count.max(1) as usize
    }
}
