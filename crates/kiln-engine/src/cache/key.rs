use crate::device::{DeviceCaps, TextureDesc};
use crate::paint::SamplerState;

/// Sampler-derived bits folded into a client texture key.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub struct KeyCriteria(u8);

impl KeyCriteria {
    pub const NONE: KeyCriteria = KeyCriteria(0);
    /// The texture is a power-of-two stretch of the client's image.
    pub const STRETCH: KeyCriteria = KeyCriteria(1 << 0);
    /// The stretch was filtered.
    pub const FILTER: KeyCriteria = KeyCriteria(1 << 1);

    /// Criteria a sampler imposes on a `width` x `height` image.
    ///
    /// Tiling an NPOT image on a device that cannot tile NPOT textures
    /// requires a power-of-two stretch.
    pub fn for_sampler(caps: &DeviceCaps, sampler: Option<&SamplerState>, width: u32, height: u32) -> Self {
        let Some(sampler) = sampler else {
            return KeyCriteria::NONE;
        };
        let npot = !width.is_power_of_two() || !height.is_power_of_two();
        if !caps.npot_texture_tile_support && sampler.is_tiled() && npot {
            if sampler.is_filtered() {
                KeyCriteria(Self::STRETCH.0 | Self::FILTER.0)
            } else {
                Self::STRETCH
            }
        } else {
            KeyCriteria::NONE
        }
    }

    #[inline]
    pub fn needs_stretch(self) -> bool {
        self.0 & Self::STRETCH.0 != 0
    }

    #[inline]
    pub fn needs_filter(self) -> bool {
        self.0 & Self::FILTER.0 != 0
    }
}

/// Cache key of a resource.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ResourceKey {
    /// A client-keyed texture.
    Texture {
        client: u64,
        width: u32,
        height: u32,
        criteria: KeyCriteria,
    },
    /// A scratch texture, keyed by its allocated descriptor.
    Scratch(TextureDesc),
    Stencil {
        width: u32,
        height: u32,
        samples: u32,
    },
}

impl ResourceKey {
    #[inline]
    pub fn texture(client: u64, width: u32, height: u32, criteria: KeyCriteria) -> Self {
        ResourceKey::Texture { client, width, height, criteria }
    }

    #[inline]
    pub fn is_scratch(&self) -> bool {
        matches!(self, ResourceKey::Scratch(_))
    }
}

/// How closely a scratch texture must match a request.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ScratchTexMatch {
    /// Same descriptor, bit for bit.
    Exact,
    /// At least as large, same config and AA level, render target and
    /// stencil when requested.
    Approx,
}

impl ScratchTexMatch {
    pub fn satisfies(self, candidate: &TextureDesc, request: &TextureDesc) -> bool {
        match self {
            ScratchTexMatch::Exact => candidate == request,
            ScratchTexMatch::Approx => {
                candidate.width >= request.width
                    && candidate.height >= request.height
                    && candidate.config == request.config
                    && candidate.aa_level == request.aa_level
                    && (!request.is_render_target() || candidate.is_render_target())
                    && (!request.needs_stencil() || candidate.needs_stencil())
            }
        }
    }
}

/// Size bin for an approximate scratch allocation:
/// `max(min_size, next_pow2(dim))`, clamped to `max_size` but never below
/// `dim`.
pub fn scratch_bin(dim: u32, min_size: u32, max_size: u32) -> u32 {
    let pow2 = dim.checked_next_power_of_two().unwrap_or(dim);
    pow2.max(min_size).min(max_size).max(dim)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{AaLevel, PixelConfig, TextureFlags};
    use crate::paint::{Filter, WrapMode};

    fn rt(w: u32, h: u32) -> TextureDesc {
        TextureDesc::new(w, h, PixelConfig::Rgba8888).with_flags(TextureFlags::RENDER_TARGET)
    }

    #[test]
    fn approx_requires_size_config_and_target_traits() {
        let req = rt(100, 50);
        assert!(ScratchTexMatch::Approx.satisfies(&rt(128, 64), &req));
        assert!(!ScratchTexMatch::Approx.satisfies(&rt(64, 64), &req));
        assert!(!ScratchTexMatch::Approx.satisfies(&TextureDesc::new(128, 64, PixelConfig::Rgba8888), &req));
        assert!(!ScratchTexMatch::Approx.satisfies(&rt(128, 64).with_aa_level(AaLevel::Low), &req));
        let no_stencil = rt(128, 64).with_flags(TextureFlags::RENDER_TARGET | TextureFlags::NO_STENCIL);
        assert!(!ScratchTexMatch::Approx.satisfies(&no_stencil, &req));
        assert!(ScratchTexMatch::Approx.satisfies(&rt(128, 64), &no_stencil));
    }

    #[test]
    fn exact_requires_identical_descriptor() {
        assert!(ScratchTexMatch::Exact.satisfies(&rt(64, 64), &rt(64, 64)));
        assert!(!ScratchTexMatch::Exact.satisfies(&rt(128, 64), &rt(64, 64)));
    }

    #[test]
    fn bins_round_up_to_pow2_with_floor() {
        assert_eq!(scratch_bin(100, 256, 4096), 256);
        assert_eq!(scratch_bin(300, 256, 4096), 512);
        assert_eq!(scratch_bin(3000, 256, 2048), 3000);
        assert_eq!(scratch_bin(1500, 256, 2048), 2048);
    }

    #[test]
    fn stretch_only_for_tiled_npot_without_device_support() {
        let mut caps = DeviceCaps::default();
        let tiled = SamplerState::new(WrapMode::Repeat, WrapMode::Repeat, Filter::Bilinear);
        assert_eq!(KeyCriteria::for_sampler(&caps, Some(&tiled), 100, 100), KeyCriteria::NONE);
        caps.npot_texture_tile_support = false;
        let c = KeyCriteria::for_sampler(&caps, Some(&tiled), 100, 100);
        assert!(c.needs_stretch() && c.needs_filter());
        assert_eq!(KeyCriteria::for_sampler(&caps, Some(&tiled), 128, 64), KeyCriteria::NONE);
        assert_eq!(KeyCriteria::for_sampler(&caps, None, 100, 100), KeyCriteria::NONE);
    }
}
