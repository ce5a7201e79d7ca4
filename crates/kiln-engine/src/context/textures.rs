//! Texture and stencil buffer management on top of the resource cache.

use crate::cache::{
    scratch_bin, KeyCriteria, Resource, ResourceKey, ScratchTexMatch, StencilCacheEntry, TextureCacheEntry,
};
use crate::coords::{Matrix, Rect};
use crate::device::{
    row_stride, Device, RenderTarget, StencilBuffer, Texture, TextureDesc, TextureFlags,
};
use crate::paint::{BlendFunc, Filter, Paint, SamplerState, WrapMode};

use super::{AutoMatrix, AutoRenderTarget, Context, FlushFlags};

impl<D: Device> Context<D> {
    // ---- client textures ----

    /// Locks the texture cached under `key` at `width` x `height` for
    /// `sampler`. Misses return an empty handle and change nothing.
    pub fn find_and_lock_texture(
        &mut self,
        key: u64,
        width: u32,
        height: u32,
        sampler: Option<&SamplerState>,
    ) -> TextureCacheEntry {
        let criteria = KeyCriteria::for_sampler(self.device.caps(), sampler, width, height);
        let key = ResourceKey::texture(key, width, height, criteria);
        match self.cache.find_and_lock(&key) {
            Some(found) => TextureCacheEntry::new(found),
            None => {
                log::debug!("cache miss {key:?}");
                TextureCacheEntry::EMPTY
            }
        }
    }

    /// Creates a texture from `desc` and `data`, caches it under `key` and
    /// locks it once.
    ///
    /// When `sampler` tiles an NPOT image on a device that cannot, the
    /// cached texture is a power-of-two stretch of the image and the
    /// unstretched version is cached alongside it.
    pub fn create_and_lock_texture(
        &mut self,
        key: u64,
        sampler: Option<&SamplerState>,
        desc: &TextureDesc,
        data: Option<&[u8]>,
        row_bytes: usize,
    ) -> TextureCacheEntry {
        let criteria = KeyCriteria::for_sampler(self.device.caps(), sampler, desc.width, desc.height);
        let resource_key = ResourceKey::texture(key, desc.width, desc.height, criteria);
        if criteria.needs_stretch() {
            return self.create_stretched_texture(key, resource_key, criteria, desc, data, row_bytes);
        }
        self.create_cached_texture(resource_key, desc, data, row_bytes)
    }

    fn create_cached_texture(
        &mut self,
        key: ResourceKey,
        desc: &TextureDesc,
        data: Option<&[u8]>,
        row_bytes: usize,
    ) -> TextureCacheEntry {
        let Some(texture) = self.device.create_texture(desc, data, row_bytes) else {
            log::warn!("texture allocation failed: {}x{} {:?}", desc.width, desc.height, desc.config);
            return TextureCacheEntry::EMPTY;
        };
        self.stats.texture_creates += 1;
        TextureCacheEntry::new(self.cache.insert_and_lock(&mut self.device, key, Resource::Texture(texture)))
    }

    fn create_stretched_texture(
        &mut self,
        client: u64,
        key: ResourceKey,
        criteria: KeyCriteria,
        desc: &TextureDesc,
        data: Option<&[u8]>,
        row_bytes: usize,
    ) -> TextureCacheEntry {
        let clamp_key = ResourceKey::texture(client, desc.width, desc.height, KeyCriteria::NONE);
        let clamp = match self.cache.find_and_lock(&clamp_key) {
            Some(found) => TextureCacheEntry::new(found),
            None => self.create_cached_texture(clamp_key, desc, data, row_bytes),
        };
        let Some(source) = self.texture(&clamp) else {
            return TextureCacheEntry::EMPTY;
        };

        let stretched = TextureDesc::new(desc.width.next_power_of_two(), desc.height.next_power_of_two(), desc.config);
        let target_desc = stretched.with_flags(TextureFlags::RENDER_TARGET | TextureFlags::NO_STENCIL);
        let texture = match self.device.create_texture(&target_desc, None, 0) {
            Some(texture) => {
                self.stretch_on_gpu(&source, &texture, criteria.needs_filter());
                Some(texture)
            }
            None => {
                log::warn!(
                    "no render target for a {}x{} stretch; stretching on the CPU",
                    stretched.width,
                    stretched.height
                );
                let pixels = data.and_then(|src| {
                    stretch_nearest(src, desc, row_stride(row_bytes, desc.width, desc.config), &stretched)
                });
                self.device.create_texture(&stretched, pixels.as_deref(), 0)
            }
        };
        self.unlock_texture(clamp);

        let Some(texture) = texture else {
            log::warn!("stretched texture allocation failed: {}x{}", stretched.width, stretched.height);
            return TextureCacheEntry::EMPTY;
        };
        self.stats.texture_creates += 1;
        TextureCacheEntry::new(self.cache.insert_and_lock(&mut self.device, key, Resource::Texture(texture)))
    }

    /// Draws all of `source` over all of `target`.
    fn stretch_on_gpu(&mut self, source: &Texture, target: &Texture, filter: bool) {
        let Some(render_target) = target.as_render_target() else {
            return;
        };
        let filter = if filter { Filter::Bilinear } else { Filter::Nearest };
        let sampler = SamplerState::new(WrapMode::Clamp, WrapMode::Clamp, filter)
            .with_matrix(Matrix::idiv(source.width(), source.height()));
        let paint = Paint::default().with_blend(BlendFunc::SRC).with_texture(0, *source, sampler);
        let dst = Rect::new(0.0, 0.0, target.width() as f32, target.height() as f32);
        let src = Rect::new(0.0, 0.0, source.width() as f32, source.height() as f32);

        let mut on_target = AutoRenderTarget::new(self, Some(render_target));
        let mut identity = AutoMatrix::new(&mut *on_target, Matrix::IDENTITY);
        identity.draw_rect_to_rect(&paint, dst, src, None, None);
        identity.flush(FlushFlags::NONE);
    }

    // ---- scratch textures ----

    /// Locks an unlocked scratch texture matching `desc`, allocating one on
    /// a miss. Approximate requests allocate power-of-two bins of at least
    /// `min_scratch_size`.
    pub fn lock_scratch_texture(&mut self, desc: &TextureDesc, mode: ScratchTexMatch) -> TextureCacheEntry {
        if desc.is_empty() {
            return TextureCacheEntry::EMPTY;
        }
        if let Some(found) = self.cache.find_scratch(desc, mode) {
            return TextureCacheEntry::new(found);
        }

        let alloc = match mode {
            ScratchTexMatch::Exact => *desc,
            ScratchTexMatch::Approx => {
                let caps = self.device.caps();
                let max = if desc.is_render_target() { caps.max_render_target_size } else { caps.max_texture_size };
                let min = self.config.min_scratch_size;
                let mut binned = *desc;
                binned.width = scratch_bin(desc.width, min, max);
                binned.height = scratch_bin(desc.height, min, max);
                binned
            }
        };
        let Some(texture) = self.device.create_texture(&alloc, None, 0) else {
            log::warn!("scratch allocation failed: {}x{} ({mode:?})", alloc.width, alloc.height);
            return TextureCacheEntry::EMPTY;
        };
        self.stats.texture_creates += 1;
        log::debug!("scratch miss: allocated {}x{}", texture.width(), texture.height());
        let key = ResourceKey::Scratch(texture.desc);
        TextureCacheEntry::new(self.cache.insert_and_lock(&mut self.device, key, Resource::Texture(texture)))
    }

    /// Drops one lock taken through this context. Empty or stale handles
    /// are ignored.
    pub fn unlock_texture(&mut self, entry: TextureCacheEntry) {
        if let Some(key) = entry.key() {
            self.cache.unlock(&mut self.device, key);
        }
    }

    /// The texture behind `entry`; `None` for empty or stale handles.
    #[inline]
    pub fn texture(&self, entry: &TextureCacheEntry) -> Option<Texture> {
        entry.key().and_then(|k| self.cache.texture(k))
    }

    pub fn set_texture_cache_limits(&mut self, max_count: usize, max_bytes: usize) {
        log::debug!("cache limits set to {max_count} resources / {max_bytes} bytes");
        self.cache.set_limits(&mut self.device, max_count, max_bytes);
    }

    #[inline]
    pub fn texture_cache_limits(&self) -> (usize, usize) {
        self.cache.limits()
    }

    // ---- uncached textures ----

    /// Creates a texture the cache never sees. The caller destroys it with
    /// [`destroy_uncached_texture`](Self::destroy_uncached_texture).
    pub fn create_uncached_texture(&mut self, desc: &TextureDesc, data: Option<&[u8]>, row_bytes: usize) -> Option<Texture> {
        let texture = self.device.create_texture(desc, data, row_bytes)?;
        self.stats.texture_creates += 1;
        self.uncached.insert(texture.id);
        Some(texture)
    }

    /// Destroys a texture from [`create_uncached_texture`](Self::create_uncached_texture).
    /// Textures abandoned by a lost device are only forgotten.
    pub fn destroy_uncached_texture(&mut self, texture: &Texture) {
        if !self.uncached.remove(&texture.id) {
            return;
        }
        self.cache.release_attachment(&mut self.device, texture.id);
        self.device.destroy_texture(texture.id);
    }

    // ---- capabilities ----

    /// True when an 8-bit palette texture of `width` x `height` can be
    /// created and sampled with `sampler`.
    pub fn supports_index8_pixel_config(&self, sampler: Option<&SamplerState>, width: u32, height: u32) -> bool {
        let caps = self.device.caps();
        if !caps.index8_support {
            return false;
        }
        let npot = !width.is_power_of_two() || !height.is_power_of_two();
        if !npot {
            return true;
        }
        caps.npot_texture_support && (caps.npot_texture_tile_support || !sampler.is_some_and(SamplerState::is_tiled))
    }

    #[inline]
    pub fn max_texture_size(&self) -> u32 {
        self.device.caps().max_texture_size
    }

    #[inline]
    pub fn max_render_target_size(&self) -> u32 {
        self.device.caps().max_render_target_size
    }

    // ---- stencil buffers ----

    pub fn find_stencil_buffer(&mut self, width: u32, height: u32, samples: u32) -> StencilCacheEntry {
        let key = ResourceKey::Stencil { width, height, samples };
        self.cache.find_and_lock(&key).map(StencilCacheEntry::new).unwrap_or_default()
    }

    /// Caches `stencil` locked once.
    pub fn add_and_lock_stencil_buffer(&mut self, stencil: StencilBuffer) -> StencilCacheEntry {
        let key = ResourceKey::Stencil { width: stencil.width, height: stencil.height, samples: stencil.sample_count };
        StencilCacheEntry::new(self.cache.insert_and_lock(&mut self.device, key, Resource::Stencil(stencil)))
    }

    pub fn unlock_stencil_buffer(&mut self, entry: StencilCacheEntry) {
        if let Some(key) = entry.key() {
            self.cache.unlock(&mut self.device, key);
        }
    }

    #[inline]
    pub fn stencil_buffer(&self, entry: &StencilCacheEntry) -> Option<StencilBuffer> {
        entry.key().and_then(|k| self.cache.stencil(k))
    }

    /// Makes sure `target` has a stencil buffer attached.
    ///
    /// The default target owns its stencil. Other targets get a cached
    /// buffer of their size, which stays locked while attached.
    pub(crate) fn ensure_stencil(&mut self, target: &RenderTarget) -> bool {
        if !target.needs_stencil {
            return false;
        }
        if target.texture == self.device.default_render_target().texture
            || self.cache.attached_stencil(target.texture).is_some()
        {
            return true;
        }

        let mut entry = self.find_stencil_buffer(target.width, target.height, target.sample_count);
        if entry.is_empty() {
            let Some(stencil) = self.device.create_stencil_buffer(target.width, target.height, target.sample_count)
            else {
                log::warn!("stencil allocation failed: {}x{}", target.width, target.height);
                return false;
            };
            self.stats.stencil_creates += 1;
            entry = self.add_and_lock_stencil_buffer(stencil);
        }
        let (Some(key), Some(stencil)) = (entry.key(), self.stencil_buffer(&entry)) else {
            return false;
        };
        if !self.device.attach_stencil_buffer(target.texture, Some(stencil.id)) {
            log::warn!("stencil attach failed for {}x{} target", target.width, target.height);
            self.unlock_stencil_buffer(entry);
            return false;
        }
        self.cache.record_attachment(target.texture, key);
        true
    }
}

/// Nearest-neighbour resample of a `src_desc` image into `dst_desc`'s size.
/// Returns `None` when `src` is too short for its descriptor.
fn stretch_nearest(src: &[u8], src_desc: &TextureDesc, src_stride: usize, dst_desc: &TextureDesc) -> Option<Vec<u8>> {
    let bpp = src_desc.config.bytes_per_pixel();
    let (sw, sh) = (src_desc.width as usize, src_desc.height as usize);
    let (dw, dh) = (dst_desc.width as usize, dst_desc.height as usize);
    if sh == 0 || src.len() < (sh - 1) * src_stride + sw * bpp {
        return None;
    }
    let mut out = vec![0u8; dw * dh * bpp];
    for y in 0..dh {
        let sy = y * sh / dh;
        for x in 0..dw {
            let sx = x * sw / dw;
            let from = sy * src_stride + sx * bpp;
            let to = (y * dw + x) * bpp;
            out[to..to + bpp].copy_from_slice(&src[from..from + bpp]);
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::PixelConfig;

    #[test]
    fn nearest_stretch_repeats_source_pixels() {
        let src_desc = TextureDesc::new(3, 1, PixelConfig::Alpha8);
        let dst_desc = TextureDesc::new(4, 2, PixelConfig::Alpha8);
        let out = stretch_nearest(&[10, 20, 30], &src_desc, 3, &dst_desc).unwrap();
        assert_eq!(out, vec![10, 10, 20, 30, 10, 10, 20, 30]);
    }

    #[test]
    fn nearest_stretch_rejects_short_input() {
        let src_desc = TextureDesc::new(2, 2, PixelConfig::Rgba8888);
        let dst_desc = TextureDesc::new(4, 4, PixelConfig::Rgba8888);
        assert!(stretch_nearest(&[0; 12], &src_desc, 8, &dst_desc).is_none());
    }
}
