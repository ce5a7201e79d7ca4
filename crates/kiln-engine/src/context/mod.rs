//! The rendering context.
//!
//! [`Context`] sits between a 2D drawing API and a [`Device`]. It owns:
//! - the resource cache (textures, scratch surfaces, stencil buffers)
//! - the deferred draw buffer and the glyph batch
//! - the context state (target, matrix, clip, last draw category)
//! - the path renderer and the offscreen antialiasing pipeline
//!
//! Everything is single-threaded and takes `&mut self`.

mod aa_rect;
mod config;
mod convolve;
mod dispatch;
mod draw;
mod guards;
mod offscreen;
mod pixels;
mod state;
mod textures;

#[cfg(test)]
mod tests;

use std::collections::{HashMap, HashSet};

use crate::cache::{CacheStats, EntryKey, ResourceCache};
use crate::coords::Matrix;
use crate::device::{Device, RenderTarget, TextureId};
use crate::draw::{DrawState, InOrderDrawBuffer};
use crate::path::{PathRenderer, StencilAndCoverRenderer};
use crate::text::GlyphBatch;

pub use config::ContextConfig;
pub use guards::{AutoMatrix, AutoRenderTarget, AutoScratchTexture};
pub use offscreen::DownsampleMode;
pub use state::{Clip, ContextState, ContextStats, DrawCategory, FlushFlags};

pub struct Context<D: Device> {
    device: D,
    config: ContextConfig,
    cache: ResourceCache,
    draw_buffer: InOrderDrawBuffer,
    glyphs: GlyphBatch,
    /// State handed to the device for the draw in progress.
    draw_state: DrawState,
    state: ContextState,
    path_renderer: Box<dyn PathRenderer>,
    /// Textures created outside the cache and not yet destroyed.
    uncached: HashSet<TextureId>,
    /// Cache locks held for textures sampled by buffered work.
    pinned: HashMap<TextureId, EntryKey>,
    stats: ContextStats,
}

impl<D: Device> Context<D> {
    pub fn new(device: D, config: ContextConfig) -> Self {
        let target = device.default_render_target();
        log::info!(
            "context created: {}x{} target, cache {} textures / {} bytes",
            target.width,
            target.height,
            config.max_texture_count,
            config.max_texture_bytes
        );
        Self {
            cache: ResourceCache::new(config.max_texture_count, config.max_texture_bytes),
            draw_buffer: InOrderDrawBuffer::new(config.vertex_pool_size, config.index_pool_size),
            glyphs: GlyphBatch::new(),
            draw_state: DrawState::new(target),
            state: ContextState::new(target),
            path_renderer: Box::new(StencilAndCoverRenderer::new()),
            uncached: HashSet::new(),
            pinned: HashMap::new(),
            stats: ContextStats::default(),
            device,
            config,
        }
    }

    /// Replaces the path renderer.
    pub fn with_path_renderer(mut self, renderer: Box<dyn PathRenderer>) -> Self {
        self.path_renderer = renderer;
        self
    }

    #[inline]
    pub fn device(&self) -> &D {
        &self.device
    }

    #[inline]
    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    #[inline]
    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    #[inline]
    pub fn state(&self) -> &ContextState {
        &self.state
    }

    // ---- matrix / clip / target ----

    #[inline]
    pub fn matrix(&self) -> Matrix {
        self.state.matrix
    }

    #[inline]
    pub fn set_matrix(&mut self, matrix: Matrix) {
        self.state.matrix = matrix;
    }

    #[inline]
    pub fn set_identity_matrix(&mut self) {
        self.state.matrix = Matrix::IDENTITY;
    }

    /// `matrix = matrix * m`.
    #[inline]
    pub fn concat_matrix(&mut self, m: &Matrix) {
        self.state.matrix.pre_concat(m);
    }

    #[inline]
    pub fn clip(&self) -> Clip {
        self.state.clip
    }

    #[inline]
    pub fn set_clip(&mut self, clip: Clip) {
        self.state.clip = clip;
    }

    #[inline]
    pub fn render_target(&self) -> RenderTarget {
        self.state.render_target
    }

    /// Directs later draws at `target`, or the device's default target.
    pub fn set_render_target(&mut self, target: Option<RenderTarget>) {
        self.state.render_target = target.unwrap_or_else(|| self.device.default_render_target());
    }

    // ---- stats ----

    pub fn stats(&self) -> ContextStats {
        let mut stats = self.stats;
        stats.draw_buffer_flushes += self.draw_buffer.overflow_flushes();
        stats
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn reset_stats(&mut self) {
        self.stats = ContextStats::default();
        self.draw_buffer.clear_overflow_flushes();
    }

    /// Logs counters and cache residency.
    pub fn print_stats(&self) {
        let s = self.stats();
        let c = self.cache.stats();
        log::info!(
            "flushes={} buffered={} immediate={} aa_tiles={} aa_fallbacks={} textures={} stencils={}",
            s.draw_buffer_flushes,
            s.buffered_draws,
            s.immediate_draws,
            s.offscreen_aa_tiles,
            s.offscreen_fallback_tiles,
            s.texture_creates,
            s.stencil_creates
        );
        log::info!(
            "cache: {} entries ({} locked), {}/{} resident, {}/{} bytes",
            c.entries,
            c.locked,
            c.resident_count,
            c.max_count,
            c.resident_bytes,
            c.max_bytes
        );
    }

    // ---- lifecycle ----

    /// Tells the device that something else changed its native state.
    pub fn reset_context(&mut self) {
        self.device.reset_state();
    }

    /// The device was lost: forget every native handle without freeing.
    ///
    /// Handles taken before the loss resolve to no texture afterwards.
    pub fn context_lost(&mut self) {
        log::warn!("device lost; abandoning every GPU resource");
        self.abandon();
        let target = self.device.default_render_target();
        self.state = ContextState::new(target);
        self.draw_state = DrawState::new(target);
        self.device.reset_state();
    }

    /// The native context was torn down by its owner.
    pub fn context_destroyed(&mut self) {
        log::warn!("device destroyed; abandoning every GPU resource");
        self.abandon();
    }

    fn abandon(&mut self) {
        self.device.abandon_resources();
        self.cache.abandon_all();
        self.uncached.clear();
        self.glyphs.reset();
        self.draw_buffer = InOrderDrawBuffer::new(self.config.vertex_pool_size, self.config.index_pool_size);
        self.unpin_textures();
    }

    /// Drops pending work, evicts every unlocked resource and releases the
    /// device's internal objects.
    pub fn free_gpu_resources(&mut self) {
        self.flush(FlushFlags::DISCARD);
        self.cache.purge_unlocked(&mut self.device);
        self.device.release_resources();
    }
}

impl<D: Device> Drop for Context<D> {
    fn drop(&mut self) {
        self.draw_buffer.reset();
        self.glyphs.reset();
        self.cache.remove_all(&mut self.device);
        for id in self.uncached.drain() {
            self.device.destroy_texture(id);
        }
    }
}
