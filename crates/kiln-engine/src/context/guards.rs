//! Scoped state changes that undo themselves on drop.
//!
//! Each guard borrows the context mutably and derefs to it, so drawing
//! continues through the guard while it is alive.

use core::ops::{Deref, DerefMut};

use crate::cache::{ScratchTexMatch, TextureCacheEntry};
use crate::coords::Matrix;
use crate::device::{Device, RenderTarget, Texture, TextureDesc};

use super::{Clip, Context};

/// Replaces the context matrix until dropped.
pub struct AutoMatrix<'a, D: Device> {
    ctx: &'a mut Context<D>,
    saved: Matrix,
}

impl<'a, D: Device> AutoMatrix<'a, D> {
    pub fn new(ctx: &'a mut Context<D>, matrix: Matrix) -> Self {
        let saved = ctx.matrix();
        ctx.set_matrix(matrix);
        Self { ctx, saved }
    }
}

impl<D: Device> Deref for AutoMatrix<'_, D> {
    type Target = Context<D>;
    fn deref(&self) -> &Context<D> {
        self.ctx
    }
}

impl<D: Device> DerefMut for AutoMatrix<'_, D> {
    fn deref_mut(&mut self) -> &mut Context<D> {
        self.ctx
    }
}

impl<D: Device> Drop for AutoMatrix<'_, D> {
    fn drop(&mut self) {
        self.ctx.set_matrix(self.saved);
    }
}

/// Redirects drawing to another render target, unclipped, until dropped.
/// The previous target and clip come back on drop.
pub struct AutoRenderTarget<'a, D: Device> {
    ctx: &'a mut Context<D>,
    saved_target: RenderTarget,
    saved_clip: Clip,
}

impl<'a, D: Device> AutoRenderTarget<'a, D> {
    pub fn new(ctx: &'a mut Context<D>, target: Option<RenderTarget>) -> Self {
        let saved_target = ctx.render_target();
        let saved_clip = ctx.clip();
        ctx.set_render_target(target);
        ctx.set_clip(Clip::WideOpen);
        Self { ctx, saved_target, saved_clip }
    }
}

impl<D: Device> Deref for AutoRenderTarget<'_, D> {
    type Target = Context<D>;
    fn deref(&self) -> &Context<D> {
        self.ctx
    }
}

impl<D: Device> DerefMut for AutoRenderTarget<'_, D> {
    fn deref_mut(&mut self) -> &mut Context<D> {
        self.ctx
    }
}

impl<D: Device> Drop for AutoRenderTarget<'_, D> {
    fn drop(&mut self) {
        self.ctx.set_render_target(Some(self.saved_target));
        self.ctx.set_clip(self.saved_clip);
    }
}

/// Holds a scratch texture lock until dropped.
pub struct AutoScratchTexture<'a, D: Device> {
    ctx: &'a mut Context<D>,
    entry: TextureCacheEntry,
}

impl<'a, D: Device> AutoScratchTexture<'a, D> {
    pub fn new(ctx: &'a mut Context<D>, desc: &TextureDesc, mode: ScratchTexMatch) -> Self {
        let entry = ctx.lock_scratch_texture(desc, mode);
        Self { ctx, entry }
    }

    /// The locked texture; `None` when the allocation failed.
    pub fn texture(&self) -> Option<Texture> {
        self.ctx.texture(&self.entry)
    }

    /// Hands the lock to the caller, who must unlock it.
    pub fn detach(mut self) -> TextureCacheEntry {
        let entry = self.entry;
        self.entry.reset();
        entry
    }
}

impl<D: Device> Deref for AutoScratchTexture<'_, D> {
    type Target = Context<D>;
    fn deref(&self) -> &Context<D> {
        self.ctx
    }
}

impl<D: Device> DerefMut for AutoScratchTexture<'_, D> {
    fn deref_mut(&mut self) -> &mut Context<D> {
        self.ctx
    }
}

impl<D: Device> Drop for AutoScratchTexture<'_, D> {
    fn drop(&mut self) {
        if !self.entry.is_empty() {
            self.ctx.unlock_texture(self.entry);
        }
    }
}
