use crate::device::{Device, TextureId};
use crate::draw::{Buffered, DrawTarget, Immediate, StencilSettings};
use crate::paint::Paint;

use super::{Context, DrawCategory, FlushFlags};

impl<D: Device> Context<D> {
    /// Switches to `category` and loads `paint` plus the context state into
    /// the draw state.
    ///
    /// Leaving a category flushes what it buffered first, so draws reach the
    /// device in issue order.
    pub(crate) fn prepare_to_draw(&mut self, paint: &Paint, category: DrawCategory) {
        let last = self.state.last_category;
        if last != category {
            if last == DrawCategory::Text {
                self.emit_glyphs();
            }
            self.flush_draw_buffer();
            self.state.last_category = category;
        }

        let target = self.state.render_target;
        let st = &mut self.draw_state;
        st.render_target = target;
        st.view_matrix = self.state.matrix;
        st.clip = self.state.clip.scissor();
        st.set_paint(paint);
        st.hw_antialias = paint.anti_alias && target.is_multisampled();
        st.stencil = StencilSettings::DISABLED;
        st.color_writes = true;
    }

    /// Runs `f` against the target `category` draws into.
    pub(crate) fn with_target<R>(&mut self, category: DrawCategory, f: impl FnOnce(&mut dyn DrawTarget) -> R) -> R {
        match category {
            DrawCategory::Unbuffered => {
                self.stats.immediate_draws += 1;
                f(&mut Immediate::new(&mut self.device, &mut self.draw_state))
            }
            DrawCategory::Buffered | DrawCategory::Text => {
                self.stats.buffered_draws += 1;
                self.pin_stage_textures();
                f(&mut Buffered::new(&mut self.draw_buffer, &mut self.device, &mut self.draw_state))
            }
        }
    }

    /// Locks the cached textures the current draw state samples until the
    /// buffered work is flushed or dropped.
    pub(crate) fn pin_stage_textures(&mut self) {
        for id in self.draw_state.stage_textures().into_iter().flatten() {
            self.pin_texture(id);
        }
    }

    pub(crate) fn pin_texture(&mut self, id: TextureId) {
        if self.pinned.contains_key(&id) {
            return;
        }
        if let Some(key) = self.cache.lock_texture(id) {
            self.pinned.insert(id, key);
        }
    }

    /// Drops the pins once nothing buffered refers to them.
    pub(crate) fn unpin_textures(&mut self) {
        if !self.draw_buffer.is_empty() || !self.glyphs.is_empty() {
            return;
        }
        for (_, key) in std::mem::take(&mut self.pinned) {
            self.cache.unlock(&mut self.device, key);
        }
    }

    /// Moves pending glyphs into the draw buffer.
    pub(crate) fn emit_glyphs(&mut self) {
        if self.glyphs.is_empty() {
            return;
        }
        let mut target = Buffered::new(&mut self.draw_buffer, &mut self.device, &mut self.draw_state);
        let n = self.glyphs.emit(&mut target);
        log::debug!("emitted {n} glyphs");
    }

    /// Replays the draw buffer on the device.
    pub(crate) fn flush_draw_buffer(&mut self) {
        if !self.draw_buffer.is_empty() {
            self.stats.draw_buffer_flushes += 1;
        }
        self.draw_buffer.flush_to(&mut self.device);
        self.unpin_textures();
    }

    /// Sends (or with [`FlushFlags::DISCARD`] drops) everything buffered.
    pub fn flush(&mut self, flags: FlushFlags) {
        if flags.contains(FlushFlags::DISCARD) {
            self.draw_buffer.reset();
            self.glyphs.reset();
            self.unpin_textures();
            return;
        }
        self.emit_glyphs();
        self.flush_draw_buffer();
        if flags.contains(FlushFlags::FORCE_CURRENT_RENDER_TARGET) {
            let target = self.state.render_target;
            self.device.bind_render_target(&target);
        }
        self.device.submit();
    }

    /// Flushes only when text was the last thing drawn.
    pub fn flush_text(&mut self) {
        if self.state.last_category == DrawCategory::Text {
            self.emit_glyphs();
            self.flush_draw_buffer();
        }
    }
}
