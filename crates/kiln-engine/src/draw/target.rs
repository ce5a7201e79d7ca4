use crate::coords::IRect;
use crate::device::{Device, DeviceDraw};
use crate::paint::Color;

use super::{DrawState, InOrderDrawBuffer, PrimitiveType, Vertex, QUAD_INDICES};

/// Where geometry goes.
///
/// Draws use the target's current [`DrawState`]; callers adjust it through
/// [`DrawTarget::state_mut`] between draws.
pub trait DrawTarget {
    fn state(&self) -> &DrawState;

    fn state_mut(&mut self) -> &mut DrawState;

    fn draw(&mut self, primitive: PrimitiveType, vertices: &[Vertex], indices: Option<&[u16]>);

    /// Clears `rect` (or the whole render target) of the current target.
    fn clear(&mut self, rect: Option<IRect>, color: Color);

    /// Draws an indexed quad in fan corner order.
    fn draw_quad(&mut self, corners: [Vertex; 4]) {
        self.draw(PrimitiveType::Triangles, &corners, Some(&QUAD_INDICES));
    }

    fn device_caps(&self) -> &crate::device::DeviceCaps;
}

/// Submits every draw straight to the device.
pub struct Immediate<'a> {
    pub device: &'a mut dyn Device,
    pub state: &'a mut DrawState,
}

impl<'a> Immediate<'a> {
    #[inline]
    pub fn new(device: &'a mut dyn Device, state: &'a mut DrawState) -> Self {
        Self { device, state }
    }
}

impl DrawTarget for Immediate<'_> {
    fn state(&self) -> &DrawState {
        self.state
    }

    fn state_mut(&mut self) -> &mut DrawState {
        self.state
    }

    fn draw(&mut self, primitive: PrimitiveType, vertices: &[Vertex], indices: Option<&[u16]>) {
        if vertices.is_empty() {
            return;
        }
        self.device.draw(&DeviceDraw { state: self.state, primitive, vertices, indices });
    }

    fn clear(&mut self, rect: Option<IRect>, color: Color) {
        let target = self.state.render_target;
        self.device.clear(&target, rect, color);
    }

    fn device_caps(&self) -> &crate::device::DeviceCaps {
        self.device.caps()
    }
}

/// Records draws into an [`InOrderDrawBuffer`].
///
/// The buffer is flushed when a draw would overflow it; geometry larger than
/// the whole buffer goes straight to the device after that flush.
pub struct Buffered<'a> {
    pub buffer: &'a mut InOrderDrawBuffer,
    pub device: &'a mut dyn Device,
    pub state: &'a mut DrawState,
}

impl<'a> Buffered<'a> {
    #[inline]
    pub fn new(buffer: &'a mut InOrderDrawBuffer, device: &'a mut dyn Device, state: &'a mut DrawState) -> Self {
        Self { buffer, device, state }
    }

    /// Flushes when `vertices`/`indices` do not fit; returns false when they
    /// never will.
    fn make_room(&mut self, vertices: usize, indices: usize) -> bool {
        if self.buffer.fits(vertices, indices) {
            return true;
        }
        if !self.buffer.is_empty() {
            log::debug!("draw buffer full ({vertices} vertices, {indices} indices); flushing");
            self.buffer.flush_to(self.device);
            self.buffer.note_overflow();
        }
        self.buffer.can_ever_fit(vertices, indices)
    }
}

impl DrawTarget for Buffered<'_> {
    fn state(&self) -> &DrawState {
        self.state
    }

    fn state_mut(&mut self) -> &mut DrawState {
        self.state
    }

    fn draw(&mut self, primitive: PrimitiveType, vertices: &[Vertex], indices: Option<&[u16]>) {
        if vertices.is_empty() {
            return;
        }
        if self.make_room(vertices.len(), indices.map_or(0, <[u16]>::len)) {
            self.buffer.push_draw(self.state, primitive, vertices, indices);
        } else {
            self.device.draw(&DeviceDraw { state: self.state, primitive, vertices, indices });
        }
    }

    fn clear(&mut self, rect: Option<IRect>, color: Color) {
        self.buffer.push_clear(self.state.render_target, rect, color);
    }

    fn draw_quad(&mut self, corners: [Vertex; 4]) {
        if self.make_room(4, QUAD_INDICES.len()) {
            self.buffer.push_quad(self.state, corners);
        } else {
            self.device.draw(&DeviceDraw {
                state: self.state,
                primitive: PrimitiveType::Triangles,
                vertices: &corners,
                indices: Some(&QUAD_INDICES),
            });
        }
    }

    fn device_caps(&self) -> &crate::device::DeviceCaps {
        self.device.caps()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::{Rect, Vec2};
    use crate::device::recording::RecordingDevice;
    use crate::draw::rect_vertices;

    fn quad(x: f32) -> [Vertex; 4] {
        rect_vertices(Rect::new(x, 0.0, 1.0, 1.0), Color::WHITE)
    }

    fn vertex_counts(dev: &RecordingDevice) -> Vec<usize> {
        dev.draws().map(|d| d.vertex_count).collect()
    }

    #[test]
    fn overflow_flushes_then_buffers_the_next_draw() {
        let mut dev = RecordingDevice::new(16, 16);
        let mut state = DrawState::new(dev.default_render_target());
        let mut buf = InOrderDrawBuffer::new(8, 12);
        {
            let mut target = Buffered::new(&mut buf, &mut dev, &mut state);
            target.draw_quad(quad(0.0));
            target.draw_quad(quad(2.0));
            target.draw_quad(quad(4.0));
        }
        assert_eq!(vertex_counts(&dev), [8]);
        assert_eq!(buf.overflow_flushes(), 1);
        buf.flush_to(&mut dev);
        assert_eq!(vertex_counts(&dev), [8, 4]);
    }

    #[test]
    fn oversized_geometry_goes_direct_after_pending_work() {
        let mut dev = RecordingDevice::new(16, 16);
        let mut state = DrawState::new(dev.default_render_target());
        let mut buf = InOrderDrawBuffer::new(8, 12);
        let fan: Vec<Vertex> = (0..10).map(|i| Vertex::new(Vec2::new(i as f32, 1.0), Color::WHITE)).collect();
        {
            let mut target = Buffered::new(&mut buf, &mut dev, &mut state);
            target.draw_quad(quad(0.0));
            target.draw(PrimitiveType::TriangleFan, &fan, None);
        }
        assert_eq!(vertex_counts(&dev), [4, 10]);
        assert!(buf.is_empty());
        assert_eq!(buf.overflow_flushes(), 1);
    }

    #[test]
    fn oversized_geometry_on_an_empty_buffer_is_not_an_overflow() {
        let mut dev = RecordingDevice::new(16, 16);
        let mut state = DrawState::new(dev.default_render_target());
        let mut buf = InOrderDrawBuffer::new(2, 12);
        Buffered::new(&mut buf, &mut dev, &mut state).draw_quad(quad(0.0));
        assert_eq!(vertex_counts(&dev), [4]);
        assert_eq!(buf.overflow_flushes(), 0);
    }
}
