use crate::coords::IRect;
use crate::device::{Device, DeviceDraw, RenderTarget};
use crate::paint::Color;

use super::{DrawState, PrimitiveType, Vertex, QUAD_INDICES};

/// A recorded buffer command.
#[derive(Debug, Clone, PartialEq)]
pub enum BufferCmd {
    /// Switch to `states[index]`.
    SetState(usize),
    Draw {
        primitive: PrimitiveType,
        first_vertex: usize,
        vertex_count: usize,
        first_index: usize,
        /// Zero for non-indexed draws.
        index_count: usize,
    },
    Clear {
        target: RenderTarget,
        rect: Option<IRect>,
        color: Color,
    },
}

/// Deferred command stream replayed against a device in issue order.
///
/// Performance characteristics:
/// - state snapshots are recorded only when the state changes
/// - consecutive quads with the same state extend one indexed draw
/// - `reset()` keeps allocated capacity for reuse
#[derive(Debug)]
pub struct InOrderDrawBuffer {
    vertices: Vec<Vertex>,
    indices: Vec<u16>,
    states: Vec<DrawState>,
    cmds: Vec<BufferCmd>,

    max_vertices: usize,
    max_indices: usize,

    /// Index in `cmds` of a quad draw that the next quad may extend.
    open_quads: Option<usize>,
    overflow_flushes: u64,
}

impl InOrderDrawBuffer {
    pub fn new(max_vertices: usize, max_indices: usize) -> Self {
        Self {
            vertices: Vec::new(),
            indices: Vec::new(),
            states: Vec::new(),
            cmds: Vec::new(),
            max_vertices: max_vertices.min(u16::MAX as usize + 1),
            max_indices,
            open_quads: None,
            overflow_flushes: 0,
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cmds.is_empty()
    }

    #[inline]
    pub fn commands(&self) -> &[BufferCmd] {
        &self.cmds
    }

    /// Recorded draw commands.
    pub fn draw_count(&self) -> usize {
        self.cmds.iter().filter(|c| matches!(c, BufferCmd::Draw { .. })).count()
    }

    /// Flushes forced by pool exhaustion.
    #[inline]
    pub fn overflow_flushes(&self) -> u64 {
        self.overflow_flushes
    }

    pub(crate) fn note_overflow(&mut self) {
        self.overflow_flushes += 1;
    }

    pub(crate) fn clear_overflow_flushes(&mut self) {
        self.overflow_flushes = 0;
    }

    #[inline]
    pub fn fits(&self, vertices: usize, indices: usize) -> bool {
        self.vertices.len() + vertices <= self.max_vertices && self.indices.len() + indices <= self.max_indices
    }

    #[inline]
    pub fn can_ever_fit(&self, vertices: usize, indices: usize) -> bool {
        vertices <= self.max_vertices && indices <= self.max_indices
    }

    fn record_state(&mut self, state: &DrawState) {
        if self.states.last() == Some(state) {
            return;
        }
        self.states.push(*state);
        self.cmds.push(BufferCmd::SetState(self.states.len() - 1));
        self.open_quads = None;
    }

    /// Appends a draw; indices are relative to `vertices`.
    pub fn push_draw(&mut self, state: &DrawState, primitive: PrimitiveType, vertices: &[Vertex], indices: Option<&[u16]>) {
        self.record_state(state);
        let first_vertex = self.vertices.len();
        let first_index = self.indices.len();
        self.vertices.extend_from_slice(vertices);
        if let Some(indices) = indices {
            self.indices.extend_from_slice(indices);
        }
        self.cmds.push(BufferCmd::Draw {
            primitive,
            first_vertex,
            vertex_count: vertices.len(),
            first_index,
            index_count: indices.map_or(0, <[u16]>::len),
        });
        self.open_quads = None;
    }

    /// Appends a quad, extending the previous quad draw when the state is
    /// unchanged.
    pub fn push_quad(&mut self, state: &DrawState, corners: [Vertex; 4]) {
        self.record_state(state);
        if let Some(at) = self.open_quads
            && let Some(BufferCmd::Draw { vertex_count, index_count, .. }) = self.cmds.get_mut(at)
            && *vertex_count + 4 <= u16::MAX as usize
        {
            let base = *vertex_count as u16;
            self.indices.extend(QUAD_INDICES.iter().map(|i| base + i));
            self.vertices.extend_from_slice(&corners);
            *vertex_count += 4;
            *index_count += QUAD_INDICES.len();
            return;
        }
        self.push_draw(state, PrimitiveType::Triangles, &corners, Some(&QUAD_INDICES));
        self.open_quads = Some(self.cmds.len() - 1);
    }

    pub fn push_clear(&mut self, target: RenderTarget, rect: Option<IRect>, color: Color) {
        self.cmds.push(BufferCmd::Clear { target, rect, color });
        self.open_quads = None;
    }

    /// Replays every command against `device`, then resets. Returns the number
    /// of draws issued.
    pub fn flush_to(&mut self, device: &mut dyn Device) -> usize {
        let mut issued = 0;
        let mut current: Option<usize> = None;
        for cmd in &self.cmds {
            match cmd {
                BufferCmd::SetState(i) => current = Some(*i),
                BufferCmd::Clear { target, rect, color } => device.clear(target, *rect, *color),
                BufferCmd::Draw { primitive, first_vertex, vertex_count, first_index, index_count } => {
                    let Some(state) = current.and_then(|i| self.states.get(i)) else {
                        continue;
                    };
                    let vertices = &self.vertices[*first_vertex..*first_vertex + *vertex_count];
                    let indices = (*index_count > 0).then(|| &self.indices[*first_index..*first_index + *index_count]);
                    device.draw(&DeviceDraw { state, primitive: *primitive, vertices, indices });
                    issued += 1;
                }
            }
        }
        if issued > 0 {
            log::debug!("draw buffer flushed {issued} draws");
        }
        self.reset();
        issued
    }

    /// Drops every recorded command without submitting.
    pub fn reset(&mut self) {
        self.vertices.clear();
        self.indices.clear();
        self.states.clear();
        self.cmds.clear();
        self.open_quads = None;
    }
}
