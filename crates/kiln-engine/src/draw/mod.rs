//! Draw plumbing between the context and the device.
//!
//! - `state`: the full per-draw state ([`DrawState`])
//! - `geometry`: vertex layout and primitive types
//! - `buffer`: the deferred in-order command stream
//! - `target`: the [`DrawTarget`] seam (buffered or immediate)

mod buffer;
mod geometry;
mod state;
mod target;

pub use buffer::{BufferCmd, InOrderDrawBuffer};
pub use geometry::{fan_to_list_indices, rect_vertices, textured_rect_vertices, PrimitiveType, Vertex, QUAD_INDICES};
pub use state::{
    CoordSource, DrawState, StageState, StencilFace, StencilFunc, StencilOp, StencilSettings, COVERAGE_STAGE,
    MAX_STAGES,
};
pub use target::{Buffered, DrawTarget, Immediate};
