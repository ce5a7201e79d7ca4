//! Path geometry and path rendering strategies.

mod path;
mod renderer;

pub use path::{Contour, Path, PathFill, PathVerb};
pub use renderer::{PathRenderer, StencilAndCoverRenderer};
