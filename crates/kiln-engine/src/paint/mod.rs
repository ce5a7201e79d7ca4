//! Paint model: how pixels covered by a draw are colored.
//!
//! Scope:
//! - color representation (linear premultiplied alpha)
//! - blend coefficients
//! - texture stages and their sampler state
//!
//! Geometry types remain in `coords`.

pub mod blend;
pub mod color;
mod paint;
pub mod sampler;

pub use blend::{BlendCoeff, BlendFunc};
pub use color::Color;
pub use paint::{Paint, PaintStage, PAINT_STAGES};
pub use sampler::{ConvolutionKernel, Filter, SamplerState, WrapMode, MAX_KERNEL_WIDTH};
