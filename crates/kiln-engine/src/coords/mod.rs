//! Coordinate and geometry types shared by the context, the draw buffer and
//! the devices.
//!
//! Canonical space:
//! - Pixels, origin top-left
//! - +X right, +Y down
//!
//! Float geometry (`Vec2`, `Rect`) is mapped to device space by a `Matrix`.
//! Device-space integer bounds (`IRect`) are used for clips, tiles and pixel
//! transfers.

mod irect;
mod matrix;
mod rect;
mod vec2;

pub use irect::IRect;
pub use matrix::Matrix;
pub use rect::Rect;
pub use vec2::Vec2;
