//! Kiln engine crate.
//!
//! A 2D GPU rendering context: resource caching, batched draw submission,
//! path and text rendering, offscreen antialiasing and pixel transfer on top
//! of a narrow [`device::Device`] interface.

pub mod cache;
pub mod context;
pub mod coords;
pub mod device;
pub mod draw;
pub mod logging;
pub mod paint;
pub mod path;
pub mod text;

pub use context::{Context, ContextConfig};
