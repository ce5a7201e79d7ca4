//! Glyph batching for text draws.
//!
//! Glyph rasterization and atlas management live outside the crate; the
//! context receives positioned quads referencing an atlas texture.

mod glyph_batch;

pub use glyph_batch::{GlyphBatch, GlyphQuad};
