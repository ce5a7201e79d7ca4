//! GPU resource cache.
//!
//! Textures and stencil buffers are stored under a [`ResourceKey`] with a
//! lock count. Clients hold [`TextureCacheEntry`] handles; a handle never
//! owns the resource and resolves to nothing once its entry is gone.

mod entry;
mod key;
mod resource_cache;

pub use entry::{Resource, ResourceEntry};
pub use key::{scratch_bin, KeyCriteria, ResourceKey, ScratchTexMatch};
pub use resource_cache::{CacheStats, EntryKey, ResourceCache};

/// Client handle to a cached texture (possibly empty).
///
/// Copying or resetting a handle does not touch the lock count; every
/// locking call is paired with exactly one unlock.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct TextureCacheEntry(Option<EntryKey>);

impl TextureCacheEntry {
    pub const EMPTY: TextureCacheEntry = TextureCacheEntry(None);

    #[inline]
    pub(crate) fn new(key: EntryKey) -> Self {
        Self(Some(key))
    }

    #[inline]
    pub fn key(&self) -> Option<EntryKey> {
        self.0
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }

    /// Forgets the entry; the lock is not released.
    #[inline]
    pub fn reset(&mut self) {
        self.0 = None;
    }
}

/// Client handle to a cached stencil buffer.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct StencilCacheEntry(Option<EntryKey>);

impl StencilCacheEntry {
    #[inline]
    pub(crate) fn new(key: EntryKey) -> Self {
        Self(Some(key))
    }

    #[inline]
    pub fn key(&self) -> Option<EntryKey> {
        self.0
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }
}
