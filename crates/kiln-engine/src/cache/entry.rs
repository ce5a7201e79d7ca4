use crate::device::{Device, StencilBuffer, Texture};

use super::ResourceKey;

/// A GPU resource owned by the cache.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Resource {
    Texture(Texture),
    Stencil(StencilBuffer),
}

impl Resource {
    pub fn byte_size(&self) -> usize {
        match self {
            Resource::Texture(t) => t.desc.byte_size(),
            Resource::Stencil(s) => s.byte_size(),
        }
    }

    pub(crate) fn free(&self, device: &mut dyn Device) {
        match self {
            Resource::Texture(t) => device.destroy_texture(t.id),
            Resource::Stencil(s) => device.destroy_stencil_buffer(s.id),
        }
    }
}

/// Bookkeeping for one cached resource.
#[derive(Debug, Clone)]
pub struct ResourceEntry {
    pub key: ResourceKey,
    pub resource: Resource,
    pub lock_count: u32,
    /// Cleared when the device is lost; invalid entries are never freed.
    pub valid: bool,
}

impl ResourceEntry {
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.lock_count > 0
    }
}
