use std::collections::HashMap;

use lru::LruCache;
use slotmap::{new_key_type, SlotMap};
use smallvec::SmallVec;

use crate::device::{Device, StencilBuffer, Texture, TextureDesc, TextureId};

use super::{Resource, ResourceEntry, ResourceKey, ScratchTexMatch};

new_key_type! {
    /// Generational handle of a cache entry.
    pub struct EntryKey;
}

/// Residency snapshot.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub locked: usize,
    pub resident_count: usize,
    pub resident_bytes: usize,
    pub max_count: usize,
    pub max_bytes: usize,
}

/// Budgeted store of GPU resources.
///
/// Locked entries are pinned; unlocked entries sit in an LRU list and are
/// evicted least-recently-unlocked first whenever the cache is over budget.
/// Purging runs after every insertion, unlock and limit change.
pub struct ResourceCache {
    entries: SlotMap<EntryKey, ResourceEntry>,
    index: HashMap<ResourceKey, SmallVec<[EntryKey; 4]>>,
    /// Unlocked valid entries, most recently unlocked first.
    lru: LruCache<EntryKey, ()>,
    /// Stencil entry locked on behalf of each render target it is attached to.
    attachments: HashMap<TextureId, EntryKey>,

    max_count: usize,
    max_bytes: usize,
    resident_count: usize,
    resident_bytes: usize,
    purging: bool,
}

impl ResourceCache {
    pub fn new(max_count: usize, max_bytes: usize) -> Self {
        Self {
            entries: SlotMap::with_key(),
            index: HashMap::new(),
            lru: LruCache::unbounded(),
            attachments: HashMap::new(),
            max_count,
            max_bytes,
            resident_count: 0,
            resident_bytes: 0,
            purging: false,
        }
    }

    #[inline]
    pub fn limits(&self) -> (usize, usize) {
        (self.max_count, self.max_bytes)
    }

    pub fn set_limits(&mut self, device: &mut dyn Device, max_count: usize, max_bytes: usize) {
        self.max_count = max_count;
        self.max_bytes = max_bytes;
        self.purge(device);
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            locked: self.entries.values().filter(|e| e.is_locked()).count(),
            resident_count: self.resident_count,
            resident_bytes: self.resident_bytes,
            max_count: self.max_count,
            max_bytes: self.max_bytes,
        }
    }

    #[inline]
    pub fn entry(&self, key: EntryKey) -> Option<&ResourceEntry> {
        self.entries.get(key)
    }

    /// The texture behind `key` while the entry exists and is valid.
    pub fn texture(&self, key: EntryKey) -> Option<Texture> {
        match self.entries.get(key) {
            Some(ResourceEntry { resource: Resource::Texture(t), valid: true, .. }) => Some(*t),
            _ => None,
        }
    }

    pub fn stencil(&self, key: EntryKey) -> Option<StencilBuffer> {
        match self.entries.get(key) {
            Some(ResourceEntry { resource: Resource::Stencil(s), valid: true, .. }) => Some(*s),
            _ => None,
        }
    }

    #[inline]
    pub fn lock_count(&self, key: EntryKey) -> Option<u32> {
        self.entries.get(key).map(|e| e.lock_count)
    }

    /// Locks an entry stored under `key`.
    pub fn find_and_lock(&mut self, key: &ResourceKey) -> Option<EntryKey> {
        let found = self.index.get(key)?.first().copied()?;
        self.lock(found);
        log::debug!("cache hit {key:?}");
        Some(found)
    }

    /// Best unlocked scratch texture for `desc`: smallest area, ties go to
    /// the most recently used.
    pub fn find_scratch(&mut self, desc: &TextureDesc, mode: ScratchTexMatch) -> Option<EntryKey> {
        let mut best: Option<(EntryKey, u64)> = None;
        for (k, _) in self.lru.iter() {
            let Some(ResourceEntry { key: ResourceKey::Scratch(candidate), .. }) = self.entries.get(*k) else {
                continue;
            };
            if !mode.satisfies(candidate, desc) {
                continue;
            }
            let area = candidate.width as u64 * candidate.height as u64;
            if best.is_none_or(|(_, a)| area < a) {
                best = Some((*k, area));
            }
        }
        let (found, _) = best?;
        self.lock(found);
        log::debug!("scratch hit {}x{} ({mode:?})", desc.width, desc.height);
        Some(found)
    }

    /// Stores `resource` under `key`, locked once, then purges.
    pub fn insert_and_lock(&mut self, device: &mut dyn Device, key: ResourceKey, resource: Resource) -> EntryKey {
        let bytes = resource.byte_size();
        let handle = self.entries.insert(ResourceEntry { key, resource, lock_count: 1, valid: true });
        self.index.entry(key).or_default().push(handle);
        self.resident_count += 1;
        self.resident_bytes += bytes;
        log::debug!("cache insert {key:?} ({bytes} bytes)");
        self.purge(device);
        handle
    }

    /// Adds a lock to the valid entry holding texture `id`.
    pub fn lock_texture(&mut self, id: TextureId) -> Option<EntryKey> {
        let found = self
            .entries
            .iter()
            .find(|(_, e)| e.valid && matches!(&e.resource, Resource::Texture(t) if t.id == id))
            .map(|(k, _)| k)?;
        self.lock(found);
        Some(found)
    }

    fn lock(&mut self, key: EntryKey) {
        let Some(entry) = self.entries.get_mut(key) else {
            return;
        };
        if entry.lock_count == 0 {
            self.lru.pop(&key);
        }
        entry.lock_count += 1;
    }

    /// Drops one lock; returns false when `key` is stale or already
    /// unlocked.
    pub fn unlock(&mut self, device: &mut dyn Device, key: EntryKey) -> bool {
        if !self.release(key) {
            return false;
        }
        self.purge(device);
        true
    }

    fn release(&mut self, key: EntryKey) -> bool {
        let Some(entry) = self.entries.get_mut(key) else {
            return false;
        };
        if entry.lock_count == 0 {
            log::warn!("unlock of an unlocked cache entry");
            return false;
        }
        entry.lock_count -= 1;
        if entry.lock_count == 0 {
            if entry.valid {
                self.lru.put(key, ());
            } else {
                self.entries.remove(key);
            }
        }
        true
    }

    /// Records that `stencil` (already locked by the caller) is attached to
    /// `target`. The lock is released when the target is evicted or
    /// detached.
    pub fn record_attachment(&mut self, target: TextureId, stencil: EntryKey) {
        if let Some(previous) = self.attachments.insert(target, stencil) {
            self.release(previous);
        }
    }

    #[inline]
    pub fn attached_stencil(&self, target: TextureId) -> Option<EntryKey> {
        self.attachments.get(&target).copied().filter(|k| self.entries.contains_key(*k))
    }

    /// Releases the stencil lock held for `target`.
    pub fn release_attachment(&mut self, device: &mut dyn Device, target: TextureId) {
        if let Some(stencil) = self.attachments.remove(&target)
            && self.release(stencil)
        {
            self.purge(device);
        }
    }

    #[inline]
    fn over_budget(&self) -> bool {
        self.resident_count > self.max_count || self.resident_bytes > self.max_bytes
    }

    /// Evicts least recently unlocked entries until within budget or no
    /// unlocked entries remain.
    pub fn purge(&mut self, device: &mut dyn Device) {
        if self.purging {
            return;
        }
        self.purging = true;
        while self.over_budget() {
            let Some((victim, ())) = self.lru.pop_lru() else {
                break;
            };
            self.evict(device, victim);
        }
        self.purging = false;
    }

    /// Evicts every unlocked entry.
    pub fn purge_unlocked(&mut self, device: &mut dyn Device) {
        while let Some((victim, ())) = self.lru.pop_lru() {
            self.evict(device, victim);
        }
    }

    fn evict(&mut self, device: &mut dyn Device, key: EntryKey) {
        let Some(entry) = self.entries.remove(key) else {
            return;
        };
        self.lru.pop(&key);
        if let Some(bucket) = self.index.get_mut(&entry.key) {
            bucket.retain(|k| *k != key);
            if bucket.is_empty() {
                self.index.remove(&entry.key);
            }
        }
        let bytes = entry.resource.byte_size();
        self.resident_count = self.resident_count.saturating_sub(1);
        self.resident_bytes = self.resident_bytes.saturating_sub(bytes);
        log::debug!("cache evict {:?} ({bytes} bytes)", entry.key);

        if let Resource::Texture(t) = entry.resource
            && let Some(stencil) = self.attachments.remove(&t.id)
        {
            // Detached stencils become evictable in this same purge.
            self.release(stencil);
        }
        if entry.valid {
            entry.resource.free(device);
        }
    }

    /// Frees every entry, locked or not.
    pub fn remove_all(&mut self, device: &mut dyn Device) {
        for (_, entry) in self.entries.drain() {
            if entry.valid {
                entry.resource.free(device);
            }
        }
        self.index.clear();
        self.lru.clear();
        self.resident_count = 0;
        self.resident_bytes = 0;
    }

    /// Forgets every resource without freeing it (the device is gone).
    /// Locked entries linger as invalid until their holders unlock them.
    pub fn abandon_all(&mut self) {
        for (_, stencil) in self.attachments.drain() {
            if let Some(entry) = self.entries.get_mut(stencil) {
                entry.lock_count = entry.lock_count.saturating_sub(1);
            }
        }
        self.entries.retain(|_, e| {
            e.valid = false;
            e.is_locked()
        });
        self.index.clear();
        self.lru.clear();
        self.attachments.clear();
        self.resident_count = 0;
        self.resident_bytes = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::KeyCriteria;
    use crate::device::recording::RecordingDevice;
    use crate::device::{PixelConfig, TextureFlags};

    fn make(dev: &mut RecordingDevice, w: u32, h: u32) -> Texture {
        dev.create_texture(&TextureDesc::new(w, h, PixelConfig::Rgba8888), None, 0).unwrap()
    }

    fn client(id: u64) -> ResourceKey {
        ResourceKey::texture(id, 8, 8, KeyCriteria::NONE)
    }

    fn scratch_rt(dev: &mut RecordingDevice, cache: &mut ResourceCache, w: u32, h: u32) -> EntryKey {
        let desc = TextureDesc::new(w, h, PixelConfig::Rgba8888).with_flags(TextureFlags::RENDER_TARGET);
        let tex = dev.create_texture(&desc, None, 0).unwrap();
        cache.insert_and_lock(dev, ResourceKey::Scratch(desc), Resource::Texture(tex))
    }

    #[test]
    fn least_recently_unlocked_is_evicted_first() {
        let mut dev = RecordingDevice::new(8, 8);
        let mut cache = ResourceCache::new(2, usize::MAX);
        let mut handles = Vec::new();
        for id in 0..3 {
            let tex = make(&mut dev, 8, 8);
            let h = cache.insert_and_lock(&mut dev, client(id), Resource::Texture(tex));
            cache.unlock(&mut dev, h);
            handles.push(h);
        }
        assert!(cache.texture(handles[0]).is_none());
        assert!(cache.texture(handles[1]).is_some());
        assert!(cache.texture(handles[2]).is_some());
        assert_eq!(dev.live_textures(), 2);
        assert!(cache.find_and_lock(&client(0)).is_none());
    }

    #[test]
    fn locked_entries_survive_over_budget() {
        let mut dev = RecordingDevice::new(8, 8);
        let mut cache = ResourceCache::new(1, usize::MAX);
        let tex = make(&mut dev, 8, 8);
        let a = cache.insert_and_lock(&mut dev, client(1), Resource::Texture(tex));
        let tex = make(&mut dev, 8, 8);
        let b = cache.insert_and_lock(&mut dev, client(2), Resource::Texture(tex));
        assert_eq!(cache.stats().resident_count, 2);
        assert!(cache.texture(a).is_some() && cache.texture(b).is_some());
        cache.unlock(&mut dev, a);
        assert!(cache.texture(a).is_none());
        assert_eq!(cache.stats().resident_count, 1);
    }

    #[test]
    fn lowering_limits_purges_immediately() {
        let mut dev = RecordingDevice::new(8, 8);
        let mut cache = ResourceCache::new(10, usize::MAX);
        let tex = make(&mut dev, 8, 8);
        let locked = cache.insert_and_lock(&mut dev, client(1), Resource::Texture(tex));
        for id in 2..5 {
            let tex = make(&mut dev, 8, 8);
            let h = cache.insert_and_lock(&mut dev, client(id), Resource::Texture(tex));
            cache.unlock(&mut dev, h);
        }
        cache.set_limits(&mut dev, 0, 0);
        let stats = cache.stats();
        assert_eq!(stats.resident_count, 1);
        assert_eq!(stats.locked, 1);
        assert!(cache.texture(locked).is_some());
    }

    #[test]
    fn byte_budget_is_enforced() {
        let mut dev = RecordingDevice::new(8, 8);
        let mut cache = ResourceCache::new(100, 8 * 8 * 4 * 2);
        for id in 0..4 {
            let tex = make(&mut dev, 8, 8);
            let h = cache.insert_and_lock(&mut dev, client(id), Resource::Texture(tex));
            cache.unlock(&mut dev, h);
        }
        assert_eq!(cache.stats().resident_bytes, 512);
    }

    #[test]
    fn find_locks_and_unlock_never_goes_negative() {
        let mut dev = RecordingDevice::new(8, 8);
        let mut cache = ResourceCache::new(10, usize::MAX);
        let tex = make(&mut dev, 8, 8);
        let h = cache.insert_and_lock(&mut dev, client(7), Resource::Texture(tex));
        assert_eq!(cache.find_and_lock(&client(7)), Some(h));
        assert_eq!(cache.lock_count(h), Some(2));
        assert!(cache.unlock(&mut dev, h));
        assert!(cache.unlock(&mut dev, h));
        assert!(!cache.unlock(&mut dev, h));
        assert_eq!(cache.lock_count(h), Some(0));
    }

    #[test]
    fn locked_scratch_is_never_handed_out_twice() {
        let mut dev = RecordingDevice::new(8, 8);
        let mut cache = ResourceCache::new(10, usize::MAX);
        let desc = TextureDesc::new(64, 64, PixelConfig::Rgba8888).with_flags(TextureFlags::RENDER_TARGET);
        let h = scratch_rt(&mut dev, &mut cache, 64, 64);
        assert!(cache.find_scratch(&desc, ScratchTexMatch::Exact).is_none());
        cache.unlock(&mut dev, h);
        assert_eq!(cache.find_scratch(&desc, ScratchTexMatch::Exact), Some(h));
    }

    #[test]
    fn approx_scratch_prefers_smallest_then_most_recent() {
        let mut dev = RecordingDevice::new(8, 8);
        let mut cache = ResourceCache::new(10, usize::MAX);
        let big = scratch_rt(&mut dev, &mut cache, 256, 256);
        let small_a = scratch_rt(&mut dev, &mut cache, 128, 128);
        let small_b = scratch_rt(&mut dev, &mut cache, 128, 128);
        cache.unlock(&mut dev, big);
        cache.unlock(&mut dev, small_a);
        cache.unlock(&mut dev, small_b);
        let req = TextureDesc::new(100, 100, PixelConfig::Rgba8888).with_flags(TextureFlags::RENDER_TARGET);
        assert_eq!(cache.find_scratch(&req, ScratchTexMatch::Approx), Some(small_b));
        assert_eq!(cache.find_scratch(&req, ScratchTexMatch::Approx), Some(small_a));
        assert_eq!(cache.find_scratch(&req, ScratchTexMatch::Approx), Some(big));
        assert_eq!(cache.find_scratch(&req, ScratchTexMatch::Approx), None);
    }

    #[test]
    fn evicting_a_target_releases_its_stencil() {
        let mut dev = RecordingDevice::new(8, 8);
        let mut cache = ResourceCache::new(10, usize::MAX);
        let rt = scratch_rt(&mut dev, &mut cache, 16, 16);
        let rt_id = cache.texture(rt).unwrap().id;
        let sb = dev.create_stencil_buffer(16, 16, 1).unwrap();
        let sk = cache.insert_and_lock(
            &mut dev,
            ResourceKey::Stencil { width: 16, height: 16, samples: 1 },
            Resource::Stencil(sb),
        );
        cache.record_attachment(rt_id, sk);
        cache.unlock(&mut dev, rt);
        assert_eq!(cache.lock_count(sk), Some(1));
        cache.set_limits(&mut dev, 0, 0);
        assert!(cache.stencil(sk).is_none());
        assert_eq!(dev.live_stencils(), 0);
        assert_eq!(dev.live_textures(), 0);
    }

    #[test]
    fn abandon_invalidates_without_freeing() {
        let mut dev = RecordingDevice::new(8, 8);
        let mut cache = ResourceCache::new(10, usize::MAX);
        let tex = make(&mut dev, 8, 8);
        let locked = cache.insert_and_lock(&mut dev, client(1), Resource::Texture(tex));
        let tex = make(&mut dev, 8, 8);
        let free = cache.insert_and_lock(&mut dev, client(2), Resource::Texture(tex));
        cache.unlock(&mut dev, free);
        cache.abandon_all();
        assert!(cache.texture(locked).is_none());
        assert!(cache.texture(free).is_none());
        assert!(cache.unlock(&mut dev, locked));
        assert_eq!(cache.stats().entries, 0);
        cache.remove_all(&mut dev);
        assert_eq!(dev.live_textures(), 2);
    }

    #[test]
    fn abandon_drops_stencils_held_only_by_attachments() {
        let mut dev = RecordingDevice::new(8, 8);
        let mut cache = ResourceCache::new(10, usize::MAX);
        let rt = scratch_rt(&mut dev, &mut cache, 16, 16);
        let rt_id = cache.texture(rt).unwrap().id;
        let sb = dev.create_stencil_buffer(16, 16, 1).unwrap();
        let sk = cache.insert_and_lock(
            &mut dev,
            ResourceKey::Stencil { width: 16, height: 16, samples: 1 },
            Resource::Stencil(sb),
        );
        cache.record_attachment(rt_id, sk);
        cache.abandon_all();
        // Only the target's own lock survives.
        assert_eq!(cache.stats().entries, 1);
        assert_eq!(cache.lock_count(sk), None);
        assert!(cache.unlock(&mut dev, rt));
        assert_eq!(cache.stats().entries, 0);
    }

    #[test]
    fn lock_texture_pins_by_id() {
        let mut dev = RecordingDevice::new(8, 8);
        let mut cache = ResourceCache::new(1, usize::MAX);
        let tex = make(&mut dev, 8, 8);
        let a = cache.insert_and_lock(&mut dev, client(1), Resource::Texture(tex));
        let a_id = cache.texture(a).unwrap().id;
        assert_eq!(cache.lock_texture(a_id), Some(a));
        cache.unlock(&mut dev, a);
        let tex = make(&mut dev, 8, 8);
        let b = cache.insert_and_lock(&mut dev, client(2), Resource::Texture(tex));
        assert!(cache.texture(a).is_some());
        cache.unlock(&mut dev, a);
        assert!(cache.texture(a).is_none());
        assert!(cache.texture(b).is_some());
        assert_eq!(cache.lock_texture(a_id), None);
    }
}
