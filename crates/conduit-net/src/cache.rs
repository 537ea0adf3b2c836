//! Species interning for the sync protocol.
//!
//! Full species payloads (id + tag bytes) are too heavy to resend every
//! update, so the wire carries a small integer handle into a shared cache.
//! The encoding side assigns handles with [`store`](FluidCache::store); the
//! decoding side must be seeded with [`insert`](FluidCache::insert) (from a
//! cache-sync message) before [`resolve`](FluidCache::resolve) can succeed.

use std::collections::BTreeMap;

use conduit_core::fluid::FluidKey;

/// Bidirectional `FluidKey` <-> handle mapping.
///
/// Handles are dense, starting at 0, and never reused within one cache
/// lifetime. The cache itself never expires entries; the species space per
/// session is tiny.
#[derive(Debug, Clone, Default)]
pub struct FluidCache {
    by_key: BTreeMap<FluidKey, u32>,
    by_handle: BTreeMap<u32, FluidKey>,
    next_handle: u32,
}

impl FluidCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up or assign the handle for a species. Encoder side.
    pub fn store(&mut self, key: &FluidKey) -> u32 {
        if let Some(&handle) = self.by_key.get(key) {
            return handle;
        }
        let handle = self.next_handle;
        self.next_handle += 1;
        self.by_key.insert(key.clone(), handle);
        self.by_handle.insert(handle, key.clone());
        handle
    }

    /// Seed a handle received from the encoder side. Decoder side.
    pub fn insert(&mut self, handle: u32, key: FluidKey) {
        self.by_key.insert(key.clone(), handle);
        self.by_handle.insert(handle, key);
        self.next_handle = self.next_handle.max(handle + 1);
    }

    /// Resolve a handle back to its species, if known.
    pub fn resolve(&self, handle: u32) -> Option<&FluidKey> {
        self.by_handle.get(&handle)
    }

    /// The handle previously assigned to a species, if any.
    pub fn handle_of(&self, key: &FluidKey) -> Option<u32> {
        self.by_key.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.by_handle.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_handle.is_empty()
    }
}
