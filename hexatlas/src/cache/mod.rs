//! Bounded tile cache with strict LRU eviction and surface recycling.
//!
//! The cache maps [`TileKey`] to finished [`TileSurface`] bitmaps. Capacity
//! is a fixed entry count set at construction; inserting beyond capacity
//! evicts exactly the least-recently-used entry. When the evicted surface is
//! not referenced elsewhere its pixel buffer is handed back to the scheduler
//! as the destination for the next materialization, so steady-state panning
//! allocates nothing.
//!
//! One cache instance is shared by reference across all live viewports over
//! the same content ([`SharedTileCache`]); the fingerprint inside the key is
//! what keeps that sharing sound.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;

use crate::config::ConfigError;
use crate::telemetry::CacheStats;
use crate::tile::{TileKey, TileSurface};

/// Shared handle to one cache, cloned into every viewport and the scheduler.
pub type SharedTileCache = Arc<Mutex<TileCache>>;

/// Bounded key→bitmap store with least-recently-used eviction.
pub struct TileCache {
    entries: LruCache<TileKey, Arc<TileSurface>>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    recycled: AtomicU64,
}

impl TileCache {
    /// Create a cache holding at most `capacity` tiles.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidCapacity`] for a zero capacity.
    pub fn new(capacity: usize) -> Result<Self, ConfigError> {
        let capacity = NonZeroUsize::new(capacity).ok_or(ConfigError::InvalidCapacity)?;
        Ok(Self {
            entries: LruCache::new(capacity),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            recycled: AtomicU64::new(0),
        })
    }

    /// Create a shared cache handle.
    pub fn shared(capacity: usize) -> Result<SharedTileCache, ConfigError> {
        Ok(Arc::new(Mutex::new(Self::new(capacity)?)))
    }

    /// Look up a tile, refreshing its recency.
    pub fn get(&mut self, key: &TileKey) -> Option<Arc<TileSurface>> {
        match self.entries.get(key) {
            Some(surface) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(Arc::clone(surface))
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Look up a tile without touching recency or statistics.
    ///
    /// Used by the placeholder search, which probes many neighbors per frame
    /// and must not reorder the eviction queue while doing so.
    pub fn peek(&self, key: &TileKey) -> Option<Arc<TileSurface>> {
        self.entries.peek(key).map(Arc::clone)
    }

    /// True if the key is cached. Does not touch recency.
    pub fn contains(&self, key: &TileKey) -> bool {
        self.entries.contains(key)
    }

    /// Insert a finished tile.
    ///
    /// If the cache is at capacity and the key is new, the least-recently
    /// used entry is evicted first; put and evict are atomic under the
    /// single-owner locking model.
    pub fn put(&mut self, key: TileKey, surface: Arc<TileSurface>) {
        if self.entries.len() == self.entries.cap().get() && !self.entries.contains(&key) {
            if self.entries.pop_lru().is_some() {
                self.evictions.fetch_add(1, Ordering::Relaxed);
            }
        }
        self.entries.put(key, surface);
    }

    /// Evict the oldest entry and reclaim its surface for reuse.
    ///
    /// Returns `None` when the cache is below capacity (no eviction needed)
    /// or when the evicted surface is still referenced by an in-progress
    /// compositing pass, in which case it is simply dropped.
    pub fn take_recycled(&mut self) -> Option<TileSurface> {
        if self.entries.len() < self.entries.cap().get() {
            return None;
        }
        let (_, surface) = self.entries.pop_lru()?;
        self.evictions.fetch_add(1, Ordering::Relaxed);
        match Arc::try_unwrap(surface) {
            Ok(mut surface) => {
                self.recycled.fetch_add(1, Ordering::Relaxed);
                surface.reset();
                Some(surface)
            }
            Err(_) => None,
        }
    }

    /// Drop every entry. Used whenever the fingerprint space changes.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of cached tiles.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Configured capacity in entries.
    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }

    /// Point-in-time statistics snapshot.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            recycled: self.recycled.load(Ordering::Relaxed),
            entries: self.len(),
            capacity: self.capacity(),
        }
    }
}

impl std::fmt::Debug for TileCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileCache")
            .field("entries", &self.len())
            .field("capacity", &self.capacity())
            .finish()
    }
}
