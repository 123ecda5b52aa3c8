//! Point-in-time statistics snapshots.
//!
//! The cache and scheduler keep lock-free atomic counters and expose copies
//! of them through these snapshot types, so observers never hold a lock
//! while formatting output.

/// Tile cache statistics at one point in time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups that found a tile.
    pub hits: u64,
    /// Lookups that found nothing.
    pub misses: u64,
    /// Entries evicted to make room.
    pub evictions: u64,
    /// Evicted surfaces whose buffers were reused for new renders.
    pub recycled: u64,
    /// Current entry count.
    pub entries: usize,
    /// Configured capacity.
    pub capacity: usize,
}

impl CacheStats {
    /// Hit ratio in [0, 1]; zero when nothing was looked up yet.
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

impl std::fmt::Display for CacheStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{} tiles, {:.1}% hits, {} evictions ({} recycled)",
            self.entries,
            self.capacity,
            self.hit_ratio() * 100.0,
            self.evictions,
            self.recycled
        )
    }
}

/// Render scheduler statistics at one point in time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Requests accepted into the queue.
    pub enqueued: u64,
    /// Enqueue calls ignored because the key was already queued.
    pub coalesced: u64,
    /// Tiles successfully materialized into the cache.
    pub materialized: u64,
    /// Materializations that failed and were dropped.
    pub render_failures: u64,
    /// Requests dropped by a batch clear before materializing.
    pub superseded: u64,
    /// Current queue depth.
    pub pending: usize,
}
