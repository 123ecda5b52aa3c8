//! Background render scheduler.
//!
//! Missing tiles discovered during compositing are enqueued here and
//! materialized one at a time: each [`RenderScheduler::tick`] resorts the
//! queue by tile-space distance to the current focus, pops the nearest
//! request, renders it synchronously through the [`Renderer`], stores the
//! result in the shared cache, and announces a redraw. "Background" is
//! cooperative: the only suspension point is the timer rearm between ticks
//! ([`SchedulerDaemon`]), bounding UI blocking to one tile's render time.
//!
//! Cancellation is batch-only: [`RenderScheduler::clear`] drops the whole
//! queue; an in-flight materialization is atomic and never cancelled.

mod daemon;

pub use daemon::SchedulerDaemon;

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, warn};

use crate::cache::SharedTileCache;
use crate::render::{RenderError, Renderer};
use crate::telemetry::SchedulerStats;
use crate::tile::{TileKey, TileRange, TileSurface};

/// Result of one scheduler tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing was queued.
    Idle,
    /// One tile was materialized into the cache.
    Rendered(TileKey),
    /// The renderer failed; the request was dropped without a cache write.
    Failed(TileKey),
}

/// Queue of pending tile requests with one-at-a-time materialization.
pub struct RenderScheduler {
    cache: SharedTileCache,
    renderer: Arc<dyn Renderer>,
    tile_px: u32,

    queue: Vec<TileKey>,
    queued: HashSet<TileKey>,
    /// Tile-space focus the queue is sorted towards.
    focus: (i32, i32),

    redraw_tx: watch::Sender<u64>,

    enqueued: AtomicU64,
    coalesced: AtomicU64,
    materialized: AtomicU64,
    render_failures: AtomicU64,
    superseded: AtomicU64,
}

impl RenderScheduler {
    pub fn new(cache: SharedTileCache, renderer: Arc<dyn Renderer>, tile_px: u32) -> Self {
        let (redraw_tx, _) = watch::channel(0);
        Self {
            cache,
            renderer,
            tile_px,
            queue: Vec::new(),
            queued: HashSet::new(),
            focus: (0, 0),
            redraw_tx,
            enqueued: AtomicU64::new(0),
            coalesced: AtomicU64::new(0),
            materialized: AtomicU64::new(0),
            render_failures: AtomicU64::new(0),
            superseded: AtomicU64::new(0),
        }
    }

    /// Subscribe to redraw announcements; the value is a frame counter
    /// bumped once per materialized tile.
    pub fn redraw_watch(&self) -> watch::Receiver<u64> {
        self.redraw_tx.subscribe()
    }

    /// The cache this scheduler materializes into.
    pub fn cache(&self) -> &SharedTileCache {
        &self.cache
    }

    /// Queue a tile for materialization.
    ///
    /// A key already queued is coalesced into the existing entry; returns
    /// whether the key was newly accepted.
    pub fn enqueue(&mut self, key: TileKey) -> bool {
        if !self.queued.insert(key) {
            self.coalesced.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        self.queue.push(key);
        self.enqueued.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Point the priority sort at a new target tile.
    ///
    /// The compositor derives the target from interaction state: the
    /// viewport edge under directional panning, the tile under a hovering
    /// pointer, or the view center.
    pub fn set_focus(&mut self, x: i32, y: i32) {
        self.focus = (x, y);
    }

    /// Number of pending requests.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn is_idle(&self) -> bool {
        self.queue.is_empty()
    }

    /// Drop every pending request.
    ///
    /// Used whenever tile identity is invalidated (style, content or level
    /// change); the next compositing pass repopulates from scratch.
    pub fn clear(&mut self) {
        self.superseded
            .fetch_add(self.queue.len() as u64, Ordering::Relaxed);
        self.queue.clear();
        self.queued.clear();
    }

    /// Enqueue cache-missing tiles in a ring just outside `range`.
    ///
    /// Lookahead only queues work; it never forces synchronous creation.
    pub fn prefetch_ring(&mut self, range: &TileRange, width: i32) -> usize {
        let mut added = 0;
        let missing: Vec<TileKey> = {
            let cache = self.cache.lock();
            range
                .ring(width)
                .into_iter()
                .filter(|key| !cache.contains(key))
                .collect()
        };
        for key in missing {
            if self.enqueue(key) {
                added += 1;
            }
        }
        added
    }

    /// Process exactly one pending request.
    ///
    /// Resorts the queue by distance to the focus tile, pops the nearest,
    /// materializes it synchronously and stores the result. A render
    /// failure drops the request and keeps scheduling; the tile stays a
    /// placeholder until a later compositing pass re-enqueues it.
    pub fn tick(&mut self) -> TickOutcome {
        let (fx, fy) = self.focus;
        // Farthest first so the nearest pops from the tail. Recomputing all
        // distances every pass is O(n log n) and fine at interactive queue
        // depths.
        self.queue
            .sort_by_key(|key| std::cmp::Reverse(key.distance_sq(fx, fy)));

        let Some(key) = self.queue.pop() else {
            return TickOutcome::Idle;
        };
        self.queued.remove(&key);

        match self.materialize(key) {
            Ok(()) => {
                self.materialized.fetch_add(1, Ordering::Relaxed);
                self.redraw_tx.send_modify(|frame| *frame += 1);
                debug!(tile = ?key, "Tile materialized");
                TickOutcome::Rendered(key)
            }
            Err(e) => {
                self.render_failures.fetch_add(1, Ordering::Relaxed);
                warn!(tile = ?key, error = %e, "Tile render failed; dropping request");
                TickOutcome::Failed(key)
            }
        }
    }

    fn materialize(&mut self, key: TileKey) -> Result<(), RenderError> {
        // Reuse the evicted surface's buffer when the cache is full.
        let recycled = self.cache.lock().take_recycled();
        let mut surface = match recycled {
            Some(surface) => surface,
            None => TileSurface::new(self.tile_px).ok_or(RenderError::SurfaceAllocation)?,
        };

        let world = key.world_rect(self.tile_px);
        self.renderer
            .render(world, key.linear_scale(), key.fingerprint, &mut surface)?;

        self.cache.lock().put(key, Arc::new(surface));
        Ok(())
    }

    /// Point-in-time statistics snapshot.
    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
            materialized: self.materialized.load(Ordering::Relaxed),
            render_failures: self.render_failures.load(Ordering::Relaxed),
            superseded: self.superseded.load(Ordering::Relaxed),
            pending: self.queue.len(),
        }
    }
}

impl std::fmt::Debug for RenderScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderScheduler")
            .field("pending", &self.queue.len())
            .field("focus", &self.focus)
            .finish()
    }
}
