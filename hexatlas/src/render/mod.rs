//! External collaborator contracts.
//!
//! The engine never draws chart content itself. A [`Renderer`] materializes
//! one world rectangle into a tile surface; a [`ContentSource`] owns the
//! domain data behind the chart and contributes its identity/version epoch
//! to every tile fingerprint, notifying the engine when that epoch moves so
//! caches and queues invalidate wholesale.

use thiserror::Error;
use tokio::sync::watch;

use crate::coord::WorldRect;
use crate::tile::{Fingerprint, TileSurface};

/// Errors produced by a drawing backend during materialization.
///
/// The scheduler catches these, drops the request without populating the
/// cache, and keeps going; the tile stays a placeholder until a later
/// compositing pass re-enqueues it.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The backend failed to produce pixels.
    #[error("render backend failure: {0}")]
    Backend(String),

    /// The destination surface could not be allocated.
    #[error("surface allocation failed")]
    SurfaceAllocation,
}

/// Draws chart content for one world rectangle at one linear scale.
///
/// Implementations must be deterministic: identical `(world, scale,
/// fingerprint)` inputs must produce pixel-identical output, because the
/// cache treats the derived tile key as a complete identity.
pub trait Renderer: Send + Sync {
    /// Render `world` at `linear_scale` into `surface`.
    ///
    /// The surface arrives transparent (fresh or recycled) and sized to the
    /// configured tile dimensions.
    fn render(
        &self,
        world: WorldRect,
        linear_scale: f64,
        fingerprint: Fingerprint,
        surface: &mut TileSurface,
    ) -> Result<(), RenderError>;
}

/// The opaque domain data behind the chart.
pub trait ContentSource: Send + Sync {
    /// Current identity/version epoch, folded into every fingerprint.
    fn epoch(&self) -> u64;

    /// Subscribe to epoch changes.
    fn changes(&self) -> watch::Receiver<u64>;
}

/// A content source with a manually bumped epoch.
///
/// Suits hosts whose domain data changes through explicit edits (sector
/// reloads, style packs) rather than continuous streams; also the test
/// double of choice.
pub struct VersionedContent {
    tx: watch::Sender<u64>,
}

impl VersionedContent {
    pub fn new(epoch: u64) -> Self {
        let (tx, _) = watch::channel(epoch);
        Self { tx }
    }

    /// Advance the epoch, invalidating every outstanding fingerprint.
    pub fn bump(&self) {
        self.tx.send_modify(|epoch| *epoch += 1);
    }
}

impl Default for VersionedContent {
    fn default() -> Self {
        Self::new(0)
    }
}

impl ContentSource for VersionedContent {
    fn epoch(&self) -> u64 {
        *self.tx.borrow()
    }

    fn changes(&self) -> watch::Receiver<u64> {
        self.tx.subscribe()
    }
}
