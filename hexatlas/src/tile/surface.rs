//! Fixed-size bitmap surface for one tile.

use tiny_skia::{Color, Pixmap};

/// A square bitmap of fixed tile dimensions.
///
/// Surfaces are recycled: when the cache evicts its oldest entry and nothing
/// else holds the surface, the backing pixel buffer becomes the destination
/// for the next materialization instead of a fresh allocation.
#[derive(Clone, Debug)]
pub struct TileSurface {
    pixmap: Pixmap,
}

impl TileSurface {
    /// Allocate a transparent surface of `tile_px` × `tile_px` pixels.
    ///
    /// Returns `None` only for a zero edge length, which validated
    /// configuration never produces.
    pub fn new(tile_px: u32) -> Option<Self> {
        Pixmap::new(tile_px, tile_px).map(|pixmap| Self { pixmap })
    }

    /// Edge length in pixels.
    pub fn size_px(&self) -> u32 {
        self.pixmap.width()
    }

    /// Wipe the surface back to transparent, keeping the allocation.
    pub fn reset(&mut self) {
        self.pixmap.fill(Color::TRANSPARENT);
    }

    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }

    pub fn pixmap_mut(&mut self) -> &mut Pixmap {
        &mut self.pixmap
    }
}
