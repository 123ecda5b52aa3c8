//! Placeholder synthesis for cache misses.
//!
//! When the compositor needs a tile that is not cached yet, the resolver
//! borrows imagery from neighboring zoom levels: finer tiles first, each
//! covering one quadrant of the request (scaled down), recursing into
//! still-uncovered quadrants up to a configured depth; failing that, one
//! cropped-and-upscaled (blurred) cover from the nearest coarser level;
//! failing both, a static checkerboard. The returned pieces always tile the
//! requested rectangle exactly, with no gaps or overlaps, so partial
//! coverage composes cleanly on screen.
//!
//! Resolution runs over the locked cache as an immutable snapshot, uses
//! non-recency `peek` lookups, and never stores anything.

use std::sync::Arc;

use tiny_skia::{Color, Paint, Rect, Transform as SkiaTransform};

use crate::cache::TileCache;
use crate::coord::PixelRect;
use crate::tile::{TileKey, TileSurface};

/// One piece of substitute imagery.
///
/// `src` selects the region of `surface` to draw; `dest` is where it lands
/// in the requested tile's local pixel space (also its clip rectangle).
#[derive(Clone, Debug)]
pub struct PlaceholderPiece {
    pub surface: Arc<TileSurface>,
    pub src: PixelRect,
    pub dest: PixelRect,
}

/// Searches neighboring zoom levels for substitute imagery.
pub struct PlaceholderResolver {
    tile_px: u32,
    min_level: i32,
    max_level: i32,
    max_depth: u32,
    checker: Arc<TileSurface>,
}

impl PlaceholderResolver {
    /// Build a resolver with its static checkerboard fallback.
    ///
    /// Returns `None` only for a zero tile size, which validated
    /// configuration never produces.
    pub fn new(tile_px: u32, min_level: i32, max_level: i32, max_depth: u32) -> Option<Self> {
        Some(Self {
            tile_px,
            min_level,
            max_level,
            max_depth,
            checker: Arc::new(checkerboard(tile_px)?),
        })
    }

    /// The static fallback surface used when both searches come up empty.
    pub fn fallback_surface(&self) -> &Arc<TileSurface> {
        &self.checker
    }

    /// Resolve substitute pieces for `key` against the cache snapshot.
    pub fn resolve(&self, key: &TileKey, cache: &TileCache) -> Vec<PlaceholderPiece> {
        let full = PixelRect::new(0.0, 0.0, self.tile_px as f64, self.tile_px as f64);

        let mut pieces = Vec::new();
        let mut gaps = Vec::new();
        self.search_finer(key, full, 0, cache, &mut pieces, &mut gaps);

        if pieces.is_empty() {
            // Finer direction yielded nothing at all: one blurred coarser
            // cover, else the checkerboard.
            if let Some(piece) = self.search_coarser(key, full, cache) {
                return vec![piece];
            }
            return vec![self.checker_piece(full)];
        }

        // Partial finer coverage: plug remaining holes so the result still
        // tiles exactly.
        pieces.extend(gaps.into_iter().map(|gap| self.checker_piece(gap)));
        pieces
    }

    fn search_finer(
        &self,
        key: &TileKey,
        dest: PixelRect,
        depth: u32,
        cache: &TileCache,
        pieces: &mut Vec<PlaceholderPiece>,
        gaps: &mut Vec<PixelRect>,
    ) {
        let children = key.children();
        for (i, child) in children.iter().enumerate() {
            let quadrant = quadrant_rect(dest, i);
            if let Some(surface) = cache.peek(child) {
                // The whole finer tile scales down into its quadrant.
                pieces.push(PlaceholderPiece {
                    surface,
                    src: PixelRect::new(0.0, 0.0, self.tile_px as f64, self.tile_px as f64),
                    dest: quadrant,
                });
            } else if depth + 1 < self.max_depth && child.level < self.max_level {
                self.search_finer(child, quadrant, depth + 1, cache, pieces, gaps);
            } else {
                gaps.push(quadrant);
            }
        }
    }

    fn search_coarser(
        &self,
        key: &TileKey,
        dest: PixelRect,
        cache: &TileCache,
    ) -> Option<PlaceholderPiece> {
        let mut ancestor = *key;
        while ancestor.level > self.min_level {
            ancestor = ancestor.parent();
            if let Some(surface) = cache.peek(&ancestor) {
                let span = 1i64 << (key.level - ancestor.level) as u32;
                let sub = self.tile_px as f64 / span as f64;
                let rx = key.x as i64 - ancestor.x as i64 * span;
                let ry = key.y as i64 - ancestor.y as i64 * span;
                return Some(PlaceholderPiece {
                    surface,
                    src: PixelRect::new(rx as f64 * sub, ry as f64 * sub, sub, sub),
                    dest,
                });
            }
        }
        None
    }

    fn checker_piece(&self, dest: PixelRect) -> PlaceholderPiece {
        // Identity mapping keeps the pattern aligned across pieces.
        PlaceholderPiece {
            surface: Arc::clone(&self.checker),
            src: dest,
            dest,
        }
    }
}

/// The quadrant of `rect` covered by child `i` (row-major child order).
fn quadrant_rect(rect: PixelRect, i: usize) -> PixelRect {
    let w = rect.width / 2.0;
    let h = rect.height / 2.0;
    let (col, row) = match i {
        0 => (0.0, 0.0),
        1 => (1.0, 0.0),
        2 => (0.0, 1.0),
        _ => (1.0, 1.0),
    };
    PixelRect::new(rect.x + col * w, rect.y + row * h, w, h)
}

/// Build the static checkerboard fallback bitmap.
fn checkerboard(tile_px: u32) -> Option<TileSurface> {
    let mut surface = TileSurface::new(tile_px)?;
    let light = Color::from_rgba8(0x30, 0x30, 0x38, 0xFF);
    let dark = Color::from_rgba8(0x22, 0x22, 0x28, 0xFF);
    surface.pixmap_mut().fill(dark);

    let cell = (tile_px / 8).max(1) as f32;
    let mut paint = Paint::default();
    paint.set_color(light);
    let cells = (tile_px as f32 / cell).ceil() as u32;
    for row in 0..cells {
        for col in 0..cells {
            if (row + col) % 2 == 0 {
                continue;
            }
            if let Some(rect) =
                Rect::from_xywh(col as f32 * cell, row as f32 * cell, cell, cell)
            {
                surface
                    .pixmap_mut()
                    .fill_rect(rect, &paint, SkiaTransform::identity(), None);
            }
        }
    }
    Some(surface)
}
