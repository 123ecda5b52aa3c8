//! Tile identity and geometry.
//!
//! A [`TileKey`] names one renderable unit: integer tile coordinates, a
//! discretized zoom level, and a [`Fingerprint`] covering every
//! non-geometric input to the tile's pixels. The key is the sole identity
//! used by the cache and the scheduler queue; two logically different
//! renders must never share a key, and identical renders must never get
//! different keys.

mod surface;

pub use surface::TileSurface;

use crate::coord::{WorldPoint, WorldRect, GRID_SCALE_X, GRID_SCALE_Y};

/// Visual style of the chart. Part of the fingerprint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChartStyle {
    #[default]
    Poster,
    Print,
    Atlas,
    Draft,
}

/// Render option flags. Part of the fingerprint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RenderOptions(u32);

impl RenderOptions {
    pub const NONE: RenderOptions = RenderOptions(0);
    pub const HEX_GRID: RenderOptions = RenderOptions(1);
    pub const ROUTES: RenderOptions = RenderOptions(1 << 1);
    pub const NAMES: RenderOptions = RenderOptions(1 << 2);
    pub const BORDERS: RenderOptions = RenderOptions(1 << 3);

    pub fn contains(&self, other: RenderOptions) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn bits(&self) -> u32 {
        self.0
    }
}

impl std::ops::BitOr for RenderOptions {
    type Output = RenderOptions;

    fn bitor(self, rhs: RenderOptions) -> RenderOptions {
        RenderOptions(self.0 | rhs.0)
    }
}

/// The non-geometric portion of a tile key.
///
/// Captures everything besides location and zoom level that affects pixel
/// output: the content source's identity/version epoch, the active style,
/// and option flags. Any change in this space invalidates every cached
/// tile and every queued request wholesale.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint {
    /// Identity/version of the content source. Bumped on any content change.
    pub content_epoch: u64,
    /// Active visual style.
    pub style: ChartStyle,
    /// Active render option flags.
    pub options: RenderOptions,
}

impl Fingerprint {
    pub fn new(content_epoch: u64, style: ChartStyle, options: RenderOptions) -> Self {
        Self {
            content_epoch,
            style,
            options,
        }
    }
}

/// Identity of one renderable tile.
///
/// Immutable value type; identical keys must always yield pixel-identical
/// renders.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileKey {
    /// Tile column in the level grid. Negative west of the origin.
    pub x: i32,
    /// Tile row in the level grid. Negative north of the origin.
    pub y: i32,
    /// Discretized zoom level: linear scale `2^level`. Grows with
    /// magnification, so `level + 1` is one step finer.
    pub level: i32,
    /// Non-geometric render inputs.
    pub fingerprint: Fingerprint,
}

impl TileKey {
    pub fn new(x: i32, y: i32, level: i32, fingerprint: Fingerprint) -> Self {
        Self {
            x,
            y,
            level,
            fingerprint,
        }
    }

    /// Linear magnification tiles at this level are rendered at.
    pub fn linear_scale(&self) -> f64 {
        2.0_f64.powi(self.level)
    }

    /// World extent of one tile at this level, per axis.
    pub fn world_extent(level: i32, tile_px: u32) -> (f64, f64) {
        let scale = 2.0_f64.powi(level);
        (
            tile_px as f64 / (scale * GRID_SCALE_X),
            tile_px as f64 / (scale * GRID_SCALE_Y),
        )
    }

    /// The world rectangle this tile covers.
    pub fn world_rect(&self, tile_px: u32) -> WorldRect {
        let (w, h) = Self::world_extent(self.level, tile_px);
        let min = WorldPoint::new(self.x as f64 * w, self.y as f64 * h);
        WorldRect::new(min, WorldPoint::new(min.x + w, min.y + h))
    }

    /// The tile containing the given world point at the given level.
    pub fn containing(
        world: WorldPoint,
        level: i32,
        tile_px: u32,
        fingerprint: Fingerprint,
    ) -> Self {
        let (w, h) = Self::world_extent(level, tile_px);
        Self::new(
            (world.x / w).floor() as i32,
            (world.y / h).floor() as i32,
            level,
            fingerprint,
        )
    }

    /// The four tiles one level finer covering the same footprint.
    pub fn children(&self) -> [TileKey; 4] {
        let (x, y, l) = (self.x * 2, self.y * 2, self.level + 1);
        [
            TileKey::new(x, y, l, self.fingerprint),
            TileKey::new(x + 1, y, l, self.fingerprint),
            TileKey::new(x, y + 1, l, self.fingerprint),
            TileKey::new(x + 1, y + 1, l, self.fingerprint),
        ]
    }

    /// The tile one level coarser containing this tile's footprint.
    pub fn parent(&self) -> TileKey {
        TileKey::new(
            self.x.div_euclid(2),
            self.y.div_euclid(2),
            self.level - 1,
            self.fingerprint,
        )
    }

    /// Squared tile-space distance to another tile at the same level.
    ///
    /// Used by the scheduler's priority resort.
    pub fn distance_sq(&self, x: i32, y: i32) -> i64 {
        let dx = (self.x - x) as i64;
        let dy = (self.y - y) as i64;
        dx * dx + dy * dy
    }
}

/// An inclusive rectangle of tile coordinates at one level.
///
/// Produced by the compositor for the visible grid and consumed by the
/// scheduler's lookahead ring.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileRange {
    pub x0: i32,
    pub y0: i32,
    pub x1: i32,
    pub y1: i32,
    pub level: i32,
    pub fingerprint: Fingerprint,
}

impl TileRange {
    /// Keys inside the range, row-major.
    pub fn keys(&self) -> impl Iterator<Item = TileKey> + '_ {
        let fp = self.fingerprint;
        let level = self.level;
        let (x0, x1) = (self.x0, self.x1);
        (self.y0..=self.y1)
            .flat_map(move |y| (x0..=x1).map(move |x| TileKey::new(x, y, level, fp)))
    }

    /// Keys in a ring of `width` tiles just outside the range.
    pub fn ring(&self, width: i32) -> Vec<TileKey> {
        if width <= 0 {
            return Vec::new();
        }
        let mut out = Vec::new();
        for y in (self.y0 - width)..=(self.y1 + width) {
            for x in (self.x0 - width)..=(self.x1 + width) {
                let inside = x >= self.x0 && x <= self.x1 && y >= self.y0 && y <= self.y1;
                if !inside {
                    out.push(TileKey::new(x, y, self.level, self.fingerprint));
                }
            }
        }
        out
    }

    /// Number of tiles in the range.
    pub fn len(&self) -> usize {
        ((self.x1 - self.x0 + 1) as usize) * ((self.y1 - self.y0 + 1) as usize)
    }

    pub fn is_empty(&self) -> bool {
        self.x1 < self.x0 || self.y1 < self.y0
    }

    /// The tile nearest the range center; the default scheduling focus.
    pub fn center_tile(&self) -> (i32, i32) {
        (
            self.x0 + (self.x1 - self.x0) / 2,
            self.y0 + (self.y1 - self.y0) / 2,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn key(x: i32, y: i32, level: i32) -> TileKey {
        TileKey::new(x, y, level, Fingerprint::default())
    }

    #[test]
    fn test_key_equality_and_hash() {
        let mut set = HashSet::new();
        set.insert(key(1, 2, 3));
        set.insert(key(1, 2, 3));
        set.insert(key(1, 2, 4));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_fingerprint_distinguishes_keys() {
        let a = TileKey::new(0, 0, 5, Fingerprint::new(1, ChartStyle::Poster, RenderOptions::NONE));
        let b = TileKey::new(0, 0, 5, Fingerprint::new(2, ChartStyle::Poster, RenderOptions::NONE));
        let c = TileKey::new(0, 0, 5, Fingerprint::new(1, ChartStyle::Print, RenderOptions::NONE));
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_world_extent_halves_per_level() {
        let (w0, h0) = TileKey::world_extent(4, 256);
        let (w1, h1) = TileKey::world_extent(5, 256);
        assert!((w0 - 2.0 * w1).abs() < 1e-12);
        assert!((h0 - 2.0 * h1).abs() < 1e-12);
    }

    #[test]
    fn test_world_rect_adjacent_tiles_abut() {
        let a = key(3, 7, 5).world_rect(256);
        let b = key(4, 7, 5).world_rect(256);
        assert!((a.max.x - b.min.x).abs() < 1e-12);
    }

    #[test]
    fn test_containing_inverts_world_rect() {
        let k = key(-3, 9, 6);
        let rect = k.world_rect(256);
        let center = rect.center();
        assert_eq!(
            TileKey::containing(center, 6, 256, Fingerprint::default()),
            k
        );
    }

    #[test]
    fn test_children_cover_parent_footprint() {
        let parent = key(-2, 3, 4);
        let parent_rect = parent.world_rect(256);
        for child in parent.children() {
            assert_eq!(child.parent(), parent);
            let r = child.world_rect(256);
            assert!(r.min.x >= parent_rect.min.x - 1e-9);
            assert!(r.max.x <= parent_rect.max.x + 1e-9);
            assert!(r.min.y >= parent_rect.min.y - 1e-9);
            assert!(r.max.y <= parent_rect.max.y + 1e-9);
        }
    }

    #[test]
    fn test_parent_of_negative_coords() {
        assert_eq!(key(-1, -1, 5).parent(), key(-1, -1, 4));
        assert_eq!(key(-2, -2, 5).parent(), key(-1, -1, 4));
    }

    #[test]
    fn test_render_options_flags() {
        let opts = RenderOptions::HEX_GRID | RenderOptions::ROUTES;
        assert!(opts.contains(RenderOptions::HEX_GRID));
        assert!(opts.contains(RenderOptions::ROUTES));
        assert!(!opts.contains(RenderOptions::NAMES));
    }

    #[test]
    fn test_distance_sq() {
        assert_eq!(key(0, 0, 5).distance_sq(3, 4), 25);
        assert_eq!(key(-2, 1, 5).distance_sq(-2, 1), 0);
    }

    fn range(x0: i32, y0: i32, x1: i32, y1: i32) -> TileRange {
        TileRange {
            x0,
            y0,
            x1,
            y1,
            level: 5,
            fingerprint: Fingerprint::default(),
        }
    }

    #[test]
    fn test_range_keys_row_major() {
        let keys: Vec<_> = range(0, 0, 1, 1).keys().collect();
        assert_eq!(
            keys,
            vec![key(0, 0, 5), key(1, 0, 5), key(0, 1, 5), key(1, 1, 5)]
        );
    }

    #[test]
    fn test_range_len() {
        assert_eq!(range(-1, -1, 2, 1).len(), 12);
        assert_eq!(range(0, 0, 0, 0).len(), 1);
    }

    #[test]
    fn test_ring_surrounds_range_without_overlap() {
        let r = range(0, 0, 2, 1);
        let ring = r.ring(1);
        // (width+2) x (height+2) minus the interior.
        assert_eq!(ring.len(), 5 * 4 - 6);

        let interior: HashSet<_> = r.keys().collect();
        for k in &ring {
            assert!(!interior.contains(k));
            assert!(k.x >= -1 && k.x <= 3);
            assert!(k.y >= -1 && k.y <= 2);
        }
    }

    #[test]
    fn test_ring_zero_width_empty() {
        assert!(range(0, 0, 3, 3).ring(0).is_empty());
    }

    #[test]
    fn test_center_tile() {
        assert_eq!(range(0, 0, 4, 2).center_tile(), (2, 1));
        assert_eq!(range(-3, -3, -1, -1).center_tile(), (-2, -2));
    }
}
