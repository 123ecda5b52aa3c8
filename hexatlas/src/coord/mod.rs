//! Coordinate conversion module.
//!
//! Provides conversions between the three coordinate spaces of the chart:
//!
//! - **World space**: continuous f64 coordinates content is authored in.
//! - **Pixel space**: viewport-relative screen pixels.
//! - **Hex addresses**: discrete integer cells in the offset (brick) grid.
//!
//! All conversions are pure functions of a [`Transform`], itself derived
//! from (center, linear scale, viewport). The hex grid is non-square, so the
//! pixel-per-world factor differs per axis.

use thiserror::Error;

/// Horizontal world-to-pixel factor of the hex grid (cos 30°).
///
/// Hex columns interlock, so a column advance covers less horizontal
/// distance than a row advance covers vertical distance.
pub const GRID_SCALE_X: f64 = 0.866_025_403_784_438_6;

/// Vertical world-to-pixel factor of the hex grid.
pub const GRID_SCALE_Y: f64 = 1.0;

/// Errors produced while constructing a transform.
#[derive(Debug, Error, PartialEq)]
pub enum CoordError {
    /// A viewport with a zero dimension has no defined transform.
    #[error("degenerate viewport: {width}x{height}")]
    DegenerateViewport { width: u32, height: u32 },

    /// Linear scale must be positive and finite.
    #[error("invalid linear scale: {0}")]
    InvalidScale(f64),
}

/// A point in continuous world space.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct WorldPoint {
    pub x: f64,
    pub y: f64,
}

impl WorldPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A point in viewport pixel space.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PixelPoint {
    pub x: f64,
    pub y: f64,
}

impl PixelPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Discrete address of one hexagonal cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HexAddr {
    pub x: i32,
    pub y: i32,
}

impl HexAddr {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Viewport dimensions in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Diagonal length in pixels.
    pub fn diagonal(&self) -> f64 {
        ((self.width as f64).powi(2) + (self.height as f64).powi(2)).sqrt()
    }

    /// True if either dimension is zero.
    pub fn is_degenerate(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// An axis-aligned rectangle in world space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WorldRect {
    pub min: WorldPoint,
    pub max: WorldPoint,
}

impl WorldRect {
    pub fn new(min: WorldPoint, max: WorldPoint) -> Self {
        Self { min, max }
    }

    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    pub fn center(&self) -> WorldPoint {
        WorldPoint::new(
            (self.min.x + self.max.x) / 2.0,
            (self.min.y + self.max.y) / 2.0,
        )
    }
}

/// An axis-aligned rectangle in pixel space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PixelRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl PixelRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Intersection with another rectangle, or `None` when disjoint.
    pub fn intersect(&self, other: &PixelRect) -> Option<PixelRect> {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = self.right().min(other.right());
        let y1 = self.bottom().min(other.bottom());
        if x1 > x0 && y1 > y0 {
            Some(PixelRect::new(x0, y0, x1 - x0, y1 - y0))
        } else {
            None
        }
    }
}

/// Precomputed pixel↔world conversion for one (center, scale, viewport).
///
/// Stateless once built; the view state rebuilds it atomically on every
/// mutation so callers always observe a consistent conversion.
#[derive(Clone, Copy, Debug)]
pub struct Transform {
    center: WorldPoint,
    scale: f64,
    viewport: Viewport,
    /// Pixels per world unit on each axis.
    px_per_world_x: f64,
    px_per_world_y: f64,
}

impl Transform {
    /// Build a transform for the given view parameters.
    ///
    /// # Errors
    ///
    /// Returns [`CoordError::DegenerateViewport`] for a zero-sized viewport
    /// and [`CoordError::InvalidScale`] for a non-positive or non-finite
    /// linear scale.
    pub fn new(center: WorldPoint, scale: f64, viewport: Viewport) -> Result<Self, CoordError> {
        if viewport.is_degenerate() {
            return Err(CoordError::DegenerateViewport {
                width: viewport.width,
                height: viewport.height,
            });
        }
        if !(scale.is_finite() && scale > 0.0) {
            return Err(CoordError::InvalidScale(scale));
        }
        Ok(Self {
            center,
            scale,
            viewport,
            px_per_world_x: scale * GRID_SCALE_X,
            px_per_world_y: scale * GRID_SCALE_Y,
        })
    }

    pub fn center(&self) -> WorldPoint {
        self.center
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Half the viewport extent expressed in world units.
    fn half_extent(&self) -> (f64, f64) {
        (
            self.viewport.width as f64 / 2.0 / self.px_per_world_x,
            self.viewport.height as f64 / 2.0 / self.px_per_world_y,
        )
    }

    /// Convert a viewport pixel to world coordinates.
    pub fn pixel_to_world(&self, pixel: PixelPoint) -> WorldPoint {
        let (hx, hy) = self.half_extent();
        WorldPoint::new(
            self.center.x - hx + pixel.x / self.px_per_world_x,
            self.center.y - hy + pixel.y / self.px_per_world_y,
        )
    }

    /// Convert a world point to viewport pixel coordinates.
    pub fn world_to_pixel(&self, world: WorldPoint) -> PixelPoint {
        let (hx, hy) = self.half_extent();
        PixelPoint::new(
            (world.x - self.center.x + hx) * self.px_per_world_x,
            (world.y - self.center.y + hy) * self.px_per_world_y,
        )
    }

    /// The world rectangle currently covered by the viewport.
    pub fn visible_world(&self) -> WorldRect {
        let (hx, hy) = self.half_extent();
        WorldRect::new(
            WorldPoint::new(self.center.x - hx, self.center.y - hy),
            WorldPoint::new(self.center.x + hx, self.center.y + hy),
        )
    }
}

/// Round a world point to its hex address in the offset (brick) grid.
///
/// Columns interlock: the vertical rounding window shifts by half a cell,
/// with the shift direction decided by the parity of the rounded column.
pub fn world_to_hex(world: WorldPoint) -> HexAddr {
    let hx = world.x.round() as i32;
    let offset = if hx.rem_euclid(2) == 0 { 0.5 } else { -0.5 };
    let hy = (world.y + offset).round() as i32;
    HexAddr::new(hx, hy)
}
