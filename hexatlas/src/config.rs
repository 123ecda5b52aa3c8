//! Engine configuration.
//!
//! [`AtlasConfig`] is the single configuration surface shared by the view
//! state, tile cache, scheduler and compositor. A config is validated once
//! via [`AtlasConfig::normalize`] before any component is built, so the
//! components themselves never re-check bounds.

use std::time::Duration;

use thiserror::Error;

/// Default tile edge length in pixels.
pub const DEFAULT_TILE_PX: u32 = 256;

/// Default tile cache capacity in entries.
pub const DEFAULT_CACHE_CAPACITY: usize = 512;

/// Default width of the lookahead ring, in tiles outside the viewport.
pub const DEFAULT_LOOKAHEAD_RING: i32 = 1;

/// Default maximum recursion depth for the finer-level placeholder search.
pub const DEFAULT_PLACEHOLDER_DEPTH: u32 = 2;

/// Errors produced while validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Cache capacity must hold at least one tile.
    #[error("cache capacity must be non-zero")]
    InvalidCapacity,

    /// Tile dimensions must be non-zero.
    #[error("tile size must be non-zero, got {0}")]
    InvalidTileSize(u32),

    /// Animation duration of zero would make every transition degenerate.
    #[error("transition duration must be non-zero")]
    InvalidDuration,
}

/// View-transition animation settings.
#[derive(Clone, Debug)]
pub struct AnimationConfig {
    /// Whether animated transitions are enabled at all.
    pub enabled: bool,

    /// Fixed duration of a transition.
    pub duration: Duration,

    /// Maximum pan distance, in viewport diagonals at the current scale,
    /// beyond which a transition jumps instead of animating.
    pub max_pan_viewports: f64,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            duration: Duration::from_millis(250),
            max_pan_viewports: 4.0,
        }
    }
}

/// Top-level engine configuration.
#[derive(Clone, Debug)]
pub struct AtlasConfig {
    /// Tile edge length in pixels. Tiles are square.
    pub tile_px: u32,

    /// Tile cache capacity in entries.
    pub cache_capacity: usize,

    /// Lower bound for the view scale, as log2 of linear magnification.
    pub min_log_scale: f64,

    /// Upper bound for the view scale, as log2 of linear magnification.
    pub max_log_scale: f64,

    /// Width of the prefetch ring probed outside the viewport.
    pub lookahead_ring: i32,

    /// How many levels finer the placeholder search may recurse.
    pub placeholder_depth: u32,

    /// Animated transition settings.
    pub animation: AnimationConfig,
}

impl Default for AtlasConfig {
    fn default() -> Self {
        Self {
            tile_px: DEFAULT_TILE_PX,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            min_log_scale: -5.0,
            max_log_scale: 10.0,
            lookahead_ring: DEFAULT_LOOKAHEAD_RING,
            placeholder_depth: DEFAULT_PLACEHOLDER_DEPTH,
            animation: AnimationConfig::default(),
        }
    }
}

impl AtlasConfig {
    /// Set the cache capacity.
    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    /// Set the scale bounds (log2 of linear magnification).
    pub fn with_scale_bounds(mut self, min_log_scale: f64, max_log_scale: f64) -> Self {
        self.min_log_scale = min_log_scale;
        self.max_log_scale = max_log_scale;
        self
    }

    /// Set the tile edge length in pixels.
    pub fn with_tile_px(mut self, tile_px: u32) -> Self {
        self.tile_px = tile_px;
        self
    }

    /// The coarsest discrete zoom level the placeholder search may visit.
    pub fn min_level(&self) -> i32 {
        self.min_log_scale.round() as i32
    }

    /// The finest discrete zoom level.
    pub fn max_level(&self) -> i32 {
        self.max_log_scale.round() as i32
    }

    /// Validate the configuration, returning a normalized copy.
    ///
    /// Inverted scale bounds are swapped rather than rejected; a zero
    /// capacity or tile size is a hard error.
    pub fn normalize(mut self) -> Result<Self, ConfigError> {
        if self.cache_capacity == 0 {
            return Err(ConfigError::InvalidCapacity);
        }
        if self.tile_px == 0 {
            return Err(ConfigError::InvalidTileSize(self.tile_px));
        }
        if self.animation.duration.is_zero() {
            return Err(ConfigError::InvalidDuration);
        }
        if self.min_log_scale > self.max_log_scale {
            std::mem::swap(&mut self.min_log_scale, &mut self.max_log_scale);
        }
        Ok(self)
    }
}
