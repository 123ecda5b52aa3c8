//! Hexatlas - Tile cache and render scheduling for continuous hex-chart maps
//!
//! This library provides the presentation-side machinery for panning and
//! zooming over a procedurally rendered hex-grid star chart: a world/pixel
//! coordinate model, a bounded LRU tile cache, a cooperative background
//! render scheduler, placeholder synthesis for cache misses, and a
//! compositor that turns all of it into backend-agnostic draw commands.
//! Actual chart drawing stays behind the [`render::Renderer`] trait.

pub mod cache;
pub mod compositor;
pub mod config;
pub mod coord;
pub mod placeholder;
pub mod render;
pub mod scheduler;
pub mod telemetry;
pub mod tile;
pub mod view;

pub use cache::{SharedTileCache, TileCache};
pub use compositor::{Compositor, DrawCommand, FocusTarget, Frame, Overlay};
pub use config::{AtlasConfig, ConfigError};
pub use render::{ContentSource, RenderError, Renderer};
pub use scheduler::{RenderScheduler, SchedulerDaemon, TickOutcome};
pub use tile::{ChartStyle, Fingerprint, RenderOptions, TileKey, TileSurface};
pub use view::ViewState;
