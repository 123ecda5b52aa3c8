//! Frame assembly.
//!
//! Each compositing pass maps the current view onto a tile range at the
//! rounded zoom level, pulls cached tiles into draw commands, substitutes
//! placeholder pieces for misses (enqueueing the real tile with the
//! scheduler), and finally lets overlays append their own commands. The pass
//! produces a [`Frame`] of backend-agnostic draw commands; it never blocks
//! on rendering.
//!
//! Between level steps the cached bitmaps are shown scaled by the fractional
//! zoom factor, with smoothing requested whenever that factor is not 1.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::AtlasConfig;
use crate::coord::{PixelPoint, PixelRect};
use crate::placeholder::PlaceholderResolver;
use crate::scheduler::RenderScheduler;
use crate::tile::{ChartStyle, Fingerprint, RenderOptions, TileKey, TileRange, TileSurface};
use crate::view::ViewState;

/// Where the scheduler should concentrate first.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum FocusTarget {
    /// The view center. Default when the user is not interacting.
    #[default]
    ViewCenter,
    /// The tile under a hovering pointer (viewport pixels).
    Pointer(PixelPoint),
    /// The viewport edge the view is moving towards; `(dx, dy)` is the pan
    /// direction in pixel space, not necessarily normalized.
    PanEdge { dx: f64, dy: f64 },
}

/// One blit for the drawing backend.
#[derive(Clone, Debug)]
pub struct DrawCommand {
    pub surface: Arc<TileSurface>,
    /// Source region in surface pixels.
    pub src: PixelRect,
    /// Destination region in viewport pixels.
    pub dest: PixelRect,
    /// Request bilinear filtering (fractional zoom or placeholder scaling).
    pub smoothing: bool,
    /// Substitute imagery; the real tile is queued.
    pub placeholder: bool,
}

/// Output of one compositing pass.
#[derive(Clone, Debug)]
pub struct Frame {
    pub commands: Vec<DrawCommand>,
    /// Clip rectangle for every command, in viewport pixels.
    pub clip: Option<PixelRect>,
    /// Zoom level the pass composited at.
    pub level: i32,
    /// Visible tiles that were not cached.
    pub missing: usize,
}

impl Frame {
    fn empty() -> Self {
        Self {
            commands: Vec::new(),
            clip: None,
            level: 0,
            missing: 0,
        }
    }

    /// True while any visible tile is still showing substitute imagery.
    pub fn is_pending(&self) -> bool {
        self.missing > 0
    }
}

/// Decoration drawn on top of the tile layer (routes, selection, debug
/// grids). Overlays append commands to the frame; a failing overlay is
/// skipped for the pass and never aborts compositing.
pub trait Overlay: Send + Sync {
    fn name(&self) -> &str;

    fn draw(&self, view: &ViewState, frame: &mut Frame) -> Result<(), OverlayError>;
}

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct OverlayError(pub String);

/// Assembles frames from the cache, scheduler and placeholder resolver.
pub struct Compositor {
    resolver: PlaceholderResolver,
    overlays: Vec<Box<dyn Overlay>>,
    tile_px: u32,
    min_level: i32,
    max_level: i32,
    lookahead_ring: i32,
    fingerprint: Fingerprint,
    last_level: Option<i32>,
}

impl Compositor {
    pub fn new(config: &AtlasConfig) -> Option<Self> {
        let resolver = PlaceholderResolver::new(
            config.tile_px,
            config.min_level(),
            config.max_level(),
            config.placeholder_depth,
        )?;
        Some(Self {
            resolver,
            overlays: Vec::new(),
            tile_px: config.tile_px,
            min_level: config.min_level(),
            max_level: config.max_level(),
            lookahead_ring: config.lookahead_ring,
            fingerprint: Fingerprint::default(),
            last_level: None,
        })
    }

    pub fn add_overlay(&mut self, overlay: Box<dyn Overlay>) {
        self.overlays.push(overlay);
    }

    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }

    /// Switch the visual style. Queued work for the old style is superseded.
    pub fn set_style(&mut self, style: ChartStyle, scheduler: &mut RenderScheduler) {
        if self.fingerprint.style != style {
            self.fingerprint.style = style;
            scheduler.clear();
        }
    }

    /// Toggle render option flags. Queued work for the old flags is
    /// superseded.
    pub fn set_options(&mut self, options: RenderOptions, scheduler: &mut RenderScheduler) {
        if self.fingerprint.options != options {
            self.fingerprint.options = options;
            scheduler.clear();
        }
    }

    /// Adopt a new content epoch, typically from a
    /// [`ContentSource`](crate::render::ContentSource) change notification.
    /// Cached tiles of older epochs stop matching and age out of the cache;
    /// queued work for them is superseded.
    pub fn set_content_epoch(&mut self, epoch: u64, scheduler: &mut RenderScheduler) {
        if self.fingerprint.content_epoch != epoch {
            self.fingerprint.content_epoch = epoch;
            scheduler.clear();
        }
    }

    /// The zoom level a given log2 scale composites at.
    pub fn level_for(&self, log_scale: f64) -> i32 {
        (log_scale.round() as i32).clamp(self.min_level, self.max_level)
    }

    /// The tile range covering the view's visible world at `level`.
    pub fn visible_range(&self, view: &ViewState, level: i32) -> TileRange {
        let visible = view.transform().visible_world();
        let (w, h) = TileKey::world_extent(level, self.tile_px);
        TileRange {
            x0: (visible.min.x / w).floor() as i32,
            y0: (visible.min.y / h).floor() as i32,
            x1: (visible.max.x / w).ceil() as i32 - 1,
            y1: (visible.max.y / h).ceil() as i32 - 1,
            level,
            fingerprint: self.fingerprint,
        }
    }

    /// Run one compositing pass.
    ///
    /// Hidden views produce an empty frame and queue nothing. A level step
    /// since the previous pass supersedes the queued work of the old level
    /// before the new range is walked.
    pub fn compose(
        &mut self,
        view: &ViewState,
        scheduler: &mut RenderScheduler,
        focus: FocusTarget,
    ) -> Frame {
        if !view.is_visible() {
            return Frame::empty();
        }

        let level = self.level_for(view.log_scale());
        if self.last_level.is_some_and(|last| last != level) {
            debug!(level, "Zoom level changed; superseding queued work");
            scheduler.clear();
        }
        self.last_level = Some(level);

        let frac = view.log_scale() - level as f64;
        let smoothing = frac.abs() > 1e-9;
        let range = self.visible_range(view, level);
        let viewport = view.viewport();
        let full_view = PixelRect::new(
            0.0,
            0.0,
            viewport.width as f64,
            viewport.height as f64,
        );
        let clip = match view.clip() {
            Some(c) => c.intersect(&full_view),
            None => Some(full_view),
        };

        let mut frame = Frame {
            commands: Vec::new(),
            clip,
            level,
            missing: 0,
        };
        let Some(clip) = clip else {
            return frame;
        };

        let tile_src = PixelRect::new(0.0, 0.0, self.tile_px as f64, self.tile_px as f64);
        let cache = Arc::clone(scheduler.cache());
        let mut cache = cache.lock();
        for key in range.keys() {
            let dest = self.screen_rect(view, &key);
            if dest.intersect(&clip).is_none() {
                continue;
            }
            if let Some(surface) = cache.get(&key) {
                frame.commands.push(DrawCommand {
                    surface,
                    src: tile_src,
                    dest,
                    smoothing,
                    placeholder: false,
                });
            } else {
                frame.missing += 1;
                scheduler.enqueue(key);
                for piece in self.resolver.resolve(&key, &cache) {
                    frame.commands.push(DrawCommand {
                        surface: piece.surface,
                        src: piece.src,
                        dest: map_local_rect(piece.dest, self.tile_px, dest),
                        smoothing: true,
                        placeholder: true,
                    });
                }
            }
        }
        drop(cache);

        let (fx, fy) = self.focus_tile(view, &range, level, focus);
        scheduler.set_focus(fx, fy);

        // Lookahead only once the visible set is fully materialized.
        if frame.missing == 0 && scheduler.is_idle() && self.lookahead_ring > 0 {
            scheduler.prefetch_ring(&range, self.lookahead_ring);
        }

        for overlay in &self.overlays {
            if let Err(e) = overlay.draw(view, &mut frame) {
                warn!(overlay = overlay.name(), error = %e, "Overlay draw failed; skipping");
            }
        }

        frame
    }

    /// On-screen rectangle of a tile under the current transform.
    fn screen_rect(&self, view: &ViewState, key: &TileKey) -> PixelRect {
        let world = key.world_rect(self.tile_px);
        let min = view.transform().world_to_pixel(world.min);
        let max = view.transform().world_to_pixel(world.max);
        PixelRect::new(min.x, min.y, max.x - min.x, max.y - min.y)
    }

    fn focus_tile(
        &self,
        view: &ViewState,
        range: &TileRange,
        level: i32,
        focus: FocusTarget,
    ) -> (i32, i32) {
        let pixel = match focus {
            FocusTarget::ViewCenter => return range.center_tile(),
            FocusTarget::Pointer(p) => p,
            FocusTarget::PanEdge { dx, dy } => {
                let len = (dx * dx + dy * dy).sqrt();
                if len == 0.0 {
                    return range.center_tile();
                }
                let viewport = view.viewport();
                PixelPoint::new(
                    viewport.width as f64 / 2.0 * (1.0 + dx / len),
                    viewport.height as f64 / 2.0 * (1.0 + dy / len),
                )
            }
        };
        let world = view.transform().pixel_to_world(pixel);
        let key = TileKey::containing(world, level, self.tile_px, self.fingerprint);
        (key.x, key.y)
    }
}

impl std::fmt::Debug for Compositor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compositor")
            .field("fingerprint", &self.fingerprint)
            .field("last_level", &self.last_level)
            .field("overlays", &self.overlays.len())
            .finish()
    }
}

/// Map a rect in tile-local pixels (`0..tile_px`) into the tile's on-screen
/// rectangle.
fn map_local_rect(local: PixelRect, tile_px: u32, dest: PixelRect) -> PixelRect {
    let sx = dest.width / tile_px as f64;
    let sy = dest.height / tile_px as f64;
    PixelRect::new(
        dest.x + local.x * sx,
        dest.y + local.y * sy,
        local.width * sx,
        local.height * sy,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::TileCache;
    use crate::coord::{Viewport, WorldPoint, WorldRect};
    use crate::render::{RenderError, Renderer};
    use crate::scheduler::TickOutcome;

    const TILE: u32 = 64;

    struct FillRenderer;

    impl Renderer for FillRenderer {
        fn render(
            &self,
            _world: WorldRect,
            _linear_scale: f64,
            _fingerprint: Fingerprint,
            surface: &mut TileSurface,
        ) -> Result<(), RenderError> {
            surface
                .pixmap_mut()
                .fill(tiny_skia::Color::from_rgba8(10, 20, 30, 255));
            Ok(())
        }
    }

    fn config() -> AtlasConfig {
        AtlasConfig::default()
            .with_tile_px(TILE)
            .with_cache_capacity(256)
    }

    fn setup() -> (Compositor, RenderScheduler, ViewState) {
        let config = config().normalize().unwrap();
        let compositor = Compositor::new(&config).unwrap();
        let cache = TileCache::shared(config.cache_capacity).unwrap();
        let scheduler = RenderScheduler::new(cache, Arc::new(FillRenderer), TILE);
        let view = ViewState::new(
            &config,
            WorldPoint::new(0.0, 0.0),
            5.0,
            Viewport::new(800, 600),
        )
        .unwrap();
        (compositor, scheduler, view)
    }

    #[test]
    fn test_hidden_view_composites_nothing() {
        let (mut compositor, mut scheduler, mut view) = setup();
        view.set_visible(false);

        let frame = compositor.compose(&view, &mut scheduler, FocusTarget::ViewCenter);
        assert!(frame.commands.is_empty());
        assert!(scheduler.is_idle());
    }

    #[test]
    fn test_cold_cache_yields_placeholders_and_queues_every_tile() {
        let (mut compositor, mut scheduler, view) = setup();

        let frame = compositor.compose(&view, &mut scheduler, FocusTarget::ViewCenter);
        let range = compositor.visible_range(&view, frame.level);

        assert_eq!(frame.missing, range.len());
        assert_eq!(scheduler.pending(), range.len());
        assert!(frame.is_pending());
        assert!(frame.commands.iter().all(|c| c.placeholder));
    }

    #[test]
    fn test_warm_cache_draws_real_tiles_and_prefetches() {
        let (mut compositor, mut scheduler, view) = setup();

        // Materialize the whole visible set.
        compositor.compose(&view, &mut scheduler, FocusTarget::ViewCenter);
        while scheduler.tick() != TickOutcome::Idle {}

        let frame = compositor.compose(&view, &mut scheduler, FocusTarget::ViewCenter);
        let range = compositor.visible_range(&view, frame.level);

        assert_eq!(frame.missing, 0);
        assert!(!frame.is_pending());
        assert_eq!(frame.commands.len(), range.len());
        assert!(frame.commands.iter().all(|c| !c.placeholder));
        // Lookahead ring queued once the visible set was complete.
        assert_eq!(scheduler.pending(), range.ring(1).len());
    }

    #[test]
    fn test_integer_zoom_needs_no_smoothing_fractional_does() {
        let (mut compositor, mut scheduler, mut view) = setup();
        compositor.compose(&view, &mut scheduler, FocusTarget::ViewCenter);
        while scheduler.tick() != TickOutcome::Idle {}

        let frame = compositor.compose(&view, &mut scheduler, FocusTarget::ViewCenter);
        assert!(frame
            .commands
            .iter()
            .filter(|c| !c.placeholder)
            .all(|c| !c.smoothing));

        view.set_view(view.center(), 5.3, view.viewport(), None);
        let frame = compositor.compose(&view, &mut scheduler, FocusTarget::ViewCenter);
        assert!(frame
            .commands
            .iter()
            .filter(|c| !c.placeholder)
            .all(|c| c.smoothing));
        // 2^0.3 display scaling enlarges each tile beyond its native size.
        let real = frame.commands.iter().find(|c| !c.placeholder).unwrap();
        let expected = TILE as f64 * 2.0_f64.powf(0.3);
        assert!((real.dest.width - expected).abs() < 1e-6);
    }

    #[test]
    fn test_level_change_supersedes_queued_work() {
        let (mut compositor, mut scheduler, mut view) = setup();
        compositor.compose(&view, &mut scheduler, FocusTarget::ViewCenter);
        assert!(scheduler.pending() > 0);

        view.set_view(view.center(), 7.0, view.viewport(), None);
        let frame = compositor.compose(&view, &mut scheduler, FocusTarget::ViewCenter);
        assert_eq!(frame.level, 7);
        // Only the new level's tiles remain queued.
        let range = compositor.visible_range(&view, 7);
        assert_eq!(scheduler.pending(), range.len());
        assert!(scheduler.stats().superseded > 0);
    }

    #[test]
    fn test_style_change_resets_fingerprint_and_queue() {
        let (mut compositor, mut scheduler, view) = setup();
        compositor.compose(&view, &mut scheduler, FocusTarget::ViewCenter);
        while scheduler.tick() != TickOutcome::Idle {}

        compositor.set_style(ChartStyle::Print, &mut scheduler);
        let frame = compositor.compose(&view, &mut scheduler, FocusTarget::ViewCenter);

        // Old-style tiles no longer match; everything is pending again.
        assert!(frame.is_pending());
        assert_eq!(
            compositor.fingerprint().style,
            ChartStyle::Print
        );
    }

    #[test]
    fn test_content_epoch_change_invalidates_tiles() {
        let (mut compositor, mut scheduler, view) = setup();
        compositor.compose(&view, &mut scheduler, FocusTarget::ViewCenter);
        while scheduler.tick() != TickOutcome::Idle {}

        compositor.set_content_epoch(1, &mut scheduler);
        let frame = compositor.compose(&view, &mut scheduler, FocusTarget::ViewCenter);
        assert!(frame.is_pending());
    }

    #[test]
    fn test_pointer_focus_targets_hovered_tile() {
        let (mut compositor, mut scheduler, view) = setup();
        let pointer = PixelPoint::new(10.0, 10.0);
        compositor.compose(&view, &mut scheduler, FocusTarget::Pointer(pointer));

        let world = view.transform().pixel_to_world(pointer);
        let expected = TileKey::containing(world, 5, TILE, compositor.fingerprint());
        // The hovered corner tile materializes first.
        assert_eq!(scheduler.tick(), TickOutcome::Rendered(expected));
    }

    #[test]
    fn test_clip_restricts_composited_tiles() {
        let (mut compositor, mut scheduler, mut view) = setup();
        view.set_view(
            view.center(),
            5.0,
            view.viewport(),
            Some(PixelRect::new(0.0, 0.0, 100.0, 100.0)),
        );

        let frame = compositor.compose(&view, &mut scheduler, FocusTarget::ViewCenter);
        let full_range = compositor.visible_range(&view, frame.level);
        assert!(frame.missing < full_range.len());
        for command in &frame.commands {
            assert!(command.dest.intersect(&frame.clip.unwrap()).is_some());
        }
    }

    #[test]
    fn test_failing_overlay_is_isolated() {
        struct BrokenOverlay;
        impl Overlay for BrokenOverlay {
            fn name(&self) -> &str {
                "broken"
            }
            fn draw(&self, _view: &ViewState, _frame: &mut Frame) -> Result<(), OverlayError> {
                Err(OverlayError("synthetic".into()))
            }
        }
        struct MarkerOverlay;
        impl Overlay for MarkerOverlay {
            fn name(&self) -> &str {
                "marker"
            }
            fn draw(&self, _view: &ViewState, frame: &mut Frame) -> Result<(), OverlayError> {
                frame.missing += 100;
                Ok(())
            }
        }

        let (mut compositor, mut scheduler, view) = setup();
        compositor.add_overlay(Box::new(BrokenOverlay));
        compositor.add_overlay(Box::new(MarkerOverlay));

        // The broken overlay is skipped; the later one still runs.
        let frame = compositor.compose(&view, &mut scheduler, FocusTarget::ViewCenter);
        assert!(frame.missing >= 100);
    }

    #[test]
    fn test_placeholder_pieces_land_inside_tile_rect() {
        let (mut compositor, mut scheduler, view) = setup();
        // Seed one finer child so a composite placeholder appears.
        let level = compositor.level_for(view.log_scale());
        let range = compositor.visible_range(&view, level);
        let target = TileKey::new(range.x0, range.y0, level, compositor.fingerprint());
        scheduler
            .cache()
            .lock()
            .put(target.children()[0], Arc::new(TileSurface::new(TILE).unwrap()));

        let frame = compositor.compose(&view, &mut scheduler, FocusTarget::ViewCenter);
        let tile_rect = {
            let world = target.world_rect(TILE);
            let min = view.transform().world_to_pixel(world.min);
            PixelRect::new(min.x, min.y, TILE as f64, TILE as f64)
        };
        let pieces: Vec<_> = frame
            .commands
            .iter()
            .filter(|c| c.placeholder && c.dest.intersect(&tile_rect).is_some())
            .collect();
        assert!(!pieces.is_empty());
        for piece in pieces {
            assert!(piece.dest.x >= tile_rect.x - 1e-6);
            assert!(piece.dest.y >= tile_rect.y - 1e-6);
        }
    }
}
