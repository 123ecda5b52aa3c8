//! Integration tests for the compositing pipeline.
//!
//! These tests verify the complete flow across components:
//! - compose → scheduler → cache → compose (placeholder convergence)
//! - pan coherence: already-materialized tiles survive a scroll
//! - identity invalidation superseding queued work
//! - animated transition ticks driving compositing
//!
//! Run with: `cargo test --test compositor_integration`

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use hexatlas::compositor::FocusTarget;
use hexatlas::coord::{PixelPoint, Viewport, WorldPoint, WorldRect};
use hexatlas::view::ViewState;
use hexatlas::{
    AtlasConfig, ChartStyle, Compositor, Fingerprint, RenderScheduler, Renderer, TickOutcome,
    TileCache, TileSurface,
};

// ============================================================================
// Helper Functions
// ============================================================================

const TILE: u32 = 64;

/// Renderer that fills tiles with a flat color and counts invocations.
struct CountingRenderer {
    calls: AtomicUsize,
}

impl CountingRenderer {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

impl Renderer for CountingRenderer {
    fn render(
        &self,
        _world: WorldRect,
        _linear_scale: f64,
        _fingerprint: Fingerprint,
        surface: &mut TileSurface,
    ) -> Result<(), hexatlas::RenderError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        surface
            .pixmap_mut()
            .fill(tiny_skia::Color::from_rgba8(40, 60, 80, 255));
        Ok(())
    }
}

struct Pipeline {
    compositor: Compositor,
    scheduler: RenderScheduler,
    view: ViewState,
    renderer: Arc<CountingRenderer>,
}

/// An 800x600 view at log scale 5 over a 64px tile grid.
fn pipeline() -> Pipeline {
    let config = AtlasConfig::default()
        .with_tile_px(TILE)
        .with_cache_capacity(1024)
        .normalize()
        .unwrap();
    let renderer = Arc::new(CountingRenderer::new());
    let scheduler = RenderScheduler::new(
        TileCache::shared(config.cache_capacity).unwrap(),
        Arc::clone(&renderer) as Arc<dyn Renderer>,
        TILE,
    );
    let view = ViewState::new(
        &config,
        WorldPoint::new(0.0, 0.0),
        5.0,
        Viewport::new(800, 600),
    )
    .unwrap();
    Pipeline {
        compositor: Compositor::new(&config).unwrap(),
        scheduler,
        view,
        renderer,
    }
}

fn drain(scheduler: &mut RenderScheduler) {
    while scheduler.tick() != TickOutcome::Idle {}
}

// ============================================================================
// Placeholder Convergence
// ============================================================================

#[test]
fn test_cold_start_converges_to_fully_materialized_frame() {
    let mut p = pipeline();

    let first = p
        .compositor
        .compose(&p.view, &mut p.scheduler, FocusTarget::ViewCenter);
    assert!(first.is_pending());
    assert!(first.commands.iter().all(|c| c.placeholder));

    drain(&mut p.scheduler);

    let second = p
        .compositor
        .compose(&p.view, &mut p.scheduler, FocusTarget::ViewCenter);
    assert!(!second.is_pending());
    assert!(second.commands.iter().all(|c| !c.placeholder));
    assert_eq!(second.commands.len(), first.missing);
}

#[test]
fn test_each_visible_tile_renders_exactly_once() {
    let mut p = pipeline();

    // Two passes before any materialization must not double-queue.
    p.compositor
        .compose(&p.view, &mut p.scheduler, FocusTarget::ViewCenter);
    p.compositor
        .compose(&p.view, &mut p.scheduler, FocusTarget::ViewCenter);
    let level = p.compositor.level_for(p.view.log_scale());
    let visible = p.compositor.visible_range(&p.view, level).len();
    assert_eq!(p.scheduler.pending(), visible);

    drain(&mut p.scheduler);
    assert_eq!(p.renderer.calls(), visible);
}

// ============================================================================
// Pan Coherence
// ============================================================================

#[test]
fn test_pan_by_one_tile_width_reuses_overlap() {
    let mut p = pipeline();
    p.compositor
        .compose(&p.view, &mut p.scheduler, FocusTarget::ViewCenter);
    drain(&mut p.scheduler);
    let before = p.renderer.calls();

    // One tile width to the right: exactly one new column of tiles.
    let level = p.compositor.level_for(p.view.log_scale());
    let range = p.compositor.visible_range(&p.view, level);
    let rows = (range.y1 - range.y0 + 1) as usize;
    p.view.pan(PixelPoint::new(TILE as f64, 0.0));

    let frame = p
        .compositor
        .compose(&p.view, &mut p.scheduler, FocusTarget::ViewCenter);
    assert_eq!(frame.missing, rows);

    drain(&mut p.scheduler);
    assert_eq!(p.renderer.calls(), before + rows);

    // The overlap drew from cache, not placeholders.
    let real = frame.commands.iter().filter(|c| !c.placeholder).count();
    assert_eq!(real, range.len() - rows);
}

#[test]
fn test_pan_one_tile_width_at_256px_shifts_range_by_one() {
    // Reference geometry: 800x600 viewport, 256 px tiles, level 5.
    let config = AtlasConfig::default().normalize().unwrap();
    let renderer = Arc::new(CountingRenderer::new());
    let mut scheduler = RenderScheduler::new(
        TileCache::shared(config.cache_capacity).unwrap(),
        Arc::clone(&renderer) as Arc<dyn Renderer>,
        config.tile_px,
    );
    let mut compositor = Compositor::new(&config).unwrap();
    let mut view = ViewState::new(
        &config,
        WorldPoint::new(0.0, 0.0),
        5.0,
        Viewport::new(800, 600),
    )
    .unwrap();

    compositor.compose(&view, &mut scheduler, FocusTarget::ViewCenter);
    drain(&mut scheduler);
    let before = compositor.visible_range(&view, 5);

    view.pan(PixelPoint::new(256.0, 0.0));
    let after = compositor.visible_range(&view, 5);
    assert_eq!(after.x0, before.x0 + 1);
    assert_eq!(after.x1, before.x1 + 1);
    assert_eq!(after.y0, before.y0);
    assert_eq!(after.y1, before.y1);

    // Everything except the fresh column is still a cache hit.
    let frame = compositor.compose(&view, &mut scheduler, FocusTarget::ViewCenter);
    assert_eq!(frame.missing, (after.y1 - after.y0 + 1) as usize);
}

#[test]
fn test_cache_clear_re_enqueues_without_stale_content() {
    let mut p = pipeline();
    p.compositor
        .compose(&p.view, &mut p.scheduler, FocusTarget::ViewCenter);
    drain(&mut p.scheduler);

    p.scheduler.cache().lock().clear();

    let frame = p
        .compositor
        .compose(&p.view, &mut p.scheduler, FocusTarget::ViewCenter);
    assert!(frame.is_pending());
    // Nothing cached survives to masquerade as content.
    assert!(frame.commands.iter().all(|c| c.placeholder));
    assert!(p.scheduler.pending() >= frame.missing);
}

#[test]
fn test_pan_focus_prioritizes_leading_edge() {
    let mut p = pipeline();
    p.compositor
        .compose(&p.view, &mut p.scheduler, FocusTarget::ViewCenter);
    drain(&mut p.scheduler);

    p.view.pan(PixelPoint::new(TILE as f64, 0.0));
    p.compositor.compose(
        &p.view,
        &mut p.scheduler,
        FocusTarget::PanEdge { dx: 1.0, dy: 0.0 },
    );

    // The first materialized tile sits in the new rightmost column.
    let level = p.compositor.level_for(p.view.log_scale());
    let range = p.compositor.visible_range(&p.view, level);
    match p.scheduler.tick() {
        TickOutcome::Rendered(key) => assert_eq!(key.x, range.x1),
        other => panic!("expected a render, got {other:?}"),
    }
}

// ============================================================================
// Identity Invalidation
// ============================================================================

#[test]
fn test_style_switch_supersedes_and_rerenders() {
    let mut p = pipeline();
    p.compositor
        .compose(&p.view, &mut p.scheduler, FocusTarget::ViewCenter);
    drain(&mut p.scheduler);
    let poster_calls = p.renderer.calls();

    p.compositor.set_style(ChartStyle::Print, &mut p.scheduler);
    let frame = p
        .compositor
        .compose(&p.view, &mut p.scheduler, FocusTarget::ViewCenter);
    assert!(frame.is_pending());

    drain(&mut p.scheduler);
    assert_eq!(p.renderer.calls(), poster_calls * 2);

    // Switching back reuses the still-cached poster tiles.
    p.compositor.set_style(ChartStyle::Poster, &mut p.scheduler);
    let frame = p
        .compositor
        .compose(&p.view, &mut p.scheduler, FocusTarget::ViewCenter);
    assert!(!frame.is_pending());
    assert_eq!(p.renderer.calls(), poster_calls * 2);
}

#[test]
fn test_zoom_level_step_shows_scaled_ancestors_not_checkerboard() {
    let mut p = pipeline();
    p.compositor
        .compose(&p.view, &mut p.scheduler, FocusTarget::ViewCenter);
    drain(&mut p.scheduler);

    // One level finer: nothing cached at level 6, but every visible tile
    // has a cached parent to stretch.
    p.view
        .set_view(p.view.center(), 6.0, p.view.viewport(), None);
    let frame = p
        .compositor
        .compose(&p.view, &mut p.scheduler, FocusTarget::ViewCenter);

    assert!(frame.is_pending());
    assert!(frame.commands.iter().all(|c| c.placeholder));
    // Each miss resolved to a single coarser cover piece.
    assert_eq!(frame.commands.len(), frame.missing);
}

// ============================================================================
// Animated Transitions
// ============================================================================

#[test]
fn test_transition_ticks_drive_fresh_compositing() {
    let mut p = pipeline();
    let start = p.view.center();
    p.view.transition_to(WorldPoint::new(start.x + 3.0, start.y), 5.0, false);
    assert!(p.view.is_animating());

    let change = p.view.tick_transition(Instant::now() + Duration::from_millis(125));
    assert!(change.any());
    let mid = p.view.center();
    assert!(mid.x > start.x && mid.x < start.x + 3.0);

    // Compositing during the transition works off the interpolated center.
    let frame = p
        .compositor
        .compose(&p.view, &mut p.scheduler, FocusTarget::ViewCenter);
    assert!(!frame.commands.is_empty());

    let change = p.view.tick_transition(Instant::now() + Duration::from_secs(1));
    assert!(change.any());
    assert!(!p.view.is_animating());
    assert!((p.view.center().x - (start.x + 3.0)).abs() < 1e-9);
}

#[test]
fn test_manual_pan_during_transition_takes_over() {
    let mut p = pipeline();
    let start = p.view.center();
    p.view.transition_to(WorldPoint::new(start.x + 3.0, start.y), 5.0, false);

    p.view.pan(PixelPoint::new(0.0, 50.0));
    assert!(!p.view.is_animating());

    // Later ticks are inert; the drag position stands.
    let center = p.view.center();
    let change = p.view.tick_transition(Instant::now() + Duration::from_secs(1));
    assert!(!change.any());
    assert_eq!(p.view.center(), center);
}
