//! View state: the clamped, optionally animated camera over world space.
//!
//! [`ViewState`] owns the current center, scale and viewport, rebuilding its
//! [`Transform`] atomically on every mutation so observers never see a
//! half-applied view. Scale is stored as log2 of linear magnification; all
//! mutations clamp scale and center into configured bounds before commit,
//! so no error path can leave the view inconsistent.

mod animation;
mod persist;

pub use animation::{ease, run_transition_pump, TransitionKind, ViewTransition};
pub use persist::{RestoreError, SavedView, VIEW_FORMAT};

use std::time::Instant;

use crate::config::{AnimationConfig, AtlasConfig};
use crate::coord::{
    CoordError, PixelPoint, PixelRect, Transform, Viewport, WorldPoint, WorldRect, GRID_SCALE_X,
    GRID_SCALE_Y,
};

/// Optional pan limits, each axis independently optional.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PanBounds {
    /// Inclusive (min, max) for the center's world X.
    pub x: Option<(f64, f64)>,
    /// Inclusive (min, max) for the center's world Y.
    pub y: Option<(f64, f64)>,
}

/// Which parts of the view a mutation actually changed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ViewChange {
    pub center: bool,
    pub scale: bool,
}

impl ViewChange {
    pub fn any(&self) -> bool {
        self.center || self.scale
    }
}

/// The camera over world space.
pub struct ViewState {
    min_log_scale: f64,
    max_log_scale: f64,
    animation: AnimationConfig,

    center: WorldPoint,
    log_scale: f64,
    viewport: Viewport,
    clip: Option<PixelRect>,
    bounds: PanBounds,
    transform: Transform,
    visible: bool,
    transition: Option<ViewTransition>,
}

impl ViewState {
    /// Create a view over the given viewport.
    ///
    /// The initial center and scale are clamped like any later mutation.
    ///
    /// # Errors
    ///
    /// Returns [`CoordError::DegenerateViewport`] for a zero-sized viewport;
    /// there is no defined transform to start from.
    pub fn new(
        config: &AtlasConfig,
        center: WorldPoint,
        log_scale: f64,
        viewport: Viewport,
    ) -> Result<Self, CoordError> {
        let log_scale = log_scale.clamp(config.min_log_scale, config.max_log_scale);
        let transform = Transform::new(center, 2.0_f64.powf(log_scale), viewport)?;
        Ok(Self {
            min_log_scale: config.min_log_scale,
            max_log_scale: config.max_log_scale,
            animation: config.animation.clone(),
            center,
            log_scale,
            viewport,
            clip: None,
            bounds: PanBounds::default(),
            transform,
            visible: true,
            transition: None,
        })
    }

    pub fn center(&self) -> WorldPoint {
        self.center
    }

    /// Scale as log2 of linear magnification.
    pub fn log_scale(&self) -> f64 {
        self.log_scale
    }

    /// Linear magnification (pixels per world unit on the Y axis).
    pub fn linear_scale(&self) -> f64 {
        2.0_f64.powf(self.log_scale)
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn clip(&self) -> Option<PixelRect> {
        self.clip
    }

    /// The current pixel↔world conversion. Rebuilt on every mutation.
    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Mark the view (in)visible; invisible views never animate.
    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    /// Restrict how far the center may pan.
    ///
    /// The current center is re-clamped immediately so the invariant holds
    /// after the mutation, not just after the next one.
    pub fn set_pan_bounds(&mut self, bounds: PanBounds) -> ViewChange {
        self.bounds = bounds;
        self.apply(self.center, self.log_scale, self.viewport, self.clip)
    }

    /// True while an animated transition is in flight.
    pub fn is_animating(&self) -> bool {
        self.transition.is_some()
    }

    /// Set the view directly.
    ///
    /// Cancels any in-flight transition, clamps scale into bounds and center
    /// into the optional pan bounds, and reports what actually changed.
    /// Out-of-range requests land on the boundary; this never fails.
    ///
    /// A degenerate (zero) viewport is ignored and the previous viewport
    /// kept, since no transform is defined for it.
    pub fn set_view(
        &mut self,
        center: WorldPoint,
        log_scale: f64,
        viewport: Viewport,
        clip: Option<PixelRect>,
    ) -> ViewChange {
        self.transition = None;
        let viewport = if viewport.is_degenerate() {
            self.viewport
        } else {
            viewport
        };
        self.apply(center, log_scale, viewport, clip)
    }

    /// Pan by a pixel delta. Cancels any in-flight transition.
    pub fn pan(&mut self, delta: PixelPoint) -> ViewChange {
        let scale = self.linear_scale();
        let center = WorldPoint::new(
            self.center.x + delta.x / (scale * GRID_SCALE_X),
            self.center.y + delta.y / (scale * GRID_SCALE_Y),
        );
        self.set_view(center, self.log_scale, self.viewport, self.clip)
    }

    /// Zoom by `delta_log` keeping the world point under `pointer` fixed.
    ///
    /// Cancels any in-flight transition.
    pub fn zoom_at(&mut self, pointer: PixelPoint, delta_log: f64) -> ViewChange {
        let anchor = self.transform.pixel_to_world(pointer);
        let log_scale = (self.log_scale + delta_log).clamp(self.min_log_scale, self.max_log_scale);
        let scale = 2.0_f64.powf(log_scale);
        let half_w = self.viewport.width as f64 / 2.0;
        let half_h = self.viewport.height as f64 / 2.0;
        let center = WorldPoint::new(
            anchor.x - (pointer.x - half_w) / (scale * GRID_SCALE_X),
            anchor.y - (pointer.y - half_h) / (scale * GRID_SCALE_Y),
        );
        self.set_view(center, log_scale, self.viewport, self.clip)
    }

    /// Move the view to frame `region`, animated when close enough.
    pub fn center_on(&mut self, region: WorldRect) -> ViewChange {
        let sx = self.viewport.width as f64 / (region.width() * GRID_SCALE_X);
        let sy = self.viewport.height as f64 / (region.height() * GRID_SCALE_Y);
        let log_scale = sx.min(sy).log2();
        self.transition_to(region.center(), log_scale, false)
    }

    /// Move the view to (center, log_scale).
    ///
    /// Animates when `immediate` is false, the view is visible, animation is
    /// enabled, and the target center is within the configured scale-relative
    /// distance; otherwise applies synchronously. Starting a transition
    /// cancels any in-flight one; there is no queueing.
    pub fn transition_to(
        &mut self,
        center: WorldPoint,
        log_scale: f64,
        immediate: bool,
    ) -> ViewChange {
        let log_scale = log_scale.clamp(self.min_log_scale, self.max_log_scale);
        if immediate || !self.should_animate(center) {
            return self.set_view(center, log_scale, self.viewport, self.clip);
        }
        self.transition = Some(ViewTransition::new(
            self.center,
            self.log_scale,
            self.clamp_center(center, log_scale),
            log_scale,
            self.animation.duration,
            Instant::now(),
        ));
        ViewChange::default()
    }

    /// Advance an in-flight transition to `now`.
    ///
    /// Returns what changed; finishing leaves the view exactly on the
    /// target. A no-op when nothing is animating.
    pub fn tick_transition(&mut self, now: Instant) -> ViewChange {
        let Some(transition) = self.transition else {
            return ViewChange::default();
        };
        let (center, log_scale, finished) = transition.sample(now);
        if finished {
            self.transition = None;
        }
        self.apply(center, log_scale, self.viewport, self.clip)
    }

    fn should_animate(&self, target: WorldPoint) -> bool {
        if !self.visible || !self.animation.enabled {
            return false;
        }
        let scale = self.linear_scale();
        let dx = (target.x - self.center.x) * scale * GRID_SCALE_X;
        let dy = (target.y - self.center.y) * scale * GRID_SCALE_Y;
        let distance_px = (dx * dx + dy * dy).sqrt();
        distance_px <= self.animation.max_pan_viewports * self.viewport.diagonal()
    }

    fn clamp_center(&self, center: WorldPoint, _log_scale: f64) -> WorldPoint {
        let mut c = center;
        if let Some((min, max)) = self.bounds.x {
            c.x = c.x.clamp(min, max);
        }
        if let Some((min, max)) = self.bounds.y {
            c.y = c.y.clamp(min, max);
        }
        c
    }

    /// Clamp and commit; the only place the transform is rebuilt.
    fn apply(
        &mut self,
        center: WorldPoint,
        log_scale: f64,
        viewport: Viewport,
        clip: Option<PixelRect>,
    ) -> ViewChange {
        let log_scale = log_scale.clamp(self.min_log_scale, self.max_log_scale);
        let center = self.clamp_center(center, log_scale);

        let change = ViewChange {
            center: center != self.center,
            scale: log_scale != self.log_scale,
        };

        // Transform::new only fails for degenerate viewports, which callers
        // filtered, and non-finite scales, which clamping rules out.
        if let Ok(transform) = Transform::new(center, 2.0_f64.powf(log_scale), viewport) {
            self.center = center;
            self.log_scale = log_scale;
            self.viewport = viewport;
            self.clip = clip;
            self.transform = transform;
        }
        change
    }
}

impl std::fmt::Debug for ViewState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewState")
            .field("center", &self.center)
            .field("log_scale", &self.log_scale)
            .field("viewport", &self.viewport)
            .field("animating", &self.is_animating())
            .finish()
    }
}
