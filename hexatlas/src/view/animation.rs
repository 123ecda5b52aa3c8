//! Animated view transitions.
//!
//! A transition blends an acceleration and a deceleration phase; the split
//! between the two depends on whether the move is a pure pan, a zoom-in or
//! a zoom-out. Zooming in accelerates briefly and decelerates long so the
//! view feels responsive, then settles. Durations are fixed; at most one
//! transition exists at a time and replacing or cancelling it is a single
//! field write on the view state.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::coord::WorldPoint;
use crate::view::ViewState;

/// What kind of move a transition performs; decides the easing split.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransitionKind {
    Pan,
    ZoomIn,
    ZoomOut,
}

impl TransitionKind {
    /// Classify by the change in log scale.
    pub fn classify(from_log: f64, to_log: f64) -> Self {
        let delta = to_log - from_log;
        if delta.abs() < 1e-9 {
            TransitionKind::Pan
        } else if delta > 0.0 {
            TransitionKind::ZoomIn
        } else {
            TransitionKind::ZoomOut
        }
    }

    /// Fraction of the duration spent accelerating.
    fn accel_fraction(&self) -> f64 {
        match self {
            TransitionKind::Pan => 0.5,
            TransitionKind::ZoomIn => 0.25,
            TransitionKind::ZoomOut => 0.65,
        }
    }
}

/// Asymmetric ease: accelerate over `accel`, decelerate over the rest.
///
/// Piecewise-quadratic position curve of a triangular velocity profile;
/// continuous at the junction, with `ease(0) == 0` and `ease(1) == 1`.
pub fn ease(t: f64, accel: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    let a = accel.clamp(1e-6, 1.0 - 1e-6);
    if t <= a {
        t * t / a
    } else {
        1.0 - (1.0 - t) * (1.0 - t) / (1.0 - a)
    }
}

/// One in-flight animated transition.
#[derive(Clone, Copy, Debug)]
pub struct ViewTransition {
    from_center: WorldPoint,
    from_log: f64,
    to_center: WorldPoint,
    to_log: f64,
    duration: Duration,
    started: Instant,
    kind: TransitionKind,
}

impl ViewTransition {
    pub fn new(
        from_center: WorldPoint,
        from_log: f64,
        to_center: WorldPoint,
        to_log: f64,
        duration: Duration,
        started: Instant,
    ) -> Self {
        Self {
            from_center,
            from_log,
            to_center,
            to_log,
            duration,
            started,
            kind: TransitionKind::classify(from_log, to_log),
        }
    }

    pub fn kind(&self) -> TransitionKind {
        self.kind
    }

    /// Sample the transition at `now`.
    ///
    /// Returns the interpolated (center, log_scale) and whether the
    /// transition has finished; the final sample is exactly the target.
    pub fn sample(&self, now: Instant) -> (WorldPoint, f64, bool) {
        let elapsed = now.saturating_duration_since(self.started);
        if elapsed >= self.duration {
            return (self.to_center, self.to_log, true);
        }
        let t = elapsed.as_secs_f64() / self.duration.as_secs_f64();
        let s = ease(t, self.kind.accel_fraction());
        let center = WorldPoint::new(
            self.from_center.x + (self.to_center.x - self.from_center.x) * s,
            self.from_center.y + (self.to_center.y - self.from_center.y) * s,
        );
        let log = self.from_log + (self.to_log - self.from_log) * s;
        (center, log, false)
    }
}

/// Advance a shared view's transition on a fixed-interval timer.
///
/// Runs until cancelled; each tick is atomic under the view lock, so a
/// cancellation or a direct interaction between ticks always observes a
/// consistent view. Returns the number of ticks that changed the view.
pub async fn run_transition_pump(
    view: Arc<Mutex<ViewState>>,
    period: Duration,
    shutdown: CancellationToken,
) -> u64 {
    let mut interval = tokio::time::interval(period);
    let mut changed_ticks = 0u64;
    loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => break,

            _ = interval.tick() => {
                if view.lock().tick_transition(Instant::now()).any() {
                    changed_ticks += 1;
                }
            }
        }
    }
    changed_ticks
}
