use std::time::{Duration, Instant};

use crate::common::config::AnimationEasing;
use crate::model::WindowId;
use crate::sys::geometry::{FRect, Rect, Round};

/// A window sliding into its snap target. Advanced by the engine tick.
#[derive(Debug, Clone)]
pub struct SnapAnimation {
    window: WindowId,
    from: Rect,
    to: Rect,
    start: Instant,
    duration: Duration,
    easing: AnimationEasing,
}

impl SnapAnimation {
    pub fn new(
        window: WindowId,
        from: Rect,
        to: Rect,
        start: Instant,
        duration: f64,
        easing: AnimationEasing,
    ) -> Self {
        SnapAnimation {
            window,
            from,
            to,
            start,
            // Out-of-range durations (NaN, infinite, huge) jump straight to the target.
            duration: Duration::try_from_secs_f64(duration.max(0.0)).unwrap_or(Duration::ZERO),
            easing,
        }
    }

    #[inline]
    pub fn window(&self) -> WindowId { self.window }

    #[inline]
    pub fn target(&self) -> Rect { self.to }

    /// Frame at `now` and whether the animation has finished.
    pub fn frame_at(&self, now: Instant) -> (Rect, bool) {
        let elapsed = now.saturating_duration_since(self.start);
        if self.duration.is_zero() || elapsed >= self.duration {
            return (self.to, true);
        }
        let t = elapsed.as_secs_f64() / self.duration.as_secs_f64();
        (get_frame(self.from, self.to, self.easing.apply(t)), false)
    }
}

fn get_frame(a: Rect, b: Rect, s: f64) -> Rect {
    let (a, b) = (FRect::from(a), FRect::from(b));
    FRect {
        x: blend(a.x, b.x, s),
        y: blend(a.y, b.y, s),
        width: blend(a.width, b.width, s),
        height: blend(a.height, b.height, s),
    }
    .round()
}

fn blend(a: f64, b: f64, s: f64) -> f64 { (1.0 - s) * a + s * b }
