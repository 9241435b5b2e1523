use std::time::{Duration, Instant};

use tracing::trace;

use super::snap::SnapZone;
use crate::model::WindowId;
use crate::sys::geometry::{Point, Rect, Size};

/// Dwell tracking for the zone under the pointer. A zone has to stay put for
/// the hover delay before its preview shows; any change starts over.
#[derive(Debug, Clone, Default)]
struct HoverState {
    zone: Option<SnapZone>,
    since: Option<Instant>,
    showing: bool,
}

/// Outcome of feeding the current zone into the hover state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneChange {
    Unchanged,
    /// Entered a different zone; the preview (if any) must be hidden.
    Entered,
    /// Left all zones; the preview (if any) must be hidden.
    Left,
}

#[derive(Debug, Clone)]
pub struct DragSession {
    window: WindowId,
    pointer_start: Point,
    geometry_start: Rect,
    /// Geometry before the drag touched anything, including an unsnap.
    origin_geometry: Rect,
    /// Normal size to restore on the first real move of a maximized or
    /// snapped window.
    unsnap: Option<Size>,
    pending: Option<Point>,
    snapping: bool,
    hover: HoverState,
}

impl DragSession {
    pub fn new(window: WindowId, pointer: Point, geometry: Rect, snapping: bool) -> Self {
        Self {
            window,
            pointer_start: pointer,
            geometry_start: geometry,
            origin_geometry: geometry,
            unsnap: None,
            pending: None,
            snapping,
            hover: HoverState::default(),
        }
    }

    pub fn with_unsnap(mut self, normal_size: Size) -> Self {
        self.unsnap = Some(normal_size);
        self
    }

    #[inline]
    pub fn window(&self) -> WindowId { self.window }

    #[inline]
    pub fn snapping(&self) -> bool { self.snapping }

    #[inline]
    pub fn origin_geometry(&self) -> Rect { self.origin_geometry }

    /// Latest pointer wins; applied on the next tick.
    pub fn queue_move(&mut self, pointer: Point) { self.pending = Some(pointer); }

    pub fn take_pending(&mut self) -> Option<Point> { self.pending.take() }

    pub fn take_unsnap(&mut self) -> Option<Size> { self.unsnap.take() }

    /// Restarts the move from `geometry`, keeping the original pointer anchor.
    pub fn rebase(&mut self, geometry: Rect) { self.geometry_start = geometry; }

    pub fn pointer_start(&self) -> Point { self.pointer_start }

    /// Start geometry translated by the pointer delta. No clamping.
    pub fn geometry_for(&self, pointer: Point) -> Rect {
        let delta = pointer.delta_from(self.pointer_start);
        self.geometry_start.offset(delta.x, delta.y)
    }

    pub fn update_zone(&mut self, zone: Option<SnapZone>, now: Instant) -> ZoneChange {
        let current = self.hover.zone.map(|z| z.kind);
        let next = zone.map(|z| z.kind);
        if current == next {
            // Area changes can move the target without changing the zone.
            self.hover.zone = zone;
            return ZoneChange::Unchanged;
        }
        trace!(window = ?self.window, from = ?current, to = ?next, "snap zone changed");
        self.hover = HoverState {
            zone,
            since: zone.map(|_| now),
            showing: false,
        };
        if zone.is_some() { ZoneChange::Entered } else { ZoneChange::Left }
    }

    /// Shows the preview once the zone has been held for `delay`. Returns the
    /// zone the first time it becomes visible.
    pub fn poll_preview(&mut self, now: Instant, delay: Duration) -> Option<SnapZone> {
        if self.hover.showing {
            return None;
        }
        let (zone, since) = (self.hover.zone?, self.hover.since?);
        if now.saturating_duration_since(since) >= delay {
            self.hover.showing = true;
            return Some(zone);
        }
        None
    }

    /// The zone whose preview is currently visible.
    pub fn preview(&self) -> Option<SnapZone> {
        if self.hover.showing { self.hover.zone } else { None }
    }
}

/// Geometry for a maximized or snapped window torn off by a drag: the normal
/// size, placed so the pointer keeps its relative horizontal position along the
/// titlebar.
pub fn unsnap_geometry(current: Rect, normal: Size, pointer: Point) -> Rect {
    let ratio = if current.width > 0 {
        f64::from(pointer.x - current.x) / f64::from(current.width)
    } else {
        0.0
    };
    let x = pointer.x - (ratio * f64::from(normal.width)).round() as i32;
    Rect::new(x, current.y, normal.width, normal.height)
}
