use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

use crate::model::WindowId;
use crate::sys::geometry::{Point, Rect, Size};

bitflags! {
    #[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ResizeEdges: u8 {
        const NORTH = 1 << 0;
        const SOUTH = 1 << 1;
        const EAST = 1 << 2;
        const WEST = 1 << 3;
    }
}

#[derive(
    Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ResizeHandle {
    // Corners first so they win the hit test where strips meet.
    Nw,
    Ne,
    Sw,
    Se,
    N,
    S,
    E,
    W,
}

impl ResizeHandle {
    pub fn edges(self) -> ResizeEdges {
        match self {
            ResizeHandle::N => ResizeEdges::NORTH,
            ResizeHandle::S => ResizeEdges::SOUTH,
            ResizeHandle::E => ResizeEdges::EAST,
            ResizeHandle::W => ResizeEdges::WEST,
            ResizeHandle::Ne => ResizeEdges::NORTH | ResizeEdges::EAST,
            ResizeHandle::Nw => ResizeEdges::NORTH | ResizeEdges::WEST,
            ResizeHandle::Se => ResizeEdges::SOUTH | ResizeEdges::EAST,
            ResizeHandle::Sw => ResizeEdges::SOUTH | ResizeEdges::WEST,
        }
    }

    /// Handle region for a window at `geometry`. Handles sit in a band of
    /// `size` just outside the window so they never cover the titlebar.
    pub fn region(self, geometry: Rect, size: i32) -> Rect {
        let g = geometry;
        match self {
            ResizeHandle::Nw => Rect::new(g.x - size, g.y - size, size, size),
            ResizeHandle::Ne => Rect::new(g.max_x(), g.y - size, size, size),
            ResizeHandle::Sw => Rect::new(g.x - size, g.max_y(), size, size),
            ResizeHandle::Se => Rect::new(g.max_x(), g.max_y(), size, size),
            ResizeHandle::N => Rect::new(g.x, g.y - size, g.width, size),
            ResizeHandle::S => Rect::new(g.x, g.max_y(), g.width, size),
            ResizeHandle::E => Rect::new(g.max_x(), g.y, size, g.height),
            ResizeHandle::W => Rect::new(g.x - size, g.y, size, g.height),
        }
    }
}

pub fn handle_regions(geometry: Rect, size: i32) -> Vec<(ResizeHandle, Rect)> {
    ResizeHandle::iter().map(|h| (h, h.region(geometry, size))).collect()
}

pub fn handle_at(geometry: Rect, size: i32, point: Point) -> Option<ResizeHandle> {
    if size <= 0 {
        return None;
    }
    ResizeHandle::iter().find(|h| h.region(geometry, size).contains(point))
}

/// Applies a pointer delta to `start` on the given edges. The size never drops
/// below `min`; when it would, the position shift is clamped too so the
/// opposite edge stays where it was.
pub fn resize_rect(start: Rect, edges: ResizeEdges, delta: Point, min: Size) -> Rect {
    let mut r = start;
    if edges.contains(ResizeEdges::EAST) {
        r.width = (start.width + delta.x).max(min.width);
    }
    if edges.contains(ResizeEdges::WEST) {
        r.width = (start.width - delta.x).max(min.width);
        r.x = start.max_x() - r.width;
    }
    if edges.contains(ResizeEdges::SOUTH) {
        r.height = (start.height + delta.y).max(min.height);
    }
    if edges.contains(ResizeEdges::NORTH) {
        r.height = (start.height - delta.y).max(min.height);
        r.y = start.max_y() - r.height;
    }
    r
}

#[derive(Debug, Clone)]
pub struct ResizeSession {
    window: WindowId,
    handle: ResizeHandle,
    pointer_start: Point,
    geometry_start: Rect,
    pending: Option<Point>,
}

impl ResizeSession {
    pub fn new(window: WindowId, handle: ResizeHandle, pointer: Point, geometry: Rect) -> Self {
        Self {
            window,
            handle,
            pointer_start: pointer,
            geometry_start: geometry,
            pending: None,
        }
    }

    #[inline]
    pub fn window(&self) -> WindowId { self.window }

    #[inline]
    pub fn handle(&self) -> ResizeHandle { self.handle }

    pub fn queue_move(&mut self, pointer: Point) { self.pending = Some(pointer); }

    pub fn take_pending(&mut self) -> Option<Point> { self.pending.take() }

    pub fn geometry_for(&self, pointer: Point, min: Size) -> Rect {
        resize_rect(
            self.geometry_start,
            self.handle.edges(),
            pointer.delta_from(self.pointer_start),
            min,
        )
    }
}
