//! Snap zones along the edges and corners of the available area.
//!
//! Everything here is a pure function of the pointer and the area, so the drag
//! controller can re-evaluate it on every coalesced move.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

use crate::sys::geometry::{Point, Rect};

#[derive(
    Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum SnapZoneKind {
    // Corners first: they win over the edges they overlap.
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
    Top,
    Bottom,
    Left,
    Right,
}

impl SnapZoneKind {
    pub fn is_corner(self) -> bool {
        matches!(
            self,
            SnapZoneKind::TopLeft
                | SnapZoneKind::TopRight
                | SnapZoneKind::BottomLeft
                | SnapZoneKind::BottomRight
        )
    }

    /// Snapping to the top edge maximizes instead of tiling.
    pub fn maximizes(self) -> bool { self == SnapZoneKind::Top }

    /// Pointer hit region inside `area`.
    pub fn hit_region(self, area: Rect, corner_size: i32, edge_size: i32) -> Rect {
        let c = corner_size.min(area.width).min(area.height).max(0);
        let e = edge_size.min(area.width).min(area.height).max(0);
        match self {
            SnapZoneKind::TopLeft => Rect::new(area.x, area.y, c, c),
            SnapZoneKind::TopRight => Rect::new(area.max_x() - c, area.y, c, c),
            SnapZoneKind::BottomLeft => Rect::new(area.x, area.max_y() - c, c, c),
            SnapZoneKind::BottomRight => Rect::new(area.max_x() - c, area.max_y() - c, c, c),
            SnapZoneKind::Top => Rect::new(area.x, area.y, area.width, e),
            SnapZoneKind::Bottom => Rect::new(area.x, area.max_y() - e, area.width, e),
            SnapZoneKind::Left => Rect::new(area.x, area.y, e, area.height),
            SnapZoneKind::Right => Rect::new(area.max_x() - e, area.y, e, area.height),
        }
    }

    /// Geometry a window snapped into this zone takes.
    pub fn target(self, area: Rect) -> Rect {
        let half_w = area.width / 2;
        let half_h = area.height / 2;
        let left = Rect::new(area.x, area.y, half_w, area.height);
        let right = Rect::new(area.x + half_w, area.y, area.width - half_w, area.height);
        match self {
            SnapZoneKind::Top => area,
            SnapZoneKind::Left => left,
            SnapZoneKind::Right => right,
            SnapZoneKind::Bottom => Rect::new(area.x, area.y + half_h, area.width, area.height - half_h),
            SnapZoneKind::TopLeft => Rect::new(left.x, left.y, left.width, half_h),
            SnapZoneKind::TopRight => Rect::new(right.x, right.y, right.width, half_h),
            SnapZoneKind::BottomLeft => {
                Rect::new(left.x, area.y + half_h, left.width, area.height - half_h)
            }
            SnapZoneKind::BottomRight => {
                Rect::new(right.x, area.y + half_h, right.width, area.height - half_h)
            }
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapZone {
    pub kind: SnapZoneKind,
    pub hit: Rect,
    pub target: Rect,
}

/// All zones of `area` in priority order.
pub fn snap_zones(area: Rect, corner_size: i32, edge_size: i32) -> Vec<SnapZone> {
    SnapZoneKind::iter()
        .map(|kind| SnapZone {
            kind,
            hit: kind.hit_region(area, corner_size, edge_size),
            target: kind.target(area),
        })
        .collect()
}

/// The zone under `pointer`, if any. A pointer past the edge of the area (for
/// example over a panel inset) counts as being on that edge.
pub fn calculate_snap_zone(
    pointer: Point,
    area: Rect,
    corner_size: i32,
    edge_size: i32,
) -> Option<SnapZone> {
    if area.is_empty() {
        return None;
    }
    let clamped = Point::new(
        pointer.x.clamp(area.x, area.max_x() - 1),
        pointer.y.clamp(area.y, area.max_y() - 1),
    );
    snap_zones(area, corner_size, edge_size)
        .into_iter()
        .find(|zone| zone.hit.contains(clamped))
}
