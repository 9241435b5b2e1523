//! Pointer-driven move and resize, snap zones, and the snap animation.

pub mod animation;
pub mod drag;
pub mod resize;
pub mod snap;

pub use animation::SnapAnimation;
pub use drag::{DragSession, ZoneChange};
pub use resize::{ResizeEdges, ResizeHandle, ResizeSession};
pub use snap::{SnapZone, SnapZoneKind, calculate_snap_zone};
