use tracing::trace;

use super::window::{LifecycleState, WindowId, WindowRecord};

/// Capsule windows stack above every normal window.
pub const CAPSULE_Z_BASE: u64 = 1 << 32;

/// Tracks the active window and hands out z-order values. Both counters only
/// ever increase, so a refocus always lands strictly in front.
#[derive(Debug)]
pub struct FocusManager {
    next_z: u64,
    next_capsule_z: u64,
    active: Option<WindowId>,
}

impl Default for FocusManager {
    fn default() -> Self {
        Self {
            next_z: 1,
            next_capsule_z: CAPSULE_Z_BASE,
            active: None,
        }
    }
}

impl FocusManager {
    pub fn new() -> Self { Self::default() }

    #[inline]
    pub fn active(&self) -> Option<WindowId> { self.active }

    pub fn next_normal_z(&mut self) -> u64 {
        let z = self.next_z;
        self.next_z += 1;
        z
    }

    pub fn next_capsule_z(&mut self) -> u64 {
        let z = self.next_capsule_z;
        self.next_capsule_z += 1;
        z
    }

    /// Moves `window` to the front of its range and makes it active.
    /// Returns false (and does nothing) for minimized or already-active windows.
    pub fn focus(&mut self, window: &mut WindowRecord) -> bool {
        if window.lifecycle == LifecycleState::Minimized || self.active == Some(window.id) {
            return false;
        }
        self.raise(window);
        true
    }

    /// Unconditional variant of [`focus`](Self::focus), used when a window
    /// changes z range.
    pub fn raise(&mut self, window: &mut WindowRecord) {
        window.z_order = if window.is_capsule() {
            self.next_capsule_z()
        } else {
            self.next_normal_z()
        };
        self.active = Some(window.id);
        trace!(id = ?window.id, z = window.z_order, "raised window");
    }

    /// Click on empty desktop.
    pub fn clear(&mut self) { self.active = None; }

    /// Drops `id` if it was active. Returns whether it was.
    pub fn forget(&mut self, id: WindowId) -> bool {
        if self.active == Some(id) {
            self.active = None;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use slotmap::SlotMap;
    use test_log::test;

    use super::*;
    use crate::model::window::WindowConfig;
    use crate::sys::geometry::Rect;

    fn records(n: usize) -> Vec<WindowRecord> {
        let mut ids: SlotMap<WindowId, ()> = SlotMap::with_key();
        (0..n)
            .map(|_| {
                WindowRecord::new(ids.insert(()), WindowConfig::default(), Rect::default(), 0)
            })
            .collect()
    }

    #[test]
    fn z_is_monotonic_and_refocus_moves_to_front() {
        let mut fm = FocusManager::new();
        let mut ws = records(2);
        assert!(fm.focus(&mut ws[0]));
        assert!(fm.focus(&mut ws[1]));
        assert!(ws[1].z_order > ws[0].z_order);

        let before = ws[1].z_order;
        assert!(fm.focus(&mut ws[0]));
        assert!(ws[0].z_order > before);
        assert_eq!(fm.active(), Some(ws[0].id));
    }

    #[test]
    fn focusing_active_window_is_noop() {
        let mut fm = FocusManager::new();
        let mut ws = records(1);
        fm.focus(&mut ws[0]);
        let z = ws[0].z_order;
        assert!(!fm.focus(&mut ws[0]));
        assert_eq!(ws[0].z_order, z);
    }

    #[test]
    fn minimized_windows_are_not_focused() {
        let mut fm = FocusManager::new();
        let mut ws = records(1);
        ws[0].lifecycle = LifecycleState::Minimized;
        assert!(!fm.focus(&mut ws[0]));
        assert_eq!(fm.active(), None);
    }

    #[test]
    fn capsules_use_their_own_range() {
        let mut fm = FocusManager::new();
        let mut ws = records(2);
        ws[0].lifecycle = LifecycleState::Capsule;
        fm.focus(&mut ws[0]);
        fm.focus(&mut ws[1]);
        assert!(ws[0].z_order >= CAPSULE_Z_BASE);
        assert!(ws[1].z_order < CAPSULE_Z_BASE);
    }

    #[test]
    fn clear_keeps_z() {
        let mut fm = FocusManager::new();
        let mut ws = records(1);
        fm.focus(&mut ws[0]);
        let z = ws[0].z_order;
        fm.clear();
        assert_eq!(fm.active(), None);
        assert_eq!(ws[0].z_order, z);
        assert!(!fm.forget(ws[0].id));
    }
}
