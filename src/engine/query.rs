use serde::{Deserialize, Serialize};

use super::WindowManagerContext;
use crate::interaction::SnapZoneKind;
use crate::model::{AppBinding, LifecycleState, TabId, WindowId, WindowRecord};
use crate::sys::geometry::Rect;

/// Read-only view of one window, as the shell draws it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WindowView {
    pub id: WindowId,
    pub title: String,
    pub icon: Option<String>,
    pub geometry: Rect,
    pub lifecycle: LifecycleState,
    pub z_order: u64,
    pub active: bool,
    pub tabs: Vec<TabId>,
    pub app: Option<AppBinding>,
    /// Present while the window is a capsule; true when the preview is the
    /// placeholder rather than a captured image.
    pub placeholder_preview: Option<bool>,
    pub capturing: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SnapPreview {
    pub zone: SnapZoneKind,
    pub target: Rect,
}

/// Everything needed to draw the desktop: visible windows back to front and
/// the snap preview overlay.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Frame {
    pub area: Rect,
    pub windows: Vec<WindowView>,
    pub preview: Option<SnapPreview>,
}

impl WindowManagerContext {
    fn view(&self, window: &WindowRecord) -> WindowView {
        WindowView {
            id: window.id,
            title: window.display_title(),
            icon: window.display_icon(),
            geometry: window.geometry,
            lifecycle: window.lifecycle,
            z_order: window.z_order,
            active: self.focus.active() == Some(window.id),
            tabs: window.content.tab_ids(),
            app: window.app_binding.clone(),
            placeholder_preview: window.capsule_snapshot.as_ref().map(|s| s.image.is_placeholder()),
            capturing: self.pending_captures.contains_key(&window.id),
        }
    }

    /// Pure projection of the current state.
    pub fn render_frame(&self) -> Frame {
        Frame {
            area: self.available_area(),
            windows: self
                .windows
                .sorted_by_z()
                .into_iter()
                .filter(|w| w.is_visible())
                .map(|w| self.view(w))
                .collect(),
            preview: self.snap_preview().map(|z| SnapPreview { zone: z.kind, target: z.target }),
        }
    }

    /// Every window including minimized ones, back to front.
    pub fn window_views(&self) -> Vec<WindowView> {
        self.windows.sorted_by_z().into_iter().map(|w| self.view(w)).collect()
    }
}
