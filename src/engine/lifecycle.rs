//! Minimize, maximize, restore and capsule transitions.

use tokio::task::{Id as TaskId, JoinError};
use tracing::{debug, info, trace, warn};

use super::{CaptureMode, CaptureOutput, PendingCapture, WindowManagerContext, content_region};
use crate::capsule::capture::run_capture;
use crate::capsule::{CaptureError, CaptureRequest, CaptureToken, capsule_position, capsule_size};
use crate::model::{CapsuleSnapshot, LifecycleState, PreviewImage, WindowId};
use crate::sys::geometry::{Point, Rect};

impl WindowManagerContext {
    pub fn minimize_window(&mut self, id: WindowId) -> bool {
        let Some(window) = self.windows.get_mut(id) else {
            warn!(?id, "minimize_window on unknown window");
            return false;
        };
        if !window.config.minimizable
            || matches!(window.lifecycle, LifecycleState::Minimized | LifecycleState::Capsule)
        {
            return false;
        }
        window.restore_target = window.lifecycle;
        window.lifecycle = LifecycleState::Minimized;
        if self.interaction.as_ref().is_some_and(|i| i.window() == id) {
            self.interaction = None;
        }
        self.finish_animation(id);
        debug!(?id, "minimized window");
        if self.focus.forget(id) {
            self.focus_front_most();
        }
        true
    }

    /// Minimized windows return to the state they were minimized from,
    /// capsules expand, maximized windows restore their normal geometry.
    pub fn restore_window(&mut self, id: WindowId) -> bool {
        let Some(window) = self.windows.get_mut(id) else {
            warn!(?id, "restore_window on unknown window");
            return false;
        };
        let state = window.lifecycle;
        match state {
            LifecycleState::Minimized => {
                window.lifecycle = window.restore_target;
                window.restore_target = LifecycleState::Normal;
                self.focus.focus(window);
                debug!(?id, state = ?window.lifecycle, "restored window");
                true
            }
            LifecycleState::Capsule => self.exit_capsule(id),
            LifecycleState::Maximized => self.toggle_maximize_window(id),
            LifecycleState::Normal => false,
        }
    }

    pub fn toggle_maximize_window(&mut self, id: WindowId) -> bool {
        if self.interaction.as_ref().is_some_and(|i| i.window() == id) {
            return false;
        }
        self.finish_animation(id);
        let area = self.available_area();
        let Some(window) = self.windows.get_mut(id) else {
            warn!(?id, "toggle_maximize_window on unknown window");
            return false;
        };
        match window.lifecycle {
            LifecycleState::Normal if window.config.maximizable => {
                window.saved_geometry = Some(window.geometry);
                window.geometry = area;
                window.lifecycle = LifecycleState::Maximized;
                debug!(?id, "maximized window");
            }
            LifecycleState::Maximized => {
                window.geometry = window.saved_geometry.take().unwrap_or(window.geometry);
                window.lifecycle = LifecycleState::Normal;
                debug!(?id, geometry = ?window.geometry, "unmaximized window");
            }
            _ => return false,
        }
        self.relayout(id);
        true
    }

    /// Entering capsule mode is asynchronous: it starts a capture and the
    /// transition happens when the capture completes. Leaving is immediate.
    pub fn toggle_window_capsule(&mut self, id: WindowId) -> bool {
        let Some(window) = self.windows.get(id) else {
            warn!(?id, "toggle_window_capsule on unknown window");
            return false;
        };
        if self.is_busy(id) {
            debug!(?id, "capture or interaction in flight, ignoring capsule toggle");
            return false;
        }
        if window.is_capsule() {
            return self.exit_capsule(id);
        }
        let force_visible = window.lifecycle == LifecycleState::Minimized;
        // Capture the region the window is snapping to, not a mid-slide frame.
        self.finish_animation(id);
        self.spawn_capture(id, CaptureMode::Enter, force_visible)
    }

    /// Re-captures a capsule's preview without changing its state.
    pub fn refresh_capsule_preview(&mut self, id: WindowId) -> bool {
        let Some(window) = self.windows.get(id) else {
            warn!(?id, "refresh_capsule_preview on unknown window");
            return false;
        };
        if !window.is_capsule() || self.pending_captures.contains_key(&id) {
            return false;
        }
        // The full content is hidden behind the card while in capsule mode.
        self.spawn_capture(id, CaptureMode::Refresh, true)
    }

    fn spawn_capture(&mut self, id: WindowId, mode: CaptureMode, force_visible: bool) -> bool {
        let titlebar = self.config.settings.window.titlebar_height;
        let Some(window) = self.windows.get(id) else { return false };
        let request = CaptureRequest {
            window: id,
            region: content_region(window.normal_geometry(), titlebar),
            title: window.display_title(),
        };
        let token = self.capture_token();
        let backend = self.capture_backend.clone();
        let task = self.captures.spawn(async move {
            let result = run_capture(backend, request, force_visible).await;
            (id, token, result)
        });
        trace!(?id, ?token, ?mode, "spawned capture");
        self.pending_captures.insert(id, PendingCapture { token, task, mode });
        true
    }

    pub(super) fn on_capture_joined(&mut self, joined: Result<(TaskId, CaptureOutput), JoinError>) {
        match joined {
            Ok((_, (id, token, result))) => self.handle_capture_result(id, token, result),
            Err(e) if e.is_cancelled() => trace!("capture task cancelled"),
            Err(e) => {
                let task_id = e.id();
                let owner = self
                    .pending_captures
                    .iter()
                    .find(|(_, p)| p.task.id() == task_id)
                    .map(|(id, p)| (*id, p.token));
                if let Some((id, token)) = owner {
                    warn!(?id, "capture task panicked");
                    self.handle_capture_result(id, token, Err(CaptureError::Panicked));
                }
            }
        }
    }

    /// Completions for destroyed windows or superseded tokens are dropped.
    pub fn handle_capture_result(
        &mut self,
        id: WindowId,
        token: CaptureToken,
        result: Result<PreviewImage, CaptureError>,
    ) {
        match self.pending_captures.get(&id) {
            Some(pending) if pending.token == token => {}
            _ => {
                debug!(?id, ?token, "ignoring stale capture result");
                return;
            }
        }
        let Some(pending) = self.pending_captures.remove(&id) else { return };
        let Some(window) = self.windows.get(id) else { return };

        let title = window.display_title();
        let icon = window.display_icon();
        let size = capsule_size(&title, &self.config.settings.capsule);
        let image = self.snapshots.resolve(id, result, &title, icon.as_deref(), size);

        match pending.mode {
            CaptureMode::Enter => self.enter_capsule(id, image),
            CaptureMode::Refresh => {
                let captured_at = self.clock.unix_millis();
                if let Some(window) = self.windows.get_mut(id)
                    && window.is_capsule()
                {
                    window.capsule_snapshot = Some(CapsuleSnapshot { image, captured_at });
                }
            }
        }
    }

    fn enter_capsule(&mut self, id: WindowId, image: PreviewImage) {
        let area = self.available_area();
        let settings = self.config.settings.capsule.clone();
        let occupied: Vec<Point> = self
            .windows
            .iter()
            .filter(|w| w.is_capsule() && w.id != id)
            .map(|w| w.geometry.origin())
            .collect();
        let captured_at = self.clock.unix_millis();
        self.finish_animation(id);

        let Some(window) = self.windows.get_mut(id) else { return };
        if window.is_capsule() {
            return;
        }
        // Maximized and minimized windows both park their normal geometry.
        let normal = window.normal_geometry();
        window.saved_geometry = Some(normal);
        window.restore_target = LifecycleState::Normal;

        let size = capsule_size(&window.display_title(), &settings);
        let origin = if settings.auto_position {
            capsule_position(area, size, &occupied, &settings)
        } else {
            normal.origin()
        };
        window.geometry = Rect::from_parts(origin, size);
        window.lifecycle = LifecycleState::Capsule;
        window.capsule_snapshot = Some(CapsuleSnapshot { image, captured_at });
        self.focus.raise(window);
        info!(?id, geometry = ?window.geometry, "entered capsule");
    }

    fn exit_capsule(&mut self, id: WindowId) -> bool {
        let Some(window) = self.windows.get_mut(id) else { return false };
        if !window.is_capsule() {
            return false;
        }
        window.geometry = window.saved_geometry.take().unwrap_or(window.geometry);
        window.capsule_snapshot = None;
        window.lifecycle = LifecycleState::Normal;
        self.focus.raise(window);
        info!(?id, geometry = ?window.geometry, "left capsule");
        self.relayout(id);
        true
    }
}
