//! Pointer input: hit testing, drag, resize, and the per-tick flush of
//! coalesced moves.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::Display;
use tracing::{debug, trace};

use super::{Interaction, WindowManagerContext};
use crate::interaction::drag::unsnap_geometry;
use crate::interaction::resize::{handle_at, handle_regions};
use crate::interaction::{
    DragSession, ResizeHandle, ResizeSession, SnapAnimation, SnapZone, calculate_snap_zone,
};
use crate::model::{LifecycleState, WindowId, WindowRecord};
use crate::sys::geometry::{Point, Rect, Size};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ControlButton {
    Close,
    Maximize,
    Minimize,
    Capsule,
}

/// What the pointer is over.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitTarget {
    Titlebar,
    Button(ControlButton),
    Resize(ResizeHandle),
    Content,
}

impl WindowManagerContext {
    /// Buttons laid out right to left along the titlebar. Capsules only offer
    /// close and expand.
    pub fn control_buttons(&self, id: WindowId) -> Vec<(ControlButton, Rect)> {
        let Some(window) = self.windows.get(id) else { return Vec::new() };
        let width = self.config.settings.window.control_button_width;
        let height = self.titlebar_height(id);
        let buttons: Vec<ControlButton> = if window.is_capsule() {
            vec![ControlButton::Close, ControlButton::Capsule]
        } else {
            let mut b = vec![ControlButton::Close];
            if window.config.maximizable {
                b.push(ControlButton::Maximize);
            }
            if window.config.minimizable {
                b.push(ControlButton::Minimize);
            }
            b.push(ControlButton::Capsule);
            b
        };
        let g = window.geometry;
        buttons
            .into_iter()
            .enumerate()
            .map(|(i, button)| {
                let x = g.max_x() - width * (i as i32 + 1);
                (button, Rect::new(x, g.y, width, height))
            })
            .collect()
    }

    fn can_resize(&self, window: &WindowRecord) -> bool {
        window.config.resizable
            && window.lifecycle == LifecycleState::Normal
            && self.interaction.is_none()
            && !self.pending_captures.contains_key(&window.id)
    }

    /// Resize handle regions, empty when the window cannot be resized right now.
    pub fn resize_handles(&self, id: WindowId) -> Vec<(ResizeHandle, Rect)> {
        match self.windows.get(id) {
            Some(w) if self.can_resize(w) => {
                handle_regions(w.geometry, self.config.settings.window.resize_handle_size)
            }
            _ => Vec::new(),
        }
    }

    /// Front-most window under `point` and the part of it that was hit.
    pub fn hit_test(&self, point: Point) -> Option<(WindowId, HitTarget)> {
        let handle_size = self.config.settings.window.resize_handle_size;
        for window in self.windows.sorted_by_z().into_iter().rev() {
            if !window.is_visible() {
                continue;
            }
            if self.can_resize(window)
                && let Some(handle) = handle_at(window.geometry, handle_size, point)
            {
                return Some((window.id, HitTarget::Resize(handle)));
            }
            if !window.geometry.contains(point) {
                continue;
            }
            if let Some((button, _)) =
                self.control_buttons(window.id).into_iter().find(|(_, r)| r.contains(point))
            {
                return Some((window.id, HitTarget::Button(button)));
            }
            let titlebar = Rect::new(
                window.geometry.x,
                window.geometry.y,
                window.geometry.width,
                self.titlebar_height(window.id),
            );
            let target = if titlebar.contains(point) { HitTarget::Titlebar } else { HitTarget::Content };
            return Some((window.id, target));
        }
        None
    }

    pub fn pointer_down(&mut self, point: Point) {
        if self.interaction.is_some() {
            trace!(?point, "pointer down during interaction ignored");
            return;
        }
        let Some((id, target)) = self.hit_test(point) else {
            self.clear_focus();
            return;
        };
        if let Some(window) = self.windows.get_mut(id) {
            self.focus.focus(window);
        }
        match target {
            HitTarget::Titlebar => {
                self.begin_drag(id, point);
            }
            HitTarget::Resize(handle) => {
                self.begin_resize(id, handle, point);
            }
            HitTarget::Button(button) => {
                self.interaction = Some(Interaction::Press { window: id, button });
            }
            HitTarget::Content => {}
        }
    }

    pub fn pointer_moved(&mut self, point: Point) {
        match &mut self.interaction {
            Some(Interaction::Drag(s)) => s.queue_move(point),
            Some(Interaction::Resize(s)) => s.queue_move(point),
            Some(Interaction::Press { .. }) | None => {}
        }
    }

    pub fn pointer_released(&mut self, point: Point) {
        let Some(interaction) = self.interaction.take() else { return };
        match interaction {
            Interaction::Drag(mut session) => {
                session.queue_move(point);
                self.apply_drag_move(&mut session);
                self.finish_drag(session);
            }
            Interaction::Resize(mut session) => {
                session.queue_move(point);
                self.apply_resize_move(&mut session);
                debug!(id = ?session.window(), "resize finished");
                self.relayout(session.window());
            }
            Interaction::Press { window, button } => {
                let still_over = self
                    .control_buttons(window)
                    .into_iter()
                    .any(|(b, r)| b == button && r.contains(point));
                if still_over {
                    self.press_button(window, button);
                }
            }
        }
    }

    fn press_button(&mut self, id: WindowId, button: ControlButton) {
        debug!(?id, %button, "control button pressed");
        match button {
            ControlButton::Close => {
                self.close_window(id);
            }
            ControlButton::Maximize => {
                self.toggle_maximize_window(id);
            }
            ControlButton::Minimize => {
                self.minimize_window(id);
            }
            ControlButton::Capsule => {
                self.toggle_window_capsule(id);
            }
        }
    }

    /// Starts moving `id` with the pointer at `pointer`. Refused for unknown or
    /// minimized windows, during another interaction, or while a capture for
    /// the window is in flight.
    pub fn begin_drag(&mut self, id: WindowId, pointer: Point) -> bool {
        if self.interaction.is_some() || self.pending_captures.contains_key(&id) {
            return false;
        }
        self.finish_animation(id);
        let snapping_enabled = self.config.settings.snapping.enabled;
        let Some(window) = self.windows.get_mut(id) else {
            tracing::warn!(?id, "begin_drag on unknown window");
            return false;
        };
        if !window.is_visible() {
            return false;
        }
        self.focus.focus(window);
        let snapping = snapping_enabled && !window.is_capsule();
        let mut session = DragSession::new(id, pointer, window.geometry, snapping);
        match window.lifecycle {
            LifecycleState::Maximized => {
                if let Some(saved) = window.saved_geometry {
                    session = DragSession::new(id, pointer, saved, snapping)
                        .with_unsnap(saved.size());
                    session.rebase(window.geometry);
                }
            }
            LifecycleState::Normal => {
                if let Some(pre_snap) = window.snap_restore {
                    session = DragSession::new(id, pointer, pre_snap, snapping)
                        .with_unsnap(pre_snap.size());
                    session.rebase(window.geometry);
                }
            }
            _ => {}
        }
        debug!(?id, ?pointer, "drag started");
        self.interaction = Some(Interaction::Drag(session));
        true
    }

    /// Starts resizing `id` from `handle`. Only resizable, normal windows.
    pub fn begin_resize(&mut self, id: WindowId, handle: ResizeHandle, pointer: Point) -> bool {
        let Some(window) = self.windows.get(id) else {
            tracing::warn!(?id, "begin_resize on unknown window");
            return false;
        };
        if !self.can_resize(window) {
            return false;
        }
        self.finish_animation(id);
        let Some(window) = self.windows.get_mut(id) else { return false };
        // A resized window no longer belongs to its snap slot.
        window.snap_restore = None;
        self.focus.focus(window);
        let session = ResizeSession::new(id, handle, pointer, window.geometry);
        debug!(?id, %handle, "resize started");
        self.interaction = Some(Interaction::Resize(session));
        true
    }

    /// Flushes coalesced pointer moves, shows due snap previews, and steps
    /// running animations.
    pub fn tick(&mut self) {
        match self.interaction.take() {
            Some(Interaction::Drag(mut session)) => {
                self.apply_drag_move(&mut session);
                let delay = Duration::from_millis(self.config.settings.snapping.hover_delay_ms);
                if let Some(zone) = session.poll_preview(self.clock.now(), delay) {
                    debug!(zone = %zone.kind, "showing snap preview");
                }
                self.interaction = Some(Interaction::Drag(session));
            }
            Some(Interaction::Resize(mut session)) => {
                self.apply_resize_move(&mut session);
                self.interaction = Some(Interaction::Resize(session));
            }
            other => self.interaction = other,
        }
        self.step_animations();
    }

    /// The snap target currently previewed, if any.
    pub fn snap_preview(&self) -> Option<SnapZone> {
        match &self.interaction {
            Some(Interaction::Drag(s)) => s.preview(),
            _ => None,
        }
    }

    pub fn is_interacting(&self) -> bool { self.interaction.is_some() }

    fn apply_drag_move(&mut self, session: &mut DragSession) {
        let Some(pointer) = session.take_pending() else { return };
        let id = session.window();
        let area = self.available_area();
        let now = self.clock.now();
        let snap = self.config.settings.snapping.clone();
        let Some(window) = self.windows.get_mut(id) else { return };

        if pointer != session.pointer_start()
            && let Some(normal) = session.take_unsnap()
        {
            let torn = unsnap_geometry(window.geometry, normal, session.pointer_start());
            window.lifecycle = LifecycleState::Normal;
            window.saved_geometry = None;
            window.snap_restore = None;
            session.rebase(torn);
            debug!(?id, geometry = ?torn, "restored size for drag");
        }
        if window.lifecycle == LifecycleState::Maximized {
            // Still a click on a maximized titlebar.
            return;
        }
        window.geometry = session.geometry_for(pointer);

        if session.snapping() {
            let zone = calculate_snap_zone(pointer, area, snap.corner_size, snap.edge_size);
            session.update_zone(zone, now);
            session.poll_preview(now, Duration::from_millis(snap.hover_delay_ms));
        }
    }

    fn finish_drag(&mut self, session: DragSession) {
        let id = session.window();
        let Some(zone) = session.preview() else {
            debug!(?id, "drag finished");
            return;
        };
        let settings = self.config.settings.clone();
        let now = self.clock.now();
        let Some(window) = self.windows.get_mut(id) else { return };
        let restore = session.origin_geometry();
        let from = window.geometry;
        if zone.kind.maximizes() {
            window.saved_geometry = Some(restore);
            window.snap_restore = None;
            window.lifecycle = LifecycleState::Maximized;
        } else {
            window.snap_restore = Some(restore);
            window.lifecycle = LifecycleState::Normal;
        }
        if settings.animate && settings.animation_duration > 0.0 {
            self.animations.insert(
                id,
                SnapAnimation::new(
                    id,
                    from,
                    zone.target,
                    now,
                    settings.animation_duration,
                    settings.animation_easing,
                ),
            );
        } else {
            window.geometry = zone.target;
            self.relayout(id);
        }
        debug!(?id, zone = %zone.kind, target = ?zone.target, "snapped window");
    }

    fn apply_resize_move(&mut self, session: &mut ResizeSession) {
        let Some(pointer) = session.take_pending() else { return };
        let min = Size::new(
            self.config.settings.window.min_width,
            self.config.settings.window.min_height,
        );
        if let Some(window) = self.windows.get_mut(session.window()) {
            window.geometry = session.geometry_for(pointer, min);
        }
    }

    fn step_animations(&mut self) {
        if self.animations.is_empty() {
            return;
        }
        let now = self.clock.now();
        let mut finished = Vec::new();
        for (id, anim) in &self.animations {
            let (frame, done) = anim.frame_at(now);
            if let Some(window) = self.windows.get_mut(*id) {
                window.geometry = frame;
            }
            if done {
                finished.push(*id);
            }
        }
        for id in finished {
            self.animations.remove(&id);
            self.relayout(id);
        }
    }

    /// Jumps a running animation to its end.
    pub(super) fn finish_animation(&mut self, id: WindowId) {
        if let Some(anim) = self.animations.remove(&id)
            && let Some(window) = self.windows.get_mut(id)
        {
            window.geometry = anim.target();
        }
    }

    pub fn is_animating(&self, id: WindowId) -> bool { self.animations.contains_key(&id) }
}
