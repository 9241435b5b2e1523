//! The window manager context.
//!
//! [`WindowManagerContext`] owns every window record and is the only place
//! geometry, lifecycle and z-order change. It is single threaded: the host
//! either calls its methods directly or feeds it [`Event`]s, and
//! [`WindowManagerContext::run`] multiplexes those events with capture
//! completions and the redraw tick.

mod apps;
pub mod error;
mod lifecycle;
mod pointer;
mod query;
pub mod replay;
#[cfg(test)]
mod tests;

use std::sync::Arc;
use std::time::Duration;

pub use error::EngineError;
pub use pointer::{ControlButton, HitTarget};
pub use query::{Frame, SnapPreview, WindowView};
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, trace, warn};

use self::replay::Record;
use crate::actor::{self, Receiver, Sender};
use crate::app::{AppRegistry, ContentTarget, HostedApplication, LaunchOptions};
use crate::capsule::{CaptureBackend, CaptureError, CaptureToken, SnapshotCache};
use crate::common::collections::HashMap;
use crate::common::config::{Config, ConfigCommand};
use crate::interaction::{DragSession, ResizeSession, SnapAnimation};
use crate::model::{
    FocusManager, LifecycleState, PreviewImage, TabId, WindowConfig, WindowId, WindowRecord,
    WindowRegistry,
};
use crate::persistence::{KvStore, StateStore};
use crate::sys::clock::Clock;
use crate::sys::geometry::{Point, Rect, Size};

/// Cloneable handle for requesting engine operations from outside, most
/// notably from hosted applications.
pub type EngineHandle = Sender<Event>;

pub const DEFAULT_DESKTOP_SIZE: Size = Size::new(1920, 1080);

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum Event {
    CreateWindow(WindowConfig),
    CloseWindow(WindowId),
    FocusWindow(WindowId),
    ClearFocus,
    MinimizeWindow(WindowId),
    RestoreWindow(WindowId),
    ToggleMaximize(WindowId),
    ToggleCapsule(WindowId),
    RefreshCapsulePreview(WindowId),
    LaunchApp {
        app_type: String,
        #[serde(default)]
        options: LaunchOptions,
    },
    SaveAllStates,
    RestoreSession,
    SetDesktopSize(Size),
    UpdateAvailableArea(Insets),
    PointerDown(Point),
    PointerMoved(Point),
    PointerReleased(Point),
    Tick,
    Config(ConfigCommand),
    Shutdown,
}

/// Space reserved by shell chrome (taskbar, panels) on each side of the desktop.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Insets {
    pub left: i32,
    pub right: i32,
    pub top: i32,
    pub bottom: i32,
}

#[derive(Debug)]
enum Interaction {
    Drag(DragSession),
    Resize(ResizeSession),
    /// Pointer went down on a control button; it fires on release.
    Press { window: WindowId, button: ControlButton },
}

impl Interaction {
    fn window(&self) -> WindowId {
        match self {
            Interaction::Drag(s) => s.window(),
            Interaction::Resize(s) => s.window(),
            Interaction::Press { window, .. } => *window,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CaptureMode {
    Enter,
    Refresh,
}

#[derive(Debug)]
struct PendingCapture {
    token: CaptureToken,
    task: tokio::task::AbortHandle,
    mode: CaptureMode,
}

type CaptureOutput = (WindowId, CaptureToken, Result<PreviewImage, CaptureError>);

pub struct WindowManagerContext {
    config: Config,
    clock: Arc<dyn Clock>,
    capture_backend: Arc<dyn CaptureBackend>,
    windows: WindowRegistry,
    focus: FocusManager,
    apps: AppRegistry,
    states: StateStore,
    desktop: Size,
    insets: Insets,
    interaction: Option<Interaction>,
    animations: HashMap<WindowId, SnapAnimation>,
    snapshots: SnapshotCache,
    pending_captures: HashMap<WindowId, PendingCapture>,
    captures: JoinSet<CaptureOutput>,
    next_capture_token: u64,
    events_tx: EngineHandle,
    events_rx: Receiver<Event>,
    record: Record,
}

impl WindowManagerContext {
    pub fn new(
        config: Config,
        store: Arc<dyn KvStore>,
        clock: Arc<dyn Clock>,
        capture_backend: Arc<dyn CaptureBackend>,
    ) -> Self {
        let (events_tx, events_rx) = actor::channel();
        let states = StateStore::new(store, config.persistence.namespace.clone());
        WindowManagerContext {
            config,
            clock,
            capture_backend,
            windows: WindowRegistry::new(),
            focus: FocusManager::new(),
            apps: AppRegistry::new(),
            states,
            desktop: DEFAULT_DESKTOP_SIZE,
            insets: Insets::default(),
            interaction: None,
            animations: HashMap::default(),
            snapshots: SnapshotCache::default(),
            pending_captures: HashMap::default(),
            captures: JoinSet::new(),
            next_capture_token: 0,
            events_tx,
            events_rx,
            record: Record::new(None),
        }
    }

    pub fn config(&self) -> &Config { &self.config }

    pub fn handle(&self) -> EngineHandle { self.events_tx.clone() }

    /// Writes every handled event to `record` for later replay.
    pub fn set_recorder(&mut self, record: Record) {
        self.record = record;
        self.record.start(&self.config);
    }

    // Desktop

    pub fn set_desktop_size(&mut self, width: i32, height: i32) {
        self.desktop = Size::new(width.max(0), height.max(0));
        debug!(desktop = ?self.desktop, "desktop size changed");
        self.refit_maximized();
    }

    pub fn update_available_area(&mut self, left: i32, right: i32, top: i32, bottom: i32) {
        self.insets = Insets { left, right, top, bottom };
        debug!(insets = ?self.insets, "available area changed");
        self.refit_maximized();
    }

    /// Desktop minus the reserved insets.
    pub fn available_area(&self) -> Rect {
        let Insets { left, right, top, bottom } = self.insets;
        Rect::from_parts(Point::default(), self.desktop).inset(left, right, top, bottom)
    }

    fn refit_maximized(&mut self) {
        let area = self.available_area();
        let mut refit = Vec::new();
        for w in self.windows.iter_mut() {
            let parked_maximized = w.lifecycle == LifecycleState::Minimized
                && w.restore_target == LifecycleState::Maximized;
            if w.lifecycle == LifecycleState::Maximized || parked_maximized {
                w.geometry = area;
                refit.push(w.id);
            }
        }
        for id in refit {
            self.animations.remove(&id);
        }
    }

    // Registry

    pub fn create_window(&mut self, config: WindowConfig) -> WindowId {
        let area = self.available_area();
        let id = self.windows.create(config, &self.config.settings.window, area, 0);
        if let Some(window) = self.windows.get_mut(id) {
            self.focus.raise(window);
            info!(?id, title = %window.config.title, geometry = ?window.geometry, "created window");
        }
        id
    }

    /// Binds `app` to the window's content slot and renders it.
    pub fn load_app(
        &mut self,
        id: WindowId,
        mut app: Box<dyn HostedApplication>,
        tab_id: Option<TabId>,
    ) -> bool {
        let handle = self.handle();
        let titlebar = self.titlebar_height(id);
        let Some(window) = self.windows.get_mut(id) else {
            warn!(?id, "load_app on unknown window");
            return false;
        };
        app.bind(handle, id);
        if let Some(mut replaced) = window.content.load(app, tab_id) {
            replaced.on_close();
        }
        let target = ContentTarget {
            window: id,
            tab: window.content.active_tab().cloned(),
            bounds: content_region(window.geometry, titlebar),
        };
        if let Some(app) = window.content.primary_mut() {
            app.render_into(&target);
        }
        true
    }

    /// Re-renders every app in the window against its current content bounds.
    fn relayout(&mut self, id: WindowId) {
        let titlebar = self.titlebar_height(id);
        let Some(window) = self.windows.get_mut(id) else { return };
        let target = ContentTarget {
            window: id,
            tab: None,
            bounds: content_region(window.geometry, titlebar),
        };
        window.content.render_all(&target);
    }

    /// Saves persistent state, closes every bound app, and removes the window.
    pub fn close_window(&mut self, id: WindowId) -> bool {
        if !self.windows.contains(id) {
            warn!(?id, "close_window on unknown window");
            return false;
        }
        self.finish_animation(id);
        self.persist_window_state(id);
        self.destroy_window(id);
        true
    }

    /// Removal without saving state. Used when an app fails to start.
    fn destroy_window(&mut self, id: WindowId) {
        if self.interaction.as_ref().is_some_and(|i| i.window() == id) {
            self.interaction = None;
        }
        self.animations.remove(&id);
        self.snapshots.remove(id);
        if let Some(pending) = self.pending_captures.remove(&id) {
            pending.task.abort();
        }
        let Some(mut window) = self.windows.remove(id) else { return };
        for mut app in window.content.drain() {
            app.on_close();
        }
        info!(?id, "destroyed window");
        if self.focus.forget(id) {
            self.focus_front_most();
        }
    }

    // Focus

    pub fn focus_window(&mut self, id: WindowId) -> bool {
        let Some(window) = self.windows.get_mut(id) else {
            warn!(?id, "focus_window on unknown window");
            return false;
        };
        self.focus.focus(window)
    }

    /// Click on empty desktop: nothing is active, z-order is untouched.
    pub fn clear_focus(&mut self) { self.focus.clear(); }

    fn focus_front_most(&mut self) {
        if let Some(next) = self.windows.top_visible(None)
            && let Some(window) = self.windows.get_mut(next)
        {
            self.focus.focus(window);
        }
    }

    // Queries

    pub fn get_window(&self, id: WindowId) -> Option<&WindowRecord> { self.windows.get(id) }

    /// Every window, back to front.
    pub fn get_all_windows(&self) -> Vec<&WindowRecord> { self.windows.sorted_by_z() }

    pub fn get_active_window(&self) -> Option<&WindowRecord> {
        self.focus.active().and_then(|id| self.windows.get(id))
    }

    pub fn active_window_id(&self) -> Option<WindowId> { self.focus.active() }

    pub fn window_count(&self) -> usize { self.windows.len() }

    pub fn has_pending_capture(&self, id: WindowId) -> bool {
        self.pending_captures.contains_key(&id)
    }

    fn is_busy(&self, id: WindowId) -> bool {
        self.pending_captures.contains_key(&id)
            || self.interaction.as_ref().is_some_and(|i| i.window() == id)
    }

    fn titlebar_height(&self, id: WindowId) -> i32 {
        match self.windows.get(id) {
            Some(w) if w.is_capsule() => self.config.settings.capsule.titlebar_height,
            _ => self.config.settings.window.titlebar_height,
        }
    }

    // Events

    #[instrument(name = "engine::handle_event", skip(self))]
    pub fn handle_event(&mut self, event: Event) {
        self.record.on_event(&event);
        match event {
            Event::CreateWindow(config) => {
                self.create_window(config);
            }
            Event::CloseWindow(id) => {
                self.close_window(id);
            }
            Event::FocusWindow(id) => {
                self.focus_window(id);
            }
            Event::ClearFocus => self.clear_focus(),
            Event::MinimizeWindow(id) => {
                self.minimize_window(id);
            }
            Event::RestoreWindow(id) => {
                self.restore_window(id);
            }
            Event::ToggleMaximize(id) => {
                self.toggle_maximize_window(id);
            }
            Event::ToggleCapsule(id) => {
                self.toggle_window_capsule(id);
            }
            Event::RefreshCapsulePreview(id) => {
                self.refresh_capsule_preview(id);
            }
            Event::LaunchApp { app_type, options } => {
                if let Err(e) = self.launch_app(&app_type, options) {
                    warn!(%app_type, %e, "launch failed");
                }
            }
            Event::SaveAllStates => {
                self.save_all_states();
            }
            Event::RestoreSession => {
                self.restore_session();
            }
            Event::SetDesktopSize(size) => self.set_desktop_size(size.width, size.height),
            Event::UpdateAvailableArea(i) => {
                self.update_available_area(i.left, i.right, i.top, i.bottom)
            }
            Event::PointerDown(p) => self.pointer_down(p),
            Event::PointerMoved(p) => self.pointer_moved(p),
            Event::PointerReleased(p) => self.pointer_released(p),
            Event::Tick => self.tick(),
            Event::Config(cmd) => match self.config.apply_command(cmd) {
                Ok(()) => {}
                Err(e) => warn!(%e, "rejected config change"),
            },
            Event::Shutdown => debug!("shutdown requested"),
        }
    }

    /// Handles events already queued through [`EngineHandle`]s. Returns how
    /// many were handled.
    pub fn drain_events(&mut self) -> usize {
        let mut handled = 0;
        while let Ok((span, event)) = self.events_rx.try_recv() {
            let _guard = span.enter();
            self.handle_event(event);
            handled += 1;
        }
        handled
    }

    /// Waits for every in-flight capture and applies its result.
    pub async fn settle(&mut self) {
        while let Some(joined) = self.captures.join_next_with_id().await {
            self.on_capture_joined(joined);
        }
    }

    /// Drives the engine until [`Event::Shutdown`] arrives.
    pub async fn run(mut self) {
        let period = Duration::from_millis(self.config.settings.tick_interval_ms.max(1));
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                received = self.events_rx.recv() => {
                    let Some((span, event)) = received else { break };
                    let _guard = span.enter();
                    let shutdown = event == Event::Shutdown;
                    self.handle_event(event);
                    if shutdown {
                        break;
                    }
                }
                Some(joined) = self.captures.join_next_with_id(), if !self.captures.is_empty() => {
                    self.on_capture_joined(joined);
                }
                _ = ticker.tick() => self.tick(),
            }
        }
        self.captures.abort_all();
        trace!("engine loop exited");
    }

    fn capture_token(&mut self) -> CaptureToken {
        self.next_capture_token += 1;
        CaptureToken(self.next_capture_token)
    }
}

/// Region below the titlebar.
fn content_region(geometry: Rect, titlebar_height: i32) -> Rect {
    geometry.inset(0, 0, titlebar_height.min(geometry.height), 0)
}
