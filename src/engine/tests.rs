use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use test_log::test;

use super::*;
use crate::app::testing::{Log, Recorder};
use crate::app::{AppCapabilities, AppDescriptor};
use crate::capsule::capture::testing::{Scripted, ScriptedCapture};
use crate::capsule::{capsule_position, capsule_size};
use crate::interaction::{ResizeHandle, SnapZoneKind};
use crate::model::WindowConfigOverrides;
use crate::persistence::MemoryStore;
use crate::sys::clock::ManualClock;

const FIRST: Rect = Rect::new(40, 40, 800, 600);
const DESKTOP: Rect = Rect::new(0, 0, 1920, 1080);

struct Harness {
    engine: WindowManagerContext,
    clock: ManualClock,
    store: Arc<MemoryStore>,
    capture: Arc<ScriptedCapture>,
}

impl Harness {
    fn new() -> Self { Self::with(Config::default(), []) }

    fn without_animation() -> Self {
        let mut config = Config::default();
        config.settings.animate = false;
        Self::with(config, [])
    }

    fn capturing(script: impl IntoIterator<Item = Scripted>) -> Self {
        Self::with(Config::default(), script)
    }

    fn with(config: Config, script: impl IntoIterator<Item = Scripted>) -> Self {
        let clock = ManualClock::default();
        let store = Arc::new(MemoryStore::new());
        let capture = ScriptedCapture::new(script);
        let engine = WindowManagerContext::new(
            config,
            store.clone(),
            Arc::new(clock.clone()),
            capture.clone(),
        );
        Self { engine, clock, store, capture }
    }

    fn window(&self, id: WindowId) -> &WindowRecord {
        self.engine.get_window(id).expect("window exists")
    }

    fn geometry(&self, id: WindowId) -> Rect { self.window(id).geometry }

    fn lifecycle(&self, id: WindowId) -> LifecycleState { self.window(id).lifecycle }

    fn preview(&self, id: WindowId) -> Option<PreviewImage> {
        self.window(id).capsule_snapshot.as_ref().map(|s| s.image.clone())
    }

    fn instance_id(&self, id: WindowId) -> String {
        let binding = self.window(id).app_binding.as_ref().expect("app bound");
        binding.instance_id.clone()
    }

    /// Moves the pointer and flushes it with a tick.
    fn drag_to(&mut self, point: Point) {
        self.engine.pointer_moved(point);
        self.engine.tick();
    }

    fn hover(&mut self, ms: u64) {
        self.clock.advance_ms(ms);
        self.engine.tick();
    }
}

const LEFT_HALF: Rect = Rect::new(0, 0, 960, 1080);

/// Drags `id` by its titlebar into the left zone, releases, and stops a
/// quarter of the way through the snap animation.
fn snap_left_partway(h: &mut Harness, id: WindowId) {
    let grab = h.geometry(id).origin();
    h.engine.pointer_down(Point::new(grab.x + 60, grab.y + 10));
    h.drag_to(Point::new(5, 500));
    h.hover(800);
    h.engine.pointer_released(Point::new(5, 500));
    h.hover(50);
    assert!(h.engine.is_animating(id));
    assert_ne!(h.geometry(id), LEFT_HALF);
}

fn notes_descriptor(log: &Log) -> AppDescriptor {
    let log = log.clone();
    AppDescriptor::new(move |_| {
        let mut app = Recorder::new("notes", &log);
        app.state = Some(json!({ "text": "hello" }));
        Ok(Box::new(app))
    })
    .persistent()
    .with_capabilities(AppCapabilities::SERIALIZE_STATE | AppCapabilities::RESTORE_STATE)
}

// Windows and focus

#[test]
fn windows_cascade_and_stack_in_creation_order() {
    let mut h = Harness::new();
    let a = h.engine.create_window(WindowConfig::titled("a"));
    let b = h.engine.create_window(WindowConfig::titled("b"));

    assert_eq!(h.geometry(a), FIRST);
    assert_eq!(h.geometry(b), FIRST.offset(30, 30));
    assert!(h.window(b).z_order > h.window(a).z_order);
    assert_eq!(h.engine.active_window_id(), Some(b));

    let order: Vec<WindowId> = h.engine.get_all_windows().iter().map(|w| w.id).collect();
    assert_eq!(order, vec![a, b]);
}

#[test]
fn focus_raises_and_refocus_is_a_no_op() {
    let mut h = Harness::new();
    let a = h.engine.create_window(WindowConfig::titled("a"));
    let b = h.engine.create_window(WindowConfig::titled("b"));

    assert!(h.engine.focus_window(a));
    assert_eq!(h.engine.active_window_id(), Some(a));
    let z = h.window(a).z_order;
    assert!(z > h.window(b).z_order);

    assert!(!h.engine.focus_window(a));
    assert_eq!(h.window(a).z_order, z);
}

#[test]
fn active_window_is_returned_as_its_record() {
    let mut h = Harness::new();
    let a = h.engine.create_window(WindowConfig::titled("a"));
    let active = h.engine.get_active_window().expect("a window is active");
    assert_eq!(active.id, a);
    assert_eq!(active.config.title, "a");

    h.engine.clear_focus();
    assert!(h.engine.get_active_window().is_none());
}

#[test]
fn clicking_empty_desktop_clears_focus_only() {
    let mut h = Harness::new();
    let a = h.engine.create_window(WindowConfig::titled("a"));
    let z = h.window(a).z_order;

    h.engine.pointer_down(Point::new(1900, 1000));
    h.engine.pointer_released(Point::new(1900, 1000));

    assert_eq!(h.engine.active_window_id(), None);
    assert_eq!(h.window(a).z_order, z);
}

#[test]
fn explicit_geometry_is_floored_at_minimum_size() {
    let mut h = Harness::new();
    let id = h
        .engine
        .create_window(WindowConfig::titled("tiny").with_geometry(Rect::new(5, 6, 10, 10)));
    assert_eq!(h.geometry(id), Rect::new(5, 6, 320, 200));
}

#[test]
fn operations_on_closed_windows_are_ignored() {
    let mut h = Harness::new();
    let id = h.engine.create_window(WindowConfig::titled("gone"));
    assert!(h.engine.close_window(id));

    assert!(!h.engine.close_window(id));
    assert!(!h.engine.focus_window(id));
    assert!(!h.engine.minimize_window(id));
    assert!(!h.engine.restore_window(id));
    assert!(!h.engine.toggle_maximize_window(id));
    assert!(!h.engine.toggle_window_capsule(id));
    assert!(!h.engine.begin_drag(id, Point::new(100, 50)));
    assert_eq!(h.engine.window_count(), 0);
    assert_eq!(h.engine.active_window_id(), None);
}

#[test]
fn closing_the_active_window_focuses_the_next_one() {
    let mut h = Harness::new();
    let a = h.engine.create_window(WindowConfig::titled("a"));
    let b = h.engine.create_window(WindowConfig::titled("b"));
    h.engine.close_window(b);
    assert_eq!(h.engine.active_window_id(), Some(a));
}

#[test]
fn loading_an_app_binds_and_renders_it() {
    let mut h = Harness::new();
    let log = Log::default();
    let id = h.engine.create_window(WindowConfig::titled("host"));
    h.engine.load_app(id, Box::new(Recorder::new("one", &log)), None);
    h.engine.load_app(id, Box::new(Recorder::new("two", &log)), None);
    h.engine.close_window(id);

    assert_eq!(
        *log.borrow(),
        vec!["bind:one", "render:one:None", "bind:two", "close:one", "render:two:None", "close:two"]
    );
}

#[test]
fn apps_rerender_when_bounds_change() {
    let mut h = Harness::new();
    let log = Log::default();
    let id = h.engine.create_window(WindowConfig::titled("host"));
    h.engine.load_app(id, Box::new(Recorder::new("app", &log)), None);
    log.borrow_mut().clear();

    h.engine.toggle_maximize_window(id);
    h.engine.toggle_maximize_window(id);
    assert_eq!(*log.borrow(), vec!["render:app:None", "render:app:None"]);
}

// Lifecycle

#[test]
fn maximize_round_trip_restores_geometry() {
    let mut h = Harness::new();
    let id = h.engine.create_window(WindowConfig::titled("a"));

    assert!(h.engine.toggle_maximize_window(id));
    assert_eq!(h.lifecycle(id), LifecycleState::Maximized);
    assert_eq!(h.geometry(id), DESKTOP);

    assert!(h.engine.toggle_maximize_window(id));
    assert_eq!(h.lifecycle(id), LifecycleState::Normal);
    assert_eq!(h.geometry(id), FIRST);
}

#[test]
fn non_maximizable_windows_stay_normal() {
    let mut h = Harness::new();
    let config = WindowConfig { maximizable: false, ..WindowConfig::titled("fixed") };
    let id = h.engine.create_window(config);
    assert!(!h.engine.toggle_maximize_window(id));
    assert_eq!(h.lifecycle(id), LifecycleState::Normal);
}

#[test]
fn minimize_hides_and_restore_returns_to_previous_state() {
    let mut h = Harness::new();
    let a = h.engine.create_window(WindowConfig::titled("a"));
    let b = h.engine.create_window(WindowConfig::titled("b"));
    h.engine.toggle_maximize_window(b);

    assert!(h.engine.minimize_window(b));
    assert!(!h.engine.minimize_window(b));
    assert_eq!(h.engine.active_window_id(), Some(a));
    assert!(h.engine.render_frame().windows.iter().all(|w| w.id != b));
    assert_eq!(h.engine.window_views().len(), 2);

    assert!(h.engine.restore_window(b));
    assert_eq!(h.lifecycle(b), LifecycleState::Maximized);
    assert_eq!(h.engine.active_window_id(), Some(b));
    assert!(h.window(b).z_order > h.window(a).z_order);
}

#[test]
fn available_area_changes_refit_maximized_windows() {
    let mut h = Harness::new();
    let max = h.engine.create_window(WindowConfig::titled("max"));
    let parked = h.engine.create_window(WindowConfig::titled("parked"));
    let normal = h.engine.create_window(WindowConfig::titled("normal"));
    h.engine.toggle_maximize_window(max);
    h.engine.toggle_maximize_window(parked);
    h.engine.minimize_window(parked);

    h.engine.update_available_area(0, 0, 0, 48);
    let area = Rect::new(0, 0, 1920, 1032);
    assert_eq!(h.engine.available_area(), area);
    assert_eq!(h.geometry(max), area);
    assert_eq!(h.geometry(parked), area);
    assert_eq!(h.geometry(normal), FIRST.offset(60, 60));

    h.engine.set_desktop_size(1280, 720);
    assert_eq!(h.geometry(max), Rect::new(0, 0, 1280, 672));
}

// Pointer

#[test]
fn drag_moves_are_coalesced_until_tick() {
    let mut h = Harness::new();
    let id = h.engine.create_window(WindowConfig::titled("a"));

    h.engine.pointer_down(Point::new(100, 50));
    assert!(h.engine.is_interacting());
    h.engine.pointer_moved(Point::new(110, 60));
    h.engine.pointer_moved(Point::new(150, 90));
    assert_eq!(h.geometry(id), FIRST);

    h.engine.tick();
    assert_eq!(h.geometry(id), FIRST.offset(50, 40));

    h.engine.pointer_released(Point::new(160, 90));
    assert_eq!(h.geometry(id), FIRST.offset(60, 40));
    assert!(!h.engine.is_interacting());
}

#[test]
fn clicking_content_focuses_without_dragging() {
    let mut h = Harness::new();
    let a = h.engine.create_window(WindowConfig::titled("a"));
    h.engine.create_window(WindowConfig::titled("b"));

    // Inside a, outside b.
    h.engine.pointer_down(Point::new(50, 300));
    assert_eq!(h.engine.active_window_id(), Some(a));
    assert!(!h.engine.is_interacting());
}

#[test]
fn resize_keeps_opposite_edge_and_minimum_size() {
    let mut h = Harness::new();
    let id = h.engine.create_window(WindowConfig::titled("a"));

    assert_eq!(
        h.engine.hit_test(Point::new(842, 642)),
        Some((id, HitTarget::Resize(ResizeHandle::Se)))
    );
    h.engine.pointer_down(Point::new(842, 642));
    h.drag_to(Point::new(942, 692));
    assert_eq!(h.geometry(id), Rect::new(40, 40, 900, 650));

    h.engine.pointer_released(Point::new(0, 0));
    assert_eq!(h.geometry(id), Rect::new(40, 40, 320, 200));
}

#[test]
fn west_resize_clamps_position_with_size() {
    let mut h = Harness::new();
    let id = h.engine.create_window(WindowConfig::titled("a"));

    assert!(h.engine.begin_resize(id, ResizeHandle::W, Point::new(37, 300)));
    h.drag_to(Point::new(1500, 300));
    assert_eq!(h.geometry(id), Rect::new(520, 40, 320, 600));
}

#[test]
fn maximized_windows_have_no_resize_handles() {
    let mut h = Harness::new();
    let id = h.engine.create_window(WindowConfig::titled("a"));
    assert_eq!(h.engine.resize_handles(id).len(), 8);
    h.engine.toggle_maximize_window(id);
    assert!(h.engine.resize_handles(id).is_empty());
    assert!(!h.engine.begin_resize(id, ResizeHandle::Se, Point::new(1920, 1080)));
}

#[test]
fn control_buttons_fire_on_release_over_the_button() {
    let mut h = Harness::new();
    let id = h.engine.create_window(WindowConfig::titled("a"));
    let buttons = h.engine.control_buttons(id);
    let kinds: Vec<ControlButton> = buttons.iter().map(|(b, _)| *b).collect();
    assert_eq!(
        kinds,
        vec![
            ControlButton::Close,
            ControlButton::Maximize,
            ControlButton::Minimize,
            ControlButton::Capsule
        ]
    );
    let maximize = buttons[1].1;
    let center = Point::new(maximize.x + maximize.width / 2, maximize.y + 10);

    // Released elsewhere: nothing happens.
    h.engine.pointer_down(center);
    h.engine.pointer_released(Point::new(500, 500));
    assert_eq!(h.lifecycle(id), LifecycleState::Normal);

    h.engine.pointer_down(center);
    h.engine.pointer_released(center);
    assert_eq!(h.lifecycle(id), LifecycleState::Maximized);
}

#[test]
fn close_button_closes_window() {
    let mut h = Harness::new();
    let id = h.engine.create_window(WindowConfig::titled("a"));
    let close = h.engine.control_buttons(id)[0].1;
    let center = Point::new(close.x + 5, close.y + 5);
    h.engine.pointer_down(center);
    h.engine.pointer_released(center);
    assert_eq!(h.engine.window_count(), 0);
}

#[test]
fn hovering_top_edge_shows_preview_after_delay_and_maximizes() {
    let mut h = Harness::new();
    let id = h.engine.create_window(WindowConfig::titled("a"));

    h.engine.pointer_down(Point::new(100, 50));
    h.drag_to(Point::new(960, 5));
    assert_eq!(h.engine.snap_preview(), None);

    h.hover(799);
    assert_eq!(h.engine.snap_preview(), None);
    h.hover(1);
    let preview = h.engine.render_frame().preview.expect("preview visible");
    assert_eq!(preview.zone, SnapZoneKind::Top);
    assert_eq!(preview.target, DESKTOP);

    h.engine.pointer_released(Point::new(960, 5));
    assert_eq!(h.lifecycle(id), LifecycleState::Maximized);
    assert_eq!(h.window(id).saved_geometry, Some(FIRST));
    assert!(h.engine.is_animating(id));

    h.hover(100);
    assert!(h.engine.is_animating(id));
    h.hover(150);
    assert!(!h.engine.is_animating(id));
    assert_eq!(h.geometry(id), DESKTOP);

    h.engine.toggle_maximize_window(id);
    assert_eq!(h.geometry(id), FIRST);
}

#[test]
fn leaving_a_zone_before_the_delay_cancels_the_snap() {
    let mut h = Harness::without_animation();
    let id = h.engine.create_window(WindowConfig::titled("a"));

    h.engine.pointer_down(Point::new(100, 50));
    h.drag_to(Point::new(5, 500));
    h.hover(500);
    h.drag_to(Point::new(400, 500));
    h.hover(500);
    assert_eq!(h.engine.snap_preview(), None);

    h.engine.pointer_released(Point::new(400, 500));
    assert_eq!(h.lifecycle(id), LifecycleState::Normal);
    assert_eq!(h.window(id).snap_restore, None);
    assert_eq!(h.geometry(id), FIRST.offset(300, 450));
}

#[test]
fn snapped_window_unsnaps_when_dragged() {
    let mut h = Harness::without_animation();
    let id = h.engine.create_window(WindowConfig::titled("a"));

    h.engine.pointer_down(Point::new(100, 50));
    h.drag_to(Point::new(5, 500));
    h.hover(800);
    h.engine.pointer_released(Point::new(5, 500));
    assert_eq!(h.geometry(id), Rect::new(0, 0, 960, 1080));
    assert_eq!(h.window(id).snap_restore, Some(FIRST));

    // Grab the middle of the titlebar; the restored window stays centred on
    // the pointer.
    h.engine.pointer_down(Point::new(480, 10));
    h.drag_to(Point::new(500, 300));
    assert_eq!(h.geometry(id), Rect::new(100, 290, 800, 600));
    assert_eq!(h.window(id).snap_restore, None);
    h.engine.pointer_released(Point::new(500, 300));
    assert_eq!(h.lifecycle(id), LifecycleState::Normal);
}

#[test]
fn maximized_window_unsnaps_on_first_move_only() {
    let mut h = Harness::without_animation();
    let id = h.engine.create_window(WindowConfig::titled("a"));
    h.engine.toggle_maximize_window(id);

    h.engine.pointer_down(Point::new(960, 10));
    h.engine.tick();
    assert_eq!(h.lifecycle(id), LifecycleState::Maximized);

    h.drag_to(Point::new(960, 200));
    assert_eq!(h.lifecycle(id), LifecycleState::Normal);
    assert_eq!(h.window(id).saved_geometry, None);
    assert_eq!(h.geometry(id), Rect::new(560, 190, 800, 600));
}

#[test]
fn click_on_maximized_titlebar_keeps_it_maximized() {
    let mut h = Harness::new();
    let id = h.engine.create_window(WindowConfig::titled("a"));
    h.engine.toggle_maximize_window(id);
    h.engine.pointer_down(Point::new(960, 10));
    h.engine.pointer_released(Point::new(960, 10));
    assert_eq!(h.lifecycle(id), LifecycleState::Maximized);
    assert_eq!(h.geometry(id), DESKTOP);
}

#[test]
fn snapping_can_be_turned_off_by_config_event() {
    let mut h = Harness::without_animation();
    let id = h.engine.create_window(WindowConfig::titled("a"));
    h.engine.handle_event(Event::Config(ConfigCommand::SetSnapping(false)));

    h.engine.pointer_down(Point::new(100, 50));
    h.drag_to(Point::new(960, 5));
    h.hover(2000);
    h.engine.pointer_released(Point::new(960, 5));
    assert_eq!(h.lifecycle(id), LifecycleState::Normal);
}

#[test]
fn maximizing_mid_snap_saves_the_snap_target() {
    let mut h = Harness::new();
    let id = h.engine.create_window(WindowConfig::titled("a"));
    snap_left_partway(&mut h, id);

    assert!(h.engine.toggle_maximize_window(id));
    assert!(!h.engine.is_animating(id));
    assert_eq!(h.window(id).saved_geometry, Some(LEFT_HALF));
    assert_eq!(h.geometry(id), DESKTOP);

    h.hover(500);
    assert_eq!(h.geometry(id), DESKTOP);
    assert!(h.engine.toggle_maximize_window(id));
    assert_eq!(h.geometry(id), LEFT_HALF);
}

#[test]
fn minimizing_mid_snap_lands_on_the_snap_target() {
    let mut h = Harness::new();
    let id = h.engine.create_window(WindowConfig::titled("a"));
    snap_left_partway(&mut h, id);

    assert!(h.engine.minimize_window(id));
    assert!(!h.engine.is_animating(id));
    assert!(h.engine.restore_window(id));
    assert_eq!(h.geometry(id), LEFT_HALF);
}

// Capsules

#[test(tokio::test)]
async fn capsule_enters_after_capture_and_exits_immediately() {
    let mut h = Harness::capturing([Scripted::Image(ScriptedCapture::bitmap(7))]);
    let id = h.engine.create_window(WindowConfig::titled("Editor"));

    assert!(h.engine.toggle_window_capsule(id));
    assert!(h.engine.has_pending_capture(id));
    assert_eq!(h.lifecycle(id), LifecycleState::Normal);
    assert!(!h.engine.begin_drag(id, Point::new(100, 50)));

    h.engine.settle().await;
    assert!(!h.engine.has_pending_capture(id));
    assert_eq!(h.lifecycle(id), LifecycleState::Capsule);
    let settings = &h.engine.config().settings.capsule;
    let size = capsule_size("Editor", settings);
    let origin = capsule_position(DESKTOP, size, &[], settings);
    assert_eq!(h.geometry(id), Rect::from_parts(origin, size));
    assert_eq!(
        h.window(id).capsule_snapshot.as_ref().map(|s| s.image.clone()),
        Some(ScriptedCapture::bitmap(7))
    );
    let request = h.capture.requests.lock()[0].clone();
    assert_eq!(request.region, Rect::new(40, 72, 800, 568));
    assert!(h.capture.visibility_log().is_empty());

    assert!(h.engine.toggle_window_capsule(id));
    assert_eq!(h.lifecycle(id), LifecycleState::Normal);
    assert_eq!(h.geometry(id), FIRST);
    assert!(h.window(id).capsule_snapshot.is_none());
}

#[test(tokio::test)]
async fn capsule_toggle_is_ignored_while_capturing() {
    let mut h = Harness::capturing([Scripted::Image(ScriptedCapture::bitmap(1))]);
    let id = h.engine.create_window(WindowConfig::titled("a"));

    assert!(h.engine.toggle_window_capsule(id));
    assert!(!h.engine.toggle_window_capsule(id));
    h.engine.settle().await;
    assert_eq!(h.capture.requests.lock().len(), 1);
    assert_eq!(h.lifecycle(id), LifecycleState::Capsule);
}

#[test(tokio::test)]
async fn failed_capture_falls_back_to_cache_then_placeholder() {
    let mut h = Harness::capturing([
        Scripted::Fail,
        Scripted::Image(ScriptedCapture::bitmap(3)),
        Scripted::Fail,
    ]);
    let id = h.engine.create_window(WindowConfig::titled("a"));

    h.engine.toggle_window_capsule(id);
    h.engine.settle().await;
    assert!(h.preview(id).is_some_and(|i| i.is_placeholder()));

    h.engine.toggle_window_capsule(id);
    h.engine.toggle_window_capsule(id);
    h.engine.settle().await;
    assert_eq!(h.preview(id), Some(ScriptedCapture::bitmap(3)));

    h.engine.toggle_window_capsule(id);
    h.engine.toggle_window_capsule(id);
    h.engine.settle().await;
    assert_eq!(h.preview(id), Some(ScriptedCapture::bitmap(3)));
    assert_eq!(h.engine.render_frame().windows[0].placeholder_preview, Some(false));
}

#[test(tokio::test)]
async fn panicking_capture_still_enters_capsule() {
    let mut h = Harness::capturing([Scripted::Panic]);
    let id = h.engine.create_window(WindowConfig::titled("a"));
    h.engine.toggle_window_capsule(id);
    h.engine.settle().await;
    assert_eq!(h.lifecycle(id), LifecycleState::Capsule);
    assert!(h.window(id).capsule_snapshot.as_ref().is_some_and(|s| s.image.is_placeholder()));
}

#[test(tokio::test)]
async fn minimized_window_is_made_visible_for_capture() {
    let mut h = Harness::capturing([Scripted::Image(ScriptedCapture::bitmap(2))]);
    let id = h.engine.create_window(WindowConfig::titled("a"));
    h.engine.toggle_maximize_window(id);
    h.engine.minimize_window(id);

    h.engine.toggle_window_capsule(id);
    h.engine.settle().await;
    assert_eq!(h.capture.visibility_log(), vec![(id, true), (id, false)]);
    assert_eq!(h.lifecycle(id), LifecycleState::Capsule);
    assert_eq!(h.window(id).saved_geometry, Some(FIRST));

    h.engine.restore_window(id);
    assert_eq!(h.lifecycle(id), LifecycleState::Normal);
    assert_eq!(h.geometry(id), FIRST);
}

#[test(tokio::test)]
async fn capsules_cascade_and_stack_above_normal_windows() {
    let mut h = Harness::capturing([
        Scripted::Image(ScriptedCapture::bitmap(1)),
        Scripted::Image(ScriptedCapture::bitmap(2)),
    ]);
    let a = h.engine.create_window(WindowConfig::titled("a"));
    let b = h.engine.create_window(WindowConfig::titled("b"));
    let c = h.engine.create_window(WindowConfig::titled("c"));
    h.engine.toggle_window_capsule(a);
    h.engine.settle().await;
    h.engine.toggle_window_capsule(b);
    h.engine.settle().await;

    let offset = h.engine.config().settings.capsule.cascade_offset;
    let first = h.geometry(a).origin();
    assert_eq!(h.geometry(b).origin(), Point::new(first.x - offset, first.y + offset));

    h.engine.focus_window(c);
    assert!(h.window(a).z_order > h.window(c).z_order);
    assert!(h.window(b).z_order > h.window(a).z_order);

    // Capsules only offer close and expand, and cannot be resized.
    let kinds: Vec<ControlButton> = h.engine.control_buttons(a).into_iter().map(|(b, _)| b).collect();
    assert_eq!(kinds, vec![ControlButton::Close, ControlButton::Capsule]);
    assert!(h.engine.resize_handles(a).is_empty());
}

#[test(tokio::test)]
async fn closing_during_capture_drops_the_result() {
    let mut h = Harness::capturing([Scripted::Image(ScriptedCapture::bitmap(1))]);
    let id = h.engine.create_window(WindowConfig::titled("a"));
    h.engine.toggle_window_capsule(id);
    h.engine.close_window(id);
    assert!(!h.engine.has_pending_capture(id));
    h.engine.settle().await;
    assert_eq!(h.engine.window_count(), 0);
}

#[test(tokio::test)]
async fn refresh_updates_the_capsule_preview() {
    let mut h = Harness::capturing([
        Scripted::Image(ScriptedCapture::bitmap(1)),
        Scripted::Image(ScriptedCapture::bitmap(2)),
    ]);
    let id = h.engine.create_window(WindowConfig::titled("a"));
    assert!(!h.engine.refresh_capsule_preview(id));

    h.engine.toggle_window_capsule(id);
    h.engine.settle().await;
    let geometry = h.geometry(id);

    assert!(h.engine.refresh_capsule_preview(id));
    h.engine.settle().await;
    assert_eq!(h.lifecycle(id), LifecycleState::Capsule);
    assert_eq!(h.geometry(id), geometry);
    assert_eq!(
        h.window(id).capsule_snapshot.as_ref().map(|s| s.image.clone()),
        Some(ScriptedCapture::bitmap(2))
    );
    assert_eq!(h.capture.visibility_log(), vec![(id, true), (id, false)]);
}

#[test(tokio::test)]
async fn stale_capture_results_are_ignored() {
    let mut h = Harness::capturing([Scripted::Image(ScriptedCapture::bitmap(1))]);
    let id = h.engine.create_window(WindowConfig::titled("a"));
    h.engine.toggle_window_capsule(id);
    h.engine.handle_capture_result(id, CaptureToken(999), Ok(ScriptedCapture::bitmap(9)));
    assert_eq!(h.lifecycle(id), LifecycleState::Normal);
    assert!(h.engine.has_pending_capture(id));
    h.engine.settle().await;
    assert_eq!(h.lifecycle(id), LifecycleState::Capsule);
}

#[test(tokio::test)]
async fn capsule_round_trip_mid_snap_returns_to_the_snap_target() {
    let mut h = Harness::capturing([Scripted::Image(ScriptedCapture::bitmap(2))]);
    let id = h.engine.create_window(WindowConfig::titled("a"));
    snap_left_partway(&mut h, id);

    assert!(h.engine.toggle_window_capsule(id));
    assert!(!h.engine.is_animating(id));
    let request = h.capture.requests.lock()[0].clone();
    assert_eq!(request.region, Rect::new(0, 32, 960, 1048));

    h.engine.settle().await;
    assert_eq!(h.lifecycle(id), LifecycleState::Capsule);
    assert_eq!(h.window(id).saved_geometry, Some(LEFT_HALF));

    assert!(h.engine.toggle_window_capsule(id));
    assert_eq!(h.geometry(id), LEFT_HALF);
}

// Apps and persistence

#[test]
fn unknown_app_type_is_an_error() {
    let mut h = Harness::new();
    let err = h.engine.launch_app("nope", LaunchOptions::default()).unwrap_err();
    assert!(matches!(err, EngineError::UnknownAppType(t) if t == "nope"));
}

#[test]
fn failing_factory_leaves_no_window() {
    let mut h = Harness::new();
    h.engine
        .register_app("broken", AppDescriptor::new(|_| Err(anyhow::anyhow!("boom"))))
        .unwrap();
    let err = h.engine.launch_app("broken", LaunchOptions::default()).unwrap_err();
    assert!(matches!(&err, EngineError::AppInitFailed { reason, .. } if reason == "boom"));
    assert_eq!(h.engine.window_count(), 0);
}

#[test]
fn singleton_launch_focuses_existing_instance() {
    let mut h = Harness::new();
    h.engine
        .register_app(
            "settings",
            AppDescriptor::new(|_| Ok(Recorder::boxed("settings"))).singleton(),
        )
        .unwrap();
    let first = h.engine.launch_app("settings", LaunchOptions::default()).unwrap();
    h.engine.minimize_window(first);

    let second = h.engine.launch_app("settings", LaunchOptions::default()).unwrap();
    assert_eq!(first, second);
    assert_eq!(h.engine.window_count(), 1);
    assert_eq!(h.lifecycle(first), LifecycleState::Normal);
    assert_eq!(h.engine.active_window_id(), Some(first));
}

#[test]
fn launch_applies_overrides_and_binding() {
    let mut h = Harness::new();
    h.engine
        .register_app(
            "term",
            AppDescriptor::new(|_| Ok(Recorder::boxed("term")))
                .with_config(WindowConfig::titled("Terminal")),
        )
        .unwrap();
    let options = LaunchOptions {
        config: WindowConfigOverrides { width: Some(500), ..Default::default() },
        instance_id: Some("main".into()),
        ..Default::default()
    };
    let id = h.engine.launch_app("term", options).unwrap();
    let window = h.window(id);
    assert_eq!(window.geometry.width, 500);
    assert_eq!(window.config.title, "Terminal");
    assert_eq!(window.display_title(), "term");
    let binding = window.app_binding.clone().unwrap();
    assert_eq!((binding.app_type.as_str(), binding.instance_id.as_str()), ("term", "main"));
}

#[test]
fn saved_state_round_trips_through_the_store() {
    let mut h = Harness::new();
    let log = Log::default();
    h.engine.register_app("notes", notes_descriptor(&log)).unwrap();

    let id = h.engine.launch_app("notes", LaunchOptions::default()).unwrap();
    h.engine.toggle_maximize_window(id);
    assert_eq!(h.engine.save_window_state(id).unwrap(), true);
    h.engine.close_window(id);
    assert_eq!(h.store.len(), 1);

    let restored = h.engine.launch_app("notes", LaunchOptions::restoring()).unwrap();
    assert_eq!(h.lifecycle(restored), LifecycleState::Maximized);
    assert_eq!(h.window(restored).saved_geometry, Some(FIRST));
    assert!(log.borrow().iter().any(|e| e == r#"restore:notes:{"text":"hello"}"#));

    assert_eq!(h.engine.clear_all_app_data(), 1);
    assert!(h.store.is_empty());
}

#[test]
fn closing_mid_snap_saves_the_snap_target() {
    let mut h = Harness::new();
    h.engine.register_app("notes", notes_descriptor(&Log::default())).unwrap();
    let id = h.engine.launch_app("notes", LaunchOptions::default()).unwrap();
    snap_left_partway(&mut h, id);

    h.engine.close_window(id);
    let restored = h.engine.launch_app("notes", LaunchOptions::restoring()).unwrap();
    assert_eq!(h.geometry(restored), LEFT_HALF);
}

#[test]
fn saving_all_mid_snap_saves_the_snap_target() {
    let mut h = Harness::new();
    h.engine.register_app("notes", notes_descriptor(&Log::default())).unwrap();
    let id = h.engine.launch_app("notes", LaunchOptions::default()).unwrap();
    snap_left_partway(&mut h, id);

    assert_eq!(h.engine.save_all_states(), 1);
    h.engine.destroy_window(id);
    let restored = h.engine.launch_app("notes", LaunchOptions::restoring()).unwrap();
    assert_eq!(h.geometry(restored), LEFT_HALF);
}

#[test]
fn restoring_launch_gets_its_own_instance_while_the_saved_one_is_open() {
    let mut h = Harness::new();
    h.engine.register_app("notes", notes_descriptor(&Log::default())).unwrap();
    let a = h.engine.launch_app("notes", LaunchOptions::default()).unwrap();
    assert_eq!(h.engine.save_all_states(), 1);

    let b = h.engine.launch_app("notes", LaunchOptions::restoring()).unwrap();
    let (first, second) = (h.instance_id(a), h.instance_id(b));
    assert_ne!(first, second);

    h.engine.close_window(a);
    h.engine.close_window(b);
    assert_eq!(h.store.len(), 2);

    let reopened = h.engine.launch_app("notes", LaunchOptions::restoring()).unwrap();
    assert!([first, second].contains(&h.instance_id(reopened)));
}

#[test]
fn non_persistent_apps_are_not_saved() {
    let mut h = Harness::new();
    h.engine.register_app("calc", AppDescriptor::new(|_| Ok(Recorder::boxed("calc")))).unwrap();
    let id = h.engine.launch_app("calc", LaunchOptions::default()).unwrap();
    assert_eq!(h.engine.save_window_state(id).unwrap(), false);
    assert_eq!(h.engine.save_all_states(), 0);
    assert!(h.store.is_empty());
}

#[test]
fn persistence_can_be_disabled() {
    let mut config = Config::default();
    config.persistence.enabled = false;
    let mut h = Harness::with(config, []);
    h.engine.register_app("notes", notes_descriptor(&Log::default())).unwrap();
    let id = h.engine.launch_app("notes", LaunchOptions::default()).unwrap();
    h.engine.close_window(id);
    assert!(h.store.is_empty());
}

#[test]
fn quota_errors_surface_from_explicit_saves() {
    let clock = ManualClock::default();
    let mut engine = WindowManagerContext::new(
        Config::default(),
        Arc::new(MemoryStore::with_quota(10)),
        Arc::new(clock),
        ScriptedCapture::new([]),
    );
    engine.register_app("notes", notes_descriptor(&Log::default())).unwrap();
    let id = engine.launch_app("notes", LaunchOptions::default()).unwrap();
    let err = engine.save_window_state(id).unwrap_err();
    assert!(matches!(err, EngineError::Persistence(_)));
    // Close still goes through.
    assert!(engine.close_window(id));
}

#[test]
fn restore_session_relaunches_auto_restore_types_once() {
    let mut h = Harness::new();
    let log = Log::default();
    h.engine.register_app("notes", notes_descriptor(&log).auto_restore()).unwrap();
    h.engine.register_app("scratch", notes_descriptor(&log)).unwrap();

    let notes = h.engine.launch_app("notes", LaunchOptions::default()).unwrap();
    let scratch = h.engine.launch_app("scratch", LaunchOptions::default()).unwrap();
    h.engine.close_window(notes);
    h.engine.close_window(scratch);
    assert_eq!(h.store.len(), 2);

    let restored = h.engine.restore_session();
    assert_eq!(restored.len(), 1);
    assert_eq!(h.window(restored[0]).app_binding.as_ref().unwrap().app_type, "notes");
    assert!(h.engine.restore_session().is_empty());
}

#[test]
fn cleanup_drops_old_states() {
    let mut h = Harness::new();
    h.engine.register_app("notes", notes_descriptor(&Log::default())).unwrap();
    let id = h.engine.launch_app("notes", LaunchOptions::default()).unwrap();
    h.engine.close_window(id);

    h.clock.advance(Duration::from_secs(2 * 24 * 3600));
    assert_eq!(h.engine.cleanup_old_states(Duration::from_secs(24 * 3600)), 1);
    assert!(h.store.is_empty());
}

// Events

#[test]
fn handle_events_are_drained_in_order() {
    let mut h = Harness::new();
    let handle = h.engine.handle();
    handle.send(Event::CreateWindow(WindowConfig::titled("a")));
    handle.send(Event::CreateWindow(WindowConfig::titled("b")));
    assert_eq!(h.engine.window_count(), 0);

    assert_eq!(h.engine.drain_events(), 2);
    let titles: Vec<String> =
        h.engine.window_views().into_iter().map(|v| v.title).collect();
    assert_eq!(titles, vec!["a", "b"]);

    let first = h.engine.get_all_windows()[0].id;
    handle.send(Event::MinimizeWindow(first));
    handle.send(Event::Config(ConfigCommand::SetAnimate(false)));
    h.engine.drain_events();
    assert_eq!(h.lifecycle(first), LifecycleState::Minimized);
    assert!(!h.engine.config().settings.animate);
}

#[test]
fn invalid_config_events_are_rejected() {
    let mut h = Harness::new();
    h.engine.handle_event(Event::Config(ConfigCommand::SetAnimationDuration(-1.0)));
    assert_eq!(h.engine.config().settings.animation_duration, 0.2);
}

#[test(tokio::test)]
async fn run_loop_stops_on_shutdown() {
    let h = Harness::new();
    let handle = h.engine.handle();
    handle.send(Event::CreateWindow(WindowConfig::titled("a")));
    handle.send(Event::Shutdown);
    tokio::time::timeout(Duration::from_secs(5), h.engine.run())
        .await
        .expect("engine loop exits");
}
