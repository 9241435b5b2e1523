use std::fmt;

use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

use crate::app::{ContentTarget, HostedApplication};
use crate::sys::geometry::Rect;

new_key_type! {
    pub struct WindowId;
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dbg = format!("{:?}", self);
        let digits: String = dbg.chars().filter(|c| c.is_ascii_digit() || *c == 'v').collect();
        f.write_str(&digits)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    #[default]
    Normal,
    Maximized,
    Minimized,
    Capsule,
}

impl LifecycleState {
    pub fn is_visible(self) -> bool { self != LifecycleState::Minimized }
}

/// Creation options. Geometry fields left as `None` are filled in by the
/// registry's cascading placement and the configured default size.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub icon: Option<String>,
    pub x: Option<i32>,
    pub y: Option<i32>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub resizable: bool,
    pub maximizable: bool,
    pub minimizable: bool,
    pub has_tab_strip: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: String::new(),
            icon: None,
            x: None,
            y: None,
            width: None,
            height: None,
            resizable: true,
            maximizable: true,
            minimizable: true,
            has_tab_strip: false,
        }
    }
}

impl WindowConfig {
    pub fn titled(title: impl Into<String>) -> Self {
        Self { title: title.into(), ..Default::default() }
    }

    pub fn with_geometry(mut self, rect: Rect) -> Self {
        self.x = Some(rect.x);
        self.y = Some(rect.y);
        self.width = Some(rect.width);
        self.height = Some(rect.height);
        self
    }

    /// Layers `overrides` on top of `self`; only the fields set there win.
    pub fn merged(mut self, overrides: &WindowConfigOverrides) -> Self {
        if let Some(title) = &overrides.title {
            self.title = title.clone();
        }
        if let Some(icon) = &overrides.icon {
            self.icon = Some(icon.clone());
        }
        self.x = overrides.x.or(self.x);
        self.y = overrides.y.or(self.y);
        self.width = overrides.width.or(self.width);
        self.height = overrides.height.or(self.height);
        self.resizable = overrides.resizable.unwrap_or(self.resizable);
        self.maximizable = overrides.maximizable.unwrap_or(self.maximizable);
        self.minimizable = overrides.minimizable.unwrap_or(self.minimizable);
        self.has_tab_strip = overrides.has_tab_strip.unwrap_or(self.has_tab_strip);
        self
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(default)]
pub struct WindowConfigOverrides {
    pub title: Option<String>,
    pub icon: Option<String>,
    pub x: Option<i32>,
    pub y: Option<i32>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub resizable: Option<bool>,
    pub maximizable: Option<bool>,
    pub minimizable: Option<bool>,
    pub has_tab_strip: Option<bool>,
}

impl WindowConfigOverrides {
    pub fn geometry(rect: Rect) -> Self {
        Self {
            x: Some(rect.x),
            y: Some(rect.y),
            width: Some(rect.width),
            height: Some(rect.height),
            ..Default::default()
        }
    }
}

/// Bitmap produced by a capture, or the SVG placeholder when capture failed.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PreviewImage {
    Bitmap { width: u32, height: u32, data: Vec<u8> },
    Placeholder { svg: String },
}

impl PreviewImage {
    pub fn is_placeholder(&self) -> bool { matches!(self, PreviewImage::Placeholder { .. }) }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CapsuleSnapshot {
    pub image: PreviewImage,
    /// Unix millis.
    pub captured_at: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct AppBinding {
    pub app_type: String,
    pub instance_id: String,
}

pub type TabId = String;

pub struct Tab {
    pub id: TabId,
    pub app: Box<dyn HostedApplication>,
}

#[derive(Default)]
pub enum ContentSlot {
    #[default]
    Empty,
    Single(Box<dyn HostedApplication>),
    Tabs {
        tabs: Vec<Tab>,
        active: Option<TabId>,
    },
}

impl fmt::Debug for ContentSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentSlot::Empty => f.write_str("Empty"),
            ContentSlot::Single(app) => write!(f, "Single({:?})", app.title()),
            ContentSlot::Tabs { tabs, active } => f
                .debug_struct("Tabs")
                .field("tabs", &tabs.iter().map(|t| &t.id).collect::<Vec<_>>())
                .field("active", active)
                .finish(),
        }
    }
}

impl ContentSlot {
    pub fn for_config(config: &WindowConfig) -> Self {
        if config.has_tab_strip {
            ContentSlot::Tabs { tabs: Vec::new(), active: None }
        } else {
            ContentSlot::Empty
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            ContentSlot::Empty => true,
            ContentSlot::Single(_) => false,
            ContentSlot::Tabs { tabs, .. } => tabs.is_empty(),
        }
    }

    /// Binds `app`. Tab strips append a new tab or replace the one with the same
    /// id; single slots replace their content. Returns whatever was replaced.
    pub fn load(
        &mut self,
        app: Box<dyn HostedApplication>,
        tab_id: Option<TabId>,
    ) -> Option<Box<dyn HostedApplication>> {
        match self {
            ContentSlot::Tabs { tabs, active } => {
                let id = tab_id.unwrap_or_else(|| {
                    (tabs.len()..)
                        .map(|n| format!("tab-{n}"))
                        .find(|candidate| tabs.iter().all(|t| &t.id != candidate))
                        .unwrap_or_default()
                });
                *active = Some(id.clone());
                if let Some(existing) = tabs.iter_mut().find(|t| t.id == id) {
                    Some(std::mem::replace(&mut existing.app, app))
                } else {
                    tabs.push(Tab { id, app });
                    None
                }
            }
            slot => match std::mem::replace(slot, ContentSlot::Single(app)) {
                ContentSlot::Single(old) => Some(old),
                _ => None,
            },
        }
    }

    /// The app whose title and state represent the window.
    pub fn primary(&self) -> Option<&dyn HostedApplication> {
        match self {
            ContentSlot::Empty => None,
            ContentSlot::Single(app) => Some(app.as_ref()),
            ContentSlot::Tabs { tabs, active } => active
                .as_ref()
                .and_then(|id| tabs.iter().find(|t| &t.id == id))
                .or_else(|| tabs.first())
                .map(|t| t.app.as_ref()),
        }
    }

    pub fn primary_mut(&mut self) -> Option<&mut Box<dyn HostedApplication>> {
        match self {
            ContentSlot::Empty => None,
            ContentSlot::Single(app) => Some(app),
            ContentSlot::Tabs { tabs, active } => {
                let idx = active
                    .as_ref()
                    .and_then(|id| tabs.iter().position(|t| &t.id == id))
                    .unwrap_or(0);
                tabs.get_mut(idx).map(|t| &mut t.app)
            }
        }
    }

    pub fn tab_ids(&self) -> Vec<TabId> {
        match self {
            ContentSlot::Tabs { tabs, .. } => tabs.iter().map(|t| t.id.clone()).collect(),
            _ => Vec::new(),
        }
    }

    pub fn active_tab(&self) -> Option<&TabId> {
        match self {
            ContentSlot::Tabs { active, .. } => active.as_ref(),
            _ => None,
        }
    }

    /// Re-renders every bound app into `target`.
    pub fn render_all(&mut self, target: &ContentTarget) {
        match self {
            ContentSlot::Empty => {}
            ContentSlot::Single(app) => app.render_into(target),
            ContentSlot::Tabs { tabs, .. } => {
                for tab in tabs {
                    let target = ContentTarget { tab: Some(tab.id.clone()), ..target.clone() };
                    tab.app.render_into(&target);
                }
            }
        }
    }

    /// Empties the slot, returning every bound app (all tabs).
    pub fn drain(&mut self) -> Vec<Box<dyn HostedApplication>> {
        match std::mem::take(self) {
            ContentSlot::Empty => Vec::new(),
            ContentSlot::Single(app) => vec![app],
            ContentSlot::Tabs { tabs, .. } => tabs.into_iter().map(|t| t.app).collect(),
        }
    }
}

#[derive(Debug)]
pub struct WindowRecord {
    pub id: WindowId,
    pub geometry: Rect,
    pub lifecycle: LifecycleState,
    pub z_order: u64,
    pub config: WindowConfig,
    /// Geometry to return to from Maximized or Capsule.
    pub saved_geometry: Option<Rect>,
    pub capsule_snapshot: Option<CapsuleSnapshot>,
    pub content: ContentSlot,
    pub app_binding: Option<AppBinding>,
    /// State to re-enter when leaving Minimized.
    pub restore_target: LifecycleState,
    /// Pre-snap geometry of a half or quarter snapped window.
    pub snap_restore: Option<Rect>,
}

impl WindowRecord {
    pub fn new(id: WindowId, config: WindowConfig, geometry: Rect, z_order: u64) -> Self {
        let content = ContentSlot::for_config(&config);
        Self {
            id,
            geometry,
            lifecycle: LifecycleState::Normal,
            z_order,
            config,
            saved_geometry: None,
            capsule_snapshot: None,
            content,
            app_binding: None,
            restore_target: LifecycleState::Normal,
            snap_restore: None,
        }
    }

    pub fn is_visible(&self) -> bool { self.lifecycle.is_visible() }

    pub fn is_capsule(&self) -> bool { self.lifecycle == LifecycleState::Capsule }

    /// Geometry the window has when it is neither maximized nor a capsule.
    pub fn normal_geometry(&self) -> Rect {
        let parked = matches!(self.lifecycle, LifecycleState::Maximized | LifecycleState::Capsule)
            || (self.lifecycle == LifecycleState::Minimized
                && self.restore_target == LifecycleState::Maximized);
        match (parked, self.saved_geometry) {
            (true, Some(saved)) => saved,
            _ => self.geometry,
        }
    }

    /// Title shown in chrome: the bound app's when it has one.
    pub fn display_title(&self) -> String {
        self.content
            .primary()
            .map(|app| app.title())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| self.config.title.clone())
    }

    pub fn display_icon(&self) -> Option<String> {
        self.content.primary().and_then(|app| app.icon()).or_else(|| self.config.icon.clone())
    }
}
