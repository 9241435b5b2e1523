//! Hosted applications and the registry that launches them.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::common::collections::HashMap;
use crate::engine::{EngineError, EngineHandle};
use crate::model::{TabId, WindowConfig, WindowConfigOverrides, WindowId};
use crate::sys::geometry::Rect;

/// Where an app renders: its window, the tab within it, and the content bounds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentTarget {
    pub window: WindowId,
    pub tab: Option<TabId>,
    pub bounds: Rect,
}

/// An application living inside a window's content slot.
///
/// Only `render_into` and `title` are required. Apps that persist state
/// implement the serialize/deserialize pair and declare it through
/// [`AppCapabilities`] when registered.
pub trait HostedApplication {
    fn render_into(&mut self, target: &ContentTarget);

    fn title(&self) -> String;

    fn icon(&self) -> Option<String> { None }

    /// Called once the app is bound to its window. The handle outlives the
    /// call and can be used to request window operations later.
    fn bind(&mut self, _handle: EngineHandle, _window: WindowId) {}

    fn on_close(&mut self) {}

    fn serialize_state(&self) -> Option<Value> { None }

    fn deserialize_state(&mut self, _state: Value) -> anyhow::Result<()> { Ok(()) }
}

bitflags! {
    #[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AppCapabilities: u8 {
        const SERIALIZE_STATE = 1 << 0;
        const RESTORE_STATE = 1 << 1;
    }
}

/// Passed to an [`AppFactory`] when a new instance is constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppContext {
    pub app_type: String,
    pub instance_id: String,
    pub window: WindowId,
}

pub type AppFactory = Box<dyn Fn(&AppContext) -> anyhow::Result<Box<dyn HostedApplication>>>;

pub struct AppDescriptor {
    pub singleton: bool,
    pub persistent: bool,
    pub auto_restore: bool,
    pub default_config: WindowConfig,
    pub capabilities: AppCapabilities,
    pub factory: AppFactory,
}

impl std::fmt::Debug for AppDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppDescriptor")
            .field("singleton", &self.singleton)
            .field("persistent", &self.persistent)
            .field("auto_restore", &self.auto_restore)
            .field("default_config", &self.default_config)
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}

impl AppDescriptor {
    pub fn new<F>(factory: F) -> Self
    where F: Fn(&AppContext) -> anyhow::Result<Box<dyn HostedApplication>> + 'static {
        Self {
            singleton: false,
            persistent: false,
            auto_restore: false,
            default_config: WindowConfig::default(),
            capabilities: AppCapabilities::empty(),
            factory: Box::new(factory),
        }
    }

    pub fn singleton(mut self) -> Self {
        self.singleton = true;
        self
    }

    pub fn persistent(mut self) -> Self {
        self.persistent = true;
        self
    }

    pub fn auto_restore(mut self) -> Self {
        self.auto_restore = true;
        self
    }

    pub fn with_config(mut self, config: WindowConfig) -> Self {
        self.default_config = config;
        self
    }

    pub fn with_capabilities(mut self, capabilities: AppCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    fn validate(&self, app_type: &str) -> Result<(), EngineError> {
        if app_type.is_empty() || app_type.contains(':') {
            return Err(EngineError::InvalidDescriptor {
                app_type: app_type.to_string(),
                reason: "app type must be non-empty and must not contain ':'".to_string(),
            });
        }
        if self.persistent && !self.capabilities.contains(AppCapabilities::SERIALIZE_STATE) {
            return Err(EngineError::InvalidDescriptor {
                app_type: app_type.to_string(),
                reason: "persistent apps must declare SERIALIZE_STATE".to_string(),
            });
        }
        if self.auto_restore && !self.persistent {
            return Err(EngineError::InvalidDescriptor {
                app_type: app_type.to_string(),
                reason: "auto_restore requires persistent".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(default)]
pub struct LaunchOptions {
    /// Layered over the descriptor's default config and any persisted geometry.
    pub config: WindowConfigOverrides,
    /// Load the most recent saved state for the type first.
    pub restore: bool,
    /// Reuse a specific instance id instead of generating one.
    pub instance_id: Option<String>,
}

impl LaunchOptions {
    pub fn restoring() -> Self { Self { restore: true, ..Default::default() } }
}

#[derive(Debug, Default)]
pub struct AppRegistry {
    descriptors: HashMap<String, AppDescriptor>,
    instance_seq: u64,
}

impl AppRegistry {
    pub fn new() -> Self { Self::default() }

    pub fn register(&mut self, app_type: &str, descriptor: AppDescriptor) -> Result<(), EngineError> {
        descriptor.validate(app_type)?;
        if self.descriptors.insert(app_type.to_string(), descriptor).is_some() {
            warn!(app_type, "replacing registered app type");
        } else {
            debug!(app_type, "registered app type");
        }
        Ok(())
    }

    pub fn get(&self, app_type: &str) -> Option<&AppDescriptor> { self.descriptors.get(app_type) }

    pub fn contains(&self, app_type: &str) -> bool { self.descriptors.contains_key(app_type) }

    /// Registered types, sorted for stable iteration.
    pub fn types(&self) -> Vec<String> {
        let mut types: Vec<_> = self.descriptors.keys().cloned().collect();
        types.sort();
        types
    }

    /// Unique within this registry: wall-clock millis plus a sequence number.
    pub fn next_instance_id(&mut self, now_ms: u64) -> String {
        let seq = self.instance_seq;
        self.instance_seq += 1;
        format!("{now_ms}-{seq}")
    }
}
