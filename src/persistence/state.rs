use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use super::store::{KvStore, StoreError};
use crate::sys::geometry::Rect;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WindowFlags {
    pub maximized: bool,
    pub minimized: bool,
    pub capsule: bool,
}

/// What survives a session for one app instance.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PersistedWindowState {
    pub app_type: String,
    pub instance_id: String,
    /// Normal geometry, even when the window was maximized or a capsule.
    pub geometry: Rect,
    pub flags: WindowFlags,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_state: Option<Value>,
    /// Unix millis.
    pub saved_at: u64,
}

pub fn state_key(namespace: &str, app_type: &str, instance_id: &str) -> String {
    format!("{namespace}:{app_type}:{instance_id}")
}

/// Splits a key of `namespace` into `(app_type, instance_id)`.
pub fn parse_key<'a>(namespace: &str, key: &'a str) -> Option<(&'a str, &'a str)> {
    let rest = key.strip_prefix(namespace)?.strip_prefix(':')?;
    let (app_type, instance_id) = rest.split_once(':')?;
    if app_type.is_empty() || instance_id.is_empty() {
        return None;
    }
    Some((app_type, instance_id))
}

/// Typed view over a [`KvStore`] scoped to one namespace.
pub struct StateStore {
    store: Arc<dyn KvStore>,
    namespace: String,
    cleaned: AtomicBool,
}

impl std::fmt::Debug for StateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateStore").field("namespace", &self.namespace).finish_non_exhaustive()
    }
}

impl StateStore {
    pub fn new(store: Arc<dyn KvStore>, namespace: impl Into<String>) -> Self {
        Self {
            store,
            namespace: namespace.into(),
            cleaned: AtomicBool::new(false),
        }
    }

    pub fn namespace(&self) -> &str { &self.namespace }

    pub fn save(&self, state: &PersistedWindowState) -> Result<(), StoreError> {
        let key = state_key(&self.namespace, &state.app_type, &state.instance_id);
        let value = serde_json::to_string(state)?;
        self.store.set(&key, &value)?;
        debug!(%key, "saved window state");
        Ok(())
    }

    /// Missing and malformed entries both read as `None`.
    pub fn load(&self, app_type: &str, instance_id: &str) -> Option<PersistedWindowState> {
        let key = state_key(&self.namespace, app_type, instance_id);
        self.decode(&key)
    }

    fn decode(&self, key: &str) -> Option<PersistedWindowState> {
        let raw = match self.store.get(key) {
            Ok(raw) => raw?,
            Err(e) => {
                debug!(%key, %e, "could not read window state");
                return None;
            }
        };
        match serde_json::from_str::<PersistedWindowState>(&raw) {
            Ok(state) => Some(state),
            Err(e) => {
                debug!(%key, %e, "ignoring malformed window state");
                None
            }
        }
    }

    fn namespace_keys(&self) -> Vec<String> {
        match self.store.keys() {
            Ok(keys) => keys
                .into_iter()
                .filter(|k| parse_key(&self.namespace, k).is_some())
                .collect(),
            Err(e) => {
                debug!(%e, "could not list stored keys");
                Vec::new()
            }
        }
    }

    /// Every readable entry in the namespace.
    pub fn list(&self) -> Vec<PersistedWindowState> {
        self.namespace_keys().iter().filter_map(|k| self.decode(k)).collect()
    }

    pub fn most_recent(&self, app_type: &str) -> Option<PersistedWindowState> {
        self.list()
            .into_iter()
            .filter(|s| s.app_type == app_type)
            .max_by(|a, b| a.saved_at.cmp(&b.saved_at).then_with(|| a.instance_id.cmp(&b.instance_id)))
    }

    pub fn remove(&self, app_type: &str, instance_id: &str) -> Result<bool, StoreError> {
        self.store.remove(&state_key(&self.namespace, app_type, instance_id))
    }

    /// Removes every entry in the namespace. Returns how many were removed.
    pub fn clear(&self) -> usize {
        let mut removed = 0;
        for key in self.namespace_keys() {
            match self.store.remove(&key) {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => debug!(%key, %e, "could not remove window state"),
            }
        }
        info!(removed, namespace = %self.namespace, "cleared saved window state");
        removed
    }

    /// Deletes entries older than `max_age` and entries that do not parse.
    /// Runs once per store; later calls return 0.
    pub fn cleanup_old_states(&self, now_ms: u64, max_age: Duration) -> usize {
        if self.cleaned.swap(true, Ordering::SeqCst) {
            return 0;
        }
        self.purge(now_ms, max_age)
    }

    /// Same as [`cleanup_old_states`](Self::cleanup_old_states) without the
    /// once-only guard. Used by `shellwm saved cleanup`.
    pub fn purge(&self, now_ms: u64, max_age: Duration) -> usize {
        let max_age_ms = u64::try_from(max_age.as_millis()).unwrap_or(u64::MAX);
        let mut removed = 0;
        for key in self.namespace_keys() {
            let expired = match self.decode(&key) {
                Some(state) => now_ms.saturating_sub(state.saved_at) > max_age_ms,
                None => true,
            };
            if expired && matches!(self.store.remove(&key), Ok(true)) {
                removed += 1;
            }
        }
        if removed > 0 {
            info!(removed, "cleaned up old window state");
        }
        removed
    }
}
