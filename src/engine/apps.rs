//! Application launch and state persistence.

use std::time::Duration;

use tracing::{debug, info, warn};

use super::{EngineError, WindowManagerContext};
use crate::app::{AppCapabilities, AppContext, AppDescriptor, LaunchOptions};
use crate::model::{AppBinding, LifecycleState, WindowId};
use crate::persistence::{PersistedWindowState, WindowFlags};

impl WindowManagerContext {
    pub fn register_app(
        &mut self,
        app_type: &str,
        descriptor: AppDescriptor,
    ) -> Result<(), EngineError> {
        self.apps.register(app_type, descriptor)
    }

    pub fn registered_app_types(&self) -> Vec<String> { self.apps.types() }

    fn running_instance(&self, app_type: &str) -> Option<WindowId> {
        self.windows
            .iter()
            .filter(|w| w.app_binding.as_ref().is_some_and(|b| b.app_type == app_type))
            .max_by_key(|w| w.z_order)
            .map(|w| w.id)
    }

    fn instance_is_live(&self, app_type: &str, instance_id: &str) -> bool {
        self.windows.iter().any(|w| {
            w.app_binding
                .as_ref()
                .is_some_and(|b| b.app_type == app_type && b.instance_id == instance_id)
        })
    }

    /// Opens a window running `app_type`.
    ///
    /// Singletons that are already running are focused (and restored if
    /// minimized) instead. With `options.restore`, the most recent saved state
    /// for the type seeds geometry, app state and the maximized flag.
    pub fn launch_app(
        &mut self,
        app_type: &str,
        options: LaunchOptions,
    ) -> Result<WindowId, EngineError> {
        let Some(descriptor) = self.apps.get(app_type) else {
            return Err(EngineError::UnknownAppType(app_type.to_string()));
        };
        let singleton = descriptor.singleton;
        let capabilities = descriptor.capabilities;
        let mut config = descriptor.default_config.clone();

        if singleton && let Some(existing) = self.running_instance(app_type) {
            debug!(app_type, ?existing, "singleton already running");
            if self.windows.get(existing).is_some_and(|w| w.lifecycle == LifecycleState::Minimized)
            {
                self.restore_window(existing);
            }
            self.focus_window(existing);
            return Ok(existing);
        }

        let persisted = if options.restore && self.config.persistence.enabled {
            match &options.instance_id {
                Some(instance_id) => self.states.load(app_type, instance_id),
                None => self.states.most_recent(app_type),
            }
        } else {
            None
        };
        if let Some(state) = &persisted {
            config = config.with_geometry(state.geometry);
        }
        let config = config.merged(&options.config);
        let instance_id = match (options.instance_id, &persisted) {
            (Some(id), _) => id,
            (None, Some(state)) if !self.instance_is_live(app_type, &state.instance_id) => {
                state.instance_id.clone()
            }
            _ => self.apps.next_instance_id(self.clock.unix_millis()),
        };

        let id = self.create_window(config);
        let ctx = AppContext {
            app_type: app_type.to_string(),
            instance_id: instance_id.clone(),
            window: id,
        };
        let constructed = match self.apps.get(app_type) {
            Some(descriptor) => (descriptor.factory)(&ctx),
            None => Err(anyhow::anyhow!("app type was unregistered during launch")),
        };
        let mut app = match constructed {
            Ok(app) => app,
            Err(e) => {
                self.destroy_window(id);
                return Err(EngineError::AppInitFailed {
                    app_type: app_type.to_string(),
                    reason: format!("{e:#}"),
                });
            }
        };

        if capabilities.contains(AppCapabilities::RESTORE_STATE)
            && let Some(state) = persisted.as_ref().and_then(|s| s.app_state.clone())
            && let Err(e) = app.deserialize_state(state)
        {
            warn!(app_type, %e, "app rejected saved state");
        }

        if let Some(window) = self.windows.get_mut(id) {
            window.app_binding = Some(AppBinding {
                app_type: app_type.to_string(),
                instance_id,
            });
        }
        self.load_app(id, app, None);

        if persisted.is_some_and(|s| s.flags.maximized) {
            self.toggle_maximize_window(id);
        }
        info!(app_type, ?id, "launched app");
        Ok(id)
    }

    fn window_state(&self, id: WindowId) -> Option<PersistedWindowState> {
        let window = self.windows.get(id)?;
        let binding = window.app_binding.as_ref()?;
        let descriptor = self.apps.get(&binding.app_type)?;
        if !descriptor.persistent {
            return None;
        }
        let app_state = if descriptor.capabilities.contains(AppCapabilities::SERIALIZE_STATE) {
            window.content.primary().and_then(|app| app.serialize_state())
        } else {
            None
        };
        let minimized = window.lifecycle == LifecycleState::Minimized;
        // A window sliding into a half or quarter zone is saved at its target.
        let geometry = match self.animations.get(&id) {
            Some(anim) if window.lifecycle == LifecycleState::Normal => anim.target(),
            _ => window.normal_geometry(),
        };
        Some(PersistedWindowState {
            app_type: binding.app_type.clone(),
            instance_id: binding.instance_id.clone(),
            geometry,
            flags: WindowFlags {
                maximized: window.lifecycle == LifecycleState::Maximized
                    || (minimized && window.restore_target == LifecycleState::Maximized),
                minimized,
                capsule: window.is_capsule(),
            },
            app_state,
            saved_at: self.clock.unix_millis(),
        })
    }

    /// Saves the state of one window. `Ok(false)` when the window has nothing
    /// to persist (no app, non-persistent type, or persistence disabled).
    pub fn save_window_state(&self, id: WindowId) -> Result<bool, EngineError> {
        if !self.config.persistence.enabled {
            return Ok(false);
        }
        let Some(state) = self.window_state(id) else { return Ok(false) };
        self.states.save(&state)?;
        Ok(true)
    }

    /// Like [`save_window_state`](Self::save_window_state), but failures are
    /// only logged.
    pub(super) fn persist_window_state(&self, id: WindowId) -> bool {
        match self.save_window_state(id) {
            Ok(saved) => saved,
            Err(e) => {
                warn!(?id, %e, "failed to save window state");
                false
            }
        }
    }

    /// Saves every persistent window. Returns how many were written.
    pub fn save_all_states(&self) -> usize {
        let saved = self.windows.ids().into_iter().filter(|id| self.persist_window_state(*id)).count();
        debug!(saved, "saved all window states");
        saved
    }

    /// Removes every saved state in the namespace.
    pub fn clear_all_app_data(&self) -> usize { self.states.clear() }

    /// Relaunches the most recent instance of each auto-restore type that is
    /// not already running.
    pub fn restore_session(&mut self) -> Vec<WindowId> {
        if !self.config.persistence.enabled {
            return Vec::new();
        }
        let mut restored = Vec::new();
        for app_type in self.apps.types() {
            let auto_restore = self.apps.get(&app_type).is_some_and(|d| d.auto_restore);
            if !auto_restore || self.running_instance(&app_type).is_some() {
                continue;
            }
            let Some(state) = self.states.most_recent(&app_type) else { continue };
            let options = LaunchOptions {
                restore: true,
                instance_id: Some(state.instance_id),
                ..Default::default()
            };
            match self.launch_app(&app_type, options) {
                Ok(id) => restored.push(id),
                Err(e) => warn!(%app_type, %e, "could not restore app"),
            }
        }
        info!(count = restored.len(), "restored session");
        restored
    }

    /// Drops saved states older than `max_age` (and unreadable ones). Only the
    /// first call per engine does any work.
    pub fn cleanup_old_states(&self, max_age: Duration) -> usize {
        self.states.cleanup_old_states(self.clock.unix_millis(), max_age)
    }
}
