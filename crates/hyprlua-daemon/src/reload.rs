//! Script reloading
//!
//! `ReloadCoordinator` owns the script engine and the only writer access to
//! the `ScriptHandle`. Reloads run inline on whichever task delivers the
//! change signal and are serialized by a mutex. The handle is swapped only
//! after the new script ran to completion, so event hooks always see either
//! the previous environment or the new one.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock, TryLockError};

use hyprlua_config::NotificationSettings;
use tracing::{debug, error, info, trace};

use crate::hypr_ipc::{EventHooks, HandlerError};
use crate::notify::{Notifier, Severity};
use crate::script::{ScriptEngine, ScriptEnvironment, ScriptError};
use crate::watcher::{ChangeListener, ChangeSignal};

/// Swappable reference to the active script environment
#[derive(Debug)]
pub struct ScriptHandle<E> {
    current: RwLock<Option<Arc<E>>>,
}

impl<E> Default for ScriptHandle<E> {
    fn default() -> Self {
        Self {
            current: RwLock::new(None),
        }
    }
}

impl<E> ScriptHandle<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// The active environment, if a script has been loaded
    pub fn snapshot(&self) -> Option<Arc<E>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_loaded(&self) -> bool {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Install `env`, returning the one it replaces
    pub(crate) fn replace(&self, env: E) -> Option<Arc<E>> {
        let env = Arc::new(env);
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        current.replace(env)
    }

    /// Drop the active environment
    pub fn clear(&self) -> Option<Arc<E>> {
        self.current
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

impl<E: ScriptEnvironment> EventHooks for ScriptHandle<E> {
    fn emit(&self, event: &str, fields: &[(&'static str, String)]) -> Result<(), HandlerError> {
        let Some(env) = self.snapshot() else {
            trace!(event, "No script loaded");
            return Ok(());
        };
        match env.call_hook(event, fields) {
            Ok(true) => {
                debug!(event, "Hook called");
                Ok(())
            }
            Ok(false) => Ok(()),
            Err(e) => Err(HandlerError::new(e.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadState {
    Idle,
    Reloading,
}

/// Reloads the script when the watched file changes
pub struct ReloadCoordinator<G: ScriptEngine> {
    engine: G,
    script_path: PathBuf,
    handle: Arc<ScriptHandle<G::Env>>,
    state: Mutex<ReloadState>,
    notifier: Arc<dyn Notifier>,
    notifications: NotificationSettings,
}

impl<G: ScriptEngine> ReloadCoordinator<G> {
    pub fn new(engine: G, script_path: impl Into<PathBuf>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            engine,
            script_path: script_path.into(),
            handle: Arc::new(ScriptHandle::new()),
            state: Mutex::new(ReloadState::Idle),
            notifier,
            notifications: NotificationSettings::default(),
        }
    }

    pub fn with_notifications(mut self, notifications: NotificationSettings) -> Self {
        self.notifications = notifications;
        self
    }

    #[allow(dead_code)]
    pub fn engine(&self) -> &G {
        &self.engine
    }

    pub fn script_path(&self) -> &Path {
        &self.script_path
    }

    /// Shared handle to the active environment
    pub fn handle(&self) -> Arc<ScriptHandle<G::Env>> {
        self.handle.clone()
    }

    pub fn state(&self) -> ReloadState {
        match self.state.try_lock() {
            Ok(state) => *state,
            Err(TryLockError::WouldBlock) => ReloadState::Reloading,
            Err(TryLockError::Poisoned(poisoned)) => *poisoned.into_inner(),
        }
    }

    /// Run the script in a fresh environment and make it the active one
    ///
    /// Blocks while another reload is in progress. On failure the previous
    /// environment stays active. Either way exactly one notification is sent.
    pub fn reload(&self) -> Result<(), ScriptError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        *state = ReloadState::Reloading;

        let result = self.engine.load_and_run(&self.script_path);
        let outcome = match result {
            Ok(env) => {
                let previous = self.handle.replace(env);
                info!(
                    replaced = previous.is_some(),
                    "Loaded {}",
                    self.script_path.display()
                );
                self.notifier.notify(
                    &format!("Loaded '{}'", self.script_path.display()),
                    Severity::Success,
                    self.notifications.duration,
                );
                Ok(())
            }
            Err(e) => {
                error!("{}", e);
                self.notifier
                    .notify(&e.to_string(), Severity::Error, self.notifications.error_duration);
                Err(e)
            }
        };

        *state = ReloadState::Idle;
        outcome
    }
}

impl<G: ScriptEngine> ChangeListener for ReloadCoordinator<G> {
    fn on_change(&self, signal: ChangeSignal) {
        if self.state() == ReloadState::Reloading {
            debug!("Reload already in progress, queueing behind it");
        }
        debug!(since_signal = ?signal.at.elapsed(), "Reloading");
        // Failures are reported by reload itself
        let _ = self.reload();
    }
}
