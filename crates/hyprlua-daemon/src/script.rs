//! Lua scripting
//!
//! The reload machinery only sees the `ScriptEngine` and `ScriptEnvironment`
//! traits. `LuaEngine` is the implementation used by the daemon: each call to
//! `load_and_run` builds a brand new Lua state, installs the `hypr` table and
//! runs the user's script in it. The resulting `LuaEnvironment` is what event
//! hooks are later called on.
//!
//! ## The `hypr` table
//!
//! - `hypr.version`: daemon version string
//! - `hypr.notify(message, [duration_ms])`: show a notification
//! - `hypr.on(event, function(fields) ... end)`: hook a compositor event
//!   (one hook per event, the last registration wins)
//! - `hypr.add_monitor(name, resolution, position, [scale], [workspaces])`
//! - `hypr.disable_monitor(name)`
//! - `hypr.monitors()`: list of monitor tables

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use mlua::{Function, Lua, LuaOptions, StdLib, Table};
use thiserror::Error;

use crate::hypr_ipc::HyprctlClient;
use crate::notify::{Notifier, Severity};

/// Registry key of the table holding `hypr.on` callbacks
const HOOKS_KEY: &str = "hyprlua.hooks";

/// Errors from loading or running scripts
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("Script not found: {path}")]
    NotFound { path: PathBuf },

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Error executing {path}:\n{message}")]
    Execution { path: PathBuf, message: String },

    #[error("Hook for `{event}` failed: {message}")]
    Hook { event: String, message: String },
}

/// A fully loaded script environment
pub trait ScriptEnvironment: Send + Sync + 'static {
    /// Call the hook registered for `event`, if any
    ///
    /// Returns whether a hook was registered.
    fn call_hook(&self, event: &str, fields: &[(&'static str, String)]) -> Result<bool, ScriptError>;
}

/// Builds script environments
pub trait ScriptEngine: Send + Sync + 'static {
    type Env: ScriptEnvironment;

    /// Run the script at `path` in a fresh environment
    fn load_and_run(&self, path: &Path) -> Result<Self::Env, ScriptError>;
}

/// Lua 5.4 engine
pub struct LuaEngine {
    notifier: Arc<dyn Notifier>,
    hyprctl: Option<HyprctlClient>,
    modules_dir: Option<PathBuf>,
    notify_duration: Duration,
}

impl LuaEngine {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self {
            notifier,
            hyprctl: None,
            modules_dir: None,
            notify_duration: Duration::from_millis(3000),
        }
    }

    /// Client used by the monitor functions; without one they raise a Lua error
    pub fn with_hyprctl(mut self, client: HyprctlClient) -> Self {
        self.hyprctl = Some(client);
        self
    }

    /// Directory searched by `require` before the default path
    pub fn with_modules_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.modules_dir = Some(dir.into());
        self
    }

    /// Default duration of `hypr.notify`
    pub fn with_notify_duration(mut self, duration: Duration) -> Self {
        self.notify_duration = duration;
        self
    }

    fn new_state(&self) -> mlua::Result<Lua> {
        let lua = Lua::new_with(
            StdLib::PACKAGE | StdLib::MATH | StdLib::TABLE | StdLib::STRING,
            LuaOptions::default(),
        )?;

        if let Some(dir) = &self.modules_dir {
            let package: Table = lua.globals().get("package")?;
            let current: String = package.get("path")?;
            package.set(
                "path",
                format!("{0}/?.lua;{0}/?/init.lua;{1}", dir.display(), current),
            )?;
        }

        lua.set_named_registry_value(HOOKS_KEY, lua.create_table()?)?;
        lua.globals().set("hypr", self.hypr_table(&lua)?)?;
        Ok(lua)
    }

    fn hypr_table(&self, lua: &Lua) -> mlua::Result<Table> {
        let hypr = lua.create_table()?;
        hypr.set("version", env!("CARGO_PKG_VERSION"))?;

        let notifier = self.notifier.clone();
        let default_duration = self.notify_duration;
        hypr.set(
            "notify",
            lua.create_function(move |_, (message, ms): (String, Option<u64>)| {
                let duration = ms.map(Duration::from_millis).unwrap_or(default_duration);
                notifier.notify(&message, Severity::Info, duration);
                Ok(())
            })?,
        )?;

        hypr.set(
            "on",
            lua.create_function(|lua, (event, callback): (String, Function)| {
                let hooks: Table = lua.named_registry_value(HOOKS_KEY)?;
                hooks.set(event, callback)
            })?,
        )?;

        let client = self.hyprctl.clone();
        hypr.set(
            "add_monitor",
            lua.create_function(
                move |_,
                      (name, resolution, position, scale, workspaces): (
                    String,
                    String,
                    String,
                    Option<f64>,
                    Option<Vec<i64>>,
                )| {
                    let client = require_client(&client)?;
                    let rule = format!(
                        "{},{},{},{}",
                        name,
                        resolution,
                        position,
                        scale.unwrap_or(1.0)
                    );
                    client
                        .keyword("monitor", &rule)
                        .map_err(mlua::Error::external)?;
                    for workspace in workspaces.unwrap_or_default() {
                        client
                            .keyword("workspace", &format!("{},monitor:{}", workspace, name))
                            .map_err(mlua::Error::external)?;
                    }
                    tracing::info!(monitor = %name, %rule, "Monitor rule applied");
                    Ok(())
                },
            )?,
        )?;

        let client = self.hyprctl.clone();
        hypr.set(
            "disable_monitor",
            lua.create_function(move |_, name: String| {
                let client = require_client(&client)?;
                client
                    .keyword("monitor", &format!("{},disable", name))
                    .map_err(mlua::Error::external)?;
                tracing::info!(monitor = %name, "Monitor disabled");
                Ok(())
            })?,
        )?;

        let client = self.hyprctl.clone();
        hypr.set(
            "monitors",
            lua.create_function(move |lua, ()| {
                let client = require_client(&client)?;
                let monitors = client.monitors().map_err(mlua::Error::external)?;
                let list = lua.create_table()?;
                for (i, monitor) in monitors.into_iter().enumerate() {
                    let entry = lua.create_table()?;
                    entry.set("id", monitor.id)?;
                    entry.set("name", monitor.name)?;
                    entry.set("description", monitor.description)?;
                    entry.set("width", monitor.width)?;
                    entry.set("height", monitor.height)?;
                    entry.set("x", monitor.x)?;
                    entry.set("y", monitor.y)?;
                    entry.set("scale", monitor.scale)?;
                    entry.set("focused", monitor.focused)?;
                    entry.set("disabled", monitor.disabled)?;
                    list.set(i + 1, entry)?;
                }
                Ok(list)
            })?,
        )?;

        Ok(hypr)
    }
}

fn require_client(client: &Option<HyprctlClient>) -> mlua::Result<&HyprctlClient> {
    client
        .as_ref()
        .ok_or_else(|| mlua::Error::runtime("not connected to Hyprland"))
}

impl ScriptEngine for LuaEngine {
    type Env = LuaEnvironment;

    fn load_and_run(&self, path: &Path) -> Result<LuaEnvironment, ScriptError> {
        if !path.exists() {
            return Err(ScriptError::NotFound {
                path: path.to_path_buf(),
            });
        }

        let source = std::fs::read_to_string(path).map_err(|e| ScriptError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;

        let execution = |e: mlua::Error| ScriptError::Execution {
            path: path.to_path_buf(),
            message: e.to_string(),
        };

        let lua = self.new_state().map_err(execution)?;
        lua.load(source.as_str())
            .set_name(format!("@{}", path.display()))
            .exec()
            .map_err(execution)?;

        tracing::debug!("Executed {}", path.display());

        Ok(LuaEnvironment {
            lua,
            path: path.to_path_buf(),
        })
    }
}

/// A Lua state in which the user's script has run to completion
pub struct LuaEnvironment {
    lua: Lua,
    path: PathBuf,
}

impl std::fmt::Debug for LuaEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LuaEnvironment")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl ScriptEnvironment for LuaEnvironment {
    fn call_hook(&self, event: &str, fields: &[(&'static str, String)]) -> Result<bool, ScriptError> {
        let hook_error = |e: mlua::Error| ScriptError::Hook {
            event: event.to_string(),
            message: e.to_string(),
        };

        let hooks: Table = self.lua.named_registry_value(HOOKS_KEY).map_err(hook_error)?;
        let Some(callback) = hooks.get::<Option<Function>>(event).map_err(hook_error)? else {
            return Ok(false);
        };

        let table = self.lua.create_table().map_err(hook_error)?;
        for (key, value) in fields {
            table.set(*key, value.as_str()).map_err(hook_error)?;
        }
        callback.call::<()>(table).map_err(hook_error)?;
        Ok(true)
    }
}
