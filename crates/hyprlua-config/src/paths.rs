//! Well-known paths
//!
//! Hyprland exposes two sockets per running instance under
//! `$XDG_RUNTIME_DIR/hypr/$HYPRLAND_INSTANCE_SIGNATURE/`:
//!
//! - `.socket.sock` accepts one request per connection (what `hyprctl` uses)
//! - `.socket2.sock` streams `event>>payload` messages to every connected client

use std::path::PathBuf;

use crate::ConfigError;

/// Environment variable holding the running Hyprland instance signature
const INSTANCE_SIGNATURE_ENV: &str = "HYPRLAND_INSTANCE_SIGNATURE";

/// Environment variable overriding the script location
const SCRIPT_ENV: &str = "HYPRLUA_CONFIG";

const DEFAULT_SCRIPT: &str = "~/.config/hypr/hyprland.lua";
const DEFAULT_SETTINGS: &str = "~/.config/hyprlua/hyprlua.kdl";

const EVENT_SOCKET: &str = ".socket2.sock";
const REQUEST_SOCKET: &str = ".socket.sock";

fn expand(path: &str) -> PathBuf {
    shellexpand::tilde(path).into_owned().into()
}

/// Location of the Lua script when the settings file does not name one
///
/// Reads `$HYPRLUA_CONFIG` and falls back to `~/.config/hypr/hyprland.lua`.
pub fn default_script_path() -> PathBuf {
    match std::env::var(SCRIPT_ENV) {
        Ok(path) if !path.is_empty() => expand(&path),
        _ => expand(DEFAULT_SCRIPT),
    }
}

/// Location of the settings file
pub fn default_settings_path() -> PathBuf {
    expand(DEFAULT_SETTINGS)
}

/// Directory holding the sockets of the running Hyprland instance
///
/// # Errors
///
/// Returns `ConfigError::InstanceNotSet` if `$HYPRLAND_INSTANCE_SIGNATURE`
/// is not set.
pub fn hypr_runtime_dir() -> Result<PathBuf, ConfigError> {
    let signature = std::env::var(INSTANCE_SIGNATURE_ENV)
        .ok()
        .filter(|s| !s.is_empty())
        .ok_or(ConfigError::InstanceNotSet)?;

    let base = match std::env::var("XDG_RUNTIME_DIR") {
        Ok(dir) if !dir.is_empty() => PathBuf::from(dir).join("hypr"),
        _ => {
            tracing::debug!("XDG_RUNTIME_DIR not set, looking for Hyprland sockets in /tmp/hypr");
            PathBuf::from("/tmp/hypr")
        }
    };

    Ok(base.join(signature))
}

/// Path of the event stream socket (`.socket2.sock`)
pub fn event_socket_path() -> Result<PathBuf, ConfigError> {
    Ok(hypr_runtime_dir()?.join(EVENT_SOCKET))
}

/// Path of the request socket (`.socket.sock`)
pub fn request_socket_path() -> Result<PathBuf, ConfigError> {
    Ok(hypr_runtime_dir()?.join(REQUEST_SOCKET))
}
