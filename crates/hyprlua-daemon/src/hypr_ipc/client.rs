//! Hyprland request socket client
//!
//! `.socket.sock` speaks the same protocol as `hyprctl`: connect, write one
//! command, read the reply until the compositor closes the connection.
//! Commands prefixed with `j/` answer in JSON.
//!
//! The client is blocking on purpose. It is called from Lua functions and from
//! the notification sink, both of which are synchronous.

use std::io::{Read, Write};
use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use super::HyprError;

/// Upper bound on a single request round trip
const REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

/// A monitor as reported by `j/monitors`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Monitor {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub width: i64,
    pub height: i64,
    #[serde(default)]
    pub refresh_rate: f64,
    pub x: i64,
    pub y: i64,
    #[serde(default = "default_scale")]
    pub scale: f64,
    #[serde(default)]
    pub focused: bool,
    #[serde(default)]
    pub disabled: bool,
}

fn default_scale() -> f64 {
    1.0
}

/// Client for Hyprland's request socket
#[derive(Debug, Clone)]
pub struct HyprctlClient {
    socket_path: PathBuf,
}

impl HyprctlClient {
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
        }
    }

    /// Client for the running Hyprland instance
    ///
    /// # Errors
    ///
    /// Returns `HyprError::Discovery` if `$HYPRLAND_INSTANCE_SIGNATURE` is not set.
    pub fn from_env() -> Result<Self, HyprError> {
        Ok(Self::new(hyprlua_config::request_socket_path()?))
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Send `command` and return the raw reply
    pub fn request(&self, command: &str) -> Result<String, HyprError> {
        let mut stream =
            UnixStream::connect(&self.socket_path).map_err(|e| HyprError::ConnectionFailed {
                path: self.socket_path.clone(),
                source: e,
            })?;
        stream
            .set_read_timeout(Some(REQUEST_TIMEOUT))
            .and_then(|_| stream.set_write_timeout(Some(REQUEST_TIMEOUT)))
            .map_err(HyprError::SendFailed)?;

        stream
            .write_all(command.as_bytes())
            .map_err(HyprError::SendFailed)?;
        // End of request for peers that read to EOF
        let _ = stream.shutdown(Shutdown::Write);

        let mut reply = String::new();
        stream
            .read_to_string(&mut reply)
            .map_err(HyprError::ReceiveFailed)?;

        tracing::trace!(command, reply = %reply.trim(), "hyprctl request");
        Ok(reply)
    }

    /// Send a command whose only successful reply is `ok`
    fn command(&self, command: &str) -> Result<(), HyprError> {
        let reply = self.request(command)?;
        if reply.trim() == "ok" {
            Ok(())
        } else {
            Err(HyprError::Rejected {
                request: command.to_string(),
                reply: reply.trim().to_string(),
            })
        }
    }

    /// Set a configuration keyword at runtime (`hyprctl keyword`)
    pub fn keyword(&self, key: &str, value: &str) -> Result<(), HyprError> {
        self.command(&format!("keyword {} {}", key, value))
    }

    /// Show a compositor notification (`hyprctl notify`)
    ///
    /// `color` is a Hyprland color such as `rgb(33ff33)`.
    pub fn notify(
        &self,
        icon: i32,
        duration: Duration,
        color: &str,
        message: &str,
    ) -> Result<(), HyprError> {
        self.command(&format!(
            "notify {} {} {} {}",
            icon,
            duration.as_millis(),
            color,
            message
        ))
    }

    /// List all monitors, including disabled ones
    pub fn monitors(&self) -> Result<Vec<Monitor>, HyprError> {
        let reply = self.request("j/monitors all")?;
        serde_json::from_str(&reply).map_err(HyprError::DeserializeFailed)
    }
}
