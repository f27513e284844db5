//! Error types for Hyprland IPC operations

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur when talking to the Hyprland sockets
#[derive(Debug, Error)]
pub enum HyprError {
    /// The socket path could not be resolved from the environment
    #[error(transparent)]
    Discovery(#[from] hyprlua_config::ConfigError),

    /// The socket path does not exist
    #[error("Hyprland socket not found at {path}")]
    SocketNotFound { path: PathBuf },

    /// Failed to connect to a Hyprland socket
    #[error("Failed to connect to Hyprland socket at {path}: {source}")]
    ConnectionFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Reading from the event socket failed
    #[error("Failed to read from Hyprland event socket: {0}")]
    ReadFailed(#[source] std::io::Error),

    /// Sending a request on the request socket failed
    #[error("Failed to send request to Hyprland: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Reading a reply from the request socket failed
    #[error("Failed to receive reply from Hyprland: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// A JSON reply could not be parsed
    #[error("Failed to deserialize reply: {0}")]
    DeserializeFailed(#[source] serde_json::Error),

    /// Hyprland answered a request with something other than "ok"
    #[error("Hyprland rejected `{request}`: {reply}")]
    Rejected { request: String, reply: String },

    /// Maximum retry attempts exceeded
    #[error("Failed to connect to Hyprland after {attempts} attempts")]
    MaxRetriesExceeded { attempts: u32 },
}
