//! Settings for hyprlua
//!
//! This crate parses the optional KDL settings file shared by the daemon and
//! the CLI, and resolves the Hyprland socket paths from the environment.

mod error;
mod model;
mod parser;
mod paths;

pub use error::ConfigError;
pub use model::*;
pub use parser::{load_settings, parse_settings, parse_settings_str};
pub use paths::{
    default_script_path, default_settings_path, event_socket_path, hypr_runtime_dir,
    request_socket_path,
};
