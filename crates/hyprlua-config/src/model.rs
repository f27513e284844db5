//! Settings data model

use std::path::PathBuf;
use std::time::Duration;

use crate::paths::default_script_path;

/// Root settings structure
#[derive(Debug, Clone)]
pub struct Settings {
    pub global: GlobalSettings,
    /// The Lua configuration script that is run and watched for changes
    pub script: PathBuf,
    /// Extra directory prepended to Lua's `package.path`
    pub modules_dir: Option<PathBuf>,
    /// Explicit event socket path; discovered from the environment when unset
    pub socket: Option<PathBuf>,
    pub watch: WatchSettings,
    pub notifications: NotificationSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            global: GlobalSettings::default(),
            script: default_script_path(),
            modules_dir: None,
            socket: None,
            watch: WatchSettings::default(),
            notifications: NotificationSettings::default(),
        }
    }
}

/// Global settings
#[derive(Debug, Clone, Default)]
pub struct GlobalSettings {
    pub log_level: LogLevel,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Directive understood by `tracing_subscriber::EnvFilter`
    pub fn as_filter(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            _ => Err(format!("Unknown log level: {}", s)),
        }
    }
}

/// Timing of the script file watcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchSettings {
    /// Minimum time between two reloads
    pub debounce: Duration,
    /// Sleep between two reads of the change notification queue
    pub poll_interval: Duration,
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(500),
            poll_interval: Duration::from_millis(500),
        }
    }
}

/// Compositor notification settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotificationSettings {
    pub enabled: bool,
    pub duration: Duration,
    pub error_duration: Duration,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            duration: Duration::from_millis(3000),
            error_duration: Duration::from_millis(5000),
        }
    }
}
