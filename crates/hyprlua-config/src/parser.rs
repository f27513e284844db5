//! KDL settings parser

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;
use crate::model::*;

/// Load settings from `path`, falling back to defaults if the file does not exist
pub fn load_settings(path: &Path) -> Result<Settings, ConfigError> {
    if !path.exists() {
        tracing::debug!("No settings file at {}, using defaults", path.display());
        return Ok(Settings::default());
    }
    parse_settings(path)
}

/// Parse a settings file from the given path
pub fn parse_settings(path: &Path) -> Result<Settings, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_settings_str(&content)
}

/// Parse settings from a string
pub fn parse_settings_str(content: &str) -> Result<Settings, ConfigError> {
    let doc: kdl::KdlDocument = content.parse().map_err(|e: kdl::KdlError| {
        // kdl uses an older miette version, so we need to extract offset/len manually
        let span = miette::SourceSpan::from((e.span.offset(), e.span.len()));
        ConfigError::ParseError {
            src: content.to_string(),
            span,
            source: e,
        }
    })?;

    let mut settings = Settings::default();

    for node in doc.nodes() {
        match node.name().value() {
            "global" => settings.global = parse_global(node, content)?,
            "script" => settings.script = path_arg(node, content)?,
            "modules" => settings.modules_dir = Some(path_arg(node, content)?),
            "socket" => settings.socket = Some(path_arg(node, content)?),
            "watch" => settings.watch = parse_watch(node, content)?,
            "notifications" => settings.notifications = parse_notifications(node, content)?,
            name => {
                tracing::warn!("Unknown top-level node: {}", name);
            }
        }
    }

    Ok(settings)
}

fn parse_global(node: &kdl::KdlNode, source: &str) -> Result<GlobalSettings, ConfigError> {
    let mut global = GlobalSettings::default();

    for child in children(node) {
        match child.name().value() {
            "log-level" => {
                let (value, entry) = string_arg(child, source)?;
                global.log_level = value
                    .parse()
                    .map_err(|message| invalid(child, entry, message, source))?;
            }
            name => {
                tracing::warn!("Unknown global option: {}", name);
            }
        }
    }

    Ok(global)
}

fn parse_watch(node: &kdl::KdlNode, source: &str) -> Result<WatchSettings, ConfigError> {
    let mut watch = WatchSettings::default();

    for child in children(node) {
        match child.name().value() {
            "debounce-ms" => watch.debounce = millis_arg(child, source)?,
            "poll-interval-ms" => watch.poll_interval = millis_arg(child, source)?,
            name => {
                tracing::warn!("Unknown watch option: {}", name);
            }
        }
    }

    Ok(watch)
}

fn parse_notifications(
    node: &kdl::KdlNode,
    source: &str,
) -> Result<NotificationSettings, ConfigError> {
    let mut notifications = NotificationSettings::default();

    for child in children(node) {
        match child.name().value() {
            "enabled" => {
                let entry = first_entry(child)?;
                notifications.enabled = entry
                    .value()
                    .as_bool()
                    .ok_or_else(|| invalid(child, entry, "expected true or false".into(), source))?;
            }
            "duration-ms" => notifications.duration = millis_arg(child, source)?,
            "error-duration-ms" => notifications.error_duration = millis_arg(child, source)?,
            name => {
                tracing::warn!("Unknown notifications option: {}", name);
            }
        }
    }

    Ok(notifications)
}

fn children(node: &kdl::KdlNode) -> impl Iterator<Item = &kdl::KdlNode> {
    node.children().into_iter().flat_map(|doc| doc.nodes())
}

fn first_entry(node: &kdl::KdlNode) -> Result<&kdl::KdlEntry, ConfigError> {
    node.entries().first().ok_or_else(|| ConfigError::Invalid {
        message: format!("`{}` needs a value", node.name().value()),
    })
}

fn string_arg<'a>(
    node: &'a kdl::KdlNode,
    source: &str,
) -> Result<(&'a str, &'a kdl::KdlEntry), ConfigError> {
    let entry = first_entry(node)?;
    let value = entry
        .value()
        .as_string()
        .ok_or_else(|| invalid(node, entry, "expected a string".into(), source))?;
    Ok((value, entry))
}

fn path_arg(node: &kdl::KdlNode, source: &str) -> Result<PathBuf, ConfigError> {
    let (value, _) = string_arg(node, source)?;
    Ok(shellexpand::tilde(value).into_owned().into())
}

fn millis_arg(node: &kdl::KdlNode, source: &str) -> Result<Duration, ConfigError> {
    let entry = first_entry(node)?;
    match entry.value().as_i64() {
        Some(ms) if ms > 0 => Ok(Duration::from_millis(ms as u64)),
        Some(_) => Err(invalid(node, entry, "must be greater than zero".into(), source)),
        None => Err(invalid(node, entry, "expected milliseconds".into(), source)),
    }
}

fn invalid(
    node: &kdl::KdlNode,
    entry: &kdl::KdlEntry,
    message: String,
    source: &str,
) -> ConfigError {
    let span = entry.span();
    ConfigError::InvalidValue {
        key: node.name().value().to_string(),
        message,
        src: source.to_string(),
        span: miette::SourceSpan::from((span.offset(), span.len())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_settings() {
        let settings = r#"
            global {
                log-level "debug"
            }
            script "/cfg/hyprland.lua"
            modules "/cfg/lua"
            socket "/run/user/1000/hypr/abc/.socket2.sock"
            watch {
                debounce-ms 750
                poll-interval-ms 250
            }
            notifications {
                enabled false
                duration-ms 2000
                error-duration-ms 8000
            }
        "#;

        let result = parse_settings_str(settings).unwrap();
        assert_eq!(result.global.log_level, LogLevel::Debug);
        assert_eq!(result.script, PathBuf::from("/cfg/hyprland.lua"));
        assert_eq!(result.modules_dir, Some(PathBuf::from("/cfg/lua")));
        assert_eq!(
            result.socket,
            Some(PathBuf::from("/run/user/1000/hypr/abc/.socket2.sock"))
        );
        assert_eq!(result.watch.debounce, Duration::from_millis(750));
        assert_eq!(result.watch.poll_interval, Duration::from_millis(250));
        assert!(!result.notifications.enabled);
        assert_eq!(result.notifications.duration, Duration::from_millis(2000));
        assert_eq!(result.notifications.error_duration, Duration::from_millis(8000));
    }

    #[test]
    fn test_empty_settings_use_defaults() {
        let result = parse_settings_str("").unwrap();
        assert_eq!(result.global.log_level, LogLevel::Info);
        assert_eq!(result.watch, WatchSettings::default());
        assert_eq!(result.notifications, NotificationSettings::default());
        assert!(result.socket.is_none());
    }

    #[test]
    fn test_script_path_tilde_expanded() {
        let result = parse_settings_str(r#"script "~/hypr/init.lua""#).unwrap();
        assert!(!result.script.to_string_lossy().starts_with('~'));
        assert!(result.script.ends_with("hypr/init.lua"));
    }

    #[test]
    fn test_zero_debounce_rejected() {
        let result = parse_settings_str("watch {\n    debounce-ms 0\n}");
        match result {
            Err(ConfigError::InvalidValue { key, .. }) => assert_eq!(key, "debounce-ms"),
            other => panic!("expected InvalidValue, got {:?}", other),
        }
    }

    #[test]
    fn test_wrong_type_rejected() {
        let result = parse_settings_str(r#"notifications { enabled "yes"; }"#);
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_unknown_log_level_rejected() {
        let result = parse_settings_str(r#"global { log-level "loud"; }"#);
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_missing_value_rejected() {
        let result = parse_settings_str("script");
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_unknown_nodes_ignored() {
        let result = parse_settings_str("keybinds { foo \"bar\"; }");
        assert!(result.is_ok());
    }

    #[test]
    fn test_syntax_error_reported() {
        let result = parse_settings_str("watch {");
        assert!(matches!(result, Err(ConfigError::ParseError { .. })));
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let result = load_settings(Path::new("/nonexistent/hyprlua/hyprlua.kdl")).unwrap();
        assert_eq!(result.watch, WatchSettings::default());
    }
}
