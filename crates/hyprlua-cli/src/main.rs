//! hyprlua CLI
//!
//! Inspection tool for hyprlua settings and the Hyprland event stream.

use std::io::Read;
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, WrapErr};

#[derive(Parser, Debug)]
#[command(name = "hyprlua")]
#[command(about = "Lua configuration tool for Hyprland")]
#[command(version)]
struct Cli {
    /// Path to the settings file
    #[arg(short, long)]
    settings: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate the settings file
    Validate,

    /// Print Hyprland events as they arrive
    Listen {
        /// Event socket (discovered from the environment by default)
        #[arg(long)]
        socket: Option<String>,

        /// Only print these events (repeatable)
        #[arg(short, long = "event")]
        events: Vec<String>,
    },

    /// Show the resolved settings, script and socket paths
    Paths,
}

fn main() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    let settings_path = cli
        .settings
        .as_deref()
        .map(expand)
        .unwrap_or_else(hyprlua_config::default_settings_path);

    match cli.command {
        Commands::Validate => cmd_validate(&settings_path),
        Commands::Listen { socket, events } => cmd_listen(socket.as_deref().map(expand), &events),
        Commands::Paths => cmd_paths(&settings_path),
    }
}

fn expand(path: &str) -> PathBuf {
    shellexpand::tilde(path).into_owned().into()
}

fn cmd_validate(settings_path: &Path) -> miette::Result<()> {
    println!("Validating settings: {}", settings_path.display());

    let settings = hyprlua_config::parse_settings(settings_path)?;

    println!("Settings are valid!");
    println!("  Script: {}", settings.script.display());
    if let Some(dir) = &settings.modules_dir {
        println!("  Modules: {}", dir.display());
    }
    println!("  Log level: {}", settings.global.log_level.as_filter());
    println!(
        "  Watch: debounce {}ms, poll every {}ms",
        settings.watch.debounce.as_millis(),
        settings.watch.poll_interval.as_millis()
    );
    println!(
        "  Notifications: {}",
        if settings.notifications.enabled {
            "on"
        } else {
            "off"
        }
    );
    if !settings.script.exists() {
        println!("  warning: {} does not exist", settings.script.display());
    }
    Ok(())
}

fn cmd_listen(socket: Option<PathBuf>, events: &[String]) -> miette::Result<()> {
    let path = match socket {
        Some(path) => path,
        None => hyprlua_config::event_socket_path()?,
    };

    let mut stream = UnixStream::connect(&path)
        .into_diagnostic()
        .wrap_err_with(|| format!("Failed to connect to {}", path.display()))?;
    eprintln!("Listening on {}", path.display());

    let mut buffer = [0u8; 1024];
    loop {
        let n = match stream.read(&mut buffer) {
            Ok(0) => {
                eprintln!("Hyprland closed the connection");
                return Ok(());
            }
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e).into_diagnostic(),
        };

        match format_message(&buffer[..n], events) {
            Some(line) => println!("{}", line),
            None => tracing::debug!("Skipped {:?}", String::from_utf8_lossy(&buffer[..n])),
        }
    }
}

/// Render one socket message as `event >> payload`
///
/// Returns `None` for messages without a `>>` delimiter and for events
/// outside `filter` (an empty filter lets everything through).
fn format_message(chunk: &[u8], filter: &[String]) -> Option<String> {
    let text = String::from_utf8_lossy(chunk);
    let text = text.strip_suffix('\n').unwrap_or(&text[..]);
    let (event, payload) = text.split_once(">>")?;
    if !filter.is_empty() && !filter.iter().any(|name| name == event) {
        return None;
    }
    Some(format!("{} >> {}", event, payload))
}

fn cmd_paths(settings_path: &Path) -> miette::Result<()> {
    let settings = hyprlua_config::load_settings(settings_path)?;

    println!("Settings: {}", settings_path.display());
    println!("Script:   {}", settings.script.display());
    if let Some(dir) = &settings.modules_dir {
        println!("Modules:  {}", dir.display());
    }

    let event_socket = match &settings.socket {
        Some(path) => Ok(path.clone()),
        None => hyprlua_config::event_socket_path(),
    };
    match event_socket {
        Ok(path) => println!("Events:   {}", path.display()),
        Err(e) => println!("Events:   <{}>", e),
    }
    match hyprlua_config::request_socket_path() {
        Ok(path) => println!("Requests: {}", path.display()),
        Err(e) => println!("Requests: <{}>", e),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_message() {
        assert_eq!(
            format_message(b"workspace>>3\n", &[]),
            Some("workspace >> 3".to_string())
        );
    }

    #[test]
    fn test_format_message_without_delimiter() {
        assert_eq!(format_message(b"nodata", &[]), None);
    }

    #[test]
    fn test_format_message_filter() {
        let filter = vec!["closewindow".to_string()];
        assert_eq!(format_message(b"workspace>>3", &filter), None);
        assert_eq!(
            format_message(b"closewindow>>0xdeadbeef", &filter),
            Some("closewindow >> 0xdeadbeef".to_string())
        );
    }

    #[test]
    fn test_validate_reports_bad_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hyprlua.kdl");
        std::fs::write(&path, "watch {\n    debounce-ms 0\n}\n").unwrap();

        assert!(cmd_validate(&path).is_err());
    }

    #[test]
    fn test_validate_accepts_minimal_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hyprlua.kdl");
        std::fs::write(&path, "script \"/tmp/hyprland.lua\"\n").unwrap();

        assert!(cmd_validate(&path).is_ok());
    }
}
