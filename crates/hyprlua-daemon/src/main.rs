//! hyprlua daemon
//!
//! Runs the user's Lua configuration, reloads it when the file changes and
//! forwards Hyprland events to the hooks it registers.

mod blocking;
mod hypr_ipc;
mod notify;
mod reload;
mod script;
mod watcher;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use hyprlua_config::Settings;
use tokio::signal::unix::{signal, SignalKind};
use tracing_subscriber::EnvFilter;

use hypr_ipc::{
    register_event_handlers, EventRouter, EventSourceHandle, HyprctlClient, ReconnectPolicy,
    SocketEventSource,
};
use notify::{HyprctlNotifier, LogNotifier, Notifier, Severity};
use reload::{ReloadCoordinator, ScriptHandle};
use script::{LuaEngine, LuaEnvironment, ScriptEngine};
use watcher::{DebouncedWatcher, WatchTarget};

#[derive(Parser, Debug)]
#[command(name = "hyprluad", version)]
#[command(about = "Lua configuration daemon for Hyprland")]
struct Args {
    /// Path to the settings file
    #[arg(short, long)]
    settings: Option<String>,

    /// Lua script to run and watch, overrides the settings file
    #[arg(long)]
    script: Option<String>,

    /// Hyprland event socket, discovered from the environment by default
    #[arg(long)]
    socket: Option<String>,

    /// Log notifications instead of showing them in Hyprland
    #[arg(long)]
    no_notify: bool,

    /// Run the script once and exit
    #[arg(long)]
    check: bool,
}

fn expand(path: &str) -> PathBuf {
    shellexpand::tilde(path).into_owned().into()
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let settings_path = args
        .settings
        .as_deref()
        .map(expand)
        .unwrap_or_else(hyprlua_config::default_settings_path);
    let mut settings = hyprlua_config::load_settings(&settings_path)?;
    if let Some(script) = &args.script {
        settings.script = expand(script);
    }
    if let Some(socket) = &args.socket {
        settings.socket = Some(expand(socket));
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(settings.global.log_level.as_filter())),
        )
        .init();

    tracing::debug!("Settings loaded from {}", settings_path.display());

    let hyprctl = match HyprctlClient::from_env() {
        Ok(client) => Some(client),
        Err(e) => {
            tracing::warn!("{}; monitor functions and notifications are unavailable", e);
            None
        }
    };

    let notifier: Arc<dyn Notifier> = match &hyprctl {
        Some(client) if !args.no_notify && settings.notifications.enabled => {
            Arc::new(HyprctlNotifier::new(client.clone()))
        }
        _ => Arc::new(LogNotifier),
    };

    let mut engine =
        LuaEngine::new(notifier.clone()).with_notify_duration(settings.notifications.duration);
    if let Some(client) = hyprctl {
        engine = engine.with_hyprctl(client);
    }
    if let Some(dir) = &settings.modules_dir {
        engine = engine.with_modules_dir(dir);
    }

    if args.check {
        return check(&engine, &settings.script);
    }

    let coordinator = Arc::new(
        ReloadCoordinator::new(engine, &settings.script, notifier.clone())
            .with_notifications(settings.notifications),
    );
    // Failures are reported by the coordinator; the watcher may still pick up a fix
    let _ = coordinator.reload();
    let handle = coordinator.handle();

    let mut watcher = match WatchTarget::new(coordinator.script_path()) {
        Ok(target) => {
            let mut watcher = DebouncedWatcher::new(target, coordinator.clone(), notifier.clone())
                .with_settings(settings.watch)
                .with_notifications(settings.notifications);
            if watcher.start().is_err() {
                tracing::warn!("Live reload disabled");
            }
            Some(watcher)
        }
        Err(e) => {
            tracing::error!("{}", e);
            notifier.notify(
                &e.to_string(),
                Severity::Error,
                settings.notifications.error_duration,
            );
            None
        }
    };

    let mut events = match start_event_pipeline(&settings, handle.clone()).await {
        Ok(events) => Some(events),
        Err(e) => {
            tracing::error!("Event pipeline disabled: {:#}", e);
            notifier.notify(
                &format!("Not listening for Hyprland events: {}", e),
                Severity::Warning,
                settings.notifications.error_duration,
            );
            None
        }
    };

    tracing::info!(
        script_loaded = handle.is_loaded(),
        watching = watcher.is_some(),
        events = events.is_some(),
        "hyprlua daemon running"
    );

    shutdown_signal().await?;

    tracing::info!("Shutting down...");

    if let Some(watcher) = watcher.as_mut() {
        watcher.stop().await;
    }
    if let Some(events) = events.as_mut() {
        if events.is_finished() {
            tracing::debug!("Event pipeline had already ended");
        }
        events.stop().await;
    }
    handle.clear();

    Ok(())
}

/// Connect the event socket to the script hooks
async fn start_event_pipeline(
    settings: &Settings,
    hooks: Arc<ScriptHandle<LuaEnvironment>>,
) -> Result<EventSourceHandle> {
    let path = match &settings.socket {
        Some(path) => path.clone(),
        None => hyprlua_config::event_socket_path()?,
    };

    let mut router = EventRouter::new();
    register_event_handlers(&mut router, hooks)?;

    let handlers = router.len();

    let source = SocketEventSource::connect(path.clone(), Arc::new(router)).await?;
    tracing::info!(handlers, "Listening for events on {}", path.display());

    Ok(source.reconnect(ReconnectPolicy::default()).spawn())
}

/// Run the script once in a throwaway environment
fn check(engine: &LuaEngine, script: &Path) -> Result<()> {
    engine.load_and_run(script)?;
    println!("{}: OK", script.display());
    Ok(())
}

async fn shutdown_signal() -> Result<()> {
    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result?,
        _ = terminate.recv() => {}
    }
    Ok(())
}
