//! Debounced watcher for the Lua configuration file
//!
//! Editors rarely write a file in one step: a save is usually a truncate, a
//! few writes and a close, or a write to a temporary file followed by a
//! rename. The watcher therefore subscribes to the file's *directory* and
//! collapses every notification burst for the tracked file into a single
//! `ChangeSignal`.
//!
//! The inotify handle is non-blocking and polled from a tokio task, with a
//! cancellation token raced against the sleep between two polls.
//!
//! A script that is a symlink is resolved once, when the target is created:
//! the watcher follows the file it points to. Re-pointing the link afterwards
//! is not noticed.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use hyprlua_config::{NotificationSettings, WatchSettings};
use nix::errno::Errno;
use nix::sys::inotify::{AddWatchFlags, InitFlags, Inotify};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::blocking::run_blocking;
use crate::notify::{Notifier, Severity};

/// How far in the past the last signal is assumed to be when watching starts
const INITIAL_SIGNAL_AGE: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("Cannot watch {path}: {source}")]
    InvalidTarget {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to initialize inotify: {0}")]
    Init(#[source] Errno),

    #[error("Failed to watch directory {path}: {source}")]
    AddWatch {
        path: PathBuf,
        #[source]
        source: Errno,
    },

    #[error("Failed to read file notifications: {0}")]
    Read(#[source] Errno),

    #[error("Watcher is inactive after a failed start")]
    Inactive,
}

/// The file being watched and the directory the subscription is placed on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchTarget {
    tracked_file: PathBuf,
    watched_dir: PathBuf,
}

impl WatchTarget {
    /// Resolve `file` to an absolute path with symlinks followed
    ///
    /// An existing file is canonicalized and its real directory is watched.
    /// A file that does not exist yet is resolved against its canonicalized
    /// parent.
    pub fn new(file: impl AsRef<Path>) -> Result<Self, WatchError> {
        let file = file.as_ref();
        let invalid = |source| WatchError::InvalidTarget {
            path: file.to_path_buf(),
            source,
        };

        if let Ok(resolved) = file.canonicalize() {
            if let Some(parent) = resolved.parent() {
                return Ok(Self {
                    watched_dir: parent.to_path_buf(),
                    tracked_file: resolved,
                });
            }
        }

        let name = file.file_name().ok_or_else(|| {
            invalid(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "path has no file name",
            ))
        })?;
        let parent = match file.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let watched_dir = parent.canonicalize().map_err(invalid)?;

        Ok(Self {
            tracked_file: watched_dir.join(name),
            watched_dir,
        })
    }

    pub fn tracked_file(&self) -> &Path {
        &self.tracked_file
    }

    pub fn watched_dir(&self) -> &Path {
        &self.watched_dir
    }

    /// Whether a notification for `name` inside the watched directory is about the tracked file
    fn matches(&self, name: Option<&OsStr>) -> bool {
        name.is_some_and(|name| self.watched_dir.join(name) == self.tracked_file)
    }
}

/// Emitted once per debounced change of the tracked file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeSignal {
    pub at: Instant,
}

/// Receiver of change signals
pub trait ChangeListener: Send + Sync {
    fn on_change(&self, signal: ChangeSignal);
}

/// Drops signals that follow the last emitted one too closely
#[derive(Debug)]
struct Debounce {
    window: Duration,
    last_signal: Instant,
}

impl Debounce {
    fn new(window: Duration, now: Instant) -> Self {
        Self {
            window,
            last_signal: now.checked_sub(INITIAL_SIGNAL_AGE).unwrap_or(now),
        }
    }

    /// Returns true and records `now` if a signal may be emitted
    fn admit(&mut self, now: Instant) -> bool {
        if now.saturating_duration_since(self.last_signal) >= self.window {
            self.last_signal = now;
            true
        } else {
            false
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WatcherState {
    Idle,
    Running,
    Failed,
}

/// Watches one file and reports debounced changes to a `ChangeListener`
pub struct DebouncedWatcher {
    target: WatchTarget,
    listener: Arc<dyn ChangeListener>,
    notifier: Arc<dyn Notifier>,
    settings: WatchSettings,
    notifications: NotificationSettings,
    state: WatcherState,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl DebouncedWatcher {
    pub fn new(
        target: WatchTarget,
        listener: Arc<dyn ChangeListener>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            target,
            listener,
            notifier,
            settings: WatchSettings::default(),
            notifications: NotificationSettings::default(),
            state: WatcherState::Idle,
            cancel: CancellationToken::new(),
            task: None,
        }
    }

    pub fn with_settings(mut self, settings: WatchSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_notifications(mut self, notifications: NotificationSettings) -> Self {
        self.notifications = notifications;
        self
    }

    /// Whether the polling task is alive
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Subscribe to the watched directory and start polling
    ///
    /// Calling `start` on a running watcher does nothing.
    ///
    /// # Errors
    ///
    /// `WatchError::Init` or `WatchError::AddWatch` if the subscription
    /// cannot be set up. The failure is reported through the notifier and the
    /// watcher stays inactive: every later call returns `WatchError::Inactive`.
    pub fn start(&mut self) -> Result<(), WatchError> {
        match self.state {
            WatcherState::Failed => return Err(WatchError::Inactive),
            WatcherState::Running if self.is_running() => return Ok(()),
            _ => {}
        }

        let inotify = match self.subscribe() {
            Ok(inotify) => inotify,
            Err(e) => {
                error!("{}", e);
                self.notifier
                    .notify(&e.to_string(), Severity::Error, self.notifications.error_duration);
                self.state = WatcherState::Failed;
                return Err(e);
            }
        };

        let file = self.target.tracked_file().display().to_string();
        info!(dir = %self.target.watched_dir().display(), "Watching {}", file);
        self.notifier.notify(
            &format!("Monitoring '{}' for changes...", file),
            Severity::Success,
            self.notifications.duration,
        );

        self.cancel = CancellationToken::new();
        let poller = Poller {
            inotify,
            target: self.target.clone(),
            listener: self.listener.clone(),
            notifier: self.notifier.clone(),
            settings: self.settings,
            error_duration: self.notifications.error_duration,
            cancel: self.cancel.clone(),
        };
        self.task = Some(tokio::spawn(poller.run()));
        self.state = WatcherState::Running;
        Ok(())
    }

    fn subscribe(&self) -> Result<Inotify, WatchError> {
        let inotify = Inotify::init(InitFlags::IN_NONBLOCK | InitFlags::IN_CLOEXEC)
            .map_err(WatchError::Init)?;
        inotify
            .add_watch(
                self.target.watched_dir(),
                AddWatchFlags::IN_MODIFY
                    | AddWatchFlags::IN_CLOSE_WRITE
                    | AddWatchFlags::IN_MOVED_TO
                    | AddWatchFlags::IN_CREATE,
            )
            .map_err(|source| WatchError::AddWatch {
                path: self.target.watched_dir().to_path_buf(),
                source,
            })?;
        Ok(inotify)
    }

    /// Stop polling and wait for the task to finish
    ///
    /// No signal is delivered once this returns. Safe to call more than once.
    pub async fn stop(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("Watcher task ended abnormally: {}", e);
            }
        }
        if self.state == WatcherState::Running {
            self.state = WatcherState::Idle;
        }
        debug!("Watcher stopped");
    }
}

impl Drop for DebouncedWatcher {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// State owned by the polling task
struct Poller {
    inotify: Inotify,
    target: WatchTarget,
    listener: Arc<dyn ChangeListener>,
    notifier: Arc<dyn Notifier>,
    settings: WatchSettings,
    error_duration: Duration,
    cancel: CancellationToken,
}

impl Poller {
    async fn run(self) {
        let mut debounce = Debounce::new(self.settings.debounce, Instant::now());

        while !self.cancel.is_cancelled() {
            match self.inotify.read_events() {
                Ok(events) => {
                    let relevant = events
                        .iter()
                        .filter(|event| self.target.matches(event.name.as_deref()))
                        .count();
                    if relevant > 0 {
                        let now = Instant::now();
                        if debounce.admit(now) {
                            debug!(relevant, "{} changed", self.target.tracked_file().display());
                            run_blocking(|| self.listener.on_change(ChangeSignal { at: now }));
                        } else {
                            trace!(relevant, "Change inside debounce window dropped");
                        }
                    }
                }
                Err(Errno::EAGAIN) => {}
                Err(errno @ (Errno::EBADF | Errno::EINVAL)) => {
                    let e = WatchError::Read(errno);
                    error!("{}, watcher stopped", e);
                    self.notifier
                        .notify(&e.to_string(), Severity::Error, self.error_duration);
                    break;
                }
                Err(errno) => {
                    warn!("{}", WatchError::Read(errno));
                }
            }

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(self.settings.poll_interval) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::testing::RecordingNotifier;
    use tokio::sync::mpsc;

    const WINDOW: Duration = Duration::from_millis(500);

    struct ChannelListener(mpsc::UnboundedSender<ChangeSignal>);

    impl ChangeListener for ChannelListener {
        fn on_change(&self, signal: ChangeSignal) {
            let _ = self.0.send(signal);
        }
    }

    fn fast_settings() -> WatchSettings {
        WatchSettings {
            debounce: WINDOW,
            poll_interval: Duration::from_millis(20),
        }
    }

    fn watcher_for(
        file: &Path,
    ) -> (
        DebouncedWatcher,
        mpsc::UnboundedReceiver<ChangeSignal>,
        Arc<RecordingNotifier>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let notifier = Arc::new(RecordingNotifier::default());
        let watcher = DebouncedWatcher::new(
            WatchTarget::new(file).unwrap(),
            Arc::new(ChannelListener(tx)),
            notifier.clone(),
        )
        .with_settings(fast_settings());
        (watcher, rx, notifier)
    }

    #[test]
    fn test_first_change_is_emitted() {
        let now = Instant::now();
        let mut debounce = Debounce::new(WINDOW, now);
        assert!(debounce.admit(now));
    }

    #[test]
    fn test_burst_emits_once() {
        let start = Instant::now();
        let mut debounce = Debounce::new(WINDOW, start);

        let emitted = [0u64, 10, 120, 480]
            .iter()
            .filter(|ms| debounce.admit(start + Duration::from_millis(**ms)))
            .count();

        assert_eq!(emitted, 1);
    }

    #[test]
    fn test_spaced_changes_emit_twice() {
        let start = Instant::now();
        let mut debounce = Debounce::new(WINDOW, start);

        assert!(debounce.admit(start));
        assert!(debounce.admit(start + Duration::from_millis(600)));
    }

    #[test]
    fn test_window_boundary_is_inclusive() {
        let start = Instant::now();
        let mut debounce = Debounce::new(WINDOW, start);

        assert!(debounce.admit(start));
        assert!(!debounce.admit(start + Duration::from_millis(499)));
        assert!(debounce.admit(start + WINDOW));
    }

    #[test]
    fn test_target_resolves_parent() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("hyprland.lua");

        let target = WatchTarget::new(&file).unwrap();

        let canonical = dir.path().canonicalize().unwrap();
        assert_eq!(target.watched_dir(), canonical.as_path());
        assert_eq!(target.tracked_file(), canonical.join("hyprland.lua").as_path());
    }

    #[test]
    fn test_target_only_matches_tracked_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = WatchTarget::new(dir.path().join("hyprland.lua")).unwrap();

        assert!(target.matches(Some(OsStr::new("hyprland.lua"))));
        assert!(!target.matches(Some(OsStr::new("hyprland.lua.swp"))));
        assert!(!target.matches(Some(OsStr::new("other.lua"))));
        assert!(!target.matches(None));
    }

    #[test]
    fn test_target_follows_symlinked_file() {
        let real_dir = tempfile::tempdir().unwrap();
        let link_dir = tempfile::tempdir().unwrap();
        let real = real_dir.path().join("hyprland.lua");
        std::fs::write(&real, "-- dotfiles").unwrap();
        let link = link_dir.path().join("hyprland.lua");
        std::os::unix::fs::symlink(&real, &link).unwrap();

        let target = WatchTarget::new(&link).unwrap();

        let canonical = real.canonicalize().unwrap();
        assert_eq!(target.tracked_file(), canonical.as_path());
        assert_eq!(target.watched_dir(), canonical.parent().unwrap());
    }

    #[test]
    fn test_target_missing_directory() {
        let result = WatchTarget::new("/nonexistent/hyprlua/hyprland.lua");
        assert!(matches!(result, Err(WatchError::InvalidTarget { .. })));
    }

    #[tokio::test]
    async fn test_write_to_tracked_file_signals() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("hyprland.lua");
        let (mut watcher, mut rx, notifier) = watcher_for(&file);

        watcher.start().unwrap();
        std::fs::write(&file, "hypr.notify('hi')").unwrap();

        let signal = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("no change signal")
            .unwrap();
        assert!(signal.at <= Instant::now());
        assert!(notifier.messages()[0].starts_with("Monitoring '"));

        watcher.stop().await;
    }

    #[tokio::test]
    async fn test_write_burst_signals_once() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("hyprland.lua");
        let (mut watcher, mut rx, _) = watcher_for(&file);

        watcher.start().unwrap();
        std::fs::write(&file, "-- first").unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        std::fs::write(&file, "-- second").unwrap();

        let first = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await;
        assert!(matches!(first, Ok(Some(_))));
        let extra = tokio::time::timeout(Duration::from_millis(600), rx.recv()).await;
        assert!(extra.is_err(), "burst produced a second signal");

        watcher.stop().await;
    }

    #[tokio::test]
    async fn test_spaced_writes_signal_twice() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("hyprland.lua");
        let (mut watcher, mut rx, _) = watcher_for(&file);

        watcher.start().unwrap();
        std::fs::write(&file, "-- first").unwrap();
        let first = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();

        tokio::time::sleep(WINDOW + Duration::from_millis(200)).await;
        std::fs::write(&file, "-- second").unwrap();
        let second = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();

        assert!(second.at.duration_since(first.at) >= WINDOW);
        watcher.stop().await;
    }

    #[tokio::test]
    async fn test_write_through_symlink_target_signals() {
        let real_dir = tempfile::tempdir().unwrap();
        let link_dir = tempfile::tempdir().unwrap();
        let real = real_dir.path().join("hyprland.lua");
        std::fs::write(&real, "-- v1").unwrap();
        let link = link_dir.path().join("hyprland.lua");
        std::os::unix::fs::symlink(&real, &link).unwrap();
        let (mut watcher, mut rx, _) = watcher_for(&link);

        watcher.start().unwrap();
        std::fs::write(&real, "-- v2").unwrap();

        let signal = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await;
        assert!(matches!(signal, Ok(Some(_))));

        watcher.stop().await;
    }

    #[tokio::test]
    async fn test_other_files_never_signal() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("hyprland.lua");
        let (mut watcher, mut rx, _) = watcher_for(&file);

        watcher.start().unwrap();
        std::fs::write(dir.path().join("notes.txt"), "unrelated").unwrap();

        let result = tokio::time::timeout(Duration::from_millis(300), rx.recv()).await;
        assert!(result.is_err());

        watcher.stop().await;
    }

    #[tokio::test]
    async fn test_rename_onto_tracked_file_signals() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("hyprland.lua");
        let (mut watcher, mut rx, _) = watcher_for(&file);
        let scratch = dir.path().join(".hyprland.lua.tmp");
        std::fs::write(&scratch, "-- saved").unwrap();

        watcher.start().unwrap();
        std::fs::rename(&scratch, &file).unwrap();

        let signal = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await;
        assert!(matches!(signal, Ok(Some(_))));

        watcher.stop().await;
    }

    #[tokio::test]
    async fn test_no_signal_after_stop() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("hyprland.lua");
        let (mut watcher, mut rx, _) = watcher_for(&file);

        watcher.start().unwrap();
        watcher.stop().await;
        assert!(!watcher.is_running());

        std::fs::write(&file, "-- after stop").unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(rx.try_recv().is_err());
        watcher.stop().await;
    }

    #[tokio::test]
    async fn test_failed_start_is_reported_once() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("gone");
        std::fs::create_dir(&sub).unwrap();
        let file = sub.join("hyprland.lua");
        let (mut watcher, _rx, notifier) = watcher_for(&file);
        std::fs::remove_dir(&sub).unwrap();

        assert!(matches!(watcher.start(), Err(WatchError::AddWatch { .. })));
        assert!(matches!(watcher.start(), Err(WatchError::Inactive)));
        assert_eq!(notifier.severities(), vec![Severity::Error]);
    }
}
