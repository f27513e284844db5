//! Human-visible status reporting
//!
//! Everything the user should see (reload results, watcher failures) goes
//! through a `Notifier`. On a live session that is a Hyprland notification;
//! with `--no-notify` it only ends up in the log.

use std::sync::Mutex;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::hypr_ipc::HyprctlClient;

/// Prefix of every compositor notification
const PREFIX: &str = "[hyprlua]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

impl Severity {
    /// `hyprctl notify` icon
    fn icon(self) -> i32 {
        match self {
            Self::Warning => 0,
            Self::Info => 1,
            Self::Error => 3,
            Self::Success => 5,
        }
    }

    fn color(self) -> &'static str {
        match self {
            Self::Info => "rgb(3399ff)",
            Self::Success => "rgb(33ff33)",
            Self::Warning => "rgb(ff8000)",
            Self::Error => "rgb(ff3333)",
        }
    }
}

/// Sink for user-facing messages
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str, severity: Severity, duration: Duration);
}

/// Writes notifications to the log only
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, message: &str, severity: Severity, _duration: Duration) {
        match severity {
            Severity::Info | Severity::Success => info!("{}", message),
            Severity::Warning => warn!("{}", message),
            Severity::Error => error!("{}", message),
        }
    }
}

/// Shows notifications on screen through `hyprctl notify`
///
/// Requests are serialized, since both the watcher and the event reader
/// report through the same notifier. A failed request is logged along with
/// the message that could not be shown.
#[derive(Debug)]
pub struct HyprctlNotifier {
    client: HyprctlClient,
    lock: Mutex<()>,
}

impl HyprctlNotifier {
    pub fn new(client: HyprctlClient) -> Self {
        Self {
            client,
            lock: Mutex::new(()),
        }
    }
}

impl Notifier for HyprctlNotifier {
    fn notify(&self, message: &str, severity: Severity, duration: Duration) {
        LogNotifier.notify(message, severity, duration);

        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let text = format!("{} {}", PREFIX, message);
        if let Err(e) = self
            .client
            .notify(severity.icon(), duration, severity.color(), &text)
        {
            warn!(
                %message,
                socket = %self.client.socket_path().display(),
                "Failed to show notification: {}",
                e
            );
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::os::unix::net::UnixListener;

    #[test]
    fn test_hyprctl_notifier_sends_prefixed_message() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".socket.sock");
        let listener = UnixListener::bind(&path).unwrap();
        let server = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = String::new();
            stream.read_to_string(&mut request).unwrap();
            stream.write_all(b"ok").unwrap();
            request
        });

        let notifier = HyprctlNotifier::new(HyprctlClient::new(&path));
        notifier.notify("Reloaded", Severity::Error, Duration::from_millis(5000));

        assert_eq!(
            server.join().unwrap(),
            "notify 3 5000 rgb(ff3333) [hyprlua] Reloaded"
        );
    }

    #[test]
    fn test_hyprctl_notifier_survives_missing_socket() {
        let notifier = HyprctlNotifier::new(HyprctlClient::new("/nonexistent/.socket.sock"));
        notifier.notify("still fine", Severity::Info, Duration::from_millis(100));
    }
}
