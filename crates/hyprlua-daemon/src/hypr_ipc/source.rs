//! Event socket reader
//!
//! `SocketEventSource` owns one connection to Hyprland's `.socket2.sock`,
//! reads it in a loop, decodes every read into a frame and hands it to the
//! `EventRouter`.
//!
//! ## Shutdown
//!
//! The read is raced against a `CancellationToken`, so stopping unblocks a
//! read that would otherwise wait forever for the next compositor event. Once
//! the loop has left, the socket is shut down in both directions and closed.
//!
//! ## Reconnection
//!
//! A spawned source can optionally reconnect after the compositor closes the
//! connection (EOF, connection reset, broken pipe):
//!
//! - Every reconnection attempt is preceded by a backoff delay that starts at
//!   500ms, doubles each retry and caps at 10 seconds
//! - The retry budget carries over between connections and is refilled only
//!   once a connection has delivered at least one message, so a peer that
//!   accepts and immediately closes exhausts it
//! - Once it is exhausted, event handling is disabled and the daemon keeps
//!   running with only the script watcher

use std::io::ErrorKind;
use std::net::Shutdown;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::net::UnixStream;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::error::HyprError;
use super::frame;
use super::router::EventRouter;
use crate::blocking::run_blocking;

/// Size of the buffer handed to each `read`
pub const READ_BUFFER_SIZE: usize = 1024;

/// Default number of reconnection retry attempts
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Initial delay before a reconnection attempt (500ms)
const INITIAL_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Maximum delay before a reconnection attempt (10 seconds)
const MAX_RETRY_DELAY: Duration = Duration::from_secs(10);

/// Why `run()` returned without an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceExit {
    /// The compositor closed the connection
    PeerClosed,
    /// The source was stopped
    Stopped,
}

/// How a spawned source reconnects after losing the compositor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_delay: INITIAL_RETRY_DELAY,
            max_delay: MAX_RETRY_DELAY,
        }
    }
}

/// Exponential backoff state shared by all connections of one spawned source
#[derive(Debug)]
struct Backoff {
    policy: ReconnectPolicy,
    attempts: u32,
    delay: Duration,
}

impl Backoff {
    fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            attempts: 0,
            delay: policy.initial_delay,
        }
    }

    fn reset(&mut self) {
        self.attempts = 0;
        self.delay = self.policy.initial_delay;
    }

    /// Delay before the next attempt, or `None` once the retries are used up
    fn next_delay(&mut self) -> Option<Duration> {
        if self.attempts >= self.policy.max_retries {
            return None;
        }
        self.attempts += 1;
        let delay = self.delay;
        self.delay = (self.delay * 2).min(self.policy.max_delay);
        Some(delay)
    }
}

/// A connected reader of the Hyprland event socket
#[derive(Debug)]
pub struct SocketEventSource {
    stream: UnixStream,
    path: PathBuf,
    router: Arc<EventRouter>,
    cancel: CancellationToken,
    reconnect: Option<ReconnectPolicy>,
}

impl SocketEventSource {
    /// Connect to the event socket at `path`
    ///
    /// # Errors
    ///
    /// Returns `HyprError::SocketNotFound` if the path doesn't exist.
    /// Returns `HyprError::ConnectionFailed` if the connection fails.
    pub async fn connect(
        path: impl Into<PathBuf>,
        router: Arc<EventRouter>,
    ) -> Result<Self, HyprError> {
        Self::connect_with_token(path.into(), router, CancellationToken::new()).await
    }

    async fn connect_with_token(
        path: PathBuf,
        router: Arc<EventRouter>,
        cancel: CancellationToken,
    ) -> Result<Self, HyprError> {
        if !path.exists() {
            return Err(HyprError::SocketNotFound { path });
        }

        let stream = UnixStream::connect(&path)
            .await
            .map_err(|e| HyprError::ConnectionFailed {
                path: path.clone(),
                source: e,
            })?;

        debug!("Connected to Hyprland event socket at {}", path.display());

        Ok(Self {
            stream,
            path,
            router,
            cancel,
            reconnect: None,
        })
    }

    /// Reconnect according to `policy` after the compositor closes the
    /// connection. Only used by `spawn()`.
    pub fn reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = Some(policy);
        self
    }

    /// Read, decode and dispatch until stopped or the peer closes
    ///
    /// One successful read is decoded as one message. Malformed frames and
    /// unknown events are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns `HyprError::ReadFailed` for any read error other than
    /// `Interrupted`, which is retried.
    #[allow(dead_code)]
    pub async fn run(self) -> Result<SourceExit, HyprError> {
        self.run_session().await.0
    }

    /// `run()`, also returning how many frames were dispatched
    async fn run_session(mut self) -> (Result<SourceExit, HyprError>, u64) {
        let mut buffer = [0u8; READ_BUFFER_SIZE];
        let mut dispatched = 0u64;

        let exit = loop {
            if self.cancel.is_cancelled() {
                break Ok(SourceExit::Stopped);
            }

            let read = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break Ok(SourceExit::Stopped),
                read = self.stream.read(&mut buffer) => read,
            };

            match read {
                Ok(0) => {
                    info!("Hyprland closed the event socket");
                    break Ok(SourceExit::PeerClosed);
                }
                Ok(n) => {
                    if self.cancel.is_cancelled() {
                        break Ok(SourceExit::Stopped);
                    }
                    match frame::decode(&buffer[..n]) {
                        Ok(frame) => {
                            let outcome = run_blocking(|| self.router.dispatch(&frame));
                            trace!(?outcome, "Dispatched {}", frame.event_name);
                            dispatched += 1;
                        }
                        Err(malformed) => {
                            warn!(raw = %malformed.raw, "Dropping malformed event frame");
                        }
                    }
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => break Err(HyprError::ReadFailed(e)),
            }
        };

        close(self.stream);
        (exit, dispatched)
    }

    /// Run the read loop on its own task
    ///
    /// With `reconnect()` set, the task reconnects after the peer closes and
    /// ends only when stopped or when reconnection gives up.
    pub fn spawn(self) -> EventSourceHandle {
        let cancel = self.cancel.clone();
        let task = tokio::spawn(supervise(self));
        EventSourceHandle {
            cancel,
            task: Some(task),
        }
    }
}

async fn supervise(mut source: SocketEventSource) -> Result<(), HyprError> {
    let policy = source.reconnect;
    let mut backoff = policy.map(Backoff::new);

    loop {
        let path = source.path.clone();
        let router = source.router.clone();
        let cancel = source.cancel.clone();

        let (exit, dispatched) = source.run_session().await;
        match exit {
            Ok(SourceExit::Stopped) => return Ok(()),
            Ok(SourceExit::PeerClosed) => {}
            Err(HyprError::ReadFailed(ref io_err))
                if io_err.kind() == ErrorKind::ConnectionReset
                    || io_err.kind() == ErrorKind::BrokenPipe =>
            {
                warn!("Hyprland event socket connection lost ({})", io_err.kind());
            }
            Err(e) => {
                warn!("Hyprland event socket error: {}", e);
                return Err(e);
            }
        }

        let Some(retry) = backoff.as_mut() else {
            return Ok(());
        };
        if dispatched > 0 {
            retry.reset();
        }

        source = loop {
            let Some(delay) = retry.next_delay() else {
                warn!(
                    attempts = retry.attempts,
                    "Failed to reconnect to the Hyprland event socket. \
                     Compositor events will not be handled."
                );
                return Err(HyprError::MaxRetriesExceeded {
                    attempts: retry.attempts,
                });
            };

            warn!(
                attempt = retry.attempts,
                max_retries = retry.policy.max_retries,
                delay_ms = delay.as_millis() as u64,
                "Reconnecting to the Hyprland event socket..."
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(()),
                _ = sleep(delay) => {}
            }

            let connect =
                SocketEventSource::connect_with_token(path.clone(), router.clone(), cancel.clone());
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(()),
                result = connect => result,
            };
            match result {
                Ok(next) => {
                    info!(attempt = retry.attempts, "Hyprland event socket reconnected");
                    break next;
                }
                Err(e) => warn!(attempt = retry.attempts, "Reconnection failed: {}", e),
            }
        };
        source.reconnect = policy;
    }
}

fn close(stream: UnixStream) {
    match stream.into_std() {
        Ok(stream) => {
            if let Err(e) = stream.shutdown(Shutdown::Both) {
                // NotConnected is expected once the peer has gone
                if e.kind() != ErrorKind::NotConnected {
                    debug!("Event socket shutdown failed: {}", e);
                }
            }
        }
        Err(e) => debug!("Could not detach event socket for shutdown: {}", e),
    }
}

/// Handle to a spawned event source
///
/// Dropping the handle stops the source without waiting for it.
#[derive(Debug)]
pub struct EventSourceHandle {
    cancel: CancellationToken,
    task: Option<JoinHandle<Result<(), HyprError>>>,
}

impl EventSourceHandle {
    /// Stop the source and wait for its task to finish
    ///
    /// Safe to call from any task. No handler runs after this returns.
    /// Calling it again does nothing.
    pub async fn stop(&mut self) {
        self.cancel.cancel();
        let Some(task) = self.task.take() else {
            return;
        };
        match task.await {
            Ok(Ok(())) => debug!("Event source stopped"),
            Ok(Err(e)) => debug!("Event source had already ended: {}", e),
            Err(e) => warn!("Event source task failed: {}", e),
        }
    }

    /// Whether the reader task has ended, on its own or after `stop()`
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, |task| task.is_finished())
    }
}

impl Drop for EventSourceHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
