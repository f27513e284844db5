//! Synchronous work on async tasks
//!
//! Reloads run Lua and event hooks may talk to `.socket.sock`, both of which
//! block. On the multi-threaded runtime the worker hands its other tasks to
//! another thread for the duration.

use tokio::runtime::{Handle, RuntimeFlavor};

/// Run `f` in place, without stalling the other tasks of a multi-threaded runtime
///
/// On a current-thread runtime, or outside of any runtime, `f` just runs.
pub(crate) fn run_blocking<R>(f: impl FnOnce() -> R) -> R {
    match Handle::try_current() {
        Ok(handle) if matches!(handle.runtime_flavor(), RuntimeFlavor::MultiThread) => {
            tokio::task::block_in_place(f)
        }
        _ => f(),
    }
}
