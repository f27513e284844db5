//! Hyprland IPC
//!
//! Hyprland exposes two Unix sockets per running instance:
//!
//! - `.socket2.sock` pushes `EVENT>>DATA` messages to every connected client.
//!   `SocketEventSource` reads it, `frame::decode` splits each message and
//!   `EventRouter` hands it to the handler registered for its name.
//! - `.socket.sock` takes one request per connection. `HyprctlClient` uses it
//!   for notifications and runtime keywords.
//!
//! ## Architecture
//!
//! ```text
//! +-------------------+    +--------------+    +-------------+    +-----------+
//! | SocketEventSource | -> | frame::decode| -> | EventRouter | -> | handler   |
//! | (reader task)     |    |              |    |             |    | (events)  |
//! +-------------------+    +--------------+    +-------------+    +-----------+
//! ```

mod client;
mod error;
mod events;
mod frame;
mod router;
mod source;

pub use client::HyprctlClient;
pub use error::HyprError;
pub use events::{register_event_handlers, EventHooks};
pub use router::{EventRouter, HandlerError};
pub use source::{EventSourceHandle, ReconnectPolicy, SocketEventSource};
