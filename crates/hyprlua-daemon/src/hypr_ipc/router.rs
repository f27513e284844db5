//! Routing of decoded frames to event handlers
//!
//! The router is filled once at startup and then moved into the event source,
//! so the set of handlers cannot change while events are flowing. Dispatch is
//! synchronous: a slow handler delays the next frame.

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;
use tracing::{debug, warn};

use super::frame::RawFrame;

/// Error returned by an event handler
///
/// Handlers parse their own payloads, so this is only a message. It is
/// logged by the router and never stops the stream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct HandlerError {
    message: String,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Errors raised while building a router
#[derive(Debug, Error)]
pub enum RouterError {
    #[error("A handler for `{0}` is already registered")]
    DuplicateHandler(String),
}

/// A registered event handler
pub type Handler = Box<dyn Fn(&str) -> Result<(), HandlerError> + Send + Sync>;

/// What happened to a dispatched frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The handler ran and succeeded
    Handled,
    /// No handler is registered for this event name
    Unknown { event_name: String, payload: String },
    /// The handler ran and returned an error
    HandlerFailed { event_name: String, error: HandlerError },
}

/// Maps event names to handlers
#[derive(Default)]
pub struct EventRouter {
    handlers: HashMap<String, Handler>,
}

impl EventRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `event_name`
    ///
    /// Names are case-sensitive.
    ///
    /// # Errors
    ///
    /// Returns `RouterError::DuplicateHandler` if the name is already taken.
    pub fn register<F>(&mut self, event_name: impl Into<String>, handler: F) -> Result<(), RouterError>
    where
        F: Fn(&str) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        let event_name = event_name.into();
        if self.handlers.contains_key(&event_name) {
            return Err(RouterError::DuplicateHandler(event_name));
        }
        self.handlers.insert(event_name, Box::new(handler));
        Ok(())
    }

    /// Invoke the handler registered for `frame.event_name` with its payload
    ///
    /// Unknown events and handler failures are logged and reported in the
    /// returned outcome; neither is an error for the caller.
    pub fn dispatch(&self, frame: &RawFrame) -> DispatchOutcome {
        let Some(handler) = self.handlers.get(&frame.event_name) else {
            debug!(event = %frame.event_name, payload = %frame.payload, "Unknown event type");
            return DispatchOutcome::Unknown {
                event_name: frame.event_name.clone(),
                payload: frame.payload.clone(),
            };
        };

        match handler(frame.payload.as_str()) {
            Ok(()) => DispatchOutcome::Handled,
            Err(error) => {
                warn!(event = %frame.event_name, %error, "Event handler failed");
                DispatchOutcome::HandlerFailed {
                    event_name: frame.event_name.clone(),
                    error,
                }
            }
        }
    }

    /// Number of registered handlers
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for EventRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.handlers.keys().collect();
        names.sort();
        f.debug_struct("EventRouter").field("events", &names).finish()
    }
}
