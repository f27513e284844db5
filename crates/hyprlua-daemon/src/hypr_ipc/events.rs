//! Typed handlers for the compositor events hyprlua listens to
//!
//! Each handler parses its own payload and forwards the fields to the script
//! layer through `EventHooks`. The router itself knows nothing about these
//! names.

use std::sync::Arc;

use tracing::debug;

use super::router::{EventRouter, HandlerError, RouterError};

/// Receiver of parsed events, implemented by the script layer
pub trait EventHooks: Send + Sync {
    /// Forward `event` with its named fields
    fn emit(&self, event: &str, fields: &[(&'static str, String)]) -> Result<(), HandlerError>;
}

/// A parsed compositor event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HyprEvent {
    /// `workspace>>NAME`
    Workspace { name: String },
    /// `workspacev2>>ID,NAME`
    WorkspaceV2 { id: String, name: String },
    /// `focusedmon>>MONITOR,WORKSPACE`
    FocusedMonitor { monitor: String, workspace: String },
    /// `activewindow>>CLASS,TITLE`
    ActiveWindow { class: String, title: String },
    /// `activewindowv2>>ADDRESS`
    ActiveWindowV2 { address: String },
    /// `fullscreen>>0|1`
    Fullscreen { active: bool },
    /// `openwindow>>ADDRESS,WORKSPACE,CLASS,TITLE`
    OpenWindow {
        address: String,
        workspace: String,
        class: String,
        title: String,
    },
    /// `closewindow>>ADDRESS`
    CloseWindow { address: String },
}

impl HyprEvent {
    /// Names of every event with a typed handler
    pub const NAMES: [&'static str; 8] = [
        "workspace",
        "workspacev2",
        "focusedmon",
        "activewindow",
        "activewindowv2",
        "fullscreen",
        "openwindow",
        "closewindow",
    ];

    /// Parse the payload of `event_name`
    pub fn parse(event_name: &str, payload: &str) -> Result<Self, HandlerError> {
        let event = match event_name {
            "workspace" => Self::Workspace {
                name: payload.to_string(),
            },
            "workspacev2" => {
                let [id, name] = split_fields::<2>(event_name, payload)?;
                Self::WorkspaceV2 { id, name }
            }
            "focusedmon" => {
                let [monitor, workspace] = split_fields::<2>(event_name, payload)?;
                Self::FocusedMonitor { monitor, workspace }
            }
            "activewindow" => {
                let [class, title] = split_fields::<2>(event_name, payload)?;
                Self::ActiveWindow { class, title }
            }
            "activewindowv2" => Self::ActiveWindowV2 {
                address: payload.to_string(),
            },
            "fullscreen" => Self::Fullscreen {
                active: match payload.trim() {
                    "1" => true,
                    "0" => false,
                    other => {
                        return Err(HandlerError::new(format!(
                            "fullscreen: expected 0 or 1, got {:?}",
                            other
                        )))
                    }
                },
            },
            "openwindow" => {
                let [address, workspace, class, title] = split_fields::<4>(event_name, payload)?;
                Self::OpenWindow {
                    address,
                    workspace,
                    class,
                    title,
                }
            }
            "closewindow" => Self::CloseWindow {
                address: payload.to_string(),
            },
            other => {
                return Err(HandlerError::new(format!("no typed handler for `{}`", other)));
            }
        };
        Ok(event)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Workspace { .. } => "workspace",
            Self::WorkspaceV2 { .. } => "workspacev2",
            Self::FocusedMonitor { .. } => "focusedmon",
            Self::ActiveWindow { .. } => "activewindow",
            Self::ActiveWindowV2 { .. } => "activewindowv2",
            Self::Fullscreen { .. } => "fullscreen",
            Self::OpenWindow { .. } => "openwindow",
            Self::CloseWindow { .. } => "closewindow",
        }
    }

    /// Named fields handed to script hooks
    pub fn fields(&self) -> Vec<(&'static str, String)> {
        match self {
            Self::Workspace { name } => vec![("name", name.clone())],
            Self::WorkspaceV2 { id, name } => vec![("id", id.clone()), ("name", name.clone())],
            Self::FocusedMonitor { monitor, workspace } => {
                vec![("monitor", monitor.clone()), ("workspace", workspace.clone())]
            }
            Self::ActiveWindow { class, title } => {
                vec![("class", class.clone()), ("title", title.clone())]
            }
            Self::ActiveWindowV2 { address } | Self::CloseWindow { address } => {
                vec![("address", address.clone())]
            }
            Self::Fullscreen { active } => vec![("active", active.to_string())],
            Self::OpenWindow {
                address,
                workspace,
                class,
                title,
            } => vec![
                ("address", address.clone()),
                ("workspace", workspace.clone()),
                ("class", class.clone()),
                ("title", title.clone()),
            ],
        }
    }
}

/// Split `payload` into exactly `N` comma-separated fields
///
/// The last field keeps any further commas, since window titles may contain them.
fn split_fields<const N: usize>(event: &str, payload: &str) -> Result<[String; N], HandlerError> {
    let parts: Vec<String> = payload.splitn(N, ',').map(str::to_string).collect();
    let found = parts.len();
    parts.try_into().map_err(|_| {
        HandlerError::new(format!(
            "{}: expected {} comma-separated fields, got {}",
            event, N, found
        ))
    })
}

/// Register a handler for every name in `HyprEvent::NAMES`
pub fn register_event_handlers(
    router: &mut EventRouter,
    hooks: Arc<dyn EventHooks>,
) -> Result<(), RouterError> {
    for name in HyprEvent::NAMES {
        let hooks = hooks.clone();
        router.register(name, move |payload| {
            let event = HyprEvent::parse(name, payload)?;
            debug!(event = name, ?event, "Compositor event");
            hooks.emit(event.name(), &event.fields())
        })?;
    }
    Ok(())
}
