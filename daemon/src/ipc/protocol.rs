//! IPC message protocol definitions
//!
//! All messages are JSON-encoded, prefixed with a 4-byte little-endian length.

use serde::{Deserialize, Serialize};

use crate::events::OverlayEvent;
use crate::hotkey::HotkeyAction;
use crate::hover::{ItemId, LayoutMetrics, ListSnapshot};
use crate::state::OverlayMode;
use crate::window::ScreenRect;

/// Upper bound for a single framed message
pub const MAX_MESSAGE_LEN: usize = 1024 * 1024;

/// Requests from collaborators to the daemon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Ping to check connectivity
    Ping,

    /// Request current daemon status
    GetStatus,

    /// Request the shared list layout
    GetLayout,

    /// Activate the overlay
    Show,

    /// Explicit cancel from the panel
    Cancel,

    /// Escape pressed in the focused panel
    DismissKey,

    /// Qualifying input observed by the presentation layer
    UserInput,

    /// The overlay window moved or was resized
    WindowMoved { rect: ScreenRect },

    /// Replace the displayed list
    UpdateSnapshot { snapshot: ListSnapshot },

    /// Subscribe to overlay event notifications
    Subscribe,
}

/// Responses from daemon to collaborators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Pong response to ping
    Pong,

    /// Current daemon status
    Status(DaemonStatus),

    /// Layout metrics used for hit-testing
    Layout(LayoutMetrics),

    /// Request accepted
    Ack,

    /// Subscription confirmed
    Subscribed,

    /// Error response
    Error { code: String, message: String },
}

impl Response {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Response::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

/// Push notification to subscribed clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    Event { event: OverlayEvent },
}

/// Full daemon status snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaemonStatus {
    /// Daemon version
    pub version: String,

    /// Current overlay mode
    pub mode: OverlayMode,

    /// Hotkeys the OS accepted
    pub hotkeys: Vec<HotkeyAction>,

    /// Whether the pointer hook is installed
    pub pointer_hook: bool,

    /// Item under the pointer, if any
    pub hovered: Option<ItemId>,

    /// Uptime in seconds
    pub uptime_secs: u64,
}

impl Default for DaemonStatus {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            mode: OverlayMode::default(),
            hotkeys: Vec::new(),
            pointer_hook: false,
            hovered: None,
            uptime_secs: 0,
        }
    }
}

impl DaemonStatus {
    /// Fold an overlay event into the status view.
    pub fn apply(&mut self, event: &OverlayEvent) {
        match event {
            OverlayEvent::ModeChanged { mode } => self.mode = *mode,
            OverlayEvent::ItemHoverEnter { item } => self.hovered = Some(item.clone()),
            OverlayEvent::ItemHoverLeave { item } => {
                if self.hovered.as_ref() == Some(item) {
                    self.hovered = None;
                }
            }
            OverlayEvent::HotkeyTriggered { .. }
            | OverlayEvent::WindowHoverEnter { .. }
            | OverlayEvent::WindowHoverLeave => {}
        }
    }
}
