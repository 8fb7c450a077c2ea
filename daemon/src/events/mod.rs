//! Notification surface of the overlay core
//!
//! Events are broadcast to every subscriber (presentation layer, tray,
//! todo service) and pushed to IPC clients that subscribed.

use serde::{Deserialize, Serialize};

use crate::hotkey::HotkeyAction;
use crate::hover::ItemId;
use crate::state::OverlayMode;
use crate::window::WindowPoint;

/// Events emitted by the controller, hotkey registry and hover coordinator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OverlayEvent {
    /// The overlay switched mode
    ModeChanged { mode: OverlayMode },

    /// A registered global hotkey fired
    HotkeyTriggered { id: HotkeyAction },

    /// The pointer started hovering a list item (Background mode only)
    ItemHoverEnter { item: ItemId },

    /// The pointer stopped hovering a list item
    ItemHoverLeave { item: ItemId },

    /// The pointer entered the overlay window's rectangle
    WindowHoverEnter { position: WindowPoint },

    /// The pointer left the overlay window's rectangle
    WindowHoverLeave,
}

impl std::fmt::Display for OverlayEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OverlayEvent::ModeChanged { mode } => write!(f, "MODE_CHANGED ({})", mode),
            OverlayEvent::HotkeyTriggered { id } => write!(f, "HOTKEY_TRIGGERED ({})", id),
            OverlayEvent::ItemHoverEnter { item } => write!(f, "ITEM_HOVER_ENTER ({})", item),
            OverlayEvent::ItemHoverLeave { item } => write!(f, "ITEM_HOVER_LEAVE ({})", item),
            OverlayEvent::WindowHoverEnter { position } => {
                write!(f, "WINDOW_HOVER_ENTER ({}, {})", position.x, position.y)
            }
            OverlayEvent::WindowHoverLeave => write!(f, "WINDOW_HOVER_LEAVE"),
        }
    }
}
