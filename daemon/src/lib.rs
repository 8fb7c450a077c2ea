//! Overlay interaction core
//!
//! Switches a heads-up overlay window between a click-through Background
//! mode and a focusable Interactive mode, driven by global hotkeys, an idle
//! timer and collaborator commands, and reports which list item the pointer
//! hovers while the overlay is click-through.

pub mod config;
pub mod dispatch;
pub mod events;
pub mod hotkey;
pub mod hover;
pub mod ipc;
pub mod lifecycle;
pub mod logging;
pub mod platform;
pub mod pointer;
pub mod state;
pub mod window;
