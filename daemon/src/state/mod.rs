//! Overlay mode management
//!
//! Two modes exist:
//! - Background: click-through, unfocusable, low opacity
//! - Interactive: accepts pointer and keyboard input until dismissed or idle
//!
//! The controller is the only component that changes window styling.

mod machine;
mod timer;

pub use machine::{DismissReason, OverlayMode, OverlayModeController};
pub use timer::{IdleDeadline, IdleTimer};
