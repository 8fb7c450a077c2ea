//! Hotkey module for global key combinations
//!
//! Binds logical actions (toggle-main, quick-add, quick-view,
//! clear-completed) to system-wide key combinations and reports fired
//! combinations by their logical action only.

mod keys;
mod registry;

pub use keys::{HotkeyAction, HotkeyBinding, Key, KeyCombo, Modifiers};
pub use registry::{HotkeyBackend, HotkeyError, HotkeyRegistry, HotkeySink};
