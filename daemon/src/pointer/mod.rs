//! Pointer module for system-wide pointer motion
//!
//! A low-level hook on a dedicated worker thread observes pointer movement
//! even while the overlay is click-through, and marshals positions to the
//! dispatcher through a bounded queue.

mod event;
mod hook;

pub use event::PointerEvent;
pub use hook::{HookError, PointerBackend, PointerHook, PointerSink};
