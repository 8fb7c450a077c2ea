//! Overlay window surface
//!
//! The controller never talks to the OS directly; it applies a
//! [`WindowStyle`] through a [`WindowSurface`] held in a [`WindowSlot`].
//! The slot is created empty and bound once a native handle exists.

mod geometry;
mod style;
mod surface;

pub use geometry::{ScreenRect, WindowPoint};
pub use style::{StyleConfig, WindowStyle};
pub use surface::{DetachedSurface, WindowError, WindowSlot, WindowSurface};

#[cfg(test)]
pub(crate) use surface::testing;
