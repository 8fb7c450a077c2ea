//! Native window access behind a trait
//!
//! `WindowSlot` is the stable handle the controller is built with. It starts
//! unbound and is populated once the presentation layer has produced a
//! window, so nothing needs a nullable back-reference patched in later.

use tracing::{debug, info};

use super::geometry::ScreenRect;
use super::style::WindowStyle;

/// Errors from applying window attributes
#[derive(Debug, thiserror::Error)]
pub enum WindowError {
    #[error("no window is bound to the overlay controller")]
    Unbound,

    #[error("window handle is no longer valid")]
    InvalidHandle,

    #[error("window call rejected by the OS: {0}")]
    Os(String),
}

/// OS window operations the controller needs
///
/// Implementations must be cheap and non-blocking; every call happens on the
/// dispatcher thread.
pub trait WindowSurface: Send {
    /// Apply click-through, focusability, topmost and opacity in one step.
    fn apply_style(&mut self, style: &WindowStyle) -> Result<(), WindowError>;

    /// Raise the window above other topmost windows and make it foreground.
    ///
    /// Best effort: the OS may refuse foreground requests from a process
    /// that does not own the window. The presentation layer takes
    /// foreground itself once it sees the mode change.
    fn bring_to_front(&mut self) -> Result<(), WindowError>;

    /// Give keyboard focus to the window's default input control. Best
    /// effort, like [`WindowSurface::bring_to_front`].
    fn focus_default_input(&mut self) -> Result<(), WindowError>;

    /// Move/resize the window.
    fn relocate(&mut self, rect: ScreenRect) -> Result<(), WindowError>;

    /// Current screen rectangle, `None` if it cannot be queried.
    fn screen_rect(&self) -> Option<ScreenRect>;
}

/// Two-phase handle to the overlay window: build first, bind later
#[derive(Default)]
pub struct WindowSlot {
    surface: Option<Box<dyn WindowSurface>>,
}

impl WindowSlot {
    /// An empty slot; every operation fails with [`WindowError::Unbound`].
    pub fn unbound() -> Self {
        Self { surface: None }
    }

    /// Bind the native surface. Rebinding replaces the previous surface.
    pub fn bind(&mut self, surface: Box<dyn WindowSurface>) {
        if self.surface.is_some() {
            info!("replacing bound overlay window");
        }
        self.surface = Some(surface);
    }

    pub fn is_bound(&self) -> bool {
        self.surface.is_some()
    }

    pub fn apply_style(&mut self, style: &WindowStyle) -> Result<(), WindowError> {
        self.surface_mut()?.apply_style(style)
    }

    pub fn bring_to_front(&mut self) -> Result<(), WindowError> {
        self.surface_mut()?.bring_to_front()
    }

    pub fn focus_default_input(&mut self) -> Result<(), WindowError> {
        self.surface_mut()?.focus_default_input()
    }

    pub fn relocate(&mut self, rect: ScreenRect) -> Result<(), WindowError> {
        self.surface_mut()?.relocate(rect)
    }

    pub fn screen_rect(&self) -> Option<ScreenRect> {
        self.surface.as_ref().and_then(|s| s.screen_rect())
    }

    fn surface_mut(&mut self) -> Result<&mut Box<dyn WindowSurface>, WindowError> {
        self.surface.as_mut().ok_or(WindowError::Unbound)
    }
}

/// Surface for a window owned by another process
///
/// Used when no native handle is configured: the presentation layer applies
/// styles itself in response to `ModeChanged`, and reports its position via
/// `WindowMoved`. This surface only tracks the rectangle.
#[derive(Debug, Clone)]
pub struct DetachedSurface {
    rect: ScreenRect,
    style: Option<WindowStyle>,
}

impl DetachedSurface {
    pub fn new(rect: ScreenRect) -> Self {
        Self { rect, style: None }
    }

    /// Last applied style.
    pub fn style(&self) -> Option<WindowStyle> {
        self.style
    }
}

impl WindowSurface for DetachedSurface {
    fn apply_style(&mut self, style: &WindowStyle) -> Result<(), WindowError> {
        debug!(?style, "detached surface style");
        self.style = Some(*style);
        Ok(())
    }

    fn bring_to_front(&mut self) -> Result<(), WindowError> {
        Ok(())
    }

    fn focus_default_input(&mut self) -> Result<(), WindowError> {
        Ok(())
    }

    fn relocate(&mut self, rect: ScreenRect) -> Result<(), WindowError> {
        self.rect = rect;
        Ok(())
    }

    fn screen_rect(&self) -> Option<ScreenRect> {
        Some(self.rect)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::OverlayMode;
    use crate::window::StyleConfig;

    #[test]
    fn test_unbound_slot_rejects_calls() {
        let mut slot = WindowSlot::unbound();
        let style = WindowStyle::for_mode(OverlayMode::Background, &StyleConfig::default());
        assert!(matches!(slot.apply_style(&style), Err(WindowError::Unbound)));
        assert!(slot.screen_rect().is_none());
    }

    #[test]
    fn test_detached_surface_tracks_rect_and_style() {
        let mut slot = WindowSlot::unbound();
        slot.bind(Box::new(DetachedSurface::new(ScreenRect::new(0, 0, 280, 600))));
        assert!(slot.is_bound());

        slot.relocate(ScreenRect::new(1640, 240, 280, 600)).unwrap();
        assert_eq!(slot.screen_rect(), Some(ScreenRect::new(1640, 240, 280, 600)));

        let style = WindowStyle::for_mode(OverlayMode::Interactive, &StyleConfig::default());
        slot.apply_style(&style).unwrap();
    }
}
