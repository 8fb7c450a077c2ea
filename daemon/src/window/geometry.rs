//! Screen and window-relative coordinates

use serde::{Deserialize, Serialize};

/// Rectangle in screen coordinates (physical pixels)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl ScreenRect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Right/bottom edges are exclusive.
    pub fn contains(&self, screen_x: i32, screen_y: i32) -> bool {
        screen_x >= self.x
            && screen_y >= self.y
            && screen_x < self.x.saturating_add(self.width)
            && screen_y < self.y.saturating_add(self.height)
    }

    /// Translate a screen position into window-relative coordinates,
    /// or `None` when the position lies outside the rectangle.
    pub fn to_window(&self, screen_x: i32, screen_y: i32) -> Option<WindowPoint> {
        if !self.contains(screen_x, screen_y) {
            return None;
        }
        Some(WindowPoint {
            x: screen_x - self.x,
            y: screen_y - self.y,
        })
    }
}

/// Position relative to the overlay window's top-left corner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowPoint {
    pub x: i32,
    pub y: i32,
}

impl WindowPoint {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}
