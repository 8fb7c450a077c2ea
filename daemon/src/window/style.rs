//! Window style derived from the overlay mode

use serde::{Deserialize, Serialize};

use crate::state::OverlayMode;

/// Opacity settings for the two modes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleConfig {
    /// Opacity while click-through (0, 1]
    pub background_opacity: f32,
    /// Opacity while interactive (0, 1]
    pub interactive_opacity: f32,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            background_opacity: 0.6,
            interactive_opacity: 1.0,
        }
    }
}

/// Complete set of OS-level window attributes for one mode
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowStyle {
    /// Pointer input passes through to windows beneath
    pub click_through: bool,
    /// Window may take keyboard focus
    pub accepts_focus: bool,
    /// Window stays above normal windows
    pub topmost: bool,
    /// Layered-window alpha in (0, 1]
    pub opacity: f32,
}

impl WindowStyle {
    /// The style is a pure function of the mode and configuration.
    pub fn for_mode(mode: OverlayMode, config: &StyleConfig) -> Self {
        match mode {
            OverlayMode::Background => Self {
                click_through: true,
                accepts_focus: false,
                topmost: true,
                opacity: config.background_opacity,
            },
            OverlayMode::Interactive => Self {
                click_through: false,
                accepts_focus: true,
                topmost: true,
                opacity: config.interactive_opacity,
            },
        }
    }

    /// Opacity scaled to a layered-window alpha byte.
    pub fn alpha(&self) -> u8 {
        (self.opacity.clamp(0.0, 1.0) * 255.0).round() as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_background_is_click_through() {
        let style = WindowStyle::for_mode(OverlayMode::Background, &StyleConfig::default());
        assert!(style.click_through);
        assert!(!style.accepts_focus);
        assert!(style.topmost);
        assert_eq!(style.alpha(), 153);
    }

    #[test]
    fn test_interactive_accepts_input() {
        let style = WindowStyle::for_mode(OverlayMode::Interactive, &StyleConfig::default());
        assert!(!style.click_through);
        assert!(style.accepts_focus);
        assert!(style.topmost);
        assert_eq!(style.alpha(), 255);
    }
}
