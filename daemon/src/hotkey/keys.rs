//! Key combinations and the logical actions bound to them
//!
//! Bindings are written as `"Ctrl+Alt+T"`: any number of modifiers followed
//! by exactly one key, separated by `+`, case-insensitive.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::registry::HotkeyError;

/// Modifier keys held as part of a combination
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Modifiers {
    /// Control key is held
    pub ctrl: bool,
    /// Alt / Option key is held
    pub alt: bool,
    /// Shift key is held
    pub shift: bool,
    /// Windows / Command key is held
    pub win: bool,
}

impl Modifiers {
    /// Check if no modifier is part of the combination
    pub fn is_empty(&self) -> bool {
        !self.ctrl && !self.alt && !self.shift && !self.win
    }
}

/// Non-modifier key of a combination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    /// A-Z, stored upper-case
    Letter(char),
    /// 0-9
    Digit(u8),
    /// F1-F12
    Function(u8),
    Escape,
    Space,
    Enter,
    Tab,
}

impl Key {
    fn parse(token: &str) -> Option<Self> {
        let upper = token.to_ascii_uppercase();
        match upper.as_str() {
            "ESC" | "ESCAPE" => return Some(Key::Escape),
            "SPACE" => return Some(Key::Space),
            "ENTER" | "RETURN" => return Some(Key::Enter),
            "TAB" => return Some(Key::Tab),
            _ => {}
        }

        let mut chars = upper.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if c.is_ascii_uppercase() => Some(Key::Letter(c)),
            (Some(c), None) if c.is_ascii_digit() => Some(Key::Digit(c as u8 - b'0')),
            (Some('F'), Some(_)) => match upper[1..].parse::<u8>() {
                Ok(n @ 1..=12) => Some(Key::Function(n)),
                _ => None,
            },
            _ => None,
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Letter(c) => write!(f, "{}", c),
            Key::Digit(d) => write!(f, "{}", d),
            Key::Function(n) => write!(f, "F{}", n),
            Key::Escape => write!(f, "Esc"),
            Key::Space => write!(f, "Space"),
            Key::Enter => write!(f, "Enter"),
            Key::Tab => write!(f, "Tab"),
        }
    }
}

/// A full key combination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyCombo {
    pub modifiers: Modifiers,
    pub key: Key,
}

impl FromStr for KeyCombo {
    type Err = HotkeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || HotkeyError::InvalidBinding(s.to_string());
        let mut modifiers = Modifiers::default();
        let mut key = None;

        for part in s.split('+').map(str::trim) {
            match part.to_ascii_lowercase().as_str() {
                "ctrl" | "control" => modifiers.ctrl = true,
                "alt" | "option" => modifiers.alt = true,
                "shift" => modifiers.shift = true,
                "win" | "cmd" | "command" | "super" => modifiers.win = true,
                _ => {
                    if key.is_some() {
                        return Err(invalid());
                    }
                    key = Some(Key::parse(part).ok_or_else(invalid)?);
                }
            }
        }

        let key = key.ok_or_else(invalid)?;
        Ok(Self { modifiers, key })
    }
}

impl fmt::Display for KeyCombo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = &self.modifiers;
        for (held, name) in [(m.ctrl, "Ctrl"), (m.alt, "Alt"), (m.shift, "Shift"), (m.win, "Win")] {
            if held {
                write!(f, "{}+", name)?;
            }
        }
        write!(f, "{}", self.key)
    }
}

/// Logical actions a hotkey can trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HotkeyAction {
    /// Bring up the panel with the quick-add box focused
    ToggleMain,
    /// Bring up the panel to add an item
    QuickAdd,
    /// Bring up the panel without editing
    QuickView,
    /// Ask the todo service to clear completed items
    ClearCompleted,
}

impl HotkeyAction {
    pub const ALL: [HotkeyAction; 4] = [
        HotkeyAction::ToggleMain,
        HotkeyAction::QuickAdd,
        HotkeyAction::QuickView,
        HotkeyAction::ClearCompleted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HotkeyAction::ToggleMain => "toggle-main",
            HotkeyAction::QuickAdd => "quick-add",
            HotkeyAction::QuickView => "quick-view",
            HotkeyAction::ClearCompleted => "clear-completed",
        }
    }

    /// Whether the action brings the overlay into Interactive mode
    pub fn activates_overlay(&self) -> bool {
        !matches!(self, HotkeyAction::ClearCompleted)
    }
}

impl fmt::Display for HotkeyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HotkeyAction {
    type Err = HotkeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HotkeyAction::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| HotkeyError::UnknownAction(s.to_string()))
    }
}

/// A logical action bound to a key combination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HotkeyBinding {
    pub action: HotkeyAction,
    pub combo: KeyCombo,
}

impl HotkeyBinding {
    pub fn new(action: HotkeyAction, combo: KeyCombo) -> Self {
        Self { action, combo }
    }

    /// Bindings used when the configuration does not override them
    pub fn defaults() -> Vec<HotkeyBinding> {
        let combo = |key| KeyCombo {
            modifiers: Modifiers {
                ctrl: true,
                alt: true,
                ..Modifiers::default()
            },
            key: Key::Letter(key),
        };
        vec![
            HotkeyBinding::new(HotkeyAction::ToggleMain, combo('T')),
            HotkeyBinding::new(HotkeyAction::QuickAdd, combo('N')),
            HotkeyBinding::new(HotkeyAction::QuickView, combo('V')),
            HotkeyBinding::new(HotkeyAction::ClearCompleted, combo('C')),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_modifiers() {
        let state = Modifiers::default();
        assert!(state.is_empty());
    }

    #[test]
    fn test_parse_combo() {
        let combo: KeyCombo = "Ctrl+Alt+T".parse().unwrap();
        assert!(combo.modifiers.ctrl);
        assert!(combo.modifiers.alt);
        assert!(!combo.modifiers.shift);
        assert_eq!(combo.key, Key::Letter('T'));
        assert_eq!(combo.to_string(), "Ctrl+Alt+T");
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        let combo: KeyCombo = "shift + win + f11".parse().unwrap();
        assert!(combo.modifiers.shift);
        assert!(combo.modifiers.win);
        assert_eq!(combo.key, Key::Function(11));
    }

    #[test]
    fn test_parse_rejects_bad_combos() {
        assert!("Ctrl+Alt".parse::<KeyCombo>().is_err());
        assert!("Ctrl+A+B".parse::<KeyCombo>().is_err());
        assert!("Ctrl+F13".parse::<KeyCombo>().is_err());
        assert!("Ctrl+PageUp".parse::<KeyCombo>().is_err());
    }

    #[test]
    fn test_action_ids_round_trip() {
        for action in HotkeyAction::ALL {
            assert_eq!(action.as_str().parse::<HotkeyAction>().unwrap(), action);
        }
        assert!("toggle".parse::<HotkeyAction>().is_err());
    }

    #[test]
    fn test_defaults_cover_every_action() {
        let defaults = HotkeyBinding::defaults();
        for action in HotkeyAction::ALL {
            assert!(defaults.iter().any(|b| b.action == action));
        }
        assert!(!HotkeyAction::ClearCompleted.activates_overlay());
    }
}
