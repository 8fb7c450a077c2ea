//! Configuration loading and management
//!
//! Defaults, overlaid by an optional `<data_dir>/config.json`, overlaid by
//! environment variables. Everything is process-lifetime; nothing is
//! written back.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::hotkey::{HotkeyAction, HotkeyBinding, KeyCombo};
use crate::hover::LayoutMetrics;
use crate::window::{ScreenRect, StyleConfig};

const APP_DIR: &str = "overlay-hud";
const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(5);
const MIN_IDLE_TIMEOUT: Duration = Duration::from_millis(500);

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory for runtime data
    pub data_dir: PathBuf,

    /// Unix socket path or Windows pipe name for IPC
    pub ipc_endpoint: PathBuf,

    /// Inactivity period after which the overlay returns to Background
    pub idle_timeout: Duration,

    pub style: StyleConfig,

    /// Global hotkeys, one per logical action
    pub hotkeys: Vec<HotkeyBinding>,

    pub layout: LayoutMetrics,

    /// Native handle of the overlay window owned by the presentation layer
    pub window_handle: Option<isize>,

    /// Initial window rectangle when no native handle is given
    pub window_rect: ScreenRect,

    pub debug: bool,
}

/// On-disk shape of `config.json`; every field optional
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    idle_timeout_ms: Option<u64>,
    style: Option<StyleConfig>,
    /// Logical id -> combination, e.g. `"quick-add": "Ctrl+Alt+N"`
    hotkeys: BTreeMap<String, String>,
    layout: Option<LayoutMetrics>,
    window_rect: Option<ScreenRect>,
    debug: bool,
}

impl Config {
    /// Load configuration from environment, config file and defaults
    pub fn load() -> Result<Self> {
        Self::from_env(|key| std::env::var(key).ok())
    }

    fn from_env<F>(env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let data_dir = resolve_data_dir(&env)?;
        let file = read_file_config(&data_dir.join("config.json"))?;
        Self::build(data_dir, file, &env)
    }

    fn build<F>(data_dir: PathBuf, file: FileConfig, env: &F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let idle_timeout = match env("OVERLAY_HUD_IDLE_TIMEOUT_MS") {
            Some(ms) => Duration::from_millis(
                ms.trim()
                    .parse()
                    .with_context(|| format!("invalid OVERLAY_HUD_IDLE_TIMEOUT_MS: {ms}"))?,
            ),
            None => file
                .idle_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_IDLE_TIMEOUT),
        };

        let window_handle = env("OVERLAY_HUD_HWND")
            .map(|raw| parse_handle(&raw))
            .transpose()?;

        let debug = file.debug
            || env("OVERLAY_HUD_DEBUG").is_some_and(|v| matches!(v.trim(), "1" | "true" | "yes"));

        let config = Self {
            ipc_endpoint: ipc_endpoint(&data_dir),
            data_dir,
            idle_timeout,
            style: file.style.unwrap_or_default(),
            hotkeys: merge_hotkeys(&file.hotkeys)?,
            layout: file.layout.unwrap_or_default(),
            window_handle,
            window_rect: file
                .window_rect
                .unwrap_or_else(|| ScreenRect::new(0, 0, 280, 600)),
            debug,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.idle_timeout < MIN_IDLE_TIMEOUT {
            bail!(
                "idle timeout must be at least {} ms, got {} ms",
                MIN_IDLE_TIMEOUT.as_millis(),
                self.idle_timeout.as_millis()
            );
        }

        for (name, opacity) in [
            ("background_opacity", self.style.background_opacity),
            ("interactive_opacity", self.style.interactive_opacity),
        ] {
            if !(opacity > 0.0 && opacity <= 1.0) {
                bail!("{name} must be in (0, 1], got {opacity}");
            }
        }

        let layout = &self.layout;
        if layout.row_height <= 0 || layout.header_height < 0 || layout.margin < 0 {
            bail!("invalid layout metrics: {layout:?}");
        }
        if layout.width <= 2 * layout.margin {
            bail!("layout width {} leaves no room inside the margins", layout.width);
        }

        if self.window_rect.width <= 0 || self.window_rect.height <= 0 {
            bail!("window rect must have a positive size");
        }

        // Only one action can own a combination
        let mut owners: HashMap<KeyCombo, HotkeyAction> = HashMap::new();
        for binding in &self.hotkeys {
            if let Some(owner) = owners.insert(binding.combo, binding.action) {
                bail!(
                    "hotkeys {owner} and {} are both bound to {}",
                    binding.action,
                    binding.combo
                );
            }
        }

        Ok(())
    }

    /// Ensure data directory exists
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)
            .with_context(|| format!("failed to create {}", self.data_dir.display()))?;
        Ok(())
    }
}

fn resolve_data_dir<F>(env: &F) -> Result<PathBuf>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(dir) = env("OVERLAY_HUD_DATA_DIR") {
        return Ok(PathBuf::from(dir));
    }

    if cfg!(windows) {
        if let Some(local) = env("LOCALAPPDATA") {
            return Ok(PathBuf::from(local).join(APP_DIR));
        }
    }

    let home = env("HOME").context("HOME is not set")?;
    Ok(PathBuf::from(home).join(".local").join("share").join(APP_DIR))
}

#[cfg(windows)]
fn ipc_endpoint(_data_dir: &Path) -> PathBuf {
    PathBuf::from(r"\\.\pipe\overlay-hud")
}

#[cfg(not(windows))]
fn ipc_endpoint(data_dir: &Path) -> PathBuf {
    data_dir.join("overlay.sock")
}

fn read_file_config(path: &Path) -> Result<FileConfig> {
    if !path.exists() {
        return Ok(FileConfig::default());
    }

    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("failed to parse {}", path.display()))
}

/// Defaults with the configured combinations substituted per action.
fn merge_hotkeys(overrides: &BTreeMap<String, String>) -> Result<Vec<HotkeyBinding>> {
    let mut bindings = HotkeyBinding::defaults();

    for (id, combo) in overrides {
        let action: HotkeyAction = id.parse().with_context(|| format!("hotkey {id:?}"))?;
        let combo: KeyCombo = combo
            .parse()
            .with_context(|| format!("hotkey {id:?}"))?;

        match bindings.iter_mut().find(|b| b.action == action) {
            Some(binding) => binding.combo = combo,
            None => bindings.push(HotkeyBinding::new(action, combo)),
        }
    }

    Ok(bindings)
}

/// Parse a native window handle given in decimal or `0x` hex.
pub fn parse_handle(raw: &str) -> Result<isize> {
    let raw = raw.trim();
    let handle = match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => isize::from_str_radix(hex, 16),
        None => raw.parse(),
    }
    .with_context(|| format!("invalid window handle: {raw}"))?;

    if handle == 0 {
        bail!("window handle must not be null");
    }
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hotkey::{Key, Modifiers};

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn build(file: &str, env: &[(&str, &str)]) -> Result<Config> {
        let file: FileConfig = serde_json::from_str(file).unwrap();
        Config::build(PathBuf::from("/tmp/overlay-hud"), file, &env_of(env))
    }

    #[test]
    fn test_defaults() {
        let config = build("{}", &[]).unwrap();
        assert_eq!(config.idle_timeout, Duration::from_secs(5));
        assert_eq!(config.style, StyleConfig::default());
        assert_eq!(config.layout, LayoutMetrics::default());
        assert_eq!(config.hotkeys, HotkeyBinding::defaults());
        assert_eq!(config.window_handle, None);
        assert_eq!(config.window_rect, ScreenRect::new(0, 0, 280, 600));
        assert!(!config.debug);
    }

    #[test]
    fn test_data_dir_resolution() {
        let dir = resolve_data_dir(&env_of(&[("HOME", "/home/u")])).unwrap();
        assert!(dir.ends_with(".local/share/overlay-hud"));

        let dir = resolve_data_dir(&env_of(&[
            ("HOME", "/home/u"),
            ("OVERLAY_HUD_DATA_DIR", "/srv/hud"),
        ]))
        .unwrap();
        assert_eq!(dir, PathBuf::from("/srv/hud"));
    }

    #[cfg(not(windows))]
    #[test]
    fn test_missing_home_is_an_error() {
        assert!(resolve_data_dir(&env_of(&[])).is_err());
    }

    #[cfg(not(windows))]
    #[test]
    fn test_socket_lives_in_data_dir() {
        let config = build("{}", &[]).unwrap();
        assert_eq!(config.ipc_endpoint, PathBuf::from("/tmp/overlay-hud/overlay.sock"));
    }

    #[test]
    fn test_environment_overrides_file() {
        let config = build(
            r#"{"idle_timeout_ms": 8000}"#,
            &[
                ("OVERLAY_HUD_IDLE_TIMEOUT_MS", "2500"),
                ("OVERLAY_HUD_HWND", "0x1A2B"),
                ("OVERLAY_HUD_DEBUG", "1"),
            ],
        )
        .unwrap();
        assert_eq!(config.idle_timeout, Duration::from_millis(2500));
        assert_eq!(config.window_handle, Some(0x1A2B));
        assert!(config.debug);
    }

    #[test]
    fn test_idle_timeout_lower_bound() {
        assert!(build(r#"{"idle_timeout_ms": 100}"#, &[]).is_err());
        assert!(build("{}", &[("OVERLAY_HUD_IDLE_TIMEOUT_MS", "499")]).is_err());
        assert!(build("{}", &[("OVERLAY_HUD_IDLE_TIMEOUT_MS", "soon")]).is_err());
        assert!(build("{}", &[("OVERLAY_HUD_IDLE_TIMEOUT_MS", "500")]).is_ok());
    }

    #[test]
    fn test_opacity_validation() {
        assert!(build(r#"{"style": {"background_opacity": 0.0}}"#, &[]).is_err());
        assert!(build(r#"{"style": {"interactive_opacity": 1.5}}"#, &[]).is_err());

        let config = build(r#"{"style": {"background_opacity": 0.4}}"#, &[]).unwrap();
        assert_eq!(config.style.background_opacity, 0.4);
        assert_eq!(config.style.interactive_opacity, 1.0);
    }

    #[test]
    fn test_hotkey_override() {
        let config = build(r#"{"hotkeys": {"quick-add": "Ctrl+Shift+Space"}}"#, &[]).unwrap();
        let quick_add = config
            .hotkeys
            .iter()
            .find(|b| b.action == HotkeyAction::QuickAdd)
            .unwrap();
        assert_eq!(quick_add.combo.key, Key::Space);
        assert_eq!(
            quick_add.combo.modifiers,
            Modifiers {
                ctrl: true,
                shift: true,
                ..Modifiers::default()
            }
        );
        assert_eq!(config.hotkeys.len(), 4);
    }

    #[test]
    fn test_bad_hotkeys_are_rejected() {
        assert!(build(r#"{"hotkeys": {"launch-rockets": "Ctrl+R"}}"#, &[]).is_err());
        assert!(build(r#"{"hotkeys": {"quick-view": "Ctrl+Banana"}}"#, &[]).is_err());
    }

    #[test]
    fn test_shared_combination_is_rejected() {
        let err = build(r#"{"hotkeys": {"quick-add": "Alt+Ctrl+T"}}"#, &[]).unwrap_err();
        assert!(err.to_string().contains("toggle-main"));

        // Swapping two combinations leaves each one with a single owner
        let config = build(
            r#"{"hotkeys": {"toggle-main": "Ctrl+Alt+N", "quick-add": "Ctrl+Alt+T"}}"#,
            &[],
        )
        .unwrap();
        assert_eq!(config.hotkeys.len(), 4);
    }

    #[test]
    fn test_unknown_file_fields_are_rejected() {
        let parsed: std::result::Result<FileConfig, _> = serde_json::from_str(r#"{"idle": 5}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_layout_validation() {
        assert!(build(r#"{"layout": {"row_height": 0}}"#, &[]).is_err());
        assert!(build(r#"{"layout": {"width": 20}}"#, &[]).is_err());

        let config = build(r#"{"layout": {"row_height": 48}}"#, &[]).unwrap();
        assert_eq!(config.layout.row_height, 48);
        assert_eq!(config.layout.header_height, 60);
    }

    #[test]
    fn test_parse_handle() {
        assert_eq!(parse_handle("1234").unwrap(), 1234);
        assert_eq!(parse_handle(" 0xFF ").unwrap(), 255);
        assert_eq!(parse_handle("0X10").unwrap(), 16);
        assert!(parse_handle("0").is_err());
        assert!(parse_handle("window").is_err());
    }
}
