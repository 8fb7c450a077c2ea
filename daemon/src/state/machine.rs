//! Core state machine implementation
//!
//! Handles transitions between Background and Interactive, applying the
//! matching window style as a side effect and owning the idle timer.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::events::OverlayEvent;
use crate::window::{ScreenRect, StyleConfig, WindowError, WindowSlot, WindowStyle, WindowSurface};

use super::timer::{IdleDeadline, IdleTimer};

/// The two interaction modes of the overlay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlayMode {
    /// Click-through heads-up display
    #[default]
    Background,
    /// Focusable panel accepting input
    Interactive,
}

impl std::fmt::Display for OverlayMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OverlayMode::Background => write!(f, "Background"),
            OverlayMode::Interactive => write!(f, "Interactive"),
        }
    }
}

/// Why the overlay is returning to Background
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DismissReason {
    /// Explicit cancel action in the panel
    Cancel,
    /// Dismiss key (Escape) pressed while focused
    Key,
    /// Idle timer expired
    Idle,
}

/// Single authority over the overlay's interaction mode
pub struct OverlayModeController {
    mode: OverlayMode,
    window: WindowSlot,
    idle: IdleTimer,
    style: StyleConfig,
    /// Time when Interactive was entered
    entered_at: Option<Instant>,
    event_tx: broadcast::Sender<OverlayEvent>,
}

impl OverlayModeController {
    /// Create a controller over a possibly still unbound window slot.
    pub fn new(
        window: WindowSlot,
        idle_timeout: Duration,
        style: StyleConfig,
        event_tx: broadcast::Sender<OverlayEvent>,
    ) -> Self {
        Self {
            mode: OverlayMode::Background,
            window,
            idle: IdleTimer::new(idle_timeout),
            style,
            entered_at: None,
            event_tx,
        }
    }

    /// Second phase of construction: attach the native window.
    pub fn bind_window(&mut self, surface: Box<dyn WindowSurface>) {
        self.window.bind(surface);
    }

    pub fn mode(&self) -> OverlayMode {
        self.mode
    }

    pub fn is_interactive(&self) -> bool {
        self.mode == OverlayMode::Interactive
    }

    /// The pending idle expiry, present only while Interactive.
    pub fn idle_deadline(&self) -> Option<IdleDeadline> {
        self.idle.deadline()
    }

    pub fn window_rect(&self) -> Option<ScreenRect> {
        self.window.screen_rect()
    }

    pub fn relocate(&mut self, rect: ScreenRect) {
        if let Err(e) = self.window.relocate(rect) {
            warn!(?e, ?rect, "failed to relocate overlay window");
        }
    }

    /// Establish the known initial state. Never fails: the recorded mode is
    /// Background afterwards even if the OS rejected the style change.
    pub fn force_background(&mut self) {
        let prior = self.mode;
        self.idle.disarm();
        self.mode = OverlayMode::Background;
        self.entered_at = None;

        let style = WindowStyle::for_mode(OverlayMode::Background, &self.style);
        match self.window.apply_style(&style) {
            Ok(()) => info!("overlay forced into background mode"),
            Err(e) => error!(?e, "failed to apply background style"),
        }

        if prior != OverlayMode::Background {
            self.emit(OverlayEvent::ModeChanged {
                mode: OverlayMode::Background,
            });
        }
    }

    /// Background -> Interactive.
    ///
    /// Already Interactive: the window is raised again and the idle timer
    /// restarted. Returns whether the mode changed.
    pub fn activate(&mut self) -> Result<bool, WindowError> {
        let changed = if self.mode == OverlayMode::Interactive {
            debug!("activate while interactive, refreshing");
            false
        } else {
            self.transition_to(OverlayMode::Interactive)?;
            true
        };

        // Routinely refused for a window owned by another process
        if let Err(e) = self.window.bring_to_front() {
            debug!(?e, "overlay not brought to front");
        }
        if let Err(e) = self.window.focus_default_input() {
            debug!(?e, "overlay input not focused");
        }

        let deadline = self.idle.arm(Instant::now());
        debug!(generation = deadline.generation, "idle timer armed");

        Ok(changed)
    }

    /// Interactive -> Background. Returns whether the mode changed.
    pub fn dismiss(&mut self, reason: DismissReason) -> Result<bool, WindowError> {
        if self.mode == OverlayMode::Background {
            debug!(?reason, "dismiss while in background ignored");
            return Ok(false);
        }

        if let Err(e) = self.transition_to(OverlayMode::Background) {
            // Still interactive; retry on the next idle period.
            self.idle.arm(Instant::now());
            return Err(e);
        }

        self.idle.disarm();
        info!(?reason, "overlay dismissed");
        Ok(true)
    }

    /// Restart the idle countdown from now. No-op in Background.
    pub fn reset_idle_timer(&mut self) {
        if self.mode != OverlayMode::Interactive {
            return;
        }
        self.idle.arm(Instant::now());
    }

    /// Handle a delivered idle expiry. Stale expiries are ignored.
    /// Returns whether the overlay was dismissed.
    pub fn on_idle_expired(&mut self, generation: u64) -> bool {
        if self.mode != OverlayMode::Interactive || !self.idle.is_expired(generation, Instant::now()) {
            debug!(generation, "stale idle expiry ignored");
            return false;
        }
        matches!(self.dismiss(DismissReason::Idle), Ok(true))
    }

    /// Apply the target mode's style; on failure restore the prior style and
    /// leave the recorded mode untouched.
    fn transition_to(&mut self, target: OverlayMode) -> Result<(), WindowError> {
        let prior = self.mode;
        let style = WindowStyle::for_mode(target, &self.style);

        if let Err(e) = self.window.apply_style(&style) {
            error!(from = %prior, to = %target, ?e, "window style change failed, mode rolled back");
            let restore = WindowStyle::for_mode(prior, &self.style);
            if let Err(restore_err) = self.window.apply_style(&restore) {
                warn!(?restore_err, "failed to restore previous window style");
            }
            return Err(e);
        }

        let duration_ms = self
            .entered_at
            .map(|t| t.elapsed().as_millis() as u64)
            .unwrap_or(0);

        info!(
            from = %prior,
            to = %target,
            duration_ms = duration_ms,
            "mode transition"
        );

        self.mode = target;
        self.entered_at = if target == OverlayMode::Interactive {
            Some(Instant::now())
        } else {
            None
        };

        self.emit(OverlayEvent::ModeChanged { mode: target });
        Ok(())
    }

    fn emit(&self, event: OverlayEvent) {
        debug!(%event, "emitting overlay event");
        let _ = self.event_tx.send(event);
    }
}
