//! Process-wide pointer hook lifecycle
//!
//! The backend owns the OS listener and its worker thread. The hook owns the
//! gate every delivery passes through: closing the gate and then
//! uninstalling (which joins the worker) guarantees nothing is delivered
//! after [`PointerHook::stop`] returns.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{info, trace, warn};

use super::event::PointerEvent;
use crate::dispatch::Stamped;

/// Errors that can occur installing the pointer hook
#[derive(Debug, thiserror::Error)]
pub enum HookError {
    #[error("pointer hooks are not supported on this platform")]
    Unsupported,

    #[error("failed to install pointer hook: {0}")]
    Install(String),

    #[error("failed to spawn hook thread: {0}")]
    ThreadSpawn(String),

    #[error("hook thread did not signal readiness")]
    NotReady,
}

/// Hand-off from the hook thread to the dispatcher
///
/// Called from inside the OS callback, so it must never block: a full queue
/// drops the newest position.
#[derive(Clone)]
pub struct PointerSink {
    tx: mpsc::Sender<Stamped<PointerEvent>>,
    open: Arc<AtomicBool>,
    dropped: Arc<AtomicU64>,
}

impl PointerSink {
    pub fn deliver(&self, x: i32, y: i32) -> bool {
        if !self.open.load(Ordering::Acquire) {
            return false;
        }

        match self.tx.try_send(Stamped::new(PointerEvent::new(x, y))) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                trace!("pointer queue full, dropping position");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }
}

/// OS pointer listener
pub trait PointerBackend: Send {
    /// Install the listener and start its worker thread. Returns once the
    /// listener is live or has definitely failed.
    fn install(&mut self, sink: PointerSink) -> Result<(), HookError>;

    /// Remove the listener and join the worker thread.
    fn uninstall(&mut self);
}

/// Global pointer-movement monitor
pub struct PointerHook {
    backend: Box<dyn PointerBackend>,
    tx: mpsc::Sender<Stamped<PointerEvent>>,
    open: Arc<AtomicBool>,
    dropped: Arc<AtomicU64>,
    monitoring: bool,
}

impl PointerHook {
    pub fn new(
        backend: Box<dyn PointerBackend>,
        tx: mpsc::Sender<Stamped<PointerEvent>>,
    ) -> Self {
        Self {
            backend,
            tx,
            open: Arc::new(AtomicBool::new(false)),
            dropped: Arc::new(AtomicU64::new(0)),
            monitoring: false,
        }
    }

    /// Start observing pointer motion. Idempotent. Returns `false` when the
    /// hook cannot be installed; callers degrade to no hover detection.
    pub fn start_monitoring(&mut self) -> bool {
        if self.monitoring {
            return true;
        }

        let sink = PointerSink {
            tx: self.tx.clone(),
            open: Arc::clone(&self.open),
            dropped: Arc::clone(&self.dropped),
        };

        self.open.store(true, Ordering::Release);
        match self.backend.install(sink) {
            Ok(()) => {
                info!("pointer hook installed");
                self.monitoring = true;
                true
            }
            Err(e) => {
                self.open.store(false, Ordering::Release);
                warn!(error = %e, "pointer hook unavailable, hover detection disabled");
                false
            }
        }
    }

    pub fn is_monitoring(&self) -> bool {
        self.monitoring
    }

    /// Positions dropped because the dispatcher queue was full
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Uninstall the hook and join its thread. Safe to call repeatedly.
    pub fn stop(&mut self) {
        if !self.monitoring {
            return;
        }

        self.open.store(false, Ordering::Release);
        self.backend.uninstall();
        self.monitoring = false;

        info!(dropped = self.dropped(), "pointer hook removed");
    }
}

impl Drop for PointerHook {
    fn drop(&mut self) {
        self.stop();
    }
}
