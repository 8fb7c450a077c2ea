//! Global hotkey registration
//!
//! The registry owns the set of bindings for the process lifetime. The OS
//! side lives behind [`HotkeyBackend`]; notifications come back through a
//! [`HotkeySink`] that resolves the raw registration id to its logical
//! action and marshals only the action to the dispatcher.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::keys::{HotkeyAction, HotkeyBinding};
use crate::dispatch::Stamped;

/// Errors that can occur while registering hotkeys
#[derive(Debug, Clone, thiserror::Error)]
pub enum HotkeyError {
    #[error("key combination {combo} is already owned by another application")]
    Conflict { combo: String },

    #[error("invalid key combination: {0}")]
    InvalidBinding(String),

    #[error("unknown hotkey action: {0}")]
    UnknownAction(String),

    #[error("global hotkeys are not supported on this platform")]
    Unsupported,

    #[error("hotkey registration failed: {0}")]
    Os(String),

    #[error("failed to spawn hotkey thread: {0}")]
    ThreadSpawn(String),
}

/// Thread-safe hand-off used by backends to report a fired hotkey
#[derive(Clone)]
pub struct HotkeySink {
    actions: Arc<HashMap<u32, HotkeyAction>>,
    tx: mpsc::Sender<Stamped<HotkeyAction>>,
    open: Arc<AtomicBool>,
}

impl HotkeySink {
    /// Report the registration id the OS notified. Returns whether an
    /// action was delivered; never blocks.
    pub fn notify(&self, id: u32) -> bool {
        if !self.open.load(Ordering::Acquire) {
            return false;
        }

        let Some(&action) = self.actions.get(&id) else {
            debug!(id, "notification for unknown hotkey id");
            return false;
        };

        match self.tx.try_send(Stamped::new(action)) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(%action, "hotkey queue full, dropping");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(%action, "dispatcher gone, dropping hotkey");
                false
            }
        }
    }
}

/// OS registration mechanism
pub trait HotkeyBackend: Send {
    /// Register every binding under its id. Returns one outcome per binding,
    /// in the same order; a failed binding must not affect the others.
    fn install(
        &mut self,
        bindings: &[(u32, HotkeyBinding)],
        sink: HotkeySink,
    ) -> Vec<Result<(), HotkeyError>>;

    /// Unregister everything. Must not return while a notification is
    /// still being delivered.
    fn uninstall(&mut self);
}

/// Owns the global hotkey bindings of the process
pub struct HotkeyRegistry {
    backend: Box<dyn HotkeyBackend>,
    tx: mpsc::Sender<Stamped<HotkeyAction>>,
    open: Arc<AtomicBool>,
    registered: Vec<(u32, HotkeyBinding)>,
    installed: bool,
}

impl HotkeyRegistry {
    pub fn new(
        backend: Box<dyn HotkeyBackend>,
        tx: mpsc::Sender<Stamped<HotkeyAction>>,
    ) -> Self {
        Self {
            backend,
            tx,
            open: Arc::new(AtomicBool::new(false)),
            registered: Vec::new(),
            installed: false,
        }
    }

    /// Register all bindings, skipping any the OS refuses.
    /// Returns the number of bindings that are active.
    pub fn register_all(&mut self, bindings: &[HotkeyBinding]) -> usize {
        if self.installed {
            warn!("hotkeys already registered, ignoring");
            return self.registered.len();
        }

        let numbered: Vec<(u32, HotkeyBinding)> = bindings
            .iter()
            .enumerate()
            .map(|(i, binding)| (i as u32 + 1, *binding))
            .collect();

        let sink = HotkeySink {
            actions: Arc::new(numbered.iter().map(|(id, b)| (*id, b.action)).collect()),
            tx: self.tx.clone(),
            open: Arc::clone(&self.open),
        };

        self.open.store(true, Ordering::Release);
        let results = self.backend.install(&numbered, sink);
        self.installed = true;

        for ((id, binding), result) in numbered.into_iter().zip(results) {
            match result {
                Ok(()) => {
                    info!(action = %binding.action, combo = %binding.combo, id, "registered hotkey");
                    self.registered.push((id, binding));
                }
                Err(e) => {
                    warn!(action = %binding.action, combo = %binding.combo, error = %e, "hotkey unavailable, skipping");
                }
            }
        }

        self.registered.len()
    }

    /// Actions whose bindings were accepted by the OS
    pub fn registered_actions(&self) -> Vec<HotkeyAction> {
        self.registered.iter().map(|(_, b)| b.action).collect()
    }

    /// Unregister everything. Safe to call repeatedly; no notification is
    /// delivered once this returns.
    pub fn dispose(&mut self) {
        if !self.installed {
            return;
        }

        self.open.store(false, Ordering::Release);
        self.backend.uninstall();

        info!(count = self.registered.len(), "hotkeys unregistered");
        self.registered.clear();
        self.installed = false;
    }
}

impl Drop for HotkeyRegistry {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    use super::*;
    use crate::hotkey::KeyCombo;

    /// Backend that treats some combinations as owned by another process.
    #[derive(Clone, Default)]
    struct FakeBackend {
        taken: Vec<KeyCombo>,
        sink: Arc<Mutex<Option<HotkeySink>>>,
        uninstalls: Arc<AtomicUsize>,
    }

    impl HotkeyBackend for FakeBackend {
        fn install(
            &mut self,
            bindings: &[(u32, HotkeyBinding)],
            sink: HotkeySink,
        ) -> Vec<Result<(), HotkeyError>> {
            *self.sink.lock().unwrap() = Some(sink);
            bindings
                .iter()
                .map(|(_, b)| {
                    if self.taken.contains(&b.combo) {
                        Err(HotkeyError::Conflict {
                            combo: b.combo.to_string(),
                        })
                    } else {
                        Ok(())
                    }
                })
                .collect()
        }

        fn uninstall(&mut self) {
            self.uninstalls.fetch_add(1, Ordering::SeqCst);
            self.sink.lock().unwrap().take();
        }
    }

    fn binding(action: HotkeyAction, combo: &str) -> HotkeyBinding {
        HotkeyBinding::new(action, combo.parse().unwrap())
    }

    #[test]
    fn test_conflict_skips_only_that_binding() {
        let backend = FakeBackend {
            taken: vec!["Ctrl+Alt+T".parse().unwrap()],
            ..FakeBackend::default()
        };
        let (tx, _rx) = mpsc::channel(8);
        let mut registry = HotkeyRegistry::new(Box::new(backend), tx);

        let count = registry.register_all(&[
            binding(HotkeyAction::ToggleMain, "Ctrl+Alt+T"),
            binding(HotkeyAction::QuickAdd, "Ctrl+Alt+N"),
        ]);

        assert_eq!(count, 1);
        assert_eq!(registry.registered_actions(), vec![HotkeyAction::QuickAdd]);
    }

    #[test]
    fn test_notification_resolves_logical_action() {
        let backend = FakeBackend::default();
        let sink = Arc::clone(&backend.sink);
        let (tx, mut rx) = mpsc::channel(8);
        let mut registry = HotkeyRegistry::new(Box::new(backend), tx);
        registry.register_all(&HotkeyBinding::defaults());

        let sink = sink.lock().unwrap().clone().unwrap();
        assert!(sink.notify(2));
        assert!(!sink.notify(99));
        assert_eq!(rx.try_recv().unwrap().value, HotkeyAction::QuickAdd);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_dispose_twice_is_noop() {
        let backend = FakeBackend::default();
        let uninstalls = Arc::clone(&backend.uninstalls);
        let (tx, _rx) = mpsc::channel(8);
        let mut registry = HotkeyRegistry::new(Box::new(backend), tx);
        registry.register_all(&HotkeyBinding::defaults());

        registry.dispose();
        registry.dispose();
        drop(registry);
        assert_eq!(uninstalls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_dispose_without_registration() {
        let backend = FakeBackend::default();
        let uninstalls = Arc::clone(&backend.uninstalls);
        let (tx, _rx) = mpsc::channel(8);
        let mut registry = HotkeyRegistry::new(Box::new(backend), tx);
        registry.dispose();
        assert_eq!(uninstalls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_no_delivery_after_dispose() {
        let backend = FakeBackend::default();
        let sink = Arc::clone(&backend.sink);
        let (tx, mut rx) = mpsc::channel(8);
        let mut registry = HotkeyRegistry::new(Box::new(backend), tx);
        registry.register_all(&HotkeyBinding::defaults());

        // A callback that captured the sink before shutdown.
        let late = sink.lock().unwrap().clone().unwrap();
        registry.dispose();

        assert!(!late.notify(1));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_closed_dispatcher_is_silent() {
        let backend = FakeBackend::default();
        let sink = Arc::clone(&backend.sink);
        let (tx, rx) = mpsc::channel(8);
        let mut registry = HotkeyRegistry::new(Box::new(backend), tx);
        registry.register_all(&HotkeyBinding::defaults());
        drop(rx);

        let sink = sink.lock().unwrap().clone().unwrap();
        assert!(!sink.notify(1));
    }
}
