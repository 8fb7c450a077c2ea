//! UI-affinity event loop
//!
//! Every hotkey notification, pointer position, collaborator command and
//! idle expiry reaches the controller and the hover coordinator through
//! this loop, one at a time, in arrival order across all sources.

mod arrival;

pub use arrival::Stamped;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::sleep_until;
use tracing::{debug, info, warn};

use crate::events::OverlayEvent;
use crate::hotkey::HotkeyAction;
use crate::hover::{HoverCoordinator, ItemId, ListSnapshot};
use crate::pointer::PointerEvent;
use crate::state::{DismissReason, IdleDeadline, OverlayMode, OverlayModeController};
use crate::window::ScreenRect;

const COMMAND_QUEUE: usize = 64;
const HOTKEY_QUEUE: usize = 32;
const POINTER_QUEUE: usize = 256;

/// Requests from the presentation layer, tray and other collaborators
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UiCommand {
    /// Tray "show" or equivalent
    Show,
    /// Explicit cancel action in the panel
    Cancel,
    /// Escape pressed while the panel has focus
    DismissKey,
    /// Keyboard or pointer input inside the focused panel
    UserInput,
    /// The overlay window was moved or resized
    WindowMoved(ScreenRect),
}

/// One marshaled item, consumed by [`Dispatcher::handle`]
#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    HotkeyFired(HotkeyAction),
    PointerMoved(PointerEvent),
    TimerExpired { generation: u64 },
    Command(UiCommand),
}

/// Producer ends of the per-source queues
#[derive(Clone)]
pub struct UiSenders {
    pub commands: mpsc::Sender<Stamped<UiCommand>>,
    pub hotkeys: mpsc::Sender<Stamped<HotkeyAction>>,
    pub pointer: mpsc::Sender<Stamped<PointerEvent>>,
}

/// Consumer ends, drained only by the dispatcher
pub struct UiQueues {
    pub commands: mpsc::Receiver<Stamped<UiCommand>>,
    pub hotkeys: mpsc::Receiver<Stamped<HotkeyAction>>,
    pub pointer: mpsc::Receiver<Stamped<PointerEvent>>,
}

/// Create the bounded hand-off queues.
pub fn queues() -> (UiSenders, UiQueues) {
    let (commands_tx, commands_rx) = mpsc::channel(COMMAND_QUEUE);
    let (hotkeys_tx, hotkeys_rx) = mpsc::channel(HOTKEY_QUEUE);
    let (pointer_tx, pointer_rx) = mpsc::channel(POINTER_QUEUE);

    (
        UiSenders {
            commands: commands_tx,
            hotkeys: hotkeys_tx,
            pointer: pointer_tx,
        },
        UiQueues {
            commands: commands_rx,
            hotkeys: hotkeys_rx,
            pointer: pointer_rx,
        },
    )
}

pub struct Dispatcher {
    controller: OverlayModeController,
    hover: HoverCoordinator,
    snapshot: watch::Receiver<ListSnapshot>,
    event_tx: broadcast::Sender<OverlayEvent>,
}

impl Dispatcher {
    pub fn new(
        controller: OverlayModeController,
        hover: HoverCoordinator,
        snapshot: watch::Receiver<ListSnapshot>,
        event_tx: broadcast::Sender<OverlayEvent>,
    ) -> Self {
        let mut dispatcher = Self {
            controller,
            hover,
            snapshot,
            event_tx,
        };
        dispatcher.sync_hover();
        dispatcher
    }

    pub fn mode(&self) -> OverlayMode {
        self.controller.mode()
    }

    pub fn hovered(&self) -> Option<&ItemId> {
        self.hover.current()
    }

    pub fn controller(&self) -> &OverlayModeController {
        &self.controller
    }

    /// Drain the queues until every producer is gone.
    ///
    /// One item per queue is held as that queue's head; the head with the
    /// lowest arrival stamp is handled next. The idle deadline only fires
    /// when no input is waiting, so input that was already queued when the
    /// deadline passed is handled first and can still re-arm the timer.
    pub async fn run(&mut self, queues: &mut UiQueues) {
        info!("dispatcher started");
        let mut heads = Heads::default();

        loop {
            heads.refill(queues);
            if let Some(event) = heads.pop_oldest() {
                self.handle(event);
                continue;
            }

            let deadline = self.controller.idle_deadline();

            tokio::select! {
                biased;
                Some(command) = queues.commands.recv() => heads.command = Some(command),
                Some(action) = queues.hotkeys.recv() => heads.hotkey = Some(action),
                Some(pointer) = queues.pointer.recv() => heads.pointer = Some(pointer),
                generation = idle_expiry(deadline), if deadline.is_some() => {
                    self.handle(UiEvent::TimerExpired { generation });
                }
                else => break,
            }
        }

        info!("dispatcher stopped");
    }

    /// The central switch. Never blocks.
    pub fn handle(&mut self, event: UiEvent) {
        match event {
            UiEvent::HotkeyFired(action) => self.on_hotkey(action),
            UiEvent::PointerMoved(pointer) => self.on_pointer(&pointer),
            UiEvent::TimerExpired { generation } => {
                if self.controller.on_idle_expired(generation) {
                    info!("overlay dismissed after idle timeout");
                }
            }
            UiEvent::Command(command) => self.on_command(command),
        }

        self.sync_hover();
    }

    fn on_hotkey(&mut self, action: HotkeyAction) {
        info!(%action, "hotkey triggered");
        let _ = self.event_tx.send(OverlayEvent::HotkeyTriggered { id: action });

        if action.activates_overlay() {
            if let Err(e) = self.controller.activate() {
                warn!(%action, ?e, "hotkey could not activate overlay");
            }
        }
    }

    fn on_pointer(&mut self, pointer: &PointerEvent) {
        let rect = self.controller.window_rect();

        if self.controller.is_interactive() {
            if rect.is_some_and(|r| r.contains(pointer.x, pointer.y)) {
                self.controller.reset_idle_timer();
            }
            return;
        }

        let snapshot = self.snapshot.borrow();
        self.hover.on_pointer(pointer, rect, &snapshot);
    }

    fn on_command(&mut self, command: UiCommand) {
        debug!(?command, "command received");

        let result = match command {
            UiCommand::Show => self.controller.activate().map(|_| ()),
            UiCommand::Cancel => self.controller.dismiss(DismissReason::Cancel).map(|_| ()),
            UiCommand::DismissKey => self.controller.dismiss(DismissReason::Key).map(|_| ()),
            UiCommand::UserInput => {
                self.controller.reset_idle_timer();
                Ok(())
            }
            UiCommand::WindowMoved(rect) => {
                self.controller.relocate(rect);
                Ok(())
            }
        };

        if let Err(e) = result {
            warn!(?command, ?e, "command failed");
        }
    }

    /// Hover tracking only runs while the overlay is click-through.
    fn sync_hover(&mut self) {
        match self.controller.mode() {
            OverlayMode::Interactive => self.hover.disable(),
            OverlayMode::Background => self.hover.enable(),
        }
    }
}

/// The next unhandled item of each queue
#[derive(Default)]
struct Heads {
    command: Option<Stamped<UiCommand>>,
    hotkey: Option<Stamped<HotkeyAction>>,
    pointer: Option<Stamped<PointerEvent>>,
}

impl Heads {
    /// Pull from every queue whose head slot is empty, without waiting.
    fn refill(&mut self, queues: &mut UiQueues) {
        if self.command.is_none() {
            self.command = queues.commands.try_recv().ok();
        }
        if self.hotkey.is_none() {
            self.hotkey = queues.hotkeys.try_recv().ok();
        }
        if self.pointer.is_none() {
            self.pointer = queues.pointer.try_recv().ok();
        }
    }

    fn pop_oldest(&mut self) -> Option<UiEvent> {
        let command = self.command.as_ref().map(|c| c.seq);
        let hotkey = self.hotkey.as_ref().map(|h| h.seq);
        let pointer = self.pointer.as_ref().map(|p| p.seq);
        let oldest = [command, hotkey, pointer].into_iter().flatten().min()?;

        if command == Some(oldest) {
            self.command.take().map(|c| UiEvent::Command(c.value))
        } else if hotkey == Some(oldest) {
            self.hotkey.take().map(|h| UiEvent::HotkeyFired(h.value))
        } else {
            self.pointer.take().map(|p| UiEvent::PointerMoved(p.value))
        }
    }
}

async fn idle_expiry(deadline: Option<IdleDeadline>) -> u64 {
    match deadline {
        Some(deadline) => {
            sleep_until(deadline.due_at).await;
            deadline.generation
        }
        None => std::future::pending().await,
    }
}
