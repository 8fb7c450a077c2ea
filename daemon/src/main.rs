//! overlay-hud-daemon: interaction core for a heads-up todo overlay
//!
//! This daemon runs next to the presentation layer and provides:
//! - Global hotkeys (toggle-main, quick-add, quick-view, clear-completed)
//! - Background/Interactive mode switching with an idle timeout
//! - Hover detection over the click-through overlay via a pointer hook
//! - IPC server for the presentation layer, tray and todo service
//!
//! The runtime is single-threaded; its thread owns the mode controller and
//! the hover coordinator. OS callbacks run on their own threads and only
//! enqueue.

use anyhow::{Context, Result};
use tokio::sync::{broadcast, watch};
use tracing::{error, info, warn};

use overlay_hud::config::Config;
use overlay_hud::dispatch::{self, Dispatcher};
use overlay_hud::events::OverlayEvent;
use overlay_hud::hotkey::HotkeyRegistry;
use overlay_hud::hover::{HitTester, HoverCoordinator, ListSnapshot};
use overlay_hud::ipc::{Server, ServerContext};
use overlay_hud::lifecycle::ShutdownSignal;
use overlay_hud::pointer::PointerHook;
use overlay_hud::state::OverlayModeController;
use overlay_hud::window::{DetachedSurface, WindowSlot, WindowSurface};
use overlay_hud::{logging, platform};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Configuration first: it decides the log level
    let config = Config::load().context("failed to load configuration")?;
    logging::init(config.debug);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "overlay-hud-daemon starting"
    );
    info!(
        data_dir = ?config.data_dir,
        idle_timeout_ms = config.idle_timeout.as_millis() as u64,
        "configuration loaded"
    );
    config.ensure_dirs()?;

    let mut shutdown = ShutdownSignal::new()?;

    // Per-source hand-off queues into the dispatcher
    let (senders, mut queues) = dispatch::queues();
    // Controller, hover, hotkeys -> IPC subscribers
    let (event_tx, _event_rx) = broadcast::channel::<OverlayEvent>(256);
    // Todo service -> hit-testing
    let (snapshot_tx, snapshot_rx) = watch::channel(ListSnapshot::default());

    // Build the controller against an empty slot, then bind the surface
    let mut controller = OverlayModeController::new(
        WindowSlot::unbound(),
        config.idle_timeout,
        config.style,
        event_tx.clone(),
    );
    let surface = platform::native_surface(config.window_handle).unwrap_or_else(|| {
        info!(rect = ?config.window_rect, "no native window, using detached surface");
        Box::new(DetachedSurface::new(config.window_rect)) as Box<dyn WindowSurface>
    });
    controller.bind_window(surface);
    controller.force_background();

    let mut hotkeys = HotkeyRegistry::new(platform::hotkey_backend(), senders.hotkeys.clone());
    let registered = hotkeys.register_all(&config.hotkeys);
    if registered < config.hotkeys.len() {
        warn!(
            registered,
            configured = config.hotkeys.len(),
            "some hotkeys are unavailable"
        );
    }

    let mut pointer_hook = PointerHook::new(platform::pointer_backend(), senders.pointer.clone());
    let monitoring = pointer_hook.start_monitoring();

    let server = Server::new(
        &config.ipc_endpoint,
        ServerContext {
            commands: senders.commands.clone(),
            snapshot: snapshot_tx,
            events: event_tx.clone(),
            layout: config.layout,
        },
    )?;
    server
        .set_registration(hotkeys.registered_actions(), monitoring)
        .await;

    let hover = HoverCoordinator::new(HitTester::new(config.layout), event_tx.clone());
    let mut dispatcher = Dispatcher::new(controller, hover, snapshot_rx, event_tx);
    drop(senders);

    info!("daemon initialized, entering main loop");

    tokio::select! {
        _ = dispatcher.run(&mut queues) => {
            info!("dispatcher exited");
        }

        result = server.run() => {
            if let Err(e) = result {
                error!(?e, "IPC server error");
            }
        }

        _ = shutdown.wait() => {
            info!("shutdown signal received");
        }
    }

    // Cleanup
    info!("shutting down...");

    hotkeys.dispose();
    pointer_hook.stop();
    server.shutdown().await;

    info!(mode = %dispatcher.mode(), "overlay-hud-daemon stopped");

    Ok(())
}
