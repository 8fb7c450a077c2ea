//! macOS backends using CGEventTap
//!
//! Each tap runs on a dedicated thread with its own CFRunLoop. The loop is
//! run in short slices so the thread notices `running` being cleared, and
//! callbacks only execute inside those slices, so joining the thread is a
//! delivery barrier. Requires the Accessibility permission.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::sync_channel;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use core_foundation::runloop::{kCFRunLoopCommonModes, kCFRunLoopDefaultMode, CFRunLoop};
use core_graphics::event::{
    CGEvent, CGEventFlags, CGEventTap, CGEventTapLocation, CGEventTapOptions, CGEventTapPlacement,
    CGEventTapProxy, CGEventType, EventField,
};
use tracing::{error, info, warn};

use crate::hotkey::{HotkeyBackend, HotkeyBinding, HotkeyError, HotkeySink, Key, Modifiers};
use crate::pointer::{HookError, PointerBackend, PointerSink};
use crate::window::WindowSurface;

const READY_TIMEOUT: Duration = Duration::from_secs(2);
const RUN_SLICE: Duration = Duration::from_millis(100);

struct TapThread {
    running: Arc<AtomicBool>,
    join: JoinHandle<()>,
}

impl TapThread {
    fn stop(self) {
        self.running.store(false, Ordering::SeqCst);
        let _ = self.join.join();
    }
}

/// Spawn a listen-only session tap for `events`, calling `handler` on the
/// tap thread for each one.
fn spawn_tap<F>(name: &str, events: Vec<CGEventType>, handler: F) -> Result<TapThread, String>
where
    F: Fn(CGEventType, &CGEvent) + Send + 'static,
{
    let running = Arc::new(AtomicBool::new(true));
    let thread_running = Arc::clone(&running);
    let (ready_tx, ready_rx) = sync_channel::<Result<(), String>>(1);
    let tap_name = name.to_string();

    let join = thread::Builder::new()
        .name(name.to_string())
        .spawn(move || {
            // CGEventTap callback - must be fast and non-blocking
            let callback = move |_proxy: CGEventTapProxy,
                                 event_type: CGEventType,
                                 event: &CGEvent|
                  -> Option<CGEvent> {
                match event_type {
                    CGEventType::TapDisabledByTimeout | CGEventType::TapDisabledByUserInput => {
                        warn!("event tap disabled by the system");
                    }
                    _ => handler(event_type, event),
                }
                Some(event.clone())
            };

            let tap = match CGEventTap::new(
                CGEventTapLocation::Session,
                CGEventTapPlacement::HeadInsertEventTap,
                CGEventTapOptions::ListenOnly,
                events,
                callback,
            ) {
                Ok(tap) => tap,
                Err(()) => {
                    let _ = ready_tx.send(Err(
                        "failed to create event tap - is Accessibility permission granted?".to_string(),
                    ));
                    return;
                }
            };

            let source = match tap.mach_port.create_runloop_source(0) {
                Ok(source) => source,
                Err(()) => {
                    let _ = ready_tx.send(Err("failed to create run loop source".to_string()));
                    return;
                }
            };

            let run_loop = CFRunLoop::get_current();
            unsafe {
                run_loop.add_source(&source, kCFRunLoopCommonModes);
            }
            tap.enable();

            let _ = ready_tx.send(Ok(()));
            info!(tap = %tap_name, "event tap created and enabled");

            while thread_running.load(Ordering::SeqCst) {
                unsafe {
                    CFRunLoop::run_in_mode(kCFRunLoopDefaultMode, RUN_SLICE, true);
                }
            }

            info!(tap = %tap_name, "event tap thread stopped");
        })
        .map_err(|e| e.to_string())?;

    match ready_rx.recv_timeout(READY_TIMEOUT) {
        Ok(Ok(())) => Ok(TapThread { running, join }),
        Ok(Err(e)) => {
            let _ = join.join();
            Err(e)
        }
        Err(_) => {
            running.store(false, Ordering::SeqCst);
            Err("event tap thread did not signal readiness".to_string())
        }
    }
}

fn modifiers_from_flags(flags: CGEventFlags) -> Modifiers {
    Modifiers {
        ctrl: flags.contains(CGEventFlags::CGEventFlagControl),
        alt: flags.contains(CGEventFlags::CGEventFlagAlternate),
        shift: flags.contains(CGEventFlags::CGEventFlagShift),
        win: flags.contains(CGEventFlags::CGEventFlagCommand),
    }
}

/// ANSI virtual key codes (Carbon `kVK_*`)
fn mac_keycode(key: Key) -> Option<u16> {
    const LETTERS: [u16; 26] = [
        0x00, 0x0B, 0x08, 0x02, 0x0E, 0x03, 0x05, 0x04, 0x22, 0x26, 0x28, 0x25, 0x2E, // A-M
        0x2D, 0x1F, 0x23, 0x0C, 0x0F, 0x01, 0x11, 0x20, 0x09, 0x0D, 0x07, 0x10, 0x06, // N-Z
    ];
    const DIGITS: [u16; 10] = [0x1D, 0x12, 0x13, 0x14, 0x15, 0x17, 0x16, 0x1A, 0x1C, 0x19];
    const FUNCTIONS: [u16; 12] = [
        0x7A, 0x78, 0x63, 0x76, 0x60, 0x61, 0x62, 0x64, 0x65, 0x6D, 0x67, 0x6F,
    ];

    match key {
        Key::Letter(c) if c.is_ascii_uppercase() => Some(LETTERS[(c as u8 - b'A') as usize]),
        Key::Letter(_) => None,
        Key::Digit(d) => DIGITS.get(d as usize).copied(),
        Key::Function(n) => FUNCTIONS.get((n as usize).wrapping_sub(1)).copied(),
        Key::Escape => Some(0x35),
        Key::Space => Some(0x31),
        Key::Enter => Some(0x24),
        Key::Tab => Some(0x30),
    }
}

/// Key-down tap matching the configured combinations
///
/// A listen-only tap cannot tell whether another application also uses a
/// combination, so conflicts are never reported on macOS.
#[derive(Default)]
pub struct HotkeyThread {
    tap: Option<TapThread>,
}

impl HotkeyBackend for HotkeyThread {
    fn install(
        &mut self,
        bindings: &[(u32, HotkeyBinding)],
        sink: HotkeySink,
    ) -> Vec<Result<(), HotkeyError>> {
        if self.tap.is_some() {
            return bindings
                .iter()
                .map(|_| Err(HotkeyError::Os("hotkey tap already running".to_string())))
                .collect();
        }

        let mut table: Vec<(u32, u16, Modifiers)> = Vec::new();
        let mut results: Vec<Result<(), HotkeyError>> = bindings
            .iter()
            .map(|(id, binding)| match mac_keycode(binding.combo.key) {
                Some(code) => {
                    table.push((*id, code, binding.combo.modifiers));
                    Ok(())
                }
                None => Err(HotkeyError::InvalidBinding(binding.combo.to_string())),
            })
            .collect();

        if table.is_empty() {
            return results;
        }

        let handler = move |_event_type: CGEventType, event: &CGEvent| {
            if event.get_integer_value_field(EventField::KEYBOARD_EVENT_AUTOREPEAT) != 0 {
                return;
            }
            let code = event.get_integer_value_field(EventField::KEYBOARD_EVENT_KEYCODE) as u16;
            let modifiers = modifiers_from_flags(event.get_flags());
            if let Some((id, ..)) = table.iter().find(|(_, c, m)| *c == code && *m == modifiers) {
                sink.notify(*id);
            }
        };

        match spawn_tap("hotkey-listener", vec![CGEventType::KeyDown], handler) {
            Ok(tap) => self.tap = Some(tap),
            Err(e) => {
                error!(error = %e, "hotkey tap unavailable");
                for result in results.iter_mut().filter(|r| r.is_ok()) {
                    *result = Err(HotkeyError::Os(e.clone()));
                }
            }
        }

        results
    }

    fn uninstall(&mut self) {
        if let Some(tap) = self.tap.take() {
            tap.stop();
        }
    }
}

/// Pointer-moved tap
#[derive(Default)]
pub struct PointerThread {
    tap: Option<TapThread>,
}

impl PointerBackend for PointerThread {
    fn install(&mut self, sink: PointerSink) -> Result<(), HookError> {
        if self.tap.is_some() {
            return Ok(());
        }

        let handler = move |_event_type: CGEventType, event: &CGEvent| {
            let location = event.location();
            sink.deliver(location.x.round() as i32, location.y.round() as i32);
        };

        let tap = spawn_tap(
            "pointer-hook",
            vec![
                CGEventType::MouseMoved,
                CGEventType::LeftMouseDragged,
                CGEventType::RightMouseDragged,
            ],
            handler,
        )
        .map_err(HookError::Install)?;

        self.tap = Some(tap);
        Ok(())
    }

    fn uninstall(&mut self) {
        if let Some(tap) = self.tap.take() {
            tap.stop();
        }
    }
}

pub fn native_surface(_handle: isize) -> Option<Box<dyn WindowSurface>> {
    None
}
