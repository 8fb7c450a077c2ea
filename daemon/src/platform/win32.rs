//! Win32 backends
//!
//! Hotkeys registered with a NULL window are delivered as WM_HOTKEY to the
//! registering thread's queue, and WH_MOUSE_LL callbacks run on the thread
//! that installed the hook. Both therefore live on dedicated threads that
//! do nothing but pump messages until WM_QUIT.

use std::ffi::c_void;
use std::sync::mpsc::{sync_channel, Receiver};
use std::sync::Mutex;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, error, info};
use windows::core::HRESULT;
use windows::Win32::Foundation::{
    SetLastError, COLORREF, ERROR_HOTKEY_ALREADY_REGISTERED, HWND, LPARAM, LRESULT, RECT,
    WIN32_ERROR, WPARAM,
};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::System::Threading::GetCurrentThreadId;
use windows::Win32::UI::Input::KeyboardAndMouse::{
    RegisterHotKey, SetFocus, UnregisterHotKey, HOT_KEY_MODIFIERS, MOD_ALT, MOD_CONTROL,
    MOD_NOREPEAT, MOD_SHIFT, MOD_WIN,
};
use windows::Win32::UI::WindowsAndMessaging::{
    CallNextHookEx, DispatchMessageW, GetMessageW, GetWindowLongPtrW, GetWindowRect, IsWindow,
    PeekMessageW, PostThreadMessageW, SetForegroundWindow, SetLayeredWindowAttributes,
    SetWindowLongPtrW, SetWindowPos, SetWindowsHookExW, TranslateMessage, UnhookWindowsHookEx,
    GWL_EXSTYLE, HC_ACTION, HHOOK, HWND_NOTOPMOST, HWND_TOPMOST, LWA_ALPHA, MSG, MSLLHOOKSTRUCT,
    PM_NOREMOVE, SWP_FRAMECHANGED, SWP_NOACTIVATE, SWP_NOMOVE, SWP_NOSIZE, SWP_NOZORDER,
    SWP_SHOWWINDOW, WH_MOUSE_LL, WM_HOTKEY, WM_MOUSEMOVE, WM_QUIT, WS_EX_LAYERED,
    WS_EX_NOACTIVATE, WS_EX_TOOLWINDOW, WS_EX_TRANSPARENT,
};

use crate::hotkey::{HotkeyBackend, HotkeyBinding, HotkeyError, HotkeySink, Key, Modifiers};
use crate::pointer::{HookError, PointerBackend, PointerSink};
use crate::window::{ScreenRect, WindowError, WindowStyle, WindowSurface};

const READY_TIMEOUT: Duration = Duration::from_secs(2);

/// Read by the hook proc. Cleared under the lock on uninstall, so clearing
/// waits for any callback that is mid-delivery.
static POINTER_SINK: Mutex<Option<PointerSink>> = Mutex::new(None);

#[derive(Debug)]
struct MessageThread {
    thread_id: u32,
    join: JoinHandle<()>,
}

impl MessageThread {
    fn quit(self) {
        unsafe {
            let _ = PostThreadMessageW(self.thread_id, WM_QUIT, WPARAM(0), LPARAM(0));
        }
        let _ = self.join.join();
    }
}

/// Wait for a freshly spawned message thread to finish its setup.
///
/// The thread reports its id on `started` as soon as its queue exists and
/// its setup outcome on `ready`. A thread that misses the deadline is told
/// to quit and joined before this returns, so whatever it installs late is
/// removed again.
fn await_ready<T>(
    join: JoinHandle<()>,
    started: &Receiver<u32>,
    ready: &Receiver<T>,
    timeout: Duration,
) -> Option<(MessageThread, T)> {
    let Ok(thread_id) = started.recv() else {
        let _ = join.join();
        return None;
    };

    let worker = MessageThread { thread_id, join };
    match ready.recv_timeout(timeout) {
        Ok(value) => Some((worker, value)),
        Err(_) => {
            worker.quit();
            None
        }
    }
}

/// Ensure the calling thread has a message queue before anything is
/// posted to it.
fn init_message_queue() -> u32 {
    let mut msg = MSG::default();
    unsafe {
        let _ = PeekMessageW(&mut msg, None, 0, 0, PM_NOREMOVE);
        GetCurrentThreadId()
    }
}

fn hot_key_modifiers(modifiers: &Modifiers) -> HOT_KEY_MODIFIERS {
    let mut mask = MOD_NOREPEAT.0;
    if modifiers.ctrl {
        mask |= MOD_CONTROL.0;
    }
    if modifiers.alt {
        mask |= MOD_ALT.0;
    }
    if modifiers.shift {
        mask |= MOD_SHIFT.0;
    }
    if modifiers.win {
        mask |= MOD_WIN.0;
    }
    HOT_KEY_MODIFIERS(mask)
}

fn virtual_key(key: Key) -> u32 {
    match key {
        Key::Letter(c) => c as u32,
        Key::Digit(d) => 0x30 + d as u32,
        Key::Function(n) => 0x70 + (n as u32 - 1),
        Key::Escape => 0x1B,
        Key::Space => 0x20,
        Key::Enter => 0x0D,
        Key::Tab => 0x09,
    }
}

fn register_one(id: u32, modifiers: HOT_KEY_MODIFIERS, vk: u32, combo: &str) -> Result<(), HotkeyError> {
    unsafe { RegisterHotKey(None, id as i32, modifiers, vk) }.map_err(|e| {
        if e.code() == HRESULT::from_win32(ERROR_HOTKEY_ALREADY_REGISTERED.0) {
            HotkeyError::Conflict {
                combo: combo.to_string(),
            }
        } else {
            HotkeyError::Os(e.message())
        }
    })
}

/// RegisterHotKey bindings owned by a dedicated message thread
#[derive(Debug, Default)]
pub struct HotkeyThread {
    thread: Option<MessageThread>,
}

impl HotkeyBackend for HotkeyThread {
    fn install(
        &mut self,
        bindings: &[(u32, HotkeyBinding)],
        sink: HotkeySink,
    ) -> Vec<Result<(), HotkeyError>> {
        let fail_all = |e: HotkeyError| -> Vec<Result<(), HotkeyError>> {
            bindings.iter().map(|_| Err(e.clone())).collect()
        };

        if self.thread.is_some() {
            return fail_all(HotkeyError::Os("hotkey thread already running".to_string()));
        }

        let requests: Vec<(u32, HOT_KEY_MODIFIERS, u32, String)> = bindings
            .iter()
            .map(|(id, b)| {
                (
                    *id,
                    hot_key_modifiers(&b.combo.modifiers),
                    virtual_key(b.combo.key),
                    b.combo.to_string(),
                )
            })
            .collect();

        let (started_tx, started_rx) = sync_channel::<u32>(1);
        let (ready_tx, ready_rx) = sync_channel::<Vec<Result<(), HotkeyError>>>(1);

        let spawned = thread::Builder::new()
            .name("hotkey-listener".to_string())
            .spawn(move || {
                let _ = started_tx.send(init_message_queue());

                let results: Vec<Result<(), HotkeyError>> = requests
                    .iter()
                    .map(|(id, modifiers, vk, combo)| register_one(*id, *modifiers, *vk, combo))
                    .collect();
                let registered: Vec<u32> = requests
                    .iter()
                    .zip(&results)
                    .filter(|(_, r)| r.is_ok())
                    .map(|((id, ..), _)| *id)
                    .collect();

                let _ = ready_tx.send(results);
                info!("hotkey listener thread started");

                let mut msg = MSG::default();
                loop {
                    let r = unsafe { GetMessageW(&mut msg, None, 0, 0) };
                    if r.0 <= 0 {
                        break;
                    }
                    if msg.message == WM_HOTKEY {
                        sink.notify(msg.wParam.0 as u32);
                    }
                }

                for id in registered {
                    unsafe {
                        let _ = UnregisterHotKey(None, id as i32);
                    }
                }
                info!("hotkey listener thread stopped");
            });

        let join = match spawned {
            Ok(join) => join,
            Err(e) => return fail_all(HotkeyError::ThreadSpawn(e.to_string())),
        };

        match await_ready(join, &started_rx, &ready_rx, READY_TIMEOUT) {
            Some((worker, results)) => {
                self.thread = Some(worker);
                results
            }
            None => {
                error!("hotkey thread did not signal readiness");
                fail_all(HotkeyError::Os("hotkey thread did not start".to_string()))
            }
        }
    }

    fn uninstall(&mut self) {
        if let Some(thread) = self.thread.take() {
            thread.quit();
        }
    }
}

/// WH_MOUSE_LL hook owned by a dedicated message thread
#[derive(Debug, Default)]
pub struct PointerThread {
    thread: Option<MessageThread>,
}

fn set_pointer_sink(sink: Option<PointerSink>) {
    match POINTER_SINK.lock() {
        Ok(mut guard) => *guard = sink,
        Err(poisoned) => *poisoned.into_inner() = sink,
    }
}

impl PointerBackend for PointerThread {
    fn install(&mut self, sink: PointerSink) -> Result<(), HookError> {
        if self.thread.is_some() {
            return Ok(());
        }

        set_pointer_sink(Some(sink));

        let (started_tx, started_rx) = sync_channel::<u32>(1);
        let (ready_tx, ready_rx) = sync_channel::<Result<(), HookError>>(1);

        let spawned = thread::Builder::new()
            .name("pointer-hook".to_string())
            .spawn(move || {
                let _ = started_tx.send(init_message_queue());

                let hmodule = match unsafe { GetModuleHandleW(None) } {
                    Ok(h) => h,
                    Err(e) => {
                        let _ = ready_tx.send(Err(HookError::Install(e.message())));
                        return;
                    }
                };

                let hook = match unsafe {
                    SetWindowsHookExW(WH_MOUSE_LL, Some(mouse_hook_proc), hmodule, 0)
                } {
                    Ok(h) if !h.0.is_null() => h,
                    Ok(_) => {
                        let e = windows::core::Error::from_win32();
                        let _ = ready_tx.send(Err(HookError::Install(e.message())));
                        return;
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(HookError::Install(e.message())));
                        return;
                    }
                };

                let _ = ready_tx.send(Ok(()));

                // Message loop keeps WH_MOUSE_LL callbacks flowing.
                let mut msg = MSG::default();
                loop {
                    let r = unsafe { GetMessageW(&mut msg, None, 0, 0) };
                    if r.0 <= 0 {
                        break;
                    }
                    unsafe {
                        let _ = TranslateMessage(&msg);
                        DispatchMessageW(&msg);
                    }
                }

                unsafe {
                    let _ = UnhookWindowsHookEx(hook);
                }
                debug!("pointer hook thread exiting");
            });

        let join = match spawned {
            Ok(join) => join,
            Err(e) => {
                set_pointer_sink(None);
                return Err(HookError::ThreadSpawn(e.to_string()));
            }
        };

        match await_ready(join, &started_rx, &ready_rx, READY_TIMEOUT) {
            Some((worker, Ok(()))) => {
                self.thread = Some(worker);
                Ok(())
            }
            Some((worker, Err(e))) => {
                set_pointer_sink(None);
                worker.quit();
                Err(e)
            }
            None => {
                set_pointer_sink(None);
                Err(HookError::NotReady)
            }
        }
    }

    fn uninstall(&mut self) {
        set_pointer_sink(None);
        if let Some(thread) = self.thread.take() {
            thread.quit();
        }
    }
}

unsafe extern "system" fn mouse_hook_proc(n_code: i32, w_param: WPARAM, l_param: LPARAM) -> LRESULT {
    if n_code == HC_ACTION as i32 && w_param.0 as u32 == WM_MOUSEMOVE {
        let info = &*(l_param.0 as *const MSLLHOOKSTRUCT);
        if let Ok(guard) = POINTER_SINK.lock() {
            if let Some(sink) = guard.as_ref() {
                sink.deliver(info.pt.x, info.pt.y);
            }
        }
    }

    CallNextHookEx(HHOOK(std::ptr::null_mut()), n_code, w_param, l_param)
}

/// Overlay window identified by its HWND
#[derive(Debug, Clone, Copy)]
pub struct Win32Surface {
    hwnd: isize,
}

impl Win32Surface {
    pub fn new(hwnd: isize) -> Self {
        Self { hwnd }
    }

    fn handle(&self) -> Result<HWND, WindowError> {
        let hwnd = HWND(self.hwnd as *mut c_void);
        if unsafe { IsWindow(hwnd) }.as_bool() {
            Ok(hwnd)
        } else {
            Err(WindowError::InvalidHandle)
        }
    }
}

fn os_error(e: windows::core::Error) -> WindowError {
    WindowError::Os(e.message())
}

impl WindowSurface for Win32Surface {
    fn apply_style(&mut self, style: &WindowStyle) -> Result<(), WindowError> {
        let hwnd = self.handle()?;

        let current = unsafe { GetWindowLongPtrW(hwnd, GWL_EXSTYLE) } as u32;
        let mut ex_style = current | WS_EX_LAYERED.0 | WS_EX_TOOLWINDOW.0;
        if style.click_through {
            ex_style |= WS_EX_TRANSPARENT.0;
        } else {
            ex_style &= !WS_EX_TRANSPARENT.0;
        }
        if style.accepts_focus {
            ex_style &= !WS_EX_NOACTIVATE.0;
        } else {
            ex_style |= WS_EX_NOACTIVATE.0;
        }

        if ex_style != current {
            unsafe {
                SetLastError(WIN32_ERROR(0));
                if SetWindowLongPtrW(hwnd, GWL_EXSTYLE, ex_style as isize) == 0 {
                    let e = windows::core::Error::from_win32();
                    if e.code().is_err() {
                        return Err(os_error(e));
                    }
                }
            }
        }

        unsafe {
            SetLayeredWindowAttributes(hwnd, COLORREF(0), style.alpha(), LWA_ALPHA).map_err(os_error)?;

            let insert_after = if style.topmost { HWND_TOPMOST } else { HWND_NOTOPMOST };
            SetWindowPos(
                hwnd,
                insert_after,
                0,
                0,
                0,
                0,
                SWP_NOMOVE | SWP_NOSIZE | SWP_NOACTIVATE | SWP_FRAMECHANGED,
            )
            .map_err(os_error)?;
        }

        Ok(())
    }

    fn bring_to_front(&mut self) -> Result<(), WindowError> {
        let hwnd = self.handle()?;
        unsafe {
            SetWindowPos(hwnd, HWND_TOPMOST, 0, 0, 0, 0, SWP_NOMOVE | SWP_NOSIZE | SWP_SHOWWINDOW)
                .map_err(os_error)?;
            if !SetForegroundWindow(hwnd).as_bool() {
                return Err(WindowError::Os("foreground request refused".to_string()));
            }
        }
        Ok(())
    }

    fn focus_default_input(&mut self) -> Result<(), WindowError> {
        let hwnd = self.handle()?;
        unsafe { SetFocus(hwnd) }.map(|_| ()).map_err(os_error)
    }

    fn relocate(&mut self, rect: ScreenRect) -> Result<(), WindowError> {
        let hwnd = self.handle()?;
        unsafe {
            SetWindowPos(
                hwnd,
                None,
                rect.x,
                rect.y,
                rect.width,
                rect.height,
                SWP_NOZORDER | SWP_NOACTIVATE,
            )
        }
        .map_err(os_error)
    }

    fn screen_rect(&self) -> Option<ScreenRect> {
        let hwnd = self.handle().ok()?;
        let mut rect = RECT::default();
        unsafe { GetWindowRect(hwnd, &mut rect) }.ok()?;
        Some(ScreenRect::new(
            rect.left,
            rect.top,
            rect.right - rect.left,
            rect.bottom - rect.top,
        ))
    }
}

pub fn native_surface(handle: isize) -> Option<Box<dyn WindowSurface>> {
    Some(Box::new(Win32Surface::new(handle)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_virtual_keys() {
        assert_eq!(virtual_key(Key::Letter('T')), 0x54);
        assert_eq!(virtual_key(Key::Digit(7)), 0x37);
        assert_eq!(virtual_key(Key::Function(1)), 0x70);
        assert_eq!(virtual_key(Key::Function(12)), 0x7B);
    }

    #[test]
    fn test_modifier_mask_always_norepeat() {
        let mask = hot_key_modifiers(&Modifiers {
            ctrl: true,
            alt: true,
            ..Modifiers::default()
        });
        assert_eq!(mask.0, MOD_NOREPEAT.0 | MOD_CONTROL.0 | MOD_ALT.0);
    }

    #[test]
    fn test_late_thread_is_stopped_before_failing() {
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::sync::Arc;

        let exited = Arc::new(AtomicBool::new(false));
        let (started_tx, started_rx) = sync_channel::<u32>(1);
        let (ready_tx, ready_rx) = sync_channel::<()>(1);

        let flag = Arc::clone(&exited);
        let join = thread::spawn(move || {
            let _ = started_tx.send(init_message_queue());
            thread::sleep(Duration::from_millis(100));
            let _ = ready_tx.send(());

            let mut msg = MSG::default();
            while unsafe { GetMessageW(&mut msg, None, 0, 0) }.0 > 0 {}
            flag.store(true, Ordering::SeqCst);
        });

        let outcome = await_ready(join, &started_rx, &ready_rx, Duration::from_millis(10));
        assert!(outcome.is_none());
        assert!(exited.load(Ordering::SeqCst));
    }
}
