//! OS backends
//!
//! - Windows: RegisterHotKey on a message thread, WH_MOUSE_LL hook thread,
//!   extended window styles on the overlay HWND
//! - macOS: CGEventTap threads for key-down and pointer-moved events
//! - elsewhere: installation fails and the features degrade

#[cfg(target_os = "macos")]
mod macos;
#[cfg(not(any(windows, target_os = "macos")))]
mod unsupported;
#[cfg(windows)]
mod win32;

use tracing::warn;

use crate::hotkey::HotkeyBackend;
use crate::pointer::PointerBackend;
use crate::window::WindowSurface;

#[cfg(target_os = "macos")]
use self::macos as imp;
#[cfg(not(any(windows, target_os = "macos")))]
use self::unsupported as imp;
#[cfg(windows)]
use self::win32 as imp;

/// Global hotkey mechanism for this OS
pub fn hotkey_backend() -> Box<dyn HotkeyBackend> {
    Box::new(imp::HotkeyThread::default())
}

/// Low-level pointer listener for this OS
pub fn pointer_backend() -> Box<dyn PointerBackend> {
    Box::new(imp::PointerThread::default())
}

/// Native surface for a window handle owned by the presentation layer.
/// `None` if no handle was given or the OS has no native surface support.
pub fn native_surface(handle: Option<isize>) -> Option<Box<dyn WindowSurface>> {
    let handle = handle?;
    let surface = imp::native_surface(handle);
    if surface.is_none() {
        warn!(handle, "native window handles are not supported on this platform");
    }
    surface
}
