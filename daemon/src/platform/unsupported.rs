//! Fallback for platforms without global input hooks

use crate::hotkey::{HotkeyBackend, HotkeyBinding, HotkeyError, HotkeySink};
use crate::pointer::{HookError, PointerBackend, PointerSink};
use crate::window::WindowSurface;

#[derive(Default)]
pub struct HotkeyThread;

impl HotkeyBackend for HotkeyThread {
    fn install(
        &mut self,
        bindings: &[(u32, HotkeyBinding)],
        _sink: HotkeySink,
    ) -> Vec<Result<(), HotkeyError>> {
        bindings.iter().map(|_| Err(HotkeyError::Unsupported)).collect()
    }

    fn uninstall(&mut self) {}
}

#[derive(Default)]
pub struct PointerThread;

impl PointerBackend for PointerThread {
    fn install(&mut self, _sink: PointerSink) -> Result<(), HookError> {
        Err(HookError::Unsupported)
    }

    fn uninstall(&mut self) {}
}

pub fn native_surface(_handle: isize) -> Option<Box<dyn WindowSurface>> {
    None
}
