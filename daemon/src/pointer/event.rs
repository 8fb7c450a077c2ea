use tokio::time::Instant;

/// A raw pointer position in screen coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointerEvent {
    pub x: i32,
    pub y: i32,
    /// Monotonic time the hook observed the movement
    pub at: Instant,
}

impl PointerEvent {
    pub fn new(x: i32, y: i32) -> Self {
        Self {
            x,
            y,
            at: Instant::now(),
        }
    }
}
