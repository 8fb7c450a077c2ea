//! Debounced enter/leave tracking for the hovered item
//!
//! Only meaningful while the overlay is click-through; in Interactive mode
//! ordinary window input handles hover and the coordinator is disabled.

use tokio::sync::broadcast;
use tracing::debug;

use crate::events::OverlayEvent;
use crate::pointer::PointerEvent;
use crate::window::ScreenRect;

use super::hit_test::HitTester;
use super::layout::{ItemId, ListSnapshot};

pub struct HoverCoordinator {
    tester: HitTester,
    enabled: bool,
    inside_window: bool,
    current: Option<ItemId>,
    event_tx: broadcast::Sender<OverlayEvent>,
}

impl HoverCoordinator {
    pub fn new(tester: HitTester, event_tx: broadcast::Sender<OverlayEvent>) -> Self {
        Self {
            tester,
            enabled: true,
            inside_window: false,
            current: None,
            event_tx,
        }
    }

    /// The currently hovered item.
    pub fn current(&self) -> Option<&ItemId> {
        self.current.as_ref()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn enable(&mut self) {
        if !self.enabled {
            debug!("hover detection enabled");
            self.enabled = true;
        }
    }

    /// Stop processing pointer events and leave any current target.
    pub fn disable(&mut self) {
        if self.enabled {
            debug!("hover detection disabled");
            self.enabled = false;
            self.clear();
        }
    }

    /// Process one raw pointer position.
    ///
    /// `window` is the overlay's current screen rectangle; `snapshot` the
    /// list as currently displayed. Neither is retained.
    pub fn on_pointer(
        &mut self,
        event: &PointerEvent,
        window: Option<ScreenRect>,
        snapshot: &ListSnapshot,
    ) {
        if !self.enabled {
            return;
        }

        let Some(point) = window.and_then(|rect| rect.to_window(event.x, event.y)) else {
            self.clear();
            return;
        };

        if !self.inside_window {
            self.inside_window = true;
            self.emit(OverlayEvent::WindowHoverEnter { position: point });
        }

        let resolved = self.tester.hit(point, snapshot).map(|hit| hit.item);
        if resolved == self.current.as_ref() {
            return;
        }

        let resolved = resolved.cloned();
        if let Some(previous) = self.current.take() {
            self.emit(OverlayEvent::ItemHoverLeave { item: previous });
        }
        if let Some(item) = resolved {
            self.current = Some(item.clone());
            self.emit(OverlayEvent::ItemHoverEnter { item });
        }
    }

    fn clear(&mut self) {
        if let Some(previous) = self.current.take() {
            self.emit(OverlayEvent::ItemHoverLeave { item: previous });
        }
        if self.inside_window {
            self.inside_window = false;
            self.emit(OverlayEvent::WindowHoverLeave);
        }
    }

    fn emit(&self, event: OverlayEvent) {
        debug!(%event, "hover event");
        let _ = self.event_tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hover::LayoutMetrics;

    const WINDOW: ScreenRect = ScreenRect {
        x: 1000,
        y: 100,
        width: 280,
        height: 600,
    };

    fn setup() -> (HoverCoordinator, broadcast::Receiver<OverlayEvent>, ListSnapshot) {
        let (tx, rx) = broadcast::channel(256);
        let coordinator = HoverCoordinator::new(HitTester::new(LayoutMetrics::default()), tx);
        let snapshot = ListSnapshot {
            critical: vec![ItemId::from("c0"), ItemId::from("c1")],
            high: vec![ItemId::from("h0")],
            today: vec![],
        };
        (coordinator, rx, snapshot)
    }

    /// Pointer at window-relative (40, y).
    fn pointer(y: i32) -> PointerEvent {
        PointerEvent::new(WINDOW.x + 40, WINDOW.y + y)
    }

    fn drain(rx: &mut broadcast::Receiver<OverlayEvent>) -> Vec<OverlayEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn enter(id: &str) -> OverlayEvent {
        OverlayEvent::ItemHoverEnter {
            item: ItemId::from(id),
        }
    }

    fn leave(id: &str) -> OverlayEvent {
        OverlayEvent::ItemHoverLeave {
            item: ItemId::from(id),
        }
    }

    #[test]
    fn test_enter_then_switch_rows() {
        let (mut hover, mut rx, snapshot) = setup();

        hover.on_pointer(&pointer(80), Some(WINDOW), &snapshot);
        hover.on_pointer(&pointer(90), Some(WINDOW), &snapshot);
        hover.on_pointer(&pointer(140), Some(WINDOW), &snapshot);

        let events = drain(&mut rx);
        assert!(matches!(events[0], OverlayEvent::WindowHoverEnter { .. }));
        assert_eq!(events[1..], [enter("c0"), leave("c0"), enter("c1")]);
        assert_eq!(hover.current(), Some(&ItemId::from("c1")));
    }

    #[test]
    fn test_leaving_window_clears_target() {
        let (mut hover, mut rx, snapshot) = setup();
        hover.on_pointer(&pointer(200), Some(WINDOW), &snapshot);
        hover.on_pointer(&PointerEvent::new(10, 10), Some(WINDOW), &snapshot);

        let events = drain(&mut rx);
        assert_eq!(
            events[1..],
            [enter("h0"), leave("h0"), OverlayEvent::WindowHoverLeave]
        );
        assert!(hover.current().is_none());
    }

    #[test]
    fn test_moving_into_header_leaves_item_but_not_window() {
        let (mut hover, mut rx, snapshot) = setup();
        hover.on_pointer(&pointer(80), Some(WINDOW), &snapshot);
        hover.on_pointer(&pointer(20), Some(WINDOW), &snapshot);

        let events = drain(&mut rx);
        assert_eq!(events[1..], [enter("c0"), leave("c0")]);
    }

    #[test]
    fn test_disable_emits_synthetic_leave_and_gates_events() {
        let (mut hover, mut rx, snapshot) = setup();
        hover.on_pointer(&pointer(80), Some(WINDOW), &snapshot);
        drain(&mut rx);

        hover.disable();
        assert_eq!(drain(&mut rx), [leave("c0"), OverlayEvent::WindowHoverLeave]);

        hover.on_pointer(&pointer(140), Some(WINDOW), &snapshot);
        assert!(drain(&mut rx).is_empty());
        assert!(hover.current().is_none());

        hover.enable();
        hover.on_pointer(&pointer(140), Some(WINDOW), &snapshot);
        assert_eq!(drain(&mut rx)[1..], [enter("c1")]);
    }

    #[test]
    fn test_snapshot_change_under_still_pointer() {
        let (mut hover, mut rx, mut snapshot) = setup();
        hover.on_pointer(&pointer(80), Some(WINDOW), &snapshot);

        // First critical item completed: the row now shows the next one.
        snapshot.critical.remove(0);
        hover.on_pointer(&pointer(80), Some(WINDOW), &snapshot);

        assert_eq!(drain(&mut rx)[1..], [enter("c0"), leave("c0"), enter("c1")]);
    }

    #[test]
    fn test_no_double_enter_and_no_foreign_leave() {
        let (mut hover, mut rx, snapshot) = setup();

        let mut seed: u32 = 0x9e37_79b9;
        for _ in 0..500 {
            seed ^= seed << 13;
            seed ^= seed >> 17;
            seed ^= seed << 5;
            let x = 900 + (seed % 500) as i32;
            let y = 50 + ((seed >> 9) % 800) as i32;
            hover.on_pointer(&PointerEvent::new(x, y), Some(WINDOW), &snapshot);
            if seed % 97 == 0 {
                hover.disable();
                hover.enable();
            }
        }

        let mut current: Option<ItemId> = None;
        for event in drain(&mut rx) {
            match event {
                OverlayEvent::ItemHoverEnter { item } => {
                    assert!(current.is_none(), "enter without leave");
                    current = Some(item);
                }
                OverlayEvent::ItemHoverLeave { item } => {
                    assert_eq!(current.take(), Some(item), "leave for non-current target");
                }
                _ => {}
            }
        }
    }
}
