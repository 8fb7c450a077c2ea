//! Pointer hover over list items
//!
//! The layout definition lives here once and is shared with the
//! presentation layer (over IPC `get_layout`), so hit-testing and rendering
//! cannot drift apart.

mod coordinator;
mod layout;

pub use coordinator::HoverCoordinator;
pub use hit_test::{Hit, HitTester};
pub use layout::{Band, BandCaps, ItemId, LayoutMetrics, ListSnapshot};
