//! Pillars Server Library
//!
//! Headless host for the Pillars session core:
//! - Bevy app that ticks the session and hot-reloads loot tables
//! - API ↔ Bevy bridge (command channel + shared snapshot)
//! - HTTP/JSON operator API

pub mod api; // HTTP/JSON operator endpoints
pub mod bridge; // API ↔ Bevy communication bridge
pub mod plugin; // Session resources and systems

pub use bridge::{create_bridge, PillarsCommand, SessionResource, SharedSnapshot};
pub use plugin::PillarsPlugin;
