//! Pillars - Session Core Library
//!
//! Host-agnostic logic for the Pillars elimination minigame:
//! - Session state machine (lobby, countdown, match, end, reset)
//! - Tower generation with a cell-ownership index
//! - Weighted loot tables with time-based table switching
//! - Typed synchronous event bus with cancelable proposals
//! - Tick scheduler and host capability traits
//! - Match rules (damage, freeze, void falls)
//! - RON configuration, tracing setup and loot-file hot reload
//!
//! The host drives everything: it forwards actor actions to [`Session`]
//! methods and calls [`Session::tick`] once per game tick.
//!
//! [`Session`]: session::Session
//! [`Session::tick`]: session::Session::tick

pub mod config;
pub mod constants;
pub mod events;
pub mod geometry;
pub mod host;
pub mod hotreload;
pub mod logging;
pub mod loot;
pub mod material;
pub mod rules;
pub mod scheduler;
pub mod session;
pub mod snapshot;
pub mod structure;
