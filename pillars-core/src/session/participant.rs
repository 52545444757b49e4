use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::geometry::{CellPos, Position};

/// Stable participant identifier assigned by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(pub u64);

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Per-match counters, reset with the roster
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantStats {
    pub eliminations: u32,
    pub cells_placed: u32,
    pub cells_broken: u32,
    /// Sum of amounts of every artifact received
    pub artifacts_collected: u32,
}

/// Roster entry, alive from an accepted join until leave or reset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    pub name: String,
    pub alive: bool,
    pub frozen: bool,
    pub spawn: Option<Position>,
    pub tower_base: Option<CellPos>,
    pub stats: ParticipantStats,
}

impl Participant {
    pub fn new(id: ParticipantId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            alive: true,
            frozen: false,
            spawn: None,
            tower_base: None,
            stats: ParticipantStats::default(),
        }
    }
}

/// Roster shared with the off-context growth scan. Only the session writes.
pub type SharedRoster = Arc<RwLock<BTreeMap<ParticipantId, Participant>>>;
