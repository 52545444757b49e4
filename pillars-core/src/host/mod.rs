//! Host capabilities the session core relies on.
//!
//! The host (game server, test harness) owns actors and world cells. The core
//! never assumes a call succeeds: every capability returns a `Result`, and the
//! session logs and carries on when one fails.

mod memory;

pub use memory::{ActorRecord, MemoryHost};

use serde::{Deserialize, Serialize};

use crate::geometry::{CellPos, Position};
use crate::loot::Artifact;
use crate::material::Material;
use crate::session::ParticipantId;

/// A host call that could not be carried out. The session logs these and
/// continues; none of them abort a match.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostError {
    #[error("actor {0} is not reachable")]
    ActorUnavailable(ParticipantId),
    #[error("world write failed at {0}")]
    WorldUnavailable(CellPos),
    #[error("host rejected the request: {0}")]
    Rejected(String),
}

/// Messages the session asks the host to show to an actor.
/// Wording, colours and localisation belong to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notice {
    Joined { name: String, players: usize, max: usize },
    Left { name: String, players: usize, max: usize },
    WaitingForPlayers { players: usize, needed: usize },
    CountdownStarted { seconds: u32 },
    CountdownTick { seconds: u32 },
    CountdownTitle { seconds: u32 },
    CountdownCancelled,
    GameStarted,
    Winner { name: String },
    Draw,
    Killed { victim: String, killer: String },
    Died { victim: String },
    VoidDeath { victim: String },
    VoidWarning { seconds: u32 },
    VoidSaved,
    Spectating,
    ArtifactReceived { item: Material, amount: u32 },
}

/// Actor-facing capabilities
pub trait ActorHost {
    fn is_reachable(&self, actor: ParticipantId) -> bool;
    fn teleport(&mut self, actor: ParticipantId, to: &Position) -> Result<(), HostError>;
    fn set_spectator(&mut self, actor: ParticipantId) -> Result<(), HostError>;
    /// Back to normal play: leave spectator mode, clear session inventory
    fn restore(&mut self, actor: ParticipantId) -> Result<(), HostError>;
    fn restore_health(&mut self, actor: ParticipantId) -> Result<(), HostError>;
    fn give_artifact(&mut self, actor: ParticipantId, artifact: &Artifact)
        -> Result<(), HostError>;
    fn notify(&mut self, actor: ParticipantId, notice: &Notice) -> Result<(), HostError>;
}

/// World-cell capabilities
pub trait WorldHost {
    fn cell(&self, cell: &CellPos) -> Result<Option<Material>, HostError>;
    /// `None` clears the cell
    fn set_cell(&mut self, cell: &CellPos, material: Option<Material>) -> Result<(), HostError>;
}

/// Everything a session needs from its host
pub trait Host: ActorHost + WorldHost + Send {}

impl<T: ActorHost + WorldHost + Send> Host for T {}
