use serde::{Deserialize, Serialize};
use std::fmt;

/// Match lifecycle
///
/// ```text
/// Lobby ──► Starting ──► Active ──► Ending ──► Resetting ──► Lobby
///   ▲           │
///   └───────────┘ (countdown aborted)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SessionState {
    #[default]
    Lobby,
    Starting,
    Active,
    Ending,
    Resetting,
}

impl SessionState {
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Lobby, Starting)
                | (Starting, Lobby)
                | (Starting, Active)
                | (Active, Ending)
                | (Ending, Resetting)
                | (Resetting, Lobby)
        )
    }

    /// Human-facing label for scoreboards
    pub fn label(self) -> &'static str {
        match self {
            SessionState::Lobby => "Waiting",
            SessionState::Starting => "Starting",
            SessionState::Active => "In Game",
            SessionState::Ending => "Ending",
            SessionState::Resetting => "Resetting",
        }
    }

    pub fn accepts_joins(self) -> bool {
        matches!(self, SessionState::Lobby | SessionState::Starting)
    }

    pub fn all() -> [SessionState; 5] {
        [
            SessionState::Lobby,
            SessionState::Starting,
            SessionState::Active,
            SessionState::Ending,
            SessionState::Resetting,
        ]
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Lobby => "lobby",
            SessionState::Starting => "starting",
            SessionState::Active => "active",
            SessionState::Ending => "ending",
            SessionState::Resetting => "resetting",
        };
        f.write_str(name)
    }
}
