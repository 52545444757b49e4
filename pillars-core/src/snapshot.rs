//! Serializable read model of a session, for scoreboards and the status API.

use serde::{Deserialize, Serialize};

use crate::host::Host;
use crate::scheduler::Scheduler;
use crate::session::{ParticipantId, ParticipantStats, Session, SessionState, SessionTask};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantSnapshot {
    pub id: ParticipantId,
    pub name: String,
    pub alive: bool,
    pub frozen: bool,
    pub stats: ParticipantStats,
    /// `None` until a tower was built for this participant
    pub tower_height: Option<u32>,
}

/// Serializable view of a session, published for readers on other threads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub label: String,
    pub players: usize,
    pub alive: usize,
    pub spectators: usize,
    pub min_players: usize,
    pub max_players: usize,
    pub countdown_remaining: Option<u32>,
    /// `MM:SS`
    pub elapsed: String,
    pub elapsed_secs: u64,
    pub participants: Vec<ParticipantSnapshot>,
    pub tracked_cells: usize,
    pub index_consistent: bool,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self {
            state: SessionState::Lobby,
            label: SessionState::Lobby.label().to_string(),
            players: 0,
            alive: 0,
            spectators: 0,
            min_players: 0,
            max_players: 0,
            countdown_remaining: None,
            elapsed: format_elapsed(0),
            elapsed_secs: 0,
            participants: Vec::new(),
            tracked_cells: 0,
            index_consistent: true,
        }
    }
}

/// `MM:SS`; minutes keep counting past 59
pub fn format_elapsed(secs: u64) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

impl SessionSnapshot {
    pub fn capture<H: Host, S: Scheduler<SessionTask>>(session: &Session<H, S>) -> Self {
        let structures = session.structures();
        let participants: Vec<ParticipantSnapshot> = session
            .roster()
            .read()
            .values()
            .map(|p| ParticipantSnapshot {
                id: p.id,
                name: p.name.clone(),
                alive: p.alive,
                frozen: p.frozen,
                stats: p.stats,
                tower_height: structures.tower(p.id).map(|t| t.height),
            })
            .collect();
        let elapsed_secs = session.elapsed().as_secs();
        let game = &session.config().game;

        Self {
            state: session.state(),
            label: session.state().label().to_string(),
            players: participants.len(),
            alive: participants.iter().filter(|p| p.alive).count(),
            spectators: session.spectators().count(),
            min_players: game.min_players,
            max_players: game.max_players,
            countdown_remaining: session.countdown_remaining(),
            elapsed: format_elapsed(elapsed_secs),
            elapsed_secs,
            participants,
            tracked_cells: structures.tracked_cells(),
            index_consistent: structures.verify_consistency().is_ok(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PillarsConfig;
    use crate::host::MemoryHost;

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(0), "00:00");
        assert_eq!(format_elapsed(75), "01:15");
        assert_eq!(format_elapsed(3600), "60:00");
    }

    #[test]
    fn test_lobby_snapshot() {
        let mut host = MemoryHost::new();
        host.connect(ParticipantId(1));
        let mut session = Session::new(PillarsConfig::default(), host);
        session.join(ParticipantId(1), "Alex").unwrap();

        let snap = session.snapshot();
        assert_eq!(snap.state, SessionState::Lobby);
        assert_eq!(snap.label, "Waiting");
        assert_eq!(snap.players, 1);
        assert_eq!(snap.alive, 1);
        assert_eq!(snap.max_players, 16);
        assert_eq!(snap.participants[0].name, "Alex");
        assert_eq!(snap.participants[0].tower_height, None);
        assert_eq!(snap.elapsed, "00:00");
        assert!(snap.index_consistent);

        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["state"], "Lobby");
    }
}
