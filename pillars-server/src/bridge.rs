//! API ↔ Bevy bridge
//!
//! The HTTP handlers run on a tokio runtime, the session lives inside the
//! Bevy world. They talk through two channels:
//!
//! ```text
//! ┌──────────────┐  PillarsCommand (mpsc)   ┌────────────────────────┐
//! │  axum API    │ ───────────────────────► │  process_commands      │
//! │  (tokio)     │ ◄─────────────────────── │  (Bevy Update)         │
//! │              │   reply (oneshot)        │   └─ SessionResource   │
//! │              │                          │                        │
//! │              │  SharedSnapshot (RwLock) │  publish_snapshot      │
//! │              │ ◄─────────────────────── │                        │
//! └──────────────┘                          └────────────────────────┘
//! ```

use bevy::prelude::*;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use pillars_core::config::PillarsConfig;
use pillars_core::events::EliminationCause;
use pillars_core::geometry::CellPos;
use pillars_core::host::MemoryHost;
use pillars_core::hotreload::HotReloadStatus;
use pillars_core::logging::TimingSpan;
use pillars_core::loot::LoadReport;
use pillars_core::session::{
    BreakResponse, EliminationOutcome, JoinReceipt, ParticipantId, Session, SessionError,
    StopOutcome, VoidResponse,
};
use pillars_core::snapshot::SessionSnapshot;

/// Commands processed per frame before yielding
const MAX_COMMANDS_PER_TICK: usize = 64;

// ============================================================================
// Commands
// ============================================================================

/// A request from the API layer, answered through `reply`
#[derive(Debug)]
pub enum PillarsCommand {
    Join {
        id: ParticipantId,
        name: String,
        reply: oneshot::Sender<Result<JoinReceipt, SessionError>>,
    },
    Leave {
        id: ParticipantId,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    Start {
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    Stop {
        reply: oneshot::Sender<Result<StopOutcome, SessionError>>,
    },
    Eliminate {
        id: ParticipantId,
        cause: EliminationCause,
        killer: Option<ParticipantId>,
        reply: oneshot::Sender<EliminationOutcome>,
    },
    BreakCell {
        actor: ParticipantId,
        cell: CellPos,
        reply: oneshot::Sender<Result<BreakResponse, String>>,
    },
    VoidFall {
        id: ParticipantId,
        reply: oneshot::Sender<VoidResponse>,
    },
    Reload {
        reply: oneshot::Sender<ReloadSummary>,
    },
}

/// Outcome of a `Reload` command
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReloadSummary {
    pub loot: Option<LoadReport>,
    pub loot_error: Option<String>,
    /// `Some(true)` applied now, `Some(false)` deferred to the next reset
    pub config_applied: Option<bool>,
    pub config_error: Option<String>,
}

pub type CommandSender = mpsc::UnboundedSender<PillarsCommand>;
pub type CommandReceiver = mpsc::UnboundedReceiver<PillarsCommand>;

/// Read side for the API; written once per frame
pub type SharedSnapshot = Arc<RwLock<SessionSnapshot>>;

// ============================================================================
// Bevy Resources
// ============================================================================

/// Drained by `process_commands` at the start of each frame
#[derive(Resource)]
pub struct SessionCommandReceiver {
    pub receiver: CommandReceiver,
}

#[derive(Resource)]
pub struct SnapshotResource {
    pub snapshot: SharedSnapshot,
}

/// The session behind a lock so the resource is `Sync`
#[derive(Resource)]
pub struct SessionResource(pub Mutex<Session<MemoryHost>>);

impl SessionResource {
    pub fn new(session: Session<MemoryHost>) -> Self {
        Self(Mutex::new(session))
    }
}

/// Where `Reload` re-reads from
#[derive(Resource, Debug, Clone)]
pub struct ConfigPaths {
    pub config: std::path::PathBuf,
    pub loot: std::path::PathBuf,
}

/// Last reload outcome, shared with the API's status endpoint
#[derive(Resource, Clone, Default)]
pub struct SharedReloadStatus(pub Arc<RwLock<HotReloadStatus>>);

// ============================================================================
// Bridge Creation
// ============================================================================

pub fn create_bridge() -> (CommandSender, SessionCommandReceiver, SharedSnapshot) {
    let (tx, rx) = mpsc::unbounded_channel();
    let snapshot = Arc::new(RwLock::new(SessionSnapshot::default()));

    (tx, SessionCommandReceiver { receiver: rx }, snapshot)
}

// ============================================================================
// Command Handling
// ============================================================================

/// Run one command against the session and send the reply.
///
/// A dropped reply receiver means the HTTP request went away; the command
/// still takes effect.
pub fn handle_command(
    session: &mut Session<MemoryHost>,
    paths: Option<&ConfigPaths>,
    reload_status: Option<&SharedReloadStatus>,
    cmd: PillarsCommand,
) {
    match cmd {
        PillarsCommand::Join { id, name, reply } => {
            // the in-memory host has no login flow; joining brings the actor online
            session.host_mut().connect(id);
            let result = session.join(id, name);
            let _ = reply.send(result);
        }
        PillarsCommand::Leave { id, reply } => {
            let _ = reply.send(session.leave(id));
        }
        PillarsCommand::Start { reply } => {
            let _ = reply.send(session.start_countdown());
        }
        PillarsCommand::Stop { reply } => {
            let _ = reply.send(session.stop());
        }
        PillarsCommand::Eliminate {
            id,
            cause,
            killer,
            reply,
        } => {
            let _ = reply.send(session.eliminate(id, cause, killer));
        }
        PillarsCommand::BreakCell { actor, cell, reply } => {
            let result = session.break_cell(actor, &cell).map_err(|e| e.to_string());
            let _ = reply.send(result);
        }
        PillarsCommand::VoidFall { id, reply } => {
            let _ = reply.send(session.void_fall(id));
        }
        PillarsCommand::Reload { reply } => {
            let summary = match paths {
                Some(paths) => reload(session, paths, reload_status),
                None => ReloadSummary {
                    loot_error: Some("no config paths configured".into()),
                    ..ReloadSummary::default()
                },
            };
            let _ = reply.send(summary);
        }
    }
}

fn reload(
    session: &mut Session<MemoryHost>,
    paths: &ConfigPaths,
    reload_status: Option<&SharedReloadStatus>,
) -> ReloadSummary {
    let _timing = TimingSpan::new("reload_command");
    let mut summary = ReloadSummary::default();

    let loot = session.reload_loot_file(&paths.loot);
    if let Some(status) = reload_status {
        status.0.write().record(&loot);
    }
    match loot {
        Ok(report) => summary.loot = Some(report),
        Err(e) => summary.loot_error = Some(e.to_string()),
    }

    let config = PillarsConfig::load_or_default(&paths.config)
        .and_then(|config| session.apply_config(config));
    match config {
        Ok(applied) => summary.config_applied = Some(applied),
        Err(e) => {
            warn!(error = %e, "config reload failed, keeping current config");
            summary.config_error = Some(e.to_string());
        }
    }

    info!(?summary, "reload command processed");
    summary
}

// ============================================================================
// Bevy Systems
// ============================================================================

/// Drain pending API commands (max 64 per frame)
pub fn process_commands(
    mut cmd_res: ResMut<SessionCommandReceiver>,
    session: Res<SessionResource>,
    paths: Option<Res<ConfigPaths>>,
    reload_status: Option<Res<SharedReloadStatus>>,
) {
    let mut session = session.0.lock();
    let mut processed = 0;

    while let Ok(cmd) = cmd_res.receiver.try_recv() {
        debug!(?cmd, "session command");
        handle_command(
            &mut session,
            paths.as_deref(),
            reload_status.as_deref(),
            cmd,
        );
        processed += 1;
        if processed >= MAX_COMMANDS_PER_TICK {
            break;
        }
    }
}

/// Advance the session by one tick
pub fn tick_session(session: Res<SessionResource>) {
    session.0.lock().tick();
}

/// Copy the session read model into the shared snapshot
pub fn publish_snapshot(session: Res<SessionResource>, snapshot_res: Res<SnapshotResource>) {
    let snapshot = session.0.lock().snapshot();
    *snapshot_res.snapshot.write() = snapshot;
}

/// Hand queued notices to the log; a real host would deliver them to players
pub fn relay_notices(session: Res<SessionResource>) {
    for (actor, notice) in session.0.lock().host_mut().drain_notices() {
        info!(%actor, ?notice, "notice");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pillars_core::session::{InlineOffload, SessionState};
    use pillars_core::scheduler::TickScheduler;

    fn session() -> Session<MemoryHost> {
        let mut config = PillarsConfig::default();
        config.game.min_players = 2;
        config.pillar.seed = Some(9);
        config.loot.seed = Some(9);
        Session::with_parts(
            config,
            MemoryHost::new(),
            TickScheduler::new(),
            Box::new(InlineOffload),
        )
    }

    #[tokio::test]
    async fn test_command_channel() {
        let (tx, mut rx, _) = create_bridge();

        let (reply_tx, _reply_rx) = oneshot::channel();
        tx.send(PillarsCommand::Start { reply: reply_tx }).unwrap();

        let cmd = rx.receiver.recv().await.unwrap();
        assert!(matches!(cmd, PillarsCommand::Start { .. }));
    }

    #[tokio::test]
    async fn test_join_connects_and_starts_countdown() {
        let mut session = session();

        for (id, name) in [(1, "Alex"), (2, "Blake")] {
            let (reply, rx) = oneshot::channel();
            handle_command(
                &mut session,
                None,
                None,
                PillarsCommand::Join {
                    id: ParticipantId(id),
                    name: name.into(),
                    reply,
                },
            );
            rx.await.unwrap().unwrap();
        }

        assert_eq!(session.state(), SessionState::Starting);
        assert!(session.host().actor(ParticipantId(1)).unwrap().online);
    }

    #[tokio::test]
    async fn test_start_below_minimum_is_rejected() {
        let mut session = session();
        let (reply, rx) = oneshot::channel();
        handle_command(&mut session, None, None, PillarsCommand::Start { reply });
        assert_eq!(
            rx.await.unwrap(),
            Err(SessionError::BelowMinimum { have: 0, need: 2 })
        );
    }

    #[tokio::test]
    async fn test_reload_reads_both_files() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ConfigPaths {
            config: dir.path().join("pillars.ron"),
            loot: dir.path().join("loot.ron"),
        };
        std::fs::write(
            &paths.loot,
            r#"(tables: {"standard-pillar": [(item: "BREAD", weight: 1)]})"#,
        )
        .unwrap();
        let status = SharedReloadStatus::default();

        let mut session = session();
        let (reply, rx) = oneshot::channel();
        handle_command(
            &mut session,
            Some(&paths),
            Some(&status),
            PillarsCommand::Reload { reply },
        );

        let summary = rx.await.unwrap();
        assert_eq!(summary.loot.unwrap().entries, 1);
        assert_eq!(summary.config_applied, Some(true));
        assert_eq!(status.0.read().reload_count, 1);
        assert!(status.0.read().last_reload_success);
    }

    #[tokio::test]
    async fn test_reload_missing_loot_keeps_tables() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ConfigPaths {
            config: dir.path().join("pillars.ron"),
            loot: dir.path().join("missing.ron"),
        };
        let mut session = session();
        session
            .reload_loot_str(r#"(tables: {"standard-pillar": [(item: "ARROW", weight: 1)]})"#)
            .unwrap();

        let (reply, rx) = oneshot::channel();
        handle_command(&mut session, Some(&paths), None, PillarsCommand::Reload { reply });

        let summary = rx.await.unwrap();
        assert!(summary.loot.is_none());
        assert!(summary.loot_error.is_some());
        assert!(session.loot().table("standard-pillar").is_some());
    }

    #[test]
    fn test_dropped_reply_still_applies() {
        let mut session = session();
        let (reply, rx) = oneshot::channel();
        drop(rx);
        handle_command(
            &mut session,
            None,
            None,
            PillarsCommand::Join {
                id: ParticipantId(4),
                name: "Gone".into(),
                reply,
            },
        );
        assert!(session.is_participant(ParticipantId(4)));
    }
}
