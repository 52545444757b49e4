//! Bevy wiring for the session
//!
//! The session is ticked once per Bevy frame; the frame rate is set from
//! `ticks_per_second` by `main`.

use bevy::prelude::*;
use parking_lot::Mutex;
use std::path::Path;
use tracing::{info, warn};

use pillars_core::hotreload::LootWatcher;

use crate::bridge::{
    self, ConfigPaths, SessionCommandReceiver, SessionResource, SharedReloadStatus,
    SharedSnapshot, SnapshotResource,
};

/// Watches the loot file and reloads it between ticks
#[derive(Resource)]
pub struct LootWatcherResource(pub Mutex<LootWatcher>);

/// Uptime counter, reported in the logs every minute of ticks
#[derive(Resource, Default, Debug)]
pub struct ServerUptime {
    pub ticks: u64,
}

/// Everything the session needs inside the Bevy world.
///
/// Fields are taken once when the plugin is built.
pub struct PillarsPlugin {
    session: Mutex<Option<SessionResource>>,
    receiver: Mutex<Option<SessionCommandReceiver>>,
    snapshot: SharedSnapshot,
    reload_status: SharedReloadStatus,
    paths: ConfigPaths,
    hot_reload: bool,
}

impl PillarsPlugin {
    pub fn new(
        session: SessionResource,
        receiver: SessionCommandReceiver,
        snapshot: SharedSnapshot,
        reload_status: SharedReloadStatus,
        paths: ConfigPaths,
    ) -> Self {
        Self {
            session: Mutex::new(Some(session)),
            receiver: Mutex::new(Some(receiver)),
            snapshot,
            reload_status,
            paths,
            hot_reload: true,
        }
    }

    pub fn without_hot_reload(mut self) -> Self {
        self.hot_reload = false;
        self
    }
}

impl Plugin for PillarsPlugin {
    fn build(&self, app: &mut App) {
        if let Some(session) = self.session.lock().take() {
            app.insert_resource(session);
        }
        if let Some(receiver) = self.receiver.lock().take() {
            app.insert_resource(receiver);
        }

        app.insert_resource(SnapshotResource {
            snapshot: self.snapshot.clone(),
        })
        .insert_resource(self.reload_status.clone())
        .insert_resource(self.paths.clone())
        .init_resource::<ServerUptime>();

        if self.hot_reload {
            match LootWatcher::new(&self.paths.loot) {
                Ok(watcher) => {
                    self.reload_status.0.write().enabled = true;
                    self.reload_status.0.write().watched_file =
                        Some(self.paths.loot.display().to_string());
                    app.insert_resource(LootWatcherResource(Mutex::new(watcher)));
                }
                Err(e) => warn!(error = %e, "loot hot-reload disabled"),
            }
        }

        app.add_systems(
            Update,
            (
                bridge::process_commands,
                reload_loot_on_change,
                bridge::tick_session,
                bridge::relay_notices,
                bridge::publish_snapshot,
                count_uptime,
            )
                .chain(),
        );
    }
}

/// Reload the loot tables when the watched file changed
pub fn reload_loot_on_change(
    watcher: Option<Res<LootWatcherResource>>,
    session: Res<SessionResource>,
    reload_status: Res<SharedReloadStatus>,
) {
    let Some(watcher) = watcher else {
        return;
    };
    let mut watcher = watcher.0.lock();
    if !watcher.poll() {
        return;
    }

    reload_loot_into(&session, watcher.path(), &reload_status);
}

/// Reload the loot file and fold the result into the shared status, which
/// the reload command also records into.
pub fn reload_loot_into(session: &SessionResource, path: &Path, status: &SharedReloadStatus) {
    let result = session.0.lock().reload_loot_file(path);
    status.0.write().record(&result);
}

fn count_uptime(mut uptime: ResMut<ServerUptime>, session: Res<SessionResource>) {
    uptime.ticks += 1;
    let tps = u64::from(session.0.lock().config().game.ticks_per_second).max(1);
    if uptime.ticks % (tps * 60) == 0 {
        let snapshot = session.0.lock().snapshot();
        info!(
            minutes = uptime.ticks / (tps * 60),
            state = %snapshot.label,
            players = snapshot.players,
            "server uptime"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pillars_core::config::PillarsConfig;
    use pillars_core::host::MemoryHost;
    use pillars_core::scheduler::TickScheduler;
    use pillars_core::session::{InlineOffload, ParticipantId, Session, SessionState};
    use tokio::sync::oneshot;

    fn app() -> (App, bridge::CommandSender, SharedSnapshot) {
        let mut config = PillarsConfig::default();
        config.game.min_players = 2;
        config.game.countdown_secs = 1;
        config.pillar.seed = Some(3);
        config.loot.seed = Some(3);
        let session = Session::with_parts(
            config,
            MemoryHost::new(),
            TickScheduler::new(),
            Box::new(InlineOffload),
        );
        let (tx, rx, snapshot) = bridge::create_bridge();
        let dir = std::env::temp_dir();
        let plugin = PillarsPlugin::new(
            SessionResource::new(session),
            rx,
            snapshot.clone(),
            SharedReloadStatus::default(),
            ConfigPaths {
                config: dir.join("pillars-plugin-test.ron"),
                loot: dir.join("pillars-plugin-test-loot.ron"),
            },
        )
        .without_hot_reload();

        let mut app = App::new();
        app.add_plugins(plugin);
        (app, tx, snapshot)
    }

    #[test]
    fn test_commands_drive_session_through_frames() {
        let (mut app, tx, snapshot) = app();

        for id in [1, 2] {
            let (reply, _rx) = oneshot::channel();
            tx.send(bridge::PillarsCommand::Join {
                id: ParticipantId(id),
                name: format!("p{id}"),
                reply,
            })
            .unwrap();
        }

        app.update();
        assert_eq!(snapshot.read().state, SessionState::Starting);
        assert_eq!(snapshot.read().players, 2);

        for _ in 0..20 {
            app.update();
        }
        assert_eq!(snapshot.read().state, SessionState::Active);
        assert_eq!(app.world().resource::<ServerUptime>().ticks, 21);
    }

    #[test]
    fn test_watcher_reload_accumulates_with_manual_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let loot = dir.path().join("loot.ron");
        std::fs::write(
            &loot,
            r#"(tables: {"standard-pillar": [(item: "BREAD", weight: 1)]})"#,
        )
        .unwrap();

        let session = SessionResource::new(Session::with_parts(
            PillarsConfig::default(),
            MemoryHost::new(),
            TickScheduler::new(),
            Box::new(InlineOffload),
        ));
        let status = SharedReloadStatus::default();
        {
            let mut shared = status.0.write();
            shared.enabled = true;
            shared.watched_file = Some(loot.display().to_string());
            // one reload already came in through the API
            shared.reload_count = 1;
        }

        reload_loot_into(&session, &loot, &status);
        assert_eq!(status.0.read().reload_count, 2);
        assert!(status.0.read().enabled);
        assert!(status.0.read().last_reload_success);

        reload_loot_into(&session, &dir.path().join("gone.ron"), &status);
        let shared = status.0.read();
        assert_eq!(shared.reload_count, 2);
        assert!(!shared.last_reload_success);
        assert!(shared.last_error.is_some());
        assert_eq!(shared.watched_file, Some(loot.display().to_string()));
    }

    #[test]
    fn test_hot_reload_disabled_inserts_no_watcher() {
        let (app, _tx, _snapshot) = app();
        assert!(app.world().get_resource::<LootWatcherResource>().is_none());
        assert!(app.world().get_resource::<SessionResource>().is_some());
    }
}
