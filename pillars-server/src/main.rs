use bevy::app::ScheduleRunnerPlugin;
use bevy::prelude::*;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn};

use pillars_core::config::PillarsConfig;
use pillars_core::constants::{DEFAULT_CONFIG_PATH, DEFAULT_LOOT_PATH};
use pillars_core::host::MemoryHost;
use pillars_core::logging::{self, LogLevel, TracingConfig};
use pillars_core::session::Session;

use pillars_server::api::{self, ApiState};
use pillars_server::bridge::{self, ConfigPaths, SessionResource, SharedReloadStatus};
use pillars_server::PillarsPlugin;

fn main() -> anyhow::Result<()> {
    // PILLARS_LOG_VERBOSE turns on per-cell detail, PILLARS_LOG_LEVEL sets
    // the base level. RUST_LOG overrides both.
    let verbose = std::env::var("PILLARS_LOG_VERBOSE")
        .is_ok_and(|v| v == "1" || v.eq_ignore_ascii_case("true"));
    let tracing_config = if verbose {
        TracingConfig::verbose()
    } else {
        TracingConfig::default()
    }
    .with_filter("pillars_server", LogLevel::Info);
    let level = std::env::var("PILLARS_LOG_LEVEL").ok();
    match tracing_config.clone().with_level_override(level.as_deref()) {
        Ok(config) => logging::init_tracing(&config),
        Err(e) => {
            logging::init_tracing(&tracing_config);
            warn!(error = %e, "ignoring PILLARS_LOG_LEVEL");
        }
    }

    info!("Starting Pillars server...");

    // ========================================================================
    // 1. Load config and loot tables
    // ========================================================================
    let paths = ConfigPaths {
        config: std::env::var("PILLARS_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH)),
        loot: std::env::var("PILLARS_LOOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_LOOT_PATH)),
    };

    let config = PillarsConfig::load_or_default(&paths.config)?;
    let tps = config.game.ticks_per_second.max(1);

    let mut session = Session::new(config, MemoryHost::new());
    let reload_status = SharedReloadStatus::default();
    let loaded = session.reload_loot_file(&paths.loot);
    reload_status.0.write().record(&loaded);

    // ========================================================================
    // 2. Create the API ↔ Bevy bridge
    // ========================================================================
    let (cmd_sender, cmd_receiver, snapshot) = bridge::create_bridge();

    // ========================================================================
    // 3. Spawn the HTTP API on a separate tokio runtime
    // ========================================================================
    let api_state = ApiState {
        commands: cmd_sender,
        snapshot: snapshot.clone(),
        reload_status: reload_status.clone(),
    };
    let port: u16 = std::env::var("API_PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(8080);

    let runtime = tokio::runtime::Runtime::new()?;
    std::thread::spawn(move || {
        runtime.block_on(async {
            if let Err(e) = api::start_api_server(api_state, port).await {
                error!("API server error: {}", e);
            }
        });
    });

    // ========================================================================
    // 4. Run the headless Bevy app at the session tick rate
    // ========================================================================
    let exit = App::new()
        .add_plugins(MinimalPlugins.set(ScheduleRunnerPlugin::run_loop(
            Duration::from_secs_f64(1.0 / f64::from(tps)),
        )))
        .add_plugins(PillarsPlugin::new(
            SessionResource::new(session),
            cmd_receiver,
            snapshot,
            reload_status,
            paths,
        ))
        .run();

    info!(?exit, "Pillars server stopped");
    Ok(())
}
