//! Session configuration loaded from RON.
//!
//! Every field is optional in the file; omitted values fall back to the
//! defaults in [`crate::constants`]. A config only reaches the session after
//! [`PillarsConfig::validate`] accepts it.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::constants::*;
use crate::geometry::WorldId;

/// Failure to load or validate a config file
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("config parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Root of `pillars.ron`. Every section falls back to its defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PillarsConfig {
    pub game: GameConfig,
    pub arena: ArenaConfig,
    pub pillar: PillarConfig,
    pub freeze: FreezeConfig,
    pub loot: LootSettings,
}

/// Roster limits and match timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub min_players: usize,
    pub max_players: usize,
    pub countdown_secs: u32,
    /// 0 disables the match timer
    pub duration_minutes: u32,
    pub end_delay_ticks: u64,
    /// -1 = spectate immediately, 0 = lethal, n = n seconds to be rescued
    pub void_grace_secs: i32,
    pub ticks_per_second: u32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            min_players: DEFAULT_MIN_PLAYERS,
            max_players: DEFAULT_MAX_PLAYERS,
            countdown_secs: DEFAULT_COUNTDOWN_SECS,
            duration_minutes: DEFAULT_MATCH_MINUTES,
            end_delay_ticks: DEFAULT_END_DELAY_TICKS,
            void_grace_secs: DEFAULT_VOID_GRACE_SECS,
            ticks_per_second: DEFAULT_TICKS_PER_SECOND,
        }
    }
}

/// What a fall into the void does to a participant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoidPolicy {
    /// Straight to spectator
    Spectate,
    /// Let the host kill the participant normally
    Lethal,
    /// Rescue back to spawn after this many ticks
    Grace { ticks: u64 },
}

impl GameConfig {
    /// Match length in ticks, `None` when the timer is off
    pub fn match_duration_ticks(&self) -> Option<u64> {
        (self.duration_minutes > 0)
            .then(|| u64::from(self.duration_minutes) * 60 * u64::from(self.ticks_per_second))
    }

    /// How `void_grace_secs` is interpreted
    pub fn void_policy(&self) -> VoidPolicy {
        match self.void_grace_secs {
            s if s < 0 => VoidPolicy::Spectate,
            0 => VoidPolicy::Lethal,
            s => VoidPolicy::Grace {
                ticks: s as u64 * u64::from(self.ticks_per_second),
            },
        }
    }
}

/// Where the tower circle is centred
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaConfig {
    pub world: WorldId,
    pub center_x: f64,
    pub center_z: f64,
}

/// Tower shape, growth cadence and palette seed.
///
/// `spacing` is the arc distance between neighbouring bases; the circle
/// radius never drops below it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PillarConfig {
    pub spacing: f64,
    pub start_y: i32,
    pub initial_height: u32,
    pub max_height: u32,
    pub generation_interval_ticks: u64,
    pub blocks_per_interval: u32,
    /// Hand out the artifact attached to a broken cell
    pub drop_items: bool,
    /// Seed for the palette RNG; entropy when absent
    pub seed: Option<u64>,
}

impl Default for PillarConfig {
    fn default() -> Self {
        Self {
            spacing: DEFAULT_PILLAR_SPACING,
            start_y: DEFAULT_PILLAR_START_Y,
            initial_height: DEFAULT_INITIAL_HEIGHT,
            max_height: DEFAULT_MAX_HEIGHT,
            generation_interval_ticks: DEFAULT_GENERATION_INTERVAL_TICKS,
            blocks_per_interval: DEFAULT_BLOCKS_PER_INTERVAL,
            drop_items: true,
            seed: None,
        }
    }
}

/// Movement lock applied to participants during the countdown
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FreezeConfig {
    pub enabled: bool,
    /// Snap back to spawn instead of cancelling the move
    pub strict_mode: bool,
    pub allow_look: bool,
}

impl Default for FreezeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            strict_mode: true,
            allow_look: true,
        }
    }
}

/// Drop chance and table selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LootSettings {
    /// Percentage (0-100) that a new cell carries loot
    pub global_drop_chance: f64,
    pub default_table: String,
    pub dynamic: DynamicLoot,
    pub seed: Option<u64>,
}

impl Default for LootSettings {
    fn default() -> Self {
        Self {
            global_drop_chance: DEFAULT_GLOBAL_DROP_CHANCE,
            default_table: DEFAULT_LOOT_TABLE.to_string(),
            dynamic: DynamicLoot::default(),
            seed: None,
        }
    }
}

/// Time-based table switching. Switches are checked in file order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DynamicLoot {
    pub enabled: bool,
    pub switches: Vec<TableSwitch>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSwitch {
    /// Whole match minutes after which `table` becomes active
    pub minute: u32,
    pub table: String,
}

/// RON reader shared by config and loot files; optional fields may omit `Some(..)`
pub(crate) fn ron_options() -> ron::Options {
    ron::Options::default().with_default_extension(ron::extensions::Extensions::IMPLICIT_SOME)
}

impl PillarsConfig {
    pub fn from_ron_str(text: &str) -> Result<Self, ConfigError> {
        let config: PillarsConfig = ron_options().from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_ron_str(&text)
    }

    /// Load from `path`, or defaults when the file does not exist
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            tracing::info!(path = %path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    pub fn to_ron_string(&self) -> String {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default()).unwrap_or_default()
    }

    /// Reject values the session cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let game = &self.game;
        if game.min_players < 1 {
            return Err(ConfigError::Invalid("game.min_players must be at least 1".into()));
        }
        if game.max_players < game.min_players {
            return Err(ConfigError::Invalid(format!(
                "game.max_players ({}) is below game.min_players ({})",
                game.max_players, game.min_players
            )));
        }
        if game.ticks_per_second == 0 {
            return Err(ConfigError::Invalid("game.ticks_per_second must be positive".into()));
        }

        let pillar = &self.pillar;
        if pillar.generation_interval_ticks == 0 {
            return Err(ConfigError::Invalid(
                "pillar.generation_interval_ticks must be positive".into(),
            ));
        }
        if pillar.initial_height < 1 {
            return Err(ConfigError::Invalid("pillar.initial_height must be at least 1".into()));
        }
        if pillar.max_height < pillar.initial_height {
            return Err(ConfigError::Invalid(format!(
                "pillar.max_height ({}) is below pillar.initial_height ({})",
                pillar.max_height, pillar.initial_height
            )));
        }
        if !(pillar.spacing.is_finite() && pillar.spacing > 0.0) {
            return Err(ConfigError::Invalid("pillar.spacing must be positive".into()));
        }

        let chance = self.loot.global_drop_chance;
        if !(0.0..=100.0).contains(&chance) {
            return Err(ConfigError::Invalid(format!(
                "loot.global_drop_chance ({chance}) must be within 0-100"
            )));
        }
        Ok(())
    }
}
