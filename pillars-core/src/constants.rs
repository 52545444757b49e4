//! Centralized defaults for the pillars session core.
//!
//! Every configurable value falls back to one of these when the config file
//! omits it. Values that are not configurable (palette, command budgets) live
//! next to the code that uses them.

// =====================================================
// Roster & Lifecycle
// =====================================================

/// Participants required before the countdown starts automatically
pub const DEFAULT_MIN_PLAYERS: usize = 2;

/// Hard roster cap
pub const DEFAULT_MAX_PLAYERS: usize = 16;

/// Countdown length in seconds (one countdown firing per second)
pub const DEFAULT_COUNTDOWN_SECS: u32 = 10;

/// Match length in minutes; 0 disables the match timer
pub const DEFAULT_MATCH_MINUTES: u32 = 15;

/// Delay between `Ending` and the reset (5 s at 20 tps)
pub const DEFAULT_END_DELAY_TICKS: u64 = 100;

/// Host tick rate
pub const DEFAULT_TICKS_PER_SECOND: u32 = 20;

/// Countdown seconds that additionally show a title notice
pub const COUNTDOWN_TITLE_SECS: u32 = 5;

// =====================================================
// Void Handling
// =====================================================

/// Seconds a falling participant has before the rescue teleport.
/// `-1` turns a fall straight into spectating, `0` makes it lethal.
pub const DEFAULT_VOID_GRACE_SECS: i32 = 3;

// =====================================================
// Towers
// =====================================================

/// Minimum distance between neighbouring towers (also the minimum radius)
pub const DEFAULT_PILLAR_SPACING: f64 = 10.0;

/// Y of the bottom cell of every tower
pub const DEFAULT_PILLAR_START_Y: i32 = 64;

/// Cells in a freshly built tower
pub const DEFAULT_INITIAL_HEIGHT: u32 = 5;

/// Tower height cap
pub const DEFAULT_MAX_HEIGHT: u32 = 50;

/// Ticks between growth cycles (2 s at 20 tps)
pub const DEFAULT_GENERATION_INTERVAL_TICKS: u64 = 40;

/// Cells added to each tower per growth cycle
pub const DEFAULT_BLOCKS_PER_INTERVAL: u32 = 1;

// =====================================================
// Loot
// =====================================================

/// Table used when dynamic switching is off or no switch has triggered yet
pub const DEFAULT_LOOT_TABLE: &str = "standard-pillar";

/// Percentage chance that a new cell carries loot at all
pub const DEFAULT_GLOBAL_DROP_CHANCE: f64 = 100.0;

// =====================================================
// Files
// =====================================================

pub const DEFAULT_CONFIG_PATH: &str = "config/pillars.ron";
pub const DEFAULT_LOOT_PATH: &str = "config/loot.ron";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grace_and_end_delay_positive() {
        assert!(DEFAULT_VOID_GRACE_SECS > 0);
        assert!(DEFAULT_END_DELAY_TICKS > 0);
    }

    #[test]
    fn test_tower_defaults_consistent() {
        assert!(DEFAULT_INITIAL_HEIGHT >= 1);
        assert!(DEFAULT_MAX_HEIGHT >= DEFAULT_INITIAL_HEIGHT);
        assert!(DEFAULT_MIN_PLAYERS <= DEFAULT_MAX_PLAYERS);
    }
}
