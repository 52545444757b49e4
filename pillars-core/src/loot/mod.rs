//! Weighted loot tables.
//!
//! A new tower cell asks the engine for an artifact from whichever table is
//! active at the current match time. Selection is a single uniform roll in
//! `[0, total_weight)` walked against cumulative weights, gated by a global
//! drop-chance percentage.
//!
//! Tables are loaded from RON:
//!
//! ```ron
//! (tables: {
//!     "standard-pillar": [
//!         (item: "BREAD", weight: 20, amount: "1-3"),
//!         (item: "IRON_SWORD", weight: 2, name: "Rusty Blade",
//!          modifiers: ["SHARPNESS:1"]),
//!     ],
//! })
//! ```
//!
//! Malformed entries are dropped with a warning; a table that ends up empty
//! is kept but never yields anything.

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::config::{ron_options, LootSettings};
use crate::material::{Material, ModifierLevel};

#[derive(Debug, thiserror::Error)]
pub enum LootError {
    #[error("failed to read loot file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("loot file parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),
}

// ============================================================================
// File Format
// ============================================================================

/// Loot file root: table name → entries in draw order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LootFile {
    #[serde(default)]
    pub tables: BTreeMap<String, Vec<RawLootEntry>>,
}

/// One entry as written in the file, before validation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawLootEntry {
    pub item: String,
    #[serde(default)]
    pub weight: Option<i64>,
    #[serde(default)]
    pub amount: Option<AmountDef>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub lore: Vec<String>,
    /// `"NAME:level"` strings
    #[serde(default)]
    pub modifiers: Vec<String>,
}

/// `3` or `"3"` or `"1-4"`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AmountDef {
    Count(i64),
    Text(String),
}

// ============================================================================
// Validated Tables
// ============================================================================

/// Stack size of a drawn artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Amount {
    Fixed(u32),
    /// Inclusive on both ends
    Range { min: u32, max: u32 },
}

impl Amount {
    fn resolve(&self, rng: &mut impl Rng) -> u32 {
        match *self {
            Amount::Fixed(n) => n,
            Amount::Range { min, max } => rng.gen_range(min..=max),
        }
    }
}

/// A validated table entry.
///
/// `weight` is at least 1; entries that failed validation never get here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LootEntry {
    pub item: Material,
    pub weight: u32,
    pub amount: Amount,
    pub display_name: Option<String>,
    pub lore: Vec<String>,
    pub modifiers: Vec<ModifierLevel>,
}

impl LootEntry {
    fn materialize(&self, rng: &mut impl Rng) -> Artifact {
        Artifact {
            item: self.item,
            amount: self.amount.resolve(rng),
            display_name: self.display_name.clone(),
            lore: self.lore.clone(),
            modifiers: self.modifiers.clone(),
        }
    }
}

/// Entries of one table with their precomputed weight sum.
/// Draws pick an entry with probability `weight / total_weight`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LootTable {
    pub entries: Vec<LootEntry>,
    pub total_weight: u64,
}

/// A concrete drawn item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub item: Material,
    pub amount: u32,
    pub display_name: Option<String>,
    pub lore: Vec<String>,
    pub modifiers: Vec<ModifierLevel>,
}

impl Artifact {
    pub fn simple(item: Material, amount: u32) -> Self {
        Self {
            item,
            amount,
            display_name: None,
            lore: Vec::new(),
            modifiers: Vec::new(),
        }
    }
}

/// Counts from the last load
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadReport {
    pub tables: usize,
    pub entries: usize,
    pub dropped: usize,
}

fn parse_amount(table: &str, item: &str, def: Option<&AmountDef>) -> Amount {
    let fallback = |reason: &str| {
        warn!(table, item, reason, "malformed loot amount, using 1");
        Amount::Fixed(1)
    };
    match def {
        None => Amount::Fixed(1),
        Some(AmountDef::Count(n)) => match u32::try_from(*n) {
            Ok(n) if n > 0 => Amount::Fixed(n),
            _ => fallback("count must be positive"),
        },
        Some(AmountDef::Text(text)) => {
            let text = text.trim();
            match text.split_once('-') {
                Some((lo, hi)) => match (lo.trim().parse::<u32>(), hi.trim().parse::<u32>()) {
                    (Ok(a), Ok(b)) => Amount::Range {
                        min: a.min(b),
                        max: a.max(b),
                    },
                    _ => fallback("range bounds are not integers"),
                },
                None => match text.parse::<u32>() {
                    Ok(n) if n > 0 => Amount::Fixed(n),
                    _ => fallback("not an integer"),
                },
            }
        }
    }
}

fn parse_entry(table: &str, raw: &RawLootEntry) -> Option<LootEntry> {
    let item = match raw.item.parse::<Material>() {
        Ok(item) => item,
        Err(e) => {
            warn!(table, error = %e, "dropping loot entry");
            return None;
        }
    };
    let weight = match raw.weight {
        None => {
            warn!(table, item = %item, "dropping loot entry without weight");
            return None;
        }
        Some(w) if w < 0 => {
            warn!(table, item = %item, weight = w, "dropping loot entry with negative weight");
            return None;
        }
        Some(w) => u32::try_from(w).unwrap_or(u32::MAX),
    };

    let modifiers = raw
        .modifiers
        .iter()
        .filter_map(|m| match m.parse::<ModifierLevel>() {
            Ok(m) => Some(m),
            Err(e) => {
                warn!(table, item = %item, error = %e, "ignoring loot modifier");
                None
            }
        })
        .collect();

    Some(LootEntry {
        item,
        weight,
        amount: parse_amount(table, item.name(), raw.amount.as_ref()),
        display_name: raw.name.clone(),
        lore: raw.lore.clone(),
        modifiers,
    })
}

// ============================================================================
// Engine
// ============================================================================

/// Named loot tables plus the RNG used to draw from them
#[derive(Debug)]
pub struct LootEngine {
    tables: HashMap<String, LootTable>,
    settings: LootSettings,
    rng: Xoshiro256PlusPlus,
}

impl LootEngine {
    pub fn new(settings: LootSettings) -> Self {
        let seed = settings.seed.unwrap_or_else(rand::random);
        Self {
            tables: HashMap::new(),
            settings,
            rng: Xoshiro256PlusPlus::seed_from_u64(seed),
        }
    }

    pub fn settings(&self) -> &LootSettings {
        &self.settings
    }

    /// Replace gate/switch settings; the RNG is re-seeded only when a seed is given
    pub fn set_settings(&mut self, settings: LootSettings) {
        if let Some(seed) = settings.seed {
            self.rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        }
        self.settings = settings;
    }

    /// Replace every table at once
    pub fn load(&mut self, file: &LootFile) -> LoadReport {
        let mut tables = HashMap::with_capacity(file.tables.len());
        let mut report = LoadReport::default();

        for (name, raw_entries) in &file.tables {
            let entries: Vec<LootEntry> = raw_entries
                .iter()
                .filter_map(|raw| parse_entry(name, raw))
                .collect();
            let total_weight = entries.iter().map(|e| u64::from(e.weight)).sum();

            report.entries += entries.len();
            report.dropped += raw_entries.len() - entries.len();
            info!(
                table = %name,
                entries = entries.len(),
                total_weight,
                "loaded loot table"
            );
            tables.insert(
                name.clone(),
                LootTable {
                    entries,
                    total_weight,
                },
            );
        }

        if tables.is_empty() {
            warn!("no loot tables defined");
        }
        report.tables = tables.len();
        self.tables = tables;
        report
    }

    pub fn load_str(&mut self, text: &str) -> Result<LoadReport, LootError> {
        let file: LootFile = ron_options().from_str(text)?;
        Ok(self.load(&file))
    }

    /// Parse the whole file before touching the current tables
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<LoadReport, LootError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| LootError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.load_str(&text)
    }

    pub fn table(&self, name: &str) -> Option<&LootTable> {
        self.tables.get(name)
    }

    pub fn table_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tables.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Table to draw from `elapsed` into the match
    pub fn active_table(&self, elapsed: Duration) -> &str {
        let default = self.settings.default_table.as_str();
        if !self.settings.dynamic.enabled {
            return default;
        }
        let minutes = elapsed.as_secs() / 60;
        self.settings
            .dynamic
            .switches
            .iter()
            .filter(|s| u64::from(s.minute) <= minutes)
            .last()
            .map_or(default, |s| s.table.as_str())
    }

    /// Draw one artifact from `table`, or nothing
    pub fn draw(&mut self, table: &str) -> Option<Artifact> {
        let table = self.tables.get(table)?;
        if table.entries.is_empty() || table.total_weight == 0 {
            return None;
        }

        let chance = self.settings.global_drop_chance;
        if chance < 100.0 && self.rng.gen::<f64>() * 100.0 >= chance {
            return None;
        }

        let roll = self.rng.gen_range(0..table.total_weight);
        let mut cumulative = 0u64;
        for entry in &table.entries {
            cumulative += u64::from(entry.weight);
            if roll < cumulative {
                return Some(entry.materialize(&mut self.rng));
            }
        }
        None
    }

    /// Draw from whichever table is active `elapsed` into the match
    pub fn draw_active(&mut self, elapsed: Duration) -> Option<Artifact> {
        let table = self.active_table(elapsed).to_string();
        self.draw(&table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DynamicLoot, TableSwitch};
    use crate::material::Modifier;

    fn settings(seed: u64) -> LootSettings {
        LootSettings {
            seed: Some(seed),
            ..LootSettings::default()
        }
    }

    fn engine_with(text: &str) -> LootEngine {
        let mut engine = LootEngine::new(settings(7));
        engine.load_str(text).unwrap();
        engine
    }

    #[test]
    fn test_unknown_table_draws_nothing() {
        let mut engine = engine_with("(tables: {})");
        assert!(engine.draw("standard-pillar").is_none());
    }

    #[test]
    fn test_zero_weight_table_never_yields() {
        let mut engine = engine_with(r#"(tables: {"standard": [(item: "BREAD", weight: 0)]})"#);
        assert_eq!(engine.table("standard").unwrap().entries.len(), 1);
        for _ in 0..200 {
            assert!(engine.draw("standard").is_none());
        }
    }

    #[test]
    fn test_empty_table_retained() {
        let mut engine =
            engine_with(r#"(tables: {"junk": [(item: "NOT_A_THING", weight: 5)]})"#);
        assert!(engine.table("junk").is_some());
        assert!(engine.draw("junk").is_none());
    }

    #[test]
    fn test_malformed_entries_dropped() {
        let mut engine = LootEngine::new(settings(1));
        let report = engine
            .load_str(
                r#"(tables: {"t": [
                    (item: "BREAD", weight: 3),
                    (item: "UNOBTAINIUM", weight: 3),
                    (item: "APPLE"),
                    (item: "EGG", weight: -2),
                ]})"#,
            )
            .unwrap();
        assert_eq!(report.tables, 1);
        assert_eq!(report.entries, 1);
        assert_eq!(report.dropped, 3);
        assert_eq!(engine.table("t").unwrap().total_weight, 3);
    }

    #[test]
    fn test_single_entry_always_drawn() {
        let mut engine = engine_with(
            r#"(tables: {"t": [(item: "IRON_SWORD", weight: 1, name: Some("Blade"),
                lore: ["old"], modifiers: ["SHARPNESS:2", "BOGUS:1"])]})"#,
        );
        let artifact = engine.draw("t").unwrap();
        assert_eq!(artifact.item, Material::IronSword);
        assert_eq!(artifact.amount, 1);
        assert_eq!(artifact.display_name.as_deref(), Some("Blade"));
        assert_eq!(artifact.lore, vec!["old".to_string()]);
        assert_eq!(artifact.modifiers.len(), 1);
        assert_eq!(artifact.modifiers[0].modifier, Modifier::Sharpness);
        assert_eq!(artifact.modifiers[0].level, 2);
    }

    #[test]
    fn test_amount_forms() {
        assert_eq!(parse_amount("t", "x", None), Amount::Fixed(1));
        assert_eq!(
            parse_amount("t", "x", Some(&AmountDef::Count(4))),
            Amount::Fixed(4)
        );
        assert_eq!(
            parse_amount("t", "x", Some(&AmountDef::Text("3".into()))),
            Amount::Fixed(3)
        );
        assert_eq!(
            parse_amount("t", "x", Some(&AmountDef::Text("2-5".into()))),
            Amount::Range { min: 2, max: 5 }
        );
        assert_eq!(
            parse_amount("t", "x", Some(&AmountDef::Text("5-2".into()))),
            Amount::Range { min: 2, max: 5 }
        );
        assert_eq!(
            parse_amount("t", "x", Some(&AmountDef::Text("lots".into()))),
            Amount::Fixed(1)
        );
        assert_eq!(
            parse_amount("t", "x", Some(&AmountDef::Count(0))),
            Amount::Fixed(1)
        );
    }

    #[test]
    fn test_range_amount_within_bounds() {
        let mut engine =
            engine_with(r#"(tables: {"t": [(item: "ARROW", weight: 1, amount: "4-8")]})"#);
        for _ in 0..100 {
            let amount = engine.draw("t").unwrap().amount;
            assert!((4..=8).contains(&amount));
        }
    }

    #[test]
    fn test_zero_drop_chance_gate() {
        let mut engine = LootEngine::new(LootSettings {
            global_drop_chance: 0.0,
            seed: Some(3),
            ..LootSettings::default()
        });
        engine
            .load_str(r#"(tables: {"t": [(item: "BREAD", weight: 1)]})"#)
            .unwrap();
        for _ in 0..100 {
            assert!(engine.draw("t").is_none());
        }
    }

    #[test]
    fn test_partial_drop_chance_gate() {
        let mut engine = LootEngine::new(LootSettings {
            global_drop_chance: 50.0,
            seed: Some(11),
            ..LootSettings::default()
        });
        engine
            .load_str(r#"(tables: {"t": [(item: "BREAD", weight: 1)]})"#)
            .unwrap();
        let hits = (0..4000).filter(|_| engine.draw("t").is_some()).count();
        assert!((1700..2300).contains(&hits), "hits = {hits}");
    }

    #[test]
    fn test_active_table_static() {
        let engine = LootEngine::new(settings(1));
        assert_eq!(
            engine.active_table(Duration::from_secs(3600)),
            "standard-pillar"
        );
    }

    #[test]
    fn test_active_table_dynamic_last_match_wins() {
        let engine = LootEngine::new(LootSettings {
            dynamic: DynamicLoot {
                enabled: true,
                switches: vec![
                    TableSwitch {
                        minute: 5,
                        table: "mid".into(),
                    },
                    TableSwitch {
                        minute: 10,
                        table: "late".into(),
                    },
                ],
            },
            ..settings(1)
        });
        assert_eq!(engine.active_table(Duration::from_secs(0)), "standard-pillar");
        assert_eq!(engine.active_table(Duration::from_secs(299)), "standard-pillar");
        assert_eq!(engine.active_table(Duration::from_secs(300)), "mid");
        assert_eq!(engine.active_table(Duration::from_secs(601)), "late");
    }

    #[test]
    fn test_load_replaces_tables() {
        let mut engine = engine_with(r#"(tables: {"a": [(item: "BREAD", weight: 1)]})"#);
        engine
            .load_str(r#"(tables: {"b": [(item: "APPLE", weight: 1)]})"#)
            .unwrap();
        assert!(engine.table("a").is_none());
        assert_eq!(engine.table_names(), vec!["b"]);
    }

    #[test]
    fn test_parse_error_keeps_old_tables() {
        let mut engine = engine_with(r#"(tables: {"a": [(item: "BREAD", weight: 1)]})"#);
        assert!(matches!(
            engine.load_str("(tables: {"),
            Err(LootError::Parse(_))
        ));
        assert!(engine.table("a").is_some());
    }

    #[test]
    fn test_same_seed_same_draws() {
        let text = r#"(tables: {"t": [
            (item: "BREAD", weight: 1), (item: "APPLE", weight: 1), (item: "EGG", weight: 1),
        ]})"#;
        let mut a = engine_with(text);
        let mut b = engine_with(text);
        for _ in 0..50 {
            assert_eq!(a.draw("t"), b.draw("t"));
        }
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("loot.ron");
        std::fs::write(&path, r#"(tables: {"t": [(item: "BREAD", weight: 2)]})"#).unwrap();
        let mut engine = LootEngine::new(settings(1));
        let report = engine.load_file(&path).unwrap();
        assert_eq!(report.entries, 1);

        let missing = engine.load_file(dir.path().join("nope.ron"));
        assert!(matches!(missing, Err(LootError::Io { .. })));
    }
}
