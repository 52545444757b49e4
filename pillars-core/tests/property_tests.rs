//! Property-based tests using proptest
//!
//! Invariants that must hold for ALL inputs:
//! - Session: every state change follows the lifecycle edge list
//! - Structures: index and tower cell sets agree after any grow/break sequence
//! - Structures: clear_all is idempotent and leaves nothing behind
//! - Loot: weighted selection frequency matches the weights

use parking_lot::Mutex;
use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;

use pillars_core::config::{LootSettings, PillarConfig, PillarsConfig};
use pillars_core::events::{EliminationCause, EventBus, SessionStateChanged};
use pillars_core::geometry::{CellPos, WorldId};
use pillars_core::host::MemoryHost;
use pillars_core::loot::LootEngine;
use pillars_core::material::Material;
use pillars_core::scheduler::TickScheduler;
use pillars_core::session::{InlineOffload, ParticipantId, Session, SessionState};
use pillars_core::structure::{GrowthContext, StructureGenerator};

const WEIGHTED: &str = r#"(tables: {"standard-pillar": [
    (item: "BREAD", weight: 1),
    (item: "ARROW", weight: 1),
    (item: "GOLDEN_APPLE", weight: 2),
]})"#;

// ============================================================
// Session Lifecycle Properties
// ============================================================

#[derive(Debug, Clone)]
enum Op {
    Join(u64),
    Leave(u64),
    Disconnect(u64),
    Tick(u16),
    Eliminate(u64, Option<u64>),
    Break(u64, u64, i32),
    Void(u64),
    Stop,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (1u64..6).prop_map(Op::Join),
        1 => (1u64..6).prop_map(Op::Leave),
        1 => (1u64..6).prop_map(Op::Disconnect),
        4 => (1u16..80).prop_map(Op::Tick),
        2 => ((1u64..6), proptest::option::of(1u64..6)).prop_map(|(v, k)| Op::Eliminate(v, k)),
        2 => ((1u64..6), (1u64..6), (0i32..8)).prop_map(|(a, o, h)| Op::Break(a, o, h)),
        1 => (1u64..6).prop_map(Op::Void),
        1 => Just(Op::Stop),
    ]
}

fn lifecycle_session() -> Session<MemoryHost> {
    let mut config = PillarsConfig::default();
    config.game.min_players = 2;
    config.game.max_players = 4;
    config.game.countdown_secs = 2;
    config.game.end_delay_ticks = 20;
    config.game.void_grace_secs = 1;
    config.pillar.generation_interval_ticks = 5;
    config.pillar.seed = Some(3);
    config.loot.seed = Some(3);

    let mut host = MemoryHost::new();
    for id in 1..6 {
        host.connect(ParticipantId(id));
    }
    let mut session =
        Session::with_parts(config, host, TickScheduler::new(), Box::new(InlineOffload));
    session.reload_loot_str(WEIGHTED).unwrap();
    session
}

fn apply(session: &mut Session<MemoryHost>, op: &Op) {
    match *op {
        Op::Join(id) => {
            let _ = session.join(ParticipantId(id), format!("p{id}"));
        }
        Op::Leave(id) => {
            let _ = session.leave(ParticipantId(id));
        }
        Op::Disconnect(id) => session.disconnect(ParticipantId(id)),
        Op::Tick(n) => {
            for _ in 0..n {
                session.tick();
            }
        }
        Op::Eliminate(victim, killer) => {
            session.eliminate(
                ParticipantId(victim),
                EliminationCause::Killed,
                killer.map(ParticipantId),
            );
        }
        Op::Break(actor, owner, height) => {
            let cell = session
                .structures()
                .tower(ParticipantId(owner))
                .map(|t| t.base.offset(0, height, 0))
                .unwrap_or_else(|| CellPos::new(WorldId(0), 0, 0, 0));
            let _ = session.break_cell(ParticipantId(actor), &cell);
        }
        Op::Void(id) => {
            session.void_fall(ParticipantId(id));
        }
        Op::Stop => {
            let _ = session.stop();
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn prop_state_changes_follow_edge_list(ops in prop::collection::vec(op(), 1..60)) {
        let mut session = lifecycle_session();
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = log.clone();
        session
            .events_mut()
            .subscribe(move |e: &mut SessionStateChanged| sink.lock().push((e.previous, e.new)));

        for op in &ops {
            apply(&mut session, op);
            prop_assert!(session.structures().verify_consistency().is_ok());
            prop_assert!(session.alive_count() <= session.roster_size());
            prop_assert!(session.roster_size() <= 4);
        }

        let mut current = SessionState::Lobby;
        for (previous, next) in log.lock().iter() {
            prop_assert_eq!(*previous, current);
            prop_assert!(previous.can_transition_to(*next), "{} -> {}", previous, next);
            current = *next;
        }
        prop_assert_eq!(current, session.state());
    }

    #[test]
    fn prop_lobby_has_no_towers(ops in prop::collection::vec(op(), 1..40)) {
        let mut session = lifecycle_session();
        for op in &ops {
            apply(&mut session, op);
            if session.state() == SessionState::Lobby {
                prop_assert_eq!(session.structures().tracked_cells(), 0);
                prop_assert_eq!(session.spectators().count(), 0);
            }
        }
    }
}

// ============================================================
// Structure Properties
// ============================================================

#[derive(Debug, Clone)]
enum TowerOp {
    Grow(u64),
    Break(u64, u64, i32),
    Rebuild(u64, i32),
}

fn tower_op() -> impl Strategy<Value = TowerOp> {
    prop_oneof![
        3 => (0u64..3).prop_map(TowerOp::Grow),
        3 => ((0u64..3), (0u64..3), (0i32..12)).prop_map(|(a, o, h)| TowerOp::Break(a, o, h)),
        1 => ((0u64..3), (-30i32..30)).prop_map(|(p, x)| TowerOp::Rebuild(p, x)),
    ]
}

fn towers() -> (StructureGenerator, MemoryHost, LootEngine) {
    let mut host = MemoryHost::new();
    let mut gen = StructureGenerator::new(PillarConfig {
        seed: Some(11),
        max_height: 10,
        blocks_per_interval: 2,
        ..PillarConfig::default()
    });
    for p in 0..3u64 {
        host.connect(ParticipantId(p));
        gen.generate_initial_tower(
            &mut host,
            ParticipantId(p),
            CellPos::new(WorldId(0), p as i32 * 100, 64, 0),
        ).unwrap();
    }
    let mut loot = LootEngine::new(LootSettings {
        seed: Some(11),
        global_drop_chance: 50.0,
        ..LootSettings::default()
    });
    loot.load_str(WEIGHTED).unwrap();
    (gen, host, loot)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_index_matches_towers(ops in prop::collection::vec(tower_op(), 1..80)) {
        let (mut gen, mut host, mut loot) = towers();
        let mut bus = EventBus::new();

        for op in &ops {
            match *op {
                TowerOp::Grow(p) => {
                    let mut ctx = GrowthContext {
                        host: &mut host,
                        events: &mut bus,
                        loot: &mut loot,
                        elapsed: Duration::ZERO,
                    };
                    gen.grow_tower(ParticipantId(p), &mut ctx);
                }
                TowerOp::Break(actor, owner, h) => {
                    let Some(base) = gen.tower(ParticipantId(owner)).map(|t| t.base) else {
                        continue;
                    };
                    let cell = base.offset(0, h, 0);
                    let was_tracked = gen.is_tracked(&cell);
                    gen.handle_cell_break(ParticipantId(actor), &cell, &mut bus).unwrap();
                    prop_assert!(!gen.is_tracked(&cell));
                    if was_tracked {
                        prop_assert!(!gen.tower(ParticipantId(owner)).unwrap().contains(&cell));
                    }
                }
                TowerOp::Rebuild(p, x) => {
                    gen.generate_initial_tower(
                        &mut host,
                        ParticipantId(p),
                        CellPos::new(WorldId(0), x, 200 + p as i32 * 20, 0),
                    ).unwrap();
                }
            }
            prop_assert!(gen.verify_consistency().is_ok());
            for tower in gen.towers() {
                prop_assert!(tower.height <= 10);
            }
        }
    }

    #[test]
    fn prop_clear_all_idempotent(grows in prop::collection::vec(0u64..3, 0..30)) {
        let (mut gen, mut host, mut loot) = towers();
        let mut bus = EventBus::new();
        for p in grows {
            let mut ctx = GrowthContext {
                host: &mut host,
                events: &mut bus,
                loot: &mut loot,
                elapsed: Duration::ZERO,
            };
            gen.grow_tower(ParticipantId(p), &mut ctx);
        }
        gen.clear_all(&mut host);
        gen.clear_all(&mut host);
        prop_assert_eq!(gen.tracked_cells(), 0);
        prop_assert_eq!(host.occupied_cells(), 0);
        prop_assert_eq!(gen.towers().count(), 0);
        prop_assert!(gen.verify_consistency().is_ok());
    }
}

// ============================================================
// Loot Properties
// ============================================================

fn heavy_share(seed: u64, draws: usize) -> f64 {
    let mut loot = LootEngine::new(LootSettings {
        seed: Some(seed),
        ..LootSettings::default()
    });
    loot.load_str(WEIGHTED).unwrap();
    let heavy = (0..draws)
        .filter_map(|_| loot.draw("standard-pillar"))
        .filter(|a| a.item == Material::GoldenApple)
        .count();
    heavy as f64 / draws as f64
}

#[test]
fn test_weighted_fairness() {
    let share = heavy_share(2024, 20_000);
    assert!((share - 0.5).abs() < 0.02, "share was {share}");
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_weighted_fairness_any_seed(seed in any::<u64>()) {
        let share = heavy_share(seed, 4_000);
        prop_assert!((share - 0.5).abs() < 0.06, "share was {}", share);
    }

    #[test]
    fn prop_full_gate_always_draws(seed in any::<u64>()) {
        let mut loot = LootEngine::new(LootSettings {
            seed: Some(seed),
            ..LootSettings::default()
        });
        loot.load_str(WEIGHTED).unwrap();
        for _ in 0..50 {
            prop_assert!(loot.draw("standard-pillar").is_some());
        }
    }
}
