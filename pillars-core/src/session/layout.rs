use std::collections::HashSet;
use std::f64::consts::TAU;

use crate::config::{ArenaConfig, PillarConfig};
use crate::geometry::CellPos;

/// Distance from the arena center to every tower base
pub fn circle_radius(count: usize, spacing: f64) -> f64 {
    (count as f64 * spacing / TAU).round().max(spacing)
}

/// Tower bases for `count` participants, evenly spaced on a circle.
///
/// Bases are floored onto whole cells. When two of them land on the same
/// column the circle is widened one cell at a time until every base is
/// distinct, so no two towers ever share a cell.
pub fn circle_bases(count: usize, arena: &ArenaConfig, pillar: &PillarConfig) -> Vec<CellPos> {
    if count == 0 {
        return Vec::new();
    }
    let mut radius = circle_radius(count, pillar.spacing);
    if !radius.is_finite() {
        radius = count as f64;
    }
    loop {
        let bases = bases_at(count, radius, arena, pillar);
        let columns: HashSet<(i32, i32)> = bases.iter().map(|b| (b.x, b.z)).collect();
        if columns.len() == count {
            return bases;
        }
        radius += 1.0;
    }
}

fn bases_at(count: usize, radius: f64, arena: &ArenaConfig, pillar: &PillarConfig) -> Vec<CellPos> {
    let step = TAU / count as f64;
    (0..count)
        .map(|i| {
            let angle = step * i as f64;
            CellPos::new(
                arena.world,
                (arena.center_x + radius * angle.cos()).floor() as i32,
                pillar.start_y,
                (arena.center_z + radius * angle.sin()).floor() as i32,
            )
        })
        .collect()
}
