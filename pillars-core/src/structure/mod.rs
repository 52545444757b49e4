//! Tower Generation & Cell Ownership
//!
//! Every participant owns one tower. The generator keeps two views of the
//! same facts and updates them together:
//!
//! ```text
//! towers: participant → Tower { base, height, cells, artifacts }
//! index:  cell        → participant
//! ```
//!
//! A coordinate is in `index` exactly when it is in one tower's `cells`.
//! All mutation happens on the host's main context (through `&mut self`);
//! the only off-context work in the session is reading the roster.

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tracing::{debug, error, warn};

use crate::config::PillarConfig;
use crate::events::{Cancellable, CellAboutToGenerate, CellBroken, EventBus};
use crate::geometry::CellPos;
use crate::host::{Host, WorldHost};
use crate::loot::{Artifact, LootEngine};
use crate::material::{BASE_MATERIAL, PILLAR_PALETTE};
use crate::session::ParticipantId;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StructureError {
    #[error("ownership index maps {cell} to {owner} but that tower does not hold it")]
    IndexDesync { cell: CellPos, owner: ParticipantId },
    #[error("tower of {owner} holds {cell} but the ownership index does not agree")]
    TowerDesync { cell: CellPos, owner: ParticipantId },
    #[error("{claimant} cannot take {cell}, it already belongs to {owner}")]
    CellClaimed {
        cell: CellPos,
        owner: ParticipantId,
        claimant: ParticipantId,
    },
}

/// One participant's column
#[derive(Debug, Clone)]
pub struct Tower {
    pub owner: ParticipantId,
    pub base: CellPos,
    /// Cells placed so far (initial column included); breaks do not lower it
    pub height: u32,
    cells: HashSet<CellPos>,
    artifacts: HashMap<CellPos, Artifact>,
}

impl Tower {
    fn new(owner: ParticipantId, base: CellPos) -> Self {
        Self {
            owner,
            base,
            height: 0,
            cells: HashSet::new(),
            artifacts: HashMap::new(),
        }
    }

    /// Cell the next growth step fills
    pub fn next_cell(&self) -> CellPos {
        self.base.offset(0, self.height as i32, 0)
    }

    pub fn contains(&self, cell: &CellPos) -> bool {
        self.cells.contains(cell)
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn artifact_at(&self, cell: &CellPos) -> Option<&Artifact> {
        self.artifacts.get(cell)
    }

    pub fn artifact_count(&self) -> usize {
        self.artifacts.len()
    }
}

/// Result of a break request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BreakOutcome {
    /// Not a tower cell; nothing changed
    NotTracked,
    /// A `CellBroken` handler cancelled the break; nothing changed
    Vetoed,
    Harvested {
        owner: ParticipantId,
        artifact: Option<Artifact>,
        own_cell: bool,
    },
}

/// Everything a growth step needs besides the generator itself
pub struct GrowthContext<'a, H: Host> {
    pub host: &'a mut H,
    pub events: &'a mut EventBus,
    pub loot: &'a mut LootEngine,
    /// Time since the match went `Active`
    pub elapsed: Duration,
}

/// Owns every tower and the cell → owner index.
///
/// The index and the tower cell sets are kept as exact inverses of each
/// other; [`StructureGenerator::verify_consistency`] checks that.
#[derive(Debug)]
pub struct StructureGenerator {
    settings: PillarConfig,
    towers: HashMap<ParticipantId, Tower>,
    index: HashMap<CellPos, ParticipantId>,
    rng: Xoshiro256PlusPlus,
}

impl StructureGenerator {
    pub fn new(settings: PillarConfig) -> Self {
        let seed = settings.seed.unwrap_or_else(rand::random);
        Self {
            settings,
            towers: HashMap::new(),
            index: HashMap::new(),
            rng: Xoshiro256PlusPlus::seed_from_u64(seed),
        }
    }

    pub fn settings(&self) -> &PillarConfig {
        &self.settings
    }

    /// Takes effect for towers built or grown from now on
    pub fn set_settings(&mut self, settings: PillarConfig) {
        self.settings = settings;
    }

    pub fn tower(&self, participant: ParticipantId) -> Option<&Tower> {
        self.towers.get(&participant)
    }

    pub fn towers(&self) -> impl Iterator<Item = &Tower> {
        self.towers.values()
    }

    pub fn owner_of(&self, cell: &CellPos) -> Option<ParticipantId> {
        self.index.get(cell).copied()
    }

    pub fn is_tracked(&self, cell: &CellPos) -> bool {
        self.index.contains_key(cell)
    }

    pub fn tracked_cells(&self) -> usize {
        self.index.len()
    }

    /// The cell's current owner when it is someone other than `claimant`
    fn foreign_owner(&self, claimant: ParticipantId, cell: &CellPos) -> Option<ParticipantId> {
        self.owner_of(cell).filter(|owner| *owner != claimant)
    }

    fn register(&mut self, owner: ParticipantId, cell: CellPos) -> Result<(), StructureError> {
        if let Some(current) = self.foreign_owner(owner, &cell) {
            error!(cell = %cell, owner = %current, claimant = %owner, "refusing to re-register owned cell");
            return Err(StructureError::CellClaimed {
                cell,
                owner: current,
                claimant: owner,
            });
        }
        if let Some(tower) = self.towers.get_mut(&owner) {
            tower.cells.insert(cell);
            self.index.insert(cell, owner);
        }
        Ok(())
    }

    fn drop_tower_index(&mut self, participant: ParticipantId) {
        if let Some(old) = self.towers.remove(&participant) {
            for cell in &old.cells {
                self.index.remove(cell);
            }
        }
    }

    /// Build the starting column of base material at `base`.
    ///
    /// A second call for the same participant replaces the earlier record;
    /// its cells leave the index (the world cells are left as they are).
    /// Nothing is built when the column overlaps another participant's tower.
    pub fn generate_initial_tower<W: WorldHost>(
        &mut self,
        world: &mut W,
        participant: ParticipantId,
        base: CellPos,
    ) -> Result<(), StructureError> {
        let column: Vec<CellPos> = (0..self.settings.initial_height)
            .map(|i| base.offset(0, i as i32, 0))
            .collect();
        if let Some((cell, owner)) = column
            .iter()
            .find_map(|cell| self.foreign_owner(participant, cell).map(|owner| (*cell, owner)))
        {
            error!(participant = %participant, cell = %cell, owner = %owner, "initial tower overlaps another tower");
            return Err(StructureError::CellClaimed {
                cell,
                owner,
                claimant: participant,
            });
        }

        self.drop_tower_index(participant);
        self.towers.insert(participant, Tower::new(participant, base));

        for cell in column {
            match world.set_cell(&cell, Some(BASE_MATERIAL)) {
                Ok(()) => self.register(participant, cell)?,
                Err(e) => warn!(participant = %participant, error = %e, "initial tower cell skipped"),
            }
        }
        if let Some(tower) = self.towers.get_mut(&participant) {
            tower.height = self.settings.initial_height;
        }
        debug!(participant = %participant, base = %base, "initial tower built");
        Ok(())
    }

    /// Add up to `blocks_per_interval` cells to a tower. Returns cells placed.
    pub fn grow_tower<H: Host>(
        &mut self,
        participant: ParticipantId,
        ctx: &mut GrowthContext<'_, H>,
    ) -> u32 {
        if !self.towers.contains_key(&participant) {
            return 0;
        }
        if !ctx.host.is_reachable(participant) {
            debug!(participant = %participant, "skipping growth for unreachable actor");
            return 0;
        }

        let mut placed = 0;
        for _ in 0..self.settings.blocks_per_interval {
            let Some(tower) = self.towers.get(&participant) else {
                break;
            };
            if tower.height >= self.settings.max_height {
                break;
            }
            let cell = tower.next_cell();
            if let Some(owner) = self.foreign_owner(participant, &cell) {
                warn!(participant = %participant, owner = %owner, cell = %cell, "tower blocked by another tower");
                break;
            }
            let material = PILLAR_PALETTE[self.rng.gen_range(0..PILLAR_PALETTE.len())];

            let mut proposal = CellAboutToGenerate::new(participant, cell, material);
            ctx.events.publish(&mut proposal);
            if proposal.is_cancelled() {
                continue;
            }

            if let Err(e) = ctx.host.set_cell(&cell, Some(proposal.material)) {
                warn!(participant = %participant, error = %e, "tower growth cell skipped");
                continue;
            }
            if self.register(participant, cell).is_err() {
                break;
            }

            let artifact = ctx.loot.draw_active(ctx.elapsed);
            if let Some(tower) = self.towers.get_mut(&participant) {
                tower.height += 1;
                if let Some(artifact) = artifact {
                    tower.artifacts.insert(cell, artifact);
                }
            }
            placed += 1;
        }
        placed
    }

    /// Resolve a request by `actor` to break `cell`
    pub fn handle_cell_break(
        &mut self,
        actor: ParticipantId,
        cell: &CellPos,
        events: &mut EventBus,
    ) -> Result<BreakOutcome, StructureError> {
        let Some(owner) = self.owner_of(cell) else {
            return Ok(BreakOutcome::NotTracked);
        };
        let Some(tower) = self.towers.get(&owner).filter(|t| t.contains(cell)) else {
            error!(cell = %cell, owner = %owner, "ownership index out of sync with towers");
            return Err(StructureError::IndexDesync { cell: *cell, owner });
        };

        let mut event = CellBroken::new(actor, owner, *cell, tower.artifact_at(cell).cloned());
        events.publish(&mut event);
        if event.is_cancelled() {
            return Ok(BreakOutcome::Vetoed);
        }

        if let Some(tower) = self.towers.get_mut(&owner) {
            tower.cells.remove(cell);
            tower.artifacts.remove(cell);
        }
        self.index.remove(cell);

        let own_cell = event.is_own_cell();
        Ok(BreakOutcome::Harvested {
            owner,
            artifact: event.artifact,
            own_cell,
        })
    }

    /// Clear every tracked cell in the world and forget all towers
    pub fn clear_all<W: WorldHost>(&mut self, world: &mut W) {
        let cleared = self.index.len();
        for cell in self.index.keys() {
            if let Err(e) = world.set_cell(cell, None) {
                warn!(cell = %cell, error = %e, "failed to clear tower cell");
            }
        }
        self.index.clear();
        self.towers.clear();
        if cleared > 0 {
            debug!(cells = cleared, "all towers cleared");
        }
    }

    /// Check that the index and the tower cell sets describe the same cells
    pub fn verify_consistency(&self) -> Result<(), StructureError> {
        for (cell, owner) in &self.index {
            if !self.towers.get(owner).is_some_and(|t| t.contains(cell)) {
                return Err(StructureError::IndexDesync {
                    cell: *cell,
                    owner: *owner,
                });
            }
        }
        for tower in self.towers.values() {
            for cell in &tower.cells {
                if self.index.get(cell) != Some(&tower.owner) {
                    return Err(StructureError::TowerDesync {
                        cell: *cell,
                        owner: tower.owner,
                    });
                }
            }
            if tower.artifacts.keys().any(|c| !tower.cells.contains(c)) {
                return Err(StructureError::TowerDesync {
                    cell: tower.base,
                    owner: tower.owner,
                });
            }
        }
        Ok(())
    }
}
