use serde::Serialize;
use std::collections::{HashMap, HashSet};

use super::{ActorHost, HostError, Notice, WorldHost};
use crate::geometry::{CellPos, Position};
use crate::loot::Artifact;
use crate::material::Material;
use crate::session::ParticipantId;

/// What the in-memory host knows about one actor
#[derive(Debug, Clone, Default, Serialize)]
pub struct ActorRecord {
    pub online: bool,
    pub position: Option<Position>,
    pub spectator: bool,
    pub inventory: Vec<Artifact>,
    pub health_restores: u32,
    pub notices: Vec<Notice>,
}

/// In-memory host used by the headless server and by tests.
///
/// Actors must be [`connect`](MemoryHost::connect)ed before any actor
/// capability succeeds. World writes can be made to fail per cell to
/// exercise degraded paths.
#[derive(Debug, Default)]
pub struct MemoryHost {
    actors: HashMap<ParticipantId, ActorRecord>,
    cells: HashMap<CellPos, Material>,
    failing_cells: HashSet<CellPos>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect(&mut self, actor: ParticipantId) {
        self.actors.entry(actor).or_default().online = true;
    }

    pub fn disconnect(&mut self, actor: ParticipantId) {
        if let Some(record) = self.actors.get_mut(&actor) {
            record.online = false;
        }
    }

    pub fn actor(&self, actor: ParticipantId) -> Option<&ActorRecord> {
        self.actors.get(&actor)
    }

    pub fn notices(&self, actor: ParticipantId) -> &[Notice] {
        self.actors
            .get(&actor)
            .map(|record| record.notices.as_slice())
            .unwrap_or(&[])
    }

    pub fn take_notices(&mut self, actor: ParticipantId) -> Vec<Notice> {
        self.actors
            .get_mut(&actor)
            .map(|record| std::mem::take(&mut record.notices))
            .unwrap_or_default()
    }

    /// Take every queued notice, ordered by actor
    pub fn drain_notices(&mut self) -> Vec<(ParticipantId, Notice)> {
        let mut drained: Vec<_> = self
            .actors
            .iter_mut()
            .flat_map(|(id, record)| {
                std::mem::take(&mut record.notices)
                    .into_iter()
                    .map(move |notice| (*id, notice))
            })
            .collect();
        drained.sort_by_key(|(id, _)| *id);
        drained
    }

    pub fn occupied_cells(&self) -> usize {
        self.cells.len()
    }

    /// Make every future write to `cell` fail
    pub fn fail_writes_at(&mut self, cell: CellPos) {
        self.failing_cells.insert(cell);
    }

    fn online_mut(&mut self, actor: ParticipantId) -> Result<&mut ActorRecord, HostError> {
        self.actors
            .get_mut(&actor)
            .filter(|record| record.online)
            .ok_or(HostError::ActorUnavailable(actor))
    }
}

impl ActorHost for MemoryHost {
    fn is_reachable(&self, actor: ParticipantId) -> bool {
        self.actors.get(&actor).is_some_and(|record| record.online)
    }

    fn teleport(&mut self, actor: ParticipantId, to: &Position) -> Result<(), HostError> {
        self.online_mut(actor)?.position = Some(*to);
        Ok(())
    }

    fn set_spectator(&mut self, actor: ParticipantId) -> Result<(), HostError> {
        self.online_mut(actor)?.spectator = true;
        Ok(())
    }

    fn restore(&mut self, actor: ParticipantId) -> Result<(), HostError> {
        let record = self.online_mut(actor)?;
        record.spectator = false;
        record.inventory.clear();
        Ok(())
    }

    fn restore_health(&mut self, actor: ParticipantId) -> Result<(), HostError> {
        self.online_mut(actor)?.health_restores += 1;
        Ok(())
    }

    fn give_artifact(
        &mut self,
        actor: ParticipantId,
        artifact: &Artifact,
    ) -> Result<(), HostError> {
        self.online_mut(actor)?.inventory.push(artifact.clone());
        Ok(())
    }

    fn notify(&mut self, actor: ParticipantId, notice: &Notice) -> Result<(), HostError> {
        self.online_mut(actor)?.notices.push(notice.clone());
        Ok(())
    }
}

impl WorldHost for MemoryHost {
    fn cell(&self, cell: &CellPos) -> Result<Option<Material>, HostError> {
        Ok(self.cells.get(cell).copied())
    }

    fn set_cell(&mut self, cell: &CellPos, material: Option<Material>) -> Result<(), HostError> {
        if self.failing_cells.contains(cell) {
            return Err(HostError::WorldUnavailable(*cell));
        }
        match material {
            Some(material) => {
                self.cells.insert(*cell, material);
            }
            None => {
                self.cells.remove(cell);
            }
        }
        Ok(())
    }
}
