//! Off-context roster scan for tower growth.
//!
//! ```text
//! [Main context]  cadence fires
//!       ↓ Offload::spawn(scan job)
//! [Worker]        read-lock roster → alive ids → GrowthUnit per id
//!       ↓ mpsc channel
//! [Main context]  next Session::tick drains units → grow_tower (serially)
//! ```
//!
//! The worker never touches towers, the index or the world.

use std::sync::mpsc::Sender;
use tracing::debug;

use super::participant::{ParticipantId, SharedRoster};

/// One tower's worth of growth, applied on the main context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrowthUnit {
    pub participant: ParticipantId,
}

/// Where the roster scan runs
pub trait Offload: Send {
    fn spawn(&self, job: Box<dyn FnOnce() + Send + 'static>);
}

/// Runs the scan on the rayon global pool
#[derive(Debug, Clone, Copy, Default)]
pub struct RayonOffload;

impl Offload for RayonOffload {
    fn spawn(&self, job: Box<dyn FnOnce() + Send + 'static>) {
        rayon::spawn(job);
    }
}

/// Runs the scan immediately on the calling thread (deterministic tests)
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineOffload;

impl Offload for InlineOffload {
    fn spawn(&self, job: Box<dyn FnOnce() + Send + 'static>) {
        job();
    }
}

/// Job that emits one unit per living participant
pub(crate) fn scan_job(
    roster: SharedRoster,
    units: Sender<GrowthUnit>,
) -> Box<dyn FnOnce() + Send + 'static> {
    Box::new(move || {
        let alive: Vec<ParticipantId> = roster
            .read()
            .values()
            .filter(|p| p.alive)
            .map(|p| p.id)
            .collect();
        debug!(count = alive.len(), "growth scan");
        for participant in alive {
            // Receiver gone means the session was dropped
            if units.send(GrowthUnit { participant }).is_err() {
                break;
            }
        }
    })
}
