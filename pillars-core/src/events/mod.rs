//! Session Event Bus
//!
//! Synchronous, typed publish/subscribe. Handlers for an event type run in
//! registration order on the thread that publishes, before `publish`
//! returns. Cancelable events are mutable proposals: a handler may veto
//! them or rewrite their payload (the material of a new cell, the artifact
//! of a broken one) and the publisher acts on whatever comes back.
//!
//! ```text
//! Session / StructureGenerator
//!       │ publish(&mut event)
//!       ▼
//! EventBus ── handler #1 ── handler #2 ── ... (registration order)
//!       │
//!       ▼
//! publisher inspects event.is_cancelled() / mutated fields
//! ```

use serde::{Deserialize, Serialize};
use std::any::{Any, TypeId};
use std::collections::HashMap;

use crate::geometry::CellPos;
use crate::loot::Artifact;
use crate::material::Material;
use crate::session::{ParticipantId, SessionState};

/// Marker for types that travel over the bus
pub trait Event: Send + 'static {}

/// Events a handler may veto
pub trait Cancellable {
    fn cancel(&mut self);
    fn set_cancelled(&mut self, cancelled: bool);
    fn is_cancelled(&self) -> bool;
}

type Handler<E> = Box<dyn FnMut(&mut E) + Send>;

/// Typed synchronous event bus
#[derive(Default)]
pub struct EventBus {
    handlers: HashMap<TypeId, Box<dyn Any + Send>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for `E`. Handlers run in registration order.
    pub fn subscribe<E: Event>(&mut self, handler: impl FnMut(&mut E) + Send + 'static) {
        let slot = self
            .handlers
            .entry(TypeId::of::<E>())
            .or_insert_with(|| Box::new(Vec::<Handler<E>>::new()));
        if let Some(list) = slot.downcast_mut::<Vec<Handler<E>>>() {
            list.push(Box::new(handler));
        }
    }

    /// Run every handler for `E` against `event`
    pub fn publish<E: Event>(&mut self, event: &mut E) {
        let Some(list) = self
            .handlers
            .get_mut(&TypeId::of::<E>())
            .and_then(|slot| slot.downcast_mut::<Vec<Handler<E>>>())
        else {
            return;
        };
        for handler in list.iter_mut() {
            handler(event);
        }
    }

    pub fn subscriber_count<E: Event>(&self) -> usize {
        self.handlers
            .get(&TypeId::of::<E>())
            .and_then(|slot| slot.downcast_ref::<Vec<Handler<E>>>())
            .map_or(0, Vec::len)
    }

    pub fn clear(&mut self) {
        self.handlers.clear();
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("event_types", &self.handlers.len())
            .finish()
    }
}

macro_rules! cancellable {
    ($ty:ty) => {
        impl Cancellable for $ty {
            fn cancel(&mut self) {
                self.cancelled = true;
            }
            fn set_cancelled(&mut self, cancelled: bool) {
                self.cancelled = cancelled;
            }
            fn is_cancelled(&self) -> bool {
                self.cancelled
            }
        }
    };
}

// ============================================================================
// Lifecycle Events
// ============================================================================

/// Published on every state machine edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStateChanged {
    pub previous: SessionState,
    pub new: SessionState,
}
impl Event for SessionStateChanged {}

/// The match went `Active`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStarted {
    pub participant_count: usize,
}
impl Event for SessionStarted {}

/// The match went `Ending`; `winner` is `None` on a draw or timeout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionEnded {
    pub winner: Option<ParticipantId>,
}
impl Event for SessionEnded {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantJoined {
    pub participant: ParticipantId,
    pub roster_size: usize,
}
impl Event for ParticipantJoined {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantLeft {
    pub participant: ParticipantId,
    pub roster_size: usize,
}
impl Event for ParticipantLeft {}

// ============================================================================
// Cancelable Domain Events
// ============================================================================

/// A tower is about to gain a cell. Handlers may swap the material or veto.
#[derive(Debug, Clone)]
pub struct CellAboutToGenerate {
    pub participant: ParticipantId,
    pub cell: CellPos,
    pub material: Material,
    cancelled: bool,
}

impl CellAboutToGenerate {
    pub fn new(participant: ParticipantId, cell: CellPos, material: Material) -> Self {
        Self {
            participant,
            cell,
            material,
            cancelled: false,
        }
    }
}
impl Event for CellAboutToGenerate {}
cancellable!(CellAboutToGenerate);

/// A tracked cell is being broken. Handlers may replace the artifact or veto.
#[derive(Debug, Clone)]
pub struct CellBroken {
    pub actor: ParticipantId,
    pub owner: ParticipantId,
    pub cell: CellPos,
    pub artifact: Option<Artifact>,
    cancelled: bool,
}

impl CellBroken {
    pub fn new(
        actor: ParticipantId,
        owner: ParticipantId,
        cell: CellPos,
        artifact: Option<Artifact>,
    ) -> Self {
        Self {
            actor,
            owner,
            cell,
            artifact,
            cancelled: false,
        }
    }

    pub fn is_own_cell(&self) -> bool {
        self.actor == self.owner
    }
}
impl Event for CellBroken {}
cancellable!(CellBroken);

/// Why a participant left the living roster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EliminationCause {
    Void,
    Killed,
    Disconnected,
    Other,
}

/// A living participant is about to be eliminated
#[derive(Debug, Clone)]
pub struct ParticipantEliminated {
    pub participant: ParticipantId,
    pub cause: EliminationCause,
    pub killer: Option<ParticipantId>,
    cancelled: bool,
}

impl ParticipantEliminated {
    pub fn new(
        participant: ParticipantId,
        cause: EliminationCause,
        killer: Option<ParticipantId>,
    ) -> Self {
        Self {
            participant,
            cause,
            killer,
            cancelled: false,
        }
    }
}
impl Event for ParticipantEliminated {}
cancellable!(ParticipantEliminated);
