//! Match rules the host adapter consults before letting an action through.
//!
//! Pure functions of session state; the [`Session`](crate::session::Session)
//! wrappers feed them roster membership and the participant's spawn.

use serde::{Deserialize, Serialize};

use crate::config::FreezeConfig;
use crate::geometry::Position;
use crate::session::SessionState;

/// What to do with an attempted move
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MovementVerdict {
    Allow,
    /// Drop the move entirely
    Cancel,
    /// Keep the actor where it was but accept the new look direction
    CancelKeepLook(Position),
    /// Teleport the actor back to this position
    SnapTo(Position),
}

/// Whether damage should land. `attacker` is `None` for environmental damage,
/// otherwise whether the attacker is a participant.
pub fn damage_allowed(state: SessionState, victim_in_session: bool, attacker: Option<bool>) -> bool {
    if state == SessionState::Starting && victim_in_session {
        return false;
    }
    match attacker {
        None => true,
        // Participants and outsiders never hurt each other
        Some(attacker_in_session) if attacker_in_session != victim_in_session => false,
        Some(true) => state == SessionState::Active,
        Some(false) => true,
    }
}

/// Freeze check for a participant during the countdown.
///
/// `spawn` is `Some` only for frozen participants.
pub fn movement_verdict(
    state: SessionState,
    freeze: &FreezeConfig,
    spawn: Option<&Position>,
    from: &Position,
    to: &Position,
) -> MovementVerdict {
    let Some(spawn) = spawn else {
        return MovementVerdict::Allow;
    };
    if state != SessionState::Starting || !freeze.enabled || from.same_place(to) {
        return MovementVerdict::Allow;
    }
    if freeze.strict_mode {
        MovementVerdict::SnapTo(spawn.with_look(to.yaw, to.pitch))
    } else if freeze.allow_look {
        MovementVerdict::CancelKeepLook(from.with_look(to.yaw, to.pitch))
    } else {
        MovementVerdict::Cancel
    }
}
