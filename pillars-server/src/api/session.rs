//! Session endpoints
//!
//! Endpoints:
//! - GET  /pillars/status     (reads the published snapshot)
//! - POST /pillars/join
//! - POST /pillars/leave
//! - POST /pillars/start      (operator force-start)
//! - POST /pillars/stop
//! - POST /pillars/reload     (loot tables + config from disk)
//! - POST /pillars/break      (host reports a cell break)
//! - POST /pillars/eliminate  (host reports a death)
//! - POST /pillars/void       (host reports a void fall)

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use pillars_core::events::EliminationCause;
use pillars_core::geometry::CellPos;
use pillars_core::hotreload::HotReloadStatus;
use pillars_core::session::{
    BreakResponse, EliminationOutcome, JoinReceipt, ParticipantId, StopOutcome, VoidResponse,
};
use pillars_core::snapshot::SessionSnapshot;

use super::ApiState;
use crate::bridge::{PillarsCommand, ReloadSummary};

const UNAVAILABLE: &str = "session unavailable";

pub fn routes() -> Router<ApiState> {
    Router::new()
        .route("/pillars/status", get(status))
        .route("/pillars/join", post(join))
        .route("/pillars/leave", post(leave))
        .route("/pillars/start", post(start))
        .route("/pillars/stop", post(stop))
        .route("/pillars/reload", post(reload))
        .route("/pillars/break", post(break_cell))
        .route("/pillars/eliminate", post(eliminate))
        .route("/pillars/void", post(void_fall))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Body of `GET /pillars/status`
#[derive(Serialize, Deserialize)]
pub struct StatusResponse {
    pub session: SessionSnapshot,
    pub hot_reload: HotReloadStatus,
}

#[derive(Serialize, Deserialize)]
pub struct JoinRequest {
    pub id: ParticipantId,
    pub name: String,
}

#[derive(Serialize, Deserialize)]
pub struct ParticipantRequest {
    pub id: ParticipantId,
}

/// Body of `/pillars/break`
#[derive(Serialize, Deserialize)]
pub struct BreakRequest {
    pub actor: ParticipantId,
    pub cell: CellPos,
}

#[derive(Serialize, Deserialize)]
pub struct EliminateRequest {
    pub id: ParticipantId,
    #[serde(default = "default_cause")]
    pub cause: EliminationCause,
    #[serde(default)]
    pub killer: Option<ParticipantId>,
}

fn default_cause() -> EliminationCause {
    EliminationCause::Other
}

/// Generic reply: `success` plus either a payload or an error message
#[derive(Serialize, Deserialize)]
pub struct ActionResponse<T> {
    pub success: bool,
    pub result: Option<T>,
    pub error: Option<String>,
}

impl<T> ActionResponse<T> {
    fn ok(result: T) -> Self {
        Self {
            success: true,
            result: Some(result),
            error: None,
        }
    }

    fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(message.into()),
        }
    }

    fn from_reply<E: std::fmt::Display>(reply: Option<Result<T, E>>) -> Self {
        match reply {
            Some(Ok(result)) => Self::ok(result),
            Some(Err(e)) => Self::err(e.to_string()),
            None => Self::err(UNAVAILABLE),
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

async fn status(State(state): State<ApiState>) -> Json<StatusResponse> {
    let session = state.snapshot.read().clone();
    let hot_reload = state.reload_status.0.read().clone();
    Json(StatusResponse {
        session,
        hot_reload,
    })
}

async fn join(
    State(state): State<ApiState>,
    Json(req): Json<JoinRequest>,
) -> Json<ActionResponse<JoinReceipt>> {
    let reply = state
        .dispatch(|reply| PillarsCommand::Join {
            id: req.id,
            name: req.name,
            reply,
        })
        .await;
    Json(ActionResponse::from_reply(reply))
}

async fn leave(
    State(state): State<ApiState>,
    Json(req): Json<ParticipantRequest>,
) -> Json<ActionResponse<()>> {
    let reply = state
        .dispatch(|reply| PillarsCommand::Leave { id: req.id, reply })
        .await;
    Json(ActionResponse::from_reply(reply))
}

async fn start(State(state): State<ApiState>) -> Json<ActionResponse<()>> {
    let reply = state
        .dispatch(|reply| PillarsCommand::Start { reply })
        .await;
    Json(ActionResponse::from_reply(reply))
}

async fn stop(State(state): State<ApiState>) -> Json<ActionResponse<StopOutcome>> {
    let reply = state.dispatch(|reply| PillarsCommand::Stop { reply }).await;
    Json(ActionResponse::from_reply(reply))
}

async fn reload(State(state): State<ApiState>) -> Json<ActionResponse<ReloadSummary>> {
    match state.dispatch(|reply| PillarsCommand::Reload { reply }).await {
        Some(summary) => Json(ActionResponse {
            success: summary.loot_error.is_none() && summary.config_error.is_none(),
            result: Some(summary),
            error: None,
        }),
        None => Json(ActionResponse::err(UNAVAILABLE)),
    }
}

async fn break_cell(
    State(state): State<ApiState>,
    Json(req): Json<BreakRequest>,
) -> Json<ActionResponse<BreakResponse>> {
    let reply = state
        .dispatch(|reply| PillarsCommand::BreakCell {
            actor: req.actor,
            cell: req.cell,
            reply,
        })
        .await;
    Json(ActionResponse::from_reply(reply))
}

async fn eliminate(
    State(state): State<ApiState>,
    Json(req): Json<EliminateRequest>,
) -> Json<ActionResponse<EliminationOutcome>> {
    let reply = state
        .dispatch(|reply| PillarsCommand::Eliminate {
            id: req.id,
            cause: req.cause,
            killer: req.killer,
            reply,
        })
        .await;
    match reply {
        Some(outcome) => Json(ActionResponse::ok(outcome)),
        None => Json(ActionResponse::err(UNAVAILABLE)),
    }
}

async fn void_fall(
    State(state): State<ApiState>,
    Json(req): Json<ParticipantRequest>,
) -> Json<ActionResponse<VoidResponse>> {
    let reply = state
        .dispatch(|reply| PillarsCommand::VoidFall { id: req.id, reply })
        .await;
    match reply {
        Some(outcome) => Json(ActionResponse::ok(outcome)),
        None => Json(ActionResponse::err(UNAVAILABLE)),
    }
}
