//! API Tests
//!
//! Drives the router with `tower::ServiceExt::oneshot`. A background task
//! stands in for the Bevy side: it drains the command channel against a
//! real session and republishes the snapshot after every command.

use axum::body::Body;
use http::Request;
use serde_json::{json, Value};
use tower::ServiceExt;

use pillars_core::config::PillarsConfig;
use pillars_core::host::MemoryHost;
use pillars_core::scheduler::TickScheduler;
use pillars_core::session::{InlineOffload, Session};
use pillars_server::api::{self, ApiState};
use pillars_server::bridge::{self, SharedReloadStatus};

fn test_session() -> Session<MemoryHost> {
    let mut config = PillarsConfig::default();
    config.game.min_players = 2;
    config.game.max_players = 3;
    config.pillar.seed = Some(21);
    config.loot.seed = Some(21);
    Session::with_parts(
        config,
        MemoryHost::new(),
        TickScheduler::new(),
        Box::new(InlineOffload),
    )
}

/// Router backed by a live session consumer
fn create_test_router() -> axum::Router {
    let (cmd_sender, mut cmd_receiver, snapshot) = bridge::create_bridge();
    let published = snapshot.clone();

    tokio::spawn(async move {
        let mut session = test_session();
        while let Some(cmd) = cmd_receiver.receiver.recv().await {
            bridge::handle_command(&mut session, None, None, cmd);
            *published.write() = session.snapshot();
        }
    });

    api::build_router(ApiState {
        commands: cmd_sender,
        snapshot,
        reload_status: SharedReloadStatus::default(),
    })
}

/// Router whose session side is already gone
fn create_detached_router() -> axum::Router {
    let (cmd_sender, cmd_receiver, snapshot) = bridge::create_bridge();
    drop(cmd_receiver);
    api::build_router(ApiState {
        commands: cmd_sender,
        snapshot,
        reload_status: SharedReloadStatus::default(),
    })
}

async fn get(router: &axum::Router, uri: &str) -> Value {
    let req = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    let resp = router.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), 200);
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

async fn post(router: &axum::Router, uri: &str, body: Value) -> Value {
    let req = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let resp = router.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), 200);
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

// ============================================================================
// Health & Status
// ============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let router = create_test_router();
    let json = get(&router, "/health").await;
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
    assert_eq!(json["state"], "Waiting");
}

#[tokio::test]
async fn test_status_reports_empty_lobby() {
    let router = create_test_router();
    let json = get(&router, "/pillars/status").await;
    assert_eq!(json["session"]["state"], "Lobby");
    assert_eq!(json["session"]["players"], 0);
    assert_eq!(json["session"]["elapsed"], "00:00");
    assert_eq!(json["hot_reload"]["enabled"], false);
}

// ============================================================================
// Roster
// ============================================================================

#[tokio::test]
async fn test_join_until_countdown() {
    let router = create_test_router();

    let first = post(&router, "/pillars/join", json!({"id": 1, "name": "Alex"})).await;
    assert_eq!(first["success"], true);
    assert_eq!(first["result"]["roster_size"], 1);
    assert_eq!(first["result"]["countdown_started"], false);

    let second = post(&router, "/pillars/join", json!({"id": 2, "name": "Blake"})).await;
    assert_eq!(second["result"]["countdown_started"], true);

    let status = get(&router, "/pillars/status").await;
    assert_eq!(status["session"]["state"], "Starting");
    assert_eq!(status["session"]["countdown_remaining"], 10);
    assert_eq!(status["session"]["participants"][1]["name"], "Blake");
}

#[tokio::test]
async fn test_duplicate_join_rejected() {
    let router = create_test_router();
    post(&router, "/pillars/join", json!({"id": 1, "name": "Alex"})).await;
    let again = post(&router, "/pillars/join", json!({"id": 1, "name": "Alex"})).await;
    assert_eq!(again["success"], false);
    assert_eq!(again["error"], "already in the session");
}

#[tokio::test]
async fn test_leave_cancels_countdown() {
    let router = create_test_router();
    post(&router, "/pillars/join", json!({"id": 1, "name": "Alex"})).await;
    post(&router, "/pillars/join", json!({"id": 2, "name": "Blake"})).await;

    let left = post(&router, "/pillars/leave", json!({"id": 2})).await;
    assert_eq!(left["success"], true);

    let status = get(&router, "/pillars/status").await;
    assert_eq!(status["session"]["state"], "Lobby");
    assert!(status["session"]["countdown_remaining"].is_null());

    let missing = post(&router, "/pillars/leave", json!({"id": 9})).await;
    assert_eq!(missing["success"], false);
}

// ============================================================================
// Operator Controls
// ============================================================================

#[tokio::test]
async fn test_start_below_minimum() {
    let router = create_test_router();
    post(&router, "/pillars/join", json!({"id": 1, "name": "Alex"})).await;
    let resp = post(&router, "/pillars/start", json!({})).await;
    assert_eq!(resp["success"], false);
    assert_eq!(resp["error"], "not enough players to start (1/2)");
}

#[tokio::test]
async fn test_stop_during_countdown() {
    let router = create_test_router();
    post(&router, "/pillars/join", json!({"id": 1, "name": "Alex"})).await;
    post(&router, "/pillars/join", json!({"id": 2, "name": "Blake"})).await;

    let resp = post(&router, "/pillars/stop", json!({})).await;
    assert_eq!(resp["success"], true);
    assert_eq!(resp["result"], "CountdownCancelled");

    let idle = post(&router, "/pillars/stop", json!({})).await;
    assert_eq!(idle["success"], false);
}

#[tokio::test]
async fn test_reload_without_paths_reports_error() {
    let router = create_test_router();
    let resp = post(&router, "/pillars/reload", json!({})).await;
    assert_eq!(resp["success"], false);
    assert_eq!(resp["result"]["loot_error"], "no config paths configured");
}

// ============================================================================
// Host Reports
// ============================================================================

#[tokio::test]
async fn test_break_by_outsider_is_ignored() {
    let router = create_test_router();
    let resp = post(
        &router,
        "/pillars/break",
        json!({"actor": 5, "cell": {"world": 0, "x": 1, "y": 64, "z": 1}}),
    )
    .await;
    assert_eq!(resp["success"], true);
    assert_eq!(resp["result"], "Ignored");
}

#[tokio::test]
async fn test_eliminate_in_lobby_is_ignored() {
    let router = create_test_router();
    post(&router, "/pillars/join", json!({"id": 1, "name": "Alex"})).await;
    let resp = post(&router, "/pillars/eliminate", json!({"id": 1})).await;
    assert_eq!(resp["result"], "Ignored");
}

#[tokio::test]
async fn test_void_fall_during_countdown_is_protected() {
    let router = create_test_router();
    post(&router, "/pillars/join", json!({"id": 1, "name": "Alex"})).await;
    post(&router, "/pillars/join", json!({"id": 2, "name": "Blake"})).await;
    let resp = post(&router, "/pillars/void", json!({"id": 1})).await;
    assert_eq!(resp["result"], "Protected");
}

// ============================================================================
// Degraded
// ============================================================================

#[tokio::test]
async fn test_commands_fail_when_session_gone() {
    let router = create_detached_router();
    let resp = post(&router, "/pillars/join", json!({"id": 1, "name": "Alex"})).await;
    assert_eq!(resp["success"], false);
    assert_eq!(resp["error"], "session unavailable");

    let health = get(&router, "/health").await;
    assert_eq!(health["status"], "ok");
}
