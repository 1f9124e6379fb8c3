//! HTTP Surface
//!
//! A thin request/response passthrough, nothing here carries workflow
//! logic:
//!
//! - `GET /health` — liveness plus uptime
//! - `GET /instances` — the live inventory records (expiry already applied
//!   by the store)
//! - `GET /keys` — trust-store listing by directory class
//! - `POST /events` — lifecycle notification intake; the event is queued
//!   and the handler returns immediately, mirroring the fire-and-forget
//!   contract of the event source
//! - `POST /ping` — dispatch a liveness ping to the whole managed fleet;
//!   returns the dispatch id, never waits for results
//!
//! Failures inside the warden are never surfaced through `POST /events`;
//! only a full intake queue produces a non-2xx there.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{error, warn};

use saltmesh_common::instance::{unix_now, TIER_MASTER, TIER_MINION};
use saltmesh_common::{
    CommandTargets, InstanceRecord, InventoryStore, LifecycleEvent, RemoteCommand, RemoteExecutor,
};

use crate::truststore::{KeyClass, PendingClass, TrustStore};
use crate::{WARDEN_NAME, WARDEN_VERSION};

// ════════════════════════════════════════════════════════════════════════════
// APP STATE
// ════════════════════════════════════════════════════════════════════════════

/// Shared application state, one `Arc` across all handlers.
pub struct AppState {
    pub env: String,
    pub store: Arc<dyn InventoryStore>,
    pub trust: Arc<dyn TrustStore>,
    /// Queue into the orchestrator's event loop.
    pub intake: mpsc::Sender<LifecycleEvent>,
    /// Remote execution seam, for the fleet ping passthrough.
    pub executor: Arc<dyn RemoteExecutor>,
    pub command_timeout_secs: u64,
    /// Unix timestamp of service start.
    pub start_time: u64,
}

/// Build the router over the shared state.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/instances", get(list_instances))
        .route("/keys", get(list_keys))
        .route("/events", post(submit_event))
        .route("/ping", post(ping_fleet))
        .with_state(state)
}

// ════════════════════════════════════════════════════════════════════════════
// RESPONSES
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Serialize)]
pub struct HealthResp {
    pub healthy: bool,
    pub service: &'static str,
    pub version: &'static str,
    pub env: String,
    pub uptime_secs: u64,
}

#[derive(Debug, Serialize)]
pub struct InstanceListResp {
    pub count: usize,
    pub items: Vec<InstanceRecord>,
}

#[derive(Debug, Serialize)]
pub struct KeyListResp {
    pub accepted: Vec<String>,
    /// Pending directory name -> entries.
    pub pending: BTreeMap<&'static str, Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct EventAccepted {
    pub queued: bool,
}

#[derive(Debug, Serialize)]
pub struct PingDispatched {
    pub dispatch_id: u64,
}

#[derive(Debug, Serialize)]
pub struct ErrorResp {
    pub error: String,
}

type HandlerError = (StatusCode, Json<ErrorResp>);

fn internal(err: impl std::fmt::Display) -> HandlerError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResp {
            error: err.to_string(),
        }),
    )
}

// ════════════════════════════════════════════════════════════════════════════
// HANDLERS
// ════════════════════════════════════════════════════════════════════════════

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResp> {
    Json(HealthResp {
        healthy: true,
        service: WARDEN_NAME,
        version: WARDEN_VERSION,
        env: state.env.clone(),
        uptime_secs: unix_now().saturating_sub(state.start_time),
    })
}

async fn list_instances(
    State(state): State<Arc<AppState>>,
) -> Result<Json<InstanceListResp>, HandlerError> {
    let items = state.store.scan().await.map_err(|err| {
        error!(error = %err, "inventory scan failed");
        internal(err)
    })?;
    Ok(Json(InstanceListResp {
        count: items.len(),
        items,
    }))
}

async fn list_keys(
    State(state): State<Arc<AppState>>,
) -> Result<Json<KeyListResp>, HandlerError> {
    let mut accepted = state.trust.list(KeyClass::Accepted).await.map_err(|err| {
        error!(error = %err, "trust-store listing failed");
        internal(err)
    })?;
    accepted.sort();

    let mut pending = BTreeMap::new();
    for class in PendingClass::ALL {
        let mut names = state
            .trust
            .list(KeyClass::Pending(class))
            .await
            .map_err(|err| {
                error!(dir = class.dir_name(), error = %err, "trust-store listing failed");
                internal(err)
            })?;
        names.sort();
        pending.insert(class.dir_name(), names);
    }
    Ok(Json(KeyListResp { accepted, pending }))
}

async fn submit_event(
    State(state): State<Arc<AppState>>,
    Json(event): Json<LifecycleEvent>,
) -> Result<(StatusCode, Json<EventAccepted>), HandlerError> {
    state.intake.try_send(event).map_err(|err| {
        warn!(error = %err, "event intake full or closed");
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResp {
                error: "event intake unavailable".to_string(),
            }),
        )
    })?;
    Ok((StatusCode::ACCEPTED, Json(EventAccepted { queued: true })))
}

/// Fire a `test.ping` at every managed node, both tiers, this environment.
/// Returns as soon as the dispatch is accepted; results land in the
/// executor's own logs.
async fn ping_fleet(
    State(state): State<Arc<AppState>>,
) -> Result<(StatusCode, Json<PingDispatched>), HandlerError> {
    let command = RemoteCommand {
        script: vec!["salt-call test.ping".to_string()],
        targets: CommandTargets::Tags {
            tiers: vec![TIER_MASTER.to_string(), TIER_MINION.to_string()],
            env: state.env.clone(),
        },
        timeout_secs: state.command_timeout_secs,
        comment: "fleet liveness ping".to_string(),
    };
    let dispatch = state.executor.send(command).await.map_err(|err| {
        error!(error = %err, "ping dispatch failed");
        internal(err)
    })?;
    Ok((
        StatusCode::ACCEPTED,
        Json(PingDispatched {
            dispatch_id: dispatch.dispatch_id,
        }),
    ))
}
