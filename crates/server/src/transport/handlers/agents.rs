// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent management and the heartbeat/telemetry-intake endpoint.

use std::sync::Arc;

use axum::extract::{Extension, Path, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::agents::Agent;
use crate::auth::{require_role, MintApiKeyRequest, Principal, Role};
use crate::error::{AppError, AppResult};
use crate::ingress::{ingest_batch, IngestBatch, SampleIn};
use crate::registry::TargetKind;
use crate::state::AppState;

pub async fn list_agents(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
) -> AppResult<Json<Vec<Agent>>> {
    require_role(&principal, Role::Viewer)?;
    Ok(Json(state.agents.list().await))
}

#[derive(Deserialize)]
pub struct CreateAgentRequest {
    pub kind: TargetKind,
    /// The address of the target this agent will report telemetry for.
    pub address: String,
    pub version: String,
    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,
}

fn default_heartbeat_interval_secs() -> u64 {
    30
}

#[derive(Serialize)]
pub struct CreatedAgent {
    pub agent: Agent,
    /// Only ever returned once, at creation time.
    pub api_key_token: String,
}

/// Pre-provision an agent bound to a freshly upserted target, minting the
/// api key it will authenticate its heartbeats with. The target and key
/// exist before the agent record does, so `Agent::target_id` and
/// `Agent::api_key_id` are never optional.
pub async fn create_agent(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Json(req): Json<CreateAgentRequest>,
) -> AppResult<(axum::http::StatusCode, Json<CreatedAgent>)> {
    require_role(&principal, Role::Operator)?;

    let target = state.targets.upsert_target(req.kind, req.address.clone(), std::collections::HashMap::new(), None).await;
    let target_id = target.read().await.id;

    let mint_req = MintApiKeyRequest::new(format!("agent:{}", req.address), Role::Agent, vec![crate::auth::ApiKeyScope::Ingest]);
    let (token, key_record) = state.credentials.mint_api_key(mint_req).await;

    let id = Uuid::new_v4();
    let agent = state
        .agents
        .pre_register(id, req.kind, target_id, key_record.id, req.version, req.heartbeat_interval_secs)
        .await;
    state.audit_writer.record("operator", "agent.create", format!("agent:{}", agent.id), serde_json::Value::Null);
    Ok((axum::http::StatusCode::CREATED, Json(CreatedAgent { agent, api_key_token: token })))
}

pub async fn get_agent(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Agent>> {
    require_role(&principal, Role::Viewer)?;
    Ok(Json(state.agents.get(id).await?))
}

pub async fn delete_agent(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> AppResult<axum::http::StatusCode> {
    require_role(&principal, Role::Operator)?;
    state.agents.remove(id).await?;
    state.audit_writer.record("operator", "agent.delete", format!("agent:{id}"), serde_json::Value::Null);
    Ok(axum::http::StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct AgentConfigRequest {
    pub revision: u64,
}

/// Stage a new config revision. Rollout is pull-only: the next heartbeat
/// response advertises it, and the agent acknowledges by reporting the
/// new revision on a later heartbeat.
pub async fn put_agent_config(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
    Json(req): Json<AgentConfigRequest>,
) -> AppResult<()> {
    require_role(&principal, Role::Operator)?;
    let current = state.agents.get(id).await?;
    if req.revision <= current.config_revision {
        return Err(AppError::Validation("config revision must strictly increase".into()));
    }
    state.agents.bump_config_version(id, req.revision).await?;
    state.audit_writer.record(
        "operator",
        "agent.config.update",
        format!("agent:{id}"),
        serde_json::json!({"revision": req.revision}),
    );
    Ok(())
}

/// Admin pause: stops the health sweep from moving this agent through
/// stale/offline on its own account, without forgetting it the way
/// `delete_agent` would.
pub async fn disable_agent(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Agent>> {
    require_role(&principal, Role::Operator)?;
    let agent = state.agents.disable(id).await?;
    state.audit_writer.record("operator", "agent.disable", format!("agent:{id}"), serde_json::Value::Null);
    Ok(Json(agent))
}

pub async fn enable_agent(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Agent>> {
    require_role(&principal, Role::Operator)?;
    let agent = state.agents.enable(id).await?;
    state.audit_writer.record("operator", "agent.enable", format!("agent:{id}"), serde_json::Value::Null);
    Ok(Json(agent))
}

// -- Heartbeat -----------------------------------------------------------

#[derive(Deserialize)]
pub struct HeartbeatHealth {
    pub status: String,
    pub last_error: Option<String>,
}

#[derive(Deserialize)]
pub struct WireSample {
    pub metric: String,
    pub ts: DateTime<Utc>,
    pub value: f64,
    #[serde(default)]
    pub labels: std::collections::HashMap<String, String>,
}

#[derive(Deserialize)]
pub struct HeartbeatRequest {
    pub agent_id: Uuid,
    pub ts: DateTime<Utc>,
    pub version: String,
    pub platform: String,
    pub config_revision_seen: u64,
    pub health: HeartbeatHealth,
    #[serde(default)]
    pub samples: Vec<WireSample>,
}

#[derive(Serialize)]
pub struct NewConfig {
    pub revision: u64,
    pub body: serde_json::Value,
}

#[derive(Serialize)]
pub struct HeartbeatResponse {
    pub ack_ts: DateTime<Utc>,
    pub next_heartbeat_in: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_config: Option<NewConfig>,
}

/// Telemetry intake. The agent must already exist — pre-provisioned via
/// [`create_agent`] or discovery auto-monitor — and the presented api key
/// must be the one bound to it, so one agent's key can't heartbeat on
/// behalf of another agent's id. Marks the agent's already-bound target
/// online, normalizes the wire samples through the shared ingress
/// pipeline, and advertises a staged config revision if the agent hasn't
/// caught up to it yet.
pub async fn heartbeat(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Json(req): Json<HeartbeatRequest>,
) -> AppResult<Json<HeartbeatResponse>> {
    let key_id = match &principal {
        Principal::ApiKey { id, role: Role::Agent, .. } => *id,
        _ => return Err(AppError::Authz("heartbeat requires an agent-scoped api key".into())),
    };

    let existing = state.agents.get(req.agent_id).await?;
    if existing.api_key_id != key_id {
        return Err(AppError::Authz("api key does not match the agent it was presented for".into()));
    }

    if req.health.status != "ok" {
        tracing::warn!(agent_id = %req.agent_id, status = %req.health.status, last_error = ?req.health.last_error, "agent reported unhealthy");
    }

    let agent = state
        .agents
        .heartbeat(req.agent_id, req.version, req.platform, req.health.last_error.clone())
        .await?;
    let target_id = agent.target_id;
    state.targets.mark_status(target_id, crate::registry::TargetStatus::Online, "heartbeat").await?;

    let heartbeat_interval = agent.heartbeat_interval_secs;

    if !req.samples.is_empty() {
        let samples = req
            .samples
            .into_iter()
            .map(|s| SampleIn { target_id, metric: s.metric, value: s.value, timestamp: s.ts })
            .collect();
        let batch = IngestBatch { agent_id: req.agent_id, samples };
        let report = ingest_batch(&state.ingress, &state.config, batch).await?;
        state.metrics.record_accepted(report.accepted as u64);
        state.metrics.record_dropped(report.rejected as u64);
    }

    let new_config = if req.config_revision_seen < agent.config_revision {
        Some(NewConfig {
            revision: agent.config_revision,
            body: state.config_store.get_namespace(&format!("agent.{}.config.", req.agent_id)).await.into_iter().fold(
                serde_json::Map::new(),
                |mut acc, (k, v)| {
                    if let Ok(value) = serde_json::to_value(v) {
                        acc.insert(k, value);
                    }
                    acc
                },
            ).into(),
        })
    } else {
        None
    };

    Ok(Json(HeartbeatResponse {
        ack_ts: crate::time_util::now(),
        next_heartbeat_in: heartbeat_interval,
        new_config,
    }))
}

// -- Static distribution surface -----------------------------------------

/// Agent binaries aren't shipped by this control plane; this returns a
/// pointer an installer script can follow rather than a real artifact.
pub async fn download_agent(Path(platform): Path<String>) -> String {
    format!("no embedded agent binary is bundled for '{platform}'; see the install guide for this platform")
}

pub async fn install_guide(Path(platform): Path<String>) -> String {
    format!(
        "1. provision an api key with scope 'agent' via POST /api/v1/apikeys\n\
         2. install the '{platform}' collector from your package manager or build pipeline\n\
         3. point it at this server's /api/v1/agents/heartbeat with the minted key"
    )
}
