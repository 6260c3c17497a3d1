// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Active discovery job submission and progress/result polling.

use std::sync::Arc;

use axum::extract::{Extension, Path, State};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::{require_role, Principal, Role};
use crate::discovery::{DiscoveryJob, DiscoveryResult, DiscoveryTarget};
use crate::error::AppResult;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateTaskRequest {
    pub targets: Vec<DiscoveryTarget>,
    #[serde(default)]
    pub concurrency: Option<usize>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Opaque handle into wherever probe credentials are actually held;
    /// never a raw secret in this request body.
    #[serde(default)]
    pub credentials_ref: Option<String>,
    /// If true, a reachable probe against a known service kind also binds
    /// a freshly pre-provisioned agent to the discovered target.
    #[serde(default)]
    pub auto_monitor: bool,
}

fn default_timeout_ms() -> u64 {
    2000
}

/// Create and immediately kick off a discovery task in the background. The
/// response is the just-created job in `pending` state; poll
/// `/discovery/tasks/{id}/progress` for status.
pub async fn create_task(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Json(req): Json<CreateTaskRequest>,
) -> AppResult<(axum::http::StatusCode, Json<DiscoveryJob>)> {
    require_role(&principal, Role::Operator)?;
    let concurrency = req.concurrency.unwrap_or(state.config.discovery_job_concurrency);
    let job = state
        .discovery_store
        .create_job(req.targets, concurrency, req.timeout_ms, req.credentials_ref, req.auto_monitor)
        .await;

    let scheduler = Arc::clone(&state.discovery_scheduler);
    let running = job.clone();
    tokio::spawn(async move {
        scheduler.run_job(running).await;
    });

    state.audit_writer.record("operator", "discovery.create", format!("job:{}", job.id), serde_json::Value::Null);
    Ok((axum::http::StatusCode::CREATED, Json(job)))
}

pub async fn list_tasks(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
) -> AppResult<Json<Vec<DiscoveryJob>>> {
    require_role(&principal, Role::Viewer)?;
    Ok(Json(state.discovery_store.list_jobs().await))
}

pub async fn get_task(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<DiscoveryJob>> {
    require_role(&principal, Role::Viewer)?;
    Ok(Json(state.discovery_store.get_job(id).await?))
}

#[derive(serde::Serialize)]
pub struct TaskProgress {
    pub status: crate::discovery::JobStatus,
    pub targets_total: usize,
    pub targets_probed: usize,
}

pub async fn task_progress(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<TaskProgress>> {
    require_role(&principal, Role::Viewer)?;
    let job = state.discovery_store.get_job(id).await?;
    let results = state.discovery_store.results_for(id).await;
    Ok(Json(TaskProgress {
        status: job.status,
        targets_total: job.targets.len(),
        targets_probed: results.len(),
    }))
}

pub async fn task_results(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Vec<DiscoveryResult>>> {
    require_role(&principal, Role::Viewer)?;
    let _ = state.discovery_store.get_job(id).await?;
    Ok(Json(state.discovery_store.results_for(id).await))
}

pub async fn cancel_task(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> AppResult<axum::http::StatusCode> {
    require_role(&principal, Role::Operator)?;
    let _ = state.discovery_store.get_job(id).await?;
    state.discovery_scheduler.cancel(id).await;
    state.audit_writer.record("operator", "discovery.cancel", format!("job:{id}"), serde_json::Value::Null);
    Ok(axum::http::StatusCode::NO_CONTENT)
}
