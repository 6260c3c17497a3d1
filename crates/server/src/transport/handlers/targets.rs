// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Read/soft-delete surface over the target registry. The registry itself
//! is only ever written to by heartbeat upserts and discovery, but without
//! this a registered target would have no externally-reachable view at
//! all once created.

use std::sync::Arc;

use axum::extract::{Extension, Path, Query, State};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::{require_role, Principal, Role};
use crate::error::AppResult;
use crate::registry::{Target, TargetFilter, TargetKind, TargetStatus};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ListQuery {
    pub kind: Option<TargetKind>,
    pub status: Option<TargetStatus>,
    #[serde(default)]
    pub include_deleted: bool,
}

impl From<ListQuery> for TargetFilter {
    fn from(q: ListQuery) -> Self {
        Self { kind: q.kind, status: q.status, label: None, include_deleted: q.include_deleted }
    }
}

pub async fn list_targets(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<Vec<Target>>> {
    require_role(&principal, Role::Viewer)?;
    Ok(Json(state.targets.list(&query.into()).await))
}

pub async fn get_target(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Target>> {
    require_role(&principal, Role::Viewer)?;
    Ok(Json(state.targets.get(id).await?))
}

pub async fn delete_target(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> AppResult<axum::http::StatusCode> {
    require_role(&principal, Role::Operator)?;
    state.targets.soft_delete(id).await?;
    state.audit_writer.record("operator", "target.delete", format!("target:{id}"), serde_json::Value::Null);
    Ok(axum::http::StatusCode::NO_CONTENT)
}
