// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Read-only views over the audit log: paged listing, aggregate stats, and
//! bulk export.

use std::sync::Arc;

use axum::extract::{Extension, Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::audit::{AuditFilter, AuditRecord};
use crate::auth::{require_role, Principal, Role};
use crate::error::AppResult;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct LogsQuery {
    pub actor: Option<String>,
    pub action: Option<String>,
    pub resource: Option<String>,
    pub since: Option<DateTime<Utc>>,
    #[serde(default)]
    pub offset: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    100
}

impl From<&LogsQuery> for AuditFilter {
    fn from(q: &LogsQuery) -> Self {
        Self { actor: q.actor.clone(), action: q.action.clone(), resource: q.resource.clone(), since: q.since }
    }
}

pub async fn list_logs(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<LogsQuery>,
) -> AppResult<Json<Vec<AuditRecord>>> {
    require_role(&principal, Role::Operator)?;
    let filter = AuditFilter::from(&query);
    Ok(Json(state.audit_log.page(&filter, query.offset, query.limit).await))
}

#[derive(Serialize)]
pub struct AuditStats {
    pub total: usize,
    pub by_action: std::collections::HashMap<String, usize>,
}

pub async fn stats(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
) -> AppResult<Json<AuditStats>> {
    require_role(&principal, Role::Operator)?;
    let records = state.audit_log.export_json(&AuditFilter::default()).await;
    let mut by_action = std::collections::HashMap::new();
    for r in &records {
        *by_action.entry(r.action.clone()).or_insert(0) += 1;
    }
    Ok(Json(AuditStats { total: records.len(), by_action }))
}

#[derive(Deserialize)]
pub struct ExportQuery {
    #[serde(default = "default_format")]
    pub format: String,
}

fn default_format() -> String {
    "json".into()
}

pub async fn export_logs(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<ExportQuery>,
) -> AppResult<impl IntoResponse> {
    require_role(&principal, Role::Operator)?;
    if query.format == "csv" {
        let csv = state.audit_log.export_csv(&AuditFilter::default()).await;
        Ok((
            [(header::CONTENT_TYPE, "text/csv")],
            csv,
        )
            .into_response())
    } else {
        let records = state.audit_log.export_json(&AuditFilter::default()).await;
        Ok(Json(records).into_response())
    }
}
