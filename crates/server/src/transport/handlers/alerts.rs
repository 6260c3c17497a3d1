// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Alert rule CRUD and the active-alert query/ack/resolve surface.

use std::sync::Arc;

use axum::extract::{Extension, Path, State};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::alerts::ActiveAlert;
use crate::auth::{require_role, Principal, Role};
use crate::error::AppResult;
use crate::rules::AlertRule;
use crate::state::AppState;

pub async fn list_rules(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
) -> AppResult<Json<Vec<Arc<AlertRule>>>> {
    require_role(&principal, Role::Viewer)?;
    Ok(Json(state.rule_store.list().await))
}

#[derive(Deserialize)]
pub struct RuleRequest {
    pub name: String,
    pub metric: String,
    #[serde(default)]
    pub target_labels: std::collections::HashMap<String, String>,
    pub window_secs: u64,
    pub reducer: crate::rules::model::Reducer,
    #[serde(default)]
    pub sample_threshold: Option<f64>,
    pub comparator: crate::rules::model::Comparator,
    pub threshold: f64,
    #[serde(default = "default_persistence_secs")]
    pub persistence_secs: i64,
    pub cooldown_secs: i64,
    pub severity: crate::rules::model::Severity,
    #[serde(default)]
    pub channels: Vec<Uuid>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_persistence_secs() -> i64 {
    0
}

fn default_true() -> bool {
    true
}

impl RuleRequest {
    fn into_rule(self, id: Uuid) -> AlertRule {
        let now = crate::time_util::now();
        AlertRule {
            id,
            name: self.name,
            metric: self.metric,
            target_labels: self.target_labels,
            window_secs: self.window_secs,
            reducer: self.reducer,
            sample_threshold: self.sample_threshold,
            comparator: self.comparator,
            threshold: self.threshold,
            persistence_secs: self.persistence_secs,
            cooldown_secs: self.cooldown_secs,
            severity: self.severity,
            channels: self.channels,
            enabled: self.enabled,
            created_at: now,
            updated_at: now,
        }
    }
}

pub async fn create_rule(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Json(req): Json<RuleRequest>,
) -> AppResult<(axum::http::StatusCode, Json<Arc<AlertRule>>)> {
    require_role(&principal, Role::Operator)?;
    let rule = req.into_rule(Uuid::new_v4());
    let name = rule.name.clone();
    let created = state.rule_store.create(rule).await?;
    state.audit_writer.record("operator", "rule.create", format!("rule:{}", created.id), serde_json::json!({"name": name}));
    Ok((axum::http::StatusCode::CREATED, Json(created)))
}

pub async fn get_rule(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Arc<AlertRule>>> {
    require_role(&principal, Role::Viewer)?;
    Ok(Json(state.rule_store.get(id).await?))
}

pub async fn update_rule(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
    Json(req): Json<RuleRequest>,
) -> AppResult<Json<Arc<AlertRule>>> {
    require_role(&principal, Role::Operator)?;
    let rule = req.into_rule(id);
    let updated = state.rule_store.update(id, rule).await?;
    state.audit_writer.record("operator", "rule.update", format!("rule:{id}"), serde_json::Value::Null);
    Ok(Json(updated))
}

pub async fn delete_rule(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> AppResult<axum::http::StatusCode> {
    require_role(&principal, Role::Operator)?;
    state.rule_store.delete(id).await?;
    state.audit_writer.record("operator", "rule.delete", format!("rule:{id}"), serde_json::Value::Null);
    Ok(axum::http::StatusCode::NO_CONTENT)
}

pub async fn list_active_alerts(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
) -> AppResult<Json<Vec<ActiveAlert>>> {
    require_role(&principal, Role::Viewer)?;
    Ok(Json(state.active_alerts.list().await))
}

/// Active alerts are keyed by `(rule_id, target_id)`, not a single id; the
/// path carries both, joined with `:`, to address one without inventing a
/// synthetic alert-id field the evaluator doesn't produce.
#[derive(Deserialize)]
pub struct AlertKeyPath {
    pub rule_id: Uuid,
    pub target_id: Uuid,
}

#[derive(Deserialize)]
pub struct AcknowledgeRequest {
    pub by: String,
}

pub async fn acknowledge_alert(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(AlertKeyPath { rule_id, target_id }): Path<AlertKeyPath>,
    Json(req): Json<AcknowledgeRequest>,
) -> AppResult<Json<ActiveAlert>> {
    require_role(&principal, Role::Operator)?;
    let alert = state.active_alerts.acknowledge(rule_id, target_id, &req.by).await?;
    state.audit_writer.record(
        req.by,
        "alert.acknowledge",
        format!("rule:{rule_id} target:{target_id}"),
        serde_json::Value::Null,
    );
    Ok(Json(alert))
}

pub async fn resolve_alert(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(AlertKeyPath { rule_id, target_id }): Path<AlertKeyPath>,
) -> AppResult<()> {
    require_role(&principal, Role::Operator)?;
    state.active_alerts.resolve(rule_id, target_id).await?;
    state.audit_writer.record(
        "operator",
        "alert.resolve",
        format!("rule:{rule_id} target:{target_id}"),
        serde_json::Value::Null,
    );
    Ok(())
}
