// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Operator-triggered test delivery against a single channel: sends a
//! synthetic transition through it and reports the outcome. Never touches
//! `ActiveAlerts` or any rule's state — this exists purely to let an
//! operator confirm a channel is wired up correctly before relying on it.

use std::sync::Arc;

use axum::extract::{Extension, State};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::{require_role, Principal, Role};
use crate::error::{AppError, AppResult};
use crate::evaluator::{AlertState, AlertTransition, TransitionKind};
use crate::rules::model::{Comparator, Reducer, Severity};
use crate::rules::AlertRule;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct TestSendRequest {
    pub channel_id: Uuid,
    #[serde(default = "default_severity")]
    pub severity: Severity,
}

fn default_severity() -> Severity {
    Severity::Warning
}

#[derive(Serialize)]
pub struct TestSendResponse {
    pub channel_id: Uuid,
    pub success: bool,
    pub error: Option<String>,
}

fn synthetic_transition(severity: Severity) -> AlertTransition {
    let now = Utc::now();
    let rule = Arc::new(AlertRule {
        id: Uuid::new_v4(),
        name: "test-send".into(),
        metric: "test.synthetic".into(),
        target_labels: Default::default(),
        window_secs: 60,
        reducer: Reducer::Last,
        sample_threshold: None,
        comparator: Comparator::GreaterThan,
        threshold: 0.0,
        persistence_secs: 0,
        cooldown_secs: 0,
        severity,
        channels: vec![],
        enabled: true,
        created_at: now,
        updated_at: now,
    });
    AlertTransition {
        rule_id: rule.id,
        target_id: Uuid::nil(),
        from: AlertState::Ok,
        to: AlertState::Firing,
        kind: TransitionKind::Fire,
        severity,
        value: Some(1.0),
        at: now,
        rule_snapshot: rule,
    }
}

pub async fn test_send(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Json(req): Json<TestSendRequest>,
) -> AppResult<Json<TestSendResponse>> {
    require_role(&principal, Role::Operator)?;
    let channel = state
        .channels
        .get(req.channel_id)
        .ok_or_else(|| AppError::NotFound("notification channel".into()))?;

    let transition = synthetic_transition(req.severity);
    let outcome = channel.send(&transition).await;
    let response = match outcome {
        Ok(()) => TestSendResponse { channel_id: req.channel_id, success: true, error: None },
        Err(e) => TestSendResponse { channel_id: req.channel_id, success: false, error: Some(e.to_string()) },
    };
    state.audit_writer.record(
        "operator",
        "notification.test_send",
        format!("channel:{}", req.channel_id),
        serde_json::json!({"success": response.success}),
    );
    Ok(Json(response))
}
