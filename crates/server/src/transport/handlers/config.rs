// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime-overridable configuration namespaces: alerting defaults, system
//! settings, and AI-service wiring. Each namespace is a flat key/value map
//! under a fixed prefix in [`crate::config::ConfigStore`].

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Extension, State};
use axum::Json;

use crate::auth::{require_role, Principal, Role};
use crate::config::ConfigValue;
use crate::error::AppResult;
use crate::state::AppState;

async fn get_namespace(state: &AppState, prefix: &str) -> HashMap<String, ConfigValue> {
    state
        .config_store
        .get_namespace(prefix)
        .await
        .into_iter()
        .map(|(k, v)| (k.trim_start_matches(prefix).to_owned(), v))
        .collect()
}

async fn put_namespace(state: &AppState, prefix: &str, body: HashMap<String, ConfigValue>) {
    for (key, value) in body {
        state.config_store.set(format!("{prefix}{key}"), value).await;
    }
}

pub async fn get_alert_config(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
) -> AppResult<Json<HashMap<String, ConfigValue>>> {
    require_role(&principal, Role::Viewer)?;
    Ok(Json(get_namespace(&state, "alert.").await))
}

pub async fn put_alert_config(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Json(body): Json<HashMap<String, ConfigValue>>,
) -> AppResult<()> {
    require_role(&principal, Role::Operator)?;
    put_namespace(&state, "alert.", body).await;
    state.audit_writer.record("operator", "config.update", "config:alert", serde_json::Value::Null);
    Ok(())
}

pub async fn get_system_settings(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
) -> AppResult<Json<HashMap<String, ConfigValue>>> {
    require_role(&principal, Role::Viewer)?;
    Ok(Json(get_namespace(&state, "system_settings.").await))
}

pub async fn put_system_settings(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Json(body): Json<HashMap<String, ConfigValue>>,
) -> AppResult<()> {
    require_role(&principal, Role::Operator)?;
    put_namespace(&state, "system_settings.", body).await;
    state.audit_writer.record("operator", "config.update", "config:system-settings", serde_json::Value::Null);
    Ok(())
}

pub async fn get_ai_service_config(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
) -> AppResult<Json<HashMap<String, ConfigValue>>> {
    require_role(&principal, Role::Viewer)?;
    Ok(Json(get_namespace(&state, "ai_service.").await))
}

pub async fn put_ai_service_config(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Json(body): Json<HashMap<String, ConfigValue>>,
) -> AppResult<()> {
    require_role(&principal, Role::Operator)?;
    put_namespace(&state, "ai_service.", body).await;
    state.audit_writer.record("operator", "config.update", "config:ai-service", serde_json::Value::Null);
    Ok(())
}
