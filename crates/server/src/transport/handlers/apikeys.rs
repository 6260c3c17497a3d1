// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! API key minting, listing, revocation, and out-of-band validation.

use std::sync::Arc;

use axum::extract::{Extension, Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::{require_role, ApiKeyRecord, ApiKeyScope, Cidr, MintApiKeyRequest, Principal, Role};
use crate::error::{AppError, AppResult};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct MintRequest {
    pub label: String,
    pub role: Role,
    #[serde(default)]
    pub scope: Vec<ApiKeyScope>,
    #[serde(default)]
    pub owner: Option<Uuid>,
    #[serde(default)]
    pub not_before: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    pub not_after: Option<chrono::DateTime<chrono::Utc>>,
    /// Dotted-quad CIDR strings, e.g. `"10.0.0.0/24"`.
    #[serde(default)]
    pub ip_allowlist: Option<Vec<String>>,
}

#[derive(Serialize)]
pub struct MintedKey {
    /// Only ever returned once, at mint time. Nothing is stored that lets
    /// this be recovered later, matching `CredentialStore::validate_api_key`
    /// only ever checking a hash.
    pub token: String,
    pub record: ApiKeyRecord,
}

pub async fn mint_key(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Json(req): Json<MintRequest>,
) -> AppResult<(axum::http::StatusCode, Json<MintedKey>)> {
    require_role(&principal, Role::Operator)?;
    let ip_allowlist = match req.ip_allowlist {
        Some(raw) => {
            let mut parsed = Vec::with_capacity(raw.len());
            for block in raw {
                parsed.push(block.parse::<Cidr>().map_err(AppError::Validation)?);
            }
            Some(parsed)
        }
        None => None,
    };
    let mint_req = MintApiKeyRequest {
        label: req.label,
        role: req.role,
        scope: req.scope,
        owner: req.owner,
        not_before: req.not_before,
        not_after: req.not_after,
        ip_allowlist,
    };
    let (token, record) = state.credentials.mint_api_key(mint_req).await;
    state.audit_writer.record("operator", "apikey.mint", format!("apikey:{}", record.id), serde_json::json!({"label": record.label}));
    Ok((axum::http::StatusCode::CREATED, Json(MintedKey { token, record })))
}

pub async fn list_keys(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
) -> AppResult<Json<Vec<ApiKeyRecord>>> {
    require_role(&principal, Role::Operator)?;
    Ok(Json(state.credentials.list_api_keys().await))
}

pub async fn revoke_key(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> AppResult<axum::http::StatusCode> {
    require_role(&principal, Role::Operator)?;
    let keys = state.credentials.list_api_keys().await;
    let record = keys.into_iter().find(|k| k.id == id).ok_or_else(|| AppError::NotFound("api key".into()))?;
    state.credentials.revoke_api_key(&record.prefix).await?;
    state.audit_writer.record("operator", "apikey.revoke", format!("apikey:{id}"), serde_json::Value::Null);
    Ok(axum::http::StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct ValidateRequest {
    pub token: String,
    #[serde(default)]
    pub scope: Option<ApiKeyScope>,
}

#[derive(Serialize)]
pub struct ValidateResponse {
    pub valid: bool,
    pub label: Option<String>,
    pub role: Option<Role>,
}

/// Lets another service check whether a minted key is still live, carries
/// the scope it needs, and is being called from an IP its allowlist
/// permits — without holding a role that would let it act on the control
/// plane directly.
pub async fn validate_key(
    State(state): State<Arc<AppState>>,
    connect_info: Option<axum::extract::ConnectInfo<std::net::SocketAddr>>,
    Json(req): Json<ValidateRequest>,
) -> Json<ValidateResponse> {
    let client_ip = connect_info.map(|c| c.0.ip());
    match state.credentials.validate_api_key(&req.token, req.scope, client_ip).await {
        Ok(record) => Json(ValidateResponse { valid: true, label: Some(record.label), role: Some(record.role) }),
        Err(_) => Json(ValidateResponse { valid: false, label: None, role: None }),
    }
}
