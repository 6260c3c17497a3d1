// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Operator session lifecycle: login, refresh, logout.

use std::sync::Arc;

use axum::extract::{Extension, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::auth::jwt::TokenPair;
use crate::auth::store::issue_token_pair;
use crate::auth::{require_role, Account, Principal, Role};
use crate::error::{AppError, AppResult};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub access_expires_in_secs: i64,
}

impl From<TokenPair> for TokenResponse {
    fn from(pair: TokenPair) -> Self {
        Self {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            access_expires_in_secs: pair.access_expires_in_secs,
        }
    }
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> AppResult<Json<TokenResponse>> {
    let account = state.credentials.find_by_username(&req.username).await.ok_or(AppError::Authn)?;
    if !crate::auth::password::verify_password(&req.password, &account.password_hash)? {
        state.audit_writer.record(
            req.username.clone(),
            "auth.login",
            "session",
            serde_json::json!({"result": "failure"}),
        );
        return Err(AppError::Authn);
    }

    let pair = issue_token_pair(&state.credentials, &state.auth_issuer, account.id, account.role.as_str()).await?;
    state.audit_writer.record(account.username.clone(), "auth.login", "session", serde_json::json!({"result": "success"}));
    Ok(Json(pair.into()))
}

#[derive(Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub password: String,
    pub role: Role,
}

/// Operator-facing account creation. The bootstrap admin seeded at first
/// boot is a one-time special case; this is the ordinary way additional
/// operator/viewer accounts come to exist.
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Json(req): Json<CreateUserRequest>,
) -> AppResult<(axum::http::StatusCode, Json<Account>)> {
    require_role(&principal, Role::Operator)?;
    let hash = crate::auth::password::hash_password(&req.password)?;
    let account = state.credentials.create_account(req.username.clone(), hash, req.role).await?;
    state.audit_writer.record("operator", "user.create", format!("account:{}", account.id), serde_json::json!({"username": req.username, "role": account.role.as_str()}));
    Ok((axum::http::StatusCode::CREATED, Json(account)))
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

pub async fn refresh(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RefreshRequest>,
) -> AppResult<Json<TokenResponse>> {
    let account_id = match state.credentials.redeem_refresh_token(&req.refresh_token).await {
        Ok(id) => id,
        Err(e) => {
            state.audit_writer.record(
                "unknown",
                "refresh_replay",
                "session",
                serde_json::json!({"result": "failure"}),
            );
            return Err(e);
        }
    };
    let account = state.credentials.find_by_id(account_id).await.ok_or(AppError::Authn)?;
    let pair = issue_token_pair(&state.credentials, &state.auth_issuer, account_id, account.role.as_str()).await?;
    state.audit_writer.record(account.username, "auth.refresh", "session", serde_json::Value::Null);
    Ok(Json(pair.into()))
}

#[derive(Deserialize)]
pub struct LogoutRequest {
    pub refresh_token: String,
}

pub async fn logout(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LogoutRequest>,
) -> AppResult<()> {
    state.credentials.revoke_refresh_token(&req.refresh_token).await;
    state.audit_writer.record("session", "auth.logout", "session", serde_json::Value::Null);
    Ok(())
}
