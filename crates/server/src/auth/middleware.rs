// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Axum middleware enforcing authentication on `/api/v1/*`.
//!
//! Both credential schemes share one header and one gate: every request
//! carries `Authorization: Bearer <token>`, whether `<token>` is a signed
//! JWT access token or a minted `mk_<prefix>.<secret>` API key. Which one
//! it is gets decided by content, not by header prefix — [`apikey::split`]
//! recognizes the `mk_` shape unambiguously, so there's no scheme
//! collision between the two. The result is attached to the request
//! extensions for handlers to read.

use std::sync::Arc;

use axum::extract::connect_info::ConnectInfo;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;

use super::apikey;
use super::store::{ApiKeyScope, Role};
use crate::error::AppError;
use crate::state::AppState;

/// The authenticated principal for a request, attached as a request
/// extension by [`auth_layer`].
#[derive(Debug, Clone)]
pub enum Principal {
    Account { id: uuid::Uuid, role: Role },
    ApiKey { id: uuid::Uuid, role: Role, label: String, scope: Vec<ApiKeyScope> },
}

impl Principal {
    pub fn role(&self) -> Role {
        match self {
            Self::Account { role, .. } => *role,
            Self::ApiKey { role, .. } => *role,
        }
    }
}

const UNAUTHENTICATED_PATHS: &[&str] = &["/api/v1/health", "/livez", "/readyz", "/api/v1/auth/login"];

pub async fn auth_layer(
    State(state): State<Arc<AppState>>,
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, AppError> {
    let path = req.uri().path();
    if UNAUTHENTICATED_PATHS.contains(&path) {
        return Ok(next.run(req).await);
    }

    let token = req
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(AppError::Authn)?
        .to_owned();

    let client_ip = req.extensions().get::<ConnectInfo<std::net::SocketAddr>>().map(|ci| ci.0.ip());

    let principal = if apikey::split(&token).is_some() {
        let record = state.credentials.validate_api_key(&token, None, client_ip).await?;
        Principal::ApiKey { id: record.id, role: record.role, label: record.label, scope: record.scope }
    } else {
        let claims = state.auth_issuer.verify_access_token(&token)?;
        let role: Role = claims.role.parse()?;
        Principal::Account { id: claims.sub, role }
    };

    req.extensions_mut().insert(principal);
    Ok(next.run(req).await)
}

/// Require an API-key principal to carry `scope`. Account principals
/// (operator/viewer JWT sessions) always pass — scope is an API-key-only
/// concept, the same way `require_role` treats `Operator` as satisfying
/// every minimum.
pub fn require_scope(principal: &Principal, scope: super::store::ApiKeyScope) -> Result<(), AppError> {
    match principal {
        Principal::Account { .. } => Ok(()),
        Principal::ApiKey { scope: carried, .. } if carried.contains(&scope) => Ok(()),
        Principal::ApiKey { .. } => Err(AppError::Authz(format!("api key does not carry the '{scope:?}' scope"))),
    }
}

/// Require the current request's principal to hold at least `minimum`
/// role. Operator > Viewer, Operator > Agent for config/rule-mutating
/// endpoints; Agent is otherwise only used for ingress/registration
/// routes which check role explicitly rather than through this helper.
pub fn require_role(principal: &Principal, minimum: Role) -> Result<(), AppError> {
    let ok = match (principal.role(), minimum) {
        (Role::Operator, _) => true,
        (Role::Viewer, Role::Viewer) => true,
        (Role::Agent, Role::Agent) => true,
        _ => false,
    };
    if ok {
        Ok(())
    } else {
        Err(AppError::Authz("insufficient role for this operation".into()))
    }
}
