// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory account, API-key, and refresh-token bookkeeping.

use std::collections::HashMap;
use std::net::IpAddr;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::apikey;
use super::cidr::Cidr;
use super::jwt::TokenPair;
use crate::error::{AppError, AppResult};
use crate::time_util::now;

/// A capability an API key can be scoped to. Closed set: nothing outside
/// these four is ever checked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiKeyScope {
    Ingest,
    Read,
    Admin,
    Discovery,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Operator,
    #[default]
    Viewer,
    Agent,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Operator => "operator",
            Self::Viewer => "viewer",
            Self::Agent => "agent",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "operator" => Ok(Self::Operator),
            "viewer" => Ok(Self::Viewer),
            "agent" => Ok(Self::Agent),
            _ => Err(AppError::Authn),
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct Account {
    pub id: Uuid,
    pub username: String,
    #[serde(skip)]
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct RefreshTokenRecord {
    account_id: Uuid,
    expires_at: DateTime<Utc>,
    used: bool,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ApiKeyRecord {
    pub id: Uuid,
    pub prefix: String,
    #[serde(skip_serializing)]
    pub secret_hash: String,
    pub label: String,
    pub role: Role,
    pub scope: Vec<ApiKeyScope>,
    pub owner: Option<Uuid>,
    pub not_before: Option<DateTime<Utc>>,
    pub not_after: Option<DateTime<Utc>>,
    pub ip_allowlist: Option<Vec<Cidr>>,
    pub created_at: DateTime<Utc>,
    pub revoked: bool,
}

impl ApiKeyRecord {
    fn active_at(&self, at: DateTime<Utc>) -> bool {
        if self.revoked {
            return false;
        }
        if let Some(not_before) = self.not_before {
            if at < not_before {
                return false;
            }
        }
        if let Some(not_after) = self.not_after {
            if at > not_after {
                return false;
            }
        }
        true
    }

    fn permits_ip(&self, client_ip: Option<IpAddr>) -> bool {
        match &self.ip_allowlist {
            None => true,
            Some(blocks) => match client_ip {
                Some(ip) => blocks.iter().any(|b| b.contains(ip)),
                None => false,
            },
        }
    }
}

/// Everything needed to mint a new API key beyond the label/role every key
/// has. Grouped into one struct rather than a long parameter list since
/// most callers only ever set a couple of these.
#[derive(Debug, Clone, Default)]
pub struct MintApiKeyRequest {
    pub label: String,
    pub role: Role,
    pub scope: Vec<ApiKeyScope>,
    pub owner: Option<Uuid>,
    pub not_before: Option<DateTime<Utc>>,
    pub not_after: Option<DateTime<Utc>>,
    pub ip_allowlist: Option<Vec<Cidr>>,
}

impl MintApiKeyRequest {
    pub fn new(label: impl Into<String>, role: Role, scope: Vec<ApiKeyScope>) -> Self {
        Self { label: label.into(), role, scope, ..Default::default() }
    }
}

/// Holds operator accounts, outstanding refresh tokens, and minted API
/// keys. Sits behind a single lock: this store is read/written far less
/// often than the hot ingress/evaluator paths, so a plain `RwLock` over a
/// couple of maps is simpler than sharding it.
#[derive(Debug, Default)]
pub struct CredentialStore {
    accounts: RwLock<HashMap<Uuid, Account>>,
    accounts_by_username: RwLock<HashMap<String, Uuid>>,
    refresh_tokens: RwLock<HashMap<String, RefreshTokenRecord>>,
    api_keys: RwLock<HashMap<String, ApiKeyRecord>>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from a loaded checkpoint's API keys. Accounts and refresh
    /// tokens aren't checkpointed — accounts are reseeded at boot from
    /// config, and an outstanding refresh token surviving a restart would
    /// defeat the point of single-use rotation.
    pub fn restore(api_keys: Vec<ApiKeyRecord>) -> Self {
        let store = Self::default();
        let mut map = HashMap::with_capacity(api_keys.len());
        for key in api_keys {
            map.insert(key.prefix.clone(), key);
        }
        *store.api_keys.blocking_write() = map;
        store
    }

    pub async fn create_account(
        &self,
        username: String,
        password_hash: String,
        role: Role,
    ) -> AppResult<Account> {
        let mut by_username = self.accounts_by_username.write().await;
        if by_username.contains_key(&username) {
            return Err(AppError::Conflict(format!("account '{username}' already exists")));
        }
        let account = Account {
            id: Uuid::new_v4(),
            username: username.clone(),
            password_hash,
            role,
            created_at: now(),
        };
        by_username.insert(username, account.id);
        self.accounts.write().await.insert(account.id, account.clone());
        Ok(account)
    }

    pub async fn find_by_username(&self, username: &str) -> Option<Account> {
        let id = *self.accounts_by_username.read().await.get(username)?;
        self.accounts.read().await.get(&id).cloned()
    }

    pub async fn find_by_id(&self, id: Uuid) -> Option<Account> {
        self.accounts.read().await.get(&id).cloned()
    }

    /// Mint and store a new refresh token for `account_id`, valid for
    /// `ttl_secs` seconds.
    pub async fn issue_refresh_token(&self, account_id: Uuid, ttl_secs: i64) -> String {
        let token = Uuid::new_v4().to_string();
        let record = RefreshTokenRecord {
            account_id,
            expires_at: now() + chrono::Duration::seconds(ttl_secs),
            used: false,
        };
        self.refresh_tokens.write().await.insert(token.clone(), record);
        token
    }

    /// Redeem a refresh token exactly once: a second redemption of the same
    /// token is rejected even if it hasn't expired yet, so a stolen and
    /// replayed refresh token is detectable.
    pub async fn redeem_refresh_token(&self, token: &str) -> AppResult<Uuid> {
        let mut tokens = self.refresh_tokens.write().await;
        let record = tokens.get_mut(token).ok_or(AppError::Authn)?;
        if record.used {
            return Err(AppError::Authn);
        }
        if record.expires_at < now() {
            return Err(AppError::Authn);
        }
        record.used = true;
        Ok(record.account_id)
    }

    pub async fn revoke_refresh_token(&self, token: &str) {
        if let Some(record) = self.refresh_tokens.write().await.get_mut(token) {
            record.used = true;
        }
    }

    pub async fn mint_api_key(&self, req: MintApiKeyRequest) -> (String, ApiKeyRecord) {
        let minted = apikey::mint();
        let record = ApiKeyRecord {
            id: Uuid::new_v4(),
            prefix: minted.prefix.clone(),
            secret_hash: minted.secret_hash,
            label: req.label,
            role: req.role,
            scope: req.scope,
            owner: req.owner,
            not_before: req.not_before,
            not_after: req.not_after,
            ip_allowlist: req.ip_allowlist,
            created_at: now(),
            revoked: false,
        };
        self.api_keys.write().await.insert(minted.prefix.clone(), record.clone());
        (minted.token, record)
    }

    /// Verify a presented `mk_<prefix>.<secret>` token against the stored
    /// hash for its prefix, and enforce its activity window, revocation,
    /// IP allowlist, and (if asked for) a required scope.
    ///
    /// Mirrors the credential store's login path: a missing prefix, a
    /// wrong secret, and a revoked/expired key all collapse to the same
    /// [`AppError::Authn`] so a caller can't distinguish "no such key" from
    /// "right key, wrong secret, or no longer active".
    pub async fn validate_api_key(
        &self,
        token: &str,
        required_scope: Option<ApiKeyScope>,
        client_ip: Option<IpAddr>,
    ) -> AppResult<ApiKeyRecord> {
        let (prefix, secret) = apikey::split(token).ok_or(AppError::Authn)?;
        let keys = self.api_keys.read().await;
        let record = keys.get(prefix).ok_or(AppError::Authn)?;
        if !apikey::verify_secret(secret, &record.secret_hash) {
            return Err(AppError::Authn);
        }
        if !record.active_at(now()) {
            return Err(AppError::Authn);
        }
        if !record.permits_ip(client_ip) {
            return Err(AppError::Authz("client ip is not permitted by this key's allowlist".into()));
        }
        if let Some(scope) = required_scope {
            if !record.scope.contains(&scope) {
                return Err(AppError::Authz(format!("api key does not carry the '{scope:?}' scope")));
            }
        }
        Ok(record.clone())
    }

    pub async fn revoke_api_key(&self, prefix: &str) -> AppResult<()> {
        let mut keys = self.api_keys.write().await;
        let record = keys.get_mut(prefix).ok_or_else(|| AppError::NotFound("api key".into()))?;
        record.revoked = true;
        Ok(())
    }

    pub async fn list_api_keys(&self) -> Vec<ApiKeyRecord> {
        self.api_keys.read().await.values().cloned().collect()
    }
}

/// Issue a fresh access/refresh pair for `account_id`, persisting the
/// refresh token in `store`.
pub async fn issue_token_pair(
    store: &CredentialStore,
    issuer: &super::jwt::Issuer,
    account_id: Uuid,
    role: &str,
) -> AppResult<TokenPair> {
    let access_token = issuer.issue_access_token(account_id, role)?;
    let refresh_token = store.issue_refresh_token(account_id, issuer.refresh_ttl_secs()).await;
    Ok(TokenPair { access_token, refresh_token, access_expires_in_secs: issuer.access_ttl_secs() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn duplicate_username_is_a_conflict() {
        let store = CredentialStore::new();
        store.create_account("alice".into(), "hash".into(), Role::Operator).await.expect("creates");
        let result = store.create_account("alice".into(), "hash2".into(), Role::Operator).await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn refresh_token_is_single_use() {
        let store = CredentialStore::new();
        let account_id = Uuid::new_v4();
        let token = store.issue_refresh_token(account_id, 3600).await;
        let redeemed = store.redeem_refresh_token(&token).await.expect("first use succeeds");
        assert_eq!(redeemed, account_id);
        assert!(store.redeem_refresh_token(&token).await.is_err());
    }

    #[tokio::test]
    async fn expired_refresh_token_is_rejected() {
        let store = CredentialStore::new();
        let account_id = Uuid::new_v4();
        let token = store.issue_refresh_token(account_id, -1).await;
        assert!(store.redeem_refresh_token(&token).await.is_err());
    }

    #[tokio::test]
    async fn api_key_round_trips_and_can_be_revoked() {
        let store = CredentialStore::new();
        let (token, record) =
            store.mint_api_key(MintApiKeyRequest::new("ci-agent", Role::Agent, vec![ApiKeyScope::Ingest])).await;
        let verified = store.validate_api_key(&token, None, None).await.expect("verifies");
        assert_eq!(verified.id, record.id);

        store.revoke_api_key(&record.prefix).await.expect("revokes");
        assert!(store.validate_api_key(&token, None, None).await.is_err());
    }

    #[tokio::test]
    async fn missing_scope_is_scope_denied() {
        let store = CredentialStore::new();
        let (token, _) = store.mint_api_key(MintApiKeyRequest::new("read-only", Role::Agent, vec![ApiKeyScope::Read])).await;
        let result = store.validate_api_key(&token, Some(ApiKeyScope::Ingest), None).await;
        assert!(matches!(result, Err(AppError::Authz(_))));
    }

    #[tokio::test]
    async fn ip_outside_allowlist_is_rejected() {
        let store = CredentialStore::new();
        let mut req = MintApiKeyRequest::new("restricted", Role::Agent, vec![ApiKeyScope::Ingest]);
        req.ip_allowlist = Some(vec!["10.0.0.0/24".parse().expect("cidr")]);
        let (token, _) = store.mint_api_key(req).await;

        assert!(store.validate_api_key(&token, None, Some("10.0.0.5".parse().expect("ip"))).await.is_ok());
        let rejected = store.validate_api_key(&token, None, Some("192.168.1.1".parse().expect("ip"))).await;
        assert!(matches!(rejected, Err(AppError::Authz(_))));
    }

    #[tokio::test]
    async fn not_yet_active_key_is_rejected() {
        let store = CredentialStore::new();
        let mut req = MintApiKeyRequest::new("future-key", Role::Agent, vec![]);
        req.not_before = Some(now() + chrono::Duration::hours(1));
        let (token, _) = store.mint_api_key(req).await;
        assert!(store.validate_api_key(&token, None, None).await.is_err());
    }
}
