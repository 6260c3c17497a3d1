// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Access/refresh token issuance for operator sessions.
//!
//! Access tokens are short-lived, stateless JWTs. Refresh tokens are
//! opaque, one-time-use, and tracked server-side so a presented refresh
//! token can be rotated (and its predecessor rejected) on every use.

use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject: the account id.
    pub sub: Uuid,
    pub role: String,
    pub exp: i64,
    pub iat: i64,
}

pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub access_expires_in_secs: i64,
}

pub struct Issuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl_secs: i64,
    refresh_ttl_secs: i64,
}

impl Issuer {
    pub fn new(secret: &str, access_ttl_secs: i64, refresh_ttl_secs: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            access_ttl_secs,
            refresh_ttl_secs,
        }
    }

    /// Mint a new access token for `account`. Refresh-token minting and
    /// persistence is the caller's responsibility (it needs a credential
    /// store handle); this only produces the opaque value and its TTL.
    pub fn issue_access_token(&self, account_id: Uuid, role: &str) -> Result<String, AppError> {
        let now = Utc::now().timestamp();
        let claims = AccessClaims {
            sub: account_id,
            role: role.to_owned(),
            iat: now,
            exp: now + self.access_ttl_secs,
        };
        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("jwt encoding failed: {e}")))
    }

    pub fn access_ttl_secs(&self) -> i64 {
        self.access_ttl_secs
    }

    pub fn refresh_ttl_secs(&self) -> i64 {
        self.refresh_ttl_secs
    }

    pub fn verify_access_token(&self, token: &str) -> Result<AccessClaims, AppError> {
        let validation = Validation::default();
        decode::<AccessClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|_| AppError::Authn)
    }
}
