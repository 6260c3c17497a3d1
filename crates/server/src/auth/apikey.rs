// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! API keys for agent-to-control-plane authentication.
//!
//! A minted key has the shape `mk_<prefix>.<secret>`: the prefix is stored
//! in the clear as a lookup index, the secret is hashed with SHA-256 before
//! it ever touches storage, and verification compares digests in constant
//! time.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::Rng;
use sha2::{Digest, Sha256};

use super::crypto::constant_time_eq;

const PREFIX_BYTES: usize = 9;
const SECRET_BYTES: usize = 24;

/// A freshly minted key: `token` is shown to the caller exactly once,
/// `prefix` and `secret_hash` are what gets persisted.
pub struct MintedApiKey {
    pub token: String,
    pub prefix: String,
    pub secret_hash: String,
}

fn random_b64(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::rng().fill(bytes.as_mut_slice());
    URL_SAFE_NO_PAD.encode(bytes)
}

fn hash_secret(secret: &str) -> String {
    hex::encode(Sha256::digest(secret.as_bytes()))
}

pub fn mint() -> MintedApiKey {
    let prefix = random_b64(PREFIX_BYTES);
    let secret = random_b64(SECRET_BYTES);
    let token = format!("mk_{prefix}.{secret}");
    MintedApiKey { token, prefix, secret_hash: hash_secret(&secret) }
}

/// Split a presented token into its lookup prefix and secret half.
pub fn split(token: &str) -> Option<(&str, &str)> {
    let rest = token.strip_prefix("mk_")?;
    rest.split_once('.')
}

/// Verify a presented secret against a stored hash, constant-time.
pub fn verify_secret(secret: &str, stored_hash: &str) -> bool {
    constant_time_eq(&hash_secret(secret), stored_hash)
}
