// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Authentication: operator accounts (password + JWT session), agent API
//! keys, and the axum middleware that gates the HTTP surface.

pub mod apikey;
pub mod cidr;
pub mod crypto;
pub mod jwt;
pub mod middleware;
pub mod password;
pub mod store;

pub use cidr::Cidr;
pub use middleware::{auth_layer, require_role, require_scope, Principal};
pub use store::{Account, ApiKeyRecord, ApiKeyScope, CredentialStore, MintApiKeyRequest, Role};
