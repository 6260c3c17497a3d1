// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Password hashing for operator accounts.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;

use crate::error::AppError;

/// Hash a plaintext password with a freshly generated salt.
pub fn hash_password(plaintext: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plaintext.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("password hashing failed: {e}")))
}

/// Verify a plaintext password against a stored Argon2 hash string.
///
/// Returns `Ok(false)` for a mismatch, never `Err` for wrong credentials:
/// a malformed stored hash is the only error case, and that indicates
/// database corruption rather than a bad login attempt.
pub fn verify_password(plaintext: &str, stored_hash: &str) -> Result<bool, AppError> {
    let parsed = PasswordHash::new(stored_hash)
        .map_err(|e| AppError::Internal(format!("stored password hash is malformed: {e}")))?;
    Ok(Argon2::default().verify_password(plaintext.as_bytes(), &parsed).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_correct_password() {
        let hash = hash_password("correct horse battery staple").expect("hashes");
        assert!(verify_password("correct horse battery staple", &hash).expect("verifies"));
    }

    #[test]
    fn rejects_wrong_password() {
        let hash = hash_password("correct horse battery staple").expect("hashes");
        assert!(!verify_password("wrong password", &hash).expect("verifies"));
    }

    #[test]
    fn distinct_hashes_for_same_password() {
        let a = hash_password("same-input").expect("hashes");
        let b = hash_password("same-input").expect("hashes");
        assert_ne!(a, b, "salts must differ");
    }
}
