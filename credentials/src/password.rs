//
// Copyright 2017-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Password hashing and verification.
//!
//! Hashes are Argon2id PHC strings with a random per-password salt. Verification compares the
//! derived key in constant time. Both operations are deliberately slow, so async code should use
//! the `*_blocking` variants which run on tokio's blocking pool instead of a runtime worker.

use crate::{StoreError, StoreResult};
use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};

/// Well-formed hash that matches no password.
///
/// Verifying against it costs the same as verifying a real record, which keeps a login for an
/// unknown nickname from answering faster than one with a wrong password.
const DUMMY_HASH: &str = "$argon2id$v=19$m=19456,t=2,p=1$c29tZXNhbHRzb21lc2FsdA$AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";

/// Hash a password using default Argon2 settings.
pub fn hash_password(password: &str) -> StoreResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default()
        .hash_password(password.as_bytes(), &salt)?
        .to_string())
}

/// Verify a password against a stored PHC hash string.
///
/// Returns `Ok(false)` on mismatch and `Err` only when the stored hash cannot be parsed.
pub fn verify_password(password: &str, stored: &str) -> StoreResult<bool> {
    let hash = PasswordHash::new(stored)?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &hash)
        .is_ok())
}

/// Burn one verification against [`DUMMY_HASH`]. Always `false`.
pub fn verify_dummy(password: &str) -> bool {
    let _ = verify_password(password, DUMMY_HASH);
    false
}

/// [`hash_password`] on the blocking pool.
pub async fn hash_password_blocking(password: String) -> StoreResult<String> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| StoreError::Hash(e.to_string()))?
}

/// [`verify_password`] on the blocking pool. A `None` hash runs [`verify_dummy`].
pub async fn verify_password_blocking(password: String, stored: Option<String>) -> StoreResult<bool> {
    tokio::task::spawn_blocking(move || match stored {
        Some(stored) => verify_password(&password, &stored),
        None => Ok(verify_dummy(&password)),
    })
    .await
    .map_err(|e| StoreError::Hash(e.to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("secret").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("secret", &hash).unwrap());
        assert!(!verify_password("wrong", &hash).unwrap());
    }

    #[test]
    fn test_hash_is_salted() {
        let first = hash_password("secret").unwrap();
        let second = hash_password("secret").unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_verify_malformed_hash() {
        assert!(verify_password("secret", "not-a-hash").is_err());
    }

    #[test]
    fn test_dummy_never_verifies() {
        assert!(PasswordHash::new(DUMMY_HASH).is_ok());
        assert!(!verify_dummy(""));
        assert!(!verify_dummy("secret"));
    }

    #[tokio::test]
    async fn test_blocking_variants() {
        let hash = hash_password_blocking("secret".to_string()).await.unwrap();
        assert!(
            verify_password_blocking("secret".to_string(), Some(hash.clone()))
                .await
                .unwrap()
        );
        assert!(
            !verify_password_blocking("wrong".to_string(), Some(hash))
                .await
                .unwrap()
        );
        assert!(
            !verify_password_blocking("secret".to_string(), None)
                .await
                .unwrap()
        );
    }
}
