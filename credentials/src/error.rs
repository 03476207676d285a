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

//! Error types for credential storage

use thiserror::Error;

/// Result type for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Credential store error types
#[derive(Debug, Error)]
pub enum StoreError {
    /// A record with this nickname already exists
    #[error("nickname already exists: {0}")]
    DuplicateNickname(String),

    /// The backing database failed
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Applying the schema failed
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Hashing or parsing a password hash failed
    #[error("password hash error: {0}")]
    Hash(String),
}

impl StoreError {
    /// Check if the error is a uniqueness conflict rather than a failure of the store
    pub fn is_duplicate(&self) -> bool {
        matches!(self, StoreError::DuplicateNickname(_))
    }
}

impl From<argon2::password_hash::Error> for StoreError {
    fn from(err: argon2::password_hash::Error) -> Self {
        StoreError::Hash(err.to_string())
    }
}
