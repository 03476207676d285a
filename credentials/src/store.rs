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

//! The credential store interface

use crate::StoreResult;
use async_trait::async_trait;

/// A registered user
#[derive(Clone, PartialEq, Eq)]
pub struct UserRecord {
    /// Unique, case-sensitive nickname
    pub nickname: String,
    /// Argon2 PHC string
    pub password_hash: String,
}

impl std::fmt::Debug for UserRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserRecord")
            .field("nickname", &self.nickname)
            .finish_non_exhaustive()
    }
}

/// Storage for user records, shared by every connection
///
/// Implementations must make [`insert`](CredentialStore::insert) atomic with respect to the
/// uniqueness check: when two callers insert the same nickname concurrently, exactly one
/// succeeds and the other gets [`StoreError::DuplicateNickname`](crate::StoreError).
#[async_trait]
pub trait CredentialStore: Send + Sync + 'static {
    /// Look up a user by exact nickname
    async fn find_by_nickname(&self, nickname: &str) -> StoreResult<Option<UserRecord>>;

    /// Add a user, failing if the nickname is taken
    async fn insert(&self, nickname: &str, password_hash: &str) -> StoreResult<()>;

    /// Number of registered users
    async fn count(&self) -> StoreResult<u64>;
}
