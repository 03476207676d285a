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

//! In-memory credential store

use crate::{CredentialStore, StoreError, StoreResult, UserRecord};
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

/// Credential store held in a concurrent map
///
/// Records vanish with the process. Insert goes through the map's entry API, which holds the
/// shard lock across the existence check and the write.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    users: DashMap<String, String>,
}

impl MemoryCredentialStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn find_by_nickname(&self, nickname: &str) -> StoreResult<Option<UserRecord>> {
        Ok(self.users.get(nickname).map(|entry| UserRecord {
            nickname: entry.key().clone(),
            password_hash: entry.value().clone(),
        }))
    }

    async fn insert(&self, nickname: &str, password_hash: &str) -> StoreResult<()> {
        match self.users.entry(nickname.to_string()) {
            Entry::Occupied(_) => Err(StoreError::DuplicateNickname(nickname.to_string())),
            Entry::Vacant(vacant) => {
                vacant.insert(password_hash.to_string());
                Ok(())
            }
        }
    }

    async fn count(&self) -> StoreResult<u64> {
        Ok(self.users.len() as u64)
    }
}
