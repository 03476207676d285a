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

//! SQLite-backed credential store

use crate::{CredentialStore, StoreError, StoreResult, UserRecord};
use async_trait::async_trait;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

static MEMDB_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Credential store persisted in a single SQLite file
///
/// The `users` table is created by the embedded migrations on open. Nickname uniqueness is
/// enforced by the schema, so [`insert`](CredentialStore::insert) needs no lookup of its own.
#[derive(Clone)]
pub struct SqliteCredentialStore {
    pool: SqlitePool,
}

impl SqliteCredentialStore {
    /// Connection acquire timeout
    const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

    /// Maximum time a pooled connection may sit idle
    const IDLE_TIMEOUT: Duration = Duration::from_secs(60);

    /// Open (creating if needed) the database at `path`.
    ///
    /// The special path `:memory:` opens a private in-memory database.
    pub async fn open(path: &str) -> StoreResult<Self> {
        let pool = if path == ":memory:" {
            // A named shared-cache database per store; it lives as long as its one pooled connection.
            let id = MEMDB_COUNTER.fetch_add(1, Ordering::Relaxed);
            let uri = format!(
                "file:telbbs-memdb-{}-{}?mode=memory&cache=shared",
                std::process::id(),
                id
            );
            let options = SqliteConnectOptions::new()
                .filename(&uri)
                .shared_cache(true)
                .create_if_missing(true);

            SqlitePoolOptions::new()
                .min_connections(1)
                .max_connections(1)
                .acquire_timeout(Self::ACQUIRE_TIMEOUT)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            if let Some(parent) = Path::new(path).parent() {
                if !parent.as_os_str().is_empty() {
                    if let Err(e) = std::fs::create_dir_all(parent) {
                        warn!(path = %parent.display(), error = %e, "Failed to create database directory");
                    }
                }
            }

            let options = SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true);

            let pool = SqlitePoolOptions::new()
                .max_connections(5)
                .acquire_timeout(Self::ACQUIRE_TIMEOUT)
                .idle_timeout(Some(Self::IDLE_TIMEOUT))
                .connect_with(options)
                .await?;

            sqlx::query("PRAGMA journal_mode=WAL").execute(&pool).await?;
            pool
        };

        info!(path = %path, "Credential database connected");

        sqlx::migrate!("./migrations").run(&pool).await?;
        debug!("Credential database migrations applied");

        Ok(Self { pool })
    }

    /// Open a private in-memory database
    pub async fn in_memory() -> StoreResult<Self> {
        Self::open(":memory:").await
    }

    /// Get reference to the underlying connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close every pooled connection
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl CredentialStore for SqliteCredentialStore {
    #[instrument(skip(self))]
    async fn find_by_nickname(&self, nickname: &str) -> StoreResult<Option<UserRecord>> {
        let row = sqlx::query_as::<_, (String, String)>(
            "SELECT nickname, password FROM users WHERE nickname = ?",
        )
        .bind(nickname)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(nickname, password_hash)| UserRecord {
            nickname,
            password_hash,
        }))
    }

    #[instrument(skip(self, password_hash))]
    async fn insert(&self, nickname: &str, password_hash: &str) -> StoreResult<()> {
        sqlx::query("INSERT INTO users (nickname, password) VALUES (?, ?)")
            .bind(nickname)
            .bind(password_hash)
            .execute(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                    StoreError::DuplicateNickname(nickname.to_string())
                }
                other => StoreError::from(other),
            })?;

        debug!("User record inserted");
        Ok(())
    }

    async fn count(&self) -> StoreResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }
}

impl std::fmt::Debug for SqliteCredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteCredentialStore")
            .field("connections", &self.pool.size())
            .field("closed", &self.pool.is_closed())
            .finish()
    }
}
