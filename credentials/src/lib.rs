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

//! # Telbbs Credentials
//!
//! Persistent nickname/password records for the BBS.
//!
//! The server only depends on the [`CredentialStore`] trait: a lookup by nickname and an insert
//! that refuses duplicates. Two backends are provided:
//!
//! - [`SqliteCredentialStore`] keeps records in a single-file SQLite database. Nickname uniqueness
//!   is a `UNIQUE` column constraint, so two racing registrations can never both succeed.
//! - [`MemoryCredentialStore`] keeps records in a concurrent map for tests and throwaway servers.
//!
//! Passwords are hashed with Argon2id (see [`password`]) before they reach a store; stores only
//! ever see PHC hash strings.
//!
//! # Example
//!
//! ```no_run
//! use telbbs_credentials::{CredentialStore, SqliteCredentialStore, password};
//!
//! # async fn example() -> Result<(), telbbs_credentials::StoreError> {
//! let store = SqliteCredentialStore::open("telbbs.sqlite").await?;
//! let hash = password::hash_password_blocking("secret".to_string()).await?;
//! store.insert("alice", &hash).await?;
//!
//! let record = store.find_by_nickname("alice").await?.expect("just inserted");
//! assert!(password::verify_password("secret", &record.password_hash)?);
//! # Ok(())
//! # }
//! ```

mod error;
mod memory;
pub mod password;
mod sqlite;
mod store;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryCredentialStore;
pub use sqlite::SqliteCredentialStore;
pub use store::{CredentialStore, UserRecord};
