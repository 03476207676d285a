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

//! Server configuration
//!
//! [`ServerConfig`] is built either in code with the `with_*` methods or read from a TOML file.
//! Every key is optional in the file; missing keys keep their defaults and timeouts are given in
//! whole seconds.
//!
//! ```toml
//! bind_address = "0.0.0.0:2324"
//! max_connections = 1000
//! idle_timeout = 600
//!
//! [storage]
//! backend = "sqlite"
//! path = "telbbs.sqlite"
//! ```

use crate::{BbsError, Result};
use serde::{Deserialize, Deserializer};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use telbbs_credentials::{CredentialStore, MemoryCredentialStore, SqliteCredentialStore};
use tracing::info;

fn seconds<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Duration, D::Error> {
    u64::deserialize(deserializer).map(Duration::from_secs)
}

/// Credential storage backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Single-file SQLite database
    #[default]
    Sqlite,
    /// Process memory; records are lost on exit
    Memory,
}

/// Credential storage configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Which backend to use
    pub backend: StorageBackend,
    /// Database file for the SQLite backend (`:memory:` for a transient database)
    pub path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Sqlite,
            path: "telbbs.sqlite".to_string(),
        }
    }
}

impl StorageConfig {
    /// Use the in-memory backend
    pub fn memory() -> Self {
        Self {
            backend: StorageBackend::Memory,
            ..Default::default()
        }
    }

    /// Use a SQLite database at `path`
    pub fn sqlite(path: impl Into<String>) -> Self {
        Self {
            backend: StorageBackend::Sqlite,
            path: path.into(),
        }
    }

    /// Open the configured store
    pub async fn open(&self) -> Result<Arc<dyn CredentialStore>> {
        let store: Arc<dyn CredentialStore> = match self.backend {
            StorageBackend::Sqlite => Arc::new(SqliteCredentialStore::open(&self.path).await?),
            StorageBackend::Memory => Arc::new(MemoryCredentialStore::new()),
        };
        info!(backend = ?self.backend, users = store.count().await?, "Credential store ready");
        Ok(store)
    }
}

/// Server configuration
///
/// This structure contains all configuration options for the BBS server.
/// Use the builder pattern methods to customize the configuration.
///
/// # Example
///
/// ```
/// use telbbs_server::ServerConfig;
/// use std::time::Duration;
///
/// let config = ServerConfig::default()
///     .with_max_connections(500)
///     .with_idle_timeout(Duration::from_secs(600));
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind the server to
    pub bind_address: SocketAddr,

    /// Maximum number of concurrent connections
    ///
    /// Connections accepted beyond this limit are told the server is full and closed.
    pub max_connections: usize,

    /// Longest accepted input line in bytes
    pub max_line_length: usize,

    /// Timeout for idle connections (no input)
    #[serde(deserialize_with = "seconds")]
    pub idle_timeout: Duration,

    /// Timeout for writing a reply to a client
    #[serde(deserialize_with = "seconds")]
    pub write_timeout: Duration,

    /// Upper bound on how long the accept loop waits before doing housekeeping
    #[serde(deserialize_with = "seconds")]
    pub housekeeping_interval: Duration,

    /// Timeout for graceful shutdown
    ///
    /// Connection workers still running after this long are aborted.
    #[serde(deserialize_with = "seconds")]
    pub shutdown_timeout: Duration,

    /// Credential storage
    pub storage: StorageConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], 2324)),
            max_connections: 1000,
            max_line_length: 1024,
            idle_timeout: Duration::from_secs(600), // 10 minutes
            write_timeout: Duration::from_secs(10),
            housekeeping_interval: Duration::from_secs(30),
            shutdown_timeout: Duration::from_secs(5),
            storage: StorageConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Create a new configuration with the given bind address
    ///
    /// All other settings will use their default values.
    pub fn new(bind_address: SocketAddr) -> Self {
        Self {
            bind_address,
            ..Default::default()
        }
    }

    /// Read and validate a TOML configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| BbsError::Config(format!("{}: {}", path.display(), e)))?;
        let config: Self = toml::from_str(&text)
            .map_err(|e| BbsError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate().map_err(BbsError::Config)?;
        Ok(config)
    }

    /// Read `path` if it exists, otherwise use the defaults
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            info!(path = %path.display(), "Loading configuration");
            Self::load(path)
        } else {
            info!(path = %path.display(), "No configuration file, using defaults");
            Ok(Self::default())
        }
    }

    /// Set the maximum number of concurrent connections
    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the maximum input line length
    pub fn with_max_line_length(mut self, max: usize) -> Self {
        self.max_line_length = max;
        self
    }

    /// Set the idle timeout duration
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Set the write timeout duration
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Set the housekeeping interval
    pub fn with_housekeeping_interval(mut self, interval: Duration) -> Self {
        self.housekeeping_interval = interval;
        self
    }

    /// Set the shutdown timeout duration
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Set the credential storage
    pub fn with_storage(mut self, storage: StorageConfig) -> Self {
        self.storage = storage;
        self
    }

    /// Validate the configuration
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.max_connections == 0 {
            return Err("max_connections must be greater than 0".to_string());
        }

        if self.max_line_length == 0 {
            return Err("max_line_length must be greater than 0".to_string());
        }

        if self.idle_timeout.is_zero() {
            return Err("idle_timeout must be greater than 0".to_string());
        }

        if self.write_timeout.is_zero() {
            return Err("write_timeout must be greater than 0".to_string());
        }

        if self.housekeeping_interval.is_zero() {
            return Err("housekeeping_interval must be greater than 0".to_string());
        }

        if self.shutdown_timeout.is_zero() {
            return Err("shutdown_timeout must be greater than 0".to_string());
        }

        if self.storage.backend == StorageBackend::Sqlite && self.storage.path.is_empty() {
            return Err("storage.path must not be empty".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_address.port(), 2324);
        assert_eq!(config.max_connections, 1000);
        assert_eq!(config.max_line_length, 1024);
        assert_eq!(config.storage.backend, StorageBackend::Sqlite);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_pattern() {
        let config = ServerConfig::default()
            .with_max_connections(500)
            .with_idle_timeout(Duration::from_secs(60))
            .with_storage(StorageConfig::memory());

        assert_eq!(config.max_connections, 500);
        assert_eq!(config.idle_timeout, Duration::from_secs(60));
        assert_eq!(config.storage.backend, StorageBackend::Memory);
    }

    #[test]
    fn test_validation() {
        let mut config = ServerConfig::default();
        assert!(config.validate().is_ok());

        config.max_connections = 0;
        assert!(config.validate().is_err());

        config.max_connections = 1000;
        config.idle_timeout = Duration::ZERO;
        assert!(config.validate().is_err());

        config.idle_timeout = Duration::from_secs(1);
        config.storage = StorageConfig::sqlite("");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_toml() {
        let config: ServerConfig = toml::from_str(
            r#"
            bind_address = "127.0.0.1:4000"
            idle_timeout = 90

            [storage]
            backend = "memory"
            "#,
        )
        .unwrap();

        assert_eq!(config.bind_address, "127.0.0.1:4000".parse().unwrap());
        assert_eq!(config.idle_timeout, Duration::from_secs(90));
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.storage.path, "telbbs.sqlite");
        assert_eq!(config.max_connections, 1000);
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("telbbs.toml");

        std::fs::write(&path, "max_connections = 0\n").unwrap();
        assert!(matches!(ServerConfig::load(&path), Err(BbsError::Config(_))));

        std::fs::write(&path, "max_connections = \"many\"\n").unwrap();
        assert!(matches!(ServerConfig::load(&path), Err(BbsError::Config(_))));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig::load_or_default(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.bind_address, ServerConfig::default().bind_address);
    }

    #[tokio::test]
    async fn test_open_memory_store() {
        let store = StorageConfig::memory().open().await.unwrap();
        store.insert("alice", "hash").await.unwrap();
        assert_eq!(store.count().await.unwrap(), 1);
    }
}
