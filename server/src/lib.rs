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

//! # Telbbs Server
//!
//! A multi-user Telnet BBS. Clients connect over plain TCP, receive a banner and either
//! `register` a new nickname or `login` to an existing one. Once authenticated they can ask for
//! `help` or `exit`.
//!
//! # Architecture
//!
//! ```text
//! BbsServer (accept loop)
//!     ↓
//! ConnectionRegistry
//!     ↓
//! ConnectionWorker → BbsConnection (line framed TCP)
//!     ↓
//! ProtocolHandler → CredentialStore
//! ```
//!
//! Every connection runs on its own task and keeps its dialogue position in a [`SessionState`],
//! so a client sitting at a password prompt never delays anybody else. Nickname uniqueness is
//! enforced by the [`CredentialStore`](telbbs_credentials::CredentialStore), not by the server.
//!
//! # Example
//!
//! ```no_run
//! use telbbs_server::{BbsServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::load_or_default("telbbs.toml")?;
//!     let store = config.storage.open().await?;
//!     let server = BbsServer::new(config, store).await?;
//!     server.start().await?;
//!     Ok(())
//! }
//! ```

mod banner;
mod config;
mod connection;
mod error;
mod metrics;
pub mod protocol;
mod registry;
mod server;
mod types;
mod worker;

pub use banner::BANNER;
pub use config::{ServerConfig, StorageBackend, StorageConfig};
pub use connection::BbsConnection;
pub use error::{BbsError, Result};
pub use metrics::{MetricsSnapshot, ServerMetrics};
pub use protocol::{Disposition, ProtocolHandler, Reply};
pub use registry::{ConnectionRegistry, SHUTDOWN_NOTICE};
pub use server::{BbsServer, SERVER_FULL};
pub use types::{ConnectionId, ConnectionInfo, ServerSnapshot, SessionState};
pub use worker::{ConnectionWorker, ControlMessage, IDLE_TIMEOUT, LINE_TOO_LONG, WorkerConfig};
