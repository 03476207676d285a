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

//! Telbbs server binary
//!
//! Reads `telbbs.toml` from the working directory when present, otherwise runs with the
//! built-in defaults (port 2324, SQLite database `telbbs.sqlite`). Log output is controlled
//! with `RUST_LOG`.

use telbbs_server::{BbsServer, ServerConfig};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const CONFIG_FILE: &str = "telbbs.toml";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServerConfig::load_or_default(CONFIG_FILE)?;
    let store = config.storage.open().await.inspect_err(|e| {
        error!(error = %e, "Failed to open credential store");
    })?;
    let server = BbsServer::new(config, store).await.inspect_err(|e| {
        error!(error = %e, "Failed to start server");
    })?;

    println!("Server listening on {}", server.bind_address());
    info!("Press Ctrl+C to stop the server");

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for Ctrl+C");
            }
        })
        .await
        .inspect_err(|e| {
            error!(error = %e, "Server stopped with an error");
        })?;
    Ok(())
}
