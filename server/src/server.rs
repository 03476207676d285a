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

//! BBS server
//!
//! [`BbsServer`] owns the listening socket and the accept loop. Accepted connections are
//! handed to the [`ConnectionRegistry`], which runs each one on its own worker task.

use crate::{
    BbsConnection, BbsError, ConnectionRegistry, ProtocolHandler, Result, ServerConfig,
    ServerMetrics, ServerSnapshot, WorkerConfig,
};
use std::future::Future;
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use telbbs_credentials::CredentialStore;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Sent to a client that connects while the server is at capacity
pub const SERVER_FULL: &str = "Server is full. Please try again later.\n";

const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Telnet BBS server
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use telbbs_credentials::MemoryCredentialStore;
/// use telbbs_server::{BbsServer, ServerConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = ServerConfig::default();
///     let server = BbsServer::new(config, Arc::new(MemoryCredentialStore::new())).await?;
///
///     server
///         .run_until(async {
///             let _ = tokio::signal::ctrl_c().await;
///         })
///         .await?;
///     Ok(())
/// }
/// ```
pub struct BbsServer {
    config: ServerConfig,
    registry: Arc<ConnectionRegistry>,
    metrics: Arc<ServerMetrics>,
    listener: Arc<TcpListener>,
    bind_address: SocketAddr,
    started_at: Instant,
    running: AtomicBool,
    cancel: CancellationToken,
    accept_handle: tokio::sync::Mutex<Option<JoinHandle<()>>>,
    listener_failed: CancellationToken,
    listener_error: Arc<tokio::sync::Mutex<Option<std::io::Error>>>,
}

impl BbsServer {
    /// Create a server and bind its listening socket
    ///
    /// Connections are not accepted until [`start`](BbsServer::start) is called.
    pub async fn new(config: ServerConfig, store: Arc<dyn CredentialStore>) -> Result<Self> {
        config.validate().map_err(BbsError::Config)?;

        let listener = TcpListener::bind(config.bind_address).await?;
        let bind_address = listener.local_addr()?;

        let metrics = Arc::new(ServerMetrics::new());
        let protocol = Arc::new(ProtocolHandler::new(store, metrics.clone()));
        let worker_config = WorkerConfig {
            idle_timeout: config.idle_timeout,
            write_timeout: config.write_timeout,
            ..WorkerConfig::default()
        };
        let registry = Arc::new(ConnectionRegistry::new(
            protocol,
            metrics.clone(),
            worker_config,
        ));

        info!(bind_address = %bind_address, "BBS server bound");

        Ok(Self {
            config,
            registry,
            metrics,
            listener: Arc::new(listener),
            bind_address,
            started_at: Instant::now(),
            running: AtomicBool::new(false),
            cancel: CancellationToken::new(),
            accept_handle: tokio::sync::Mutex::new(None),
            listener_failed: CancellationToken::new(),
            listener_error: Arc::new(tokio::sync::Mutex::new(None)),
        })
    }

    /// Start accepting connections
    pub async fn start(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(BbsError::ServerShutDown);
        }
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(BbsError::ServerAlreadyRunning);
        }

        info!(bind_address = %self.bind_address, "Starting BBS server");

        let accept_loop = self.accept_loop(self.listener.clone());
        *self.accept_handle.lock().await = Some(tokio::spawn(accept_loop.run()));
        Ok(())
    }

    fn accept_loop<A: Acceptor>(&self, listener: Arc<A>) -> AcceptLoop<A> {
        AcceptLoop {
            listener,
            registry: self.registry.clone(),
            metrics: self.metrics.clone(),
            config: self.config.clone(),
            cancel: self.cancel.clone(),
            failed: self.listener_failed.clone(),
            error: self.listener_error.clone(),
        }
    }

    /// Stop accepting connections and close every live connection
    ///
    /// A server that has been shut down cannot be started again.
    pub async fn shutdown(&self) -> Result<()> {
        if !self.running.swap(false, Ordering::SeqCst) {
            return Err(BbsError::ServerNotRunning);
        }

        info!("Shutting down BBS server");
        self.cancel.cancel();

        if let Some(handle) = self.accept_handle.lock().await.take() {
            if timeout(self.config.shutdown_timeout, handle).await.is_err() {
                warn!("Accept loop did not stop in time");
            }
        }

        self.registry.shutdown(self.config.shutdown_timeout).await;

        info!(
            total_connections = self.metrics.total_connections(),
            "BBS server shutdown complete"
        );
        Ok(())
    }

    /// Run the server until `signal` completes, then shut it down
    ///
    /// If the listener fails first, the server is shut down and the listener's error returned.
    pub async fn run_until<F>(&self, signal: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        self.start().await?;
        tokio::select! {
            _ = signal => self.shutdown().await,
            _ = self.listener_failed.cancelled() => {
                let error = self.listener_error.lock().await.take();
                self.shutdown().await?;
                Err(error.map_or(BbsError::ServerNotRunning, BbsError::Io))
            }
        }
    }

    /// Check if the listener has failed and no more connections will be accepted
    pub fn has_failed(&self) -> bool {
        self.listener_failed.is_cancelled()
    }

    /// Check if the server is accepting connections
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Get the address the server is listening on
    pub fn bind_address(&self) -> SocketAddr {
        self.bind_address
    }

    /// Get the number of live connections
    pub fn connection_count(&self) -> usize {
        self.registry.len()
    }

    /// Get a snapshot of the server state
    pub fn snapshot(&self) -> ServerSnapshot {
        ServerSnapshot {
            active_connections: self.registry.len(),
            authenticated_connections: self.registry.authenticated_count(),
            total_connections: self.metrics.total_connections(),
            bind_address: self.bind_address,
            uptime: self.started_at.elapsed(),
        }
    }

    /// Get the server metrics
    pub fn metrics(&self) -> Arc<ServerMetrics> {
        self.metrics.clone()
    }

    /// Get the connection registry
    pub fn registry(&self) -> Arc<ConnectionRegistry> {
        self.registry.clone()
    }

    /// Get the server configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

impl std::fmt::Debug for BbsServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BbsServer")
            .field("bind_address", &self.bind_address)
            .field("running", &self.is_running())
            .field("connection_count", &self.connection_count())
            .field("uptime", &self.started_at.elapsed())
            .finish()
    }
}

impl Drop for BbsServer {
    fn drop(&mut self) {
        if self.running.swap(false, Ordering::SeqCst) {
            warn!("BbsServer dropped while still running");
        }
        self.cancel.cancel();
    }
}

/// Source of incoming connections
trait Acceptor: Send + Sync + 'static {
    fn accept(&self) -> impl Future<Output = std::io::Result<(TcpStream, SocketAddr)>> + Send;
}

impl Acceptor for TcpListener {
    fn accept(&self) -> impl Future<Output = std::io::Result<(TcpStream, SocketAddr)>> + Send {
        TcpListener::accept(self)
    }
}

/// How the accept loop reacts to a failed `accept`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AcceptFailure {
    /// Only the pending connection was lost
    PerConnection,
    /// Out of descriptors, buffers or memory; may recover once connections close
    ResourceExhausted,
    /// The listener is broken
    Fatal,
}

impl AcceptFailure {
    fn classify(e: &std::io::Error) -> Self {
        match e.kind() {
            ErrorKind::ConnectionAborted
            | ErrorKind::ConnectionReset
            | ErrorKind::Interrupted
            | ErrorKind::WouldBlock
            | ErrorKind::NetworkDown
            | ErrorKind::NetworkUnreachable
            | ErrorKind::HostUnreachable => AcceptFailure::PerConnection,
            ErrorKind::OutOfMemory => AcceptFailure::ResourceExhausted,
            _ => Self::classify_os_error(e.raw_os_error()),
        }
    }

    #[cfg(unix)]
    fn classify_os_error(code: Option<i32>) -> Self {
        match code {
            Some(libc::EMFILE | libc::ENFILE | libc::ENOBUFS | libc::ENOMEM) => {
                AcceptFailure::ResourceExhausted
            }
            Some(libc::EPROTO) => AcceptFailure::PerConnection,
            _ => AcceptFailure::Fatal,
        }
    }

    #[cfg(not(unix))]
    fn classify_os_error(_code: Option<i32>) -> Self {
        AcceptFailure::Fatal
    }
}

struct AcceptLoop<A: Acceptor> {
    listener: Arc<A>,
    registry: Arc<ConnectionRegistry>,
    metrics: Arc<ServerMetrics>,
    config: ServerConfig,
    cancel: CancellationToken,
    failed: CancellationToken,
    error: Arc<tokio::sync::Mutex<Option<std::io::Error>>>,
}

impl<A: Acceptor> AcceptLoop<A> {
    async fn run(self) {
        let mut housekeeping = tokio::time::interval(self.config.housekeeping_interval);
        housekeeping.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => break,

                accepted = self.listener.accept() => match accepted {
                    Ok((socket, peer_addr)) => self.admit(socket, peer_addr),
                    Err(e) => {
                        self.metrics.connection_error();
                        match AcceptFailure::classify(&e) {
                            AcceptFailure::PerConnection => {
                                debug!(error = %e, "Accept failed for one connection");
                            }
                            AcceptFailure::ResourceExhausted => {
                                warn!(error = %e, "Out of resources accepting connection, backing off");
                                tokio::select! {
                                    _ = self.cancel.cancelled() => break,
                                    _ = tokio::time::sleep(ACCEPT_BACKOFF) => {}
                                }
                            }
                            AcceptFailure::Fatal => {
                                error!(error = %e, "Listener failed, no longer accepting connections");
                                *self.error.lock().await = Some(e);
                                self.failed.cancel();
                                break;
                            }
                        }
                    }
                },

                _ = housekeeping.tick() => {
                    debug!(
                        connections = self.registry.len(),
                        authenticated = self.registry.authenticated_count(),
                        "Housekeeping"
                    );
                }
            }
        }

        info!("Accept loop terminated");
    }

    fn admit(&self, socket: TcpStream, peer_addr: SocketAddr) {
        let id = self.registry.next_connection_id();

        if self.registry.len() >= self.config.max_connections {
            warn!(
                connection_id = %id,
                peer_addr = %peer_addr,
                max_connections = self.config.max_connections,
                "Connection limit reached, rejecting"
            );
            self.metrics.connection_rejected();
            tokio::spawn(reject(socket, self.config.write_timeout));
            return;
        }

        match BbsConnection::wrap(socket, id, self.config.max_line_length) {
            Ok(connection) => {
                self.registry.add(connection);
                info!(connection_id = %id, peer_addr = %peer_addr, "Connection accepted");
            }
            Err(e) => {
                warn!(connection_id = %id, peer_addr = %peer_addr, error = %e, "Failed to set up connection");
                self.metrics.connection_error();
            }
        }
    }
}

async fn reject(mut socket: TcpStream, write_timeout: Duration) {
    let _ = timeout(write_timeout, async {
        socket.write_all(SERVER_FULL.as_bytes()).await?;
        socket.shutdown().await
    })
    .await;
}
