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

//! Connection registry
//!
//! The registry tracks every live connection: its control channel, its worker task and a view of
//! its session state. Entries are added when a connection is accepted and removed by the worker
//! itself when it finishes, so the registry never holds a connection whose socket is gone for
//! longer than it takes the worker to exit.

use crate::{
    BbsConnection, BbsError, ConnectionId, ConnectionInfo, ConnectionWorker, ControlMessage,
    ProtocolHandler, Result, ServerMetrics, SessionState, WorkerConfig,
};
use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Sent to every connection when the server shuts down
pub const SHUTDOWN_NOTICE: &str = "Server is shutting down. Goodbye.\n";

/// Registered connection
struct RegistryEntry {
    control_tx: mpsc::Sender<ControlMessage>,
    worker_handle: JoinHandle<()>,
    session: watch::Receiver<SessionState>,
    peer_addr: SocketAddr,
    created_at: Instant,
}

impl RegistryEntry {
    fn info(&self, id: ConnectionId) -> ConnectionInfo {
        ConnectionInfo {
            id,
            peer_addr: self.peer_addr,
            session: self.session.borrow().clone(),
            created_at: self.created_at,
        }
    }
}

/// Unregisters a connection when its worker task ends, whether it returned or was aborted
struct WorkerGuard {
    id: ConnectionId,
    connections: Arc<DashMap<ConnectionId, RegistryEntry>>,
    metrics: Arc<ServerMetrics>,
    created_at: Instant,
}

impl Drop for WorkerGuard {
    fn drop(&mut self) {
        self.connections.remove(&self.id);
        self.metrics.connection_closed(self.created_at.elapsed());
    }
}

/// Registry of live connections
pub struct ConnectionRegistry {
    connections: Arc<DashMap<ConnectionId, RegistryEntry>>,
    next_id: AtomicU64,
    metrics: Arc<ServerMetrics>,
    protocol: Arc<ProtocolHandler>,
    worker_config: WorkerConfig,
}

impl ConnectionRegistry {
    /// Create an empty registry
    pub fn new(
        protocol: Arc<ProtocolHandler>,
        metrics: Arc<ServerMetrics>,
        worker_config: WorkerConfig,
    ) -> Self {
        Self {
            connections: Arc::new(DashMap::new()),
            next_id: AtomicU64::new(1),
            metrics,
            protocol,
            worker_config,
        }
    }

    /// Allocate the next connection ID
    ///
    /// IDs increase monotonically and are never reused, including IDs handed out to
    /// connections that were rejected.
    pub fn next_connection_id(&self) -> ConnectionId {
        ConnectionId::new(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Register a connection and spawn its worker
    pub fn add(&self, connection: BbsConnection) -> ConnectionId {
        let id = connection.id();
        let peer_addr = connection.peer_addr();
        let created_at = connection.created_at();

        let (worker, control_tx, session) = ConnectionWorker::new(
            connection,
            self.protocol.clone(),
            self.metrics.clone(),
            self.worker_config.clone(),
        );

        // The worker must not start (and possibly finish) before its entry exists.
        let (ready_tx, ready_rx) = oneshot::channel::<()>();
        let connections = self.connections.clone();
        let metrics = self.metrics.clone();
        let worker_handle = tokio::spawn(async move {
            let _guard = WorkerGuard {
                id,
                connections,
                metrics,
                created_at,
            };
            if ready_rx.await.is_ok() {
                worker.run().await;
            }
        });

        self.connections.insert(
            id,
            RegistryEntry {
                control_tx,
                worker_handle,
                session,
                peer_addr,
                created_at,
            },
        );
        self.metrics.connection_opened();
        let _ = ready_tx.send(());

        debug!(connection_id = %id, peer_addr = %peer_addr, "Connection registered");
        id
    }

    /// Close a connection and wait for its worker to finish
    ///
    /// Returns `false` if no connection with this ID was registered.
    pub async fn remove(&self, id: ConnectionId) -> bool {
        let Some((_, entry)) = self.connections.remove(&id) else {
            return false;
        };

        let _ = entry.control_tx.send(ControlMessage::Close).await;
        let abort = entry.worker_handle.abort_handle();
        let timeout = self.worker_config.write_timeout * 2;
        if tokio::time::timeout(timeout, entry.worker_handle)
            .await
            .is_err()
        {
            warn!(connection_id = %id, "Worker did not stop in time, aborting");
            abort.abort();
        }
        true
    }

    /// Ask a connection to close without waiting for it
    pub fn close(&self, id: ConnectionId) -> Result<()> {
        let entry = self
            .connections
            .get(&id)
            .ok_or(BbsError::ConnectionNotFound(id))?;
        entry
            .control_tx
            .try_send(ControlMessage::Close)
            .map_err(|_| BbsError::ConnectionClosed)
    }

    /// Queue text to be written to a connection
    pub async fn send(&self, id: ConnectionId, text: impl Into<String>) -> Result<()> {
        let control_tx = self
            .connections
            .get(&id)
            .map(|entry| entry.control_tx.clone())
            .ok_or(BbsError::ConnectionNotFound(id))?;
        control_tx
            .send(ControlMessage::Send(text.into()))
            .await
            .map_err(|_| BbsError::ConnectionClosed)
    }

    /// Get the IDs of all live connections in ascending order
    pub fn snapshot(&self) -> Vec<ConnectionId> {
        let mut ids: Vec<_> = self.connections.iter().map(|entry| *entry.key()).collect();
        ids.sort_unstable();
        ids
    }

    /// Get the number of live connections
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Check if no connections are live
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Check if a connection is registered
    pub fn contains(&self, id: ConnectionId) -> bool {
        self.connections.contains_key(&id)
    }

    /// Get connection info
    pub fn info(&self, id: ConnectionId) -> Option<ConnectionInfo> {
        self.connections.get(&id).map(|entry| entry.info(id))
    }

    /// Get info for all live connections in ascending ID order
    pub fn infos(&self) -> Vec<ConnectionInfo> {
        let mut infos: Vec<_> = self
            .connections
            .iter()
            .map(|entry| entry.value().info(*entry.key()))
            .collect();
        infos.sort_unstable_by_key(|info| info.id);
        infos
    }

    /// Get the number of logged-in connections
    pub fn authenticated_count(&self) -> usize {
        self.connections
            .iter()
            .filter(|entry| entry.session.borrow().is_authenticated())
            .count()
    }

    /// Notify and close every connection
    ///
    /// Workers get `timeout` to say goodbye; any still running afterwards are aborted.
    pub async fn shutdown(&self, timeout: Duration) {
        let ids = self.snapshot();
        info!(connections = ids.len(), "Closing all connections");

        let mut handles = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some((_, entry)) = self.connections.remove(&id) {
                if let Err(e) = entry
                    .control_tx
                    .try_send(ControlMessage::Send(SHUTDOWN_NOTICE.to_string()))
                {
                    debug!(connection_id = %id, error = %e, "Could not queue shutdown notice");
                }
                if let Err(e) = entry.control_tx.try_send(ControlMessage::Close) {
                    debug!(connection_id = %id, error = %e, "Could not queue close");
                }
                handles.push(entry.worker_handle);
            }
        }

        let aborts: Vec<_> = handles.iter().map(|h| h.abort_handle()).collect();
        if tokio::time::timeout(timeout, futures_util::future::join_all(handles))
            .await
            .is_err()
        {
            warn!("Some connections did not close in time, aborting them");
            for abort in aborts {
                abort.abort();
            }
        }
    }
}

impl std::fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("connection_count", &self.len())
            .field("next_id", &self.next_id.load(Ordering::Relaxed))
            .finish()
    }
}
