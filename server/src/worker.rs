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

//! Per-connection worker task
//!
//! Each accepted connection is served by one [`ConnectionWorker`] running on its own task. The
//! worker owns the [`BbsConnection`] and the connection's [`SessionState`]. It alternates between
//! reading a line, handing it to the [`ProtocolHandler`] and writing the reply, while also
//! listening for [`ControlMessage`]s from the registry. Nothing a worker waits on can stall
//! another connection.

use crate::{
    BANNER, BbsConnection, BbsError, ConnectionId, ProtocolHandler, Result, ServerMetrics,
    SessionState,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::select;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, timeout, timeout_at};
use tracing::{debug, info, instrument, trace, warn};

/// Sent before closing a connection whose line exceeded the limit
pub const LINE_TOO_LONG: &str = "Line too long. Disconnecting.\n";
/// Sent before closing a connection that has been silent too long
pub const IDLE_TIMEOUT: &str = "Idle timeout. Disconnecting.\n";

/// Control messages for the worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlMessage {
    /// Close the connection
    Close,
    /// Write text to the connection
    Send(String),
}

/// Worker configuration
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Max time without an input line
    pub idle_timeout: Duration,
    /// Max time for a single write
    pub write_timeout: Duration,
    /// Control channel buffer size
    pub control_buffer_size: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(600),
            write_timeout: Duration::from_secs(10),
            control_buffer_size: 16,
        }
    }
}

/// Serves a single connection until it closes
pub struct ConnectionWorker {
    id: ConnectionId,
    connection: BbsConnection,
    protocol: Arc<ProtocolHandler>,
    metrics: Arc<ServerMetrics>,
    config: WorkerConfig,
    session: SessionState,
    session_tx: watch::Sender<SessionState>,
    control_rx: mpsc::Receiver<ControlMessage>,
}

impl ConnectionWorker {
    /// Create a worker for `connection`
    ///
    /// Returns the worker, the sender for its control channel and a receiver that always holds
    /// the connection's current [`SessionState`].
    pub fn new(
        connection: BbsConnection,
        protocol: Arc<ProtocolHandler>,
        metrics: Arc<ServerMetrics>,
        config: WorkerConfig,
    ) -> (
        Self,
        mpsc::Sender<ControlMessage>,
        watch::Receiver<SessionState>,
    ) {
        let (control_tx, control_rx) = mpsc::channel(config.control_buffer_size.max(1));
        let (session_tx, session_rx) = watch::channel(SessionState::default());

        let worker = Self {
            id: connection.id(),
            connection,
            protocol,
            metrics,
            config,
            session: SessionState::default(),
            session_tx,
            control_rx,
        };

        (worker, control_tx, session_rx)
    }

    /// Get the connection ID
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Run the worker until the connection is finished, then close it
    #[instrument(skip(self), fields(connection_id = %self.id, peer_addr = %self.connection.peer_addr()))]
    pub async fn run(mut self) {
        match self.serve().await {
            Ok(()) => debug!("Connection finished"),
            Err(BbsError::Timeout) => {
                info!("Connection timed out");
                self.metrics.timeout_error();
            }
            Err(e) if e.is_protocol_error() => {
                warn!(error = %e, "Protocol violation");
                self.metrics.protocol_error();
            }
            Err(e) => {
                debug!(error = %e, "Connection failed");
                self.metrics.connection_error();
            }
        }

        if let Err(e) = timeout(self.config.write_timeout, self.connection.close())
            .await
            .unwrap_or(Err(BbsError::Timeout))
        {
            trace!(error = %e, "Close did not complete cleanly");
        }

        while self.control_rx.try_recv().is_ok() {}
        info!(
            lines_received = self.connection.lines_received(),
            messages_sent = self.connection.messages_sent(),
            "Connection closed"
        );
    }

    async fn serve(&mut self) -> Result<()> {
        self.write(&[BANNER]).await?;

        let mut deadline = Instant::now() + self.config.idle_timeout;
        loop {
            select! {
                read = timeout_at(deadline, self.connection.next_line()) => {
                    match read {
                        Ok(Ok(Some(line))) => {
                            deadline = Instant::now() + self.config.idle_timeout;
                            self.metrics.line_received();
                            if self.dispatch(&line).await? {
                                return Ok(());
                            }
                        }
                        Ok(Ok(None)) => return Ok(()),
                        Ok(Err(e)) => {
                            if e.is_protocol_error() {
                                let _ = self.write(&[LINE_TOO_LONG]).await;
                            }
                            return Err(e);
                        }
                        Err(_) => {
                            let _ = self.write(&[IDLE_TIMEOUT]).await;
                            return Err(BbsError::Timeout);
                        }
                    }
                }

                msg = self.control_rx.recv() => {
                    match msg {
                        Some(ControlMessage::Send(text)) => self.write(&[text]).await?,
                        Some(ControlMessage::Close) | None => return Ok(()),
                    }
                }
            }
        }
    }

    /// Handle one input line; returns `true` when the connection should close
    async fn dispatch(&mut self, line: &str) -> Result<bool> {
        let reply = self.protocol.handle_line(&mut self.session, line).await;
        self.session_tx.send_replace(self.session.clone());
        self.write(&reply.messages).await?;
        Ok(reply.is_close())
    }

    async fn write<S: AsRef<str>>(&mut self, messages: &[S]) -> Result<()> {
        timeout(self.config.write_timeout, self.connection.send_all(messages))
            .await
            .map_err(|_| BbsError::Timeout)??;
        for _ in messages {
            self.metrics.message_sent();
        }
        Ok(())
    }
}

impl std::fmt::Debug for ConnectionWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionWorker")
            .field("id", &self.id)
            .field("session", &self.session)
            .finish()
    }
}
