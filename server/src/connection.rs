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

//! A single client's line stream

use crate::{BbsError, ConnectionId, Result};
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::time::Instant;
use telbbs_linecodec::LineCodec;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tracing::{debug, info, instrument, trace};

/// A client connection framed into lines
///
/// The connection is owned by exactly one worker task. Dropping it releases the socket, and
/// [`close`](BbsConnection::close) may be called any number of times before that.
pub struct BbsConnection {
    framed: Framed<TcpStream, LineCodec>,

    id: ConnectionId,
    peer_addr: SocketAddr,
    created_at: Instant,

    closed: bool,
    lines_received: u64,
    messages_sent: u64,
}

impl BbsConnection {
    /// Wrap a TCP stream, rejecting input lines longer than `max_line_length` bytes
    #[instrument(skip(socket), fields(connection_id = %id))]
    pub fn wrap(socket: TcpStream, id: ConnectionId, max_line_length: usize) -> Result<Self> {
        let peer_addr = socket.peer_addr()?;
        socket.set_nodelay(true)?;

        info!(peer_addr = %peer_addr, "Creating new BBS connection");

        Ok(Self {
            framed: Framed::new(socket, LineCodec::with_max_length(max_line_length)),
            id,
            peer_addr,
            created_at: Instant::now(),
            closed: false,
            lines_received: 0,
            messages_sent: 0,
        })
    }

    /// Get the connection ID
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Get the peer address
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Get when the connection was created
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Check whether [`close`](BbsConnection::close) has been called
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Get lines received
    pub fn lines_received(&self) -> u64 {
        self.lines_received
    }

    /// Get messages sent
    pub fn messages_sent(&self) -> u64 {
        self.messages_sent
    }

    /// Receive the next input line
    ///
    /// Returns `Ok(None)` once the peer has closed its side or the connection was closed locally.
    /// Cancelling the returned future loses no input; buffered bytes stay in the codec.
    pub async fn next_line(&mut self) -> Result<Option<String>> {
        if self.closed {
            return Ok(None);
        }

        match self.framed.next().await {
            Some(Ok(line)) => {
                self.lines_received += 1;
                trace!(connection_id = %self.id, length = line.len(), "Line received");
                Ok(Some(line))
            }
            Some(Err(e)) => Err(e.into()),
            None => {
                debug!(connection_id = %self.id, "Connection stream ended");
                Ok(None)
            }
        }
    }

    /// Send one message and flush it
    pub async fn send(&mut self, text: &str) -> Result<()> {
        self.send_all([text]).await
    }

    /// Send several messages with a single flush
    pub async fn send_all<I, S>(&mut self, messages: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if self.closed {
            return Err(BbsError::ConnectionClosed);
        }

        for message in messages {
            self.framed.feed(message.as_ref()).await?;
            self.messages_sent += 1;
        }
        SinkExt::<&str>::flush(&mut self.framed).await?;
        Ok(())
    }

    /// Flush pending output and shut down the write side
    ///
    /// Only the first call touches the socket; later calls return `Ok(())` immediately.
    #[instrument(skip(self), fields(connection_id = %self.id))]
    pub async fn close(&mut self) -> Result<()> {
        if self.closed {
            trace!("Connection already closed");
            return Ok(());
        }
        self.closed = true;

        let flushed = SinkExt::<&str>::flush(&mut self.framed).await;
        let shutdown = self.framed.get_mut().shutdown().await;
        debug!(
            lines_received = self.lines_received,
            messages_sent = self.messages_sent,
            "Connection closed"
        );

        flushed?;
        shutdown?;
        Ok(())
    }
}

impl std::fmt::Debug for BbsConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BbsConnection")
            .field("id", &self.id)
            .field("peer_addr", &self.peer_addr)
            .field("created_at", &self.created_at)
            .field("closed", &self.closed)
            .finish()
    }
}
