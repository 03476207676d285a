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

//! Error types for the BBS server

use crate::types::ConnectionId;
use telbbs_credentials::StoreError;
use telbbs_linecodec::LineCodecError;
use thiserror::Error;

/// Result type for operations
pub type Result<T> = std::result::Result<T, BbsError>;

/// BBS server error types
#[derive(Debug, Error)]
pub enum BbsError {
    /// I/O error from the listener or a TCP stream
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Framing error from the line codec
    #[error("Codec error: {0}")]
    Codec(#[from] LineCodecError),

    /// Credential store error
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Invalid or unreadable configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Connection with the given ID was not found
    #[error("Connection {0} not found")]
    ConnectionNotFound(ConnectionId),

    /// Connection has been closed
    #[error("Connection closed")]
    ConnectionClosed,

    /// Operation timed out
    #[error("Operation timed out")]
    Timeout,

    /// Server is not running
    #[error("Server not running")]
    ServerNotRunning,

    /// Server was already started
    #[error("Server already running")]
    ServerAlreadyRunning,

    /// Server has been shut down and cannot be started again
    #[error("Server has been shut down")]
    ServerShutDown,
}

impl BbsError {
    /// Check if the error only concerns a single connection
    ///
    /// Connection errors close the offending connection and nothing else.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            BbsError::ConnectionNotFound(_)
                | BbsError::ConnectionClosed
                | BbsError::Io(_)
                | BbsError::Codec(_)
                | BbsError::Timeout
        )
    }

    /// Check if the error was caused by the peer breaking the line protocol
    pub fn is_protocol_error(&self) -> bool {
        matches!(self, BbsError::Codec(e) if e.is_protocol_violation())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_is_connection_error() {
        assert!(BbsError::ConnectionNotFound(ConnectionId::new(1)).is_connection_error());
        assert!(BbsError::ConnectionClosed.is_connection_error());
        assert!(BbsError::Timeout.is_connection_error());
        assert!(!BbsError::Config("bad".to_string()).is_connection_error());
        assert!(!BbsError::ServerNotRunning.is_connection_error());
    }

    #[test]
    fn test_error_is_protocol_error() {
        let err = BbsError::from(LineCodecError::LineTooLong { limit: 1024 });
        assert!(err.is_protocol_error());
        assert!(err.is_connection_error());
        assert!(!BbsError::ConnectionClosed.is_protocol_error());
    }

    #[test]
    fn test_error_display() {
        let err = BbsError::ConnectionNotFound(ConnectionId::new(42));
        assert_eq!(err.to_string(), "Connection conn-42 not found");

        let err = BbsError::Store(StoreError::DuplicateNickname("alice".to_string()));
        assert_eq!(err.to_string(), "Store error: nickname already exists: alice");
    }
}
