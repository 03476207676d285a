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

//! Core types for the BBS server

use std::fmt;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Unique identifier for a connection (monotonically increasing, never reused)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Create a new connection ID
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the underlying u64 value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Where a connection is in the login dialogue
///
/// Register and login each take two further lines (nickname, then password). Those steps are
/// states of their own so that a connection waiting for its next line never holds up anything.
/// Every state except [`SessionState::Authenticated`] counts as unauthenticated.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Connected, not logged in
    #[default]
    Unauthenticated,
    /// Sent `register`, waiting for a nickname
    AwaitingRegisterNickname,
    /// Waiting for the password of a registration
    AwaitingRegisterPassword {
        /// Nickname given in the previous line
        nickname: String,
    },
    /// Sent `login`, waiting for a nickname
    AwaitingLoginNickname,
    /// Waiting for the password of a login
    AwaitingLoginPassword {
        /// Nickname given in the previous line
        nickname: String,
    },
    /// Logged in
    Authenticated {
        /// The user's nickname
        nickname: String,
    },
}

impl SessionState {
    /// Check if the connection has logged in or registered
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated { .. })
    }

    /// Get the nickname of an authenticated session
    pub fn nickname(&self) -> Option<&str> {
        match self {
            Self::Authenticated { nickname } => Some(nickname),
            _ => None,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unauthenticated => write!(f, "unauthenticated"),
            Self::AwaitingRegisterNickname => write!(f, "register/nickname"),
            Self::AwaitingRegisterPassword { .. } => write!(f, "register/password"),
            Self::AwaitingLoginNickname => write!(f, "login/nickname"),
            Self::AwaitingLoginPassword { .. } => write!(f, "login/password"),
            Self::Authenticated { nickname } => write!(f, "authenticated({})", nickname),
        }
    }
}

/// Connection information snapshot (for non-blocking queries)
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    /// Connection ID
    pub id: ConnectionId,
    /// Peer address
    pub peer_addr: SocketAddr,
    /// Current dialogue state
    pub session: SessionState,
    /// When the connection was created
    pub created_at: Instant,
}

impl ConnectionInfo {
    /// Get the connection duration
    pub fn duration(&self) -> Duration {
        self.created_at.elapsed()
    }
}

/// Server snapshot for non-blocking debug information
#[derive(Debug, Clone)]
pub struct ServerSnapshot {
    /// Number of active connections
    pub active_connections: usize,
    /// Number of active connections that have logged in
    pub authenticated_connections: usize,
    /// Total connections since server start
    pub total_connections: u64,
    /// Server bind address
    pub bind_address: SocketAddr,
    /// Server uptime
    pub uptime: Duration,
}

impl fmt::Display for ServerSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "BbsServer {{ active: {}, authenticated: {}, total: {}, addr: {}, uptime: {:?} }}",
            self.active_connections,
            self.authenticated_connections,
            self.total_connections,
            self.bind_address,
            self.uptime
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id() {
        let id1 = ConnectionId::new(1);
        let id2 = ConnectionId::new(2);

        assert_eq!(id1.as_u64(), 1);
        assert_ne!(id1, id2);
        assert!(id1 < id2);
        assert_eq!(id2.to_string(), "conn-2");
    }

    #[test]
    fn test_session_state_authenticated() {
        assert!(!SessionState::default().is_authenticated());
        assert!(!SessionState::AwaitingLoginPassword {
            nickname: "alice".to_string()
        }
        .is_authenticated());

        let state = SessionState::Authenticated {
            nickname: "alice".to_string(),
        };
        assert!(state.is_authenticated());
        assert_eq!(state.nickname(), Some("alice"));
    }

    #[test]
    fn test_session_state_hides_pending_nickname() {
        let state = SessionState::AwaitingRegisterPassword {
            nickname: "alice".to_string(),
        };
        assert_eq!(state.nickname(), None);
        assert_eq!(state.to_string(), "register/password");
    }
}
