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

//! Authentication dialogue and command dispatch
//!
//! [`ProtocolHandler::handle_line`] consumes exactly one input line, advances the connection's
//! [`SessionState`] and returns the text to send back. It never waits for more input, so the
//! nickname and password steps of `register` and `login` are separate calls driven by separate
//! lines.
//!
//! ```text
//! Unauthenticated --register--> AwaitingRegisterNickname --line--> AwaitingRegisterPassword
//!        ^                                                                |
//!        +---------- empty input / nickname taken ------------------------+
//!                                                                         | stored
//!                                                                         v
//! Unauthenticated --login--> AwaitingLoginNickname --line--> AwaitingLoginPassword --ok--> Authenticated
//!                                                                  |
//!                                                                  +-- failed --> close
//! ```
//!
//! A failed login always closes the connection, while unknown input before login does not.

use crate::{ServerMetrics, SessionState};
use std::sync::Arc;
use telbbs_credentials::{CredentialStore, StoreError, password};
use tracing::{debug, error, info, warn};

/// Prompt for the nickname step
pub const PROMPT_NICKNAME: &str = "Enter nickname: ";
/// Prompt for the password step
pub const PROMPT_PASSWORD: &str = "Enter password: ";
/// Reply to unrecognised or empty input before login
pub const INVALID_INPUT: &str = "Invalid input. Please try again.\n";
/// Reply when registering a nickname that is taken
pub const NICKNAME_EXISTS: &str = "Nickname already exists. Please choose a different one.\n";
/// Reply to a successful registration
pub const REGISTRATION_SUCCESSFUL: &str = "Registration successful. You are now logged in.\n";
/// Reply to a failed login
pub const INVALID_CREDENTIALS: &str = "Invalid nickname or password. Please try again.\n";
/// Hint sent after logging in
pub const HELP_HINT: &str = "Type 'help' for available commands.\n";
/// Reply to `help`
pub const AVAILABLE_COMMANDS: &str = "Available commands: exit, help\n";
/// Reply to an unknown command after login
pub const UNKNOWN_COMMAND: &str = "Unknown command. Type 'help' for available commands.\n";
/// Reply to `exit`
pub const GOODBYE: &str = "Goodbye.\n";
/// Reply when the credential store fails
pub const INTERNAL_ERROR: &str = "Internal error. Please try again later.\n";

/// What happens to the connection after a reply is written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Keep reading input
    Continue,
    /// Close the connection
    Close,
}

/// Output of one dispatch step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Messages to write, in order
    pub messages: Vec<String>,
    /// Whether the connection stays open
    pub disposition: Disposition,
}

impl Reply {
    fn say(message: impl Into<String>) -> Self {
        Self {
            messages: vec![message.into()],
            disposition: Disposition::Continue,
        }
    }

    fn and(mut self, message: impl Into<String>) -> Self {
        self.messages.push(message.into());
        self
    }

    fn then_close(mut self) -> Self {
        self.disposition = Disposition::Close;
        self
    }

    /// Check if the connection should be closed
    pub fn is_close(&self) -> bool {
        self.disposition == Disposition::Close
    }

    /// All messages concatenated
    pub fn text(&self) -> String {
        self.messages.concat()
    }
}

/// The command interpreter shared by every connection
pub struct ProtocolHandler {
    store: Arc<dyn CredentialStore>,
    metrics: Arc<ServerMetrics>,
}

impl ProtocolHandler {
    /// Create a handler backed by `store`
    pub fn new(store: Arc<dyn CredentialStore>, metrics: Arc<ServerMetrics>) -> Self {
        Self { store, metrics }
    }

    /// Get the credential store
    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    /// Interpret one line against `state`, updating it in place
    pub async fn handle_line(&self, state: &mut SessionState, line: &str) -> Reply {
        let (next, reply) = match std::mem::take(state) {
            SessionState::Unauthenticated => Self::unauthenticated(line),
            SessionState::AwaitingRegisterNickname => (
                SessionState::AwaitingRegisterPassword {
                    nickname: line.to_string(),
                },
                Reply::say(PROMPT_PASSWORD),
            ),
            SessionState::AwaitingRegisterPassword { nickname } => {
                self.register(nickname, line).await
            }
            SessionState::AwaitingLoginNickname => (
                SessionState::AwaitingLoginPassword {
                    nickname: line.to_string(),
                },
                Reply::say(PROMPT_PASSWORD),
            ),
            SessionState::AwaitingLoginPassword { nickname } => self.login(nickname, line).await,
            SessionState::Authenticated { nickname } => Self::authenticated(nickname, line),
        };

        debug!(state = %next, close = reply.is_close(), "Line dispatched");
        *state = next;
        reply
    }

    fn unauthenticated(line: &str) -> (SessionState, Reply) {
        match line {
            "register" => (
                SessionState::AwaitingRegisterNickname,
                Reply::say(PROMPT_NICKNAME),
            ),
            "login" => (
                SessionState::AwaitingLoginNickname,
                Reply::say(PROMPT_NICKNAME),
            ),
            _ => (SessionState::Unauthenticated, Reply::say(INVALID_INPUT)),
        }
    }

    fn authenticated(nickname: String, line: &str) -> (SessionState, Reply) {
        let reply = match line {
            "exit" => {
                info!(nickname = %nickname, "User exited");
                Reply::say(GOODBYE).then_close()
            }
            "help" => Reply::say(AVAILABLE_COMMANDS),
            _ => Reply::say(UNKNOWN_COMMAND),
        };
        (SessionState::Authenticated { nickname }, reply)
    }

    async fn register(&self, nickname: String, secret: &str) -> (SessionState, Reply) {
        if nickname.is_empty() || secret.is_empty() {
            return (SessionState::Unauthenticated, Reply::say(INVALID_INPUT));
        }

        match self.store.find_by_nickname(&nickname).await {
            Ok(Some(_)) => {
                debug!(nickname = %nickname, "Registration refused, nickname taken");
                return (SessionState::Unauthenticated, Reply::say(NICKNAME_EXISTS));
            }
            Ok(None) => {}
            Err(e) => {
                error!(nickname = %nickname, error = %e, "Credential lookup failed");
                return (SessionState::Unauthenticated, Reply::say(INTERNAL_ERROR));
            }
        }

        let stored = match password::hash_password_blocking(secret.to_string()).await {
            Ok(hash) => self.store.insert(&nickname, &hash).await,
            Err(e) => Err(e),
        };

        match stored {
            Ok(()) => {
                info!(nickname = %nickname, "User registered");
                self.metrics.registration();
                (
                    SessionState::Authenticated { nickname },
                    Reply::say(REGISTRATION_SUCCESSFUL).and(HELP_HINT),
                )
            }
            // Another connection registered the same nickname after our lookup.
            Err(StoreError::DuplicateNickname(_)) => {
                debug!(nickname = %nickname, "Registration lost a race for the nickname");
                (SessionState::Unauthenticated, Reply::say(NICKNAME_EXISTS))
            }
            Err(e) => {
                error!(nickname = %nickname, error = %e, "Failed to store new user");
                (SessionState::Unauthenticated, Reply::say(INTERNAL_ERROR))
            }
        }
    }

    async fn login(&self, nickname: String, secret: &str) -> (SessionState, Reply) {
        if nickname.is_empty() || secret.is_empty() {
            self.metrics.failed_login();
            return (
                SessionState::Unauthenticated,
                Reply::say(INVALID_INPUT).then_close(),
            );
        }

        let stored = match self.store.find_by_nickname(&nickname).await {
            Ok(record) => record.map(|record| record.password_hash),
            Err(e) => {
                error!(nickname = %nickname, error = %e, "Credential lookup failed");
                return (
                    SessionState::Unauthenticated,
                    Reply::say(INTERNAL_ERROR).then_close(),
                );
            }
        };

        let verified = match password::verify_password_blocking(secret.to_string(), stored).await {
            Ok(verified) => verified,
            Err(e) => {
                error!(nickname = %nickname, error = %e, "Stored password hash is unusable");
                false
            }
        };

        if verified {
            info!(nickname = %nickname, "User logged in");
            self.metrics.login();
            let welcome = format!("Login successful. Welcome, {}!\n", nickname);
            (
                SessionState::Authenticated { nickname },
                Reply::say(welcome).and(HELP_HINT),
            )
        } else {
            warn!(nickname = %nickname, "Login failed");
            self.metrics.failed_login();
            (
                SessionState::Unauthenticated,
                Reply::say(INVALID_CREDENTIALS).then_close(),
            )
        }
    }
}

impl std::fmt::Debug for ProtocolHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtocolHandler").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use telbbs_credentials::{MemoryCredentialStore, StoreResult, UserRecord};
    use tracing_test::traced_test;

    fn handler() -> ProtocolHandler {
        ProtocolHandler::new(
            Arc::new(MemoryCredentialStore::new()),
            Arc::new(ServerMetrics::new()),
        )
    }

    async fn run(handler: &ProtocolHandler, state: &mut SessionState, lines: &[&str]) -> Vec<Reply> {
        let mut replies = Vec::new();
        for line in lines {
            replies.push(handler.handle_line(state, line).await);
        }
        replies
    }

    fn authenticated(nickname: &str) -> SessionState {
        SessionState::Authenticated {
            nickname: nickname.to_string(),
        }
    }

    #[tokio::test]
    async fn test_register_flow() {
        let handler = handler();
        let mut state = SessionState::default();

        let replies = run(&handler, &mut state, &["register", "alice", "secret"]).await;

        assert_eq!(replies[0].text(), PROMPT_NICKNAME);
        assert_eq!(replies[1].text(), PROMPT_PASSWORD);
        assert_eq!(
            replies[2].messages,
            vec![REGISTRATION_SUCCESSFUL.to_string(), HELP_HINT.to_string()]
        );
        assert!(replies.iter().all(|r| !r.is_close()));
        assert_eq!(state, authenticated("alice"));

        let record = handler.store().find_by_nickname("alice").await.unwrap().unwrap();
        assert_ne!(record.password_hash, "secret");
        assert!(password::verify_password("secret", &record.password_hash).unwrap());
    }

    #[tokio::test]
    async fn test_register_distinct_nicknames() {
        let handler = handler();

        for nickname in ["alice", "bob", "carol"] {
            let mut state = SessionState::default();
            run(&handler, &mut state, &["register", nickname, "pw"]).await;
            assert_eq!(state, authenticated(nickname));
        }
        assert_eq!(handler.store().count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_register_empty_input() {
        let handler = handler();

        let mut state = SessionState::default();
        let replies = run(&handler, &mut state, &["register", "", "secret"]).await;
        assert_eq!(replies[1].text(), PROMPT_PASSWORD);
        assert_eq!(replies[2].text(), INVALID_INPUT);
        assert!(!replies[2].is_close());
        assert_eq!(state, SessionState::Unauthenticated);

        let replies = run(&handler, &mut state, &["register", "alice", ""]).await;
        assert_eq!(replies[2].text(), INVALID_INPUT);
        assert_eq!(state, SessionState::Unauthenticated);
        assert_eq!(handler.store().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_register_existing_nickname() {
        let handler = handler();
        let mut first = SessionState::default();
        run(&handler, &mut first, &["register", "alice", "secret"]).await;

        let mut second = SessionState::default();
        let replies = run(&handler, &mut second, &["register", "alice", "other"]).await;

        assert_eq!(replies[2].text(), NICKNAME_EXISTS);
        assert!(!replies[2].is_close());
        assert_eq!(second, SessionState::Unauthenticated);
    }

    #[tokio::test]
    async fn test_interleaved_registrations_same_nickname() {
        let handler = handler();
        let mut a = SessionState::default();
        let mut b = SessionState::default();

        // Both connections pass the nickname step before either stores anything.
        run(&handler, &mut a, &["register", "alice"]).await;
        run(&handler, &mut b, &["register", "alice"]).await;

        let (ra, rb) = tokio::join!(
            handler.handle_line(&mut a, "one"),
            handler.handle_line(&mut b, "two"),
        );

        let winners = [&a, &b].iter().filter(|s| s.is_authenticated()).count();
        assert_eq!(winners, 1);
        let texts = [ra.text(), rb.text()];
        assert!(texts.iter().any(|t| t == NICKNAME_EXISTS));
    }

    #[tokio::test]
    async fn test_login_flow() {
        let handler = handler();
        let mut state = SessionState::default();
        run(&handler, &mut state, &["register", "alice", "secret"]).await;

        let mut state = SessionState::default();
        let replies = run(&handler, &mut state, &["login", "alice", "secret"]).await;

        assert_eq!(replies[0].text(), PROMPT_NICKNAME);
        assert_eq!(replies[1].text(), PROMPT_PASSWORD);
        assert_eq!(
            replies[2].messages,
            vec![
                "Login successful. Welcome, alice!\n".to_string(),
                HELP_HINT.to_string()
            ]
        );
        assert!(!replies[2].is_close());
        assert_eq!(state, authenticated("alice"));
    }

    #[tokio::test]
    async fn test_login_wrong_password_closes() {
        let handler = handler();
        let mut state = SessionState::default();
        run(&handler, &mut state, &["register", "alice", "secret"]).await;

        let mut state = SessionState::default();
        let replies = run(&handler, &mut state, &["login", "alice", "wrong"]).await;

        assert_eq!(replies[2].text(), INVALID_CREDENTIALS);
        assert!(replies[2].is_close());
        assert!(!state.is_authenticated());
    }

    #[tokio::test]
    async fn test_login_unknown_nickname_closes() {
        let handler = handler();
        let mut state = SessionState::default();
        let replies = run(&handler, &mut state, &["login", "nobody", "secret"]).await;

        assert_eq!(replies[2].text(), INVALID_CREDENTIALS);
        assert!(replies[2].is_close());
    }

    #[tokio::test]
    async fn test_login_empty_input_closes() {
        let handler = handler();
        let mut state = SessionState::default();
        let replies = run(&handler, &mut state, &["login", "", ""]).await;

        assert_eq!(replies[2].text(), INVALID_INPUT);
        assert!(replies[2].is_close());
    }

    #[tokio::test]
    async fn test_unauthenticated_invalid_input() {
        let handler = handler();
        let mut state = SessionState::default();

        for line in ["help", "exit", "REGISTER", "", " login"] {
            let reply = handler.handle_line(&mut state, line).await;
            assert_eq!(reply.text(), INVALID_INPUT);
            assert!(!reply.is_close());
            assert_eq!(state, SessionState::Unauthenticated);
        }
    }

    #[tokio::test]
    async fn test_authenticated_commands() {
        let handler = handler();
        let mut state = authenticated("alice");

        let reply = handler.handle_line(&mut state, "help").await;
        assert_eq!(reply.text(), AVAILABLE_COMMANDS);
        assert!(!reply.is_close());

        let reply = handler.handle_line(&mut state, "register").await;
        assert_eq!(reply.text(), UNKNOWN_COMMAND);
        assert_eq!(state, authenticated("alice"));

        let reply = handler.handle_line(&mut state, "exit").await;
        assert_eq!(reply.text(), GOODBYE);
        assert!(reply.is_close());
    }

    #[tokio::test]
    #[traced_test]
    async fn test_passwords_are_not_logged() {
        let handler = handler();
        let mut state = SessionState::default();
        run(&handler, &mut state, &["register", "alice", "pa55-unlogged"]).await;

        let mut state = SessionState::default();
        run(&handler, &mut state, &["login", "alice", "wr0ng-unlogged"]).await;

        assert!(logs_contain("User registered"));
        assert!(logs_contain("Login failed"));
        assert!(!logs_contain("pa55-unlogged"));
        assert!(!logs_contain("wr0ng-unlogged"));
    }

    struct BrokenStore;

    #[async_trait]
    impl CredentialStore for BrokenStore {
        async fn find_by_nickname(&self, _nickname: &str) -> StoreResult<Option<UserRecord>> {
            Err(StoreError::Hash("store offline".to_string()))
        }

        async fn insert(&self, _nickname: &str, _password_hash: &str) -> StoreResult<()> {
            Err(StoreError::Hash("store offline".to_string()))
        }

        async fn count(&self) -> StoreResult<u64> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn test_store_failure_is_reported() {
        let handler = ProtocolHandler::new(Arc::new(BrokenStore), Arc::new(ServerMetrics::new()));

        let mut state = SessionState::default();
        let replies = run(&handler, &mut state, &["register", "alice", "secret"]).await;
        assert_eq!(replies[2].text(), INTERNAL_ERROR);
        assert!(!replies[2].is_close());
        assert_eq!(state, SessionState::Unauthenticated);

        let replies = run(&handler, &mut state, &["login", "alice", "secret"]).await;
        assert_eq!(replies[2].text(), INTERNAL_ERROR);
        assert!(replies[2].is_close());
    }
}
