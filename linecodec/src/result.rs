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

//! Error types for the line codec

/// Result type for codec operations
pub type LineCodecResult<T> = Result<T, LineCodecError>;

/// Errors produced while framing lines
#[derive(Debug, thiserror::Error)]
pub enum LineCodecError {
    /// A line grew past the configured limit before a newline arrived
    #[error("line exceeds maximum length of {limit} bytes")]
    LineTooLong {
        /// The configured maximum line length in bytes
        limit: usize,
    },

    /// An I/O error from the underlying stream
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LineCodecError {
    /// Check if the error was caused by the peer rather than the transport
    pub fn is_protocol_violation(&self) -> bool {
        matches!(self, LineCodecError::LineTooLong { .. })
    }
}
