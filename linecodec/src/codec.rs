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

use crate::{LineCodecError, LineCodecResult};
use bytes::{Buf, BufMut, BytesMut};
use std::cmp;
use tokio_util::codec::{Decoder, Encoder};
use tracing::{trace, warn};

/// Newline-delimited text codec with a bounded line length
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineCodec {
    /// Maximum number of bytes in a line, excluding the newline
    max_length: usize,
    /// Offset into the buffer where the next newline scan starts
    next_index: usize,
    /// Set after an over-long line until the next newline is consumed
    discarding: bool,
}

impl LineCodec {
    /// Line limit used when none is given, matching a 1 KiB read buffer
    pub const DEFAULT_MAX_LENGTH: usize = 1024;

    /// Create a codec with the default line limit
    pub fn new() -> Self {
        Self::with_max_length(Self::DEFAULT_MAX_LENGTH)
    }

    /// Create a codec that rejects lines longer than `max_length` bytes
    pub fn with_max_length(max_length: usize) -> Self {
        LineCodec {
            max_length,
            next_index: 0,
            discarding: false,
        }
    }

    /// Get the configured line limit
    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Check whether the codec is skipping the remainder of an over-long line
    pub fn is_discarding(&self) -> bool {
        self.discarding
    }

    /// Check if unterminated input in `src` can no longer become a line within the limit
    fn exceeds_limit(&self, src: &BytesMut) -> bool {
        let limit = self.max_length;
        src.len() > limit.saturating_add(1)
            || (src.len() == limit.saturating_add(1) && src.get(limit) != Some(&b'\r'))
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

/// Convert raw line bytes into text, dropping the terminator and trailing whitespace.
fn to_line(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim_end_matches([' ', '\t', '\r', '\n', '\0', '\x0B'])
        .to_string()
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = LineCodecError;

    /// Decode the next complete line from `src`.
    ///
    /// Returns `Ok(None)` while no newline has arrived. Bytes already scanned are remembered so
    /// repeated calls on a slowly growing buffer do not rescan from the start.
    fn decode(&mut self, src: &mut BytesMut) -> LineCodecResult<Option<String>> {
        loop {
            // A full-length line may still be followed by `\r\n`.
            let read_to = cmp::min(self.max_length.saturating_add(2), src.len());
            let newline = src[self.next_index..read_to]
                .iter()
                .position(|byte| *byte == b'\n');

            match (self.discarding, newline) {
                (true, Some(offset)) => {
                    src.advance(self.next_index + offset + 1);
                    self.discarding = false;
                    self.next_index = 0;
                }
                (true, None) => {
                    src.advance(read_to);
                    self.next_index = 0;
                    if src.is_empty() {
                        return Ok(None);
                    }
                }
                (false, Some(offset)) => {
                    let index = self.next_index + offset;
                    self.next_index = 0;
                    let mut line = src.split_to(index + 1);
                    line.truncate(index);
                    if line.last() == Some(&b'\r') {
                        line.truncate(index - 1);
                    }
                    if line.len() > self.max_length {
                        warn!(limit = self.max_length, "Line exceeds maximum length");
                        return Err(LineCodecError::LineTooLong {
                            limit: self.max_length,
                        });
                    }
                    let line = to_line(&line);
                    trace!(length = line.len(), "Decoded line");
                    return Ok(Some(line));
                }
                (false, None) if self.exceeds_limit(src) => {
                    warn!(limit = self.max_length, "Line exceeds maximum length");
                    self.discarding = true;
                    return Err(LineCodecError::LineTooLong {
                        limit: self.max_length,
                    });
                }
                (false, None) => {
                    self.next_index = read_to;
                    return Ok(None);
                }
            }
        }
    }

    /// Decode the final line when the peer has closed its side.
    ///
    /// An unterminated trailing fragment is returned as a line of its own.
    fn decode_eof(&mut self, src: &mut BytesMut) -> LineCodecResult<Option<String>> {
        if let Some(line) = self.decode(src)? {
            return Ok(Some(line));
        }
        self.next_index = 0;
        if src.is_empty() || self.discarding {
            src.clear();
            self.discarding = false;
            return Ok(None);
        }
        let fragment = src.split_to(src.len());
        Ok(Some(to_line(&fragment)))
    }
}

impl<'a> Encoder<&'a str> for LineCodec {
    type Error = LineCodecError;

    fn encode(&mut self, item: &'a str, dst: &mut BytesMut) -> LineCodecResult<()> {
        dst.reserve(item.len());
        dst.put(item.as_bytes());
        Ok(())
    }
}

impl Encoder<String> for LineCodec {
    type Error = LineCodecError;

    fn encode(&mut self, item: String, dst: &mut BytesMut) -> LineCodecResult<()> {
        Encoder::<&str>::encode(self, item.as_str(), dst)
    }
}
