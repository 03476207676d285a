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

//! # Telbbs Line Codec
//!
//! A [`tokio_util::codec`] implementation of the line-oriented framing used by the BBS. Telnet
//! option negotiation is not interpreted; every byte up to a newline belongs to the line.
//!
//! - Input is split on `\n`. A trailing `\r` and any trailing whitespace are stripped, so
//!   `"login\r\n"` decodes to `"login"`.
//! - Partial lines stay buffered between reads. A peer that trickles a command one byte at a time
//!   produces exactly one line once the newline arrives, never an empty line in between.
//! - Lines longer than [`LineCodec::max_length`] are rejected with
//!   [`LineCodecError::LineTooLong`]. The codec then skips ahead to the next newline so a caller
//!   that wants to keep reading stays in sync.
//! - Outbound text is written verbatim. Nothing is appended, which keeps prompts such as
//!   `"Enter nickname: "` on the same line as the user's answer.
//!
//! # Example
//!
//! ```
//! use bytes::BytesMut;
//! use telbbs_linecodec::LineCodec;
//! use tokio_util::codec::Decoder;
//!
//! let mut codec = LineCodec::new();
//! let mut buffer = BytesMut::from("regi");
//! assert_eq!(codec.decode(&mut buffer).unwrap(), None);
//!
//! buffer.extend_from_slice(b"ster\r\n");
//! assert_eq!(codec.decode(&mut buffer).unwrap(), Some("register".to_string()));
//! ```

mod codec;
mod result;

pub use codec::LineCodec;
pub use result::{LineCodecError, LineCodecResult};
