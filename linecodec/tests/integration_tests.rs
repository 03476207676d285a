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

//! Integration tests for the line codec over a real async stream

use futures::{SinkExt, StreamExt};
use proptest::prelude::*;
use telbbs_linecodec::{LineCodec, LineCodecError};
use tokio::io::{AsyncWriteExt, duplex};
use tokio_util::codec::{Decoder, Framed, FramedRead};

#[tokio::test]
async fn test_framed_reads_lines_across_writes() {
    let (client, server) = duplex(64);
    let mut reader = FramedRead::new(server, LineCodec::new());
    let mut client = client;

    client.write_all(b"reg").await.unwrap();
    client.write_all(b"ister\r\nali").await.unwrap();
    client.write_all(b"ce\n").await.unwrap();
    drop(client);

    assert_eq!(reader.next().await.unwrap().unwrap(), "register");
    assert_eq!(reader.next().await.unwrap().unwrap(), "alice");
    assert!(reader.next().await.is_none());
}

#[tokio::test]
async fn test_framed_final_fragment_on_close() {
    let (mut client, server) = duplex(64);
    let mut reader = FramedRead::new(server, LineCodec::new());

    client.write_all(b"help\nexit").await.unwrap();
    drop(client);

    assert_eq!(reader.next().await.unwrap().unwrap(), "help");
    assert_eq!(reader.next().await.unwrap().unwrap(), "exit");
    assert!(reader.next().await.is_none());
}

#[tokio::test]
async fn test_framed_line_too_long() {
    let (mut client, server) = duplex(4096);
    let mut reader = FramedRead::new(server, LineCodec::with_max_length(16));

    client.write_all(&[b'x'; 64]).await.unwrap();

    let err = reader.next().await.unwrap().unwrap_err();
    assert!(matches!(err, LineCodecError::LineTooLong { limit: 16 }));
}

#[tokio::test]
async fn test_framed_send_prompt() {
    let (client, server) = duplex(64);
    let mut server = Framed::new(server, LineCodec::new());
    let mut client = Framed::new(client, LineCodec::new());

    server.send("Enter nickname: ").await.unwrap();
    server.send("\n".to_string()).await.unwrap();

    assert_eq!(client.next().await.unwrap().unwrap(), "Enter nickname:");
}

proptest! {
    #[test]
    fn prop_chunking_does_not_change_lines(
        lines in prop::collection::vec("[a-z]{0,12}", 1..8),
        split in 0usize..256,
    ) {
        let wire: Vec<u8> = lines.iter().flat_map(|l| format!("{l}\r\n").into_bytes()).collect();
        let split = split % (wire.len() + 1);

        let mut codec = LineCodec::new();
        let mut buffer = bytes::BytesMut::new();
        let mut decoded = Vec::new();

        for chunk in [&wire[..split], &wire[split..]] {
            buffer.extend_from_slice(chunk);
            while let Some(line) = codec.decode(&mut buffer).unwrap() {
                decoded.push(line);
            }
        }

        prop_assert_eq!(decoded, lines);
        prop_assert!(buffer.is_empty());
    }
}
