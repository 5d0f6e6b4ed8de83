// Copyright 2026 BadCompany
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Newline-delimited JSON-RPC transport.
//!
//! One JSON document per line in both directions. Generic over the byte
//! streams so the same session runs on stdin/stdout and in memory.

use anyhow::{Context, Result};
use futures_util::StreamExt;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, Stdin, Stdout};
use tokio_util::codec::FramedRead;
use tracing::debug;

use crate::common::codec::{Frame, LineCodec};
use crate::common::constants::limits;
use crate::jsonrpc::{Notification, Response};

/// One inbound line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Message(String),
    /// Unreadable line, answered with a parse error.
    Malformed(String),
}

pub struct LineTransport<R, W> {
    reader: FramedRead<R, LineCodec>,
    writer: W,
}

impl LineTransport<Stdin, Stdout> {
    pub fn stdio() -> Self {
        Self::new(tokio::io::stdin(), tokio::io::stdout())
    }
}

impl<R, W> LineTransport<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self::with_limit(reader, writer, limits::MAX_MESSAGE_SIZE_BYTES)
    }

    pub fn with_limit(reader: R, writer: W, max_message_bytes: usize) -> Self {
        Self {
            reader: FramedRead::new(reader, LineCodec::new(max_message_bytes)),
            writer,
        }
    }

    /// Next non-blank line, `None` at EOF. Cancel safe.
    pub async fn read_message(&mut self) -> Result<Option<Inbound>> {
        loop {
            let Some(frame) = self.reader.next().await else {
                return Ok(None);
            };
            match frame.context("Failed to read control message")? {
                Frame::Line(raw) => {
                    if raw.iter().all(u8::is_ascii_whitespace) {
                        continue;
                    }
                    return Ok(Some(match String::from_utf8(raw.to_vec()) {
                        Ok(text) => {
                            debug!("Received: {}", text);
                            Inbound::Message(text)
                        }
                        Err(_) => Inbound::Malformed("invalid UTF-8 in message".to_string()),
                    }));
                }
                Frame::Overlong => {
                    return Ok(Some(Inbound::Malformed(format!(
                        "message exceeds size limit of {} bytes",
                        self.reader.decoder().max_length()
                    ))));
                }
            }
        }
    }

    pub async fn write_response(&mut self, response: &Response) -> Result<()> {
        self.write_line(response).await
    }

    pub async fn write_notification(&mut self, notification: &Notification) -> Result<()> {
        self.write_line(notification).await
    }

    async fn write_line<T: Serialize>(&mut self, message: &T) -> Result<()> {
        let json = serde_json::to_string(message).context("Failed to serialize message")?;
        debug!("Sending: {}", json);

        self.writer.write_all(json.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        Ok(())
    }
}
