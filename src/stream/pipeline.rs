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

//! Reader tasks for helper output.
//!
//! Each pipe is drained by its own task and forwarded over a bounded
//! channel, so the supervisor only ever sees complete events in order.
//! A task ends at EOF, on a read error, or when its receiver is dropped.

use bytes::Bytes;
use futures_util::StreamExt;
use tokio::io::AsyncRead;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::{BytesCodec, FramedRead};
use tracing::{debug, trace};

use crate::common::codec::{Frame, LineCodec};
use crate::common::constants::limits;

/// Spawns a background task forwarding raw stdout chunks (PCM data).
pub fn spawn_stdout_reader<R>(stream: R, chunk_size: usize, tx: mpsc::Sender<Bytes>) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut framed = FramedRead::with_capacity(stream, BytesCodec::new(), chunk_size.max(1));

        while let Some(result) = framed.next().await {
            match result {
                Ok(chunk) => {
                    trace!(len = chunk.len(), "stdout chunk");
                    if tx.send(chunk.freeze()).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    debug!("stdout read error: {}", e);
                    break;
                }
            }
        }
    })
}

/// Spawns a background task forwarding stderr lines (diagnostics).
pub fn spawn_stderr_reader<R>(stream: R, tx: mpsc::Sender<String>) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut framed = FramedRead::new(stream, LineCodec::new(limits::MAX_STDERR_LINE_BYTES));

        while let Some(result) = framed.next().await {
            match result {
                Ok(Frame::Line(raw)) => {
                    let line = String::from_utf8_lossy(&raw).trim().to_string();
                    if line.is_empty() {
                        continue;
                    }
                    if tx.send(line).await.is_err() {
                        break;
                    }
                }
                Ok(Frame::Overlong) => debug!("skipped overlong stderr line"),
                Err(e) => {
                    debug!("stderr read error: {}", e);
                    break;
                }
            }
        }
    })
}

/// Reader tasks of one helper generation, aborted together on drop.
#[derive(Default)]
pub struct ReaderSet {
    tasks: Vec<JoinHandle<()>>,
}

impl ReaderSet {
    pub fn push(&mut self, task: JoinHandle<()>) {
        self.tasks.push(task);
    }
}

impl Drop for ReaderSet {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn test_stdout_chunks_arrive_in_order() {
        let (mut writer, reader) = tokio::io::duplex(1024);
        let (tx, mut rx) = mpsc::channel(8);
        let task = spawn_stdout_reader(reader, 1024, tx);

        let mut expected = Vec::new();
        for i in 0..5u8 {
            let chunk = vec![i; 16];
            writer.write_all(&chunk).await.unwrap();
            expected.extend_from_slice(&chunk);
        }
        drop(writer);

        let mut received = Vec::new();
        while let Some(chunk) = rx.recv().await {
            received.extend_from_slice(&chunk);
        }
        assert_eq!(received, expected);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_stderr_lines_are_trimmed_and_lossy() {
        let (mut writer, reader) = tokio::io::duplex(1024);
        let (tx, mut rx) = mpsc::channel(8);
        spawn_stderr_reader(reader, tx);

        writer.write_all(b"  hello \n\n\xffbroken\nlast").await.unwrap();
        drop(writer);

        assert_eq!(rx.recv().await.as_deref(), Some("hello"));
        assert_eq!(rx.recv().await.as_deref(), Some("\u{fffd}broken"));
        assert_eq!(rx.recv().await.as_deref(), Some("last"));
        assert_eq!(rx.recv().await, None);
    }
}
