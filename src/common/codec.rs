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

//! Newline framing shared by the control channel and helper stderr.
//!
//! Lines longer than the limit are reported once and skipped up to the next
//! newline instead of failing the stream, so one bad frame never ends a
//! session.

use bytes::{Bytes, BytesMut};
use tokio_util::codec::Decoder;
use tracing::trace;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// One line without its terminator. Not validated as UTF-8.
    Line(Bytes),
    /// A line exceeded the limit and was dropped.
    Overlong,
}

#[derive(Debug, Clone)]
pub struct LineCodec {
    max_length: usize,
    next_index: usize,
    discarding: bool,
}

impl LineCodec {
    #[must_use]
    pub fn new(max_length: usize) -> Self {
        Self {
            max_length,
            next_index: 0,
            discarding: false,
        }
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }
}

fn trim_terminator(mut line: BytesMut) -> Bytes {
    if line.last() == Some(&b'\n') {
        line.truncate(line.len() - 1);
    }
    if line.last() == Some(&b'\r') {
        line.truncate(line.len() - 1);
    }
    line.freeze()
}

impl Decoder for LineCodec {
    type Item = Frame;
    type Error = std::io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, Self::Error> {
        loop {
            let from = self.next_index.min(src.len());
            match src[from..].iter().position(|b| *b == b'\n') {
                Some(offset) => {
                    let line = src.split_to(from + offset + 1);
                    self.next_index = 0;
                    if self.discarding {
                        // Tail of an overlong line, already reported
                        self.discarding = false;
                        continue;
                    }
                    if line.len() - 1 > self.max_length {
                        trace!(len = line.len(), "dropping overlong line");
                        return Ok(Some(Frame::Overlong));
                    }
                    return Ok(Some(Frame::Line(trim_terminator(line))));
                }
                None if src.len() > self.max_length => {
                    src.clear();
                    self.next_index = 0;
                    if self.discarding {
                        return Ok(None);
                    }
                    self.discarding = true;
                    return Ok(Some(Frame::Overlong));
                }
                None => {
                    self.next_index = src.len();
                    return Ok(None);
                }
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, Self::Error> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame));
        }
        self.next_index = 0;
        if src.is_empty() || self.discarding {
            src.clear();
            self.discarding = false;
            return Ok(None);
        }
        let rest = src.split_to(src.len());
        Ok(Some(Frame::Line(trim_terminator(rest))))
    }
}
