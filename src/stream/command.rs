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

//! Generic helper: any program writing PCM to stdout.
//!
//! `process:///usr/bin/arecord?name=Line-In&params=-f cd -t raw&wd_timeout=30`

use std::time::Duration;

use crate::common::constants::uri as keys;
use crate::common::errors::SourceError;
use crate::stream::adapter::{
    resolve_executable, watchdog_from_secs, ProcessCommand, SourceAdapter,
};
use crate::stream::uri::StreamUri;

#[derive(Debug, Clone)]
pub struct CommandAdapter {
    executable: String,
    args: Vec<String>,
    watchdog_timeout: Option<Duration>,
}

impl CommandAdapter {
    pub fn from_uri(uri: &StreamUri) -> Result<Self, SourceError> {
        let executable = uri.path().trim().to_string();
        if executable.trim_matches('/').is_empty() {
            return Err(SourceError::invalid_configuration("missing executable path"));
        }
        let args = uri
            .get(keys::PARAMS)
            .map(|p| p.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();
        let watchdog_timeout = uri
            .parse_param::<u64>(keys::WATCHDOG_TIMEOUT)?
            .and_then(watchdog_from_secs);

        Ok(Self {
            executable,
            args,
            watchdog_timeout,
        })
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl SourceAdapter for CommandAdapter {
    fn kind(&self) -> &'static str {
        "process"
    }

    fn command(&mut self) -> Result<ProcessCommand, SourceError> {
        Ok(ProcessCommand {
            program: resolve_executable(&self.executable, "")?,
            args: self.args.clone(),
        })
    }

    fn watchdog_timeout(&self) -> Option<Duration> {
        self.watchdog_timeout
    }
}
