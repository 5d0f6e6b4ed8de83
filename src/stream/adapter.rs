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

//! Per-kind behavior plugged into the generic source supervisor.
//!
//! An adapter builds the helper's command line, picks the watchdog timeout,
//! and interprets helper diagnostics. It answers every event with a
//! [`Directive`]; all process and timer handling stays in the supervisor.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::common::errors::SourceError;

/// Program and argument vector of a helper. Never passed through a shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
}

/// Something a source reports to the control layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceNotice {
    /// New track information
    Metadata { meta: Value },
    /// The helper rejected its credentials
    AuthenticationFailed { message: String },
    /// The helper could not be started
    SpawnFailed { message: String },
}

impl SourceNotice {
    /// Human readable summary, used as the status error text.
    pub fn message(&self) -> String {
        match self {
            SourceNotice::Metadata { .. } => "metadata updated".to_string(),
            SourceNotice::AuthenticationFailed { message } | SourceNotice::SpawnFailed { message } => {
                message.clone()
            }
        }
    }
}

/// What the supervisor should do after an adapter hook.
#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    Continue,
    Notify(SourceNotice),
    /// Kill the helper and start it again after the backoff.
    Restart,
    /// Kill the helper and stay down until an explicit restart.
    Halt(SourceNotice),
}

pub trait SourceAdapter: Send + 'static {
    /// Short name of the helper kind, used in logs and status.
    fn kind(&self) -> &'static str;

    /// Command line for the next helper start.
    fn command(&mut self) -> Result<ProcessCommand, SourceError>;

    /// Inactivity limit for the PCM output, `None` disables the watchdog.
    fn watchdog_timeout(&self) -> Option<Duration>;

    /// PCM layout of the helper's stdout as `rate:bits:channels`, when the
    /// helper fixes it.
    fn sample_format(&self) -> Option<&'static str> {
        None
    }

    fn on_stderr_line(&mut self, line: &str) -> Directive {
        debug!(kind = self.kind(), "{}", line);
        Directive::Continue
    }

    /// The helper produced no PCM data for `elapsed`.
    fn on_hang(&mut self, _elapsed: Duration) -> Directive {
        Directive::Restart
    }

    /// The helper exited on its own.
    fn on_exit(&mut self, _code: Option<i32>) -> Directive {
        Directive::Restart
    }
}

/// Locate a helper executable.
///
/// An absolute path is used as given; anything else is looked up by file
/// name on `PATH`, falling back to `default_name` when the path is empty.
pub fn resolve_executable(path: &str, default_name: &str) -> Result<PathBuf, SourceError> {
    let trimmed = path.trim();
    let candidate = Path::new(trimmed);
    if candidate.is_absolute() && candidate.file_name().is_some() && candidate.exists() {
        return Ok(candidate.to_path_buf());
    }

    let name = candidate
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .unwrap_or(default_name);

    which::which(name).map_err(|_| SourceError::ExecutableNotFound(name.to_string()))
}

/// Watchdog timeout from the `wd_timeout` query value, in whole seconds.
/// Zero disables the watchdog.
pub fn watchdog_from_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}
