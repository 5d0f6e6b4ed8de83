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

//! Stream source error types.

use thiserror::Error;

/// Main error type for stream source construction and process management
#[derive(Error, Debug)]
pub enum SourceError {
    /// The source URI could not be parsed
    #[error("Invalid stream URI '{uri}': {reason}")]
    InvalidUri { uri: String, reason: String },

    /// No adapter is registered for the URI scheme
    #[error("Unknown stream type: {0}")]
    UnknownScheme(String),

    /// A query parameter is missing or fails validation
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The helper executable could not be located
    #[error("Executable not found: {0}")]
    ExecutableNotFound(String),

    /// The helper process could not be started
    #[error("Failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The source has shut down and accepts no more commands
    #[error("Stream source '{0}' is stopped")]
    Stopped(String),

    /// I/O Error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SourceError {
    pub fn invalid_configuration(reason: impl Into<String>) -> Self {
        SourceError::InvalidConfiguration(reason.into())
    }

    /// Whether retrying the same operation later can succeed without
    /// an operator changing the configuration.
    pub fn is_retryable(&self) -> bool {
        match self {
            SourceError::Spawn { source, .. } => !matches!(
                source.kind(),
                std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied
            ),
            SourceError::Io(_) => true,
            SourceError::InvalidUri { .. }
            | SourceError::UnknownScheme(_)
            | SourceError::InvalidConfiguration(_)
            | SourceError::ExecutableNotFound(_)
            | SourceError::Stopped(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_missing_executable_is_terminal() {
        let err = SourceError::Spawn {
            program: "/nope".to_string(),
            source: io::Error::new(io::ErrorKind::NotFound, "no such file"),
        };
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("/nope"));
    }

    #[test]
    fn test_transient_spawn_failure_is_retryable() {
        let err = SourceError::Spawn {
            program: "librespot".to_string(),
            source: io::Error::new(io::ErrorKind::WouldBlock, "resource busy"),
        };
        assert!(err.is_retryable());
    }

    #[test]
    fn test_configuration_errors_are_terminal() {
        assert!(!SourceError::invalid_configuration("volume out of range").is_retryable());
        assert!(!SourceError::UnknownScheme("ftp".to_string()).is_retryable());
    }
}
