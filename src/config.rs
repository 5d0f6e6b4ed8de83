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

use crate::common::constants::{config as env_keys, stream as defaults};
use crate::common::errors::SourceError;
use crate::stream::SourceSettings;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    pub fn parse_safe(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub log_level: String,
    pub log_format: LogFormat,
    pub backoff_ms: u64,
    pub backoff_max_ms: u64,
    pub kill_grace_ms: u64,
    pub read_chunk_bytes: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, SourceError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; missing keys take their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SourceError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let config = Self {
            log_level: lookup(env_keys::ENV_LOG_LEVEL).unwrap_or(defaults.log_level),
            log_format: lookup(env_keys::ENV_LOG_FORMAT)
                .map(|s| LogFormat::parse_safe(&s))
                .unwrap_or(defaults.log_format),
            backoff_ms: number(&lookup, env_keys::ENV_BACKOFF_MS)?.unwrap_or(defaults.backoff_ms),
            backoff_max_ms: number(&lookup, env_keys::ENV_BACKOFF_MAX_MS)?
                .unwrap_or(defaults.backoff_max_ms),
            kill_grace_ms: number(&lookup, env_keys::ENV_KILL_GRACE_MS)?
                .unwrap_or(defaults.kill_grace_ms),
            read_chunk_bytes: number(&lookup, env_keys::ENV_READ_CHUNK_BYTES)?
                .unwrap_or(defaults.read_chunk_bytes),
        };
        if config.backoff_ms == 0 {
            return Err(SourceError::invalid_configuration(format!(
                "{} must be greater than zero",
                env_keys::ENV_BACKOFF_MS
            )));
        }
        if config.read_chunk_bytes == 0 {
            return Err(SourceError::invalid_configuration(format!(
                "{} must be greater than zero",
                env_keys::ENV_READ_CHUNK_BYTES
            )));
        }
        Ok(config)
    }

    pub fn source_settings(&self) -> SourceSettings {
        SourceSettings {
            backoff_initial: Duration::from_millis(self.backoff_ms),
            backoff_max: Duration::from_millis(self.backoff_max_ms),
            kill_grace: Duration::from_millis(self.kill_grace_ms),
            read_chunk_bytes: self.read_chunk_bytes,
        }
    }
}

fn number<T, F>(lookup: &F, key: &str) -> Result<Option<T>, SourceError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw.trim().parse().map(Some).map_err(|_| {
            SourceError::invalid_configuration(format!("{} is not a valid number: {}", key, raw))
        }),
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            backoff_ms: defaults::DEFAULT_BACKOFF_MS,
            backoff_max_ms: defaults::DEFAULT_BACKOFF_MAX_MS,
            kill_grace_ms: defaults::DEFAULT_KILL_GRACE_MS,
            read_chunk_bytes: defaults::DEFAULT_READ_CHUNK_BYTES,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_env() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::Text);
        assert_eq!(config.backoff_ms, 1_000);
        assert_eq!(config.source_settings().kill_grace, Duration::from_secs(2));
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("LOG_FORMAT", "JSON"),
            ("ROOMCAST_BACKOFF_MS", "250"),
            ("ROOMCAST_READ_CHUNK_BYTES", "8192"),
        ]))
        .unwrap();
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.source_settings().backoff_initial, Duration::from_millis(250));
        assert_eq!(config.read_chunk_bytes, 8192);
    }

    #[test]
    fn test_bad_number_is_rejected() {
        let err = Config::from_lookup(lookup(&[("ROOMCAST_KILL_GRACE_MS", "soon")])).unwrap_err();
        assert!(err.to_string().contains("ROOMCAST_KILL_GRACE_MS"));
        assert!(Config::from_lookup(lookup(&[("ROOMCAST_READ_CHUNK_BYTES", "0")])).is_err());
    }

    #[test]
    fn test_zero_backoff_is_rejected() {
        let err = Config::from_lookup(lookup(&[("ROOMCAST_BACKOFF_MS", "0")])).unwrap_err();
        assert!(err.to_string().contains("ROOMCAST_BACKOFF_MS"));
        assert!(Config::from_lookup(lookup(&[("ROOMCAST_BACKOFF_MS", "1")])).is_ok());
    }
}
