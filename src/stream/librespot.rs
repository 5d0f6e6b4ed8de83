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

//! Spotify Connect receiver backed by `librespot`.
//!
//! librespot runs with the pipe backend and writes raw PCM
//! (44100:16:2) to stdout. Its stderr log is scanned for track changes
//! and authentication failures.
//!
//! ```text
//! spotify:///librespot?name=Spotify&username=<user>&password=<pass>
//!     [&devicename=Snapcast][&bitrate=320][&volume=<percent>][&cache=<dir>]
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::common::constants::{librespot as defaults, uri as keys};
use crate::common::errors::SourceError;
use crate::stream::adapter::{
    resolve_executable, watchdog_from_secs, Directive, ProcessCommand, SourceAdapter, SourceNotice,
};
use crate::stream::uri::StreamUri;

const AUTH_FAILURE_MARKERS: [&str; 3] = ["bad credentials", "badcredentials", "authentication failed"];
const NOISE_MARKERS: [&str; 2] = ["allocated stream", "Got channel"];
const METADATA_PREFIX: &str = "metadata:";

#[derive(Clone, PartialEq, Eq)]
struct Credentials {
    username: String,
    password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &"xxx")
            .field("password", &"xxx")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct LibrespotAdapter {
    executable: String,
    device_name: String,
    credentials: Option<Credentials>,
    bitrate: u32,
    volume: u8,
    cache: Option<PathBuf>,
    disable_audio_cache: bool,
    normalize: bool,
    autoplay: bool,
    watchdog_timeout: Option<Duration>,
    /// Set once the helper reports structured metadata itself.
    patched: bool,
}

impl LibrespotAdapter {
    pub fn from_uri(uri: &StreamUri) -> Result<Self, SourceError> {
        let credentials = match (uri.get_non_empty("username"), uri.get_non_empty("password")) {
            (Some(username), Some(password)) => Some(Credentials {
                username: username.to_string(),
                password: password.to_string(),
            }),
            (None, None) => None,
            _ => {
                return Err(SourceError::invalid_configuration(
                    "username and password must be given together",
                ))
            }
        };

        let bitrate = uri
            .parse_param::<u32>("bitrate")?
            .unwrap_or(defaults::DEFAULT_BITRATE);
        if !defaults::ALLOWED_BITRATES.contains(&bitrate) {
            return Err(SourceError::invalid_configuration(format!(
                "bitrate must be one of 96, 160 or 320, got {}",
                bitrate
            )));
        }

        let volume = uri
            .parse_param::<u8>("volume")?
            .unwrap_or(defaults::DEFAULT_VOLUME);
        if volume > 100 {
            return Err(SourceError::invalid_configuration(format!(
                "volume must be between 0 and 100, got {}",
                volume
            )));
        }

        let wd_secs = uri
            .parse_param::<u64>(keys::WATCHDOG_TIMEOUT)?
            .unwrap_or(defaults::DEFAULT_WATCHDOG_TIMEOUT_SECS);

        Ok(Self {
            executable: uri.path().to_string(),
            device_name: uri
                .get_or("devicename", defaults::DEFAULT_DEVICE_NAME)
                .to_string(),
            credentials,
            bitrate,
            volume,
            cache: uri.get_non_empty("cache").map(PathBuf::from),
            disable_audio_cache: uri.flag("disable_audio_cache")?,
            normalize: uri.flag("normalize")?,
            autoplay: uri.flag("autoplay")?,
            watchdog_timeout: watchdog_from_secs(wd_secs),
            patched: false,
        })
    }

    /// librespot command line, without the program itself.
    pub fn args(&self) -> Vec<String> {
        let mut args = vec!["--name".to_string(), self.device_name.clone()];
        if let Some(creds) = &self.credentials {
            args.extend([
                "--username".to_string(),
                creds.username.clone(),
                "--password".to_string(),
                creds.password.clone(),
            ]);
        }
        args.extend([
            "--bitrate".to_string(),
            self.bitrate.to_string(),
            "--backend".to_string(),
            "pipe".to_string(),
        ]);
        if let Some(cache) = &self.cache {
            args.push("--cache".to_string());
            args.push(cache.display().to_string());
        }
        if self.disable_audio_cache {
            args.push("--disable-audio-cache".to_string());
        }
        args.push("--initial-volume".to_string());
        args.push(self.volume.to_string());
        if self.normalize {
            args.push("--enable-volume-normalisation".to_string());
        }
        if self.autoplay {
            args.push("--autoplay".to_string());
        }
        args.push("--verbose".to_string());
        args
    }

    fn parse_metadata(&mut self, json: &str) -> Directive {
        match serde_json::from_str::<Value>(json.trim()) {
            Ok(meta @ Value::Object(_)) => {
                if !self.patched {
                    info!("helper reports structured metadata");
                    self.patched = true;
                }
                Directive::Notify(SourceNotice::Metadata { meta })
            }
            Ok(_) => {
                warn!("ignoring metadata that is not a JSON object");
                Directive::Continue
            }
            Err(e) => {
                warn!("failed to parse metadata: {}", e);
                Directive::Continue
            }
        }
    }
}

fn is_auth_failure(line: &str) -> bool {
    let lower = line.to_ascii_lowercase();
    AUTH_FAILURE_MARKERS.iter().any(|m| lower.contains(m))
}

fn is_noise(line: &str) -> bool {
    line.len() <= 4 || NOISE_MARKERS.iter().any(|m| line.contains(m))
}

/// Title from a `Track "<title>" loaded` log line.
fn loaded_track_title(line: &str) -> Option<&str> {
    let start = line.find("Track \"")? + "Track \"".len();
    let end = line.rfind("\" loaded")?;
    (end >= start).then(|| &line[start..end])
}

impl SourceAdapter for LibrespotAdapter {
    fn kind(&self) -> &'static str {
        "librespot"
    }

    fn command(&mut self) -> Result<ProcessCommand, SourceError> {
        Ok(ProcessCommand {
            program: resolve_executable(&self.executable, defaults::EXECUTABLE)?,
            args: self.args(),
        })
    }

    fn watchdog_timeout(&self) -> Option<Duration> {
        self.watchdog_timeout
    }

    fn sample_format(&self) -> Option<&'static str> {
        Some(defaults::SAMPLE_FORMAT)
    }

    fn on_stderr_line(&mut self, line: &str) -> Directive {
        if is_auth_failure(line) {
            error!("librespot authentication failed: {}", line);
            return Directive::Halt(SourceNotice::AuthenticationFailed {
                message: line.to_string(),
            });
        }

        if !is_noise(line) {
            info!("(librespot) {}", line);
        }

        if let Some(pos) = line.find(METADATA_PREFIX) {
            return self.parse_metadata(&line[pos + METADATA_PREFIX.len()..]);
        }

        if !self.patched {
            if let Some(title) = loaded_track_title(line) {
                return Directive::Notify(SourceNotice::Metadata {
                    meta: json!({ "TITLE": title }),
                });
            }
        }
        Directive::Continue
    }

    fn on_hang(&mut self, elapsed: Duration) -> Directive {
        warn!(elapsed_ms = elapsed.as_millis() as u64, "librespot timed out, restarting");
        Directive::Restart
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter(query: &str) -> Result<LibrespotAdapter, SourceError> {
        let uri = StreamUri::parse(&format!("spotify:///librespot?{}", query)).unwrap();
        LibrespotAdapter::from_uri(&uri)
    }

    #[test]
    fn test_default_arguments() {
        let a = adapter("name=Spotify").unwrap();
        assert_eq!(
            a.args(),
            vec![
                "--name", "Snapcast", "--bitrate", "320", "--backend", "pipe", "--initial-volume",
                "100", "--verbose"
            ]
        );
        assert_eq!(
            a.watchdog_timeout(),
            Some(Duration::from_secs(defaults::DEFAULT_WATCHDOG_TIMEOUT_SECS))
        );
        assert_eq!(a.sample_format(), Some("44100:16:2"));
    }

    #[test]
    fn test_full_arguments() {
        let a = adapter(
            "name=S&devicename=Kitchen&username=u&password=p&bitrate=160&volume=40&cache=/tmp/c\
             &disable_audio_cache=true&normalize=true&autoplay=true",
        )
        .unwrap();
        assert_eq!(
            a.args(),
            vec![
                "--name",
                "Kitchen",
                "--username",
                "u",
                "--password",
                "p",
                "--bitrate",
                "160",
                "--backend",
                "pipe",
                "--cache",
                "/tmp/c",
                "--disable-audio-cache",
                "--initial-volume",
                "40",
                "--enable-volume-normalisation",
                "--autoplay",
                "--verbose"
            ]
        );
    }

    #[test]
    fn test_rejects_half_credentials() {
        assert!(matches!(
            adapter("name=S&username=u"),
            Err(SourceError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_rejects_bad_bitrate_and_volume() {
        assert!(adapter("name=S&bitrate=128").is_err());
        assert!(adapter("name=S&volume=101").is_err());
        assert!(adapter("name=S&volume=-3").is_err());
        assert!(adapter("name=S&volume=0").is_ok());
    }

    #[test]
    fn test_debug_hides_credentials() {
        let a = adapter("name=S&username=alice&password=hunter2").unwrap();
        let shown = format!("{:?}", a);
        assert!(!shown.contains("alice"));
        assert!(!shown.contains("hunter2"));
    }

    #[test]
    fn test_track_loaded_becomes_metadata() {
        let mut a = adapter("name=S").unwrap();
        let d = a.on_stderr_line(r#"[2024-01-01T00:00:00Z INFO  librespot_playback::player] Track "Bohemian Rhapsody" loaded"#);
        assert_eq!(
            d,
            Directive::Notify(SourceNotice::Metadata {
                meta: json!({"TITLE": "Bohemian Rhapsody"})
            })
        );
    }

    #[test]
    fn test_structured_metadata_suppresses_track_lines() {
        let mut a = adapter("name=S").unwrap();
        let d = a.on_stderr_line(r#"metadata:{"ARTIST":"Queen","TITLE":"Bohemian Rhapsody"}"#);
        assert_eq!(
            d,
            Directive::Notify(SourceNotice::Metadata {
                meta: json!({"ARTIST": "Queen", "TITLE": "Bohemian Rhapsody"})
            })
        );
        assert_eq!(a.on_stderr_line(r#"Track "Other" loaded"#), Directive::Continue);
    }

    #[test]
    fn test_bad_credentials_halts() {
        let mut a = adapter("name=S").unwrap();
        for line in [
            "[ERROR librespot] Bad credentials",
            "Error: BadCredentials",
            "Authentication failed with reason: x",
        ] {
            assert!(matches!(a.on_stderr_line(line), Directive::Halt(_)), "{}", line);
        }
    }

    #[test]
    fn test_noise_and_plain_lines_continue() {
        let mut a = adapter("name=S").unwrap();
        assert_eq!(a.on_stderr_line("Got channel 3"), Directive::Continue);
        assert_eq!(a.on_stderr_line("ok"), Directive::Continue);
        assert_eq!(a.on_stderr_line("Connecting to AP"), Directive::Continue);
        assert!(is_noise("allocated stream 7"));
        assert!(!is_noise("Connecting to AP"));
    }

    #[test]
    fn test_hang_restarts() {
        let mut a = adapter("name=S").unwrap();
        assert_eq!(a.on_hang(Duration::from_secs(7800)), Directive::Restart);
    }
}
