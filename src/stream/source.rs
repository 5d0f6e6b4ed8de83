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

//! Supervised stream sources.
//!
//! Each source runs as one actor task that owns the helper process, its
//! reader channels and the watchdog. Commands, PCM chunks, process exit,
//! stderr lines and the watchdog are multiplexed in a single biased
//! `select!`, so source state only ever changes on that task. Callers
//! interact through a [`SourceHandle`].

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::common::constants::stream as defaults;
use crate::common::errors::SourceError;
use crate::stream::adapter::{Directive, SourceAdapter, SourceNotice};
use crate::stream::backoff::Backoff;
use crate::stream::pipeline::{self, ReaderSet};
use crate::stream::process::{ProcessControl, ProcessLauncher, SpawnedProcess, SystemLauncher};
use crate::stream::uri::StreamUri;
use crate::stream::watchdog::Watchdog;

/// Extra time, on top of the kill grace, to wait for the exit report.
const EXIT_REPORT_MARGIN: Duration = Duration::from_secs(1);

/// Consumer of decoded PCM, typically the encoder.
pub trait PcmListener: Send + Sync {
    fn on_chunk(&self, source_id: &str, chunk: &[u8]);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceState {
    Stopped,
    Starting,
    Running,
    Failed,
    HungUp,
    Restarting,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceStatus {
    pub state: SourceState,
    pub restarts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub since: DateTime<Utc>,
}

impl SourceStatus {
    fn new(state: SourceState) -> Self {
        Self {
            state,
            restarts: 0,
            last_error: None,
            since: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SourceEvent {
    StateChanged { source: String, status: SourceStatus },
    Notice { source: String, notice: SourceNotice },
}

impl SourceEvent {
    pub fn source_id(&self) -> &str {
        match self {
            SourceEvent::StateChanged { source, .. } | SourceEvent::Notice { source, .. } => source,
        }
    }
}

/// Supervision timings shared by all sources.
#[derive(Debug, Clone)]
pub struct SourceSettings {
    pub backoff_initial: Duration,
    pub backoff_max: Duration,
    pub kill_grace: Duration,
    pub read_chunk_bytes: usize,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            backoff_initial: Duration::from_millis(defaults::DEFAULT_BACKOFF_MS),
            backoff_max: Duration::from_millis(defaults::DEFAULT_BACKOFF_MAX_MS),
            kill_grace: Duration::from_millis(defaults::DEFAULT_KILL_GRACE_MS),
            read_chunk_bytes: defaults::DEFAULT_READ_CHUNK_BYTES,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Stop,
    Restart,
}

/// A configured, not yet running source.
pub struct StreamSource {
    id: String,
    uri: StreamUri,
    adapter: Box<dyn SourceAdapter>,
    listener: Arc<dyn PcmListener>,
    launcher: Option<Arc<dyn ProcessLauncher>>,
    settings: SourceSettings,
    events: Option<mpsc::Sender<SourceEvent>>,
}

impl StreamSource {
    pub fn new(
        uri: StreamUri,
        adapter: Box<dyn SourceAdapter>,
        listener: Arc<dyn PcmListener>,
    ) -> Result<Self, SourceError> {
        let id = uri.name()?.to_string();
        Ok(Self {
            id,
            uri,
            adapter,
            listener,
            launcher: None,
            settings: SourceSettings::default(),
            events: None,
        })
    }

    /// Parse `raw` and pick the adapter from its scheme.
    pub fn from_uri(raw: &str, listener: Arc<dyn PcmListener>) -> Result<Self, SourceError> {
        let uri = StreamUri::parse(raw)?;
        let adapter = crate::stream::create_adapter(&uri)?;
        Self::new(uri, adapter, listener)
    }

    pub fn with_settings(mut self, settings: SourceSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_launcher(mut self, launcher: Arc<dyn ProcessLauncher>) -> Self {
        self.launcher = Some(launcher);
        self
    }

    pub fn with_events(mut self, events: mpsc::Sender<SourceEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn uri(&self) -> &StreamUri {
        &self.uri
    }

    /// Spawn the supervision task. Must be called inside a tokio runtime.
    pub fn start(self) -> SourceHandle {
        let (cmd_tx, cmd_rx) = mpsc::channel(defaults::COMMAND_CHANNEL_CAPACITY);
        let (status_tx, status_rx) = watch::channel(SourceStatus::new(SourceState::Starting));
        let launcher: Arc<dyn ProcessLauncher> = match self.launcher {
            Some(launcher) => launcher,
            None => Arc::new(SystemLauncher::new(self.settings.kill_grace)),
        };
        let kind = self.adapter.kind();
        let sample_format = self.adapter.sample_format();

        let supervisor = Supervisor {
            id: self.id.clone(),
            adapter: self.adapter,
            listener: self.listener,
            launcher,
            backoff: Backoff::new(self.settings.backoff_initial, self.settings.backoff_max),
            settings: self.settings,
            commands: cmd_rx,
            status: status_tx,
            events: self.events,
            watchdog: Watchdog::new(),
            restarts: 0,
        };

        let span = info_span!("source", id = %self.id, kind);
        tokio::spawn(supervisor.run().instrument(span));

        SourceHandle {
            id: self.id,
            uri: self.uri.redacted(),
            kind,
            sample_format,
            commands: cmd_tx,
            status: status_rx,
        }
    }
}

/// Control side of a running source. Dropping every handle stops it.
#[derive(Debug, Clone)]
pub struct SourceHandle {
    id: String,
    uri: String,
    kind: &'static str,
    sample_format: Option<&'static str>,
    commands: mpsc::Sender<Command>,
    status: watch::Receiver<SourceStatus>,
}

impl SourceHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Source URI with credentials masked.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub fn sample_format(&self) -> Option<&'static str> {
        self.sample_format
    }

    pub fn status(&self) -> SourceStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SourceStatus> {
        self.status.clone()
    }

    /// Ask for the helper to be restarted now, skipping any backoff.
    /// Also the way out of `Failed`.
    pub fn request_restart(&self) -> Result<(), SourceError> {
        match self.commands.try_send(Command::Restart) {
            Ok(()) | Err(mpsc::error::TrySendError::Full(_)) => Ok(()),
            Err(mpsc::error::TrySendError::Closed(_)) => Err(SourceError::Stopped(self.id.clone())),
        }
    }

    /// Stop the source and wait until it reports `Stopped`. Idempotent.
    pub async fn stop(&self) {
        let _ = self.commands.send(Command::Stop).await;
        let mut status = self.status.clone();
        let _ = status.wait_for(|s| s.state == SourceState::Stopped).await;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunOutcome {
    Stop,
    /// Start again after the backoff delay.
    Restart,
    /// Start again right away.
    RestartNow,
    /// Stay down until an explicit restart.
    Halt,
}

struct Supervisor {
    id: String,
    adapter: Box<dyn SourceAdapter>,
    listener: Arc<dyn PcmListener>,
    launcher: Arc<dyn ProcessLauncher>,
    settings: SourceSettings,
    commands: mpsc::Receiver<Command>,
    status: watch::Sender<SourceStatus>,
    events: Option<mpsc::Sender<SourceEvent>>,
    watchdog: Watchdog,
    backoff: Backoff,
    restarts: u32,
}

impl Supervisor {
    async fn run(mut self) {
        info!("stream source started");
        loop {
            self.set_state(SourceState::Starting, None);
            let outcome = match self.launch() {
                Ok(process) => self.supervise(process).await,
                Err(err) => self.launch_failed(err),
            };
            let next = match outcome {
                RunOutcome::Restart => self.wait_backoff().await,
                RunOutcome::Halt => self.wait_for_restart().await,
                other => other,
            };
            if next == RunOutcome::Stop {
                break;
            }
            self.restarts = self.restarts.saturating_add(1);
        }
        self.watchdog.cancel();
        self.set_state(SourceState::Stopped, None);
        info!(restarts = self.restarts, "stream source stopped");
    }

    fn launch(&mut self) -> Result<SpawnedProcess, SourceError> {
        let command = self.adapter.command()?;
        debug!(program = %command.program.display(), "launching helper");
        self.launcher.launch(&command.program, &command.args)
    }

    fn launch_failed(&mut self, err: SourceError) -> RunOutcome {
        let message = err.to_string();
        error!(error = %message, retryable = err.is_retryable(), "failed to start helper");
        self.set_state(SourceState::Failed, Some(message.clone()));
        self.emit_notice(SourceNotice::SpawnFailed { message });
        if err.is_retryable() {
            RunOutcome::Restart
        } else {
            RunOutcome::Halt
        }
    }

    async fn supervise(&mut self, process: SpawnedProcess) -> RunOutcome {
        let SpawnedProcess {
            pid,
            stdout,
            stderr,
            mut exit,
            mut control,
        } = process;

        // Fresh channels per generation: nothing from a previous helper can
        // reach this loop.
        let (stdout_tx, mut stdout_rx) = mpsc::channel(defaults::READER_CHANNEL_CAPACITY);
        let (stderr_tx, mut stderr_rx) = mpsc::channel(defaults::READER_CHANNEL_CAPACITY);
        let mut readers = ReaderSet::default();
        readers.push(pipeline::spawn_stdout_reader(
            stdout,
            self.settings.read_chunk_bytes,
            stdout_tx,
        ));
        readers.push(pipeline::spawn_stderr_reader(stderr, stderr_tx));
        let mut stdout_open = true;
        let mut stderr_open = true;

        self.arm_watchdog();
        info!(?pid, "helper running");
        self.set_state(SourceState::Running, None);

        let outcome = loop {
            tokio::select! {
                biased;

                cmd = self.commands.recv() => {
                    let outcome = match cmd {
                        Some(Command::Restart) => {
                            info!("restart requested");
                            RunOutcome::RestartNow
                        }
                        Some(Command::Stop) | None => RunOutcome::Stop,
                    };
                    self.shutdown(&mut control, &mut exit).await;
                    break outcome;
                }

                chunk = stdout_rx.recv(), if stdout_open => match chunk {
                    Some(chunk) => {
                        self.listener.on_chunk(&self.id, &chunk);
                        self.watchdog.trigger();
                        self.backoff.reset();
                    }
                    None => {
                        debug!("helper closed stdout");
                        stdout_open = false;
                    }
                },

                code = &mut exit => {
                    let code = code.unwrap_or(None);
                    warn!(?code, "helper exited");
                    self.watchdog.cancel();
                    let halt = self
                        .drain_output(&mut stdout_rx, &mut stderr_rx, stdout_open, stderr_open)
                        .await;
                    if let Some(notice) = halt {
                        self.set_state(SourceState::Failed, Some(notice.message()));
                        self.emit_notice(notice);
                        break RunOutcome::Halt;
                    }
                    self.set_state(SourceState::Failed, Some(exit_message(code)));
                    break match self.adapter.on_exit(code) {
                        Directive::Halt(notice) => {
                            self.emit_notice(notice);
                            RunOutcome::Halt
                        }
                        Directive::Notify(notice) => {
                            self.emit_notice(notice);
                            RunOutcome::Restart
                        }
                        Directive::Continue | Directive::Restart => RunOutcome::Restart,
                    };
                }

                line = stderr_rx.recv(), if stderr_open => match line {
                    Some(line) => match self.adapter.on_stderr_line(&line) {
                        Directive::Continue => {}
                        Directive::Notify(notice) => self.emit_notice(notice),
                        Directive::Restart => {
                            self.shutdown(&mut control, &mut exit).await;
                            break RunOutcome::Restart;
                        }
                        Directive::Halt(notice) => {
                            self.set_state(SourceState::Failed, Some(notice.message()));
                            self.emit_notice(notice);
                            self.shutdown(&mut control, &mut exit).await;
                            break RunOutcome::Halt;
                        }
                    },
                    None => stderr_open = false,
                },

                elapsed = self.watchdog.expired() => {
                    let elapsed_ms = elapsed.as_millis() as u64;
                    warn!(elapsed_ms, "no audio data from helper");
                    self.set_state(
                        SourceState::HungUp,
                        Some(format!("no audio data for {} ms", elapsed_ms)),
                    );
                    match self.adapter.on_hang(elapsed) {
                        Directive::Continue => {
                            self.arm_watchdog();
                            self.set_state(SourceState::Running, None);
                        }
                        Directive::Notify(notice) => {
                            self.emit_notice(notice);
                            self.arm_watchdog();
                            self.set_state(SourceState::Running, None);
                        }
                        Directive::Restart => {
                            self.shutdown(&mut control, &mut exit).await;
                            break RunOutcome::Restart;
                        }
                        Directive::Halt(notice) => {
                            self.set_state(SourceState::Failed, Some(notice.message()));
                            self.emit_notice(notice);
                            self.shutdown(&mut control, &mut exit).await;
                            break RunOutcome::Halt;
                        }
                    }
                }
            }
        };

        self.watchdog.cancel();
        drop(readers);
        outcome
    }

    /// Deliver what the helper wrote before it exited, until both pipes
    /// close or the kill grace runs out. Returns the notice of the first
    /// halting stderr line.
    async fn drain_output(
        &mut self,
        stdout_rx: &mut mpsc::Receiver<Bytes>,
        stderr_rx: &mut mpsc::Receiver<String>,
        mut stdout_open: bool,
        mut stderr_open: bool,
    ) -> Option<SourceNotice> {
        let deadline = sleep(self.settings.kill_grace);
        tokio::pin!(deadline);
        let mut halt = None;

        while stdout_open || stderr_open {
            tokio::select! {
                biased;

                chunk = stdout_rx.recv(), if stdout_open => match chunk {
                    Some(chunk) => {
                        self.listener.on_chunk(&self.id, &chunk);
                        self.backoff.reset();
                    }
                    None => stdout_open = false,
                },

                line = stderr_rx.recv(), if stderr_open => match line {
                    Some(line) => match self.adapter.on_stderr_line(&line) {
                        Directive::Notify(notice) => self.emit_notice(notice),
                        Directive::Halt(notice) if halt.is_none() => halt = Some(notice),
                        _ => {}
                    },
                    None => stderr_open = false,
                },

                _ = &mut deadline => {
                    debug!("helper output still open after exit");
                    break;
                }
            }
        }
        halt
    }

    fn arm_watchdog(&mut self) {
        match self.adapter.watchdog_timeout() {
            Some(t) => self.watchdog.arm(t),
            None => self.watchdog.cancel(),
        }
    }

    /// Kill the helper and wait for its exit report.
    async fn shutdown(
        &mut self,
        control: &mut ProcessControl,
        exit: &mut oneshot::Receiver<Option<i32>>,
    ) {
        self.watchdog.cancel();
        control.kill();
        match timeout(self.settings.kill_grace + EXIT_REPORT_MARGIN, exit).await {
            Ok(code) => debug!(code = ?code.ok().flatten(), "helper terminated"),
            Err(_) => warn!("helper did not report its exit after kill"),
        }
    }

    async fn wait_backoff(&mut self) -> RunOutcome {
        let delay = self.backoff.next_delay();
        self.set_state(SourceState::Restarting, None);
        info!(
            delay_ms = delay.as_millis() as u64,
            attempt = self.backoff.attempts(),
            "restarting helper"
        );
        tokio::select! {
            biased;
            cmd = self.commands.recv() => match cmd {
                Some(Command::Restart) => RunOutcome::RestartNow,
                Some(Command::Stop) | None => RunOutcome::Stop,
            },
            _ = sleep(delay) => RunOutcome::Restart,
        }
    }

    async fn wait_for_restart(&mut self) -> RunOutcome {
        info!("helper halted until restarted");
        match self.commands.recv().await {
            Some(Command::Restart) => {
                self.backoff.reset();
                RunOutcome::RestartNow
            }
            Some(Command::Stop) | None => RunOutcome::Stop,
        }
    }

    fn set_state(&mut self, state: SourceState, error: Option<String>) {
        let restarts = self.restarts;
        self.status.send_modify(|s| {
            s.state = state;
            s.restarts = restarts;
            if error.is_some() {
                s.last_error = error;
            }
            s.since = Utc::now();
        });
        debug!(?state, "state changed");
        let status = self.status.borrow().clone();
        self.emit(SourceEvent::StateChanged {
            source: self.id.clone(),
            status,
        });
    }

    fn emit_notice(&self, notice: SourceNotice) {
        self.emit(SourceEvent::Notice {
            source: self.id.clone(),
            notice,
        });
    }

    fn emit(&self, event: SourceEvent) {
        let Some(events) = &self.events else {
            return;
        };
        match events.try_send(event) {
            Ok(()) | Err(mpsc::error::TrySendError::Closed(_)) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("event channel full, dropping source event");
            }
        }
    }
}

fn exit_message(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("helper exited with code {}", code),
        None => "helper terminated by signal".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_wire_shape() {
        let status = SourceStatus::new(SourceState::HungUp);
        let wire = serde_json::to_value(&status).unwrap();
        assert_eq!(wire["state"], "hung_up");
        assert_eq!(wire["restarts"], 0);
        assert!(wire.get("last_error").is_none());
    }

    #[test]
    fn test_exit_message() {
        assert_eq!(exit_message(Some(1)), "helper exited with code 1");
        assert_eq!(exit_message(None), "helper terminated by signal");
    }
}
