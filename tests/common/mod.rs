//! Shared fixtures: an in-memory process launcher and PCM recorder.
#![allow(dead_code)]

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncWriteExt, DuplexStream};
use tokio::sync::{mpsc, oneshot};

use roomcast::common::errors::SourceError;
use roomcast::stream::{
    Directive, PcmListener, ProcessCommand, ProcessControl, ProcessLauncher, SourceAdapter,
    SourceEvent, SourceHandle, SourceNotice, SourceSettings, SourceState, SpawnedProcess,
    StreamSource, StreamUri,
};

/// Test side of a launched fake helper.
pub struct FakeProcess {
    pub stdout: DuplexStream,
    pub stderr: DuplexStream,
    exit: Option<oneshot::Sender<Option<i32>>>,
    killed: Option<oneshot::Receiver<()>>,
}

impl FakeProcess {
    pub async fn write_pcm(&mut self, data: &[u8]) {
        self.stdout.write_all(data).await.unwrap();
    }

    pub async fn write_stderr(&mut self, line: &str) {
        self.stderr
            .write_all(format!("{}\n", line).as_bytes())
            .await
            .unwrap();
    }

    /// Simulate the helper exiting on its own. Its pipes close with it.
    pub fn exit(&mut self, code: Option<i32>) {
        self.stdout = closed_pipe();
        self.stderr = closed_pipe();
        self.exit_with_pipes_open(code);
    }

    /// Exit while something else, like a forked child, still holds the pipes.
    pub fn exit_with_pipes_open(&mut self, code: Option<i32>) {
        if let Some(tx) = self.exit.take() {
            let _ = tx.send(code);
        }
    }

    /// Resolves once the supervisor killed this helper.
    pub async fn killed(&mut self) {
        let rx = self.killed.take().expect("killed() awaited twice");
        rx.await.expect("helper was never killed");
    }
}

/// Write end whose reader is already gone.
fn closed_pipe() -> DuplexStream {
    tokio::io::duplex(1).0
}

pub struct FakeLauncher {
    processes: mpsc::UnboundedSender<FakeProcess>,
    launches: AtomicUsize,
    commands: Mutex<Vec<ProcessCommand>>,
    failure: Mutex<Option<io::ErrorKind>>,
}

impl FakeLauncher {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<FakeProcess>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let launcher = Arc::new(Self {
            processes: tx,
            launches: AtomicUsize::new(0),
            commands: Mutex::new(Vec::new()),
            failure: Mutex::new(None),
        });
        (launcher, rx)
    }

    /// Make subsequent launches fail with `kind`, or succeed with `None`.
    pub fn fail_with(&self, kind: Option<io::ErrorKind>) {
        *self.failure.lock().unwrap() = kind;
    }

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn last_command(&self) -> Option<ProcessCommand> {
        self.commands.lock().unwrap().last().cloned()
    }
}

impl ProcessLauncher for FakeLauncher {
    fn launch(&self, program: &Path, args: &[String]) -> Result<SpawnedProcess, SourceError> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        self.commands.lock().unwrap().push(ProcessCommand {
            program: program.to_path_buf(),
            args: args.to_vec(),
        });
        if let Some(kind) = *self.failure.lock().unwrap() {
            return Err(SourceError::Spawn {
                program: program.display().to_string(),
                source: io::Error::from(kind),
            });
        }

        let (stdout_w, stdout_r) = tokio::io::duplex(64 * 1024);
        let (stderr_w, stderr_r) = tokio::io::duplex(64 * 1024);
        let (control, kill_rx) = ProcessControl::channel();
        let (exit_tx, exit_rx) = oneshot::channel();
        let (test_exit_tx, test_exit_rx) = oneshot::channel::<Option<i32>>();
        let (killed_tx, killed_rx) = oneshot::channel();

        tokio::spawn(async move {
            let code = tokio::select! {
                _ = kill_rx => {
                    let _ = killed_tx.send(());
                    None
                }
                code = test_exit_rx => code.unwrap_or(None),
            };
            let _ = exit_tx.send(code);
        });

        let _ = self.processes.send(FakeProcess {
            stdout: stdout_w,
            stderr: stderr_w,
            exit: Some(test_exit_tx),
            killed: Some(killed_rx),
        });

        Ok(SpawnedProcess {
            pid: None,
            stdout: Box::new(stdout_r),
            stderr: Box::new(stderr_r),
            exit: exit_rx,
            control,
        })
    }
}

/// Records every PCM chunk with its source id.
pub struct ChunkRecorder {
    tx: mpsc::UnboundedSender<(String, Vec<u8>)>,
}

impl PcmListener for ChunkRecorder {
    fn on_chunk(&self, source_id: &str, chunk: &[u8]) {
        let _ = self.tx.send((source_id.to_string(), chunk.to_vec()));
    }
}

pub fn recorder() -> (Arc<ChunkRecorder>, mpsc::UnboundedReceiver<(String, Vec<u8>)>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Arc::new(ChunkRecorder { tx }), rx)
}

/// Minimal adapter: optional watchdog, halts on a stderr line containing "fatal".
pub struct TestAdapter {
    pub timeout: Option<Duration>,
}

impl SourceAdapter for TestAdapter {
    fn kind(&self) -> &'static str {
        "test"
    }

    fn command(&mut self) -> Result<ProcessCommand, SourceError> {
        Ok(ProcessCommand {
            program: PathBuf::from("/fake/helper"),
            args: vec!["--pipe".to_string()],
        })
    }

    fn watchdog_timeout(&self) -> Option<Duration> {
        self.timeout
    }

    fn on_stderr_line(&mut self, line: &str) -> Directive {
        if line.contains("fatal") {
            Directive::Halt(SourceNotice::AuthenticationFailed {
                message: line.to_string(),
            })
        } else {
            Directive::Continue
        }
    }
}

pub fn fast_settings() -> SourceSettings {
    SourceSettings {
        backoff_initial: Duration::from_millis(500),
        backoff_max: Duration::from_secs(4),
        kill_grace: Duration::from_millis(100),
        read_chunk_bytes: 4096,
    }
}

pub fn test_source(
    name: &str,
    timeout: Option<Duration>,
    launcher: Arc<FakeLauncher>,
    listener: Arc<ChunkRecorder>,
) -> StreamSource {
    let uri = StreamUri::parse(&format!("test:///helper?name={}", name)).unwrap();
    StreamSource::new(uri, Box::new(TestAdapter { timeout }), listener)
        .unwrap()
        .with_launcher(launcher)
        .with_settings(fast_settings())
}

pub async fn wait_state(handle: &SourceHandle, state: SourceState) {
    let mut rx = handle.subscribe();
    rx.wait_for(|s| s.state == state)
        .await
        .map(|_| ())
        .expect("source task ended early");
}

pub async fn next_notice(events: &mut mpsc::Receiver<SourceEvent>) -> SourceNotice {
    loop {
        match events.recv().await.expect("event channel closed") {
            SourceEvent::Notice { notice, .. } => return notice,
            SourceEvent::StateChanged { .. } => {}
        }
    }
}

/// Every state change already queued on `events`.
pub fn drain_states(events: &mut mpsc::Receiver<SourceEvent>) -> Vec<SourceState> {
    let mut states = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let SourceEvent::StateChanged { status, .. } = event {
            states.push(status.state);
        }
    }
    states
}
