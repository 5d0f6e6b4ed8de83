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

//! Helper process management with Zombie Process Protection.
//!
//! Every helper is bound to this process: on Linux it receives SIGKILL when
//! the parent dies, and everywhere it is killed when its control handle is
//! dropped. Stopping sends SIGTERM first and escalates to SIGKILL after a
//! grace period.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncRead;
use tokio::process::{Child, Command};
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::common::errors::SourceError;

pub type BoxedReader = Box<dyn AsyncRead + Unpin + Send>;

/// A running helper as seen by its supervisor.
pub struct SpawnedProcess {
    pub pid: Option<u32>,
    pub stdout: BoxedReader,
    pub stderr: BoxedReader,
    /// Fires exactly once with the exit code, also after a kill.
    pub exit: oneshot::Receiver<Option<i32>>,
    pub control: ProcessControl,
}

/// Owner side of a helper's lifetime. Dropping it kills the helper.
pub struct ProcessControl {
    kill_tx: Option<oneshot::Sender<()>>,
}

impl ProcessControl {
    /// A control handle and the receiver its kill request arrives on.
    pub fn channel() -> (Self, oneshot::Receiver<()>) {
        let (kill_tx, kill_rx) = oneshot::channel();
        (
            Self {
                kill_tx: Some(kill_tx),
            },
            kill_rx,
        )
    }

    pub fn kill(&mut self) {
        if let Some(tx) = self.kill_tx.take() {
            let _ = tx.send(());
        }
    }

    pub fn is_killed(&self) -> bool {
        self.kill_tx.is_none()
    }
}

impl Drop for ProcessControl {
    fn drop(&mut self) {
        self.kill();
    }
}

/// Starts helper processes. Swappable so supervision can run against
/// in-memory fakes.
pub trait ProcessLauncher: Send + Sync {
    fn launch(&self, program: &Path, args: &[String]) -> Result<SpawnedProcess, SourceError>;
}

#[derive(Debug, Clone)]
pub struct SystemLauncher {
    kill_grace: Duration,
}

impl SystemLauncher {
    pub fn new(kill_grace: Duration) -> Self {
        Self { kill_grace }
    }
}

impl ProcessLauncher for SystemLauncher {
    fn launch(&self, program: &Path, args: &[String]) -> Result<SpawnedProcess, SourceError> {
        debug!(program = %program.display(), argc = args.len(), "spawning helper");

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(target_os = "linux")]
        // SAFETY: prctl(PR_SET_PDEATHSIG) is async-signal-safe and only
        // touches the calling (child) process between fork and exec.
        unsafe {
            command.pre_exec(|| {
                // SIGKILL the helper if we die first
                let ret = libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGKILL);
                if ret != 0 {
                    return Err(std::io::Error::last_os_error());
                }
                Ok(())
            });
        }

        let mut child = command.spawn().map_err(|source| SourceError::Spawn {
            program: program.display().to_string(),
            source,
        })?;

        let pid = child.id();
        let stdout = child
            .stdout
            .take()
            .map(|s| Box::new(s) as BoxedReader)
            .ok_or_else(|| SourceError::Io(std::io::Error::other("helper stdout not captured")))?;
        let stderr = child
            .stderr
            .take()
            .map(|s| Box::new(s) as BoxedReader)
            .ok_or_else(|| SourceError::Io(std::io::Error::other("helper stderr not captured")))?;

        let (control, kill_rx) = ProcessControl::channel();
        let (exit_tx, exit) = oneshot::channel();
        let grace = self.kill_grace;

        tokio::spawn(async move {
            let code = tokio::select! {
                _ = kill_rx => terminate(&mut child, grace).await,
                status = child.wait() => status.ok().and_then(|s| s.code()),
            };
            let _ = exit_tx.send(code);
        });

        Ok(SpawnedProcess {
            pid,
            stdout,
            stderr,
            exit,
            control,
        })
    }
}

/// SIGTERM, then SIGKILL once `grace` runs out.
async fn terminate(child: &mut Child, grace: Duration) -> Option<i32> {
    #[cfg(any(target_os = "linux", target_os = "macos"))]
    if let Some(pid) = child.id() {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        if kill(Pid::from_raw(pid as i32), Signal::SIGTERM).is_ok() {
            if let Ok(status) = tokio::time::timeout(grace, child.wait()).await {
                return status.ok().and_then(|s| s.code());
            }
            warn!(pid, grace_ms = grace.as_millis() as u64, "helper ignored SIGTERM, killing");
        }
    }
    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    let _ = grace;

    if let Err(e) = child.kill().await {
        debug!("kill failed: {}", e);
    }
    child.wait().await.ok().and_then(|s| s.code())
}
