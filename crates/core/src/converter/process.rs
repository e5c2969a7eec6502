//! Handle over one spawned conversion process.
//!
//! The handle never blocks on the child's output: every stdio stream is
//! redirected to the null device, so a chatty engine cannot fill a pipe and
//! stall. Spawn problems are folded into the handle's status instead of being
//! returned from [`ProcessHandle::start`], which keeps the worker loop uniform.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tokio::process::{Child, Command};
use tracing::{debug, warn};

use super::error::ProcessError;

/// Program, arguments and required inputs for one external process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Files that must exist before the process is spawned.
    pub inputs: Vec<PathBuf>,
}

impl ProcessCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            inputs: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn input(mut self, path: impl Into<PathBuf>) -> Self {
        self.inputs.push(path.into());
        self
    }
}

/// Why a process ended unsuccessfully.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExitFailure {
    /// The process never ran.
    Spawn { reason: String },
    /// The process ran and exited with a failure status. `code` is `None`
    /// when it was ended by a signal.
    Status { code: Option<i32> },
}

/// Non-blocking view of a process's state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessStatus {
    Running,
    ExitedOk,
    ExitedError(ExitFailure),
}

impl ProcessStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::ExitedOk => "exited_ok",
            Self::ExitedError(ExitFailure::Spawn { .. }) => "spawn_failed",
            Self::ExitedError(ExitFailure::Status { .. }) => "exited_error",
        }
    }

    /// A process that can no longer be polled is treated as failed.
    fn poll_failed() -> Self {
        Self::ExitedError(ExitFailure::Status { code: None })
    }

    fn from_exit(status: ExitStatus) -> Self {
        if status.success() {
            Self::ExitedOk
        } else {
            Self::ExitedError(ExitFailure::Status {
                code: status.code(),
            })
        }
    }
}

enum Inner {
    Spawned {
        child: Child,
        pid: Option<u32>,
        exit: Option<ExitStatus>,
    },
    Failed(ProcessError),
}

/// A live (or already finished) external conversion process.
///
/// Owned by exactly one worker for its whole lifetime.
pub struct ProcessHandle {
    inner: Inner,
    started_at: DateTime<Utc>,
    started: Instant,
    terminate_requested: bool,
}

impl ProcessHandle {
    /// Spawns `command` and returns immediately.
    pub fn start(command: &ProcessCommand) -> Self {
        let started_at = Utc::now();
        let started = Instant::now();

        let inner = match Self::spawn(command) {
            Ok(child) => {
                let pid = child.id();
                debug!(program = %command.program.display(), ?pid, "Spawned process");
                Inner::Spawned {
                    child,
                    pid,
                    exit: None,
                }
            }
            Err(e) => {
                debug!(program = %command.program.display(), error = %e, "Process not spawned");
                Inner::Failed(e)
            }
        };

        Self {
            inner,
            started_at,
            started,
            terminate_requested: false,
        }
    }

    fn spawn(command: &ProcessCommand) -> Result<Child, ProcessError> {
        if let Some(missing) = command.inputs.iter().find(|p| !p.exists()) {
            return Err(ProcessError::InputNotFound {
                path: missing.clone(),
            });
        }

        Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ProcessError::from_spawn(command.program.clone(), e))
    }

    /// OS process id, if the process was spawned.
    pub fn pid(&self) -> Option<u32> {
        match &self.inner {
            Inner::Spawned { pid, .. } => *pid,
            Inner::Failed(_) => None,
        }
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Spawn error, if the process never ran.
    pub fn spawn_error(&self) -> Option<&ProcessError> {
        match &self.inner {
            Inner::Failed(e) => Some(e),
            Inner::Spawned { .. } => None,
        }
    }

    /// Checks whether the process is still running without blocking.
    pub fn poll(&mut self) -> ProcessStatus {
        match &mut self.inner {
            Inner::Failed(e) => ProcessStatus::ExitedError(ExitFailure::Spawn {
                reason: e.to_string(),
            }),
            Inner::Spawned {
                exit: Some(status), ..
            } => ProcessStatus::from_exit(*status),
            Inner::Spawned { child, pid, exit } => match child.try_wait() {
                Ok(Some(status)) => {
                    *exit = Some(status);
                    ProcessStatus::from_exit(status)
                }
                Ok(None) => ProcessStatus::Running,
                Err(e) => {
                    warn!(?pid, error = %e, "Failed to poll process, killing it");
                    if let Err(e) = child.start_kill() {
                        debug!(?pid, error = %e, "Kill after poll failure failed");
                    }
                    ProcessStatus::poll_failed()
                }
            },
        }
    }

    pub fn is_running(&mut self) -> bool {
        self.poll().is_running()
    }

    /// Requests termination. Safe to call repeatedly or after exit.
    pub fn terminate(&mut self) {
        if self.terminate_requested {
            return;
        }
        let Inner::Spawned {
            child,
            pid,
            exit: None,
        } = &mut self.inner
        else {
            return;
        };

        match child.start_kill() {
            Ok(()) => {
                debug!(?pid, "Termination requested");
                self.terminate_requested = true;
            }
            // Already reaped by the runtime.
            Err(e) if e.kind() == std::io::ErrorKind::InvalidInput => {
                self.terminate_requested = true;
            }
            Err(e) => warn!(?pid, error = %e, "Failed to signal process"),
        }
    }

    /// Whether [`terminate`](Self::terminate) has taken effect.
    pub fn terminate_requested(&self) -> bool {
        self.terminate_requested
    }

    /// Waits until the process has exited and reaps it.
    pub async fn wait(&mut self) -> ProcessStatus {
        match &mut self.inner {
            Inner::Failed(e) => ProcessStatus::ExitedError(ExitFailure::Spawn {
                reason: e.to_string(),
            }),
            Inner::Spawned {
                exit: Some(status), ..
            } => ProcessStatus::from_exit(*status),
            Inner::Spawned { child, pid, exit } => match child.wait().await {
                Ok(status) => {
                    *exit = Some(status);
                    ProcessStatus::from_exit(status)
                }
                Err(e) => {
                    warn!(?pid, error = %e, "Failed to wait for process");
                    ProcessStatus::ExitedError(ExitFailure::Status { code: None })
                }
            },
        }
    }
}

impl std::fmt::Debug for ProcessHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessHandle")
            .field("pid", &self.pid())
            .field("started_at", &self.started_at)
            .field("spawn_error", &self.spawn_error())
            .field("terminate_requested", &self.terminate_requested)
            .finish()
    }
}
