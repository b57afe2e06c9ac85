//! Ownership of the running service process.
//!
//! The monitor captures both output streams into the log, classifies the exit
//! and raises at most one [`FatalCondition`] per process. Shutdown terminates
//! the child through a [`TerminateProcess`] capability without waiting for it.

use crate::error::{ExitCode, FatalCondition, TerminateError};
use crate::log_sink::{LogSink, LogSource};
use crate::termination::Terminator;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Child;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const READER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "exit_code")]
pub enum ExitClass {
    Clean,
    Crashed(ExitCode),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "exit")]
pub enum ServiceState {
    NotStarted,
    Launching,
    SpawnFailed,
    Running,
    Exited(ExitClass),
    ForciblyTerminated,
}

impl ServiceState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::SpawnFailed | Self::Exited(_) | Self::ForciblyTerminated
        )
    }

    pub fn can_transition_to(self, next: ServiceState) -> bool {
        matches!(
            (self, next),
            (Self::NotStarted, Self::Launching)
                | (Self::Launching, Self::SpawnFailed)
                | (Self::Launching, Self::Running)
                | (Self::Running, Self::Exited(_))
                | (Self::Running, Self::ForciblyTerminated)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::Launching => "launching",
            Self::SpawnFailed => "spawn_failed",
            Self::Running => "running",
            Self::Exited(ExitClass::Clean) => "exited_clean",
            Self::Exited(ExitClass::Crashed(_)) => "crashed",
            Self::ForciblyTerminated => "forcibly_terminated",
        }
    }
}

/// Shared, watchable lifecycle state. Transitions are checked and atomic.
#[derive(Debug, Clone)]
pub struct StateCell {
    tx: Arc<watch::Sender<ServiceState>>,
}

impl Default for StateCell {
    fn default() -> Self {
        let (tx, _rx) = watch::channel(ServiceState::NotStarted);
        Self { tx: Arc::new(tx) }
    }
}

impl StateCell {
    pub fn get(&self) -> ServiceState {
        *self.tx.borrow()
    }

    /// Applies `next` if the current state allows it. Returns whether it did.
    pub fn transition(&self, next: ServiceState) -> bool {
        self.tx.send_if_modified(|current| {
            if current.can_transition_to(next) {
                *current = next;
                true
            } else {
                false
            }
        })
    }

    pub fn subscribe(&self) -> watch::Receiver<ServiceState> {
        self.tx.subscribe()
    }

    pub async fn wait_terminal(&self) -> ServiceState {
        let mut rx = self.subscribe();
        let result = rx.wait_for(|state| state.is_terminal()).await.map(|state| *state);
        result.unwrap_or_else(|_| self.get())
    }
}

/// Stops a process by pid.
pub trait TerminateProcess: Send + Sync + fmt::Debug {
    fn terminate(&self, pid: u32) -> Result<(), TerminateError>;
}

impl TerminateProcess for Terminator {
    fn terminate(&self, pid: u32) -> Result<(), TerminateError> {
        Terminator::terminate(*self, pid)
    }
}

#[derive(Debug)]
pub struct ProcessMonitor {
    pid: u32,
    state: StateCell,
    sink: Arc<LogSink>,
    terminator: Arc<dyn TerminateProcess>,
}

impl ProcessMonitor {
    /// Takes ownership of a freshly spawned child and moves `state` from
    /// `Launching` to `Running`. The receiver yields a condition only if the
    /// service crashes; it closes without one on a clean or requested exit.
    pub fn attach(
        mut child: Child,
        state: StateCell,
        sink: Arc<LogSink>,
        terminator: Arc<dyn TerminateProcess>,
    ) -> (Self, oneshot::Receiver<FatalCondition>) {
        let pid = child.id().unwrap_or_default();
        state.transition(ServiceState::Running);

        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(spawn_reader(stdout, LogSource::Stdout, Arc::clone(&sink)));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(spawn_reader(stderr, LogSource::Stderr, Arc::clone(&sink)));
        }

        let (fatal_tx, fatal_rx) = oneshot::channel();
        tokio::spawn(watch_exit(
            child,
            pid,
            readers,
            state.clone(),
            Arc::clone(&sink),
            fatal_tx,
        ));

        let monitor = Self {
            pid,
            state,
            sink,
            terminator,
        };
        (monitor, fatal_rx)
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn state(&self) -> ServiceState {
        self.state.get()
    }

    /// Terminates the child if it is still running. Never blocks, never fails,
    /// and signals the process at most once.
    pub fn shutdown(&self) {
        if !self.state.transition(ServiceState::ForciblyTerminated) {
            debug!(pid = self.pid, state = ?self.state.get(), "service not running, nothing to terminate");
            return;
        }
        self.sink.record(
            LogSource::Supervisor,
            format!("terminating service pid {}", self.pid),
        );
        if let Err(err) = self.terminator.terminate(self.pid) {
            warn!(pid = self.pid, error = %err, "service termination failed");
            self.sink.record(LogSource::Supervisor, err.to_string());
        }
    }
}

async fn watch_exit(
    mut child: Child,
    pid: u32,
    readers: Vec<JoinHandle<()>>,
    state: StateCell,
    sink: Arc<LogSink>,
    fatal_tx: oneshot::Sender<FatalCondition>,
) {
    let code = match child.wait().await {
        Ok(status) => ExitCode::from_status(status),
        Err(err) => {
            warn!(pid, error = %err, "failed to wait on service");
            ExitCode::Unknown
        }
    };
    let class = if code.is_clean() {
        ExitClass::Clean
    } else {
        ExitClass::Crashed(code)
    };
    let classified = state.transition(ServiceState::Exited(class));

    for reader in readers {
        if tokio::time::timeout(READER_DRAIN_TIMEOUT, reader).await.is_err() {
            debug!(pid, "output reader still open after exit");
        }
    }

    if !classified {
        info!(pid, %code, "service stopped after shutdown request");
        sink.record(
            LogSource::Supervisor,
            format!("service stopped during shutdown (exit code {code})"),
        );
        return;
    }

    match class {
        ExitClass::Clean => {
            info!(pid, "service exited cleanly");
            sink.record(LogSource::Supervisor, "service exited with code 0");
        }
        ExitClass::Crashed(code) => {
            warn!(pid, %code, "service crashed");
            sink.record(
                LogSource::Supervisor,
                format!("service crashed with exit code {code}"),
            );
            if fatal_tx.send(FatalCondition::Crashed(code)).is_err() {
                debug!(pid, "no listener for crash notification");
            }
        }
    }
}

fn spawn_reader<R>(stream: R, source: LogSource, sink: Arc<LogSink>) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(stream);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => sink.record(source, String::from_utf8_lossy(&buf)),
                Err(err) => {
                    warn!(stream = source.as_str(), error = %err, "service output read failed");
                    break;
                }
            }
        }
    })
}
