use crate::config::SupervisorConfig;
use crate::error::{FatalCondition, SetupError};
use crate::invocation::ServiceInvocation;
use crate::launcher;
use crate::log_sink::{LogSink, LogSource};
use crate::monitor::{ProcessMonitor, ServiceState, StateCell, TerminateProcess};
use crate::paths::{self, PathInputs};
use crate::readiness::{Readiness, ReadinessGate};
use crate::run_mode::{HostOs, RunMode};
use crate::termination::Terminator;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::oneshot;
use tracing::{debug, info};

/// A service that passed the readiness gate.
#[derive(Debug)]
pub struct Started {
    pub pid: u32,
    /// Fires once if the service later crashes.
    pub fatal_rx: oneshot::Receiver<FatalCondition>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct ServiceStatus {
    pub state: ServiceState,
    pub mode: RunMode,
    pub pid: Option<u32>,
    pub model: String,
    pub port: u16,
    pub service_url: String,
    pub ui_url: String,
    pub root: String,
    pub log_path: Option<String>,
    pub last_error: Option<String>,
}

/// Drives one service launch for the lifetime of the shell.
#[derive(Debug)]
pub struct ServiceSupervisor {
    config: SupervisorConfig,
    mode: RunMode,
    host: HostOs,
    root: PathBuf,
    sink: Arc<LogSink>,
    state: StateCell,
    gate: ReadinessGate,
    terminator: Arc<dyn TerminateProcess>,
    monitor: Mutex<Option<ProcessMonitor>>,
    shutdown_requested: AtomicBool,
    last_error: Mutex<Option<String>>,
}

impl ServiceSupervisor {
    pub fn new(
        config: SupervisorConfig,
        mode: RunMode,
        host: HostOs,
        root: PathBuf,
        sink: Arc<LogSink>,
    ) -> Result<Self, SetupError> {
        let gate = ReadinessGate::new(config.readiness.clone(), config.health_url())?;
        Ok(Self {
            config,
            mode,
            host,
            root,
            sink,
            state: StateCell::default(),
            gate,
            terminator: Arc::new(Terminator::for_host(host)),
            monitor: Mutex::new(None),
            shutdown_requested: AtomicBool::new(false),
            last_error: Mutex::new(None),
        })
    }

    /// Reads mode, host and configuration from this process and resolves the
    /// service root.
    pub fn from_environment(sink: Arc<LogSink>) -> Result<Self, SetupError> {
        let host = HostOs::current();
        let mode = RunMode::from_env();
        let config = SupervisorConfig::from_env(host)?;
        let inputs = PathInputs::capture()?;
        let root = paths::resolve(mode, host, &inputs);
        Self::new(config, mode, host, root, sink)
    }

    pub fn with_terminator(mut self, terminator: Arc<dyn TerminateProcess>) -> Self {
        self.terminator = terminator;
        self
    }

    pub fn mode(&self) -> RunMode {
        self.mode
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn sink(&self) -> &Arc<LogSink> {
        &self.sink
    }

    pub fn state(&self) -> ServiceState {
        self.state.get()
    }

    /// URL the main window should load.
    pub fn ui_url(&self) -> String {
        match self.mode {
            RunMode::Development => self.config.dev_ui_url.clone(),
            RunMode::Packaged => self.config.service_url(),
        }
    }

    pub fn invocation(&self) -> ServiceInvocation {
        ServiceInvocation::for_current_process(self.mode, self.host, &self.root, &self.config)
    }

    /// Launches the service and waits until it is ready. Only the first call
    /// launches anything.
    pub async fn start(&self) -> Result<Started, FatalCondition> {
        self.start_with(self.invocation()).await
    }

    pub async fn start_with(&self, invocation: ServiceInvocation) -> Result<Started, FatalCondition> {
        if !self.state.transition(ServiceState::Launching) {
            return Err(self.fail(FatalCondition::SpawnFailed {
                program: invocation.program().to_string_lossy().to_string(),
                reason: format!("service already launched (state {})", self.state().as_str()),
            }));
        }
        self.sink.record(
            LogSource::Supervisor,
            format!("starting service (mode {}, root {})", self.mode, self.root.display()),
        );

        let child = match launcher::launch(&invocation, &self.sink).await {
            Ok(child) => child,
            Err(err) => {
                self.state.transition(ServiceState::SpawnFailed);
                return Err(self.fail(err.into()));
            }
        };

        let (monitor, fatal_rx) = ProcessMonitor::attach(
            child,
            self.state.clone(),
            Arc::clone(&self.sink),
            Arc::clone(&self.terminator),
        );
        let pid = monitor.pid();
        {
            let mut slot = lock(&self.monitor);
            if self.shutdown_requested.load(Ordering::SeqCst) {
                monitor.shutdown();
            }
            *slot = Some(monitor);
        }

        match self.gate.await_ready(&self.state).await {
            Ok(Readiness::Ready) => {
                info!(pid, "service ready");
                self.sink.record(LogSource::Supervisor, "service is ready");
                Ok(Started { pid, fatal_rx })
            }
            Ok(Readiness::ServiceGone(state)) => {
                let condition = match fatal_rx.await {
                    Ok(condition) => condition,
                    Err(_) => FatalCondition::LoadFailed {
                        reason: format!("service stopped before it was ready ({})", state.as_str()),
                    },
                };
                Err(self.fail(condition))
            }
            Err(condition) => Err(self.fail(condition)),
        }
    }

    /// Best-effort termination of the service. Safe to call at any time and
    /// more than once.
    pub fn shutdown(&self) {
        let slot = lock(&self.monitor);
        match slot.as_ref() {
            Some(monitor) => monitor.shutdown(),
            None => {
                // A launch still in flight terminates its child once attached.
                self.shutdown_requested.store(true, Ordering::SeqCst);
                debug!(state = ?self.state(), "shutdown before launch");
            }
        }
    }

    /// Resolves once the service reaches a terminal state.
    pub async fn wait_for_exit(&self) -> ServiceState {
        self.state.wait_terminal().await
    }

    /// Makes sure the window URL answers before the window is created.
    pub async fn check_ui(&self) -> Result<(), FatalCondition> {
        let url = self.ui_url();
        match self.gate.check_reachable(&url).await {
            Ok(()) => Ok(()),
            Err(err) => Err(self.fail(FatalCondition::LoadFailed {
                reason: format!("{url} did not load: {err}"),
            })),
        }
    }

    pub fn status(&self) -> ServiceStatus {
        let pid = lock(&self.monitor).as_ref().map(ProcessMonitor::pid);
        ServiceStatus {
            state: self.state(),
            mode: self.mode,
            pid,
            model: self.config.model.clone(),
            port: self.config.port,
            service_url: self.config.service_url(),
            ui_url: self.ui_url(),
            root: self.root.to_string_lossy().to_string(),
            log_path: self
                .sink
                .path()
                .map(|path| path.to_string_lossy().to_string()),
            last_error: lock(&self.last_error).clone(),
        }
    }

    /// Logs a fatal condition and keeps its tag for status reports.
    pub fn record_fatal(&self, condition: &FatalCondition) {
        self.sink.record(
            LogSource::Supervisor,
            format!("fatal: {} ({})", condition.tag(), condition),
        );
        *lock(&self.last_error) = Some(condition.tag());
    }

    fn fail(&self, condition: FatalCondition) -> FatalCondition {
        self.record_fatal(&condition);
        condition
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
