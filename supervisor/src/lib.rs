//! Supervisor for the local inpainting service behind the desktop shell.
//!
//! Resolves where the service lives for the current run mode, launches it,
//! captures its output into the application log, watches for crashes and
//! tears it down when the shell exits.

pub mod config;
pub mod error;
pub mod invocation;
pub mod launcher;
pub mod log_sink;
pub mod monitor;
pub mod paths;
pub mod readiness;
pub mod run_mode;
pub mod service;
pub mod termination;

pub use config::{ReadinessPolicy, SupervisorConfig};
pub use error::{ExitCode, FatalCondition, LaunchError, SetupError, TerminateError};
pub use invocation::ServiceInvocation;
pub use log_sink::{LogSink, LogSource};
pub use monitor::{ExitClass, ProcessMonitor, ServiceState, StateCell, TerminateProcess};
pub use paths::PathInputs;
pub use readiness::{Readiness, ReadinessGate};
pub use run_mode::{HostOs, RunMode};
pub use service::{ServiceStatus, ServiceSupervisor, Started};
pub use termination::Terminator;
