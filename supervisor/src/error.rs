use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid {key} '{value}': expected {expected}")]
    Invalid {
        key: &'static str,
        value: String,
        expected: &'static str,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to inspect the running executable: {0}")]
    Paths(#[from] std::io::Error),

    #[error("failed to build the http client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("service entry not found at {}", path.display())]
    ExecutableNotFound { path: PathBuf },

    #[error("runtime '{program}' is not callable: {reason}")]
    RuntimeUnavailable { program: String, reason: String },

    #[error("failed to spawn '{program}': {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum TerminateError {
    #[error("failed to signal pid {pid}: {reason}")]
    Signal { pid: u32, reason: String },

    #[error("failed to run taskkill for pid {pid}: {source}")]
    TreeKill {
        pid: u32,
        #[source]
        source: std::io::Error,
    },
}

/// How a child process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum ExitCode {
    Code(i32),
    Signal(i32),
    Unknown,
}

impl ExitCode {
    pub fn from_status(status: std::process::ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return Self::Code(code);
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                return Self::Signal(signal);
            }
        }
        Self::Unknown
    }

    pub fn is_clean(self) -> bool {
        self == Self::Code(0)
    }
}

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Code(code) => write!(f, "{code}"),
            Self::Signal(signal) => write!(f, "signal-{signal}"),
            Self::Unknown => f.write_str("unknown"),
        }
    }
}

/// A condition after which the application must stop.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FatalCondition {
    #[error("The inference service was not found at {}.", path.display())]
    ExecutableNotFound { path: PathBuf },

    #[error("'{program}' could not be run ({reason}). Install it and relaunch.")]
    RuntimeUnavailable { program: String, reason: String },

    #[error("The inference service could not be started: {reason}")]
    SpawnFailed { program: String, reason: String },

    #[error("The inference service crashed (exit code {0}).")]
    Crashed(ExitCode),

    #[error("The inference service did not become ready within {}s.", elapsed.as_secs())]
    StartupTimeout { elapsed: Duration },

    #[error("The user interface failed to load: {reason}")]
    LoadFailed { reason: String },
}

impl FatalCondition {
    /// Short machine-readable tag, e.g. `crashed:1`.
    pub fn tag(&self) -> String {
        match self {
            Self::ExecutableNotFound { .. } => "executable-not-found".to_string(),
            Self::RuntimeUnavailable { .. } => "runtime-unavailable".to_string(),
            Self::SpawnFailed { .. } => "spawn-failed".to_string(),
            Self::Crashed(code) => format!("crashed:{code}"),
            Self::StartupTimeout { .. } => "startup-timeout".to_string(),
            Self::LoadFailed { reason } => format!("load-failed:{reason}"),
        }
    }
}

impl From<LaunchError> for FatalCondition {
    fn from(err: LaunchError) -> Self {
        match err {
            LaunchError::ExecutableNotFound { path } => Self::ExecutableNotFound { path },
            LaunchError::RuntimeUnavailable { program, reason } => {
                Self::RuntimeUnavailable { program, reason }
            }
            LaunchError::SpawnFailed { program, source } => Self::SpawnFailed {
                program,
                reason: source.to_string(),
            },
        }
    }
}
