use crate::error::LaunchError;
use crate::invocation::{RuntimeProbe, ServiceInvocation};
use crate::log_sink::{LogSink, LogSource};
use std::process::Stdio;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

#[cfg(target_os = "windows")]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Checks preconditions and starts the service with both output streams piped.
pub async fn launch(invocation: &ServiceInvocation, sink: &LogSink) -> Result<Child, LaunchError> {
    sink.record(
        LogSource::Supervisor,
        format!("launching service: {}", invocation.display_command()),
    );

    let entry = invocation.entry();
    if !entry.exists() {
        sink.record(
            LogSource::Supervisor,
            format!("service entry not found: {}", entry.display()),
        );
        return Err(LaunchError::ExecutableNotFound {
            path: entry.to_path_buf(),
        });
    }

    if let Some(probe) = invocation.probe() {
        if let Err(err) = run_probe(probe).await {
            sink.record(LogSource::Supervisor, err.to_string());
            return Err(err);
        }
    }

    let mut cmd = Command::new(invocation.program());
    cmd.args(invocation.args())
        .envs(invocation.env())
        .current_dir(invocation.cwd())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    #[cfg(target_os = "windows")]
    cmd.creation_flags(CREATE_NO_WINDOW);

    let child = cmd.spawn().map_err(|source| {
        let program = invocation.program().to_string_lossy().to_string();
        sink.record(
            LogSource::Supervisor,
            format!("failed to spawn {program}: {source}"),
        );
        LaunchError::SpawnFailed { program, source }
    })?;

    let pid = child.id().unwrap_or_default();
    info!(pid, cwd = %invocation.cwd().display(), "service spawned");
    sink.record(LogSource::Supervisor, format!("service started with pid {pid}"));
    Ok(child)
}

async fn run_probe(probe: &RuntimeProbe) -> Result<(), LaunchError> {
    let unavailable = |reason: String| LaunchError::RuntimeUnavailable {
        program: probe.program.clone(),
        reason,
    };

    let mut cmd = Command::new(&probe.program);
    cmd.args(&probe.args).stdin(Stdio::null());
    #[cfg(target_os = "windows")]
    cmd.creation_flags(CREATE_NO_WINDOW);

    let output = cmd.output().await.map_err(|err| unavailable(err.to_string()))?;
    if !output.status.success() {
        warn!(program = %probe.program, status = %output.status, "runtime probe failed");
        return Err(unavailable(format!("probe exited with {}", output.status)));
    }

    // Older interpreters print their version on stderr.
    let version = if output.stdout.is_empty() {
        String::from_utf8_lossy(&output.stderr).trim().to_string()
    } else {
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    };
    debug!(program = %probe.program, %version, "runtime probe ok");
    Ok(())
}
