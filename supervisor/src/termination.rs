use crate::error::TerminateError;
use crate::run_mode::HostOs;

/// OS-specific way of stopping the service, chosen once from the host OS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminator {
    /// Default termination signal delivered straight to the pid.
    PosixSignal,
    /// `taskkill /pid <pid> /f /t`, which also takes down the process tree.
    WindowsTreeKill,
}

impl Terminator {
    pub fn for_host(host: HostOs) -> Self {
        if host.is_windows() {
            Self::WindowsTreeKill
        } else {
            Self::PosixSignal
        }
    }

    /// Best effort. Does not wait for the process to go away.
    pub fn terminate(self, pid: u32) -> Result<(), TerminateError> {
        match self {
            Self::PosixSignal => send_sigterm(pid),
            Self::WindowsTreeKill => spawn_tree_kill(pid),
        }
    }
}

#[cfg(unix)]
fn send_sigterm(pid: u32) -> Result<(), TerminateError> {
    use nix::errno::Errno;
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let raw = i32::try_from(pid).map_err(|_| TerminateError::Signal {
        pid,
        reason: "pid out of range".to_string(),
    })?;
    match kill(Pid::from_raw(raw), Signal::SIGTERM) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(err) => Err(TerminateError::Signal {
            pid,
            reason: err.to_string(),
        }),
    }
}

#[cfg(not(unix))]
fn send_sigterm(pid: u32) -> Result<(), TerminateError> {
    Err(TerminateError::Signal {
        pid,
        reason: "signals are not available on this platform".to_string(),
    })
}

fn tree_kill_command(pid: u32) -> std::process::Command {
    let mut cmd = std::process::Command::new("taskkill");
    cmd.args(["/pid", &pid.to_string(), "/f", "/t"]);
    cmd
}

fn spawn_tree_kill(pid: u32) -> Result<(), TerminateError> {
    let mut cmd = tree_kill_command(pid);
    cmd.stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null());
    #[cfg(target_os = "windows")]
    {
        use std::os::windows::process::CommandExt;
        cmd.creation_flags(0x0800_0000);
    }
    cmd.spawn()
        .map(|_| ())
        .map_err(|source| TerminateError::TreeKill { pid, source })
}
