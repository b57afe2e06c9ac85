//! Root directory resolution for the backing service.
//!
//! Everything here is path arithmetic over facts captured once at startup, so
//! the same inputs always resolve to the same root.

use crate::run_mode::{HostOs, RunMode};
use std::env;
use std::io;
use std::path::{Path, PathBuf};

/// Process facts the resolver depends on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathInputs {
    pub cwd: PathBuf,
    pub exe: PathBuf,
}

impl PathInputs {
    pub fn new(cwd: impl Into<PathBuf>, exe: impl Into<PathBuf>) -> Self {
        Self {
            cwd: cwd.into(),
            exe: exe.into(),
        }
    }

    pub fn capture() -> io::Result<Self> {
        Ok(Self {
            cwd: env::current_dir()?,
            exe: env::current_exe()?,
        })
    }
}

pub fn resolve(mode: RunMode, host: HostOs, inputs: &PathInputs) -> PathBuf {
    match (mode, host) {
        (RunMode::Development, _) => inputs.cwd.clone(),
        (RunMode::Packaged, HostOs::MacOs) => bundle_contents_dir(&inputs.exe),
        (RunMode::Packaged, _) => exe_dir(&inputs.exe),
    }
}

fn exe_dir(exe: &Path) -> PathBuf {
    match exe.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

// <App>.app/Contents/MacOS/<exe>: resources sit in Contents/Resources and the
// root is their parent.
fn bundle_contents_dir(exe: &Path) -> PathBuf {
    let resources = exe_dir(exe).join("..").join("Resources");
    let Some(contents) = resources.parent() else {
        return PathBuf::from(".");
    };
    normalize_lexically(contents)
}

fn normalize_lexically(path: &Path) -> PathBuf {
    use std::path::Component;

    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        out
    }
}
