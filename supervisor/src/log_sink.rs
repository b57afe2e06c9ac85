//! Process-wide append-only log.
//!
//! Each line is written with a single `write_all` while the file lock is held,
//! so supervisor events and the two stream readers never interleave mid-line.
//! Lines are also echoed to stdout. The file is never rotated or truncated.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Where a log line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogSource {
    Supervisor,
    Shell,
    Stdout,
    Stderr,
}

impl LogSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Supervisor => "supervisor",
            Self::Shell => "shell",
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        }
    }
}

#[derive(Debug)]
pub struct LogSink {
    file: Option<Mutex<File>>,
    path: Option<PathBuf>,
    echo: bool,
}

impl LogSink {
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Some(Mutex::new(file)),
            path: Some(path.to_path_buf()),
            echo: true,
        })
    }

    /// Sink used when the log file cannot be opened.
    pub fn stdout_only() -> Self {
        Self {
            file: None,
            path: None,
            echo: true,
        }
    }

    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn write(&self, line: &str) {
        let line = line.trim_end_matches(['\r', '\n']);
        if let Some(file) = self.file.as_ref() {
            let mut record = String::with_capacity(line.len() + 1);
            record.push_str(line);
            record.push('\n');
            let mut guard = match file.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            if let Err(err) = guard.write_all(record.as_bytes()) {
                tracing::warn!(error = %err, "failed to append to service log");
            }
        }
        if self.echo {
            // A closed stdout must not stop output capture.
            let _ = echo_line(io::stdout().lock(), line);
        }
    }

    pub fn record(&self, source: LogSource, message: impl AsRef<str>) {
        self.write(&format!("[{}] {}", source.as_str(), message.as_ref()));
    }
}

fn echo_line(mut out: impl Write, line: &str) -> io::Result<()> {
    writeln!(out, "{line}")?;
    out.flush()
}
