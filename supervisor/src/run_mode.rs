use serde::Serialize;
use std::fmt;

/// Environment variable selecting between a source checkout and a packaged run.
pub const RUN_MODE_ENV: &str = "INPAINT_RUN_MODE";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    Development,
    Packaged,
}

impl RunMode {
    pub fn from_raw(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Self::Development,
            _ => Self::Packaged,
        }
    }

    /// Reads the mode once at startup. An unset variable means a packaged run.
    pub fn from_env() -> Self {
        std::env::var(RUN_MODE_ENV)
            .map(|raw| Self::from_raw(&raw))
            .unwrap_or(Self::Packaged)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Packaged => "packaged",
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Host operating system family, detected from the compile target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostOs {
    MacOs,
    Windows,
    Linux,
    Other,
}

impl HostOs {
    pub fn current() -> Self {
        if cfg!(target_os = "macos") {
            Self::MacOs
        } else if cfg!(target_os = "windows") {
            Self::Windows
        } else if cfg!(target_os = "linux") {
            Self::Linux
        } else {
            Self::Other
        }
    }

    pub fn is_windows(self) -> bool {
        self == Self::Windows
    }

    pub fn exe_suffix(self) -> &'static str {
        if self.is_windows() {
            ".exe"
        } else {
            ""
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn development_aliases_are_recognised() {
        assert_eq!(RunMode::from_raw("development"), RunMode::Development);
        assert_eq!(RunMode::from_raw(" Dev "), RunMode::Development);
    }

    #[test]
    fn anything_else_is_packaged() {
        assert_eq!(RunMode::from_raw(""), RunMode::Packaged);
        assert_eq!(RunMode::from_raw("production"), RunMode::Packaged);
    }

    #[test]
    fn exe_suffix_only_on_windows() {
        assert_eq!(HostOs::Windows.exe_suffix(), ".exe");
        assert_eq!(HostOs::MacOs.exe_suffix(), "");
        assert_eq!(HostOs::Linux.exe_suffix(), "");
    }
}
