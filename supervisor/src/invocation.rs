use crate::config::SupervisorConfig;
use crate::run_mode::{HostOs, RunMode};
use std::collections::BTreeMap;
use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

const UNBUFFERED_ENV: &str = "PYTHONUNBUFFERED";
const SEARCH_PATH_ENV: &str = "PYTHONPATH";

/// Trivial invocation checking that a runtime is callable at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeProbe {
    pub program: String,
    pub args: Vec<String>,
}

/// Fully resolved launch descriptor for one launch attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceInvocation {
    program: PathBuf,
    args: Vec<OsString>,
    env: BTreeMap<String, OsString>,
    cwd: PathBuf,
    entry: PathBuf,
    probe: Option<RuntimeProbe>,
}

impl ServiceInvocation {
    pub fn build(
        mode: RunMode,
        host: HostOs,
        root: &Path,
        config: &SupervisorConfig,
        inherited_search_path: Option<&OsString>,
    ) -> Self {
        let service_args = [
            "start".to_string(),
            "--model".to_string(),
            config.model.clone(),
            "--port".to_string(),
            config.port.to_string(),
        ];

        let (program, entry, mut args, probe) = match mode {
            RunMode::Development => {
                let script = root.join(&config.entry_script);
                let probe = RuntimeProbe {
                    program: config.python_bin.clone(),
                    args: vec!["--version".to_string()],
                };
                (
                    PathBuf::from(&config.python_bin),
                    script.clone(),
                    vec![script.into_os_string()],
                    Some(probe),
                )
            }
            RunMode::Packaged => {
                let binary = root
                    .join(&config.service_dir)
                    .join(format!("{}{}", config.service_binary, host.exe_suffix()));
                (binary.clone(), binary, Vec::new(), None)
            }
        };
        args.extend(service_args.into_iter().map(OsString::from));

        let mut env = BTreeMap::new();
        env.insert(UNBUFFERED_ENV.to_string(), OsString::from("1"));
        env.insert(
            SEARCH_PATH_ENV.to_string(),
            prepend_search_path(root, inherited_search_path),
        );

        Self {
            program,
            args,
            env,
            cwd: root.to_path_buf(),
            entry,
            probe,
        }
    }

    /// Builds against the live `PYTHONPATH` of this process.
    pub fn for_current_process(
        mode: RunMode,
        host: HostOs,
        root: &Path,
        config: &SupervisorConfig,
    ) -> Self {
        let inherited = env::var_os(SEARCH_PATH_ENV);
        Self::build(mode, host, root, config, inherited.as_ref())
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn args(&self) -> &[OsString] {
        &self.args
    }

    pub fn env(&self) -> &BTreeMap<String, OsString> {
        &self.env
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// File that must exist before anything is spawned.
    pub fn entry(&self) -> &Path {
        &self.entry
    }

    pub fn probe(&self) -> Option<&RuntimeProbe> {
        self.probe.as_ref()
    }

    pub fn display_command(&self) -> String {
        let mut parts = vec![self.program.to_string_lossy().to_string()];
        parts.extend(self.args.iter().map(|arg| arg.to_string_lossy().to_string()));
        parts.join(" ")
    }
}

fn prepend_search_path(root: &Path, inherited: Option<&OsString>) -> OsString {
    let mut entries = vec![root.to_path_buf()];
    if let Some(existing) = inherited {
        entries.extend(env::split_paths(existing).filter(|p| !p.as_os_str().is_empty()));
    }
    env::join_paths(&entries).unwrap_or_else(|_| root.as_os_str().to_os_string())
}
