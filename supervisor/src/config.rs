use crate::error::ConfigError;
use crate::run_mode::HostOs;
use std::env;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_MODEL: &str = "lama";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const ENTRY_SCRIPT: &str = "main.py";
pub const SERVICE_DIR: &str = "inpaint-service";
pub const SERVICE_BINARY: &str = "inpaint-service";
pub const HEALTH_PATH: &str = "/api/v1/server-config";
pub const DEV_UI_URL: &str = "http://localhost:5173";
pub const LOG_FILE: &str = "inpaint-desktop.log";

const PYTHON_BIN_ENV: &str = "INPAINT_PYTHON_BIN";
const READY_STRATEGY_ENV: &str = "INPAINT_READY_STRATEGY";
const READY_TIMEOUT_ENV: &str = "INPAINT_READY_TIMEOUT_MS";

const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(120);
const DEFAULT_READY_INTERVAL: Duration = Duration::from_millis(500);
const FIXED_WARMUP: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadinessPolicy {
    /// Unconditional warm-up delay after spawn.
    FixedDelay(Duration),
    /// Poll the service health endpoint until it answers or `timeout` expires.
    Probe { interval: Duration, timeout: Duration },
}

#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub model: String,
    pub host: String,
    pub port: u16,
    pub python_bin: String,
    pub entry_script: String,
    pub service_dir: String,
    pub service_binary: String,
    pub health_path: String,
    pub dev_ui_url: String,
    pub readiness: ReadinessPolicy,
}

impl SupervisorConfig {
    pub fn defaults_for(host: HostOs) -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            python_bin: default_python_bin(host).to_string(),
            entry_script: ENTRY_SCRIPT.to_string(),
            service_dir: SERVICE_DIR.to_string(),
            service_binary: SERVICE_BINARY.to_string(),
            health_path: HEALTH_PATH.to_string(),
            dev_ui_url: DEV_UI_URL.to_string(),
            readiness: ReadinessPolicy::Probe {
                interval: DEFAULT_READY_INTERVAL,
                timeout: DEFAULT_READY_TIMEOUT,
            },
        }
    }

    /// Defaults plus the environment overrides. Model and port are fixed.
    pub fn from_env(host: HostOs) -> Result<Self, ConfigError> {
        let mut config = Self::defaults_for(host);
        if let Some(bin) = env_non_empty(PYTHON_BIN_ENV) {
            config.python_bin = bin;
        }
        let timeout_ms: u64 = env_parse(READY_TIMEOUT_ENV, DEFAULT_READY_TIMEOUT.as_millis() as u64)?;
        let strategy = env_non_empty(READY_STRATEGY_ENV).unwrap_or_else(|| "probe".to_string());
        config.readiness = readiness_from_raw(&strategy, Duration::from_millis(timeout_ms))?;
        Ok(config)
    }

    pub fn service_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    pub fn health_url(&self) -> String {
        format!("{}{}", self.service_url(), self.health_path)
    }
}

fn default_python_bin(host: HostOs) -> &'static str {
    if host.is_windows() {
        "python"
    } else {
        "python3"
    }
}

fn readiness_from_raw(raw: &str, timeout: Duration) -> Result<ReadinessPolicy, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "probe" | "poll" => Ok(ReadinessPolicy::Probe {
            interval: DEFAULT_READY_INTERVAL,
            timeout,
        }),
        "fixed" | "delay" => Ok(ReadinessPolicy::FixedDelay(FIXED_WARMUP)),
        other => Err(ConfigError::Invalid {
            key: READY_STRATEGY_ENV,
            value: other.to_string(),
            expected: "'probe' or 'fixed'",
        }),
    }
}

fn env_non_empty(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|raw| raw.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_parse<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env_non_empty(key) {
        Some(raw) => raw.parse::<T>().map_err(|_| ConfigError::Invalid {
            key,
            value: raw,
            expected: "an integer number of milliseconds",
        }),
        None => Ok(default),
    }
}
