#![allow(dead_code)]

use inpaint_supervisor::{
    HostOs, LogSink, ReadinessPolicy, RunMode, ServiceSupervisor, SupervisorConfig, TerminateError,
    TerminateProcess, Terminator,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

pub const LOG_NAME: &str = "service.log";

/// Development-mode config that runs `root/main.sh` through bash.
pub fn dev_config(port: u16, readiness: ReadinessPolicy) -> SupervisorConfig {
    let mut config = SupervisorConfig::defaults_for(HostOs::current());
    config.python_bin = "bash".to_string();
    config.entry_script = "main.sh".to_string();
    config.port = port;
    config.readiness = readiness;
    config
}

pub fn quick_warmup() -> ReadinessPolicy {
    ReadinessPolicy::FixedDelay(Duration::from_millis(20))
}

pub fn write_entry(root: &Path, body: &str) -> PathBuf {
    let path = root.join("main.sh");
    fs::write(&path, body).expect("write entry script");
    path
}

pub fn open_sink(dir: &Path) -> Arc<LogSink> {
    Arc::new(
        LogSink::open(dir.join("logs").join(LOG_NAME))
            .expect("open log sink")
            .with_echo(false),
    )
}

pub fn read_log(dir: &Path) -> String {
    fs::read_to_string(dir.join("logs").join(LOG_NAME)).unwrap_or_default()
}

pub fn supervisor(
    mode: RunMode,
    config: SupervisorConfig,
    root: &Path,
    sink: Arc<LogSink>,
) -> ServiceSupervisor {
    ServiceSupervisor::new(config, mode, HostOs::current(), root.to_path_buf(), sink)
        .expect("build supervisor")
}

/// A port nothing listens on.
pub fn closed_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind probe port");
    listener.local_addr().expect("local addr").port()
}

/// Minimal HTTP server answering every request with `200 {}`.
pub async fn health_stub() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind stub");
    let port = listener.local_addr().expect("stub addr").port();
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            tokio::spawn(async move {
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                let _ = socket
                    .write_all(
                        b"HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: 2\r\nconnection: close\r\n\r\n{}",
                    )
                    .await;
                let _ = socket.shutdown().await;
            });
        }
    });
    port
}

/// Real POSIX termination that also counts how often it was asked.
#[derive(Debug, Default)]
pub struct CountingTerminator {
    calls: AtomicUsize,
}

impl CountingTerminator {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TerminateProcess for CountingTerminator {
    fn terminate(&self, pid: u32) -> Result<(), TerminateError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Terminator::PosixSignal.terminate(pid)
    }
}
