use inpaint_supervisor::config::LOG_FILE;
use inpaint_supervisor::LogSink;
use std::sync::Arc;
use tauri::{AppHandle, Manager};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "inpaint_desktop=info,inpaint_supervisor=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Opens `<app data>/logs/inpaint-desktop.log`, falling back to stdout only.
pub fn open_log_sink(app: &AppHandle) -> Arc<LogSink> {
    let dir = match app.path().app_data_dir() {
        Ok(dir) => dir,
        Err(err) => {
            warn!(error = %err, "no app data dir, service log goes to stdout only");
            return Arc::new(LogSink::stdout_only());
        }
    };
    let path = dir.join("logs").join(LOG_FILE);
    match LogSink::open(&path) {
        Ok(sink) => {
            info!(path = %path.display(), "service log opened");
            Arc::new(sink)
        }
        Err(err) => {
            warn!(path = %path.display(), error = %err, "failed to open service log");
            Arc::new(LogSink::stdout_only())
        }
    }
}
