use inpaint_supervisor::{LogSource, ServiceState, ServiceSupervisor};
use std::sync::Arc;
use tauri::{AppHandle, Manager, WebviewUrl, WebviewWindowBuilder};
use tracing::warn;

pub const MAIN_WINDOW_LABEL: &str = "main";
const WINDOW_TITLE: &str = "Inpaint Desktop";

pub fn open_main_window(app: &AppHandle, supervisor: &ServiceSupervisor) -> Result<(), String> {
    if let Some(window) = app.get_webview_window(MAIN_WINDOW_LABEL) {
        window
            .show()
            .and_then(|_| window.set_focus())
            .map_err(|err| format!("failed to show main window: {err}"))?;
        return Ok(());
    }

    let raw = supervisor.ui_url();
    let url: tauri::Url = raw
        .parse()
        .map_err(|err| format!("invalid UI url {raw}: {err}"))?;
    supervisor
        .sink()
        .record(LogSource::Shell, format!("loading {raw}"));

    let window = WebviewWindowBuilder::new(app, MAIN_WINDOW_LABEL, WebviewUrl::External(url))
        .title(WINDOW_TITLE)
        .inner_size(1280.0, 800.0)
        .build()
        .map_err(|err| format!("failed to create main window: {err}"))?;

    #[cfg(debug_assertions)]
    if supervisor.mode() == inpaint_supervisor::RunMode::Development {
        window.open_devtools();
    }
    #[cfg(not(debug_assertions))]
    let _ = window;

    Ok(())
}

/// Recreates the window when the dock icon is clicked with none open.
#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
pub fn reopen_main_window(app: &AppHandle) {
    let Some(supervisor) = app.try_state::<Arc<ServiceSupervisor>>() else {
        return;
    };
    if supervisor.state() != ServiceState::Running {
        return;
    }
    if let Err(err) = open_main_window(app, &supervisor) {
        warn!(error = %err, "failed to reopen main window");
    }
}
