use crate::{fatal, window};
use inpaint_supervisor::{FatalCondition, ServiceSupervisor};
use std::sync::Arc;
use tauri::{AppHandle, Manager};
use tracing::info;

/// Launches the service, shows the window once it is ready, then waits for a
/// crash. Every failure ends the application.
pub fn spawn_startup_task(app: AppHandle) {
    tauri::async_runtime::spawn(async move {
        let supervisor = app.state::<Arc<ServiceSupervisor>>().inner().clone();

        let started = match supervisor.start().await {
            Ok(started) => started,
            Err(condition) => fatal::report_fatal_and_exit(&app, &condition),
        };
        info!(pid = started.pid, "service ready, opening main window");

        if let Err(condition) = supervisor.check_ui().await {
            fatal::report_fatal_and_exit(&app, &condition);
        }

        if let Err(reason) = window::open_main_window(&app, &supervisor) {
            let condition = FatalCondition::LoadFailed { reason };
            supervisor.record_fatal(&condition);
            fatal::report_fatal_and_exit(&app, &condition);
        }

        if let Ok(condition) = started.fatal_rx.await {
            supervisor.record_fatal(&condition);
            fatal::report_fatal_and_exit(&app, &condition);
        }
    });
}
