use inpaint_supervisor::{FatalCondition, LogSource, ServiceSupervisor};
use std::sync::Arc;
use tauri::{AppHandle, Manager};
use tauri_plugin_dialog::{DialogExt, MessageDialogKind};
use tracing::error;

const DIALOG_TITLE: &str = "Inpaint Desktop";

/// Shows the condition in a blocking error dialog, stops the service and
/// exits. Must not be called from the main thread.
pub fn report_fatal_and_exit(app: &AppHandle, condition: &FatalCondition) -> ! {
    error!(tag = %condition.tag(), "{condition}");
    let supervisor = app.try_state::<Arc<ServiceSupervisor>>();
    if let Some(supervisor) = supervisor.as_ref() {
        supervisor.sink().record(
            LogSource::Shell,
            format!("exiting after fatal condition {}", condition.tag()),
        );
    }

    app.dialog()
        .message(condition.to_string())
        .title(DIALOG_TITLE)
        .kind(MessageDialogKind::Error)
        .blocking_show();

    if let Some(supervisor) = supervisor {
        supervisor.shutdown();
    }
    std::process::exit(1)
}
