#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

mod commands;
mod fatal;
mod logging;
mod startup;
mod window;

use inpaint_supervisor::{LogSource, ServiceSupervisor};
use std::sync::Arc;
use tauri::{AppHandle, Manager, RunEvent};
use tracing::info;

fn main() {
    logging::init_tracing();

    tauri::Builder::default()
        .plugin(tauri_plugin_dialog::init())
        .invoke_handler(tauri::generate_handler![commands::desktop_service_status])
        .setup(|app| {
            let handle = app.handle().clone();
            let sink = logging::open_log_sink(&handle);
            sink.record(LogSource::Shell, "desktop shell starting");

            let supervisor = ServiceSupervisor::from_environment(sink)?;
            info!(
                mode = %supervisor.mode(),
                root = %supervisor.root().display(),
                "service supervisor configured"
            );
            app.manage(Arc::new(supervisor));

            startup::spawn_startup_task(handle);
            Ok(())
        })
        .build(tauri::generate_context!())
        .expect("failed to build Inpaint desktop shell")
        .run(|app_handle, event| match event {
            #[cfg(target_os = "macos")]
            RunEvent::ExitRequested { code: None, api, .. } => {
                // Closing the last window keeps the app alive in the dock.
                api.prevent_exit();
            }
            #[cfg(target_os = "macos")]
            RunEvent::Reopen {
                has_visible_windows: false,
                ..
            } => window::reopen_main_window(app_handle),
            RunEvent::Exit => stop_service(app_handle),
            _ => {}
        });
}

fn stop_service(app_handle: &AppHandle) {
    let Some(supervisor) = app_handle.try_state::<Arc<ServiceSupervisor>>() else {
        return;
    };
    supervisor.sink().record(LogSource::Shell, "desktop shell exiting");
    supervisor.shutdown();
}
