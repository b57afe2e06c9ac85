use inpaint_supervisor::{ServiceStatus, ServiceSupervisor};
use std::sync::Arc;
use tauri::State;

#[tauri::command]
pub fn desktop_service_status(supervisor: State<'_, Arc<ServiceSupervisor>>) -> ServiceStatus {
    supervisor.status()
}
