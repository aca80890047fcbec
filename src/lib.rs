mod application;
mod domain;
mod infrastructure;

use application::bootstrap::bootstrap_workspace;
use application::commands::{
    add_task_impl, cancel_drag_impl, delete_event_impl, init_calendar_impl, list_events_impl,
    move_event_impl, parse_time_impl, start_drag_impl, AddTaskResponse, AppState, DragResponse,
    InitCalendarResponse, ListEventsResponse,
};
use domain::models::{CalendarEvent, ParsedTime};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Serialize)]
struct BootstrapResponse {
    workspace_root: String,
    credentials_path: String,
    token_path: String,
}

#[tauri::command]
fn bootstrap(root: Option<String>) -> Result<BootstrapResponse, String> {
    let workspace_root = match root {
        Some(path) => PathBuf::from(path),
        None => std::env::current_dir().map_err(|error| error.to_string())?,
    };

    let result = bootstrap_workspace(&workspace_root).map_err(|error| error.to_string())?;
    Ok(BootstrapResponse {
        workspace_root: result.workspace_root.display().to_string(),
        credentials_path: result.credentials_path.display().to_string(),
        token_path: result.token_path.display().to_string(),
    })
}

#[tauri::command]
fn ping() -> &'static str {
    "pong"
}

#[tauri::command]
async fn init_calendar(
    state: tauri::State<'_, AppState>,
    authorization_code: Option<String>,
) -> Result<InitCalendarResponse, String> {
    init_calendar_impl(state.inner(), authorization_code)
        .await
        .map_err(|error| state.command_error("init_calendar", &error))
}

#[tauri::command]
async fn list_events(
    state: tauri::State<'_, AppState>,
    week_offset: Option<i32>,
) -> Result<ListEventsResponse, String> {
    list_events_impl(state.inner(), week_offset.unwrap_or(0))
        .await
        .map_err(|error| state.command_error("list_events", &error))
}

#[tauri::command]
async fn delete_event(state: tauri::State<'_, AppState>, event_id: String) -> Result<bool, String> {
    delete_event_impl(state.inner(), event_id)
        .await
        .map_err(|error| state.command_error("delete_event", &error))
}

#[tauri::command]
async fn move_event(
    state: tauri::State<'_, AppState>,
    event_id: String,
    new_start: String,
    duration_minutes: Option<i64>,
) -> Result<CalendarEvent, String> {
    move_event_impl(state.inner(), event_id, new_start, duration_minutes)
        .await
        .map_err(|error| state.command_error("move_event", &error))
}

#[tauri::command]
fn start_drag(state: tauri::State<'_, AppState>, event_id: String) -> Result<DragResponse, String> {
    start_drag_impl(state.inner(), event_id)
        .map_err(|error| state.command_error("start_drag", &error))
}

#[tauri::command]
fn cancel_drag(state: tauri::State<'_, AppState>) -> Result<bool, String> {
    cancel_drag_impl(state.inner()).map_err(|error| state.command_error("cancel_drag", &error))
}

#[tauri::command]
fn parse_time(state: tauri::State<'_, AppState>, input: String) -> Result<ParsedTime, String> {
    parse_time_impl(state.inner(), input).map_err(|error| state.command_error("parse_time", &error))
}

#[tauri::command]
async fn add_task(
    state: tauri::State<'_, AppState>,
    title: String,
    start: Option<String>,
    duration_minutes: Option<i64>,
) -> Result<AddTaskResponse, String> {
    add_task_impl(state.inner(), title, start, duration_minutes)
        .await
        .map_err(|error| state.command_error("add_task", &error))
}

pub fn run() {
    let workspace_root = std::env::current_dir().expect("failed to resolve current directory");
    let app_state = AppState::new(workspace_root).expect("failed to initialize app state");

    tauri::Builder::default()
        .manage(app_state)
        .invoke_handler(tauri::generate_handler![
            ping,
            bootstrap,
            init_calendar,
            list_events,
            delete_event,
            move_event,
            start_drag,
            cancel_drag,
            parse_time,
            add_task
        ])
        .run(tauri::generate_context!())
        .expect("failed to run tauri app");
}
