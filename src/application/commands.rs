use crate::application::bootstrap::bootstrap_workspace;
use crate::application::oauth::{TokenKeeper, TokenState};
use crate::application::submission::{submit_task, SubmissionOutcome, SubmissionPhase};
use crate::domain::models::{CalendarEvent, DragState, ParsedTime, TaskDraft, WeekWindow};
use crate::domain::timeparse::parse_expression;
use crate::domain::week_view::{layout, RenderPlan};
use crate::infrastructure::config::{read_default_event_duration, read_timezone};
use crate::infrastructure::credential_store::FileCredentialStore;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::event_mapper::{decode_event, encode_event_times};
use crate::infrastructure::google_calendar_client::{CalendarGateway, ReqwestCalendarGateway};
use crate::infrastructure::oauth_client::{OAuthConfig, ReqwestTokenEndpoint};
use crate::infrastructure::task_mirror::{TaskMirror, ThingsTaskMirror};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn next_id(prefix: &str) -> String {
    let sequence = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}-{}-{sequence}", Utc::now().timestamp_micros())
}

pub struct AppState {
    config_dir: PathBuf,
    credentials_path: PathBuf,
    token_path: PathBuf,
    logs_dir: PathBuf,
    timezone: Tz,
    gateway: Arc<dyn CalendarGateway>,
    mirror: Arc<dyn TaskMirror>,
    session: Mutex<SessionState>,
    // Serializes the read-check-refresh-write token cycle across commands.
    token_guard: tokio::sync::Mutex<()>,
    log_guard: Mutex<()>,
}

impl AppState {
    pub fn new(workspace_root: PathBuf) -> Result<Self, InfraError> {
        Self::with_collaborators(
            workspace_root,
            Arc::new(ReqwestCalendarGateway::new()),
            Arc::new(ThingsTaskMirror::new()),
        )
    }

    pub fn with_collaborators(
        workspace_root: PathBuf,
        gateway: Arc<dyn CalendarGateway>,
        mirror: Arc<dyn TaskMirror>,
    ) -> Result<Self, InfraError> {
        let bootstrap = bootstrap_workspace(&workspace_root)?;
        let config_dir = workspace_root.join("config");
        let logs_dir = workspace_root.join("logs");
        let timezone = read_timezone(&config_dir)?;

        Ok(Self {
            config_dir,
            credentials_path: bootstrap.credentials_path,
            token_path: bootstrap.token_path,
            logs_dir,
            timezone,
            gateway,
            mirror,
            session: Mutex::new(SessionState::default()),
            token_guard: tokio::sync::Mutex::new(()),
            log_guard: Mutex::new(()),
        })
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub fn command_error(&self, command: &str, error: &InfraError) -> String {
        self.log_error(command, &error.to_string());
        error.to_string()
    }

    pub fn log_info(&self, command: &str, message: &str) {
        self.append_log("info", command, message);
    }

    pub fn log_error(&self, command: &str, message: &str) {
        self.append_log("error", command, message);
    }

    fn append_log(&self, level: &str, command: &str, message: &str) {
        let Ok(_guard) = self.log_guard.lock() else {
            return;
        };
        let path = self.logs_dir.join("commands.log");
        let payload = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "level": level,
            "command": command,
            "message": message,
        });

        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
            let _ = writeln!(file, "{}", payload);
        }
    }
}

#[derive(Debug, Default)]
struct SessionState {
    connected: bool,
    week_offset: i32,
    events: Vec<CalendarEvent>,
    draft: Option<TaskDraft>,
    drag: Option<DragState>,
    submission: SubmissionPhase,
}

#[derive(Debug, Clone, Serialize)]
pub struct InitCalendarResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorization_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListEventsResponse {
    pub week_offset: i32,
    pub week_label: String,
    pub week_start: String,
    pub week_end: String,
    pub events: Vec<CalendarEvent>,
    pub plan: RenderPlan,
}

#[derive(Debug, Clone, Serialize)]
pub struct AddTaskResponse {
    pub status: String,
    pub calendar_ok: bool,
    pub task_ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calendar_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_error: Option<String>,
    pub draft_cleared: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DragResponse {
    pub event_id: String,
    pub duration_minutes: i64,
}

pub async fn init_calendar_impl(
    state: &AppState,
    authorization_code: Option<String>,
) -> Result<InitCalendarResponse, InfraError> {
    let Some(oauth_config) = OAuthConfig::from_client_secret_file(&state.credentials_path)? else {
        set_connected(state, false)?;
        state.log_info(
            "init_calendar",
            "credentials file missing; running in offline mode",
        );
        return Ok(InitCalendarResponse {
            status: "offline".to_string(),
            authorization_url: None,
            expires_at: None,
        });
    };

    let keeper = token_keeper(state, oauth_config);

    if let Some(raw_code) = authorization_code {
        let code = raw_code.trim();
        if code.is_empty() {
            return Err(InfraError::InvalidInput(
                "authorization_code must not be empty".to_string(),
            ));
        }
        let _guard = state.token_guard.lock().await;
        let token = keeper.redeem_authorization_code(code).await?;
        set_connected(state, true)?;
        state.log_info(
            "init_calendar",
            "exchanged authorization code and stored oauth token",
        );
        return Ok(InitCalendarResponse {
            status: "connected".to_string(),
            authorization_url: None,
            expires_at: Some(token.expires_at.to_rfc3339()),
        });
    }

    let result = {
        let _guard = state.token_guard.lock().await;
        keeper.current_token().await?
    };
    match result {
        TokenState::Ready(token) => {
            set_connected(state, true)?;
            Ok(InitCalendarResponse {
                status: "connected".to_string(),
                authorization_url: None,
                expires_at: Some(token.expires_at.to_rfc3339()),
            })
        }
        TokenState::NeedsAuthorization => {
            set_connected(state, false)?;
            let auth_state = next_id("oauth-state");
            let authorization_url = keeper.config().authorization_url(&auth_state)?;
            Ok(InitCalendarResponse {
                status: "authorization_required".to_string(),
                authorization_url: Some(authorization_url),
                expires_at: None,
            })
        }
    }
}

pub async fn list_events_impl(
    state: &AppState,
    week_offset: i32,
) -> Result<ListEventsResponse, InfraError> {
    let access_token = required_access_token(state).await?;
    let tz = state.timezone();
    let now = Utc::now().with_timezone(&tz);
    let week = WeekWindow::for_offset(now.date_naive(), week_offset);
    let (week_start, week_end) = week.bounds(tz).ok_or_else(|| {
        InfraError::InvalidConfig(format!("week bounds do not exist in timezone {}", tz.name()))
    })?;

    let remote = state
        .gateway
        .list_events(&access_token, week_start, week_end)
        .await?;

    let mut events = remote
        .iter()
        .filter_map(|wire| decode_event(wire, tz))
        .filter(|event| event.validate().is_ok())
        .collect::<Vec<_>>();
    events.sort_by(|left, right| left.start.cmp(&right.start).then(left.id.cmp(&right.id)));

    let plan = layout(&events, &week, now);

    {
        let mut session = lock_session(state)?;
        session.week_offset = week_offset;
        session.events = events.clone();
    }

    state.log_info(
        "list_events",
        &format!("listed {} events for week offset {week_offset}", events.len()),
    );

    Ok(ListEventsResponse {
        week_offset,
        week_label: week.label(),
        week_start: week_start.to_rfc3339(),
        week_end: week_end.to_rfc3339(),
        events,
        plan,
    })
}

pub async fn delete_event_impl(state: &AppState, event_id: String) -> Result<bool, InfraError> {
    let event_id = event_id.trim();
    if event_id.is_empty() {
        return Err(InfraError::InvalidInput(
            "event_id must not be empty".to_string(),
        ));
    }

    let access_token = required_access_token(state).await?;
    state.gateway.delete_event(&access_token, event_id).await?;

    {
        let mut session = lock_session(state)?;
        session.events.retain(|event| event.id != event_id);
        if session
            .drag
            .as_ref()
            .is_some_and(|drag| drag.event_id == event_id)
        {
            session.drag = None;
        }
    }

    state.log_info("delete_event", &format!("deleted event_id={event_id}"));
    Ok(true)
}

pub async fn move_event_impl(
    state: &AppState,
    event_id: String,
    new_start: String,
    duration_minutes: Option<i64>,
) -> Result<CalendarEvent, InfraError> {
    let event_id = event_id.trim();
    if event_id.is_empty() {
        return Err(InfraError::InvalidInput(
            "event_id must not be empty".to_string(),
        ));
    }

    let tz = state.timezone();
    let start_local = parse_start_input(&new_start, tz)?;

    // Duration comes from the caller or local state, so validation happens
    // before any token or network work.
    let duration_minutes = match duration_minutes {
        Some(value) if value > 0 => value,
        Some(_) => {
            return Err(InfraError::InvalidInput(
                "duration_minutes must be positive".to_string(),
            ));
        }
        None => {
            let session = lock_session(state)?;
            session
                .events
                .iter()
                .find(|event| event.id == event_id)
                .map(CalendarEvent::duration_minutes)
                .or_else(|| {
                    session
                        .drag
                        .as_ref()
                        .filter(|drag| drag.event_id == event_id)
                        .map(|drag| drag.duration_minutes)
                })
                .ok_or_else(|| {
                    InfraError::InvalidInput(format!("event not found: {event_id}"))
                })?
        }
    };

    let access_token = required_access_token(state).await?;
    let (start_wire, end_wire) = encode_event_times(start_local, duration_minutes);
    state
        .gateway
        .update_event_times(&access_token, event_id, &start_wire, &end_wire)
        .await?;

    let start_utc = start_local.with_timezone(&Utc);
    let moved = {
        let mut session = lock_session(state)?;
        if session
            .drag
            .as_ref()
            .is_some_and(|drag| drag.event_id == event_id)
        {
            session.drag = None;
        }
        match session.events.iter_mut().find(|event| event.id == event_id) {
            Some(event) => {
                event.start = start_utc;
                event.end = start_utc + chrono::Duration::minutes(duration_minutes);
                event.clone()
            }
            None => CalendarEvent {
                id: event_id.to_string(),
                title: "(No title)".to_string(),
                start: start_utc,
                end: start_utc + chrono::Duration::minutes(duration_minutes),
                is_all_day: false,
            },
        }
    };

    state.log_info(
        "move_event",
        &format!("moved event_id={event_id} to {}", start_utc.to_rfc3339()),
    );
    Ok(moved)
}

pub fn parse_time_impl(state: &AppState, input: String) -> Result<ParsedTime, InfraError> {
    let tz = state.timezone();
    let now = Utc::now().with_timezone(&tz);
    let parsed =
        parse_expression(&input, now).map_err(|failure| InfraError::Parse(failure.input))?;

    {
        let mut session = lock_session(state)?;
        let draft = session.draft.get_or_insert_with(TaskDraft::default);
        draft.scheduled = Some(parsed.clone());
        if parsed.duration_minutes.is_some() {
            draft.duration_minutes = parsed.duration_minutes;
        }
    }

    state.log_info("parse_time", &format!("resolved '{}' to {}", input.trim(), parsed.display));
    Ok(parsed)
}

pub async fn add_task_impl(
    state: &AppState,
    title: String,
    start: Option<String>,
    duration_minutes: Option<i64>,
) -> Result<AddTaskResponse, InfraError> {
    let title = title.trim().to_string();
    if title.is_empty() {
        return Err(InfraError::InvalidInput(
            "title must not be empty".to_string(),
        ));
    }

    let tz = state.timezone();
    let draft_snapshot = {
        let session = lock_session(state)?;
        session.draft.clone()
    };

    let start_local = match start {
        Some(raw) => parse_start_input(&raw, tz)?,
        None => draft_snapshot
            .as_ref()
            .and_then(|draft| draft.scheduled.as_ref())
            .map(|scheduled| scheduled.start.with_timezone(&tz))
            .ok_or_else(|| {
                InfraError::InvalidInput(
                    "no scheduled time; call parse_time first or pass start".to_string(),
                )
            })?,
    };

    let duration = match duration_minutes {
        Some(value) if value > 0 => value,
        Some(_) => {
            return Err(InfraError::InvalidInput(
                "duration_minutes must be positive".to_string(),
            ));
        }
        None => draft_snapshot
            .as_ref()
            .and_then(|draft| draft.duration_minutes)
            .map_or_else(|| read_default_event_duration(state.config_dir()), Ok)?,
    };

    {
        let mut session = lock_session(state)?;
        session.submission = SubmissionPhase::Submitting;
    }

    let access_token = try_access_token(state).await?;
    let note = format!("Scheduled: {}", start_local.format("%-I:%M %p on %A, %B %-d"));
    let outcome = submit_task(
        &*state.gateway,
        &*state.mirror,
        access_token.as_deref(),
        &title,
        start_local,
        duration,
        &note,
    )
    .await;

    let draft_cleared = settle_submission(state, &outcome)?;
    log_submission(state, &title, &outcome);

    Ok(AddTaskResponse {
        status: outcome.status().to_string(),
        calendar_ok: outcome.calendar_ok,
        task_ok: outcome.task_ok,
        calendar_error: outcome.calendar_error,
        task_error: outcome.task_error,
        draft_cleared,
    })
}

pub fn start_drag_impl(state: &AppState, event_id: String) -> Result<DragResponse, InfraError> {
    let event_id = event_id.trim();
    if event_id.is_empty() {
        return Err(InfraError::InvalidInput(
            "event_id must not be empty".to_string(),
        ));
    }

    let mut session = lock_session(state)?;
    let duration_minutes = session
        .events
        .iter()
        .find(|event| event.id == event_id)
        .map(CalendarEvent::duration_minutes)
        .ok_or_else(|| InfraError::InvalidInput(format!("event not found: {event_id}")))?;

    session.drag = Some(DragState {
        event_id: event_id.to_string(),
        duration_minutes,
    });

    Ok(DragResponse {
        event_id: event_id.to_string(),
        duration_minutes,
    })
}

pub fn cancel_drag_impl(state: &AppState) -> Result<bool, InfraError> {
    let mut session = lock_session(state)?;
    Ok(session.drag.take().is_some())
}

fn settle_submission(
    state: &AppState,
    outcome: &SubmissionOutcome,
) -> Result<bool, InfraError> {
    let mut session = lock_session(state)?;
    session.submission = SubmissionPhase::Settled(outcome.clone());
    if outcome.both_ok() {
        session.draft = None;
        session.drag = None;
        return Ok(true);
    }
    Ok(false)
}

fn log_submission(state: &AppState, title: &str, outcome: &SubmissionOutcome) {
    let message = format!(
        "submitted '{title}': calendar_ok={} task_ok={}",
        outcome.calendar_ok, outcome.task_ok
    );
    if outcome.both_ok() {
        state.log_info("add_task", &message);
    } else {
        state.log_error("add_task", &message);
    }
}

fn set_connected(state: &AppState, connected: bool) -> Result<(), InfraError> {
    let mut session = lock_session(state)?;
    session.connected = connected;
    Ok(())
}

fn lock_session(state: &AppState) -> Result<MutexGuard<'_, SessionState>, InfraError> {
    state
        .session
        .lock()
        .map_err(|error| InfraError::InvalidConfig(format!("session lock poisoned: {error}")))
}

fn token_keeper(
    state: &AppState,
    config: OAuthConfig,
) -> TokenKeeper<FileCredentialStore, ReqwestTokenEndpoint> {
    let store = Arc::new(FileCredentialStore::new(state.token_path.clone()));
    let endpoint = Arc::new(ReqwestTokenEndpoint::new());
    TokenKeeper::new(config, store, endpoint)
}

async fn required_access_token(state: &AppState) -> Result<String, InfraError> {
    let Some(oauth_config) = OAuthConfig::from_client_secret_file(&state.credentials_path)? else {
        return Err(InfraError::Auth(
            "credentials file missing; place a Google client secret at config/credentials.json"
                .to_string(),
        ));
    };
    let keeper = token_keeper(state, oauth_config);
    let result = {
        let _guard = state.token_guard.lock().await;
        keeper.current_token().await?
    };
    match result {
        TokenState::Ready(token) => Ok(token.access_token),
        TokenState::NeedsAuthorization => Err(InfraError::Auth(
            "authentication required; call init_calendar with authorization_code".to_string(),
        )),
    }
}

async fn try_access_token(state: &AppState) -> Result<Option<String>, InfraError> {
    let Some(oauth_config) = OAuthConfig::from_client_secret_file(&state.credentials_path)? else {
        return Ok(None);
    };
    let keeper = token_keeper(state, oauth_config);
    let result = {
        let _guard = state.token_guard.lock().await;
        keeper.current_token().await?
    };
    match result {
        TokenState::Ready(token) => Ok(Some(token.access_token)),
        TokenState::NeedsAuthorization => Ok(None),
    }
}

/// Accepts RFC3339 or a naive local timestamp from the drag-and-drop grid.
fn parse_start_input(value: &str, tz: Tz) -> Result<DateTime<Tz>, InfraError> {
    let value = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.with_timezone(&tz));
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return tz.from_local_datetime(&naive).earliest().ok_or_else(|| {
                InfraError::InvalidInput(format!("'{value}' does not exist in timezone {}", tz.name()))
            });
        }
    }
    Err(InfraError::InvalidInput(format!(
        "new_start must be RFC3339 or YYYY-MM-DDTHH:MM[:SS], got '{value}'"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::OAuthToken;
    use crate::infrastructure::credential_store::CredentialStore;
    use crate::infrastructure::event_mapper::{EventDateTime, RemoteEvent};
    use crate::infrastructure::task_mirror::RecordingTaskMirror;
    use async_trait::async_trait;
    use chrono_tz::America::Los_Angeles;
    use std::fs;
    use std::sync::atomic::{AtomicBool, AtomicUsize};

    static NEXT_TEMP_WORKSPACE: AtomicUsize = AtomicUsize::new(0);

    struct TempWorkspace {
        path: PathBuf,
    }

    impl TempWorkspace {
        fn new() -> Self {
            let sequence = NEXT_TEMP_WORKSPACE.fetch_add(1, Ordering::Relaxed);
            let path = std::env::temp_dir().join(format!(
                "agenda-command-tests-{}-{}",
                std::process::id(),
                sequence
            ));
            fs::create_dir_all(&path).expect("create temp workspace");
            Self { path }
        }

        fn app_state(&self) -> AppState {
            AppState::new(self.path.clone()).expect("initialize app state")
        }

        fn app_state_with(
            &self,
            gateway: Arc<dyn CalendarGateway>,
            mirror: Arc<dyn TaskMirror>,
        ) -> AppState {
            AppState::with_collaborators(self.path.clone(), gateway, mirror)
                .expect("initialize app state")
        }

        /// Seeds a client secret and a fresh stored token so commands run
        /// authenticated without touching the network.
        fn seed_authenticated(&self) {
            fs::write(
                self.path.join("config").join("credentials.json"),
                r#"{"installed":{"client_id":"test-id","client_secret":"test-secret"}}"#,
            )
            .expect("write client secret");
            let store = FileCredentialStore::new(self.path.join("state").join("token.json"));
            store
                .save_token(&OAuthToken {
                    access_token: "seeded-access".to_string(),
                    refresh_token: None,
                    expires_at: Utc::now() + chrono::Duration::hours(1),
                    token_type: "Bearer".to_string(),
                    scope: None,
                })
                .expect("write token");
        }
    }

    #[derive(Debug, Default)]
    struct StubCalendarGateway {
        fail_create: AtomicBool,
    }

    impl StubCalendarGateway {
        fn failing() -> Self {
            let stub = Self::default();
            stub.fail_create.store(true, Ordering::SeqCst);
            stub
        }
    }

    #[async_trait]
    impl CalendarGateway for StubCalendarGateway {
        async fn list_events(
            &self,
            _access_token: &str,
            _time_min: DateTime<Utc>,
            _time_max: DateTime<Utc>,
        ) -> Result<Vec<RemoteEvent>, InfraError> {
            Ok(Vec::new())
        }

        async fn create_event(
            &self,
            _access_token: &str,
            _event: &RemoteEvent,
        ) -> Result<String, InfraError> {
            if self.fail_create.load(Ordering::SeqCst) {
                return Err(InfraError::Calendar("simulated create failure".to_string()));
            }
            Ok("created-id".to_string())
        }

        async fn update_event_times(
            &self,
            _access_token: &str,
            _event_id: &str,
            _start: &EventDateTime,
            _end: &EventDateTime,
        ) -> Result<(), InfraError> {
            Ok(())
        }

        async fn delete_event(
            &self,
            _access_token: &str,
            _event_id: &str,
        ) -> Result<(), InfraError> {
            Ok(())
        }
    }

    impl Drop for TempWorkspace {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.path);
        }
    }

    fn seed_event(state: &AppState, id: &str, start: &str, minutes: i64) {
        let start = DateTime::parse_from_rfc3339(start)
            .expect("valid start")
            .with_timezone(&Utc);
        let mut session = lock_session(state).expect("session lock");
        session.events.push(CalendarEvent {
            id: id.to_string(),
            title: "Seeded".to_string(),
            start,
            end: start + chrono::Duration::minutes(minutes),
            is_all_day: false,
        });
    }

    #[test]
    fn app_state_uses_default_timezone() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        assert_eq!(state.timezone(), Los_Angeles);
    }

    #[test]
    fn parse_time_records_range_duration_on_draft() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();

        let parsed = parse_time_impl(&state, "9am - 11".to_string()).expect("parse");
        assert_eq!(parsed.duration_minutes, Some(120));

        let session = lock_session(&state).expect("session lock");
        let draft = session.draft.as_ref().expect("draft exists");
        assert_eq!(draft.duration_minutes, Some(120));
        assert_eq!(draft.scheduled.as_ref().map(|s| s.start), Some(parsed.start));
    }

    #[test]
    fn parse_time_keeps_earlier_duration_for_point_expressions() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();

        parse_time_impl(&state, "9am - 11".to_string()).expect("range parse");
        parse_time_impl(&state, "tomorrow 3pm".to_string()).expect("point parse");

        let session = lock_session(&state).expect("session lock");
        let draft = session.draft.as_ref().expect("draft exists");
        // a point expression replaces the schedule but not the range duration
        assert_eq!(draft.duration_minutes, Some(120));
    }

    #[test]
    fn parse_time_failure_preserves_input() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        match parse_time_impl(&state, "not a time".to_string()) {
            Err(InfraError::Parse(input)) => assert_eq!(input, "not a time"),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn add_task_rejects_empty_title() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let result = add_task_impl(&state, "  ".to_string(), None, None).await;
        assert!(matches!(result, Err(InfraError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn add_task_requires_a_schedule() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let result = add_task_impl(&state, "Untimed".to_string(), None, None).await;
        assert!(matches!(result, Err(InfraError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn add_task_rejects_non_positive_duration() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let result = add_task_impl(
            &state,
            "Task".to_string(),
            Some("2026-03-02T09:00:00-08:00".to_string()),
            Some(0),
        )
        .await;
        assert!(matches!(result, Err(InfraError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn list_events_without_credentials_is_an_auth_error() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let result = list_events_impl(&state, 0).await;
        assert!(matches!(result, Err(InfraError::Auth(_))));
    }

    #[tokio::test]
    async fn init_calendar_without_credentials_reports_offline() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let response = init_calendar_impl(&state, None).await.expect("init");
        assert_eq!(response.status, "offline");
        assert!(response.authorization_url.is_none());
    }

    #[tokio::test]
    async fn move_event_rejects_bad_timestamp() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        seed_event(&state, "evt-1", "2026-03-02T17:00:00Z", 30);
        let result =
            move_event_impl(&state, "evt-1".to_string(), "next tuesday".to_string(), None).await;
        assert!(matches!(result, Err(InfraError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn move_event_rejects_unknown_event_before_token_lookup() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let result = move_event_impl(
            &state,
            "missing".to_string(),
            "2026-03-02T09:00:00-08:00".to_string(),
            None,
        )
        .await;
        // no credentials exist, so an Auth error here would mean the token
        // was fetched before validation
        assert!(matches!(result, Err(InfraError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn delete_event_rejects_empty_id() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let result = delete_event_impl(&state, "   ".to_string()).await;
        assert!(matches!(result, Err(InfraError::InvalidInput(_))));
    }

    #[test]
    fn start_drag_uses_cached_event_duration() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        seed_event(&state, "evt-1", "2026-03-02T17:00:00Z", 45);

        let drag = start_drag_impl(&state, "evt-1".to_string()).expect("start drag");
        assert_eq!(drag.duration_minutes, 45);

        assert!(cancel_drag_impl(&state).expect("cancel drag"));
        assert!(!cancel_drag_impl(&state).expect("second cancel"));
    }

    #[test]
    fn start_drag_rejects_unknown_event() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let result = start_drag_impl(&state, "missing".to_string());
        assert!(matches!(result, Err(InfraError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn add_task_clears_draft_when_both_destinations_succeed() {
        let workspace = TempWorkspace::new();
        let mirror = Arc::new(RecordingTaskMirror::default());
        let state = workspace.app_state_with(
            Arc::new(StubCalendarGateway::default()),
            Arc::clone(&mirror) as Arc<dyn TaskMirror>,
        );
        workspace.seed_authenticated();

        parse_time_impl(&state, "9am - 11".to_string()).expect("parse");
        let response = add_task_impl(&state, "Write report".to_string(), None, None)
            .await
            .expect("add task");

        assert_eq!(response.status, "both_ok");
        assert!(response.draft_cleared);
        assert_eq!(mirror.call_count(), 1);

        let session = lock_session(&state).expect("session lock");
        assert!(session.draft.is_none());
        assert!(matches!(session.submission, SubmissionPhase::Settled(_)));
    }

    #[tokio::test]
    async fn add_task_keeps_draft_when_calendar_side_fails() {
        let workspace = TempWorkspace::new();
        let mirror = Arc::new(RecordingTaskMirror::default());
        let state = workspace.app_state_with(
            Arc::new(StubCalendarGateway::failing()),
            Arc::clone(&mirror) as Arc<dyn TaskMirror>,
        );
        workspace.seed_authenticated();

        parse_time_impl(&state, "9am - 11".to_string()).expect("parse");
        let response = add_task_impl(&state, "Write report".to_string(), None, None)
            .await
            .expect("add task");

        assert_eq!(response.status, "partial");
        assert!(!response.calendar_ok);
        assert!(response.task_ok);
        assert!(!response.draft_cleared);
        // the mirror side still ran
        assert_eq!(mirror.call_count(), 1);

        // the draft survives for retry
        let session = lock_session(&state).expect("session lock");
        let draft = session.draft.as_ref().expect("draft retained");
        assert_eq!(draft.duration_minutes, Some(120));
        assert!(draft.scheduled.is_some());
    }

    #[test]
    fn parse_start_input_accepts_naive_local_timestamps() {
        let parsed = parse_start_input("2026-03-02T09:00", Los_Angeles).expect("naive parse");
        assert_eq!(parsed.to_rfc3339(), "2026-03-02T09:00:00-08:00");

        let parsed = parse_start_input("2026-03-02T09:00:00-08:00", Los_Angeles).expect("rfc3339");
        assert_eq!(parsed.to_rfc3339(), "2026-03-02T09:00:00-08:00");
    }
}
