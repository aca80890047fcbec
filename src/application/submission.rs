use crate::infrastructure::error::InfraError;
use crate::infrastructure::event_mapper::encode_new_event;
use crate::infrastructure::google_calendar_client::CalendarGateway;
use crate::infrastructure::task_mirror::TaskMirror;
use chrono::DateTime;
use chrono_tz::Tz;

/// Result of one dual-destination submission. Both sides are always
/// attempted; a failure on one never short-circuits the other.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SubmissionOutcome {
    pub calendar_ok: bool,
    pub task_ok: bool,
    pub calendar_error: Option<String>,
    pub task_error: Option<String>,
}

impl SubmissionOutcome {
    pub fn both_ok(&self) -> bool {
        self.calendar_ok && self.task_ok
    }

    pub fn status(&self) -> &'static str {
        match (self.calendar_ok, self.task_ok) {
            (true, true) => "both_ok",
            (false, false) => "both_failed",
            _ => "partial",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SubmissionPhase {
    #[default]
    Idle,
    Submitting,
    Settled(SubmissionOutcome),
}

/// Push one task to both destinations: the primary Google calendar and the
/// local task mirror. Without an access token the calendar side fails
/// immediately, offline, and the mirror is still attempted.
pub async fn submit_task<G, M>(
    gateway: &G,
    mirror: &M,
    access_token: Option<&str>,
    title: &str,
    start: DateTime<Tz>,
    duration_minutes: i64,
    note: &str,
) -> SubmissionOutcome
where
    G: CalendarGateway + ?Sized,
    M: TaskMirror + ?Sized,
{
    let calendar_result = match access_token {
        Some(token) => {
            let event = encode_new_event(title, start, duration_minutes);
            gateway.create_event(token, &event).await.map(|_| ())
        }
        None => Err(InfraError::Auth(
            "no access token; calendar is offline".to_string(),
        )),
    };

    let task_result = mirror.create_task(title, note);

    SubmissionOutcome {
        calendar_ok: calendar_result.is_ok(),
        task_ok: task_result.is_ok(),
        calendar_error: calendar_result.err().map(|error| error.to_string()),
        task_error: task_result.err().map(|error| error.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::event_mapper::{EventDateTime, RemoteEvent};
    use crate::infrastructure::task_mirror::RecordingTaskMirror;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use chrono_tz::America::Los_Angeles;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    struct FakeCalendarGateway {
        created: Mutex<Vec<RemoteEvent>>,
        create_calls: AtomicUsize,
        fail_create: AtomicBool,
    }

    impl FakeCalendarGateway {
        fn set_failing(&self, fail: bool) {
            self.fail_create.store(fail, Ordering::SeqCst);
        }

        fn created(&self) -> Vec<RemoteEvent> {
            self.created.lock().expect("created mutex").clone()
        }
    }

    #[async_trait]
    impl CalendarGateway for FakeCalendarGateway {
        async fn list_events(
            &self,
            _access_token: &str,
            _time_min: chrono::DateTime<Utc>,
            _time_max: chrono::DateTime<Utc>,
        ) -> Result<Vec<RemoteEvent>, InfraError> {
            Ok(Vec::new())
        }

        async fn create_event(
            &self,
            _access_token: &str,
            event: &RemoteEvent,
        ) -> Result<String, InfraError> {
            self.create_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_create.load(Ordering::SeqCst) {
                return Err(InfraError::Calendar("simulated create failure".to_string()));
            }
            self.created.lock().expect("created mutex").push(event.clone());
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

    fn sample_start() -> DateTime<Tz> {
        Los_Angeles
            .with_ymd_and_hms(2026, 3, 2, 9, 0, 0)
            .single()
            .expect("unambiguous local time")
    }

    #[tokio::test]
    async fn both_sides_succeed() {
        let gateway = FakeCalendarGateway::default();
        let mirror = RecordingTaskMirror::default();

        let outcome = submit_task(
            &gateway,
            &mirror,
            Some("token"),
            "Write report",
            sample_start(),
            60,
            "Scheduled: 9:00 AM on Monday, March 2",
        )
        .await;

        assert_eq!(outcome.status(), "both_ok");
        assert!(outcome.both_ok());
        assert!(outcome.calendar_error.is_none());

        let created = gateway.created();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].summary.as_deref(), Some("Write report"));

        let mirrored = mirror.created();
        assert_eq!(mirrored.len(), 1);
        assert_eq!(mirrored[0].1, "Scheduled: 9:00 AM on Monday, March 2");
    }

    #[tokio::test]
    async fn calendar_failure_still_attempts_mirror() {
        let gateway = FakeCalendarGateway::default();
        gateway.set_failing(true);
        let mirror = RecordingTaskMirror::default();

        let outcome = submit_task(
            &gateway,
            &mirror,
            Some("token"),
            "Write report",
            sample_start(),
            60,
            "",
        )
        .await;

        assert_eq!(outcome.status(), "partial");
        assert!(!outcome.calendar_ok);
        assert!(outcome.task_ok);
        assert!(outcome.calendar_error.is_some());
        assert_eq!(mirror.call_count(), 1);
    }

    #[tokio::test]
    async fn missing_token_fails_calendar_side_without_network() {
        let gateway = FakeCalendarGateway::default();
        let mirror = RecordingTaskMirror::default();

        let outcome = submit_task(&gateway, &mirror, None, "Offline task", sample_start(), 30, "").await;

        assert_eq!(outcome.status(), "partial");
        assert!(!outcome.calendar_ok);
        // the gateway is never touched without a token
        assert_eq!(gateway.create_calls.load(Ordering::SeqCst), 0);
        assert_eq!(mirror.call_count(), 1);
    }

    #[tokio::test]
    async fn both_sides_can_fail() {
        let gateway = FakeCalendarGateway::default();
        gateway.set_failing(true);
        let mirror = RecordingTaskMirror::default();
        mirror.set_failing(true);

        let outcome = submit_task(
            &gateway,
            &mirror,
            Some("token"),
            "Doomed task",
            sample_start(),
            60,
            "",
        )
        .await;

        assert_eq!(outcome.status(), "both_failed");
        assert!(outcome.calendar_error.is_some());
        assert!(outcome.task_error.is_some());
        // both sides were genuinely attempted
        assert_eq!(gateway.create_calls.load(Ordering::SeqCst), 1);
        assert_eq!(mirror.call_count(), 1);
    }

    #[test]
    fn phase_defaults_to_idle() {
        assert_eq!(SubmissionPhase::default(), SubmissionPhase::Idle);
    }
}
