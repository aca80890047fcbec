use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// A single calendar event, normalized to UTC. `is_all_day` marks events
/// whose wire form carried a date with no time-of-day.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CalendarEvent {
    pub id: String,
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub is_all_day: bool,
}

impl CalendarEvent {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "event.id")?;
        if self.end < self.start {
            return Err("event.end must not precede event.start".to_string());
        }
        Ok(())
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }
}

/// The displayed week: a Monday anchor plus the signed offset from the week
/// containing today. Invariant: `anchor.weekday() == Monday`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct WeekWindow {
    pub anchor: NaiveDate,
    pub offset: i32,
}

impl WeekWindow {
    pub fn for_offset(today: NaiveDate, offset: i32) -> Self {
        let days_from_monday = today.weekday().num_days_from_monday() as i64;
        let anchor =
            today - Duration::days(days_from_monday) + Duration::weeks(i64::from(offset));
        Self { anchor, offset }
    }

    pub fn containing(today: NaiveDate) -> Self {
        Self::for_offset(today, 0)
    }

    pub fn next(&self, today: NaiveDate) -> Self {
        Self::for_offset(today, self.offset + 1)
    }

    pub fn previous(&self, today: NaiveDate) -> Self {
        Self::for_offset(today, self.offset - 1)
    }

    pub fn day(&self, index: u32) -> NaiveDate {
        self.anchor + Duration::days(i64::from(index))
    }

    pub fn last_day(&self) -> NaiveDate {
        self.anchor + Duration::days(6)
    }

    pub fn label(&self) -> String {
        format!(
            "{} - {}",
            self.anchor.format("%b %-d"),
            self.last_day().format("%b %-d, %Y")
        )
    }

    /// Monday 00:00:00 through Sunday 23:59:59 local, as UTC instants.
    /// Returns None when a boundary does not exist in the timezone.
    pub fn bounds(&self, tz: Tz) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let start = local_at(self.anchor, 0, 0, 0, tz)?;
        let end = local_at(self.last_day(), 23, 59, 59, tz)?;
        Some((start.with_timezone(&Utc), end.with_timezone(&Utc)))
    }
}

fn local_at(date: NaiveDate, hour: u32, minute: u32, second: u32, tz: Tz) -> Option<DateTime<Tz>> {
    let naive = date.and_hms_opt(hour, minute, second)?;
    tz.from_local_datetime(&naive).earliest()
}

/// Output of the time expression parser. `duration_minutes` is present only
/// for range inputs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParsedTime {
    pub start: DateTime<Utc>,
    pub display: String,
    pub duration_minutes: Option<i64>,
}

/// The parsed schedule carried between `parse_time` and `add_task`.
/// Retained across failed submissions so the user can retry without
/// re-entering the time.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskDraft {
    pub scheduled: Option<ParsedTime>,
    pub duration_minutes: Option<i64>,
}

/// Transient state while an event is being dragged to a new slot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DragState {
    pub event_id: String,
    pub duration_minutes: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OAuthToken {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub token_type: String,
    pub scope: Option<String>,
}

impl OAuthToken {
    pub fn is_valid_at(&self, now: DateTime<Utc>, leeway_seconds: i64) -> bool {
        self.expires_at > now + Duration::seconds(leeway_seconds)
            && !self.access_token.trim().is_empty()
    }
}

fn validate_non_empty(value: &str, field_name: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field_name} must not be empty"));
    }
    Ok(())
}
