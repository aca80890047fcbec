use crate::domain::models::CalendarEvent;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;

const UNTITLED: &str = "(No title)";

/// Google Calendar event time: either a `dateTime` instant or a bare `date`
/// for all-day events.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq, Default)]
pub struct EventDateTime {
    #[serde(rename = "dateTime", skip_serializing_if = "Option::is_none")]
    pub date_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(rename = "timeZone", skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq, Default)]
pub struct RemoteEvent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<EventDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<EventDateTime>,
}

/// Decode a wire event into the domain model. Malformed entries (cancelled,
/// missing id or start, end before start) are skipped, not errors: one bad
/// event must never sink the whole week.
pub fn decode_event(event: &RemoteEvent, tz: Tz) -> Option<CalendarEvent> {
    if event.status.as_deref() == Some("cancelled") {
        return None;
    }

    let id = event
        .id
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())?
        .to_string();

    let title = event
        .summary
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(UNTITLED)
        .to_string();

    let start_wire = event.start.as_ref()?;
    let is_all_day = start_wire.date_time.is_none() && start_wire.date.is_some();

    let (start, end) = if is_all_day {
        let start = parse_all_day(start_wire.date.as_deref()?, tz)?;
        let end = event
            .end
            .as_ref()
            .and_then(|wire| wire.date.as_deref())
            .and_then(|raw| parse_all_day(raw, tz))
            .unwrap_or(start + Duration::days(1));
        (start, end)
    } else {
        let start = parse_instant(start_wire.date_time.as_deref()?)?;
        let end = parse_instant(event.end.as_ref()?.date_time.as_deref()?)?;
        (start, end)
    };

    if end < start {
        return None;
    }

    Some(CalendarEvent {
        id,
        title,
        start,
        end,
        is_all_day,
    })
}

/// Build the wire form of a brand-new timed event. Writes always carry an
/// explicit IANA timezone so the service never has to guess.
pub fn encode_new_event(title: &str, start: DateTime<Tz>, duration_minutes: i64) -> RemoteEvent {
    let (start_wire, end_wire) = encode_event_times(start, duration_minutes);
    RemoteEvent {
        id: None,
        summary: Some(title.trim().to_string()),
        status: None,
        start: Some(start_wire),
        end: Some(end_wire),
    }
}

pub fn encode_event_times(
    start: DateTime<Tz>,
    duration_minutes: i64,
) -> (EventDateTime, EventDateTime) {
    let end = start + Duration::minutes(duration_minutes);
    (instant_wire(&start), instant_wire(&end))
}

fn instant_wire(value: &DateTime<Tz>) -> EventDateTime {
    EventDateTime {
        date_time: Some(value.to_rfc3339()),
        date: None,
        time_zone: Some(value.timezone().name().to_string()),
    }
}

fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|value| value.with_timezone(&Utc))
        .ok()
}

fn parse_all_day(raw: &str, tz: Tz) -> Option<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()?;
    let naive = date.and_hms_opt(0, 0, 0)?;
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|value| value.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::America::Los_Angeles;

    fn timed_wire(id: &str, start: &str, end: &str) -> RemoteEvent {
        RemoteEvent {
            id: Some(id.to_string()),
            summary: Some("Planning".to_string()),
            status: Some("confirmed".to_string()),
            start: Some(EventDateTime {
                date_time: Some(start.to_string()),
                date: None,
                time_zone: None,
            }),
            end: Some(EventDateTime {
                date_time: Some(end.to_string()),
                date: None,
                time_zone: None,
            }),
        }
    }

    #[test]
    fn decodes_timed_event() {
        let wire = timed_wire("evt-1", "2026-03-02T09:00:00-08:00", "2026-03-02T10:00:00-08:00");
        let event = decode_event(&wire, Los_Angeles).expect("decoded");
        assert_eq!(event.id, "evt-1");
        assert_eq!(event.title, "Planning");
        assert!(!event.is_all_day);
        assert_eq!(event.duration_minutes(), 60);
    }

    #[test]
    fn decodes_all_day_event_from_bare_date() {
        let wire = RemoteEvent {
            id: Some("evt-2".to_string()),
            summary: None,
            status: None,
            start: Some(EventDateTime {
                date_time: None,
                date: Some("2026-03-02".to_string()),
                time_zone: None,
            }),
            end: Some(EventDateTime {
                date_time: None,
                date: Some("2026-03-03".to_string()),
                time_zone: None,
            }),
        };
        let event = decode_event(&wire, Los_Angeles).expect("decoded");
        assert!(event.is_all_day);
        assert_eq!(event.title, "(No title)");
        assert_eq!(event.duration_minutes(), 24 * 60);
    }

    #[test]
    fn skips_cancelled_events() {
        let mut wire = timed_wire("evt-3", "2026-03-02T09:00:00Z", "2026-03-02T10:00:00Z");
        wire.status = Some("cancelled".to_string());
        assert!(decode_event(&wire, Los_Angeles).is_none());
    }

    #[test]
    fn skips_events_without_id_or_start() {
        let mut wire = timed_wire("evt-4", "2026-03-02T09:00:00Z", "2026-03-02T10:00:00Z");
        wire.id = None;
        assert!(decode_event(&wire, Los_Angeles).is_none());

        let mut wire = timed_wire("evt-5", "2026-03-02T09:00:00Z", "2026-03-02T10:00:00Z");
        wire.start = None;
        assert!(decode_event(&wire, Los_Angeles).is_none());
    }

    #[test]
    fn skips_events_with_reversed_range_or_bad_timestamps() {
        let wire = timed_wire("evt-6", "2026-03-02T10:00:00Z", "2026-03-02T09:00:00Z");
        assert!(decode_event(&wire, Los_Angeles).is_none());

        let wire = timed_wire("evt-7", "garbage", "2026-03-02T10:00:00Z");
        assert!(decode_event(&wire, Los_Angeles).is_none());
    }

    #[test]
    fn zero_length_event_is_kept() {
        let wire = timed_wire("evt-8", "2026-03-02T09:00:00Z", "2026-03-02T09:00:00Z");
        let event = decode_event(&wire, Los_Angeles).expect("decoded");
        assert_eq!(event.duration_minutes(), 0);
    }

    #[test]
    fn encode_carries_explicit_timezone() {
        let start = Los_Angeles
            .with_ymd_and_hms(2026, 3, 2, 9, 0, 0)
            .single()
            .expect("unambiguous local time");
        let wire = encode_new_event("Deep work", start, 90);

        let start_wire = wire.start.expect("start");
        let end_wire = wire.end.expect("end");
        assert_eq!(start_wire.time_zone.as_deref(), Some("America/Los_Angeles"));
        assert_eq!(end_wire.time_zone.as_deref(), Some("America/Los_Angeles"));
        assert!(start_wire.date.is_none());

        let roundtrip = RemoteEvent {
            id: Some("evt-9".to_string()),
            summary: wire.summary,
            status: None,
            start: Some(start_wire),
            end: Some(end_wire),
        };
        let decoded = decode_event(&roundtrip, Los_Angeles).expect("decoded");
        assert_eq!(decoded.duration_minutes(), 90);
    }
}
