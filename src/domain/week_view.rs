use crate::domain::models::{CalendarEvent, WeekWindow};
use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Timelike};
use chrono_tz::Tz;
use serde::Serialize;

pub const VISIBLE_START_HOUR: u32 = 6;
pub const VISIBLE_END_HOUR: u32 = 22;
pub const HOUR_HEIGHT: f64 = 60.0;
pub const MIN_EVENT_HEIGHT: f64 = 20.0;

/// Everything the frontend needs to paint one week. Produced by [`layout`],
/// which is pure: same events, week, and clock always yield the same plan.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RenderPlan {
    pub week_offset: i32,
    pub week_label: String,
    pub hour_labels: Vec<String>,
    pub days: Vec<DayColumn>,
    pub current_time: Option<CurrentTimeMarker>,
    pub today_agenda: Vec<AgendaItem>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DayColumn {
    pub date: NaiveDate,
    pub label: String,
    pub is_today: bool,
    pub all_day: Vec<AllDayEntry>,
    pub timed: Vec<PlacedEvent>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AllDayEntry {
    pub event_id: String,
    pub title: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PlacedEvent {
    pub event_id: String,
    pub title: String,
    pub top: f64,
    pub height: f64,
    pub start_label: String,
    pub end_label: String,
    pub duration_minutes: i64,
    pub completed: bool,
    pub in_progress: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CurrentTimeMarker {
    pub day_index: usize,
    pub top: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AgendaItem {
    pub event_id: String,
    pub title: String,
    pub time_label: String,
    pub completed: bool,
    pub in_progress: bool,
}

/// Lay the week's events out into day buckets with pixel offsets over the
/// visible 6..22 window.
pub fn layout(events: &[CalendarEvent], week: &WeekWindow, now: DateTime<Tz>) -> RenderPlan {
    let tz = now.timezone();
    let today = now.date_naive();

    let mut days: Vec<DayColumn> = (0..7u32)
        .map(|index| {
            let date = week.day(index);
            DayColumn {
                date,
                label: date.format("%a %-m/%-d").to_string(),
                is_today: date == today,
                all_day: Vec::new(),
                timed: Vec::new(),
            }
        })
        .collect();

    // Place in start order so per-day buckets stay sorted by start even
    // when pre-window events clamp to the same top.
    let mut ordered: Vec<&CalendarEvent> = events.iter().collect();
    ordered.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.id.cmp(&b.id)));

    for event in ordered {
        let start_local = event.start.with_timezone(&tz);
        let day_index = (start_local.date_naive() - week.anchor).num_days();
        if !(0..7).contains(&day_index) {
            continue;
        }
        let day = &mut days[day_index as usize];

        if event.is_all_day {
            day.all_day.push(AllDayEntry {
                event_id: event.id.clone(),
                title: event.title.clone(),
            });
            continue;
        }

        let end_local = event.end.with_timezone(&tz);
        let start_offset = hour_offset(&start_local);
        let end_offset = hour_offset(&end_local);
        // Outside the visible window entirely.
        if end_offset < 0.0
            || start_offset > f64::from(VISIBLE_END_HOUR - VISIBLE_START_HOUR + 1)
        {
            continue;
        }

        let duration_minutes = event.duration_minutes();
        day.timed.push(PlacedEvent {
            event_id: event.id.clone(),
            title: event.title.clone(),
            top: (start_offset * HOUR_HEIGHT).max(0.0),
            height: (duration_minutes as f64 * HOUR_HEIGHT / 60.0 - 2.0).max(MIN_EVENT_HEIGHT),
            start_label: time_label(&start_local),
            end_label: time_label(&end_local),
            duration_minutes,
            completed: end_local < now,
            in_progress: start_local <= now && now <= end_local,
        });
    }

    let current_time = current_time_marker(week, &now);
    let today_agenda = build_today_agenda(&days, today);

    RenderPlan {
        week_offset: week.offset,
        week_label: week.label(),
        hour_labels: (VISIBLE_START_HOUR..VISIBLE_END_HOUR)
            .filter_map(|hour| NaiveTime::from_hms_opt(hour, 0, 0))
            .map(|time| time.format("%-I %p").to_string())
            .collect(),
        days,
        current_time,
        today_agenda,
    }
}

fn current_time_marker(week: &WeekWindow, now: &DateTime<Tz>) -> Option<CurrentTimeMarker> {
    let today = now.date_naive();
    let day_index = (today - week.anchor).num_days();
    if !(0..7).contains(&day_index) {
        return None;
    }
    if now.hour() < VISIBLE_START_HOUR || now.hour() > VISIBLE_END_HOUR {
        return None;
    }
    Some(CurrentTimeMarker {
        day_index: day_index as usize,
        top: hour_offset(now) * HOUR_HEIGHT,
    })
}

/// The agenda always filters by the weekday of the literal present day, even
/// when another week is displayed.
fn build_today_agenda(days: &[DayColumn], today: NaiveDate) -> Vec<AgendaItem> {
    let agenda_index = today.weekday().num_days_from_monday() as usize;
    let Some(day) = days.get(agenda_index) else {
        return Vec::new();
    };
    day.timed
        .iter()
        .map(|placed| AgendaItem {
            event_id: placed.event_id.clone(),
            title: placed.title.clone(),
            time_label: format!("{} - {}", placed.start_label, placed.end_label),
            completed: placed.completed,
            in_progress: placed.in_progress,
        })
        .collect()
}

fn hour_offset(local: &DateTime<Tz>) -> f64 {
    f64::from(local.hour()) + f64::from(local.minute()) / 60.0 - f64::from(VISIBLE_START_HOUR)
}

fn time_label(local: &DateTime<Tz>) -> String {
    local.format("%-I:%M %p").to_string()
}
