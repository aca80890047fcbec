use crate::domain::models::ParsedTime;
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc, Weekday};
use chrono_tz::Tz;
use thiserror::Error;

/// Generic parse failure: the parser never guesses, it reports.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("could not parse time expression '{input}'")]
pub struct ParseFailure {
    pub input: String,
}

const DISPLAY_FORMAT: &str = "%A, %B %-d at %-I:%M %p";

/// Parse a natural-language time expression against an injected reference
/// instant. Range inputs like "9am - 11" yield a duration; single points do
/// not. The reference instant carries the timezone everything resolves in.
pub fn parse_expression(input: &str, local_now: DateTime<Tz>) -> Result<ParsedTime, ParseFailure> {
    let normalized = normalize_expression(input);
    if normalized.is_empty() {
        return Err(failure(input));
    }

    if let Some((head, tail)) = split_range(&normalized) {
        if let Some(start) = resolve_point(&head, &local_now) {
            if let Some(end) = resolve_range_end(&tail, &start) {
                return Ok(ParsedTime {
                    start: start.with_timezone(&Utc),
                    display: start.format(DISPLAY_FORMAT).to_string(),
                    duration_minutes: Some((end - start).num_minutes()),
                });
            }
        }
    }

    let start = resolve_point(&normalized, &local_now).ok_or_else(|| failure(input))?;
    Ok(ParsedTime {
        start: start.with_timezone(&Utc),
        display: start.format(DISPLAY_FORMAT).to_string(),
        duration_minutes: None,
    })
}

fn failure(input: &str) -> ParseFailure {
    ParseFailure {
        input: input.trim().to_string(),
    }
}

fn normalize_expression(s: &str) -> String {
    let s = s.trim().to_lowercase();
    let mut result = String::new();
    let mut prev_space = false;
    for ch in s.chars() {
        if ch.is_whitespace() {
            if !prev_space {
                result.push(' ');
            }
            prev_space = true;
        } else {
            result.push(ch);
            prev_space = false;
        }
    }
    result.trim().to_string()
}

/// Split "start <sep> end" where the end is a bare clock token. The head
/// still has to resolve as a point expression; callers fall back to
/// whole-input resolution when it does not.
fn split_range(s: &str) -> Option<(String, String)> {
    for separator in ["–", " to ", "-"] {
        if let Some(index) = s.rfind(separator) {
            let head = s[..index]
                .trim_end_matches(['-', '–', ' '])
                .trim()
                .to_string();
            let tail = s[index + separator.len()..].trim().to_string();
            if !head.is_empty() && parse_clock(&tail).is_some() {
                return Some((head, tail));
            }
        }
    }
    None
}

/// Resolve the end clock of a range on the start's own date. A missing
/// meridiem is inferred from the start (before noon => am, else pm); if the
/// end does not land strictly after the start, 12 hours are added once.
fn resolve_range_end(clock: &str, start: &DateTime<Tz>) -> Option<DateTime<Tz>> {
    let (hour, minute, meridiem) = parse_clock(clock)?;
    let hour24 = match meridiem {
        Some(is_pm) => clock_to_hour24(hour, is_pm),
        None if (1..=12).contains(&hour) => clock_to_hour24(hour, start.hour() >= 12),
        None => hour,
    };

    let mut end = at_time(start, hour24, minute)?;
    if end <= *start {
        end += Duration::hours(12);
    }
    Some(end)
}

fn resolve_point(s: &str, local: &DateTime<Tz>) -> Option<DateTime<Tz>> {
    try_passthrough_rfc3339(s, local)
        .or_else(|| try_passthrough_iso(s, local))
        .or_else(|| try_anchored(s, local))
        .or_else(|| try_anchor_with_time(s, local))
        .or_else(|| try_weekday_with_time(s, local))
        .or_else(|| try_offset(s, local))
        .or_else(|| try_named_time(s, local))
        .or_else(|| try_clock_time(s, local))
}

fn try_passthrough_rfc3339(s: &str, local: &DateTime<Tz>) -> Option<DateTime<Tz>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&local.timezone()))
        .ok()
}

fn try_passthrough_iso(s: &str, local: &DateTime<Tz>) -> Option<DateTime<Tz>> {
    let tz = local.timezone();
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        let naive = date.and_hms_opt(0, 0, 0)?;
        return tz.from_local_datetime(&naive).earliest();
    }
    for format in ["%Y-%m-%d %H:%M", "%Y-%m-%dt%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return tz.from_local_datetime(&naive).earliest();
        }
    }
    None
}

fn try_anchored(s: &str, local: &DateTime<Tz>) -> Option<DateTime<Tz>> {
    match s {
        "now" => Some(*local),
        "today" => start_of_day(local.date_naive(), local),
        "tomorrow" => start_of_day(local.date_naive().succ_opt()?, local),
        _ => None,
    }
}

/// "tomorrow 9am", "today at noon", "tomorrow morning".
fn try_anchor_with_time(s: &str, local: &DateTime<Tz>) -> Option<DateTime<Tz>> {
    let (anchor, rest) = s.split_once(' ')?;
    if !matches!(anchor, "today" | "tomorrow") {
        return None;
    }
    let base = try_anchored(anchor, local)?;
    combine_time(&base, rest)
}

/// "monday", "next monday 9am", "this friday at 2pm". A bare weekday is
/// future-biased: it means the next strictly-future occurrence.
fn try_weekday_with_time(s: &str, local: &DateTime<Tz>) -> Option<DateTime<Tz>> {
    let mut parts = s.splitn(2, ' ');
    let first = parts.next()?;
    let (modifier, weekday, rest) = if matches!(first, "next" | "this") {
        let remainder = parts.next()?;
        let (weekday_str, rest) = match remainder.split_once(' ') {
            Some((w, r)) => (w, Some(r)),
            None => (remainder, None),
        };
        (first, parse_weekday(weekday_str)?, rest)
    } else {
        ("next", parse_weekday(first)?, parts.next())
    };

    let current = local.weekday().num_days_from_monday() as i64;
    let target = weekday.num_days_from_monday() as i64;
    let days = match modifier {
        "this" => target - current,
        _ => {
            let ahead = (target - current + 7) % 7;
            if ahead == 0 { 7 } else { ahead }
        }
    };

    let base = start_of_day(local.date_naive() + Duration::days(days), local)?;
    match rest {
        Some(rest) => combine_time(&base, rest),
        None => Some(base),
    }
}

/// "in 30 minutes", "in an hour", "in 2 days".
fn try_offset(s: &str, local: &DateTime<Tz>) -> Option<DateTime<Tz>> {
    let rest = s.strip_prefix("in ")?;
    let parts: Vec<&str> = rest.split_whitespace().collect();
    if parts.len() != 2 {
        return None;
    }
    let amount: i64 = if parts[0] == "a" || parts[0] == "an" {
        1
    } else {
        parts[0].parse().ok()?
    };
    let seconds = amount.checked_mul(unit_seconds(parts[1])?)?;
    Some(*local + Duration::seconds(seconds))
}

/// Named times resolve on today, rolling to tomorrow when already past.
fn try_named_time(s: &str, local: &DateTime<Tz>) -> Option<DateTime<Tz>> {
    let (hour, minute) = named_time(s)?;
    future_biased(local, hour, minute)
}

/// Bare clock times: "2pm", "2:30pm", "14:00", "9". Future-biased.
fn try_clock_time(s: &str, local: &DateTime<Tz>) -> Option<DateTime<Tz>> {
    let (hour, minute, meridiem) = parse_clock(s)?;
    let hour24 = match meridiem {
        Some(is_pm) => clock_to_hour24(hour, is_pm),
        None => hour,
    };
    future_biased(local, hour24, minute)
}

fn future_biased(local: &DateTime<Tz>, hour: u32, minute: u32) -> Option<DateTime<Tz>> {
    let candidate = at_time(local, hour, minute)?;
    if candidate <= *local {
        at_time(&(candidate + Duration::days(1)), hour, minute)
    } else {
        Some(candidate)
    }
}

fn combine_time(base: &DateTime<Tz>, rest: &str) -> Option<DateTime<Tz>> {
    let rest = rest.strip_prefix("at ").unwrap_or(rest);
    if let Some((hour, minute)) = named_time(rest) {
        return at_time(base, hour, minute);
    }
    let (hour, minute, meridiem) = parse_clock(rest)?;
    let hour24 = match meridiem {
        Some(is_pm) => clock_to_hour24(hour, is_pm),
        None => hour,
    };
    at_time(base, hour24, minute)
}

/// A bare clock token: 1-2 digits, optional `:MM`, optional meridiem.
fn parse_clock(s: &str) -> Option<(u32, u32, Option<bool>)> {
    let compact = s.trim().to_lowercase().replace(' ', "");
    let (digits, meridiem) = if let Some(rest) = compact.strip_suffix("pm") {
        (rest, Some(true))
    } else if let Some(rest) = compact.strip_suffix("am") {
        (rest, Some(false))
    } else {
        (compact.as_str(), None)
    };

    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit() || c == ':') {
        return None;
    }

    let mut parts = digits.split(':');
    let hour_str = parts.next()?;
    if hour_str.is_empty() || hour_str.len() > 2 {
        return None;
    }
    let hour: u32 = hour_str.parse().ok()?;
    let minute: u32 = match parts.next() {
        Some(m) if m.len() == 2 => m.parse().ok()?,
        Some(_) => return None,
        None => 0,
    };
    if parts.next().is_some() || hour > 23 || minute > 59 {
        return None;
    }
    if meridiem.is_some() && !(1..=12).contains(&hour) {
        return None;
    }
    Some((hour, minute, meridiem))
}

fn clock_to_hour24(hour: u32, is_pm: bool) -> u32 {
    match (hour, is_pm) {
        (12, true) => 12,
        (12, false) => 0,
        (h, true) => h + 12,
        (h, false) => h,
    }
}

fn named_time(s: &str) -> Option<(u32, u32)> {
    match s {
        "morning" => Some((9, 0)),
        "noon" | "lunch" => Some((12, 0)),
        "afternoon" => Some((13, 0)),
        "evening" => Some((18, 0)),
        "night" | "tonight" => Some((21, 0)),
        "midnight" => Some((0, 0)),
        _ => None,
    }
}

fn parse_weekday(s: &str) -> Option<Weekday> {
    match s {
        "monday" | "mon" => Some(Weekday::Mon),
        "tuesday" | "tue" | "tues" => Some(Weekday::Tue),
        "wednesday" | "wed" => Some(Weekday::Wed),
        "thursday" | "thu" | "thurs" => Some(Weekday::Thu),
        "friday" | "fri" => Some(Weekday::Fri),
        "saturday" | "sat" => Some(Weekday::Sat),
        "sunday" | "sun" => Some(Weekday::Sun),
        _ => None,
    }
}

fn unit_seconds(unit: &str) -> Option<i64> {
    match unit {
        "minute" | "minutes" | "min" | "mins" => Some(60),
        "hour" | "hours" | "hr" | "hrs" => Some(3600),
        "day" | "days" => Some(86400),
        "week" | "weeks" => Some(604_800),
        _ => None,
    }
}

fn at_time(base: &DateTime<Tz>, hour: u32, minute: u32) -> Option<DateTime<Tz>> {
    let naive = base.date_naive().and_hms_opt(hour, minute, 0)?;
    base.timezone().from_local_datetime(&naive).earliest()
}

fn start_of_day(date: NaiveDate, local: &DateTime<Tz>) -> Option<DateTime<Tz>> {
    let naive = date.and_hms_opt(0, 0, 0)?;
    local.timezone().from_local_datetime(&naive).earliest()
}
