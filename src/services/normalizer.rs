//! Turns the model's free-form date/time/title fields into a concrete event.
//!
//! Dates understood: `today`, `tonight`, `tomorrow`, `day after tomorrow`,
//! `in N days|weeks`, weekday names (`tuesday`, `next tue`, `this friday`:
//! always the nearest occurrence strictly after today), month-name dates
//! (`June 11`, `11th of June 2024`), and year-first ISO dates, optionally
//! with a time (`2024-06-11`, `2024/06/11`, `2024-06-11T14:30:00`).
//! Numeric day/month orderings are ambiguous and rejected.
//!
//! Times understood: 24-hour (`14:30`, `14h30`, `1430`), 12-hour (`2pm`,
//! `2:30 p.m.`), `noon`, `midnight`, and ranges (`2-3pm`, `14:00 to 15:30`).

use chrono::{
    DateTime, Datelike, Duration, LocalResult, Month, NaiveDate, NaiveDateTime, NaiveTime,
    TimeZone, Utc, Weekday,
};
use chrono_tz::Tz;

use crate::errors::ExtractionFailure;
use crate::models::{CanonicalEvent, RawExtraction};

#[derive(Debug, Clone)]
pub struct EventDefaults {
    pub timezone: Tz,
    pub duration: Duration,
    /// Start time used when the user gave a date but no time.
    pub start_time: NaiveTime,
    pub title: String,
}

impl EventDefaults {
    pub const DEFAULT_TITLE: &'static str = "New Event";
}

pub fn normalize(
    raw: &RawExtraction,
    reference: DateTime<Utc>,
    defaults: &EventDefaults,
) -> Result<CanonicalEvent, ExtractionFailure> {
    let today = reference.with_timezone(&defaults.timezone).date_naive();

    let date_text = raw
        .date_expression
        .as_deref()
        .ok_or(ExtractionFailure::MissingDate)?;

    // Models sometimes fold the time into the date: "tomorrow at 3pm".
    let (date_text, inline_time) = split_inline_time(date_text);
    let (date, embedded_time) = resolve_date(date_text, today)
        .ok_or_else(|| ExtractionFailure::DateUnresolved(date_text.trim().to_string()))?;

    let time_text = raw.time_expression.as_deref().or(inline_time);
    let (start_time, range_end) = match time_text {
        Some(text) => resolve_time_range(text)
            .ok_or_else(|| ExtractionFailure::TimeUnresolved(text.trim().to_string()))?,
        None => (embedded_time.unwrap_or(defaults.start_time), None),
    };

    let start_local = date.and_time(start_time);
    let start = localize(start_local, defaults.timezone)?;

    let explicit_end = match (range_end, raw.end_time_expression.as_deref()) {
        (Some(end), _) => Some(date.and_time(end)),
        (None, Some(text)) => Some(
            resolve_end(text, date)
                .ok_or_else(|| ExtractionFailure::TimeUnresolved(text.trim().to_string()))?,
        ),
        (None, None) => None,
    };

    let end = match explicit_end {
        Some(mut end_local) => {
            // "11pm-1am" ends on the following day
            if end_local <= start_local {
                end_local += Duration::days(1);
            }
            localize(end_local, defaults.timezone)?
        }
        None => start + defaults.duration,
    };

    Ok(CanonicalEvent {
        title: raw
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(&defaults.title)
            .to_string(),
        start,
        end,
        location: non_empty(raw.location.as_deref()),
        description: non_empty(raw.description.as_deref()),
    })
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn localize(local: NaiveDateTime, tz: Tz) -> Result<DateTime<Tz>, ExtractionFailure> {
    match tz.from_local_datetime(&local) {
        LocalResult::Single(dt) => Ok(dt),
        // DST fall-back: take the first occurrence
        LocalResult::Ambiguous(earliest, _) => Ok(earliest),
        LocalResult::None => Err(ExtractionFailure::NonexistentLocalTime(local)),
    }
}

/// Splits "tomorrow at 3pm" into date and time. A tail that isn't a time
/// ("June 14 at Central Park") is a place, so it is dropped and no time is taken.
fn split_inline_time(text: &str) -> (&str, Option<&str>) {
    // ASCII lowercasing keeps byte offsets aligned with `text`.
    let lower = text.to_ascii_lowercase();
    match lower.find(" at ") {
        Some(idx) => {
            let (date, tail) = (&text[..idx], &text[idx + 4..]);
            if resolve_time_range(tail).is_some() {
                (date, Some(tail))
            } else {
                (date, None)
            }
        }
        None => (text, None),
    }
}

/// Resolves a date expression relative to `today` (in the event timezone).
/// A time is returned alongside when the expression is an ISO date-time.
pub fn resolve_date(expr: &str, today: NaiveDate) -> Option<(NaiveDate, Option<NaiveTime>)> {
    let cleaned = expr
        .trim()
        .trim_end_matches(|c: char| c == '.' || c == ',' || c == '!' || c == '?')
        .trim()
        .to_lowercase();
    if cleaned.is_empty() {
        return None;
    }

    if let Some(parsed) = parse_iso(&cleaned) {
        return Some(parsed);
    }

    let words: Vec<&str> = cleaned
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|w| !w.is_empty())
        .filter(|w| !matches!(*w, "on" | "the" | "of"))
        .collect();

    resolve_relative(&words, today)
        .or_else(|| resolve_weekday(&words, today))
        .or_else(|| resolve_month_day(&words, today))
        .map(|date| (date, None))
}

fn parse_iso(s: &str) -> Option<(NaiveDate, Option<NaiveTime>)> {
    let upper = s.to_uppercase();
    let upper = upper.trim_end_matches('Z');
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(upper, fmt) {
            return Some((dt.date(), Some(dt.time())));
        }
    }
    for fmt in ["%Y-%m-%d", "%Y/%m/%d"] {
        if let Ok(d) = NaiveDate::parse_from_str(upper, fmt) {
            return Some((d, None));
        }
    }
    None
}

fn resolve_relative(words: &[&str], today: NaiveDate) -> Option<NaiveDate> {
    match words {
        ["today"] | ["tonight"] | ["this", "evening"] | ["this", "afternoon"]
        | ["this", "morning"] => Some(today),
        ["tomorrow"] | ["tomorrow", "morning" | "afternoon" | "evening" | "night"] => {
            today.succ_opt()
        }
        ["day", "after", "tomorrow"] => today.checked_add_signed(Duration::days(2)),
        ["in", n, unit] => {
            let n: i64 = match *n {
                "a" | "an" | "one" => 1,
                "two" => 2,
                "three" => 3,
                other => other.parse().ok()?,
            };
            let days = match *unit {
                "day" | "days" => n,
                "week" | "weeks" => n * 7,
                _ => return None,
            };
            today.checked_add_signed(Duration::days(days))
        }
        _ => None,
    }
}

fn resolve_weekday(words: &[&str], today: NaiveDate) -> Option<NaiveDate> {
    let name = match words {
        [day] => *day,
        ["next" | "this" | "coming", day] => *day,
        _ => return None,
    };
    let target: Weekday = name.trim_end_matches('.').parse().ok()?;
    Some(next_weekday(today, target))
}

/// Nearest `target` strictly after `today`; today itself never counts.
pub fn next_weekday(today: NaiveDate, target: Weekday) -> NaiveDate {
    let current = today.weekday().num_days_from_monday() as i64;
    let wanted = target.num_days_from_monday() as i64;
    let mut ahead = (wanted - current).rem_euclid(7);
    if ahead == 0 {
        ahead = 7;
    }
    today + Duration::days(ahead)
}

fn resolve_month_day(words: &[&str], today: NaiveDate) -> Option<NaiveDate> {
    let mut month: Option<Month> = None;
    let mut day: Option<u32> = None;
    let mut year: Option<i32> = None;

    for word in words {
        let word = word.trim_matches('.');
        if word.parse::<Weekday>().is_ok() {
            continue;
        }
        if let Ok(m) = word.parse::<Month>() {
            if month.replace(m).is_some() {
                return None;
            }
            continue;
        }

        let digits = strip_ordinal(word);
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        if digits.len() == 4 && year.is_none() {
            year = Some(digits.parse().ok()?);
        } else if day.is_none() && digits.len() <= 2 {
            day = Some(digits.parse().ok()?);
        } else {
            return None;
        }
    }

    let month = month?.number_from_month();
    let day = day?;
    match year {
        Some(y) => NaiveDate::from_ymd_opt(y, month, day),
        None => {
            // No year given: the next time that day comes around. February 29
            // can be up to eight years away.
            (today.year()..=today.year() + 8)
                .filter_map(|y| NaiveDate::from_ymd_opt(y, month, day))
                .find(|d| *d >= today)
        }
    }
}

fn strip_ordinal(word: &str) -> &str {
    for suffix in ["st", "nd", "rd", "th"] {
        if let Some(stripped) = word.strip_suffix(suffix) {
            return stripped;
        }
    }
    word
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Meridiem {
    Am,
    Pm,
}

fn resolve_time_range(expr: &str) -> Option<(NaiveTime, Option<NaiveTime>)> {
    let lower = expr.trim().to_lowercase();
    let lower = lower
        .strip_prefix("from ")
        .unwrap_or(lower.as_str())
        .replace('–', "-");

    let parts: Vec<&str> = if lower.contains(" to ") {
        lower.splitn(2, " to ").collect()
    } else if lower.contains(" until ") {
        lower.splitn(2, " until ").collect()
    } else {
        lower.splitn(2, '-').collect()
    };

    match parts.as_slice() {
        [single] => Some((resolve_time(single)?, None)),
        [start, end] => {
            let (start_clock, start_m) = parse_clock(start)?;
            let (end_clock, end_m) = parse_clock(end)?;
            // "2-3pm": the bare side borrows the other side's am/pm
            let start = apply_meridiem(start_clock, start_m.or(end_m))?;
            let end = apply_meridiem(end_clock, end_m.or(start_m))?;
            Some((start, Some(end)))
        }
        _ => None,
    }
}

/// Parses a single clock time in 12- or 24-hour form.
pub fn resolve_time(expr: &str) -> Option<NaiveTime> {
    let (clock, meridiem) = parse_clock(expr)?;
    apply_meridiem(clock, meridiem)
}

fn resolve_end(expr: &str, date: NaiveDate) -> Option<NaiveDateTime> {
    if let Some(time) = resolve_time(expr) {
        return Some(date.and_time(time));
    }
    match parse_iso(&expr.trim().to_lowercase())? {
        (d, Some(t)) => Some(d.and_time(t)),
        (_, None) => None,
    }
}

fn parse_clock(expr: &str) -> Option<((u32, u32), Option<Meridiem>)> {
    let mut s = expr.trim().to_lowercase();
    for prefix in ["at ", "around ", "@"] {
        if let Some(rest) = s.strip_prefix(prefix) {
            s = rest.to_string();
        }
    }
    let s = s.replace("o'clock", "");
    match s.trim() {
        "noon" | "midday" => return Some(((12, 0), None)),
        "midnight" => return Some(((0, 0), None)),
        _ => {}
    }

    let compact: String = s.chars().filter(|c| !c.is_whitespace() && *c != '.').collect();
    let (body, meridiem) = if let Some(b) = compact.strip_suffix("am") {
        (b, Some(Meridiem::Am))
    } else if let Some(b) = compact.strip_suffix("pm") {
        (b, Some(Meridiem::Pm))
    } else {
        (compact.as_str(), None)
    };
    let body = body.trim_end_matches('h').replace('h', ":");

    let (hour, minute) = match body.split(':').collect::<Vec<_>>().as_slice() {
        [h] if h.len() == 4 && h.bytes().all(|b| b.is_ascii_digit()) && meridiem.is_none() => {
            (h[..2].parse().ok()?, h[2..].parse().ok()?)
        }
        [h] if !h.is_empty() && h.len() <= 2 => (h.parse().ok()?, 0),
        [h, m] | [h, m, _] if m.len() == 2 => (h.parse().ok()?, m.parse().ok()?),
        _ => return None,
    };
    if minute > 59 {
        return None;
    }
    Some(((hour, minute), meridiem))
}

fn apply_meridiem((hour, minute): (u32, u32), meridiem: Option<Meridiem>) -> Option<NaiveTime> {
    let hour = match meridiem {
        None if hour <= 23 => hour,
        Some(_) if !(1..=12).contains(&hour) => return None,
        Some(Meridiem::Am) => hour % 12,
        Some(Meridiem::Pm) => hour % 12 + 12,
        None => return None,
    };
    NaiveTime::from_hms_opt(hour, minute, 0)
}
