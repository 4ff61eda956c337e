//! Typed helpers behind `func` dispatch. All of them are total: a missing
//! or unparseable argument yields JSON null, never an error.

use chrono::{DateTime, Duration, NaiveDate};
use regex::Regex;
use serde_json::{json, Value};

const DAY_MINUTES: f64 = 24.0 * 60.0;

pub fn time_of_day_pattern() -> Regex {
    // Compiled per call, same as the sibling regex checks; these are not hot.
    Regex::new(r"^\d{1,2}:\d{2}(:\d{2})?$").expect("static pattern")
}

/// Minutes since midnight. Strings must look like `H:MM` or `H:MM:SS`
/// (seconds contribute fractional minutes); numbers are taken as minutes.
pub fn parse_minutes(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|f| f.is_finite()),
        Value::String(s) => {
            let trimmed = s.trim();
            if !time_of_day_pattern().is_match(trimmed) {
                return None;
            }
            let mut parts = trimmed.split(':');
            let hours: f64 = parts.next()?.parse().ok()?;
            let minutes: f64 = parts.next()?.parse().ok()?;
            let seconds: f64 = match parts.next() {
                Some(sec) => sec.parse().ok()?,
                None => 0.0,
            };
            Some(hours * 60.0 + minutes + seconds / 60.0)
        }
        _ => None,
    }
}

pub fn to_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|f| f.is_finite()),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

fn render_hhmm(minutes: f64) -> Value {
    let wrapped = minutes.rem_euclid(DAY_MINUTES);
    let whole = wrapped.floor() as i64;
    json!(format!("{:02}:{:02}", whole / 60, whole % 60))
}

/// `HH:MM` canonical form, zero-padded, modulo 24h.
pub fn normalize_time(args: &[Value]) -> Value {
    match args.first().and_then(parse_minutes) {
        Some(m) => render_hhmm(m),
        None => Value::Null,
    }
}

/// Time at `start + wrapped-interval / 2`, modulo 24h.
pub fn midpoint(args: &[Value]) -> Value {
    let (Some(start), Some(end)) = (
        args.first().and_then(parse_minutes),
        args.get(1).and_then(parse_minutes),
    ) else {
        return Value::Null;
    };
    let mut interval = end - start;
    if interval < 0.0 {
        interval += DAY_MINUTES;
    }
    render_hhmm(start + interval / 2.0)
}

/// Whole minutes from `start` to `end`, wrapping past midnight. Rounding is
/// ties-to-even on the wrapped difference so the two directions of any pair
/// always sum to a full day.
pub fn duration(args: &[Value]) -> Value {
    let (Some(start), Some(end)) = (
        args.first().and_then(parse_minutes),
        args.get(1).and_then(parse_minutes),
    ) else {
        return Value::Null;
    };
    let mut minutes = end - start;
    if minutes < 0.0 {
        minutes += DAY_MINUTES;
    }
    json!(minutes.round_ties_even() as i64)
}

/// `YYYY-MM-DD` plus a (truncated) day count, in UTC.
pub fn add_days(args: &[Value]) -> Value {
    let Some(date) = args.first().and_then(Value::as_str).and_then(parse_date) else {
        return Value::Null;
    };
    let Some(days) = args.get(1).and_then(to_number) else {
        return Value::Null;
    };
    match date.checked_add_signed(Duration::days(days.trunc() as i64)) {
        Some(d) => json!(d.format("%Y-%m-%d").to_string()),
        None => Value::Null,
    }
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    let trimmed = s.trim();
    if let Ok(d) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Some(d);
    }
    DateTime::parse_from_rfc3339(trimmed)
        .ok()
        .map(|dt| dt.naive_utc().date())
}
