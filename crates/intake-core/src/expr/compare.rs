use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;
use std::cmp::Ordering;

/// Comparable key for the ordering operators. Incomparable inputs map to
/// `None` and make every comparison false.
#[derive(Debug, Clone, PartialEq)]
pub enum Comparable {
    Num(f64),
    Text(String),
}

/// Coercion ladder: finite number, then numeric string, then ISO date
/// (epoch milliseconds), then the trimmed string itself. Everything else is
/// incomparable.
pub fn to_comparable(value: &Value) -> Option<Comparable> {
    match value {
        Value::Number(n) => n.as_f64().filter(|f| f.is_finite()).map(Comparable::Num),
        Value::String(s) => {
            let trimmed = s.trim();
            if let Ok(n) = trimmed.parse::<f64>() {
                if n.is_finite() {
                    return Some(Comparable::Num(n));
                }
            }
            if let Some(ms) = parse_date_ms(trimmed) {
                return Some(Comparable::Num(ms));
            }
            Some(Comparable::Text(trimmed.to_string()))
        }
        _ => None,
    }
}

pub fn compare(left: Option<Comparable>, right: Option<Comparable>) -> Option<Ordering> {
    match (left?, right?) {
        (Comparable::Num(a), Comparable::Num(b)) => a.partial_cmp(&b),
        (Comparable::Text(a), Comparable::Text(b)) => Some(a.cmp(&b)),
        _ => None,
    }
}

/// Parses an ISO date or datetime to epoch milliseconds (UTC).
pub fn parse_date_ms(s: &str) -> Option<f64> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_millis() as f64);
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Some(dt.and_utc().timestamp_millis() as f64);
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(d.and_hms_opt(0, 0, 0)?.and_utc().timestamp_millis() as f64);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numbers_and_numeric_strings_share_a_key() {
        assert_eq!(to_comparable(&json!(18)), Some(Comparable::Num(18.0)));
        assert_eq!(to_comparable(&json!(" 18 ")), Some(Comparable::Num(18.0)));
    }

    #[test]
    fn iso_dates_become_epoch_ms() {
        let a = to_comparable(&json!("2026-02-13"));
        let b = to_comparable(&json!("2026-02-20"));
        assert_eq!(compare(a, b), Some(Ordering::Less));
    }

    #[test]
    fn plain_strings_compare_lexicographically() {
        let a = to_comparable(&json!("apple"));
        let b = to_comparable(&json!("banana"));
        assert_eq!(compare(a, b), Some(Ordering::Less));
    }

    #[test]
    fn incomparables_never_order() {
        assert_eq!(to_comparable(&json!(true)), None);
        assert_eq!(to_comparable(&json!([1])), None);
        assert_eq!(to_comparable(&Value::Null), None);
        let num = to_comparable(&json!(5));
        let text = to_comparable(&json!("apple"));
        assert_eq!(compare(num, text), None);
    }
}
