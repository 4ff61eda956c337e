//! Answer validation against an ordered list of field definitions. Every
//! field is checked (no short-circuit between fields); each failing field
//! contributes its first issue only.

use crate::compute::funcs;
use crate::expr::compare::parse_date_ms;
use crate::model::{FieldType, FormField};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldIssue {
    pub key: String,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub issues: Vec<FieldIssue>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }
}

pub fn validate_answers(fields: &[FormField], answers: &Map<String, Value>) -> ValidationReport {
    let mut report = ValidationReport::default();
    for field in fields {
        let raw = answers.get(&field.key);
        let Some(value) = raw.filter(|v| !is_absent(Some(*v))) else {
            if field.required {
                report.issues.push(FieldIssue {
                    key: field.key.clone(),
                    message: "Field is required".to_string(),
                });
            }
            continue;
        };
        if let Some(message) = check_value(field, value) {
            report.issues.push(FieldIssue {
                key: field.key.clone(),
                message,
            });
        }
    }
    report
}

fn is_absent(raw: Option<&Value>) -> bool {
    match raw {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(_) => false,
    }
}

fn check_value(field: &FormField, value: &Value) -> Option<String> {
    match field.field_type {
        FieldType::Number => check_number(field, value),
        FieldType::Boolean => (!value.is_boolean()).then(|| "Must be true or false".to_string()),
        FieldType::Date => check_date(value),
        FieldType::Time => check_time(value),
        FieldType::Select => check_select(field, value),
        FieldType::MultiSelect => check_multi_select(field, value),
        FieldType::Text => check_text(field, value),
    }
}

fn check_number(field: &FormField, value: &Value) -> Option<String> {
    let Some(n) = funcs::to_number(value) else {
        return Some("Must be a number".to_string());
    };
    if let Some(min) = constraint_number(field, "min") {
        if n < min {
            return Some(format!("Must be at least {}", min));
        }
    }
    if let Some(max) = constraint_number(field, "max") {
        if n > max {
            return Some(format!("Must be at most {}", max));
        }
    }
    None
}

fn check_date(value: &Value) -> Option<String> {
    let ok = value
        .as_str()
        .map(|s| !s.trim().is_empty() && parse_date_ms(s.trim()).is_some())
        .unwrap_or(false);
    (!ok).then(|| "Must be a valid date".to_string())
}

fn check_time(value: &Value) -> Option<String> {
    let ok = value
        .as_str()
        .map(|s| funcs::time_of_day_pattern().is_match(s.trim()))
        .unwrap_or(false);
    (!ok).then(|| "Must be a valid time (HH:MM)".to_string())
}

fn check_select(field: &FormField, value: &Value) -> Option<String> {
    let ok = value
        .as_str()
        .map(|s| option_matches(field.options.as_ref(), s))
        .unwrap_or(false);
    (!ok).then(|| "Must be one of the allowed options".to_string())
}

fn check_multi_select(field: &FormField, value: &Value) -> Option<String> {
    let ok = value
        .as_array()
        .map(|items| {
            items.iter().all(|item| {
                item.as_str()
                    .map(|s| option_matches(field.options.as_ref(), s))
                    .unwrap_or(false)
            })
        })
        .unwrap_or(false);
    (!ok).then(|| "Must be a list of allowed options".to_string())
}

fn check_text(field: &FormField, value: &Value) -> Option<String> {
    let Some(s) = value.as_str() else {
        return Some("Must be text".to_string());
    };
    if let Some(min) = constraint_number(field, "minLength") {
        if (s.chars().count() as f64) < min {
            return Some(format!("Must be at least {} characters", min));
        }
    }
    if let Some(max) = constraint_number(field, "maxLength") {
        if (s.chars().count() as f64) > max {
            return Some(format!("Must be at most {} characters", max));
        }
    }
    if let Some(pattern) = constraint_str(field, "pattern") {
        // An invalid pattern is an authoring mistake, not the participant's;
        // it is skipped.
        if let Ok(re) = Regex::new(pattern) {
            if !re.is_match(s) {
                return Some("Does not match the required format".to_string());
            }
        }
    }
    None
}

fn constraint_number(field: &FormField, key: &str) -> Option<f64> {
    field.validation.as_ref()?.get(key)?.as_f64()
}

fn constraint_str<'a>(field: &'a FormField, key: &str) -> Option<&'a str> {
    field.validation.as_ref()?.get(key)?.as_str()
}

/// Options may be plain strings or `{ "value": ... }` objects.
fn option_matches(options: Option<&Value>, candidate: &str) -> bool {
    let Some(items) = options.and_then(Value::as_array) else {
        return false;
    };
    items.iter().any(|item| {
        item.as_str() == Some(candidate)
            || item.get("value").and_then(Value::as_str) == Some(candidate)
    })
}
