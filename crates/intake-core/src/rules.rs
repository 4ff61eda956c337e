//! Interpretation of stored rule-set payloads. A payload is opaque JSON;
//! the rule type decides where the predicate lives and which action payload
//! (assignment or plan) accompanies it.

use crate::expr::Expression;
use crate::model::RuleType;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct ResolvedRule {
    pub predicate: Expression,
    pub assignment: Option<Assignment>,
    pub plan: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Assignment {
    pub key: String,
    pub value: String,
}

pub fn resolve_payload(rule_type: RuleType, payload: &Value) -> ResolvedRule {
    let predicate_source = match rule_type {
        RuleType::Eligibility => payload
            .get("expression")
            .or_else(|| payload.get("criteria"))
            .unwrap_or(payload),
        RuleType::GroupAssignment | RuleType::Scheduling => payload
            .get("when")
            .or_else(|| payload.get("expression"))
            .or_else(|| payload.get("criteria"))
            .unwrap_or(payload),
    };

    ResolvedRule {
        predicate: Expression::parse(predicate_source),
        assignment: match rule_type {
            RuleType::GroupAssignment => extract_assignment(payload),
            _ => None,
        },
        plan: match rule_type {
            RuleType::Scheduling => Some(
                payload
                    .get("plan")
                    .or_else(|| payload.get("schedule"))
                    .unwrap_or(payload)
                    .clone(),
            ),
            _ => None,
        },
    }
}

fn extract_assignment(payload: &Value) -> Option<Assignment> {
    if let Some(assignment) = payload.get("assignment") {
        let key = coerce_string(assignment.get("key")?)?;
        let value = coerce_string(assignment.get("value")?)?;
        return Some(Assignment { key, value });
    }
    let key = coerce_string(payload.get("group_key")?)?;
    let value = coerce_string(payload.get("group_value")?)?;
    Some(Assignment { key, value })
}

/// Assignment keys and values are persisted as text; scalars keep their
/// JSON rendering.
fn coerce_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
