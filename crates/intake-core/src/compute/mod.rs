//! Compute engine: evaluates a study's named compute definitions against a
//! submission context with lazy, memoised, cycle-detecting resolution.

pub mod funcs;

use crate::context::EvaluationContext;
use crate::expr::{self, Expression, MAX_DEPTH};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("compute dependency cycle at '{0}'")]
    Cycle(String),
}

#[derive(Debug, Clone)]
pub enum ComputeExpression {
    Var(String),
    Literal(Value),
    Call {
        func: Func,
        args: Vec<ComputeExpression>,
    },
    Arith {
        op: ArithOp,
        args: Vec<ComputeExpression>,
    },
    /// Guarded value: `then` when the predicate holds, `else` (or null)
    /// otherwise.
    When {
        predicate: Expression,
        then: Box<ComputeExpression>,
        otherwise: Option<Box<ComputeExpression>>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Func {
    Midpoint,
    Duration,
    AddDays,
    NormalizeTime,
    Unknown,
}

impl Func {
    pub fn parse(s: &str) -> Self {
        match s {
            "midpoint" => Func::Midpoint,
            "duration" => Func::Duration,
            "add_days" => Func::AddDays,
            "normalize_time" => Func::NormalizeTime,
            _ => Func::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Unknown,
}

impl ArithOp {
    pub fn parse(s: &str) -> Self {
        match s {
            "add" => ArithOp::Add,
            "subtract" => ArithOp::Subtract,
            "multiply" => ArithOp::Multiply,
            "divide" => ArithOp::Divide,
            _ => ArithOp::Unknown,
        }
    }
}

impl ComputeExpression {
    pub fn parse(v: &Value) -> ComputeExpression {
        if let Some(obj) = v.as_object() {
            if let Some(path) = obj.get("var").and_then(Value::as_str) {
                return ComputeExpression::Var(path.to_string());
            }
            if let Some(value) = obj.get("value") {
                return ComputeExpression::Literal(value.clone());
            }
            if let Some(func) = obj.get("func").and_then(Value::as_str) {
                return ComputeExpression::Call {
                    func: Func::parse(func),
                    args: parse_args(obj.get("args")),
                };
            }
            if let Some(op) = obj.get("op").and_then(Value::as_str) {
                return ComputeExpression::Arith {
                    op: ArithOp::parse(op),
                    args: parse_args(obj.get("args")),
                };
            }
            if let Some(predicate) = obj.get("when") {
                return ComputeExpression::When {
                    predicate: Expression::parse(predicate),
                    then: Box::new(
                        obj.get("then")
                            .map(ComputeExpression::parse)
                            .unwrap_or(ComputeExpression::Literal(Value::Null)),
                    ),
                    otherwise: obj
                        .get("else")
                        .map(|e| Box::new(ComputeExpression::parse(e))),
                };
            }
        }
        ComputeExpression::Literal(v.clone())
    }
}

fn parse_args(v: Option<&Value>) -> Vec<ComputeExpression> {
    v.and_then(Value::as_array)
        .map(|items| items.iter().map(ComputeExpression::parse).collect())
        .unwrap_or_default()
}

/// Resolves every definition in insertion order and returns the ordered
/// `{key → value}` pairs plus the context with its `computed` scope filled,
/// ready for rule evaluation.
pub fn resolve_all(
    definitions: &[(String, ComputeExpression)],
    ctx: EvaluationContext,
) -> Result<(Vec<(String, Value)>, EvaluationContext), ComputeError> {
    let mut resolution = Resolution {
        index: definitions
            .iter()
            .enumerate()
            .map(|(i, (key, _))| (key.as_str(), i))
            .collect(),
        definitions,
        ctx,
        visiting: HashSet::new(),
    };
    let mut ordered = Vec::with_capacity(definitions.len());
    for (key, _) in definitions {
        let value = resolution.resolve_key(key, 0)?;
        ordered.push((key.clone(), value));
    }
    Ok((ordered, resolution.ctx))
}

struct Resolution<'a> {
    definitions: &'a [(String, ComputeExpression)],
    index: HashMap<&'a str, usize>,
    ctx: EvaluationContext,
    visiting: HashSet<String>,
}

impl Resolution<'_> {
    fn resolve_key(&mut self, key: &str, depth: usize) -> Result<Value, ComputeError> {
        if let Some(memoised) = self.ctx.computed.get(key) {
            return Ok(memoised.clone());
        }
        let Some(&i) = self.index.get(key) else {
            return Ok(Value::Null);
        };
        if !self.visiting.insert(key.to_string()) {
            return Err(ComputeError::Cycle(key.to_string()));
        }
        let expression = self.definitions[i].1.clone();
        let value = self.evaluate(&expression, depth)?;
        self.visiting.remove(key);
        self.ctx.computed.insert(key.to_string(), value.clone());
        Ok(value)
    }

    fn evaluate(&mut self, expr: &ComputeExpression, depth: usize) -> Result<Value, ComputeError> {
        if depth > MAX_DEPTH {
            return Ok(Value::Null);
        }
        match expr {
            ComputeExpression::Literal(v) => Ok(v.clone()),
            ComputeExpression::Var(path) => {
                // A `computed.` path whose key has not been memoised yet is
                // resolved on demand; cycles surface here.
                if let Some(rest) = path.strip_prefix("computed.") {
                    let key = rest.split('.').next().unwrap_or(rest);
                    if !self.ctx.computed.contains_key(key) && self.index.contains_key(key) {
                        self.resolve_key(key, depth + 1)?;
                    }
                }
                Ok(self.ctx.resolve(path).cloned().unwrap_or(Value::Null))
            }
            ComputeExpression::Call { func, args } => {
                let args = self.evaluate_args(args, depth)?;
                Ok(match func {
                    Func::Midpoint => funcs::midpoint(&args),
                    Func::Duration => funcs::duration(&args),
                    Func::AddDays => funcs::add_days(&args),
                    Func::NormalizeTime => funcs::normalize_time(&args),
                    Func::Unknown => Value::Null,
                })
            }
            ComputeExpression::Arith { op, args } => {
                let args = self.evaluate_args(args, depth)?;
                Ok(fold_arith(*op, &args))
            }
            ComputeExpression::When {
                predicate,
                then,
                otherwise,
            } => {
                if expr::evaluate(predicate, &self.ctx) {
                    self.evaluate(then, depth + 1)
                } else if let Some(otherwise) = otherwise {
                    self.evaluate(otherwise, depth + 1)
                } else {
                    Ok(Value::Null)
                }
            }
        }
    }

    fn evaluate_args(
        &mut self,
        args: &[ComputeExpression],
        depth: usize,
    ) -> Result<Vec<Value>, ComputeError> {
        args.iter()
            .map(|a| self.evaluate(a, depth + 1))
            .collect()
    }
}

/// `add` and `multiply` fold over every argument; `subtract` and `divide`
/// fold from the head (`a - b - c`). Any non-numeric argument or non-finite
/// result is null.
fn fold_arith(op: ArithOp, args: &[Value]) -> Value {
    let numbers: Option<Vec<f64>> = args.iter().map(funcs::to_number).collect();
    let Some(numbers) = numbers else {
        return Value::Null;
    };
    let Some((&head, rest)) = numbers.split_first() else {
        return Value::Null;
    };
    let folded = match op {
        ArithOp::Add => rest.iter().fold(head, |acc, n| acc + n),
        ArithOp::Subtract => rest.iter().fold(head, |acc, n| acc - n),
        ArithOp::Multiply => rest.iter().fold(head, |acc, n| acc * n),
        ArithOp::Divide => rest.iter().fold(head, |acc, n| acc / n),
        ArithOp::Unknown => return Value::Null,
    };
    if !folded.is_finite() {
        return Value::Null;
    }
    number_value(folded)
}

fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < (i64::MAX as f64) {
        serde_json::json!(n as i64)
    } else {
        serde_json::json!(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse_defs(defs: &[(&str, Value)]) -> Vec<(String, ComputeExpression)> {
        defs.iter()
            .map(|(k, v)| (k.to_string(), ComputeExpression::parse(v)))
            .collect()
    }

    fn sleep_ctx() -> EvaluationContext {
        EvaluationContext::new(
            json!({ "sleep_start": "22:00", "sleep_end": "06:00" })
                .as_object()
                .unwrap()
                .clone(),
            Default::default(),
        )
    }

    #[test]
    fn resolves_a_dependency_graph_in_insertion_order() {
        let defs = parse_defs(&[
            (
                "sleep_duration",
                json!({ "func": "duration", "args": [
                    { "var": "answers.sleep_start" }, { "var": "answers.sleep_end" }
                ]}),
            ),
            (
                "sleep_midpoint",
                json!({ "func": "midpoint", "args": [{ "value": "22:00" }, { "value": "06:00" }] }),
            ),
            (
                "sleep_midpoint_normalized",
                json!({ "func": "normalize_time", "args": [{ "var": "computed.sleep_midpoint" }] }),
            ),
            (
                "follow_up_date",
                json!({ "func": "add_days", "args": [{ "value": "2026-02-13" }, { "value": 7 }] }),
            ),
            (
                "double_duration",
                json!({ "op": "multiply", "args": [
                    { "var": "computed.sleep_duration" }, { "value": 2 }
                ]}),
            ),
        ]);

        let (ordered, ctx) = resolve_all(&defs, sleep_ctx()).unwrap();
        let keys: Vec<&str> = ordered.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(
            keys,
            [
                "sleep_duration",
                "sleep_midpoint",
                "sleep_midpoint_normalized",
                "follow_up_date",
                "double_duration"
            ]
        );
        assert_eq!(ctx.computed["sleep_duration"], json!(480));
        assert_eq!(ctx.computed["sleep_midpoint"], json!("02:00"));
        assert_eq!(ctx.computed["sleep_midpoint_normalized"], json!("02:00"));
        assert_eq!(ctx.computed["follow_up_date"], json!("2026-02-20"));
        assert_eq!(ctx.computed["double_duration"], json!(960));
    }

    #[test]
    fn forward_references_resolve_on_demand() {
        let defs = parse_defs(&[
            (
                "double",
                json!({ "op": "multiply", "args": [{ "var": "computed.base" }, 2] }),
            ),
            ("base", json!({ "value": 21 })),
        ]);
        let (ordered, _) = resolve_all(&defs, sleep_ctx()).unwrap();
        assert_eq!(ordered[0], ("double".to_string(), json!(42)));
    }

    #[test]
    fn compute_is_idempotent() {
        let defs = parse_defs(&[
            (
                "sleep_duration",
                json!({ "func": "duration", "args": [
                    { "var": "answers.sleep_start" }, { "var": "answers.sleep_end" }
                ]}),
            ),
            (
                "double",
                json!({ "op": "multiply", "args": [{ "var": "computed.sleep_duration" }, 2] }),
            ),
        ]);
        let (first, _) = resolve_all(&defs, sleep_ctx()).unwrap();
        let (second, _) = resolve_all(&defs, sleep_ctx()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn cycles_fail_with_the_offending_key() {
        let defs = parse_defs(&[
            ("a", json!({ "op": "add", "args": [{ "var": "computed.b" }, 1] })),
            ("b", json!({ "op": "add", "args": [{ "var": "computed.a" }, 1] })),
        ]);
        let err = resolve_all(&defs, sleep_ctx()).unwrap_err();
        let ComputeError::Cycle(key) = err;
        assert!(key == "a" || key == "b");
    }

    #[test]
    fn arithmetic_folds_from_the_head() {
        let eval = |v: Value| {
            let defs = parse_defs(&[("x", v)]);
            resolve_all(&defs, sleep_ctx()).unwrap().0.remove(0).1
        };
        assert_eq!(eval(json!({ "op": "add", "args": [1, 2, 3] })), json!(6));
        assert_eq!(
            eval(json!({ "op": "subtract", "args": [10, 3, 2] })),
            json!(5)
        );
        assert_eq!(
            eval(json!({ "op": "divide", "args": [100, 5, 2] })),
            json!(10)
        );
        assert_eq!(eval(json!({ "op": "divide", "args": [1, 0] })), Value::Null);
        assert_eq!(
            eval(json!({ "op": "add", "args": [1, "oops"] })),
            Value::Null
        );
        assert_eq!(eval(json!({ "op": "add", "args": ["2", 3] })), json!(5));
    }

    #[test]
    fn when_clauses_route_through_the_expression_evaluator() {
        let defs = parse_defs(&[(
            "night_owl",
            json!({
                "when": { "op": ">=", "left": { "var": "computed.sleep_duration" }, "right": 480 },
                "then": { "value": "yes" },
                "else": { "value": "no" }
            }),
        )]);
        let mut ctx = sleep_ctx();
        ctx.computed.insert("sleep_duration".into(), json!(480));
        let (ordered, _) = resolve_all(&defs, ctx).unwrap();
        assert_eq!(ordered[0].1, json!("yes"));
    }

    #[test]
    fn unknown_functions_and_keys_are_null() {
        let defs = parse_defs(&[
            ("a", json!({ "func": "frobnicate", "args": [1] })),
            ("b", json!({ "var": "computed.undefined_key" })),
        ]);
        let (ordered, _) = resolve_all(&defs, sleep_ctx()).unwrap();
        assert_eq!(ordered[0].1, Value::Null);
        assert_eq!(ordered[1].1, Value::Null);
    }
}
