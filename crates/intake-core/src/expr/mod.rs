//! Expression evaluator: a total, pure predicate over an
//! [`EvaluationContext`]. Trees arrive as opaque JSON and are parsed into
//! tagged variants before evaluation; anything malformed evaluates to false
//! rather than erroring.

pub mod compare;

use crate::context::EvaluationContext;
use compare::{compare, to_comparable};
use serde_json::Value;
use std::cmp::Ordering;

/// Author-supplied trees are recursive; past this depth evaluation bails out
/// with `false` instead of risking the stack.
pub const MAX_DEPTH: usize = 64;

#[derive(Debug, Clone)]
pub enum Expression {
    All(Vec<Expression>),
    Any(Vec<Expression>),
    Not(Box<Expression>),
    Leaf(Leaf),
    /// Unrecognized input. Always false.
    Invalid,
}

#[derive(Debug, Clone)]
pub struct Leaf {
    pub op: Op,
    pub left: Option<Operand>,
    pub right: Option<Operand>,
    pub min: Option<Operand>,
    pub max: Option<Operand>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    In,
    NotIn,
    Between,
    Exists,
    Unknown,
}

impl Op {
    pub fn parse(s: &str) -> Self {
        match s {
            "==" => Op::Eq,
            "!=" => Op::Ne,
            ">" => Op::Gt,
            ">=" => Op::Ge,
            "<" => Op::Lt,
            "<=" => Op::Le,
            "in" => Op::In,
            "not_in" => Op::NotIn,
            "between" => Op::Between,
            "exists" => Op::Exists,
            _ => Op::Unknown,
        }
    }
}

/// `{var}`, `{value}` and bare literals all appear as operands.
#[derive(Debug, Clone)]
pub enum Operand {
    Var(String),
    Value(Value),
}

impl Operand {
    pub fn from_value(v: &Value) -> Self {
        if let Some(obj) = v.as_object() {
            if let Some(path) = obj.get("var").and_then(Value::as_str) {
                return Operand::Var(path.to_string());
            }
            if let Some(value) = obj.get("value") {
                return Operand::Value(value.clone());
            }
        }
        Operand::Value(v.clone())
    }

    /// `None` means unresolved (missing path), which is distinct from an
    /// explicit JSON null.
    pub fn resolve<'a>(&'a self, ctx: &'a EvaluationContext) -> Option<&'a Value> {
        match self {
            Operand::Var(path) => ctx.resolve(path),
            Operand::Value(v) => Some(v),
        }
    }
}

impl Expression {
    pub fn parse(v: &Value) -> Expression {
        let Some(obj) = v.as_object() else {
            return Expression::Invalid;
        };
        if let Some(children) = obj.get("all").and_then(Value::as_array) {
            return Expression::All(children.iter().map(Expression::parse).collect());
        }
        if let Some(children) = obj.get("any").and_then(Value::as_array) {
            return Expression::Any(children.iter().map(Expression::parse).collect());
        }
        if let Some(inner) = obj.get("not") {
            return Expression::Not(Box::new(Expression::parse(inner)));
        }
        if let Some(op) = obj.get("op").and_then(Value::as_str) {
            let op = Op::parse(op);
            // `value` stands in for a missing `left` on exists checks and for
            // a missing `right` everywhere else.
            let spare = obj.get("value");
            let left = obj
                .get("left")
                .or(if op == Op::Exists { spare } else { None })
                .map(Operand::from_value);
            let right = obj
                .get("right")
                .or(if op == Op::Exists { None } else { spare })
                .map(Operand::from_value);
            return Expression::Leaf(Leaf {
                op,
                left,
                right,
                min: obj.get("min").map(Operand::from_value),
                max: obj.get("max").map(Operand::from_value),
            });
        }
        Expression::Invalid
    }
}

/// Evaluates an expression against a context. Total: never panics, never
/// errors, unknown constructs are false.
pub fn evaluate(expr: &Expression, ctx: &EvaluationContext) -> bool {
    evaluate_at(expr, ctx, 0)
}

fn evaluate_at(expr: &Expression, ctx: &EvaluationContext, depth: usize) -> bool {
    if depth > MAX_DEPTH {
        return false;
    }
    match expr {
        Expression::All(children) => children.iter().all(|c| evaluate_at(c, ctx, depth + 1)),
        Expression::Any(children) => children.iter().any(|c| evaluate_at(c, ctx, depth + 1)),
        Expression::Not(inner) => !evaluate_at(inner, ctx, depth + 1),
        Expression::Leaf(leaf) => evaluate_leaf(leaf, ctx),
        Expression::Invalid => false,
    }
}

fn evaluate_leaf(leaf: &Leaf, ctx: &EvaluationContext) -> bool {
    let left = leaf.left.as_ref().and_then(|o| o.resolve(ctx));
    match leaf.op {
        Op::Exists => is_present(left),
        Op::Eq => values_equal(left, leaf.right.as_ref().and_then(|o| o.resolve(ctx))),
        Op::Ne => !values_equal(left, leaf.right.as_ref().and_then(|o| o.resolve(ctx))),
        Op::Gt | Op::Ge | Op::Lt | Op::Le => {
            let right = leaf.right.as_ref().and_then(|o| o.resolve(ctx));
            let ordering = compare(
                left.and_then(to_comparable),
                right.and_then(to_comparable),
            );
            match (leaf.op, ordering) {
                (Op::Gt, Some(Ordering::Greater)) => true,
                (Op::Ge, Some(Ordering::Greater | Ordering::Equal)) => true,
                (Op::Lt, Some(Ordering::Less)) => true,
                (Op::Le, Some(Ordering::Less | Ordering::Equal)) => true,
                _ => false,
            }
        }
        Op::In => is_member(left, leaf.right.as_ref(), ctx),
        Op::NotIn => !is_member(left, leaf.right.as_ref(), ctx),
        Op::Between => {
            let value = left.and_then(to_comparable);
            let min = leaf
                .min
                .as_ref()
                .and_then(|o| o.resolve(ctx))
                .and_then(to_comparable);
            let max = leaf
                .max
                .as_ref()
                .and_then(|o| o.resolve(ctx))
                .and_then(to_comparable);
            matches!(
                compare(value.clone(), min),
                Some(Ordering::Greater | Ordering::Equal)
            ) && matches!(compare(value, max), Some(Ordering::Less | Ordering::Equal))
        }
        Op::Unknown => false,
    }
}

/// Strict equality. Two missing operands are equal; missing never equals
/// anything resolved (including null). Numbers compare numerically so 24
/// and 24.0 agree.
fn values_equal(a: Option<&Value>, b: Option<&Value>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(x), Some(y)) => json_equal(x, y),
        _ => false,
    }
}

fn json_equal(a: &Value, b: &Value) -> bool {
    if let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) {
        return x == y;
    }
    a == b
}

/// A non-sequence right operand is treated as the empty sequence, so `in`
/// is false and `not_in` is true.
fn is_member(left: Option<&Value>, right: Option<&Operand>, ctx: &EvaluationContext) -> bool {
    let Some(items) = right
        .and_then(|o| o.resolve(ctx))
        .and_then(Value::as_array)
    else {
        return false;
    };
    items.iter().any(|item| values_equal(left, Some(item)))
}

fn is_present(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(_) => true,
    }
}
