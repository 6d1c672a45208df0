//! Condition expressions for `conditional` steps.
//!
//! Two forms are accepted:
//! - `<lhs> == <rhs>` / `<lhs> != <rhs>`, each side interpolated;
//! - a bare expression, tested for truthiness.

use serde_json::Value;

use crate::context::ExecutionContext;
use crate::interpolate::{has_unresolved, interpolate_str, render};

/// Evaluate `condition` against the context.
pub fn evaluate(condition: &str, ctx: &ExecutionContext) -> bool {
    if let Some((lhs, rhs)) = condition.split_once("!=") {
        return !equals(lhs, rhs, ctx);
    }
    if let Some((lhs, rhs)) = condition.split_once("==") {
        return equals(lhs, rhs, ctx);
    }
    truthy(&interpolate_str(condition.trim(), ctx))
}

fn equals(lhs: &str, rhs: &str, ctx: &ExecutionContext) -> bool {
    let left = operand(lhs, ctx);
    let right = operand(rhs, ctx);
    left == right || render(&left) == render(&right)
}

/// Interpolate one side of a comparison; quoted literals lose their quotes.
fn operand(raw: &str, ctx: &ExecutionContext) -> Value {
    let raw = raw.trim();
    for quote in ['"', '\''] {
        if raw.len() >= 2 && raw.starts_with(quote) && raw.ends_with(quote) {
            return interpolate_str(&raw[1..raw.len() - 1], ctx);
        }
    }
    interpolate_str(raw, ctx)
}

/// Unresolved references, null, false, 0, "", "false" and empty
/// collections are falsy.
pub fn truthy(value: &Value) -> bool {
    if has_unresolved(value) {
        return false;
    }
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |f| f != 0.0),
        Value::String(s) => {
            let s = s.trim();
            !(s.is_empty() || s == "false")
        }
        Value::Array(items) => !items.is_empty(),
        Value::Object(fields) => !fields.is_empty(),
    }
}
