//! `{{path}}` interpolation against an [`ExecutionContext`].
//!
//! Supported paths, in resolution order:
//! - `steps.<name>.<subpath>`: output of a recorded step
//! - `input.<field>` / `input`: validated inputs
//! - `logs`: accumulated log lines
//! - `<name>.<subpath>`: workflow variables
//!
//! A template that is exactly one `{{path}}` yields the resolved value with
//! its JSON type intact. Embedded references are substituted as text;
//! unresolved or null ones are left verbatim.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::{Map, Value};

use crate::context::ExecutionContext;

static WHOLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\{\{\s*([^{}]+?)\s*\}\}$").expect("valid whole-reference regex"));

static EMBEDDED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*([^{}]+?)\s*\}\}").expect("valid reference regex"));

/// Interpolate strings, arrays and objects recursively.
pub fn interpolate(template: &Value, ctx: &ExecutionContext) -> Value {
    match template {
        Value::String(s) => interpolate_str(s, ctx),
        Value::Array(items) => Value::Array(items.iter().map(|v| interpolate(v, ctx)).collect()),
        Value::Object(fields) => Value::Object(
            fields
                .iter()
                .map(|(k, v)| (k.clone(), interpolate(v, ctx)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Interpolate one string, preserving type on a whole-string match.
pub fn interpolate_str(template: &str, ctx: &ExecutionContext) -> Value {
    if let Some(caps) = WHOLE.captures(template) {
        return resolve_path(&caps[1], ctx).unwrap_or_else(|| Value::String(template.to_string()));
    }
    Value::String(interpolate_text(template, ctx))
}

/// Interpolate one string as text; non-string values are rendered as JSON.
pub fn interpolate_text(template: &str, ctx: &ExecutionContext) -> String {
    EMBEDDED
        .replace_all(template, |caps: &Captures| match resolve_path(&caps[1], ctx) {
            None | Some(Value::Null) => caps[0].to_string(),
            Some(Value::String(s)) => s,
            Some(other) => other.to_string(),
        })
        .into_owned()
}

/// True if any string inside `value` still contains a `{{…}}` reference.
pub fn has_unresolved(value: &Value) -> bool {
    match value {
        Value::String(s) => EMBEDDED.is_match(s),
        Value::Array(items) => items.iter().any(has_unresolved),
        Value::Object(fields) => fields.values().any(has_unresolved),
        _ => false,
    }
}

/// Render a value the way it reads inside a template.
pub fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Resolve a dotted path; `None` when any segment is missing.
pub fn resolve_path(path: &str, ctx: &ExecutionContext) -> Option<Value> {
    let mut segments = path.trim().split('.');
    let head = segments.next()?;

    match head {
        "steps" => {
            let name = segments.next()?;
            let output = ctx.step_result(name)?.output.as_ref()?;
            walk(output, segments)
        }
        "input" => walk_map(&ctx.inputs, segments),
        "logs" => {
            let logs = Value::Array(ctx.logs.iter().cloned().map(Value::String).collect());
            walk(&logs, segments)
        }
        name => walk(ctx.variables.get(name)?, segments),
    }
}

fn walk_map<'a>(map: &Map<String, Value>, mut segments: impl Iterator<Item = &'a str>) -> Option<Value> {
    match segments.next() {
        None => Some(Value::Object(map.clone())),
        Some(first) => walk(map.get(first)?, segments),
    }
}

fn walk<'a>(root: &Value, segments: impl Iterator<Item = &'a str>) -> Option<Value> {
    let mut current = root;
    for segment in segments {
        current = match current {
            Value::Object(fields) => fields.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current.clone())
}

// ============================================================
// Unit tests
// ============================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Step, StepKind, StepResult};
    use serde_json::json;

    fn ctx() -> ExecutionContext {
        let inputs = json!({ "user": "ada", "tags": ["x", "y"] });
        let mut ctx = ExecutionContext::new(inputs.as_object().unwrap().clone());
        ctx.step_results.push(StepResult::input(&ctx.inputs.clone()));
        ctx.variables.insert("x".into(), json!(42));
        ctx.variables.insert("profile".into(), json!({ "name": "Ada", "langs": ["en", "fr"] }));
        ctx.logs.push("started".into());

        let fetch = Step {
            name: "fetch".into(),
            kind: StepKind::CallTool {
                tool_name: "get".into(),
                parameters: Value::Null,
                result_variable: None,
            },
        };
        ctx.step_results.push(StepResult::completed(&fetch, json!({ "body": { "id": 7 } })));
        ctx
    }

    #[test]
    fn whole_string_preserves_number_type() {
        assert_eq!(interpolate(&json!("{{x}}"), &ctx()), json!(42));
    }

    #[test]
    fn whole_string_preserves_object_type() {
        assert_eq!(
            interpolate(&json!("{{ steps.fetch.body }}"), &ctx()),
            json!({ "id": 7 })
        );
    }

    #[test]
    fn partial_substitution_renders_text() {
        assert_eq!(
            interpolate(&json!("id={{steps.fetch.body.id}} by {{input.user}}"), &ctx()),
            json!("id=7 by ada")
        );
    }

    #[test]
    fn unresolved_reference_is_left_literal() {
        assert_eq!(
            interpolate(&json!("Hello {{missing}}"), &ctx()),
            json!("Hello {{missing}}")
        );
        assert_eq!(interpolate(&json!("{{missing}}"), &ctx()), json!("{{missing}}"));
    }

    #[test]
    fn input_and_steps_input_are_equivalent() {
        let c = ctx();
        assert_eq!(resolve_path("input.user", &c), resolve_path("steps.input.user", &c));
        assert_eq!(resolve_path("input", &c), Some(json!({ "user": "ada", "tags": ["x", "y"] })));
    }

    #[test]
    fn array_index_and_logs() {
        let c = ctx();
        assert_eq!(resolve_path("profile.langs.1", &c), Some(json!("fr")));
        assert_eq!(resolve_path("logs", &c), Some(json!(["started"])));
        assert_eq!(resolve_path("profile.langs.9", &c), None);
    }

    #[test]
    fn nested_structures_are_interpolated() {
        let out = interpolate(
            &json!({ "who": "{{profile.name}}", "list": ["{{x}}", 3, { "t": "{{input.tags}}" }] }),
            &ctx(),
        );
        assert_eq!(out, json!({ "who": "Ada", "list": [42, 3, { "t": ["x", "y"] }] }));
    }

    #[test]
    fn detects_leftover_references() {
        assert!(has_unresolved(&json!({ "a": ["{{nope}}"] })));
        assert!(!has_unresolved(&json!({ "a": ["done", 1] })));
    }
}
