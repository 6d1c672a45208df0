//! Step reference validation: run this before executing a workflow.
//!
//! Rules enforced:
//! 1. Step names are unique across the definition, nested steps included.
//! 2. Every `{{steps.<name>...}}` in a step's structured fields names a
//!    step defined earlier (or the synthetic `input` entry).
//!
//! Branches of one `conditional` / `switch` are mutually exclusive: a step
//! inside one branch cannot see steps of a sibling branch. Steps after the
//! parent may reference any of them.
//!
//! Log messages are free text and are not scanned.
//!
//! Returns every step name in definition order on success.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::models::{Step, StepKind, WorkflowDefinition, INPUT_STEP};
use crate::EngineError;

static STEP_REFERENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{\s*steps\.([^.{}\s]+)[.\s}]").expect("valid step reference regex")
});

/// Validate cross-step references and return step names in definition order.
///
/// # Errors
/// - [`EngineError::DuplicateStepName`] if two steps share a name.
/// - [`EngineError::UnknownStepReference`] if a step refers forward or to
///   a step that does not exist.
pub fn validate_references(workflow: &WorkflowDefinition) -> Result<Vec<String>, EngineError> {
    let mut available: HashSet<String> = HashSet::from([INPUT_STEP.to_string()]);
    let mut seen = available.clone();
    let mut order = Vec::new();
    check_sequence(&workflow.steps, &mut available, &mut seen, &mut order)?;
    Ok(order)
}

/// `available` is what the current scope may reference; `seen` is every
/// name visited so far, across all branches.
fn check_sequence(
    steps: &[Step],
    available: &mut HashSet<String>,
    seen: &mut HashSet<String>,
    order: &mut Vec<String>,
) -> Result<(), EngineError> {
    for step in steps {
        for reference in step_references(step) {
            if !available.contains(&reference) {
                return Err(EngineError::UnknownStepReference {
                    step: step.name.clone(),
                    reference,
                });
            }
        }

        let mut nested = Vec::new();
        for branch in step.kind.branches() {
            let mut scope = available.clone();
            check_sequence(branch, &mut scope, seen, order)?;
            nested.extend(scope.into_iter().filter(|name| !available.contains(name)));
        }
        available.extend(nested);

        if !seen.insert(step.name.clone()) {
            return Err(EngineError::DuplicateStepName(step.name.clone()));
        }
        available.insert(step.name.clone());
        order.push(step.name.clone());
    }
    Ok(())
}

/// Names of all steps referenced by this step's own structured fields.
fn step_references(step: &Step) -> Vec<String> {
    let mut found = Vec::new();
    let mut scan_str = |s: &str| {
        for caps in STEP_REFERENCE.captures_iter(s) {
            found.push(caps[1].to_string());
        }
    };

    match &step.kind {
        StepKind::Log { .. } => {}
        StepKind::Agent { instructions, .. } => instructions.iter().for_each(|s| scan_str(s)),
        StepKind::CreateObject { template_id, mapping, instructions, .. } => {
            scan_str(template_id);
            mapping.values().for_each(|v| scan_value(v, &mut scan_str));
            instructions.iter().for_each(|s| scan_str(s));
        }
        StepKind::LoadObject { template_id, instructions, .. } => {
            scan_str(template_id);
            instructions.iter().for_each(|s| scan_str(s));
        }
        StepKind::CallTool { tool_name, parameters, .. } => {
            scan_str(tool_name);
            scan_value(parameters, &mut scan_str);
        }
        StepKind::Conditional { condition, .. } => scan_str(condition),
        StepKind::Switch { switch_value, .. } => scan_str(switch_value),
        StepKind::SetVariable { value, .. } | StepKind::Return { value } => {
            scan_value(value, &mut scan_str)
        }
        StepKind::LoadState { key, default_value, .. } => {
            scan_str(key);
            scan_value(default_value, &mut scan_str);
        }
        StepKind::SaveState { key, value } => {
            scan_str(key);
            scan_value(value, &mut scan_str);
        }
    }

    found
}

fn scan_value(value: &Value, scan_str: &mut impl FnMut(&str)) {
    match value {
        Value::String(s) => scan_str(s),
        Value::Array(items) => items.iter().for_each(|v| scan_value(v, scan_str)),
        Value::Object(fields) => fields.values().for_each(|v| scan_value(v, scan_str)),
        _ => {}
    }
}
