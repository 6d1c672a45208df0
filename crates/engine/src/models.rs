//! Core domain models for the workflow interpreter.
//!
//! A [`WorkflowDefinition`] is immutable once loaded. Steps are a genuine
//! sum type ([`StepKind`]) so executor dispatch is checked for
//! exhaustiveness; on the wire they are objects carrying a `type` tag.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::EngineError;

// ---------------------------------------------------------------------------
// Input schema
// ---------------------------------------------------------------------------

/// Declared type of one workflow input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Array,
    Object,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "string"  => Ok(Self::String),
            "number"  => Ok(Self::Number),
            "boolean" => Ok(Self::Boolean),
            "array"   => Ok(Self::Array),
            "object"  => Ok(Self::Object),
            other     => Err(format!("unknown field type: {other}")),
        }
    }
}

/// One named input parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputField {
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Filled in when the caller omits the field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

/// JSON-Schema-shaped description of a workflow's inputs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputSchema {
    #[serde(default)]
    pub properties: BTreeMap<String, InputField>,
    #[serde(default)]
    pub required: Vec<String>,
}

// ---------------------------------------------------------------------------
// Steps
// ---------------------------------------------------------------------------

/// Every `type` tag the interpreter accepts.
pub const KNOWN_STEP_TYPES: &[&str] = &[
    "agent",
    "create_object",
    "load_object",
    "call_tool",
    "call_function",
    "conditional",
    "switch",
    "set_variable",
    "log",
    "return",
    "load_state",
    "save_state",
];

/// A single unit of a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Unique within the definition; the key for `steps.<name>` references.
    pub name: String,
    #[serde(flatten)]
    pub kind: StepKind,
}

/// Kind-specific configuration of a step.
///
/// Required string fields default to empty so a missing one surfaces as
/// [`EngineError::MissingRequiredField`] when the step runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum StepKind {
    /// Hand a list of instructions to an external agent and pause.
    Agent {
        #[serde(default)]
        instructions: Vec<String>,
        /// Ask the sampling gateway for a completion before pausing.
        #[serde(default = "default_true")]
        sample: bool,
    },
    /// Fill an object from a template, pausing if any property is unresolved.
    CreateObject {
        #[serde(default)]
        template_id: String,
        /// Subset of property keys to fill; all object properties when absent.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        properties: Option<Vec<String>>,
        /// property key → literal or `{{reference}}`.
        #[serde(default)]
        mapping: Map<String, Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result_variable: Option<String>,
        #[serde(default)]
        instructions: Vec<String>,
    },
    /// Describe a template's properties to an external agent and pause.
    LoadObject {
        #[serde(default)]
        template_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        properties: Option<Vec<String>>,
        #[serde(default)]
        instructions: Vec<String>,
    },
    #[serde(alias = "call_function")]
    CallTool {
        #[serde(default, alias = "functionName")]
        tool_name: String,
        #[serde(default)]
        parameters: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result_variable: Option<String>,
    },
    Conditional {
        #[serde(default)]
        condition: String,
        #[serde(rename = "then", default)]
        then_steps: Vec<Step>,
        #[serde(rename = "else", default)]
        else_steps: Vec<Step>,
    },
    Switch {
        #[serde(default)]
        switch_value: String,
        #[serde(default)]
        cases: BTreeMap<String, Vec<Step>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default_case: Option<Vec<Step>>,
    },
    SetVariable {
        #[serde(default)]
        variable_name: String,
        #[serde(default)]
        value: Value,
    },
    Log {
        #[serde(default)]
        message: String,
    },
    Return {
        #[serde(default)]
        value: Value,
    },
    LoadState {
        #[serde(default)]
        key: String,
        #[serde(default)]
        default_value: Value,
        #[serde(default)]
        result_variable: String,
    },
    SaveState {
        #[serde(default)]
        key: String,
        #[serde(default)]
        value: Value,
    },
}

fn default_true() -> bool {
    true
}

impl StepKind {
    /// The wire `type` tag of this kind.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Agent { .. } => "agent",
            Self::CreateObject { .. } => "create_object",
            Self::LoadObject { .. } => "load_object",
            Self::CallTool { .. } => "call_tool",
            Self::Conditional { .. } => "conditional",
            Self::Switch { .. } => "switch",
            Self::SetVariable { .. } => "set_variable",
            Self::Log { .. } => "log",
            Self::Return { .. } => "return",
            Self::LoadState { .. } => "load_state",
            Self::SaveState { .. } => "save_state",
        }
    }

    /// Nested step sequences: `then` before `else`; switch cases in key
    /// order, then `defaultCase`.
    pub fn branches(&self) -> Vec<&[Step]> {
        match self {
            Self::Conditional { then_steps, else_steps, .. } => {
                vec![then_steps.as_slice(), else_steps.as_slice()]
            }
            Self::Switch { cases, default_case, .. } => {
                let mut out: Vec<&[Step]> = cases.values().map(Vec::as_slice).collect();
                if let Some(default_case) = default_case {
                    out.push(default_case.as_slice());
                }
                out
            }
            _ => Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// WorkflowDefinition
// ---------------------------------------------------------------------------

/// A complete, immutable workflow definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub input_schema: InputSchema,
    /// Execution order, not display order.
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl WorkflowDefinition {
    /// Convenience constructor for testing.
    pub fn new(name: impl Into<String>, input_schema: InputSchema, steps: Vec<Step>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            input_schema,
            steps,
        }
    }

    /// Parse a definition from JSON text.
    pub fn from_json(raw: &str) -> Result<Self, EngineError> {
        let value: Value = serde_json::from_str(raw)
            .map_err(|e| EngineError::InvalidDefinition(e.to_string()))?;
        Self::from_value(value)
    }

    /// Parse a definition from a JSON value, rejecting unknown step types
    /// (at any nesting depth) before attempting full deserialisation.
    pub fn from_value(value: Value) -> Result<Self, EngineError> {
        if let Some(steps) = value.get("steps") {
            check_step_types(steps)?;
        }
        serde_json::from_value(value).map_err(|e| EngineError::InvalidDefinition(e.to_string()))
    }
}

impl Step {
    /// Parse a single step, with the same type check as [`WorkflowDefinition::from_value`].
    pub fn from_value(value: Value) -> Result<Self, EngineError> {
        check_step(&value)?;
        serde_json::from_value(value).map_err(|e| EngineError::InvalidDefinition(e.to_string()))
    }
}

fn check_step_types(steps: &Value) -> Result<(), EngineError> {
    match steps {
        Value::Array(items) => items.iter().try_for_each(check_step),
        Value::Null => Ok(()),
        _ => Err(EngineError::InvalidDefinition("steps must be an array".into())),
    }
}

fn check_step(step: &Value) -> Result<(), EngineError> {
    let name = step
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or("<unnamed>")
        .to_string();

    let kind = match step.get("type").and_then(Value::as_str) {
        Some(kind) => kind,
        None => {
            return Err(EngineError::InvalidDefinition(format!(
                "step '{name}' has no type"
            )))
        }
    };
    if !KNOWN_STEP_TYPES.contains(&kind) {
        return Err(EngineError::UnknownStepType { step: name, kind: kind.to_string() });
    }

    for key in ["then", "else", "defaultCase"] {
        if let Some(nested) = step.get(key) {
            check_step_types(nested)?;
        }
    }
    if let Some(Value::Object(cases)) = step.get("cases") {
        for nested in cases.values() {
            check_step_types(nested)?;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// StepResult
// ---------------------------------------------------------------------------

/// Lifecycle state of one step within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Completed,
    Failed,
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Name of the synthetic first entry of every run's step results.
pub const INPUT_STEP: &str = "input";

/// Audit record of one finished step. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub step: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StepResult {
    pub fn completed(step: &Step, output: Value) -> Self {
        Self {
            step: step.name.clone(),
            kind: step.kind.type_name().to_string(),
            status: StepStatus::Completed,
            output: Some(output),
            error: None,
        }
    }

    pub fn failed(step: &Step, error: &EngineError) -> Self {
        Self {
            step: step.name.clone(),
            kind: step.kind.type_name().to_string(),
            status: StepStatus::Failed,
            output: None,
            error: Some(error.to_string()),
        }
    }

    /// The synthetic `input` entry that makes `steps.input.<field>` work.
    pub fn input(inputs: &Map<String, Value>) -> Self {
        Self {
            step: INPUT_STEP.to_string(),
            kind: INPUT_STEP.to_string(),
            status: StepStatus::Completed,
            output: Some(Value::Object(inputs.clone())),
            error: None,
        }
    }
}
