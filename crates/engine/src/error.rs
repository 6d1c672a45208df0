//! Engine-level error types.

use gateways::GatewayError;
use thiserror::Error;

/// Errors produced by the workflow interpreter (validation + execution).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    // ------ Definition errors ------

    /// A step (possibly nested) declares a `type` the interpreter does not know.
    #[error("step '{step}' has unknown type '{kind}'")]
    UnknownStepType { step: String, kind: String },

    /// The definition JSON is structurally wrong.
    #[error("invalid workflow definition: {0}")]
    InvalidDefinition(String),

    // ------ Validation errors ------

    /// Inputs were not a JSON object.
    #[error("workflow inputs must be a JSON object, got {0}")]
    InvalidInputs(&'static str),

    /// A required input is absent and has no default.
    #[error("missing required input '{0}'")]
    MissingInput(String),

    /// An input does not match its declared type.
    #[error("input '{field}' must be of type {expected}")]
    TypeMismatch { field: String, expected: &'static str },

    /// Two steps share a name.
    #[error("duplicate step name: '{0}'")]
    DuplicateStepName(String),

    /// A step refers to `steps.<name>` before `<name>` is defined.
    #[error("step '{step}' references unknown or later step '{reference}'")]
    UnknownStepReference { step: String, reference: String },

    /// The resume index lies past the end of the step list.
    #[error("cannot resume at step {start_step}: workflow has {step_count} steps")]
    InvalidResumePoint { start_step: usize, step_count: usize },

    // ------ Execution errors ------

    /// A step is missing a field its kind requires.
    #[error("step '{step}' is missing required field '{field}'")]
    MissingRequiredField { step: String, field: &'static str },

    /// The external tool reported an error.
    #[error("step '{step}' failed calling tool '{tool}': {source}")]
    ToolCallFailed {
        step: String,
        tool: String,
        #[source]
        source: GatewayError,
    },

    /// Persisting state failed; this is never absorbed.
    #[error("step '{step}' failed saving state key '{key}': {source}")]
    StateSaveFailed {
        step: String,
        key: String,
        #[source]
        source: GatewayError,
    },

    /// The schema provider could not describe a template.
    #[error("step '{step}' could not load template '{template_id}': {source}")]
    SchemaLookupFailed {
        step: String,
        template_id: String,
        #[source]
        source: GatewayError,
    },
}

impl EngineError {
    /// True for errors raised before any step ran.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::UnknownStepType { .. }
                | Self::InvalidDefinition(_)
                | Self::InvalidInputs(_)
                | Self::MissingInput(_)
                | Self::TypeMismatch { .. }
                | Self::DuplicateStepName(_)
                | Self::UnknownStepReference { .. }
                | Self::InvalidResumePoint { .. }
        )
    }
}
