//! `engine` crate: the workflow step interpreter.
//!
//! Validates inputs and cross-step references, then runs a definition's
//! typed steps against a mutable [`ExecutionContext`], pausing whenever a
//! step needs an external agent and resuming from a caller-held
//! [`ResumePoint`].

pub mod models;
pub mod error;
pub mod context;
pub mod interpolate;
pub mod schema;
pub mod references;
pub mod condition;
pub mod executor;
mod steps;

pub use models::{
    FieldType, InputField, InputSchema, Step, StepKind, StepResult, StepStatus,
    WorkflowDefinition,
};
pub use error::EngineError;
pub use context::{ExecutionContext, ResumePoint, RunOutcome};
pub use references::validate_references;
pub use schema::validate_inputs;
pub use executor::{Collaborators, ExecutorConfig, WorkflowExecutor};
