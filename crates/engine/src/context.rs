//! Per-run mutable state and the value handed back to the caller.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::models::{StepResult, StepStatus};
use crate::EngineError;

// ---------------------------------------------------------------------------
// ExecutionContext
// ---------------------------------------------------------------------------

/// State threaded through one workflow invocation.
///
/// Owned by the driver for the duration of a run; step executors append to
/// `step_results` and `logs` but never replace them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionContext {
    /// Correlates tracing output for this invocation.
    pub run_id: Uuid,
    pub variables: Map<String, Value>,
    /// Validated caller inputs; immutable once the run starts.
    pub inputs: Map<String, Value>,
    pub logs: Vec<String>,
    pub step_results: Vec<StepResult>,
    /// Top-level index of the step currently executing.
    pub current_step: usize,
    /// Once set, the driver stops the loop.
    pub result: Option<Value>,
}

impl ExecutionContext {
    pub fn new(inputs: Map<String, Value>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            variables: Map::new(),
            inputs,
            logs: Vec::new(),
            step_results: Vec::new(),
            current_step: 0,
            result: None,
        }
    }

    /// Latest recorded result for `name`, if the step has run.
    pub fn step_result(&self, name: &str) -> Option<&StepResult> {
        self.step_results.iter().rev().find(|r| r.step == name)
    }

    /// `pending` until the step has run, then its recorded status.
    pub fn step_status(&self, name: &str) -> StepStatus {
        self.step_result(name)
            .map(|r| r.status)
            .unwrap_or(StepStatus::Pending)
    }

    pub(crate) fn record(&mut self, result: StepResult) {
        self.step_results.push(result);
    }

    /// Snapshot for resuming at `start_step`.
    pub fn resume_point(&self, start_step: usize) -> ResumePoint {
        ResumePoint {
            start_step,
            variables: self.variables.clone(),
            step_results: self.step_results.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// ResumePoint
// ---------------------------------------------------------------------------

/// Everything a caller must hand back to continue a suspended run.
///
/// The interpreter keeps no session state between pause and resume.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumePoint {
    pub start_step: usize,
    #[serde(default)]
    pub variables: Map<String, Value>,
    /// Empty means "re-seed the synthetic input entry".
    #[serde(default)]
    pub step_results: Vec<StepResult>,
}

// ---------------------------------------------------------------------------
// RunOutcome
// ---------------------------------------------------------------------------

/// How a call to [`WorkflowExecutor::run`](crate::WorkflowExecutor::run) ended.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// The workflow returned or ran off the end of its steps.
    /// `value` is `None` when no `return` step executed.
    Completed { value: Option<Value>, context: ExecutionContext },
    /// A step handed control to an external agent.
    Suspended {
        /// Top-level index of the pausing step.
        at_step: usize,
        payload: Value,
        resume: ResumePoint,
        context: ExecutionContext,
    },
    /// Validation or a step failed; nothing after the failure ran.
    Failed { error: EngineError, context: ExecutionContext },
}

impl RunOutcome {
    pub fn context(&self) -> &ExecutionContext {
        match self {
            Self::Completed { context, .. }
            | Self::Suspended { context, .. }
            | Self::Failed { context, .. } => context,
        }
    }

    pub fn into_context(self) -> ExecutionContext {
        match self {
            Self::Completed { context, .. }
            | Self::Suspended { context, .. }
            | Self::Failed { context, .. } => context,
        }
    }

    pub fn status(&self) -> &'static str {
        match self {
            Self::Completed { .. } => "completed",
            Self::Suspended { .. } => "suspended",
            Self::Failed { .. } => "failed",
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    pub fn is_suspended(&self) -> bool {
        matches!(self, Self::Suspended { .. })
    }

    pub fn error(&self) -> Option<&EngineError> {
        match self {
            Self::Failed { error, .. } => Some(error),
            _ => None,
        }
    }

    /// JSON rendering for callers that persist or print outcomes.
    pub fn to_json(&self) -> Value {
        let context = serde_json::to_value(self.context()).unwrap_or(Value::Null);
        match self {
            Self::Completed { value, .. } => json!({
                "status": self.status(),
                "value": value,
                "context": context,
            }),
            Self::Suspended { at_step, payload, resume, .. } => json!({
                "status": self.status(),
                "atStep": at_step,
                "payload": payload,
                "resume": resume,
                "context": context,
            }),
            Self::Failed { error, .. } => json!({
                "status": self.status(),
                "error": error.to_string(),
                "context": context,
            }),
        }
    }
}
