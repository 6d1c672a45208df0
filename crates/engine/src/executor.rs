//! Workflow execution driver.
//!
//! `WorkflowExecutor` is the central orchestrator:
//! 1. Validates and normalises inputs against the definition's schema.
//! 2. Validates cross-step references.
//! 3. Builds a fresh context, or rebuilds one from a [`ResumePoint`].
//! 4. Runs top-level steps in order, stopping as soon as one returns,
//!    pauses for an external agent, or fails.
//!
//! Fresh runs and resumes share the same code path; a resume is a run with
//! a starting index and a saved `(variables, stepResults)` snapshot.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{error, field, info, instrument, warn, Span};

use gateways::{SamplingGateway, SchemaProvider, StateStore, ToolCaller};

use crate::context::{ExecutionContext, ResumePoint, RunOutcome};
use crate::models::{StepResult, StepStatus, WorkflowDefinition};
use crate::references::validate_references;
use crate::schema::{inputs_object, validate_inputs};
use crate::EngineError;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tuning knobs for the executor.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Whether `agent` / `load_object` steps consult the sampling gateway.
    pub request_sampling: bool,
    /// Token ceiling passed with every sampling request.
    pub sampling_max_tokens: u32,
    /// Tool invoked when `create_object` has every property it needs.
    pub create_object_tool: String,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            request_sampling: true,
            sampling_max_tokens: 1000,
            create_object_tool: "create_object".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// The external capabilities a run may call into.
#[derive(Clone)]
pub struct Collaborators {
    pub tools: Arc<dyn ToolCaller>,
    pub schemas: Arc<dyn SchemaProvider>,
    pub state: Arc<dyn StateStore>,
    /// Absent means agent steps pause without a sampled result.
    pub sampler: Option<Arc<dyn SamplingGateway>>,
}

// ---------------------------------------------------------------------------
// Control flow between steps
// ---------------------------------------------------------------------------

/// What the driver does after a step finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    Continue,
    /// A `return` step set the result.
    Return,
    /// A step set a pause payload as the result.
    Suspend,
}

// ---------------------------------------------------------------------------
// WorkflowExecutor
// ---------------------------------------------------------------------------

/// Stateless interpreter that runs workflow invocations.
///
/// One executor can serve any number of concurrent runs; each run owns its
/// own [`ExecutionContext`] and nothing is shared between them except the
/// collaborators.
pub struct WorkflowExecutor {
    pub(crate) gateways: Collaborators,
    pub(crate) config: ExecutorConfig,
}

impl WorkflowExecutor {
    /// Create a new executor.
    pub fn new(gateways: Collaborators, config: ExecutorConfig) -> Self {
        Self { gateways, config }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Run a workflow from its first step.
    pub async fn start(&self, workflow: &WorkflowDefinition, inputs: Value) -> RunOutcome {
        self.run(workflow, inputs, None).await
    }

    /// Continue a workflow from a previously returned [`ResumePoint`].
    pub async fn resume(
        &self,
        workflow: &WorkflowDefinition,
        inputs: Value,
        point: ResumePoint,
    ) -> RunOutcome {
        self.run(workflow, inputs, Some(point)).await
    }

    /// Validate, then execute steps until the workflow returns, pauses,
    /// fails, or runs out of steps.
    ///
    /// Validation errors are reported as [`RunOutcome::Failed`] before any
    /// step has run.
    #[instrument(
        skip(self, workflow, inputs, resume),
        fields(workflow = %workflow.name, run_id = field::Empty)
    )]
    pub async fn run(
        &self,
        workflow: &WorkflowDefinition,
        inputs: Value,
        resume: Option<ResumePoint>,
    ) -> RunOutcome {
        let mut context = ExecutionContext::new(Map::new());
        Span::current().record("run_id", field::display(context.run_id));

        // ------------------------------------------------------------------
        // Validate inputs and references, seed or restore the context.
        // ------------------------------------------------------------------
        let start = match prepare(workflow, inputs, resume, &mut context) {
            Ok(start) => start,
            Err(error) => {
                warn!("workflow '{}' rejected before execution: {}", workflow.name, error);
                return RunOutcome::Failed { error, context };
            }
        };

        info!(
            "executing {} of {} steps starting at step {}",
            workflow.steps.len().saturating_sub(start),
            workflow.steps.len(),
            start
        );

        // ------------------------------------------------------------------
        // Execute steps sequentially.
        // ------------------------------------------------------------------
        for (index, step) in workflow.steps.iter().enumerate().skip(start) {
            context.current_step = index;

            match self.execute_step(step, &mut context).await {
                Ok(Flow::Continue) => {}

                Ok(Flow::Return) => {
                    info!("workflow '{}' returned at step '{}'", workflow.name, step.name);
                    let value = context.result.clone();
                    return RunOutcome::Completed { value, context };
                }

                Ok(Flow::Suspend) => {
                    info!(
                        "workflow '{}' suspended at step {} ('{}')",
                        workflow.name, index, step.name
                    );
                    let payload = context.result.clone().unwrap_or(Value::Null);
                    let resume = context.resume_point(index + 1);
                    return RunOutcome::Suspended { at_step: index, payload, resume, context };
                }

                Err(error) => {
                    error!("step '{}' failed: {}", step.name, error);
                    return RunOutcome::Failed { error, context };
                }
            }
        }

        info!("workflow '{}' ran to completion", workflow.name);
        let value = context.result.clone();
        RunOutcome::Completed { value, context }
    }
}

/// Log lines written before the snapshot, recovered from completed `log`
/// step results.
fn replay_logs(results: &[StepResult]) -> Vec<String> {
    results
        .iter()
        .filter(|r| r.kind == "log" && r.status == StepStatus::Completed)
        .filter_map(|r| r.output.as_ref()?.get("message")?.as_str().map(str::to_string))
        .collect()
}

/// Build the starting context and return the index of the first step to run.
fn prepare(
    workflow: &WorkflowDefinition,
    inputs: Value,
    resume: Option<ResumePoint>,
    context: &mut ExecutionContext,
) -> Result<usize, EngineError> {
    let mut inputs = inputs_object(inputs)?;
    validate_inputs(&workflow.input_schema, &mut inputs)?;
    validate_references(workflow)?;
    context.inputs = inputs;

    let start = match resume {
        Some(point) => {
            if point.start_step > workflow.steps.len() {
                return Err(EngineError::InvalidResumePoint {
                    start_step: point.start_step,
                    step_count: workflow.steps.len(),
                });
            }
            context.variables = point.variables;
            context.step_results = point.step_results;
            context.logs = replay_logs(&context.step_results);
            point.start_step
        }
        None => 0,
    };

    if context.step_results.is_empty() {
        let seed = StepResult::input(&context.inputs);
        context.record(seed);
    }
    context.current_step = start;

    Ok(start)
}
