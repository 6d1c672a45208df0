//! Step executors: one handler per [`StepKind`].
//!
//! Every handler returns the [`Flow`] the driver should follow plus the
//! output recorded in the step's [`StepResult`]. Any error marks the step
//! `failed` and aborts the run; only `load_state` lookups and sampling
//! degrade to a default instead.

use std::future::Future;
use std::pin::Pin;

use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use gateways::PropertyDefinition;

use crate::condition::evaluate;
use crate::context::ExecutionContext;
use crate::executor::{Flow, WorkflowExecutor};
use crate::interpolate::{has_unresolved, interpolate, interpolate_str, interpolate_text, render};
use crate::models::{Step, StepKind, StepResult};
use crate::EngineError;

type SequenceFuture<'a> = Pin<Box<dyn Future<Output = Result<Flow, EngineError>> + Send + 'a>>;

fn require<'a>(step: &Step, value: &'a str, field: &'static str) -> Result<&'a str, EngineError> {
    if value.trim().is_empty() {
        return Err(EngineError::MissingRequiredField { step: step.name.clone(), field });
    }
    Ok(value)
}

fn property_schema(property: &PropertyDefinition) -> Value {
    json!({
        "key": property.key,
        "type": property.property_type,
        "description": property.description,
        "required": property.required,
    })
}

impl WorkflowExecutor {
    /// Run a nested step sequence; a pause or return inside it propagates
    /// upward immediately.
    pub(crate) fn run_sequence<'a>(
        &'a self,
        steps: &'a [Step],
        ctx: &'a mut ExecutionContext,
    ) -> SequenceFuture<'a> {
        Box::pin(async move {
            for step in steps {
                match self.execute_step(step, ctx).await? {
                    Flow::Continue => {}
                    halted => return Ok(halted),
                }
            }
            Ok(Flow::Continue)
        })
    }

    /// Execute one step and record its result.
    pub(crate) async fn execute_step(
        &self,
        step: &Step,
        ctx: &mut ExecutionContext,
    ) -> Result<Flow, EngineError> {
        debug!(step = %step.name, kind = step.kind.type_name(), "executing step");

        match self.dispatch(step, ctx).await {
            Ok((flow, output)) => {
                ctx.record(StepResult::completed(step, output));
                Ok(flow)
            }
            Err(error) => {
                ctx.record(StepResult::failed(step, &error));
                Err(error)
            }
        }
    }

    async fn dispatch(
        &self,
        step: &Step,
        ctx: &mut ExecutionContext,
    ) -> Result<(Flow, Value), EngineError> {
        match &step.kind {
            StepKind::Log { message } => {
                let text = interpolate_text(require(step, message, "message")?, ctx);
                ctx.logs.push(text.clone());
                Ok((Flow::Continue, json!({ "message": text })))
            }

            StepKind::SetVariable { variable_name, value } => {
                let name = require(step, variable_name, "variableName")?;
                let resolved = interpolate(value, ctx);
                ctx.variables.insert(name.to_string(), resolved.clone());
                Ok((Flow::Continue, resolved))
            }

            StepKind::Return { value } => {
                let resolved = interpolate(value, ctx);
                ctx.result = Some(resolved.clone());
                Ok((Flow::Return, resolved))
            }

            StepKind::CallTool { tool_name, parameters, result_variable } => {
                let tool = interpolate_text(require(step, tool_name, "toolName")?, ctx);
                let params = match interpolate(parameters, ctx) {
                    Value::Null => json!({}),
                    other => other,
                };

                let output = self
                    .gateways
                    .tools
                    .call_tool(&tool, params)
                    .await
                    .map_err(|source| EngineError::ToolCallFailed {
                        step: step.name.clone(),
                        tool: tool.clone(),
                        source,
                    })?;

                if let Some(var) = result_variable.as_deref().filter(|v| !v.is_empty()) {
                    ctx.variables.insert(var.to_string(), output.clone());
                }
                Ok((Flow::Continue, output))
            }

            StepKind::LoadState { key, default_value, result_variable } => {
                let key = interpolate_text(require(step, key, "key")?, ctx);
                let var = require(step, result_variable, "resultVariable")?;

                let (value, found) = match self.gateways.state.get(&key).await {
                    Ok(Some(value)) => (value, true),
                    Ok(None) => (interpolate(default_value, ctx), false),
                    Err(e) => {
                        warn!(step = %step.name, "state lookup for '{}' failed, using default: {}", key, e);
                        (interpolate(default_value, ctx), false)
                    }
                };

                ctx.variables.insert(var.to_string(), value.clone());
                Ok((Flow::Continue, json!({ "key": key, "value": value, "found": found })))
            }

            StepKind::SaveState { key, value } => {
                let key = interpolate_text(require(step, key, "key")?, ctx);
                let value = interpolate(value, ctx);

                self.gateways
                    .state
                    .set(&key, value.clone())
                    .await
                    .map_err(|source| EngineError::StateSaveFailed {
                        step: step.name.clone(),
                        key: key.clone(),
                        source,
                    })?;
                Ok((Flow::Continue, json!({ "key": key, "value": value })))
            }

            StepKind::Conditional { condition, then_steps, else_steps } => {
                let matched = evaluate(require(step, condition, "condition")?, ctx);
                let branch = if matched { then_steps } else { else_steps };
                let flow = self.run_sequence(branch, ctx).await?;
                Ok((
                    flow,
                    json!({ "condition": matched, "branch": if matched { "then" } else { "else" } }),
                ))
            }

            StepKind::Switch { switch_value, cases, default_case } => {
                let value = render(&interpolate_str(require(step, switch_value, "switchValue")?, ctx));
                let selected = match cases.get(&value) {
                    Some(steps) => Some((Value::String(value.clone()), steps)),
                    None => default_case.as_ref().map(|steps| (json!("default"), steps)),
                };

                let (case, flow) = match selected {
                    Some((case, steps)) => (case, self.run_sequence(steps, ctx).await?),
                    None => (Value::Null, Flow::Continue),
                };
                Ok((flow, json!({ "value": value, "case": case })))
            }

            StepKind::Agent { instructions, sample } => {
                if instructions.is_empty() {
                    return Err(EngineError::MissingRequiredField {
                        step: step.name.clone(),
                        field: "instructions",
                    });
                }
                let instructions: Vec<String> =
                    instructions.iter().map(|i| interpolate_text(i, ctx)).collect();

                let sampled = if *sample {
                    self.sample(step, &instructions.join("\n")).await
                } else {
                    None
                };

                let payload = json!({
                    "type": "agent_instructions",
                    "step": step.name,
                    "instructions": instructions,
                    "samplingResult": sampled,
                    "currentStep": ctx.current_step,
                    "resumeFrom": ctx.current_step + 1,
                    "message": format!(
                        "Complete the instructions above, then resume the workflow at step {}.",
                        ctx.current_step + 1
                    ),
                });
                ctx.result = Some(payload);

                // Recorded as completed whether or not sampling produced text.
                Ok((
                    Flow::Suspend,
                    json!({ "instructions": instructions, "samplingResult": sampled }),
                ))
            }

            StepKind::LoadObject { template_id, properties, instructions } => {
                let template = interpolate_text(require(step, template_id, "templateId")?, ctx);
                let props = self.object_properties(step, &template, properties.as_deref()).await?;

                let mut instructions: Vec<String> =
                    instructions.iter().map(|i| interpolate_text(i, ctx)).collect();
                if instructions.is_empty() {
                    instructions.push(format!(
                        "Provide values for the following properties of '{template}'."
                    ));
                }

                let mut prompt = instructions.join("\n");
                for p in &props {
                    prompt.push_str(&format!("\n- {} ({}): {}", p.key, p.property_type, p.description));
                }
                let sampled = self.sample(step, &prompt).await;

                let schemas: Vec<Value> = props.iter().map(property_schema).collect();
                let payload = json!({
                    "type": "load_object",
                    "step": step.name,
                    "templateId": template,
                    "property_schemas": schemas,
                    "instructions": instructions,
                    "samplingResult": sampled,
                    "currentStep": ctx.current_step,
                    "resumeFrom": ctx.current_step + 1,
                });
                ctx.result = Some(payload);

                Ok((
                    Flow::Suspend,
                    json!({ "templateId": template, "property_schemas": schemas, "samplingResult": sampled }),
                ))
            }

            StepKind::CreateObject { template_id, properties, mapping, result_variable, instructions } => {
                let template = interpolate_text(require(step, template_id, "templateId")?, ctx);
                let props = self.object_properties(step, &template, properties.as_deref()).await?;

                let mut prefilled = Map::new();
                let mut unresolved: Vec<&PropertyDefinition> = Vec::new();
                for p in &props {
                    match mapping.get(&p.key).map(|raw| interpolate(raw, ctx)) {
                        Some(value) if !value.is_null() && !has_unresolved(&value) => {
                            prefilled.insert(p.key.clone(), value);
                        }
                        _ => unresolved.push(p),
                    }
                }

                if unresolved.is_empty() {
                    let tool = &self.config.create_object_tool;
                    debug!(step = %step.name, "all {} properties resolved, creating object", props.len());

                    let output = self
                        .gateways
                        .tools
                        .call_tool(tool, json!({ "templateId": template, "properties": prefilled }))
                        .await
                        .map_err(|source| EngineError::ToolCallFailed {
                            step: step.name.clone(),
                            tool: tool.clone(),
                            source,
                        })?;

                    if let Some(var) = result_variable.as_deref().filter(|v| !v.is_empty()) {
                        ctx.variables.insert(var.to_string(), output.clone());
                    }
                    return Ok((Flow::Continue, output));
                }

                let mut instructions: Vec<String> =
                    instructions.iter().map(|i| interpolate_text(i, ctx)).collect();
                if instructions.is_empty() {
                    instructions.push(format!(
                        "Supply the missing properties, then create the '{template}' object."
                    ));
                }

                let pending: Vec<&str> = unresolved.iter().map(|p| p.key.as_str()).collect();
                let schemas: Vec<Value> = unresolved.iter().map(|p| property_schema(p)).collect();
                let payload = json!({
                    "type": "create_object",
                    "step": step.name,
                    "templateId": template,
                    "property_schemas": schemas,
                    "prefilled": prefilled,
                    "instructions": instructions,
                    "currentStep": ctx.current_step,
                    "resumeFrom": ctx.current_step + 1,
                });
                ctx.result = Some(payload);

                Ok((
                    Flow::Suspend,
                    json!({ "templateId": template, "prefilled": prefilled, "pending": pending }),
                ))
            }
        }
    }

    /// Object properties of a template, optionally narrowed to `selected`,
    /// in schema order.
    async fn object_properties(
        &self,
        step: &Step,
        template: &str,
        selected: Option<&[String]>,
    ) -> Result<Vec<PropertyDefinition>, EngineError> {
        let rows = self
            .gateways
            .schemas
            .properties(template)
            .await
            .map_err(|source| EngineError::SchemaLookupFailed {
                step: step.name.clone(),
                template_id: template.to_string(),
                source,
            })?;

        Ok(rows
            .into_iter()
            .filter(|p| p.is_object_property())
            .filter(|p| selected.map_or(true, |keys| keys.iter().any(|k| k == &p.key)))
            .collect())
    }

    /// Ask the sampling gateway for a completion; any failure yields `None`.
    async fn sample(&self, step: &Step, prompt: &str) -> Option<String> {
        if !self.config.request_sampling {
            return None;
        }
        let sampler = self.gateways.sampler.as_ref()?;

        match sampler
            .request_completion(prompt, self.config.sampling_max_tokens)
            .await
        {
            Ok(text) => text,
            Err(e) => {
                warn!(step = %step.name, "sampling failed, pausing without a result: {}", e);
                None
            }
        }
    }
}
