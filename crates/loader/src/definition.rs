//! Property rows → [`WorkflowDefinition`].
//!
//! Rows are consumed in order:
//! - `step_type == "input"` → an input schema property;
//! - no step type, or `"property"` → an object property, skipped here;
//! - any other step type → a workflow step named by `key`, configured by
//!   the row's `config` object.

use std::str::FromStr;

use engine::{FieldType, InputField, InputSchema, Step, WorkflowDefinition};
use gateways::{PropertyDefinition, SchemaProvider};
use serde_json::{Map, Value};
use tracing::debug;

use crate::LoaderError;

/// Build a definition from already-fetched rows.
///
/// # Errors
/// - [`LoaderError::InvalidInputType`] for an input row with an unknown type.
/// - [`LoaderError::InvalidStepConfig`] if a step row's config is not an object.
/// - [`LoaderError::Definition`] for unknown step types or malformed steps.
pub fn build_definition(
    name: &str,
    description: &str,
    rows: &[PropertyDefinition],
) -> Result<WorkflowDefinition, LoaderError> {
    let mut input_schema = InputSchema::default();
    let mut steps = Vec::new();

    for row in rows {
        if row.is_input() {
            let field_type = FieldType::from_str(&row.property_type).map_err(|_| {
                LoaderError::InvalidInputType {
                    key: row.key.clone(),
                    property_type: row.property_type.clone(),
                }
            })?;
            input_schema.properties.insert(
                row.key.clone(),
                InputField {
                    field_type,
                    description: (!row.description.is_empty()).then(|| row.description.clone()),
                    default: row.default.clone(),
                },
            );
            if row.required {
                input_schema.required.push(row.key.clone());
            }
        } else if !row.is_object_property() {
            steps.push(step_from_row(row)?);
        }
    }

    debug!(
        "built workflow '{}' with {} inputs and {} steps",
        name,
        input_schema.properties.len(),
        steps.len()
    );

    Ok(WorkflowDefinition {
        name: name.to_string(),
        description: description.to_string(),
        input_schema,
        steps,
    })
}

/// Fetch a template's rows from any provider and build its definition.
pub async fn load_workflow(
    provider: &dyn SchemaProvider,
    template_id: &str,
) -> Result<WorkflowDefinition, LoaderError> {
    let rows = provider.properties(template_id).await?;
    build_definition(template_id, "", &rows)
}

fn step_from_row(row: &PropertyDefinition) -> Result<Step, LoaderError> {
    let mut fields = match &row.config {
        Value::Object(map) => map.clone(),
        Value::Null => Map::new(),
        _ => return Err(LoaderError::InvalidStepConfig { key: row.key.clone() }),
    };
    fields.insert("name".into(), Value::String(row.key.clone()));
    if let Some(kind) = &row.step_type {
        fields.insert("type".into(), Value::String(kind.clone()));
    }
    Ok(Step::from_value(Value::Object(fields))?)
}

// ============================================================
// Unit tests
// ============================================================
#[cfg(test)]
mod tests {
    use super::*;
    use engine::{EngineError, StepKind};
    use serde_json::json;

    fn row(key: &str, ty: &str, step_type: Option<&str>, config: Value) -> PropertyDefinition {
        PropertyDefinition {
            key: key.into(),
            property_type: ty.into(),
            description: format!("{key} description"),
            step_type: step_type.map(str::to_string),
            required: false,
            default: None,
            config,
        }
    }

    #[test]
    fn splits_inputs_properties_and_steps() {
        let mut title = row("title", "string", Some("input"), Value::Null);
        title.required = true;
        let rows = vec![
            title,
            row("labels", "array", Some("input"), Value::Null),
            row("email", "string", None, Value::Null),
            row("announce", "string", Some("log"), json!({ "message": "new {{input.title}}" })),
            row("finish", "string", Some("return"), json!({ "value": "{{input.labels}}" })),
        ];

        let def = build_definition("ticket", "Create a ticket", &rows).unwrap();

        assert_eq!(def.name, "ticket");
        assert_eq!(def.input_schema.required, vec!["title"]);
        assert_eq!(def.input_schema.properties["labels"].field_type, FieldType::Array);
        assert_eq!(def.steps.len(), 2);
        assert_eq!(def.steps[0].name, "announce");
        assert_eq!(def.steps[0].kind, StepKind::Log { message: "new {{input.title}}".into() });
        assert_eq!(def.steps[1].kind.type_name(), "return");
    }

    #[test]
    fn unknown_step_type_is_rejected() {
        let rows = vec![row("jump", "string", Some("teleport"), Value::Null)];
        assert!(matches!(
            build_definition("t", "", &rows),
            Err(LoaderError::Definition(EngineError::UnknownStepType { kind, .. })) if kind == "teleport"
        ));
    }

    #[test]
    fn bad_input_type_is_rejected() {
        let rows = vec![row("when", "datetime", Some("input"), Value::Null)];
        assert!(matches!(
            build_definition("t", "", &rows),
            Err(LoaderError::InvalidInputType { key, .. }) if key == "when"
        ));
    }

    #[test]
    fn step_config_must_be_an_object() {
        let rows = vec![row("say", "string", Some("log"), json!("hello"))];
        assert!(matches!(
            build_definition("t", "", &rows),
            Err(LoaderError::InvalidStepConfig { key }) if key == "say"
        ));
    }
}
