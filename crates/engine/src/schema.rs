//! Input validation: run this before any step executes.
//!
//! Rules enforced:
//! 1. Missing (or null) fields take their declared `default`.
//! 2. Every name in `required` must then be present.
//! 3. `string`/`number`/`boolean`/`object` fields must match their type.
//! 4. `array` fields given a scalar are wrapped in a one-element array.
//! 5. Fields the schema does not mention pass through untouched.

use serde_json::{Map, Value};

use crate::models::{FieldType, InputSchema};
use crate::EngineError;

/// Validate `inputs` against `schema`, normalising them in place.
///
/// # Errors
/// - [`EngineError::MissingInput`] if a required field is absent.
/// - [`EngineError::TypeMismatch`] if a field has the wrong type.
pub fn validate_inputs(schema: &InputSchema, inputs: &mut Map<String, Value>) -> Result<(), EngineError> {
    // -----------------------------------------------------------------------
    // 1. Defaults
    // -----------------------------------------------------------------------
    for (name, field) in &schema.properties {
        if let Some(default) = &field.default {
            if inputs.get(name).map_or(true, Value::is_null) {
                inputs.insert(name.clone(), default.clone());
            }
        }
    }

    // -----------------------------------------------------------------------
    // 2. Required fields
    // -----------------------------------------------------------------------
    for name in &schema.required {
        if inputs.get(name).map_or(true, Value::is_null) {
            return Err(EngineError::MissingInput(name.clone()));
        }
    }

    // -----------------------------------------------------------------------
    // 3-4. Types
    // -----------------------------------------------------------------------
    for (name, field) in &schema.properties {
        let Some(value) = inputs.get_mut(name) else {
            continue;
        };
        if value.is_null() {
            continue;
        }

        let ok = match field.field_type {
            FieldType::String => value.is_string(),
            FieldType::Number => value.is_number(),
            FieldType::Boolean => value.is_boolean(),
            FieldType::Object => value.is_object(),
            FieldType::Array => {
                if !value.is_array() {
                    let scalar = value.take();
                    *value = Value::Array(vec![scalar]);
                }
                true
            }
        };

        if !ok {
            return Err(EngineError::TypeMismatch {
                field: name.clone(),
                expected: field.field_type.as_str(),
            });
        }
    }

    Ok(())
}

/// Accept any JSON value as the raw inputs of a run; `null` means none.
pub fn inputs_object(raw: Value) -> Result<Map<String, Value>, EngineError> {
    match raw {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        Value::Array(_) => Err(EngineError::InvalidInputs("an array")),
        Value::String(_) => Err(EngineError::InvalidInputs("a string")),
        Value::Number(_) => Err(EngineError::InvalidInputs("a number")),
        Value::Bool(_) => Err(EngineError::InvalidInputs("a boolean")),
    }
}

// ============================================================
// Unit tests
// ============================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::InputField;
    use serde_json::json;

    fn field(field_type: FieldType) -> InputField {
        InputField { field_type, description: None, default: None }
    }

    fn schema(fields: Vec<(&str, InputField)>, required: &[&str]) -> InputSchema {
        InputSchema {
            properties: fields.into_iter().map(|(k, f)| (k.to_string(), f)).collect(),
            required: required.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn obj(v: Value) -> Map<String, Value> {
        v.as_object().unwrap().clone()
    }

    #[test]
    fn scalar_is_wrapped_for_array_field() {
        let s = schema(vec![("tags", field(FieldType::Array))], &[]);
        let mut inputs = obj(json!({ "tags": "a" }));
        validate_inputs(&s, &mut inputs).unwrap();
        assert_eq!(inputs["tags"], json!(["a"]));
    }

    #[test]
    fn arrays_are_left_alone() {
        let s = schema(vec![("tags", field(FieldType::Array))], &[]);
        let mut inputs = obj(json!({ "tags": ["a", "b"] }));
        validate_inputs(&s, &mut inputs).unwrap();
        assert_eq!(inputs["tags"], json!(["a", "b"]));
    }

    #[test]
    fn missing_required_field_is_rejected() {
        let s = schema(vec![("title", field(FieldType::String))], &["title"]);
        let mut inputs = Map::new();
        assert_eq!(
            validate_inputs(&s, &mut inputs),
            Err(EngineError::MissingInput("title".into()))
        );
    }

    #[test]
    fn required_without_property_entry_is_enforced() {
        let s = schema(vec![], &["token"]);
        let mut inputs = obj(json!({ "other": 1 }));
        assert!(matches!(
            validate_inputs(&s, &mut inputs),
            Err(EngineError::MissingInput(name)) if name == "token"
        ));
    }

    #[test]
    fn type_mismatch_names_field_and_type() {
        let s = schema(vec![("count", field(FieldType::Number))], &[]);
        let mut inputs = obj(json!({ "count": "three" }));
        assert_eq!(
            validate_inputs(&s, &mut inputs),
            Err(EngineError::TypeMismatch { field: "count".into(), expected: "number" })
        );
    }

    #[test]
    fn defaults_fill_missing_fields() {
        let mut priority = field(FieldType::String);
        priority.default = Some(json!("normal"));
        let s = schema(vec![("priority", priority)], &["priority"]);

        let mut inputs = Map::new();
        validate_inputs(&s, &mut inputs).unwrap();
        assert_eq!(inputs["priority"], json!("normal"));
    }

    #[test]
    fn unknown_fields_pass_through() {
        let s = schema(vec![("flag", field(FieldType::Boolean))], &[]);
        let mut inputs = obj(json!({ "flag": true, "extra": [1, { "deep": null }] }));
        validate_inputs(&s, &mut inputs).unwrap();
        assert_eq!(inputs["extra"], json!([1, { "deep": null }]));
    }

    #[test]
    fn non_object_inputs_are_rejected() {
        assert!(matches!(inputs_object(json!([1])), Err(EngineError::InvalidInputs(_))));
        assert_eq!(inputs_object(Value::Null).unwrap(), Map::new());
    }
}
