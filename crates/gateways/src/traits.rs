//! The collaborator traits: the only way the interpreter reaches the outside world.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::GatewayError;

/// `step_type` value marking a row as a workflow input parameter.
pub const INPUT_STEP_TYPE: &str = "input";

/// `step_type` value marking a row as a plain object property.
pub const PROPERTY_STEP_TYPE: &str = "property";

/// One property row of a template, as returned by a [`SchemaProvider`].
///
/// The `step_type` discriminator separates input parameters, object
/// properties and workflow steps that share the same table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDefinition {
    pub key: String,
    #[serde(rename = "type", default = "default_property_type")]
    pub property_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub step_type: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub default: Option<Value>,
    /// Kind-specific configuration for step rows.
    #[serde(default)]
    pub config: Value,
}

fn default_property_type() -> String {
    "string".to_string()
}

impl PropertyDefinition {
    /// Convenience constructor for a plain object property.
    pub fn property(
        key: impl Into<String>,
        property_type: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            property_type: property_type.into(),
            description: description.into(),
            step_type: None,
            required: false,
            default: None,
            config: Value::Null,
        }
    }

    /// True for rows describing fields of the object itself.
    pub fn is_object_property(&self) -> bool {
        match self.step_type.as_deref() {
            None | Some("") => true,
            Some(kind) => kind == PROPERTY_STEP_TYPE,
        }
    }

    /// True for rows describing a workflow input parameter.
    pub fn is_input(&self) -> bool {
        self.step_type.as_deref() == Some(INPUT_STEP_TYPE)
    }
}

/// Invokes an external tool by name. Used by `call_tool` steps and by the
/// auto-execute path of `create_object`.
#[async_trait]
pub trait ToolCaller: Send + Sync {
    async fn call_tool(&self, name: &str, parameters: Value) -> Result<Value, GatewayError>;
}

/// Supplies the ordered property rows of a template.
#[async_trait]
pub trait SchemaProvider: Send + Sync {
    async fn properties(&self, template_id: &str) -> Result<Vec<PropertyDefinition>, GatewayError>;
}

/// Key-value persistence for `load_state` / `save_state`.
///
/// Implementations provide their own per-key atomicity; the interpreter
/// performs no locking.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, GatewayError>;

    async fn set(&self, key: &str, value: Value) -> Result<(), GatewayError>;

    /// Remove a key, returning whether it existed.
    async fn delete(&self, key: &str) -> Result<bool, GatewayError>;
}

/// Optional LLM completion source consulted by `agent` and `load_object`
/// steps before they pause.
#[async_trait]
pub trait SamplingGateway: Send + Sync {
    /// `Ok(None)` means the gateway declined to answer.
    async fn request_completion(
        &self,
        prompt: &str,
        max_tokens: u32,
    ) -> Result<Option<String>, GatewayError>;
}
