//! Row structs mirroring the template tables.
//!
//! These are *persistence* models: they carry no domain behaviour.
//! Domain types live in the `engine` crate.

use chrono::{DateTime, Utc};
use gateways::PropertyDefinition;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// templates
// ---------------------------------------------------------------------------

/// A stored template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateRow {
    pub id: Uuid,
    /// Human-readable identifier; either this or `id` addresses the template.
    pub slug: String,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl TemplateRow {
    pub fn matches(&self, template_id: &str) -> bool {
        self.slug == template_id || self.id.to_string() == template_id
    }
}

// ---------------------------------------------------------------------------
// template_properties
// ---------------------------------------------------------------------------

/// A stored property of a template. Input parameters, object properties
/// and workflow steps all live here, told apart by `step_type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyRow {
    pub id: Uuid,
    pub template_id: Uuid,
    pub key: String,
    pub property_type: String,
    pub description: String,
    pub step_type: Option<String>,
    pub required: bool,
    pub default_value: Option<Value>,
    /// Step configuration (JSON object) for step rows.
    pub config: Value,
    /// Execution / display position within the template.
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
}

impl From<&PropertyRow> for PropertyDefinition {
    fn from(row: &PropertyRow) -> Self {
        PropertyDefinition {
            key: row.key.clone(),
            property_type: row.property_type.clone(),
            description: row.description.clone(),
            step_type: row.step_type.clone(),
            required: row.required,
            default: row.default_value.clone(),
            config: row.config.clone(),
        }
    }
}
