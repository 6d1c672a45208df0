//! In-memory template repository.
//!
//! One method per storage operation, mirroring the template tables. Also
//! serves as a [`SchemaProvider`] so the interpreter can read the same rows
//! it was loaded from.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;
use engine::WorkflowDefinition;
use gateways::{GatewayError, PropertyDefinition, SchemaProvider};
use uuid::Uuid;

use crate::definition::build_definition;
use crate::models::{PropertyRow, TemplateRow};
use crate::LoaderError;

#[derive(Debug, Default)]
struct Tables {
    templates: Vec<TemplateRow>,
    properties: Vec<PropertyRow>,
}

/// Template and property rows held in memory.
#[derive(Debug, Default)]
pub struct TemplateRepository {
    tables: RwLock<Tables>,
}

impl TemplateRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, LoaderError> {
        self.tables
            .read()
            .map_err(|_| LoaderError::Storage("template tables lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, LoaderError> {
        self.tables
            .write()
            .map_err(|_| LoaderError::Storage("template tables lock poisoned".into()))
    }

    // -----------------------------------------------------------------------
    // templates
    // -----------------------------------------------------------------------

    /// Insert a new template.
    pub fn create_template(
        &self,
        slug: &str,
        name: &str,
        description: &str,
    ) -> Result<TemplateRow, LoaderError> {
        let row = TemplateRow {
            id: Uuid::new_v4(),
            slug: slug.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            created_at: Utc::now(),
        };
        self.write()?.templates.push(row.clone());
        Ok(row)
    }

    /// Fetch a template by slug or id.
    pub fn get_template(&self, template_id: &str) -> Result<TemplateRow, LoaderError> {
        self.read()?
            .templates
            .iter()
            .find(|t| t.matches(template_id))
            .cloned()
            .ok_or_else(|| LoaderError::TemplateNotFound(template_id.to_string()))
    }

    /// Return all templates ordered by creation time (newest first).
    pub fn list_templates(&self) -> Result<Vec<TemplateRow>, LoaderError> {
        let mut rows = self.read()?.templates.clone();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    /// Delete a template and its properties.
    ///
    /// Returns `LoaderError::TemplateNotFound` if nothing was deleted.
    pub fn delete_template(&self, template_id: &str) -> Result<(), LoaderError> {
        let mut tables = self.write()?;
        let Some(pos) = tables.templates.iter().position(|t| t.matches(template_id)) else {
            return Err(LoaderError::TemplateNotFound(template_id.to_string()));
        };
        let removed = tables.templates.remove(pos);
        tables.properties.retain(|p| p.template_id != removed.id);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // template_properties
    // -----------------------------------------------------------------------

    /// Append a property row at the end of the template's order.
    pub fn add_property(
        &self,
        template_id: &str,
        property: PropertyDefinition,
    ) -> Result<PropertyRow, LoaderError> {
        let template = self.get_template(template_id)?;
        let mut tables = self.write()?;

        let sort_order = tables
            .properties
            .iter()
            .filter(|p| p.template_id == template.id)
            .map(|p| p.sort_order + 1)
            .max()
            .unwrap_or(0);

        let row = PropertyRow {
            id: Uuid::new_v4(),
            template_id: template.id,
            key: property.key,
            property_type: property.property_type,
            description: property.description,
            step_type: property.step_type,
            required: property.required,
            default_value: property.default,
            config: property.config,
            sort_order,
            created_at: Utc::now(),
        };
        tables.properties.push(row.clone());
        Ok(row)
    }

    /// Property rows of a template in `sort_order`.
    pub fn list_properties(&self, template_id: &str) -> Result<Vec<PropertyRow>, LoaderError> {
        let template = self.get_template(template_id)?;
        let mut rows: Vec<PropertyRow> = self
            .read()?
            .properties
            .iter()
            .filter(|p| p.template_id == template.id)
            .cloned()
            .collect();
        rows.sort_by_key(|p| p.sort_order);
        Ok(rows)
    }

    /// Load a template as an executable workflow definition.
    pub fn load_workflow(&self, template_id: &str) -> Result<WorkflowDefinition, LoaderError> {
        let template = self.get_template(template_id)?;
        let rows: Vec<PropertyDefinition> = self
            .list_properties(template_id)?
            .iter()
            .map(PropertyDefinition::from)
            .collect();
        build_definition(&template.name, &template.description, &rows)
    }
}

#[async_trait]
impl SchemaProvider for TemplateRepository {
    async fn properties(&self, template_id: &str) -> Result<Vec<PropertyDefinition>, GatewayError> {
        match self.list_properties(template_id) {
            Ok(rows) => Ok(rows.iter().map(PropertyDefinition::from).collect()),
            Err(LoaderError::TemplateNotFound(id)) => {
                Err(GatewayError::NotFound(format!("template '{id}'")))
            }
            Err(e) => Err(GatewayError::Unavailable(e.to_string())),
        }
    }
}

// ============================================================
// Unit tests
// ============================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::load_workflow;
    use serde_json::json;

    fn step_row(key: &str, step_type: &str, config: serde_json::Value) -> PropertyDefinition {
        PropertyDefinition {
            step_type: Some(step_type.into()),
            config,
            ..PropertyDefinition::property(key, "string", "")
        }
    }

    fn seeded() -> TemplateRepository {
        let repo = TemplateRepository::new();
        repo.create_template("contact", "New contact", "Create a contact").unwrap();

        let mut owner = PropertyDefinition::property("owner", "string", "Requesting user");
        owner.step_type = Some("input".into());
        owner.required = true;

        repo.add_property("contact", owner).unwrap();
        repo.add_property("contact", PropertyDefinition::property("name", "string", "Full name")).unwrap();
        repo.add_property("contact", PropertyDefinition::property("email", "string", "Email")).unwrap();
        repo.add_property(
            "contact",
            step_row("make", "create_object", json!({ "templateId": "contact", "mapping": { "name": "{{input.owner}}" } })),
        )
        .unwrap();
        repo
    }

    #[test]
    fn properties_keep_insertion_order() {
        let repo = seeded();
        let rows = repo.list_properties("contact").unwrap();
        let keys: Vec<&str> = rows.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["owner", "name", "email", "make"]);
        assert_eq!(rows.last().unwrap().sort_order, 3);
    }

    #[test]
    fn load_workflow_uses_template_metadata() {
        let repo = seeded();
        let def = repo.load_workflow("contact").unwrap();
        assert_eq!(def.name, "New contact");
        assert_eq!(def.description, "Create a contact");
        assert_eq!(def.input_schema.required, vec!["owner"]);
        assert_eq!(def.steps.len(), 1);
        assert_eq!(def.steps[0].kind.type_name(), "create_object");
    }

    #[test]
    fn template_is_addressable_by_id() {
        let repo = seeded();
        let id = repo.get_template("contact").unwrap().id.to_string();
        assert_eq!(repo.list_properties(&id).unwrap().len(), 4);
    }

    #[test]
    fn delete_removes_template_and_properties() {
        let repo = seeded();
        repo.delete_template("contact").unwrap();
        assert!(matches!(repo.get_template("contact"), Err(LoaderError::TemplateNotFound(_))));
        assert!(matches!(repo.delete_template("contact"), Err(LoaderError::TemplateNotFound(_))));
        assert!(repo.list_templates().unwrap().is_empty());
    }

    #[tokio::test]
    async fn serves_as_schema_provider() {
        let repo = seeded();
        let props = repo.properties("contact").await.unwrap();
        assert_eq!(props.iter().filter(|p| p.is_object_property()).count(), 2);
        assert!(matches!(repo.properties("nope").await, Err(GatewayError::NotFound(_))));

        let def = load_workflow(&repo, "contact").await.unwrap();
        assert_eq!(def.name, "contact");
        assert_eq!(def.steps[0].name, "make");
    }
}
