//! In-process collaborator implementations.
//!
//! These back the CLI and the tests. Anything talking to a real tool
//! server or database lives outside this workspace.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::{GatewayError, PropertyDefinition, SchemaProvider, StateStore, ToolCaller};

// ---------------------------------------------------------------------------
// MemoryStateStore
// ---------------------------------------------------------------------------

/// A `StateStore` backed by a `HashMap` behind a mutex.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    entries: Mutex<HashMap<String, Value>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Value>>, GatewayError> {
        self.entries
            .lock()
            .map_err(|_| GatewayError::Unavailable("state store mutex poisoned".into()))
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, GatewayError> {
        Ok(self.lock()?.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), GatewayError> {
        self.lock()?.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, GatewayError> {
        Ok(self.lock()?.remove(key).is_some())
    }
}

// ---------------------------------------------------------------------------
// FileStateStore
// ---------------------------------------------------------------------------

/// A `StateStore` persisted as a single JSON object on disk.
///
/// Every write rewrites the whole file under an async mutex, which gives
/// per-key atomicity within one process.
pub struct FileStateStore {
    path: PathBuf,
    guard: tokio::sync::Mutex<()>,
}

impl FileStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            guard: tokio::sync::Mutex::new(()),
        }
    }

    async fn read_all(&self) -> Result<Map<String, Value>, GatewayError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(GatewayError::Unavailable(e.to_string())),
        };
        if raw.trim().is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(GatewayError::Failed(format!(
                "state file {} does not contain a JSON object",
                self.path.display()
            ))),
            Err(e) => Err(GatewayError::Failed(e.to_string())),
        }
    }

    async fn write_all(&self, map: Map<String, Value>) -> Result<(), GatewayError> {
        let body = serde_json::to_string_pretty(&Value::Object(map))
            .map_err(|e| GatewayError::Failed(e.to_string()))?;
        tokio::fs::write(&self.path, body)
            .await
            .map_err(|e| GatewayError::Unavailable(e.to_string()))
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, GatewayError> {
        let _held = self.guard.lock().await;
        Ok(self.read_all().await?.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), GatewayError> {
        let _held = self.guard.lock().await;
        let mut map = self.read_all().await?;
        map.insert(key.to_string(), value);
        debug!("persisting state key '{}' to {}", key, self.path.display());
        self.write_all(map).await
    }

    async fn delete(&self, key: &str) -> Result<bool, GatewayError> {
        let _held = self.guard.lock().await;
        let mut map = self.read_all().await?;
        let existed = map.remove(key).is_some();
        if existed {
            self.write_all(map).await?;
        }
        Ok(existed)
    }
}

// ---------------------------------------------------------------------------
// StaticSchemaProvider
// ---------------------------------------------------------------------------

/// A `SchemaProvider` over a fixed `template_id → rows` map.
#[derive(Debug, Clone, Default)]
pub struct StaticSchemaProvider {
    templates: HashMap<String, Vec<PropertyDefinition>>,
}

impl StaticSchemaProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style registration of one template.
    pub fn with_template(
        mut self,
        template_id: impl Into<String>,
        properties: Vec<PropertyDefinition>,
    ) -> Self {
        self.templates.insert(template_id.into(), properties);
        self
    }

    /// Parse `{ "<template id>": [ <property>, ... ], ... }`.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        let templates: HashMap<String, Vec<PropertyDefinition>> = serde_json::from_str(raw)?;
        Ok(Self { templates })
    }
}

#[async_trait]
impl SchemaProvider for StaticSchemaProvider {
    async fn properties(&self, template_id: &str) -> Result<Vec<PropertyDefinition>, GatewayError> {
        self.templates
            .get(template_id)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(format!("template '{template_id}'")))
    }
}

// ---------------------------------------------------------------------------
// EchoToolCaller
// ---------------------------------------------------------------------------

/// A `ToolCaller` with no backend: every call succeeds and returns the
/// request, so dry runs can show what would have been sent.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoToolCaller;

#[async_trait]
impl ToolCaller for EchoToolCaller {
    async fn call_tool(&self, name: &str, parameters: Value) -> Result<Value, GatewayError> {
        debug!("echo tool call '{}'", name);
        Ok(json!({ "tool": name, "parameters": parameters }))
    }
}

// ============================================================
// Unit tests
// ============================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_set_get_delete() {
        let store = MemoryStateStore::new();
        assert_eq!(store.get("k").await.unwrap(), None);

        store.set("k", json!({ "n": 1 })).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(json!({ "n": 1 })));

        assert!(store.delete("k").await.unwrap());
        assert!(!store.delete("k").await.unwrap());
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let store = FileStateStore::new(&path);
        assert_eq!(store.get("counter").await.unwrap(), None);
        store.set("counter", json!(3)).await.unwrap();
        store.set("name", json!("alpha")).await.unwrap();

        let reopened = FileStateStore::new(&path);
        assert_eq!(reopened.get("counter").await.unwrap(), Some(json!(3)));
        assert!(reopened.delete("name").await.unwrap());
        assert_eq!(store.get("name").await.unwrap(), None);
    }

    #[tokio::test]
    async fn file_store_rejects_non_object_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "[1, 2]").unwrap();

        let store = FileStateStore::new(&path);
        assert!(matches!(store.get("x").await, Err(GatewayError::Failed(_))));
    }

    #[tokio::test]
    async fn static_provider_lookup() {
        let provider = StaticSchemaProvider::from_json(
            r#"{ "contact": [ { "key": "email", "type": "string", "description": "Email" } ] }"#,
        )
        .unwrap();

        let props = provider.properties("contact").await.unwrap();
        assert_eq!(props.len(), 1);
        assert_eq!(props[0].key, "email");
        assert!(props[0].is_object_property());

        assert!(matches!(
            provider.properties("missing").await,
            Err(GatewayError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn echo_tool_returns_request() {
        let out = EchoToolCaller
            .call_tool("ping", json!({ "a": 1 }))
            .await
            .unwrap();
        assert_eq!(out, json!({ "tool": "ping", "parameters": { "a": 1 } }));
    }
}
