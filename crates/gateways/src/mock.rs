//! Test doubles for [`ToolCaller`] and [`SamplingGateway`].
//!
//! Useful in unit and integration tests where a real tool backend or LLM
//! is either unavailable or irrelevant.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

use crate::{GatewayError, SamplingGateway, ToolCaller};

/// Behaviour injected into `MockToolCaller` at construction time.
pub enum MockBehaviour {
    /// Return a specific JSON value.
    ReturnValue(Value),
    /// Echo the call back as `{ "tool": name, "parameters": parameters }`.
    Echo,
    /// Fail with a `GatewayError::Failed`.
    Fail(String),
}

/// A mock tool caller that records every call it receives and returns a
/// programmer-specified result.
pub struct MockToolCaller {
    pub behaviour: MockBehaviour,
    /// All `(tool, parameters)` pairs seen (in call order).
    pub calls: Arc<Mutex<Vec<(String, Value)>>>,
}

impl MockToolCaller {
    /// Create a mock that always succeeds with the given value.
    pub fn returning(value: Value) -> Self {
        Self::with(MockBehaviour::ReturnValue(value))
    }

    /// Create a mock that echoes every call back.
    pub fn echo() -> Self {
        Self::with(MockBehaviour::Echo)
    }

    /// Create a mock that always fails.
    pub fn failing(msg: impl Into<String>) -> Self {
        Self::with(MockBehaviour::Fail(msg.into()))
    }

    fn with(behaviour: MockBehaviour) -> Self {
        Self {
            behaviour,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Number of times this tool caller has been invoked.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Snapshot of every call received so far.
    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ToolCaller for MockToolCaller {
    async fn call_tool(&self, name: &str, parameters: Value) -> Result<Value, GatewayError> {
        self.calls
            .lock()
            .unwrap()
            .push((name.to_string(), parameters.clone()));

        match &self.behaviour {
            MockBehaviour::ReturnValue(v) => Ok(v.clone()),
            MockBehaviour::Echo => Ok(json!({ "tool": name, "parameters": parameters })),
            MockBehaviour::Fail(msg) => Err(GatewayError::Failed(msg.clone())),
        }
    }
}

/// A sampling gateway that answers every prompt with a fixed response.
pub struct MockSampler {
    response: Result<Option<String>, GatewayError>,
    pub prompts: Arc<Mutex<Vec<String>>>,
}

impl MockSampler {
    pub fn answering(text: impl Into<String>) -> Self {
        Self::with(Ok(Some(text.into())))
    }

    /// A gateway that is reachable but never produces text.
    pub fn silent() -> Self {
        Self::with(Ok(None))
    }

    pub fn failing(msg: impl Into<String>) -> Self {
        Self::with(Err(GatewayError::Unavailable(msg.into())))
    }

    fn with(response: Result<Option<String>, GatewayError>) -> Self {
        Self {
            response,
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl SamplingGateway for MockSampler {
    async fn request_completion(
        &self,
        prompt: &str,
        _max_tokens: u32,
    ) -> Result<Option<String>, GatewayError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.response.clone()
    }
}
