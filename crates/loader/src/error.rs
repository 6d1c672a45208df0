//! Typed error type for the loader crate.

use engine::EngineError;
use gateways::GatewayError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("template not found: {0}")]
    TemplateNotFound(String),

    #[error("input '{key}' has unsupported type '{property_type}'")]
    InvalidInputType { key: String, property_type: String },

    #[error("step '{key}' config must be a JSON object")]
    InvalidStepConfig { key: String },

    #[error("invalid workflow definition: {0}")]
    Definition(#[from] EngineError),

    #[error("schema provider error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("template storage error: {0}")]
    Storage(String),
}
