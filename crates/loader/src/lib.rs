//! `loader` crate: turns stored template rows into workflow definitions.
//!
//! Sits outside the interpreter core: it knows the row layout of templates
//! and their properties, the engine only ever sees the resulting
//! [`engine::WorkflowDefinition`].

pub mod error;
pub mod models;
pub mod definition;
pub mod repository;

pub use error::LoaderError;
pub use definition::{build_definition, load_workflow};
pub use repository::TemplateRepository;
