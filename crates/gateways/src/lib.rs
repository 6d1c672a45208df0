//! `gateways` crate: the collaborator traits the interpreter calls into.
//!
//! The engine never talks to a tool server, template table, state store or
//! LLM directly; it goes through [`ToolCaller`], [`SchemaProvider`],
//! [`StateStore`] and [`SamplingGateway`]. In-process implementations live
//! in [`memory`], recording doubles in [`mock`].

pub mod error;
pub mod traits;
pub mod memory;
pub mod mock;

pub use error::GatewayError;
pub use traits::{
    PropertyDefinition, SamplingGateway, SchemaProvider, StateStore, ToolCaller,
    INPUT_STEP_TYPE, PROPERTY_STEP_TYPE,
};
pub use memory::{EchoToolCaller, FileStateStore, MemoryStateStore, StaticSchemaProvider};
