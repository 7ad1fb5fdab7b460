//! Execution engine seam.
//!
//! The engine is an external collaborator: it runs a contract against a
//! composed payload and can report which variables a contract touches.
//! Calls are blocking and share no state between invocations.

mod slangroom;

pub use slangroom::SlangroomExec;

use crate::error::EngineError;
use crate::payload::ExecutionPayload;

/// Result of one successful run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineOutput {
    /// JSON text produced by the contract.
    pub output: String,
    pub logs: String,
}

pub trait Engine: Send + Sync {
    /// Run the contract in `payload`.
    fn exec(&self, payload: &ExecutionPayload) -> Result<EngineOutput, EngineError>;

    /// Introspection report for `contract`: a JSON object mapping variable
    /// names to `{encoding, missing, name, zentype}`.
    fn introspect(&self, contract: &str) -> Result<String, EngineError>;
}
