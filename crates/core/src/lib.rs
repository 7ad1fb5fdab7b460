#![allow(clippy::result_large_err)]
//! twinroom-core: contract discovery, schema resolution and input composition.
//!
//! The pipeline runs once per process, before any surface goes live:
//!
//! - [`discover()`] -- enumerate contracts from embedded and filesystem sources
//! - [`resolve()`] -- sidecar metadata, or engine introspection as fallback
//! - [`ParameterSet`] -- the normalized parameters both surfaces are built from
//! - [`compose()`] -- sidecar channels plus caller data into an [`ExecutionPayload`]
//!
//! The [`Engine`] trait is the seam to the external execution engine;
//! [`SlangroomExec`] drives a `slangroom-exec` compatible program.

/// Default contract file extension.
pub const CONTRACT_EXTENSION: &str = ".slang";

pub mod engine;
pub mod error;
pub mod introspect;
pub mod locate;
pub mod metadata;
pub mod params;
pub mod payload;
pub mod resolve;
pub mod typedesc;

// ── Convenience re-exports ───────────────────────────────────────────

pub use engine::{Engine, EngineOutput, SlangroomExec};
pub use error::{ComposeError, EngineError, LocateError, MetadataError, SchemaError};
pub use locate::{
    discover, ContractIdentity, ContractSource, ContractTree, Discovery, EmbeddedTree, SourceKind,
};
pub use params::{FileSourcing, Origin, ParamKind, ParameterDescriptor, ParameterSet, Schema};
pub use payload::{compose, load_sidecars, Channel, ExecutionPayload};
pub use resolve::resolve;
pub use typedesc::{Field, Primitive, RequestValidator, TypeDesc};
