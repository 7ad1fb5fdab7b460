use std::io;
use std::path::PathBuf;

/// Failure while enumerating a contract source.
///
/// A walk error aborts the rest of the walk for that root only; contracts
/// already handed to the visitor stay valid.
#[derive(Debug, thiserror::Error)]
pub enum LocateError {
    #[error("failed to walk '{}': {source}", root.display())]
    Walk {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("failed to read contract '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Failure while loading a `<name>.metadata.json` sidecar.
#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    /// No sidecar exists; resolution falls through to introspection.
    #[error("metadata file not found: {path}")]
    NotFound { path: String },

    #[error("failed to open metadata file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to decode metadata {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Failure while building an execution payload from sidecar files and
/// caller-supplied data.
#[derive(Debug, thiserror::Error)]
pub enum ComposeError {
    #[error("failed to read file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    InvalidJson {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("data channel is not a JSON object: {0}")]
    DataChannel(#[source] serde_json::Error),

    #[error("failed to encode data channel: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Failure reported by (or while talking to) the execution engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("failed to start engine '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("engine i/o failed: {0}")]
    Io(#[from] io::Error),

    #[error("engine exited with {status}")]
    Failed { status: String, logs: String },
}

impl EngineError {
    /// Engine logs captured for this failure, empty when the engine never ran.
    pub fn logs(&self) -> &str {
        match self {
            EngineError::Failed { logs, .. } => logs,
            _ => "",
        }
    }
}

/// Failure while compiling a generated JSON Schema into a validator.
#[derive(Debug, thiserror::Error)]
#[error("failed to compile request schema: {0}")]
pub struct SchemaError(pub String);
