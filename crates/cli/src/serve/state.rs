//! Application state shared across request handlers.

use std::sync::Arc;

use serde_json::Value;
use twinroom_core::{Engine, ExecutionPayload};

use crate::registry::Registry;

pub(crate) struct AppState {
    /// Compiled contracts keyed by route. Never mutated after startup.
    pub(crate) registry: Registry,
    pub(crate) engine: Arc<dyn Engine>,
    /// Base payload pinned for one route, composed by the command that
    /// started the server.
    pub(crate) pinned: Option<(String, ExecutionPayload)>,
    /// OpenAPI document, rendered once.
    pub(crate) openapi: Value,
}
