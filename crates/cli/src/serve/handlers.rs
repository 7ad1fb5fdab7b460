//! Route handlers: documentation, pages and contract execution.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{MatchedPath, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use serde_json::{Map, Value};
use twinroom_core::{load_sidecars, ComposeError, EngineError, ParameterSet};

use super::state::AppState;
use super::{json_error, pages, PAGE_PREFIX};
use crate::registry::CompiledContract;

/// Failure while handling one execution request.
#[derive(Debug, thiserror::Error)]
pub(crate) enum RequestError {
    #[error("contract not found: {0}")]
    NotFound(String),

    #[error("Invalid JSON payload: {0}")]
    InvalidJson(#[source] serde_json::Error),

    #[error("request body must be a JSON object")]
    NotAnObject,

    #[error("request does not match the contract schema")]
    Validation(Vec<String>),

    #[error("failed to load contract data: {0}")]
    Compose(#[from] ComposeError),

    #[error("Execution error: {0}")]
    Engine(#[from] EngineError),

    #[error("execution task failed: {0}")]
    Task(String),

    #[error("Invalid JSON in output: {0}")]
    Output(String),
}

impl RequestError {
    fn status(&self) -> StatusCode {
        match self {
            RequestError::NotFound(_) => StatusCode::NOT_FOUND,
            RequestError::InvalidJson(_)
            | RequestError::NotAnObject
            | RequestError::Validation(_) => StatusCode::BAD_REQUEST,
            RequestError::Compose(_)
            | RequestError::Engine(_)
            | RequestError::Task(_)
            | RequestError::Output(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message lines: the failure itself, then validation errors or engine logs.
    fn messages(&self) -> Vec<String> {
        let mut lines = vec![self.to_string()];
        match self {
            RequestError::Validation(errors) => lines.extend(errors.iter().cloned()),
            RequestError::Engine(e) => lines.extend(
                e.logs()
                    .lines()
                    .filter(|l| !l.trim().is_empty())
                    .map(str::to_string),
            ),
            _ => {}
        }
        lines
    }
}

impl IntoResponse for RequestError {
    fn into_response(self) -> Response {
        json_error(self.status(), self.messages()).into_response()
    }
}

/// Fallback handler for unmatched routes.
pub(crate) async fn handle_not_found() -> impl IntoResponse {
    json_error(StatusCode::NOT_FOUND, vec!["not found".to_string()])
}

/// GET /documentation/json
pub(crate) async fn handle_openapi(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.openapi.clone())
}

/// GET /slang/
pub(crate) async fn handle_listing(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Html(pages::listing(&state.registry))
}

/// GET /slang/<path>
pub(crate) async fn handle_page(
    State(state): State<Arc<AppState>>,
    matched: MatchedPath,
) -> Response {
    let route = matched
        .as_str()
        .strip_prefix(PAGE_PREFIX)
        .unwrap_or_default();
    match state.registry.get(route) {
        Some(contract) => Html(pages::contract_page(contract)).into_response(),
        None => RequestError::NotFound(route.to_string()).into_response(),
    }
}

/// GET /<path>: query parameters, first value per key, coerced to the
/// declared types.
pub(crate) async fn handle_get(
    State(state): State<Arc<AppState>>,
    matched: MatchedPath,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Response, RequestError> {
    let contract = lookup(&state, &matched)?;
    let mut input = query_input(&contract.params, pairs);
    fill_defaults(&contract.params, &mut input);
    validate(&contract, &input)?;
    execute(state, contract, input).await
}

/// POST /<path>: JSON object body. An empty body is `{}` and skips validation.
/// Option defaults fill absent keys either way.
pub(crate) async fn handle_post(
    State(state): State<Arc<AppState>>,
    matched: MatchedPath,
    body: Bytes,
) -> Result<Response, RequestError> {
    let contract = lookup(&state, &matched)?;
    let input = if body.iter().all(u8::is_ascii_whitespace) {
        let mut input = Map::new();
        fill_defaults(&contract.params, &mut input);
        input
    } else {
        let mut input = match serde_json::from_slice::<Value>(&body) {
            Ok(Value::Object(map)) => map,
            Ok(_) => return Err(RequestError::NotAnObject),
            Err(e) => return Err(RequestError::InvalidJson(e)),
        };
        fill_defaults(&contract.params, &mut input);
        validate(&contract, &input)?;
        input
    };
    execute(state, contract, input).await
}

fn lookup(state: &AppState, matched: &MatchedPath) -> Result<Arc<CompiledContract>, RequestError> {
    let route = matched.as_str().trim_start_matches('/');
    state
        .registry
        .get(route)
        .cloned()
        .ok_or_else(|| RequestError::NotFound(route.to_string()))
}

pub(crate) fn query_input(params: &ParameterSet, pairs: Vec<(String, String)>) -> Map<String, Value> {
    let mut input = Map::new();
    for (key, raw) in pairs {
        if input.contains_key(&key) {
            continue;
        }
        let value = match params.find(&key) {
            Some(param) => param.ty.coerce(&raw),
            None => Value::String(raw),
        };
        input.insert(key, value);
    }
    input
}

/// Declared option defaults for keys the request left out, converted the
/// same way the command line converts them. File-sourced options are skipped.
pub(crate) fn fill_defaults(params: &ParameterSet, input: &mut Map<String, Value>) {
    for option in &params.options {
        if option.sourcing.from_file || input.contains_key(&option.name) {
            continue;
        }
        if let Some(text) = option.default_text().filter(|t| !t.is_empty()) {
            input.insert(option.name.clone(), option.ty.coerce(&text));
        }
    }
}

fn validate(contract: &CompiledContract, input: &Map<String, Value>) -> Result<(), RequestError> {
    let errors = contract
        .http
        .validator
        .errors(&Value::Object(input.clone()));
    if errors.is_empty() {
        Ok(())
    } else {
        Err(RequestError::Validation(errors))
    }
}

async fn execute(
    state: Arc<AppState>,
    contract: Arc<CompiledContract>,
    input: Map<String, Value>,
) -> Result<Response, RequestError> {
    let route = contract.route();
    let mut payload = match &state.pinned {
        Some((pinned, payload)) if *pinned == route => payload.clone(),
        _ => load_sidecars(&contract.identity)?,
    };
    payload.merge_data(&input)?;

    let engine = state.engine.clone();
    let result = tokio::task::spawn_blocking(move || engine.exec(&payload))
        .await
        .map_err(|e| RequestError::Task(e.to_string()))?;
    let output = match result {
        Ok(output) => output,
        Err(e) => {
            log::warn!("execution error for {}: {}", route, e);
            return Err(RequestError::Engine(e));
        }
    };

    let parsed: Value = serde_json::from_str(&output.output)
        .map_err(|_| RequestError::Output(output.output.clone()))?;
    let body = serde_json::to_string_pretty(&parsed)
        .map_err(|e| RequestError::Output(e.to_string()))?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        body,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use twinroom_core::metadata::CommandMetadata;

    #[test]
    fn query_values_are_coerced_and_first_wins() {
        let meta: CommandMetadata = serde_json::from_str(
            r#"{"arguments": [{"name": "<name>"}],
                "options": [{"name": "--count", "type": "int"}, {"name": "--tags", "type": "array"}]}"#,
        )
        .unwrap();
        let params = ParameterSet::from_metadata(&meta);
        let input = query_input(
            &params,
            vec![
                ("name".into(), "Alice".into()),
                ("name".into(), "Bob".into()),
                ("count".into(), "3".into()),
                ("tags".into(), r#"["a"]"#.into()),
                ("unknown".into(), "7".into()),
            ],
        );
        assert_eq!(
            Value::Object(input),
            json!({"name": "Alice", "count": 3, "tags": ["a"], "unknown": "7"})
        );
    }

    #[test]
    fn defaults_fill_only_absent_options() {
        let meta: CommandMetadata = serde_json::from_str(
            r#"{"arguments": [{"name": "<name>"}],
                "options": [{"name": "--count", "type": "int", "default": 2},
                            {"name": "--size", "default": "small"},
                            {"name": "--input", "file": true, "default": "in.json"}]}"#,
        )
        .unwrap();
        let params = ParameterSet::from_metadata(&meta);
        let mut input = query_input(
            &params,
            vec![("name".into(), "Alice".into()), ("size".into(), "large".into())],
        );
        fill_defaults(&params, &mut input);
        assert_eq!(
            Value::Object(input),
            json!({"name": "Alice", "count": 2, "size": "large"})
        );
    }

    #[test]
    fn engine_errors_carry_logs_as_message_lines() {
        let err = RequestError::Engine(EngineError::Failed {
            status: "exit status: 1".into(),
            logs: "line one\n\nline two\n".into(),
        });
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            err.messages(),
            vec![
                "Execution error: engine exited with exit status: 1".to_string(),
                "line one".to_string(),
                "line two".to_string(),
            ]
        );
    }

    #[test]
    fn validation_errors_are_client_errors() {
        let err = RequestError::Validation(vec!["\"name\" is a required property".into()]);
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.messages().len(), 2);
    }
}
