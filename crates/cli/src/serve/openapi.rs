//! OpenAPI 3 document for the execution routes.

use serde_json::{json, Map, Value};
use twinroom_core::ParamKind;

use crate::registry::{CompiledContract, Registry};

/// Tag grouping every generated route.
pub(crate) const TAG: &str = "Contracts";

/// Build the document. `title` is the host binary name.
pub(crate) fn document(title: &str, registry: &Registry) -> Value {
    let mut paths = Map::new();
    for contract in registry.iter() {
        paths.insert(format!("/{}", contract.route()), path_item(contract));
    }

    json!({
        "openapi": "3.0.3",
        "info": {
            "title": title,
            "version": "1.0.0",
        },
        "tags": [
            { "name": TAG, "description": "Contracts exposed as GET and POST endpoints" }
        ],
        "paths": Value::Object(paths),
        "components": {
            "schemas": {
                "OutputResponse": {
                    "type": "object",
                    "description": "Output produced by the contract",
                    "additionalProperties": true,
                },
                "ErrorResponse": {
                    "type": "object",
                    "properties": {
                        "message": { "type": "array", "items": { "type": "string" } }
                    },
                    "required": ["message"],
                },
            }
        },
    })
}

fn path_item(contract: &CompiledContract) -> Value {
    let route = contract.route();
    let summary = contract.about();
    let operation_id = route.replace(['/', '-', '.', ' '], "_");

    let parameters: Vec<Value> = contract
        .params
        .all()
        .map(|param| {
            let mut schema = param.json_schema();
            if let Some(obj) = schema.as_object_mut() {
                obj.remove("description");
            }
            json!({
                "name": param.name,
                "in": "query",
                "required": param.kind == ParamKind::Argument && param.required,
                "description": param.description,
                "schema": schema,
            })
        })
        .collect();

    json!({
        "get": {
            "tags": [TAG],
            "summary": summary,
            "operationId": format!("get_{}", operation_id),
            "parameters": parameters,
            "responses": responses(),
        },
        "post": {
            "tags": [TAG],
            "summary": summary,
            "operationId": format!("post_{}", operation_id),
            "requestBody": {
                "required": false,
                "content": {
                    "application/json": { "schema": contract.http.request_schema }
                }
            },
            "responses": responses(),
        },
    })
}

fn responses() -> Value {
    let error = |description: &str| {
        json!({
            "description": description,
            "content": {
                "application/json": {
                    "schema": { "$ref": "#/components/schemas/ErrorResponse" }
                }
            }
        })
    };
    json!({
        "200": {
            "description": "Contract executed",
            "content": {
                "application/json": {
                    "schema": { "$ref": "#/components/schemas/OutputResponse" }
                }
            }
        },
        "400": error("Malformed or invalid input"),
        "500": error("Execution failed"),
    })
}
