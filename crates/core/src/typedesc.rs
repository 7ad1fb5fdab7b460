//! Recursive type descriptors, their JSON Schema form, and request validation.

use std::collections::BTreeMap;

use serde_json::{json, Map, Value};

use crate::error::SchemaError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    String,
    Int,
    Number,
    Bool,
}

impl Primitive {
    pub fn json_type(self) -> &'static str {
        match self {
            Primitive::String => "string",
            Primitive::Int => "integer",
            Primitive::Number => "number",
            Primitive::Bool => "boolean",
        }
    }
}

/// Shape of one input value.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeDesc {
    Primitive(Primitive),
    /// Homogeneous sequence.
    Array(Box<TypeDesc>),
    /// Structured object. An empty field list accepts any object.
    Object(Vec<Field>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub ty: TypeDesc,
    pub required: bool,
    pub description: Option<String>,
}

impl Default for TypeDesc {
    fn default() -> Self {
        TypeDesc::Primitive(Primitive::String)
    }
}

impl TypeDesc {
    pub const STRING: TypeDesc = TypeDesc::Primitive(Primitive::String);

    /// Map a declared type name. Unknown names fall back to string.
    pub fn named(name: &str) -> TypeDesc {
        match name.trim().to_ascii_lowercase().as_str() {
            "int" | "integer" => TypeDesc::Primitive(Primitive::Int),
            "number" | "float" | "float64" => TypeDesc::Primitive(Primitive::Number),
            "bool" | "boolean" => TypeDesc::Primitive(Primitive::Bool),
            "array" | "[]" => TypeDesc::Array(Box::new(TypeDesc::STRING)),
            "object" | "map" | "dictionary" => TypeDesc::Object(Vec::new()),
            _ => TypeDesc::STRING,
        }
    }

    /// Build a descriptor from a metadata `type`, its `properties` map and
    /// its `items` entry.
    pub fn declared(
        ty: Option<&str>,
        properties: Option<&BTreeMap<String, Value>>,
        items: Option<&Value>,
    ) -> TypeDesc {
        match TypeDesc::named(ty.unwrap_or("string")) {
            TypeDesc::Object(_) => TypeDesc::Object(properties.map(fields).unwrap_or_default()),
            TypeDesc::Array(_) => {
                let element = items.and_then(property).unwrap_or(TypeDesc::STRING);
                TypeDesc::Array(Box::new(element))
            }
            primitive => primitive,
        }
    }

    pub fn is_object(&self) -> bool {
        matches!(self, TypeDesc::Object(_))
    }

    /// JSON Schema fragment for this descriptor.
    pub fn to_json_schema(&self) -> Value {
        match self {
            TypeDesc::Primitive(p) => json!({ "type": p.json_type() }),
            TypeDesc::Array(element) => json!({
                "type": "array",
                "items": element.to_json_schema(),
            }),
            TypeDesc::Object(fields) => {
                let mut schema = Map::new();
                schema.insert("type".into(), json!("object"));
                if !fields.is_empty() {
                    let mut properties = Map::new();
                    for field in fields {
                        let mut entry = field.ty.to_json_schema();
                        if let (Some(description), Some(obj)) =
                            (&field.description, entry.as_object_mut())
                        {
                            obj.insert("description".into(), json!(description));
                        }
                        properties.insert(field.name.clone(), entry);
                    }
                    schema.insert("properties".into(), Value::Object(properties));
                    let required: Vec<&str> = fields
                        .iter()
                        .filter(|f| f.required)
                        .map(|f| f.name.as_str())
                        .collect();
                    if !required.is_empty() {
                        schema.insert("required".into(), json!(required));
                    }
                }
                Value::Object(schema)
            }
        }
    }

    /// Convert a raw query-string value into a JSON value of this type.
    ///
    /// Values that cannot be converted stay strings, so validation reports them.
    pub fn coerce(&self, raw: &str) -> Value {
        let converted = match self {
            TypeDesc::Primitive(Primitive::String) => None,
            TypeDesc::Primitive(Primitive::Int) => raw.trim().parse::<i64>().ok().map(Value::from),
            TypeDesc::Primitive(Primitive::Number) => raw
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number),
            TypeDesc::Primitive(Primitive::Bool) => raw.trim().parse::<bool>().ok().map(Value::Bool),
            TypeDesc::Array(_) => serde_json::from_str::<Value>(raw)
                .ok()
                .filter(Value::is_array),
            TypeDesc::Object(_) => serde_json::from_str::<Value>(raw)
                .ok()
                .filter(Value::is_object),
        };
        converted.unwrap_or_else(|| Value::String(raw.to_string()))
    }
}

fn fields(properties: &BTreeMap<String, Value>) -> Vec<Field> {
    let mut out = Vec::with_capacity(properties.len());
    for (name, value) in properties {
        let Some(ty) = property(value) else {
            log::warn!("invalid property structure for '{}', skipping", name);
            continue;
        };
        out.push(Field {
            name: name.clone(),
            ty,
            required: value.get("required").and_then(Value::as_bool).unwrap_or(true),
            description: value
                .get("description")
                .and_then(Value::as_str)
                .map(str::to_string),
        });
    }
    out
}

/// Parse one `{type, properties?, items?}` entry. Non-objects are rejected.
fn property(value: &Value) -> Option<TypeDesc> {
    let entry = value.as_object()?;
    let nested: Option<BTreeMap<String, Value>> = entry
        .get("properties")
        .and_then(Value::as_object)
        .map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect());
    Some(TypeDesc::declared(
        entry.get("type").and_then(Value::as_str),
        nested.as_ref(),
        entry.get("items"),
    ))
}

/// Compiled JSON Schema used to check request payloads.
pub struct RequestValidator {
    validator: jsonschema::Validator,
}

impl std::fmt::Debug for RequestValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestValidator").finish_non_exhaustive()
    }
}

impl RequestValidator {
    pub fn new(schema: &Value) -> Result<Self, SchemaError> {
        let validator =
            jsonschema::validator_for(schema).map_err(|e| SchemaError(e.to_string()))?;
        Ok(RequestValidator { validator })
    }

    /// All violations, one message per error; empty when `instance` conforms.
    pub fn errors(&self, instance: &Value) -> Vec<String> {
        self.validator
            .iter_errors(instance)
            .map(|e| format!("{}", e))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(value: Value) -> BTreeMap<String, Value> {
        value
            .as_object()
            .unwrap()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    #[test]
    fn aliases_map_to_primitives() {
        assert_eq!(TypeDesc::named("integer"), TypeDesc::Primitive(Primitive::Int));
        assert_eq!(TypeDesc::named("float64"), TypeDesc::Primitive(Primitive::Number));
        assert_eq!(TypeDesc::named("Boolean"), TypeDesc::Primitive(Primitive::Bool));
        assert_eq!(TypeDesc::named("[]"), TypeDesc::Array(Box::new(TypeDesc::STRING)));
        assert_eq!(TypeDesc::named("dictionary"), TypeDesc::Object(Vec::new()));
        assert_eq!(TypeDesc::named("whatever"), TypeDesc::STRING);
    }

    #[test]
    fn nested_object_round_trips_through_json_schema() {
        let ty = TypeDesc::declared(
            Some("object"),
            Some(&props(json!({
                "street": {"type": "string"},
                "geo": {
                    "type": "object",
                    "properties": {
                        "lat": {"type": "number"},
                        "lon": {"type": "number"},
                        "label": {"type": "string", "required": false}
                    }
                },
                "tags": {"type": "array", "items": {"type": "string"}}
            }))),
            None,
        );
        let validator = RequestValidator::new(&ty.to_json_schema()).unwrap();

        let conforming = json!({
            "street": "Main St",
            "geo": {"lat": 1.5, "lon": 2.0},
            "tags": ["a", "b"]
        });
        assert!(validator.errors(&conforming).is_empty());

        let missing_nested = json!({
            "street": "Main St",
            "geo": {"lat": 1.5},
            "tags": []
        });
        let errors = validator.errors(&missing_nested);
        assert!(!errors.is_empty());
        assert!(errors.iter().any(|e| e.contains("lon")));
    }

    #[test]
    fn invalid_property_entries_are_skipped() {
        let ty = TypeDesc::declared(
            Some("object"),
            Some(&props(json!({"ok": {"type": "int"}, "bad": "not-an-object"}))),
            None,
        );
        let TypeDesc::Object(fields) = ty else {
            panic!("expected object");
        };
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].name, "ok");
    }

    #[test]
    fn coerce_follows_declared_type() {
        assert_eq!(TypeDesc::named("int").coerce("42"), json!(42));
        assert_eq!(TypeDesc::named("int").coerce("forty"), json!("forty"));
        assert_eq!(TypeDesc::named("bool").coerce("true"), json!(true));
        assert_eq!(TypeDesc::named("number").coerce("1.5"), json!(1.5));
        assert_eq!(TypeDesc::named("array").coerce(r#"["x"]"#), json!(["x"]));
        assert_eq!(TypeDesc::named("object").coerce("[1]"), json!("[1]"));
        assert_eq!(TypeDesc::STRING.coerce("42"), json!("42"));
    }

    #[test]
    fn free_form_object_accepts_any_object() {
        let validator = RequestValidator::new(&TypeDesc::named("object").to_json_schema()).unwrap();
        assert!(validator.errors(&json!({"anything": [1, 2]})).is_empty());
        assert!(!validator.errors(&json!("nope")).is_empty());
    }
}
