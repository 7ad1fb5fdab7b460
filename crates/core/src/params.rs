//! Source-agnostic parameter model shared by the CLI and HTTP surfaces.

use serde_json::{json, Map, Value};

use crate::introspect::Codec;
use crate::metadata::{ArgumentMetadata, CommandMetadata, OptionMetadata};
use crate::typedesc::TypeDesc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Argument,
    Option,
}

/// How a flag value is turned into content before validation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileSourcing {
    /// The value names a file to read, or `-` for standard input.
    pub from_file: bool,
    /// Content is used as a value instead of being merged as a JSON object.
    pub raw: bool,
}

/// One declared input.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterDescriptor {
    pub name: String,
    pub kind: ParamKind,
    pub required: bool,
    pub ty: TypeDesc,
    pub default: Option<Value>,
    pub choices: Vec<String>,
    /// Fallback environment variables, tried in order.
    pub env: Vec<String>,
    pub sourcing: FileSourcing,
    pub description: String,
    pub hidden: bool,
    pub shorthand: Option<char>,
    /// Verbatim flag spellings, shown in help.
    pub help: Option<String>,
}

impl ParameterDescriptor {
    pub fn argument(meta: &ArgumentMetadata) -> Self {
        ParameterDescriptor {
            name: meta.normalized_name(),
            kind: ParamKind::Argument,
            required: meta.is_required(),
            ty: TypeDesc::declared(meta.ty.as_deref(), meta.properties.as_ref(), meta.items.as_ref()),
            default: None,
            choices: Vec::new(),
            env: Vec::new(),
            sourcing: FileSourcing::default(),
            description: meta.description.clone(),
            hidden: false,
            shorthand: None,
            help: None,
        }
    }

    pub fn option(meta: &OptionMetadata) -> Self {
        let names = meta.names();
        ParameterDescriptor {
            name: names.flag,
            kind: ParamKind::Option,
            required: false,
            ty: TypeDesc::declared(meta.ty.as_deref(), meta.properties.as_ref(), meta.items.as_ref()),
            default: meta.default_text().and(meta.default.clone()),
            choices: meta.choices.clone(),
            env: meta.env.clone(),
            sourcing: FileSourcing {
                from_file: meta.file,
                raw: meta.rawdata,
            },
            description: meta.description.clone(),
            hidden: meta.hidden,
            shorthand: names.shorthand,
            help: Some(names.help),
        }
    }

    /// A plain string option for one introspected variable.
    pub fn introspected(codec: &Codec) -> Self {
        ParameterDescriptor {
            name: codec.name.clone(),
            kind: ParamKind::Option,
            required: false,
            ty: codec.type_desc(),
            default: None,
            choices: Vec::new(),
            env: Vec::new(),
            sourcing: FileSourcing::default(),
            description: format!("The {}", codec.name),
            hidden: false,
            shorthand: None,
            help: None,
        }
    }

    /// Help line for the flag: verbatim spellings, description, choices and
    /// the stdin hint.
    pub fn flag_help(&self) -> String {
        let mut text = self.description.clone();
        if !self.choices.is_empty() {
            text.push_str(&format!(" (Choices: [{}])", self.choices.join(", ")));
        }
        if self.sourcing.from_file {
            text.push_str(" (\"-\" for read from stdin)");
        }
        match &self.help {
            Some(help) if !text.trim().is_empty() => format!("{} {}", help, text.trim_start()),
            _ => text.trim_start().to_string(),
        }
    }

    /// Default value as flag text.
    pub fn default_text(&self) -> Option<String> {
        match self.default.as_ref()? {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }

    /// JSON Schema fragment for this input inside a request body.
    pub fn json_schema(&self) -> Value {
        let mut schema = self.ty.to_json_schema();
        if let Some(obj) = schema.as_object_mut() {
            if !self.description.is_empty() {
                obj.insert("description".into(), json!(self.description));
            }
            if !self.choices.is_empty() {
                obj.insert("enum".into(), json!(self.choices));
            }
            if let Some(default) = &self.default {
                obj.insert("default".into(), default.clone());
            }
            if self.sourcing.from_file && !self.sourcing.raw {
                obj.insert("format".into(), json!("binary"));
            }
        }
        schema
    }
}

/// Ordered arguments plus options for one contract.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterSet {
    pub description: String,
    /// In positional order.
    pub arguments: Vec<ParameterDescriptor>,
    pub options: Vec<ParameterDescriptor>,
}

impl ParameterSet {
    pub fn from_metadata(meta: &CommandMetadata) -> Self {
        ParameterSet {
            description: meta.description.clone(),
            arguments: meta.arguments.iter().map(ParameterDescriptor::argument).collect(),
            options: meta.options.iter().map(ParameterDescriptor::option).collect(),
        }
    }

    pub fn from_introspection(codecs: &[Codec]) -> Self {
        ParameterSet {
            description: String::new(),
            arguments: Vec::new(),
            options: codecs.iter().map(ParameterDescriptor::introspected).collect(),
        }
    }

    /// Number of arguments declared as `<name>`.
    pub fn required_count(&self) -> usize {
        self.arguments.iter().filter(|a| a.required).count()
    }

    pub fn all(&self) -> impl Iterator<Item = &ParameterDescriptor> {
        self.arguments.iter().chain(self.options.iter())
    }

    pub fn find(&self, name: &str) -> Option<&ParameterDescriptor> {
        self.all().find(|p| p.name == name)
    }

    /// Object schema accepted by the HTTP surface. Required arguments are
    /// required properties; additional properties are allowed.
    pub fn request_schema(&self) -> Value {
        let mut properties = Map::new();
        for param in self.all() {
            properties.insert(param.name.clone(), param.json_schema());
        }
        let required: Vec<&str> = self
            .arguments
            .iter()
            .filter(|a| a.required)
            .map(|a| a.name.as_str())
            .collect();

        let mut schema = Map::new();
        schema.insert("type".into(), json!("object"));
        schema.insert("properties".into(), Value::Object(properties));
        if !required.is_empty() {
            schema.insert("required".into(), json!(required));
        }
        schema.insert("additionalProperties".into(), json!(true));
        Value::Object(schema)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    ExplicitMetadata,
    DerivedIntrospection,
}

/// Resolved schema of one contract.
#[derive(Debug, Clone, PartialEq)]
pub enum Schema {
    Explicit(ParameterSet),
    Derived(ParameterSet),
    /// Metadata existed but could not be decoded.
    Unresolved,
}

impl Schema {
    pub fn origin(&self) -> Option<Origin> {
        match self {
            Schema::Explicit(_) => Some(Origin::ExplicitMetadata),
            Schema::Derived(_) => Some(Origin::DerivedIntrospection),
            Schema::Unresolved => None,
        }
    }

    /// Parameters of this schema; empty when unresolved.
    pub fn parameters(&self) -> ParameterSet {
        match self {
            Schema::Explicit(set) | Schema::Derived(set) => set.clone(),
            Schema::Unresolved => ParameterSet::default(),
        }
    }
}
