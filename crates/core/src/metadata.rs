//! `<name>.metadata.json` sidecar model.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use crate::error::MetadataError;
use crate::locate::ContractIdentity;

/// Explicit command description loaded from a metadata sidecar.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CommandMetadata {
    pub description: String,
    pub arguments: Vec<ArgumentMetadata>,
    pub options: Vec<OptionMetadata>,
}

/// A positional argument. `<name>` marks it required, `[name]` optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ArgumentMetadata {
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub ty: Option<String>,
    pub properties: Option<BTreeMap<String, Value>>,
    pub items: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OptionMetadata {
    /// Comma-separated flag spellings, e.g. `"-s, --size <size>"`.
    pub name: String,
    pub description: String,
    pub default: Option<Value>,
    pub choices: Vec<String>,
    pub env: Vec<String>,
    pub hidden: bool,
    pub file: bool,
    pub rawdata: bool,
    #[serde(rename = "type")]
    pub ty: Option<String>,
    pub properties: Option<BTreeMap<String, Value>>,
    pub items: Option<Value>,
}

impl ArgumentMetadata {
    /// Whether the raw name is wrapped in angle brackets.
    pub fn is_required(&self) -> bool {
        let name = self.name.trim();
        name.starts_with('<') && name.ends_with('>')
    }

    pub fn normalized_name(&self) -> String {
        normalize_argument_name(&self.name)
    }
}

impl OptionMetadata {
    pub fn names(&self) -> OptionNames {
        OptionNames::parse(&self.name)
    }

    /// Default rendered as a flag value.
    pub fn default_text(&self) -> Option<String> {
        match &self.default {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) if s.is_empty() => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
        }
    }
}

/// Strip the `<>` / `[]` delimiters that mark required and optional arguments.
pub fn normalize_argument_name(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '<' | '>' | '[' | ']'))
        .collect::<String>()
        .trim()
        .to_string()
}

/// Spellings extracted from an option's multi-name field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionNames {
    /// Canonical long flag without leading dashes.
    pub flag: String,
    pub shorthand: Option<char>,
    /// All tokens, verbatim.
    pub help: String,
}

impl OptionNames {
    pub fn parse(raw: &str) -> OptionNames {
        let mut flag = None;
        let mut shorthand = None;

        for token in raw.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            if let Some(long) = token.strip_prefix("--") {
                if flag.is_none() {
                    flag = long.split_whitespace().next().map(str::to_string);
                }
            } else if let Some(short) = token.strip_prefix('-') {
                let short = short.split_whitespace().next().unwrap_or_default();
                let mut chars = short.chars();
                if let (Some(c), None, None) = (chars.next(), chars.next(), shorthand) {
                    shorthand = Some(c);
                }
            }
        }

        let flag = flag
            .filter(|f| !f.is_empty())
            .or_else(|| shorthand.map(|c| c.to_string()))
            .unwrap_or_else(|| raw.trim().trim_start_matches('-').to_string());

        OptionNames {
            flag,
            shorthand,
            help: raw.trim().to_string(),
        }
    }
}

/// Load the metadata sidecar of `contract`.
///
/// A missing sidecar is reported as [`MetadataError::NotFound`] so callers can
/// fall back to introspection.
pub fn load_metadata(contract: &ContractIdentity) -> Result<CommandMetadata, MetadataError> {
    let name = contract.sidecar_name("metadata.json");
    let path = contract.sibling_location(&name);
    let bytes = contract
        .read_sibling(&name)
        .map_err(|source| MetadataError::Read {
            path: path.clone(),
            source,
        })?
        .ok_or_else(|| MetadataError::NotFound { path: path.clone() })?;
    serde_json::from_slice(&bytes).map_err(|source| MetadataError::Decode { path, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locate::{discover, ContractSource, EmbeddedTree};

    #[test]
    fn argument_names_lose_their_delimiters() {
        assert_eq!(normalize_argument_name("<name>"), "name");
        assert_eq!(normalize_argument_name("[title]"), "title");
        assert_eq!(normalize_argument_name("plain"), "plain");
    }

    #[test]
    fn option_names_split_flag_shorthand_and_help() {
        let names = OptionNames::parse("-s, --size <size>");
        assert_eq!(names.flag, "size");
        assert_eq!(names.shorthand, Some('s'));
        assert_eq!(names.help, "-s, --size <size>");

        let long_only = OptionNames::parse("--verbose");
        assert_eq!(long_only.flag, "verbose");
        assert_eq!(long_only.shorthand, None);

        let short_only = OptionNames::parse("-x");
        assert_eq!(short_only.flag, "x");
        assert_eq!(short_only.shorthand, Some('x'));
    }

    #[test]
    fn multi_char_single_dash_is_not_a_shorthand() {
        let names = OptionNames::parse("-ab, --alpha");
        assert_eq!(names.flag, "alpha");
        assert_eq!(names.shorthand, None);
    }

    #[test]
    fn metadata_decodes_with_defaults() {
        let meta: CommandMetadata = serde_json::from_str(
            r#"{
                "description": "Greets someone",
                "arguments": [{"name": "<name>"}, {"name": "[title]", "type": "string"}],
                "options": [
                    {"name": "-s, --size <size>", "choices": ["small", "large"], "default": "small"},
                    {"name": "--count", "type": "int", "default": 3, "env": ["COUNT"]},
                    {"name": "--input", "file": true, "hidden": true}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(meta.description, "Greets someone");
        assert!(meta.arguments[0].is_required());
        assert!(!meta.arguments[1].is_required());
        assert_eq!(meta.options[0].default_text().as_deref(), Some("small"));
        assert_eq!(meta.options[1].default_text().as_deref(), Some("3"));
        assert_eq!(meta.options[1].env, vec!["COUNT"]);
        assert!(meta.options[2].file && meta.options[2].hidden);
        assert!(!meta.options[2].rawdata);
    }

    #[test]
    fn missing_sidecar_is_not_found() {
        let tree = EmbeddedTree::new("contracts").with_file("greet.slang", "x");
        let found = discover(&[ContractSource::Embedded(tree)], ".slang");
        let err = load_metadata(&found.contracts[0]).unwrap_err();
        assert!(matches!(err, MetadataError::NotFound { .. }));
    }

    #[test]
    fn malformed_sidecar_is_a_decode_error() {
        let tree = EmbeddedTree::new("contracts")
            .with_file("greet.slang", "x")
            .with_file("greet.metadata.json", "{ not json");
        let found = discover(&[ContractSource::Embedded(tree)], ".slang");
        let err = load_metadata(&found.contracts[0]).unwrap_err();
        assert!(matches!(err, MetadataError::Decode { .. }));
        assert!(err.to_string().contains("greet.metadata.json"));
    }
}
