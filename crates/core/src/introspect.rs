//! Cleaning of engine introspection reports.
//!
//! Introspection lists every variable a contract touches, including the ones
//! it writes. Names bound by `output into '<x>'` or `output as '<x>'` are
//! outputs and are removed before the report becomes an input schema.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::typedesc::TypeDesc;

/// One introspected variable.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Codec {
    pub encoding: String,
    pub missing: bool,
    pub name: String,
    pub zentype: String,
}

impl Codec {
    /// Declared type name: zentype `a` is an array, `d` an object, anything
    /// else uses the encoding.
    pub fn type_name(&self) -> &str {
        match self.zentype.as_str() {
            "a" => "array",
            "d" => "object",
            _ => &self.encoding,
        }
    }

    pub fn type_desc(&self) -> TypeDesc {
        match TypeDesc::named(self.type_name()) {
            TypeDesc::Array(_) => TypeDesc::Array(Box::new(TypeDesc::named(&self.encoding))),
            other => other,
        }
    }
}

/// Variable names the contract produces.
pub fn produced_names(contract: &str) -> Vec<String> {
    const MARKERS: [&str; 2] = ["output into '", "output as '"];

    let mut names = Vec::new();
    for marker in MARKERS {
        let mut rest = contract;
        while let Some(start) = rest.find(marker) {
            let after = &rest[start + marker.len()..];
            match after.find('\'') {
                Some(end) if end > 0 => {
                    names.push(after[..end].to_string());
                    rest = &after[end + 1..];
                }
                Some(end) => rest = &after[end + 1..],
                None => break,
            }
        }
    }
    names
}

/// Remove every key in `names` from `data`, at every nesting depth.
pub fn remove_keys(data: &mut Map<String, Value>, names: &[String]) {
    for name in names {
        data.remove(name);
    }
    for value in data.values_mut() {
        if let Value::Object(nested) = value {
            remove_keys(nested, names);
        }
    }
}

/// Parse an introspection report and drop the contract's own outputs.
///
/// Entries are returned in report key order. A codec without a `name` takes
/// its key.
pub fn clean(contract: &str, report: &str) -> Result<Vec<Codec>, serde_json::Error> {
    let mut data: Map<String, Value> = serde_json::from_str(report)?;
    let produced = produced_names(contract);
    remove_keys(&mut data, &produced);

    let mut codecs = Vec::with_capacity(data.len());
    for (key, value) in data {
        let mut codec: Codec = serde_json::from_value(value)?;
        if codec.name.is_empty() {
            codec.name = key;
        }
        codecs.push(codec);
    }
    Ok(codecs)
}
