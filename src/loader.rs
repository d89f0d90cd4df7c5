//! Loading schema and value documents, and marker stripping.

use std::path::Path;

use serde_json::{Map, Value};

use crate::error::LoadError;
use crate::markers::is_marker_key;
use crate::types::json_type_name;

/// Load a JSON document from a file path.
///
/// # Errors
///
/// Returns `LoadError::FileNotFound` if the file doesn't exist,
/// or `LoadError::InvalidJson` if the file isn't valid JSON.
pub fn load_schema(path: &Path) -> Result<Value, LoadError> {
    if !path.exists() {
        return Err(LoadError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let content = std::fs::read_to_string(path).map_err(|source| LoadError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;

    load_schema_str(&content)
}

/// Load a JSON document from a string.
///
/// # Errors
///
/// Returns `LoadError::InvalidJson` if the string isn't valid JSON.
pub fn load_schema_str(content: &str) -> Result<Value, LoadError> {
    serde_json::from_str(content).map_err(|source| LoadError::InvalidJson { source })
}

/// Load a form value snapshot. The document must be a JSON object.
///
/// # Errors
///
/// Returns the `load_schema` errors, or `LoadError::NotAnObject` when the
/// document is valid JSON of another type.
pub fn load_values(path: &Path) -> Result<Map<String, Value>, LoadError> {
    match load_schema(path)? {
        Value::Object(map) => Ok(map),
        other => Err(LoadError::NotAnObject {
            actual: json_type_name(&other).to_string(),
        }),
    }
}

/// Remove every vendor marker (`x-` key) from a schema, recursively.
///
/// The result is a plain JSON Schema suitable for a standard validator.
pub fn strip_markers(schema: &Value) -> Value {
    match schema {
        Value::Object(map) => {
            let stripped = map
                .iter()
                .filter(|(key, _)| !is_marker_key(key))
                .map(|(key, value)| (key.clone(), strip_markers(value)))
                .collect();
            Value::Object(stripped)
        }
        Value::Array(items) => Value::Array(items.iter().map(strip_markers).collect()),
        other => other.clone(),
    }
}
