//! Form-value validation and payload validation against the plain schema.

use serde_json::{Map, Value};

use crate::compiler::unwrap_document;
use crate::error::{FieldError, ValidateError};
use crate::loader::strip_markers;
use crate::payload::has_value;
use crate::runtime::{coerce, lookup, values_equal};
use crate::types::{
    display_value, value_key, CanonicalField, CompiledSchema, FieldType, RuntimeStateMap,
};

/// Validate form values against compiled fields and their runtime state.
///
/// Only visible fields are checked, and each field reports at most one
/// error. Errors from different fields are all collected.
///
/// # Errors
///
/// Returns `ValidateError::Invalid` listing every failing field.
pub fn validate_values(
    compiled: &CompiledSchema,
    states: &RuntimeStateMap,
    values: &Map<String, Value>,
) -> Result<(), ValidateError> {
    let current = lookup(values, compiled.discriminator_field())
        .filter(|v| !v.is_null())
        .map(value_key);

    let mut errors = Vec::new();
    for field in &compiled.fields {
        field.walk(&mut |f| {
            if f.is_section() {
                return;
            }
            let state = states.get(&f.path);
            if state.is_some_and(|s| !s.visible) {
                return;
            }
            let required = state.is_some_and(|s| s.required_now);
            let value = lookup(values, &f.path).or_else(|| lookup(values, &f.name));
            if let Some(message) = check_field(f, value, required, current.as_deref()) {
                errors.push(FieldError::new(f.path.clone(), message));
            }
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidateError::Invalid { errors })
    }
}

fn check_field(
    field: &CanonicalField,
    value: Option<&Value>,
    required: bool,
    discriminator: Option<&str>,
) -> Option<String> {
    let label = field.display_name.as_deref().unwrap_or(&field.name);

    if !has_value(value) {
        return required.then(|| format!("{} is required", label));
    }
    let value = value?;

    if let Some(message) = check_type(field.field_type, value, label) {
        return Some(message);
    }

    if !field.enum_values.is_empty() && !contains(&field.enum_values, value) {
        return Some(format!(
            "Invalid value. Must be one of: {}",
            join_values(&field.enum_values)
        ));
    }

    if let (Some(current), Some(by_discriminator)) =
        (discriminator, &field.markers.enum_by_discriminator)
    {
        if let Some(allowed) = by_discriminator.get(current).and_then(Value::as_array) {
            if !contains(allowed, value) {
                return Some(format!(
                    "Invalid value for {}. Must be one of: {}",
                    current,
                    join_values(allowed)
                ));
            }
        }
    }

    if let Some(items) = value.as_array() {
        if let Some(min) = field.min_items.filter(|m| (items.len() as u64) < *m) {
            return Some(format!("{} must have at least {} items", label, min));
        }
        if let Some(max) = field.max_items.filter(|m| (items.len() as u64) > *m) {
            return Some(format!("{} must have at most {} items", label, max));
        }
    }

    if field.field_type.is_numeric() {
        let number = coerce(value, &Value::from(0)).as_f64();
        if let (Some(n), Some(min)) = (number, field.minimum) {
            if n < min {
                return Some(format!("{} must be at least {}", label, min));
            }
        }
        if let (Some(n), Some(max)) = (number, field.maximum) {
            if n > max {
                return Some(format!("{} must be at most {}", label, max));
            }
        }
    }
    None
}

fn check_type(field_type: FieldType, value: &Value, label: &str) -> Option<String> {
    let ok = match field_type {
        FieldType::Number | FieldType::Integer => {
            value.is_number() || value.as_str().is_some_and(|s| s.trim().parse::<f64>().is_ok())
        }
        FieldType::Boolean => value.is_boolean(),
        t if t.is_array() => value.is_array(),
        _ => true,
    };
    if ok {
        return None;
    }
    let expected = match field_type {
        FieldType::Boolean => "a boolean",
        t if t.is_array() => "an array",
        _ => "a number",
    };
    Some(format!("{} must be {}", label, expected))
}

fn contains(allowed: &[Value], value: &Value) -> bool {
    allowed
        .iter()
        .any(|candidate| values_equal(&coerce(value, candidate), candidate))
}

fn join_values(values: &[Value]) -> String {
    values
        .iter()
        .map(display_value)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Validate an assembled payload against the document's plain schema.
///
/// Unwraps the document and strips vendor markers before validating.
///
/// # Errors
///
/// Returns `ValidateError::InvalidSchema` if the stripped schema doesn't
/// compile, or `ValidateError::Invalid` if the payload doesn't match it.
pub fn validate_payload(document: &Value, payload: &Value) -> Result<(), ValidateError> {
    let schema = strip_markers(unwrap_document(document).schema);
    validate_against_schema(&schema, payload)
}

/// Validate a payload against a plain JSON Schema.
pub fn validate_against_schema(schema: &Value, payload: &Value) -> Result<(), ValidateError> {
    let validator = jsonschema::validator_for(schema).map_err(|e| ValidateError::InvalidSchema {
        message: e.to_string(),
    })?;

    let errors: Vec<FieldError> = validator
        .iter_errors(payload)
        .map(|e| FieldError::new(e.instance_path.to_string(), e.to_string()))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidateError::Invalid { errors })
    }
}
