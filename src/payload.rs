//! Payload inclusion rule and payload assembly.

use serde_json::{Map, Value};

use crate::runtime::lookup;
use crate::types::{CanonicalField, CompiledSchema, FieldType, RuntimeState, RuntimeStateMap};

/// True when a value counts as filled in: not absent, null or empty string.
///
/// `0` and `false` are real values.
pub fn has_value(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}

/// Decide whether a field belongs in the serialized payload.
///
/// Hidden fields never do. Required fields always do, even when empty.
/// Everything else is included only when it has a value.
pub fn include(value: Option<&Value>, state: &RuntimeState) -> bool {
    if !state.visible {
        return false;
    }
    if state.required_now {
        return true;
    }
    has_value(value)
}

/// Build the request body from compiled fields, states and values.
///
/// Keys are field names, nested under their parent object. Fields without a
/// state entry are treated as visible and optional.
pub fn assemble_payload(
    compiled: &CompiledSchema,
    states: &RuntimeStateMap,
    values: &Map<String, Value>,
) -> Value {
    Value::Object(assemble_fields(&compiled.fields, states, values))
}

fn assemble_fields(
    fields: &[CanonicalField],
    states: &RuntimeStateMap,
    values: &Map<String, Value>,
) -> Map<String, Value> {
    let mut body = Map::new();

    for field in fields {
        if field.is_section() || body.contains_key(&field.name) {
            continue;
        }
        let state = states
            .get(&field.path)
            .copied()
            .unwrap_or(RuntimeState {
                visible: true,
                required_mode: Default::default(),
                required_now: false,
                enabled: true,
            });
        if !state.visible {
            continue;
        }

        if field.field_type == FieldType::Object && !field.children.is_empty() {
            let nested = assemble_fields(&field.children, states, values);
            if !nested.is_empty() || state.required_now {
                body.insert(field.name.clone(), Value::Object(nested));
            }
            continue;
        }

        let value = lookup(values, &field.path).or_else(|| lookup(values, &field.name));
        if include(value, &state) {
            body.insert(field.name.clone(), value.cloned().unwrap_or(Value::Null));
        }
    }
    body
}

/// Re-wrap a body under the argument key the compiler unwrapped, if any.
pub fn wrap_argument(compiled: &CompiledSchema, body: Value) -> Value {
    match &compiled.argument_key {
        Some(key) => {
            let mut wrapper = Map::new();
            wrapper.insert(key.clone(), body);
            Value::Object(wrapper)
        }
        None => body,
    }
}
