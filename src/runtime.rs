//! Runtime state evaluation - visibility and requiredness for a value snapshot.
//!
//! Evaluation is a pure function of the compiled fields and the snapshot. It
//! never mutates either and never fails.

use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use serde_json::{Map, Number, Value};

use crate::markers::{Condition, Expected};
use crate::types::{
    value_key, CanonicalField, CompiledSchema, RequiredMode, Requirement, RuntimeState,
    RuntimeStateMap,
};

/// Evaluate every field of a compiled schema, children included.
pub fn evaluate(compiled: &CompiledSchema, values: &Map<String, Value>) -> RuntimeStateMap {
    evaluate_fields(&compiled.fields, compiled.discriminator_field(), values)
}

/// Evaluate a field list against a snapshot using an explicit discriminator.
pub fn evaluate_fields(
    fields: &[CanonicalField],
    discriminator: &str,
    values: &Map<String, Value>,
) -> RuntimeStateMap {
    let evaluator = Evaluator::new(fields, discriminator, values);

    let mut states = HashMap::new();
    for field in fields {
        field.walk(&mut |f| {
            states.insert(f.path.clone(), evaluator.state(f));
        });
    }
    states
}

/// Evaluate a single field. Group relevance is computed over `fields`.
pub fn field_state(
    field: &CanonicalField,
    fields: &[CanonicalField],
    discriminator: &str,
    values: &Map<String, Value>,
) -> RuntimeState {
    let evaluator = Evaluator::new(fields, discriminator, values);
    evaluator.state(field)
}

/// Union of discriminator values referenced by each specific group's members.
///
/// Groups whose members reference no discriminator values are absent.
pub fn group_relevance(
    fields: &[CanonicalField],
    discriminator: &str,
) -> HashMap<String, BTreeSet<String>> {
    let mut groups: HashMap<String, BTreeSet<String>> = HashMap::new();
    for field in fields {
        field.walk(&mut |f| {
            let Some(group) = f.markers.specific_group() else {
                return;
            };
            let referenced = f.markers.discriminator_values(discriminator);
            if !referenced.is_empty() {
                groups.entry(group.to_string()).or_default().extend(referenced);
            }
        });
    }
    groups
}

/// Look a path up in the snapshot: exact key first, then nested objects.
pub fn lookup<'v>(values: &'v Map<String, Value>, path: &str) -> Option<&'v Value> {
    if let Some(value) = values.get(path) {
        return Some(value);
    }
    let mut segments = path.split('.');
    let mut current = values.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Coerce `actual` toward the JSON type of `expected`.
///
/// Numeric strings become numbers when a number is expected and numbers
/// become strings when a string is expected. Anything else is unchanged.
pub fn coerce<'a>(actual: &'a Value, expected: &Value) -> Cow<'a, Value> {
    match (expected, actual) {
        (Value::Number(_), Value::String(s)) => match s.trim().parse::<f64>() {
            Ok(parsed) if !s.trim().is_empty() => Number::from_f64(parsed)
                .map(|n| Cow::Owned(Value::Number(n)))
                .unwrap_or(Cow::Borrowed(actual)),
            _ => Cow::Borrowed(actual),
        },
        (Value::String(_), Value::Number(n)) => Cow::Owned(Value::String(n.to_string())),
        _ => Cow::Borrowed(actual),
    }
}

/// Equality with numbers compared by value (`3` equals `3.0`).
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// True when every clause of the condition holds for the snapshot.
pub fn condition_met(condition: &Condition, values: &Map<String, Value>) -> bool {
    condition.clauses.iter().all(|clause| {
        let Some(actual) = lookup(values, &clause.field) else {
            return false;
        };
        match &clause.expected {
            Expected::One(expected) => values_equal(&coerce(actual, expected), expected),
            Expected::AnyOf(accepted) => {
                let normalized = match accepted.first() {
                    Some(first) => coerce(actual, first),
                    None => Cow::Borrowed(actual),
                };
                accepted.iter().any(|v| values_equal(&normalized, v))
            }
        }
    })
}

/// Requiredness rule that applies to a field, in priority order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RequirementRule<'a> {
    /// Discriminator-keyed status map.
    Structural {
        trigger: Option<&'a str>,
        statuses: &'a BTreeMap<String, RequiredMode>,
    },
    /// Requiredness predicate marker.
    Predicate(&'a Condition),
    /// Static flag or `*`-keyed status.
    Static(RequiredMode),
    Default,
}

impl<'a> RequirementRule<'a> {
    pub fn for_field(field: &'a CanonicalField) -> Self {
        match (&field.required, &field.markers.required_when) {
            (Requirement::ByDiscriminator { trigger, statuses }, _) => {
                RequirementRule::Structural {
                    trigger: trigger.as_deref(),
                    statuses,
                }
            }
            (_, Some(predicate)) => RequirementRule::Predicate(&predicate.condition),
            (Requirement::Static { required: true }, None) => {
                RequirementRule::Static(RequiredMode::Required)
            }
            (Requirement::Wildcard { status }, None) => RequirementRule::Static(*status),
            (Requirement::Static { required: false }, None) => RequirementRule::Default,
        }
    }
}

struct Evaluator<'a> {
    values: &'a Map<String, Value>,
    /// Current discriminator value in map-key form, if set.
    discriminator: Option<String>,
    groups: HashMap<String, BTreeSet<String>>,
}

impl<'a> Evaluator<'a> {
    fn new(fields: &[CanonicalField], discriminator: &str, values: &'a Map<String, Value>) -> Self {
        Self {
            values,
            discriminator: lookup(values, discriminator)
                .filter(|v| !v.is_null())
                .map(value_key),
            groups: group_relevance(fields, discriminator),
        }
    }

    fn state(&self, field: &CanonicalField) -> RuntimeState {
        if !self.visible(field) {
            return RuntimeState::hidden();
        }
        let (required_mode, required_now) = self.required(field);
        RuntimeState {
            visible: true,
            required_mode,
            required_now,
            enabled: true,
        }
    }

    /// Visibility rules in order; the first failing rule hides the field.
    fn visible(&self, field: &CanonicalField) -> bool {
        let markers = &field.markers;

        if let Some(predicate) = &markers.visible_when {
            if !condition_met(&predicate.condition, self.values) {
                return false;
            }
        }
        if let Some(predicate) = &markers.required_when {
            if !condition_met(&predicate.condition, self.values) {
                return false;
            }
        }

        // without a discriminator value there is nothing to judge against
        let Some(current) = self.discriminator.as_deref() else {
            return true;
        };

        if let Some(relevance) = &markers.relevance {
            match relevance.get(current) {
                None | Some(Value::Bool(false)) => return false,
                _ => {}
            }
        }
        if let Some(enums) = &markers.enum_by_discriminator {
            if !enums.contains_key(current) {
                return false;
            }
        }
        if let Some(bounds) = &markers.bounds {
            if !bounds.is_empty() && !bounds.contains_key(current) {
                return false;
            }
        }
        if let Some(allowed) = markers.specific_group().and_then(|g| self.groups.get(g)) {
            if !allowed.is_empty() && !allowed.contains(current) {
                return false;
            }
        }
        true
    }

    fn required(&self, field: &CanonicalField) -> (RequiredMode, bool) {
        match RequirementRule::for_field(field) {
            RequirementRule::Structural { trigger, statuses } => {
                self.structural(trigger, statuses)
            }
            RequirementRule::Predicate(condition) => {
                (RequiredMode::Conditional, condition_met(condition, self.values))
            }
            RequirementRule::Static(status) => (status, status == RequiredMode::Required),
            RequirementRule::Default => (RequiredMode::Optional, false),
        }
    }

    fn structural(
        &self,
        trigger: Option<&str>,
        statuses: &BTreeMap<String, RequiredMode>,
    ) -> (RequiredMode, bool) {
        let resolved = match trigger {
            Some(trigger) => lookup(self.values, trigger)
                .filter(|v| !v.is_null())
                .map(value_key),
            None => self
                .values
                .values()
                .map(value_key)
                .find(|candidate| statuses.contains_key(candidate)),
        };

        let Some(status) = resolved.as_deref().and_then(|key| statuses.get(key)) else {
            // cannot confirm the trigger, never assume required
            return (RequiredMode::Conditional, false);
        };

        let required_now = *status == RequiredMode::Required;
        let distinct: HashSet<_> = statuses.values().collect();
        let mode = if distinct.len() > 1 {
            RequiredMode::Conditional
        } else if required_now {
            RequiredMode::Required
        } else {
            RequiredMode::Optional
        };
        (mode, required_now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile;
    use crate::markers::FieldMarkers;
    use crate::types::CompileOptions;
    use serde_json::json;

    fn snapshot(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    fn field(name: &str, definition: Value) -> CanonicalField {
        CanonicalField {
            path: name.to_string(),
            name: name.to_string(),
            markers: FieldMarkers::from_definition(&definition),
            ..CanonicalField::default()
        }
    }

    fn iteration_schema() -> CompiledSchema {
        compile(
            &json!({
                "properties": {
                    "ITERATION_METHOD": { "enum": ["NEWTON", "ARC", "DISP"] },
                    "NUMBER_STEPS": { "type": "integer" },
                    "MAX_ITERATIONS": { "type": "integer" }
                },
                "required": ["ITERATION_METHOD"],
                "allOf": [{
                    "if": { "properties": { "ITERATION_METHOD": { "const": "NEWTON" } } },
                    "then": { "required": ["NUMBER_STEPS", "MAX_ITERATIONS"] }
                }]
            }),
            &CompileOptions::default(),
        )
    }

    // === Coercion ===

    #[test]
    fn coerce_numeric_string_to_number() {
        assert_eq!(coerce(&json!("3"), &json!(3)).into_owned(), json!(3.0));
        assert!(values_equal(&coerce(&json!("3"), &json!(3)), &json!(3)));
    }

    #[test]
    fn coerce_keeps_non_numeric_string() {
        assert_eq!(coerce(&json!("abc"), &json!(3)).into_owned(), json!("abc"));
        assert_eq!(coerce(&json!(""), &json!(3)).into_owned(), json!(""));
    }

    #[test]
    fn coerce_number_to_string() {
        assert_eq!(coerce(&json!(2), &json!("2")).into_owned(), json!("2"));
    }

    #[test]
    fn condition_value_set_uses_first_element_type() {
        let condition = Condition::from_object(&json!({ "STYPE": [1, 2] })).unwrap();
        assert!(condition_met(&condition, &snapshot(json!({ "STYPE": "2" }))));
        assert!(!condition_met(&condition, &snapshot(json!({ "STYPE": "5" }))));
    }

    #[test]
    fn condition_missing_value_fails() {
        let condition = Condition::from_object(&json!({ "MODE": "A" })).unwrap();
        assert!(!condition_met(&condition, &Map::new()));
    }

    #[test]
    fn lookup_walks_nested_objects() {
        let values = snapshot(json!({ "SECTION": { "SHAPE": "BOX" }, "A.B": 1 }));
        assert_eq!(lookup(&values, "SECTION.SHAPE"), Some(&json!("BOX")));
        assert_eq!(lookup(&values, "A.B"), Some(&json!(1)));
        assert_eq!(lookup(&values, "SECTION.MISSING"), None);
    }

    // === Scenarios ===

    #[test]
    fn iteration_method_toggles_conditional_fields() {
        let compiled = iteration_schema();
        let arc = snapshot(json!({
            "ITERATION_METHOD": "ARC",
            "NUMBER_STEPS": 10,
            "MAX_ITERATIONS": 30
        }));
        let before = arc.clone();
        let states = evaluate(&compiled, &arc);
        for name in ["NUMBER_STEPS", "MAX_ITERATIONS"] {
            assert!(!states[name].visible, "{} should be hidden for ARC", name);
            assert!(!states[name].required_now);
            assert_eq!(states[name].required_mode, RequiredMode::NotApplicable);
        }
        assert_eq!(arc, before);

        let mut newton = arc.clone();
        newton.insert("ITERATION_METHOD".into(), json!("NEWTON"));
        let states = evaluate(&compiled, &newton);
        for name in ["NUMBER_STEPS", "MAX_ITERATIONS"] {
            assert!(states[name].visible, "{} should be visible for NEWTON", name);
            assert!(states[name].required_now);
            assert!(states[name].enabled);
        }
        assert_eq!(newton.get("NUMBER_STEPS"), Some(&json!(10)));
    }

    #[test]
    fn section_hidden_with_its_group() {
        let compiled = iteration_schema();
        let states = evaluate(&compiled, &snapshot(json!({ "ITERATION_METHOD": "DISP" })));
        assert!(!states["__section_branch_0"].visible);
        let states = evaluate(&compiled, &snapshot(json!({ "ITERATION_METHOD": "NEWTON" })));
        assert!(states["__section_branch_0"].visible);
        assert_eq!(states["__section_branch_0"].required_mode, RequiredMode::Optional);
    }

    #[test]
    fn group_hidden_for_unreferenced_discriminator() {
        let fields = vec![
            field("TYPE", json!({})),
            field("AREA", json!({ "x-ui": { "group": "Member" }, "x-required-by-type": { "BEAM": true } })),
            field("INERTIA", json!({ "x-ui": { "group": "Member" }, "x-enum-by-type": { "TRUSS": [1] } })),
            field("NOTE", json!({ "x-ui": { "group": "Member" } })),
            field("NAME", json!({ "x-ui": { "group": "Common" } })),
        ];
        let states = evaluate_fields(&fields, "TYPE", &snapshot(json!({ "TYPE": "TENSTR" })));
        assert!(!states["AREA"].visible);
        assert!(!states["INERTIA"].visible);
        assert!(!states["NOTE"].visible);
        assert!(states["NAME"].visible);

        let states = evaluate_fields(&fields, "TYPE", &snapshot(json!({ "TYPE": "TRUSS" })));
        assert!(states["NOTE"].visible);
        assert!(states["INERTIA"].visible);
        assert!(!states["AREA"].visible);
    }

    // === Visibility rules ===

    #[test]
    fn visible_when_mismatch_hides_and_clears_requiredness() {
        let mut f = field("DEPTH", json!({ "x-visible-when": { "SHAPE": "BOX" } }));
        f.required = Requirement::fixed(true);
        let states = evaluate_fields(&[f], "TYPE", &snapshot(json!({ "SHAPE": "PIPE" })));
        assert_eq!(states["DEPTH"], RuntimeState::hidden());
    }

    #[test]
    fn required_when_unmet_hides() {
        let f = field("SPRING", json!({ "x-required-when": { "SUPPORT": "ELASTIC" } }));
        let states = evaluate_fields(&[f], "TYPE", &snapshot(json!({ "SUPPORT": "FIXED" })));
        assert!(!states["SPRING"].visible);
    }

    #[test]
    fn relevance_false_hides() {
        let f = field("ANGLE", json!({ "x-required-by-type": { "BEAM": false, "TRUSS": true } }));
        let fields = [f];
        assert!(!evaluate_fields(&fields, "TYPE", &snapshot(json!({ "TYPE": "BEAM" })))["ANGLE"].visible);
        assert!(evaluate_fields(&fields, "TYPE", &snapshot(json!({ "TYPE": "TRUSS" })))["ANGLE"].visible);
    }

    #[test]
    fn enum_map_missing_key_hides() {
        let fields = [field("SUBTYPE", json!({ "x-enum-by-type": { "PLATE": [1, 2] } }))];
        assert!(!evaluate_fields(&fields, "TYPE", &snapshot(json!({ "TYPE": "BEAM" })))["SUBTYPE"].visible);
        assert!(evaluate_fields(&fields, "TYPE", &snapshot(json!({ "TYPE": "PLATE" })))["SUBTYPE"].visible);
    }

    #[test]
    fn empty_bounds_map_does_not_hide() {
        let fields = [
            field("A", json!({ "x-value-constraint": {} })),
            field("B", json!({ "x-value-constraint": { "TENSTR": "< 0" } })),
        ];
        let states = evaluate_fields(&fields, "TYPE", &snapshot(json!({ "TYPE": "BEAM" })));
        assert!(states["A"].visible);
        assert!(!states["B"].visible);
    }

    #[test]
    fn missing_discriminator_skips_discriminator_rules() {
        let fields = [field("SUBTYPE", json!({ "x-enum-by-type": { "PLATE": [1] }, "x-group": "Plate" }))];
        let states = evaluate_fields(&fields, "TYPE", &Map::new());
        assert!(states["SUBTYPE"].visible);
    }

    #[test]
    fn numeric_discriminator_matches_string_keys() {
        let fields = [field("K", json!({ "x-required-by-type": { "3": true } }))];
        let states = evaluate_fields(&fields, "STYPE", &snapshot(json!({ "STYPE": 3 })));
        assert!(states["K"].visible);
    }

    #[test]
    fn by_type_markers_read_type_when_branch_tests_another_field() {
        let compiled = compile(
            &json!({
                "properties": {
                    "TYPE": { "enum": ["BEAM", "TRUSS"] },
                    "iMETHOD": { "type": "integer", "enum": [1, 2] },
                    "STYPE": { "type": "integer", "x-enum-by-type": { "BEAM": [1, 2] } },
                    "X": { "type": "number" }
                },
                "allOf": [{
                    "if": { "properties": { "iMETHOD": { "const": 1 } } },
                    "then": { "required": ["X"] }
                }]
            }),
            &CompileOptions::default(),
        );
        assert_eq!(compiled.discriminator.as_deref(), Some("TYPE"));

        let states = evaluate(&compiled, &snapshot(json!({ "TYPE": "BEAM", "iMETHOD": 1 })));
        assert!(states["STYPE"].visible);
        assert!(states["X"].visible);
        assert!(states["X"].required_now);

        let states = evaluate(&compiled, &snapshot(json!({ "TYPE": "TRUSS", "iMETHOD": 1 })));
        assert!(!states["STYPE"].visible);
        assert!(states["X"].required_now);
    }

    #[test]
    fn float_discriminator_matches_integer_keys() {
        let fields = [field("K", json!({ "x-enum-by-type": { "3": [1] } }))];
        let states = evaluate_fields(&fields, "STYPE", &snapshot(json!({ "STYPE": 3.0 })));
        assert!(states["K"].visible);
    }

    // === Requiredness rules ===

    #[test]
    fn branch_visible_field_is_required_for_float_trigger() {
        let compiled = compile(
            &json!({
                "properties": {
                    "MODE": { "type": "integer", "enum": [1, 2] },
                    "X": { "type": "number" }
                },
                "allOf": [{
                    "if": { "properties": { "MODE": { "const": 1 } } },
                    "then": { "required": ["X"] }
                }]
            }),
            &CompileOptions::default(),
        );
        let states = evaluate(&compiled, &snapshot(json!({ "MODE": 1.0 })));
        assert!(states["X"].visible);
        assert!(states["X"].required_now);
        assert_eq!(states["X"].required_mode, RequiredMode::Conditional);

        let states = evaluate(&compiled, &snapshot(json!({ "MODE": "1" })));
        assert!(states["X"].visible);
        assert!(states["X"].required_now);
    }

    #[test]
    fn static_required_when_visible() {
        let mut f = field("ID", json!({}));
        f.required = Requirement::fixed(true);
        let fields = [f];
        for values in [json!({}), json!({ "TYPE": "X" }), json!({ "ID": "" })] {
            let state = evaluate_fields(&fields, "TYPE", &snapshot(values))["ID"];
            assert!(state.visible);
            assert!(state.required_now);
            assert_eq!(state.required_mode, RequiredMode::Required);
        }
    }

    #[test]
    fn default_is_optional() {
        let states = evaluate_fields(&[field("X", json!({}))], "TYPE", &Map::new());
        assert_eq!(states["X"].required_mode, RequiredMode::Optional);
        assert!(!states["X"].required_now);
    }

    #[test]
    fn predicate_requirement_is_conditional() {
        let f = field("SPRING", json!({ "x-required-when": { "SUPPORT": ["ELASTIC", "SPRING"] } }));
        let states = evaluate_fields(&[f], "TYPE", &snapshot(json!({ "SUPPORT": "SPRING" })));
        assert_eq!(states["SPRING"].required_mode, RequiredMode::Conditional);
        assert!(states["SPRING"].required_now);
    }

    #[test]
    fn structural_mixed_statuses_are_conditional() {
        let compiled = iteration_schema();
        let states = evaluate(&compiled, &snapshot(json!({ "ITERATION_METHOD": "NEWTON" })));
        assert_eq!(states["NUMBER_STEPS"].required_mode, RequiredMode::Conditional);
    }

    #[test]
    fn structural_single_status_reports_it() {
        let mut f = field("X", json!({}));
        f.required = Requirement::ByDiscriminator {
            trigger: Some("TYPE".into()),
            statuses: [("A".to_string(), RequiredMode::Required)].into_iter().collect(),
        };
        let states = evaluate_fields(&[f], "TYPE", &snapshot(json!({ "TYPE": "A" })));
        assert_eq!(states["X"].required_mode, RequiredMode::Required);
        assert!(states["X"].required_now);
    }

    #[test]
    fn structural_unresolved_trigger_is_not_required() {
        let mut f = field("X", json!({}));
        f.required = Requirement::ByDiscriminator {
            trigger: Some("TYPE".into()),
            statuses: [("A".to_string(), RequiredMode::Required)].into_iter().collect(),
        };
        let fields = [f];
        for values in [json!({}), json!({ "TYPE": "Z" })] {
            let state = evaluate_fields(&fields, "TYPE", &snapshot(values))["X"];
            assert_eq!(state.required_mode, RequiredMode::Conditional);
            assert!(!state.required_now);
        }
    }

    #[test]
    fn structural_without_trigger_scans_values() {
        let mut f = field("X", json!({}));
        f.required = Requirement::ByDiscriminator {
            trigger: None,
            statuses: [
                ("WALL".to_string(), RequiredMode::Required),
                ("SLAB".to_string(), RequiredMode::Optional),
            ]
            .into_iter()
            .collect(),
        };
        let states = evaluate_fields(
            &[f],
            "TYPE",
            &snapshot(json!({ "NAME": "w1", "ELEM": "WALL" })),
        );
        assert!(states["X"].required_now);
    }

    #[test]
    fn wildcard_statuses() {
        let cases = [
            (RequiredMode::Required, true),
            (RequiredMode::Conditional, false),
            (RequiredMode::NotApplicable, false),
            (RequiredMode::Optional, false),
        ];
        for (status, required_now) in cases {
            let mut f = field("X", json!({}));
            f.required = Requirement::Wildcard { status };
            let state = evaluate_fields(&[f], "TYPE", &Map::new())["X"];
            assert_eq!(state.required_mode, status);
            assert_eq!(state.required_now, required_now);
        }
    }

    #[test]
    fn requirement_rule_priority() {
        let mut f = field("X", json!({ "x-required-when": { "A": 1 } }));
        f.required = Requirement::fixed(true);
        assert!(matches!(RequirementRule::for_field(&f), RequirementRule::Predicate(_)));

        f.required = Requirement::ByDiscriminator {
            trigger: None,
            statuses: BTreeMap::new(),
        };
        assert!(matches!(
            RequirementRule::for_field(&f),
            RequirementRule::Structural { .. }
        ));
    }

    // === Children ===

    #[test]
    fn children_see_top_level_snapshot() {
        let compiled = compile(
            &json!({
                "properties": {
                    "SHAPE": { "enum": ["BOX", "PIPE"] },
                    "DIMS": {
                        "type": "object",
                        "required": ["WIDTH"],
                        "properties": {
                            "WIDTH": { "type": "number", "x-visible-when": { "SHAPE": "BOX" } },
                            "RADIUS": { "type": "number", "x-visible-when": { "SHAPE": "PIPE" } }
                        }
                    }
                }
            }),
            &CompileOptions::default(),
        );
        let states = evaluate(&compiled, &snapshot(json!({ "SHAPE": "BOX" })));
        assert!(states["DIMS.WIDTH"].visible);
        assert!(states["DIMS.WIDTH"].required_now);
        assert!(!states["DIMS.RADIUS"].visible);
    }

    #[test]
    fn evaluation_is_idempotent() {
        let compiled = iteration_schema();
        let values = snapshot(json!({ "ITERATION_METHOD": "NEWTON", "NUMBER_STEPS": "5" }));
        assert_eq!(evaluate(&compiled, &values), evaluate(&compiled, &values));
    }

    #[test]
    fn field_state_matches_map_entry() {
        let compiled = iteration_schema();
        let values = snapshot(json!({ "ITERATION_METHOD": "NEWTON" }));
        let steps = compiled.find("NUMBER_STEPS").unwrap();
        let state = field_state(steps, &compiled.fields, "ITERATION_METHOD", &values);
        assert_eq!(state, evaluate(&compiled, &values)["NUMBER_STEPS"]);
    }
}
