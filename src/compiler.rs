//! Canonical compiler - flattens a conditional schema document into fields.
//!
//! The compiler never fails. A missing or malformed document compiles to an
//! empty field list and the problem is logged.

use std::collections::{BTreeMap, HashSet};

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::markers::{Condition, Expected, FieldMarkers, Predicate};
use crate::types::{
    value_key, CanonicalField, CompileOptions, CompiledSchema, FieldCondition, FieldType,
    RequiredMode, Requirement, DEFAULT_DISCRIMINATOR,
};

/// Maximum wrapper layers of each kind peeled off the root.
const MAX_UNWRAP: usize = 2;

/// Keys that mark an object as an actual schema block rather than a wrapper.
const SCHEMA_KEYS: &[&str] = &[
    "properties",
    "required",
    "allOf",
    "oneOf",
    "anyOf",
    "if",
    "type",
];

/// Root of a document after wrapper layers have been removed.
#[derive(Debug, Clone)]
pub struct Unwrapped<'a> {
    pub schema: &'a Value,
    /// Key of the named root wrapper, if one was removed.
    pub root_key: Option<String>,
    /// Property name of the argument wrapper, if one was removed.
    pub argument_key: Option<String>,
}

/// Peel named-root and argument wrappers off a document.
///
/// `{"NODE": {..schema..}}` is a named root; a schema whose only property is
/// an object named `argument` (any case) is an argument wrapper. At most two
/// layers of each kind are removed.
pub fn unwrap_document(document: &Value) -> Unwrapped<'_> {
    let mut current = document;
    let mut root_key = None;
    let mut argument_key = None;
    let mut named_layers = 0;
    let mut argument_layers = 0;

    loop {
        let Some(map) = current.as_object() else {
            break;
        };

        if SCHEMA_KEYS.iter().any(|k| map.contains_key(*k)) {
            if argument_layers >= MAX_UNWRAP {
                break;
            }
            let Some(props) = map.get("properties").and_then(Value::as_object) else {
                break;
            };
            if props.len() != 1 {
                break;
            }
            let Some((key, inner)) = props.iter().next() else {
                break;
            };
            if !key.eq_ignore_ascii_case("argument") || !has_schema_keys(inner) {
                break;
            }
            argument_key = Some(key.clone());
            argument_layers += 1;
            current = inner;
            continue;
        }

        if named_layers >= MAX_UNWRAP || map.len() != 1 {
            break;
        }
        let Some((key, inner)) = map.iter().next() else {
            break;
        };
        if !inner.is_object() {
            break;
        }
        root_key = Some(key.clone());
        named_layers += 1;
        current = inner;
    }

    Unwrapped {
        schema: current,
        root_key,
        argument_key,
    }
}

fn has_schema_keys(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|m| SCHEMA_KEYS.iter().any(|k| m.contains_key(*k)))
}

/// Structural cache key: `context:kind:sorted props:sorted required`.
pub fn cache_key(document: &Value, options: &CompileOptions) -> String {
    let schema = unwrap_document(document).schema;
    let mut props: Vec<&str> = schema
        .get("properties")
        .and_then(Value::as_object)
        .map(|m| m.keys().map(String::as_str).collect())
        .unwrap_or_default();
    props.sort_unstable();
    let mut required = string_list(schema.get("required"));
    required.sort_unstable();
    format!(
        "{}:{}:{}:{}",
        options.context,
        options.kind,
        props.join(","),
        required.join(",")
    )
}

/// Compile a document, returning only the field list.
pub fn compile_fields(document: &Value, options: &CompileOptions) -> Vec<CanonicalField> {
    compile(document, options).fields
}

/// Compile a document into canonical fields.
///
/// Common fields come first, in property order. Each conditional group then
/// contributes a section entry followed by its member fields.
pub fn compile(document: &Value, options: &CompileOptions) -> CompiledSchema {
    let unwrapped = unwrap_document(document);
    let schema = unwrapped.schema;

    let Some(root) = schema.as_object() else {
        warn!(
            actual = crate::types::json_type_name(schema),
            "schema document is not an object, nothing to compile"
        );
        return CompiledSchema::default();
    };

    let empty = Map::new();
    let properties = root
        .get("properties")
        .and_then(Value::as_object)
        .unwrap_or(&empty);
    let root_required = string_list(root.get("required"));

    let branches = parse_branches(root);
    let options_blocks = parse_option_blocks(root, properties);

    if properties.is_empty() && options_blocks.is_empty() {
        warn!("schema document has no properties, nothing to compile");
    }

    // branch triggers travel with each field's requirement; the by-type
    // markers are keyed by this one
    let discriminator = options.discriminator.clone().or_else(|| {
        properties
            .contains_key(DEFAULT_DISCRIMINATOR)
            .then(|| DEFAULT_DISCRIMINATOR.to_string())
    });

    let title = unwrapped.root_key.clone().or_else(|| {
        root.get("title")
            .and_then(Value::as_str)
            .or_else(|| document.get("title").and_then(Value::as_str))
            .map(str::to_string)
    });

    let mut ctx = Context {
        options,
        emitted: HashSet::new(),
    };

    let grouped: HashSet<&str> = branches
        .iter()
        .chain(options_blocks.iter())
        .flat_map(|g| g.members.iter().map(String::as_str))
        .collect();

    let mut fields = Vec::new();

    for (name, definition) in properties {
        if grouped.contains(name.as_str()) {
            continue;
        }
        let requirement = Requirement::fixed(root_required.contains(&name.as_str()));
        let path = ctx.claim(name, None);
        fields.push(ctx.build_field(name, path, definition, requirement, 0));
    }

    let statuses = branch_statuses(&branches, properties);

    for group in branches.iter().chain(options_blocks.iter()) {
        fields.push(section_field(group));

        for member in &group.members {
            let Some(definition) = group.definition(member, properties) else {
                debug!(field = %member, group = %group.tag, "group member has no definition, skipping");
                continue;
            };
            let requirement = match &group.kind {
                GroupKind::Branch { trigger, .. } => Requirement::ByDiscriminator {
                    trigger: Some(trigger.clone()),
                    statuses: statuses
                        .get(&(trigger.as_str(), member.as_str()))
                        .cloned()
                        .unwrap_or_default(),
                },
                GroupKind::Option { .. } => Requirement::Wildcard {
                    status: if group.required.contains(member) {
                        RequiredMode::Required
                    } else {
                        RequiredMode::Optional
                    },
                },
            };
            let path = ctx.claim(member, Some(group.tag.as_str()));
            let mut field = ctx.build_field(member, path, &definition, requirement, 0);
            group.scope(&mut field);
            fields.push(field);
        }
    }

    debug!(
        fields = fields.len(),
        branches = branches.len(),
        options = options_blocks.len(),
        "compiled schema"
    );

    CompiledSchema {
        title,
        argument_key: unwrapped.argument_key,
        discriminator,
        fields,
    }
}

/// Conditional group: a branch conditional or one alternative option.
#[derive(Debug)]
struct Group {
    tag: String,
    label: String,
    kind: GroupKind,
    required: Vec<String>,
    /// Required names first, then remaining own property names.
    members: Vec<String>,
    properties: Map<String, Value>,
}

#[derive(Debug)]
enum GroupKind {
    Branch {
        trigger: String,
        values: Vec<Value>,
        condition: Condition,
    },
    Option {
        index: usize,
    },
}

impl Group {
    fn new(
        tag: String,
        label: String,
        kind: GroupKind,
        required: Vec<String>,
        properties: Map<String, Value>,
    ) -> Self {
        let mut members = required.clone();
        for key in properties.keys() {
            if !members.contains(key) {
                members.push(key.clone());
            }
        }
        Self {
            tag,
            label,
            kind,
            required,
            members,
            properties,
        }
    }

    /// Definition for a member: the root definition overlaid with the group's own.
    fn definition(&self, name: &str, root: &Map<String, Value>) -> Option<Value> {
        match (root.get(name), self.properties.get(name)) {
            (Some(Value::Object(base)), Some(Value::Object(own))) => {
                let mut merged = base.clone();
                for (k, v) in own {
                    merged.insert(k.clone(), v.clone());
                }
                Some(Value::Object(merged))
            }
            (_, Some(own)) => Some(own.clone()),
            (Some(base), None) => Some(base.clone()),
            (None, None) => None,
        }
    }

    fn condition(&self) -> FieldCondition {
        let (trigger_field, values) = match &self.kind {
            GroupKind::Branch {
                trigger, values, ..
            } => (trigger.clone(), values.clone()),
            GroupKind::Option { .. } => (self.tag.clone(), Vec::new()),
        };
        FieldCondition {
            trigger_field,
            values,
            label: self.label.clone(),
            required_fields: self.required.clone(),
        }
    }

    /// Attach this group's condition, visibility and option index to a field.
    fn scope(&self, field: &mut CanonicalField) {
        field.conditions.push(self.condition());
        match &self.kind {
            GroupKind::Branch { condition, .. } => {
                let merged = match field.markers.visible_when.take() {
                    Some(existing) => existing.condition.and(condition),
                    None => condition.clone(),
                };
                field.markers.visible_when = Some(Predicate::from_condition(merged));
            }
            GroupKind::Option { index } => field.option_index = Some(*index),
        }
    }
}

fn section_field(group: &Group) -> CanonicalField {
    let path = format!("__section_{}", group.tag);
    let mut field = CanonicalField {
        name: path.clone(),
        path,
        display_name: Some(group.label.clone()),
        section: Some(group.label.clone()),
        ..CanonicalField::default()
    };
    group.scope(&mut field);
    field
}

/// Parse `allOf[*]` and root-level `if`/`then` branch conditionals.
fn parse_branches(root: &Map<String, Value>) -> Vec<Group> {
    // (title, if, then)
    let mut entries: Vec<(Option<&str>, &Value, &Value)> = Vec::new();
    for entry in root.get("allOf").and_then(Value::as_array).into_iter().flatten() {
        if let (Some(cond), Some(then)) = (entry.get("if"), entry.get("then")) {
            entries.push((entry.get("title").and_then(Value::as_str), cond, then));
        }
    }
    if let (Some(cond), Some(then)) = (root.get("if"), root.get("then")) {
        entries.push((None, cond, then));
    }

    let mut branches = Vec::new();
    for (title, cond, then) in entries {
        let Some((trigger, values)) = single_property_test(cond) else {
            warn!(
                condition = %cond,
                "ignoring branch conditional that is not a single-property const/enum test"
            );
            continue;
        };

        let expected = if values.len() == 1 {
            Expected::One(values[0].clone())
        } else {
            Expected::AnyOf(values.clone())
        };
        let condition = Condition::single(trigger.clone(), expected);

        let label = title
            .or_else(|| then.get("x-section-header").and_then(Value::as_str))
            .map(str::to_string)
            .unwrap_or_else(|| condition.label());

        let tag = format!("branch_{}", branches.len());
        let required = string_list(then.get("required"))
            .into_iter()
            .map(str::to_string)
            .collect();
        let properties = then
            .get("properties")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        branches.push(Group::new(
            tag,
            label,
            GroupKind::Branch {
                trigger,
                values,
                condition,
            },
            required,
            properties,
        ));
    }
    branches
}

/// `{"properties": {"X": {"const": v}}}` or `{"properties": {"X": {"enum": [..]}}}`.
pub(crate) fn single_property_test(condition: &Value) -> Option<(String, Vec<Value>)> {
    let props = condition.get("properties")?.as_object()?;
    if props.len() != 1 {
        return None;
    }
    let (name, test) = props.iter().next()?;
    if let Some(value) = test.get("const") {
        return Some((name.clone(), vec![value.clone()]));
    }
    let values = test.get("enum")?.as_array()?;
    if values.is_empty() {
        return None;
    }
    Some((name.clone(), values.clone()))
}

/// Parse root-level `oneOf`/`anyOf` alternative-option blocks.
fn parse_option_blocks(root: &Map<String, Value>, properties: &Map<String, Value>) -> Vec<Group> {
    let Some(options) = root
        .get("oneOf")
        .or_else(|| root.get("anyOf"))
        .and_then(Value::as_array)
    else {
        return Vec::new();
    };

    let mut groups = Vec::new();
    for (index, option) in options.iter().enumerate() {
        let Some(map) = option.as_object() else {
            continue;
        };
        let required: Vec<String> = string_list(map.get("required"))
            .into_iter()
            .map(str::to_string)
            .collect();
        let own = map
            .get("properties")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        let mut group = Group::new(
            String::new(),
            String::new(),
            GroupKind::Option { index },
            required,
            own,
        );

        group.tag = match group.members.first() {
            Some(first) => format!("option_{}_{}", index, first),
            None => format!("option_{}", index),
        };

        let header = group
            .members
            .first()
            .and_then(|first| group.definition(first, properties))
            .and_then(|def| FieldMarkers::from_definition(&def).section_header);
        group.label = header
            .or_else(|| map.get("title").and_then(Value::as_str).map(str::to_string))
            .unwrap_or_else(|| format!("Option {}", index + 1));

        groups.push(group);
    }
    groups
}

/// Per (trigger, field) status across every known trigger value.
///
/// A field is `required` for a value when any branch testing that value lists
/// it as required, `optional` otherwise.
fn branch_statuses<'a>(
    branches: &'a [Group],
    properties: &Map<String, Value>,
) -> BTreeMap<(&'a str, &'a str), BTreeMap<String, RequiredMode>> {
    let mut known: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    for branch in branches {
        let GroupKind::Branch {
            trigger, values, ..
        } = &branch.kind
        else {
            continue;
        };
        let entry = known.entry(trigger.as_str()).or_insert_with(|| {
            properties
                .get(trigger)
                .and_then(|d| d.get("enum"))
                .and_then(Value::as_array)
                .map(|e| e.iter().map(value_key).collect())
                .unwrap_or_default()
        });
        for value in values {
            let key = value_key(value);
            if !entry.contains(&key) {
                entry.push(key);
            }
        }
    }

    let mut statuses: BTreeMap<(&str, &str), BTreeMap<String, RequiredMode>> = BTreeMap::new();
    for branch in branches {
        let GroupKind::Branch { trigger, .. } = &branch.kind else {
            continue;
        };
        let trigger_values = known.get(trigger.as_str()).cloned().unwrap_or_default();
        for member in &branch.members {
            statuses
                .entry((trigger.as_str(), member.as_str()))
                .or_insert_with(|| {
                    trigger_values
                        .iter()
                        .map(|v| (v.clone(), RequiredMode::Optional))
                        .collect()
                });
        }
    }

    for branch in branches {
        let GroupKind::Branch {
            trigger, values, ..
        } = &branch.kind
        else {
            continue;
        };
        for member in &branch.required {
            if let Some(map) = statuses.get_mut(&(trigger.as_str(), member.as_str())) {
                for value in values {
                    map.insert(value_key(value), RequiredMode::Required);
                }
            }
        }
    }
    statuses
}

/// Per-compilation state: options and already-claimed paths.
struct Context<'o> {
    options: &'o CompileOptions,
    emitted: HashSet<String>,
}

impl Context<'_> {
    /// First emission of a name keeps the bare name; later ones are tagged.
    fn claim(&mut self, name: &str, tag: Option<&str>) -> String {
        let path = match tag {
            Some(tag) if self.emitted.contains(name) => format!("{}.{}", tag, name),
            _ => name.to_string(),
        };
        self.emitted.insert(path.clone());
        path
    }

    fn build_field(
        &self,
        name: &str,
        path: String,
        definition: &Value,
        required: Requirement,
        level: usize,
    ) -> CanonicalField {
        let markers = FieldMarkers::from_definition(definition);
        let field_type = normalize_type(definition);

        let mut field = CanonicalField {
            name: name.to_string(),
            display_name: markers.label.clone(),
            description: definition
                .get("description")
                .and_then(Value::as_str)
                .map(str::to_string),
            field_type,
            required,
            default: definition.get("default").cloned(),
            enum_values: definition
                .get("enum")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default(),
            minimum: definition.get("minimum").and_then(Value::as_f64),
            maximum: definition.get("maximum").and_then(Value::as_f64),
            min_items: definition.get("minItems").and_then(Value::as_u64),
            max_items: definition.get("maxItems").and_then(Value::as_u64),
            level,
            section_header: markers.section_header.clone(),
            markers,
            path,
            ..CanonicalField::default()
        };

        let child_source = match field_type {
            FieldType::Object => Some((definition, ".")),
            FieldType::ArrayOfObject => definition.get("items").map(|items| (items, "[].")),
            _ => None,
        };
        if let Some((source, separator)) = child_source {
            if level + 1 > self.options.max_depth {
                warn!(
                    path = %field.path,
                    max_depth = self.options.max_depth,
                    "nesting exceeds maximum depth, dropping children"
                );
            } else {
                field.children = self.build_children(&field.path, separator, source, level + 1);
            }
        }
        field
    }

    fn build_children(
        &self,
        parent: &str,
        separator: &str,
        schema: &Value,
        level: usize,
    ) -> Vec<CanonicalField> {
        let mut children = Vec::new();
        let mut claimed = HashSet::new();
        let required = string_list(schema.get("required"));

        if let Some(props) = schema.get("properties").and_then(Value::as_object) {
            for (name, definition) in props {
                let path = format!("{}{}{}", parent, separator, name);
                claimed.insert(path.clone());
                let requirement = Requirement::fixed(required.contains(&name.as_str()));
                children.push(self.build_field(name, path, definition, requirement, level));
            }
        }

        let Some(options) = schema.get("oneOf").and_then(Value::as_array) else {
            return children;
        };
        for (index, option) in options.iter().enumerate() {
            let Some(props) = option.get("properties").and_then(Value::as_object) else {
                continue;
            };
            let option_required = string_list(option.get("required"));
            let label = props
                .values()
                .next()
                .and_then(|d| FieldMarkers::from_definition(d).section_header)
                .or_else(|| option.get("title").and_then(Value::as_str).map(str::to_string))
                .unwrap_or_else(|| format!("Option {}", index + 1));

            let section_path = format!("{}.__section_{}", parent, index);
            children.push(CanonicalField {
                name: section_path.clone(),
                path: section_path,
                display_name: Some(label.clone()),
                section: Some(label),
                option_index: Some(index),
                level,
                ..CanonicalField::default()
            });

            for (name, definition) in props {
                let mut path = format!("{}{}{}", parent, separator, name);
                if !claimed.insert(path.clone()) {
                    path = format!("{}.option_{}.{}", parent, index, name);
                    claimed.insert(path.clone());
                }
                let status = if option_required.contains(&name.as_str()) {
                    RequiredMode::Required
                } else {
                    RequiredMode::Optional
                };
                let mut child = self.build_field(
                    name,
                    path,
                    definition,
                    Requirement::Wildcard { status },
                    level,
                );
                child.option_index = Some(index);
                children.push(child);
            }
        }
        children
    }
}

/// Normalize a definition's type into the canonical enum.
pub fn normalize_type(definition: &Value) -> FieldType {
    let declared = match definition.get("type") {
        Some(Value::String(tag)) => Some(tag.as_str()),
        Some(Value::Array(tags)) => tags
            .iter()
            .filter_map(Value::as_str)
            .find(|t| *t != "null"),
        _ => None,
    };

    let base = match declared {
        Some(tag) => FieldType::parse_primitive(tag).unwrap_or_else(|| {
            debug!(tag, "unknown type tag, treating as string");
            FieldType::String
        }),
        None => infer_type(definition),
    };

    if base == FieldType::Array {
        let item = definition
            .get("items")
            .filter(|items| items.is_object())
            .map(normalize_type);
        return FieldType::array_of(item);
    }
    base
}

fn infer_type(definition: &Value) -> FieldType {
    if definition.get("properties").is_some() || definition.get("oneOf").is_some() {
        return FieldType::Object;
    }
    if definition.get("items").is_some() {
        return FieldType::Array;
    }
    match definition
        .get("enum")
        .and_then(Value::as_array)
        .and_then(|e| e.first())
    {
        Some(Value::Number(n)) if n.is_i64() || n.is_u64() => FieldType::Integer,
        Some(Value::Number(_)) => FieldType::Number,
        Some(Value::Bool(_)) => FieldType::Boolean,
        _ => FieldType::String,
    }
}

fn string_list(value: Option<&Value>) -> Vec<&str> {
    value
        .and_then(Value::as_array)
        .map(|a| a.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn iteration_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "ITERATION_METHOD": { "type": "string", "enum": ["NEWTON", "ARC", "DISP"] },
                "NUMBER_STEPS": { "type": "integer" },
                "MAX_ITERATIONS": { "type": "integer" },
                "TOLERANCE": { "type": "number", "default": 0.001 }
            },
            "required": ["ITERATION_METHOD"],
            "allOf": [{
                "if": { "properties": { "ITERATION_METHOD": { "const": "NEWTON" } } },
                "then": { "required": ["NUMBER_STEPS", "MAX_ITERATIONS"] }
            }]
        })
    }

    fn paths(fields: &[CanonicalField]) -> Vec<&str> {
        fields.iter().map(|f| f.path.as_str()).collect()
    }

    // === Unwrapping ===

    #[test]
    fn unwrap_named_root() {
        let doc = json!({ "NODE": { "type": "object", "properties": { "ID": { "type": "integer" } } } });
        let unwrapped = unwrap_document(&doc);
        assert_eq!(unwrapped.root_key.as_deref(), Some("NODE"));
        assert!(unwrapped.schema.get("properties").is_some());
    }

    #[test]
    fn unwrap_named_root_and_argument() {
        let doc = json!({
            "Assign": {
                "type": "object",
                "properties": {
                    "Argument": {
                        "type": "object",
                        "properties": { "NAME": { "type": "string" } }
                    }
                }
            }
        });
        let compiled = compile(&doc, &CompileOptions::default());
        assert_eq!(compiled.title.as_deref(), Some("Assign"));
        assert_eq!(compiled.argument_key.as_deref(), Some("Argument"));
        assert_eq!(paths(&compiled.fields), vec!["NAME"]);
    }

    #[test]
    fn unwrap_leaves_plain_schema_alone() {
        let doc = json!({ "properties": { "A": { "type": "string" } } });
        let unwrapped = unwrap_document(&doc);
        assert!(unwrapped.root_key.is_none());
        assert!(unwrapped.argument_key.is_none());
    }

    #[test]
    fn title_from_document_when_not_wrapped() {
        let doc = json!({ "title": "Load Case", "properties": { "A": {} } });
        let compiled = compile(&doc, &CompileOptions::default());
        assert_eq!(compiled.title.as_deref(), Some("Load Case"));
    }

    // === Failure policy ===

    #[test]
    fn malformed_document_compiles_to_empty() {
        for doc in [json!(null), json!("schema"), json!([1, 2]), json!({})] {
            assert!(compile_fields(&doc, &CompileOptions::default()).is_empty());
        }
    }

    // === Common and conditional fields ===

    #[test]
    fn common_fields_first_then_sections() {
        let compiled = compile(&iteration_schema(), &CompileOptions::default());
        assert_eq!(
            paths(&compiled.fields),
            vec![
                "ITERATION_METHOD",
                "TOLERANCE",
                "__section_branch_0",
                "NUMBER_STEPS",
                "MAX_ITERATIONS"
            ]
        );
        assert_eq!(compiled.discriminator, None);
    }

    #[test]
    fn common_field_static_required() {
        let compiled = compile(&iteration_schema(), &CompileOptions::default());
        assert_eq!(compiled.fields[0].required, Requirement::fixed(true));
        assert_eq!(compiled.fields[1].required, Requirement::fixed(false));
    }

    #[test]
    fn branch_field_statuses_cover_trigger_enum() {
        let compiled = compile(&iteration_schema(), &CompileOptions::default());
        let steps = compiled.find("NUMBER_STEPS").unwrap();
        let Requirement::ByDiscriminator { trigger, statuses } = &steps.required else {
            panic!("expected discriminator requirement, got {:?}", steps.required);
        };
        assert_eq!(trigger.as_deref(), Some("ITERATION_METHOD"));
        assert_eq!(statuses.get("NEWTON"), Some(&RequiredMode::Required));
        assert_eq!(statuses.get("ARC"), Some(&RequiredMode::Optional));
        assert_eq!(statuses.get("DISP"), Some(&RequiredMode::Optional));
    }

    #[test]
    fn branch_field_gets_visibility_and_condition() {
        let compiled = compile(&iteration_schema(), &CompileOptions::default());
        let steps = compiled.find("NUMBER_STEPS").unwrap();
        let predicate = steps.markers.visible_when.as_ref().unwrap();
        assert_eq!(predicate.label, "\"ITERATION_METHOD\" is NEWTON");
        assert_eq!(steps.conditions.len(), 1);
        assert_eq!(steps.conditions[0].trigger_field, "ITERATION_METHOD");
        assert_eq!(steps.conditions[0].values, vec![json!("NEWTON")]);
        assert_eq!(
            steps.conditions[0].required_fields,
            vec!["NUMBER_STEPS", "MAX_ITERATIONS"]
        );
    }

    #[test]
    fn section_field_carries_group_label() {
        let compiled = compile(&iteration_schema(), &CompileOptions::default());
        let section = &compiled.fields[2];
        assert!(section.is_section());
        assert_eq!(section.section.as_deref(), Some("\"ITERATION_METHOD\" is NEWTON"));
        assert!(section.markers.visible_when.is_some());
    }

    #[test]
    fn branch_label_prefers_title_then_section_header() {
        let doc = json!({
            "properties": { "TYPE": { "enum": ["A", "B"] }, "X": {}, "Y": {} },
            "allOf": [
                {
                    "title": "Type A data",
                    "if": { "properties": { "TYPE": { "const": "A" } } },
                    "then": { "required": ["X"] }
                },
                {
                    "if": { "properties": { "TYPE": { "const": "B" } } },
                    "then": { "required": ["Y"], "x-section-header": "Type B data" }
                }
            ]
        });
        let compiled = compile(&doc, &CompileOptions::default());
        let sections: Vec<_> = compiled.fields.iter().filter_map(|f| f.section.as_deref()).collect();
        assert_eq!(sections, vec!["Type A data", "Type B data"]);
    }

    #[test]
    fn field_in_multiple_branches_is_emitted_per_branch() {
        let doc = json!({
            "properties": {
                "TYPE": { "enum": ["BEAM", "TRUSS"] },
                "LENGTH": { "type": "number" }
            },
            "allOf": [
                { "if": { "properties": { "TYPE": { "const": "BEAM" } } }, "then": { "required": ["LENGTH"] } },
                { "if": { "properties": { "TYPE": { "const": "TRUSS" } } }, "then": { "required": ["LENGTH"] } }
            ]
        });
        let compiled = compile(&doc, &CompileOptions::default());
        let all = paths(&compiled.fields);
        assert!(all.contains(&"LENGTH"));
        assert!(all.contains(&"branch_1.LENGTH"));
        let unique: HashSet<_> = all.iter().collect();
        assert_eq!(unique.len(), all.len());

        let copy = compiled.find("branch_1.LENGTH").unwrap();
        assert_eq!(copy.name, "LENGTH");
        let Requirement::ByDiscriminator { statuses, .. } = &copy.required else {
            panic!("expected discriminator requirement");
        };
        assert_eq!(statuses.get("BEAM"), Some(&RequiredMode::Required));
        assert_eq!(statuses.get("TRUSS"), Some(&RequiredMode::Required));
    }

    #[test]
    fn branch_with_enum_test_and_own_properties() {
        let doc = json!({
            "properties": { "MODE": { "enum": [1, 2, 3] } },
            "if": { "properties": { "MODE": { "enum": [1, 2] } } },
            "then": { "properties": { "SCALE": { "type": "number" } } }
        });
        let compiled = compile(&doc, &CompileOptions::default());
        let scale = compiled.find("SCALE").unwrap();
        assert_eq!(scale.conditions[0].values, vec![json!(1), json!(2)]);
        let Requirement::ByDiscriminator { statuses, .. } = &scale.required else {
            panic!("expected discriminator requirement");
        };
        assert!(statuses.values().all(|s| *s == RequiredMode::Optional));
    }

    #[test]
    fn multi_property_branch_is_ignored() {
        let doc = json!({
            "properties": { "A": {}, "B": {}, "C": {} },
            "allOf": [{
                "if": { "properties": { "A": { "const": 1 }, "B": { "const": 2 } } },
                "then": { "required": ["C"] }
            }]
        });
        let compiled = compile(&doc, &CompileOptions::default());
        assert_eq!(paths(&compiled.fields), vec!["A", "B", "C"]);
    }

    #[test]
    fn explicit_discriminator_wins() {
        let options = CompileOptions::new().discriminator("ELEM");
        let compiled = compile(&iteration_schema(), &options);
        assert_eq!(compiled.discriminator.as_deref(), Some("ELEM"));
    }

    #[test]
    fn type_property_is_default_discriminator() {
        let doc = json!({ "properties": { "TYPE": { "type": "string" } } });
        let compiled = compile(&doc, &CompileOptions::default());
        assert_eq!(compiled.discriminator.as_deref(), Some("TYPE"));
    }

    // === Alternative options ===

    #[test]
    fn option_blocks_become_tagged_groups() {
        let doc = json!({
            "properties": {
                "NAME": { "type": "string" },
                "NODE_ID": { "type": "integer", "x-section-header": "By node" },
                "COORD": { "type": "array", "items": { "type": "number" } }
            },
            "oneOf": [
                { "required": ["NODE_ID"] },
                { "required": ["COORD"] }
            ]
        });
        let compiled = compile(&doc, &CompileOptions::default());
        assert_eq!(
            paths(&compiled.fields),
            vec![
                "NAME",
                "__section_option_0_NODE_ID",
                "NODE_ID",
                "__section_option_1_COORD",
                "COORD"
            ]
        );
        assert_eq!(compiled.fields[1].section.as_deref(), Some("By node"));
        assert_eq!(compiled.fields[3].section.as_deref(), Some("Option 2"));

        let coord = compiled.find("COORD").unwrap();
        assert_eq!(coord.option_index, Some(1));
        assert_eq!(coord.field_type, FieldType::ArrayOfNumber);
        assert_eq!(
            coord.required,
            Requirement::Wildcard {
                status: RequiredMode::Required
            }
        );
        assert!(coord.markers.visible_when.is_none());
    }

    #[test]
    fn option_properties_not_in_root_are_added() {
        let doc = json!({
            "properties": {},
            "anyOf": [
                { "title": "Circle", "properties": { "RADIUS": { "type": "number" } } }
            ]
        });
        let compiled = compile(&doc, &CompileOptions::default());
        assert_eq!(paths(&compiled.fields), vec!["__section_option_0_RADIUS", "RADIUS"]);
        assert_eq!(compiled.fields[0].section.as_deref(), Some("Circle"));
        assert_eq!(
            compiled.fields[1].required,
            Requirement::Wildcard {
                status: RequiredMode::Optional
            }
        );
    }

    // === Nesting ===

    #[test]
    fn object_children_use_dotted_paths() {
        let doc = json!({
            "properties": {
                "SECTION": {
                    "type": "object",
                    "required": ["WIDTH"],
                    "properties": {
                        "WIDTH": { "type": "number" },
                        "HEIGHT": { "type": "number", "x-ui": { "group": "Size" } }
                    }
                }
            }
        });
        let compiled = compile(&doc, &CompileOptions::default());
        let section = &compiled.fields[0];
        assert_eq!(section.field_type, FieldType::Object);
        assert_eq!(paths(&section.children), vec!["SECTION.WIDTH", "SECTION.HEIGHT"]);
        assert_eq!(section.children[0].level, 1);
        assert_eq!(section.children[0].required, Requirement::fixed(true));
        assert_eq!(section.children[1].group(), Some("Size"));
    }

    #[test]
    fn array_of_object_children_use_bracket_paths() {
        let doc = json!({
            "properties": {
                "LOADS": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": { "FX": { "type": "number" } }
                    }
                }
            }
        });
        let compiled = compile(&doc, &CompileOptions::default());
        assert_eq!(compiled.fields[0].field_type, FieldType::ArrayOfObject);
        assert_eq!(paths(&compiled.fields[0].children), vec!["LOADS[].FX"]);
    }

    #[test]
    fn object_one_of_produces_section_children() {
        let doc = json!({
            "properties": {
                "SUPPORT": {
                    "type": "object",
                    "oneOf": [
                        {
                            "required": ["FIXED"],
                            "properties": { "FIXED": { "type": "boolean", "x-section-header": "Fixed" } }
                        },
                        { "properties": { "SPRING": { "type": "number" } } }
                    ]
                }
            }
        });
        let compiled = compile(&doc, &CompileOptions::default());
        let support = &compiled.fields[0];
        assert_eq!(
            paths(&support.children),
            vec![
                "SUPPORT.__section_0",
                "SUPPORT.FIXED",
                "SUPPORT.__section_1",
                "SUPPORT.SPRING"
            ]
        );
        assert_eq!(support.children[0].section.as_deref(), Some("Fixed"));
        assert_eq!(support.children[2].section.as_deref(), Some("Option 2"));
        assert_eq!(support.children[3].option_index, Some(1));
        assert_eq!(
            support.children[1].required,
            Requirement::Wildcard {
                status: RequiredMode::Required
            }
        );
    }

    #[test]
    fn depth_guard_drops_deep_children() {
        let doc = json!({
            "properties": {
                "A": { "type": "object", "properties": {
                    "B": { "type": "object", "properties": {
                        "C": { "type": "string" }
                    } }
                } }
            }
        });
        let compiled = compile(&doc, &CompileOptions::new().max_depth(1));
        let a = &compiled.fields[0];
        assert_eq!(a.children.len(), 1);
        assert!(a.children[0].children.is_empty());
    }

    // === Types ===

    #[test]
    fn normalize_type_variants() {
        assert_eq!(normalize_type(&json!({ "type": ["null", "integer"] })), FieldType::Integer);
        assert_eq!(normalize_type(&json!({ "properties": {} })), FieldType::Object);
        assert_eq!(normalize_type(&json!({ "enum": [1, 2] })), FieldType::Integer);
        assert_eq!(normalize_type(&json!({ "enum": [0.5] })), FieldType::Number);
        assert_eq!(normalize_type(&json!({ "enum": [true] })), FieldType::Boolean);
        assert_eq!(normalize_type(&json!({})), FieldType::String);
        assert_eq!(normalize_type(&json!({ "type": "date" })), FieldType::String);
        assert_eq!(
            normalize_type(&json!({ "type": "array", "items": { "type": "string" } })),
            FieldType::ArrayOfString
        );
        assert_eq!(
            normalize_type(&json!({ "items": { "type": "integer" } })),
            FieldType::ArrayOfNumber
        );
        assert_eq!(normalize_type(&json!({ "type": "array" })), FieldType::Array);
    }

    #[test]
    fn field_metadata_is_copied() {
        let doc = json!({
            "properties": {
                "SPAN": {
                    "type": "number",
                    "description": "Span length",
                    "minimum": 0,
                    "maximum": 100.5,
                    "default": 10,
                    "x-ui": { "label": "Span" }
                }
            }
        });
        let field = &compile_fields(&doc, &CompileOptions::default())[0];
        assert_eq!(field.display_name.as_deref(), Some("Span"));
        assert_eq!(field.description.as_deref(), Some("Span length"));
        assert_eq!(field.minimum, Some(0.0));
        assert_eq!(field.maximum, Some(100.5));
        assert_eq!(field.default, Some(json!(10)));
    }

    // === Determinism and cache key ===

    #[test]
    fn compile_is_deterministic() {
        let options = CompileOptions::default();
        assert_eq!(
            compile(&iteration_schema(), &options),
            compile(&iteration_schema(), &options)
        );
    }

    #[test]
    fn cache_key_sorts_names() {
        let key = cache_key(&iteration_schema(), &CompileOptions::default());
        assert_eq!(
            key,
            "default:enhanced:ITERATION_METHOD,MAX_ITERATIONS,NUMBER_STEPS,TOLERANCE:ITERATION_METHOD"
        );
    }

    #[test]
    fn cache_key_includes_context() {
        let options = CompileOptions::new().context("civil", "original");
        let key = cache_key(&json!({ "properties": { "B": {}, "A": {} } }), &options);
        assert_eq!(key, "civil:original:A,B:");
    }
}
