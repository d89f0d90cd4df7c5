//! UI adapters - documentation table rows, builder fields, initial values.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::types::{display_value, value_key, CanonicalField, FieldType, RuntimeStateMap};

/// Row number: top-level rows count `1, 2, ..`; child rows read `(1), (2), ..`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RowNumber {
    Index(usize),
    Label(String),
}

impl RowNumber {
    fn blank() -> Self {
        RowNumber::Label(String::new())
    }
}

/// One row of a documentation table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableRow {
    pub no: RowNumber,
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub default: String,
    pub required: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TableRow>,
    /// Set on full-width header rows.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
}

impl TableRow {
    fn header(label: &str) -> Self {
        Self {
            no: RowNumber::blank(),
            name: String::new(),
            description: String::new(),
            type_name: String::new(),
            default: String::new(),
            required: String::new(),
            options: Vec::new(),
            children: Vec::new(),
            section: Some(label.to_string()),
        }
    }

    pub fn is_header(&self) -> bool {
        self.section.is_some()
    }
}

/// Shape compiled fields into documentation table rows.
///
/// Top-level numbering restarts after every group section, but not after a
/// header attached to a real field.
pub fn table_rows(fields: &[CanonicalField]) -> Vec<TableRow> {
    let mut rows = Vec::new();
    let mut no = 1;
    for field in fields {
        if let Some(section) = &field.section {
            rows.push(TableRow::header(section));
            no = 1;
            continue;
        }
        if let Some(header) = &field.section_header {
            rows.push(TableRow::header(header));
        }
        rows.push(field_row(field, RowNumber::Index(no)));
        no += 1;
    }
    rows
}

fn field_row(field: &CanonicalField, no: RowNumber) -> TableRow {
    let mut row = TableRow {
        no,
        name: field.name.clone(),
        description: table_description(field),
        type_name: field.field_type.display_name().to_string(),
        default: format_default(field.default.as_ref()),
        required: if field.required.is_ever_required() {
            "Required".to_string()
        } else {
            "Optional".to_string()
        },
        options: field
            .enum_values
            .iter()
            .map(|v| format_option(v, field.markers.enum_labels.as_ref()))
            .collect(),
        children: Vec::new(),
        section: None,
    };

    let mut child_no = 1;
    for child in &field.children {
        if let Some(section) = &child.section {
            row.children.push(TableRow::header(section));
            child_no = 1;
            continue;
        }
        if let Some(header) = &child.section_header {
            row.children.push(TableRow::header(header));
        }
        let mut child_row = field_row(child, RowNumber::Label(format!("({})", child_no)));
        if let Some((_, last)) = child_row.name.rsplit_once('.') {
            child_row.name = last.to_string();
        }
        row.children.push(child_row);
        child_no += 1;
    }
    row
}

fn describe(field: &CanonicalField) -> String {
    field
        .display_name
        .clone()
        .or_else(|| field.description.clone())
        .unwrap_or_else(|| field.name.clone())
}

/// Label line followed by the by-type enums, value constraints, condition
/// labels and hint, one per line.
fn table_description(field: &CanonicalField) -> String {
    let markers = &field.markers;
    let mut lines = vec![describe(field)];

    if let Some(by_type) = &markers.enum_by_discriminator {
        lines.push("Enum Values by Type:".to_string());
        for (key, allowed) in by_type {
            lines.push(format!("{}:", key));
            for value in allowed.as_array().into_iter().flatten() {
                lines.push(format_option(value, markers.enum_labels.as_ref()));
            }
        }
    }
    if let Some(bounds) = markers.bounds.as_ref().filter(|b| !b.is_empty()) {
        lines.push("Value Constraints:".to_string());
        for (key, constraint) in bounds {
            lines.push(format!(" • {}: {}", key, display_value(constraint)));
        }
    }
    if let Some(predicate) = &markers.required_when {
        lines.push(format!("Required when {}", predicate.label));
    }
    if let Some(predicate) = &markers.optional_when {
        lines.push(format!("Optional when {}", predicate.label));
    }
    if let Some(hint) = &markers.hint {
        lines.push(format!("Hint: {}", hint));
    }
    lines.join("\n")
}

/// `-` when absent, quoted strings, JSON for containers.
pub fn format_default(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => "-".to_string(),
        Some(Value::String(s)) if s.is_empty() => "\"\"".to_string(),
        Some(Value::String(s)) => format!("\"{}\"", s),
        Some(other) => other.to_string(),
    }
}

/// ` • "v"`, or ` • label : "v"` when the value has a label.
fn format_option(value: &Value, labels: Option<&Map<String, Value>>) -> String {
    let shown = match value {
        Value::String(s) => format!("\"{}\"", s),
        other => other.to_string(),
    };
    match labels.and_then(|l| l.get(&value_key(value))).and_then(Value::as_str) {
        Some(label) => format!(" • {} : {}", label, shown),
        None => format!(" • {}", shown),
    }
}

/// Input widget kind for the form builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BuilderType {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
    Enum,
}

impl BuilderType {
    fn for_field(field: &CanonicalField) -> Self {
        if !field.enum_values.is_empty() || field.markers.enum_by_discriminator.is_some() {
            return BuilderType::Enum;
        }
        match field.field_type {
            FieldType::String => BuilderType::String,
            FieldType::Number => BuilderType::Number,
            FieldType::Integer => BuilderType::Integer,
            FieldType::Boolean => BuilderType::Boolean,
            FieldType::Object => BuilderType::Object,
            FieldType::Array
            | FieldType::ArrayOfString
            | FieldType::ArrayOfNumber
            | FieldType::ArrayOfObject => BuilderType::Array,
        }
    }
}

/// One input of the dynamic form builder.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuilderField {
    /// Path of the compiled field, used to look up its runtime state.
    pub path: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_name: Option<String>,
    #[serde(rename = "type")]
    pub field_type: BuilderType,
    pub description: String,
    /// Required under every discriminator value.
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(rename = "enum", skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    /// Item kind for array inputs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<BuilderType>,
    pub placeholder: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<BuilderField>,
    /// Labels of the alternative options among the children.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub one_of_options: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub option_index: Option<usize>,
}

/// Shape compiled fields into builder inputs. Section entries are dropped.
pub fn builder_fields(fields: &[CanonicalField]) -> Vec<BuilderField> {
    fields
        .iter()
        .filter(|f| !f.is_section())
        .map(|f| builder_field(f, None))
        .collect()
}

/// Builder inputs for fields visible under the given states.
///
/// Fields without a state entry are kept.
pub fn visible_builder_fields(
    fields: &[CanonicalField],
    states: &RuntimeStateMap,
) -> Vec<BuilderField> {
    retain_visible(builder_fields(fields), states)
}

fn retain_visible(fields: Vec<BuilderField>, states: &RuntimeStateMap) -> Vec<BuilderField> {
    fields
        .into_iter()
        .filter(|f| states.get(&f.path).map_or(true, |s| s.visible))
        .map(|mut f| {
            f.children = retain_visible(std::mem::take(&mut f.children), states);
            f
        })
        .collect()
}

fn builder_field(field: &CanonicalField, parent: Option<&str>) -> BuilderField {
    let items = match field.field_type {
        FieldType::ArrayOfString => Some(BuilderType::String),
        FieldType::ArrayOfNumber => Some(BuilderType::Number),
        FieldType::ArrayOfObject => Some(BuilderType::Object),
        FieldType::Array => Some(BuilderType::String),
        _ => None,
    };

    let mut hints = Vec::new();
    if let Some(hint) = &field.markers.hint {
        hints.push(hint.clone());
    }
    if field.field_type.is_array() && (field.min_items.is_some() || field.max_items.is_some()) {
        let max = field
            .max_items
            .map(|m| m.to_string())
            .unwrap_or_else(|| "∞".to_string());
        hints.push(format!("Items: {} ~ {}", field.min_items.unwrap_or(0), max));
    }

    BuilderField {
        path: field.path.clone(),
        name: field.name.clone(),
        parent_name: parent.map(str::to_string),
        field_type: BuilderType::for_field(field),
        description: describe(field),
        required: field.required.is_always_required(),
        default: field.default.clone(),
        enum_values: field.enum_values.clone(),
        minimum: field.minimum,
        maximum: field.maximum,
        items,
        placeholder: format!("Enter {}", field.name),
        hint: (!hints.is_empty()).then(|| hints.join(" | ")),
        children: field
            .children
            .iter()
            .filter(|c| !c.is_section())
            .map(|c| builder_field(c, Some(&field.name)))
            .collect(),
        one_of_options: field
            .children
            .iter()
            .filter_map(|c| c.section.clone())
            .collect(),
        option_index: field.option_index,
    }
}

/// Fields the builder seeds up front: selectors and always-required fields.
fn seeds_initial_value(field: &CanonicalField) -> bool {
    let trigger = !field.enum_values.is_empty() && field.markers.required_when.is_none();
    trigger || field.required.is_always_required()
}

/// Starting value for a field, if it has a natural one.
///
/// Order: explicit default, first enum value, `[]` for arrays, `false` for
/// booleans, then `null` when `required` is set.
pub fn default_value(field: &CanonicalField, required: bool) -> Option<Value> {
    if let Some(default) = field.default.as_ref().filter(|d| !d.is_null()) {
        return Some(default.clone());
    }
    if let Some(first) = field.enum_values.first() {
        return Some(first.clone());
    }
    if field.field_type.is_array() {
        return Some(Value::Array(Vec::new()));
    }
    if field.field_type == FieldType::Boolean {
        return Some(Value::Bool(false));
    }
    required.then_some(Value::Null)
}

/// Seed a value snapshot for a fresh form.
///
/// Object fields seed their children under dotted keys. Optional fields with
/// no natural value get no key at all.
pub fn initial_values(fields: &[CanonicalField]) -> Map<String, Value> {
    let mut values = Map::new();
    for field in fields {
        if field.is_section() || values.contains_key(&field.name) {
            continue;
        }
        if field.field_type == FieldType::Object && !field.children.is_empty() {
            if !seeds_initial_value(field) && !field.children.iter().any(seeds_initial_value) {
                continue;
            }
            for child in field.children.iter().filter(|c| !c.is_section()) {
                let key = format!("{}.{}", field.name, child.name);
                if let Some(value) = default_value(child, child.required.is_always_required()) {
                    values.entry(key).or_insert(value);
                }
            }
            continue;
        }
        if !seeds_initial_value(field) {
            continue;
        }
        if let Some(value) = default_value(field, field.required.is_always_required()) {
            values.insert(field.name.clone(), value);
        }
    }
    values
}
