//! Core types for schema compilation and runtime evaluation.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::markers::FieldMarkers;

/// Discriminator property name assumed when nothing else names one.
pub const DEFAULT_DISCRIMINATOR: &str = "TYPE";

/// Key used by the `*`-form of a requirement map.
pub const WILDCARD_KEY: &str = "*";

/// Returns the JSON type name for error messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Render a scalar the way it appears in labels and map keys.
///
/// Strings are returned bare (no quotes), everything else as compact JSON.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Render a scalar as a discriminator-map key.
///
/// Like [`display_value`], except integral numbers lose their fraction so
/// `1.0` and `1` select the same `"1"` key.
pub fn value_key(value: &Value) -> String {
    match value {
        Value::Number(n) if n.is_f64() => match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
            _ => n.to_string(),
        },
        other => display_value(other),
    }
}

/// Canonical type of a compiled field.
///
/// Array types fold their item type into a single tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum FieldType {
    #[default]
    #[serde(rename = "string")]
    String,
    #[serde(rename = "number")]
    Number,
    #[serde(rename = "integer")]
    Integer,
    #[serde(rename = "boolean")]
    Boolean,
    #[serde(rename = "object")]
    Object,
    #[serde(rename = "array")]
    Array,
    #[serde(rename = "array[string]")]
    ArrayOfString,
    #[serde(rename = "array[number]")]
    ArrayOfNumber,
    #[serde(rename = "array[object]")]
    ArrayOfObject,
}

impl FieldType {
    /// Parse a primitive JSON Schema type tag.
    ///
    /// Returns `None` for unknown tags (caller decides the fallback).
    pub fn parse_primitive(tag: &str) -> Option<Self> {
        match tag {
            "string" => Some(FieldType::String),
            "number" => Some(FieldType::Number),
            "integer" => Some(FieldType::Integer),
            "boolean" => Some(FieldType::Boolean),
            "object" => Some(FieldType::Object),
            "array" => Some(FieldType::Array),
            _ => None,
        }
    }

    /// Fold an item type into an array tag.
    pub fn array_of(item: Option<FieldType>) -> Self {
        match item {
            Some(FieldType::String) => FieldType::ArrayOfString,
            Some(FieldType::Number) | Some(FieldType::Integer) => FieldType::ArrayOfNumber,
            Some(FieldType::Object) => FieldType::ArrayOfObject,
            _ => FieldType::Array,
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(
            self,
            FieldType::Array
                | FieldType::ArrayOfString
                | FieldType::ArrayOfNumber
                | FieldType::ArrayOfObject
        )
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, FieldType::Number | FieldType::Integer)
    }

    /// Human-readable name used by documentation tables.
    pub fn display_name(&self) -> &'static str {
        match self {
            FieldType::String => "String",
            FieldType::Number => "Number",
            FieldType::Integer => "Integer",
            FieldType::Boolean => "Boolean",
            FieldType::Object => "Object",
            FieldType::Array => "Array",
            FieldType::ArrayOfString => "Array[String]",
            FieldType::ArrayOfNumber => "Array[Number]",
            FieldType::ArrayOfObject => "Array[Object]",
        }
    }
}

/// Requiredness of a field, either as a display mode or as one status
/// inside a discriminator-keyed requirement map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum RequiredMode {
    Required,
    #[default]
    Optional,
    Conditional,
    NotApplicable,
}

impl RequiredMode {
    /// Parse a status string from a requirement map.
    ///
    /// Accepts `"n/a"` as an alias for not-applicable. Returns `None` for
    /// unknown values.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "required" => Some(RequiredMode::Required),
            "optional" => Some(RequiredMode::Optional),
            "conditional" => Some(RequiredMode::Conditional),
            "n/a" | "not-applicable" => Some(RequiredMode::NotApplicable),
            _ => None,
        }
    }
}

/// How a field's requiredness is declared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Requirement {
    /// Plain `required` list membership.
    Static { required: bool },
    /// `*`-keyed status that applies regardless of discriminator.
    Wildcard { status: RequiredMode },
    /// Status per discriminator value, derived from branch conditionals.
    ByDiscriminator {
        #[serde(skip_serializing_if = "Option::is_none")]
        trigger: Option<String>,
        statuses: BTreeMap<String, RequiredMode>,
    },
}

impl Default for Requirement {
    fn default() -> Self {
        Requirement::Static { required: false }
    }
}

impl Requirement {
    pub fn fixed(required: bool) -> Self {
        Requirement::Static { required }
    }

    /// True when the field is required under every discriminator value.
    pub fn is_always_required(&self) -> bool {
        match self {
            Requirement::Static { required } => *required,
            Requirement::Wildcard { status } => *status == RequiredMode::Required,
            Requirement::ByDiscriminator { statuses, .. } => {
                !statuses.is_empty() && statuses.values().all(|s| *s == RequiredMode::Required)
            }
        }
    }

    /// True when the field is required under at least one discriminator value.
    pub fn is_ever_required(&self) -> bool {
        match self {
            Requirement::ByDiscriminator { statuses, .. } => {
                statuses.values().any(|s| *s == RequiredMode::Required)
            }
            other => other.is_always_required(),
        }
    }
}

/// One condition that scopes a field, as shown to users.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldCondition {
    /// Field whose value selects the group, or the synthetic option tag.
    pub trigger_field: String,
    /// Accepted trigger values. Empty for alternative-option groups.
    pub values: Vec<Value>,
    pub label: String,
    /// Fields the condition makes required.
    pub required_fields: Vec<String>,
}

/// Engine-normalized representation of one schema property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalField {
    /// Unique path within the compiled document.
    pub path: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub required: Requirement,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(rename = "enum", skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_items: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_items: Option<u64>,
    /// Nesting depth: 0 for top-level fields.
    pub level: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<CanonicalField>,
    /// Set on standalone group-header entries; these are not data fields.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    /// Header rendered above this (real) field.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section_header: Option<String>,
    /// Alternative-option block this field belongs to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub option_index: Option<usize>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<FieldCondition>,
    #[serde(skip_serializing_if = "FieldMarkers::is_empty")]
    pub markers: FieldMarkers,
}

impl CanonicalField {
    /// True for standalone section-header entries.
    pub fn is_section(&self) -> bool {
        self.section.is_some()
    }

    /// Group name from the field's markers, if any.
    pub fn group(&self) -> Option<&str> {
        self.markers.group.as_deref()
    }

    /// Visit this field and every descendant, depth first.
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a CanonicalField)) {
        visit(self);
        for child in &self.children {
            child.walk(visit);
        }
    }
}

/// Output of the compiler: fields plus the context they were compiled in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CompiledSchema {
    /// Name of the unwrapped root key, or the document's `title`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Property name of an unwrapped argument sub-object.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub argument_key: Option<String>,
    /// Field whose value selects the by-type marker maps. Branch requirements
    /// carry their own trigger field instead.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discriminator: Option<String>,
    pub fields: Vec<CanonicalField>,
}

impl CompiledSchema {
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Discriminator field name, `TYPE` when none was resolved.
    pub fn discriminator_field(&self) -> &str {
        self.discriminator.as_deref().unwrap_or(DEFAULT_DISCRIMINATOR)
    }

    /// Find a field anywhere in the tree by path.
    pub fn find(&self, path: &str) -> Option<&CanonicalField> {
        let mut found = None;
        for field in &self.fields {
            field.walk(&mut |f| {
                if found.is_none() && f.path == path {
                    found = Some(f);
                }
            });
        }
        found
    }
}

/// Derived per-field state for one value snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeState {
    pub visible: bool,
    pub required_mode: RequiredMode,
    pub required_now: bool,
    pub enabled: bool,
}

impl RuntimeState {
    /// State of a field that is hidden under the current values.
    pub fn hidden() -> Self {
        Self {
            visible: false,
            required_mode: RequiredMode::NotApplicable,
            required_now: false,
            enabled: false,
        }
    }
}

/// Runtime states keyed by field path.
pub type RuntimeStateMap = HashMap<String, RuntimeState>;

/// Options for schema compilation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileOptions {
    /// Explicit discriminator field. When unset, the compiler infers one.
    pub discriminator: Option<String>,
    /// Discriminator context id, part of the structural cache key.
    pub context: String,
    /// Schema kind, part of the structural cache key.
    pub kind: String,
    /// Maximum nesting depth of compiled children.
    pub max_depth: usize,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            discriminator: None,
            context: "default".to_string(),
            kind: "enhanced".to_string(),
            max_depth: 8,
        }
    }
}

impl CompileOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use an explicit discriminator field.
    pub fn discriminator(mut self, field: impl Into<String>) -> Self {
        self.discriminator = Some(field.into());
        self
    }

    /// Set the discriminator context id and schema kind.
    pub fn context(mut self, context: impl Into<String>, kind: impl Into<String>) -> Self {
        self.context = context.into();
        self.kind = kind.into();
        self
    }

    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }
}

/// Bounds of the compilation cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub capacity: usize,
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 50,
            ttl_secs: 5 * 60,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}
