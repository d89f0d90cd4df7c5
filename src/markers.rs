//! Vendor extension marker interpretation.
//!
//! Markers are non-standard keys on a property definition. Several equivalent
//! spellings exist for most of them; each is looked up in a fixed order and
//! the first well-formed hit wins. Malformed shapes are treated as absent.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::{display_value, value_key};

/// Prefix shared by every vendor marker key.
pub const MARKER_PREFIX: &str = "x-";

/// Where a marker may live on a property definition.
#[derive(Debug, Clone, Copy)]
enum Spelling {
    /// Directly on the definition: `{"x-label": ..}`.
    Top(&'static str),
    /// One level under a named sub-object: `{"x-ui": {"label": ..}}`.
    Nested(&'static str, &'static str),
}

use Spelling::{Nested, Top};

const LABEL: &[Spelling] = &[
    Nested("x-ui", "label"),
    Nested("ui", "label"),
    Top("x-label"),
    Top("title"),
];
const GROUP: &[Spelling] = &[
    Nested("x-ui", "group"),
    Nested("ui", "group"),
    Top("x-ui-group"),
    Top("x-group"),
];
const HINT: &[Spelling] = &[Nested("x-ui", "hint"), Nested("ui", "hint"), Top("x-ui-hint")];
const VISIBLE_WHEN: &[Spelling] = &[
    Nested("x-ui", "visibleWhen"),
    Nested("ui", "visibleWhen"),
    Top("x-visible-when"),
];
const REQUIRED_WHEN: &[Spelling] = &[Top("x-required-when"), Nested("x-ui", "requiredWhen")];
const OPTIONAL_WHEN: &[Spelling] = &[Top("x-optional-when")];
const RELEVANCE_MAP: &[Spelling] = &[Top("x-required-by-type"), Top("x-relevant-by-type")];
const ENUM_MAP: &[Spelling] = &[Top("x-enum-by-type")];
const BOUNDS_MAP: &[Spelling] = &[Top("x-value-constraint"), Top("x-bounds-by-type")];
const ENUM_LABELS: &[Spelling] = &[Top("x-enum-labels")];
const SECTION_HEADER: &[Spelling] = &[Top("x-section-header"), Nested("x-ui", "sectionHeader")];

impl Spelling {
    fn get<'a>(&self, definition: &'a Value) -> Option<&'a Value> {
        match *self {
            Top(key) => definition.get(key),
            Nested(outer, key) => definition.get(outer)?.get(key),
        }
    }
}

/// Try each spelling in order, returning the first that `parse` accepts.
fn lookup<'a, T>(
    definition: &'a Value,
    spellings: &[Spelling],
    parse: impl Fn(&'a Value) -> Option<T>,
) -> Option<T> {
    spellings
        .iter()
        .filter_map(|s| s.get(definition))
        .find_map(parse)
}

fn non_empty_str(value: &Value) -> Option<String> {
    value
        .as_str()
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
}

fn object(value: &Value) -> Option<Map<String, Value>> {
    value.as_object().cloned()
}

/// Accepted value(s) for one clause of a condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Expected {
    /// Membership test against a value set.
    AnyOf(Vec<Value>),
    /// Equality test against a single value.
    One(Value),
}

impl Expected {
    fn from_value(value: &Value) -> Self {
        match value {
            Value::Array(values) => Expected::AnyOf(values.clone()),
            other => Expected::One(other.clone()),
        }
    }

    /// Every value this clause accepts.
    pub fn values(&self) -> Vec<&Value> {
        match self {
            Expected::AnyOf(values) => values.iter().collect(),
            Expected::One(value) => vec![value],
        }
    }

    fn label(&self) -> String {
        match self {
            Expected::One(value) => display_value(value),
            Expected::AnyOf(values) => values
                .iter()
                .map(display_value)
                .collect::<Vec<_>>()
                .join(" or "),
        }
    }
}

/// `field == value` or `field in values`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clause {
    pub field: String,
    pub expected: Expected,
}

impl Clause {
    pub fn new(field: impl Into<String>, expected: Expected) -> Self {
        Self {
            field: field.into(),
            expected,
        }
    }

    pub fn label(&self) -> String {
        format!("\"{}\" is {}", self.field, self.expected.label())
    }
}

/// Conjunction of clauses: every clause must hold.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Condition {
    pub clauses: Vec<Clause>,
}

impl Condition {
    /// Parse the `{field: value | [values]}` object form.
    ///
    /// Returns `None` for non-objects and empty objects.
    pub fn from_object(value: &Value) -> Option<Self> {
        let map = value.as_object()?;
        if map.is_empty() {
            return None;
        }
        let clauses = map
            .iter()
            .map(|(field, expected)| Clause::new(field.clone(), Expected::from_value(expected)))
            .collect();
        Some(Self { clauses })
    }

    pub fn single(field: impl Into<String>, expected: Expected) -> Self {
        Self {
            clauses: vec![Clause::new(field, expected)],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Clause for `field`, if the condition constrains it.
    pub fn clause(&self, field: &str) -> Option<&Clause> {
        self.clauses.iter().find(|c| c.field == field)
    }

    /// Combine two conditions; both must hold.
    pub fn and(mut self, other: &Condition) -> Self {
        for clause in &other.clauses {
            if !self.clauses.contains(clause) {
                self.clauses.push(clause.clone());
            }
        }
        self
    }

    /// `"KEY" is VALUE` clauses joined with `", "`.
    pub fn label(&self) -> String {
        self.clauses
            .iter()
            .map(Clause::label)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// A condition marker together with its display text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Predicate {
    /// The condition evaluated at runtime.
    pub condition: Condition,
    /// Display text. For the array form all entries are joined with `" | "`.
    pub label: String,
}

impl Predicate {
    /// Parse either the object form or the `[{condition, hint}, ..]` array form.
    pub fn parse(value: &Value) -> Option<Self> {
        match value {
            Value::Object(_) => {
                let condition = Condition::from_object(value)?;
                let label = condition.label();
                Some(Self { condition, label })
            }
            Value::Array(entries) => {
                let conditions: Vec<Condition> = entries
                    .iter()
                    .filter_map(|entry| {
                        // legacy entries carry the condition object directly
                        let inner = entry.get("condition").unwrap_or(entry);
                        Condition::from_object(inner)
                    })
                    .collect();
                let label = conditions
                    .iter()
                    .map(Condition::label)
                    .collect::<Vec<_>>()
                    .join(" | ");
                let condition = conditions.into_iter().next()?;
                Some(Self { condition, label })
            }
            _ => None,
        }
    }

    pub fn from_condition(condition: Condition) -> Self {
        let label = condition.label();
        Self { condition, label }
    }
}

/// Structured view of every marker on one property definition.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FieldMarkers {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section_header: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visible_when: Option<Predicate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_when: Option<Predicate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub optional_when: Option<Predicate>,
    /// Discriminator value → relevance (`false` means not relevant).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relevance: Option<Map<String, Value>>,
    /// Discriminator value → allowed enum values.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enum_by_discriminator: Option<Map<String, Value>>,
    /// Discriminator value → bound/constraint description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounds: Option<Map<String, Value>>,
    /// Enum value → display label.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enum_labels: Option<Map<String, Value>>,
}

impl FieldMarkers {
    /// Read every recognised marker from a property definition.
    pub fn from_definition(definition: &Value) -> Self {
        Self {
            label: lookup(definition, LABEL, non_empty_str),
            group: lookup(definition, GROUP, non_empty_str),
            hint: lookup(definition, HINT, non_empty_str),
            section_header: lookup(definition, SECTION_HEADER, non_empty_str),
            visible_when: lookup(definition, VISIBLE_WHEN, Predicate::parse),
            required_when: lookup(definition, REQUIRED_WHEN, Predicate::parse),
            optional_when: lookup(definition, OPTIONAL_WHEN, Predicate::parse),
            relevance: lookup(definition, RELEVANCE_MAP, object),
            enum_by_discriminator: lookup(definition, ENUM_MAP, object),
            bounds: lookup(definition, BOUNDS_MAP, object),
            enum_labels: lookup(definition, ENUM_LABELS, object),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == FieldMarkers::default()
    }

    /// True when the group takes part in discriminator-based group relevance.
    ///
    /// Groups whose name mentions "common" apply to every discriminator value.
    pub fn specific_group(&self) -> Option<&str> {
        self.group
            .as_deref()
            .filter(|g| !g.to_lowercase().contains("common"))
    }

    /// Every discriminator value these markers declare the field relevant for.
    pub fn discriminator_values(&self, discriminator: &str) -> BTreeSet<String> {
        let mut values = BTreeSet::new();
        if let Some(relevance) = &self.relevance {
            for (key, status) in relevance {
                if *status != Value::Bool(false) {
                    values.insert(key.clone());
                }
            }
        }
        for map in [&self.enum_by_discriminator, &self.bounds].into_iter().flatten() {
            values.extend(map.keys().cloned());
        }
        if let Some(clause) = self
            .required_when
            .as_ref()
            .and_then(|p| p.condition.clause(discriminator))
        {
            values.extend(clause.expected.values().into_iter().map(value_key));
        }
        values
    }
}

/// True for keys that are vendor markers.
pub fn is_marker_key(key: &str) -> bool {
    key.starts_with(MARKER_PREFIX)
}
