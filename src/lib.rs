//! Conditional Schema Fields
//!
//! Compiles JSON Schema documents with conditional branches and vendor
//! markers into a flat list of canonical fields, and evaluates each field's
//! runtime state (visible, required, enabled) against a snapshot of values.
//!
//! # Example
//!
//! ```
//! use schema_fields::{compile, evaluate, CompileOptions};
//! use serde_json::json;
//!
//! let schema = json!({
//!     "type": "object",
//!     "properties": {
//!         "TYPE": { "type": "string", "enum": ["BEAM", "TRUSS"] },
//!         "SPAN": { "type": "number" }
//!     },
//!     "allOf": [{
//!         "if": { "properties": { "TYPE": { "const": "BEAM" } } },
//!         "then": { "required": ["SPAN"] }
//!     }]
//! });
//!
//! let compiled = compile(&schema, &CompileOptions::default());
//! assert_eq!(compiled.discriminator.as_deref(), Some("TYPE"));
//!
//! let values = json!({ "TYPE": "BEAM" });
//! let states = evaluate(&compiled, values.as_object().unwrap());
//! assert!(states["SPAN"].visible);
//! assert!(states["SPAN"].required_now);
//!
//! let values = json!({ "TYPE": "TRUSS" });
//! let states = evaluate(&compiled, values.as_object().unwrap());
//! assert!(!states["SPAN"].visible);
//! ```
//!
//! # Requirement Rules
//!
//! | Source | Effect |
//! |--------|--------|
//! | branch `then.required` | required for the triggering discriminator values |
//! | `x-required-when` | required while the condition holds, hidden otherwise |
//! | root `required` | always required |
//! | option block `required` | required within that option |
//!
//! # Marker Format
//!
//! Conditions are objects of field to value (or value list):
//! ```json
//! { "x-required-when": { "TYPE": ["BEAM", "TRUSS"] } }
//! ```
//!
//! Or a list of conditions with display hints:
//! ```json
//! { "x-required-when": [{ "condition": { "TYPE": "BEAM" }, "hint": "beam only" }] }
//! ```

mod adapters;
mod cache;
mod compiler;
mod error;
mod linter;
mod loader;
mod markers;
mod payload;
mod runtime;
mod types;
mod validator;

pub use adapters::{
    builder_fields, default_value, format_default, initial_values, table_rows,
    visible_builder_fields, BuilderField, BuilderType, RowNumber, TableRow,
};
pub use cache::{LruTtlCache, SchemaCompiler};
pub use compiler::{cache_key, compile, compile_fields, normalize_type, unwrap_document, Unwrapped};
pub use error::{FieldError, LoadError, ValidateError};
pub use linter::{lint, lint_file, Diagnostic, FileResult, FileStatus, LintResult, Severity};
pub use loader::{load_schema, load_schema_str, load_values, strip_markers};
pub use markers::{is_marker_key, Clause, Condition, Expected, FieldMarkers, Predicate};
pub use payload::{assemble_payload, has_value, include, wrap_argument};
pub use runtime::{
    condition_met, evaluate, evaluate_fields, field_state, group_relevance, lookup,
    RequirementRule,
};
pub use types::{
    display_value, value_key, CacheConfig, CanonicalField, CompileOptions, CompiledSchema,
    FieldCondition, FieldType, RequiredMode, Requirement, RuntimeState, RuntimeStateMap,
    DEFAULT_DISCRIMINATOR, WILDCARD_KEY,
};
pub use validator::{validate_against_schema, validate_payload, validate_values};
