//! Schema linting - static analysis of conditional schema files.
//!
//! Checks schema files for:
//! - JSON syntax errors
//! - Documents that compile to no fields
//! - Malformed condition markers
//! - `required` names that are never declared
//! - Branch conditionals and type tags the compiler will ignore

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{Map, Value};

use crate::compiler::{compile_fields, single_property_test, unwrap_document};
use crate::loader::load_schema;
use crate::markers::Predicate;
use crate::types::{CompileOptions, FieldType};

/// Condition marker keys checked for well-formedness, as (container, key).
const PREDICATE_MARKERS: &[(Option<&str>, &str)] = &[
    (None, "x-required-when"),
    (None, "x-visible-when"),
    (None, "x-optional-when"),
    (Some("x-ui"), "visibleWhen"),
    (Some("x-ui"), "requiredWhen"),
];

/// Keywords whose values are lists of subschemas.
const SUBSCHEMA_LISTS: &[&str] = &["allOf", "oneOf", "anyOf"];

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// A single diagnostic message from linting.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: String,
    pub file: PathBuf,
    /// JSON Pointer to the issue (e.g., "/properties/SPAN/x-required-when")
    pub path: String,
    pub message: String,
}

/// Result of linting a single file.
#[derive(Debug, Clone, Serialize)]
pub struct FileResult {
    pub file: PathBuf,
    pub status: FileStatus,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

/// Status of a linted file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Ok,
    Error,
    Warning,
}

/// Result of linting a directory or set of files.
#[derive(Debug, Clone, Serialize)]
pub struct LintResult {
    pub path: PathBuf,
    pub files_checked: usize,
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
    pub warnings: usize,
    pub results: Vec<FileResult>,
}

impl LintResult {
    /// Returns true if no file produced an error.
    pub fn is_ok(&self) -> bool {
        self.errors == 0
    }
}

/// Lint a file or a directory of `.json` files.
///
/// With `strict`, files with only warnings count as failed.
pub fn lint(path: &Path, strict: bool) -> LintResult {
    let files = collect_schema_files(path);
    let results: Vec<FileResult> = files.iter().map(|f| lint_file(f, path)).collect();

    let count = |severity: Severity| {
        results
            .iter()
            .flat_map(|r| &r.diagnostics)
            .filter(|d| d.severity == severity)
            .count()
    };
    let errors = count(Severity::Error);
    let warnings = count(Severity::Warning);

    let failed = results
        .iter()
        .filter(|r| match r.status {
            FileStatus::Ok => false,
            FileStatus::Warning => strict,
            FileStatus::Error => true,
        })
        .count();

    LintResult {
        path: path.to_path_buf(),
        files_checked: files.len(),
        passed: files.len() - failed,
        failed,
        errors,
        warnings,
        results,
    }
}

/// Lint a single schema file.
pub fn lint_file(file: &Path, base_path: &Path) -> FileResult {
    let mut lint = FileLint {
        file,
        diagnostics: Vec::new(),
    };

    match load_schema(file) {
        Ok(document) => lint.document(&document),
        Err(e) => lint.push(Severity::Error, "E001", "/", format!("syntax error: {}", e)),
    }

    let diagnostics = lint.diagnostics;
    let status = if diagnostics.iter().any(|d| d.severity == Severity::Error) {
        FileStatus::Error
    } else if diagnostics.is_empty() {
        FileStatus::Ok
    } else {
        FileStatus::Warning
    };

    FileResult {
        file: file.strip_prefix(base_path).unwrap_or(file).to_path_buf(),
        status,
        diagnostics,
    }
}

struct FileLint<'a> {
    file: &'a Path,
    diagnostics: Vec<Diagnostic>,
}

impl FileLint<'_> {
    fn push(&mut self, severity: Severity, code: &str, path: &str, message: String) {
        self.diagnostics.push(Diagnostic {
            severity,
            code: code.to_string(),
            file: self.file.to_path_buf(),
            path: if path.is_empty() { "/".to_string() } else { path.to_string() },
            message,
        });
    }

    fn document(&mut self, document: &Value) {
        let schema = unwrap_document(document).schema;
        let root = pointer_to(document, schema, String::new()).unwrap_or_default();

        if compile_fields(document, &CompileOptions::default()).is_empty() {
            self.push(
                Severity::Error,
                "E002",
                &root,
                "no properties found after unwrapping".to_string(),
            );
        }

        if let Some(map) = schema.as_object() {
            self.branches(map, &root);
        }
        self.schema(schema, &BTreeSet::new(), &root);
    }

    /// W001: branch conditionals the compiler skips.
    fn branches(&mut self, root: &Map<String, Value>, path: &str) {
        let entries = root.get("allOf").and_then(Value::as_array);
        for (i, entry) in entries.into_iter().flatten().enumerate() {
            if let (Some(cond), Some(_)) = (entry.get("if"), entry.get("then")) {
                self.branch(cond, &format!("{}/allOf/{}/if", path, i));
            }
        }
        if let (Some(cond), Some(_)) = (root.get("if"), root.get("then")) {
            self.branch(cond, &format!("{}/if", path));
        }
    }

    fn branch(&mut self, condition: &Value, path: &str) {
        if single_property_test(condition).is_none() {
            self.push(
                Severity::Warning,
                "W001",
                path,
                "branch condition is not a single-property const/enum test and will be ignored"
                    .to_string(),
            );
        }
    }

    /// Walk a schema node. `inherited` holds property names declared by
    /// enclosing schemas that conditional blocks may require.
    fn schema(&mut self, node: &Value, inherited: &BTreeSet<String>, path: &str) {
        let Some(map) = node.as_object() else {
            return;
        };

        self.type_tag(map, path);
        self.predicates(map, path);

        let properties = map.get("properties").and_then(Value::as_object);
        let mut declared = inherited.clone();
        declared.extend(properties.into_iter().flat_map(|p| p.keys().cloned()));

        if let Some(required) = map.get("required").and_then(Value::as_array) {
            for (i, name) in required.iter().enumerate() {
                let Some(name) = name.as_str() else {
                    continue;
                };
                if !declared.contains(name) {
                    self.push(
                        Severity::Error,
                        "E004",
                        &format!("{}/required/{}", path, i),
                        format!("required field \"{}\" is not declared", name),
                    );
                }
            }
        }

        let none = BTreeSet::new();
        for (name, child) in properties.into_iter().flatten() {
            self.schema(child, &none, &format!("{}/properties/{}", path, escape(name)));
        }
        if let Some(items) = map.get("items") {
            self.schema(items, &none, &format!("{}/items", path));
        }
        for key in SUBSCHEMA_LISTS {
            let list = map.get(*key).and_then(Value::as_array);
            for (i, sub) in list.into_iter().flatten().enumerate() {
                self.schema(sub, &declared, &format!("{}/{}/{}", path, key, i));
            }
        }
        for key in ["then", "else"] {
            if let Some(sub) = map.get(key) {
                self.schema(sub, &declared, &format!("{}/{}", path, key));
            }
        }
    }

    /// W002: type tags outside the JSON Schema primitives.
    fn type_tag(&mut self, map: &Map<String, Value>, path: &str) {
        let tags: Vec<&str> = match map.get("type") {
            Some(Value::String(tag)) => vec![tag.as_str()],
            Some(Value::Array(tags)) => tags.iter().filter_map(Value::as_str).collect(),
            _ => return,
        };
        for tag in tags {
            if tag != "null" && FieldType::parse_primitive(tag).is_none() {
                self.push(
                    Severity::Warning,
                    "W002",
                    &format!("{}/type", path),
                    format!("unknown type \"{}\" will be treated as string", tag),
                );
            }
        }
    }

    /// E003: condition markers that are present but can't be parsed.
    fn predicates(&mut self, map: &Map<String, Value>, path: &str) {
        for (container, key) in PREDICATE_MARKERS {
            let (value, marker_path) = match container {
                None => (map.get(*key), format!("{}/{}", path, key)),
                Some(outer) => (
                    map.get(*outer).and_then(|o| o.get(*key)),
                    format!("{}/{}/{}", path, outer, key),
                ),
            };
            let Some(value) = value else {
                continue;
            };
            if Predicate::parse(value).is_none() {
                self.push(
                    Severity::Error,
                    "E003",
                    &marker_path,
                    format!("malformed condition marker {}: {}", key, value),
                );
            }
        }
    }
}

/// JSON Pointer of `target` inside `root`, found by identity.
fn pointer_to(root: &Value, target: &Value, path: String) -> Option<String> {
    if std::ptr::eq(root, target) {
        return Some(path);
    }
    match root {
        Value::Object(map) => map
            .iter()
            .find_map(|(k, v)| pointer_to(v, target, format!("{}/{}", path, escape(k)))),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .find_map(|(i, v)| pointer_to(v, target, format!("{}/{}", path, i))),
        _ => None,
    }
}

fn escape(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

/// Collect all .json files in a path (file or directory).
fn collect_schema_files(path: &Path) -> Vec<PathBuf> {
    if path.is_file() {
        if is_json(path) {
            return vec![path.to_path_buf()];
        }
        return vec![];
    }

    let mut files = Vec::new();
    collect_files_recursive(path, &mut files);
    files.sort();
    files
}

fn collect_files_recursive(dir: &Path, files: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_files_recursive(&path, files);
        } else if is_json(&path) {
            files.push(path);
        }
    }
}

fn is_json(path: &Path) -> bool {
    path.extension().is_some_and(|e| e == "json")
}
