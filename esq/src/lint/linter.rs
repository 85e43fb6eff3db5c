//! Recursive query tree walker.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::catalog::{FieldCatalog, FieldType};
use crate::query::{Clause, SearchRequest};

/// Severity of a lint message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LintLevel {
    /// Executes, but is probably a modeling mistake
    Warn,
    /// Unsafe to execute
    Error,
}

impl std::fmt::Display for LintLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LintLevel::Warn => write!(f, "warn"),
            LintLevel::Error => write!(f, "error"),
        }
    }
}

/// One reported concern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LintMessage {
    pub level: LintLevel,
    pub message: String,
    /// Breadcrumb for humans, e.g. `query.bool.filter[0].term`
    pub path: String,
}

impl LintMessage {
    pub fn warn(message: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            level: LintLevel::Warn,
            message: message.into(),
            path: path.into(),
        }
    }

    pub fn error(message: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            level: LintLevel::Error,
            message: message.into(),
            path: path.into(),
        }
    }
}

impl std::fmt::Display for LintMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {} ({})", self.level, self.message, self.path)
    }
}

/// Outcome of a lint pass. `ok` is false iff any message is an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LintResult {
    pub ok: bool,
    pub messages: Vec<LintMessage>,
}

impl LintResult {
    fn from_messages(messages: Vec<LintMessage>) -> Self {
        let ok = !messages.iter().any(|m| m.level == LintLevel::Error);
        Self { ok, messages }
    }

    pub fn errors(&self) -> impl Iterator<Item = &LintMessage> {
        self.messages.iter().filter(|m| m.level == LintLevel::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &LintMessage> {
        self.messages.iter().filter(|m| m.level == LintLevel::Warn)
    }

    pub fn has_warnings(&self) -> bool {
        self.warnings().next().is_some()
    }
}

/// Leaf kinds whose body is keyed by the field name: `{kind: {field: ..}}`.
const FIELD_KEYED_LEAVES: &[&str] = &[
    "term",
    "terms",
    "match",
    "match_phrase",
    "match_phrase_prefix",
    "prefix",
    "wildcard",
    "regexp",
    "fuzzy",
    "range",
];

/// Leaf body keys that are engine parameters rather than field names.
const LEAF_PARAMS: &[&str] = &["boost", "_name"];

/// Lint a search request document (`{"query": .., ..}`).
///
/// Accepts any JSON-shaped tree, not just compiler output, and never fails.
pub fn lint(request: &Value, catalog: Option<&FieldCatalog>) -> LintResult {
    let Some(query) = request.get("query").filter(|q| !q.is_null()) else {
        return LintResult::from_messages(vec![LintMessage::error(
            "missing query: request has no top-level `query`",
            "query",
        )]);
    };

    let mut messages = Vec::new();
    walk(query, "query", None, catalog, &mut messages);

    let result = LintResult::from_messages(messages);
    tracing::debug!(
        ok = result.ok,
        messages = result.messages.len(),
        "linted query tree"
    );
    result
}

/// Lint a typed compiler output.
pub fn lint_request(request: &SearchRequest, catalog: Option<&FieldCatalog>) -> LintResult {
    lint(&request.to_value(), catalog)
}

/// Depth-first walk. `scope` is the nested path enclosing `node`, if any.
fn walk(
    node: &Value,
    path: &str,
    scope: Option<&str>,
    catalog: Option<&FieldCatalog>,
    out: &mut Vec<LintMessage>,
) {
    let Some(node) = node.as_object() else {
        return;
    };

    for (kind, body) in node {
        let here = format!("{}.{}", path, kind);
        match kind.as_str() {
            "bool" => {
                for clause in Clause::ALL {
                    let bucket = clause.as_str();
                    match body.get(bucket) {
                        Some(Value::Array(children)) => {
                            for (i, child) in children.iter().enumerate() {
                                let child_path = format!("{}.{}[{}]", here, bucket, i);
                                walk(child, &child_path, scope, catalog, out);
                            }
                        }
                        // Single-object bucket
                        Some(child) if child.is_object() => {
                            let child_path = format!("{}.{}", here, bucket);
                            walk(child, &child_path, scope, catalog, out);
                        }
                        _ => {}
                    }
                }
            }
            "nested" => walk_nested(body, &here, catalog, out),
            "constant_score" => walk_child(body, "filter", &here, scope, catalog, out),
            "function_score" => walk_child(body, "query", &here, scope, catalog, out),
            "boosting" => {
                walk_child(body, "positive", &here, scope, catalog, out);
                walk_child(body, "negative", &here, scope, catalog, out);
            }
            "dis_max" => {
                if let Some(queries) = body.get("queries").and_then(Value::as_array) {
                    for (i, child) in queries.iter().enumerate() {
                        let child_path = format!("{}.queries[{}]", here, i);
                        walk(child, &child_path, scope, catalog, out);
                    }
                }
            }
            "exists" => {
                if let Some(field) = body.get("field").and_then(Value::as_str) {
                    check_leaf(kind, field, &here, scope, catalog, out);
                }
            }
            "query_string" => {
                if let Some(field) = body.get("default_field").and_then(Value::as_str) {
                    check_leaf(kind, field, &here, scope, catalog, out);
                }
                out.push(LintMessage::warn(
                    "query_string has lenient, fragile syntax; prefer structured leaves",
                    here.as_str(),
                ));
            }
            leaf if FIELD_KEYED_LEAVES.contains(&leaf) => {
                if let Some(field) = leaf_field(body) {
                    check_leaf(leaf, field, &here, scope, catalog, out);
                }
            }
            _ => {}
        }
    }
}

fn walk_child(
    body: &Value,
    key: &str,
    path: &str,
    scope: Option<&str>,
    catalog: Option<&FieldCatalog>,
    out: &mut Vec<LintMessage>,
) {
    if let Some(child) = body.get(key) {
        walk(child, &format!("{}.{}", path, key), scope, catalog, out);
    }
}

fn walk_nested(
    body: &Value,
    path: &str,
    catalog: Option<&FieldCatalog>,
    out: &mut Vec<LintMessage>,
) {
    let Some(nested_path) = body.get("path").and_then(Value::as_str) else {
        out.push(LintMessage::error("nested query without `path`", path));
        return;
    };

    if let Some(catalog) = catalog {
        if !catalog.has_path_prefix(nested_path) {
            out.push(LintMessage::warn(
                format!("nested path '{}' matches no catalog field", nested_path),
                path,
            ));
        }
    }

    walk_child(body, "query", path, Some(nested_path), catalog, out);
}

/// Field named by a field-keyed leaf body.
fn leaf_field(body: &Value) -> Option<&str> {
    body.as_object()?
        .keys()
        .find(|key| !LEAF_PARAMS.contains(&key.as_str()))
        .map(String::as_str)
}

/// Nested-scope and type checks for one leaf.
fn check_leaf(
    kind: &str,
    field: &str,
    path: &str,
    scope: Option<&str>,
    catalog: Option<&FieldCatalog>,
    out: &mut Vec<LintMessage>,
) {
    let Some(info) = catalog.and_then(|c| c.get(field)) else {
        return;
    };

    if let Some(nested_path) = info.nested_path() {
        if scope != Some(nested_path) {
            out.push(LintMessage::error(
                format!(
                    "field '{}' belongs to nested path '{}' but is used outside its nested wrapper",
                    field, nested_path
                ),
                path,
            ));
        }
    }

    match kind {
        "term" | "terms"
            if info.field_type == FieldType::Text && !info.has_exact_companion() =>
        {
            out.push(LintMessage::warn(
                format!(
                    "{} used on text field '{}' which has no keyword companion",
                    kind, field
                ),
                path,
            ));
        }
        "match" | "match_phrase" if info.field_type == FieldType::Keyword => {
            out.push(LintMessage::warn(
                format!("{} used on keyword field '{}'; use term instead", kind, field),
                path,
            ));
        }
        "range" if !info.field_type.is_rangeable() => {
            out.push(LintMessage::warn(
                format!("range used on {} field '{}'", info.field_type, field),
                path,
            ));
        }
        _ => {}
    }
}
