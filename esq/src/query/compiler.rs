//! Condition-to-query compiler.
//!
//! Compilation is best-effort and never fails: conditions with an empty
//! field, a missing value or an unknown operator are dropped (and logged at
//! debug level) so a partially filled form still yields a valid query.

use serde_json::Value;

use super::condition::{is_blank, Clause, CompileInput, Condition, Operator, Timeframe};
use super::tree::{BoolQuery, Query, RangeBounds, SearchRequest};
use crate::catalog::{FieldCatalog, FieldInfo, FieldType};

/// Upper bound used when a range or timeframe omits one.
pub const DEFAULT_UPPER_BOUND: &str = "now";

/// Where an operator sends its leaf before the clause override.
enum Target {
    /// The condition's own clause
    AsGiven,
    /// A fixed bucket; a `must_not` clause still wins
    Fixed(Clause),
    /// Always `must_not`
    Negated,
}

/// A compiled leaf waiting for placement.
struct Leaf {
    clause: Clause,
    nested_path: Option<String>,
    query: Query,
}

/// Leaves sharing one nested path, folded into a single wrapper.
struct NestedGroup {
    path: String,
    inner: BoolQuery,
}

/// Compile conditions, an optional timeframe and a size into a search request.
///
/// Deterministic: conditions are processed in input order and the output
/// serializes identically for identical input and catalog.
pub fn compile(input: &CompileInput, catalog: Option<&FieldCatalog>) -> SearchRequest {
    let mut outer = BoolQuery::default();
    let mut groups: Vec<NestedGroup> = Vec::new();

    for (index, condition) in input.conditions.iter().enumerate() {
        let Some(leaf) = compile_condition(condition, catalog) else {
            continue;
        };
        tracing::trace!(index, clause = %leaf.clause, nested = ?leaf.nested_path, "compiled condition");

        match leaf.nested_path {
            Some(path) => match groups.iter_mut().find(|g| g.path == path) {
                Some(group) => group.inner.push(leaf.clause, leaf.query),
                None => {
                    let mut inner = BoolQuery::default();
                    inner.push(leaf.clause, leaf.query);
                    groups.push(NestedGroup { path, inner });
                }
            },
            None => outer.push(leaf.clause, leaf.query),
        }
    }

    for group in groups {
        // A group never splits across outer buckets
        let Some(clause) = group.inner.primary_clause() else {
            continue;
        };
        tracing::trace!(path = %group.path, %clause, "placed nested group");
        outer.push(
            clause,
            Query::Nested {
                path: group.path,
                query: Box::new(Query::Bool(group.inner)),
            },
        );
    }

    if let Some(range) = input.timeframe.as_ref().and_then(timeframe_range) {
        outer.filter.push(range);
    }

    let query = if outer.is_empty() {
        Query::MatchAll
    } else {
        outer.adjust_pure_negative = true;
        Query::Bool(outer)
    };

    SearchRequest {
        size: input.size.unwrap_or(0),
        query,
        aggregations: None,
    }
}

/// Compile one condition into a leaf and its target bucket.
fn compile_condition(condition: &Condition, catalog: Option<&FieldCatalog>) -> Option<Leaf> {
    let field = condition.field.trim();
    if field.is_empty() {
        tracing::debug!(operator = %condition.operator, "dropping condition without field");
        return None;
    }

    let operator = condition.operator;
    if operator.requires_value() && is_blank(condition.value.as_ref()) {
        tracing::debug!(field, %operator, "dropping condition without value");
        return None;
    }

    let info = catalog.and_then(|c| c.get(field));
    let field_type = info.map(|i| i.field_type).unwrap_or_default();
    let exact_field = info
        .and_then(|i| i.keyword_field.as_deref())
        .unwrap_or(field);
    let value = condition.value.clone().unwrap_or(Value::Null);

    let (query, target) = match operator {
        Operator::Contains => (full_text(field, value), Target::AsGiven),
        Operator::NotContains => (full_text(field, value), Target::Negated),
        Operator::Phrase => (phrase(field, value, condition.slop), Target::AsGiven),
        Operator::NotPhrase => (phrase(field, value, condition.slop), Target::Negated),
        Operator::Equals | Operator::Exact => {
            (exact_or_phrase(field, info, value), Target::Fixed(Clause::Filter))
        }
        Operator::NotExact => (exact_or_phrase(field, info, value), Target::Negated),
        Operator::In => {
            let values = set_values(&value);
            if values.is_empty() {
                tracing::debug!(field, "dropping `in` condition with empty set");
                return None;
            }
            let target_field = if field_type == FieldType::Keyword {
                field
            } else {
                exact_field
            };
            let query = Query::Terms {
                field: target_field.to_string(),
                values,
            };
            (query, Target::Fixed(Clause::Filter))
        }
        Operator::Exists => (exists(field), Target::Fixed(Clause::Filter)),
        Operator::NotExists => (exists(field), Target::Negated),
        Operator::Gt | Operator::Gte | Operator::Lt | Operator::Lte => {
            let mut bounds = RangeBounds::default();
            let slot = match operator {
                Operator::Gt => &mut bounds.gt,
                Operator::Gte => &mut bounds.gte,
                Operator::Lt => &mut bounds.lt,
                _ => &mut bounds.lte,
            };
            *slot = Some(value);
            (one_sided(field, bounds), Target::Fixed(Clause::Filter))
        }
        // Range rather than term so comparison stays type-agnostic
        Operator::Eq => (
            one_sided(field, RangeBounds::between(value.clone(), value)),
            Target::Fixed(Clause::Filter),
        ),
        // Term on the exact field regardless of field type
        Operator::Neq => (
            Query::Term {
                field: exact_field.to_string(),
                value,
            },
            Target::Negated,
        ),
        Operator::Between => {
            let upper = match condition.value2.as_ref() {
                Some(upper) if !is_blank(Some(upper)) => upper.clone(),
                _ => Value::from(DEFAULT_UPPER_BOUND),
            };
            (
                one_sided(field, RangeBounds::between(value, upper)),
                Target::Fixed(Clause::Filter),
            )
        }
        Operator::QueryString => (
            Query::QueryString {
                query: value_to_string(&value),
                default_field: Some(field.to_string()),
            },
            Target::AsGiven,
        ),
        Operator::Unknown => {
            tracing::debug!(field, "dropping condition with unknown operator");
            return None;
        }
    };

    let clause = match target {
        Target::AsGiven => condition.clause,
        Target::Fixed(_) if condition.clause == Clause::MustNot => Clause::MustNot,
        Target::Fixed(clause) => clause,
        Target::Negated => Clause::MustNot,
    };

    let nested_path = condition
        .nested_path
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .or_else(|| info.and_then(FieldInfo::nested_path))
        .map(str::to_string);

    Some(Leaf {
        clause,
        nested_path,
        query,
    })
}

fn full_text(field: &str, query: Value) -> Query {
    Query::Match {
        field: field.to_string(),
        query,
    }
}

fn phrase(field: &str, query: Value, slop: Option<u32>) -> Query {
    Query::MatchPhrase {
        field: field.to_string(),
        query,
        slop: slop.unwrap_or(0),
    }
}

fn exists(field: &str) -> Query {
    Query::Exists {
        field: field.to_string(),
    }
}

fn one_sided(field: &str, bounds: RangeBounds) -> Query {
    Query::Range {
        field: field.to_string(),
        bounds,
    }
}

/// Exact term on the keyword companion when the field has one (or is a
/// keyword itself), phrase match on the field otherwise.
fn exact_or_phrase(field: &str, info: Option<&FieldInfo>, value: Value) -> Query {
    match info {
        Some(info) if info.field_type == FieldType::Keyword => Query::Term {
            field: info.keyword_field.as_deref().unwrap_or(field).to_string(),
            value,
        },
        Some(FieldInfo {
            field_type: FieldType::Text,
            keyword_field: Some(keyword_field),
            ..
        }) => Query::Term {
            field: keyword_field.clone(),
            value,
        },
        _ => phrase(field, value, None),
    }
}

/// Normalize an `in` payload into its non-blank members.
///
/// Lists keep their non-blank elements, strings are split on commas and
/// newlines, any other scalar becomes a single member.
fn set_values(value: &Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter(|item| !is_blank(Some(item)))
            .map(|item| match item {
                Value::String(s) => Value::String(s.trim().to_string()),
                other => other.clone(),
            })
            .collect(),
        Value::String(s) => s
            .split([',', '\n'])
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| Value::String(part.to_string()))
            .collect(),
        Value::Null => Vec::new(),
        other => vec![other.clone()],
    }
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Range leaf for the timeframe, if it names a field.
fn timeframe_range(timeframe: &Timeframe) -> Option<Query> {
    let field = timeframe.field.trim();
    if field.is_empty() {
        tracing::debug!("ignoring timeframe without field");
        return None;
    }

    let gte = timeframe.gte.clone().filter(|v| !is_blank(Some(v)));
    let lte = timeframe
        .lte
        .clone()
        .filter(|v| !is_blank(Some(v)))
        .unwrap_or_else(|| Value::from(DEFAULT_UPPER_BOUND));

    Some(one_sided(
        field,
        RangeBounds {
            gte,
            lte: Some(lte),
            ..Default::default()
        },
    ))
}
