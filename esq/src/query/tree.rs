//! Query tree produced by the compiler, serialized to the engine's JSON DSL.

use serde::{Serialize, Serializer};
use serde_json::{json, Map, Value};

use super::condition::Clause;

/// A node of the compiled query tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    /// `{"match_all": {}}`
    MatchAll,
    Match {
        field: String,
        query: Value,
    },
    MatchPhrase {
        field: String,
        query: Value,
        slop: u32,
    },
    Term {
        field: String,
        value: Value,
    },
    Terms {
        field: String,
        values: Vec<Value>,
    },
    Exists {
        field: String,
    },
    Range {
        field: String,
        bounds: RangeBounds,
    },
    QueryString {
        query: String,
        default_field: Option<String>,
    },
    Bool(BoolQuery),
    /// Isolating wrapper for fields under a nested object.
    Nested {
        path: String,
        query: Box<Query>,
    },
}

/// Bounds of a range leaf. Absent bounds are not serialized.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RangeBounds {
    pub gt: Option<Value>,
    pub gte: Option<Value>,
    pub lt: Option<Value>,
    pub lte: Option<Value>,
}

impl RangeBounds {
    pub fn between(gte: Value, lte: Value) -> Self {
        Self {
            gte: Some(gte),
            lte: Some(lte),
            ..Default::default()
        }
    }
}

/// A `bool` node. Empty buckets are never serialized.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoolQuery {
    pub must: Vec<Query>,
    pub filter: Vec<Query>,
    pub must_not: Vec<Query>,
    pub should: Vec<Query>,
    /// Treat a query made only of negative clauses as matching nothing
    /// rather than everything.
    pub adjust_pure_negative: bool,
}

impl BoolQuery {
    pub fn bucket(&self, clause: Clause) -> &[Query] {
        match clause {
            Clause::Must => &self.must,
            Clause::Filter => &self.filter,
            Clause::MustNot => &self.must_not,
            Clause::Should => &self.should,
        }
    }

    pub fn push(&mut self, clause: Clause, query: Query) {
        match clause {
            Clause::Must => self.must.push(query),
            Clause::Filter => self.filter.push(query),
            Clause::MustNot => self.must_not.push(query),
            Clause::Should => self.should.push(query),
        }
    }

    pub fn is_empty(&self) -> bool {
        Clause::ALL.iter().all(|clause| self.bucket(*clause).is_empty())
    }

    /// First non-empty bucket in priority order.
    pub fn primary_clause(&self) -> Option<Clause> {
        Clause::ALL
            .into_iter()
            .find(|clause| !self.bucket(*clause).is_empty())
    }

    pub fn to_value(&self) -> Value {
        let mut body = Map::new();
        for clause in Clause::ALL {
            let queries = self.bucket(clause);
            if !queries.is_empty() {
                body.insert(
                    clause.as_str().to_string(),
                    Value::Array(queries.iter().map(Query::to_value).collect()),
                );
            }
        }
        if self.adjust_pure_negative {
            body.insert("adjust_pure_negative".to_string(), Value::Bool(true));
        }
        keyed("bool", Value::Object(body))
    }
}

impl Query {
    /// Serialize to the engine's JSON DSL with stable key order.
    pub fn to_value(&self) -> Value {
        match self {
            Query::MatchAll => json!({ "match_all": {} }),
            Query::Match { field, query } => {
                keyed("match", keyed(field, json!({ "query": query })))
            }
            Query::MatchPhrase { field, query, slop } => keyed(
                "match_phrase",
                keyed(field, json!({ "query": query, "slop": slop })),
            ),
            Query::Term { field, value } => keyed("term", keyed(field, json!({ "value": value }))),
            Query::Terms { field, values } => keyed("terms", keyed(field, Value::Array(values.clone()))),
            Query::Exists { field } => json!({ "exists": { "field": field } }),
            Query::Range { field, bounds } => {
                let mut body = Map::new();
                let named = [
                    ("gt", &bounds.gt),
                    ("gte", &bounds.gte),
                    ("lt", &bounds.lt),
                    ("lte", &bounds.lte),
                ];
                for (name, bound) in named {
                    if let Some(bound) = bound {
                        body.insert(name.to_string(), bound.clone());
                    }
                }
                keyed("range", keyed(field, Value::Object(body)))
            }
            Query::QueryString { query, default_field } => {
                let mut body = Map::new();
                body.insert("query".to_string(), Value::String(query.clone()));
                if let Some(field) = default_field {
                    body.insert("default_field".to_string(), Value::String(field.clone()));
                }
                keyed("query_string", Value::Object(body))
            }
            Query::Bool(bool_query) => bool_query.to_value(),
            Query::Nested { path, query } => {
                json!({ "nested": { "path": path, "query": query.to_value() } })
            }
        }
    }

    pub fn is_match_all(&self) -> bool {
        matches!(self, Query::MatchAll)
    }
}

impl Serialize for Query {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

/// Compiler output: `{size, query, aggregations?}`.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub size: u64,
    pub query: Query,
    /// Never populated by the compiler; callers may attach it afterwards.
    pub aggregations: Option<Value>,
}

impl SearchRequest {
    pub fn to_value(&self) -> Value {
        let mut body = Map::new();
        body.insert("size".to_string(), Value::from(self.size));
        body.insert("query".to_string(), self.query.to_value());
        if let Some(aggregations) = &self.aggregations {
            body.insert("aggregations".to_string(), aggregations.clone());
        }
        Value::Object(body)
    }
}

impl Serialize for SearchRequest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

/// Single-key object `{key: body}`.
fn keyed(key: &str, body: Value) -> Value {
    let mut map = Map::new();
    map.insert(key.to_string(), body);
    Value::Object(map)
}
