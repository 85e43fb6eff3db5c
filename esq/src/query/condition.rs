//! Compiler input: user-authored filter conditions.
//!
//! Parsing is lenient: input comes from partially filled forms, so a
//! missing, `null` or mistyped member takes its default instead of
//! rejecting the whole document.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Boolean bucket a query leaf belongs to.
///
/// Declaration order is the priority used when a nested group has to pick
/// a single outer bucket: must > filter > must_not > should.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Clause {
    #[default]
    Must,
    Filter,
    MustNot,
    Should,
}

impl Clause {
    /// All buckets in serialization and priority order.
    pub const ALL: [Clause; 4] = [Clause::Must, Clause::Filter, Clause::MustNot, Clause::Should];

    pub fn as_str(self) -> &'static str {
        match self {
            Clause::Must => "must",
            Clause::Filter => "filter",
            Clause::MustNot => "must_not",
            Clause::Should => "should",
        }
    }

    /// Parse a clause name. Anything unrecognized is `Must`.
    pub fn from_name(name: &str) -> Self {
        let name = name.trim();
        Clause::ALL
            .into_iter()
            .find(|clause| clause.as_str() == name)
            .unwrap_or_default()
    }
}

impl<'de> Deserialize<'de> for Clause {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(lenient_string(deserializer)?
            .map(|name| Clause::from_name(&name))
            .unwrap_or_default())
    }
}

impl std::fmt::Display for Clause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Condition operators.
///
/// Unrecognized operator strings deserialize as `Unknown`, which the
/// compiler drops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    /// Full-text match
    Contains,
    NotContains,
    /// Phrase match, honoring `slop`
    Phrase,
    NotPhrase,
    /// Exact term on the keyword companion, phrase match otherwise
    Equals,
    Exact,
    NotExact,
    /// Set membership
    In,
    Exists,
    NotExists,
    Gt,
    Gte,
    Lt,
    Lte,
    /// Range with equal bounds
    Eq,
    /// Exact term, negated
    Neq,
    /// Range `value..=value2`
    Between,
    /// Raw query-string syntax
    QueryString,
    #[default]
    Unknown,
}

impl Operator {
    /// Every recognized operator.
    pub const KNOWN: [Operator; 18] = [
        Operator::Contains,
        Operator::NotContains,
        Operator::Phrase,
        Operator::NotPhrase,
        Operator::Equals,
        Operator::Exact,
        Operator::NotExact,
        Operator::In,
        Operator::Exists,
        Operator::NotExists,
        Operator::Gt,
        Operator::Gte,
        Operator::Lt,
        Operator::Lte,
        Operator::Eq,
        Operator::Neq,
        Operator::Between,
        Operator::QueryString,
    ];

    /// Parse an operator name. Anything unrecognized is `Unknown`.
    pub fn from_name(name: &str) -> Self {
        let name = name.trim();
        Operator::KNOWN
            .into_iter()
            .find(|op| op.as_str() == name)
            .unwrap_or_default()
    }

    /// Whether the operator needs a non-blank `value`.
    pub fn requires_value(self) -> bool {
        !matches!(self, Operator::Exists | Operator::NotExists)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Contains => "contains",
            Operator::NotContains => "not_contains",
            Operator::Phrase => "phrase",
            Operator::NotPhrase => "not_phrase",
            Operator::Equals => "equals",
            Operator::Exact => "exact",
            Operator::NotExact => "not_exact",
            Operator::In => "in",
            Operator::Exists => "exists",
            Operator::NotExists => "not_exists",
            Operator::Gt => "gt",
            Operator::Gte => "gte",
            Operator::Lt => "lt",
            Operator::Lte => "lte",
            Operator::Eq => "eq",
            Operator::Neq => "neq",
            Operator::Between => "between",
            Operator::QueryString => "query_string",
            Operator::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Operator {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(lenient_string(deserializer)?
            .map(|name| Operator::from_name(&name))
            .unwrap_or_default())
    }
}

/// One user-specified filter test.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Bucket the author intends (operators may override it)
    #[serde(default)]
    pub clause: Clause,

    /// Dot-path of the document field
    #[serde(default, deserialize_with = "string_or_empty")]
    pub field: String,

    #[serde(default)]
    pub operator: Operator,

    /// Scalar or list payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,

    /// Upper bound for `between`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value2: Option<Value>,

    /// Overrides the catalog's nested path for this field
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub nested_path: Option<String>,

    #[serde(
        default,
        deserialize_with = "lenient_count",
        skip_serializing_if = "Option::is_none"
    )]
    pub slop: Option<u32>,
}

impl Condition {
    pub fn new(clause: Clause, field: impl Into<String>, operator: Operator) -> Self {
        Self {
            clause,
            field: field.into(),
            operator,
            ..Default::default()
        }
    }

    pub fn with_value(mut self, value: impl Into<Value>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_value2(mut self, value2: impl Into<Value>) -> Self {
        self.value2 = Some(value2.into());
        self
    }

    pub fn with_nested_path(mut self, nested_path: impl Into<String>) -> Self {
        self.nested_path = Some(nested_path.into());
        self
    }

    pub fn with_slop(mut self, slop: u32) -> Self {
        self.slop = Some(slop);
        self
    }
}

/// Time range over a date field, appended to `filter`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Timeframe {
    /// Date field; the timeframe is ignored when blank
    #[serde(default, deserialize_with = "string_or_empty")]
    pub field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gte: Option<Value>,
    /// Upper bound, `"now"` when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lte: Option<Value>,
}

impl Timeframe {
    pub fn new(field: impl Into<String>, gte: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            gte: Some(gte.into()),
            lte: None,
        }
    }

    pub fn until(mut self, lte: impl Into<Value>) -> Self {
        self.lte = Some(lte.into());
        self
    }
}

/// Everything one compile call needs besides the catalog.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompileInput {
    #[serde(default, deserialize_with = "null_as_default")]
    pub conditions: Vec<Condition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeframe: Option<Timeframe>,
    /// Result size, 0 when absent
    #[serde(
        default,
        deserialize_with = "lenient_count",
        skip_serializing_if = "Option::is_none"
    )]
    pub size: Option<u64>,
}

impl CompileInput {
    pub fn new(conditions: Vec<Condition>) -> Self {
        Self {
            conditions,
            ..Default::default()
        }
    }

    pub fn with_timeframe(mut self, timeframe: Timeframe) -> Self {
        self.timeframe = Some(timeframe);
        self
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }
}

/// A value counts as blank when absent, null, or a whitespace-only string.
pub(crate) fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(_) => false,
    }
}

/// A string member, `None` for `null` or any other JSON type.
fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Ok(Some(s)),
        _ => Ok(None),
    }
}

fn string_or_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(lenient_string(deserializer)?.unwrap_or_default())
}

/// A non-negative integer given as a number or a numeric string.
fn lenient_count<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: TryFrom<u64>,
{
    let count = match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::String(s)) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    Ok(count.and_then(|n| T::try_from(n).ok()))
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
