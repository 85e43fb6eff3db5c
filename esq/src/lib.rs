//! esq: condition compiler and query linter for log search.
//!
//! Turns a flat list of filter conditions into an engine `bool` query and
//! checks arbitrary query trees for modeling mistakes against a field
//! catalog.

pub mod catalog;
pub mod config;
pub mod error;
pub mod lint;
pub mod query;

pub use catalog::{FieldCatalog, FieldInfo, FieldType};
pub use config::Config;
pub use error::{Error, Result};
pub use lint::{lint, lint_request, LintLevel, LintMessage, LintResult};
pub use query::{compile, BoolQuery, Clause, CompileInput, Condition, Operator, Query, RangeBounds, SearchRequest, Timeframe};
