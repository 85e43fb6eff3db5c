//! Condition-to-query compiler.
//!
//! # Pipeline
//!
//! `CompileInput` + optional `FieldCatalog` → [`compile`] → `SearchRequest`
//!
//! - **Conditions**: `{clause, field, operator, value?, value2?, nestedPath?, slop?}`
//! - **Buckets**: `must`, `filter`, `must_not`, `should`
//! - **Nested groups**: leaves sharing a nested path share one `nested` wrapper
//! - **Timeframe**: a range over a date field, always last in `filter`

mod compiler;
mod condition;
mod tree;

pub use compiler::{compile, DEFAULT_UPPER_BOUND};
pub use condition::{Clause, CompileInput, Condition, Operator, Timeframe};
pub use tree::{BoolQuery, Query, RangeBounds, SearchRequest};

#[cfg(test)]
mod tests;
