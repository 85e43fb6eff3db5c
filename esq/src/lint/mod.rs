//! Static checks for query trees.
//!
//! The linter never executes anything. It walks a query tree depth-first
//! (bucket order must → filter → must_not → should), carrying the nested
//! path in scope, and reports:
//!
//! - **error**: no query at all, a nested field used outside its wrapper,
//!   a `nested` node without a path
//! - **warn**: `term`/`terms` on text without a keyword companion,
//!   `match`/`match_phrase` on keyword, `range` on non-comparable types,
//!   any `query_string`, a nested path no catalog field lives under

mod linter;

pub use linter::{lint, lint_request, LintLevel, LintMessage, LintResult};
