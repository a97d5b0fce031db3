//! Backend-agnostic query model.
//!
//! Callers describe queries with the flat filter grammar
//! (`[["a", "=", 1], "or", ["b", "=", 2], ["c", "=", 3]]`). The grammar is
//! parsed once into a [`FilterExpr`] tree before reaching a driver, so drivers
//! translate a typed tree instead of re-reading the token stream.
//!
//! Join tokens are positional and left-associative: the example above reads
//! as `(a = 1 OR b = 2) AND c = 3`. There is no grouping.
//!
//! The [`eval`] module is the reference interpretation of the model and is
//! what in-memory drivers use.
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod eval;
pub mod expr;
pub mod filter;
pub mod query;
pub mod record;

pub use eval::EvalError;
pub use expr::FilterExpr;
pub use filter::{Condition, FilterItem, Filters, Join, Operator};
pub use query::{CompiledQuery, Query, SortOrder, SortSpec};
pub use record::{ID_FIELD, Record, RecordId};
