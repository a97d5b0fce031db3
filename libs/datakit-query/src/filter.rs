//! Flat filter grammar as callers write it.
//!
//! A filter list mixes `[field, operator, value]` conditions with literal
//! `"and"` / `"or"` join tokens. A join token applies to the next condition
//! only; two conditions with no token between them are AND-ed.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::expr::FilterExpr;

/// Comparison operator of a condition.
///
/// Operators outside the known set are kept verbatim in [`Operator::Other`]
/// and handed to the driver untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Operator {
    Eq,
    Ne,
    In,
    Nin,
    Contains,
    Gt,
    Gte,
    Lt,
    Lte,
    Other(String),
}

impl Operator {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::In => "in",
            Self::Nin => "nin",
            Self::Contains => "contains",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Other(op) => op,
        }
    }
}

impl From<&str> for Operator {
    fn from(op: &str) -> Self {
        match op {
            "=" => Self::Eq,
            "!=" | "<>" => Self::Ne,
            "in" => Self::In,
            "nin" => Self::Nin,
            "contains" => Self::Contains,
            ">" => Self::Gt,
            ">=" => Self::Gte,
            "<" => Self::Lt,
            "<=" => Self::Lte,
            other => Self::Other(other.to_owned()),
        }
    }
}

impl From<String> for Operator {
    fn from(op: String) -> Self {
        Self::from(op.as_str())
    }
}

impl From<Operator> for String {
    fn from(op: Operator) -> Self {
        match op {
            Operator::Other(op) => op,
            known => known.as_str().to_owned(),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single `[field, operator, value]` predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    from = "(String, Operator, Value)",
    into = "(String, Operator, Value)"
)]
pub struct Condition {
    field: String,
    op: Operator,
    value: Value,
}

impl Condition {
    #[must_use]
    pub fn new(field: impl Into<String>, op: impl Into<Operator>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op: op.into(),
            value: value.into(),
        }
    }

    #[must_use]
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, Operator::Eq, value)
    }

    #[must_use]
    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, Operator::Ne, value)
    }

    #[must_use]
    pub fn is_in(field: impl Into<String>, values: Vec<Value>) -> Self {
        Self::new(field, Operator::In, Value::Array(values))
    }

    #[must_use]
    pub fn not_in(field: impl Into<String>, values: Vec<Value>) -> Self {
        Self::new(field, Operator::Nin, Value::Array(values))
    }

    #[must_use]
    pub fn contains(field: impl Into<String>, needle: impl Into<Value>) -> Self {
        Self::new(field, Operator::Contains, needle)
    }

    #[must_use]
    pub fn field(&self) -> &str {
        &self.field
    }

    #[must_use]
    pub fn op(&self) -> &Operator {
        &self.op
    }

    #[must_use]
    pub fn value(&self) -> &Value {
        &self.value
    }
}

impl From<(String, Operator, Value)> for Condition {
    fn from((field, op, value): (String, Operator, Value)) -> Self {
        Self { field, op, value }
    }
}

impl From<Condition> for (String, Operator, Value) {
    fn from(c: Condition) -> Self {
        (c.field, c.op, c.value)
    }
}

/// Literal join token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Join {
    #[serde(alias = "AND", alias = "And")]
    And,
    #[serde(alias = "OR", alias = "Or")]
    Or,
}

/// One element of the flat filter list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterItem {
    Join(Join),
    Condition(Condition),
}

impl From<Condition> for FilterItem {
    fn from(c: Condition) -> Self {
        Self::Condition(c)
    }
}

impl From<Join> for FilterItem {
    fn from(j: Join) -> Self {
        Self::Join(j)
    }
}

/// Ordered filter list in the caller-facing grammar.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Filters(Vec<FilterItem>);

impl Filters {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Filters holding a single condition.
    #[must_use]
    pub fn single(condition: Condition) -> Self {
        Self(vec![FilterItem::Condition(condition)])
    }

    /// Append a condition joined with AND (the implicit join).
    #[must_use]
    pub fn and(mut self, condition: Condition) -> Self {
        self.0.push(FilterItem::Condition(condition));
        self
    }

    /// Append an `"or"` token followed by `condition`.
    #[must_use]
    pub fn or(mut self, condition: Condition) -> Self {
        if !self.0.is_empty() {
            self.0.push(FilterItem::Join(Join::Or));
        }
        self.0.push(FilterItem::Condition(condition));
        self
    }

    pub fn push(&mut self, item: impl Into<FilterItem>) {
        self.0.push(item.into());
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self
            .0
            .iter()
            .any(|item| matches!(item, FilterItem::Condition(_)))
    }

    #[must_use]
    pub fn items(&self) -> &[FilterItem] {
        &self.0
    }

    /// Parse the list into a filter tree. `None` when it holds no condition.
    #[must_use]
    pub fn compile(&self) -> Option<FilterExpr> {
        FilterExpr::parse(&self.0)
    }
}

impl From<Vec<FilterItem>> for Filters {
    fn from(items: Vec<FilterItem>) -> Self {
        Self(items)
    }
}

impl FromIterator<FilterItem> for Filters {
    fn from_iter<T: IntoIterator<Item = FilterItem>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
