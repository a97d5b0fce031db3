use serde::{Deserialize, Serialize};

use crate::expr::FilterExpr;
use crate::filter::{Condition, Filters};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// `[field, "asc" | "desc"]` on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(String, SortOrder)", into = "(String, SortOrder)")]
pub struct SortSpec {
    pub field: String,
    pub order: SortOrder,
}

impl SortSpec {
    #[must_use]
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            order: SortOrder::Asc,
        }
    }

    #[must_use]
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            order: SortOrder::Desc,
        }
    }
}

impl From<(String, SortOrder)> for SortSpec {
    fn from((field, order): (String, SortOrder)) -> Self {
        Self { field, order }
    }
}

impl From<SortSpec> for (String, SortOrder) {
    fn from(s: SortSpec) -> Self {
        (s.field, s.order)
    }
}

/// Caller-facing query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Query {
    /// Fields to return. `None` returns every field.
    pub fields: Option<Vec<String>>,
    pub filters: Filters,
    pub sort: Vec<SortSpec>,
    pub skip: Option<u64>,
    pub limit: Option<u64>,
    /// Lookup fields whose referenced records should be inlined.
    pub expand: Vec<String>,
}

impl Query {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_filters(mut self, filters: Filters) -> Self {
        self.filters = filters;
        self
    }

    /// AND one more condition onto the filter list.
    #[must_use]
    pub fn filter(mut self, condition: Condition) -> Self {
        self.filters = self.filters.and(condition);
        self
    }

    #[must_use]
    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn sort(mut self, spec: SortSpec) -> Self {
        self.sort.push(spec);
        self
    }

    #[must_use]
    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn expand(mut self, field: impl Into<String>) -> Self {
        self.expand.push(field.into());
        self
    }

    /// Parse the filter list and produce the driver-facing form.
    #[must_use]
    pub fn compile(&self) -> CompiledQuery {
        CompiledQuery {
            fields: self.fields.clone(),
            filter: self.filters.compile(),
            sort: self.sort.clone(),
            skip: self.skip,
            limit: self.limit,
            expand: self.expand.clone(),
        }
    }
}

/// Driver-facing query with the filter already parsed into a tree.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompiledQuery {
    pub fields: Option<Vec<String>>,
    pub filter: Option<FilterExpr>,
    pub sort: Vec<SortSpec>,
    pub skip: Option<u64>,
    pub limit: Option<u64>,
    pub expand: Vec<String>,
}

impl CompiledQuery {
    /// Query that only filters.
    #[must_use]
    pub fn filtered(filter: Option<FilterExpr>) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }

    /// Narrow the query: the result is `existing AND restriction`.
    #[must_use]
    pub fn restrict(mut self, restriction: FilterExpr) -> Self {
        self.filter = Some(match self.filter.take() {
            Some(existing) => existing.and(restriction),
            None => restriction,
        });
        self
    }
}
