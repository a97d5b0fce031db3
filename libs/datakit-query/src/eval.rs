//! Reference evaluation of the query model over in-memory records.

use std::cmp::Ordering;

use serde_json::Value;

use crate::expr::FilterExpr;
use crate::filter::{Condition, Operator};
use crate::query::{CompiledQuery, SortOrder, SortSpec};
use crate::record::Record;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EvalError {
    #[error("unsupported operator '{0}'")]
    UnsupportedOperator(String),

    #[error("operator '{op}' on field '{field}' expects an array value")]
    ExpectedArray { field: String, op: String },
}

impl FilterExpr {
    /// Evaluate the tree against one record.
    ///
    /// Both sides of every node are evaluated so an unsupported operator is
    /// reported regardless of the data.
    ///
    /// # Errors
    /// Returns [`EvalError`] for operators the evaluator does not implement or
    /// for set operators given a non-array value.
    pub fn matches(&self, record: &Record) -> Result<bool, EvalError> {
        match self {
            Self::Condition(c) => matches_condition(c, record),
            Self::And(l, r) => {
                let left = l.matches(record)?;
                let right = r.matches(record)?;
                Ok(left && right)
            }
            Self::Or(l, r) => {
                let left = l.matches(record)?;
                let right = r.matches(record)?;
                Ok(left || right)
            }
        }
    }
}

/// Evaluate a single condition. Missing fields read as `null`.
///
/// # Errors
/// See [`FilterExpr::matches`].
pub fn matches_condition(cond: &Condition, record: &Record) -> Result<bool, EvalError> {
    let actual = record.get(cond.field()).unwrap_or(&Value::Null);
    let expected = cond.value();

    let matched = match cond.op() {
        Operator::Eq => values_equal(actual, expected),
        Operator::Ne => !values_equal(actual, expected),
        Operator::In => set_of(cond)?.iter().any(|v| values_equal(actual, v)),
        Operator::Nin => !set_of(cond)?.iter().any(|v| values_equal(actual, v)),
        Operator::Contains => contains(actual, expected),
        Operator::Gt => ordered(actual, expected) == Some(Ordering::Greater),
        Operator::Gte => matches!(
            ordered(actual, expected),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        Operator::Lt => ordered(actual, expected) == Some(Ordering::Less),
        Operator::Lte => matches!(
            ordered(actual, expected),
            Some(Ordering::Less | Ordering::Equal)
        ),
        Operator::Other(op) => return Err(EvalError::UnsupportedOperator(op.clone())),
    };
    Ok(matched)
}

fn set_of(cond: &Condition) -> Result<&Vec<Value>, EvalError> {
    cond.value()
        .as_array()
        .ok_or_else(|| EvalError::ExpectedArray {
            field: cond.field().to_owned(),
            op: cond.op().to_string(),
        })
}

/// Equality with numbers compared by value (`1 == 1.0`).
#[must_use]
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x.total_cmp(&y) == Ordering::Equal,
            _ => x == y,
        },
        _ => a == b,
    }
}

fn contains(actual: &Value, needle: &Value) -> bool {
    match (actual, needle) {
        (Value::String(hay), Value::String(n)) => hay.contains(n.as_str()),
        (Value::Array(items), n) => items.iter().any(|v| values_equal(v, n)),
        _ => false,
    }
}

/// Ordering between two values of the same kind; `None` across kinds.
fn ordered(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => Some(x.as_f64()?.total_cmp(&y.as_f64()?)),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn kind_rank(v: &Value) -> u8 {
    match v {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Total order used for sorting: null < bool < number < string < array < object.
#[must_use]
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    ordered(a, b).unwrap_or_else(|| kind_rank(a).cmp(&kind_rank(b)))
}

/// Stable multi-key sort.
pub fn sort_records(records: &mut [Record], sort: &[SortSpec]) {
    if sort.is_empty() {
        return;
    }
    records.sort_by(|a, b| {
        for spec in sort {
            let av = a.get(&spec.field).unwrap_or(&Value::Null);
            let bv = b.get(&spec.field).unwrap_or(&Value::Null);
            let ord = match spec.order {
                SortOrder::Asc => compare_values(av, bv),
                SortOrder::Desc => compare_values(bv, av),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });
}

/// Keep only `fields`, plus `id_field` which is always returned.
#[must_use]
pub fn project(record: &Record, fields: &[String], id_field: &str) -> Record {
    record
        .iter()
        .filter(|(k, _)| k.as_str() == id_field || fields.iter().any(|f| f == *k))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Records matching `filter`, in input order.
///
/// # Errors
/// See [`FilterExpr::matches`].
pub fn filter_records<'a, I>(records: I, filter: Option<&FilterExpr>) -> Result<Vec<Record>, EvalError>
where
    I: IntoIterator<Item = &'a Record>,
{
    let mut out = Vec::new();
    for record in records {
        let keep = match filter {
            Some(f) => f.matches(record)?,
            None => true,
        };
        if keep {
            out.push(record.clone());
        }
    }
    Ok(out)
}

/// Run a full query: filter, sort, skip, limit, project.
///
/// # Errors
/// See [`FilterExpr::matches`].
pub fn execute<'a, I>(records: I, query: &CompiledQuery, id_field: &str) -> Result<Vec<Record>, EvalError>
where
    I: IntoIterator<Item = &'a Record>,
{
    let mut rows = filter_records(records, query.filter.as_ref())?;
    sort_records(&mut rows, &query.sort);

    let skip = query.skip.map_or(0, |n| usize::try_from(n).unwrap_or(usize::MAX));
    let limit = query
        .limit
        .map_or(usize::MAX, |n| usize::try_from(n).unwrap_or(usize::MAX));

    Ok(rows
        .into_iter()
        .skip(skip)
        .take(limit)
        .map(|r| match &query.fields {
            Some(fields) => project(&r, fields, id_field),
            None => r,
        })
        .collect())
}
