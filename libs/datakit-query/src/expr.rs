use crate::filter::{Condition, FilterItem, Join};

/// Parsed filter tree handed to drivers.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterExpr {
    Condition(Condition),
    And(Box<FilterExpr>, Box<FilterExpr>),
    Or(Box<FilterExpr>, Box<FilterExpr>),
}

impl FilterExpr {
    #[must_use]
    pub fn and(self, other: FilterExpr) -> Self {
        Self::And(Box::new(self), Box::new(other))
    }

    #[must_use]
    pub fn or(self, other: FilterExpr) -> Self {
        Self::Or(Box::new(self), Box::new(other))
    }

    /// Fold the flat grammar left to right.
    ///
    /// The pending join starts as AND, is set by each join token, is used to
    /// combine the next condition with the running result, and then resets to
    /// AND. Join tokens with no condition after them are dropped.
    #[must_use]
    pub fn parse(items: &[FilterItem]) -> Option<Self> {
        let mut pending = Join::And;
        let mut acc: Option<Self> = None;

        for item in items {
            match item {
                FilterItem::Join(join) => pending = *join,
                FilterItem::Condition(cond) => {
                    let next = Self::Condition(cond.clone());
                    acc = Some(match acc {
                        None => next,
                        Some(prev) => match pending {
                            Join::And => prev.and(next),
                            Join::Or => prev.or(next),
                        },
                    });
                    pending = Join::And;
                }
            }
        }

        acc
    }

    /// AND together every expression; `None` for an empty input.
    pub fn all(exprs: impl IntoIterator<Item = FilterExpr>) -> Option<Self> {
        exprs.into_iter().reduce(Self::and)
    }

    /// Every condition in the tree, left to right.
    #[must_use]
    pub fn conditions(&self) -> Vec<&Condition> {
        let mut out = Vec::new();
        self.collect_conditions(&mut out);
        out
    }

    fn collect_conditions<'a>(&'a self, out: &mut Vec<&'a Condition>) {
        match self {
            Self::Condition(c) => out.push(c),
            Self::And(l, r) | Self::Or(l, r) => {
                l.collect_conditions(out);
                r.collect_conditions(out);
            }
        }
    }
}

impl From<Condition> for FilterExpr {
    fn from(c: Condition) -> Self {
        Self::Condition(c)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::filter::Filters;

    fn c(field: &str) -> Condition {
        Condition::eq(field, 1)
    }

    fn leaf(field: &str) -> FilterExpr {
        FilterExpr::Condition(c(field))
    }

    #[test]
    fn implicit_join_is_and() {
        let expr = Filters::new().and(c("a")).and(c("b")).compile().unwrap();

        assert_eq!(expr, leaf("a").and(leaf("b")));
    }

    #[test]
    fn chaining_is_left_associative() {
        // [A, 'or', B, C] == (A or B) and C
        let items = vec![
            FilterItem::Condition(c("a")),
            FilterItem::Join(Join::Or),
            FilterItem::Condition(c("b")),
            FilterItem::Condition(c("c")),
        ];

        assert_eq!(
            FilterExpr::parse(&items).unwrap(),
            leaf("a").or(leaf("b")).and(leaf("c"))
        );
    }

    #[test]
    fn join_resets_after_each_condition() {
        // [A, 'and', B, 'or', C, D] == ((A and B) or C) and D
        let items = vec![
            FilterItem::Condition(c("a")),
            FilterItem::Join(Join::And),
            FilterItem::Condition(c("b")),
            FilterItem::Join(Join::Or),
            FilterItem::Condition(c("c")),
            FilterItem::Condition(c("d")),
        ];

        assert_eq!(
            FilterExpr::parse(&items).unwrap(),
            leaf("a").and(leaf("b")).or(leaf("c")).and(leaf("d"))
        );
    }

    #[test]
    fn leading_and_trailing_tokens_are_harmless() {
        let items = vec![
            FilterItem::Join(Join::Or),
            FilterItem::Condition(c("a")),
            FilterItem::Join(Join::Or),
        ];

        assert_eq!(FilterExpr::parse(&items).unwrap(), leaf("a"));
    }

    #[test]
    fn all_combines_with_and() {
        assert!(FilterExpr::all(Vec::new()).is_none());
        assert_eq!(
            FilterExpr::all(vec![leaf("a"), leaf("b"), leaf("c")]).unwrap(),
            leaf("a").and(leaf("b")).and(leaf("c"))
        );
    }

    #[test]
    fn conditions_are_listed_in_order() {
        let expr = leaf("a").or(leaf("b")).and(leaf("c"));
        let fields: Vec<&str> = expr.conditions().iter().map(|c| c.field()).collect();

        assert_eq!(fields, vec!["a", "b", "c"]);
    }
}
