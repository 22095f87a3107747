//! Query shape applied to a collection before subscribing.
//!
//! A [`Query`] starts out as "every document in the collection, ordered by
//! id" and is narrowed with [`Query::filter`], [`Query::order_by`], and
//! [`Query::limit`]. Evaluation lives here so every backend agrees on
//! ordering and filtering.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::document::Document;
use crate::name::CollectionName;

/// Comparison operator in a [`Filter`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOp {
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    ArrayContains,
    In,
}

impl fmt::Display for FilterOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::LessThan => "<",
            Self::LessThanOrEqual => "<=",
            Self::GreaterThan => ">",
            Self::GreaterThanOrEqual => ">=",
            Self::ArrayContains => "array-contains",
            Self::In => "in",
        };
        f.write_str(s)
    }
}

/// A single `field op value` predicate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

impl Filter {
    /// Returns `true` if the document satisfies this predicate.
    ///
    /// A document without the field never matches.
    pub fn matches(&self, doc: &Document) -> bool {
        let Some(actual) = doc.field(&self.field) else {
            return false;
        };
        match self.op {
            FilterOp::Equal => compare_values(actual, &self.value) == Ordering::Equal,
            FilterOp::NotEqual => compare_values(actual, &self.value) != Ordering::Equal,
            FilterOp::LessThan => same_rank_cmp(actual, &self.value) == Some(Ordering::Less),
            FilterOp::LessThanOrEqual => matches!(
                same_rank_cmp(actual, &self.value),
                Some(Ordering::Less | Ordering::Equal)
            ),
            FilterOp::GreaterThan => {
                same_rank_cmp(actual, &self.value) == Some(Ordering::Greater)
            }
            FilterOp::GreaterThanOrEqual => matches!(
                same_rank_cmp(actual, &self.value),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            FilterOp::ArrayContains => actual
                .as_array()
                .is_some_and(|items| items.iter().any(|v| compare_values(v, &self.value).is_eq())),
            FilterOp::In => self
                .value
                .as_array()
                .is_some_and(|items| items.iter().any(|v| compare_values(actual, v).is_eq())),
        }
    }
}

/// Sort direction for an [`OrderBy`] clause.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    Ascending,
    Descending,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

/// A live or one-shot query against one collection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Query {
    collection: CollectionName,
    filters: Vec<Filter>,
    order_by: Vec<OrderBy>,
    limit: Option<usize>,
}

impl Query {
    /// The unshaped query: every document in `collection`.
    pub fn new(collection: CollectionName) -> Self {
        Self {
            collection,
            filters: Vec::new(),
            order_by: Vec::new(),
            limit: None,
        }
    }

    pub fn collection(&self) -> &CollectionName {
        &self.collection
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn orderings(&self) -> &[OrderBy] {
        &self.order_by
    }

    pub fn limit_value(&self) -> Option<usize> {
        self.limit
    }

    /// Returns `true` if no filter, ordering, or limit has been applied.
    pub fn is_unshaped(&self) -> bool {
        self.filters.is_empty() && self.order_by.is_empty() && self.limit.is_none()
    }

    /// Add a filter clause.
    pub fn filter(mut self, field: impl Into<String>, op: FilterOp, value: Value) -> Self {
        self.filters.push(Filter {
            field: field.into(),
            op,
            value,
        });
        self
    }

    /// Add an ordering clause. Earlier clauses take precedence.
    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by.push(OrderBy {
            field: field.into(),
            direction,
        });
        self
    }

    /// Cap the number of returned documents.
    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    /// Returns `true` if the document passes every filter and has every
    /// order-by field.
    pub fn matches(&self, doc: &Document) -> bool {
        self.filters.iter().all(|f| f.matches(doc))
            && self.order_by.iter().all(|o| doc.field(&o.field).is_some())
    }

    /// Evaluate the query over a collection's documents.
    ///
    /// Ties after all order-by clauses are broken by ascending document id.
    pub fn execute<'a, I>(&self, documents: I) -> Vec<Document>
    where
        I: IntoIterator<Item = &'a Document>,
    {
        let mut result: Vec<Document> = documents
            .into_iter()
            .filter(|doc| self.matches(doc))
            .cloned()
            .collect();

        result.sort_by(|a, b| {
            for clause in &self.order_by {
                let ord = match (a.field(&clause.field), b.field(&clause.field)) {
                    (Some(x), Some(y)) => compare_values(x, y),
                    _ => Ordering::Equal,
                };
                let ord = match clause.direction {
                    Direction::Ascending => ord,
                    Direction::Descending => ord.reverse(),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            a.id.cmp(&b.id)
        });

        if let Some(limit) = self.limit {
            result.truncate(limit);
        }
        result
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

fn same_rank_cmp(a: &Value, b: &Value) -> Option<Ordering> {
    (type_rank(a) == type_rank(b)).then(|| compare_values(a, b))
}

/// Total order over JSON values.
///
/// Values of different types order by type:
/// null < bool < number < string < array < object.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            match (x.as_i64(), y.as_i64()) {
                (Some(i), Some(j)) => i.cmp(&j),
                _ => {
                    let fx = x.as_f64().unwrap_or(f64::NAN);
                    let fy = y.as_f64().unwrap_or(f64::NAN);
                    fx.total_cmp(&fy)
                }
            }
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => {
            for (l, r) in x.iter().zip(y.iter()) {
                let ord = compare_values(l, r);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        (Value::Object(x), Value::Object(y)) => {
            let mut xs: Vec<_> = x.iter().collect();
            let mut ys: Vec<_> = y.iter().collect();
            xs.sort_by(|l, r| l.0.cmp(r.0));
            ys.sort_by(|l, r| l.0.cmp(r.0));
            for ((lk, lv), (rk, rv)) in xs.iter().zip(ys.iter()) {
                let ord = lk.cmp(rk).then_with(|| compare_values(lv, rv));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            xs.len().cmp(&ys.len())
        }
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}
