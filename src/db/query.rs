// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Declarative collection queries.
//!
//! A [`QuerySpec`] is a collection name plus ordered filters, ordered sorts
//! and an optional limit. [`QueryBuilder`] turns specs into [`QueryHandle`]s
//! and interns them by a canonical key, so structurally equal specs always
//! come back as the same handle and bindings can tell "same query" from
//! "new query" by pointer.

use crate::db::value::{lookup, Fields, Value};
use crate::error::AppError;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Weak};

/// Comparison operator of a filter clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterOp {
    #[serde(rename = "==")]
    Equal,
    #[serde(rename = "!=")]
    NotEqual,
    #[serde(rename = "<")]
    LessThan,
    #[serde(rename = "<=")]
    LessThanOrEqual,
    #[serde(rename = ">")]
    GreaterThan,
    #[serde(rename = ">=")]
    GreaterThanOrEqual,
    #[serde(rename = "array-contains")]
    ArrayContains,
    #[serde(rename = "array-contains-any")]
    ArrayContainsAny,
    #[serde(rename = "in")]
    In,
    #[serde(rename = "not-in")]
    NotIn,
}

impl FilterOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOp::Equal => "==",
            FilterOp::NotEqual => "!=",
            FilterOp::LessThan => "<",
            FilterOp::LessThanOrEqual => "<=",
            FilterOp::GreaterThan => ">",
            FilterOp::GreaterThanOrEqual => ">=",
            FilterOp::ArrayContains => "array-contains",
            FilterOp::ArrayContainsAny => "array-contains-any",
            FilterOp::In => "in",
            FilterOp::NotIn => "not-in",
        }
    }
}

impl fmt::Display for FilterOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterOp {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "==" => FilterOp::Equal,
            "!=" => FilterOp::NotEqual,
            "<" => FilterOp::LessThan,
            "<=" => FilterOp::LessThanOrEqual,
            ">" => FilterOp::GreaterThan,
            ">=" => FilterOp::GreaterThanOrEqual,
            "array-contains" => FilterOp::ArrayContains,
            "array-contains-any" => FilterOp::ArrayContainsAny,
            "in" => FilterOp::In,
            "not-in" => FilterOp::NotIn,
            other => {
                return Err(AppError::InvalidArgument(format!(
                    "unknown filter operator {other:?}"
                )))
            }
        })
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Asc => "asc",
            Direction::Desc => "desc",
        }
    }
}

/// `(field, operator, value)` filter clause.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

impl Filter {
    pub fn new(field: impl Into<String>, op: FilterOp, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, FilterOp::Equal, value)
    }

    /// Does a document body satisfy this clause?
    ///
    /// Documents missing the field never match.
    pub fn matches(&self, fields: &Fields) -> bool {
        let Some(actual) = lookup(fields, &self.field) else {
            return false;
        };
        let expected = &self.value;
        match self.op {
            FilterOp::Equal => actual.same_as(expected),
            FilterOp::NotEqual => !actual.same_as(expected) && !matches!(actual, Value::Null),
            FilterOp::LessThan => {
                comparable(actual, expected) && actual.compare(expected) == Ordering::Less
            }
            FilterOp::LessThanOrEqual => {
                comparable(actual, expected) && actual.compare(expected) != Ordering::Greater
            }
            FilterOp::GreaterThan => {
                comparable(actual, expected) && actual.compare(expected) == Ordering::Greater
            }
            FilterOp::GreaterThanOrEqual => {
                comparable(actual, expected) && actual.compare(expected) != Ordering::Less
            }
            FilterOp::ArrayContains => actual
                .as_array()
                .is_some_and(|items| items.iter().any(|item| item.same_as(expected))),
            FilterOp::ArrayContainsAny => match (actual.as_array(), expected.as_array()) {
                (Some(items), Some(wanted)) => items
                    .iter()
                    .any(|item| wanted.iter().any(|w| item.same_as(w))),
                _ => false,
            },
            FilterOp::In => expected
                .as_array()
                .is_some_and(|wanted| wanted.iter().any(|w| actual.same_as(w))),
            FilterOp::NotIn => {
                !matches!(actual, Value::Null)
                    && expected
                        .as_array()
                        .is_some_and(|wanted| !wanted.iter().any(|w| actual.same_as(w)))
            }
        }
    }
}

/// Range filters only match values of the same type class.
fn comparable(a: &Value, b: &Value) -> bool {
    matches!(
        (a, b),
        (Value::Integer(_) | Value::Double(_), Value::Integer(_) | Value::Double(_))
            | (Value::String(_), Value::String(_))
            | (Value::Timestamp(_), Value::Timestamp(_))
            | (Value::Bool(_), Value::Bool(_))
    )
}

/// `(field, direction)` sort clause.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Sort {
    pub field: String,
    pub direction: Direction,
}

impl Sort {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Desc,
        }
    }
}

/// Declarative description of a collection query.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySpec {
    pub collection: String,
    pub filters: Vec<Filter>,
    pub sorts: Vec<Sort>,
    pub limit: Option<u32>,
}

impl QuerySpec {
    pub fn collection(name: impl Into<String>) -> Self {
        Self {
            collection: name.into(),
            filters: Vec::new(),
            sorts: Vec::new(),
            limit: None,
        }
    }

    pub fn filter(
        mut self,
        field: impl Into<String>,
        op: FilterOp,
        value: impl Into<Value>,
    ) -> Self {
        self.filters.push(Filter::new(field, op, value));
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.sorts.push(Sort {
            field: field.into(),
            direction,
        });
        self
    }

    /// Cap the result count; zero means no cap.
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = (limit > 0).then_some(limit);
        self
    }

    /// Canonical text form; equal keys mean equal queries.
    pub fn canonical_key(&self) -> String {
        let mut key = self.collection.clone();
        for f in &self.filters {
            key.push('|');
            key.push_str(&format!("{}:{}:{}", f.field, f.op, f.value.to_json()));
        }
        for s in &self.sorts {
            key.push('|');
            key.push_str(&format!("{}:{}", s.field, s.direction.as_str()));
        }
        if let Some(limit) = self.limit {
            key.push_str(&format!("|limit:{limit}"));
        }
        key
    }

    /// Whether a document body passes every filter.
    pub fn matches(&self, fields: &Fields) -> bool {
        self.filters.iter().all(|f| f.matches(fields))
    }

    /// Ordering of two document bodies under the sort clauses.
    ///
    /// Ties (and queries without sorts) fall back to document ID.
    pub fn compare(&self, a: (&str, &Fields), b: (&str, &Fields)) -> Ordering {
        for sort in &self.sorts {
            let left = lookup(a.1, &sort.field).unwrap_or(&Value::Null);
            let right = lookup(b.1, &sort.field).unwrap_or(&Value::Null);
            let ord = match sort.direction {
                Direction::Asc => left.compare(right),
                Direction::Desc => right.compare(left),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        a.0.cmp(b.0)
    }
}

/// Interned, cheaply clonable query.
///
/// Two handles are equal when their canonical keys are equal; handles from
/// the same [`QueryBuilder`] for equal specs are also pointer-identical.
#[derive(Debug, Clone)]
pub struct QueryHandle {
    inner: Arc<QueryInner>,
}

#[derive(Debug)]
struct QueryInner {
    key: String,
    spec: QuerySpec,
}

impl QueryHandle {
    /// Wrap a spec without interning.
    pub fn new(spec: QuerySpec) -> Self {
        Self {
            inner: Arc::new(QueryInner {
                key: spec.canonical_key(),
                spec,
            }),
        }
    }

    pub fn spec(&self) -> &QuerySpec {
        &self.inner.spec
    }

    pub fn collection(&self) -> &str {
        &self.inner.spec.collection
    }

    pub fn key(&self) -> &str {
        &self.inner.key
    }

    /// True if both handles point at the same interned query.
    pub fn ptr_eq(&self, other: &QueryHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl PartialEq for QueryHandle {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || self.inner.key == other.inner.key
    }
}

impl Eq for QueryHandle {}

/// Builds and interns query handles.
///
/// The table holds weak references: a query stays interned only while some
/// handle to it is alive.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    default_limit: u32,
    interned: Arc<DashMap<String, Weak<QueryInner>>>,
}

impl QueryBuilder {
    pub fn new(default_limit: u32) -> Self {
        Self {
            default_limit,
            interned: Arc::new(DashMap::new()),
        }
    }

    /// Build a handle from loose parts, applying the default limit when none
    /// is given.
    pub fn build(
        &self,
        collection: &str,
        filters: Vec<Filter>,
        sorts: Vec<Sort>,
        limit: Option<u32>,
    ) -> QueryHandle {
        let spec = QuerySpec {
            collection: collection.to_string(),
            filters,
            sorts,
            limit: None,
        }
        .limit(limit.unwrap_or(self.default_limit));
        self.intern(spec)
    }

    /// Intern a spec as-is.
    pub fn intern(&self, spec: QuerySpec) -> QueryHandle {
        let key = spec.canonical_key();
        let live = self.interned.get(&key).and_then(|weak| weak.upgrade());
        if let Some(inner) = live {
            return QueryHandle { inner };
        }

        self.prune();
        let mut slot = self.interned.entry(key.clone()).or_default();
        if let Some(inner) = slot.upgrade() {
            return QueryHandle { inner };
        }
        let inner = Arc::new(QueryInner { key, spec });
        *slot = Arc::downgrade(&inner);
        QueryHandle { inner }
    }

    /// Forget queries nobody holds a handle to.
    fn prune(&self) {
        self.interned.retain(|_, weak| weak.strong_count() > 0);
    }

    /// Number of distinct queries with a live handle.
    pub fn len(&self) -> usize {
        self.interned
            .iter()
            .filter(|entry| entry.strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
