//! # Query records held in memory
//!
//! [`MemoryEntity`] is an [`Entity`] over a shared [`Vec`] of records,
//! and [`MemoryQuery`] is its [`Queryable`]. Records describe
//! themselves through [`IntoRow`], and filters and sorts resolve
//! against the row's column names.
//!
//! A [`MemoryQuery`] only records what has been asked of it; the work
//! happens when [`all`](MemoryQuery::all) is called. Filters are
//! combined with AND, and sorts are stacked so that the first applied
//! is the primary order. Sorting is stable, so records that compare
//! equal under every sort keep their original order.
//!
//! Besides the standard operations, a [`MemoryQuery`] accepts
//! arbitrary [`Filter`]s and [`Sorter`]s, which is what custom
//! strategies use:
//!
//! ```rust
//! use query_builder::{AllowedFilter, IntoRow, MemoryEntity, MemoryQuery, QueryBuilder};
//!
//! #[derive(IntoRow)]
//! struct User {
//!     first_name: String,
//!     age: u32,
//! }
//!
//! let users = MemoryEntity::new("users", vec![
//!     User { first_name: "Ann".to_string(), age: 31 },
//!     User { first_name: "Bo".to_string(), age: 17 },
//! ]);
//!
//! let adults = AllowedFilter::<MemoryEntity<User>>::from_fn(
//!     "adult",
//!     |q: MemoryQuery<User>, _: &MemoryEntity<User>, _: &str, values: &[String]| {
//!         Ok(match values.first().map(String::as_str) {
//!             Some("true") => q.filter(|u: &User| u.age >= 18),
//!             Some(_) => q.filter(|u: &User| u.age < 18),
//!             None => q,
//!         })
//!     },
//! );
//!
//! let params = [("filter[adult]", "true")];
//! let query = QueryBuilder::new(&users, &params)
//!     .allowed_filters([adults])
//!     .unwrap()
//!     .into_query();
//! assert_eq!(query.count(), 1);
//! assert_eq!(query.first().unwrap().first_name, "Ann");
//! ```

use core::cmp::Ordering;

use std::fmt::Debug;
use std::sync::Arc;

use crate::query::{Entity, Queryable};
use crate::row::{CellValue, IntoRow};

/// Test whether a record is included in a result set.
pub trait Filter<R> {
    /// Produce a true/false response indicating an in/out result for the record.
    fn filter_one(&self, data: &R) -> bool;

    /// Helper method to filter an entire vector of references by this filter.
    fn filter_ref_vec(&self, data: &mut Vec<&R>) {
        data.retain(|r| self.filter_one(r))
    }
}

impl<R, F> Filter<R> for F
where
    F: Fn(&R) -> bool,
{
    fn filter_one(&self, data: &R) -> bool {
        self(data)
    }
}

/// Compare two records.
///
/// This is the generalisation of [`Ord`] to a type that can have
/// more than one ordering.
pub trait Sorter<R> {
    /// Compare two records, returning an [`Ordering`].
    fn compare(&self, a: &R, b: &R) -> Ordering;
}

impl<R, F> Sorter<R> for F
where
    F: Fn(&R, &R) -> Ordering,
{
    fn compare(&self, a: &R, b: &R) -> Ordering {
        self(a, b)
    }
}

/// A column of a [`MemoryEntity`], as resolved from a field name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column(String);

impl Column {
    pub fn name(&self) -> &str {
        &self.0
    }
}

enum CellFilter {
    Eq(Column, String),
    In(Column, Vec<String>),
    IContains(Column, String),
}

impl<R: IntoRow> Filter<R> for CellFilter {
    fn filter_one(&self, data: &R) -> bool {
        match self {
            CellFilter::Eq(column, value) => data
                .cell(column.name())
                .map(|c| c.matches(value))
                .unwrap_or(false),
            CellFilter::In(column, values) => data
                .cell(column.name())
                .map(|c| values.iter().any(|v| c.matches(v)))
                .unwrap_or(false),
            CellFilter::IContains(column, needle) => data
                .cell(column.name())
                .map(|c| c.icontains(needle))
                .unwrap_or(false),
        }
    }
}

struct CellSorter {
    column: Column,
    descending: bool,
}

impl<R: IntoRow> Sorter<R> for CellSorter {
    fn compare(&self, a: &R, b: &R) -> Ordering {
        let a = a.cell(self.column.name()).unwrap_or(CellValue::Null);
        let b = b.cell(self.column.name()).unwrap_or(CellValue::Null);
        let ord = a.compare(&b);
        if self.descending {
            ord.reverse()
        } else {
            ord
        }
    }
}

/// A table of records held in memory.
pub struct MemoryEntity<R> {
    name: String,
    rows: Arc<Vec<R>>,
    columns: Vec<String>,
}

impl<R: IntoRow> MemoryEntity<R> {
    /// Create an entity called `name` over `rows`.
    ///
    /// The columns available to filters and sorts are those of the
    /// record type's [`IntoRow`] implementation.
    pub fn new(name: impl Into<String>, rows: impl Into<Arc<Vec<R>>>) -> Self {
        Self {
            name: name.into(),
            rows: rows.into(),
            columns: R::columns(),
        }
    }

    /// The records of this entity.
    pub fn rows(&self) -> &Arc<Vec<R>> {
        &self.rows
    }

    /// The column names filters and sorts can resolve.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }
}

impl<R> Clone for MemoryEntity<R> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            rows: self.rows.clone(),
            columns: self.columns.clone(),
        }
    }
}

impl<R> Debug for MemoryEntity<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryEntity")
            .field("name", &self.name)
            .field("rows", &self.rows.len())
            .field("columns", &self.columns)
            .finish()
    }
}

impl<R: IntoRow> Entity for MemoryEntity<R> {
    type Query = MemoryQuery<R>;

    fn name(&self) -> &str {
        &self.name
    }

    fn field(&self, name: &str) -> Option<Column> {
        self.columns
            .iter()
            .find(|c| *c == name)
            .map(|c| Column(c.clone()))
    }

    fn all(&self) -> MemoryQuery<R> {
        MemoryQuery::new(self.rows.clone())
    }
}

/// A lazily evaluated query over records held in memory.
pub struct MemoryQuery<R> {
    rows: Arc<Vec<R>>,
    filters: Vec<Arc<dyn Filter<R> + Send + Sync>>,
    sorters: Vec<Arc<dyn Sorter<R> + Send + Sync>>,
}

impl<R> MemoryQuery<R> {
    /// A query over every record in `rows`.
    pub fn new(rows: Arc<Vec<R>>) -> Self {
        Self {
            rows,
            filters: Vec::new(),
            sorters: Vec::new(),
        }
    }

    /// Keep only records that pass `filter`.
    pub fn filter<F>(mut self, filter: F) -> Self
    where
        F: Filter<R> + Send + Sync + 'static,
    {
        self.filters.push(Arc::new(filter));
        self
    }

    /// Append an ordering using `sorter`.
    pub fn order_by_key<S>(mut self, sorter: S) -> Self
    where
        S: Sorter<R> + Send + Sync + 'static,
    {
        self.sorters.push(Arc::new(sorter));
        self
    }

    fn compare(&self, a: &R, b: &R) -> Ordering {
        for sorter in &self.sorters {
            match sorter.compare(a, b) {
                Ordering::Equal => continue,
                ord => return ord,
            }
        }
        Ordering::Equal
    }

    /// Execute the query, returning the matching records in order.
    pub fn all(&self) -> Vec<&R> {
        let mut v: Vec<&R> = self.rows.iter().collect();
        for f in &self.filters {
            f.filter_ref_vec(&mut v);
        }
        if !self.sorters.is_empty() {
            v.sort_by(|a, b| self.compare(a, b));
        }
        v
    }

    /// Execute the query, returning the first matching record.
    pub fn first(&self) -> Option<&R> {
        self.all().into_iter().next()
    }

    /// Execute the query, returning the number of matching records.
    pub fn count(&self) -> usize {
        self.rows
            .iter()
            .filter(|r| self.filters.iter().all(|f| f.filter_one(r)))
            .count()
    }
}

impl<R> Clone for MemoryQuery<R> {
    fn clone(&self) -> Self {
        Self {
            rows: self.rows.clone(),
            filters: self.filters.clone(),
            sorters: self.sorters.clone(),
        }
    }
}

impl<R> Debug for MemoryQuery<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryQuery")
            .field("rows", &self.rows.len())
            .field("filters", &self.filters.len())
            .field("sorters", &self.sorters.len())
            .finish()
    }
}

impl<R: IntoRow> Queryable for MemoryQuery<R> {
    type Field = Column;

    fn filter_eq(self, field: &Column, value: &str) -> Self {
        self.filter(CellFilter::Eq(field.clone(), value.to_string()))
    }

    fn filter_in(self, field: &Column, values: &[String]) -> Self {
        self.filter(CellFilter::In(field.clone(), values.to_vec()))
    }

    fn filter_icontains(self, field: &Column, value: &str) -> Self {
        self.filter(CellFilter::IContains(field.clone(), value.to_string()))
    }

    fn order_by(self, field: &Column, descending: bool) -> Self {
        self.order_by_key(CellSorter {
            column: field.clone(),
            descending,
        })
    }
}
