//! # Declare the sorts an endpoint allows
//!
//! The `sort` parameter of a request is a comma-separated list of sort
//! names in priority order, each optionally preceded by a `-` to
//! reverse it. So `sort=last_name,-age` means sort by `last_name`, and
//! for ties use the reverse ordering of `age`.
//!
//! The endpoint declares which names it accepts with a list of
//! [`AllowedSort`]s. The standard [`FieldSort`] orders by a single
//! field; a custom [`SortStrategy`] can order any way it likes, for
//! example by a field of a related record.
//!
//! A bare string converts into a [`FieldSort`] on the field of the same
//! name.

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Arc;

use thiserror::Error;

use crate::query::{Entity, Queryable};

/// Errors produced by sorting.
#[derive(Debug, Error)]
pub enum SortError {
    /// The request applied a sort the endpoint does not allow.
    #[error("applied sort '{0}' not allowed")]
    Invalid(String),
    /// The same public name was declared more than once.
    #[error("sort '{0}' declared more than once")]
    Duplicate(String),
    /// The internal name of a sort does not resolve on the entity.
    #[error("no such field '{field}' on '{entity}'")]
    NoField { entity: String, field: String },
    /// A custom strategy failed.
    #[error(transparent)]
    Custom(#[from] anyhow::Error),
}

/// Add an ordering to a query.
///
/// Each call appends an ordering clause, so the first sort applied
/// to a query is its primary order and later ones break ties.
pub trait SortStrategy<E: Entity> {
    fn sort(
        &self,
        query: E::Query,
        entity: &E,
        name: &str,
        descending: bool,
    ) -> Result<E::Query, SortError>;
}

/// Order by the value of a single field.
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldSort;

impl<E: Entity> SortStrategy<E> for FieldSort {
    fn sort(
        &self,
        query: E::Query,
        entity: &E,
        name: &str,
        descending: bool,
    ) -> Result<E::Query, SortError> {
        let field = entity.field(name).ok_or_else(|| SortError::NoField {
            entity: entity.name().to_string(),
            field: name.to_string(),
        })?;
        Ok(query.order_by(&field, descending))
    }
}

struct FnSort<F>(F);

impl<E, F> SortStrategy<E> for FnSort<F>
where
    E: Entity,
    F: Fn(E::Query, &E, &str, bool) -> Result<E::Query, SortError>,
{
    fn sort(
        &self,
        query: E::Query,
        entity: &E,
        name: &str,
        descending: bool,
    ) -> Result<E::Query, SortError> {
        (self.0)(query, entity, name, descending)
    }
}

/// A sort that requests are allowed to apply.
pub struct AllowedSort<E: Entity> {
    name: String,
    internal_name: Option<String>,
    strategy: Arc<dyn SortStrategy<E> + Send + Sync>,
}

impl<E: Entity> AllowedSort<E> {
    /// Allow the sort `name`, applied with `strategy`.
    pub fn new<S>(name: impl Into<String>, strategy: S) -> Self
    where
        S: SortStrategy<E> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            internal_name: None,
            strategy: Arc::new(strategy),
        }
    }

    /// Allow a [`FieldSort`].
    pub fn field(name: impl Into<String>) -> Self {
        Self::new(name, FieldSort)
    }

    /// Allow a sort applied by a custom strategy.
    pub fn custom<S>(name: impl Into<String>, strategy: S) -> Self
    where
        S: SortStrategy<E> + Send + Sync + 'static,
    {
        Self::new(name, strategy)
    }

    /// Allow a sort applied by the closure `f`, which has the
    /// signature of [`SortStrategy::sort`].
    pub fn from_fn<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(E::Query, &E, &str, bool) -> Result<E::Query, SortError> + Send + Sync + 'static,
    {
        Self::new(name, FnSort(f))
    }

    /// Sort on the field `internal_name` instead of the field named
    /// like the sort itself.
    pub fn internal_name(mut self, internal_name: impl Into<String>) -> Self {
        self.internal_name = Some(internal_name.into());
        self
    }

    /// The name requests use for this sort.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The name of the field this sort applies to.
    pub fn target(&self) -> &str {
        self.internal_name.as_deref().unwrap_or(&self.name)
    }

    /// Run the strategy against `query`.
    pub fn apply(&self, query: E::Query, entity: &E, descending: bool) -> Result<E::Query, SortError> {
        self.strategy.sort(query, entity, self.target(), descending)
    }
}

impl<E: Entity> Clone for AllowedSort<E> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            internal_name: self.internal_name.clone(),
            strategy: self.strategy.clone(),
        }
    }
}

impl<E: Entity> Debug for AllowedSort<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AllowedSort")
            .field("name", &self.name)
            .field("internal_name", &self.internal_name)
            .finish_non_exhaustive()
    }
}

impl<E: Entity> From<&str> for AllowedSort<E> {
    fn from(name: &str) -> Self {
        Self::field(name)
    }
}

impl<E: Entity> From<String> for AllowedSort<E> {
    fn from(name: String) -> Self {
        Self::field(name)
    }
}

/// The whitelist of sorts for an endpoint, keyed by public name.
pub struct AllowedSorts<E: Entity> {
    sorts: BTreeMap<String, AllowedSort<E>>,
}

impl<E: Entity> AllowedSorts<E> {
    /// Build a whitelist from declarations, rejecting duplicate names.
    pub fn new<I, S>(sorts: I) -> Result<Self, SortError>
    where
        I: IntoIterator<Item = S>,
        S: Into<AllowedSort<E>>,
    {
        let mut map = BTreeMap::new();
        for sort in sorts {
            let sort = sort.into();
            if map.contains_key(sort.name()) {
                return Err(SortError::Duplicate(sort.name));
            }
            map.insert(sort.name.clone(), sort);
        }
        Ok(Self { sorts: map })
    }

    /// Look up the sort requests address as `name`.
    pub fn get(&self, name: &str) -> Option<&AllowedSort<E>> {
        self.sorts.get(name)
    }

    /// The allowed public names, in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sorts.keys().map(String::as_str)
    }

    /// The number of allowed sorts.
    pub fn len(&self) -> usize {
        self.sorts.len()
    }

    /// Whether no sorts at all are allowed.
    pub fn is_empty(&self) -> bool {
        self.sorts.is_empty()
    }
}

impl<E: Entity> Default for AllowedSorts<E> {
    fn default() -> Self {
        Self {
            sorts: BTreeMap::new(),
        }
    }
}

impl<E: Entity> Clone for AllowedSorts<E> {
    fn clone(&self) -> Self {
        Self {
            sorts: self.sorts.clone(),
        }
    }
}

impl<E: Entity> Debug for AllowedSorts<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.sorts.values()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::tests::{Op, Recorder, Table};

    fn run(sort: &AllowedSort<Table>, descending: bool) -> Result<Vec<Op>, SortError> {
        let table = Table::default();
        sort.apply(table.all(), &table, descending).map(|q| q.ops)
    }

    #[test]
    fn field_sort() {
        assert_eq!(
            run(&AllowedSort::field("first_name"), false).unwrap(),
            vec![Op::OrderBy("first_name".into(), false)]
        );
        assert_eq!(
            run(&AllowedSort::field("first_name"), true).unwrap(),
            vec![Op::OrderBy("first_name".into(), true)]
        );
    }

    #[test]
    fn internal_name_is_used() {
        let sort = AllowedSort::field("name").internal_name("last_name");
        assert_eq!(
            run(&sort, true).unwrap(),
            vec![Op::OrderBy("last_name".into(), true)]
        );
    }

    #[test]
    fn bare_string_is_field_sort() {
        let sort: AllowedSort<Table> = "first_name".into();
        assert_eq!(
            run(&sort, true).unwrap(),
            run(&AllowedSort::field("first_name"), true).unwrap()
        );
    }

    #[test]
    fn unknown_field() {
        let err = run(&AllowedSort::field("shoe_size"), false).unwrap_err();
        assert_eq!(err.to_string(), "no such field 'shoe_size' on 'users'");
    }

    #[test]
    fn closures_see_direction() {
        let sort = AllowedSort::<Table>::from_fn(
            "road",
            |q: Recorder, _: &Table, name: &str, descending: bool| {
                Ok(q.push(Op::Custom(format!("{}:{}", name, descending))))
            },
        );
        assert_eq!(
            run(&sort, true).unwrap(),
            vec![Op::Custom("road:true".into())]
        );
    }

    #[test]
    fn duplicates_are_rejected() {
        let err = AllowedSorts::<Table>::new(["first_name", "first_name"]).unwrap_err();
        assert!(matches!(err, SortError::Duplicate(name) if name == "first_name"));

        let sorts = AllowedSorts::<Table>::new(["last_name", "first_name"]).unwrap();
        assert_eq!(sorts.len(), 2);
        assert_eq!(sorts.names().collect::<Vec<_>>(), vec!["first_name", "last_name"]);
        assert!(sorts.get("last_name").is_some());
        assert!(AllowedSorts::<Table>::default().is_empty());
    }
}
