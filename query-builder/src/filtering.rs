//! # Declare the filters an endpoint allows
//!
//! A filter is addressed in a request as `filter[<name>]=<values>`.
//! The endpoint declares which names it accepts with a list of
//! [`AllowedFilter`]s, each pairing the public name with an internal
//! field name and a [`FilterStrategy`] saying how to narrow the query.
//!
//! There are two standard strategies:
//!
//! Strategy    | Constructor                   | One value              | Several values
//! ------------|-------------------------------|------------------------|------------------------------
//! [`Exact`]   | [`AllowedFilter::exact`]      | field equals value     | field equals *any* value
//! [`Partial`] | [`AllowedFilter::partial`]    | field contains value   | field contains *every* value
//!
//! Containment for [`Partial`] ignores case. Anything else can be
//! supplied as a custom strategy, either by implementing
//! [`FilterStrategy`] or by passing a closure to
//! [`AllowedFilter::from_fn`].
//!
//! A bare string converts into an [`Exact`] filter on the field of
//! the same name, so `"first_name".into()` and
//! `AllowedFilter::exact("first_name")` are interchangeable.

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Arc;

use thiserror::Error;

use crate::query::{Entity, FieldOf, Queryable};

/// Errors produced by filtering.
#[derive(Debug, Error)]
pub enum FilterError {
    /// The request applied a filter the endpoint does not allow.
    #[error("applied filter '{0}' not allowed")]
    Invalid(String),
    /// The same public name was declared more than once.
    #[error("filter '{0}' declared more than once")]
    Duplicate(String),
    /// The internal name of a filter does not resolve on the entity.
    #[error("no such field '{field}' on '{entity}'")]
    NoField { entity: String, field: String },
    /// A custom strategy failed.
    #[error(transparent)]
    Custom(#[from] anyhow::Error),
}

/// Narrow a query using the values supplied for a filter.
///
/// `name` is always the internal name of the filter, never the name
/// used in the request. `values` are the raw strings from the
/// request; the standard strategies never call a strategy with an
/// empty slice, but custom strategies may be reused elsewhere and
/// should cope with it.
pub trait FilterStrategy<E: Entity> {
    fn filter(
        &self,
        query: E::Query,
        entity: &E,
        name: &str,
        values: &[String],
    ) -> Result<E::Query, FilterError>;
}

fn resolve<E: Entity>(entity: &E, name: &str) -> Result<FieldOf<E>, FilterError> {
    entity.field(name).ok_or_else(|| FilterError::NoField {
        entity: entity.name().to_string(),
        field: name.to_string(),
    })
}

/// Match when the field equals one of the values.
#[derive(Debug, Clone, Copy, Default)]
pub struct Exact;

impl<E: Entity> FilterStrategy<E> for Exact {
    fn filter(
        &self,
        query: E::Query,
        entity: &E,
        name: &str,
        values: &[String],
    ) -> Result<E::Query, FilterError> {
        let field = resolve(entity, name)?;
        Ok(match values {
            [value] => query.filter_eq(&field, value),
            _ => query.filter_in(&field, values),
        })
    }
}

/// Match when the field contains every one of the values, ignoring case.
#[derive(Debug, Clone, Copy, Default)]
pub struct Partial;

impl<E: Entity> FilterStrategy<E> for Partial {
    fn filter(
        &self,
        query: E::Query,
        entity: &E,
        name: &str,
        values: &[String],
    ) -> Result<E::Query, FilterError> {
        let field = resolve(entity, name)?;
        Ok(values
            .iter()
            .fold(query, |q, value| q.filter_icontains(&field, value)))
    }
}

struct FnFilter<F>(F);

impl<E, F> FilterStrategy<E> for FnFilter<F>
where
    E: Entity,
    F: Fn(E::Query, &E, &str, &[String]) -> Result<E::Query, FilterError>,
{
    fn filter(
        &self,
        query: E::Query,
        entity: &E,
        name: &str,
        values: &[String],
    ) -> Result<E::Query, FilterError> {
        (self.0)(query, entity, name, values)
    }
}

/// A filter that requests are allowed to apply.
pub struct AllowedFilter<E: Entity> {
    name: String,
    internal_name: Option<String>,
    strategy: Arc<dyn FilterStrategy<E> + Send + Sync>,
}

impl<E: Entity> AllowedFilter<E> {
    /// Allow the filter `name`, applied with `strategy`.
    pub fn new<S>(name: impl Into<String>, strategy: S) -> Self
    where
        S: FilterStrategy<E> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            internal_name: None,
            strategy: Arc::new(strategy),
        }
    }

    /// Allow an [`Exact`] match filter.
    pub fn exact(name: impl Into<String>) -> Self {
        Self::new(name, Exact)
    }

    /// Allow a case-insensitive [`Partial`] match filter.
    pub fn partial(name: impl Into<String>) -> Self {
        Self::new(name, Partial)
    }

    /// Allow a filter applied by a custom strategy.
    pub fn custom<S>(name: impl Into<String>, strategy: S) -> Self
    where
        S: FilterStrategy<E> + Send + Sync + 'static,
    {
        Self::new(name, strategy)
    }

    /// Allow a filter applied by the closure `f`, which has the
    /// signature of [`FilterStrategy::filter`].
    pub fn from_fn<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(E::Query, &E, &str, &[String]) -> Result<E::Query, FilterError>
            + Send
            + Sync
            + 'static,
    {
        Self::new(name, FnFilter(f))
    }

    /// Apply this filter to the field `internal_name` instead of the
    /// field named like the filter itself.
    pub fn internal_name(mut self, internal_name: impl Into<String>) -> Self {
        self.internal_name = Some(internal_name.into());
        self
    }

    /// The name requests use for this filter.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The name of the field this filter applies to.
    pub fn target(&self) -> &str {
        self.internal_name.as_deref().unwrap_or(&self.name)
    }

    /// Run the strategy against `query`.
    pub fn apply(
        &self,
        query: E::Query,
        entity: &E,
        values: &[String],
    ) -> Result<E::Query, FilterError> {
        self.strategy.filter(query, entity, self.target(), values)
    }
}

impl<E: Entity> Clone for AllowedFilter<E> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            internal_name: self.internal_name.clone(),
            strategy: self.strategy.clone(),
        }
    }
}

impl<E: Entity> Debug for AllowedFilter<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AllowedFilter")
            .field("name", &self.name)
            .field("internal_name", &self.internal_name)
            .finish_non_exhaustive()
    }
}

impl<E: Entity> From<&str> for AllowedFilter<E> {
    fn from(name: &str) -> Self {
        Self::exact(name)
    }
}

impl<E: Entity> From<String> for AllowedFilter<E> {
    fn from(name: String) -> Self {
        Self::exact(name)
    }
}

/// The whitelist of filters for an endpoint, keyed by public name.
///
/// This can be built once and shared between requests.
pub struct AllowedFilters<E: Entity> {
    filters: BTreeMap<String, AllowedFilter<E>>,
}

impl<E: Entity> AllowedFilters<E> {
    /// Build a whitelist from declarations.
    ///
    /// Declaring the same public name twice is an error, since it
    /// would otherwise be ambiguous which declaration applies.
    pub fn new<I, F>(filters: I) -> Result<Self, FilterError>
    where
        I: IntoIterator<Item = F>,
        F: Into<AllowedFilter<E>>,
    {
        let mut map = BTreeMap::new();
        for filter in filters {
            let filter = filter.into();
            if map.contains_key(filter.name()) {
                return Err(FilterError::Duplicate(filter.name));
            }
            map.insert(filter.name.clone(), filter);
        }
        Ok(Self { filters: map })
    }

    /// Look up the filter requests address as `name`.
    pub fn get(&self, name: &str) -> Option<&AllowedFilter<E>> {
        self.filters.get(name)
    }

    /// The allowed public names, in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.filters.keys().map(String::as_str)
    }

    /// The number of allowed filters.
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    /// Whether no filters at all are allowed.
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

impl<E: Entity> Default for AllowedFilters<E> {
    fn default() -> Self {
        Self {
            filters: BTreeMap::new(),
        }
    }
}

impl<E: Entity> Clone for AllowedFilters<E> {
    fn clone(&self) -> Self {
        Self {
            filters: self.filters.clone(),
        }
    }
}

impl<E: Entity> Debug for AllowedFilters<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.filters.values()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::tests::{Op, Recorder, Table};

    fn run(filter: &AllowedFilter<Table>, values: &[&str]) -> Result<Vec<Op>, FilterError> {
        let table = Table::default();
        let values: Vec<String> = values.iter().map(|v| v.to_string()).collect();
        filter
            .apply(table.all(), &table, &values)
            .map(|q| q.ops)
    }

    #[test]
    fn exact_single_value_is_equality() {
        let ops = run(&AllowedFilter::exact("first_name"), &["Ann"]).unwrap();
        assert_eq!(ops, vec![Op::Eq("first_name".into(), "Ann".into())]);
    }

    #[test]
    fn exact_many_values_is_inclusion() {
        let ops = run(&AllowedFilter::exact("first_name"), &["Ann", "Charlie"]).unwrap();
        assert_eq!(
            ops,
            vec![Op::In(
                "first_name".into(),
                vec!["Ann".into(), "Charlie".into()]
            )]
        );
    }

    #[test]
    fn partial_many_values_is_conjunction() {
        let ops = run(&AllowedFilter::partial("first_name"), &["fr", "an"]).unwrap();
        assert_eq!(
            ops,
            vec![
                Op::IContains("first_name".into(), "fr".into()),
                Op::IContains("first_name".into(), "an".into()),
            ]
        );
    }

    #[test]
    fn internal_name_is_used() {
        let filter = AllowedFilter::exact("name").internal_name("first_name");
        assert_eq!(filter.name(), "name");
        assert_eq!(filter.target(), "first_name");
        let ops = run(&filter, &["Ann"]).unwrap();
        assert_eq!(ops, vec![Op::Eq("first_name".into(), "Ann".into())]);
    }

    #[test]
    fn unknown_field() {
        let err = run(&AllowedFilter::exact("shoe_size"), &["9"]).unwrap_err();
        assert!(matches!(err, FilterError::NoField { ref field, .. } if field == "shoe_size"));
    }

    #[test]
    fn bare_string_is_exact() {
        let filter: AllowedFilter<Table> = "first_name".into();
        assert_eq!(
            run(&filter, &["Ann", "Bo"]).unwrap(),
            run(&AllowedFilter::exact("first_name"), &["Ann", "Bo"]).unwrap()
        );
    }

    #[test]
    fn closures_see_internal_name() {
        let filter = AllowedFilter::<Table>::from_fn(
            "year",
            |q: Recorder, _: &Table, name: &str, values: &[String]| {
                Ok(q.push(Op::Custom(format!("{}:{}", name, values.join("|")))))
            },
        )
        .internal_name("birth_date");
        let ops = run(&filter, &["1970", "2008"]).unwrap();
        assert_eq!(ops, vec![Op::Custom("birth_date:1970|2008".into())]);
    }

    #[test]
    fn duplicates_are_rejected() {
        let err = AllowedFilters::<Table>::new([
            AllowedFilter::exact("first_name"),
            AllowedFilter::partial("first_name"),
        ])
        .unwrap_err();
        assert!(matches!(err, FilterError::Duplicate(name) if name == "first_name"));

        let filters = AllowedFilters::<Table>::new(["last_name", "first_name"]).unwrap();
        assert_eq!(filters.len(), 2);
        assert!(!filters.is_empty());
        assert!(AllowedFilters::<Table>::default().is_empty());
        assert_eq!(filters.names().collect::<Vec<_>>(), vec!["first_name", "last_name"]);
    }
}
