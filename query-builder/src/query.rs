//! # Build a query from whitelisted request parameters
//!
//! [`QueryBuilder`] ties everything together. It is created for one
//! request, from the [`Entity`] being queried and the request's
//! [`QueryParams`], and then told which filters and sorts the endpoint
//! allows. Anything the request asks for outside those lists is an
//! error, and nothing is applied.
//!
//! The query itself is anything implementing [`Queryable`]: the
//! builder never executes it, it only threads it through the
//! strategies and hands it back.

use log::{debug, trace};
use thiserror::Error;

use crate::filtering::{AllowedFilter, AllowedFilters, FilterError};
use crate::params::{applied_filters, applied_sorts, QueryParams};
use crate::sorting::{AllowedSort, AllowedSorts, SortError};

/// Errors produced while building a query.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error(transparent)]
    Filter(#[from] FilterError),
    #[error(transparent)]
    Sort(#[from] SortError),
}

/// A query under construction, which has not yet been executed.
///
/// Each operation consumes the query and returns the narrowed or
/// reordered result. Implementations must combine successive filters
/// with logical AND, and must keep successive orderings stable: the
/// first `order_by` applied is the primary key, and each later one
/// only breaks ties left by those before it.
pub trait Queryable: Sized {
    /// A resolved reference to a field, as produced by [`Entity::field`].
    type Field;

    /// Keep records where `field` equals `value`.
    fn filter_eq(self, field: &Self::Field, value: &str) -> Self;
    /// Keep records where `field` equals any of `values`.
    fn filter_in(self, field: &Self::Field, values: &[String]) -> Self;
    /// Keep records where `field` contains `value`, ignoring case.
    fn filter_icontains(self, field: &Self::Field, value: &str) -> Self;
    /// Append an ordering on `field`.
    fn order_by(self, field: &Self::Field, descending: bool) -> Self;
}

/// A description of a type of record that can be queried.
pub trait Entity {
    /// The query type for this entity.
    type Query: Queryable;

    /// A name for the entity, used in errors and logs.
    fn name(&self) -> &str;
    /// Resolve a field name for use in the query.
    fn field(&self, name: &str) -> Option<<Self::Query as Queryable>::Field>;
    /// A query over every record of this entity.
    fn all(&self) -> Self::Query;
}

/// The field type of the query of an entity.
pub type FieldOf<E> = <<E as Entity>::Query as Queryable>::Field;

/// Apply whitelisted filters and sorts from a request to a query.
///
/// Example:
/// ```rust
/// use query_builder::{FilterError, IntoRow, MemoryEntity, QueryBuilder, QueryError};
///
/// #[derive(IntoRow)]
/// struct User {
///     first_name: String,
///     last_name: String,
/// }
///
/// let users = MemoryEntity::new("users", vec![
///     User { first_name: "Frank".to_string(), last_name: "Elliot".to_string() },
///     User { first_name: "Charlie".to_string(), last_name: "Joe".to_string() },
///     User { first_name: "Ann".to_string(), last_name: "Smith".to_string() },
/// ]);
///
/// let params = [("filter[first_name]", "Ann,Charlie"), ("sort", "-first_name")];
/// let query = QueryBuilder::new(&users, &params)
///     .allowed_filters(["first_name"])?
///     .allowed_sorts(["first_name"])?
///     .into_query();
/// let names: Vec<_> = query.all().iter().map(|u| u.first_name.as_str()).collect();
/// assert_eq!(names, vec!["Charlie", "Ann"]);
///
/// let params = [("filter[last_name]", "Smith")];
/// let res = QueryBuilder::new(&users, &params).allowed_filters(["first_name"]);
/// assert!(matches!(res, Err(FilterError::Invalid(name)) if name == "last_name"));
/// # Ok::<(), QueryError>(())
/// ```
pub struct QueryBuilder<'a, E: Entity, P: ?Sized> {
    entity: &'a E,
    params: &'a P,
    query: E::Query,
    reject_invalid: bool,
}

impl<'a, E, P> QueryBuilder<'a, E, P>
where
    E: Entity,
    P: QueryParams + ?Sized,
{
    /// Start building a query over every record of `entity`.
    pub fn new(entity: &'a E, params: &'a P) -> Self {
        Self::with_query(entity, params, entity.all())
    }

    /// Start building from an existing query for `entity`.
    pub fn with_query(entity: &'a E, params: &'a P, query: E::Query) -> Self {
        Self {
            entity,
            params,
            query,
            reject_invalid: true,
        }
    }

    /// Choose whether filters and sorts the endpoint does not allow
    /// are errors (the default), or are silently skipped.
    pub fn reject_invalid(mut self, reject: bool) -> Self {
        self.reject_invalid = reject;
        self
    }

    /// Apply the filters in the request, allowing only those in `filters`.
    pub fn allowed_filters<I, F>(self, filters: I) -> Result<Self, FilterError>
    where
        I: IntoIterator<Item = F>,
        F: Into<AllowedFilter<E>>,
    {
        let filters = AllowedFilters::new(filters)?;
        self.apply_filters(&filters)
    }

    /// Apply the filters in the request, allowing only those in `filters`.
    ///
    /// Every requested name is checked before any filter runs, so an
    /// error means the query was not touched.
    pub fn apply_filters(mut self, filters: &AllowedFilters<E>) -> Result<Self, FilterError> {
        let mut matched = Vec::new();
        for applied in applied_filters(self.params) {
            match filters.get(&applied.name) {
                Some(allowed) => matched.push((allowed, applied.values)),
                None if self.reject_invalid => {
                    debug!(
                        "Rejecting filter '{}' on '{}'",
                        applied.name,
                        self.entity.name()
                    );
                    return Err(FilterError::Invalid(applied.name));
                }
                None => {
                    debug!(
                        "Skipping filter '{}' on '{}'",
                        applied.name,
                        self.entity.name()
                    );
                }
            }
        }

        let mut query = self.query;
        for (allowed, values) in matched {
            trace!(
                "Filtering '{}' on '{}' with {:?}",
                self.entity.name(),
                allowed.target(),
                values
            );
            query = allowed.apply(query, self.entity, &values)?;
        }
        self.query = query;
        Ok(self)
    }

    /// Apply the sorts in the request, allowing only those in `sorts`.
    pub fn allowed_sorts<I, S>(self, sorts: I) -> Result<Self, SortError>
    where
        I: IntoIterator<Item = S>,
        S: Into<AllowedSort<E>>,
    {
        let sorts = AllowedSorts::new(sorts)?;
        self.apply_sorts(&sorts)
    }

    /// Apply the sorts in the request, allowing only those in `sorts`.
    ///
    /// Sorts are applied in the order they are listed in the request,
    /// so the first is the primary order.
    pub fn apply_sorts(mut self, sorts: &AllowedSorts<E>) -> Result<Self, SortError> {
        let mut matched = Vec::new();
        for applied in applied_sorts(self.params) {
            match sorts.get(&applied.name) {
                Some(allowed) => matched.push((allowed, applied.descending)),
                None if self.reject_invalid => {
                    debug!(
                        "Rejecting sort '{}' on '{}'",
                        applied.name,
                        self.entity.name()
                    );
                    return Err(SortError::Invalid(applied.name));
                }
                None => {
                    debug!(
                        "Skipping sort '{}' on '{}'",
                        applied.name,
                        self.entity.name()
                    );
                }
            }
        }

        let mut query = self.query;
        for (allowed, descending) in matched {
            trace!(
                "Sorting '{}' by {}'{}'",
                self.entity.name(),
                if descending { "-" } else { "" },
                allowed.target()
            );
            query = allowed.apply(query, self.entity, descending)?;
        }
        self.query = query;
        Ok(self)
    }

    /// The query as built so far.
    pub fn query(&self) -> &E::Query {
        &self.query
    }

    /// Finish building and return the query.
    pub fn into_query(self) -> E::Query {
        self.query
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Op {
        Eq(String, String),
        In(String, Vec<String>),
        IContains(String, String),
        OrderBy(String, bool),
        Custom(String),
    }

    /// A query that records the operations applied to it.
    #[derive(Debug, Clone, Default, PartialEq, Eq)]
    pub struct Recorder {
        pub ops: Vec<Op>,
    }

    impl Recorder {
        pub fn push(mut self, op: Op) -> Self {
            self.ops.push(op);
            self
        }
    }

    impl Queryable for Recorder {
        type Field = String;

        fn filter_eq(self, field: &String, value: &str) -> Self {
            self.push(Op::Eq(field.clone(), value.to_string()))
        }

        fn filter_in(self, field: &String, values: &[String]) -> Self {
            self.push(Op::In(field.clone(), values.to_vec()))
        }

        fn filter_icontains(self, field: &String, value: &str) -> Self {
            self.push(Op::IContains(field.clone(), value.to_string()))
        }

        fn order_by(self, field: &String, descending: bool) -> Self {
            self.push(Op::OrderBy(field.clone(), descending))
        }
    }

    #[derive(Debug, Default)]
    pub struct Table;

    const COLUMNS: &[&str] = &["first_name", "last_name", "username", "birth_date"];

    impl Entity for Table {
        type Query = Recorder;

        fn name(&self) -> &str {
            "users"
        }

        fn field(&self, name: &str) -> Option<String> {
            COLUMNS
                .iter()
                .find(|c| **c == name)
                .map(|c| c.to_string())
        }

        fn all(&self) -> Recorder {
            Recorder::default()
        }
    }

    fn build<'a, P: QueryParams + ?Sized>(params: &'a P) -> QueryBuilder<'a, Table, P> {
        QueryBuilder::new(&Table, params)
    }

    #[test_log::test]
    fn no_parameters_leaves_query_alone() {
        let params: [(&str, &str); 0] = [];
        let q = build(&params)
            .allowed_filters(["first_name"])
            .unwrap()
            .allowed_sorts(["first_name"])
            .unwrap()
            .into_query();
        assert_eq!(q, Recorder::default());
    }

    #[test_log::test]
    fn filters_apply_in_parameter_order() {
        let params = [
            ("filter[last_name]", "Smith"),
            ("filter[first_name]", "Ann,Bo"),
            ("filter[name]", "an"),
            ("unrelated", "x"),
        ];
        let q = build(&params)
            .allowed_filters([
                AllowedFilter::exact("first_name"),
                AllowedFilter::exact("last_name"),
                AllowedFilter::partial("name").internal_name("first_name"),
                AllowedFilter::exact("username"),
            ])
            .unwrap()
            .into_query();
        assert_eq!(
            q.ops,
            vec![
                Op::Eq("last_name".into(), "Smith".into()),
                Op::In("first_name".into(), vec!["Ann".into(), "Bo".into()]),
                Op::IContains("first_name".into(), "an".into()),
            ]
        );
    }

    #[test_log::test]
    fn sorts_apply_in_listed_order() {
        let params = [("sort", "last_name,-first_name")];
        let q = build(&params)
            .allowed_sorts(["first_name", "last_name"])
            .unwrap()
            .into_query();
        assert_eq!(
            q.ops,
            vec![
                Op::OrderBy("last_name".into(), false),
                Op::OrderBy("first_name".into(), true),
            ]
        );
    }

    #[test_log::test]
    fn invalid_filter_applies_nothing() {
        let applied = Arc::new(AtomicUsize::new(0));
        let seen = applied.clone();
        let params = [("filter[first_name]", "Ann"), ("filter[random_field]", "x")];
        let err = build(&params)
            .allowed_filters([AllowedFilter::<Table>::from_fn(
                "first_name",
                move |q: Recorder, _: &Table, _: &str, _: &[String]| {
                    seen.fetch_add(1, Ordering::SeqCst);
                    Ok(q)
                },
            )])
            .err()
            .unwrap();
        assert!(matches!(err, FilterError::Invalid(ref name) if name == "random_field"));
        assert_eq!(applied.load(Ordering::SeqCst), 0);
    }

    #[test_log::test]
    fn invalid_sort_names_the_sort() {
        let params = [("sort", "first_name,-random_field")];
        let err = build(&params)
            .allowed_sorts(["first_name"])
            .err()
            .unwrap();
        assert_eq!(err.to_string(), "applied sort 'random_field' not allowed");
    }

    #[test_log::test]
    fn lenient_mode_skips_invalid() {
        let params = [
            ("filter[random_field]", "x"),
            ("filter[first_name]", "Ann"),
            ("sort", "random_field,-first_name"),
        ];
        let q = build(&params)
            .reject_invalid(false)
            .allowed_filters(["first_name"])
            .unwrap()
            .allowed_sorts(["first_name"])
            .unwrap()
            .into_query();
        assert_eq!(
            q.ops,
            vec![
                Op::Eq("first_name".into(), "Ann".into()),
                Op::OrderBy("first_name".into(), true),
            ]
        );
    }

    #[test_log::test]
    fn starts_from_given_query() {
        let params = [("filter[first_name]", "Ann")];
        let start = Recorder::default().push(Op::Custom("scoped".into()));
        let builder = QueryBuilder::with_query(&Table, &params, start)
            .allowed_filters(["first_name"])
            .unwrap();
        assert_eq!(
            builder.query().ops,
            vec![
                Op::Custom("scoped".into()),
                Op::Eq("first_name".into(), "Ann".into()),
            ]
        );
    }

    #[test_log::test]
    fn errors_convert_to_query_error() {
        fn handler(params: &[(&str, &str)]) -> Result<Recorder, QueryError> {
            Ok(QueryBuilder::new(&Table, params)
                .allowed_filters(["first_name"])?
                .allowed_sorts(["first_name"])?
                .into_query())
        }
        assert!(handler(&[("sort", "first_name")]).is_ok());
        assert!(matches!(
            handler(&[("sort", "last_name")]),
            Err(QueryError::Sort(SortError::Invalid(_)))
        ));
        assert!(matches!(
            handler(&[("filter[last_name]", "x")]),
            Err(QueryError::Filter(FilterError::Invalid(_)))
        ));
    }

    #[test_log::test]
    fn missing_internal_field_is_reported() {
        let params = [("filter[name]", "Ann")];
        let err = build(&params)
            .allowed_filters([AllowedFilter::exact("name").internal_name("nickname")])
            .err()
            .unwrap();
        assert_eq!(err.to_string(), "no such field 'nickname' on 'users'");
    }

    #[test_log::test]
    fn custom_filter_result_is_chained_onward() {
        let params = [("filter[scope]", "x"), ("filter[first_name]", "Ann")];
        let q = build(&params)
            .allowed_filters([
                AllowedFilter::<Table>::from_fn(
                    "scope",
                    |_: Recorder, _: &Table, _: &str, _: &[String]| {
                        Ok(Recorder::default().push(Op::Custom("replaced".into())))
                    },
                ),
                AllowedFilter::exact("first_name"),
            ])
            .unwrap()
            .into_query();
        assert_eq!(
            q.ops,
            vec![
                Op::Custom("replaced".into()),
                Op::Eq("first_name".into(), "Ann".into()),
            ]
        );
    }

    #[test_log::test]
    fn custom_sort_result_is_chained_onward() {
        let params = [("sort", "road,-first_name")];
        let q = build(&params)
            .allowed_sorts([
                AllowedSort::<Table>::from_fn(
                    "road",
                    |_: Recorder, _: &Table, _: &str, _: bool| {
                        Ok(Recorder::default().push(Op::Custom("replaced".into())))
                    },
                ),
                AllowedSort::field("first_name"),
            ])
            .unwrap()
            .into_query();
        assert_eq!(
            q.ops,
            vec![
                Op::Custom("replaced".into()),
                Op::OrderBy("first_name".into(), true),
            ]
        );
    }

    #[test_log::test]
    fn empty_sort_tokens_are_not_rejected() {
        for sort in ["", ",", "first_name,,", ",-first_name"] {
            let params = [("sort", sort)];
            let q = build(&params)
                .allowed_sorts(["first_name"])
                .unwrap()
                .into_query();
            let expected: Vec<Op> = match sort {
                "first_name,," => vec![Op::OrderBy("first_name".into(), false)],
                ",-first_name" => vec![Op::OrderBy("first_name".into(), true)],
                _ => vec![],
            };
            assert_eq!(q.ops, expected, "sort={:?}", sort);
        }

        let params = [("sort", "-")];
        let err = build(&params).allowed_sorts(["first_name"]).err().unwrap();
        assert!(matches!(err, SortError::Invalid(ref name) if name.is_empty()));
    }

    #[test_log::test]
    fn empty_filter_values_are_not_rejected() {
        let params = [("filter[random_field]", ""), ("filter[first_name]", "Ann")];
        let q = build(&params)
            .allowed_filters(["first_name"])
            .unwrap()
            .into_query();
        assert_eq!(q.ops, vec![Op::Eq("first_name".into(), "Ann".into())]);
    }
}
