//! # Serve whitelisted queries from a mock endpoint
//!
//! [`Endpoint`] is a [`wiremock`] responder that answers requests for
//! a collection of in-memory records, applying whichever `filter[..]`
//! and `sort` parameters the endpoint allows. Allowed requests get a
//! `200` with a JSON body of the form:
//!
//! ```json
//! { "count": 2, "results": [ { "first_name": "Ann" }, { "first_name": "Charlie" } ] }
//! ```
//!
//! Requests naming a filter or sort the endpoint does not allow get a
//! `400` whose body is the error message.
//!
//! Example:
//! ```rust
//! # tokio_test::block_on(async {
//! use query_builder::{mock::Endpoint, AllowedFilter, IntoRow, MemoryEntity};
//!
//! #[derive(IntoRow)]
//! struct User {
//!     first_name: String,
//! }
//!
//! let server = wiremock::MockServer::start().await;
//! let users = MemoryEntity::new("users", vec![
//!     User { first_name: "Ann".to_string() },
//! ]);
//!
//! wiremock::Mock::given(wiremock::matchers::method("GET"))
//!     .and(wiremock::matchers::path("/users/"))
//!     .respond_with(
//!         Endpoint::new(users)
//!             .allowed_filters([AllowedFilter::partial("first_name")])
//!             .unwrap()
//!             .allowed_sorts(["first_name"])
//!             .unwrap(),
//!     )
//!     .mount(&server)
//!     .await;
//! # });
//! ```

use log::{debug, trace};
use wiremock::http::Url;
use wiremock::{Request, Respond, ResponseTemplate};

use crate::filtering::{AllowedFilter, AllowedFilters, FilterError};
use crate::memory::MemoryEntity;
use crate::query::{QueryBuilder, QueryError};
use crate::row::IntoRow;
use crate::sorting::{AllowedSort, AllowedSorts, SortError};

/// The results of one request, ready to be rendered.
pub struct ResponseSet<'a, T> {
    contents: Vec<&'a T>,
}

impl<'a, T> ResponseSet<'a, T> {
    pub fn new(contents: Vec<&'a T>) -> Self {
        Self { contents }
    }
}

impl<'a, T: IntoRow> ResponseSet<'a, T> {
    pub fn mock_json(&self) -> serde_json::Value {
        let mut map = serde_json::map::Map::new();
        map.insert(
            "count".to_string(),
            serde_json::Value::Number(serde_json::Number::from(self.contents.len())),
        );
        map.insert(
            "results".to_string(),
            serde_json::Value::Array(self.contents.iter().map(|r| r.to_json()).collect()),
        );
        serde_json::Value::Object(map)
    }
}

/// A mock endpoint serving the records of a [`MemoryEntity`].
pub struct Endpoint<R: IntoRow> {
    entity: MemoryEntity<R>,
    filters: AllowedFilters<MemoryEntity<R>>,
    sorts: AllowedSorts<MemoryEntity<R>>,
    reject_invalid: bool,
}

impl<R: IntoRow> Endpoint<R> {
    /// Create an endpoint over `entity` that allows no filters or sorts.
    pub fn new(entity: MemoryEntity<R>) -> Self {
        Self {
            entity,
            filters: AllowedFilters::default(),
            sorts: AllowedSorts::default(),
            reject_invalid: true,
        }
    }

    /// Set the filters this endpoint allows.
    pub fn allowed_filters<I, F>(mut self, filters: I) -> Result<Self, FilterError>
    where
        I: IntoIterator<Item = F>,
        F: Into<AllowedFilter<MemoryEntity<R>>>,
    {
        self.filters = AllowedFilters::new(filters)?;
        Ok(self)
    }

    /// Set the sorts this endpoint allows.
    pub fn allowed_sorts<I, S>(mut self, sorts: I) -> Result<Self, SortError>
    where
        I: IntoIterator<Item = S>,
        S: Into<AllowedSort<MemoryEntity<R>>>,
    {
        self.sorts = AllowedSorts::new(sorts)?;
        Ok(self)
    }

    /// Choose whether requests using filters or sorts that are not
    /// allowed fail (the default), or have those parameters ignored.
    pub fn reject_invalid(mut self, reject: bool) -> Self {
        self.reject_invalid = reject;
        self
    }

    /// Run the query described by `url` and return the rendered body.
    pub fn query(&self, url: &Url) -> Result<serde_json::Value, QueryError> {
        let query = QueryBuilder::new(&self.entity, url)
            .reject_invalid(self.reject_invalid)
            .apply_filters(&self.filters)?
            .apply_sorts(&self.sorts)?
            .into_query();
        Ok(ResponseSet::new(query.all()).mock_json())
    }
}

impl<R> Respond for Endpoint<R>
where
    R: IntoRow + Send + Sync + 'static,
{
    fn respond(&self, request: &Request) -> ResponseTemplate {
        trace!("Request URL: {}", request.url);
        match self.query(&request.url) {
            Ok(body) => ResponseTemplate::new(200).set_body_json(body),
            Err(e) => {
                debug!("Failed to respond to {}: {}", request.url, e);
                ResponseTemplate::new(400).set_body_string(e.to_string())
            }
        }
    }
}
