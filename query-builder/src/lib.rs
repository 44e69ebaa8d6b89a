//! Whitelisted filtering and sorting from URL query parameters.
//!
//! A request like
//!
//! ```text
//! GET /users?filter[first_name]=Ann,Charlie&sort=-birth_date
//! ```
//!
//! names the filters and sorts it wants applied. An endpoint declares
//! which of those it allows with [`AllowedFilter`] and [`AllowedSort`],
//! and a [`QueryBuilder`] applies the requested ones to a query,
//! refusing any request that asks for something not on the list.
//!
//! Queries are anything implementing [`Queryable`], described by an
//! [`Entity`]. With the `memory` feature, [`MemoryEntity`] provides an
//! in-memory backend over records implementing [`IntoRow`], and with
//! the `wiremock` feature [`mock::Endpoint`] serves such records from
//! a mock HTTP server.

extern crate self as query_builder;

pub mod filtering;
#[cfg(feature = "memory")]
pub mod memory;
#[cfg(feature = "wiremock")]
pub mod mock;
pub mod params;
pub mod query;
pub mod row;
pub mod sorting;

pub use crate::filtering::{AllowedFilter, AllowedFilters, Exact, FilterError, FilterStrategy, Partial};
#[cfg(feature = "memory")]
pub use crate::memory::{Column, MemoryEntity, MemoryQuery};
pub use crate::params::QueryParams;
pub use crate::query::{Entity, QueryBuilder, QueryError, Queryable};
pub use crate::row::IntoRow;
pub use crate::sorting::{AllowedSort, AllowedSorts, FieldSort, SortError, SortStrategy};
