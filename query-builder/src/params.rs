//! # Extract filters and sorts from request parameters
//!
//! Requests address filters and sorts through two conventions in the
//! query string:
//!
//! - `filter[<name>]=<v1>,<v2>,...` applies the filter `name` with
//!   the comma-separated values. The name may contain lowercase
//!   letters, digits, `.`, `_` and `-`.
//! - `sort=<name1>,-<name2>,...` applies sorts in priority order,
//!   where a leading `-` reverses the sense of a sort.
//!
//! Extraction is purely syntactic and never fails: keys that don't
//! have the expected shape are ignored, and whether a name is
//! actually allowed is decided later by the
//! [`QueryBuilder`](crate::QueryBuilder).
//!
//! ```rust
//! use query_builder::params::{applied_filters, applied_sorts};
//!
//! let params = vec![
//!     ("filter[first_name]", "Ann,Charlie"),
//!     ("filter[Bad]", "ignored"),
//!     ("sort", "last_name,-age"),
//! ];
//! let filters = applied_filters(&params);
//! assert_eq!(filters.len(), 1);
//! assert_eq!(filters[0].name, "first_name");
//! assert_eq!(filters[0].values, vec!["Ann", "Charlie"]);
//!
//! let sorts = applied_sorts(&params);
//! assert_eq!(sorts[0].name, "last_name");
//! assert!(!sorts[0].descending);
//! assert_eq!(sorts[1].name, "age");
//! assert!(sorts[1].descending);
//! ```

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::hash::BuildHasher;
use std::sync::OnceLock;

use regex::Regex;

/// The name of the parameter holding the sort expression.
pub const SORT_PARAM: &str = "sort";

/// A source of request parameters.
///
/// Each parameter has a single string value; multiple values are
/// expected to arrive comma-joined. Where the underlying container
/// can hold a key more than once, the first value wins.
pub trait QueryParams {
    /// Every distinct parameter name, in order of first appearance
    /// where the container has an order.
    fn param_names(&self) -> Vec<Cow<'_, str>>;
    /// The value of the parameter `name`, if present.
    fn param(&self, name: &str) -> Option<Cow<'_, str>>;
}

impl<S: BuildHasher> QueryParams for HashMap<String, String, S> {
    fn param_names(&self) -> Vec<Cow<'_, str>> {
        self.keys().map(|k| Cow::Borrowed(k.as_str())).collect()
    }

    fn param(&self, name: &str) -> Option<Cow<'_, str>> {
        self.get(name).map(|v| Cow::Borrowed(v.as_str()))
    }
}

impl QueryParams for BTreeMap<String, String> {
    fn param_names(&self) -> Vec<Cow<'_, str>> {
        self.keys().map(|k| Cow::Borrowed(k.as_str())).collect()
    }

    fn param(&self, name: &str) -> Option<Cow<'_, str>> {
        self.get(name).map(|v| Cow::Borrowed(v.as_str()))
    }
}

impl<K, V> QueryParams for [(K, V)]
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    fn param_names(&self) -> Vec<Cow<'_, str>> {
        let mut names: Vec<Cow<'_, str>> = Vec::new();
        for (k, _) in self {
            if !names.iter().any(|n| n == k.as_ref()) {
                names.push(Cow::Borrowed(k.as_ref()));
            }
        }
        names
    }

    fn param(&self, name: &str) -> Option<Cow<'_, str>> {
        self.iter()
            .find(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| Cow::Borrowed(v.as_ref()))
    }
}

impl<K, V> QueryParams for Vec<(K, V)>
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    fn param_names(&self) -> Vec<Cow<'_, str>> {
        self.as_slice().param_names()
    }

    fn param(&self, name: &str) -> Option<Cow<'_, str>> {
        self.as_slice().param(name)
    }
}

impl<K, V, const N: usize> QueryParams for [(K, V); N]
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    fn param_names(&self) -> Vec<Cow<'_, str>> {
        self.as_slice().param_names()
    }

    fn param(&self, name: &str) -> Option<Cow<'_, str>> {
        self.as_slice().param(name)
    }
}

#[cfg(feature = "wiremock")]
#[cfg_attr(docsrs, doc(cfg(feature = "wiremock")))]
impl QueryParams for wiremock::http::Url {
    fn param_names(&self) -> Vec<Cow<'_, str>> {
        let mut names: Vec<Cow<'_, str>> = Vec::new();
        for (k, _) in self.query_pairs() {
            if !names.contains(&k) {
                names.push(k);
            }
        }
        names
    }

    fn param(&self, name: &str) -> Option<Cow<'_, str>> {
        self.query_pairs().find(|(k, _)| k == name).map(|(_, v)| v)
    }
}

/// A filter requested by a parameter `filter[name]=values`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedFilter {
    /// The public name of the filter.
    pub name: String,
    /// The raw values, split on `,`. Never empty.
    pub values: Vec<String>,
}

/// A sort requested in the `sort` parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedSort {
    /// The public name of the sort, without any leading `-`.
    pub name: String,
    /// Whether the sort order is reversed.
    pub descending: bool,
}

impl AppliedSort {
    /// Parse a single sort token such as `name` or `-name`.
    pub fn parse(token: &str) -> Self {
        match token.strip_prefix('-') {
            Some(name) => Self {
                name: name.to_string(),
                descending: true,
            },
            None => Self {
                name: token.to_string(),
                descending: false,
            },
        }
    }
}

fn filter_key() -> &'static Regex {
    static FILTER_KEY: OnceLock<Regex> = OnceLock::new();
    FILTER_KEY.get_or_init(|| {
        Regex::new(r"^filter\[([a-z0-9._-]+)\]$").expect("filter key pattern is valid")
    })
}

/// Return the filter name addressed by the parameter `key`, if the
/// key has the shape `filter[<name>]`.
pub fn filter_name(key: &str) -> Option<&str> {
    filter_key()
        .captures(key)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Collect every filter applied in `params`.
///
/// Filters are returned in the order their parameters are listed by
/// [`QueryParams::param_names`]. Parameters with an empty value are
/// skipped.
pub fn applied_filters<P: QueryParams + ?Sized>(params: &P) -> Vec<AppliedFilter> {
    let mut res = Vec::new();
    for key in params.param_names() {
        let name = match filter_name(&key) {
            Some(name) => name,
            None => continue,
        };
        match params.param(&key) {
            Some(value) if !value.is_empty() => res.push(AppliedFilter {
                name: name.to_string(),
                values: value.split(',').map(str::to_string).collect(),
            }),
            _ => {}
        }
    }
    res
}

/// Collect the sorts applied in `params`, in priority order.
///
/// Empty tokens are skipped. Repeated names are kept, each repeat
/// acting as a further tiebreaker.
pub fn applied_sorts<P: QueryParams + ?Sized>(params: &P) -> Vec<AppliedSort> {
    params
        .param(SORT_PARAM)
        .map(|value| {
            value
                .split(',')
                .filter(|token| !token.is_empty())
                .map(AppliedSort::parse)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_keys() {
        assert_eq!(filter_name("filter[first_name]"), Some("first_name"));
        assert_eq!(filter_name("filter[user.address-2]"), Some("user.address-2"));
        assert_eq!(filter_name("filter[]"), None);
        assert_eq!(filter_name("filter[Name]"), None);
        assert_eq!(filter_name("filter[a][b]"), None);
        assert_eq!(filter_name("filter[a"), None);
        assert_eq!(filter_name("xfilter[a]"), None);
        assert_eq!(filter_name("sort"), None);
    }

    #[test]
    fn filters_split_on_commas() {
        let params = [("filter[name]", "a,b,,c"), ("page", "2")];
        let filters = applied_filters(&params);
        assert_eq!(
            filters,
            vec![AppliedFilter {
                name: "name".to_string(),
                values: vec!["a", "b", "", "c"].into_iter().map(String::from).collect(),
            }]
        );
    }

    #[test]
    fn empty_filters_are_skipped() {
        let params = [("filter[name]", ""), ("filter[age]", "3")];
        let filters = applied_filters(&params);
        assert_eq!(filters.len(), 1);
        assert_eq!(filters[0].name, "age");
    }

    #[test]
    fn first_value_wins() {
        let params = vec![
            ("filter[name]".to_string(), "a".to_string()),
            ("filter[name]".to_string(), "b".to_string()),
        ];
        let filters = applied_filters(&params);
        assert_eq!(filters.len(), 1);
        assert_eq!(filters[0].values, vec!["a".to_string()]);
    }

    #[test]
    fn filters_follow_parameter_order() {
        let params = [("filter[b]", "1"), ("sort", "b"), ("filter[a]", "2")];
        let names: Vec<_> = applied_filters(&params)
            .into_iter()
            .map(|f| f.name)
            .collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[test]
    fn sorts() {
        let params = [("sort", "a,-b,,a")];
        assert_eq!(
            applied_sorts(&params),
            vec![
                AppliedSort::parse("a"),
                AppliedSort {
                    name: "b".to_string(),
                    descending: true
                },
                AppliedSort::parse("a"),
            ]
        );

        let params: [(&str, &str); 0] = [];
        assert!(applied_sorts(&params).is_empty());

        let params = BTreeMap::from([("sort".to_string(), String::new())]);
        assert!(applied_sorts(&params).is_empty());
    }

    #[test]
    fn hash_map_params() {
        let params = HashMap::from([
            ("filter[a]".to_string(), "x".to_string()),
            ("other".to_string(), "y".to_string()),
        ]);
        let filters = applied_filters(&params);
        assert_eq!(filters.len(), 1);
        assert_eq!(filters[0].values, vec!["x".to_string()]);
    }
}
