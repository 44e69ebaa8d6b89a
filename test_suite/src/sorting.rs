use query_builder::memory::MemoryQuery;
use query_builder::{AllowedFilter, AllowedSort, MemoryEntity, QueryBuilder, SortError};

use crate::common::{first_names, users, User};

fn by_road(
    q: MemoryQuery<User>,
    _: &MemoryEntity<User>,
    _: &str,
    descending: bool,
) -> Result<MemoryQuery<User>, SortError> {
    Ok(q.order_by_key(move |a: &User, b: &User| {
        let ord = a.address.road.cmp(&b.address.road);
        if descending {
            ord.reverse()
        } else {
            ord
        }
    }))
}

fn sorted(sort: &str, allowed: Vec<AllowedSort<MemoryEntity<User>>>) -> Vec<String> {
    let users = users();
    let params = [("sort", sort)];
    let q = QueryBuilder::new(&users, &params)
        .allowed_sorts(allowed)
        .unwrap()
        .into_query();
    first_names(q.all()).into_iter().map(str::to_string).collect()
}

#[test_log::test]
fn ascending() {
    assert_eq!(
        sorted("first_name", vec!["first_name".into()]),
        vec!["Ann", "Charlie", "Frank"]
    );
}

#[test_log::test]
fn descending() {
    assert_eq!(
        sorted("-first_name", vec!["first_name".into()]),
        vec!["Frank", "Charlie", "Ann"]
    );
}

#[test_log::test]
fn dates() {
    assert_eq!(
        sorted("-birth_date", vec!["birth_date".into()]),
        vec!["Ann", "Charlie", "Frank"]
    );
}

#[test_log::test]
fn multiple_sorts_break_ties() {
    let allowed = || -> Vec<AllowedSort<MemoryEntity<User>>> {
        vec![
            "last_name".into(),
            AllowedSort::field("birth_year").internal_name("birth_date"),
        ]
    };
    let mut users = users().rows().to_vec();
    users[2].last_name = "Elliot".to_string();
    let users = MemoryEntity::new("users", users);

    let params = [("sort", "last_name,-birth_year")];
    let q = QueryBuilder::new(&users, &params)
        .allowed_sorts(allowed())
        .unwrap()
        .into_query();
    assert_eq!(first_names(q.all()), vec!["Ann", "Frank", "Charlie"]);

    let params = [("sort", "last_name,birth_year")];
    let q = QueryBuilder::new(&users, &params)
        .allowed_sorts(allowed())
        .unwrap()
        .into_query();
    assert_eq!(first_names(q.all()), vec!["Frank", "Ann", "Charlie"]);
}

#[test_log::test]
fn internal_name() {
    assert_eq!(
        sorted("-name", vec![AllowedSort::field("name").internal_name("last_name")]),
        vec!["Ann", "Charlie", "Frank"]
    );
}

#[test_log::test]
fn foreign_key() {
    assert_eq!(
        sorted("address", vec!["address".into()]),
        vec!["Charlie", "Frank", "Ann"]
    );
}

#[test_log::test]
fn custom_sort() {
    let allowed = || vec![AllowedSort::<MemoryEntity<User>>::from_fn("road", by_road)];
    assert_eq!(sorted("road", allowed()), vec!["Charlie", "Frank", "Ann"]);
    assert_eq!(sorted("-road", allowed()), vec!["Ann", "Frank", "Charlie"]);
}

#[test_log::test]
fn empty_tokens_are_skipped() {
    assert_eq!(
        sorted(",-first_name,", vec!["first_name".into()]),
        vec!["Frank", "Charlie", "Ann"]
    );
}

#[test_log::test]
fn sort_not_allowed() {
    let users = users();
    let params = [("sort", "first_name,-password")];
    let err = QueryBuilder::new(&users, &params)
        .allowed_sorts(["first_name"])
        .err()
        .unwrap();
    assert!(matches!(&err, SortError::Invalid(name) if name == "password"));
    assert_eq!(err.to_string(), "applied sort 'password' not allowed");
}

#[test_log::test]
fn sort_not_allowed_when_lenient() {
    let users = users();
    let params = [("sort", "-password,-first_name")];
    let q = QueryBuilder::new(&users, &params)
        .reject_invalid(false)
        .allowed_sorts(["first_name"])
        .unwrap()
        .into_query();
    assert_eq!(first_names(q.all()), vec!["Frank", "Charlie", "Ann"]);
}

#[test_log::test]
fn filter_then_sort() {
    let users = users();
    let params = [("sort", "-first_name"), ("filter[last_name]", "Joe,Smith")];
    let q = QueryBuilder::new(&users, &params)
        .allowed_filters([AllowedFilter::exact("last_name")])
        .unwrap()
        .allowed_sorts(["first_name"])
        .unwrap()
        .into_query();
    assert_eq!(first_names(q.all()), vec!["Charlie", "Ann"]);
}
