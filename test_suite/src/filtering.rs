use chrono::Datelike;
use query_builder::memory::MemoryQuery;
use query_builder::{AllowedFilter, FilterError, MemoryEntity, QueryBuilder};

use crate::common::{first_names, users, User};

fn born_in(
    q: MemoryQuery<User>,
    _: &MemoryEntity<User>,
    _: &str,
    values: &[String],
) -> Result<MemoryQuery<User>, FilterError> {
    let years = values
        .iter()
        .map(|v| v.parse::<i32>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| anyhow::anyhow!("bad year: {}", e))?;
    Ok(q.filter(move |u: &User| years.contains(&u.birth_date.year())))
}

#[test_log::test]
fn exact_single_value() {
    let users = users();
    let params = [("filter[first_name]", "Frank")];
    let q = QueryBuilder::new(&users, &params)
        .allowed_filters([AllowedFilter::exact("first_name")])
        .unwrap()
        .into_query();
    assert_eq!(first_names(q.all()), vec!["Frank"]);
}

#[test_log::test]
fn exact_multiple_values() {
    let users = users();
    let params = [("filter[first_name]", "Ann,Charlie")];
    let q = QueryBuilder::new(&users, &params)
        .allowed_filters(["first_name"])
        .unwrap()
        .into_query();
    assert_eq!(first_names(q.all()), vec!["Charlie", "Ann"]);
}

#[test_log::test]
fn exact_is_case_sensitive() {
    let users = users();
    let params = [("filter[first_name]", "frank")];
    let q = QueryBuilder::new(&users, &params)
        .allowed_filters(["first_name"])
        .unwrap()
        .into_query();
    assert_eq!(q.count(), 0);
}

#[test_log::test]
fn partial_matches_substrings() {
    let mut all = users().rows().to_vec();
    let mut frodo = all[0].clone();
    frodo.first_name = "Frodo".to_string();
    all.push(frodo);
    let users = MemoryEntity::new("users", all);

    let params = [("filter[first_name]", "fr")];
    let q = QueryBuilder::new(&users, &params)
        .allowed_filters([AllowedFilter::partial("first_name")])
        .unwrap()
        .into_query();
    assert_eq!(first_names(q.all()), vec!["Frank", "Frodo"]);

    let params = [("filter[first_name]", "fr,DO")];
    let q = QueryBuilder::new(&users, &params)
        .allowed_filters([AllowedFilter::partial("first_name")])
        .unwrap()
        .into_query();
    assert_eq!(first_names(q.all()), vec!["Frodo"]);
}

#[test_log::test]
fn internal_name() {
    let users = users();
    let params = [("filter[name]", "Smith")];
    let q = QueryBuilder::new(&users, &params)
        .allowed_filters([AllowedFilter::exact("name").internal_name("last_name")])
        .unwrap()
        .into_query();
    assert_eq!(first_names(q.all()), vec!["Ann"]);
}

#[test_log::test]
fn several_filters_combine() {
    let users = users();
    let params = [
        ("filter[last_name]", "Elliot,Smith"),
        ("filter[username]", "ann"),
    ];
    let q = QueryBuilder::new(&users, &params)
        .allowed_filters([
            AllowedFilter::exact("last_name"),
            AllowedFilter::partial("username"),
        ])
        .unwrap()
        .into_query();
    assert_eq!(first_names(q.all()), vec!["Ann"]);
}

#[test_log::test]
fn filter_on_foreign_key() {
    let users = users();
    let params = [("filter[address]", "Abbey Road")];
    let q = QueryBuilder::new(&users, &params)
        .allowed_filters(["address"])
        .unwrap()
        .into_query();
    assert_eq!(first_names(q.all()), vec!["Charlie"]);
}

#[test_log::test]
fn custom_filter() {
    let users = users();
    let params = [("filter[birth_year]", "1970")];
    let q = QueryBuilder::new(&users, &params)
        .allowed_filters([AllowedFilter::<MemoryEntity<User>>::from_fn("birth_year", born_in)])
        .unwrap()
        .into_query();
    assert_eq!(q.count(), 2);
    assert_eq!(first_names(q.all()), vec!["Frank", "Charlie"]);
}

#[test_log::test]
fn custom_filter_errors_propagate() {
    let users = users();
    let params = [("filter[birth_year]", "nineteen")];
    let err = QueryBuilder::new(&users, &params)
        .allowed_filters([AllowedFilter::<MemoryEntity<User>>::from_fn("birth_year", born_in)])
        .err()
        .unwrap();
    assert!(matches!(err, FilterError::Custom(_)));
    assert!(err.to_string().starts_with("bad year"));
}

#[test_log::test]
fn filter_not_allowed() {
    let users = users();
    let params = [("filter[first_name]", "Ann"), ("filter[password]", "hunter2")];
    let err = QueryBuilder::new(&users, &params)
        .allowed_filters(["first_name"])
        .err()
        .unwrap();
    assert!(matches!(&err, FilterError::Invalid(name) if name == "password"));
    assert_eq!(err.to_string(), "applied filter 'password' not allowed");
}

#[test_log::test]
fn filter_not_allowed_when_lenient() {
    let users = users();
    let params = [("filter[first_name]", "Ann"), ("filter[password]", "hunter2")];
    let q = QueryBuilder::new(&users, &params)
        .reject_invalid(false)
        .allowed_filters(["first_name"])
        .unwrap()
        .into_query();
    assert_eq!(first_names(q.all()), vec!["Ann"]);
}

#[test_log::test]
fn excluded_fields_cannot_be_filtered() {
    let users = users();
    let params = [("filter[password]", "hunter2")];
    let err = QueryBuilder::new(&users, &params)
        .allowed_filters(["password"])
        .err()
        .unwrap();
    assert_eq!(err.to_string(), "no such field 'password' on 'users'");
}

#[test_log::test]
fn unrelated_params_are_ignored() {
    let users = users();
    let params = [("page", "2"), ("filter", "x"), ("filters[first_name]", "Ann")];
    let q = QueryBuilder::new(&users, &params)
        .allowed_filters(["first_name"])
        .unwrap()
        .into_query();
    assert_eq!(q.count(), 3);
}
