use query_builder::mock::Endpoint;
use query_builder::AllowedFilter;
use serde_json::Value;

use crate::common::{users, User};

async fn serve(server: &wiremock::MockServer, endpoint: Endpoint<User>) {
    wiremock::Mock::given(wiremock::matchers::method("GET"))
        .and(wiremock::matchers::path("/users/"))
        .respond_with(endpoint)
        .mount(server)
        .await;
}

fn endpoint() -> Endpoint<User> {
    Endpoint::new(users())
        .allowed_filters([
            AllowedFilter::exact("last_name"),
            AllowedFilter::partial("first_name"),
        ])
        .unwrap()
        .allowed_sorts(["first_name", "birth_date"])
        .unwrap()
}

fn names(body: &Value) -> Vec<&str> {
    body["results"]
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["first_name"].as_str().unwrap())
        .collect()
}

#[test_log::test(tokio::test)]
async fn unfiltered() {
    let server = wiremock::MockServer::start().await;
    serve(&server, endpoint()).await;

    let res = reqwest::get(format!("{}/users/", server.uri())).await.unwrap();
    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["count"], 3);
    assert_eq!(names(&body), vec!["Frank", "Charlie", "Ann"]);
    assert_eq!(body["results"][0]["address"], "Mill Road");
    assert!(body["results"][0].get("password").is_none());
}

#[test_log::test(tokio::test)]
async fn filtered_and_sorted() {
    let server = wiremock::MockServer::start().await;
    serve(&server, endpoint()).await;

    let url = format!(
        "{}/users/?filter%5Blast_name%5D=Elliot,Smith&sort=-birth_date",
        server.uri()
    );
    let res = reqwest::get(url).await.unwrap();
    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["count"], 2);
    assert_eq!(names(&body), vec!["Ann", "Frank"]);
}

#[test_log::test(tokio::test)]
async fn undeclared_filter() {
    let server = wiremock::MockServer::start().await;
    serve(&server, endpoint()).await;

    let url = format!("{}/users/?filter[username]=cjoe", server.uri());
    let res = reqwest::get(url).await.unwrap();
    assert_eq!(res.status(), 400);
    assert_eq!(
        res.text().await.unwrap(),
        "applied filter 'username' not allowed"
    );
}

#[test_log::test(tokio::test)]
async fn undeclared_sort() {
    let server = wiremock::MockServer::start().await;
    serve(&server, endpoint()).await;

    let url = format!("{}/users/?sort=username", server.uri());
    let res = reqwest::get(url).await.unwrap();
    assert_eq!(res.status(), 400);
    assert_eq!(res.text().await.unwrap(), "applied sort 'username' not allowed");
}

#[test_log::test(tokio::test)]
async fn lenient() {
    let server = wiremock::MockServer::start().await;
    serve(&server, endpoint().reject_invalid(false)).await;

    let url = format!(
        "{}/users/?filter[username]=cjoe&filter[first_name]=an&sort=-first_name",
        server.uri()
    );
    let res = reqwest::get(url).await.unwrap();
    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    assert_eq!(names(&body), vec!["Frank", "Ann"]);
}
