use chrono::NaiveDate;
use query_builder::{IntoRow, MemoryEntity};

#[derive(Clone, Debug, IntoRow)]
pub struct Address {
    pub road: String,
    pub town: String,
}

#[derive(Clone, Debug, IntoRow)]
pub struct User {
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub birth_date: NaiveDate,
    #[query(foreign_key = "road")]
    pub address: Address,
    #[allow(dead_code)]
    #[query(exclude)]
    pub password: String,
}

fn user(first: &str, last: &str, username: &str, born: (i32, u32, u32), road: &str) -> User {
    User {
        first_name: first.to_string(),
        last_name: last.to_string(),
        username: username.to_string(),
        birth_date: NaiveDate::from_ymd_opt(born.0, born.1, born.2).unwrap(),
        address: Address {
            road: road.to_string(),
            town: "Cambridge".to_string(),
        },
        password: "hunter2".to_string(),
    }
}

pub fn users() -> MemoryEntity<User> {
    MemoryEntity::new(
        "users",
        vec![
            user("Frank", "Elliot", "frankie", (1970, 5, 12), "Mill Road"),
            user("Charlie", "Joe", "cjoe", (1970, 11, 3), "Abbey Road"),
            user("Ann", "Smith", "annsmith", (1985, 2, 28), "Zebra Lane"),
        ],
    )
}

pub fn first_names(users: Vec<&User>) -> Vec<&str> {
    users.into_iter().map(|u| u.first_name.as_str()).collect()
}
