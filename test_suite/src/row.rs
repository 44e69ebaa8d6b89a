use std::collections::BTreeMap;

use query_builder::row::{CellValue, IntoRow};
use serde_json::{json, Number};

use crate::common::users;

#[derive(IntoRow)]
struct Record {
    string_field: String,
    int_field: i32,
}

#[derive(IntoRow)]
struct Nested {
    #[query(foreign_key = "int_field")]
    nest: Record,
    string_field: String,
}

#[derive(IntoRow)]
struct Renamed {
    #[query(rename = "womble")]
    string_field: String,
    #[allow(dead_code)]
    #[query(exclude)]
    secret: String,
    maybe: Option<i32>,
}

#[test]
fn basic() {
    let r = Record {
        string_field: "hello".to_string(),
        int_field: 1,
    };
    assert_eq!(
        r.to_row(),
        BTreeMap::from([
            ("string_field".to_string(), CellValue::String("hello".to_string())),
            ("int_field".to_string(), CellValue::Number(Number::from(1i32))),
        ])
    );
}

#[test]
fn nesting() {
    let r = Nested {
        nest: Record {
            string_field: "nesting".to_string(),
            int_field: 15,
        },
        string_field: "hello".to_string(),
    };
    assert_eq!(r.cell("nest"), Some(CellValue::Number(Number::from(15i32))));
    assert_eq!(r.to_json(), json!({"nest": 15, "string_field": "hello"}));
}

#[test]
fn rename_and_exclude() {
    let r = Renamed {
        string_field: "hello".to_string(),
        secret: "hunter2".to_string(),
        maybe: None,
    };
    assert_eq!(Renamed::columns(), vec!["womble", "maybe"]);
    assert_eq!(r.cell("womble"), Some(CellValue::String("hello".to_string())));
    assert_eq!(r.cell("string_field"), None);
    assert_eq!(r.cell("secret"), None);
    assert_eq!(r.to_json(), json!({"womble": "hello", "maybe": null}));
}

#[test]
fn columns() {
    assert_eq!(Record::columns(), vec!["string_field", "int_field"]);
    assert_eq!(Nested::columns(), vec!["nest", "string_field"]);
    assert_eq!(
        users().columns(),
        &["first_name", "last_name", "username", "birth_date", "address"]
    );
}

#[test]
fn dates_render_as_iso() {
    let users = users();
    assert_eq!(
        users.rows()[0].cell("birth_date"),
        Some(CellValue::String("1970-05-12".to_string()))
    );
}
