//! # Convert records into named cells
//!
//! The in-memory backend and the mock endpoint don't know anything
//! about the shape of the records they serve. Instead, a record type
//! implements [`IntoRow`], describing itself as a list of named
//! [`CellValue`]s. The names are the columns that filters and sorts
//! resolve against, and the cells are what gets compared and what
//! gets rendered into JSON.
//!
//! [`IntoRow`] has a derive macro [`macro@IntoRow`]:
//!
//! ```rust
//! use query_builder::row::{CellValue, IntoRow};
//!
//! #[derive(IntoRow)]
//! struct User {
//!     first_name: String,
//!     #[query(rename = "years")]
//!     age: u32,
//!     #[query(exclude)]
//!     password: String,
//! }
//!
//! let user = User {
//!     first_name: "Ann".to_string(),
//!     age: 40,
//!     password: "hunter2".to_string(),
//! };
//! assert_eq!(User::columns(), vec!["first_name", "years"]);
//! assert_eq!(user.cell("first_name"), Some(CellValue::String("Ann".to_string())));
//! assert_eq!(user.cell("password"), None);
//! ```

use core::cmp::Ordering;

use std::collections::BTreeMap;
use std::fmt::Display;

use serde_json::value::Value;
use serde_json::Number;

pub use query_builder_derive::IntoRow;

/// A single value from a record, as seen by filters, sorts and JSON output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellValue {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
}

impl CellValue {
    /// The textual form of this value, or `None` for [`CellValue::Null`].
    ///
    /// This is what query-string values are compared against, since
    /// they arrive as raw strings.
    pub fn text(&self) -> Option<String> {
        match self {
            CellValue::Null => None,
            CellValue::Bool(b) => Some(b.to_string()),
            CellValue::Number(n) => Some(n.to_string()),
            CellValue::String(s) => Some(s.clone()),
        }
    }

    /// Test whether this value equals the raw string `rhs`.
    ///
    /// Numbers also compare numerically, so `"5.0"` matches a cell
    /// holding `5`. `Null` never matches.
    pub fn matches(&self, rhs: &str) -> bool {
        match self {
            CellValue::Null => false,
            CellValue::Bool(b) => b.to_string() == rhs,
            CellValue::Number(n) => {
                n.to_string() == rhs
                    || matches!(
                        (n.as_f64(), rhs.parse::<f64>()),
                        (Some(a), Ok(b)) if a == b
                    )
            }
            CellValue::String(s) => s == rhs,
        }
    }

    /// Test whether the textual form of this value contains `needle`,
    /// ignoring case.
    pub fn icontains(&self, needle: &str) -> bool {
        self.text()
            .map(|t| t.to_lowercase().contains(&needle.to_lowercase()))
            .unwrap_or(false)
    }

    fn rank(&self) -> u8 {
        match self {
            CellValue::Null => 0,
            CellValue::Bool(_) => 1,
            CellValue::Number(_) => 2,
            CellValue::String(_) => 3,
        }
    }

    /// Compare two cells for sorting.
    ///
    /// Cells of the same kind use their natural order, numbers being
    /// compared by value. Across kinds the order is `Null < Bool <
    /// Number < String`, so nulls sort first.
    pub fn compare(&self, other: &CellValue) -> Ordering {
        match (self, other) {
            (CellValue::Bool(a), CellValue::Bool(b)) => a.cmp(b),
            (CellValue::Number(a), CellValue::Number(b)) => match (a.as_i64(), b.as_i64()) {
                (Some(a), Some(b)) => a.cmp(&b),
                _ => a
                    .as_f64()
                    .unwrap_or(f64::NAN)
                    .total_cmp(&b.as_f64().unwrap_or(f64::NAN)),
            },
            (CellValue::String(a), CellValue::String(b)) => a.cmp(b),
            (a, b) => a.rank().cmp(&b.rank()),
        }
    }
}

impl From<CellValue> for Value {
    fn from(v: CellValue) -> Self {
        match v {
            CellValue::Null => Value::Null,
            CellValue::Bool(b) => Value::Bool(b),
            CellValue::Number(n) => Value::Number(n),
            CellValue::String(s) => Value::String(s),
        }
    }
}

/// Something that can be stored in a [`CellValue`].
pub trait IntoCellValue {
    fn to_cell_value(&self) -> CellValue;
}

impl IntoCellValue for String {
    fn to_cell_value(&self) -> CellValue {
        CellValue::String(self.clone())
    }
}

impl<'a> IntoCellValue for &'a str {
    fn to_cell_value(&self) -> CellValue {
        CellValue::String(self.to_string())
    }
}

impl IntoCellValue for bool {
    fn to_cell_value(&self) -> CellValue {
        CellValue::Bool(*self)
    }
}

macro_rules! integer_cell {
    ($($t:ty),*) => {
        $(
            impl IntoCellValue for $t {
                fn to_cell_value(&self) -> CellValue {
                    CellValue::Number(Number::from(*self))
                }
            }
        )*
    };
}

integer_cell!(i8, u8, i16, u16, i32, u32, i64, u64, isize, usize);

impl IntoCellValue for f32 {
    fn to_cell_value(&self) -> CellValue {
        Number::from_f64((*self).into())
            .map(CellValue::Number)
            .unwrap_or(CellValue::Null)
    }
}

impl IntoCellValue for f64 {
    fn to_cell_value(&self) -> CellValue {
        Number::from_f64(*self)
            .map(CellValue::Number)
            .unwrap_or(CellValue::Null)
    }
}

impl<T: IntoCellValue> IntoCellValue for Option<T> {
    fn to_cell_value(&self) -> CellValue {
        self.as_ref()
            .map(IntoCellValue::to_cell_value)
            .unwrap_or(CellValue::Null)
    }
}

// RFC 3339 text sorts chronologically for a fixed offset.
impl<Tz> IntoCellValue for chrono::DateTime<Tz>
where
    Tz: chrono::TimeZone,
    Tz::Offset: Display,
{
    fn to_cell_value(&self) -> CellValue {
        CellValue::String(self.to_rfc3339())
    }
}

impl IntoCellValue for chrono::NaiveDate {
    fn to_cell_value(&self) -> CellValue {
        CellValue::String(self.format("%Y-%m-%d").to_string())
    }
}

impl IntoCellValue for chrono::NaiveDateTime {
    fn to_cell_value(&self) -> CellValue {
        CellValue::String(self.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
    }
}

/// Take the cell for a field from a nested record.
///
/// This is used by the `foreign_key` option of the derive macro, so
/// that a member which is itself a record shows up as one of its own
/// cells, the way a foreign key column would.
pub trait AsForeignKey {
    fn as_foreign_key(&self, key: &str) -> CellValue;
}

impl<T: IntoRow> AsForeignKey for T {
    fn as_foreign_key(&self, key: &str) -> CellValue {
        self.cell(key).unwrap_or(CellValue::Null)
    }
}

/// Receive the cells of a record.
pub trait CellVisitor {
    fn visit_value(&mut self, name: &str, v: CellValue);
}

/// Receive the column names of a record type.
pub trait ColumnVisitor {
    fn visit_column(&mut self, name: &str);
}

/// A record that can describe itself as named cells.
pub trait IntoRow {
    /// `visitor` will be called with each cell of this record.
    fn accept_cell_visitor<V: CellVisitor>(&self, visitor: &mut V);

    /// `visitor` will be called with each column of this type.
    fn accept_column_visitor<V: ColumnVisitor>(visitor: &mut V);

    fn to_row(&self) -> BTreeMap<String, CellValue> {
        let mut r = RowVisitor {
            values: BTreeMap::new(),
        };
        self.accept_cell_visitor(&mut r);
        r.values
    }

    fn to_json(&self) -> Value {
        let mut j = JsonVisitor {
            value: serde_json::map::Map::new(),
        };
        self.accept_cell_visitor(&mut j);
        Value::Object(j.value)
    }

    fn columns() -> Vec<String> {
        let mut c = ColumnListVisitor { value: Vec::new() };
        Self::accept_column_visitor(&mut c);
        c.value
    }

    /// The cell called `name`, if there is one.
    fn cell(&self, name: &str) -> Option<CellValue> {
        let mut k = KeyVisitor {
            target: name,
            value: None,
        };
        self.accept_cell_visitor(&mut k);
        k.value
    }
}

struct KeyVisitor<'a> {
    target: &'a str,
    value: Option<CellValue>,
}

impl<'a> CellVisitor for KeyVisitor<'a> {
    fn visit_value(&mut self, name: &str, v: CellValue) {
        if name == self.target {
            self.value = Some(v);
        }
    }
}

struct RowVisitor {
    values: BTreeMap<String, CellValue>,
}

impl CellVisitor for RowVisitor {
    fn visit_value(&mut self, name: &str, v: CellValue) {
        self.values.insert(name.to_string(), v);
    }
}

struct JsonVisitor {
    value: serde_json::map::Map<String, Value>,
}

impl CellVisitor for JsonVisitor {
    fn visit_value(&mut self, name: &str, v: CellValue) {
        self.value.insert(name.to_string(), v.into());
    }
}

struct ColumnListVisitor {
    value: Vec<String>,
}

impl ColumnVisitor for ColumnListVisitor {
    fn visit_column(&mut self, name: &str) {
        self.value.push(name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_numbers_by_value() {
        let cell = 5i32.to_cell_value();
        assert!(cell.matches("5"));
        assert!(cell.matches("5.0"));
        assert!(!cell.matches("6"));
        assert!(!CellValue::Null.matches(""));
    }

    #[test]
    fn icontains_folds_case() {
        let cell = "Frodo".to_cell_value();
        assert!(cell.icontains("fr"));
        assert!(cell.icontains("ODO"));
        assert!(!cell.icontains("sam"));
    }

    #[test]
    fn compare_orders_nulls_first() {
        let mut cells = vec![
            "b".to_cell_value(),
            CellValue::Null,
            2u8.to_cell_value(),
            "a".to_cell_value(),
            1.5f64.to_cell_value(),
        ];
        cells.sort_by(|a, b| a.compare(b));
        assert_eq!(
            cells,
            vec![
                CellValue::Null,
                1.5f64.to_cell_value(),
                2u8.to_cell_value(),
                "a".to_cell_value(),
                "b".to_cell_value(),
            ]
        );
    }

    #[test]
    fn dates_render_as_text() {
        let d = chrono::NaiveDate::from_ymd_opt(1970, 6, 25).unwrap();
        assert_eq!(d.to_cell_value(), CellValue::String("1970-06-25".to_string()));
        assert_eq!(Some(d).to_cell_value().text().as_deref(), Some("1970-06-25"));
        assert_eq!(None::<chrono::NaiveDate>.to_cell_value(), CellValue::Null);
    }
}
