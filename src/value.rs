//! Result Values
//!
//! `Cell` is the closed set of values a query engine can hand back for one
//! column of one row. `CanonicalValue` is the hashable, totally ordered form
//! the equivalence search works on.

use crate::error::{EvalError, Result};
use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// One result cell as received from the executor
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    List(Vec<Cell>),
    Set(Vec<Cell>),
    Map(BTreeMap<String, Cell>),
    /// Graph path; has no canonical form
    Path(Vec<Cell>),
}

impl Cell {
    /// Build a cell from a JSON value (e.g. a row of an HTTP query response)
    pub fn from_json(value: &Value) -> Cell {
        match value {
            Value::Null => Cell::Null,
            Value::Bool(b) => Cell::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Cell::Int(i),
                None => Cell::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => Cell::Text(s.clone()),
            Value::Array(items) => Cell::List(items.iter().map(Cell::from_json).collect()),
            Value::Object(map) => Cell::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), Cell::from_json(v)))
                    .collect(),
            ),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Cell::Null => "null",
            Cell::Bool(_) => "boolean",
            Cell::Int(_) => "integer",
            Cell::Float(_) => "float",
            Cell::Text(_) => "text",
            Cell::Date(_) => "date",
            Cell::DateTime(_) => "datetime",
            Cell::List(_) => "list",
            Cell::Set(_) => "set",
            Cell::Map(_) => "map",
            Cell::Path(_) => "path",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }
}

impl From<bool> for Cell {
    fn from(v: bool) -> Self {
        Cell::Bool(v)
    }
}

impl From<i64> for Cell {
    fn from(v: i64) -> Self {
        Cell::Int(v)
    }
}

impl From<i32> for Cell {
    fn from(v: i32) -> Self {
        Cell::Int(v as i64)
    }
}

impl From<f64> for Cell {
    fn from(v: f64) -> Self {
        Cell::Float(v)
    }
}

impl From<&str> for Cell {
    fn from(v: &str) -> Self {
        Cell::Text(v.to_string())
    }
}

impl From<String> for Cell {
    fn from(v: String) -> Self {
        Cell::Text(v)
    }
}

impl From<NaiveDate> for Cell {
    fn from(v: NaiveDate) -> Self {
        Cell::Date(v)
    }
}

impl<T: Into<Cell>> From<Vec<T>> for Cell {
    fn from(v: Vec<T>) -> Self {
        Cell::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Cell>> From<Option<T>> for Cell {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Cell::Null)
    }
}

/// Hashable canonical form of a [`Cell`]
///
/// Floats are kept by bit pattern with `-0.0` folded into `0.0` and all NaNs
/// folded into one, so the type can be `Eq + Hash`. Integers and floats never
/// compare equal to each other.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CanonicalValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(u64),
    Text(String),
    Tuple(Vec<CanonicalValue>),
}

impl CanonicalValue {
    pub fn float(v: f64) -> Self {
        let v = if v == 0.0 {
            0.0
        } else if v.is_nan() {
            f64::NAN
        } else {
            v
        };
        CanonicalValue::Float(v.to_bits())
    }

    fn type_tag(&self) -> u8 {
        match self {
            CanonicalValue::Null => 0,
            CanonicalValue::Bool(_) => 1,
            CanonicalValue::Int(_) => 2,
            CanonicalValue::Float(_) => 3,
            CanonicalValue::Text(_) => 4,
            CanonicalValue::Tuple(_) => 5,
        }
    }

    /// Textual rendering used by the mixed-type order.
    ///
    /// Nested text is quoted and escaped so two different tuples never
    /// render the same.
    fn render(&self, nested: bool) -> String {
        match self {
            CanonicalValue::Null => "null".to_string(),
            CanonicalValue::Bool(b) => b.to_string(),
            CanonicalValue::Int(i) => i.to_string(),
            CanonicalValue::Float(bits) => format!("{:?}", f64::from_bits(*bits)),
            CanonicalValue::Text(s) if nested => format!("{:?}", s),
            CanonicalValue::Text(s) => s.clone(),
            CanonicalValue::Tuple(items) => {
                let inner: Vec<String> = items.iter().map(|v| v.render(true)).collect();
                format!("({})", inner.join(", "))
            }
        }
    }

    /// Sort key of the total order over heterogeneous values:
    /// textual rendering first, type tag second.
    pub fn sort_key(&self) -> (String, u8) {
        (self.render(false), self.type_tag())
    }
}

impl Ord for CanonicalValue {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

impl PartialOrd for CanonicalValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for CanonicalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render(false))
    }
}

/// Sort values by the mixed-type total order, rendering each key once.
pub fn sort_canonical(values: &mut [CanonicalValue]) {
    values.sort_by_cached_key(|v| v.sort_key());
}

/// Convert a cell into its canonical form.
///
/// When `unorder_nested_lists` is set, list cells become order-insensitive.
/// Sets are always sorted and maps become key-sorted `(key, value)` pairs.
pub fn canonicalize(cell: &Cell, unorder_nested_lists: bool) -> Result<CanonicalValue> {
    let canonical = match cell {
        Cell::Null => CanonicalValue::Null,
        Cell::Bool(b) => CanonicalValue::Bool(*b),
        Cell::Int(i) => CanonicalValue::Int(*i),
        Cell::Float(v) => CanonicalValue::float(*v),
        Cell::Text(s) => CanonicalValue::Text(s.clone()),
        Cell::Date(d) => CanonicalValue::Text(d.format("%Y-%m-%d").to_string()),
        Cell::DateTime(dt) => {
            CanonicalValue::Text(dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
        }
        Cell::List(items) => {
            let mut values = canonicalize_all(items, unorder_nested_lists)?;
            if unorder_nested_lists {
                sort_canonical(&mut values);
            }
            CanonicalValue::Tuple(values)
        }
        Cell::Set(items) => {
            let mut values = canonicalize_all(items, unorder_nested_lists)?;
            sort_canonical(&mut values);
            CanonicalValue::Tuple(values)
        }
        Cell::Map(entries) => {
            // BTreeMap iterates in key order
            let pairs = entries
                .iter()
                .map(|(k, v)| {
                    Ok(CanonicalValue::Tuple(vec![
                        CanonicalValue::Text(k.clone()),
                        canonicalize(v, unorder_nested_lists)?,
                    ]))
                })
                .collect::<Result<Vec<_>>>()?;
            CanonicalValue::Tuple(pairs)
        }
        Cell::Path(_) => {
            return Err(EvalError::UnhashableValue(format!(
                "{} values cannot be compared",
                cell.kind()
            )))
        }
    };
    Ok(canonical)
}

fn canonicalize_all(items: &[Cell], unorder_nested_lists: bool) -> Result<Vec<CanonicalValue>> {
    items
        .iter()
        .map(|item| canonicalize(item, unorder_nested_lists))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalars_pass_through() {
        assert_eq!(canonicalize(&Cell::Null, true).unwrap(), CanonicalValue::Null);
        assert_eq!(canonicalize(&Cell::Int(7), true).unwrap(), CanonicalValue::Int(7));
        assert_eq!(
            canonicalize(&Cell::from("abc"), true).unwrap(),
            CanonicalValue::Text("abc".to_string())
        );
        assert_eq!(
            canonicalize(&Cell::Bool(true), false).unwrap(),
            CanonicalValue::Bool(true)
        );
    }

    #[test]
    fn test_date_becomes_iso_text() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(
            canonicalize(&Cell::Date(date), true).unwrap(),
            CanonicalValue::Text("2024-03-09".to_string())
        );
    }

    #[test]
    fn test_nested_list_order() {
        let a = Cell::from(vec![3i64, 1, 2]);
        let b = Cell::from(vec![1i64, 2, 3]);
        assert_eq!(canonicalize(&a, true).unwrap(), canonicalize(&b, true).unwrap());
        assert_ne!(canonicalize(&a, false).unwrap(), canonicalize(&b, false).unwrap());
    }

    #[test]
    fn test_set_always_sorted() {
        let a = Cell::Set(vec![Cell::from("b"), Cell::from("a")]);
        let b = Cell::Set(vec![Cell::from("a"), Cell::from("b")]);
        assert_eq!(canonicalize(&a, false).unwrap(), canonicalize(&b, false).unwrap());
    }

    #[test]
    fn test_map_becomes_sorted_pairs() {
        let cell = Cell::from_json(&json!({"b": 2, "a": [1, 2]}));
        let canonical = canonicalize(&cell, true).unwrap();
        assert_eq!(
            canonical,
            CanonicalValue::Tuple(vec![
                CanonicalValue::Tuple(vec![
                    CanonicalValue::Text("a".to_string()),
                    CanonicalValue::Tuple(vec![CanonicalValue::Int(1), CanonicalValue::Int(2)]),
                ]),
                CanonicalValue::Tuple(vec![
                    CanonicalValue::Text("b".to_string()),
                    CanonicalValue::Int(2),
                ]),
            ])
        );
    }

    #[test]
    fn test_path_is_unhashable() {
        let path = Cell::Path(vec![Cell::Int(1), Cell::Int(2)]);
        let err = canonicalize(&path, true).unwrap_err();
        assert!(matches!(err, EvalError::UnhashableValue(_)));

        let nested = Cell::List(vec![path]);
        assert!(canonicalize(&nested, true).is_err());
    }

    #[test]
    fn test_float_normalization() {
        assert_eq!(CanonicalValue::float(-0.0), CanonicalValue::float(0.0));
        assert_eq!(CanonicalValue::float(f64::NAN), CanonicalValue::float(-f64::NAN));
        assert_ne!(CanonicalValue::float(1.0), CanonicalValue::Int(1));
    }

    #[test]
    fn test_mixed_type_order_is_total() {
        let mut values = vec![
            CanonicalValue::Text("1".to_string()),
            CanonicalValue::Int(1),
            CanonicalValue::Null,
            CanonicalValue::float(0.5),
        ];
        sort_canonical(&mut values);
        let mut reversed = values.clone();
        reversed.reverse();
        sort_canonical(&mut reversed);
        assert_eq!(values, reversed);
        // "1" renders the same for both; the type tag breaks the tie
        let int_pos = values.iter().position(|v| *v == CanonicalValue::Int(1)).unwrap();
        let text_pos = values
            .iter()
            .position(|v| *v == CanonicalValue::Text("1".to_string()))
            .unwrap();
        assert!(int_pos < text_pos);
    }
}
