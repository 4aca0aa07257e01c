//! Relation Normalizer
//!
//! Turns executor rows (column name -> cell) into canonical tuples and
//! computes the coarse per-row fingerprints used to reject obviously
//! different results before the permutation search.

use crate::error::{EvalError, Result};
use crate::value::{canonicalize, sort_canonical, CanonicalValue, Cell};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};

/// Canonicalized row, in canonical column order
pub type CanonicalRow = Vec<CanonicalValue>;

/// One result row: column names paired with cells, in the order the
/// executor returned them
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    columns: Vec<(String, Cell)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, cell: impl Into<Cell>) -> Self {
        self.insert(name, cell);
        self
    }

    /// Insert or replace a column
    pub fn insert(&mut self, name: impl Into<String>, cell: impl Into<Cell>) {
        let name = name.into();
        let cell = cell.into();
        match self.columns.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = cell,
            None => self.columns.push((name, cell)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Cell> {
        self.columns.iter().find(|(n, _)| n == name).map(|(_, c)| c)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Cell)> {
        self.columns.iter().map(|(n, c)| (n.as_str(), c))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Build a row from a JSON object
    pub fn from_json(value: &Value) -> Result<Row> {
        let object = value.as_object().ok_or_else(|| {
            EvalError::SchemaMismatch(format!("expected a JSON object per row, got {}", value))
        })?;
        Ok(object
            .iter()
            .map(|(k, v)| (k.clone(), Cell::from_json(v)))
            .collect())
    }
}

impl<K: Into<String>> FromIterator<(K, Cell)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, Cell)>>(iter: I) -> Self {
        let mut row = Row::new();
        for (name, cell) in iter {
            row.insert(name, cell);
        }
        row
    }
}

/// Parse a JSON array of row objects
pub fn rows_from_json(value: &Value) -> Result<Vec<Row>> {
    let items = value.as_array().ok_or_else(|| {
        EvalError::SchemaMismatch("expected a JSON array of row objects".to_string())
    })?;
    items.iter().map(Row::from_json).collect()
}

/// How the canonical column order of a relation is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnOrder {
    /// Column names sorted lexicographically
    #[default]
    Sorted,
    /// Column names in the order the first row lists them
    FirstRow,
}

/// Canonicalize a relation into tuples.
///
/// Every row must carry exactly the column set of the first row.
pub fn to_canonical_rows(
    rows: &[Row],
    order: ColumnOrder,
    unorder_nested_lists: bool,
) -> Result<Vec<CanonicalRow>> {
    let Some(first) = rows.first() else {
        return Ok(Vec::new());
    };

    let mut columns: Vec<&str> = first.column_names().collect();
    if order == ColumnOrder::Sorted {
        columns.sort_unstable();
    }
    let expected: BTreeSet<&str> = columns.iter().copied().collect();

    let mut canonical = Vec::with_capacity(rows.len());
    for (idx, row) in rows.iter().enumerate() {
        let actual: BTreeSet<&str> = row.column_names().collect();
        if actual != expected {
            return Err(EvalError::SchemaMismatch(format!(
                "row {} has columns {:?}, expected {:?}",
                idx, actual, expected
            )));
        }

        let mut tuple = Vec::with_capacity(columns.len());
        for name in &columns {
            // presence checked above
            let cell = row.get(name).unwrap_or(&Cell::Null);
            tuple.push(canonicalize(cell, unorder_nested_lists)?);
        }
        canonical.push(tuple);
    }

    Ok(canonical)
}

/// Sort a row's own cells by the mixed-type order.
///
/// Loses column identity, so it can only ever be used to reject.
pub fn fingerprint_row(row: &[CanonicalValue]) -> CanonicalRow {
    let mut fingerprint = row.to_vec();
    sort_canonical(&mut fingerprint);
    fingerprint
}

/// Fast necessary condition for equivalence.
///
/// Returns `true` when the fingerprints agree (as an ordered list if
/// `order_matters`, as a multiset otherwise), i.e. the pair may still be
/// equivalent. A `false` answer is final.
pub fn quick_check(rel1: &[CanonicalRow], rel2: &[CanonicalRow], order_matters: bool) -> bool {
    if rel1.len() != rel2.len() {
        return false;
    }

    let fp1 = rel1.iter().map(|r| fingerprint_row(r));
    let fp2 = rel2.iter().map(|r| fingerprint_row(r));

    if order_matters {
        return fp1.eq(fp2);
    }

    multiset_eq(fp1, fp2)
}

/// Bag equality through a count map: O(n) after hashing.
pub fn multiset_eq<T, A, B>(left: A, right: B) -> bool
where
    T: std::hash::Hash + Eq,
    A: IntoIterator<Item = T>,
    B: IntoIterator<Item = T>,
{
    let mut counts: HashMap<T, i64> = HashMap::new();
    let mut left_len = 0usize;
    for item in left {
        *counts.entry(item).or_insert(0) += 1;
        left_len += 1;
    }

    let mut right_len = 0usize;
    for item in right {
        right_len += 1;
        match counts.get_mut(&item) {
            Some(count) if *count > 0 => *count -= 1,
            _ => return false,
        }
    }

    left_len == right_len
}
