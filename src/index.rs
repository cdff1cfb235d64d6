//! Ordered secondary index over one column.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;

use crate::data_type::DataType;
use crate::error::{Result, TableError};
use crate::store::RowStore;
use crate::value::Value;

/// Range operation for index queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeOp {
    Lt,
    Le,
    Gt,
    Ge,
}

/// Maps every non-null value of a column to the valid rows holding it.
///
/// `NULL` is never indexed: no comparison matches it, so leaving it out keeps
/// lookups equivalent to a scan.
#[derive(Debug, Clone)]
pub struct ColumnIndex {
    column: String,
    data_type: DataType,
    entries: BTreeMap<Value, BTreeSet<usize>>,
    len: usize,
}

impl ColumnIndex {
    /// Builds an index over the current valid rows of `column`.
    pub fn build(store: &RowStore, column: &str) -> Result<Self> {
        let col = store
            .get_col(column)
            .ok_or_else(|| TableError::unknown_column(column))?;
        if !col.data_type.is_indexable() {
            return Err(TableError::UnindexableColumn {
                column: column.to_string(),
                data_type: col.data_type,
            });
        }

        let mut index = Self {
            column: column.to_string(),
            data_type: col.data_type,
            entries: BTreeMap::new(),
            len: 0,
        };
        for row in store.rows() {
            if let Some(value) = col.get(row) {
                index.insert(value, row);
            }
        }
        Ok(index)
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Number of indexed (row, value) pairs.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn insert(&mut self, value: Value, row: usize) {
        if value.is_null() {
            return;
        }
        if self.entries.entry(value).or_default().insert(row) {
            self.len += 1;
        }
    }

    pub fn remove(&mut self, value: &Value, row: usize) {
        let Some(rows) = self.entries.get_mut(value) else {
            return;
        };
        if rows.remove(&row) {
            self.len -= 1;
        }
        if rows.is_empty() {
            self.entries.remove(value);
        }
    }

    /// Moves `row` from `old` to `new`.
    pub fn update(&mut self, old: &Value, new: Value, row: usize) {
        self.remove(old, row);
        self.insert(new, row);
    }

    /// Converts a predicate literal to this index's key type, if lossless.
    pub fn key_for(&self, literal: &Value) -> Option<Value> {
        literal
            .coerce_to(self.data_type)
            .filter(|key| !key.is_null())
    }

    /// Rows whose value equals `key`, ascending.
    pub fn rows_eq(&self, key: &Value) -> BTreeSet<usize> {
        self.entries.get(key).cloned().unwrap_or_default()
    }

    /// Rows whose value satisfies `value <op> key`, ascending.
    pub fn rows_in_range(&self, op: RangeOp, key: &Value) -> BTreeSet<usize> {
        let range = match op {
            RangeOp::Lt => (Bound::Unbounded, Bound::Excluded(key)),
            RangeOp::Le => (Bound::Unbounded, Bound::Included(key)),
            RangeOp::Gt => (Bound::Excluded(key), Bound::Unbounded),
            RangeOp::Ge => (Bound::Included(key), Bound::Unbounded),
        };
        self.entries
            .range::<Value, _>(range)
            .flat_map(|(_, rows)| rows.iter().copied())
            .collect()
    }
}
