use std::sync::Arc;

use crate::data_type::DataType;
use crate::error::{Result, TableError};
use crate::value::Value;
use bitvec::prelude::*;

/// Typed, contiguous cell storage of one column.
///
/// A slot holding `NULL` keeps a placeholder here; the null mask of the
/// owning [Column] is authoritative.
#[derive(Debug, Clone)]
pub enum ColumnData {
    Int(Vec<i32>),
    Long(Vec<i64>),
    Float(Vec<f64>),
    Text(Vec<Arc<str>>),
    /// One bit per slot.
    Bool(BitVec),
}

impl ColumnData {
    fn empty(data_type: DataType) -> Self {
        match data_type {
            DataType::Int => Self::Int(Vec::new()),
            DataType::Long => Self::Long(Vec::new()),
            DataType::Float => Self::Float(Vec::new()),
            DataType::Text => Self::Text(Vec::new()),
            DataType::Bool => Self::Bool(BitVec::new()),
        }
    }

    fn push_placeholder(&mut self) {
        match self {
            Self::Int(cells) => cells.push(0),
            Self::Long(cells) => cells.push(0),
            Self::Float(cells) => cells.push(0.0),
            Self::Text(cells) => cells.push(Arc::from("")),
            Self::Bool(cells) => cells.push(false),
        }
    }

    /// Stores a non-null value already coerced to the column type.
    /// Hands the value back if its variant does not match.
    fn write(&mut self, slot: usize, value: Value) -> std::result::Result<(), Value> {
        match (self, value) {
            (Self::Int(cells), Value::Int(v)) => cells[slot] = v,
            (Self::Long(cells), Value::Long(v)) => cells[slot] = v,
            (Self::Float(cells), Value::Float(v)) => cells[slot] = v,
            (Self::Text(cells), Value::Text(v)) => cells[slot] = v,
            (Self::Bool(cells), Value::Bool(v)) => cells.set(slot, v),
            (_, value) => return Err(value),
        }
        Ok(())
    }

    fn read(&self, slot: usize) -> Value {
        match self {
            Self::Int(cells) => Value::Int(cells[slot]),
            Self::Long(cells) => Value::Long(cells[slot]),
            Self::Float(cells) => Value::Float(cells[slot]),
            Self::Text(cells) => Value::Text(Arc::clone(&cells[slot])),
            Self::Bool(cells) => Value::Bool(cells[slot]),
        }
    }
}

/// One named, typed column of a row store, with a null mask (`true` = NULL).
#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    pub data_type: DataType,
    pub data: ColumnData,
    pub null_bitmap: BitVec,
}

impl Column {
    pub fn new(name: String, data_type: DataType) -> Self {
        Self {
            name,
            data_type,
            data: ColumnData::empty(data_type),
            null_bitmap: BitVec::new(),
        }
    }

    /// Appends a slot holding `value`.
    ///
    /// Values of another type are converted when the conversion is lossless
    /// (see [Value::coerce_to]); otherwise the column is left unchanged and
    /// [TableError::TypeMismatch] is returned.
    ///
    /// # Example
    /// ```
    /// # use tupledb::column::Column;
    /// # use tupledb::data_type::DataType;
    /// # use tupledb::value::Value;
    /// let mut col = Column::new("age".into(), DataType::Long);
    /// col.push(Value::Int(30)).unwrap();
    /// col.push(Value::Null).unwrap();
    ///
    /// assert_eq!(col.len(), 2);
    /// assert_eq!(col.get(0), Some(Value::Long(30)));
    /// assert!(col.get(1).unwrap().is_null());
    /// ```
    pub fn push(&mut self, value: Value) -> Result<()> {
        let value = self.coerce(value)?;
        self.data.push_placeholder();
        self.null_bitmap.push(true);
        let slot = self.len() - 1;
        self.store(slot, value)
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.null_bitmap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reads a slot. `None` past the end.
    pub fn get(&self, row_idx: usize) -> Option<Value> {
        match self.null_bitmap.get(row_idx).map(|bit| *bit) {
            None => None,
            Some(true) => Some(Value::Null),
            Some(false) => Some(self.data.read(row_idx)),
        }
    }

    /// Sets a slot to `NULL` when it is recycled. Slots past the end are ignored.
    pub fn reset(&mut self, row_idx: usize) {
        if row_idx < self.len() {
            self.null_bitmap.set(row_idx, true);
        }
    }

    /// Overwrites a slot. A rejected value leaves the slot untouched.
    pub fn set(&mut self, row_idx: usize, value: &Value) -> Result<()> {
        if row_idx >= self.len() {
            return Err(TableError::InvalidRow { row: row_idx });
        }
        let value = self.coerce(value.clone())?;
        self.store(row_idx, value)
    }

    fn store(&mut self, slot: usize, value: Value) -> Result<()> {
        if value.is_null() {
            // the placeholder stays, the mask wins on read
            self.null_bitmap.set(slot, true);
            return Ok(());
        }
        self.data
            .write(slot, value)
            .map_err(|value| TableError::type_mismatch(&self.name, self.data_type, value))?;
        self.null_bitmap.set(slot, false);
        Ok(())
    }

    fn coerce(&self, value: Value) -> Result<Value> {
        match value.coerce_to(self.data_type) {
            Some(v) => Ok(v),
            None => Err(TableError::type_mismatch(&self.name, self.data_type, value)),
        }
    }
}
