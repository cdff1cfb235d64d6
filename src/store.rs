//! Columnar row storage with slot recycling.
//!
//! Rows live in fixed slots: removing a row clears its validity bit and
//! queues the slot for reuse, so row indices of surviving rows never move.

use std::collections::BTreeSet;

use bitvec::prelude::*;

use crate::column::Column;
use crate::data_type::DataType;
use crate::error::{Result, TableError};
use crate::value::Value;

/// Column definition in the schema
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub name: String,
    pub data_type: DataType,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Schema {
    pub columns: Vec<ColumnDef>,
}

impl Schema {
    pub fn new(columns: Vec<ColumnDef>) -> Self {
        Self { columns }
    }

    /// Appends a column definition, builder style.
    pub fn with_column(mut self, name: impl Into<String>, data_type: DataType) -> Self {
        self.columns.push(ColumnDef::new(name, data_type));
        self
    }

    /// Returns the position of the column called `name`.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Returns the declared type of the column called `name`.
    pub fn data_type(&self, name: &str) -> Option<DataType> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.data_type)
    }

    fn validate(&self) -> Result<()> {
        let mut seen = BTreeSet::new();
        for column in &self.columns {
            if !seen.insert(column.name.as_str()) {
                return Err(TableError::DuplicateColumn {
                    column: column.name.clone(),
                });
            }
        }
        Ok(())
    }
}

/// The physical row store behind a [crate::Table].
#[derive(Debug)]
pub struct RowStore {
    pub schema: Schema,
    columns: Vec<Column>,
    /// A `true` bit marks a slot holding a live row.
    valid: BitVec,
    /// Invalid slots waiting to be reused, lowest first.
    free: BTreeSet<usize>,
    row_count: usize,
}

impl RowStore {
    pub fn new(schema: Schema) -> Result<Self> {
        schema.validate()?;
        let columns = schema
            .columns
            .iter()
            .map(|column| Column::new(column.name.clone(), column.data_type))
            .collect();
        Ok(Self {
            schema,
            columns,
            valid: bitvec!(),
            free: BTreeSet::new(),
            row_count: 0,
        })
    }

    /// Allocates a row and returns its index.
    ///
    /// The lowest free slot is reused if there is one, otherwise a slot is
    /// appended. Every value of the new row is `NULL`.
    pub fn add_row(&mut self) -> usize {
        let row = match self.free.pop_first() {
            Some(row) => {
                for column in &mut self.columns {
                    column.reset(row);
                }
                self.valid.set(row, true);
                row
            }
            None => {
                let row = self.valid.len();
                for column in &mut self.columns {
                    // pushing NULL cannot fail
                    let _ = column.push(Value::Null);
                }
                self.valid.push(true);
                row
            }
        };
        self.row_count += 1;
        row
    }

    /// Invalidates a row. Returns `false` if the row was not valid.
    pub fn remove_row(&mut self, row: usize) -> bool {
        if !self.is_valid_row(row) {
            return false;
        }
        self.valid.set(row, false);
        self.free.insert(row);
        self.row_count -= 1;
        true
    }

    pub fn is_valid_row(&self, row: usize) -> bool {
        self.valid.get(row).is_some_and(|bit| *bit)
    }

    /// Number of valid rows.
    pub fn row_count(&self) -> usize {
        self.row_count
    }

    /// Number of slots, valid or not. Every valid row index is below it.
    pub fn capacity(&self) -> usize {
        self.valid.len()
    }

    /// Valid row indices in ascending order.
    pub fn rows(&self) -> impl Iterator<Item = usize> + '_ {
        self.valid.iter_ones()
    }

    pub fn get_col(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|col| col.name == name)
    }

    fn get_col_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns.iter_mut().find(|col| col.name == name)
    }

    /// Reads one cell.
    pub fn get(&self, row: usize, column: &str) -> Result<Value> {
        let col = self
            .get_col(column)
            .ok_or_else(|| TableError::unknown_column(column))?;
        if !self.is_valid_row(row) {
            return Err(TableError::InvalidRow { row });
        }
        col.get(row).ok_or(TableError::InvalidRow { row })
    }

    /// Writes one cell and returns the value it replaced.
    pub fn set(&mut self, row: usize, column: &str, value: &Value) -> Result<Value> {
        if !self.is_valid_row(row) {
            return Err(TableError::InvalidRow { row });
        }
        let col = self
            .get_col_mut(column)
            .ok_or_else(|| TableError::unknown_column(column))?;
        let previous = col.get(row).unwrap_or(Value::Null);
        col.set(row, value)?;
        Ok(previous)
    }

    /// Reads a whole row in schema order.
    pub fn get_row(&self, row: usize) -> Option<Vec<Value>> {
        if !self.is_valid_row(row) {
            return None;
        }
        self.columns
            .iter()
            .map(|col| col.get(row)) // -> Option<Value>
            .collect()
    }
}
