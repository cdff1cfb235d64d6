//! Errors raised by tables, tuples and predicates.

use thiserror::Error;

use crate::data_type::DataType;
use crate::tuple::{TupleKind, TupleState};
use crate::value::Value;

/// Result type for table operations.
pub type Result<T> = std::result::Result<T, TableError>;

/// Errors that can occur while reading, writing or querying a table.
#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum TableError {
    /// A column name does not exist in the table schema.
    #[error("column {column:?} does not exist")]
    UnknownColumn { column: String },

    /// A column name appears twice in a schema.
    #[error("column {column:?} is declared more than once")]
    DuplicateColumn { column: String },

    /// A value does not fit the column it is written to.
    #[error("value {value} does not fit column {column:?} of type {expected}")]
    TypeMismatch {
        column: String,
        expected: DataType,
        value: Value,
    },

    /// The number of values does not match the number of columns.
    #[error("row has {found} values while the table has {expected} columns")]
    ArityMismatch { expected: usize, found: usize },

    /// The row index does not address a valid row.
    #[error("row {row} is not a valid row")]
    InvalidRow { row: usize },

    /// Two values of unrelated types were compared by a predicate.
    #[error("cannot compare {left} with {right}")]
    IncomparableValues { left: Value, right: Value },

    /// A predicate compares a column with a literal of an unrelated type.
    #[error("cannot compare column {column:?} of type {data_type} with {value}")]
    IncomparableLiteral {
        column: String,
        data_type: DataType,
        value: Value,
    },

    /// The column type cannot back an index.
    #[error("column {column:?} of type {data_type} cannot be indexed")]
    UnindexableColumn { column: String, data_type: DataType },

    /// A donated tuple does not satisfy the manager's declared tuple kind.
    #[error("tuple of kind {found:?} is incompatible with declared kind {expected:?}")]
    IncompatibleTuple { expected: TupleKind, found: TupleKind },

    /// A donated tuple is not in the unbound state.
    #[error("tuple must be unbound, found {state:?}")]
    TupleNotUnbound { state: TupleState },

    /// A tuple was read after its row was invalidated.
    #[error("tuple for row {row} is stale")]
    StaleTuple { row: usize },

    /// A tuple was read before it was bound to any row.
    #[error("tuple is not bound to a row")]
    UnboundTuple,

    /// The table a tuple was bound to has been dropped.
    #[error("the table backing this tuple no longer exists")]
    TableDropped,

    /// A donated tuple was not consumed by the creation hook of its row.
    #[error("amended tuple was not bound to the new row {row}")]
    AmendmentLost { row: usize },

    /// A predicate could not be parsed.
    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl TableError {
    /// Creates an unknown column error.
    pub fn unknown_column(column: impl Into<String>) -> Self {
        Self::UnknownColumn {
            column: column.into(),
        }
    }

    /// Creates a type mismatch error.
    pub fn type_mismatch(column: impl Into<String>, expected: DataType, value: Value) -> Self {
        Self::TypeMismatch {
            column: column.into(),
            expected,
            value,
        }
    }

    /// Returns true if the error rejects a caller supplied argument without
    /// any state having been mutated.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(
            self,
            Self::IncompatibleTuple { .. } | Self::TupleNotUnbound { .. }
        )
    }

    /// Returns true if the error reports access through an invalidated tuple.
    pub fn is_stale(&self) -> bool {
        matches!(self, Self::StaleTuple { .. } | Self::TableDropped)
    }
}

/// Errors raised while tokenizing or parsing a predicate.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("unexpected character {0:?} at offset {1}")]
    UnexpectedChar(char, usize),

    #[error("unterminated string literal starting at offset {0}")]
    UnterminatedString(usize),

    #[error("unterminated column reference starting at offset {0}")]
    UnterminatedColumn(usize),

    #[error("invalid number literal {0:?}")]
    InvalidNumber(String),

    #[error("expected {expected}, found {found}")]
    Unexpected { expected: String, found: String },

    #[error("unexpected trailing input: {0}")]
    TrailingInput(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_argument_classification() {
        let err = TableError::IncompatibleTuple {
            expected: TupleKind::Node,
            found: TupleKind::Edge,
        };
        assert!(err.is_invalid_argument());
        let err = TableError::TupleNotUnbound {
            state: TupleState::Bound { row: 3 },
        };
        assert!(err.is_invalid_argument());
        assert!(!TableError::unknown_column("x").is_invalid_argument());
    }

    #[test]
    fn test_stale_classification() {
        assert!(TableError::StaleTuple { row: 1 }.is_stale());
        assert!(TableError::TableDropped.is_stale());
        assert!(!TableError::UnboundTuple.is_stale());
    }

    #[test]
    fn test_error_display() {
        let err = TableError::type_mismatch("age", DataType::Int, Value::Text("x".into()));
        assert_eq!(
            err.to_string(),
            "value 'x' does not fit column \"age\" of type INT"
        );

        let err: TableError = ParseError::UnterminatedString(4).into();
        assert_eq!(
            err.to_string(),
            "unterminated string literal starting at offset 4"
        );
    }
}
