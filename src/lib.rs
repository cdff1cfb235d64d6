pub mod amendable;
pub mod column;
pub mod config;
pub mod data_type;
pub mod error;
pub mod expression;
pub mod filter;
pub mod index;
pub mod parser;
pub mod store;
pub mod table;
pub mod tokenizer;
pub mod tuple;
pub mod tuple_manager;
pub mod value;

pub use amendable::AmendableTupleManager;
pub use column::Column;
pub use config::TableConfig;
pub use data_type::DataType;
pub use error::{ParseError, Result, TableError};
pub use expression::{ComparisonOp, Expr, Predicate};
pub use filter::{FilteredTuples, Strategy};
pub use store::{ColumnDef, Schema};
pub use table::{Table, TableBuilder, TupleSetListener};
pub use tuple::{GraphId, Tuple, TupleKind, TupleState};
pub use tuple_manager::{FreshTuples, RecyclingTuples, TupleFactory, TupleManager};
pub use value::Value;
