//! Tuple façades over table rows.
//!
//! A [Tuple] holds no data of its own. It is a handle on one row of one
//! table, handed out as an `Arc<Tuple>` so that every holder of a row's
//! façade shares the same object.

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::error::{Result, TableError};
use crate::table::{Table, TableShared};
use crate::value::Value;

/// The declared façade type of a tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TupleKind {
    /// A plain table row.
    Row,
    /// A row of a graph's node table.
    Node,
    /// A row of a graph's edge table.
    Edge,
}

impl TupleKind {
    /// Returns true if a tuple of kind `other` may stand in where `self` is
    /// declared. Node and edge tuples are table rows, so `Row` accepts every kind.
    pub fn accepts(self, other: TupleKind) -> bool {
        self == TupleKind::Row || self == other
    }
}

/// Opaque handle on the graph that owns a node or edge table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GraphId(pub u64);

/// Binding state of a tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TupleState {
    /// Never bound, or reset after going stale.
    Unbound,
    /// Bound to a live row.
    Bound { row: usize },
    /// Was bound to `row`, which has since been removed.
    Stale { row: usize },
}

#[derive(Debug)]
struct Binding {
    state: TupleState,
    table: Weak<TableShared>,
    graph: Option<GraphId>,
}

impl Binding {
    fn unbound() -> Self {
        Self {
            state: TupleState::Unbound,
            table: Weak::new(),
            graph: None,
        }
    }
}

/// A façade exposing one row's data through typed accessors.
///
/// Every accessor re-checks the binding and the row's validity, so a tuple
/// whose row was removed reports [TableError::StaleTuple] instead of reading
/// whatever now occupies the slot.
pub struct Tuple {
    kind: TupleKind,
    binding: RwLock<Binding>,
}

impl Tuple {
    /// Creates an unbound tuple, ready to be donated through
    /// [crate::AmendableTupleManager::amend].
    pub fn new(kind: TupleKind) -> Arc<Self> {
        Arc::new(Self {
            kind,
            binding: RwLock::new(Binding::unbound()),
        })
    }

    /// Creates a tuple already bound to `row`.
    pub(crate) fn bound(
        kind: TupleKind,
        table: &Arc<TableShared>,
        graph: Option<GraphId>,
        row: usize,
    ) -> Arc<Self> {
        Arc::new(Self {
            kind,
            binding: RwLock::new(Binding {
                state: TupleState::Bound { row },
                table: Arc::downgrade(table),
                graph,
            }),
        })
    }

    pub fn kind(&self) -> TupleKind {
        self.kind
    }

    pub fn state(&self) -> TupleState {
        self.binding.read().state
    }

    /// The bound row, or `None` when unbound or stale.
    pub fn row(&self) -> Option<usize> {
        match self.state() {
            TupleState::Bound { row } => Some(row),
            _ => None,
        }
    }

    /// The graph owning the bound table, if any.
    pub fn graph(&self) -> Option<GraphId> {
        self.binding.read().graph
    }

    /// The table this tuple is bound to.
    pub fn table(&self) -> Option<Table> {
        let binding = self.binding.read();
        match binding.state {
            TupleState::Bound { .. } => binding.table.upgrade().map(Table::from_shared),
            _ => None,
        }
    }

    /// Returns true if the tuple is bound and its row is still live.
    pub fn is_valid(&self) -> bool {
        self.resolve().is_ok()
    }

    /// Binds the tuple to `row`. Accepts unbound tuples, and stale ones being
    /// recycled by their manager.
    pub(crate) fn bind(
        &self,
        table: &Arc<TableShared>,
        graph: Option<GraphId>,
        row: usize,
    ) -> Result<()> {
        let mut binding = self.binding.write();
        if let TupleState::Bound { .. } = binding.state {
            return Err(TableError::TupleNotUnbound {
                state: binding.state,
            });
        }
        *binding = Binding {
            state: TupleState::Bound { row },
            table: Arc::downgrade(table),
            graph,
        };
        Ok(())
    }

    /// Marks the tuple stale after its row was removed.
    pub(crate) fn invalidate(&self) {
        let mut binding = self.binding.write();
        if let TupleState::Bound { row } = binding.state {
            binding.state = TupleState::Stale { row };
        }
    }

    /// Returns a stale tuple to the unbound state so it can be donated again.
    ///
    /// Returns `false` and does nothing unless the tuple is stale.
    pub fn reset(&self) -> bool {
        let mut binding = self.binding.write();
        if !matches!(binding.state, TupleState::Stale { .. }) {
            return false;
        }
        *binding = Binding::unbound();
        true
    }

    fn resolve(&self) -> Result<(Table, usize)> {
        let (table, row) = {
            let binding = self.binding.read();
            match binding.state {
                TupleState::Unbound => return Err(TableError::UnboundTuple),
                TupleState::Stale { row } => return Err(TableError::StaleTuple { row }),
                TupleState::Bound { row } => (binding.table.clone(), row),
            }
        };
        let table = table
            .upgrade()
            .map(Table::from_shared)
            .ok_or(TableError::TableDropped)?;
        if !table.is_valid_row(row) {
            return Err(TableError::StaleTuple { row });
        }
        Ok((table, row))
    }

    /// Reads the value of `column`.
    pub fn get(&self, column: &str) -> Result<Value> {
        let (table, row) = self.resolve()?;
        table.get(row, column).map_err(|err| match err {
            TableError::InvalidRow { row } => TableError::StaleTuple { row },
            err => err,
        })
    }

    /// Writes the value of `column`.
    pub fn set(&self, column: &str, value: impl Into<Value>) -> Result<()> {
        let (table, row) = self.resolve()?;
        table.set(row, column, value)
    }

    /// Reads an `INT` column. `NULL` reads as `None`.
    pub fn get_int(&self, column: &str) -> Result<Option<i32>> {
        self.get_typed(column, Value::as_int)
    }

    /// Reads an integer column (`INT` or `LONG`) as 64 bits. `NULL` reads as `None`.
    pub fn get_long(&self, column: &str) -> Result<Option<i64>> {
        self.get_typed(column, Value::as_long)
    }

    pub fn get_float(&self, column: &str) -> Result<Option<f64>> {
        self.get_typed(column, Value::as_float)
    }

    pub fn get_bool(&self, column: &str) -> Result<Option<bool>> {
        self.get_typed(column, Value::as_bool)
    }

    pub fn get_text(&self, column: &str) -> Result<Option<Arc<str>>> {
        self.get_typed(column, |value| match value {
            Value::Text(s) => Some(Arc::clone(s)),
            _ => None,
        })
    }

    fn get_typed<T>(&self, column: &str, extract: impl Fn(&Value) -> Option<T>) -> Result<Option<T>> {
        let value = self.get(column)?;
        if value.is_null() {
            return Ok(None);
        }
        match extract(&value) {
            Some(v) => Ok(Some(v)),
            None => {
                let (table, _) = self.resolve()?;
                let expected = table
                    .schema()
                    .data_type(column)
                    .ok_or_else(|| TableError::unknown_column(column))?;
                Err(TableError::type_mismatch(column, expected, value))
            }
        }
    }
}

impl fmt::Debug for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tuple")
            .field("kind", &self.kind)
            .field("state", &self.state())
            .finish()
    }
}
