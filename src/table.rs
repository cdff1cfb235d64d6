use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard};
use tracing::debug;

use crate::config::TableConfig;
use crate::error::{Result, TableError};
use crate::expression::Predicate;
use crate::filter::FilteredTuples;
use crate::index::ColumnIndex;
use crate::store::{RowStore, Schema};
use crate::tuple::{GraphId, Tuple, TupleKind};
use crate::tuple_manager::{FreshTuples, TupleFactory, TupleManager};
use crate::value::Value;

/// Observer of the façades entering and leaving a table.
///
/// Listeners receive the exact objects the table hands out, so a façade
/// seen here is the one later returned by [Table::tuple] for the same row.
pub trait TupleSetListener: Send + Sync {
    fn tuples_changed(&self, table: &Table, added: &[Arc<Tuple>], removed: &[Arc<Tuple>]);
}

pub(crate) struct TableShared {
    name: String,
    config: TableConfig,
    store: RwLock<RowStore>,
    indices: RwLock<HashMap<String, ColumnIndex>>,
    tuples: TupleManager,
    listeners: RwLock<Vec<Arc<dyn TupleSetListener>>>,
}

/// An in-memory table: a row store, its secondary indices and the façades
/// of its rows.
///
/// `Table` is a cheap handle; clones share the same table.
#[derive(Clone)]
pub struct Table {
    shared: Arc<TableShared>,
}

/// Builder for a [Table] with a non-default façade setup.
pub struct TableBuilder {
    name: String,
    schema: Schema,
    config: TableConfig,
    kind: TupleKind,
    graph: Option<GraphId>,
    factory: Arc<dyn TupleFactory>,
}

impl TableBuilder {
    pub fn config(mut self, config: TableConfig) -> Self {
        self.config = config;
        self
    }

    pub fn index_threshold(mut self, threshold: usize) -> Self {
        self.config.index_threshold = threshold;
        self
    }

    /// Declares the façade kind handed out for this table.
    pub fn tuple_kind(mut self, kind: TupleKind) -> Self {
        self.kind = kind;
        self
    }

    /// Marks the table as a node or edge table of `graph`.
    pub fn graph(mut self, graph: GraphId) -> Self {
        self.graph = Some(graph);
        self
    }

    /// Sets the creation strategy for façades.
    pub fn tuple_factory(mut self, factory: Arc<dyn TupleFactory>) -> Self {
        self.factory = factory;
        self
    }

    pub(crate) fn factory(&self) -> Arc<dyn TupleFactory> {
        Arc::clone(&self.factory)
    }

    pub fn build(self) -> Result<Table> {
        let store = RowStore::new(self.schema)?;
        debug!(
            table = %self.name,
            columns = store.schema.columns.len(),
            kind = ?self.kind,
            index_threshold = self.config.index_threshold,
            "created table"
        );
        Ok(Table {
            shared: Arc::new(TableShared {
                name: self.name,
                config: self.config,
                store: RwLock::new(store),
                indices: RwLock::new(HashMap::new()),
                tuples: TupleManager::new(self.kind, self.graph, self.factory),
                listeners: RwLock::new(Vec::new()),
            }),
        })
    }
}

impl Table {
    /// Creates a table of plain row tuples with the default configuration.
    pub fn new(name: impl Into<String>, schema: Schema) -> Result<Self> {
        Self::builder(name, schema).build()
    }

    pub fn builder(name: impl Into<String>, schema: Schema) -> TableBuilder {
        TableBuilder {
            name: name.into(),
            schema,
            config: TableConfig::default(),
            kind: TupleKind::Row,
            graph: None,
            factory: Arc::new(FreshTuples),
        }
    }

    pub(crate) fn from_shared(shared: Arc<TableShared>) -> Self {
        Self { shared }
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn config(&self) -> &TableConfig {
        &self.shared.config
    }

    pub fn schema(&self) -> Schema {
        self.store().schema.clone()
    }

    pub fn tuple_manager(&self) -> &TupleManager {
        &self.shared.tuples
    }

    pub(crate) fn store(&self) -> RwLockReadGuard<'_, RowStore> {
        self.shared.store.read()
    }

    pub(crate) fn indices(&self) -> RwLockReadGuard<'_, HashMap<String, ColumnIndex>> {
        self.shared.indices.read()
    }

    /// Number of valid rows.
    pub fn row_count(&self) -> usize {
        self.store().row_count()
    }

    pub fn is_valid_row(&self, row: usize) -> bool {
        self.store().is_valid_row(row)
    }

    /// Allocates a row, every value `NULL`, and returns its index.
    ///
    /// When listeners are registered the row's façade is created right away
    /// and announced to them.
    pub fn add_row(&self) -> usize {
        let row = self.shared.store.write().add_row();
        if self.has_listeners() {
            let tuple = self.shared.tuples.get_tuple(&self.shared, row);
            self.notify(&[tuple], &[]);
        }
        row
    }

    /// Inserts a full row in schema order and returns its index.
    ///
    /// Values are checked against the schema before the row is allocated, so
    /// a rejected row leaves the table untouched.
    pub fn insert(&self, values: Vec<Value>) -> Result<usize> {
        let schema = self.schema();
        if values.len() != schema.columns.len() {
            return Err(TableError::ArityMismatch {
                expected: schema.columns.len(),
                found: values.len(),
            });
        }
        for (def, value) in schema.columns.iter().zip(&values) {
            if value.coerce_to(def.data_type).is_none() {
                return Err(TableError::type_mismatch(
                    &def.name,
                    def.data_type,
                    value.clone(),
                ));
            }
        }

        let row = self.add_row();
        for (def, value) in schema.columns.iter().zip(values) {
            self.set(row, &def.name, value)?;
        }
        Ok(row)
    }

    /// Removes a row. Its façade, if one was handed out, turns stale.
    ///
    /// Returns `false` if the row was not valid.
    pub fn remove_row(&self, row: usize) -> Result<bool> {
        {
            let mut store = self.shared.store.write();
            if !store.is_valid_row(row) {
                return Ok(false);
            }
            let mut indices = self.shared.indices.write();
            for index in indices.values_mut() {
                let value = store.get(row, index.column())?;
                index.remove(&value, row);
            }
            store.remove_row(row);
        }
        if let Some(tuple) = self.shared.tuples.row_removed(row) {
            self.notify(&[], &[tuple]);
        }
        Ok(true)
    }

    /// Reads one cell.
    pub fn get(&self, row: usize, column: &str) -> Result<Value> {
        self.store().get(row, column)
    }

    /// Reads a whole row in schema order.
    pub fn get_row(&self, row: usize) -> Option<Vec<Value>> {
        self.store().get_row(row)
    }

    /// Writes one cell, keeping any index on `column` up to date.
    pub fn set(&self, row: usize, column: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        let mut store = self.shared.store.write();
        let previous = store.set(row, column, &value)?;
        if let Some(index) = self.shared.indices.write().get_mut(column) {
            let stored = store.get(row, column)?;
            index.update(&previous, stored, row);
        }
        Ok(())
    }

    /// Returns the façade of a valid row.
    ///
    /// Repeated calls for the same live row return the same object.
    pub fn tuple(&self, row: usize) -> Result<Arc<Tuple>> {
        if !self.is_valid_row(row) {
            return Err(TableError::InvalidRow { row });
        }
        Ok(self.shared.tuples.get_tuple(&self.shared, row))
    }

    /// Lazily iterates the façades of the rows matching `predicate`, or of
    /// every row when `predicate` is `None`.
    ///
    /// The iteration strategy (scan or index lookup) is picked here; the
    /// predicate is only checked against the schema on the first call to
    /// `next`.
    pub fn tuples(&self, predicate: Option<&Predicate>) -> FilteredTuples {
        FilteredTuples::new(self.clone(), predicate.cloned())
    }

    /// Parses `predicate` and iterates the matching façades.
    ///
    /// # Example
    /// ```
    /// use tupledb::{DataType, Schema, Table, Value};
    ///
    /// let table = Table::new("t", Schema::default().with_column("n", DataType::Int)).unwrap();
    /// for n in 0..10 {
    ///     table.insert(vec![Value::Int(n % 3)]).unwrap();
    /// }
    ///
    /// let matches = table.select("[n] = 1").unwrap().count();
    /// assert_eq!(matches, 3);
    /// ```
    pub fn select(&self, predicate: &str) -> Result<FilteredTuples> {
        let predicate = Predicate::parse(predicate)?;
        Ok(self.tuples(Some(&predicate)))
    }

    /// Builds an index on `column`. Does nothing if one already exists.
    pub fn index(&self, column: &str) -> Result<()> {
        let store = self.store();
        let mut indices = self.shared.indices.write();
        if indices.contains_key(column) {
            return Ok(());
        }
        let index = ColumnIndex::build(&store, column)?;
        debug!(
            table = %self.shared.name,
            column,
            entries = index.len(),
            "built index"
        );
        indices.insert(column.to_string(), index);
        Ok(())
    }

    /// Drops the index on `column`. Returns `false` if there was none.
    pub fn drop_index(&self, column: &str) -> bool {
        let dropped = self.shared.indices.write().remove(column).is_some();
        if dropped {
            debug!(table = %self.shared.name, column, "dropped index");
        }
        dropped
    }

    pub fn has_index(&self, column: &str) -> bool {
        self.indices().contains_key(column)
    }

    pub fn add_listener(&self, listener: Arc<dyn TupleSetListener>) {
        self.shared.listeners.write().push(listener);
    }

    /// Unregisters `listener`. Returns `false` if it was not registered.
    pub fn remove_listener(&self, listener: &Arc<dyn TupleSetListener>) -> bool {
        let mut listeners = self.shared.listeners.write();
        let before = listeners.len();
        listeners.retain(|l| !Arc::ptr_eq(l, listener));
        listeners.len() != before
    }

    fn has_listeners(&self) -> bool {
        !self.shared.listeners.read().is_empty()
    }

    fn notify(&self, added: &[Arc<Tuple>], removed: &[Arc<Tuple>]) {
        // listeners may call back into the table
        let listeners = self.shared.listeners.read().clone();
        for listener in listeners {
            listener.tuples_changed(self, added, removed);
        }
    }
}

impl std::fmt::Debug for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Table")
            .field("name", &self.shared.name)
            .field("rows", &self.row_count())
            .field("tuples", &self.shared.tuples)
            .finish()
    }
}
