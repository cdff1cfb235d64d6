//! Row to façade mapping.
//!
//! The [TupleManager] hands out exactly one live [Tuple] per row. Which
//! object becomes the façade of a new row is decided by a pluggable
//! [TupleFactory]: [FreshTuples] constructs a new one every time,
//! [RecyclingTuples] reuses façades of removed rows, and
//! [crate::amendable::AmendmentSlot] substitutes a caller donated object.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, ReentrantMutex, ReentrantMutexGuard, RwLock};
use tracing::{trace, warn};

use crate::table::TableShared;
use crate::tuple::{GraphId, Tuple, TupleKind, TupleState};

/// Creation strategy for tuple façades.
pub trait TupleFactory: Send + Sync {
    /// Creation hook: returns the instance that will become the façade of
    /// `row`. The manager binds it; an instance that is already bound is
    /// rejected and replaced by a fresh one.
    fn new_tuple(&self, kind: TupleKind, row: usize) -> Arc<Tuple>;

    /// Receives the stale façade of a removed row.
    fn retire(&self, _tuple: Arc<Tuple>) {}
}

/// Constructs a new façade for every row. Stale façades are dropped.
#[derive(Debug, Default, Clone, Copy)]
pub struct FreshTuples;

impl TupleFactory for FreshTuples {
    fn new_tuple(&self, kind: TupleKind, _row: usize) -> Arc<Tuple> {
        Tuple::new(kind)
    }
}

/// Reuses the façades of removed rows for new rows.
///
/// A holder of a retired façade will see it come back to life bound to a
/// different row. Façades reset by their holder are not reused.
#[derive(Debug)]
pub struct RecyclingTuples {
    pool: Mutex<Vec<Arc<Tuple>>>,
    capacity: usize,
}

impl RecyclingTuples {
    /// Creates a pool keeping at most `capacity` retired façades.
    pub fn new(capacity: usize) -> Self {
        Self {
            pool: Mutex::new(Vec::new()),
            capacity,
        }
    }

    /// Number of façades waiting for reuse.
    pub fn pooled(&self) -> usize {
        self.pool.lock().len()
    }
}

impl TupleFactory for RecyclingTuples {
    fn new_tuple(&self, kind: TupleKind, row: usize) -> Arc<Tuple> {
        let mut pool = self.pool.lock();
        while let Some(tuple) = pool.pop() {
            if matches!(tuple.state(), TupleState::Stale { .. }) && tuple.kind() == kind {
                trace!(row, "recycling retired tuple");
                return tuple;
            }
        }
        Tuple::new(kind)
    }

    fn retire(&self, tuple: Arc<Tuple>) {
        let mut pool = self.pool.lock();
        if pool.len() < self.capacity {
            pool.push(tuple);
        }
    }
}

/// Owns the row to façade mapping of one table.
pub struct TupleManager {
    kind: TupleKind,
    graph: Option<GraphId>,
    factory: Arc<dyn TupleFactory>,
    /// Serializes façade creation. Reentrant so that an amendment can hold
    /// it across the row allocation that runs the creation hook.
    creation: ReentrantMutex<()>,
    cache: RwLock<HashMap<usize, Arc<Tuple>>>,
}

impl TupleManager {
    pub fn new(kind: TupleKind, graph: Option<GraphId>, factory: Arc<dyn TupleFactory>) -> Self {
        Self {
            kind,
            graph,
            factory,
            creation: ReentrantMutex::new(()),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// The declared façade kind.
    pub fn kind(&self) -> TupleKind {
        self.kind
    }

    pub fn graph(&self) -> Option<GraphId> {
        self.graph
    }

    /// The cached façade of `row`, without creating one.
    pub fn cached(&self, row: usize) -> Option<Arc<Tuple>> {
        self.cache
            .read()
            .get(&row)
            .filter(|tuple| tuple.state() == TupleState::Bound { row })
            .cloned()
    }

    /// Number of cached façades.
    pub fn cached_len(&self) -> usize {
        self.cache.read().len()
    }

    /// Holds off every façade creation on other threads until dropped.
    pub(crate) fn exclusive(&self) -> ReentrantMutexGuard<'_, ()> {
        self.creation.lock()
    }

    /// Returns the façade of `row`, creating and caching it on first request.
    ///
    /// The caller guarantees `row` is valid.
    pub(crate) fn get_tuple(&self, table: &Arc<TableShared>, row: usize) -> Arc<Tuple> {
        if let Some(tuple) = self.cached(row) {
            return tuple;
        }
        let _creation = self.creation.lock();
        // another thread may have won the race
        if let Some(tuple) = self.cached(row) {
            return tuple;
        }
        let tuple = self.new_tuple(table, row);
        self.cache.write().insert(row, Arc::clone(&tuple));
        tuple
    }

    fn new_tuple(&self, table: &Arc<TableShared>, row: usize) -> Arc<Tuple> {
        let tuple = self.factory.new_tuple(self.kind, row);
        if !self.kind.accepts(tuple.kind()) {
            warn!(
                row,
                declared = ?self.kind,
                found = ?tuple.kind(),
                "tuple factory returned an incompatible tuple"
            );
            return Tuple::bound(self.kind, table, self.graph, row);
        }
        if let Err(err) = tuple.bind(table, self.graph, row) {
            warn!(row, error = %err, "tuple factory returned a tuple that cannot be bound");
            return Tuple::bound(self.kind, table, self.graph, row);
        }
        trace!(row, kind = ?tuple.kind(), "bound tuple");
        tuple
    }

    /// Drops the façade of a removed row, marking it stale.
    pub(crate) fn row_removed(&self, row: usize) -> Option<Arc<Tuple>> {
        let tuple = self.cache.write().remove(&row)?;
        tuple.invalidate();
        self.factory.retire(Arc::clone(&tuple));
        Some(tuple)
    }
}

impl std::fmt::Debug for TupleManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TupleManager")
            .field("kind", &self.kind)
            .field("graph", &self.graph)
            .field("cached", &self.cached_len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_type::DataType;
    use crate::store::Schema;
    use crate::table::Table;

    fn schema() -> Schema {
        Schema::default().with_column("n", DataType::Int)
    }

    #[test]
    fn test_same_row_same_object() {
        let table = Table::new("t", schema()).unwrap();
        let row = table.add_row();

        let first = table.tuple(row).unwrap();
        let second = table.tuple(row).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.row(), Some(row));
        assert_eq!(table.tuple_manager().cached_len(), 1);
    }

    #[test]
    fn test_lazy_registration() {
        let table = Table::new("t", schema()).unwrap();
        let row = table.add_row();

        assert!(table.tuple_manager().cached(row).is_none());
        let tuple = table.tuple(row).unwrap();
        assert!(Arc::ptr_eq(
            &table.tuple_manager().cached(row).unwrap(),
            &tuple
        ));
    }

    #[test]
    fn test_fresh_tuple_after_removal() {
        let table = Table::new("t", schema()).unwrap();
        let row = table.add_row();
        let old = table.tuple(row).unwrap();

        table.remove_row(row).unwrap();
        assert!(table.tuple_manager().cached(row).is_none());
        let reused_row = table.add_row();
        let new = table.tuple(reused_row).unwrap();

        assert_eq!(reused_row, row);
        assert!(!Arc::ptr_eq(&old, &new));
        assert_eq!(old.state(), TupleState::Stale { row });
    }

    #[test]
    fn test_recycling_rebinds_retired_tuple() {
        let factory = Arc::new(RecyclingTuples::new(8));
        let table = Table::builder("t", schema())
            .tuple_factory(factory.clone())
            .build()
            .unwrap();
        let first = table.add_row();
        let second = table.add_row();
        let retired = table.tuple(first).unwrap();

        table.remove_row(first).unwrap();
        assert_eq!(factory.pooled(), 1);

        // the next façade created, for any row, is the retired one
        let tuple = table.tuple(second).unwrap();
        assert!(Arc::ptr_eq(&tuple, &retired));
        assert_eq!(retired.state(), TupleState::Bound { row: second });
        assert_eq!(factory.pooled(), 0);
    }

    #[test]
    fn test_recycling_skips_reset_tuples() {
        let factory = Arc::new(RecyclingTuples::new(8));
        let table = Table::builder("t", schema())
            .tuple_factory(factory.clone())
            .build()
            .unwrap();
        let row = table.add_row();
        let retired = table.tuple(row).unwrap();
        table.remove_row(row).unwrap();
        assert!(retired.reset());

        let row = table.add_row();
        let tuple = table.tuple(row).unwrap();
        assert!(!Arc::ptr_eq(&tuple, &retired));
        assert_eq!(retired.state(), TupleState::Unbound);
    }

    #[test]
    fn test_recycling_pool_capacity() {
        let factory = RecyclingTuples::new(1);
        factory.retire(Tuple::new(TupleKind::Row));
        factory.retire(Tuple::new(TupleKind::Row));
        assert_eq!(factory.pooled(), 1);
    }

    struct BoundFactory(Arc<Tuple>);

    impl TupleFactory for BoundFactory {
        fn new_tuple(&self, _kind: TupleKind, _row: usize) -> Arc<Tuple> {
            Arc::clone(&self.0)
        }
    }

    #[test]
    fn test_misbehaving_factory_falls_back() {
        let donor = Table::new("donor", schema()).unwrap();
        let row = donor.add_row();
        let bound = donor.tuple(row).unwrap();

        let table = Table::builder("t", schema())
            .tuple_factory(Arc::new(BoundFactory(bound.clone())))
            .build()
            .unwrap();
        let row = table.add_row();
        let tuple = table.tuple(row).unwrap();

        assert!(!Arc::ptr_eq(&tuple, &bound));
        assert_eq!(tuple.row(), Some(row));
        assert!(Arc::ptr_eq(&bound.table().unwrap().tuple(0).unwrap(), &bound));
    }
}
