//! Binding caller supplied façades to new rows.
//!
//! An [AmendableTupleManager] lets a caller donate an unbound [Tuple] that
//! becomes the façade of the next row it allocates. Observers holding the
//! donated object keep seeing it: it is the one the table hands out and the
//! one announced to [crate::TupleSetListener]s.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::error::{Result, TableError};
use crate::table::{Table, TableBuilder};
use crate::tuple::{Tuple, TupleKind, TupleState};
use crate::tuple_manager::TupleFactory;

/// Creation strategy that hands out a staged tuple once, and otherwise
/// delegates to the strategy it wraps.
pub struct AmendmentSlot {
    staged: Mutex<Option<Arc<Tuple>>>,
    inner: Arc<dyn TupleFactory>,
}

impl AmendmentSlot {
    pub fn new(inner: Arc<dyn TupleFactory>) -> Self {
        Self {
            staged: Mutex::new(None),
            inner,
        }
    }

    /// Returns true if a tuple is waiting to be bound.
    pub fn is_staged(&self) -> bool {
        self.staged.lock().is_some()
    }

    /// Stages `tuple` until the returned guard is dropped.
    fn stage(&self, tuple: Arc<Tuple>) -> StagedTuple<'_> {
        *self.staged.lock() = Some(tuple);
        StagedTuple { slot: self }
    }
}

impl TupleFactory for AmendmentSlot {
    fn new_tuple(&self, kind: TupleKind, row: usize) -> Arc<Tuple> {
        if let Some(tuple) = self.staged.lock().take() {
            trace!(row, "binding donated tuple");
            return tuple;
        }
        self.inner.new_tuple(kind, row)
    }

    fn retire(&self, tuple: Arc<Tuple>) {
        self.inner.retire(tuple);
    }
}

impl std::fmt::Debug for AmendmentSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AmendmentSlot")
            .field("staged", &self.is_staged())
            .finish()
    }
}

/// Clears the slot on drop, whether or not the staged tuple was consumed.
struct StagedTuple<'a> {
    slot: &'a AmendmentSlot,
}

impl Drop for StagedTuple<'_> {
    fn drop(&mut self) {
        self.slot.staged.lock().take();
    }
}

/// A table whose row creation can adopt a caller supplied façade.
#[derive(Debug, Clone)]
pub struct AmendableTupleManager {
    table: Table,
    slot: Arc<AmendmentSlot>,
}

impl AmendableTupleManager {
    /// Builds the table described by `builder`. Rows created other than
    /// through [Self::amend] get their façades from the builder's creation
    /// strategy.
    pub fn new(builder: TableBuilder) -> Result<Self> {
        let slot = Arc::new(AmendmentSlot::new(builder.factory()));
        let table = builder.tuple_factory(slot.clone()).build()?;
        Ok(Self { table, slot })
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    /// The declared façade kind.
    pub fn kind(&self) -> TupleKind {
        self.table.tuple_manager().kind()
    }

    /// Returns the façade of a valid row.
    pub fn get_tuple(&self, row: usize) -> Result<Arc<Tuple>> {
        self.table.tuple(row)
    }

    /// Allocates a row and binds `tuple` to it as its façade.
    ///
    /// # Errors
    /// - [TableError::IncompatibleTuple] if the manager's kind does not accept
    ///   the tuple's kind.
    /// - [TableError::TupleNotUnbound] if the tuple is bound or stale.
    ///
    /// Neither allocates a row. [TableError::AmendmentLost] is returned when
    /// the row was allocated but its façade is not `tuple`, e.g. because a
    /// listener replaced the row first. Amendments on one manager run one at
    /// a time; row creation on other threads waits for the amendment in flight.
    ///
    /// # Example
    /// ```
    /// use std::sync::Arc;
    /// use tupledb::{AmendableTupleManager, DataType, Schema, Table, Tuple, TupleKind};
    ///
    /// let manager = AmendableTupleManager::new(Table::builder(
    ///     "t",
    ///     Schema::default().with_column("n", DataType::Int),
    /// ))
    /// .unwrap();
    ///
    /// let tuple = Tuple::new(TupleKind::Row);
    /// let row = manager.amend(&tuple).unwrap();
    /// assert!(Arc::ptr_eq(&manager.get_tuple(row).unwrap(), &tuple));
    /// ```
    pub fn amend(&self, tuple: &Arc<Tuple>) -> Result<usize> {
        let manager = self.table.tuple_manager();
        if !manager.kind().accepts(tuple.kind()) {
            return Err(TableError::IncompatibleTuple {
                expected: manager.kind(),
                found: tuple.kind(),
            });
        }
        ensure_unbound(tuple)?;

        let _exclusive = manager.exclusive();
        // a concurrent amendment may have bound it meanwhile
        ensure_unbound(tuple)?;

        let (row, bound) = {
            let _staged = self.slot.stage(Arc::clone(tuple));
            let row = self.table.add_row();
            (row, self.table.tuple(row)?)
        };

        if !Arc::ptr_eq(&bound, tuple) {
            return Err(TableError::AmendmentLost { row });
        }
        debug!(table = %self.table.name(), row, kind = ?tuple.kind(), "amended tuple");
        Ok(row)
    }
}

fn ensure_unbound(tuple: &Tuple) -> Result<()> {
    match tuple.state() {
        TupleState::Unbound => Ok(()),
        state => Err(TableError::TupleNotUnbound { state }),
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{self, AssertUnwindSafe};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    use super::*;
    use crate::data_type::DataType;
    use crate::store::Schema;
    use crate::table::TupleSetListener;
    use crate::tuple::GraphId;
    use crate::tuple_manager::RecyclingTuples;

    fn manager() -> AmendableTupleManager {
        AmendableTupleManager::new(Table::builder(
            "people",
            Schema::default().with_column("name", DataType::Text),
        ))
        .unwrap()
    }

    #[test]
    fn test_amend_binds_donated_tuple() {
        let manager = manager();
        manager.table().add_row();

        let tuple = Tuple::new(TupleKind::Row);
        let row = manager.amend(&tuple).unwrap();

        assert_eq!(row, 1);
        assert!(Arc::ptr_eq(&manager.get_tuple(row).unwrap(), &tuple));
        assert_eq!(tuple.state(), TupleState::Bound { row });
        assert!(tuple.is_valid());
        assert!(!manager.slot.is_staged());

        tuple.set("name", "Ada").unwrap();
        assert_eq!(tuple.get_text("name").unwrap().as_deref(), Some("Ada"));
    }

    #[test]
    fn test_amend_rejects_bound_tuple() {
        let manager = manager();
        let row = manager.table().add_row();
        let bound = manager.get_tuple(row).unwrap();

        let err = manager.amend(&bound).unwrap_err();
        assert!(err.is_invalid_argument());
        assert!(matches!(
            err,
            TableError::TupleNotUnbound {
                state: TupleState::Bound { row: 0 }
            }
        ));
        assert_eq!(manager.table().row_count(), 1);
        assert_eq!(manager.table().tuple_manager().cached_len(), 1);
    }

    #[test]
    fn test_amend_rejects_incompatible_kind() {
        let manager = AmendableTupleManager::new(
            Table::builder("nodes", Schema::default())
                .tuple_kind(TupleKind::Node)
                .graph(GraphId(7)),
        )
        .unwrap();

        let err = manager.amend(&Tuple::new(TupleKind::Edge)).unwrap_err();
        assert!(err.is_invalid_argument());
        assert_eq!(manager.table().row_count(), 0);
        assert_eq!(manager.table().tuple_manager().cached_len(), 0);

        let node = Tuple::new(TupleKind::Node);
        let row = manager.amend(&node).unwrap();
        assert_eq!(node.graph(), Some(GraphId(7)));
        assert_eq!(node.row(), Some(row));
    }

    #[test]
    fn test_row_table_accepts_graph_tuples() {
        let manager = manager();
        let edge = Tuple::new(TupleKind::Edge);
        let row = manager.amend(&edge).unwrap();
        assert_eq!(edge.kind(), TupleKind::Edge);
        assert_eq!(edge.graph(), None);
        assert!(Arc::ptr_eq(&manager.get_tuple(row).unwrap(), &edge));
    }

    #[test]
    fn test_stale_tuple_needs_reset() {
        let manager = manager();
        let tuple = Tuple::new(TupleKind::Row);
        let row = manager.amend(&tuple).unwrap();
        manager.table().remove_row(row).unwrap();

        let err = manager.amend(&tuple).unwrap_err();
        assert!(matches!(err, TableError::TupleNotUnbound { state: TupleState::Stale { .. } }));
        assert_eq!(manager.table().row_count(), 0);

        assert!(tuple.reset());
        let row = manager.amend(&tuple).unwrap();
        assert_eq!(tuple.row(), Some(row));
    }

    #[test]
    fn test_regular_rows_use_wrapped_factory() {
        let recycling = Arc::new(RecyclingTuples::new(4));
        let manager =
            AmendableTupleManager::new(Table::builder("t", Schema::default()).tuple_factory(recycling.clone()))
                .unwrap();
        let row = manager.table().add_row();
        let retired = manager.get_tuple(row).unwrap();
        manager.table().remove_row(row).unwrap();
        assert_eq!(recycling.pooled(), 1);

        let row = manager.table().add_row();
        assert!(Arc::ptr_eq(&manager.get_tuple(row).unwrap(), &retired));

        // a donated tuple takes precedence over the pool
        manager.table().remove_row(row).unwrap();
        let donated = Tuple::new(TupleKind::Row);
        let row = manager.amend(&donated).unwrap();
        assert!(Arc::ptr_eq(&manager.get_tuple(row).unwrap(), &donated));
        assert_eq!(recycling.pooled(), 1);
    }

    struct Announced(Mutex<Vec<Arc<Tuple>>>);

    impl TupleSetListener for Announced {
        fn tuples_changed(&self, _table: &Table, added: &[Arc<Tuple>], _removed: &[Arc<Tuple>]) {
            self.0.lock().extend_from_slice(added);
        }
    }

    #[test]
    fn test_listeners_see_donated_tuple() {
        let manager = manager();
        let announced = Arc::new(Announced(Mutex::new(Vec::new())));
        manager.table().add_listener(announced.clone());

        let tuple = Tuple::new(TupleKind::Row);
        manager.amend(&tuple).unwrap();

        let seen = announced.0.lock();
        assert_eq!(seen.len(), 1);
        assert!(Arc::ptr_eq(&seen[0], &tuple));
    }

    /// Removes the first row it sees added and allocates a new one in its place.
    #[derive(Default)]
    struct Replacer {
        fired: AtomicBool,
    }

    impl TupleSetListener for Replacer {
        fn tuples_changed(&self, table: &Table, added: &[Arc<Tuple>], _removed: &[Arc<Tuple>]) {
            let Some(row) = added.first().and_then(|tuple| tuple.row()) else {
                return;
            };
            if self.fired.swap(true, Ordering::SeqCst) {
                return;
            }
            assert!(table.remove_row(row).unwrap());
            assert_eq!(table.add_row(), row);
        }
    }

    #[test]
    fn test_amendment_lost_when_row_replaced() {
        let manager = manager();
        manager.table().add_listener(Arc::new(Replacer::default()));

        let tuple = Tuple::new(TupleKind::Row);
        let err = manager.amend(&tuple).unwrap_err();
        assert!(matches!(err, TableError::AmendmentLost { row: 0 }));
        assert!(!err.is_invalid_argument());
        assert!(!manager.slot.is_staged());

        // the donated tuple went stale with the row it was bound to
        assert_eq!(tuple.state(), TupleState::Stale { row: 0 });
        assert_eq!(manager.table().row_count(), 1);
        assert!(!Arc::ptr_eq(&manager.get_tuple(0).unwrap(), &tuple));
    }

    #[test]
    fn test_slot_cleared_on_unwind() {
        let manager = manager();
        let tuple = Tuple::new(TupleKind::Row);

        let unwound = panic::catch_unwind(AssertUnwindSafe(|| {
            let _staged = manager.slot.stage(Arc::clone(&tuple));
            assert!(manager.slot.is_staged());
            panic!("row allocation failed");
        }));
        assert!(unwound.is_err());
        assert!(!manager.slot.is_staged());

        // the next plain row does not adopt the abandoned tuple
        let row = manager.table().add_row();
        assert!(!Arc::ptr_eq(&manager.get_tuple(row).unwrap(), &tuple));
        assert_eq!(tuple.state(), TupleState::Unbound);
    }

    struct Panicking;

    impl TupleSetListener for Panicking {
        fn tuples_changed(&self, _table: &Table, _added: &[Arc<Tuple>], _removed: &[Arc<Tuple>]) {
            panic!("listener failed");
        }
    }

    #[test]
    fn test_manager_usable_after_panicking_listener() {
        let manager = manager();
        let listener: Arc<dyn TupleSetListener> = Arc::new(Panicking);
        manager.table().add_listener(listener.clone());

        let tuple = Tuple::new(TupleKind::Row);
        let unwound = panic::catch_unwind(AssertUnwindSafe(|| manager.amend(&tuple)));
        assert!(unwound.is_err());
        assert!(!manager.slot.is_staged());
        assert_eq!(tuple.state(), TupleState::Bound { row: 0 });

        // the creation lock was released on the way out
        assert!(manager.table().remove_listener(&listener));
        let next = Tuple::new(TupleKind::Row);
        let row = thread::scope(|s| s.spawn(|| manager.amend(&next)).join().unwrap()).unwrap();
        assert_eq!(row, 1);
        assert!(Arc::ptr_eq(&manager.get_tuple(row).unwrap(), &next));
    }

    #[test]
    fn test_concurrent_amendments() {
        let manager = manager();
        let donated: Vec<_> = (0..64).map(|_| Tuple::new(TupleKind::Row)).collect();

        let rows: Vec<usize> = thread::scope(|s| {
            let handles: Vec<_> = donated
                .chunks(8)
                .map(|chunk| {
                    let manager = &manager;
                    s.spawn(move || {
                        chunk
                            .iter()
                            .map(|tuple| {
                                // interleave plain row creation
                                let plain = manager.table().add_row();
                                manager.get_tuple(plain).unwrap();
                                manager.amend(tuple).unwrap()
                            })
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            handles
                .into_iter()
                .flat_map(|handle| handle.join().unwrap())
                .collect()
        });

        let mut distinct = rows.clone();
        distinct.sort_unstable();
        distinct.dedup();
        assert_eq!(distinct.len(), donated.len());

        for (tuple, row) in donated.iter().zip(&rows) {
            assert_eq!(tuple.row(), Some(*row));
            assert!(Arc::ptr_eq(&manager.get_tuple(*row).unwrap(), tuple));
        }
        assert_eq!(manager.table().row_count(), 128);
    }
}
