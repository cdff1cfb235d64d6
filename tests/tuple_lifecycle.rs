use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;
use tupledb::{
    AmendableTupleManager, DataType, GraphId, RecyclingTuples, Schema, Table, TableError, Tuple,
    TupleKind, TupleSetListener, TupleState, Value,
};

fn schema() -> Schema {
    Schema::default()
        .with_column("label", DataType::Text)
        .with_column("weight", DataType::Long)
}

#[test]
fn test_stale_tuple_reports_invalidity() {
    let table = Table::new("t", schema()).unwrap();
    let row = table
        .insert(vec!["a".into(), Value::Long(1)])
        .unwrap();
    let tuple = table.tuple(row).unwrap();
    assert_eq!(tuple.get_long("weight").unwrap(), Some(1));

    table.remove_row(row).unwrap();
    // the slot is reused by an unrelated row
    let reused = table.insert(vec!["b".into(), Value::Long(2)]).unwrap();
    assert_eq!(reused, row);

    assert!(!tuple.is_valid());
    let err = tuple.get("label").unwrap_err();
    assert!(err.is_stale());
    assert!(matches!(err, TableError::StaleTuple { row: r } if r == row));
    assert!(tuple.set("label", "c").is_err());
    assert_eq!(table.get(reused, "label").unwrap(), Value::from("b"));
}

#[test]
fn test_unbound_and_dropped_tables() {
    let tuple = Tuple::new(TupleKind::Row);
    assert!(matches!(tuple.get("label"), Err(TableError::UnboundTuple)));
    assert!(tuple.table().is_none());

    let table = Table::new("t", schema()).unwrap();
    let row = table.add_row();
    let bound = table.tuple(row).unwrap();
    drop(table);
    assert!(matches!(bound.get("label"), Err(TableError::TableDropped)));
}

#[test]
fn test_typed_accessors_check_types() {
    let table = Table::new("t", schema()).unwrap();
    let row = table.insert(vec!["a".into(), Value::Null]).unwrap();
    let tuple = table.tuple(row).unwrap();

    assert_eq!(tuple.get_long("weight").unwrap(), None);
    assert!(matches!(
        tuple.get_int("label"),
        Err(TableError::TypeMismatch { .. })
    ));
    assert!(matches!(
        tuple.get_text("height"),
        Err(TableError::UnknownColumn { .. })
    ));

    // an int literal widens into a long column
    tuple.set("weight", 5).unwrap();
    assert_eq!(tuple.get_long("weight").unwrap(), Some(5));
    assert!(tuple.set("weight", "heavy").is_err());
}

#[derive(Default)]
struct Journal {
    added: Mutex<Vec<Arc<Tuple>>>,
    removed: Mutex<Vec<Arc<Tuple>>>,
}

impl TupleSetListener for Journal {
    fn tuples_changed(&self, _table: &Table, added: &[Arc<Tuple>], removed: &[Arc<Tuple>]) {
        self.added.lock().extend_from_slice(added);
        self.removed.lock().extend_from_slice(removed);
    }
}

#[test]
fn test_graph_nodes_with_recycling_and_amendment() {
    let recycling = Arc::new(RecyclingTuples::new(16));
    let manager = AmendableTupleManager::new(
        Table::builder("nodes", schema())
            .tuple_kind(TupleKind::Node)
            .graph(GraphId(1))
            .tuple_factory(recycling.clone()),
    )
    .unwrap();
    let journal = Arc::new(Journal::default());
    manager.table().add_listener(journal.clone());

    let node = Tuple::new(TupleKind::Node);
    let row = manager.amend(&node).unwrap();
    assert_eq!(node.graph(), Some(GraphId(1)));
    assert!(Arc::ptr_eq(&journal.added.lock()[0], &node));

    manager.table().remove_row(row).unwrap();
    assert_eq!(node.state(), TupleState::Stale { row });
    assert!(Arc::ptr_eq(&journal.removed.lock()[0], &node));
    assert_eq!(recycling.pooled(), 1);

    // the pool hands the retired node to the next plain row
    let next = manager.table().add_row();
    assert_eq!(node.state(), TupleState::Bound { row: next });
    assert!(Arc::ptr_eq(&manager.get_tuple(next).unwrap(), &node));
    assert_eq!(journal.added.lock().len(), 2);

    // a recycled node is bound again, so it cannot be donated
    assert!(manager.amend(&node).unwrap_err().is_invalid_argument());
}

#[test]
fn test_concurrent_amendments_with_listeners() {
    let manager = AmendableTupleManager::new(Table::builder("t", schema())).unwrap();
    let journal = Arc::new(Journal::default());
    manager.table().add_listener(journal.clone());

    let results: Vec<(Arc<Tuple>, usize)> = thread::scope(|s| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                s.spawn(|| {
                    (0..50)
                        .map(|_| {
                            let tuple = Tuple::new(TupleKind::Row);
                            let row = manager.amend(&tuple).unwrap();
                            (tuple, row)
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

    assert_eq!(manager.table().row_count(), 200);
    assert_eq!(journal.added.lock().len(), 200);
    for (tuple, row) in &results {
        assert_eq!(tuple.row(), Some(*row));
        assert!(Arc::ptr_eq(&manager.get_tuple(*row).unwrap(), tuple));
        assert!(
            journal
                .added
                .lock()
                .iter()
                .any(|announced| Arc::ptr_eq(announced, tuple))
        );
    }
}
