use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;
use tupledb::{
    AmendableTupleManager, DataType, Result, Schema, Table, TableConfig, Tuple, TupleKind, Value,
};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let manager = AmendableTupleManager::new(
        Table::builder(
            "users",
            Schema::default()
                .with_column("id", DataType::Int)
                .with_column("name", DataType::Text)
                .with_column("age", DataType::Int)
                .with_column("active", DataType::Bool),
        )
        .config(TableConfig::from_env()),
    )?;
    let table = manager.table();

    for i in 0..400 {
        table.insert(vec![
            Value::Int(i),
            Value::Text(Arc::from(format!("user{i}").as_str())),
            Value::Int(i % 100),
            Value::Bool(i % 2 == 0),
        ])?;
    }

    report(table, "[age] = 42")?;
    table.index("age")?;
    report(table, "[age] = 42")?;
    report(table, "[age] < 10 AND [active]")?;

    let tuple = Tuple::new(TupleKind::Row);
    let row = manager.amend(&tuple)?;
    tuple.set("name", "donated")?;
    tuple.set("age", 42)?;
    let found = table
        .select("[name] = 'donated'")?
        .filter_map(|t| t.ok())
        .any(|t| Arc::ptr_eq(&t, &tuple));
    info!(row, found, "amended tuple");

    Ok(())
}

fn report(table: &Table, predicate: &str) -> Result<()> {
    let tuples = table.select(predicate)?;
    let strategy = tuples.strategy().clone();
    let matches = tuples.filter(|t| t.is_ok()).count();
    info!(predicate, ?strategy, matches, "filtered");
    Ok(())
}
