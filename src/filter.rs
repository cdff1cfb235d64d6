//! Predicate filtered iteration over the façades of a table.

use std::collections::HashMap;
use std::iter::FusedIterator;
use std::sync::Arc;
use std::vec;

use tracing::debug;

use crate::error::{Result, TableError};
use crate::expression::{ComparisonOp, Expr, Predicate};
use crate::index::{ColumnIndex, RangeOp};
use crate::store::RowStore;
use crate::table::Table;
use crate::tuple::Tuple;
use crate::value::Value;

/// How a [FilteredTuples] finds its rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Strategy {
    /// Every valid row is tested against the predicate.
    LinearScan,
    /// Candidate rows come from the index on `column`.
    Index { column: String },
}

#[derive(Debug)]
enum Source {
    Scan { next: usize },
    Candidates(vec::IntoIter<usize>),
}

#[derive(Debug, Clone, Copy)]
enum Lookup {
    Eq,
    Range(RangeOp),
}

/// A conjunct of the predicate that an index can answer.
struct IndexPlan<'a> {
    index: &'a ColumnIndex,
    lookup: Lookup,
    key: Value,
}

impl IndexPlan<'_> {
    fn strategy(&self) -> Strategy {
        Strategy::Index {
            column: self.index.column().to_owned(),
        }
    }

    fn rows(&self) -> Vec<usize> {
        let rows = match self.lookup {
            Lookup::Eq => self.index.rows_eq(&self.key),
            Lookup::Range(op) => self.index.rows_in_range(op, &self.key),
        };
        rows.into_iter().collect()
    }
}

/// Lazy iterator over the façades of the rows matching a predicate.
///
/// Created by [Table::tuples] and [Table::select]. Rows come out in
/// ascending order with either strategy. Nothing is read until the first
/// call to `next`: the predicate is then validated against the schema and
/// the rows are located from the table as it is at that point. Every
/// candidate row is tested against the whole predicate, so index and scan
/// agree. An error is yielded once and ends the iteration.
#[derive(Debug)]
pub struct FilteredTuples {
    table: Table,
    predicate: Option<Predicate>,
    strategy: Strategy,
    /// `None` until the first call to `next`.
    source: Option<Source>,
    done: bool,
}

impl FilteredTuples {
    pub(crate) fn new(table: Table, predicate: Option<Predicate>) -> Self {
        let strategy = match &predicate {
            Some(predicate) => {
                let store = table.store();
                let indices = table.indices();
                plan_index(&store, &indices, table.config().index_threshold, predicate)
                    .map_or(Strategy::LinearScan, |plan| plan.strategy())
            }
            None => Strategy::LinearScan,
        };
        Self {
            table,
            predicate,
            strategy,
            source: None,
            done: false,
        }
    }

    /// The strategy serving this iterator.
    ///
    /// Before the first call to `next` this is the choice the table would
    /// make now. It is made again when iteration starts and may change if
    /// rows or indices changed in between.
    pub fn strategy(&self) -> &Strategy {
        &self.strategy
    }

    /// Validates the predicate and locates the rows to visit.
    fn open(&self, store: &RowStore) -> Result<(Strategy, Source)> {
        let scan = (Strategy::LinearScan, Source::Scan { next: 0 });
        let Some(predicate) = &self.predicate else {
            return Ok(scan);
        };
        predicate.check_columns(&store.schema)?;
        predicate.check_types(&store.schema)?;

        let indices = self.table.indices();
        let threshold = self.table.config().index_threshold;
        let opened = match plan_index(store, &indices, threshold, predicate) {
            Some(plan) => (plan.strategy(), Source::Candidates(plan.rows().into_iter())),
            None => scan,
        };
        debug!(
            table = %self.table.name(),
            strategy = ?opened.0,
            predicate = %predicate,
            "filtering tuples"
        );
        Ok(opened)
    }

    /// Finds the next matching valid row.
    fn next_row(&mut self) -> Result<Option<usize>> {
        let store = self.table.store();
        if self.source.is_none() {
            let (strategy, source) = self.open(&store)?;
            self.strategy = strategy;
            self.source = Some(source);
        }
        let Some(source) = self.source.as_mut() else {
            return Ok(None);
        };

        loop {
            let row = match source {
                Source::Scan { next } => {
                    let Some(row) = (*next..store.capacity()).find(|&row| store.is_valid_row(row))
                    else {
                        *next = store.capacity();
                        return Ok(None);
                    };
                    *next = row + 1;
                    row
                }
                Source::Candidates(rows) => {
                    let Some(row) = rows.next() else {
                        return Ok(None);
                    };
                    if !store.is_valid_row(row) {
                        continue;
                    }
                    row
                }
            };

            match &self.predicate {
                Some(predicate) => {
                    if predicate.evaluate_row(&store, row)? {
                        return Ok(Some(row));
                    }
                }
                None => return Ok(Some(row)),
            }
        }
    }

    fn fail(&mut self, err: TableError) -> Option<Result<Arc<Tuple>>> {
        self.done = true;
        Some(Err(err))
    }
}

impl Iterator for FilteredTuples {
    type Item = Result<Arc<Tuple>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            // the store lock is released before the manager is called
            let row = match self.next_row() {
                Ok(Some(row)) => row,
                Ok(None) => {
                    self.done = true;
                    return None;
                }
                Err(err) => return self.fail(err),
            };
            match self.table.tuple(row) {
                Ok(tuple) => return Some(Ok(tuple)),
                // removed by another thread in between
                Err(TableError::InvalidRow { .. }) => continue,
                Err(err) => return self.fail(err),
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match &self.source {
            _ if self.done => (0, Some(0)),
            Some(Source::Candidates(rows)) => (0, Some(rows.len())),
            Some(Source::Scan { .. }) | None => (0, None),
        }
    }
}

impl FusedIterator for FilteredTuples {}

/// Picks an index to narrow `predicate`, if the table is large enough and
/// one of the predicate's conjuncts compares an indexed column with a
/// literal of a compatible type.
fn plan_index<'a>(
    store: &RowStore,
    indices: &'a HashMap<String, ColumnIndex>,
    threshold: usize,
    predicate: &Predicate,
) -> Option<IndexPlan<'a>> {
    if store.row_count() < threshold {
        return None;
    }
    predicate.expr().conjuncts().into_iter().find_map(|conjunct| {
        let Expr::Comparison { column, op, value } = conjunct else {
            return None;
        };
        let index = indices.get(column)?;
        let key = index.key_for(value)?;
        let lookup = match op {
            ComparisonOp::Eq => Lookup::Eq,
            ComparisonOp::Lt => Lookup::Range(RangeOp::Lt),
            ComparisonOp::Le => Lookup::Range(RangeOp::Le),
            ComparisonOp::Gt => Lookup::Range(RangeOp::Gt),
            ComparisonOp::Ge => Lookup::Range(RangeOp::Ge),
            ComparisonOp::Ne => return None,
        };
        Some(IndexPlan { index, lookup, key })
    })
}
