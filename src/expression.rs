//! Predicate expressions over table columns.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;

use crate::error::{ParseError, Result, TableError};
use crate::parser::Parser;
use crate::store::{RowStore, Schema};
use crate::tokenizer::Tokenizer;
use crate::tuple::Tuple;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl ComparisonOp {
    /// The operator with its operands swapped: `a < b` is `b > a`.
    pub fn flip(self) -> Self {
        match self {
            Self::Eq | Self::Ne => self,
            Self::Lt => Self::Gt,
            Self::Le => Self::Ge,
            Self::Gt => Self::Lt,
            Self::Ge => Self::Le,
        }
    }

    fn matches(self, ord: Ordering) -> bool {
        match self {
            Self::Eq => ord.is_eq(),
            Self::Ne => ord.is_ne(),
            Self::Lt => ord.is_lt(),
            Self::Le => ord.is_le(),
            Self::Gt => ord.is_gt(),
            Self::Ge => ord.is_ge(),
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }
}

/// A boolean expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// `TRUE` or `FALSE`.
    Literal(bool),
    /// `[column] <op> value`
    Comparison {
        column: String,
        op: ComparisonOp,
        value: Value,
    },
    And {
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Or {
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Not(Box<Expr>),
}

impl Expr {
    pub fn comparison(column: impl Into<String>, op: ComparisonOp, value: impl Into<Value>) -> Self {
        Self::Comparison {
            column: column.into(),
            op,
            value: value.into(),
        }
    }

    pub fn and(self, right: Expr) -> Self {
        Self::And {
            left: Box::new(self),
            right: Box::new(right),
        }
    }

    pub fn or(self, right: Expr) -> Self {
        Self::Or {
            left: Box::new(self),
            right: Box::new(right),
        }
    }

    pub fn negate(self) -> Self {
        Self::Not(Box::new(self))
    }

    /// The operands of a chain of `AND`s, left to right.
    pub fn conjuncts(&self) -> Vec<&Expr> {
        match self {
            Self::And { left, right } => {
                let mut conjuncts = left.conjuncts();
                conjuncts.extend(right.conjuncts());
                conjuncts
            }
            other => vec![other],
        }
    }

    fn collect_columns<'a>(&'a self, columns: &mut BTreeSet<&'a str>) {
        match self {
            Self::Literal(_) => {}
            Self::Comparison { column, .. } => {
                columns.insert(column);
            }
            Self::And { left, right } | Self::Or { left, right } => {
                left.collect_columns(columns);
                right.collect_columns(columns);
            }
            Self::Not(inner) => inner.collect_columns(columns),
        }
    }

    fn check_types(&self, schema: &Schema) -> Result<()> {
        match self {
            Self::Literal(_) => Ok(()),
            Self::Comparison { column, value, .. } => match schema.data_type(column) {
                Some(data_type) if !value.is_comparable_with_type(data_type) => {
                    Err(TableError::IncomparableLiteral {
                        column: column.clone(),
                        data_type,
                        value: value.clone(),
                    })
                }
                _ => Ok(()),
            },
            Self::And { left, right } | Self::Or { left, right } => {
                left.check_types(schema)?;
                right.check_types(schema)
            }
            Self::Not(inner) => inner.check_types(schema),
        }
    }

    /// Evaluates the expression, reading column values through `lookup`.
    ///
    /// `AND` and `OR` short-circuit.
    fn evaluate<F>(&self, lookup: &F) -> Result<bool>
    where
        F: Fn(&str) -> Result<Value>,
    {
        match self {
            Self::Literal(b) => Ok(*b),
            Self::Comparison { column, op, value } => {
                let row_value = lookup(column.as_str())?;
                compare_values(&row_value, *op, value)
            }
            Self::And { left, right } => {
                if !left.evaluate(lookup)? {
                    return Ok(false);
                }
                right.evaluate(lookup)
            }
            Self::Or { left, right } => {
                Ok(left.evaluate(lookup)? || right.evaluate(lookup)?)
            }
            Self::Not(inner) => Ok(!inner.evaluate(lookup)?),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(true) => f.write_str("TRUE"),
            Self::Literal(false) => f.write_str("FALSE"),
            Self::Comparison { column, op, value } => {
                write!(f, "[{column}] {} {value}", op.symbol())
            }
            Self::And { left, right } => write!(f, "({left} AND {right})"),
            Self::Or { left, right } => write!(f, "({left} OR {right})"),
            Self::Not(inner) => write!(f, "NOT {inner}"),
        }
    }
}

/// Compares a column value with a literal.
///
/// # NULL Semantics
/// `NULL` on either side never matches, whatever the operator.
///
/// # Errors
/// Returns [TableError::IncomparableValues] when the types belong to
/// different families (e.g. `Int` vs `Text`).
fn compare_values(left: &Value, op: ComparisonOp, right: &Value) -> Result<bool> {
    if left.is_null() || right.is_null() {
        return Ok(false);
    }
    if !left.is_comparable_with(right) {
        return Err(TableError::IncomparableValues {
            left: left.clone(),
            right: right.clone(),
        });
    }
    // NaN compares with nothing
    Ok(left.compare(right).is_some_and(|ord| op.matches(ord)))
}

/// A parsed, reusable boolean predicate over the columns of a row.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    expr: Expr,
}

impl Predicate {
    /// Parses a predicate such as `[age] >= 18 AND [name] != 'root'`.
    pub fn parse(input: &str) -> std::result::Result<Self, ParseError> {
        let tokens = Tokenizer::new(input).tokenize()?;
        let expr = Parser::new(tokens).parse()?;
        Ok(Self { expr })
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// Column names referenced by the predicate, sorted.
    pub fn columns(&self) -> BTreeSet<&str> {
        let mut columns = BTreeSet::new();
        self.expr.collect_columns(&mut columns);
        columns
    }

    /// Fails with [TableError::UnknownColumn] if a referenced column is not in `schema`.
    pub fn check_columns(&self, schema: &Schema) -> Result<()> {
        match self
            .columns()
            .into_iter()
            .find(|column| schema.column_index(column).is_none())
        {
            Some(missing) => Err(TableError::unknown_column(missing)),
            None => Ok(()),
        }
    }

    /// Fails with [TableError::IncomparableLiteral] if a literal can never be
    /// compared with the column it is matched against, e.g. `[name] = 5` on
    /// a text column. Unknown columns are left to [Predicate::check_columns].
    pub fn check_types(&self, schema: &Schema) -> Result<()> {
        self.expr.check_types(schema)
    }

    /// Evaluates the predicate against the row behind `tuple`.
    pub fn evaluate(&self, tuple: &Tuple) -> Result<bool> {
        self.expr.evaluate(&|column: &str| tuple.get(column))
    }

    /// Evaluates the predicate directly against a stored row.
    pub(crate) fn evaluate_row(&self, store: &RowStore, row: usize) -> Result<bool> {
        self.expr.evaluate(&|column: &str| store.get(row, column))
    }
}

impl From<Expr> for Predicate {
    fn from(expr: Expr) -> Self {
        Self { expr }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.expr.fmt(f)
    }
}
