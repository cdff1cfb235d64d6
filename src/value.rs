use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use crate::data_type::DataType;

/// Represents a single data value stored in a table cell.
///
/// This enum wraps all supported Rust types into a single type that can be
/// passed around the engine. It includes support for `NULL` values.
///
/// `Value` is totally ordered so it can key an index: `NULL` sorts first,
/// then booleans, integers (`Int` and `Long` compared numerically), floats
/// (by [f64::total_cmp]) and finally text. Predicates do not use this order
/// directly, see [Value::compare].
#[derive(Debug, Clone)]
pub enum Value {
    /// represents an empty or missing value.
    Null,
    /// A 32-bit signed integer value.
    Int(i32),
    /// A 64-bit signed integer value.
    Long(i64),
    /// A 64-bit floating-point value.
    Float(f64),
    /// A UTF-8 string value, wrapped in an [Arc] for efficient,
    /// thread-safe sharing and cheap cloning.
    Text(Arc<str>),
    /// A boolean value.
    Bool(bool),
}

impl Value {
    /// Returns `true` if the value is [Value::Null].
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the inner integer value if this is a [Value::Int].
    /// Otherwise, returns `None`.
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the value as a 64-bit integer if this is a [Value::Int] or a [Value::Long].
    pub fn as_long(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(i64::from(*i)),
            Self::Long(l) => Some(*l),
            _ => None,
        }
    }

    /// Returns the inner float value if this is a [Value::Float].
    /// Otherwise, returns `None`.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Returns a reference to the inner string slice if this is a [Value::Text].
    /// Otherwise, returns `None`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the inner boolean value if this is a [Value::Bool].
    /// Otherwise, returns `None`.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the logical [DataType] corresponding to this value.
    ///
    /// Returns `None` if the value is [Value::Null], because a standalone
    /// NULL value is untyped until it is placed in a column.
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Self::Null => None,
            Self::Int(_) => Some(DataType::Int),
            Self::Long(_) => Some(DataType::Long),
            Self::Float(_) => Some(DataType::Float),
            Self::Text(_) => Some(DataType::Text),
            Self::Bool(_) => Some(DataType::Bool),
        }
    }

    /// Converts the value to `target` without losing information.
    ///
    /// Only numeric conversions are attempted: `Int` widens to `Long` and
    /// `Float`, `Long` narrows to `Int` when it fits, and an integral float
    /// converts to an integer type when it is in range. `NULL` converts to
    /// any type. Returns `None` when no lossless conversion exists.
    pub fn coerce_to(&self, target: DataType) -> Option<Value> {
        match (self, target) {
            (Self::Null, _) => Some(Self::Null),
            (v, t) if v.data_type() == Some(t) => Some(v.clone()),
            (Self::Int(i), DataType::Long) => Some(Self::Long(i64::from(*i))),
            (Self::Int(i), DataType::Float) => Some(Self::Float(f64::from(*i))),
            (Self::Long(l), DataType::Int) => i32::try_from(*l).ok().map(Self::Int),
            (Self::Long(l), DataType::Float) => {
                let f = *l as f64;
                (compare_long_float(*l, f) == Some(Ordering::Equal)).then_some(Self::Float(f))
            }
            (Self::Float(f), DataType::Int | DataType::Long) => {
                if !f.is_finite() || f.fract() != 0.0 {
                    return None;
                }
                let l = *f as i64;
                if compare_long_float(l, *f) != Some(Ordering::Equal) {
                    return None;
                }
                Self::Long(l).coerce_to(target)
            }
            _ => None,
        }
    }

    /// Returns true if `self` and `other` belong to the same comparison
    /// family: numbers with numbers, text with text, booleans with booleans.
    /// `NULL` is comparable with everything.
    pub fn is_comparable_with(&self, other: &Value) -> bool {
        match (self.family(), other.family()) {
            (Family::Null, _) | (_, Family::Null) => true,
            (a, b) => a == b,
        }
    }

    /// Returns true if the value can be compared with the cells of a column
    /// of type `data_type`. `NULL` is comparable with every column.
    pub fn is_comparable_with_type(&self, data_type: DataType) -> bool {
        match self.family() {
            Family::Null => true,
            family => family == Family::of_type(data_type),
        }
    }

    /// Compares two values the way predicates do.
    ///
    /// Numbers compare by value across `Int`, `Long` and `Float`. Returns
    /// `None` when either side is `NULL`, when the values are not comparable,
    /// or when a float comparison involves NaN.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Self::Text(l), Self::Text(r)) => Some(l.cmp(r)),
            (Self::Bool(l), Self::Bool(r)) => Some(l.cmp(r)),
            (Self::Float(l), Self::Float(r)) => l.partial_cmp(r),
            (Self::Float(l), r) => r
                .as_long()
                .and_then(|r| compare_long_float(r, *l))
                .map(Ordering::reverse),
            (l, Self::Float(r)) => l.as_long().and_then(|l| compare_long_float(l, *r)),
            (l, r) => match (l.as_long(), r.as_long()) {
                (Some(l), Some(r)) => Some(l.cmp(&r)),
                _ => None,
            },
        }
    }

    fn family(&self) -> Family {
        match self {
            Self::Null => Family::Null,
            Self::Int(_) | Self::Long(_) | Self::Float(_) => Family::Number,
            Self::Text(_) => Family::Text,
            Self::Bool(_) => Family::Bool,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Null => 0,
            Self::Bool(_) => 1,
            Self::Int(_) | Self::Long(_) => 2,
            Self::Float(_) => 3,
            Self::Text(_) => 4,
        }
    }
}

/// Exact comparison of an integer with a float, without rounding the integer.
fn compare_long_float(l: i64, f: f64) -> Option<Ordering> {
    // 2^63, the first float above i64::MAX
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    if f.is_nan() {
        return None;
    }
    if f >= LIMIT {
        return Some(Ordering::Less);
    }
    if f < -LIMIT {
        return Some(Ordering::Greater);
    }
    let truncated = f.trunc();
    match l.cmp(&(truncated as i64)) {
        Ordering::Equal if f > truncated => Some(Ordering::Less),
        Ordering::Equal if f < truncated => Some(Ordering::Greater),
        ord => Some(ord),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Family {
    Null,
    Number,
    Text,
    Bool,
}

impl Family {
    fn of_type(data_type: DataType) -> Self {
        match data_type {
            DataType::Int | DataType::Long | DataType::Float => Self::Number,
            DataType::Text => Self::Text,
            DataType::Bool => Self::Bool,
        }
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Bool(l), Self::Bool(r)) => l.cmp(r),
            (Self::Float(l), Self::Float(r)) => l.total_cmp(r),
            (Self::Text(l), Self::Text(r)) => l.cmp(r),
            (l, r) => match (l.as_long(), r.as_long()) {
                (Some(l), Some(r)) => l.cmp(&r),
                _ => l.rank().cmp(&r.rank()),
            },
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Long(l) => write!(f, "{l}L"),
            Self::Float(x) => write!(f, "{x:?}"),
            Self::Text(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Self::Bool(true) => f.write_str("TRUE"),
            Self::Bool(false) => f.write_str("FALSE"),
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Long(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.into())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v.into())
    }
}
