//! Native values, operands and record bags.
//!
//! [`Value`] is the native side of every coercion. [`Operand`] is what a
//! condition or update compares against: either a literal value or another
//! column. [`Record`] is an insertion-ordered column -> value bag used both
//! for writes and for mapped result rows.

use crate::error::{OrmError, OrmResult};
use chrono::NaiveDateTime;
use serde::ser::{Serialize, SerializeMap, Serializer};

/// Format used for DATETIME literals and JSON output.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A native value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// SQL NULL / absent.
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
    Bool(bool),
    /// Local wall-clock timestamp (no timezone).
    DateTime(NaiveDateTime),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Short name of the variant, used in decode error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Integer(_) => "integer",
            Value::Real(_) => "real",
            Value::Text(_) => "text",
            Value::Blob(_) => "blob",
            Value::Bool(_) => "bool",
            Value::DateTime(_) => "datetime",
        }
    }
}

/// Right-hand side of a predicate or assignment.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// A constant, rendered as a coerced SQL literal.
    Literal(Value),
    /// Another column, rendered as an identifier.
    Column(String),
}

impl Operand {
    /// Reference another column instead of a constant.
    pub fn column(name: impl Into<String>) -> Self {
        Operand::Column(name.into())
    }
}

impl From<Value> for Operand {
    fn from(v: Value) -> Self {
        Operand::Literal(v)
    }
}

macro_rules! impl_value_from {
    ($($t:ty => |$v:ident| $e:expr),* $(,)?) => {
        $(
            impl From<$t> for Value {
                fn from($v: $t) -> Self {
                    $e
                }
            }

            impl From<$t> for Operand {
                fn from(v: $t) -> Self {
                    Operand::Literal(Value::from(v))
                }
            }

            impl From<Option<$t>> for Value {
                fn from(v: Option<$t>) -> Self {
                    v.map_or(Value::Null, Value::from)
                }
            }

            impl From<Option<$t>> for Operand {
                fn from(v: Option<$t>) -> Self {
                    Operand::Literal(Value::from(v))
                }
            }
        )*
    };
}

impl_value_from! {
    i8 => |v| Value::Integer(v.into()),
    i16 => |v| Value::Integer(v.into()),
    i32 => |v| Value::Integer(v.into()),
    i64 => |v| Value::Integer(v),
    u8 => |v| Value::Integer(v.into()),
    u16 => |v| Value::Integer(v.into()),
    u32 => |v| Value::Integer(v.into()),
    f32 => |v| Value::Real(v.into()),
    f64 => |v| Value::Real(v),
    bool => |v| Value::Bool(v),
    String => |v| Value::Text(v),
    &str => |v| Value::Text(v.to_string()),
    Vec<u8> => |v| Value::Blob(v),
    NaiveDateTime => |v| Value::DateTime(v),
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Null
    }
}

impl From<()> for Operand {
    fn from(_: ()) -> Self {
        Operand::Literal(Value::Null)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Integer(v) => serializer.serialize_i64(*v),
            Value::Real(v) => serializer.serialize_f64(*v),
            Value::Text(v) => serializer.serialize_str(v),
            Value::Blob(v) => serializer.serialize_str(&hex::encode(v)),
            Value::Bool(v) => serializer.serialize_bool(*v),
            Value::DateTime(v) => {
                serializer.serialize_str(&v.format(DATETIME_FORMAT).to_string())
            }
        }
    }
}

/// Typed extraction from a [`Value`].
pub trait FromValue: Sized {
    /// Convert a value; `column` is only used for error messages.
    fn from_value(column: &str, value: &Value) -> OrmResult<Self>;
}

fn mismatch(column: &str, expected: &str, value: &Value) -> OrmError {
    OrmError::decode(
        column,
        format!("expected {expected}, found {}", value.kind()),
    )
}

impl FromValue for Value {
    fn from_value(_column: &str, value: &Value) -> OrmResult<Self> {
        Ok(value.clone())
    }
}

impl FromValue for i64 {
    fn from_value(column: &str, value: &Value) -> OrmResult<Self> {
        match value {
            Value::Integer(v) => Ok(*v),
            Value::Bool(v) => Ok(i64::from(*v)),
            other => Err(mismatch(column, "integer", other)),
        }
    }
}

impl FromValue for i32 {
    fn from_value(column: &str, value: &Value) -> OrmResult<Self> {
        let v = i64::from_value(column, value)?;
        i32::try_from(v).map_err(|e| OrmError::decode(column, e.to_string()))
    }
}

impl FromValue for f64 {
    fn from_value(column: &str, value: &Value) -> OrmResult<Self> {
        match value {
            Value::Real(v) => Ok(*v),
            Value::Integer(v) => Ok(*v as f64),
            other => Err(mismatch(column, "real", other)),
        }
    }
}

impl FromValue for bool {
    fn from_value(column: &str, value: &Value) -> OrmResult<Self> {
        match value {
            Value::Bool(v) => Ok(*v),
            Value::Integer(0) => Ok(false),
            Value::Integer(1) => Ok(true),
            other => Err(mismatch(column, "bool", other)),
        }
    }
}

impl FromValue for String {
    fn from_value(column: &str, value: &Value) -> OrmResult<Self> {
        match value {
            Value::Text(v) => Ok(v.clone()),
            other => Err(mismatch(column, "text", other)),
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(column: &str, value: &Value) -> OrmResult<Self> {
        match value {
            Value::Blob(v) => Ok(v.clone()),
            other => Err(mismatch(column, "blob", other)),
        }
    }
}

impl FromValue for NaiveDateTime {
    fn from_value(column: &str, value: &Value) -> OrmResult<Self> {
        match value {
            Value::DateTime(v) => Ok(*v),
            other => Err(mismatch(column, "datetime", other)),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(column: &str, value: &Value) -> OrmResult<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(column, other).map(Some),
        }
    }
}

/// An insertion-ordered column -> value bag.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    entries: Vec<(String, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap entries whose column names are already unique, such as a result row.
    pub(crate) fn from_entries(entries: Vec<(String, Value)>) -> Self {
        Self { entries }
    }

    /// Builder-style [`Record::set`].
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(column, value);
        self
    }

    /// Set a column, replacing an earlier value in place.
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        let column = column.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(c, _)| *c == column) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((column, value)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, v)| v)
    }

    pub fn remove(&mut self, column: &str) -> Option<Value> {
        let idx = self.entries.iter().position(|(c, _)| c == column)?;
        Some(self.entries.remove(idx).1)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.entries.iter().any(|(c, _)| c == column)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(c, _)| c.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(c, v)| (c.as_str(), v))
    }

    /// Typed access. A missing column reads as NULL, so `Option<T>` targets
    /// yield `None` for both.
    pub fn try_get<T: FromValue>(&self, column: &str) -> OrmResult<T> {
        let value = self.get(column).unwrap_or(&Value::Null);
        T::from_value(column, value)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (k, v) in iter {
            record.set(k, v);
        }
        record
    }
}

impl IntoIterator for Record {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// Trait for converting a mapped result row into a Rust struct.
///
/// # Example
///
/// ```
/// use liteorm::{FromRecord, OrmResult, Record};
///
/// struct Person {
///     id: i64,
///     name: Option<String>,
/// }
///
/// impl FromRecord for Person {
///     fn from_record(r: &Record) -> OrmResult<Self> {
///         Ok(Self {
///             id: r.try_get("id")?,
///             name: r.try_get("name")?,
///         })
///     }
/// }
/// ```
pub trait FromRecord: Sized {
    fn from_record(record: &Record) -> OrmResult<Self>;
}

impl FromRecord for Record {
    fn from_record(record: &Record) -> OrmResult<Self> {
        Ok(record.clone())
    }
}

/// Trait for turning a Rust struct into a record for writes.
pub trait IntoRecord {
    fn into_record(self) -> Record;
}

impl IntoRecord for Record {
    fn into_record(self) -> Record {
        self
    }
}

impl IntoRecord for &Record {
    fn into_record(self) -> Record {
        self.clone()
    }
}
