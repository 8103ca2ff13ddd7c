//! Value <-> SQL coercion keyed by declared column type.
//!
//! Writes inline literals into statement text (there is no parameter
//! binding), so every string is single-quoted with embedded quotes doubled.
//! DATETIME values are written as `strftime('%s', ...)` expressions and
//! stored as epoch seconds; the dump form writes the stored integer directly.

use crate::error::{OrmError, OrmResult};
use crate::ident::quote_minimal;
use crate::schema::ColumnType;
use crate::value::{DATETIME_FORMAT, Operand, Value};
use chrono::{DateTime, Datelike, NaiveDateTime};

/// Render an operand as SQL text for use in a statement.
pub fn to_literal(ty: Option<ColumnType>, operand: &Operand) -> String {
    match operand {
        Operand::Column(name) => quote_minimal(name),
        Operand::Literal(value) => value_literal(ty, value),
    }
}

/// Render a value in its stored form, as used by backup dumps.
///
/// Identical to [`to_literal`] except that DATETIME values are written as the
/// stored epoch-seconds integer rather than a `strftime` expression.
pub fn to_storage_literal(ty: Option<ColumnType>, value: &Value) -> String {
    match value {
        Value::DateTime(dt) => to_epoch_seconds(dt).to_string(),
        Value::Text(s) if ty == Some(ColumnType::DateTime) => match parse_datetime(s) {
            Some(dt) => to_epoch_seconds(&dt).to_string(),
            None => quote_text(s),
        },
        other => value_literal(ty, other),
    }
}

/// Convert a raw result cell into the native value for its declared type.
///
/// Columns without a declared type, and NULL cells, pass through unchanged.
pub fn from_result_cell(column: &str, ty: Option<ColumnType>, raw: Value) -> OrmResult<Value> {
    let Some(ty) = ty else {
        return Ok(raw);
    };
    if raw.is_null() {
        return Ok(raw);
    }
    match ty {
        ColumnType::Boolean => match raw {
            Value::Integer(n) => Ok(Value::Bool(n != 0)),
            Value::Bool(b) => Ok(Value::Bool(b)),
            other => Err(OrmError::decode(
                column,
                format!("expected 0/1 for BOOLEAN, found {}", other.kind()),
            )),
        },
        ColumnType::DateTime => {
            let secs = match &raw {
                Value::Integer(n) => *n,
                Value::DateTime(dt) => return Ok(Value::DateTime(*dt)),
                Value::Real(f) if f.fract() == 0.0 => *f as i64,
                Value::Text(s) => s.trim().parse::<i64>().map_err(|_| {
                    OrmError::decode(column, format!("non-numeric DATETIME value '{s}'"))
                })?,
                other => {
                    return Err(OrmError::decode(
                        column,
                        format!("expected epoch seconds for DATETIME, found {}", other.kind()),
                    ));
                }
            };
            from_epoch_seconds(secs)
                .map(Value::DateTime)
                .ok_or_else(|| OrmError::decode(column, format!("timestamp {secs} out of range")))
        }
        ColumnType::Decimal | ColumnType::Money => match raw {
            Value::Integer(n) => Ok(Value::Real(n as f64)),
            Value::Text(s) => s.trim().parse::<f64>().map(Value::Real).map_err(|_| {
                OrmError::decode(column, format!("non-numeric {ty} value '{s}'"))
            }),
            other => Ok(other),
        },
        ColumnType::Integer | ColumnType::NVarChar | ColumnType::Char => Ok(raw),
    }
}

/// Seconds since the epoch, reading the timestamp as-is (no timezone shift).
pub fn to_epoch_seconds(dt: &NaiveDateTime) -> i64 {
    dt.and_utc().timestamp()
}

/// Inverse of [`to_epoch_seconds`].
pub fn from_epoch_seconds(secs: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp(secs, 0).map(|dt| dt.naive_utc())
}

/// The `strftime` expression SQLite evaluates to epoch seconds.
///
/// SQLite only parses four-digit years, so timestamps outside 0000-9999 are
/// written as the epoch-seconds integer itself.
pub fn datetime_expr(dt: &NaiveDateTime) -> String {
    if (0..=9999).contains(&dt.year()) {
        format!("strftime('%s', '{}')", dt.format(DATETIME_FORMAT))
    } else {
        to_epoch_seconds(dt).to_string()
    }
}

/// Single-quote a string, doubling embedded quotes.
pub fn quote_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for ch in s.chars() {
        if ch == '\'' {
            out.push_str("''");
        } else {
            out.push(ch);
        }
    }
    out.push('\'');
    out
}

fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s.trim(), DATETIME_FORMAT).ok()
}

fn real_literal(f: f64) -> String {
    if f.is_nan() {
        "null".to_string()
    } else if f.is_infinite() {
        (if f > 0.0 { "9e999" } else { "-9e999" }).to_string()
    } else {
        format!("{f:?}")
    }
}

fn value_literal(ty: Option<ColumnType>, value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => (if *b { "1" } else { "0" }).to_string(),
        Value::Integer(n) => n.to_string(),
        Value::Real(f) => real_literal(*f),
        Value::Text(s) if ty == Some(ColumnType::DateTime) => match parse_datetime(s) {
            Some(dt) => datetime_expr(&dt),
            None => quote_text(s),
        },
        Value::Text(s) => quote_text(s),
        Value::Blob(b) => format!("X'{}'", hex::encode_upper(b)),
        Value::DateTime(dt) => datetime_expr(dt),
    }
}
