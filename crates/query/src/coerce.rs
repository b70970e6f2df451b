//! Permissive literal coercion.
//!
//! Filter literals are untyped until a query meets the column they target.
//! Coercion never fails: a literal that cannot be interpreted in the
//! column's type collapses to that type's zero value (or `false`), which
//! simply makes the filter unlikely to match.

use column::{ColumnType, Value};

/// Converts `value` into the representation of `column_type`.
pub fn coerce(value: &Value, column_type: ColumnType) -> Value {
    match column_type {
        ColumnType::Bool => Value::Bool(to_bool(value)),
        ColumnType::Int64 => Value::Int64(to_i64(value)),
        ColumnType::Float64 => Value::Float64(to_f64(value)),
        ColumnType::Str => Value::Str(to_string(value)),
    }
}

fn to_bool(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Int64(i) => *i != 0,
        Value::Float64(f) => *f != 0.0,
        Value::Str(s) => s.eq_ignore_ascii_case("true"),
    }
}

fn to_i64(value: &Value) -> i64 {
    match value {
        Value::Bool(b) => i64::from(*b),
        Value::Int64(i) => *i,
        // rounds half away from zero, saturates at the i64 range, NaN -> 0
        Value::Float64(f) => f.round() as i64,
        Value::Str(s) => s.parse().unwrap_or(0),
    }
}

fn to_f64(value: &Value) -> f64 {
    match value {
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::Int64(i) => *i as f64,
        Value::Float64(f) => *f,
        Value::Str(s) => s.parse().unwrap_or(0.0),
    }
}

fn to_string(value: &Value) -> String {
    match value {
        Value::Bool(b) => b.to_string(),
        Value::Int64(i) => i.to_string(),
        Value::Float64(f) => format!("{f:.6}"),
        Value::Str(s) => s.clone(),
    }
}
