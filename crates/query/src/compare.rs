//! The condition × column-type comparison matrix.
//!
//! Every cell holds a plain function taking `(column_value, literal)` where
//! both sides already have the column's type. Undefined cells answer with
//! [`UnsupportedComparison`] instead of a silent `false`.

use std::cmp::Ordering;

use column::{ColumnType, Value};
use thiserror::Error;

use crate::filter::Condition;

/// Comparison between a stored value (left) and a coerced literal (right).
pub type CompareFn = fn(&Value, &Value) -> bool;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unsupported comparison: {condition} on {column_type} column")]
pub struct UnsupportedComparison {
    pub condition: Condition,
    pub column_type: ColumnType,
}

/// Two-dimensional dispatch table, indexed by condition then column type.
#[derive(Clone, Copy)]
pub struct ComparisonTable {
    cells: [[Option<CompareFn>; ColumnType::COUNT]; Condition::COUNT],
}

impl ComparisonTable {
    /// A table with no defined cells.
    pub fn empty() -> Self {
        Self {
            cells: [[None; ColumnType::COUNT]; Condition::COUNT],
        }
    }

    /// Equality and inequality for every type, numeric `<`/`>` for int64 and
    /// float64, and byte-wise `>` for strings. Ordering on bools is
    /// undefined.
    pub fn standard() -> Self {
        let mut t = Self::empty();
        for ty in ColumnType::ALL {
            t.set(Condition::Equals, ty, equals);
            t.set(Condition::NotEquals, ty, not_equals);
        }
        t.set(Condition::LessThan, ColumnType::Int64, less_than);
        t.set(Condition::LessThan, ColumnType::Float64, less_than);
        for ty in [ColumnType::Int64, ColumnType::Float64, ColumnType::Str] {
            t.set(Condition::GreaterThan, ty, greater_than);
        }
        t
    }

    /// The historical table, where `GreaterThan` on int64, float64 and
    /// string behaves exactly like `NotEquals`. Only useful for reproducing
    /// results of stores queried by older releases.
    pub fn legacy() -> Self {
        let mut t = Self::standard();
        for ty in [ColumnType::Int64, ColumnType::Float64, ColumnType::Str] {
            t.set(Condition::GreaterThan, ty, not_equals);
        }
        t
    }

    /// Returns the table with `(condition, column_type)` set to `f`.
    pub fn with(mut self, condition: Condition, column_type: ColumnType, f: CompareFn) -> Self {
        self.set(condition, column_type, f);
        self
    }

    /// Returns the table with `(condition, column_type)` undefined.
    pub fn without(mut self, condition: Condition, column_type: ColumnType) -> Self {
        self.cells[condition.ordinal()][column_type.ordinal()] = None;
        self
    }

    fn set(&mut self, condition: Condition, column_type: ColumnType, f: CompareFn) {
        self.cells[condition.ordinal()][column_type.ordinal()] = Some(f);
    }

    pub fn lookup(
        &self,
        condition: Condition,
        column_type: ColumnType,
    ) -> Result<CompareFn, UnsupportedComparison> {
        self.cells[condition.ordinal()][column_type.ordinal()].ok_or(UnsupportedComparison {
            condition,
            column_type,
        })
    }

    pub fn is_supported(&self, condition: Condition, column_type: ColumnType) -> bool {
        self.lookup(condition, column_type).is_ok()
    }

    /// Looks up and applies the comparison in one step.
    pub fn compare(
        &self,
        condition: Condition,
        column_type: ColumnType,
        value: &Value,
        literal: &Value,
    ) -> Result<bool, UnsupportedComparison> {
        let f = self.lookup(condition, column_type)?;
        Ok(f(value, literal))
    }
}

impl Default for ComparisonTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl std::fmt::Debug for ComparisonTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut list = f.debug_list();
        for cond in Condition::ALL {
            for ty in ColumnType::ALL {
                if self.is_supported(cond, ty) {
                    list.entry(&format_args!("{cond} {ty}"));
                }
            }
        }
        list.finish()
    }
}

fn equals(a: &Value, b: &Value) -> bool {
    a == b
}

fn not_equals(a: &Value, b: &Value) -> bool {
    a != b
}

fn less_than(a: &Value, b: &Value) -> bool {
    ordering(a, b) == Some(Ordering::Less)
}

fn greater_than(a: &Value, b: &Value) -> bool {
    ordering(a, b) == Some(Ordering::Greater)
}

/// Native ordering for same-typed numeric and string values. NaN and mixed
/// types are unordered.
fn ordering(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Int64(x), Value::Int64(y)) => Some(x.cmp(y)),
        (Value::Float64(x), Value::Float64(y)) => x.partial_cmp(y),
        (Value::Str(x), Value::Str(y)) => Some(x.as_bytes().cmp(y.as_bytes())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmp(t: &ComparisonTable, c: Condition, a: Value, b: Value) -> bool {
        t.compare(c, a.column_type(), &a, &b).unwrap()
    }

    #[test]
    fn equality_for_every_type() {
        let t = ComparisonTable::standard();
        for v in [
            Value::Bool(true),
            Value::Int64(7),
            Value::Float64(0.5),
            Value::from("x"),
        ] {
            assert!(cmp(&t, Condition::Equals, v.clone(), v.clone()));
            assert!(!cmp(&t, Condition::NotEquals, v.clone(), v));
        }
        assert!(cmp(&t, Condition::NotEquals, Value::Bool(true), Value::Bool(false)));
    }

    #[test]
    fn numeric_ordering() {
        let t = ComparisonTable::standard();
        assert!(cmp(&t, Condition::LessThan, Value::Int64(-1), Value::Int64(0)));
        assert!(!cmp(&t, Condition::LessThan, Value::Int64(0), Value::Int64(0)));
        assert!(cmp(&t, Condition::GreaterThan, Value::Float64(2.0), Value::Float64(1.5)));
        assert!(!cmp(&t, Condition::GreaterThan, Value::Float64(1.0), Value::Float64(1.5)));
        assert!(!cmp(&t, Condition::LessThan, Value::Float64(f64::NAN), Value::Float64(1.0)));
    }

    #[test]
    fn string_greater_than_is_bytewise() {
        let t = ComparisonTable::standard();
        assert!(cmp(&t, Condition::GreaterThan, Value::from("b"), Value::from("a")));
        assert!(cmp(&t, Condition::GreaterThan, Value::from("ab"), Value::from("a")));
        assert!(!cmp(&t, Condition::GreaterThan, Value::from("B"), Value::from("a")));
    }

    #[test]
    fn undefined_cells_are_unsupported() {
        let t = ComparisonTable::standard();
        for (c, ty) in [
            (Condition::LessThan, ColumnType::Bool),
            (Condition::LessThan, ColumnType::Str),
            (Condition::GreaterThan, ColumnType::Bool),
        ] {
            let err = t.lookup(c, ty).unwrap_err();
            assert_eq!(err, UnsupportedComparison { condition: c, column_type: ty });
        }
    }

    #[test]
    fn legacy_greater_than_behaves_like_not_equals() {
        let t = ComparisonTable::legacy();
        assert!(cmp(&t, Condition::GreaterThan, Value::Int64(1), Value::Int64(5)));
        assert!(!cmp(&t, Condition::GreaterThan, Value::Int64(5), Value::Int64(5)));
    }

    #[test]
    fn cells_can_be_overridden() {
        fn bool_after(a: &Value, b: &Value) -> bool {
            a.as_bool() > b.as_bool()
        }
        let t = ComparisonTable::standard()
            .with(Condition::GreaterThan, ColumnType::Bool, bool_after)
            .without(Condition::NotEquals, ColumnType::Str);
        assert!(cmp(&t, Condition::GreaterThan, Value::Bool(true), Value::Bool(false)));
        assert!(!t.is_supported(Condition::NotEquals, ColumnType::Str));
    }

    #[test]
    fn empty_table_supports_nothing() {
        let t = ComparisonTable::empty();
        for c in Condition::ALL {
            for ty in ColumnType::ALL {
                assert!(!t.is_supported(c, ty));
            }
        }
    }
}
