//! Field coercion: raw CSV text to a column's semantic type.
//!
//! Coercion never fails. Malformed integers degrade to `0` so one bad cell
//! does not stop a batch.

use crate::models::{CoercedValue, Column, ColumnType};

/// The only raw value that maps to `true` in a `bool` column.
pub const BOOL_TRUE_SENTINEL: &str = "SI";

/// Convert `raw` to the type declared by `column`.
pub fn coerce(column: &Column, raw: &str) -> CoercedValue {
    match column.column_type {
        ColumnType::Bool => CoercedValue::Boolean(raw == BOOL_TRUE_SENTINEL),
        ColumnType::Int => CoercedValue::Integer(parse_int(raw)),
        ColumnType::FixedString(_) => CoercedValue::Text(raw.to_string()),
    }
}

/// Base-10 parse, ignoring surrounding whitespace. Anything else is `0`.
fn parse_int(raw: &str) -> i64 {
    raw.trim().parse::<i64>().unwrap_or(0)
}
