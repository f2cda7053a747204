//! The value codec: coercion between engine-native cells and protocol values.
//!
//! Behavior is table-driven by the column's declared primitive type. The
//! codec is pure; the column spec rides along only so failures can name the
//! offending column.
//!
//! | Declared | Accepts | Produces |
//! |----------|---------|----------|
//! | TEXT | any cell | `string` (blobs as base64) |
//! | INTEGER | integer cells | `number` |
//! | REAL | integer or real cells | `number` |
//! | BLOB | blob cells | base64 `string` |
//! | UNSPECIFIED | text and numeric cells | inferred |
//!
//! NULL passes through as the `null` case at every declared type.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use cabledb_error::{CableError, Result};

use crate::{CellValue, ColumnSpec, ColumnType, Value};

/// Decode one engine cell into a protocol value under `column`'s declared type.
///
/// # Errors
///
/// Returns [`CableError::Decode`] naming the column ordinal and declared type
/// when the cell's storage class is not accepted by the declaration.
#[allow(clippy::cast_precision_loss)]
pub fn decode_cell(column: &ColumnSpec, cell: &CellValue) -> Result<Value> {
    if cell.is_null() {
        return Ok(Value::Null);
    }
    match column.column_type {
        ColumnType::Text => Ok(Value::String(cell.to_text())),
        ColumnType::Integer => match cell {
            // Values wider than 53 bits lose precision here; that is the
            // accepted cost of the double-precision wire carrier.
            CellValue::Integer(i) => Ok(Value::Number(*i as f64)),
            other => Err(decode_error(column, other, "cell is not an integer")),
        },
        ColumnType::Real => match cell {
            CellValue::Integer(i) => Ok(Value::Number(*i as f64)),
            CellValue::Real(f) => Ok(Value::Number(*f)),
            other => Err(decode_error(column, other, "cell is not numeric")),
        },
        ColumnType::Blob => match cell {
            CellValue::Blob(bytes) => Ok(Value::String(BASE64.encode(bytes))),
            other => Err(decode_error(column, other, "cell is not a byte sequence")),
        },
        ColumnType::Unspecified => match cell {
            CellValue::Text(s) => Ok(Value::String(s.clone())),
            CellValue::Integer(i) => Ok(Value::Number(*i as f64)),
            CellValue::Real(f) => Ok(Value::Number(*f)),
            other => Err(decode_error(column, other, "no inferrable mapping")),
        },
    }
}

/// Encode a protocol value back into an engine cell under `column`'s declared
/// type. Inverse of [`decode_cell`] up to the canonical representation
/// (blob bytes round-trip through base64 strings).
///
/// # Errors
///
/// Returns [`CableError::Decode`] when the value cannot be carried by the
/// declared type (booleans at numeric types, malformed base64 at BLOB,
/// fractional numbers at INTEGER).
#[allow(clippy::cast_possible_truncation)]
pub fn encode_value(column: &ColumnSpec, value: &Value) -> Result<CellValue> {
    if value.is_null() {
        return Ok(CellValue::Null);
    }
    match column.column_type {
        ColumnType::Text => match value {
            Value::String(s) => Ok(CellValue::Text(s.clone())),
            Value::Number(n) => Ok(CellValue::Text(n.to_string())),
            Value::Bool(b) => Ok(CellValue::Text(b.to_string())),
            Value::Null => unreachable!("null handled above"),
        },
        ColumnType::Integer => match value {
            Value::Number(n) if n.fract() == 0.0 => Ok(CellValue::Integer(*n as i64)),
            Value::Number(_) => Err(encode_error(column, value, "number is not integral")),
            other => Err(encode_error(column, other, "value is not numeric")),
        },
        ColumnType::Real => match value {
            Value::Number(n) => Ok(CellValue::Real(*n)),
            other => Err(encode_error(column, other, "value is not numeric")),
        },
        ColumnType::Blob => match value {
            Value::String(s) => BASE64
                .decode(s)
                .map(CellValue::Blob)
                .map_err(|e| encode_error(column, value, &format!("invalid base64: {e}"))),
            other => Err(encode_error(column, other, "value is not a base64 string")),
        },
        ColumnType::Unspecified => match value {
            Value::String(s) => Ok(CellValue::Text(s.clone())),
            // Integral doubles inside the 53-bit exact window become integer
            // cells; anything wider stays a real to avoid saturation.
            Value::Number(n) if n.fract() == 0.0 && n.abs() <= 9_007_199_254_740_992.0 => {
                Ok(CellValue::Integer(*n as i64))
            }
            Value::Number(n) => Ok(CellValue::Real(*n)),
            other => Err(encode_error(column, other, "no inferrable mapping")),
        },
    }
}

fn decode_error(column: &ColumnSpec, cell: &CellValue, detail: &str) -> CableError {
    CableError::Decode {
        ordinal: column.ordinal,
        declared: column.column_type.name().to_owned(),
        detail: match &column.name {
            Some(name) => format!("column '{name}': {} {detail}", cell.kind()),
            None => format!("{} {detail}", cell.kind()),
        },
    }
}

fn encode_error(column: &ColumnSpec, value: &Value, detail: &str) -> CableError {
    CableError::Decode {
        ordinal: column.ordinal,
        declared: column.column_type.name().to_owned(),
        detail: match &column.name {
            Some(name) => format!("column '{name}': {detail} (got {value:?})"),
            None => format!("{detail} (got {value:?})"),
        },
    }
}
