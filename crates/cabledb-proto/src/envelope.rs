//! The `DatabaseResult` wire envelope and its translation to and from the
//! internal result-mode union.
//!
//! The envelope renders its one-of the way protobuf JSON does: the case
//! members are sibling optional fields, of which a well-formed envelope sets
//! at most one. The two translation directions are mutually inverse:
//! `decode_result(encode_outcome(o))` reproduces `o` for every outcome, and
//! row order is preserved.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use cabledb_error::{CableError, Result};
use cabledb_types::{QueryOutcome, RowData, TableSpec, Value};

/// The result envelope carried in a `Query` response.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseResult {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error_code: Option<i32>,

    // One-of: a well-formed ok envelope sets exactly one of these.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub empty: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub single: Option<ValueResult>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub mutation: Option<MutationCount>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub resultset: Option<ResultSet>,
}

/// Wrapper for a single-value result.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ValueResult {
    pub value: DatabaseValue,
}

/// The outer value tag: a general value, raw bytes, an empty marker, or a
/// bare double.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseValue {
    Value(Value),
    /// Raw bytes, base64 in the JSON rendering.
    Blob(String),
    Empty(bool),
    Real(f64),
}

impl DatabaseValue {
    /// Wrap raw bytes as a blob value.
    pub fn blob(bytes: &[u8]) -> Self {
        Self::Blob(BASE64.encode(bytes))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationCount {
    pub rows_modified: i64,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ResultSet {
    pub tables: Vec<TableSpec>,
    pub rows: Vec<RowData>,
}

/// Encode an internal outcome into its wire envelope.
#[allow(clippy::cast_possible_wrap)]
pub fn encode_outcome(outcome: &QueryOutcome) -> DatabaseResult {
    let ok = DatabaseResult {
        ok: true,
        ..DatabaseResult::default()
    };
    match outcome {
        QueryOutcome::Empty => DatabaseResult {
            empty: Some(true),
            ..ok
        },
        QueryOutcome::Single { value } => DatabaseResult {
            single: Some(ValueResult {
                value: DatabaseValue::Value(value.clone()),
            }),
            ..ok
        },
        QueryOutcome::Rows { tables, rows } => DatabaseResult {
            resultset: Some(ResultSet {
                tables: tables.clone(),
                rows: rows.clone(),
            }),
            ..ok
        },
        QueryOutcome::Mutation { count } => DatabaseResult {
            mutation: Some(MutationCount {
                rows_modified: *count as i64,
            }),
            ..ok
        },
        QueryOutcome::Failure { message, code } => DatabaseResult {
            ok: false,
            error: Some(message.clone()),
            error_code: *code,
            ..DatabaseResult::default()
        },
    }
}

/// Decode a wire envelope back into the internal outcome.
///
/// # Errors
///
/// An `ok` envelope with no result case is undefined; it decodes to an
/// `UNIMPLEMENTED` error rather than being guessed at.
#[allow(clippy::cast_sign_loss)]
pub fn decode_result(result: &DatabaseResult) -> Result<QueryOutcome> {
    if !result.ok {
        return Ok(QueryOutcome::Failure {
            message: result
                .error
                .clone()
                .unwrap_or_else(|| "unknown error".to_owned()),
            code: result.error_code,
        });
    }
    if result.empty.is_some() {
        Ok(QueryOutcome::Empty)
    } else if let Some(single) = &result.single {
        Ok(QueryOutcome::Single {
            value: decode_value(&single.value),
        })
    } else if let Some(mutation) = &result.mutation {
        Ok(QueryOutcome::Mutation {
            count: mutation.rows_modified.max(0) as u64,
        })
    } else if let Some(set) = &result.resultset {
        Ok(QueryOutcome::Rows {
            tables: set.tables.clone(),
            rows: set.rows.clone(),
        })
    } else {
        Err(CableError::unimplemented(
            "result envelope carries no result case",
        ))
    }
}

/// Collapse the outer value tag into the primitive union.
fn decode_value(value: &DatabaseValue) -> Value {
    match value {
        DatabaseValue::Value(v) => v.clone(),
        DatabaseValue::Blob(b64) => Value::String(b64.clone()),
        DatabaseValue::Empty(_) => Value::Null,
        DatabaseValue::Real(f) => Value::Number(*f),
    }
}
