//! Shared vocabulary for CableDB.
//!
//! Defines the typed value model crossing the wire, the column/table/row
//! shapes of a result set, the internal result-mode union, and the access
//! levels the classifier grants against. The value codec lives in [`codec`].

pub mod codec;
pub mod value;

pub use codec::{decode_cell, encode_value};
pub use value::{CellValue, Value};

use std::fmt;

// ---------------------------------------------------------------------------
// Columns, tables, rows
// ---------------------------------------------------------------------------

/// Declared primitive type of a column.
///
/// This is the closed set the wire schema knows about; anything else a schema
/// declares is rejected by the reflector.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ColumnType {
    Text,
    Integer,
    Real,
    Blob,
    #[default]
    Unspecified,
}

impl ColumnType {
    /// Wire name of the type.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Text => "TEXT",
            Self::Integer => "INTEGER",
            Self::Real => "REAL",
            Self::Blob => "BLOB",
            Self::Unspecified => "UNSPECIFIED",
        }
    }

    /// Translate a declared type string from a schema into a primitive type.
    ///
    /// The allowed strings are a closed set; `None` means the string is not
    /// recognized and the caller must fail loudly.
    pub fn from_declared(declared: &str) -> Option<Self> {
        let declared = declared.trim();
        if declared.eq_ignore_ascii_case("TEXT") {
            Some(Self::Text)
        } else if declared.eq_ignore_ascii_case("INTEGER") {
            Some(Self::Integer)
        } else if declared.eq_ignore_ascii_case("REAL") {
            Some(Self::Real)
        } else if declared.eq_ignore_ascii_case("BLOB") {
            Some(Self::Blob)
        } else {
            None
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One column of a result set or reflected table.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnSpec {
    /// Zero-based position within the table.
    pub ordinal: u32,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub name: Option<String>,
    #[serde(default)]
    pub column_type: ColumnType,
}

impl ColumnSpec {
    /// Create a column spec with a name.
    pub fn named(ordinal: u32, name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            ordinal,
            name: Some(name.into()),
            column_type,
        }
    }

    /// Create an anonymous column spec.
    pub const fn anonymous(ordinal: u32, column_type: ColumnType) -> Self {
        Self {
            ordinal,
            name: None,
            column_type,
        }
    }
}

/// A table descriptor within one response.
///
/// `id` is local to the result set it appears in (numbering starts at 1);
/// rows reference their table by this id, never by name.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSpec {
    pub id: u32,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub name: Option<String>,
    pub columns: Vec<ColumnSpec>,
}

/// One row of a result set.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowData {
    /// Id of the [`TableSpec`] this row belongs to, within the same result.
    pub table_id: u32,
    /// Zero-based position within the result set.
    pub ordinal: u64,
    pub values: Vec<Value>,
}

// ---------------------------------------------------------------------------
// Queries and outcomes
// ---------------------------------------------------------------------------

/// A query as submitted by a client.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Query {
    /// Raw SQL text. Absent SQL is a protocol-level precondition failure.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub sql: Option<String>,
    /// Caller asserts the query produces no row-bearing result.
    #[serde(default)]
    pub statement: bool,
}

impl Query {
    /// A row-producing query (statement flag unset).
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: Some(sql.into()),
            statement: false,
        }
    }

    /// A statement execution (statement flag set).
    pub fn statement(sql: impl Into<String>) -> Self {
        Self {
            sql: Some(sql.into()),
            statement: true,
        }
    }
}

/// Server-internal result of running one query, before wire encoding.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    /// No rows, no count.
    Empty,
    /// A single primitive projected from a one-column, one-row result.
    Single { value: Value },
    /// Zero or more rows with their table descriptors.
    Rows {
        tables: Vec<TableSpec>,
        rows: Vec<RowData>,
    },
    /// Data-modifying statement reporting its change count.
    Mutation { count: u64 },
    /// Terminal failure, with the wire code when one is known.
    Failure {
        message: String,
        code: Option<i32>,
    },
}

impl QueryOutcome {
    /// Discriminator name, for logs and diagnostics.
    pub const fn mode(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Single { .. } => "single",
            Self::Rows { .. } => "rows",
            Self::Mutation { .. } => "mutation",
            Self::Failure { .. } => "failure",
        }
    }
}

// ---------------------------------------------------------------------------
// Query classes and access levels
// ---------------------------------------------------------------------------

/// The class of a single SQL statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryClass {
    /// `SELECT`.
    Dql,
    /// `INSERT`, `UPDATE`, `DELETE`.
    Dml,
    /// `CREATE`, `ALTER`, `DROP`.
    Ddl,
}

impl QueryClass {
    /// The minimum access level allowed to run a statement of this class.
    pub const fn required_access(self) -> AccessLevel {
        match self {
            Self::Dql => AccessLevel::ReadOnly,
            Self::Dml => AccessLevel::ReadWrite,
            Self::Ddl => AccessLevel::Admin,
        }
    }
}

impl fmt::Display for QueryClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Dql => "DQL",
            Self::Dml => "DML",
            Self::Ddl => "DDL",
        })
    }
}

/// Coarse capability granted to a caller.
///
/// Levels form a total order; a query is permitted at level `L` iff its
/// required level is `<= L`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AccessLevel {
    Anonymous,
    ReadOnly,
    ReadWrite,
    Admin,
}

impl AccessLevel {
    /// Wire name of the level.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Anonymous => "ANONYMOUS",
            Self::ReadOnly => "READ_ONLY",
            Self::ReadWrite => "READ_WRITE",
            Self::Admin => "ADMIN",
        }
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
