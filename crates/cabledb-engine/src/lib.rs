//! Embedded SQL engine abstraction.
//!
//! The service core treats the engine as an opaque relational engine with a
//! small capability set: execute statements, materialize query results, and
//! read the schema catalog. [`SqliteEngine`] fulfills it over a
//! mutex-guarded `rusqlite` connection; the handle's own lock serializes
//! concurrent statements on the same database.

use parking_lot::Mutex;
use rusqlite::Connection;
use rusqlite::types::ValueRef;
use tracing::debug;

use cabledb_error::{CableError, Result};
use cabledb_types::CellValue;

/// Canonical spec string for an in-memory database.
pub const MEMORY_SPEC: &str = ":memory:";

/// Effect of one executed statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatementEffect {
    /// Rows changed, as reported by the engine after stepping the statement.
    ///
    /// The engine's change counter is only meaningful for data-modifying
    /// statements; callers that know a statement's class must mask the
    /// others (the counter is sticky across non-mutating statements).
    pub changes: u64,
    /// Whether the statement produced (discarded) result rows.
    pub returned_rows: bool,
}

/// Column metadata from a prepared statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineColumn {
    pub name: String,
    /// Declared type from the schema; `None` for expression columns.
    pub decl_type: Option<String>,
}

/// A fully materialized query result.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRows {
    pub columns: Vec<EngineColumn>,
    pub rows: Vec<Vec<CellValue>>,
}

/// One table entry from the engine's catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub name: String,
    /// The stored creation SQL.
    pub sql: String,
}

/// The capability set the service core requires of an embedded engine.
pub trait Engine: Send + Sync + 'static {
    /// Execute one or more `;`-separated statements, discarding any result
    /// rows, and report the per-statement effects in order.
    fn execute(&self, sql: &str) -> Result<Vec<StatementEffect>>;

    /// Prepare and evaluate a single row-producing statement, materializing
    /// all rows and the ordered column metadata.
    fn query_all(&self, sql: &str) -> Result<QueryRows>;

    /// List user tables and their creation SQL, ordered by table name.
    fn catalog(&self) -> Result<Vec<CatalogEntry>>;
}

/// `rusqlite`-backed engine over a single shared connection.
#[derive(Debug)]
pub struct SqliteEngine {
    conn: Mutex<Connection>,
    spec: String,
}

impl SqliteEngine {
    /// Open a database for the given spec string.
    ///
    /// The in-memory sentinel [`MEMORY_SPEC`] opens a private in-memory
    /// database; anything else is treated as a filesystem path.
    ///
    /// # Errors
    ///
    /// Open failures surface as `FAILED_PRECONDITION`.
    pub fn open(spec: &str) -> Result<Self> {
        let conn = if spec == MEMORY_SPEC {
            Connection::open_in_memory()
        } else {
            Connection::open(spec)
        }
        .map_err(|e| {
            CableError::failed_precondition(format!("cannot open database '{spec}': {e}"))
        })?;
        debug!(spec, "opened engine handle");
        Ok(Self {
            conn: Mutex::new(conn),
            spec: spec.to_owned(),
        })
    }

    /// The spec string this engine was opened with.
    pub fn spec(&self) -> &str {
        &self.spec
    }
}

fn engine_error(err: &rusqlite::Error) -> CableError {
    CableError::engine(err.to_string())
}

fn cell_from_value_ref(value: ValueRef<'_>) -> CellValue {
    match value {
        ValueRef::Null => CellValue::Null,
        ValueRef::Integer(i) => CellValue::Integer(i),
        ValueRef::Real(f) => CellValue::Real(f),
        ValueRef::Text(bytes) => CellValue::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => CellValue::Blob(bytes.to_vec()),
    }
}

impl Engine for SqliteEngine {
    fn execute(&self, sql: &str) -> Result<Vec<StatementEffect>> {
        let conn = self.conn.lock();
        let mut effects = Vec::new();
        let mut batch = rusqlite::Batch::new(&conn, sql);
        while let Some(mut stmt) = batch.next().map_err(|e| engine_error(&e))? {
            if stmt.column_count() > 0 {
                // Row-producing statement under execute: run it, drop rows.
                let mut rows = stmt.query([]).map_err(|e| engine_error(&e))?;
                while rows.next().map_err(|e| engine_error(&e))?.is_some() {}
                effects.push(StatementEffect {
                    changes: 0,
                    returned_rows: true,
                });
            } else {
                let changes = stmt.execute([]).map_err(|e| engine_error(&e))?;
                effects.push(StatementEffect {
                    changes: changes as u64,
                    returned_rows: false,
                });
            }
        }
        debug!(sql, statements = effects.len(), "executed batch");
        Ok(effects)
    }

    fn query_all(&self, sql: &str) -> Result<QueryRows> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(sql).map_err(|e| engine_error(&e))?;

        let columns: Vec<EngineColumn> = stmt
            .columns()
            .iter()
            .map(|c| EngineColumn {
                name: c.name().to_owned(),
                decl_type: c.decl_type().map(str::to_owned),
            })
            .collect();

        let column_count = columns.len();
        let mut out_rows = Vec::new();
        let mut rows = stmt.query([]).map_err(|e| engine_error(&e))?;
        while let Some(row) = rows.next().map_err(|e| engine_error(&e))? {
            let mut cells = Vec::with_capacity(column_count);
            for i in 0..column_count {
                let value = row.get_ref(i).map_err(|e| engine_error(&e))?;
                cells.push(cell_from_value_ref(value));
            }
            out_rows.push(cells);
        }
        debug!(sql, rows = out_rows.len(), "materialized query");
        Ok(QueryRows {
            columns,
            rows: out_rows,
        })
    }

    fn catalog(&self) -> Result<Vec<CatalogEntry>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT name, sql FROM sqlite_master \
                 WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
            )
            .map_err(|e| engine_error(&e))?;
        let mut rows = stmt.query([]).map_err(|e| engine_error(&e))?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next().map_err(|e| engine_error(&e))? {
            let name: String = row.get(0).map_err(|e| engine_error(&e))?;
            let sql: Option<String> = row.get(1).map_err(|e| engine_error(&e))?;
            // Tables always carry their creation SQL; entries without it
            // (e.g. internal shadow tables) are not reflectable.
            if let Some(sql) = sql {
                entries.push(CatalogEntry { name, sql });
            }
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_engine() -> SqliteEngine {
        SqliteEngine::open(MEMORY_SPEC).unwrap()
    }

    #[test]
    fn open_reports_failed_precondition() {
        let err = SqliteEngine::open("/definitely/not/a/path/db.sqlite").unwrap_err();
        assert!(matches!(err, CableError::FailedPrecondition { .. }));
    }

    #[test]
    fn execute_reports_changes() {
        let engine = memory_engine();
        let effects = engine
            .execute("CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT)")
            .unwrap();
        assert_eq!(effects.len(), 1);
        assert!(!effects[0].returned_rows);

        let effects = engine
            .execute("INSERT INTO t (id, name) VALUES (1, 'a')")
            .unwrap();
        assert_eq!(effects[0].changes, 1);

        let effects = engine
            .execute("INSERT INTO t (id, name) VALUES (2, 'b'); DELETE FROM t")
            .unwrap();
        assert_eq!(effects.len(), 2);
        assert_eq!(effects[0].changes, 1);
        assert_eq!(effects[1].changes, 2);
    }

    #[test]
    fn execute_drains_row_producing_statements() {
        let engine = memory_engine();
        let effects = engine.execute("SELECT 1").unwrap();
        assert_eq!(effects.len(), 1);
        assert!(effects[0].returned_rows);
        assert_eq!(effects[0].changes, 0);
    }

    #[test]
    fn query_all_materializes_rows_and_columns() {
        let engine = memory_engine();
        engine
            .execute("CREATE TABLE t (id INTEGER, name TEXT); INSERT INTO t VALUES (1, 'x')")
            .unwrap();
        let result = engine.query_all("SELECT id, name FROM t").unwrap();
        assert_eq!(result.columns.len(), 2);
        assert_eq!(result.columns[0].name, "id");
        assert_eq!(result.columns[0].decl_type.as_deref(), Some("INTEGER"));
        assert_eq!(result.columns[1].decl_type.as_deref(), Some("TEXT"));
        assert_eq!(
            result.rows,
            vec![vec![
                CellValue::Integer(1),
                CellValue::Text("x".to_owned())
            ]]
        );
    }

    #[test]
    fn expression_columns_have_no_decl_type() {
        let engine = memory_engine();
        let result = engine.query_all("SELECT 1 + 1").unwrap();
        assert_eq!(result.columns[0].decl_type, None);
        assert_eq!(result.rows, vec![vec![CellValue::Integer(2)]]);
    }

    #[test]
    fn engine_errors_are_classified() {
        let engine = memory_engine();
        let err = engine.query_all("SELECT * FROM no_such_table").unwrap_err();
        assert!(matches!(err, CableError::Engine { .. }));
        assert!(err.to_string().contains("no_such_table"));
    }

    #[test]
    fn catalog_lists_tables_in_name_order() {
        let engine = memory_engine();
        engine
            .execute(
                "CREATE TABLE zebra (a TEXT); CREATE TABLE apple (b INTEGER); \
                 CREATE INDEX idx ON apple (b)",
            )
            .unwrap();
        let entries = engine.catalog().unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["apple", "zebra"]);
        assert!(entries[0].sql.to_ascii_uppercase().contains("CREATE TABLE"));
    }

    #[test]
    fn file_backed_databases_persist_across_handles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cable.db");
        let spec = path.to_string_lossy().into_owned();

        let engine = SqliteEngine::open(&spec).unwrap();
        assert_eq!(engine.spec(), spec);
        engine
            .execute("CREATE TABLE t (x INTEGER); INSERT INTO t VALUES (9)")
            .unwrap();
        drop(engine);

        let reopened = SqliteEngine::open(&spec).unwrap();
        let result = reopened.query_all("SELECT x FROM t").unwrap();
        assert_eq!(result.rows, vec![vec![CellValue::Integer(9)]]);
    }

    #[test]
    fn blob_cells_round_trip() {
        let engine = memory_engine();
        engine
            .execute("CREATE TABLE b (data BLOB); INSERT INTO b VALUES (X'DEADBEEF')")
            .unwrap();
        let result = engine.query_all("SELECT data FROM b").unwrap();
        assert_eq!(
            result.rows,
            vec![vec![CellValue::Blob(vec![0xde, 0xad, 0xbe, 0xef])]]
        );
    }
}
