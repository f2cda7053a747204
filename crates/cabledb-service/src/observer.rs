//! The query observer: runs one query against a database handle and
//! classifies the outcome into a result mode.
//!
//! Callbacks accumulate in registration order on a builder; a single
//! terminal [`QueryObserver::recv`] consumes the observer, drives the
//! engine, dispatches per-row, on-end, and on-error callbacks, and returns
//! the terminal [`QueryOutcome`]. Within one `recv`, per-row callbacks fire
//! strictly before on-end; an error precludes on-end entirely.

use std::sync::Arc;

use tracing::debug;

use cabledb_engine::Engine;
use cabledb_error::{CableError, Result};
use cabledb_sql::parse_statements;
use cabledb_types::{
    ColumnSpec, ColumnType, Query, QueryClass, QueryOutcome, RowData, TableSpec, decode_cell,
};

use crate::registry::DatabaseEntry;

type RowHandler = Box<dyn FnMut(&TableSpec, &RowData) + Send>;
type EndHandler = Box<dyn FnOnce(&QueryOutcome) + Send>;
type ErrorHandler = Box<dyn FnMut(&CableError) + Send>;

/// Observer bound to a database handle and one query.
pub struct QueryObserver {
    database: Arc<DatabaseEntry>,
    query: Query,
    row_handlers: Vec<RowHandler>,
    end_handlers: Vec<EndHandler>,
    error_handlers: Vec<ErrorHandler>,
}

impl QueryObserver {
    pub fn new(database: Arc<DatabaseEntry>, query: Query) -> Self {
        Self {
            database,
            query,
            row_handlers: Vec::new(),
            end_handlers: Vec::new(),
            error_handlers: Vec::new(),
        }
    }

    /// Register a per-row callback. Fires once per result row, in row order.
    #[must_use]
    pub fn on_row(mut self, handler: impl FnMut(&TableSpec, &RowData) + Send + 'static) -> Self {
        self.row_handlers.push(Box::new(handler));
        self
    }

    /// Register an on-end callback. Fires once with the terminal result on
    /// successful completion; never fires after an error.
    #[must_use]
    pub fn on_end(mut self, handler: impl FnOnce(&QueryOutcome) + Send + 'static) -> Self {
        self.end_handlers.push(Box::new(handler));
        self
    }

    /// Register an on-error callback. Fires once with the underlying error
    /// before `recv` returns the `Failure` result.
    #[must_use]
    pub fn on_error(mut self, handler: impl FnMut(&CableError) + Send + 'static) -> Self {
        self.error_handlers.push(Box::new(handler));
        self
    }

    /// Run the query to completion.
    ///
    /// Engine, classifier, and decode failures are dispatched to on-error
    /// handlers and returned as a [`QueryOutcome::Failure`], never as `Err`.
    /// `Err` is reserved for the protocol-level precondition of a missing
    /// SQL string.
    pub async fn recv(mut self) -> Result<QueryOutcome> {
        let sql = self
            .query
            .sql
            .take()
            .ok_or_else(|| CableError::invalid_argument("query has no SQL text"))?;

        let attempt = if self.query.statement {
            self.run_statement(&sql)
        } else {
            self.run_query(&sql)
        };

        match attempt {
            Ok(outcome) => {
                for handler in self.end_handlers {
                    handler(&outcome);
                }
                Ok(outcome)
            }
            Err(err) => {
                for handler in &mut self.error_handlers {
                    handler(&err);
                }
                Ok(QueryOutcome::Failure {
                    message: err.to_string(),
                    code: Some(err.status_code() as i32),
                })
            }
        }
    }

    /// Statement-flag path: execute, then report `Mutation` or `Empty`.
    fn run_statement(&self, sql: &str) -> Result<QueryOutcome> {
        // The engine's change counter is sticky across non-mutating
        // statements, so only data-modifying statements contribute.
        let statements = parse_statements(sql)?;
        let effects = self.database.engine.execute(sql)?;
        let count: u64 = statements
            .iter()
            .zip(&effects)
            .filter(|(stmt, _)| stmt.class == QueryClass::Dml)
            .map(|(_, effect)| effect.changes)
            .sum();
        debug!(count, "statement executed");
        if count > 0 {
            Ok(QueryOutcome::Mutation { count })
        } else {
            Ok(QueryOutcome::Empty)
        }
    }

    /// Row path: materialize, detect the single-value shape, or build a
    /// result set and stream rows through the per-row handlers.
    fn run_query(&mut self, sql: &str) -> Result<QueryOutcome> {
        let result = self.database.engine.query_all(sql)?;

        let columns: Vec<ColumnSpec> = result
            .columns
            .iter()
            .enumerate()
            .map(|(i, column)| ColumnSpec {
                ordinal: i as u32,
                name: Some(column.name.clone()),
                column_type: column
                    .decl_type
                    .as_deref()
                    .and_then(ColumnType::from_declared)
                    .unwrap_or(ColumnType::Unspecified),
            })
            .collect();

        // Single-value detection: one column, one row.
        if columns.len() == 1 && result.rows.len() == 1 {
            let value = decode_cell(&columns[0], &result.rows[0][0])?;
            return Ok(QueryOutcome::Single { value });
        }

        // Result-set mode: one anonymous table descriptor, id 1.
        let table = TableSpec {
            id: 1,
            name: None,
            columns,
        };
        let mut rows = Vec::with_capacity(result.rows.len());
        for (ordinal, cells) in result.rows.iter().enumerate() {
            let mut values = Vec::with_capacity(cells.len());
            for (column, cell) in table.columns.iter().zip(cells) {
                values.push(decode_cell(column, cell)?);
            }
            let row = RowData {
                table_id: table.id,
                ordinal: ordinal as u64,
                values,
            };
            for handler in &mut self.row_handlers {
                handler(&table, &row);
            }
            rows.push(row);
        }

        Ok(QueryOutcome::Rows {
            tables: vec![table],
            rows,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cabledb_engine::SqliteEngine;
    use cabledb_types::Value;
    use parking_lot::Mutex;

    fn memory_db() -> Arc<DatabaseEntry> {
        Arc::new(DatabaseEntry {
            id: 1,
            spec: cabledb_engine::MEMORY_SPEC.to_owned(),
            engine: Arc::new(SqliteEngine::open(cabledb_engine::MEMORY_SPEC).unwrap()),
        })
    }

    async fn exec(db: &Arc<DatabaseEntry>, sql: &str) -> QueryOutcome {
        QueryObserver::new(Arc::clone(db), Query::statement(sql))
            .recv()
            .await
            .unwrap()
    }

    async fn query(db: &Arc<DatabaseEntry>, sql: &str) -> QueryOutcome {
        QueryObserver::new(Arc::clone(db), Query::new(sql))
            .recv()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn create_table_is_empty_then_insert_mutates() {
        let db = memory_db();
        assert_eq!(
            exec(&db, "CREATE TABLE test (id INTEGER PRIMARY KEY, name TEXT)").await,
            QueryOutcome::Empty
        );
        assert_eq!(
            exec(&db, "INSERT INTO test (id, name) VALUES (1, 'a')").await,
            QueryOutcome::Mutation { count: 1 }
        );
    }

    #[tokio::test]
    async fn ddl_after_dml_still_reports_empty() {
        let db = memory_db();
        exec(&db, "CREATE TABLE a (x INTEGER)").await;
        assert_eq!(
            exec(&db, "INSERT INTO a VALUES (1)").await,
            QueryOutcome::Mutation { count: 1 }
        );
        // The engine's sticky change counter must not leak into DDL results.
        assert_eq!(
            exec(&db, "CREATE TABLE b (y INTEGER)").await,
            QueryOutcome::Empty
        );
    }

    #[tokio::test]
    async fn statement_flag_never_yields_rows() {
        let db = memory_db();
        exec(&db, "CREATE TABLE t (x INTEGER); INSERT INTO t VALUES (1)").await;
        let outcome = exec(&db, "SELECT * FROM t").await;
        assert_eq!(outcome, QueryOutcome::Empty);
    }

    #[tokio::test]
    async fn single_value_detection() {
        let db = memory_db();
        exec(&db, "CREATE TABLE test (id INTEGER PRIMARY KEY, text TEXT)").await;
        exec(&db, "INSERT INTO test (id, text) VALUES (1, 'hello')").await;
        assert_eq!(
            query(&db, "SELECT text FROM test LIMIT 1").await,
            QueryOutcome::Single {
                value: Value::String("hello".to_owned())
            }
        );
    }

    #[tokio::test]
    async fn select_literal_is_single() {
        let db = memory_db();
        assert_eq!(
            query(&db, "SELECT 1").await,
            QueryOutcome::Single {
                value: Value::Number(1.0)
            }
        );
    }

    #[tokio::test]
    async fn null_cell_is_a_valid_single() {
        let db = memory_db();
        assert_eq!(
            query(&db, "SELECT NULL").await,
            QueryOutcome::Single { value: Value::Null }
        );
    }

    #[tokio::test]
    async fn multi_row_results_build_a_result_set() {
        let db = memory_db();
        exec(&db, "CREATE TABLE test (id INTEGER PRIMARY KEY, text TEXT)").await;
        exec(
            &db,
            "INSERT INTO test (id, text) VALUES (1, 'hello'), (2, 'hello2'), (3, 'hello3')",
        )
        .await;

        let outcome = query(&db, "SELECT * FROM test").await;
        let QueryOutcome::Rows { tables, rows } = outcome else {
            panic!("expected rows, got {outcome:?}");
        };
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].id, 1);
        assert_eq!(tables[0].name, None);
        assert_eq!(
            tables[0].columns,
            vec![
                ColumnSpec::named(0, "id", ColumnType::Integer),
                ColumnSpec::named(1, "text", ColumnType::Text),
            ]
        );
        assert_eq!(rows.len(), 3);
        for (i, row) in rows.iter().enumerate() {
            assert_eq!(row.table_id, 1);
            assert_eq!(row.ordinal, i as u64);
            assert_eq!(row.values.len(), tables[0].columns.len());
        }
        assert_eq!(
            rows[2].values,
            vec![Value::Number(3.0), Value::String("hello3".to_owned())]
        );
    }

    #[tokio::test]
    async fn zero_rows_is_a_rows_result_not_empty() {
        let db = memory_db();
        exec(&db, "CREATE TABLE t (x INTEGER)").await;
        let outcome = query(&db, "SELECT * FROM t").await;
        let QueryOutcome::Rows { tables, rows } = outcome else {
            panic!("expected rows");
        };
        assert_eq!(tables.len(), 1);
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn one_row_two_columns_is_rows_not_single() {
        let db = memory_db();
        let outcome = query(&db, "SELECT 1, 2").await;
        assert!(matches!(outcome, QueryOutcome::Rows { .. }));
    }

    #[tokio::test]
    async fn callbacks_fire_in_order() {
        let db = memory_db();
        exec(&db, "CREATE TABLE t (x INTEGER); INSERT INTO t VALUES (1), (2)").await;

        let events: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let row_events = Arc::clone(&events);
        let row_events_b = Arc::clone(&events);
        let end_events = Arc::clone(&events);

        let outcome = QueryObserver::new(Arc::clone(&db), Query::new("SELECT x FROM t"))
            .on_row(move |_, row| row_events.lock().push(format!("row-a:{}", row.ordinal)))
            .on_row(move |_, row| row_events_b.lock().push(format!("row-b:{}", row.ordinal)))
            .on_end(move |outcome| end_events.lock().push(format!("end:{}", outcome.mode())))
            .recv()
            .await
            .unwrap();

        assert!(matches!(outcome, QueryOutcome::Rows { .. }));
        assert_eq!(
            *events.lock(),
            vec!["row-a:0", "row-b:0", "row-a:1", "row-b:1", "end:rows"]
        );
    }

    #[tokio::test]
    async fn engine_errors_become_failure_and_skip_on_end() {
        let db = memory_db();
        let events: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let end_events = Arc::clone(&events);
        let error_events = Arc::clone(&events);

        let outcome = QueryObserver::new(Arc::clone(&db), Query::new("SELECT * FROM missing"))
            .on_end(move |_| end_events.lock().push("end".to_owned()))
            .on_error(move |err| error_events.lock().push(format!("error:{}", err.status_code())))
            .recv()
            .await
            .unwrap();

        let QueryOutcome::Failure { message, code } = outcome else {
            panic!("expected failure");
        };
        assert!(message.contains("missing"), "{message}");
        assert_eq!(code, Some(13));
        assert_eq!(*events.lock(), vec!["error:INTERNAL"]);
    }

    #[tokio::test]
    async fn missing_sql_is_a_precondition_error() {
        let db = memory_db();
        let err = QueryObserver::new(db, Query::default()).recv().await.unwrap_err();
        assert!(matches!(err, CableError::InvalidArgument { .. }));
    }

    #[tokio::test]
    async fn compound_statement_counts_only_dml() {
        let db = memory_db();
        exec(&db, "CREATE TABLE t (x INTEGER)").await;
        let outcome = exec(
            &db,
            "INSERT INTO t VALUES (1); INSERT INTO t VALUES (2); CREATE TABLE u (y INTEGER)",
        )
        .await;
        assert_eq!(outcome, QueryOutcome::Mutation { count: 2 });
    }

    #[tokio::test]
    async fn insert_touching_zero_rows_is_empty() {
        let db = memory_db();
        exec(&db, "CREATE TABLE t (x INTEGER)").await;
        assert_eq!(
            exec(&db, "DELETE FROM t WHERE x = 42").await,
            QueryOutcome::Empty
        );
    }
}
