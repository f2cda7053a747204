//! The table reflector: engine catalog → column-typed table descriptors.

use cabledb_engine::Engine;
use cabledb_error::{CableError, Result};
use cabledb_sql::parse_create_table;
use cabledb_types::{ColumnSpec, ColumnType, TableSpec};

/// Read the engine's catalog and reflect every user table.
///
/// Each catalog entry's creation SQL is parsed back through the classifier;
/// the declaration must be a single `CREATE TABLE` whose name matches the
/// catalog, and every declared column type must come from the closed
/// TEXT/INTEGER/REAL/BLOB set. Descriptors are returned in table-name order
/// with ids numbered from 1.
///
/// # Errors
///
/// `INVALID_ARGUMENT` for an unrecognized declared type or a declaration
/// mismatch; engine failures pass through.
pub fn reflect_tables(engine: &dyn Engine) -> Result<Vec<TableSpec>> {
    let entries = engine.catalog()?;
    let mut tables = Vec::with_capacity(entries.len());

    for (index, entry) in entries.iter().enumerate() {
        let declaration = parse_create_table(&entry.sql)?;
        if !declaration.name.eq_ignore_ascii_case(&entry.name) {
            return Err(CableError::invalid_argument(format!(
                "catalog entry '{}' declares table '{}'",
                entry.name, declaration.name
            )));
        }

        let mut columns = Vec::with_capacity(declaration.columns.len());
        for (ordinal, column) in declaration.columns.iter().enumerate() {
            let column_type = match &column.declared_type {
                None => ColumnType::Unspecified,
                Some(declared) => ColumnType::from_declared(declared).ok_or_else(|| {
                    CableError::invalid_argument(format!(
                        "unsupported column type '{declared}' on {}.{}",
                        entry.name, column.name
                    ))
                })?,
            };
            columns.push(ColumnSpec::named(
                ordinal as u32,
                column.name.clone(),
                column_type,
            ));
        }

        tables.push(TableSpec {
            id: index as u32 + 1,
            name: Some(entry.name.clone()),
            columns,
        });
    }

    Ok(tables)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cabledb_engine::{MEMORY_SPEC, SqliteEngine};

    fn engine_with(schema: &str) -> SqliteEngine {
        let engine = SqliteEngine::open(MEMORY_SPEC).unwrap();
        engine.execute(schema).unwrap();
        engine
    }

    #[test]
    fn reflects_tables_in_name_order() {
        let engine = engine_with(
            "CREATE TABLE zebra (a TEXT, b BLOB); \
             CREATE TABLE apple (id INTEGER PRIMARY KEY, score REAL)",
        );
        let tables = reflect_tables(&engine).unwrap();
        assert_eq!(tables.len(), 2);

        assert_eq!(tables[0].id, 1);
        assert_eq!(tables[0].name.as_deref(), Some("apple"));
        assert_eq!(
            tables[0].columns,
            vec![
                ColumnSpec::named(0, "id", ColumnType::Integer),
                ColumnSpec::named(1, "score", ColumnType::Real),
            ]
        );

        assert_eq!(tables[1].id, 2);
        assert_eq!(tables[1].name.as_deref(), Some("zebra"));
        assert_eq!(
            tables[1].columns,
            vec![
                ColumnSpec::named(0, "a", ColumnType::Text),
                ColumnSpec::named(1, "b", ColumnType::Blob),
            ]
        );
    }

    #[test]
    fn untyped_columns_reflect_as_unspecified() {
        let engine = engine_with("CREATE TABLE t (x, y TEXT)");
        let tables = reflect_tables(&engine).unwrap();
        assert_eq!(tables[0].columns[0].column_type, ColumnType::Unspecified);
        assert_eq!(tables[0].columns[1].column_type, ColumnType::Text);
    }

    #[test]
    fn unknown_declared_types_fail() {
        let engine = engine_with("CREATE TABLE t (v VARCHAR(10))");
        let err = reflect_tables(&engine).unwrap_err();
        assert!(matches!(err, CableError::InvalidArgument { .. }));
        assert!(err.to_string().contains("VARCHAR(10)"), "{err}");
        assert!(err.to_string().contains("t.v"), "{err}");
    }

    #[test]
    fn indexes_and_views_are_not_reflected() {
        let engine = engine_with(
            "CREATE TABLE t (x INTEGER); \
             CREATE INDEX idx ON t (x); \
             CREATE VIEW v AS SELECT x FROM t",
        );
        let tables = reflect_tables(&engine).unwrap();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].name.as_deref(), Some("t"));
    }

    #[test]
    fn empty_catalog_reflects_to_nothing() {
        let engine = SqliteEngine::open(MEMORY_SPEC).unwrap();
        assert!(reflect_tables(&engine).unwrap().is_empty());
    }
}
