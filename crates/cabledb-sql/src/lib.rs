//! SQL parsing and classification for CableDB.
//!
//! The service does not evaluate SQL itself; it needs just enough structure
//! to split a query into statements, assign each a query class (DQL/DML/DDL),
//! compute the access level the query requires, re-serialize statements to a
//! canonical form, and read column declarations out of `CREATE TABLE` text
//! for the table reflector. Everything else is the embedded engine's job.

pub mod create_table;
pub mod lexer;
pub mod statement;
pub mod token;

pub use create_table::{ColumnDef, CreateTable, parse_create_table};
pub use lexer::Lexer;
pub use statement::{SqlStatement, check_access, parse_statements, required_access};
pub use token::{Token, TokenKind};

#[cfg(test)]
mod proptests {
    use cabledb_types::QueryClass;
    use proptest::prelude::*;

    use crate::parse_statements;

    fn statement_strategy() -> impl Strategy<Value = (String, QueryClass)> {
        let ident = "[a-z][a-z0-9_]{0,8}";
        prop_oneof![
            (ident, ident).prop_map(|(t, c)| {
                (format!("SELECT {c} FROM {t}"), QueryClass::Dql)
            }),
            (ident, ident, 0i64..1000).prop_map(|(t, c, v)| {
                (format!("INSERT INTO {t} ({c}) VALUES ({v})"), QueryClass::Dml)
            }),
            (ident, ident, 0i64..1000).prop_map(|(t, c, v)| {
                (format!("UPDATE {t} SET {c} = {v}"), QueryClass::Dml)
            }),
            ident.prop_map(|t| (format!("DELETE FROM {t}"), QueryClass::Dml)),
            (ident, ident).prop_map(|(t, c)| {
                (format!("CREATE TABLE {t} ({c} INTEGER)"), QueryClass::Ddl)
            }),
            ident.prop_map(|t| (format!("DROP TABLE {t}"), QueryClass::Ddl)),
        ]
    }

    proptest! {
        // Compound queries classify per statement, the required access is
        // the per-statement maximum, and the canonical form is stable.
        #[test]
        fn compound_classification_totality(
            parts in proptest::collection::vec(statement_strategy(), 1..5)
        ) {
            let sql = parts
                .iter()
                .map(|(s, _)| s.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            let stmts = parse_statements(&sql).unwrap();
            prop_assert_eq!(stmts.len(), parts.len());

            let mut expected_access = cabledb_types::AccessLevel::Anonymous;
            for (stmt, (_, expected_class)) in stmts.iter().zip(&parts) {
                prop_assert_eq!(stmt.class, *expected_class);
                expected_access = expected_access.max(stmt.required_access());
            }
            prop_assert_eq!(crate::required_access(&stmts), expected_access);

            // Canonical re-parse classifies identically.
            let canonical = stmts
                .iter()
                .map(|s| s.canonical.clone())
                .collect::<Vec<_>>()
                .join("; ");
            let reparsed = parse_statements(&canonical).unwrap();
            for (a, b) in stmts.iter().zip(&reparsed) {
                prop_assert_eq!(a.class, b.class);
                prop_assert_eq!(&a.canonical, &b.canonical);
            }
        }
    }
}
