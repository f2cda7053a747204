//! Process-scoped registry of databases and connections.
//!
//! Databases are keyed by canonical spec string and own exactly one engine
//! handle each, created lazily on first connect and shared by every
//! connection referencing the same spec. Connections are keyed by a
//! monotonically increasing numeric token; ids are never reused within a
//! process lifetime.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::{debug, info};

use cabledb_engine::{MEMORY_SPEC, SqliteEngine};
use cabledb_error::{CableError, Result};
use cabledb_proto::ConnectionRef;

/// A registered database: id, canonical spec, and the shared engine handle.
#[derive(Debug)]
pub struct DatabaseEntry {
    pub id: u64,
    pub spec: String,
    pub engine: Arc<SqliteEngine>,
}

#[derive(Clone)]
struct ConnectionEntry {
    database: Arc<DatabaseEntry>,
    active: bool,
}

#[derive(Default)]
struct Inner {
    databases: HashMap<String, Arc<DatabaseEntry>>,
    connections: HashMap<u64, ConnectionEntry>,
    /// One reusable active connection per database id.
    active_by_database: HashMap<u64, u64>,
}

/// Registry of databases-by-spec and connections-by-token.
pub struct Registry {
    inner: Mutex<Inner>,
    next_database_id: AtomicU64,
    next_connection_id: AtomicU64,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            next_database_id: AtomicU64::new(1),
            next_connection_id: AtomicU64::new(1),
        }
    }

    /// Map a client-facing database name to its canonical spec string.
    ///
    /// The mapping is deliberately restrictive: only `default` is known, and
    /// it rewrites to the in-memory spec.
    ///
    /// # Errors
    ///
    /// Unknown names fail with `INVALID_ARGUMENT`.
    pub fn database_spec(name: &str) -> Result<&'static str> {
        if name == "default" {
            Ok(MEMORY_SPEC)
        } else {
            Err(CableError::invalid_argument(format!(
                "unknown database name '{name}'"
            )))
        }
    }

    /// Resolve a name to an active connection, opening the database and/or a
    /// fresh connection as needed. Returns the connection token and the
    /// database it belongs to.
    pub fn resolve_or_open(&self, name: &str) -> Result<(u64, Arc<DatabaseEntry>)> {
        let spec = Self::database_spec(name)?;
        let mut inner = self.inner.lock();

        let database = match inner.databases.get(spec) {
            Some(db) => Arc::clone(db),
            None => {
                let engine = Arc::new(SqliteEngine::open(spec)?);
                let id = self.next_database_id.fetch_add(1, Ordering::Relaxed);
                let entry = Arc::new(DatabaseEntry {
                    id,
                    spec: spec.to_owned(),
                    engine,
                });
                inner.databases.insert(spec.to_owned(), Arc::clone(&entry));
                info!(database = id, spec, "database opened");
                entry
            }
        };

        if let Some(&token) = inner.active_by_database.get(&database.id) {
            debug!(token, database = database.id, "reusing active connection");
            return Ok((token, database));
        }

        let token = self.next_connection_id.fetch_add(1, Ordering::Relaxed);
        inner.connections.insert(
            token,
            ConnectionEntry {
                database: Arc::clone(&database),
                active: true,
            },
        );
        inner.active_by_database.insert(database.id, token);
        debug!(token, database = database.id, "connection opened");
        Ok((token, database))
    }

    /// Look up a connection token, requiring it to exist and be active.
    ///
    /// # Errors
    ///
    /// Fails with `FAILED_PRECONDITION` otherwise.
    pub fn validate(&self, token: u64) -> Result<Arc<DatabaseEntry>> {
        let inner = self.inner.lock();
        match inner.connections.get(&token) {
            Some(entry) if entry.active => Ok(Arc::clone(&entry.database)),
            Some(_) => Err(CableError::failed_precondition(format!(
                "connection {token} is closed"
            ))),
            None => Err(CableError::failed_precondition(format!(
                "unknown connection {token}"
            ))),
        }
    }

    /// Resolve either side of the connection union: a token validates, an
    /// inline name opens or reuses.
    pub fn resolve(&self, connection: &ConnectionRef) -> Result<(u64, Arc<DatabaseEntry>)> {
        match connection {
            ConnectionRef::Token(token) => Ok((*token, self.validate(*token)?)),
            ConnectionRef::Name(name) => self.resolve_or_open(name),
        }
    }

    /// Mark a connection inactive. Its token is never reissued.
    ///
    /// # Errors
    ///
    /// Fails with `FAILED_PRECONDITION` for unknown tokens.
    pub fn close(&self, token: u64) -> Result<()> {
        let mut inner = self.inner.lock();
        let entry = inner.connections.get_mut(&token).ok_or_else(|| {
            CableError::failed_precondition(format!("unknown connection {token}"))
        })?;
        entry.active = false;
        let database_id = entry.database.id;
        if inner.active_by_database.get(&database_id) == Some(&token) {
            inner.active_by_database.remove(&database_id);
        }
        debug!(token, "connection closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cabledb_engine::Engine as _;

    #[test]
    fn unknown_names_are_rejected() {
        let registry = Registry::new();
        let err = registry.resolve_or_open("elsewhere").unwrap_err();
        assert!(matches!(err, CableError::InvalidArgument { .. }));
        assert!(err.to_string().contains("elsewhere"));
    }

    #[test]
    fn connects_reuse_the_active_connection() {
        let registry = Registry::new();
        let (token_a, db_a) = registry.resolve_or_open("default").unwrap();
        let (token_b, db_b) = registry.resolve_or_open("default").unwrap();
        assert_eq!(token_a, token_b);
        assert_eq!(db_a.id, db_b.id);
    }

    #[test]
    fn fresh_tokens_are_immediately_valid() {
        let registry = Registry::new();
        let (token, _) = registry.resolve_or_open("default").unwrap();
        assert!(registry.validate(token).is_ok());
    }

    #[test]
    fn unknown_and_closed_tokens_fail_precondition() {
        let registry = Registry::new();
        let err = registry.validate(999).unwrap_err();
        assert!(matches!(err, CableError::FailedPrecondition { .. }));

        let (token, _) = registry.resolve_or_open("default").unwrap();
        registry.close(token).unwrap();
        let err = registry.validate(token).unwrap_err();
        assert!(matches!(err, CableError::FailedPrecondition { .. }));
    }

    #[test]
    fn closing_frees_the_reuse_slot_but_not_the_token() {
        let registry = Registry::new();
        let (first, _) = registry.resolve_or_open("default").unwrap();
        registry.close(first).unwrap();

        let (second, _) = registry.resolve_or_open("default").unwrap();
        assert_ne!(first, second, "tokens are never reused");
        assert!(registry.validate(second).is_ok());
        assert!(registry.validate(first).is_err());
    }

    #[test]
    fn resolve_dispatches_on_the_union() {
        let registry = Registry::new();
        let (token, _) = registry.resolve(&ConnectionRef::Name("default".to_owned())).unwrap();
        let (same, _) = registry.resolve(&ConnectionRef::Token(token)).unwrap();
        assert_eq!(token, same);
        assert!(registry.resolve(&ConnectionRef::Token(token + 100)).is_err());
    }

    #[test]
    fn databases_share_one_engine() {
        let registry = Registry::new();
        let (_, db_a) = registry.resolve_or_open("default").unwrap();
        db_a.engine.execute("CREATE TABLE shared (x INTEGER)").unwrap();

        // A later resolve sees the same engine, tables included.
        let (_, db_b) = registry.resolve_or_open("default").unwrap();
        let catalog = db_b.engine.catalog().unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog[0].name, "shared");
    }
}
