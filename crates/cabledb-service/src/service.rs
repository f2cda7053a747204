//! The service dispatcher: the five operations of the database service.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, info};

use cabledb_error::{CableError, Result};
use cabledb_proto::{
    ConnectRequest, ConnectResponse, ConnectionHandle, ConnectionRef, DatabaseDescriptor,
    ListRequest, ListResponse, ListenEvent, ListenRequest, QueryRequest, QueryResponse,
    TablesRequest, TablesResponse, WireError, encode_outcome,
};
use cabledb_sql::{check_access, parse_statements};
use cabledb_types::AccessLevel;

use crate::observer::QueryObserver;
use crate::reflector::reflect_tables;
use crate::registry::Registry;

/// Service construction parameters.
#[derive(Debug, Clone, Copy)]
pub struct ServiceConfig {
    /// Access level granted to every caller. There are no per-user
    /// principals; this models deployment policy.
    pub access_level: AccessLevel,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            access_level: AccessLevel::Admin,
        }
    }
}

/// The database service behind the RPC boundary.
pub struct DatabaseService {
    registry: Arc<Registry>,
    access_level: AccessLevel,
}

impl Default for DatabaseService {
    fn default() -> Self {
        Self::new(ServiceConfig::default())
    }
}

impl DatabaseService {
    pub fn new(config: ServiceConfig) -> Self {
        Self {
            registry: Arc::new(Registry::new()),
            access_level: config.access_level,
        }
    }

    /// The registry backing this service.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// `Connect`: map the identifier to a spec, open or reuse a connection,
    /// hand back its token.
    pub async fn connect(&self, request: ConnectRequest) -> Result<ConnectResponse> {
        let (token, database) = self.registry.resolve_or_open(&request.identifier)?;
        info!(token, spec = %database.spec, "connect");
        Ok(ConnectResponse {
            connection: ConnectionHandle { token },
        })
    }

    /// `Query`: resolve the connection, classify and gate the SQL, drive an
    /// observer, and envelope the terminal result. Errors the observer
    /// collected are rethrown at this boundary with their wire code.
    pub async fn query(&self, request: QueryRequest) -> Result<QueryResponse> {
        let connection = request
            .connection
            .ok_or_else(|| CableError::invalid_argument("request has no connection"))?;
        let query = request
            .query
            .ok_or_else(|| CableError::invalid_argument("request has no query"))?;
        let (token, database) = self.registry.resolve(&connection)?;

        let sql = query
            .sql
            .as_deref()
            .ok_or_else(|| CableError::invalid_argument("query has no SQL text"))?;
        let statements = parse_statements(sql)?;
        check_access(&statements, self.access_level)?;
        debug!(token, statements = statements.len(), "query admitted");

        let captured: Arc<Mutex<Option<WireError>>> = Arc::new(Mutex::new(None));
        let capture = Arc::clone(&captured);
        let envelope: Arc<Mutex<Option<cabledb_proto::DatabaseResult>>> =
            Arc::new(Mutex::new(None));
        let envelope_slot = Arc::clone(&envelope);

        let outcome = QueryObserver::new(database, query)
            .on_row(|table, row| {
                debug!(
                    table = table.id,
                    ordinal = row.ordinal,
                    width = row.values.len(),
                    "row"
                );
            })
            .on_end(move |outcome| {
                *envelope_slot.lock() = Some(encode_outcome(outcome));
            })
            .on_error(move |err| {
                *capture.lock() = Some(WireError::from_error(err));
            })
            .recv()
            .await?;

        if let Some(wire_error) = captured.lock().take() {
            return Err(wire_error.into_error());
        }
        let result = envelope
            .lock()
            .take()
            .unwrap_or_else(|| encode_outcome(&outcome));
        Ok(QueryResponse { result })
    }

    /// `List`: the set of databases this service serves. The name table only
    /// knows `default`.
    pub async fn list(&self, request: ListRequest) -> Result<ListResponse> {
        self.resolve_required(request.connection)?;
        Ok(ListResponse {
            database: vec![DatabaseDescriptor {
                name: "default".to_owned(),
            }],
        })
    }

    /// `Tables`: reflect the connection's database schema.
    pub async fn tables(&self, request: TablesRequest) -> Result<TablesResponse> {
        let (_, database) = self.resolve_required(request.connection)?;
        let table = reflect_tables(database.engine.as_ref())?;
        Ok(TablesResponse { table })
    }

    /// `Listen`: stream of change events. The stream yields one empty event;
    /// the transport then terminates it with `UNIMPLEMENTED`. The producer
    /// observes client cancellation as a closed channel.
    pub async fn listen(&self, request: ListenRequest) -> Result<mpsc::Receiver<ListenEvent>> {
        self.resolve_required(request.connection)?;
        let (tx, rx) = mpsc::channel(8);
        tokio::spawn(async move {
            // Each event is independent; a dropped receiver ends the stream.
            let _ = tx.send(ListenEvent::default()).await;
        });
        Ok(rx)
    }

    fn resolve_required(
        &self,
        connection: Option<ConnectionRef>,
    ) -> Result<(u64, Arc<crate::registry::DatabaseEntry>)> {
        let connection =
            connection.ok_or_else(|| CableError::invalid_argument("request has no connection"))?;
        self.registry.resolve(&connection)
    }
}
