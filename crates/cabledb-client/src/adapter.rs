//! The adapter facade: the typed client surface over the wire protocol.
//!
//! Holds a transport, the connection token once connected, and a connected
//! flag — nothing else. All parsing and classification decisions live
//! server-side; the adapter only translates envelopes back into the
//! result-mode union.

use tracing::warn;

use cabledb_error::{CableError, Result};
use cabledb_proto::{
    ConnectRequest, ConnectionRef, QueryRequest, Reply, Request, TablesRequest, decode_result,
};
use cabledb_types::{Query, QueryOutcome, TableSpec};

use crate::transport::Transport;

/// Client-side database handle.
pub struct DbAdapter {
    transport: Transport,
    database: String,
    token: Option<u64>,
    connected: bool,
}

impl DbAdapter {
    /// Wrap a transport, targeting the given database name.
    pub fn new(transport: Transport, database: impl Into<String>) -> Self {
        Self {
            transport,
            database: database.into(),
            token: None,
            connected: false,
        }
    }

    /// Whether a `connect` has succeeded.
    pub const fn is_connected(&self) -> bool {
        self.connected
    }

    /// The token issued by the last successful `connect`.
    pub const fn token(&self) -> Option<u64> {
        self.token
    }

    /// Open (or reuse) a server-side connection by name, storing the token.
    ///
    /// # Errors
    ///
    /// Surfaces the wire error unchanged; the adapter is left disconnected.
    pub async fn connect(&mut self, name: &str) -> Result<u64> {
        let request = Request::Connect(ConnectRequest {
            identifier: name.to_owned(),
        });
        match self.transport.call(request).await {
            Ok(Reply::Connect(response)) => {
                let token = response.connection.token;
                self.token = Some(token);
                self.connected = true;
                Ok(token)
            }
            Ok(_) => {
                self.connected = false;
                Err(CableError::protocol("unexpected reply to Connect"))
            }
            Err(err) => {
                self.connected = false;
                self.token = None;
                Err(err)
            }
        }
    }

    /// The connection reference for the next request: the stored token, or
    /// an inline spec when no connect has happened yet.
    fn connection_ref(&self) -> ConnectionRef {
        match self.token {
            Some(token) => ConnectionRef::Token(token),
            None => ConnectionRef::Name(self.database.clone()),
        }
    }

    async fn run_query(&mut self, query: Query) -> Result<QueryOutcome> {
        let request = Request::Query(QueryRequest {
            connection: Some(self.connection_ref()),
            query: Some(query),
        });
        match self.transport.call(request).await? {
            Reply::Query(response) => decode_result(&response.result),
            _ => Err(CableError::protocol("unexpected reply to Query")),
        }
    }

    /// Execute a statement (statement flag set). Yields `Empty` or
    /// `Mutation`; a row-bearing envelope is downgraded to `Empty` and
    /// discarded, since the caller asserted no result was expected.
    pub async fn exec(&mut self, sql: &str) -> Result<QueryOutcome> {
        let outcome = self.run_query(Query::statement(sql)).await?;
        match outcome {
            QueryOutcome::Empty | QueryOutcome::Mutation { .. } | QueryOutcome::Failure { .. } => {
                Ok(outcome)
            }
            other => {
                warn!(mode = other.mode(), "exec received a row-bearing result; discarding");
                Ok(QueryOutcome::Empty)
            }
        }
    }

    /// Run a row-producing query (statement flag unset). Yields any of the
    /// five result modes.
    pub async fn query(&mut self, sql: &str) -> Result<QueryOutcome> {
        self.run_query(Query::new(sql)).await
    }

    /// Reflect the connection's tables.
    pub async fn tables(&mut self) -> Result<Vec<TableSpec>> {
        let request = Request::Tables(TablesRequest {
            connection: Some(self.connection_ref()),
        });
        match self.transport.call(request).await? {
            Reply::Tables(response) => Ok(response.table),
            _ => Err(CableError::protocol("unexpected reply to Tables")),
        }
    }

    /// Access the underlying transport (e.g. for listen streams).
    pub fn transport_mut(&mut self) -> &mut Transport {
        &mut self.transport
    }
}
