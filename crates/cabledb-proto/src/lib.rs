//! Wire protocol for CableDB.
//!
//! Defines the request/response message shapes, the `DatabaseResult`
//! envelope with its translation to and from the internal result-mode union,
//! and the length-prefixed frame codec the transport uses. Only the shapes
//! here are contractual; the transport is a generic router for them.

pub mod envelope;
pub mod frame;

pub use envelope::{
    DatabaseResult, DatabaseValue, MutationCount, ResultSet, ValueResult, decode_result,
    encode_outcome,
};
pub use frame::{MAX_FRAME_LEN, read_frame, write_frame};

use cabledb_error::{CableError, StatusCode};
use cabledb_types::{Query, TableSpec};

// ---------------------------------------------------------------------------
// Connection addressing
// ---------------------------------------------------------------------------

/// How a request names its connection: a previously issued token, or an
/// inline database name that opens (or reuses) a connection on first use.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionRef {
    Token(u64),
    Name(String),
}

/// An open connection, as returned by `Connect`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ConnectionHandle {
    pub token: u64,
}

// ---------------------------------------------------------------------------
// Requests and replies
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ConnectRequest {
    /// Database name; the only identifier case the protocol supports.
    pub identifier: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ConnectResponse {
    pub connection: ConnectionHandle,
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct QueryRequest {
    /// Absent connections are a client error, reported as `INVALID_ARGUMENT`.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub connection: Option<ConnectionRef>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub query: Option<Query>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct QueryResponse {
    pub result: DatabaseResult,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ListRequest {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub connection: Option<ConnectionRef>,
}

/// Descriptor of one database known to the service.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DatabaseDescriptor {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ListResponse {
    pub database: Vec<DatabaseDescriptor>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TablesRequest {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub connection: Option<ConnectionRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TablesResponse {
    pub table: Vec<TableSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ListenRequest {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub connection: Option<ConnectionRef>,
}

/// One event on a `Listen` stream. Currently carries no payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ListenEvent {}

/// The five operations of the service.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Request {
    Connect(ConnectRequest),
    Query(QueryRequest),
    List(ListRequest),
    Tables(TablesRequest),
    Listen(ListenRequest),
}

impl Request {
    /// Operation name, for logs.
    pub const fn method(&self) -> &'static str {
        match self {
            Self::Connect(_) => "Connect",
            Self::Query(_) => "Query",
            Self::List(_) => "List",
            Self::Tables(_) => "Tables",
            Self::Listen(_) => "Listen",
        }
    }
}

/// Unary replies, one per non-streaming operation.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reply {
    Connect(ConnectResponse),
    Query(QueryResponse),
    List(ListResponse),
    Tables(TablesResponse),
}

// ---------------------------------------------------------------------------
// Framing
// ---------------------------------------------------------------------------

/// A request as it travels on the wire.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RequestFrame {
    /// Correlation id chosen by the client, echoed in every response frame.
    pub id: u64,
    pub request: Request,
}

/// A response frame. Unary operations answer with a single `done` frame;
/// `Listen` emits zero or more `done: false` event frames first.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ResponseFrame {
    pub id: u64,
    pub done: bool,
    pub payload: ResponsePayload,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponsePayload {
    Reply(Reply),
    Event(ListenEvent),
    Error(WireError),
}

/// An error as carried in a response frame.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct WireError {
    pub code: i32,
    pub status: String,
    pub message: String,
}

impl WireError {
    /// Build the wire form of a service-side error.
    pub fn from_error(err: &CableError) -> Self {
        let code = err.status_code();
        Self {
            code: code as i32,
            status: code.name().to_owned(),
            message: err.to_string(),
        }
    }

    /// Reconstruct a client-side error of the matching kind.
    pub fn into_error(self) -> CableError {
        // Server-side Display output repeats the kind; don't stack prefixes.
        let detail = |prefix: &str| {
            self.message
                .strip_prefix(prefix)
                .unwrap_or(&self.message)
                .to_owned()
        };
        match StatusCode::from_wire(self.code) {
            StatusCode::InvalidArgument => {
                CableError::invalid_argument(detail("invalid argument: "))
            }
            StatusCode::PermissionDenied => {
                CableError::permission_denied(detail("permission denied: "))
            }
            StatusCode::FailedPrecondition => {
                CableError::failed_precondition(detail("failed precondition: "))
            }
            StatusCode::Unimplemented => CableError::unimplemented(detail("unimplemented: ")),
            StatusCode::Ok | StatusCode::Internal => {
                CableError::internal(detail("internal error: "))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_ref_serde_shape() {
        assert_eq!(
            serde_json::to_string(&ConnectionRef::Token(7)).unwrap(),
            r#"{"token":7}"#
        );
        assert_eq!(
            serde_json::to_string(&ConnectionRef::Name("default".to_owned())).unwrap(),
            r#"{"name":"default"}"#
        );
        let back: ConnectionRef = serde_json::from_str(r#"{"token":3}"#).unwrap();
        assert_eq!(back, ConnectionRef::Token(3));
    }

    #[test]
    fn request_frame_round_trip() {
        let frame = RequestFrame {
            id: 42,
            request: Request::Query(QueryRequest {
                connection: Some(ConnectionRef::Token(1)),
                query: Some(Query::statement("DELETE FROM t")),
            }),
        };
        let json = serde_json::to_string(&frame).unwrap();
        let back: RequestFrame = serde_json::from_str(&json).unwrap();
        assert_eq!(back, frame);
        assert_eq!(back.request.method(), "Query");
    }

    #[test]
    fn wire_error_round_trip() {
        let original = CableError::permission_denied("statement 1 requires ADMIN");
        let wire = WireError::from_error(&original);
        assert_eq!(wire.code, 7);
        assert_eq!(wire.status, "PERMISSION_DENIED");

        let back = wire.into_error();
        assert_eq!(back.status_code(), original.status_code());
        assert!(back.to_string().contains("statement 1 requires ADMIN"));
    }

    #[test]
    fn unknown_wire_code_becomes_internal() {
        let wire = WireError {
            code: 55,
            status: "MYSTERY".to_owned(),
            message: "??".to_owned(),
        };
        assert_eq!(
            wire.into_error().status_code(),
            cabledb_error::StatusCode::Internal
        );
    }
}
