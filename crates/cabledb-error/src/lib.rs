use thiserror::Error;

/// Primary error type for CableDB operations.
///
/// Structured variants for the failure modes a request can hit between the
/// wire boundary and the embedded engine, each mapping onto a numeric
/// [`StatusCode`] that travels in error responses.
#[derive(Error, Debug)]
pub enum CableError {
    /// Malformed request: missing fields, unknown identifier, unsupported
    /// column type string.
    #[error("invalid argument: {detail}")]
    InvalidArgument { detail: String },

    /// The query requires a higher access level than the caller holds.
    #[error("permission denied: {detail}")]
    PermissionDenied { detail: String },

    /// Inactive or missing connection, or the engine could not be opened.
    #[error("failed precondition: {detail}")]
    FailedPrecondition { detail: String },

    /// Operation is defined by the protocol but not provided by this server.
    #[error("unimplemented: {what}")]
    Unimplemented { what: String },

    /// Protocol invariant violation or other server-side fault.
    #[error("internal error: {detail}")]
    Internal { detail: String },

    /// SQL text could not be parsed or classified.
    #[error("parse error in statement {statement_index}: {detail}")]
    Parse {
        /// Zero-based ordinal of the statement that failed to parse.
        statement_index: usize,
        detail: String,
    },

    /// A cell could not be coerced to its column's declared type.
    #[error("decode error at column {ordinal} ({declared}): {detail}")]
    Decode {
        ordinal: u32,
        declared: String,
        detail: String,
    },

    /// Failure reported by the embedded SQL engine.
    #[error("engine error: {message}")]
    Engine { message: String },

    /// Transport-level I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed or unexpected wire traffic.
    #[error("protocol error: {detail}")]
    Protocol { detail: String },
}

/// Wire status codes carried in error responses.
///
/// Numeric values are gRPC-compatible so the envelope can cross a standard
/// RPC router unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum StatusCode {
    Ok = 0,
    InvalidArgument = 3,
    PermissionDenied = 7,
    FailedPrecondition = 9,
    Unimplemented = 12,
    Internal = 13,
}

impl StatusCode {
    /// Canonical name of the code, as surfaced in error frames and CLI output.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::FailedPrecondition => "FAILED_PRECONDITION",
            Self::Unimplemented => "UNIMPLEMENTED",
            Self::Internal => "INTERNAL",
        }
    }

    /// Reconstruct a code from its numeric wire value.
    ///
    /// Unknown values collapse to [`StatusCode::Internal`] so a decoded error
    /// never loses its error-ness.
    pub const fn from_wire(value: i32) -> Self {
        match value {
            0 => Self::Ok,
            3 => Self::InvalidArgument,
            7 => Self::PermissionDenied,
            9 => Self::FailedPrecondition,
            12 => Self::Unimplemented,
            _ => Self::Internal,
        }
    }
}

impl std::fmt::Display for StatusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl CableError {
    /// Map this error to its wire status code.
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidArgument { .. } | Self::Parse { .. } => StatusCode::InvalidArgument,
            Self::PermissionDenied { .. } => StatusCode::PermissionDenied,
            Self::FailedPrecondition { .. } => StatusCode::FailedPrecondition,
            Self::Unimplemented { .. } => StatusCode::Unimplemented,
            Self::Internal { .. }
            | Self::Decode { .. }
            | Self::Engine { .. }
            | Self::Io(_)
            | Self::Protocol { .. } => StatusCode::Internal,
        }
    }

    /// Process exit code for CLI use.
    pub const fn exit_code(&self) -> i32 {
        self.status_code() as i32
    }

    /// Create an invalid-argument error.
    pub fn invalid_argument(detail: impl Into<String>) -> Self {
        Self::InvalidArgument {
            detail: detail.into(),
        }
    }

    /// Create a permission-denied error.
    pub fn permission_denied(detail: impl Into<String>) -> Self {
        Self::PermissionDenied {
            detail: detail.into(),
        }
    }

    /// Create a failed-precondition error.
    pub fn failed_precondition(detail: impl Into<String>) -> Self {
        Self::FailedPrecondition {
            detail: detail.into(),
        }
    }

    /// Create an unimplemented error.
    pub fn unimplemented(what: impl Into<String>) -> Self {
        Self::Unimplemented { what: what.into() }
    }

    /// Create an internal error.
    pub fn internal(detail: impl Into<String>) -> Self {
        Self::Internal {
            detail: detail.into(),
        }
    }

    /// Create a parse error for the statement at `statement_index`.
    pub fn parse(statement_index: usize, detail: impl Into<String>) -> Self {
        Self::Parse {
            statement_index,
            detail: detail.into(),
        }
    }

    /// Create an engine error.
    pub fn engine(message: impl Into<String>) -> Self {
        Self::Engine {
            message: message.into(),
        }
    }

    /// Create a protocol error.
    pub fn protocol(detail: impl Into<String>) -> Self {
        Self::Protocol {
            detail: detail.into(),
        }
    }
}

/// Result type alias using `CableError`.
pub type Result<T> = std::result::Result<T, CableError>;
