//! Unified error types for urlvault.
//!
//! Every variant carries a stable code prefix in its display string so that
//! callers (and MCP clients) can match on the failure class.

use std::sync::Arc;

use rmcp::model::{ErrorCode, ErrorData as McpError};

/// Unified error type for cache, store and transport failures.
///
/// `Clone` so a single fetch result can be handed to every waiter attached
/// to the same in-flight request.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// No entry stored under the given key.
    #[error("NOT_FOUND: {0}")]
    NotFound(String),

    /// Storage medium failure on read, write or purge.
    #[error("IO_ERROR: {context}: {source}")]
    Io { context: String, source: Arc<std::io::Error> },

    /// Network or transport failure.
    #[error("TRANSPORT_ERROR: {0}")]
    Transport(String),

    /// Transport gave up waiting for a response.
    #[error("FETCH_TIMEOUT: {0}")]
    FetchTimeout(String),

    /// Response body exceeded the configured limit.
    #[error("FETCH_TOO_LARGE: {0}")]
    FetchTooLarge(String),

    /// Non-success HTTP status.
    #[error("HTTP_ERROR: status {0}")]
    HttpError(u16),

    /// Malformed URL or request descriptor.
    #[error("INVALID_REQUEST: {0}")]
    InvalidRequest(String),

    /// The cache was shut down before the operation could report back.
    #[error("CACHE_CLOSED")]
    Closed,
}

impl Error {
    /// Wrap an I/O error with a short description of what was being done.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Error::Io { context: context.into(), source: Arc::new(source) }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// True for every failure that originated in the transport collaborator.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::Transport(_) | Error::FetchTimeout(_) | Error::FetchTooLarge(_) | Error::HttpError(_)
        )
    }
}

impl From<Error> for McpError {
    fn from(err: Error) -> Self {
        let code = match &err {
            Error::InvalidRequest(_) => -32602,
            Error::NotFound(_) => -32001,
            Error::Io { .. } => -32002,
            Error::FetchTimeout(_) => -32006,
            Error::FetchTooLarge(_) => -32007,
            Error::HttpError(_) | Error::Transport(_) => -32008,
            Error::Closed => -32603,
        };

        McpError { code: ErrorCode(code), message: err.to_string().into(), data: None }
    }
}
