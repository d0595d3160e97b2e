//! Error types for the Algo_Domo bridge.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

/// A specialized Result type for bridge operations.
pub type Result<T> = std::result::Result<T, BridgeError>;

/// The main error type for all bridge operations.
///
/// Every variant maps to exactly one JSON error kind exposed at the HTTP
/// boundary; see [`BridgeError::kind`].
#[derive(Debug, Error)]
pub enum BridgeError {
    /// A request parameter was missing or could not be parsed.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The request's token did not match the configured token (or none is configured).
    #[error("unauthorised")]
    Unauthorised,

    /// The named entity, board, or route does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The HTTP method is not allowed on this route.
    #[error("method not allowed")]
    MethodNotAllowed,

    /// The gateway reply was too short or carried no valid frame delimiter.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A raw-mode exchange (address programming) got no reply at all, or
    /// fewer bytes than expected, before the peer closed the connection.
    #[error("no reply: {0}")]
    NoReply(String),

    /// The transaction deadline elapsed before a reply was assembled.
    #[error("timeout")]
    Timeout,

    /// The TCP connect/read/write call itself failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// Any other unexpected internal failure.
    #[error("internal error: {0}")]
    Internal(String),

    /// Filesystem I/O failure while reading or writing a persisted document.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A JSON document failed to parse or failed normalisation.
    #[error("invalid document: {0}")]
    InvalidDocument(String),
}

impl BridgeError {
    /// The HTTP status code and the short Italian phrase returned in
    /// `{ok:false, error:"..."}` replies.
    pub fn kind(&self) -> (u16, &'static str) {
        match self {
            Self::BadRequest(_) => (400, "richiesta non valida"),
            Self::Unauthorised => (401, "non autorizzato"),
            Self::NotFound(_) => (404, "non trovato"),
            Self::MethodNotAllowed => (405, "metodo non consentito"),
            Self::Protocol(_) => (500, "errore di protocollo"),
            Self::NoReply(_) => (500, "nessuna risposta"),
            Self::Timeout => (500, "timeout"),
            Self::Transport(_) => (500, "errore di trasporto"),
            Self::Internal(_) => (500, "errore interno"),
            Self::Io(_) => (500, "errore interno"),
            Self::InvalidDocument(_) => (500, "errore interno"),
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    pub fn no_reply(msg: impl Into<String>) -> Self {
        Self::NoReply(msg.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

/// Every error kind is surfaced at the HTTP boundary as `{ok:false, error:"<phrase>"}`
/// with the status code from [`BridgeError::kind`] (spec §7).
impl IntoResponse for BridgeError {
    fn into_response(self) -> Response {
        let (status, phrase) = self.kind();
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(serde_json::json!({"ok": false, "error": phrase}))).into_response()
    }
}
