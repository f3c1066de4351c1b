//! Error taxonomy for the workbench.
//!
//! Two layers:
//!
//! - [`ClientError`]: failures reported by the remote analysis backend or
//!   the transport underneath it. Cloneable so cache entries can hold them.
//! - [`WorkbenchError`]: what a command on the workbench can fail with:
//!   either a locally rejected input ([`WorkbenchError::Validation`], never
//!   reaches the network) or a backend failure.
//!
//! A response that arrives after a newer request for the same key is not an
//! error at all; the cache resolves it to [`Outcome::Stale`](crate::cache::Outcome::Stale)
//! and callers drop it.

use thiserror::Error;

/// A failed call to the remote analysis backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// The request never produced an HTTP response (connect, DNS, reset).
    #[error("network error: {0}")]
    Network(String),

    /// The backend rejected the request (4xx).
    #[error("bad request ({status}): {message}")]
    BadRequest { status: u16, message: String },

    /// The backend failed while handling the request (5xx), or answered
    /// with a body that does not match the contract.
    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// The request exceeded the configured timeout.
    #[error("request timed out")]
    Timeout,
}

impl ClientError {
    /// Classify a non-success HTTP status.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        if (400..500).contains(&status) {
            ClientError::BadRequest { status, message }
        } else {
            ClientError::Server { status, message }
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return ClientError::Timeout;
        }
        if err.is_decode() {
            let status = err.status().map(|s| s.as_u16()).unwrap_or(200);
            return ClientError::Server {
                status,
                message: format!("malformed response body: {}", err),
            };
        }
        if let Some(status) = err.status() {
            return ClientError::from_status(status.as_u16(), err.to_string());
        }
        ClientError::Network(err.to_string())
    }
}

/// Error returned by workbench commands (navigation and panel actions).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkbenchError {
    /// Input rejected locally; no request was issued.
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Client(#[from] ClientError),
}

impl WorkbenchError {
    pub fn validation(message: impl Into<String>) -> Self {
        WorkbenchError::Validation(message.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, WorkbenchError::Validation(_))
    }
}
