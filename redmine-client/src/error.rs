//! Client error types.

use redmine_model::TicketError;
use thiserror::Error;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur while talking to the tracker.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invalid tracker uri {uri:?}: {reason}")]
    InvalidUri { uri: String, reason: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("issue not found: {0}")]
    NotFound(u64),

    #[error("tracker answered {status}: {message}")]
    Status { status: u16, message: String },

    #[error(transparent)]
    Model(#[from] TicketError),
}

impl ClientError {
    /// Returns the HTTP status behind this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Status { status, .. } => Some(*status),
            ClientError::NotFound(_) => Some(404),
            ClientError::Http(e) => e.status().map(|s| s.as_u16()),
            ClientError::Model(e) => e.status(),
            _ => None,
        }
    }

    /// Returns true if the tracker reported the issue as missing.
    pub fn is_not_found(&self) -> bool {
        match self {
            ClientError::NotFound(_) => true,
            ClientError::Model(e) => e.is_not_found(),
            _ => false,
        }
    }
}

impl From<ClientError> for TicketError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::NotFound(id) => TicketError::NotFound(id),
            ClientError::Status { status, message } => TicketError::transport(Some(status), message),
            ClientError::Http(e) => {
                TicketError::transport(e.status().map(|s| s.as_u16()), e.to_string())
            }
            ClientError::Model(e) => e,
            other @ (ClientError::Config(_) | ClientError::InvalidUri { .. }) => {
                TicketError::Config(other.to_string())
            }
        }
    }
}
