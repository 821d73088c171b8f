//! Error types for the ticket model.

use crate::validate::ValidationErrors;
use thiserror::Error;

/// Result type for model operations.
pub type TicketResult<T> = Result<T, TicketError>;

/// Errors that can occur while loading a schema or driving a ticket.
#[derive(Debug, Error)]
pub enum TicketError {
    /// The configuration document is unreadable, malformed or ambiguous.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// One or more fields failed validation. Nothing was sent to the tracker.
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),

    /// The tracker has no ticket with this id.
    #[error("ticket not found: {0}")]
    NotFound(u64),

    /// The tracker answered with a non-success outcome.
    #[error("transport failure{}: {message}", .status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    Transport { status: Option<u16>, message: String },

    /// The operation is not allowed in the ticket's current state.
    #[error("illegal state: {0}")]
    IllegalState(String),

    /// No field with this name is registered.
    #[error("unknown field: {0}")]
    UnknownField(String),

    /// The value cannot be stored in the named field at all.
    #[error("cannot assign {field}: {reason}")]
    Assignment { field: String, reason: String },

    /// A wire document does not have the expected envelope.
    #[error("malformed wire document: {0}")]
    MalformedDocument(String),
}

impl TicketError {
    /// Builds a transport failure from an optional HTTP status and a message.
    pub fn transport(status: Option<u16>, message: impl Into<String>) -> Self {
        TicketError::Transport {
            status,
            message: message.into(),
        }
    }

    /// Returns true if the tracker reported the ticket as missing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, TicketError::NotFound(_))
    }

    /// Returns the HTTP status carried by a transport failure.
    pub fn status(&self) -> Option<u16> {
        match self {
            TicketError::Transport { status, .. } => *status,
            TicketError::NotFound(_) => Some(404),
            _ => None,
        }
    }

    /// Returns the collected violations if this is a validation failure.
    pub fn validation_errors(&self) -> Option<&ValidationErrors> {
        match self {
            TicketError::Validation(errors) => Some(errors),
            _ => None,
        }
    }
}
