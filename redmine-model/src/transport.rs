//! Boundary to the remote tracker.

use crate::error::TicketResult;
use serde_json::Value;

/// Performs the actual calls against the tracker.
///
/// Documents passed in and out are full wire documents, envelope included.
/// Implementations block until the tracker answers; timeouts and retries are
/// their own business.
pub trait TicketTransport: Send + Sync {
    /// Fetches one issue. Returns `TicketError::NotFound` for an unknown id and
    /// `TicketError::Transport` for any other failure.
    fn fetch(&self, id: u64) -> TicketResult<Value>;

    /// Creates an issue from a creation payload and returns the stored issue,
    /// including server-assigned fields.
    fn create_remote(&self, payload: &Value) -> TicketResult<Value>;

    /// Deletes an issue. Returns false if the tracker did not confirm it.
    fn delete_remote(&self, id: u64) -> bool;
}
