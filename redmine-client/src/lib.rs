//! Redmine REST client for schema-driven tickets.
//!
//! [`Tracker`] reads one configuration document holding both the connection
//! settings and the field schema, and drives tickets through
//! [`HttpTransport`].

mod error;
mod http;
mod settings;
mod tracker;

pub use error::{ClientError, ClientResult};
pub use http::{API_KEY_HEADER, HttpTransport};
pub use settings::{ConnectionSettings, DEFAULT_TIMEOUT_SECS, Endpoint, Overrides};
pub use tracker::Tracker;

pub use redmine_model::{Attributes, Registry, Ticket, TicketError, TicketState};
