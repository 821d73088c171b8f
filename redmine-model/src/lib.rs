//! Schema-driven ticket model for a Redmine issue tracker.
//!
//! The set of ticket fields is not fixed at build time. It comes from a
//! configuration document listing built-in (default) fields and tenant-defined
//! (custom) fields:
//! - [`Registry`]: field descriptors, the id → name index for custom fields
//!   and the name → [`Accessor`] dispatch table
//! - [`validate`]: pure per-field checks, run as ordered rule lists
//! - [`wire`]: conversion to and from the tracker's `{"issue": {...}}` JSON
//! - [`Ticket`]: values, unmatched wire data and lifecycle state
//! - [`TicketTransport`]: the boundary to the tracker's REST API
//!
//! ```
//! use redmine_model::{Registry, Ticket};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let registry = Arc::new(Registry::from_yaml_str(r#"
//! default_fields:
//!   subject: { type: String, required: true }
//! custom_fields:
//!   course: { id: 21, type: String, values: [Aコース, Bコース] }
//! "#).unwrap());
//!
//! let mut ticket = Ticket::new(registry);
//! ticket.set("subject", json!("テスト")).unwrap();
//! ticket.set("course", json!("Gコース")).unwrap();
//! assert!(!ticket.validate());
//! assert!(ticket.errors().contains("course"));
//! ```

mod error;
mod registry;
mod schema;
mod ticket;
mod transport;
pub mod validate;
pub mod wire;

pub use error::{TicketError, TicketResult};
pub use registry::{PROJECT_FIELD, RESERVED_ID, Registry};
pub use schema::{Accessor, CompositeKey, CustomFieldDescriptor, FieldDescriptor, ValueType};
pub use ticket::{Attributes, Ticket, TicketState};
pub use transport::TicketTransport;
pub use validate::{ValidationErrors, Violation, ViolationKind};
pub use wire::{DecodedIssue, Unmatched};
