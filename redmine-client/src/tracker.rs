//! One tracker: a shared field schema plus the transport that reaches it.

use crate::error::{ClientError, ClientResult};
use crate::http::HttpTransport;
use crate::settings::{ConnectionSettings, Overrides};
use redmine_model::{Attributes, Registry, Ticket, TicketTransport};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Entry point for working with tickets.
///
/// ```no_run
/// use redmine_client::Tracker;
/// use serde_json::json;
///
/// let tracker = Tracker::open("config/redmine.yml")?;
/// let attrs = json!({ "subject": "テスト", "course": "Bコース" });
/// let ticket = tracker.create(attrs.as_object().cloned().unwrap_or_default())?;
/// println!("created #{}", ticket.id().unwrap_or_default());
/// # Ok::<(), redmine_client::ClientError>(())
/// ```
#[derive(Debug, Clone)]
pub struct Tracker<T = HttpTransport> {
    registry: Arc<Registry>,
    transport: T,
}

impl Tracker<HttpTransport> {
    /// Loads schema and connection settings from a configuration file.
    pub fn open(path: impl AsRef<Path>) -> ClientResult<Self> {
        Self::open_with(path, &Overrides::default())
    }

    /// Like [`open`](Self::open), with connection values that replace the
    /// file's.
    pub fn open_with(path: impl AsRef<Path>, overrides: &Overrides) -> ClientResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            ClientError::Config(format!("could not read {}: {e}", path.display()))
        })?;
        debug!("Opening tracker configuration {}", path.display());
        Self::from_yaml_str(&text, overrides)
    }

    /// Builds a tracker from the text of a configuration document.
    pub fn from_yaml_str(text: &str, overrides: &Overrides) -> ClientResult<Self> {
        let document: serde_yaml::Value = serde_yaml::from_str(text)
            .map_err(|e| ClientError::Config(format!("could not parse configuration: {e}")))?;
        let settings = ConnectionSettings::from_document(&document)?.merge(overrides);
        let registry = Registry::from_document(document)?;
        Ok(Self::with_transport(
            Arc::new(registry),
            HttpTransport::new(settings)?,
        ))
    }
}

impl<T: TicketTransport> Tracker<T> {
    pub fn with_transport(registry: Arc<Registry>, transport: T) -> Self {
        Self {
            registry,
            transport,
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// A blank ticket bound to this tracker's schema.
    pub fn ticket(&self) -> Ticket {
        Ticket::new(Arc::clone(&self.registry))
    }

    /// Validates `attrs` and creates a ticket from them.
    pub fn create(&self, attrs: Attributes) -> ClientResult<Ticket> {
        let mut ticket = self.ticket();
        ticket.create(&self.transport, attrs)?;
        Ok(ticket)
    }

    /// Loads issue `id`.
    pub fn find(&self, id: u64) -> ClientResult<Ticket> {
        let mut ticket = self.ticket();
        ticket.find(&self.transport, id)?;
        Ok(ticket)
    }

    /// Deletes issue `id`. Returns false if the tracker did not confirm it.
    pub fn delete(&self, id: u64) -> bool {
        self.transport.delete_remote(id)
    }
}
