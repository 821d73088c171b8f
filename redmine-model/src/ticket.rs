use crate::error::{TicketError, TicketResult};
use crate::registry::{PROJECT_FIELD, Registry, blank_composite};
use crate::schema::{Accessor, CompositeKey};
use crate::transport::TicketTransport;
use crate::validate::{self, ValidationErrors};
use crate::wire::{self, DecodedIssue, Unmatched};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Field name → value pairs, as accepted by [`Ticket::assign`].
pub type Attributes = Map<String, Value>;

/// Where a ticket is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketState {
    /// Built locally, not validated since the last change.
    New,
    /// Passed validation and not changed since.
    Validated,
    /// Reflects an issue stored on the tracker.
    Persisted,
    /// Deleted on the tracker. Terminal.
    Deleted,
}

/// An issue whose fields are defined by a [`Registry`].
///
/// Values are stored as JSON under the field name. Composite fields always hold
/// `{id, name}`; `<name>_id` and `<name>_name` read and write inside it. Absent
/// entries are unset, which is different from an empty string.
#[derive(Debug, Clone)]
pub struct Ticket {
    registry: Arc<Registry>,
    id: Option<u64>,
    values: BTreeMap<String, Value>,
    unmatched: Unmatched,
    errors: ValidationErrors,
    values_check: bool,
    state: TicketState,
}

impl Ticket {
    /// An empty ticket. The configured project id, if any, is pre-set.
    pub fn new(registry: Arc<Registry>) -> Self {
        let values_check = registry.values_check();
        let mut ticket = Self {
            values: registry.blank_values(),
            registry,
            id: None,
            unmatched: Unmatched::default(),
            errors: ValidationErrors::new(),
            values_check,
            state: TicketState::New,
        };
        if let Some(project_id) = ticket.registry.project_id() {
            ticket.with_composite(PROJECT_FIELD, |parts| {
                parts.insert(CompositeKey::Id.as_str().to_string(), Value::from(project_id));
            });
        }
        ticket
    }

    /// A new ticket with the given attributes assigned.
    pub fn with_attributes(registry: Arc<Registry>, attrs: Attributes) -> TicketResult<Self> {
        let mut ticket = Self::new(registry);
        ticket.assign(attrs)?;
        Ok(ticket)
    }

    /// A ticket populated from a wire document. It is `Persisted` when the
    /// document carries an id.
    pub fn from_wire_document(registry: Arc<Registry>, document: &Value) -> TicketResult<Self> {
        let decoded = wire::from_wire_document(&registry, document)?;
        let mut ticket = Self::new(registry);
        ticket.apply(decoded);
        ticket.state = if ticket.id.is_some() {
            TicketState::Persisted
        } else {
            TicketState::New
        };
        Ok(ticket)
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// The tracker's id, known after a successful create or find.
    pub fn id(&self) -> Option<u64> {
        self.id
    }

    pub fn state(&self) -> TicketState {
        self.state
    }

    /// Stored values by field name. Composites appear as `{id, name}`.
    pub fn values(&self) -> &BTreeMap<String, Value> {
        &self.values
    }

    /// Wire data from the last read that had no descriptor.
    pub fn unmatched(&self) -> &Unmatched {
        &self.unmatched
    }

    /// Violations found by the last [`validate`](Self::validate).
    pub fn errors(&self) -> &ValidationErrors {
        &self.errors
    }

    /// Whether [`validate`](Self::validate) checks allowed values.
    pub fn values_check(&self) -> bool {
        self.values_check
    }

    /// Turns the allowed-values check on or off. A validated ticket must be
    /// validated again.
    pub fn set_values_check(&mut self, enabled: bool) {
        if self.values_check != enabled && self.state == TicketState::Validated {
            self.state = TicketState::New;
        }
        self.values_check = enabled;
    }

    // ── Accessors ────────────────────────────────────────────────

    /// Reads a field or projection. Unset and null both read as `None`.
    pub fn get(&self, name: &str) -> Option<&Value> {
        let accessor = self.registry.accessor(name)?;
        let stored = self.values.get(self.registry.storage_key(accessor));
        let value = match accessor {
            Accessor::CompositePart(_, part) => stored.and_then(|v| v.get(part.as_str())),
            _ => stored,
        };
        value.filter(|v| !v.is_null())
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    pub fn get_u64(&self, name: &str) -> Option<u64> {
        self.get(name).and_then(Value::as_u64)
    }

    /// Reads a sequence of strings, skipping non-string elements.
    pub fn get_strings(&self, name: &str) -> Option<Vec<&str>> {
        self.get(name)
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_str).collect())
    }

    /// Writes a field or projection. Null unsets plain and custom fields and
    /// clears a projection.
    ///
    /// Assigning an object to a composite copies its `id` and `name` keys into
    /// the existing structure. `<name>_id` turns numeric strings into integers,
    /// and so does an id list for each element; other values are kept as
    /// given and left to validation.
    pub fn set(&mut self, name: &str, value: Value) -> TicketResult<()> {
        let accessor = self
            .registry
            .accessor(name)
            .ok_or_else(|| TicketError::UnknownField(name.to_string()))?;
        let key = self.registry.storage_key(accessor).to_string();

        match accessor {
            Accessor::Scalar(_) | Accessor::Custom(_) => {
                if value.is_null() {
                    self.values.remove(&key);
                } else {
                    self.values.insert(key, value);
                }
            }
            Accessor::Composite(_) => match value {
                Value::Null => {
                    self.values.insert(key, blank_composite());
                }
                Value::Object(given) => self.with_composite(&key, |parts| {
                    for part in CompositeKey::ALL {
                        if let Some(v) = given.get(part.as_str()) {
                            parts.insert(part.as_str().to_string(), v.clone());
                        }
                    }
                }),
                other => {
                    return Err(TicketError::Assignment {
                        field: name.to_string(),
                        reason: format!("expected an {{id, name}} object, got {other}"),
                    });
                }
            },
            Accessor::CompositePart(_, part) => {
                let value = coerce_part(part, value);
                self.with_composite(&key, |parts| {
                    parts.insert(part.as_str().to_string(), value);
                });
            }
            Accessor::IdList(_) => match value {
                Value::Null => {
                    self.values.remove(&key);
                }
                Value::Array(ids) => {
                    let ids = ids
                        .into_iter()
                        .map(|id| coerce_part(CompositeKey::Id, id))
                        .collect();
                    self.values.insert(key, Value::Array(ids));
                }
                other => {
                    self.values.insert(key, other);
                }
            },
        }

        if self.state == TicketState::Validated {
            self.state = TicketState::New;
        }
        Ok(())
    }

    pub fn unset(&mut self, name: &str) -> TicketResult<()> {
        self.set(name, Value::Null)
    }

    /// Assigns every attribute. If any assignment fails none of them apply.
    pub fn assign(&mut self, attrs: Attributes) -> TicketResult<()> {
        let snapshot = (self.values.clone(), self.state);
        for (name, value) in attrs {
            if let Err(e) = self.set(&name, value) {
                (self.values, self.state) = snapshot;
                return Err(e);
            }
        }
        Ok(())
    }

    // ── Validation & wire form ───────────────────────────────────

    /// Runs every validation rule, keeps the result in [`errors`](Self::errors)
    /// and returns whether the ticket is valid.
    pub fn validate(&mut self) -> bool {
        self.errors = validate::validate_with(&self.registry, &self.values, self.values_check);
        let valid = self.errors.is_empty();
        if valid && self.state == TicketState::New {
            self.state = TicketState::Validated;
        }
        valid
    }

    /// The creation payload for the current values.
    pub fn to_wire_payload(&self) -> Value {
        wire::to_wire_payload(&self.registry, &self.values)
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Merges `attrs`, validates, and creates the issue on the tracker.
    ///
    /// Invalid tickets are never sent; the violations are returned and also
    /// kept in [`errors`](Self::errors). On success the ticket is repopulated
    /// from the tracker's answer, server defaults included. On a transport
    /// failure the ticket stays `Validated` without an id.
    pub fn create<T>(&mut self, transport: &T, attrs: Attributes) -> TicketResult<()>
    where
        T: TicketTransport + ?Sized,
    {
        match self.state {
            TicketState::Persisted => {
                return Err(TicketError::IllegalState(format!(
                    "ticket {} already exists; updates are not supported",
                    self.id.unwrap_or_default()
                )));
            }
            TicketState::Deleted => {
                return Err(TicketError::IllegalState("ticket has been deleted".into()));
            }
            TicketState::New | TicketState::Validated => {}
        }

        self.assign(attrs)?;
        if !self.validate() {
            debug!("Ticket rejected by validation: {}", self.errors);
            return Err(TicketError::Validation(self.errors.clone()));
        }

        let document = transport.create_remote(&self.to_wire_payload())?;
        let decoded = wire::from_wire_document(&self.registry, &document)?;
        let Some(id) = decoded.id else {
            return Err(TicketError::MalformedDocument(
                "created issue carries no id".into(),
            ));
        };

        self.apply(decoded);
        self.state = TicketState::Persisted;
        info!(id, "Created ticket");
        Ok(())
    }

    /// Shorthand for [`create`](Self::create) with no extra attributes.
    pub fn save<T>(&mut self, transport: &T) -> TicketResult<()>
    where
        T: TicketTransport + ?Sized,
    {
        self.create(transport, Attributes::new())
    }

    /// Replaces this ticket's contents with the tracker's issue `id`. On
    /// failure nothing changes.
    pub fn find<T>(&mut self, transport: &T, id: u64) -> TicketResult<()>
    where
        T: TicketTransport + ?Sized,
    {
        if self.state == TicketState::Deleted {
            return Err(TicketError::IllegalState("ticket has been deleted".into()));
        }

        let document = transport.fetch(id)?;
        let mut decoded = wire::from_wire_document(&self.registry, &document)?;
        decoded.id.get_or_insert(id);

        self.apply(decoded);
        self.state = TicketState::Persisted;
        debug!(id, "Loaded ticket");
        Ok(())
    }

    /// Deletes issue `id`, or this ticket's own id when `None`. Local values
    /// are kept so the deleted snapshot stays readable.
    pub fn delete<T>(&mut self, transport: &T, id: Option<u64>) -> TicketResult<bool>
    where
        T: TicketTransport + ?Sized,
    {
        if self.state == TicketState::Deleted {
            return Err(TicketError::IllegalState("ticket has been deleted".into()));
        }
        let target = id
            .or(self.id)
            .ok_or_else(|| TicketError::IllegalState("no ticket id to delete".into()))?;

        let deleted = transport.delete_remote(target);
        if deleted && self.id == Some(target) {
            self.state = TicketState::Deleted;
        }
        if deleted {
            info!(id = target, "Deleted ticket");
        } else {
            debug!(id = target, "Tracker did not confirm deletion");
        }
        Ok(deleted)
    }

    fn apply(&mut self, decoded: DecodedIssue) {
        self.id = decoded.id;
        self.values = decoded.values;
        self.unmatched = decoded.unmatched;
        self.errors = ValidationErrors::new();
    }

    fn with_composite(&mut self, key: &str, f: impl FnOnce(&mut Map<String, Value>)) {
        let slot = self
            .values
            .entry(key.to_string())
            .or_insert_with(blank_composite);
        if !slot.is_object() {
            *slot = blank_composite();
        }
        if let Value::Object(parts) = slot {
            f(parts);
        }
    }
}

fn coerce_part(part: CompositeKey, value: Value) -> Value {
    match (part, value) {
        (CompositeKey::Id, Value::String(text)) => match text.trim().parse::<u64>() {
            Ok(id) => Value::from(id),
            Err(_) => Value::String(text),
        },
        (CompositeKey::Name, Value::Number(n)) => Value::String(n.to_string()),
        (_, other) => other,
    }
}
