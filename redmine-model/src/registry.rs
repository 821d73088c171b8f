//! Schema registry built from the configuration document.
//!
//! The document carries two sections, `default_fields` and `custom_fields`
//! (the older `*_format` spellings are accepted too):
//!
//! ```yaml
//! project_id: 4
//! default_fields:
//!   project: { type: Hash, has_id: true, on_create: true, required: true }
//!   subject: { type: String }
//!   watcher_user: { type: Array, has_id: true, on_create: true }
//! custom_fields:
//!   course: { id: 21, type: String, required: true, values: [Aコース, Bコース] }
//! values_check: true
//! ```
//!
//! Loading happens once. The resulting [`Registry`] is immutable and shared
//! between tickets through an `Arc`.

use crate::error::{TicketError, TicketResult};
use crate::schema::{Accessor, CompositeKey, CustomFieldDescriptor, FieldDescriptor, ValueType};
use crate::wire::CUSTOM_FIELDS_KEY;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::debug;

/// Name of the default field that receives the configured `project_id`.
pub const PROJECT_FIELD: &str = "project";

/// Field name reserved for the ticket's own id.
pub const RESERVED_ID: &str = "id";

#[derive(Debug, Deserialize)]
struct RawDocument {
    #[serde(default, alias = "default_fields_format")]
    default_fields: Option<serde_yaml::Mapping>,
    #[serde(default, alias = "custom_fields_format")]
    custom_fields: Option<serde_yaml::Mapping>,
    #[serde(default)]
    project_id: Option<u64>,
    #[serde(default)]
    values_check: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct RawDefaultField {
    #[serde(default, rename = "type")]
    value_type: ValueType,
    #[serde(default, deserialize_with = "flag")]
    has_id: bool,
    #[serde(default, deserialize_with = "flag")]
    on_create: bool,
    #[serde(default, deserialize_with = "flag")]
    required: bool,
}

#[derive(Debug, Deserialize)]
struct RawCustomField {
    id: u64,
    #[serde(default, rename = "type")]
    value_type: ValueType,
    #[serde(default, deserialize_with = "flag")]
    required: bool,
    #[serde(default, deserialize_with = "flag")]
    multiple: bool,
    #[serde(default)]
    values: Option<Vec<serde_yaml::Value>>,
}

/// Accepts `true`/`false` as booleans or as strings; older documents quote them.
fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Text(String),
    }

    match Option::<Flag>::deserialize(deserializer)? {
        None => Ok(false),
        Some(Flag::Bool(b)) => Ok(b),
        Some(Flag::Text(text)) => match text.trim() {
            "true" => Ok(true),
            "false" | "" => Ok(false),
            other => Err(D::Error::custom(format!("expected true or false, got {other:?}"))),
        },
    }
}

/// Field descriptors for one configuration, plus the lookup tables derived
/// from them.
#[derive(Debug, Clone)]
pub struct Registry {
    default_fields: Vec<FieldDescriptor>,
    custom_fields: Vec<CustomFieldDescriptor>,
    by_wire_id: HashMap<u64, usize>,
    accessors: HashMap<String, Accessor>,
    project_id: Option<u64>,
    values_check: bool,
}

impl Registry {
    /// Builds a registry from descriptors, checking every naming and id
    /// invariant. Custom fields of type `Array` are always `multiple`.
    pub fn new(
        default_fields: Vec<FieldDescriptor>,
        custom_fields: Vec<CustomFieldDescriptor>,
    ) -> TicketResult<Self> {
        let mut registry = Self {
            default_fields,
            custom_fields,
            by_wire_id: HashMap::new(),
            accessors: HashMap::new(),
            project_id: None,
            values_check: true,
        };

        for index in 0..registry.default_fields.len() {
            let field = registry.default_fields[index].clone();
            if field.has_id && !field.is_composite() && !field.is_id_list() {
                return Err(config_error(format!(
                    "default field `{}` has has_id but type {}; only Hash and Array fields carry ids",
                    field.name, field.value_type
                )));
            }
            if field.value_type == ValueType::Array && !field.has_id {
                return Err(config_error(format!(
                    "default field `{}` of type Array must set has_id",
                    field.name
                )));
            }

            if field.is_id_list() {
                registry.register(&field.name, Accessor::IdList(index))?;
                registry.register(&field.ids_key(), Accessor::IdList(index))?;
            } else if field.is_composite() {
                registry.register(&field.name, Accessor::Composite(index))?;
                for key in CompositeKey::ALL {
                    let projection = match key {
                        CompositeKey::Id => field.id_key(),
                        CompositeKey::Name => field.name_key(),
                    };
                    registry.register(&projection, Accessor::CompositePart(index, key))?;
                }
            } else {
                registry.register(&field.name, Accessor::Scalar(index))?;
            }
        }

        for index in 0..registry.custom_fields.len() {
            let field = &mut registry.custom_fields[index];
            if matches!(
                field.value_type,
                ValueType::Composite | ValueType::Integer | ValueType::Float
            ) {
                return Err(config_error(format!(
                    "custom field `{}` cannot be of type {}",
                    field.name, field.value_type
                )));
            }
            if field.value_type == ValueType::Array {
                field.multiple = true;
            }

            let (name, wire_id) = (field.name.clone(), field.numeric_id);
            if let Some(&existing) = registry.by_wire_id.get(&wire_id) {
                return Err(config_error(format!(
                    "custom field id {wire_id} is used by both `{}` and `{name}`",
                    registry.custom_fields[existing].name
                )));
            }
            registry.by_wire_id.insert(wire_id, index);
            registry.register(&name, Accessor::Custom(index))?;
        }

        Ok(registry)
    }

    /// Sets the project id applied to every new ticket. Requires a `project`
    /// composite field with `has_id`.
    pub fn with_project_id(mut self, project_id: u64) -> TicketResult<Self> {
        let has_project = self
            .default_field(PROJECT_FIELD)
            .is_some_and(|field| field.has_id);
        if !has_project {
            return Err(config_error(format!(
                "project_id is configured but no `{PROJECT_FIELD}` field with has_id exists"
            )));
        }
        self.project_id = Some(project_id);
        Ok(self)
    }

    /// Turns the allowed-values check on or off for tickets built from this
    /// registry. It is on unless the document says `values_check: false`.
    #[must_use]
    pub fn with_values_check(mut self, enabled: bool) -> Self {
        self.values_check = enabled;
        self
    }

    /// Parses a YAML configuration document.
    pub fn from_yaml_str(text: &str) -> TicketResult<Self> {
        let document: serde_yaml::Value = serde_yaml::from_str(text)
            .map_err(|e| config_error(format!("could not parse configuration: {e}")))?;
        Self::from_document(document)
    }

    /// Reads and parses a YAML configuration file.
    pub fn load(path: impl AsRef<Path>) -> TicketResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| config_error(format!("could not read {}: {e}", path.display())))?;
        debug!("Loading field schema from {}", path.display());
        Self::from_yaml_str(&text)
    }

    /// Builds a registry from an already parsed document.
    pub fn from_document(document: serde_yaml::Value) -> TicketResult<Self> {
        let raw: RawDocument = serde_yaml::from_value(document)
            .map_err(|e| config_error(format!("malformed configuration: {e}")))?;

        let default_section = raw
            .default_fields
            .ok_or_else(|| config_error("missing `default_fields` section"))?;
        let custom_section = raw
            .custom_fields
            .ok_or_else(|| config_error("missing `custom_fields` section"))?;

        let mut default_fields = Vec::with_capacity(default_section.len());
        for (key, body) in default_section {
            let name = section_key(&key, "default_fields")?;
            let raw: RawDefaultField = parse_entry(body, &name)?;
            default_fields.push(FieldDescriptor {
                name,
                value_type: raw.value_type,
                has_id: raw.has_id,
                on_create: raw.on_create,
                required: raw.required,
            });
        }

        let mut custom_fields = Vec::with_capacity(custom_section.len());
        for (key, body) in custom_section {
            let name = section_key(&key, "custom_fields")?;
            let raw: RawCustomField = parse_entry(body, &name)?;
            let allowed_values = raw
                .values
                .map(|values| {
                    values
                        .iter()
                        .map(|v| yaml_literal(v, &name))
                        .collect::<TicketResult<Vec<_>>>()
                })
                .transpose()?;
            custom_fields.push(CustomFieldDescriptor {
                numeric_id: raw.id,
                name,
                value_type: raw.value_type,
                required: raw.required,
                multiple: raw.multiple,
                allowed_values,
            });
        }

        let registry = Self::new(default_fields, custom_fields)?
            .with_values_check(raw.values_check.unwrap_or(true));
        debug!(
            default_fields = registry.default_fields.len(),
            custom_fields = registry.custom_fields.len(),
            "Field schema loaded"
        );
        match raw.project_id {
            Some(project_id) => registry.with_project_id(project_id),
            None => Ok(registry),
        }
    }

    /// Default fields in document order.
    pub fn default_fields(&self) -> &[FieldDescriptor] {
        &self.default_fields
    }

    /// Custom fields in document order.
    pub fn custom_fields(&self) -> &[CustomFieldDescriptor] {
        &self.custom_fields
    }

    /// Looks up a custom field by the id the tracker uses on the wire.
    pub fn custom_field_by_wire_id(&self, id: u64) -> Option<&CustomFieldDescriptor> {
        self.by_wire_id.get(&id).map(|&index| &self.custom_fields[index])
    }

    pub fn default_field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.default_fields.iter().find(|field| field.name == name)
    }

    pub fn custom_field(&self, name: &str) -> Option<&CustomFieldDescriptor> {
        self.custom_fields.iter().find(|field| field.name == name)
    }

    /// Resolves a field or projection name through the dispatch table.
    pub fn accessor(&self, name: &str) -> Option<Accessor> {
        self.accessors.get(name).copied()
    }

    /// Every name accepted by [`Ticket::set`](crate::Ticket::set), sorted.
    pub fn field_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.accessors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// The project id applied to new tickets, if configured.
    pub fn project_id(&self) -> Option<u64> {
        self.project_id
    }

    pub fn values_check(&self) -> bool {
        self.values_check
    }

    /// Key under which the accessor's value is stored in a ticket.
    pub(crate) fn storage_key(&self, accessor: Accessor) -> &str {
        match accessor {
            Accessor::Scalar(index)
            | Accessor::Composite(index)
            | Accessor::CompositePart(index, _)
            | Accessor::IdList(index) => &self.default_fields[index].name,
            Accessor::Custom(index) => &self.custom_fields[index].name,
        }
    }

    /// A value map with every composite initialised to `{id: null, name: null}`.
    pub(crate) fn blank_values(&self) -> BTreeMap<String, Value> {
        self.default_fields
            .iter()
            .filter(|field| field.is_composite())
            .map(|field| (field.name.clone(), blank_composite()))
            .collect()
    }

    fn register(&mut self, name: &str, accessor: Accessor) -> TicketResult<()> {
        if name.is_empty() {
            return Err(config_error("field names must not be empty"));
        }
        if name == RESERVED_ID {
            return Err(config_error(format!(
                "`{RESERVED_ID}` is reserved for the ticket id"
            )));
        }
        if name == CUSTOM_FIELDS_KEY {
            return Err(config_error(format!(
                "`{CUSTOM_FIELDS_KEY}` is reserved for the custom field list"
            )));
        }
        if self.accessors.insert(name.to_string(), accessor).is_some() {
            return Err(config_error(format!("field name `{name}` is defined twice")));
        }
        Ok(())
    }
}

/// The initial value of every composite field.
pub(crate) fn blank_composite() -> Value {
    let mut parts = Map::new();
    for key in CompositeKey::ALL {
        parts.insert(key.as_str().to_string(), Value::Null);
    }
    Value::Object(parts)
}

fn config_error(message: impl Into<String>) -> TicketError {
    TicketError::Config(message.into())
}

fn section_key(key: &serde_yaml::Value, section: &str) -> TicketResult<String> {
    key.as_str()
        .map(str::to_string)
        .ok_or_else(|| config_error(format!("`{section}` keys must be field names, got {key:?}")))
}

fn parse_entry<T: serde::de::DeserializeOwned>(
    body: serde_yaml::Value,
    name: &str,
) -> TicketResult<T> {
    serde_yaml::from_value(body).map_err(|e| config_error(format!("field `{name}`: {e}")))
}

fn yaml_literal(value: &serde_yaml::Value, name: &str) -> TicketResult<String> {
    match value {
        serde_yaml::Value::String(s) => Ok(s.clone()),
        serde_yaml::Value::Number(n) => Ok(n.to_string()),
        serde_yaml::Value::Bool(b) => Ok(b.to_string()),
        other => Err(config_error(format!(
            "field `{name}`: allowed values must be scalars, got {other:?}"
        ))),
    }
}
