//! Conversion between a ticket's value map and the tracker's JSON.
//!
//! Writing is strict: only registered fields are emitted. Reading is lossless:
//! anything the registry does not know ends up in [`Unmatched`].
//!
//! ```json
//! {"issue": {"project_id": 4, "subject": "...",
//!            "custom_fields": [{"id": 21, "value": "Bコース"}]}}
//! ```

use crate::error::{TicketError, TicketResult};
use crate::registry::Registry;
use crate::schema::{Accessor, CompositeKey};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use tracing::debug;

/// Envelope key wrapping every issue document.
pub const ENVELOPE_KEY: &str = "issue";
/// Key of the custom-field array inside the envelope.
pub const CUSTOM_FIELDS_KEY: &str = "custom_fields";
/// Key of the ticket id inside the envelope.
pub const ID_KEY: &str = "id";

/// Wire data with no descriptor in the current registry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Unmatched {
    /// Unknown top-level keys of the issue, with their values. A composite
    /// that arrived with keys besides `id` and `name` leaves those extra keys
    /// here under its own name.
    pub fields: Map<String, Value>,
    /// Custom-field entries whose id is not registered, keyed by that id, in
    /// wire order.
    pub custom_fields: BTreeMap<u64, Vec<Value>>,
    /// Custom-field entries without a usable numeric id, in wire order.
    pub unkeyed_custom_fields: Vec<Value>,
}

impl Unmatched {
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
            && self.custom_fields.is_empty()
            && self.unkeyed_custom_fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
            + self.custom_fields.values().map(Vec::len).sum::<usize>()
            + self.unkeyed_custom_fields.len()
    }
}

/// Result of reading an issue document.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedIssue {
    pub id: Option<u64>,
    pub values: BTreeMap<String, Value>,
    pub unmatched: Unmatched,
}

/// Builds the creation payload for a value map.
///
/// `has_id` fields are sent as `<name>_id` when `on_create` is set and the id
/// is known; id lists go out as `<name>_ids` when not empty. Composites
/// without an id are owned by the server and skipped. `custom_fields` is
/// always present.
pub fn to_wire_payload(registry: &Registry, values: &BTreeMap<String, Value>) -> Value {
    let mut issue = Map::new();

    for field in registry.default_fields() {
        let value = values.get(&field.name);
        if field.has_id && !field.on_create {
            continue;
        }
        if field.is_id_list() {
            let ids = value.filter(|v| v.as_array().is_some_and(|ids| !ids.is_empty()));
            if let Some(ids) = ids {
                issue.insert(field.ids_key(), ids.clone());
            }
        } else if field.has_id {
            let id = value
                .and_then(|v| v.get(CompositeKey::Id.as_str()))
                .filter(|id| !id.is_null());
            if let Some(id) = id {
                issue.insert(field.id_key(), id.clone());
            }
        } else if !field.is_composite() {
            if let Some(value) = value.filter(|v| !v.is_null()) {
                issue.insert(field.name.clone(), value.clone());
            }
        }
    }

    let custom_fields: Vec<Value> = registry
        .custom_fields()
        .iter()
        .filter_map(|field| {
            values
                .get(&field.name)
                .filter(|v| !v.is_null())
                .map(|value| json!({ "id": field.numeric_id, "value": value }))
        })
        .collect();
    issue.insert(CUSTOM_FIELDS_KEY.to_string(), Value::Array(custom_fields));

    let mut envelope = Map::new();
    envelope.insert(ENVELOPE_KEY.to_string(), Value::Object(issue));
    Value::Object(envelope)
}

/// Reads an issue document. Fails only when the `issue` envelope is missing.
pub fn from_wire_document(registry: &Registry, document: &Value) -> TicketResult<DecodedIssue> {
    let issue = document
        .get(ENVELOPE_KEY)
        .and_then(Value::as_object)
        .ok_or_else(|| {
            TicketError::MalformedDocument(format!("expected an object under `{ENVELOPE_KEY}`"))
        })?;

    let mut decoded = DecodedIssue {
        id: None,
        values: registry.blank_values(),
        unmatched: Unmatched::default(),
    };

    for (key, value) in issue {
        if key == ID_KEY {
            match value.as_u64() {
                Some(id) => decoded.id = Some(id),
                None => {
                    decoded.unmatched.fields.insert(key.clone(), value.clone());
                }
            }
            continue;
        }
        if key == CUSTOM_FIELDS_KEY {
            decode_custom_fields(registry, value, &mut decoded);
            continue;
        }

        match registry.accessor(key) {
            Some(Accessor::Scalar(_)) => {
                if !value.is_null() {
                    decoded.values.insert(key.clone(), value.clone());
                }
            }
            Some(Accessor::Composite(_)) if value.is_object() => {
                let (parts, extra) = split_composite(value);
                if !extra.is_empty() {
                    debug!("Composite `{}` carries {} extra keys", key, extra.len());
                    decoded.unmatched.fields.insert(key.clone(), Value::Object(extra));
                }
                decoded.values.insert(key.clone(), Value::Object(parts));
            }
            Some(Accessor::IdList(index)) if value.is_array() => {
                let name = &registry.default_fields()[index].name;
                decoded.values.insert(name.clone(), value.clone());
            }
            Some(Accessor::CompositePart(index, CompositeKey::Id))
                if registry.default_fields()[index].has_id =>
            {
                let name = &registry.default_fields()[index].name;
                if let Some(Value::Object(parts)) = decoded.values.get_mut(name) {
                    parts.insert(CompositeKey::Id.as_str().to_string(), value.clone());
                }
            }
            _ => {
                debug!("Unmatched issue key `{}`", key);
                decoded.unmatched.fields.insert(key.clone(), value.clone());
            }
        }
    }

    Ok(decoded)
}

/// Splits a wire composite into its `{id, name}` parts and everything else.
fn split_composite(value: &Value) -> (Map<String, Value>, Map<String, Value>) {
    let mut parts = Map::new();
    for part in CompositeKey::ALL {
        let v = value.get(part.as_str()).cloned().unwrap_or(Value::Null);
        parts.insert(part.as_str().to_string(), v);
    }
    let extra: Map<String, Value> = value
        .as_object()
        .map(|object| {
            object
                .iter()
                .filter(|(k, _)| !parts.contains_key(k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        })
        .unwrap_or_default();
    (parts, extra)
}

fn decode_custom_fields(registry: &Registry, value: &Value, decoded: &mut DecodedIssue) {
    let Some(entries) = value.as_array() else {
        decoded
            .unmatched
            .fields
            .insert(CUSTOM_FIELDS_KEY.to_string(), value.clone());
        return;
    };

    for entry in entries {
        let Some(wire_id) = entry.get(ID_KEY).and_then(Value::as_u64) else {
            decoded.unmatched.unkeyed_custom_fields.push(entry.clone());
            continue;
        };
        match registry.custom_field_by_wire_id(wire_id) {
            Some(field) => {
                let value = entry.get("value").cloned().unwrap_or(Value::Null);
                if value.is_null() {
                    decoded.values.remove(&field.name);
                } else {
                    decoded.values.insert(field.name.clone(), value);
                }
            }
            None => {
                debug!("Unmatched custom field id {}", wire_id);
                decoded
                    .unmatched
                    .custom_fields
                    .entry(wire_id)
                    .or_default()
                    .push(entry.clone());
            }
        }
    }
}
