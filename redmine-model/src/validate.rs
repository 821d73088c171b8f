//! Field validation.
//!
//! Every check is a pure function of a descriptor and a candidate value.
//! [`validate`] runs the rule lists below over every registered field and
//! collects all violations; it never stops at the first one. The
//! allowed-values check can be switched off with [`validate_with`].

use crate::registry::Registry;
use crate::schema::{CustomFieldDescriptor, FieldDescriptor, ValueType};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

/// Redmine's spelling of a true boolean.
pub const BOOLEAN_TRUE: &str = "1";
/// Redmine's spelling of a false boolean.
pub const BOOLEAN_FALSE: &str = "0";
/// Redmine's spelling of an unset boolean.
pub const BOOLEAN_NONE: &str = "";

const BOOLEAN_TOKENS: [&str; 3] = [BOOLEAN_TRUE, BOOLEAN_FALSE, BOOLEAN_NONE];

/// Which check a value failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    Required,
    Type,
    Value,
}

/// A single failed check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub field: String,
    pub kind: ViolationKind,
    pub message: String,
}

impl Violation {
    fn new(field: impl Into<String>, kind: ViolationKind, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.field, self.message)
    }
}

/// Violations grouped by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidationErrors {
    by_field: BTreeMap<String, Vec<Violation>>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, violation: Violation) {
        self.by_field
            .entry(violation.field.clone())
            .or_default()
            .push(violation);
    }

    pub fn is_empty(&self) -> bool {
        self.by_field.is_empty()
    }

    /// Total number of violations across all fields.
    pub fn len(&self) -> usize {
        self.by_field.values().map(Vec::len).sum()
    }

    /// Returns true if the named field has at least one violation.
    pub fn contains(&self, field: &str) -> bool {
        self.by_field.contains_key(field)
    }

    /// Violations recorded for one field, in check order.
    pub fn for_field(&self, field: &str) -> &[Violation] {
        self.by_field.get(field).map(Vec::as_slice).unwrap_or_default()
    }

    /// Returns true if the field failed the given kind of check.
    pub fn has(&self, field: &str, kind: ViolationKind) -> bool {
        self.for_field(field).iter().any(|v| v.kind == kind)
    }

    /// Names of fields with violations, sorted.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.by_field.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Violation> {
        self.by_field.values().flatten()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, violation) in self.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{violation}")?;
        }
        Ok(())
    }
}

// ── Checks ───────────────────────────────────────────────────────

/// Fails when the field is required and the value is absent, null, an empty
/// string, `false`, or an empty sequence.
pub fn check_required(descriptor: &CustomFieldDescriptor, value: Option<&Value>) -> bool {
    !descriptor.required || !is_blank(value)
}

/// Absent and null values always pass. `multiple` fields need a sequence whose
/// elements all have the element type; other fields need the declared type.
pub fn check_type(descriptor: &CustomFieldDescriptor, value: Option<&Value>) -> bool {
    let Some(value) = value.filter(|v| !v.is_null()) else {
        return true;
    };
    if descriptor.multiple {
        value.as_array().is_some_and(|items| {
            items
                .iter()
                .all(|item| matches_type(descriptor.element_type(), item))
        })
    } else {
        matches_type(descriptor.value_type, value)
    }
}

/// With allowed values configured, every value (every element for sequences)
/// must be one of them. Blank values pass; requiredness is checked separately.
pub fn check_values(descriptor: &CustomFieldDescriptor, value: Option<&Value>) -> bool {
    let Some(allowed) = descriptor.allowed_values.as_deref() else {
        return true;
    };
    if is_blank(value) {
        return true;
    }
    let permitted = |v: &Value| {
        literal_text(v).is_some_and(|text| allowed.iter().any(|a| a.as_str() == &*text))
    };
    match value {
        Some(Value::Array(items)) => items.iter().all(permitted),
        Some(other) => permitted(other),
        None => true,
    }
}

/// Returns true if a value counts as "not provided".
pub fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) | Some(Value::Bool(false)) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        Some(_) => false,
    }
}

/// Returns true if the value has the runtime shape of the declared type.
pub fn matches_type(value_type: ValueType, value: &Value) -> bool {
    match value_type {
        ValueType::String => value.is_string(),
        ValueType::Boolean => match value {
            Value::String(s) => BOOLEAN_TOKENS.contains(&s.as_str()),
            Value::Number(n) => n.as_u64().is_some_and(|n| n <= 1),
            _ => false,
        },
        ValueType::Date => value.as_str().is_some_and(is_date),
        ValueType::Integer => value.is_i64() || value.is_u64(),
        ValueType::Float => value.is_number(),
        ValueType::Composite => value.is_object(),
        ValueType::Array => value.is_array(),
    }
}

/// `YYYY-MM-DD`, optionally followed by `T` or a space and a time of day
/// (`HH:MM`, `HH:MM:SS`, fractional seconds, `Z` or `±HH:MM` offset).
pub fn is_date(text: &str) -> bool {
    if text.len() < 10 || !text.is_char_boundary(10) {
        return false;
    }
    let (date, rest) = text.split_at(10);
    if NaiveDate::parse_from_str(date, "%Y-%m-%d").is_err() {
        return false;
    }
    if rest.is_empty() {
        return true;
    }
    rest.strip_prefix('T')
        .or_else(|| rest.strip_prefix(' '))
        .is_some_and(is_time_of_day)
}

fn is_time_of_day(text: &str) -> bool {
    let clock = match text.strip_suffix('Z') {
        Some(clock) => clock,
        None => match text.rfind(['+', '-']) {
            Some(at) => {
                let (clock, offset) = text.split_at(at);
                if NaiveTime::parse_from_str(&offset[1..], "%H:%M").is_err() {
                    return false;
                }
                clock
            }
            None => text,
        },
    };
    ["%H:%M:%S%.f", "%H:%M:%S", "%H:%M"]
        .iter()
        .any(|format| NaiveTime::parse_from_str(clock, format).is_ok())
}

/// Text form used to compare a value against allowed literals.
fn literal_text(value: &Value) -> Option<Cow<'_, str>> {
    match value {
        Value::String(s) => Some(Cow::Borrowed(s)),
        Value::Number(n) => Some(Cow::Owned(n.to_string())),
        Value::Bool(b) => Some(Cow::Owned(b.to_string())),
        _ => None,
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::String(s) => format!("{s:?}"),
        other => other.to_string(),
    }
}

// ── Rule lists ───────────────────────────────────────────────────

type CustomRule = fn(&CustomFieldDescriptor, Option<&Value>) -> Option<Violation>;
type DefaultRule = fn(&FieldDescriptor, Option<&Value>) -> Option<Violation>;

const CUSTOM_RULES: &[CustomRule] = &[custom_required, custom_type];
const VALUE_RULES: &[CustomRule] = &[custom_values];
const DEFAULT_RULES: &[DefaultRule] = &[default_required, default_type, default_id];

fn custom_required(field: &CustomFieldDescriptor, value: Option<&Value>) -> Option<Violation> {
    (!check_required(field, value))
        .then(|| Violation::new(&field.name, ViolationKind::Required, "is required"))
}

fn custom_type(field: &CustomFieldDescriptor, value: Option<&Value>) -> Option<Violation> {
    if check_type(field, value) {
        return None;
    }
    let expected = if field.multiple {
        format!("a list of {}", field.element_type())
    } else {
        field.value_type.to_string()
    };
    let got = value.map(describe).unwrap_or_default();
    Some(Violation::new(
        &field.name,
        ViolationKind::Type,
        format!("must be {expected}, got {got}"),
    ))
}

fn custom_values(field: &CustomFieldDescriptor, value: Option<&Value>) -> Option<Violation> {
    if check_values(field, value) {
        return None;
    }
    let allowed = field.allowed_values.as_deref().unwrap_or_default().join(", ");
    let got = value.map(describe).unwrap_or_default();
    Some(Violation::new(
        &field.name,
        ViolationKind::Value,
        format!("must be one of [{allowed}], got {got}"),
    ))
}

fn default_required(field: &FieldDescriptor, value: Option<&Value>) -> Option<Violation> {
    if !field.required {
        return None;
    }
    let blank = if field.is_id_list() {
        is_blank(value)
    } else if field.has_id {
        is_blank(value.and_then(|v| v.get("id")))
    } else if field.is_composite() {
        value.is_none_or(|v| is_blank(v.get("id")) && is_blank(v.get("name")))
    } else {
        is_blank(value)
    };
    blank.then(|| Violation::new(field.required_key(), ViolationKind::Required, "is required"))
}

fn default_type(field: &FieldDescriptor, value: Option<&Value>) -> Option<Violation> {
    if field.is_id_list() {
        return None;
    }
    let value = value.filter(|v| !v.is_null() && v.as_str() != Some(""))?;
    (!matches_type(field.value_type, value)).then(|| {
        Violation::new(
            &field.name,
            ViolationKind::Type,
            format!("must be {}, got {}", field.value_type, describe(value)),
        )
    })
}

fn default_id(field: &FieldDescriptor, value: Option<&Value>) -> Option<Violation> {
    if !field.has_id {
        return None;
    }
    if field.is_id_list() {
        let ids = value.filter(|v| !v.is_null() && v.as_str() != Some(""))?;
        let all_ids = ids
            .as_array()
            .is_some_and(|ids| ids.iter().all(|id| matches_type(ValueType::Integer, id)));
        return (!all_ids).then(|| {
            Violation::new(
                field.ids_key(),
                ViolationKind::Type,
                format!("must be a list of integer ids, got {}", describe(ids)),
            )
        });
    }
    let id = value
        .and_then(|v| v.get("id"))
        .filter(|id| !id.is_null() && id.as_str() != Some(""))?;
    (!matches_type(ValueType::Integer, id)).then(|| {
        Violation::new(
            field.id_key(),
            ViolationKind::Type,
            format!("must be an integer, got {}", describe(id)),
        )
    })
}

/// Runs every rule against every registered field and returns all violations.
/// Allowed values are checked when the registry says so.
pub fn validate(registry: &Registry, values: &BTreeMap<String, Value>) -> ValidationErrors {
    validate_with(registry, values, registry.values_check())
}

/// Like [`validate`], with the allowed-values check turned on or off.
pub fn validate_with(
    registry: &Registry,
    values: &BTreeMap<String, Value>,
    values_check: bool,
) -> ValidationErrors {
    let value_rules: &[CustomRule] = if values_check { VALUE_RULES } else { &[] };
    let mut errors = ValidationErrors::new();

    for field in registry.default_fields() {
        let value = values.get(&field.name);
        for rule in DEFAULT_RULES {
            if let Some(violation) = rule(field, value) {
                errors.push(violation);
            }
        }
    }

    for field in registry.custom_fields() {
        let value = values.get(&field.name);
        for rule in CUSTOM_RULES.iter().chain(value_rules) {
            if let Some(violation) = rule(field, value) {
                errors.push(violation);
            }
        }
    }

    errors
}
