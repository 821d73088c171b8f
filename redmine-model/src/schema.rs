use serde::{Deserialize, Serialize};
use std::fmt;

/// Declared type of a field value, spelled as in the configuration document.
///
/// Composite fields are written `Hash` in configuration files; `Composite` is
/// accepted as well.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    #[default]
    String,
    Boolean,
    Date,
    Integer,
    Float,
    #[serde(rename = "Hash", alias = "Composite")]
    Composite,
    Array,
}

impl ValueType {
    /// The configuration spelling of this type.
    pub fn as_str(self) -> &'static str {
        match self {
            ValueType::String => "String",
            ValueType::Boolean => "Boolean",
            ValueType::Date => "Date",
            ValueType::Integer => "Integer",
            ValueType::Float => "Float",
            ValueType::Composite => "Hash",
            ValueType::Array => "Array",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A built-in ticket attribute such as `subject` or `project`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub value_type: ValueType,
    /// The value references tracker entities: one `{id, name}` for `Hash`
    /// fields, a list of ids for `Array` fields.
    pub has_id: bool,
    /// The `<name>_id` (or `<name>_ids`) form is sent when creating a ticket.
    pub on_create: bool,
    /// For `has_id` fields this applies to the id projection.
    pub required: bool,
}

impl FieldDescriptor {
    fn simple(name: &str, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            value_type,
            has_id: false,
            on_create: false,
            required: false,
        }
    }

    /// Shorthand for a plain text field.
    pub fn string(name: &str) -> Self {
        Self::simple(name, ValueType::String)
    }

    /// Shorthand for a date field.
    pub fn date(name: &str) -> Self {
        Self::simple(name, ValueType::Date)
    }

    /// Shorthand for an integer field.
    pub fn integer(name: &str) -> Self {
        Self::simple(name, ValueType::Integer)
    }

    /// Shorthand for an `{id, name}` reference. `on_create` only matters when
    /// `has_id` is set.
    pub fn composite(name: &str, has_id: bool, on_create: bool) -> Self {
        Self {
            has_id,
            on_create,
            ..Self::simple(name, ValueType::Composite)
        }
    }

    /// Shorthand for a list of entity ids such as watchers, written
    /// `<name>_ids` on the wire.
    pub fn id_list(name: &str, on_create: bool) -> Self {
        Self {
            has_id: true,
            on_create,
            ..Self::simple(name, ValueType::Array)
        }
    }

    /// Marks the field as required.
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn is_composite(&self) -> bool {
        self.value_type == ValueType::Composite
    }

    pub fn is_id_list(&self) -> bool {
        self.has_id && self.value_type == ValueType::Array
    }

    /// Name of the id projection, also used as the wire key on create.
    pub fn id_key(&self) -> String {
        format!("{}_id", self.name)
    }

    /// Name of the name projection.
    pub fn name_key(&self) -> String {
        format!("{}_name", self.name)
    }

    /// Name and wire key of an id list.
    pub fn ids_key(&self) -> String {
        format!("{}_ids", self.name)
    }

    /// The field name reported by validation for the required check.
    pub(crate) fn required_key(&self) -> String {
        if self.is_id_list() {
            self.ids_key()
        } else if self.has_id {
            self.id_key()
        } else {
            self.name.clone()
        }
    }
}

/// A tenant-defined attribute addressed on the wire by its numeric id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomFieldDescriptor {
    pub numeric_id: u64,
    pub name: String,
    pub value_type: ValueType,
    pub required: bool,
    /// The value is an ordered sequence rather than a scalar.
    pub multiple: bool,
    /// Permitted literal values, compared by their text form.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_values: Option<Vec<String>>,
}

impl CustomFieldDescriptor {
    /// A single-valued, optional custom field.
    pub fn new(numeric_id: u64, name: &str, value_type: ValueType) -> Self {
        Self {
            numeric_id,
            name: name.into(),
            value_type,
            required: false,
            multiple: value_type == ValueType::Array,
            allowed_values: None,
        }
    }

    /// Marks the field as required.
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Marks the field as holding a sequence of values.
    #[must_use]
    pub fn multiple(mut self) -> Self {
        self.multiple = true;
        self
    }

    /// Restricts the field to the given literals.
    #[must_use]
    pub fn with_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_values = Some(values.into_iter().map(Into::into).collect());
        self
    }

    /// Type every element of a `multiple` value must have.
    pub fn element_type(&self) -> ValueType {
        match self.value_type {
            ValueType::Array => ValueType::String,
            other => other,
        }
    }
}

/// Which half of a composite `{id, name}` structure a projection addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompositeKey {
    Id,
    Name,
}

impl CompositeKey {
    pub const ALL: [CompositeKey; 2] = [CompositeKey::Id, CompositeKey::Name];

    /// Key of this half inside the composite structure.
    pub fn as_str(self) -> &'static str {
        match self {
            CompositeKey::Id => "id",
            CompositeKey::Name => "name",
        }
    }
}

/// One entry of the registry's dispatch table.
///
/// Indices point into [`Registry::default_fields`](crate::Registry::default_fields)
/// or [`Registry::custom_fields`](crate::Registry::custom_fields).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accessor {
    /// A default field holding a plain value.
    Scalar(usize),
    /// A default field holding an `{id, name}` structure.
    Composite(usize),
    /// `<name>_id` or `<name>_name` of a composite default field.
    CompositePart(usize, CompositeKey),
    /// A default field holding a list of entity ids, under `<name>` or
    /// `<name>_ids`.
    IdList(usize),
    /// A custom field.
    Custom(usize),
}
