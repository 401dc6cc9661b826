//! SCIM-side data model
//!
//! Types for SCIM attribute identities, scalar values, complex values,
//! multi-valued attributes, and whole resources.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

/// Identity of a SCIM attribute: schema URI plus attribute name.
///
/// Equality and hashing are case-insensitive on the name; the schema URI
/// disambiguates extension attributes sharing a local name. Immutable once
/// constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeType {
    schema: String,
    name: String,
}

impl AttributeType {
    /// Create a new attribute type.
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
        }
    }

    /// Get the schema URI.
    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// Get the attribute name (original casing preserved).
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl PartialEq for AttributeType {
    fn eq(&self, other: &Self) -> bool {
        self.schema == other.schema && self.name.eq_ignore_ascii_case(&other.name)
    }
}

impl Eq for AttributeType {}

impl Hash for AttributeType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.schema.hash(state);
        self.name.to_ascii_lowercase().hash(state);
    }
}

impl std::fmt::Display for AttributeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.schema, self.name)
    }
}

/// A single typed SCIM scalar value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScimValue {
    /// A string value.
    String(String),
    /// A boolean value.
    Boolean(bool),
    /// A date-time value.
    DateTime(DateTime<Utc>),
    /// An integer value.
    Integer(i64),
    /// A floating-point value.
    Float(f64),
}

impl ScimValue {
    /// Get as a string if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ScimValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get as a boolean if this is a boolean value.
    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            ScimValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Get as a date-time if this is a date-time value.
    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            ScimValue::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }

    /// Get as an integer if this is an integer value.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            ScimValue::Integer(i) => Some(*i),
            _ => None,
        }
    }
}

impl From<String> for ScimValue {
    fn from(s: String) -> Self {
        ScimValue::String(s)
    }
}

impl From<&str> for ScimValue {
    fn from(s: &str) -> Self {
        ScimValue::String(s.to_string())
    }
}

impl From<bool> for ScimValue {
    fn from(b: bool) -> Self {
        ScimValue::Boolean(b)
    }
}

impl From<i64> for ScimValue {
    fn from(i: i64) -> Self {
        ScimValue::Integer(i)
    }
}

impl From<DateTime<Utc>> for ScimValue {
    fn from(dt: DateTime<Utc>) -> Self {
        ScimValue::DateTime(dt)
    }
}

/// An ordered set of named sub-values forming one complex value.
///
/// Sub-attribute lookup is case-insensitive; declaration order is preserved.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ComplexValue {
    sub_values: Vec<(String, ScimValue)>,
}

impl ComplexValue {
    /// Create an empty complex value.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a sub-attribute value, replacing any existing value for the name.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<ScimValue>) {
        let name = name.into();
        if let Some(slot) = self
            .sub_values
            .iter_mut()
            .find(|(n, _)| n.eq_ignore_ascii_case(&name))
        {
            slot.1 = value.into();
        } else {
            self.sub_values.push((name, value.into()));
        }
    }

    /// Set a sub-attribute using the builder pattern.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<ScimValue>) -> Self {
        self.set(name, value);
        self
    }

    /// Get a sub-attribute value by name.
    pub fn get(&self, name: &str) -> Option<&ScimValue> {
        self.sub_values
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }

    /// Check if a sub-attribute is present.
    pub fn has(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Check if the complex value has no sub-values.
    pub fn is_empty(&self) -> bool {
        self.sub_values.is_empty()
    }

    /// Iterate over sub-values in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ScimValue)> {
        self.sub_values.iter().map(|(n, v)| (n.as_str(), v))
    }
}

/// The payload of one instance of a multi-valued attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PluralValue {
    /// A scalar instance (simple-plural attributes).
    Simple(ScimValue),
    /// A complex instance (complex-plural attributes).
    Complex(ComplexValue),
}

/// One instance of a multi-valued attribute, optionally tagged with a type
/// discriminant such as `work` or `home`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluralInstance {
    /// The type discriminant, if any.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_tag: Option<String>,
    /// The instance payload.
    pub value: PluralValue,
}

impl PluralInstance {
    /// Create a typed scalar instance.
    pub fn simple(type_tag: impl Into<String>, value: impl Into<ScimValue>) -> Self {
        Self {
            type_tag: Some(type_tag.into()),
            value: PluralValue::Simple(value.into()),
        }
    }

    /// Create a typed complex instance.
    pub fn complex(type_tag: impl Into<String>, value: ComplexValue) -> Self {
        Self {
            type_tag: Some(type_tag.into()),
            value: PluralValue::Complex(value),
        }
    }

    /// Create an untagged scalar instance.
    pub fn untyped(value: impl Into<ScimValue>) -> Self {
        Self {
            type_tag: None,
            value: PluralValue::Simple(value.into()),
        }
    }

    /// Create an untagged complex instance.
    pub fn untyped_complex(value: ComplexValue) -> Self {
        Self {
            type_tag: None,
            value: PluralValue::Complex(value),
        }
    }
}

/// The value of a SCIM attribute: simple, complex, or plural.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScimAttributeValue {
    /// A single typed scalar.
    Simple(ScimValue),
    /// A single complex value.
    Complex(ComplexValue),
    /// A sequence of instances.
    Plural(Vec<PluralInstance>),
}

/// A SCIM attribute: identity plus value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScimAttribute {
    /// The attribute's identity.
    pub attr_type: AttributeType,
    /// The attribute's value.
    pub value: ScimAttributeValue,
}

impl ScimAttribute {
    /// Create a simple attribute.
    pub fn simple(attr_type: AttributeType, value: impl Into<ScimValue>) -> Self {
        Self {
            attr_type,
            value: ScimAttributeValue::Simple(value.into()),
        }
    }

    /// Create a complex attribute.
    pub fn complex(attr_type: AttributeType, value: ComplexValue) -> Self {
        Self {
            attr_type,
            value: ScimAttributeValue::Complex(value),
        }
    }

    /// Create a plural attribute.
    pub fn plural(attr_type: AttributeType, instances: Vec<PluralInstance>) -> Self {
        Self {
            attr_type,
            value: ScimAttributeValue::Plural(instances),
        }
    }
}

/// An ordered mapping from attribute type to attribute value.
///
/// Insertion order is preserved; inserting an attribute whose type is already
/// present replaces the existing value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScimResource {
    attributes: Vec<ScimAttribute>,
}

impl ScimResource {
    /// Create an empty resource.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an attribute, replacing any existing attribute of the same type.
    pub fn set(&mut self, attribute: ScimAttribute) {
        if let Some(slot) = self
            .attributes
            .iter_mut()
            .find(|a| a.attr_type == attribute.attr_type)
        {
            *slot = attribute;
        } else {
            self.attributes.push(attribute);
        }
    }

    /// Set an attribute using the builder pattern.
    pub fn with(mut self, attribute: ScimAttribute) -> Self {
        self.set(attribute);
        self
    }

    /// Get an attribute by type.
    pub fn get(&self, attr_type: &AttributeType) -> Option<&ScimAttribute> {
        self.attributes.iter().find(|a| &a.attr_type == attr_type)
    }

    /// Check if an attribute is present.
    pub fn has(&self, attr_type: &AttributeType) -> bool {
        self.get(attr_type).is_some()
    }

    /// Get the number of attributes.
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    /// Check if the resource has no attributes.
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Iterate over attributes in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &ScimAttribute> {
        self.attributes.iter()
    }
}
