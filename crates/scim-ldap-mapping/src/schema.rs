//! Declarative mapping definitions
//!
//! The configuration model consumed at schema-load time. These types are
//! produced by an external schema loader (JSON via serde) and read-only here.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::ldap::SearchScope;
use crate::transform::{SubstitutionRule, TransformKind};

/// A complete mapping definition for one resource kind (e.g. `User`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDefinition {
    /// The resource name.
    pub name: String,

    /// The resource's core schema URI.
    pub schema: String,

    /// Pre-configured search templates referenced by derived attributes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub searches: Vec<LdapSearchParameters>,

    /// Declared attributes, in declaration order.
    pub attributes: Vec<AttributeDefinition>,
}

/// A pre-configured directory search template.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LdapSearchParameters {
    /// Identifier referenced from derivation elements.
    pub id: String,

    /// The search base DN.
    pub base_dn: String,

    /// The search scope.
    #[serde(default)]
    pub scope: SearchScope,

    /// An optional filter clause ANDed with whatever the derived attribute builds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<crate::ldap::LdapFilter>,
}

/// Declaration of one resource attribute and (optionally) its LDAP mapping.
///
/// Exactly one of the four shape fields should be populated; an attribute may
/// instead carry a `derivation`, in which case its value is computed rather
/// than mapped.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeDefinition {
    /// The attribute name.
    pub name: String,

    /// Schema URI override for extension attributes; defaults to the
    /// resource's core schema.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    /// Human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Derivation element; present for computed attributes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub derivation: Option<DerivationDefinition>,

    /// Simple (singular scalar) shape.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub simple: Option<SimpleDefinition>,

    /// Complex (singular, named sub-attributes) shape.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complex: Option<ComplexDefinition>,

    /// Simple plural (repeated scalar) shape.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub simple_plural: Option<SimplePluralDefinition>,

    /// Complex plural (repeated complex value) shape.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complex_plural: Option<ComplexPluralDefinition>,
}

impl AttributeDefinition {
    /// Count how many shape fields are populated.
    pub fn shape_count(&self) -> usize {
        [
            self.simple.is_some(),
            self.complex.is_some(),
            self.simple_plural.is_some(),
            self.complex_plural.is_some(),
        ]
        .iter()
        .filter(|b| **b)
        .count()
    }

    /// Whether the declared shape is plural.
    pub fn is_plural(&self) -> bool {
        self.simple_plural.is_some() || self.complex_plural.is_some()
    }
}

/// Mapping of one scalar position to an LDAP attribute.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeMapping {
    /// The LDAP attribute name.
    pub ldap_attribute: String,

    /// The typed conversion to apply.
    #[serde(default)]
    pub transform: TransformKind,

    /// Optional regex substitution on the LDAP-side string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub substitution: Option<SubstitutionRule>,
}

impl AttributeMapping {
    /// Create an identity mapping to the named LDAP attribute.
    pub fn to_attribute(ldap_attribute: impl Into<String>) -> Self {
        Self {
            ldap_attribute: ldap_attribute.into(),
            transform: TransformKind::String,
            substitution: None,
        }
    }

    /// Set the transform using the builder pattern.
    pub fn with_transform(mut self, transform: TransformKind) -> Self {
        self.transform = transform;
        self
    }
}

/// Simple attribute shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimpleDefinition {
    /// The mapping; a simple attribute without one is unmapped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mapping: Option<AttributeMapping>,
}

/// Complex singular attribute shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplexDefinition {
    /// Declared sub-attributes, in declaration order.
    pub sub_attributes: Vec<SubAttributeDefinition>,
}

/// One sub-attribute of a complex shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubAttributeDefinition {
    /// The sub-attribute name.
    pub name: String,

    /// The mapping; an unmapped sub-attribute is never emitted or read back.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mapping: Option<AttributeMapping>,
}

/// Simple plural attribute shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimplePluralDefinition {
    /// Untyped default partition mapping, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mapping: Option<AttributeMapping>,

    /// Typed partitions, in declaration order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub plural_types: Vec<PluralTypeDefinition>,
}

/// One typed partition of a simple plural attribute.
///
/// A partition carries either a fixed `mapping` (read/write) or a `pattern`
/// matched against entry attribute names (read-only).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluralTypeDefinition {
    /// The type discriminant (e.g. `work`).
    pub name: String,

    /// Fixed LDAP attribute mapping.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mapping: Option<AttributeMapping>,

    /// Regex over directory attribute names.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

/// Complex plural attribute shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplexPluralDefinition {
    /// Typed partitions, in declaration order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub plural_types: Vec<ComplexPluralTypeDefinition>,
}

/// One typed partition of a complex plural attribute.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplexPluralTypeDefinition {
    /// The type discriminant (e.g. `work`).
    pub name: String,

    /// Per-sub-attribute mappings, in declaration order.
    pub sub_attributes: Vec<SubAttributeDefinition>,
}

/// Derivation element for computed attributes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivationDefinition {
    /// Implementation identifier resolved against the registration table.
    pub implementation: String,

    /// Free-form name/value configuration arguments.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub arguments: BTreeMap<String, String>,

    /// Reference to a pre-configured search template (by id).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ldap_search_ref: Option<String>,
}
