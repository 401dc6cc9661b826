//! # SCIM / LDAP Attribute Mapping
//!
//! Bidirectional translation between the SCIM resource model and the LDAP
//! directory model, driven by declarative per-resource mapping definitions.
//!
//! SCIM resources carry typed, nested attributes; directory entries carry
//! flat, multi-valued strings. This crate maps between the two in both
//! directions, translates SCIM filter trees into LDAP search filters, and
//! resolves SCIM sort parameters to directory ordering attributes.
//!
//! ## Example
//!
//! ```ignore
//! use scim_ldap_mapping::prelude::*;
//!
//! let definition: ResourceDefinition = serde_json::from_str(config_json)?;
//! let registry = MapperRegistry::build(&definition)?;
//!
//! // SCIM filter string -> LDAP filter string
//! let filter = ScimFilter::parse("userName eq \"ann\"")?;
//! let ldap = FilterTranslator::new(&registry).translate(&filter)?;
//! assert_eq!(ldap.render(), "(uid=ann)");
//!
//! // Directory entry -> SCIM resource (async: derived attributes may search)
//! let resource = registry.to_scim_resource(&entry, &directory, base_dn).await?;
//! ```
//!
//! ## Crate Organization
//!
//! - [`scim`] - SCIM-side data model (resources, attributes, values)
//! - [`ldap`] - LDAP-side data model (entries, filters, the search trait)
//! - [`filter`] - SCIM filter tree and parser
//! - [`schema`] - Declarative mapping definitions (serde)
//! - [`transform`] - Scalar value transformations
//! - [`mapper`] - Per-attribute bidirectional mappers
//! - [`derived`] - Computed, read-only attributes
//! - [`registry`] - Per-resource mapper tables and whole-resource mapping
//! - [`translate`] - Filter and sort translation
//! - [`error`] - Error types with client/server classification

pub mod derived;
pub mod error;
pub mod filter;
pub mod ldap;
pub mod mapper;
pub mod registry;
pub mod schema;
pub mod scim;
pub mod transform;
pub mod translate;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::derived::DerivedAttribute;
    pub use crate::error::{MappingError, MappingResult};
    pub use crate::filter::{AttributePath, FilterOp, ScimFilter};
    pub use crate::ldap::{LdapAttribute, LdapEntry, LdapFilter, LdapSearch, SearchScope};
    pub use crate::mapper::AttributeMapper;
    pub use crate::registry::MapperRegistry;
    pub use crate::schema::{AttributeDefinition, AttributeMapping, ResourceDefinition};
    pub use crate::scim::{
        AttributeType, ComplexValue, PluralInstance, PluralValue, ScimAttribute,
        ScimAttributeValue, ScimResource, ScimValue,
    };
    pub use crate::transform::{SubstitutionRule, TransformKind, ValueTransform};
    pub use crate::translate::{FilterTranslator, SortResolver};
}
