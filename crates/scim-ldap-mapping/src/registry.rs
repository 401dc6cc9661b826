//! Per-resource mapper registry
//!
//! Builds the mapper and derived-attribute tables for one resource kind from
//! its declarative definition, and drives whole-resource mapping in both
//! directions.

use std::collections::{BTreeSet, HashMap};

use tracing::{debug, warn};

use crate::derived::{self, DerivedAttribute};
use crate::error::{MappingError, MappingResult};
use crate::ldap::{LdapAttribute, LdapEntry, LdapSearch};
use crate::mapper::AttributeMapper;
use crate::schema::ResourceDefinition;
use crate::scim::{AttributeType, ScimResource};

/// The mapping state of one declared attribute.
#[derive(Debug)]
enum Registration {
    /// Round-trips through an attribute mapper.
    Mapped(AttributeMapper),
    /// Computed on read; never written or filtered on.
    Derived(Box<dyn DerivedAttribute>),
    /// Declared without a usable LDAP mapping.
    Unmapped(AttributeType),
}

impl Registration {
    fn attribute_type(&self) -> &AttributeType {
        match self {
            Registration::Mapped(mapper) => mapper.attribute_type(),
            Registration::Derived(derived) => derived.attribute_type(),
            Registration::Unmapped(attr_type) => attr_type,
        }
    }
}

/// All attribute registrations for one resource kind.
///
/// Built once at schema-load time and immutable afterwards; shared freely
/// across request handlers.
#[derive(Debug)]
pub struct MapperRegistry {
    resource_name: String,
    schema: String,
    /// Declaration order, preserved for the read and write paths.
    registrations: Vec<Registration>,
    /// Lower-cased attribute name to registration indices, for O(1) lookup.
    by_name: HashMap<String, Vec<usize>>,
}

impl MapperRegistry {
    /// Build a registry from a resource definition.
    ///
    /// Fails with a configuration error on duplicate attribute declarations,
    /// conflicting shape declarations, or unresolvable derivations.
    pub fn build(definition: &ResourceDefinition) -> MappingResult<Self> {
        let mut registrations: Vec<Registration> = Vec::new();
        let mut by_name: HashMap<String, Vec<usize>> = HashMap::new();

        for attr_def in &definition.attributes {
            let schema = attr_def
                .schema
                .clone()
                .unwrap_or_else(|| definition.schema.clone());
            let attr_type = AttributeType::new(schema, attr_def.name.clone());

            let key = attr_def.name.to_ascii_lowercase();
            let duplicate = by_name.get(&key).is_some_and(|indices| {
                indices
                    .iter()
                    .any(|&i| registrations[i].attribute_type() == &attr_type)
            });
            if duplicate {
                return Err(MappingError::configuration(format!(
                    "attribute '{attr_type}' declared more than once in resource '{}'",
                    definition.name
                )));
            }

            let registration = if let Some(derivation) = &attr_def.derivation {
                Registration::Derived(derived::create(
                    attr_type,
                    derivation,
                    &definition.searches,
                )?)
            } else {
                match AttributeMapper::create(attr_def, &definition.schema)? {
                    Some(mapper) => Registration::Mapped(mapper),
                    None => {
                        debug!(
                            resource = %definition.name,
                            attribute = %attr_type,
                            "attribute declared without an LDAP mapping"
                        );
                        Registration::Unmapped(attr_type)
                    }
                }
            };
            by_name.entry(key).or_default().push(registrations.len());
            registrations.push(registration);
        }

        Ok(Self {
            resource_name: definition.name.clone(),
            schema: definition.schema.clone(),
            registrations,
            by_name,
        })
    }

    /// The resource name (e.g. `User`).
    pub fn resource_name(&self) -> &str {
        &self.resource_name
    }

    /// The resource's core schema URI.
    pub fn schema(&self) -> &str {
        &self.schema
    }

    fn find(&self, schema: Option<&str>, name: &str) -> Option<&Registration> {
        // A path without a schema matches by name alone, first declaration
        // wins; core-schema attributes are declared first in practice.
        self.by_name
            .get(&name.to_ascii_lowercase())?
            .iter()
            .map(|&i| &self.registrations[i])
            .find(|r| schema.map_or(true, |s| r.attribute_type().schema() == s))
    }

    /// Whether the attribute is declared at all.
    pub fn is_declared(&self, schema: Option<&str>, name: &str) -> bool {
        self.find(schema, name).is_some()
    }

    /// Whether the attribute is derived (computed, read-only).
    pub fn is_derived(&self, schema: Option<&str>, name: &str) -> bool {
        matches!(self.find(schema, name), Some(Registration::Derived(_)))
    }

    /// Look up the mapper for an attribute path.
    ///
    /// Fails with `NoSuchAttribute` for undeclared attributes and `NotMapped`
    /// for declared attributes without a mapper (including derived ones).
    pub fn mapper(&self, schema: Option<&str>, name: &str) -> MappingResult<&AttributeMapper> {
        match self.find(schema, name) {
            Some(Registration::Mapped(mapper)) => Ok(mapper),
            Some(_) => Err(MappingError::not_mapped(name)),
            None => Err(MappingError::no_such_attribute(name)),
        }
    }

    /// The union of LDAP attributes needed to populate every mapped and
    /// derived attribute of the resource.
    pub fn ldap_attributes(&self) -> BTreeSet<String> {
        let mut set = BTreeSet::new();
        for registration in &self.registrations {
            match registration {
                Registration::Mapped(mapper) => set.extend(mapper.ldap_attributes()),
                Registration::Derived(derived) => set.extend(derived.ldap_attributes()),
                Registration::Unmapped(_) => {}
            }
        }
        set
    }

    /// Map a whole SCIM resource into LDAP attribute assignments.
    ///
    /// Derived attributes present on the resource are ignored, since their
    /// values are computed rather than stored. An undeclared attribute is a
    /// `NoSuchAttribute` error; a declared but unmapped attribute that is
    /// actually present is a `NotMapped` error rather than silent data loss.
    pub fn to_ldap_attributes(&self, resource: &ScimResource) -> MappingResult<Vec<LdapAttribute>> {
        let mut assignments: Vec<LdapAttribute> = Vec::new();

        for attribute in resource.iter() {
            let registration = self
                .registrations
                .iter()
                .find(|r| r.attribute_type() == &attribute.attr_type)
                .ok_or_else(|| {
                    MappingError::no_such_attribute(attribute.attr_type.name())
                })?;

            match registration {
                Registration::Mapped(mapper) => {
                    for assignment in mapper.to_ldap_attributes(resource)? {
                        merge_assignment(&mut assignments, assignment);
                    }
                }
                Registration::Derived(_) => {
                    debug!(
                        resource = %self.resource_name,
                        attribute = %attribute.attr_type,
                        "ignoring derived attribute on write"
                    );
                }
                Registration::Unmapped(attr_type) => {
                    return Err(MappingError::not_mapped(attr_type.name()));
                }
            }
        }
        Ok(assignments)
    }

    /// Map an LDAP entry into a SCIM resource.
    ///
    /// A stored value that does not parse as its declared type is logged and
    /// the attribute treated as absent; a derivation that cannot interpret
    /// its entry is likewise skipped. Directory search failures from derived
    /// attributes propagate.
    pub async fn to_scim_resource(
        &self,
        entry: &LdapEntry,
        searcher: &dyn LdapSearch,
        base_dn: &str,
    ) -> MappingResult<ScimResource> {
        let mut resource = ScimResource::new();

        for registration in &self.registrations {
            match registration {
                Registration::Mapped(mapper) => match mapper.to_scim_attribute(entry) {
                    Ok(Some(attribute)) => resource.set(attribute),
                    Ok(None) => {}
                    Err(err @ MappingError::Format { .. }) => {
                        warn!(
                            resource = %self.resource_name,
                            attribute = %mapper.attribute_type(),
                            dn = entry.dn(),
                            error = %err,
                            "stored value does not match declared type, treating attribute as absent"
                        );
                    }
                    Err(err) => return Err(err),
                },
                Registration::Derived(derived) => {
                    match derived.derive(entry, searcher, base_dn).await {
                        Ok(Some(attribute)) => resource.set(attribute),
                        Ok(None) => {}
                        Err(err @ MappingError::InvalidMapping { .. })
                        | Err(err @ MappingError::Format { .. }) => {
                            warn!(
                                resource = %self.resource_name,
                                attribute = %derived.attribute_type(),
                                dn = entry.dn(),
                                error = %err,
                                "derivation failed, treating attribute as absent"
                            );
                        }
                        Err(err) => return Err(err),
                    }
                }
                Registration::Unmapped(_) => {}
            }
        }
        Ok(resource)
    }
}

fn merge_assignment(assignments: &mut Vec<LdapAttribute>, assignment: LdapAttribute) {
    if let Some(existing) = assignments
        .iter_mut()
        .find(|a| a.name.eq_ignore_ascii_case(&assignment.name))
    {
        existing.values.extend(assignment.values);
    } else {
        assignments.push(assignment);
    }
}
