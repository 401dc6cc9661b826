//! Derived attributes
//!
//! Attributes whose SCIM value is computed from an entry and, when needed,
//! auxiliary directory searches, rather than mapped from stored attributes.
//! Derived attributes are read-only: they never participate in writes or in
//! filter translation.
//!
//! Implementations are resolved from a fixed registration table keyed by a
//! short identifier in the mapping definition.

use std::collections::BTreeSet;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{MappingError, MappingResult};
use crate::ldap::{LdapEntry, LdapFilter, LdapSearch, SearchScope};
use crate::schema::{DerivationDefinition, LdapSearchParameters};
use crate::scim::{AttributeType, ComplexValue, PluralInstance, ScimAttribute};

/// A computed, read-only SCIM attribute.
#[async_trait]
pub trait DerivedAttribute: std::fmt::Debug + Send + Sync {
    /// The SCIM attribute type this derivation produces.
    fn attribute_type(&self) -> &AttributeType;

    /// The entry attributes the derivation wants fetched up front.
    fn ldap_attributes(&self) -> BTreeSet<String>;

    /// Compute the attribute for one entry.
    ///
    /// `searcher` performs auxiliary lookups; `base_dn` is the fallback
    /// search base when the derivation has no pre-configured search.
    /// Returns `None` when the entry yields no value.
    async fn derive(
        &self,
        entry: &LdapEntry,
        searcher: &dyn LdapSearch,
        base_dn: &str,
    ) -> MappingResult<Option<ScimAttribute>>;
}

/// A search template resolved from the mapping definition.
#[derive(Debug, Clone)]
struct ResolvedSearch {
    base_dn: String,
    scope: SearchScope,
    filter: Option<LdapFilter>,
}

type DerivedFactory = fn(
    AttributeType,
    &DerivationDefinition,
    Option<ResolvedSearch>,
) -> MappingResult<Box<dyn DerivedAttribute>>;

/// Known derivation implementations. Adding one means adding a row here.
const REGISTRATIONS: &[(&str, DerivedFactory)] = &[
    ("groups", GroupsDerivedAttribute::from_definition),
    ("members", MembersDerivedAttribute::from_definition),
];

fn argument(definition: &DerivationDefinition, key: &str, default: &str) -> String {
    definition
        .arguments
        .get(key)
        .cloned()
        .unwrap_or_else(|| default.to_string())
}

fn check_arguments(
    attr_type: &AttributeType,
    definition: &DerivationDefinition,
    allowed: &[&str],
) -> MappingResult<()> {
    for key in definition.arguments.keys() {
        if !allowed.contains(&key.as_str()) {
            return Err(MappingError::configuration(format!(
                "unknown derivation argument '{key}' for '{attr_type}'"
            )));
        }
    }
    Ok(())
}

/// Create a derived attribute from its derivation element.
///
/// The implementation identifier is resolved against the registration table;
/// an unknown identifier or a dangling search reference is a configuration
/// error.
pub fn create(
    attr_type: AttributeType,
    definition: &DerivationDefinition,
    searches: &[LdapSearchParameters],
) -> MappingResult<Box<dyn DerivedAttribute>> {
    let search = match &definition.ldap_search_ref {
        Some(id) => {
            let params = searches.iter().find(|s| s.id == *id).ok_or_else(|| {
                MappingError::configuration(format!(
                    "derivation for '{attr_type}' references unknown search '{id}'"
                ))
            })?;
            Some(ResolvedSearch {
                base_dn: params.base_dn.clone(),
                scope: params.scope,
                filter: params.filter.clone(),
            })
        }
        None => None,
    };

    for (id, factory) in REGISTRATIONS {
        if id.eq_ignore_ascii_case(&definition.implementation) {
            return factory(attr_type, definition, search);
        }
    }
    Err(MappingError::configuration(format!(
        "unknown derivation implementation '{}' for '{attr_type}'",
        definition.implementation
    )))
}

/// Group membership of a user entry.
///
/// Uses the `isMemberOf` virtual attribute when the server provides it;
/// otherwise searches for group entries naming the user's DN in `member` or
/// `uniqueMember`. Each instance carries the group DN as `value` and, for
/// searched groups, the `cn` as `display`. The attribute names are
/// overridable through the derivation arguments `isMemberOfAttribute`,
/// `memberAttribute`, and `uniqueMemberAttribute`.
#[derive(Debug)]
struct GroupsDerivedAttribute {
    attr_type: AttributeType,
    search: Option<ResolvedSearch>,
    is_member_of: String,
    member: String,
    unique_member: String,
}

impl GroupsDerivedAttribute {
    fn from_definition(
        attr_type: AttributeType,
        definition: &DerivationDefinition,
        search: Option<ResolvedSearch>,
    ) -> MappingResult<Box<dyn DerivedAttribute>> {
        check_arguments(
            &attr_type,
            definition,
            &["isMemberOfAttribute", "memberAttribute", "uniqueMemberAttribute"],
        )?;
        Ok(Box::new(Self {
            attr_type,
            search,
            is_member_of: argument(definition, "isMemberOfAttribute", "isMemberOf"),
            member: argument(definition, "memberAttribute", "member"),
            unique_member: argument(definition, "uniqueMemberAttribute", "uniqueMember"),
        }))
    }
}

#[async_trait]
impl DerivedAttribute for GroupsDerivedAttribute {
    fn attribute_type(&self) -> &AttributeType {
        &self.attr_type
    }

    fn ldap_attributes(&self) -> BTreeSet<String> {
        BTreeSet::from([self.is_member_of.clone()])
    }

    async fn derive(
        &self,
        entry: &LdapEntry,
        searcher: &dyn LdapSearch,
        base_dn: &str,
    ) -> MappingResult<Option<ScimAttribute>> {
        if let Some(group_dns) = entry.values(&self.is_member_of) {
            let instances: Vec<PluralInstance> = group_dns
                .iter()
                .map(|dn| {
                    PluralInstance::untyped_complex(ComplexValue::new().with("value", dn.clone()))
                })
                .collect();
            if instances.is_empty() {
                return Ok(None);
            }
            return Ok(Some(ScimAttribute::plural(self.attr_type.clone(), instances)));
        }

        let membership = LdapFilter::or(vec![
            LdapFilter::eq(self.member.clone(), entry.dn()),
            LdapFilter::eq(self.unique_member.clone(), entry.dn()),
        ]);
        let (search_base, scope, filter) = match &self.search {
            Some(search) => {
                let filter = match &search.filter {
                    Some(extra) => LdapFilter::and(vec![extra.clone(), membership]),
                    None => membership,
                };
                (search.base_dn.as_str(), search.scope, filter)
            }
            None => (base_dn, SearchScope::Subtree, membership),
        };

        debug!(
            attribute = %self.attr_type,
            base_dn = search_base,
            filter = %filter,
            "searching for group memberships"
        );
        let groups = searcher
            .search(search_base, scope, &filter, &["cn"])
            .await?;

        if groups.is_empty() {
            return Ok(None);
        }
        let instances: Vec<PluralInstance> = groups
            .iter()
            .map(|group| {
                let mut complex = ComplexValue::new().with("value", group.dn().to_string());
                if let Some(cn) = group.first_value("cn") {
                    complex.set("display", cn.to_string());
                }
                PluralInstance::untyped_complex(complex)
            })
            .collect();
        Ok(Some(ScimAttribute::plural(self.attr_type.clone(), instances)))
    }
}

/// Membership of a group entry, read from `member` and `uniqueMember` (or
/// the attributes named by the `memberAttribute` / `uniqueMemberAttribute`
/// derivation arguments).
#[derive(Debug)]
struct MembersDerivedAttribute {
    attr_type: AttributeType,
    member: String,
    unique_member: String,
}

impl MembersDerivedAttribute {
    fn from_definition(
        attr_type: AttributeType,
        definition: &DerivationDefinition,
        _search: Option<ResolvedSearch>,
    ) -> MappingResult<Box<dyn DerivedAttribute>> {
        check_arguments(
            &attr_type,
            definition,
            &["memberAttribute", "uniqueMemberAttribute"],
        )?;
        Ok(Box::new(Self {
            attr_type,
            member: argument(definition, "memberAttribute", "member"),
            unique_member: argument(definition, "uniqueMemberAttribute", "uniqueMember"),
        }))
    }
}

#[async_trait]
impl DerivedAttribute for MembersDerivedAttribute {
    fn attribute_type(&self) -> &AttributeType {
        &self.attr_type
    }

    fn ldap_attributes(&self) -> BTreeSet<String> {
        BTreeSet::from([self.member.clone(), self.unique_member.clone()])
    }

    async fn derive(
        &self,
        entry: &LdapEntry,
        _searcher: &dyn LdapSearch,
        _base_dn: &str,
    ) -> MappingResult<Option<ScimAttribute>> {
        let mut instances = Vec::new();
        for attribute in [&self.member, &self.unique_member] {
            if let Some(dns) = entry.values(attribute) {
                instances.extend(dns.iter().map(|dn| {
                    PluralInstance::untyped_complex(ComplexValue::new().with("value", dn.clone()))
                }));
            }
        }
        if instances.is_empty() {
            return Ok(None);
        }
        Ok(Some(ScimAttribute::plural(self.attr_type.clone(), instances)))
    }
}
