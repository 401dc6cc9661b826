//! Filter and sort translation
//!
//! Rewrites SCIM filter trees and sort parameters into their LDAP
//! counterparts using a resource's mapper registry. Translation preserves the
//! logical shape of the input tree; only the leaves change representation.

use crate::error::{MappingError, MappingResult};
use crate::filter::{AttributePath, ScimFilter};
use crate::ldap::LdapFilter;
use crate::registry::MapperRegistry;

/// Translates SCIM filter trees into LDAP filters.
pub struct FilterTranslator<'a> {
    registry: &'a MapperRegistry,
}

impl<'a> FilterTranslator<'a> {
    /// Create a translator over the given registry.
    pub fn new(registry: &'a MapperRegistry) -> Self {
        Self { registry }
    }

    /// Translate a SCIM filter into an LDAP filter.
    ///
    /// Every leaf must translate for the whole filter to translate; a filter
    /// that cannot be expressed faithfully is an error, never a weaker
    /// filter that would change the result set.
    pub fn translate(&self, filter: &ScimFilter) -> MappingResult<LdapFilter> {
        match filter {
            ScimFilter::Compare { path, op, value } => {
                let schema = path.schema.as_deref();
                if self.registry.is_derived(schema, &path.name) {
                    return Err(MappingError::unsupported_filter(format!(
                        "derived attribute '{}' cannot be filtered on",
                        path.name
                    )));
                }
                let mapper = self.registry.mapper(schema, &path.name)?;
                mapper.to_ldap_filter(path.sub_attribute.as_deref(), *op, value.as_deref())
            }
            ScimFilter::And { filters } => {
                if filters.is_empty() {
                    return Err(MappingError::unsupported_filter("empty AND filter"));
                }
                let translated = filters
                    .iter()
                    .map(|f| self.translate(f))
                    .collect::<MappingResult<Vec<_>>>()?;
                Ok(LdapFilter::and(translated))
            }
            ScimFilter::Or { filters } => {
                if filters.is_empty() {
                    return Err(MappingError::unsupported_filter("empty OR filter"));
                }
                let translated = filters
                    .iter()
                    .map(|f| self.translate(f))
                    .collect::<MappingResult<Vec<_>>>()?;
                Ok(LdapFilter::or(translated))
            }
            ScimFilter::Not { filter } => Ok(LdapFilter::negate(self.translate(filter)?)),
        }
    }
}

/// Resolves SCIM sort parameters to LDAP ordering attributes.
pub struct SortResolver<'a> {
    registry: &'a MapperRegistry,
}

impl<'a> SortResolver<'a> {
    /// Create a resolver over the given registry.
    pub fn new(registry: &'a MapperRegistry) -> Self {
        Self { registry }
    }

    /// Resolve a sort-by path to the LDAP attribute used for ordering.
    ///
    /// Fails with `NoSuchAttribute` for undeclared attributes and
    /// `UnsupportedSort` for attributes whose shape or mapping cannot order
    /// a result set (plural, unmapped, and derived attributes).
    pub fn resolve(&self, path: &AttributePath) -> MappingResult<String> {
        let schema = path.schema.as_deref();
        if !self.registry.is_declared(schema, &path.name) {
            return Err(MappingError::no_such_attribute(&path.name));
        }
        let mapper = self
            .registry
            .mapper(schema, &path.name)
            .map_err(|_| MappingError::unsupported_sort(&path.name))?;
        mapper
            .ldap_sort_attribute(path.sub_attribute.as_deref())
            .map(str::to_string)
            .ok_or_else(|| MappingError::unsupported_sort(&path.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{
        AttributeDefinition, AttributeMapping, DerivationDefinition, ResourceDefinition,
        SimpleDefinition, SimplePluralDefinition, PluralTypeDefinition,
    };
    use crate::transform::TransformKind;

    const CORE: &str = "urn:scim:schemas:core:1.0";

    fn registry() -> MapperRegistry {
        let definition = ResourceDefinition {
            name: "User".to_string(),
            schema: CORE.to_string(),
            searches: Vec::new(),
            attributes: vec![
                AttributeDefinition {
                    name: "userName".to_string(),
                    simple: Some(SimpleDefinition {
                        mapping: Some(AttributeMapping::to_attribute("uid")),
                    }),
                    ..Default::default()
                },
                AttributeDefinition {
                    name: "active".to_string(),
                    simple: Some(SimpleDefinition {
                        mapping: Some(
                            AttributeMapping::to_attribute("active")
                                .with_transform(TransformKind::Boolean),
                        ),
                    }),
                    ..Default::default()
                },
                AttributeDefinition {
                    name: "password".to_string(),
                    simple: Some(SimpleDefinition { mapping: None }),
                    ..Default::default()
                },
                AttributeDefinition {
                    name: "emails".to_string(),
                    simple_plural: Some(SimplePluralDefinition {
                        mapping: None,
                        plural_types: vec![
                            PluralTypeDefinition {
                                name: "work".to_string(),
                                mapping: Some(AttributeMapping::to_attribute("mail")),
                                pattern: None,
                            },
                            PluralTypeDefinition {
                                name: "home".to_string(),
                                mapping: Some(AttributeMapping::to_attribute("homeEmail")),
                                pattern: None,
                            },
                        ],
                    }),
                    ..Default::default()
                },
                AttributeDefinition {
                    name: "groups".to_string(),
                    derivation: Some(DerivationDefinition {
                        implementation: "groups".to_string(),
                        arguments: Default::default(),
                        ldap_search_ref: None,
                    }),
                    ..Default::default()
                },
            ],
        };
        MapperRegistry::build(&definition).unwrap()
    }

    #[test]
    fn test_tree_shape_preserved() {
        let registry = registry();
        let translator = FilterTranslator::new(&registry);

        let filter = ScimFilter::parse(
            "userName eq \"ann\" and (emails.work eq \"a@x.com\" or active eq \"true\")",
        )
        .unwrap();

        let ldap = translator.translate(&filter).unwrap();
        assert_eq!(
            ldap.render(),
            "(&(uid=ann)(|(mail=a@x.com)(active=TRUE)))"
        );
    }

    #[test]
    fn test_negation_and_presence() {
        let registry = registry();
        let translator = FilterTranslator::new(&registry);

        let filter = ScimFilter::parse("not (userName pr)").unwrap();
        assert_eq!(translator.translate(&filter).unwrap().render(), "(!(uid=*))");
    }

    #[test]
    fn test_leaf_failures_propagate() {
        let registry = registry();
        let translator = FilterTranslator::new(&registry);

        let unknown = ScimFilter::eq(AttributePath::new("nickname"), "annie");
        assert_eq!(
            translator.translate(&unknown).unwrap_err().error_code(),
            "NO_SUCH_ATTRIBUTE"
        );

        let unmapped = ScimFilter::eq(AttributePath::new("password"), "x");
        assert_eq!(
            translator.translate(&unmapped).unwrap_err().error_code(),
            "NOT_MAPPED"
        );

        let derived = ScimFilter::eq(AttributePath::new("groups"), "cn=admins");
        assert_eq!(
            translator.translate(&derived).unwrap_err().error_code(),
            "UNSUPPORTED_FILTER"
        );

        // One bad leaf poisons the whole conjunction.
        let mixed = ScimFilter::and(vec![
            ScimFilter::eq(AttributePath::new("userName"), "ann"),
            ScimFilter::eq(AttributePath::new("nickname"), "annie"),
        ]);
        assert!(translator.translate(&mixed).is_err());
    }

    #[test]
    fn test_empty_junctions_rejected() {
        let registry = registry();
        let translator = FilterTranslator::new(&registry);

        assert_eq!(
            translator
                .translate(&ScimFilter::and(Vec::new()))
                .unwrap_err()
                .error_code(),
            "UNSUPPORTED_FILTER"
        );
        assert_eq!(
            translator
                .translate(&ScimFilter::or(Vec::new()))
                .unwrap_err()
                .error_code(),
            "UNSUPPORTED_FILTER"
        );
    }

    #[test]
    fn test_sort_resolution() {
        let registry = registry();
        let resolver = SortResolver::new(&registry);

        assert_eq!(
            resolver.resolve(&AttributePath::new("userName")).unwrap(),
            "uid"
        );
        assert_eq!(
            resolver
                .resolve(&AttributePath::new("nickname"))
                .unwrap_err()
                .error_code(),
            "NO_SUCH_ATTRIBUTE"
        );
        // Plural, unmapped, and derived attributes cannot order a result set.
        for name in ["emails", "password", "groups"] {
            assert_eq!(
                resolver
                    .resolve(&AttributePath::new(name))
                    .unwrap_err()
                    .error_code(),
                "UNSUPPORTED_SORT",
                "sort on '{name}'"
            );
        }
    }
}
