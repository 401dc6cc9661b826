//! End-to-end mapping tests: a resource definition loaded from JSON, driven
//! through the write path, the read path, and filter/sort translation.

use async_trait::async_trait;

use scim_ldap_mapping::prelude::*;
use scim_ldap_mapping::error::MappingResult;

const CORE: &str = "urn:scim:schemas:core:1.0";
const BASE_DN: &str = "dc=example,dc=com";

const USER_DEFINITION: &str = r#"{
    "name": "User",
    "schema": "urn:scim:schemas:core:1.0",
    "searches": [
        {
            "id": "groupSearch",
            "baseDn": "ou=groups,dc=example,dc=com",
            "scope": "subtree",
            "filter": { "type": "equals", "attribute": "objectClass", "value": "groupOfNames" }
        }
    ],
    "attributes": [
        { "name": "userName", "simple": { "mapping": { "ldapAttribute": "uid" } } },
        {
            "name": "active",
            "simple": { "mapping": { "ldapAttribute": "active", "transform": "boolean" } }
        },
        {
            "name": "whenCreated",
            "simple": {
                "mapping": { "ldapAttribute": "createTimestamp", "transform": "generalizedTime" }
            }
        },
        { "name": "password", "simple": {} },
        {
            "name": "name",
            "complex": {
                "subAttributes": [
                    { "name": "givenName", "mapping": { "ldapAttribute": "givenName" } },
                    { "name": "familyName", "mapping": { "ldapAttribute": "sn" } }
                ]
            }
        },
        {
            "name": "emails",
            "simplePlural": {
                "pluralTypes": [
                    { "name": "work", "mapping": { "ldapAttribute": "mail" } },
                    { "name": "home", "mapping": { "ldapAttribute": "homeEmail" } }
                ]
            }
        },
        {
            "name": "groups",
            "derivation": { "implementation": "groups", "ldapSearchRef": "groupSearch" }
        }
    ]
}"#;

struct FixtureDirectory {
    groups: Vec<LdapEntry>,
}

#[async_trait]
impl LdapSearch for FixtureDirectory {
    async fn search(
        &self,
        _base_dn: &str,
        _scope: SearchScope,
        _filter: &LdapFilter,
        _attributes: &[&str],
    ) -> MappingResult<Vec<LdapEntry>> {
        Ok(self.groups.clone())
    }
}

fn registry() -> MapperRegistry {
    let definition: ResourceDefinition = serde_json::from_str(USER_DEFINITION).unwrap();
    MapperRegistry::build(&definition).unwrap()
}

fn ann_resource() -> ScimResource {
    ScimResource::new()
        .with(ScimAttribute::simple(
            AttributeType::new(CORE, "userName"),
            "ann",
        ))
        .with(ScimAttribute::simple(
            AttributeType::new(CORE, "active"),
            true,
        ))
        .with(ScimAttribute::complex(
            AttributeType::new(CORE, "name"),
            ComplexValue::new()
                .with("givenName", "Ann")
                .with("familyName", "Lee"),
        ))
        .with(ScimAttribute::plural(
            AttributeType::new(CORE, "emails"),
            vec![
                PluralInstance::simple("work", "ann@example.com"),
                PluralInstance::simple("home", "ann@home.example"),
            ],
        ))
}

#[test]
fn write_path_produces_directory_assignments() {
    let attrs = registry().to_ldap_attributes(&ann_resource()).unwrap();

    assert_eq!(
        attrs,
        vec![
            LdapAttribute::new("uid", "ann"),
            LdapAttribute::new("active", "TRUE"),
            LdapAttribute::new("givenName", "Ann"),
            LdapAttribute::new("sn", "Lee"),
            LdapAttribute::new("mail", "ann@example.com"),
            LdapAttribute::new("homeEmail", "ann@home.example"),
        ]
    );
}

#[tokio::test]
async fn round_trip_preserves_resource() {
    let registry = registry();
    let original = ann_resource();

    let mut entry = LdapEntry::new("uid=ann,ou=people,dc=example,dc=com");
    for attr in registry.to_ldap_attributes(&original).unwrap() {
        for value in attr.values {
            entry.add_value(attr.name.clone(), value);
        }
    }

    let directory = FixtureDirectory { groups: Vec::new() };
    let read_back = registry
        .to_scim_resource(&entry, &directory, BASE_DN)
        .await
        .unwrap();

    for attribute in original.iter() {
        assert_eq!(
            read_back.get(&attribute.attr_type),
            Some(attribute),
            "attribute {}",
            attribute.attr_type
        );
    }
}

#[tokio::test]
async fn read_path_computes_derived_groups() {
    let registry = registry();
    let entry = LdapEntry::new("uid=ann,ou=people,dc=example,dc=com").with_value("uid", "ann");

    let group = LdapEntry::new("cn=admins,ou=groups,dc=example,dc=com").with_value("cn", "admins");
    let directory = FixtureDirectory {
        groups: vec![group],
    };

    let resource = registry
        .to_scim_resource(&entry, &directory, BASE_DN)
        .await
        .unwrap();

    let groups = resource.get(&AttributeType::new(CORE, "groups")).unwrap();
    let ScimAttributeValue::Plural(instances) = &groups.value else {
        panic!("expected plural groups");
    };
    let PluralValue::Complex(membership) = &instances[0].value else {
        panic!("expected complex instance");
    };
    assert_eq!(
        membership.get("value").and_then(ScimValue::as_str),
        Some("cn=admins,ou=groups,dc=example,dc=com")
    );
    assert_eq!(
        membership.get("display").and_then(ScimValue::as_str),
        Some("admins")
    );
}

#[test]
fn filter_translation_preserves_tree_shape() {
    let registry = registry();
    let translator = FilterTranslator::new(&registry);

    let filter = ScimFilter::parse(
        "userName eq \"ann\" and (emails.work eq \"ann@example.com\" or active eq \"true\")",
    )
    .unwrap();

    assert_eq!(
        translator.translate(&filter).unwrap().render(),
        "(&(uid=ann)(|(mail=ann@example.com)(active=TRUE)))"
    );
}

#[test]
fn filter_values_pass_through_value_transforms() {
    let registry = registry();
    let translator = FilterTranslator::new(&registry);

    let filter = ScimFilter::parse("whenCreated ge \"2024-03-15T08:30:00Z\"").unwrap();
    assert_eq!(
        translator.translate(&filter).unwrap().render(),
        "(createTimestamp>=20240315083000Z)"
    );

    // Strict inequality never degrades to the inclusive form.
    let filter = ScimFilter::parse("whenCreated gt \"2024-03-15T08:30:00Z\"").unwrap();
    assert_eq!(
        translator.translate(&filter).unwrap().render(),
        "(&(createTimestamp>=20240315083000Z)(!(createTimestamp=20240315083000Z)))"
    );
}

#[test]
fn filter_on_complex_sub_attribute() {
    let registry = registry();
    let translator = FilterTranslator::new(&registry);

    let filter = ScimFilter::parse("name.familyName sw \"Le\"").unwrap();
    assert_eq!(translator.translate(&filter).unwrap().render(), "(sn=Le*)");
}

#[test]
fn untranslatable_filters_are_rejected_not_weakened() {
    let registry = registry();
    let translator = FilterTranslator::new(&registry);

    // Substring match against a boolean encoding has no faithful rendering.
    let filter = ScimFilter::parse("active co \"tru\"").unwrap();
    assert_eq!(
        translator.translate(&filter).unwrap_err().error_code(),
        "UNSUPPORTED_FILTER"
    );

    // Derived attributes have no stored representation to filter on.
    let filter = ScimFilter::parse("groups eq \"cn=admins\"").unwrap();
    assert_eq!(
        translator.translate(&filter).unwrap_err().error_code(),
        "UNSUPPORTED_FILTER"
    );

    let filter = ScimFilter::parse("nickname eq \"annie\"").unwrap();
    assert_eq!(
        translator.translate(&filter).unwrap_err().error_code(),
        "NO_SUCH_ATTRIBUTE"
    );
}

#[test]
fn unmapped_attribute_is_visible_as_an_error_not_data_loss() {
    let registry = registry();

    let resource = ScimResource::new().with(ScimAttribute::simple(
        AttributeType::new(CORE, "password"),
        "secret",
    ));
    assert_eq!(
        registry.to_ldap_attributes(&resource).unwrap_err().error_code(),
        "NOT_MAPPED"
    );
}

#[test]
fn sort_resolution() {
    let registry = registry();
    let resolver = SortResolver::new(&registry);

    assert_eq!(resolver.resolve(&AttributePath::new("userName")).unwrap(), "uid");
    assert_eq!(
        resolver.resolve(&AttributePath::with_sub("name", "familyName")).unwrap(),
        "sn"
    );
    assert_eq!(
        resolver.resolve(&AttributePath::new("emails")).unwrap_err().error_code(),
        "UNSUPPORTED_SORT"
    );
    assert_eq!(
        resolver.resolve(&AttributePath::new("groups")).unwrap_err().error_code(),
        "UNSUPPORTED_SORT"
    );
}

#[tokio::test]
async fn malformed_stored_values_do_not_poison_the_resource() {
    let registry = registry();
    let entry = LdapEntry::new("uid=ann,ou=people,dc=example,dc=com")
        .with_value("uid", "ann")
        .with_value("active", "banana")
        .with_value("createTimestamp", "not-a-time");

    let directory = FixtureDirectory { groups: Vec::new() };
    let resource = registry
        .to_scim_resource(&entry, &directory, BASE_DN)
        .await
        .unwrap();

    assert!(resource.has(&AttributeType::new(CORE, "userName")));
    assert!(!resource.has(&AttributeType::new(CORE, "active")));
    assert!(!resource.has(&AttributeType::new(CORE, "whenCreated")));
}
