//! Attribute mapper family
//!
//! Bidirectional mapping between one SCIM attribute and its LDAP
//! representation. Four declared shapes (simple, complex, simple plural,
//! complex plural) are realized by three concrete mappers behind one enum;
//! both plural shapes share [`PluralMapper`], with per-partition rules.

use std::collections::BTreeSet;

use regex::Regex;
use tracing::debug;

use crate::error::{MappingError, MappingResult};
use crate::filter::FilterOp;
use crate::ldap::{LdapAttribute, LdapEntry, LdapFilter};
use crate::schema::{AttributeDefinition, AttributeMapping, SubAttributeDefinition};
use crate::scim::{
    AttributeType, ComplexValue, PluralInstance, PluralValue, ScimAttribute, ScimAttributeValue,
    ScimResource,
};
use crate::transform::ValueTransform;

/// A mapper between one SCIM attribute type and its LDAP attributes.
///
/// Immutable after construction; one instance exists per configured resource
/// attribute for the lifetime of the loaded schema.
#[derive(Debug)]
pub enum AttributeMapper {
    /// One SCIM attribute, one LDAP attribute.
    Simple(SimpleMapper),
    /// One complex SCIM attribute, several LDAP attributes.
    Complex(ComplexMapper),
    /// A multi-valued SCIM attribute partitioned by type.
    Plural(PluralMapper),
}

impl AttributeMapper {
    /// The SCIM attribute type owned by this mapper.
    pub fn attribute_type(&self) -> &AttributeType {
        match self {
            AttributeMapper::Simple(m) => &m.attr_type,
            AttributeMapper::Complex(m) => &m.attr_type,
            AttributeMapper::Plural(m) => &m.attr_type,
        }
    }

    /// The LDAP attributes this mapper needs present in an entry.
    ///
    /// Pattern-matched plural partitions contribute nothing here: their
    /// attribute set is only known once an entry is in hand.
    pub fn ldap_attributes(&self) -> BTreeSet<String> {
        let mut set = BTreeSet::new();
        match self {
            AttributeMapper::Simple(m) => {
                set.insert(m.ldap_attribute.clone());
            }
            AttributeMapper::Complex(m) => {
                set.extend(m.subs.iter().map(|s| s.ldap_attribute.clone()));
            }
            AttributeMapper::Plural(m) => {
                for partition in &m.partitions {
                    match &partition.rule {
                        PartitionRule::Simple { ldap_attribute, .. } => {
                            set.insert(ldap_attribute.clone());
                        }
                        PartitionRule::Complex { subs } => {
                            set.extend(subs.iter().map(|s| s.ldap_attribute.clone()));
                        }
                        PartitionRule::Pattern { .. } => {}
                    }
                }
            }
        }
        set
    }

    /// Translate one filter leaf targeting this mapper's attribute into an
    /// LDAP filter fragment.
    ///
    /// `sub_attribute` optionally names a complex sub-attribute or a plural
    /// type qualifier from the filter's attribute path.
    pub fn to_ldap_filter(
        &self,
        sub_attribute: Option<&str>,
        op: FilterOp,
        value: Option<&str>,
    ) -> MappingResult<LdapFilter> {
        match self {
            AttributeMapper::Simple(m) => m.to_ldap_filter(sub_attribute, op, value),
            AttributeMapper::Complex(m) => m.to_ldap_filter(sub_attribute, op, value),
            AttributeMapper::Plural(m) => m.to_ldap_filter(sub_attribute, op, value),
        }
    }

    /// The LDAP attribute to use when this SCIM attribute is a sort key.
    ///
    /// Returns `None` if the mapper's shape cannot be sorted; plural
    /// attributes never can, since sorting needs a single ordering key.
    pub fn ldap_sort_attribute(&self, sub_attribute: Option<&str>) -> Option<&str> {
        match self {
            AttributeMapper::Simple(m) => match sub_attribute {
                None => Some(&m.ldap_attribute),
                Some(_) => None,
            },
            AttributeMapper::Complex(m) => match sub_attribute {
                Some(sub) => m.find_sub(sub).map(|s| s.ldap_attribute.as_str()),
                // An unqualified sort on a complex attribute orders by the
                // first-declared mapped sub-attribute.
                None => m.subs.first().map(|s| s.ldap_attribute.as_str()),
            },
            AttributeMapper::Plural(_) => None,
        }
    }

    /// Map this mapper's SCIM attribute out of the resource into LDAP
    /// attribute assignments. An absent attribute yields an empty result.
    pub fn to_ldap_attributes(&self, resource: &ScimResource) -> MappingResult<Vec<LdapAttribute>> {
        let Some(attribute) = resource.get(self.attribute_type()) else {
            return Ok(Vec::new());
        };
        match self {
            AttributeMapper::Simple(m) => m.to_ldap_attributes(&attribute.value),
            AttributeMapper::Complex(m) => m.to_ldap_attributes(&attribute.value),
            AttributeMapper::Plural(m) => m.to_ldap_attributes(&attribute.value),
        }
    }

    /// Reconstruct this mapper's SCIM attribute from an LDAP entry.
    ///
    /// Returns `None` if none of the mapper's LDAP attributes are present.
    pub fn to_scim_attribute(&self, entry: &LdapEntry) -> MappingResult<Option<ScimAttribute>> {
        match self {
            AttributeMapper::Simple(m) => m.to_scim_attribute(entry),
            AttributeMapper::Complex(m) => m.to_scim_attribute(entry),
            AttributeMapper::Plural(m) => m.to_scim_attribute(entry),
        }
    }

    /// Create a mapper from an attribute definition.
    ///
    /// Returns `Ok(None)` if the definition carries no usable mapping, in
    /// which case the attribute cannot be round-tripped to the directory.
    pub fn create(
        definition: &AttributeDefinition,
        resource_schema: &str,
    ) -> MappingResult<Option<AttributeMapper>> {
        if definition.shape_count() > 1 {
            return Err(MappingError::configuration(format!(
                "attribute '{}' declares more than one shape",
                definition.name
            )));
        }

        let schema = definition
            .schema
            .clone()
            .unwrap_or_else(|| resource_schema.to_string());
        let attr_type = AttributeType::new(schema, definition.name.clone());

        if let Some(simple) = &definition.simple {
            let Some(mapping) = &simple.mapping else {
                return Ok(None);
            };
            return Ok(Some(AttributeMapper::Simple(SimpleMapper {
                attr_type,
                ldap_attribute: mapping.ldap_attribute.clone(),
                transform: build_transform(mapping)?,
            })));
        }

        if let Some(complex) = &definition.complex {
            let subs = build_sub_transforms(&complex.sub_attributes)?;
            if subs.is_empty() {
                return Ok(None);
            }
            return Ok(Some(AttributeMapper::Complex(ComplexMapper {
                attr_type,
                subs,
            })));
        }

        if let Some(plural) = &definition.simple_plural {
            let mut partitions = Vec::new();
            for plural_type in &plural.plural_types {
                let rule = if let Some(mapping) = &plural_type.mapping {
                    PartitionRule::Simple {
                        ldap_attribute: mapping.ldap_attribute.clone(),
                        transform: build_transform(mapping)?,
                    }
                } else if let Some(pattern) = &plural_type.pattern {
                    let regex = Regex::new(pattern).map_err(|e| {
                        MappingError::configuration(format!(
                            "invalid plural type pattern '{pattern}' on attribute '{}': {e}",
                            definition.name
                        ))
                    })?;
                    PartitionRule::Pattern { regex }
                } else {
                    // Partition with neither mapping nor pattern is unusable.
                    continue;
                };
                partitions.push(PluralPartition {
                    type_tag: Some(plural_type.name.clone()),
                    rule,
                });
            }
            if let Some(mapping) = &plural.mapping {
                partitions.push(PluralPartition {
                    type_tag: None,
                    rule: PartitionRule::Simple {
                        ldap_attribute: mapping.ldap_attribute.clone(),
                        transform: build_transform(mapping)?,
                    },
                });
            }
            if partitions.is_empty() {
                return Ok(None);
            }
            return Ok(Some(AttributeMapper::Plural(PluralMapper {
                attr_type,
                partitions,
            })));
        }

        if let Some(plural) = &definition.complex_plural {
            let mut partitions = Vec::new();
            for plural_type in &plural.plural_types {
                let subs = build_sub_transforms(&plural_type.sub_attributes)?;
                if subs.is_empty() {
                    continue;
                }
                partitions.push(PluralPartition {
                    type_tag: Some(plural_type.name.clone()),
                    rule: PartitionRule::Complex { subs },
                });
            }
            if partitions.is_empty() {
                return Ok(None);
            }
            return Ok(Some(AttributeMapper::Plural(PluralMapper {
                attr_type,
                partitions,
            })));
        }

        Ok(None)
    }
}

fn build_transform(mapping: &AttributeMapping) -> MappingResult<ValueTransform> {
    match &mapping.substitution {
        Some(rule) => ValueTransform::with_substitution(mapping.transform, rule),
        None => Ok(ValueTransform::new(mapping.transform)),
    }
}

fn build_sub_transforms(
    definitions: &[SubAttributeDefinition],
) -> MappingResult<Vec<SubAttributeTransform>> {
    let mut subs = Vec::new();
    for def in definitions {
        if let Some(mapping) = &def.mapping {
            subs.push(SubAttributeTransform {
                name: def.name.clone(),
                ldap_attribute: mapping.ldap_attribute.clone(),
                transform: build_transform(mapping)?,
            });
        }
    }
    Ok(subs)
}

/// Translate one comparison against a single LDAP attribute.
fn leaf_filter(
    ldap_attribute: &str,
    transform: &ValueTransform,
    op: FilterOp,
    value: Option<&str>,
    scim_attribute: &str,
) -> MappingResult<LdapFilter> {
    if op == FilterOp::Pr {
        return Ok(LdapFilter::present(ldap_attribute));
    }

    let raw = value.ok_or_else(|| {
        MappingError::unsupported_filter(format!(
            "operator requires a value for attribute '{scim_attribute}'"
        ))
    })?;
    let ldap_value = transform.filter_value_to_ldap(raw, scim_attribute)?;

    match op {
        FilterOp::Eq => Ok(LdapFilter::eq(ldap_attribute, ldap_value)),
        FilterOp::Ne => Ok(LdapFilter::negate(LdapFilter::eq(ldap_attribute, ldap_value))),
        FilterOp::Co | FilterOp::Sw | FilterOp::Ew => {
            if !transform.allows_substring() {
                return Err(MappingError::unsupported_filter(format!(
                    "attribute '{scim_attribute}' does not support substring matching"
                )));
            }
            Ok(match op {
                FilterOp::Co => LdapFilter::contains(ldap_attribute, ldap_value),
                FilterOp::Sw => LdapFilter::starts_with(ldap_attribute, ldap_value),
                _ => LdapFilter::ends_with(ldap_attribute, ldap_value),
            })
        }
        FilterOp::Ge => Ok(LdapFilter::ge(ldap_attribute, ldap_value)),
        FilterOp::Le => Ok(LdapFilter::le(ldap_attribute, ldap_value)),
        // LDAP has no strict inequality; express it exactly rather than
        // weakening to the inclusive form.
        FilterOp::Gt => Ok(LdapFilter::and(vec![
            LdapFilter::ge(ldap_attribute, ldap_value.clone()),
            LdapFilter::negate(LdapFilter::eq(ldap_attribute, ldap_value)),
        ])),
        FilterOp::Lt => Ok(LdapFilter::and(vec![
            LdapFilter::le(ldap_attribute, ldap_value.clone()),
            LdapFilter::negate(LdapFilter::eq(ldap_attribute, ldap_value)),
        ])),
        FilterOp::Pr => Ok(LdapFilter::present(ldap_attribute)),
    }
}

/// Collect per-value LDAP assignments, merging values of the same attribute.
fn push_assignment(assignments: &mut Vec<LdapAttribute>, name: &str, value: String) {
    if let Some(existing) = assignments
        .iter_mut()
        .find(|a| a.name.eq_ignore_ascii_case(name))
    {
        existing.values.push(value);
    } else {
        assignments.push(LdapAttribute::new(name, value));
    }
}

/// Mapper for a simple singular attribute.
#[derive(Debug)]
pub struct SimpleMapper {
    attr_type: AttributeType,
    ldap_attribute: String,
    transform: ValueTransform,
}

impl SimpleMapper {
    fn to_ldap_filter(
        &self,
        sub_attribute: Option<&str>,
        op: FilterOp,
        value: Option<&str>,
    ) -> MappingResult<LdapFilter> {
        if let Some(sub) = sub_attribute {
            return Err(MappingError::unsupported_filter(format!(
                "attribute '{}' has no sub-attribute '{sub}'",
                self.attr_type.name()
            )));
        }
        leaf_filter(
            &self.ldap_attribute,
            &self.transform,
            op,
            value,
            self.attr_type.name(),
        )
    }

    fn to_ldap_attributes(&self, value: &ScimAttributeValue) -> MappingResult<Vec<LdapAttribute>> {
        let ScimAttributeValue::Simple(scalar) = value else {
            return Err(MappingError::invalid_mapping(
                self.attr_type.name(),
                "expected a singular scalar value",
            ));
        };
        let ldap_value = self.transform.to_ldap(scalar, self.attr_type.name())?;
        Ok(vec![LdapAttribute::new(&self.ldap_attribute, ldap_value)])
    }

    fn to_scim_attribute(&self, entry: &LdapEntry) -> MappingResult<Option<ScimAttribute>> {
        let Some(raw) = entry.first_value(&self.ldap_attribute) else {
            return Ok(None);
        };
        let scalar = self.transform.to_scim(raw, self.attr_type.name())?;
        Ok(Some(ScimAttribute::simple(self.attr_type.clone(), scalar)))
    }
}

/// One mapped sub-attribute position of a complex value.
#[derive(Debug)]
struct SubAttributeTransform {
    name: String,
    ldap_attribute: String,
    transform: ValueTransform,
}

/// Mapper for a complex singular attribute.
#[derive(Debug)]
pub struct ComplexMapper {
    attr_type: AttributeType,
    subs: Vec<SubAttributeTransform>,
}

impl ComplexMapper {
    fn find_sub(&self, name: &str) -> Option<&SubAttributeTransform> {
        self.subs.iter().find(|s| s.name.eq_ignore_ascii_case(name))
    }

    fn to_ldap_filter(
        &self,
        sub_attribute: Option<&str>,
        op: FilterOp,
        value: Option<&str>,
    ) -> MappingResult<LdapFilter> {
        let Some(sub_name) = sub_attribute else {
            return Err(MappingError::unsupported_filter(format!(
                "filter on complex attribute '{}' must name a sub-attribute",
                self.attr_type.name()
            )));
        };
        let Some(sub) = self.find_sub(sub_name) else {
            return Err(MappingError::unsupported_filter(format!(
                "sub-attribute '{}.{sub_name}' has no LDAP mapping",
                self.attr_type.name()
            )));
        };
        leaf_filter(
            &sub.ldap_attribute,
            &sub.transform,
            op,
            value,
            self.attr_type.name(),
        )
    }

    fn to_ldap_attributes(&self, value: &ScimAttributeValue) -> MappingResult<Vec<LdapAttribute>> {
        let ScimAttributeValue::Complex(complex) = value else {
            return Err(MappingError::invalid_mapping(
                self.attr_type.name(),
                "expected a complex value",
            ));
        };
        let mut assignments = Vec::new();
        for sub in &self.subs {
            if let Some(scalar) = complex.get(&sub.name) {
                let ldap_value = sub.transform.to_ldap(scalar, self.attr_type.name())?;
                push_assignment(&mut assignments, &sub.ldap_attribute, ldap_value);
            }
        }
        Ok(assignments)
    }

    fn to_scim_attribute(&self, entry: &LdapEntry) -> MappingResult<Option<ScimAttribute>> {
        let mut complex = ComplexValue::new();
        for sub in &self.subs {
            if let Some(raw) = entry.first_value(&sub.ldap_attribute) {
                let scalar = sub.transform.to_scim(raw, self.attr_type.name())?;
                complex.set(sub.name.clone(), scalar);
            }
        }
        if complex.is_empty() {
            return Ok(None);
        }
        Ok(Some(ScimAttribute::complex(self.attr_type.clone(), complex)))
    }
}

/// Selection rule for one plural type partition.
#[derive(Debug)]
enum PartitionRule {
    /// Fixed LDAP attribute with a value transform; read and write.
    Simple {
        ldap_attribute: String,
        transform: ValueTransform,
    },
    /// Regex over directory attribute names; read-only.
    Pattern { regex: Regex },
    /// Per-sub-attribute transforms for a complex instance.
    Complex { subs: Vec<SubAttributeTransform> },
}

/// One typed partition of a plural attribute.
#[derive(Debug)]
struct PluralPartition {
    type_tag: Option<String>,
    rule: PartitionRule,
}

impl PluralPartition {
    fn matches_tag(&self, tag: Option<&str>) -> bool {
        match (&self.type_tag, tag) {
            (Some(mine), Some(theirs)) => mine.eq_ignore_ascii_case(theirs),
            (None, None) => true,
            _ => false,
        }
    }
}

/// Mapper for simple-plural and complex-plural attributes.
#[derive(Debug)]
pub struct PluralMapper {
    attr_type: AttributeType,
    partitions: Vec<PluralPartition>,
}

impl PluralMapper {
    fn to_ldap_filter(
        &self,
        sub_attribute: Option<&str>,
        op: FilterOp,
        value: Option<&str>,
    ) -> MappingResult<LdapFilter> {
        // A qualifier naming a declared partition type restricts translation
        // to that partition; otherwise every partition participates.
        let type_restriction = sub_attribute.filter(|sub| {
            self.partitions
                .iter()
                .any(|p| p.type_tag.as_deref().is_some_and(|t| t.eq_ignore_ascii_case(sub)))
        });
        let complex_sub = if type_restriction.is_some() {
            None
        } else {
            sub_attribute
        };

        let mut fragments = Vec::new();
        for partition in &self.partitions {
            if let Some(required_tag) = type_restriction {
                if !partition.matches_tag(Some(required_tag)) {
                    continue;
                }
            }
            match &partition.rule {
                PartitionRule::Simple {
                    ldap_attribute,
                    transform,
                } => {
                    // A simple instance has only its scalar; "value" refers to it.
                    if complex_sub.is_some_and(|s| !s.eq_ignore_ascii_case("value")) {
                        continue;
                    }
                    fragments.push(leaf_filter(
                        ldap_attribute,
                        transform,
                        op,
                        value,
                        self.attr_type.name(),
                    )?);
                }
                PartitionRule::Complex { subs } => {
                    let targets: Vec<&SubAttributeTransform> = match complex_sub {
                        Some(sub_name) => subs
                            .iter()
                            .filter(|s| s.name.eq_ignore_ascii_case(sub_name))
                            .collect(),
                        None => subs.iter().collect(),
                    };
                    for sub in targets {
                        fragments.push(leaf_filter(
                            &sub.ldap_attribute,
                            &sub.transform,
                            op,
                            value,
                            self.attr_type.name(),
                        )?);
                    }
                }
                // No concrete attribute to compare against.
                PartitionRule::Pattern { .. } => {}
            }
        }

        if fragments.is_empty() {
            return Err(MappingError::unsupported_filter(format!(
                "no LDAP mapping matches filter on attribute '{}'",
                self.attr_type.name()
            )));
        }
        if fragments.len() == 1 {
            return Ok(fragments.remove(0));
        }
        Ok(LdapFilter::or(fragments))
    }

    fn to_ldap_attributes(&self, value: &ScimAttributeValue) -> MappingResult<Vec<LdapAttribute>> {
        let ScimAttributeValue::Plural(instances) = value else {
            return Err(MappingError::invalid_mapping(
                self.attr_type.name(),
                "expected a multi-valued attribute",
            ));
        };

        let mut assignments = Vec::new();
        for instance in instances {
            let Some(partition) = self
                .partitions
                .iter()
                .find(|p| p.matches_tag(instance.type_tag.as_deref()))
            else {
                debug!(
                    attribute = %self.attr_type,
                    type_tag = instance.type_tag.as_deref().unwrap_or("<none>"),
                    "skipping plural instance with no declared partition"
                );
                continue;
            };

            match (&partition.rule, &instance.value) {
                (
                    PartitionRule::Simple {
                        ldap_attribute,
                        transform,
                    },
                    PluralValue::Simple(scalar),
                ) => {
                    let ldap_value = transform.to_ldap(scalar, self.attr_type.name())?;
                    push_assignment(&mut assignments, ldap_attribute, ldap_value);
                }
                (PartitionRule::Complex { subs }, PluralValue::Complex(complex)) => {
                    for sub in subs {
                        if let Some(scalar) = complex.get(&sub.name) {
                            let ldap_value = sub.transform.to_ldap(scalar, self.attr_type.name())?;
                            push_assignment(&mut assignments, &sub.ldap_attribute, ldap_value);
                        }
                    }
                }
                (PartitionRule::Pattern { .. }, _) => {
                    debug!(
                        attribute = %self.attr_type,
                        "skipping plural instance dispatched to a pattern partition on write"
                    );
                }
                _ => {
                    return Err(MappingError::invalid_mapping(
                        self.attr_type.name(),
                        "instance payload does not match the partition's declared shape",
                    ));
                }
            }
        }
        Ok(assignments)
    }

    fn to_scim_attribute(&self, entry: &LdapEntry) -> MappingResult<Option<ScimAttribute>> {
        let mut instances = Vec::new();
        // First-declared partition claims an LDAP attribute; later partitions
        // never see it.
        let mut claimed: BTreeSet<String> = BTreeSet::new();

        for partition in &self.partitions {
            match &partition.rule {
                PartitionRule::Simple {
                    ldap_attribute,
                    transform,
                } => {
                    let key = ldap_attribute.to_ascii_lowercase();
                    if claimed.contains(&key) {
                        continue;
                    }
                    if let Some(values) = entry.values(ldap_attribute) {
                        claimed.insert(key);
                        for raw in values {
                            let scalar = transform.to_scim(raw, self.attr_type.name())?;
                            instances.push(PluralInstance {
                                type_tag: partition.type_tag.clone(),
                                value: PluralValue::Simple(scalar),
                            });
                        }
                    }
                }
                PartitionRule::Pattern { regex } => {
                    let names: Vec<String> = entry
                        .attribute_names()
                        .filter(|n| regex.is_match(n))
                        .map(str::to_string)
                        .collect();
                    for name in names {
                        let key = name.to_ascii_lowercase();
                        if claimed.contains(&key) {
                            continue;
                        }
                        if let Some(values) = entry.values(&name) {
                            claimed.insert(key);
                            for raw in values {
                                instances.push(PluralInstance {
                                    type_tag: partition.type_tag.clone(),
                                    value: PluralValue::Simple(raw.clone().into()),
                                });
                            }
                        }
                    }
                }
                PartitionRule::Complex { subs } => {
                    let mut complex = ComplexValue::new();
                    let mut used = Vec::new();
                    for sub in subs {
                        let key = sub.ldap_attribute.to_ascii_lowercase();
                        if claimed.contains(&key) {
                            continue;
                        }
                        if let Some(raw) = entry.first_value(&sub.ldap_attribute) {
                            let scalar = sub.transform.to_scim(raw, self.attr_type.name())?;
                            complex.set(sub.name.clone(), scalar);
                            used.push(key);
                        }
                    }
                    if !complex.is_empty() {
                        claimed.extend(used);
                        instances.push(PluralInstance {
                            type_tag: partition.type_tag.clone(),
                            value: PluralValue::Complex(complex),
                        });
                    }
                }
            }
        }

        if instances.is_empty() {
            return Ok(None);
        }
        Ok(Some(ScimAttribute::plural(self.attr_type.clone(), instances)))
    }
}
