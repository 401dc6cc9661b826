//! LDAP-side data model
//!
//! Directory entries, attribute assignments, filters with RFC 4515 rendering,
//! and the directory-search capability consumed by derived attributes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::MappingResult;

/// A directory attribute assignment: name plus ordered values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LdapAttribute {
    /// The attribute name.
    pub name: String,
    /// The attribute values, in order.
    pub values: Vec<String>,
}

impl LdapAttribute {
    /// Create an attribute with a single value.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: vec![value.into()],
        }
    }

    /// Create an attribute with multiple values.
    pub fn with_values(name: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }
}

/// An LDAP entry: a distinguished name plus a multi-valued attribute bag.
///
/// Attribute lookup is case-insensitive, as in the directory itself. Value
/// order within an attribute is preserved.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LdapEntry {
    dn: String,
    attributes: Vec<LdapAttribute>,
}

impl LdapEntry {
    /// Create an entry with the given DN.
    pub fn new(dn: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            attributes: Vec::new(),
        }
    }

    /// Get the distinguished name.
    pub fn dn(&self) -> &str {
        &self.dn
    }

    /// Add a value to an attribute, creating the attribute if needed.
    pub fn add_value(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        if let Some(attr) = self
            .attributes
            .iter_mut()
            .find(|a| a.name.eq_ignore_ascii_case(&name))
        {
            attr.values.push(value.into());
        } else {
            self.attributes.push(LdapAttribute::new(name, value));
        }
    }

    /// Add a value using the builder pattern.
    pub fn with_value(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.add_value(name, value);
        self
    }

    /// Get all values of an attribute.
    pub fn values(&self, name: &str) -> Option<&[String]> {
        self.attributes
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
            .map(|a| a.values.as_slice())
    }

    /// Get the first value of an attribute.
    pub fn first_value(&self, name: &str) -> Option<&str> {
        self.values(name).and_then(|v| v.first()).map(String::as_str)
    }

    /// Check if an attribute is present with at least one value.
    pub fn has_attribute(&self, name: &str) -> bool {
        self.values(name).is_some_and(|v| !v.is_empty())
    }

    /// Get all attribute names, in first-seen order.
    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.attributes.iter().map(|a| a.name.as_str())
    }
}

/// An LDAP search filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LdapFilter {
    /// Match entries where attribute equals value.
    Equals { attribute: String, value: String },

    /// Match entries where attribute contains value (substring).
    Contains { attribute: String, value: String },

    /// Match entries where attribute starts with value.
    StartsWith { attribute: String, value: String },

    /// Match entries where attribute ends with value.
    EndsWith { attribute: String, value: String },

    /// Match entries where attribute is greater than or equal to value.
    GreaterOrEqual { attribute: String, value: String },

    /// Match entries where attribute is less than or equal to value.
    LessOrEqual { attribute: String, value: String },

    /// Match entries where attribute exists (has any value).
    Present { attribute: String },

    /// Logical AND of multiple filters.
    And { filters: Vec<LdapFilter> },

    /// Logical OR of multiple filters.
    Or { filters: Vec<LdapFilter> },

    /// Logical NOT of a filter.
    Not { filter: Box<LdapFilter> },
}

impl LdapFilter {
    /// Create an equals filter.
    pub fn eq(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        LdapFilter::Equals {
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    /// Create a contains filter.
    pub fn contains(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        LdapFilter::Contains {
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    /// Create a starts-with filter.
    pub fn starts_with(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        LdapFilter::StartsWith {
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    /// Create an ends-with filter.
    pub fn ends_with(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        LdapFilter::EndsWith {
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    /// Create a greater-or-equal filter.
    pub fn ge(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        LdapFilter::GreaterOrEqual {
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    /// Create a less-or-equal filter.
    pub fn le(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        LdapFilter::LessOrEqual {
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    /// Create a present (attribute exists) filter.
    pub fn present(attribute: impl Into<String>) -> Self {
        LdapFilter::Present {
            attribute: attribute.into(),
        }
    }

    /// Create an AND filter.
    pub fn and(filters: Vec<LdapFilter>) -> Self {
        LdapFilter::And { filters }
    }

    /// Create an OR filter.
    pub fn or(filters: Vec<LdapFilter>) -> Self {
        LdapFilter::Or { filters }
    }

    /// Create a NOT filter (negation).
    pub fn negate(filter: LdapFilter) -> Self {
        LdapFilter::Not {
            filter: Box::new(filter),
        }
    }

    /// Render the filter as an RFC 4515 filter string.
    pub fn render(&self) -> String {
        match self {
            LdapFilter::And { filters } => {
                let inner: Vec<String> = filters.iter().map(LdapFilter::render).collect();
                format!("(&{})", inner.join(""))
            }
            LdapFilter::Or { filters } => {
                let inner: Vec<String> = filters.iter().map(LdapFilter::render).collect();
                format!("(|{})", inner.join(""))
            }
            LdapFilter::Not { filter } => {
                format!("(!{})", filter.render())
            }
            LdapFilter::Equals { attribute, value } => {
                format!("({}={})", attribute, escape_filter_value(value))
            }
            LdapFilter::Contains { attribute, value } => {
                format!("({}=*{}*)", attribute, escape_filter_value(value))
            }
            LdapFilter::StartsWith { attribute, value } => {
                format!("({}={}*)", attribute, escape_filter_value(value))
            }
            LdapFilter::EndsWith { attribute, value } => {
                format!("({}=*{})", attribute, escape_filter_value(value))
            }
            LdapFilter::GreaterOrEqual { attribute, value } => {
                format!("({}>={})", attribute, escape_filter_value(value))
            }
            LdapFilter::LessOrEqual { attribute, value } => {
                format!("({}<={})", attribute, escape_filter_value(value))
            }
            LdapFilter::Present { attribute } => {
                format!("({}=*)", attribute)
            }
        }
    }
}

impl std::fmt::Display for LdapFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.render())
    }
}

/// Escape special characters in LDAP filter values (RFC 4515).
pub fn escape_filter_value(value: &str) -> String {
    value
        .replace('\\', "\\5c")
        .replace('*', "\\2a")
        .replace('(', "\\28")
        .replace(')', "\\29")
        .replace('\0', "\\00")
}

/// Scope of an LDAP search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchScope {
    /// The base entry only.
    Base,
    /// Immediate children of the base entry.
    OneLevel,
    /// The base entry and all entries below it.
    #[default]
    Subtree,
}

/// Capability for searching the directory.
///
/// Supplied by an external collaborator; derived attributes use it to perform
/// auxiliary lookups. Implementations must be safe for concurrent use if
/// derived attributes are computed concurrently.
#[async_trait]
pub trait LdapSearch: Send + Sync {
    /// Search the directory.
    ///
    /// # Arguments
    /// * `base_dn` - The search base DN
    /// * `scope` - The search scope
    /// * `filter` - The search filter
    /// * `attributes` - The attributes to return for each entry
    async fn search(
        &self,
        base_dn: &str,
        scope: SearchScope,
        filter: &LdapFilter,
        attributes: &[&str],
    ) -> MappingResult<Vec<LdapEntry>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_case_insensitive_lookup() {
        let entry = LdapEntry::new("uid=ann,ou=people,dc=example,dc=com")
            .with_value("mail", "ann@example.com")
            .with_value("MAIL", "ann@corp.example.com");

        assert_eq!(
            entry.values("Mail").unwrap(),
            &["ann@example.com", "ann@corp.example.com"]
        );
        assert_eq!(entry.first_value("mail"), Some("ann@example.com"));
        assert!(entry.has_attribute("MAIL"));
        assert!(!entry.has_attribute("telephoneNumber"));
    }

    #[test]
    fn test_filter_rendering() {
        let filter = LdapFilter::and(vec![
            LdapFilter::eq("objectClass", "inetOrgPerson"),
            LdapFilter::or(vec![
                LdapFilter::eq("departmentNumber", "42"),
                LdapFilter::contains("mail", "example.com"),
            ]),
            LdapFilter::negate(LdapFilter::eq("employeeType", "contractor")),
        ]);

        assert_eq!(
            filter.render(),
            "(&(objectClass=inetOrgPerson)(|(departmentNumber=42)(mail=*example.com*))(!(employeeType=contractor)))"
        );
    }

    #[test]
    fn test_filter_value_escaping() {
        let filter = LdapFilter::eq("cn", "Smith (admin) *");
        assert_eq!(filter.render(), "(cn=Smith \\28admin\\29 \\2a)");

        assert_eq!(escape_filter_value("a\\b"), "a\\5cb");
    }

    #[test]
    fn test_present_and_range_filters() {
        assert_eq!(LdapFilter::present("mail").render(), "(mail=*)");
        assert_eq!(LdapFilter::ge("uidNumber", "1000").render(), "(uidNumber>=1000)");
        assert_eq!(LdapFilter::le("uidNumber", "2000").render(), "(uidNumber<=2000)");
    }
}
