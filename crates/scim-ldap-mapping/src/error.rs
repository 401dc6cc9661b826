//! Mapping engine error types
//!
//! Error definitions with client/server classification so callers can decide
//! how to surface a failure.

use thiserror::Error;

/// Error that can occur while mapping between SCIM and LDAP representations.
#[derive(Debug, Error)]
pub enum MappingError {
    // Configuration errors (fatal at schema-load time)
    /// A declarative mapping definition is invalid.
    #[error("invalid mapping configuration: {message}")]
    Configuration { message: String },

    // Client errors (bad request against the loaded schema)
    /// The referenced SCIM attribute is not declared in the resource schema.
    #[error("no such attribute: {attribute}")]
    NoSuchAttribute { attribute: String },

    /// The attribute is declared but carries no LDAP mapping.
    #[error("attribute '{attribute}' is not mapped to any LDAP attribute")]
    NotMapped { attribute: String },

    /// The requested filter cannot be expressed as an LDAP filter.
    #[error("unsupported filter: {message}")]
    UnsupportedFilter { message: String },

    /// The requested sort attribute cannot be used as a sort key.
    #[error("attribute '{attribute}' cannot be used in sort parameters")]
    UnsupportedSort { attribute: String },

    // Server-side data errors
    /// A stored directory value does not parse as the declared scalar type.
    #[error("value '{value}' of LDAP attribute '{attribute}' does not match the declared type: {message}")]
    Format {
        attribute: String,
        value: String,
        message: String,
    },

    /// A mapped or derived value violates the attribute's declared shape.
    #[error("invalid mapping for attribute '{attribute}': {message}")]
    InvalidMapping { attribute: String, message: String },

    /// A directory search performed by a derived attribute failed.
    #[error("directory search failed: {message}")]
    Search {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl MappingError {
    /// Check if this error should be surfaced as a client error.
    ///
    /// Client errors describe a request that cannot be honored against the
    /// loaded schema; server errors describe bad stored data or a failing
    /// directory collaborator.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            MappingError::NoSuchAttribute { .. }
                | MappingError::NotMapped { .. }
                | MappingError::UnsupportedFilter { .. }
                | MappingError::UnsupportedSort { .. }
        )
    }

    /// Get an error code for classification.
    pub fn error_code(&self) -> &'static str {
        match self {
            MappingError::Configuration { .. } => "CONFIGURATION",
            MappingError::NoSuchAttribute { .. } => "NO_SUCH_ATTRIBUTE",
            MappingError::NotMapped { .. } => "NOT_MAPPED",
            MappingError::UnsupportedFilter { .. } => "UNSUPPORTED_FILTER",
            MappingError::UnsupportedSort { .. } => "UNSUPPORTED_SORT",
            MappingError::Format { .. } => "FORMAT",
            MappingError::InvalidMapping { .. } => "INVALID_MAPPING",
            MappingError::Search { .. } => "SEARCH",
        }
    }

    // Convenience constructors

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        MappingError::Configuration {
            message: message.into(),
        }
    }

    /// Create a no-such-attribute error.
    pub fn no_such_attribute(attribute: impl Into<String>) -> Self {
        MappingError::NoSuchAttribute {
            attribute: attribute.into(),
        }
    }

    /// Create a not-mapped error.
    pub fn not_mapped(attribute: impl Into<String>) -> Self {
        MappingError::NotMapped {
            attribute: attribute.into(),
        }
    }

    /// Create an unsupported-filter error.
    pub fn unsupported_filter(message: impl Into<String>) -> Self {
        MappingError::UnsupportedFilter {
            message: message.into(),
        }
    }

    /// Create an unsupported-sort error.
    pub fn unsupported_sort(attribute: impl Into<String>) -> Self {
        MappingError::UnsupportedSort {
            attribute: attribute.into(),
        }
    }

    /// Create a format error.
    pub fn format(
        attribute: impl Into<String>,
        value: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        MappingError::Format {
            attribute: attribute.into(),
            value: value.into(),
            message: message.into(),
        }
    }

    /// Create an invalid-mapping error.
    pub fn invalid_mapping(attribute: impl Into<String>, message: impl Into<String>) -> Self {
        MappingError::InvalidMapping {
            attribute: attribute.into(),
            message: message.into(),
        }
    }

    /// Create a search error.
    pub fn search(message: impl Into<String>) -> Self {
        MappingError::Search {
            message: message.into(),
            source: None,
        }
    }

    /// Create a search error with an underlying source.
    pub fn search_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        MappingError::Search {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Result type for mapping operations.
pub type MappingResult<T> = Result<T, MappingError>;
