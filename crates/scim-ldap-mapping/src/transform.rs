//! Scalar value transformations
//!
//! Pure conversions between SCIM scalar values and LDAP string values, with
//! an optional regex substitution applied on the LDAP side.

use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{MappingError, MappingResult};
use crate::scim::ScimValue;

/// LDAP generalized time format (RFC 4517), without fractional seconds.
const GENERALIZED_TIME_FORMAT: &str = "%Y%m%d%H%M%SZ";

/// The typed conversion applied by a value transformation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransformKind {
    /// Identity transform: SCIM strings map to LDAP strings unchanged.
    #[default]
    String,
    /// SCIM booleans map to the LDAP strings `TRUE` / `FALSE`.
    Boolean,
    /// SCIM date-times map to LDAP generalized time (`YYYYMMDDHHMMSSZ`).
    GeneralizedTime,
}

/// Declarative regex substitution rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubstitutionRule {
    /// Regular expression applied to the LDAP-side string.
    pub pattern: String,
    /// Replacement text; capture groups are available as `$1`, `$2`, ...
    pub replacement: String,
}

#[derive(Debug, Clone)]
struct CompiledSubstitution {
    regex: Regex,
    replacement: String,
}

/// A value transformation for one scalar position of a mapped attribute.
///
/// Converts between SCIM scalars and LDAP strings in both directions. The
/// optional substitution is applied to the LDAP-side string: after the typed
/// conversion when writing, before it when reading. A substitution whose
/// pattern does not match passes the value through unchanged.
#[derive(Debug, Clone)]
pub struct ValueTransform {
    kind: TransformKind,
    substitution: Option<CompiledSubstitution>,
}

impl ValueTransform {
    /// Create a transform with no substitution.
    pub fn new(kind: TransformKind) -> Self {
        Self {
            kind,
            substitution: None,
        }
    }

    /// Create a transform with a substitution rule.
    ///
    /// Fails with a configuration error if the pattern does not compile.
    pub fn with_substitution(kind: TransformKind, rule: &SubstitutionRule) -> MappingResult<Self> {
        let regex = Regex::new(&rule.pattern).map_err(|e| {
            MappingError::configuration(format!("invalid substitution pattern '{}': {e}", rule.pattern))
        })?;
        Ok(Self {
            kind,
            substitution: Some(CompiledSubstitution {
                regex,
                replacement: rule.replacement.clone(),
            }),
        })
    }

    /// Get the typed conversion kind.
    pub fn kind(&self) -> TransformKind {
        self.kind
    }

    /// Whether the LDAP representation admits substring matching.
    ///
    /// Boolean and generalized-time encodings do not: a substring of `TRUE`
    /// or of a timestamp has no meaning in the SCIM value space.
    pub fn allows_substring(&self) -> bool {
        self.kind == TransformKind::String
    }

    /// Convert a SCIM scalar to its LDAP string representation.
    ///
    /// `attribute` names the SCIM attribute for error reporting.
    pub fn to_ldap(&self, value: &ScimValue, attribute: &str) -> MappingResult<String> {
        let converted = match self.kind {
            TransformKind::String => match value {
                ScimValue::String(s) => s.clone(),
                ScimValue::Boolean(b) => b.to_string(),
                ScimValue::DateTime(dt) => dt.to_rfc3339(),
                ScimValue::Integer(i) => i.to_string(),
                ScimValue::Float(f) => f.to_string(),
            },
            TransformKind::Boolean => {
                let b = match value {
                    ScimValue::Boolean(b) => *b,
                    ScimValue::String(s) => parse_scim_boolean(s).ok_or_else(|| {
                        MappingError::invalid_mapping(
                            attribute,
                            format!("value '{s}' is not a boolean"),
                        )
                    })?,
                    other => {
                        return Err(MappingError::invalid_mapping(
                            attribute,
                            format!("expected a boolean value, got {other:?}"),
                        ))
                    }
                };
                if b { "TRUE" } else { "FALSE" }.to_string()
            }
            TransformKind::GeneralizedTime => {
                let dt = match value {
                    ScimValue::DateTime(dt) => *dt,
                    ScimValue::String(s) => parse_scim_datetime(s).ok_or_else(|| {
                        MappingError::invalid_mapping(
                            attribute,
                            format!("value '{s}' is not a date-time"),
                        )
                    })?,
                    other => {
                        return Err(MappingError::invalid_mapping(
                            attribute,
                            format!("expected a date-time value, got {other:?}"),
                        ))
                    }
                };
                dt.format(GENERALIZED_TIME_FORMAT).to_string()
            }
        };

        Ok(self.substitute(&converted))
    }

    /// Convert a SCIM filter value string to its LDAP string representation.
    ///
    /// Filter values arrive untyped from the filter parser; a value that does
    /// not fit the declared type cannot be matched against the directory.
    pub fn filter_value_to_ldap(&self, raw: &str, attribute: &str) -> MappingResult<String> {
        let converted = match self.kind {
            TransformKind::String => raw.to_string(),
            TransformKind::Boolean => {
                let b = parse_scim_boolean(raw).ok_or_else(|| {
                    MappingError::unsupported_filter(format!(
                        "filter value '{raw}' for boolean attribute '{attribute}' is not a boolean"
                    ))
                })?;
                if b { "TRUE" } else { "FALSE" }.to_string()
            }
            TransformKind::GeneralizedTime => {
                let dt = parse_scim_datetime(raw).ok_or_else(|| {
                    MappingError::unsupported_filter(format!(
                        "filter value '{raw}' for date-time attribute '{attribute}' is not a date-time"
                    ))
                })?;
                dt.format(GENERALIZED_TIME_FORMAT).to_string()
            }
        };

        Ok(self.substitute(&converted))
    }

    /// Convert an LDAP string back to a SCIM scalar.
    ///
    /// Fails with a format error if the stored value does not parse as the
    /// declared type.
    pub fn to_scim(&self, raw: &str, attribute: &str) -> MappingResult<ScimValue> {
        let raw = self.substitute(raw);
        match self.kind {
            TransformKind::String => Ok(ScimValue::String(raw)),
            TransformKind::Boolean => parse_scim_boolean(&raw)
                .map(ScimValue::Boolean)
                .ok_or_else(|| MappingError::format(attribute, raw, "not a boolean")),
            TransformKind::GeneralizedTime => {
                match NaiveDateTime::parse_from_str(&raw, GENERALIZED_TIME_FORMAT) {
                    Ok(naive) => Ok(ScimValue::DateTime(naive.and_utc())),
                    Err(e) => Err(MappingError::format(
                        attribute,
                        raw,
                        format!("not a generalized time: {e}"),
                    )),
                }
            }
        }
    }

    fn substitute(&self, value: &str) -> String {
        match &self.substitution {
            Some(sub) => sub.regex.replace(value, sub.replacement.as_str()).into_owned(),
            None => value.to_string(),
        }
    }
}

impl Default for ValueTransform {
    fn default() -> Self {
        Self::new(TransformKind::String)
    }
}

fn parse_scim_boolean(s: &str) -> Option<bool> {
    if s.eq_ignore_ascii_case("true") {
        Some(true)
    } else if s.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

fn parse_scim_datetime(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_identity_round_trip() {
        let t = ValueTransform::default();
        let ldap = t.to_ldap(&ScimValue::String("Ann".to_string()), "givenName").unwrap();
        assert_eq!(ldap, "Ann");
        assert_eq!(
            t.to_scim(&ldap, "givenName").unwrap(),
            ScimValue::String("Ann".to_string())
        );
    }

    #[test]
    fn test_boolean_transform() {
        let t = ValueTransform::new(TransformKind::Boolean);
        assert_eq!(t.to_ldap(&ScimValue::Boolean(true), "active").unwrap(), "TRUE");
        assert_eq!(t.to_ldap(&ScimValue::Boolean(false), "active").unwrap(), "FALSE");
        assert_eq!(t.to_scim("TRUE", "active").unwrap(), ScimValue::Boolean(true));
        assert_eq!(t.to_scim("false", "active").unwrap(), ScimValue::Boolean(false));

        let err = t.to_scim("maybe", "active").unwrap_err();
        assert_eq!(err.error_code(), "FORMAT");
    }

    #[test]
    fn test_generalized_time_round_trip() {
        let t = ValueTransform::new(TransformKind::GeneralizedTime);
        let dt = Utc.with_ymd_and_hms(2024, 3, 15, 8, 30, 0).unwrap();

        let ldap = t.to_ldap(&ScimValue::DateTime(dt), "createTimestamp").unwrap();
        assert_eq!(ldap, "20240315083000Z");

        assert_eq!(
            t.to_scim(&ldap, "createTimestamp").unwrap(),
            ScimValue::DateTime(dt)
        );
    }

    #[test]
    fn test_generalized_time_bad_stored_value() {
        let t = ValueTransform::new(TransformKind::GeneralizedTime);
        let err = t.to_scim("not-a-time", "createTimestamp").unwrap_err();
        assert_eq!(err.error_code(), "FORMAT");
    }

    #[test]
    fn test_filter_value_conversion() {
        let t = ValueTransform::new(TransformKind::Boolean);
        assert_eq!(t.filter_value_to_ldap("true", "active").unwrap(), "TRUE");

        let err = t.filter_value_to_ldap("yes", "active").unwrap_err();
        assert_eq!(err.error_code(), "UNSUPPORTED_FILTER");

        let t = ValueTransform::new(TransformKind::GeneralizedTime);
        assert_eq!(
            t.filter_value_to_ldap("2024-03-15T08:30:00Z", "whenCreated").unwrap(),
            "20240315083000Z"
        );
    }

    #[test]
    fn test_substitution_applies_and_reverses() {
        let rule = SubstitutionRule {
            pattern: r"^\+1-(\d{3})-(\d{4})$".to_string(),
            replacement: "$1$2".to_string(),
        };
        let t = ValueTransform::with_substitution(TransformKind::String, &rule).unwrap();
        assert_eq!(
            t.to_ldap(&ScimValue::String("+1-555-0100".to_string()), "phone").unwrap(),
            "5550100"
        );
    }

    #[test]
    fn test_substitution_non_matching_passes_through() {
        let rule = SubstitutionRule {
            pattern: r"^\d+$".to_string(),
            replacement: "N".to_string(),
        };
        let t = ValueTransform::with_substitution(TransformKind::String, &rule).unwrap();
        assert_eq!(
            t.to_ldap(&ScimValue::String("abc".to_string()), "x").unwrap(),
            "abc"
        );
    }

    #[test]
    fn test_bad_substitution_pattern_is_configuration_error() {
        let rule = SubstitutionRule {
            pattern: "(".to_string(),
            replacement: String::new(),
        };
        let err = ValueTransform::with_substitution(TransformKind::String, &rule).unwrap_err();
        assert_eq!(err.error_code(), "CONFIGURATION");
    }

    #[test]
    fn test_substring_capability() {
        assert!(ValueTransform::new(TransformKind::String).allows_substring());
        assert!(!ValueTransform::new(TransformKind::Boolean).allows_substring());
        assert!(!ValueTransform::new(TransformKind::GeneralizedTime).allows_substring());
    }
}
