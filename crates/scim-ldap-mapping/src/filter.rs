//! SCIM filter model and parser
//!
//! A predicate tree over SCIM attribute paths, plus a recursive descent
//! parser for the SCIM filter string syntax.

use serde::{Deserialize, Serialize};

use crate::error::{MappingError, MappingResult};

/// A parsed reference to a SCIM attribute within a filter or sort parameter.
///
/// Holds an optional schema URI, the attribute name, and an optional
/// sub-attribute (a complex sub-attribute name or a plural type qualifier).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributePath {
    /// The schema URI, if the path carried one.
    pub schema: Option<String>,
    /// The attribute name.
    pub name: String,
    /// The sub-attribute or plural type qualifier, if any.
    pub sub_attribute: Option<String>,
}

impl AttributePath {
    /// Create a path with just an attribute name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            schema: None,
            name: name.into(),
            sub_attribute: None,
        }
    }

    /// Create a path with a sub-attribute.
    pub fn with_sub(name: impl Into<String>, sub: impl Into<String>) -> Self {
        Self {
            schema: None,
            name: name.into(),
            sub_attribute: Some(sub.into()),
        }
    }

    /// Set the schema URI using the builder pattern.
    pub fn in_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Parse an attribute path string.
    ///
    /// Accepts `name`, `name.sub`, and URN-qualified forms where the schema
    /// URI is separated from the attribute by the final colon, e.g.
    /// `urn:scim:schemas:core:1.0:userName`.
    pub fn parse(s: &str) -> MappingResult<Self> {
        let (schema, local) = match s.rsplit_once(':') {
            Some((schema, local)) if !schema.is_empty() => (Some(schema.to_string()), local),
            _ => (None, s),
        };

        let (name, sub) = match local.split_once('.') {
            Some((name, sub)) => (name, Some(sub.to_string())),
            None => (local, None),
        };

        if name.is_empty() {
            return Err(MappingError::unsupported_filter(format!(
                "empty attribute name in path '{s}'"
            )));
        }

        Ok(Self {
            schema,
            name: name.to_string(),
            sub_attribute: sub,
        })
    }
}

impl std::fmt::Display for AttributePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(schema) = &self.schema {
            write!(f, "{schema}:")?;
        }
        f.write_str(&self.name)?;
        if let Some(sub) = &self.sub_attribute {
            write!(f, ".{sub}")?;
        }
        Ok(())
    }
}

/// SCIM filter comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOp {
    /// Equal
    Eq,
    /// Not equal
    Ne,
    /// Contains
    Co,
    /// Starts with
    Sw,
    /// Ends with
    Ew,
    /// Present (has a value)
    Pr,
    /// Greater than
    Gt,
    /// Greater than or equal
    Ge,
    /// Less than
    Lt,
    /// Less than or equal
    Le,
}

impl FilterOp {
    fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "eq" => Some(FilterOp::Eq),
            "ne" => Some(FilterOp::Ne),
            "co" => Some(FilterOp::Co),
            "sw" => Some(FilterOp::Sw),
            "ew" => Some(FilterOp::Ew),
            "pr" => Some(FilterOp::Pr),
            "gt" => Some(FilterOp::Gt),
            "ge" => Some(FilterOp::Ge),
            "lt" => Some(FilterOp::Lt),
            "le" => Some(FilterOp::Le),
            _ => None,
        }
    }
}

/// A SCIM filter predicate tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScimFilter {
    /// Leaf comparison: attribute path, operator, optional value.
    Compare {
        path: AttributePath,
        op: FilterOp,
        value: Option<String>,
    },
    /// Logical AND over child filters.
    And { filters: Vec<ScimFilter> },
    /// Logical OR over child filters.
    Or { filters: Vec<ScimFilter> },
    /// Negation of a filter.
    Not { filter: Box<ScimFilter> },
}

impl ScimFilter {
    /// Create an equality comparison leaf.
    pub fn eq(path: AttributePath, value: impl Into<String>) -> Self {
        ScimFilter::Compare {
            path,
            op: FilterOp::Eq,
            value: Some(value.into()),
        }
    }

    /// Create a presence leaf.
    pub fn present(path: AttributePath) -> Self {
        ScimFilter::Compare {
            path,
            op: FilterOp::Pr,
            value: None,
        }
    }

    /// Create a comparison leaf with an arbitrary operator.
    pub fn compare(path: AttributePath, op: FilterOp, value: impl Into<String>) -> Self {
        ScimFilter::Compare {
            path,
            op,
            value: Some(value.into()),
        }
    }

    /// Create an AND filter.
    pub fn and(filters: Vec<ScimFilter>) -> Self {
        ScimFilter::And { filters }
    }

    /// Create an OR filter.
    pub fn or(filters: Vec<ScimFilter>) -> Self {
        ScimFilter::Or { filters }
    }

    /// Create a NOT filter.
    pub fn negate(filter: ScimFilter) -> Self {
        ScimFilter::Not {
            filter: Box::new(filter),
        }
    }

    /// Parse a SCIM filter expression string.
    pub fn parse(input: &str) -> MappingResult<Self> {
        FilterParser::new(input).parse()
    }
}

/// Recursive descent parser for SCIM filter expressions.
struct FilterParser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> FilterParser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn parse(&mut self) -> MappingResult<ScimFilter> {
        self.skip_whitespace();
        let expr = self.parse_or()?;
        self.skip_whitespace();
        if self.pos < self.input.len() {
            return Err(MappingError::unsupported_filter(format!(
                "unexpected characters at position {}: '{}'",
                self.pos,
                &self.input[self.pos..]
            )));
        }
        Ok(expr)
    }

    fn parse_or(&mut self) -> MappingResult<ScimFilter> {
        let first = self.parse_and()?;
        let mut children = vec![first];

        loop {
            self.skip_whitespace();
            if self.try_consume_keyword("or") {
                self.skip_whitespace();
                children.push(self.parse_and()?);
            } else {
                break;
            }
        }

        if children.len() == 1 {
            Ok(children.remove(0))
        } else {
            Ok(ScimFilter::Or { filters: children })
        }
    }

    fn parse_and(&mut self) -> MappingResult<ScimFilter> {
        let first = self.parse_unary()?;
        let mut children = vec![first];

        loop {
            self.skip_whitespace();
            if self.try_consume_keyword("and") {
                self.skip_whitespace();
                children.push(self.parse_unary()?);
            } else {
                break;
            }
        }

        if children.len() == 1 {
            Ok(children.remove(0))
        } else {
            Ok(ScimFilter::And { filters: children })
        }
    }

    fn parse_unary(&mut self) -> MappingResult<ScimFilter> {
        self.skip_whitespace();

        if self.try_consume_keyword("not") {
            self.skip_whitespace();
            if !self.try_consume_char('(') {
                return Err(MappingError::unsupported_filter("expected '(' after 'not'"));
            }
            let expr = self.parse_or()?;
            self.skip_whitespace();
            if !self.try_consume_char(')') {
                return Err(MappingError::unsupported_filter(
                    "expected ')' to close 'not' expression",
                ));
            }
            return Ok(ScimFilter::negate(expr));
        }

        self.parse_primary()
    }

    fn parse_primary(&mut self) -> MappingResult<ScimFilter> {
        self.skip_whitespace();

        if self.try_consume_char('(') {
            let expr = self.parse_or()?;
            self.skip_whitespace();
            if !self.try_consume_char(')') {
                return Err(MappingError::unsupported_filter(
                    "expected ')' to close grouped expression",
                ));
            }
            return Ok(expr);
        }

        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> MappingResult<ScimFilter> {
        let path_token = self.parse_attribute_token()?;
        let path = AttributePath::parse(&path_token)?;
        self.skip_whitespace();

        let op_token = self.parse_operator_token()?;
        let op = FilterOp::from_str(&op_token)
            .ok_or_else(|| MappingError::unsupported_filter(format!("unknown operator: {op_token}")))?;

        // 'pr' takes no value
        if op == FilterOp::Pr {
            return Ok(ScimFilter::Compare {
                path,
                op,
                value: None,
            });
        }

        self.skip_whitespace();
        let value = self.parse_value()?;

        Ok(ScimFilter::Compare {
            path,
            op,
            value: Some(value),
        })
    }

    fn parse_attribute_token(&mut self) -> MappingResult<String> {
        let start = self.pos;

        while self.pos < self.input.len() {
            let c = self.current_char();
            if c.is_alphanumeric() || matches!(c, '.' | '_' | ':' | '-') {
                self.pos += c.len_utf8();
            } else {
                break;
            }
        }

        if self.pos == start {
            return Err(MappingError::unsupported_filter("expected attribute name"));
        }

        Ok(self.input[start..self.pos].to_string())
    }

    fn parse_operator_token(&mut self) -> MappingResult<String> {
        let start = self.pos;

        while self.pos < self.input.len() {
            let c = self.current_char();
            if !c.is_alphabetic() {
                break;
            }
            self.pos += c.len_utf8();
        }

        if self.pos == start {
            return Err(MappingError::unsupported_filter("expected operator"));
        }

        Ok(self.input[start..self.pos].to_lowercase())
    }

    fn parse_value(&mut self) -> MappingResult<String> {
        self.skip_whitespace();

        if self.try_consume_char('"') {
            let mut value = String::new();
            while self.pos < self.input.len() && self.current_char() != '"' {
                let c = self.current_char();
                if c == '\\' && self.pos + 1 < self.input.len() {
                    self.pos += 1;
                    let escaped = self.current_char();
                    value.push(escaped);
                    self.pos += escaped.len_utf8();
                } else {
                    value.push(c);
                    self.pos += c.len_utf8();
                }
            }
            if !self.try_consume_char('"') {
                return Err(MappingError::unsupported_filter("unterminated string"));
            }
            Ok(value)
        } else {
            // Unquoted value (boolean, number)
            let start = self.pos;
            while self.pos < self.input.len() {
                let c = self.current_char();
                if c.is_alphanumeric() || matches!(c, '.' | '-' | '+') {
                    self.pos += c.len_utf8();
                } else {
                    break;
                }
            }
            if self.pos == start {
                return Err(MappingError::unsupported_filter("expected value"));
            }
            Ok(self.input[start..self.pos].to_string())
        }
    }

    fn skip_whitespace(&mut self) {
        while self.pos < self.input.len() {
            let c = self.current_char();
            if !c.is_whitespace() {
                break;
            }
            self.pos += c.len_utf8();
        }
    }

    fn current_char(&self) -> char {
        self.input[self.pos..].chars().next().unwrap_or('\0')
    }

    fn try_consume_char(&mut self, c: char) -> bool {
        if self.pos < self.input.len() && self.current_char() == c {
            self.pos += c.len_utf8();
            true
        } else {
            false
        }
    }

    fn try_consume_keyword(&mut self, keyword: &str) -> bool {
        // Keywords are ASCII, so a byte-length prefix comparison is safe.
        let remaining = &self.input[self.pos..];
        if remaining.len() >= keyword.len()
            && remaining.is_char_boundary(keyword.len())
            && remaining[..keyword.len()].eq_ignore_ascii_case(keyword)
        {
            let after = self.pos + keyword.len();
            if after >= self.input.len()
                || !self.input[after..]
                    .chars()
                    .next()
                    .is_some_and(char::is_alphanumeric)
            {
                self.pos = after;
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_eq() {
        let filter = ScimFilter::parse(r#"userName eq "ann@example.com""#).unwrap();
        assert_eq!(
            filter,
            ScimFilter::eq(AttributePath::new("userName"), "ann@example.com")
        );
    }

    #[test]
    fn test_parse_sub_attribute_path() {
        let filter = ScimFilter::parse(r#"name.givenName co "Ann""#).unwrap();
        assert_eq!(
            filter,
            ScimFilter::compare(AttributePath::with_sub("name", "givenName"), FilterOp::Co, "Ann")
        );
    }

    #[test]
    fn test_parse_urn_qualified_path() {
        let filter =
            ScimFilter::parse(r#"urn:scim:schemas:core:1.0:userName eq "ann""#).unwrap();
        if let ScimFilter::Compare { path, .. } = &filter {
            assert_eq!(path.schema.as_deref(), Some("urn:scim:schemas:core:1.0"));
            assert_eq!(path.name, "userName");
        } else {
            panic!("expected comparison");
        }
    }

    #[test]
    fn test_parse_non_ascii_value() {
        let filter = ScimFilter::parse(r#"displayName eq "Änne""#).unwrap();
        assert_eq!(
            filter,
            ScimFilter::eq(AttributePath::new("displayName"), "Änne")
        );
    }

    #[test]
    fn test_parse_non_ascii_attribute_and_escaped_value() {
        let filter = ScimFilter::parse(r#"straße sw "Ö\"strich""#).unwrap();
        assert_eq!(
            filter,
            ScimFilter::compare(AttributePath::new("straße"), FilterOp::Sw, "Ö\"strich")
        );
    }

    #[test]
    fn test_parse_present() {
        let filter = ScimFilter::parse("title pr").unwrap();
        assert_eq!(filter, ScimFilter::present(AttributePath::new("title")));
    }

    #[test]
    fn test_parse_and_or_collects_children() {
        let filter = ScimFilter::parse(
            r#"userName eq "a" and (title eq "b" or title eq "c") and active eq true"#,
        )
        .unwrap();

        if let ScimFilter::And { filters } = &filter {
            assert_eq!(filters.len(), 3);
            assert!(matches!(&filters[1], ScimFilter::Or { filters } if filters.len() == 2));
        } else {
            panic!("expected AND");
        }
    }

    #[test]
    fn test_parse_not() {
        let filter = ScimFilter::parse(r#"not (active eq false)"#).unwrap();
        assert!(matches!(filter, ScimFilter::Not { .. }));
    }

    #[test]
    fn test_parse_escaped_quote_in_value() {
        let filter = ScimFilter::parse(r#"displayName eq "Ann \"The Boss\" Lee""#).unwrap();
        if let ScimFilter::Compare { value, .. } = &filter {
            assert_eq!(value.as_deref(), Some(r#"Ann "The Boss" Lee"#));
        } else {
            panic!("expected comparison");
        }
    }

    #[test]
    fn test_parse_unquoted_boolean() {
        let filter = ScimFilter::parse("active eq true").unwrap();
        if let ScimFilter::Compare { value, .. } = &filter {
            assert_eq!(value.as_deref(), Some("true"));
        } else {
            panic!("expected comparison");
        }
    }

    #[test]
    fn test_parse_errors() {
        assert!(ScimFilter::parse("userName zz \"x\"").is_err());
        assert!(ScimFilter::parse("userName eq \"unterminated").is_err());
        assert!(ScimFilter::parse("userName eq \"a\" trailing").is_err());
        assert!(ScimFilter::parse("not active eq true").is_err());
    }

    #[test]
    fn test_attribute_path_display_round_trip() {
        let path = AttributePath::with_sub("emails", "work").in_schema("urn:scim:schemas:core:1.0");
        let parsed = AttributePath::parse(&path.to_string()).unwrap();
        assert_eq!(parsed, path);
    }
}
