//! URI Template Matching
//!
//! RFC-6570-style `{name}` placeholder matching for resource templates. The
//! algorithm is deliberately simple and deterministic:
//!
//! - the template splits into alternating literal and variable segments
//! - the leading literal anchors the match (must be a prefix of the uri)
//! - each variable captures up to the next literal; empty captures reject
//! - a trailing variable consumes the non-empty remainder
//!
//! Multiple templates are tried in registration order by the server; the
//! first match wins, and an exact-uri resource always takes precedence.

// Layer 1: Standard library imports
use std::collections::HashMap;

/// One parsed segment of a uri template
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Variable(String),
}

/// A parsed `{name}`-style uri template
///
/// # Examples
///
/// ```rust
/// use lattice_mcp::providers::UriTemplate;
///
/// let template = UriTemplate::parse("file:///{path}").unwrap();
/// let bindings = template.match_uri("file:///etc/hosts").unwrap();
/// assert_eq!(bindings["path"], "etc/hosts");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UriTemplate {
    raw: String,
    segments: Vec<Segment>,
}

impl UriTemplate {
    /// Parse a template string
    ///
    /// # Errors
    ///
    /// Returns a description of the malformed placeholder: unterminated
    /// `{`, empty `{}`, or a stray `}`.
    pub fn parse(template: &str) -> Result<Self, String> {
        let mut segments = Vec::new();
        let mut rest = template;

        while !rest.is_empty() {
            match rest.find('{') {
                Some(open) => {
                    if open > 0 {
                        let literal = &rest[..open];
                        if literal.contains('}') {
                            return Err("stray '}' outside a placeholder".to_string());
                        }
                        segments.push(Segment::Literal(literal.to_string()));
                    }
                    let after_open = &rest[open + 1..];
                    let close = after_open
                        .find('}')
                        .ok_or_else(|| "unterminated '{' placeholder".to_string())?;
                    let name = &after_open[..close];
                    if name.is_empty() {
                        return Err("empty placeholder name".to_string());
                    }
                    segments.push(Segment::Variable(name.to_string()));
                    rest = &after_open[close + 1..];
                }
                None => {
                    if rest.contains('}') {
                        return Err("stray '}' outside a placeholder".to_string());
                    }
                    segments.push(Segment::Literal(rest.to_string()));
                    rest = "";
                }
            }
        }

        Ok(Self {
            raw: template.to_string(),
            segments,
        })
    }

    /// The original template string
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Variable names in template order
    pub fn variables(&self) -> Vec<&str> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Variable(name) => Some(name.as_str()),
                Segment::Literal(_) => None,
            })
            .collect()
    }

    /// Match a uri, binding each variable to its captured text.
    ///
    /// Returns `None` on any mismatch: anchor failure, missing separator,
    /// empty capture, or leftover input.
    pub fn match_uri(&self, uri: &str) -> Option<HashMap<String, String>> {
        let mut bindings = HashMap::new();
        let mut pos = 0usize;
        let mut segments = self.segments.iter().peekable();

        while let Some(segment) = segments.next() {
            match segment {
                Segment::Literal(literal) => {
                    if !uri[pos..].starts_with(literal.as_str()) {
                        return None;
                    }
                    pos += literal.len();
                }
                Segment::Variable(name) => {
                    let captured = match segments.peek() {
                        // The next literal is the separator; the variable
                        // captures everything before its first occurrence.
                        Some(Segment::Literal(separator)) => {
                            let idx = uri[pos..].find(separator.as_str())?;
                            if idx == 0 {
                                return None;
                            }
                            let captured = &uri[pos..pos + idx];
                            pos += idx;
                            captured
                        }
                        // Adjacent variables have no separator to split on.
                        Some(Segment::Variable(_)) => return None,
                        // Trailing variable consumes the remainder.
                        None => {
                            let captured = &uri[pos..];
                            if captured.is_empty() {
                                return None;
                            }
                            pos = uri.len();
                            captured
                        }
                    };
                    bindings.insert(name.clone(), captured.to_string());
                }
            }
        }

        if pos == uri.len() {
            Some(bindings)
        } else {
            None
        }
    }
}
