//! Path pattern matching and template rendering.
//!
//! # Responsibilities
//! - Parse inbound path patterns (`/spaces/{id}`, `/files/{*rest}`)
//! - Match request paths segment by segment, capturing raw param values
//! - Parse and render templates (upstream paths, cache tags)
//!
//! # Design Decisions
//! - Path matching is case-sensitive
//! - A `{*rest}` param may only appear as the last segment
//! - No regex to guarantee O(n) matching

use thiserror::Error;

/// Errors produced while parsing a pattern or template.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PatternError {
    #[error("pattern `{0}` must start with '/'")]
    MissingLeadingSlash(String),

    #[error("pattern `{pattern}` has a malformed parameter `{segment}`")]
    MalformedParam { pattern: String, segment: String },

    #[error("pattern `{pattern}` declares parameter `{name}` twice")]
    DuplicateParam { pattern: String, name: String },

    #[error("pattern `{0}` has a catch-all parameter that is not the last segment")]
    RestNotLast(String),

    #[error("template `{template}` has an unterminated or empty placeholder")]
    MalformedTemplate { template: String },
}

/// One segment of a compiled path pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Param(String),
    Rest(String),
}

/// A compiled inbound path pattern.
#[derive(Debug, Clone)]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    pub fn parse(raw: &str) -> Result<Self, PatternError> {
        if !raw.starts_with('/') {
            return Err(PatternError::MissingLeadingSlash(raw.to_string()));
        }

        let mut segments = Vec::new();
        let mut seen: Vec<String> = Vec::new();
        let parts: Vec<&str> = split_path(raw).collect();

        for (idx, part) in parts.iter().enumerate() {
            let segment = match parse_placeholder(part) {
                Some(Ok(name)) => {
                    if let Some(rest) = name.strip_prefix('*') {
                        if idx + 1 != parts.len() {
                            return Err(PatternError::RestNotLast(raw.to_string()));
                        }
                        Segment::Rest(rest.to_string())
                    } else {
                        Segment::Param(name.to_string())
                    }
                }
                Some(Err(())) => {
                    return Err(PatternError::MalformedParam {
                        pattern: raw.to_string(),
                        segment: part.to_string(),
                    });
                }
                None => {
                    if part.contains('{') || part.contains('}') {
                        return Err(PatternError::MalformedParam {
                            pattern: raw.to_string(),
                            segment: part.to_string(),
                        });
                    }
                    Segment::Literal(part.to_string())
                }
            };

            if let Segment::Param(name) | Segment::Rest(name) = &segment {
                if seen.contains(name) {
                    return Err(PatternError::DuplicateParam {
                        pattern: raw.to_string(),
                        name: name.clone(),
                    });
                }
                seen.push(name.clone());
            }
            segments.push(segment);
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Names of all parameters in declaration order.
    pub fn params(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Param(name) | Segment::Rest(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Name of the trailing `{*rest}` param, if any.
    pub fn rest_param(&self) -> Option<&str> {
        match self.segments.last() {
            Some(Segment::Rest(name)) => Some(name),
            _ => None,
        }
    }

    /// Pattern with param names erased, used to detect duplicate routes.
    pub fn shape(&self) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            out.push('/');
            match segment {
                Segment::Literal(lit) => out.push_str(lit),
                Segment::Param(_) => out.push_str("{}"),
                Segment::Rest(_) => out.push_str("{*}"),
            }
        }
        if out.is_empty() {
            out.push('/');
        }
        out
    }

    /// Sort key: more literal segments first, catch-alls last.
    pub fn specificity(&self) -> (usize, bool, usize) {
        let literals = self
            .segments
            .iter()
            .filter(|s| matches!(s, Segment::Literal(_)))
            .count();
        let has_rest = self.segments.iter().any(|s| matches!(s, Segment::Rest(_)));
        (literals, !has_rest, self.segments.len())
    }

    /// Match a request path, returning raw (still percent-encoded) param values.
    pub fn matches(&self, path: &str) -> Option<Vec<(String, String)>> {
        let path = normalize_trailing_slash(path);
        let parts: Vec<&str> = split_path(path).collect();
        let mut params = Vec::new();

        for (idx, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Literal(lit) => {
                    if parts.get(idx) != Some(&lit.as_str()) {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    let value = parts.get(idx).filter(|v| !v.is_empty())?;
                    params.push((name.clone(), (*value).to_string()));
                }
                Segment::Rest(name) => {
                    let tail = &parts[idx.min(parts.len())..];
                    if tail.is_empty() || tail.iter().all(|p| p.is_empty()) {
                        return None;
                    }
                    params.push((name.clone(), tail.join("/")));
                    return Some(params);
                }
            }
        }

        if parts.len() == self.segments.len() {
            Some(params)
        } else {
            None
        }
    }
}

fn normalize_trailing_slash(path: &str) -> &str {
    if path.len() > 1 {
        path.strip_suffix('/').unwrap_or(path)
    } else {
        path
    }
}

fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.trim_start_matches('/')
        .split('/')
        .filter(move |_| path != "/")
}

/// `Some(Ok(name))` for a well-formed `{name}` segment, `Some(Err)` for a
/// malformed one, `None` for a literal.
fn parse_placeholder(part: &str) -> Option<Result<&str, ()>> {
    let inner = part.strip_prefix('{')?.strip_suffix('}');
    let Some(inner) = inner else {
        return Some(Err(()));
    };
    let name = inner.strip_prefix('*').unwrap_or(inner);
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Some(Err(()));
    }
    Some(Ok(inner))
}

/// A piece of a parsed template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplatePart {
    Text(String),
    Param(String),
}

/// A string with `{param}` placeholders, e.g. an upstream path or a cache tag.
#[derive(Debug, Clone)]
pub struct Template {
    raw: String,
    parts: Vec<TemplatePart>,
}

impl Template {
    pub fn parse(raw: &str) -> Result<Self, PatternError> {
        let malformed = || PatternError::MalformedTemplate {
            template: raw.to_string(),
        };
        let mut parts = Vec::new();
        let mut rest = raw;

        while let Some(start) = rest.find('{') {
            if start > 0 {
                parts.push(TemplatePart::Text(rest[..start].to_string()));
            }
            let after = &rest[start + 1..];
            let end = after.find('}').ok_or_else(malformed)?;
            let name = after[..end].trim_start_matches('*');
            if name.is_empty() || name.contains('{') {
                return Err(malformed());
            }
            parts.push(TemplatePart::Param(name.to_string()));
            rest = &after[end + 1..];
        }
        if rest.contains('}') {
            return Err(malformed());
        }
        if !rest.is_empty() {
            parts.push(TemplatePart::Text(rest.to_string()));
        }

        Ok(Self {
            raw: raw.to_string(),
            parts,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn params(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().filter_map(|p| match p {
            TemplatePart::Param(name) => Some(name.as_str()),
            TemplatePart::Text(_) => None,
        })
    }

    /// Render with values from `lookup`; `None` if a param has no value.
    pub fn render<'a, F>(&self, mut lookup: F) -> Option<String>
    where
        F: FnMut(&str) -> Option<std::borrow::Cow<'a, str>>,
    {
        let mut out = String::with_capacity(self.raw.len());
        for part in &self.parts {
            match part {
                TemplatePart::Text(text) => out.push_str(text),
                TemplatePart::Param(name) => out.push_str(&lookup(name)?),
            }
        }
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::borrow::Cow;

    #[test]
    fn test_pattern_match() {
        let pattern = PathPattern::parse("/spaces/{id}").unwrap();

        let params = pattern.matches("/spaces/42").unwrap();
        assert_eq!(params, vec![("id".to_string(), "42".to_string())]);

        // Trailing slash tolerated
        assert!(pattern.matches("/spaces/42/").is_some());

        assert!(pattern.matches("/spaces").is_none());
        assert!(pattern.matches("/spaces/42/members").is_none());
        assert!(pattern.matches("/Spaces/42").is_none()); // Case sensitive
    }

    #[test]
    fn test_rest_pattern() {
        let pattern = PathPattern::parse("/files/{*path}").unwrap();

        let params = pattern.matches("/files/a/b%20c/d.pdf").unwrap();
        assert_eq!(params[0].1, "a/b%20c/d.pdf");
        assert!(pattern.matches("/files").is_none());
        assert!(pattern.matches("/files/").is_none());
    }

    #[test]
    fn test_root_pattern() {
        let pattern = PathPattern::parse("/").unwrap();
        assert!(pattern.matches("/").is_some());
        assert!(pattern.matches("/x").is_none());
        assert_eq!(pattern.shape(), "/");
    }

    #[test]
    fn test_pattern_errors() {
        assert!(matches!(
            PathPattern::parse("spaces"),
            Err(PatternError::MissingLeadingSlash(_))
        ));
        assert!(matches!(
            PathPattern::parse("/a/{id"),
            Err(PatternError::MalformedParam { .. })
        ));
        assert!(matches!(
            PathPattern::parse("/a/{id}/{id}"),
            Err(PatternError::DuplicateParam { .. })
        ));
        assert!(matches!(
            PathPattern::parse("/a/{*rest}/b"),
            Err(PatternError::RestNotLast(_))
        ));
    }

    #[test]
    fn test_shape_erases_names() {
        let a = PathPattern::parse("/spaces/{id}").unwrap();
        let b = PathPattern::parse("/spaces/{space_id}").unwrap();
        assert_eq!(a.shape(), b.shape());
        assert!(a.specificity() < PathPattern::parse("/spaces/new").unwrap().specificity());
    }

    #[test]
    fn test_template_render() {
        let template = Template::parse("student:spaces:detail:{id}").unwrap();
        assert_eq!(template.params().collect::<Vec<_>>(), vec!["id"]);

        let rendered = template
            .render(|name| (name == "id").then(|| Cow::Borrowed("42")))
            .unwrap();
        assert_eq!(rendered, "student:spaces:detail:42");

        assert!(template.render(|_| None).is_none());
    }

    #[test]
    fn test_template_errors() {
        assert!(Template::parse("/spaces/{id").is_err());
        assert!(Template::parse("/spaces/{}").is_err());
        assert!(Template::parse("/spaces/id}").is_err());
        assert!(Template::parse("admin:departments").is_ok());
    }
}
