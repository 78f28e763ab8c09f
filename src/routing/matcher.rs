//! Route pattern compilation and capture extraction.
//!
//! # Responsibilities
//! - Compile a regular expression once at registration time
//! - Match a concrete path and collect captures
//! - Unnamed groups → positional args (left to right)
//! - Named groups → kwargs keyed by group name
//!
//! # Design Decisions
//! - No implicit anchoring: `^`/`$` are the pattern author's job
//! - A pattern with zero groups still matches (empty args and kwargs)
//! - Groups that do not participate capture the empty string, so positional
//!   indices stay stable
//! - `regex::Regex` is `Send + Sync`; one compiled pattern serves all requests

use regex::Regex;
use std::collections::HashMap;
use std::fmt;

/// Error raised when a route pattern fails to compile.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid route pattern {pattern:?}: {reason}")]
pub struct PatternError {
    pub pattern: String,
    pub reason: String,
}

/// Values captured from a path by a [`RoutePattern`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Captures {
    /// Unnamed groups, in path order.
    pub args: Vec<String>,
    /// Named groups.
    pub kwargs: HashMap<String, String>,
}

/// An immutable compiled path matcher.
#[derive(Clone)]
pub struct RoutePattern {
    source: String,
    regex: Regex,
    /// One entry per capture group; `""` marks a positional group.
    group_names: Vec<String>,
}

impl RoutePattern {
    /// Compile `pattern`. Fails immediately on an invalid expression.
    pub fn compile(pattern: &str) -> Result<Self, PatternError> {
        let regex = Regex::new(pattern).map_err(|e| PatternError {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;
        let group_names = regex
            .capture_names()
            .skip(1)
            .map(|name| name.unwrap_or("").to_string())
            .collect();

        Ok(Self {
            source: pattern.to_string(),
            regex,
            group_names,
        })
    }

    /// The pattern text as written.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Capture-group names in group order; empty strings are positional.
    pub fn group_names(&self) -> &[String] {
        &self.group_names
    }

    /// Match `path`, returning its captures or `None`.
    pub fn captures(&self, path: &str) -> Option<Captures> {
        let caps = self.regex.captures(path)?;
        let mut out = Captures::default();

        for (i, name) in self.group_names.iter().enumerate() {
            let value = caps
                .get(i + 1)
                .map(|m| m.as_str().to_string())
                .unwrap_or_default();
            if name.is_empty() {
                out.args.push(value);
            } else {
                out.kwargs.insert(name.clone(), value);
            }
        }

        Some(out)
    }

    /// Returns true if `path` matches.
    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }
}

impl fmt::Debug for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RoutePattern").field(&self.source).finish()
    }
}

impl fmt::Display for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_match() {
        let p = RoutePattern::compile("^/foo$").unwrap();
        assert!(p.captures("/foo/bar").is_none());
    }

    #[test]
    fn test_exact_match_has_no_captures() {
        let p = RoutePattern::compile("^/foo$").unwrap();
        let m = p.captures("/foo").expect("should match");
        assert!(m.args.is_empty());
        assert!(m.kwargs.is_empty());
    }

    #[test]
    fn test_positional_args() {
        let p = RoutePattern::compile("^/foo/(.*)$").unwrap();
        let m = p.captures("/foo/bar").unwrap();
        assert_eq!(m.args, vec!["bar"]);
        assert!(m.kwargs.is_empty());
    }

    #[test]
    fn test_named_kwargs() {
        let p = RoutePattern::compile("^/foo/(?P<leeroy>.*)$").unwrap();
        let m = p.captures("/foo/jenkins").unwrap();
        assert!(m.args.is_empty());
        assert_eq!(m.kwargs.get("leeroy").map(String::as_str), Some("jenkins"));
    }

    #[test]
    fn test_mixed_captures() {
        let p = RoutePattern::compile(r"^/foo/(?P<leeroy>\w+)/(\d+)$").unwrap();
        let m = p.captures("/foo/jenkins/9000").unwrap();
        assert_eq!(m.args, vec!["9000"]);
        assert_eq!(m.kwargs.len(), 1);
        assert_eq!(m.kwargs["leeroy"], "jenkins");

        assert!(p.captures("/foo/jenkins/").is_none());
    }

    #[test]
    fn test_args_preserve_order() {
        let p = RoutePattern::compile(r"^/(\w+)/(?P<mid>\w+)/(\w+)/(\w+)$").unwrap();
        let m = p.captures("/a/b/c/d").unwrap();
        assert_eq!(m.args, vec!["a", "c", "d"]);
        assert_eq!(m.kwargs["mid"], "b");
    }

    #[test]
    fn test_no_implicit_anchoring() {
        let p = RoutePattern::compile("/foo").unwrap();
        assert!(p.is_match("/api/foo/bar"));
        assert!(p.captures("/api/foo/bar").is_some());
    }

    #[test]
    fn test_optional_group_keeps_position() {
        let p = RoutePattern::compile(r"^/x(/(\d+))?$").unwrap();
        let m = p.captures("/x").unwrap();
        assert_eq!(m.args, vec!["", ""]);
    }

    #[test]
    fn test_invalid_pattern_fails_fast() {
        let err = RoutePattern::compile("^/foo/(").unwrap_err();
        assert_eq!(err.pattern, "^/foo/(");
    }

    #[test]
    fn test_group_names() {
        let p = RoutePattern::compile(r"^/(?P<a>\w+)/(\w+)$").unwrap();
        assert_eq!(p.group_names(), &["a".to_string(), String::new()]);
    }
}
