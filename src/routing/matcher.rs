//! Route pattern compilation and matching.
//!
//! # Responsibilities
//! - Compile manifest patterns (`/blog/[slug]`, `/docs/[...rest]`) to regexes
//! - Test a decoded path against a pattern
//! - Extract named parameters from the capture groups
//!
//! # Design Decisions
//! - Static text is escaped; only `[name]` and `[...name]` are dynamic
//! - A single trailing slash is optional on every non-root pattern; the
//!   trailing-slash policy is enforced elsewhere, not here
//! - Matching is case-sensitive

use std::collections::BTreeMap;

use regex::Regex;

use crate::error::{Error, Result};

/// Parameters extracted from a matched path, keyed by name.
pub type Params = BTreeMap<String, String>;

/// A compiled route pattern.
#[derive(Debug, Clone)]
pub struct RoutePattern {
    source: String,
    regex: Regex,
    names: Vec<String>,
}

impl RoutePattern {
    /// Compile a manifest pattern.
    pub fn compile(source: &str) -> Result<Self> {
        if !source.starts_with('/') {
            return Err(Error::InvalidPattern {
                pattern: source.to_string(),
                reason: "pattern must start with '/'".into(),
            });
        }

        let mut names = Vec::new();
        let mut expr = String::from("^");

        for segment in source.split('/').filter(|s| !s.is_empty()) {
            if let Some(name) = segment
                .strip_prefix("[...")
                .and_then(|s| s.strip_suffix(']'))
            {
                // Rest parameters swallow the separator so they can match nothing.
                names.push(name.to_string());
                expr.push_str("(?:/(.*))?");
                continue;
            }

            expr.push('/');
            let mut rest = segment;
            while let Some(open) = rest.find('[') {
                let close = rest[open..].find(']').map(|i| open + i).ok_or_else(|| {
                    Error::InvalidPattern {
                        pattern: source.to_string(),
                        reason: format!("unclosed parameter in segment {segment}"),
                    }
                })?;
                expr.push_str(&regex::escape(&rest[..open]));
                let name = &rest[open + 1..close];
                if name.is_empty() || name.starts_with("...") {
                    return Err(Error::InvalidPattern {
                        pattern: source.to_string(),
                        reason: format!("bad parameter in segment {segment}"),
                    });
                }
                names.push(name.to_string());
                expr.push_str("([^/]+?)");
                rest = &rest[close + 1..];
            }
            expr.push_str(&regex::escape(rest));
        }

        if expr == "^" {
            expr.push_str("/$");
        } else {
            expr.push_str("/?$");
        }

        let regex = Regex::new(&expr).map_err(|e| Error::InvalidPattern {
            pattern: source.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            source: source.to_string(),
            regex,
            names,
        })
    }

    /// The pattern as written in the manifest.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Returns true if the decoded path matches.
    pub fn test(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    /// Match the decoded path and extract its parameters.
    pub fn exec(&self, path: &str) -> Option<Params> {
        let captures = self.regex.captures(path)?;
        let params = self
            .names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let value = captures.get(i + 1).map(|m| m.as_str()).unwrap_or_default();
                (name.clone(), value.to_string())
            })
            .collect();
        Some(params)
    }
}
