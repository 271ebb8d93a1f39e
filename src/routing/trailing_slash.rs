//! Trailing-slash policy shared by the server pipeline and the client
//! navigation controller.

use serde::{Deserialize, Serialize};

/// How paths with or without a trailing slash are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrailingSlash {
    /// `/about/` is corrected to `/about`.
    #[default]
    Never,
    /// `/about` is corrected to `/about/`, except for file-like last segments.
    Always,
    /// Both forms are served as-is.
    Ignore,
}

impl TrailingSlash {
    /// Returns the corrected path if `path` violates the policy.
    ///
    /// The root path is never corrected.
    pub fn correct(&self, path: &str) -> Option<String> {
        if path == "/" || *self == TrailingSlash::Ignore {
            return None;
        }

        let has_trailing_slash = path.ends_with('/');
        match self {
            TrailingSlash::Never if has_trailing_slash => {
                Some(path[..path.len() - 1].to_string())
            }
            TrailingSlash::Always if !has_trailing_slash => {
                let last = path.rsplit('/').next().unwrap_or_default();
                if last.contains('.') {
                    None
                } else {
                    Some(format!("{path}/"))
                }
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_never_strips_slash() {
        assert_eq!(TrailingSlash::Never.correct("/about/"), Some("/about".into()));
        assert_eq!(TrailingSlash::Never.correct("/about"), None);
        assert_eq!(TrailingSlash::Never.correct("/"), None);
    }

    #[test]
    fn test_always_adds_slash_except_files() {
        assert_eq!(TrailingSlash::Always.correct("/about"), Some("/about/".into()));
        assert_eq!(TrailingSlash::Always.correct("/about/"), None);
        assert_eq!(TrailingSlash::Always.correct("/feed.xml"), None);
    }

    #[test]
    fn test_ignore_never_corrects() {
        assert_eq!(TrailingSlash::Ignore.correct("/about/"), None);
        assert_eq!(TrailingSlash::Ignore.correct("/about"), None);
    }

    #[test]
    fn test_deserializes_lowercase() {
        #[derive(Deserialize)]
        struct Wrapper {
            policy: TrailingSlash,
        }
        let parsed: Wrapper = toml::from_str("policy = \"always\"").unwrap();
        assert_eq!(parsed.policy, TrailingSlash::Always);
    }
}
