//! Error taxonomy shared by the client and server halves.
//!
//! Fallthrough and redirects are not errors: a declining leaf is `None`
//! and a redirect is an [`Outcome::Redirect`](crate::load::Outcome).

use thiserror::Error;

/// Errors produced while loading, navigating or responding.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Error {
    /// A segment load failed or returned an error payload.
    #[error("{message}")]
    Load { status: u16, message: String },

    /// A redirect chain revisited a path or grew past the hop limit.
    #[error("Redirect loop")]
    RedirectLoop,

    /// No route matched, or every candidate fell through.
    #[error("Not found: {path}")]
    NotFound { path: String },

    /// A fetch issued from inside a load failed.
    #[error("Fetch of {url} failed: {reason}")]
    Fetch { url: String, reason: String },

    /// The request body could not be parsed for its content type.
    #[error("Invalid request body: {0}")]
    InvalidBody(String),

    /// A route pattern from the manifest could not be compiled.
    #[error("Invalid route pattern {pattern}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// The URL does not belong to this application.
    #[error("{0} does not belong to this app")]
    Unowned(String),

    /// Anything thrown outside the load phase.
    #[error("{0}")]
    Fatal(String),
}

impl Error {
    /// Shorthand for a load failure with an explicit status.
    pub fn load(status: u16, message: impl Into<String>) -> Self {
        Error::Load {
            status,
            message: message.into(),
        }
    }

    /// HTTP status this error renders with.
    pub fn status(&self) -> u16 {
        match self {
            Error::Load { status, .. } => *status,
            Error::NotFound { .. } => 404,
            Error::InvalidBody(_) => 400,
            Error::RedirectLoop
            | Error::Fetch { .. }
            | Error::InvalidPattern { .. }
            | Error::Unowned(_)
            | Error::Fatal(_) => 500,
        }
    }

    /// Message safe to expose in production responses.
    pub fn public_message(&self, dev: bool) -> String {
        if dev {
            format!("{:?}", self)
        } else {
            self.to_string()
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(Error::load(403, "nope").status(), 403);
        assert_eq!(Error::NotFound { path: "/x".into() }.status(), 404);
        assert_eq!(Error::RedirectLoop.status(), 500);
        assert_eq!(Error::InvalidBody("bad json".into()).status(), 400);
    }

    #[test]
    fn test_public_message_hides_debug_outside_dev() {
        let err = Error::Fatal("boom".into());
        assert_eq!(err.public_message(false), "boom");
        assert!(err.public_message(true).contains("Fatal"));
    }
}
