//! What a load returns, and its normalised form.

use serde_json::{Map, Value};

use crate::error::Error;
use crate::load::Stuff;

/// Raw result of a segment load, as written by application code.
///
/// Every field is optional; [`Loaded::normalize`] turns it into exactly one
/// of a normal result, an error or a redirect.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadOutput {
    pub props: Option<Value>,
    pub stuff: Option<Stuff>,
    pub status: Option<u16>,
    pub error: Option<String>,
    pub redirect: Option<String>,
    /// Seconds the assembled result may be cached for. Only read on the leaf.
    pub max_age: Option<u64>,
    pub headers: Vec<(String, String)>,
}

impl LoadOutput {
    /// A result that renders with no props.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn props(props: Value) -> Self {
        Self {
            props: Some(props),
            ..Self::default()
        }
    }

    pub fn error(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            error: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn redirect(status: u16, location: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            redirect: Some(location.into()),
            ..Self::default()
        }
    }

    /// Contribute `stuff` to every segment below this one.
    pub fn with_stuff(mut self, stuff: Value) -> Self {
        self.stuff = match stuff {
            Value::Object(map) => Some(map),
            other => {
                let mut map = Map::new();
                map.insert("value".into(), other);
                Some(map)
            }
        };
        self
    }

    pub fn with_max_age(mut self, seconds: u64) -> Self {
        self.max_age = Some(seconds);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }
}

/// The single meaningful part of a normalised result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Ready,
    Failed { status: u16, error: Error },
    Redirect { status: u16, location: String },
}

/// A normalised load result.
#[derive(Debug, Clone, PartialEq)]
pub struct Loaded {
    pub props: Value,
    pub stuff: Option<Stuff>,
    pub max_age: Option<u64>,
    pub headers: Vec<(String, String)>,
    pub outcome: Outcome,
}

impl Loaded {
    /// Normalise a raw load result.
    ///
    /// - an error without a 4xx/5xx status renders as 500
    /// - a 4xx/5xx status without an error gets a generic one
    /// - a redirect without a 3xx status is itself an error
    pub fn normalize(output: LoadOutput) -> Self {
        let outcome = match (&output.error, &output.redirect, output.status) {
            (Some(message), _, status) => {
                let status = match status {
                    Some(s @ 400..=599) => s,
                    _ => {
                        tracing::warn!(
                            ?status,
                            "Load returned an error without a valid status, defaulting to 500"
                        );
                        500
                    }
                };
                Outcome::Failed {
                    status,
                    error: Error::load(status, message.clone()),
                }
            }
            (None, Some(location), Some(status @ 300..=399)) => Outcome::Redirect {
                status,
                location: location.clone(),
            },
            (None, Some(_), _) => Outcome::Failed {
                status: 500,
                error: Error::load(
                    500,
                    "A redirect returned from load must be accompanied by a 3xx status code",
                ),
            },
            (None, None, Some(status @ 400..=599)) => Outcome::Failed {
                status,
                error: Error::load(status, format!("Error: {status}")),
            },
            (None, None, _) => Outcome::Ready,
        };

        Self {
            props: output.props.unwrap_or_else(|| Value::Object(Map::new())),
            stuff: output.stuff,
            max_age: output.max_age,
            headers: output.headers,
            outcome,
        }
    }

    /// A result carrying only a failure, used when the load itself errored.
    pub fn failed(error: Error) -> Self {
        Self {
            props: Value::Object(Map::new()),
            stuff: None,
            max_age: None,
            headers: Vec::new(),
            outcome: Outcome::Failed {
                status: error.status(),
                error,
            },
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.outcome, Outcome::Ready)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_plain_props_are_ready() {
        let loaded = Loaded::normalize(LoadOutput::props(json!({"title": "Hello"})));
        assert!(loaded.is_ready());
        assert_eq!(loaded.props["title"], "Hello");
    }

    #[test]
    fn test_missing_props_default_to_empty_object() {
        let loaded = Loaded::normalize(LoadOutput::empty());
        assert_eq!(loaded.props, json!({}));
    }

    #[test]
    fn test_error_without_valid_status_becomes_500() {
        let output = LoadOutput {
            error: Some("boom".into()),
            status: Some(200),
            ..LoadOutput::default()
        };
        match Loaded::normalize(output).outcome {
            Outcome::Failed { status, error } => {
                assert_eq!(status, 500);
                assert_eq!(error.to_string(), "boom");
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn test_error_status_without_error_gets_generic_message() {
        let outcome = Loaded::normalize(LoadOutput::empty().with_status(404)).outcome;
        assert_eq!(
            outcome,
            Outcome::Failed {
                status: 404,
                error: Error::load(404, "Error: 404")
            }
        );
    }

    #[test]
    fn test_redirect_requires_3xx() {
        let ok = Loaded::normalize(LoadOutput::redirect(302, "/login")).outcome;
        assert_eq!(
            ok,
            Outcome::Redirect {
                status: 302,
                location: "/login".into()
            }
        );

        let bad = Loaded::normalize(LoadOutput::redirect(200, "/login")).outcome;
        assert!(matches!(bad, Outcome::Failed { status: 500, .. }));
    }

    #[test]
    fn test_with_stuff_wraps_non_objects() {
        let output = LoadOutput::empty().with_stuff(json!(3));
        assert_eq!(output.stuff.unwrap()["value"], 3);
    }
}
