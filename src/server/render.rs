//! Rendering contract towards the component layer.
//!
//! Turning components into markup is the component runtime's job; the
//! pipeline only hands it the branch and the data the client needs to
//! hydrate. [`HtmlShell`] is a minimal stand-in that embeds that data.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::load::{NavigationResult, PageContext, SerializedFetch};

/// Everything the client needs to resume from a server render.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HydrationData {
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
    pub components: Vec<String>,
    pub props: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub page: Option<PageContext>,
    pub session: Value,
    pub fetched: Vec<SerializedFetch>,
}

impl HydrationData {
    /// Collect hydration data from an assembled result.
    pub fn from_result(result: &NavigationResult, session: Value, dev: bool) -> Self {
        Self {
            status: result.props.status,
            error: result.props.error.as_ref().map(|e| e.public_message(dev)),
            components: result
                .props
                .components
                .iter()
                .map(|c| c.name().to_string())
                .collect(),
            props: result.props.props.clone(),
            page: result.state.page.as_deref().cloned(),
            session,
            fetched: result
                .state
                .branch
                .iter()
                .flat_map(|node| node.fetched.iter().cloned())
                .collect(),
        }
    }
}

/// Renders a page body.
pub trait PageRenderer: Send + Sync {
    fn render(&self, data: &HydrationData) -> String;
}

/// A bare HTML document with one placeholder per component and the
/// hydration data in a JSON script tag.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlShell;

impl PageRenderer for HtmlShell {
    fn render(&self, data: &HydrationData) -> String {
        let mut body = String::new();
        for name in &data.components {
            body.push_str(&format!("<div data-component=\"{}\"></div>", escape_attr(name)));
        }
        let json = serde_json::to_string(data).unwrap_or_else(|_| "{}".to_string());

        format!(
            "<!doctype html>\n<html>\n<head><meta charset=\"utf-8\"></head>\n<body>\n\
             <div id=\"kit\">{body}</div>\n\
             <script type=\"application/json\" id=\"kit-data\">{}</script>\n\
             </body>\n</html>\n",
            escape_json_in_html(&json)
        )
    }
}

/// Make a JSON string safe to embed in a `<script>` element.
pub fn escape_json_in_html(json: &str) -> String {
    let mut out = String::with_capacity(json.len());
    for c in json.chars() {
        match c {
            '<' => out.push_str("\\u003C"),
            '>' => out.push_str("\\u003E"),
            '&' => out.push_str("\\u0026"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            c => out.push(c),
        }
    }
    out
}

fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
}
