//! Deciding whether a click on an anchor becomes a client navigation.

use url::Url;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub meta: bool,
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
}

impl Modifiers {
    fn any(&self) -> bool {
        self.meta || self.ctrl || self.shift || self.alt
    }
}

/// The nearest anchor element enclosing the click target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Anchor {
    pub href: Option<String>,
    pub download: bool,
    /// Space separated `rel` tokens.
    pub rel: String,
    pub target: Option<String>,
    /// `sveltekit:noscroll` style opt-out of scroll reset.
    pub noscroll: bool,
}

impl Anchor {
    pub fn to(href: impl Into<String>) -> Self {
        Self {
            href: Some(href.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClickEvent {
    /// 0 is the primary button.
    pub button: u16,
    pub modifiers: Modifiers,
    pub default_prevented: bool,
    pub anchor: Option<Anchor>,
}

impl ClickEvent {
    pub fn on(anchor: Anchor) -> Self {
        Self {
            anchor: Some(anchor),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkAction {
    /// Let the browser handle the click.
    Ignore,
    /// Swallow the click; it targets the current URL.
    Prevent,
    /// Navigate client-side.
    Follow { url: Url, noscroll: bool },
}

/// Classify a click. `owns` decides whether a URL belongs to the app.
pub fn classify(event: &ClickEvent, location: &Url, owns: impl Fn(&Url) -> bool) -> LinkAction {
    if event.button != 0 || event.modifiers.any() || event.default_prevented {
        return LinkAction::Ignore;
    }
    let Some(anchor) = &event.anchor else {
        return LinkAction::Ignore;
    };
    let Some(href) = anchor.href.as_deref() else {
        return LinkAction::Ignore;
    };
    let Ok(url) = location.join(href) else {
        return LinkAction::Ignore;
    };

    if url.as_str() == location.as_str() {
        return if url.fragment().is_none() {
            LinkAction::Prevent
        } else {
            LinkAction::Ignore
        };
    }

    if anchor.download || anchor.rel.split_whitespace().any(|token| token == "external") {
        return LinkAction::Ignore;
    }
    if anchor.target.as_deref().is_some_and(|t| !t.is_empty()) {
        return LinkAction::Ignore;
    }
    if !owns(&url) {
        return LinkAction::Ignore;
    }

    LinkAction::Follow {
        url,
        noscroll: anchor.noscroll,
    }
}

/// `url` without its fragment.
pub(crate) fn without_hash(url: &Url) -> Url {
    let mut url = url.clone();
    url.set_fragment(None);
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location() -> Url {
        Url::parse("https://example.com/blog/one").unwrap()
    }

    fn classify_at(event: ClickEvent) -> LinkAction {
        classify(&event, &location(), |url| {
            url.origin() == location().origin()
        })
    }

    #[test]
    fn test_relative_link_is_followed() {
        let action = classify_at(ClickEvent::on(Anchor::to("two")));
        assert_eq!(
            action,
            LinkAction::Follow {
                url: Url::parse("https://example.com/blog/two").unwrap(),
                noscroll: false,
            }
        );
    }

    #[test]
    fn test_filtered_clicks_are_ignored() {
        let mut modified = ClickEvent::on(Anchor::to("/x"));
        modified.modifiers.ctrl = true;
        assert_eq!(classify_at(modified), LinkAction::Ignore);

        let mut middle = ClickEvent::on(Anchor::to("/x"));
        middle.button = 1;
        assert_eq!(classify_at(middle), LinkAction::Ignore);

        let external = Anchor {
            rel: "nofollow external".into(),
            ..Anchor::to("/x")
        };
        assert_eq!(classify_at(ClickEvent::on(external)), LinkAction::Ignore);

        let targeted = Anchor {
            target: Some("_blank".into()),
            ..Anchor::to("/x")
        };
        assert_eq!(classify_at(ClickEvent::on(targeted)), LinkAction::Ignore);

        assert_eq!(
            classify_at(ClickEvent::on(Anchor::to("https://other.org/x"))),
            LinkAction::Ignore
        );
        assert_eq!(classify_at(ClickEvent::default()), LinkAction::Ignore);
    }

    #[test]
    fn test_same_url_click_is_prevented() {
        assert_eq!(
            classify_at(ClickEvent::on(Anchor::to("/blog/one"))),
            LinkAction::Prevent
        );
    }

    #[test]
    fn test_hash_change_is_followed() {
        let action = classify_at(ClickEvent::on(Anchor::to("#comments")));
        assert!(matches!(
            action,
            LinkAction::Follow { url, .. } if url.fragment() == Some("comments")
        ));
    }
}
