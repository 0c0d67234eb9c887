//! Class-name directive grammar
//!
//! Elements opt into the protocol through their class list. Two families:
//!
//! - `tmnnevent-<event>-<method>[-<key>]` forwards a DOM event upstream,
//!   with the pub form `tmnnevent-<event>-pub-<channel>-<method>[-<key>]`
//!   routing through a server-side channel.
//! - `tmnn-<key>-<attr>` / `tmnn-not-<key>-<attr>` binds an attribute of
//!   the element to a state key pushed in diffs.
//!
//! The `<event>` token is the DOM event name itself (`click`, `input`).
//! Grammar violations are typed errors so callers can log the exact class
//! that was malformed instead of silently ignoring it.

use crate::error::DirectiveError;

/// Class prefix for event-forwarding directives.
pub const EVENT_CLASS_PREFIX: &str = "tmnnevent-";

/// Class prefix for state-binding directives.
pub const BIND_CLASS_PREFIX: &str = "tmnn-";

/// A parsed event-forwarding directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventDirective {
    /// Send the event straight to the page's handler method.
    Forward {
        event: String,
        method: String,
        key: Option<String>,
    },
    /// Publish the event on a named channel, to be handled by the channel's
    /// own method.
    Publish {
        event: String,
        channel: String,
        method: String,
        key: Option<String>,
    },
}

impl EventDirective {
    /// Parse a single class token. `NotADirective` means the class simply
    /// isn't an event directive; the other variants mean it tried to be one
    /// and failed.
    pub fn parse(class: &str) -> Result<Self, DirectiveError> {
        let body = class
            .strip_prefix(EVENT_CLASS_PREFIX)
            .ok_or_else(|| DirectiveError::NotADirective(class.to_string()))?;

        let tokens: Vec<&str> = body.split('-').collect();
        let field = |idx: usize, field: &'static str| -> Result<String, DirectiveError> {
            match tokens.get(idx) {
                Some(t) if !t.is_empty() => Ok((*t).to_string()),
                _ => Err(DirectiveError::MissingField {
                    class: class.to_string(),
                    field,
                }),
            }
        };
        let optional = |idx: usize, field: &'static str| -> Result<Option<String>, DirectiveError> {
            match tokens.get(idx) {
                None => Ok(None),
                Some(t) if !t.is_empty() => Ok(Some((*t).to_string())),
                Some(_) => Err(DirectiveError::MissingField {
                    class: class.to_string(),
                    field,
                }),
            }
        };
        let bounded = |max: usize| -> Result<(), DirectiveError> {
            if tokens.len() > max {
                Err(DirectiveError::TrailingTokens {
                    class: class.to_string(),
                    extra: tokens.len() - max,
                })
            } else {
                Ok(())
            }
        };

        let event = field(0, "event")?;
        let method = field(1, "method")?;
        if method == "pub" {
            bounded(5)?;
            Ok(EventDirective::Publish {
                event,
                channel: field(2, "channel")?,
                method: field(3, "method")?,
                key: optional(4, "key")?,
            })
        } else {
            bounded(3)?;
            Ok(EventDirective::Forward {
                event,
                method,
                key: optional(2, "key")?,
            })
        }
    }

    /// DOM event name this directive listens for.
    pub fn event(&self) -> &str {
        match self {
            EventDirective::Forward { event, .. } => event,
            EventDirective::Publish { event, .. } => event,
        }
    }

    /// The state key the event payload reports under, if any.
    pub fn key(&self) -> Option<&str> {
        match self {
            EventDirective::Forward { key, .. } => key.as_deref(),
            EventDirective::Publish { key, .. } => key.as_deref(),
        }
    }
}

/// A state-binding class matched against a specific diff key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindMatch {
    /// The bound attribute directive (`innerHtml`, `value`, `class`,
    /// `hidden`, or any attribute name, dashes included).
    pub attr: String,
    /// Whether the binding inverts truthiness (`tmnn-not-` form).
    pub negated: bool,
}

/// Match a class token against a diff key. The plain form is tried before
/// the negated one, so a key literally named `not` still binds.
pub fn match_bind_token(class: &str, key: &str) -> Option<BindMatch> {
    if class.starts_with(EVENT_CLASS_PREFIX) {
        return None;
    }
    let body = class.strip_prefix(BIND_CLASS_PREFIX)?;
    if let Some(attr) = body.strip_prefix(key).and_then(|r| r.strip_prefix('-')) {
        if !attr.is_empty() {
            return Some(BindMatch {
                attr: attr.to_string(),
                negated: false,
            });
        }
    }
    let negated = body.strip_prefix("not-")?;
    let attr = negated.strip_prefix(key).and_then(|r| r.strip_prefix('-'))?;
    if attr.is_empty() {
        return None;
    }
    Some(BindMatch {
        attr: attr.to_string(),
        negated: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_forward() {
        let d = EventDirective::parse("tmnnevent-click-increment").unwrap();
        assert_eq!(
            d,
            EventDirective::Forward {
                event: "click".to_string(),
                method: "increment".to_string(),
                key: None,
            }
        );
        assert_eq!(d.event(), "click");
    }

    #[test]
    fn test_parse_forward_with_key() {
        let d = EventDirective::parse("tmnnevent-input-update-name").unwrap();
        assert_eq!(
            d,
            EventDirective::Forward {
                event: "input".to_string(),
                method: "update".to_string(),
                key: Some("name".to_string()),
            }
        );
        assert_eq!(d.key(), Some("name"));
    }

    #[test]
    fn test_parse_publish() {
        let d = EventDirective::parse("tmnnevent-click-pub-chat-send-draft").unwrap();
        assert_eq!(
            d,
            EventDirective::Publish {
                event: "click".to_string(),
                channel: "chat".to_string(),
                method: "send".to_string(),
                key: Some("draft".to_string()),
            }
        );
    }

    #[test]
    fn test_parse_publish_without_key() {
        let d = EventDirective::parse("tmnnevent-click-pub-chat-send").unwrap();
        assert!(matches!(d, EventDirective::Publish { key: None, .. }));
    }

    #[test]
    fn test_not_a_directive() {
        for class in ["wrap", "tmnn-count-innerText", "tmnneventclick"] {
            assert!(matches!(
                EventDirective::parse(class),
                Err(DirectiveError::NotADirective(_))
            ));
        }
    }

    #[test]
    fn test_missing_fields() {
        assert!(matches!(
            EventDirective::parse("tmnnevent-click"),
            Err(DirectiveError::MissingField { field: "method", .. })
        ));
        assert!(matches!(
            EventDirective::parse("tmnnevent--update"),
            Err(DirectiveError::MissingField { field: "event", .. })
        ));
        assert!(matches!(
            EventDirective::parse("tmnnevent-click-pub-chat"),
            Err(DirectiveError::MissingField { field: "method", .. })
        ));
    }

    #[test]
    fn test_trailing_tokens() {
        assert!(matches!(
            EventDirective::parse("tmnnevent-click-update-name-extra"),
            Err(DirectiveError::TrailingTokens { extra: 1, .. })
        ));
    }

    #[test]
    fn test_bind_match_plain() {
        let m = match_bind_token("tmnn-bio-innerHtml", "bio").unwrap();
        assert_eq!(m.attr, "innerHtml");
        assert!(!m.negated);
    }

    #[test]
    fn test_bind_match_dashed_attr() {
        let m = match_bind_token("tmnn-user-data-avatar", "user").unwrap();
        assert_eq!(m.attr, "data-avatar");
    }

    #[test]
    fn test_bind_match_negated() {
        let m = match_bind_token("tmnn-not-loading-hidden", "loading").unwrap();
        assert_eq!(m.attr, "hidden");
        assert!(m.negated);
    }

    #[test]
    fn test_bind_key_named_not_wins_over_negation() {
        let m = match_bind_token("tmnn-not-hidden", "not").unwrap();
        assert_eq!(m.attr, "hidden");
        assert!(!m.negated);
    }

    #[test]
    fn test_bind_no_match() {
        assert!(match_bind_token("tmnn-bio-innerHtml", "name").is_none());
        assert!(match_bind_token("tmnnevent-click-bio-x", "bio").is_none());
        assert!(match_bind_token("plain", "bio").is_none());
        // A bare key with no attribute suffix binds nothing.
        assert!(match_bind_token("tmnn-bio", "bio").is_none());
    }
}
