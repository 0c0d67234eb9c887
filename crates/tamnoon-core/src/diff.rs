//! State diff application
//!
//! A diff is a JSON object of state keys to new values. For each key, every
//! element carrying a matching `tmnn-<key>-<attr>` (or negated
//! `tmnn-not-<key>-<attr>`) class gets the bound attribute updated; the
//! key/value pair is also merged into the Client State unless the key is a
//! reserved channel verb. The `error` key is skipped entirely.
//!
//! A failed binding is logged and skipped; sibling bindings and keys still
//! apply. Returns the roots of any inserted markup so the caller can rebind
//! event listeners.

use std::collections::BTreeMap;

use ego_tree::NodeId;
use serde_json::Value;
use tracing::{debug, warn};

use crate::action::value_text;
use crate::directive::{match_bind_token, BindMatch, BIND_CLASS_PREFIX, EVENT_CLASS_PREFIX};
use crate::error::EngineResult;
use crate::page::Page;

/// Accumulated client-side state, mirrored back to the server on reconnect.
/// Ordered so `set_state` payloads are deterministic.
pub type ClientState = BTreeMap<String, Value>;

/// Channel verbs the server multiplexes over diff keys. They still drive
/// DOM updates but are never merged into the Client State.
pub const RESERVED_KEYS: [&str; 5] = ["pub", "sub", "unsub", "set_state", "subbed_channels"];

/// Apply a diff object. Returns inserted roots needing listener rebinding.
pub fn apply_diffs(
    page: &mut Page,
    state: &mut ClientState,
    diffs: &serde_json::Map<String, Value>,
) -> Vec<NodeId> {
    let mut inserted = Vec::new();
    for (key, value) in diffs {
        if key == "error" {
            debug!(%value, "server reported an error diff, skipping");
            continue;
        }
        if !RESERVED_KEYS.contains(&key.as_str()) {
            state.insert(key.clone(), value.clone());
        }

        // Snapshot per key: markup inserted by an earlier key is visible to
        // later ones, matching a live-document query.
        for elem in page.element_descendants(page.document_root()) {
            for class in page.class_tokens(elem) {
                let Some(m) = match_bind_token(&class, key) else {
                    continue;
                };
                match apply_binding(page, elem, &m, value) {
                    Ok(mut roots) => inserted.append(&mut roots),
                    Err(e) => {
                        warn!(key = %key, class = %class, error = %e, "diff binding failed");
                    }
                }
            }
        }
    }
    inserted
}

fn apply_binding(
    page: &mut Page,
    elem: NodeId,
    binding: &BindMatch,
    value: &Value,
) -> EngineResult<Vec<NodeId>> {
    let effective = if binding.negated {
        Value::Bool(!truthy(value))
    } else {
        value.clone()
    };

    match binding.attr.as_str() {
        "innerHtml" => page.set_inner_html(elem, &value_text(&effective)),
        "innerText" => {
            page.set_text(elem, &value_text(&effective))?;
            Ok(Vec::new())
        }
        "value" => {
            page.set_value(elem, &value_text(&effective));
            Ok(Vec::new())
        }
        "class" => {
            // Framework classes survive the update; the new value is
            // appended after them.
            let mut tokens: Vec<String> = page
                .class_tokens(elem)
                .into_iter()
                .filter(|c| {
                    c.starts_with(BIND_CLASS_PREFIX) || c.starts_with(EVENT_CLASS_PREFIX)
                })
                .collect();
            let text = value_text(&effective);
            tokens.extend(text.split_whitespace().map(str::to_string));
            page.set_attr(elem, "class", &tokens.join(" "))?;
            Ok(Vec::new())
        }
        "hidden" => {
            if truthy(&effective) {
                page.set_attr(elem, "hidden", "")?;
            } else {
                page.remove_attr(elem, "hidden")?;
            }
            Ok(Vec::new())
        }
        "disabled" => {
            if truthy(&effective) {
                page.set_attr(elem, "disabled", &value_text(&effective))?;
            } else {
                page.remove_attr(elem, "disabled")?;
            }
            Ok(Vec::new())
        }
        attr => {
            page.set_attr(elem, attr, &value_text(&effective))?;
            Ok(Vec::new())
        }
    }
}

/// JSON value truthiness: `false`, `null`, `0` and `""` are falsy,
/// everything else (arrays and objects included) is truthy.
pub(crate) fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const PAGE: &str = r#"<html><body>
        <span class="tmnn-count-innerText">0</span>
        <div id="bio" class="tmnn-bio-innerHtml"></div>
        <input id="field" class="tmnn-name-value">
        <p id="status" class="plain tmnn-mood-class"></p>
        <div id="spinner" class="tmnn-not-loading-hidden"></div>
        <button id="go" class="tmnn-busy-disabled">Go</button>
        <img id="pic" class="tmnn-avatar-data-src">
    </body></html>"#;

    fn diffs(v: Value) -> serde_json::Map<String, Value> {
        v.as_object().unwrap().clone()
    }

    #[test]
    fn test_inner_text_binding() {
        let mut page = Page::parse(PAGE);
        let mut state = ClientState::new();
        apply_diffs(&mut page, &mut state, &diffs(json!({"count": 3})));
        let span = page.query("span").unwrap()[0];
        assert_eq!(page.text(span), "3");
        assert_eq!(state.get("count"), Some(&json!(3)));
    }

    #[test]
    fn test_inner_html_reports_inserted_roots() {
        let mut page = Page::parse(PAGE);
        let mut state = ClientState::new();
        let inserted = apply_diffs(
            &mut page,
            &mut state,
            &diffs(json!({"bio": "<b>hi</b><i>there</i>"})),
        );
        assert_eq!(inserted.len(), 2);
        let bio = page.element_by_id("bio").unwrap();
        assert_eq!(page.inner_html(bio).unwrap(), "<b>hi</b><i>there</i>");
    }

    #[test]
    fn test_value_binding_sets_property() {
        let mut page = Page::parse(PAGE);
        let mut state = ClientState::new();
        apply_diffs(&mut page, &mut state, &diffs(json!({"name": "Ada"})));
        let field = page.element_by_id("field").unwrap();
        assert_eq!(page.value(field).as_deref(), Some("Ada"));
        assert!(page.attr(field, "value").is_none());
    }

    #[test]
    fn test_class_binding_keeps_framework_classes() {
        let mut page = Page::parse(PAGE);
        let mut state = ClientState::new();
        apply_diffs(&mut page, &mut state, &diffs(json!({"mood": "happy bright"})));
        let status = page.element_by_id("status").unwrap();
        assert_eq!(
            page.class_tokens(status),
            vec!["tmnn-mood-class", "happy", "bright"]
        );
    }

    #[test]
    fn test_negated_hidden_binding() {
        let mut page = Page::parse(PAGE);
        let mut state = ClientState::new();
        let spinner = page.element_by_id("spinner").unwrap();

        apply_diffs(&mut page, &mut state, &diffs(json!({"loading": true})));
        assert!(page.attr(spinner, "hidden").is_none());

        apply_diffs(&mut page, &mut state, &diffs(json!({"loading": false})));
        assert!(page.attr(spinner, "hidden").is_some());
    }

    #[test]
    fn test_disabled_binding() {
        let mut page = Page::parse(PAGE);
        let mut state = ClientState::new();
        let go = page.element_by_id("go").unwrap();

        apply_diffs(&mut page, &mut state, &diffs(json!({"busy": true})));
        assert_eq!(page.attr(go, "disabled").as_deref(), Some("true"));

        apply_diffs(&mut page, &mut state, &diffs(json!({"busy": 0})));
        assert!(page.attr(go, "disabled").is_none());
    }

    #[test]
    fn test_dashed_attribute_binding() {
        let mut page = Page::parse(PAGE);
        let mut state = ClientState::new();
        apply_diffs(&mut page, &mut state, &diffs(json!({"avatar": "/a.png"})));
        let pic = page.element_by_id("pic").unwrap();
        assert_eq!(page.attr(pic, "data-src").as_deref(), Some("/a.png"));
    }

    #[test]
    fn test_reserved_keys_update_dom_but_not_state() {
        let html = r#"<div class="tmnn-subbed_channels-innerText"></div>"#;
        let mut page = Page::parse(html);
        let mut state = ClientState::new();
        apply_diffs(&mut page, &mut state, &diffs(json!({"subbed_channels": "chat"})));
        let div = page.query("div").unwrap()[0];
        assert_eq!(page.text(div), "chat");
        assert!(state.is_empty());
    }

    #[test]
    fn test_error_key_skipped() {
        let html = r#"<div class="tmnn-error-innerText"></div>"#;
        let mut page = Page::parse(html);
        let mut state = ClientState::new();
        apply_diffs(&mut page, &mut state, &diffs(json!({"error": "boom"})));
        let div = page.query("div").unwrap()[0];
        assert_eq!(page.text(div), "");
        assert!(state.is_empty());
    }

    #[test]
    fn test_state_accumulates_latest_value() {
        let mut page = Page::parse(PAGE);
        let mut state = ClientState::new();
        apply_diffs(&mut page, &mut state, &diffs(json!({"count": 1, "name": "A"})));
        apply_diffs(&mut page, &mut state, &diffs(json!({"count": 2})));
        assert_eq!(state.get("count"), Some(&json!(2)));
        assert_eq!(state.get("name"), Some(&json!("A")));
    }

    #[test]
    fn test_truthiness() {
        assert!(!truthy(&json!(null)));
        assert!(!truthy(&json!(false)));
        assert!(!truthy(&json!(0)));
        assert!(!truthy(&json!("")));
        assert!(truthy(&json!("0")));
        assert!(truthy(&json!([])));
        assert!(truthy(&json!({})));
        assert!(truthy(&json!(-1)));
    }
}
