//! Imperative DOM actions
//!
//! Actions arrive as `{"action": ..., "args": {...}}` JSON objects. The set
//! is closed: an unknown action name fails decoding up front instead of
//! being looked up in a dispatch map at apply time.
//!
//! Applying an action returns the root nodes of any markup it inserted so
//! the caller can rebind event listeners over exactly the new content.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use ego_tree::NodeId;

use crate::error::{EngineError, EngineResult};
use crate::page::Page;
use crate::selector::{CollectionSelector, Resolved, SingleSelector};

/// A server-pushed DOM action.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "action", content = "args")]
pub enum Action {
    /// Detach the target from the document.
    RemoveNode { target: SingleSelector },

    /// Replace the target with another node or parsed markup.
    ReplaceNode {
        target: SingleSelector,
        replacement: SingleSelector,
    },

    /// Append a node or parsed markup as the parent's last child.
    AddChild {
        parent: SingleSelector,
        child: SingleSelector,
    },

    /// Set an attribute. The attribute name `textContent` sets the node's
    /// text content instead.
    SetAttribute {
        target: SingleSelector,
        attribute: String,
        value: Value,
    },

    /// Replace the target's inner markup.
    #[serde(rename = "SetInnerHTML")]
    SetInnerHtml {
        target: SingleSelector,
        value: String,
    },

    /// Toggle an attribute, forced when `force` is present.
    ToggleAttribute {
        target: SingleSelector,
        attribute: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        force: Option<bool>,
    },

    /// Set a form control's value property.
    SetValue {
        target: SingleSelector,
        value: Value,
    },

    /// Apply the callback once per node of a collection, with the node
    /// bound to the callback's `iteration_placeholder` selector(s).
    ForEach {
        target: CollectionSelector,
        callback: Box<Action>,
    },
}

impl Action {
    /// Apply against a page. `placeholder` is the node bound by an
    /// enclosing `ForEach`, if any. Returns inserted roots for listener
    /// rebinding.
    pub fn apply(&self, page: &mut Page, placeholder: Option<NodeId>) -> EngineResult<Vec<NodeId>> {
        match self {
            Action::RemoveNode { target } => {
                let id = target.resolve_node(page, placeholder)?;
                page.remove_node(id)?;
                Ok(Vec::new())
            }

            Action::ReplaceNode { target, replacement } => {
                let id = target.resolve_node(page, placeholder)?;
                let new_id = match replacement.resolve(page, placeholder)? {
                    Resolved::Node(node) => page.replace_with_existing(id, node)?,
                    Resolved::Markup(html) => page.replace_with_fragment(id, &html)?,
                };
                Ok(vec![new_id])
            }

            Action::AddChild { parent, child } => {
                let parent_id = parent.resolve_node(page, placeholder)?;
                let new_id = match child.resolve(page, placeholder)? {
                    Resolved::Node(node) => page.append_existing(parent_id, node)?,
                    Resolved::Markup(html) => page.append_fragment(parent_id, &html)?,
                };
                Ok(vec![new_id])
            }

            Action::SetAttribute {
                target,
                attribute,
                value,
            } => {
                let id = target.resolve_node(page, placeholder)?;
                if attribute == "textContent" {
                    page.set_text(id, &value_text(value))?;
                } else {
                    page.set_attr(id, attribute, &value_text(value))?;
                }
                Ok(Vec::new())
            }

            Action::SetInnerHtml { target, value } => {
                let id = target.resolve_node(page, placeholder)?;
                page.set_inner_html(id, value)
            }

            Action::ToggleAttribute {
                target,
                attribute,
                force,
            } => {
                let id = target.resolve_node(page, placeholder)?;
                page.toggle_attr(id, attribute, *force)?;
                Ok(Vec::new())
            }

            Action::SetValue { target, value } => {
                let id = target.resolve_node(page, placeholder)?;
                page.set_value(id, &value_text(value));
                Ok(Vec::new())
            }

            Action::ForEach { target, callback } => {
                if !callback.uses_placeholder() {
                    return Err(EngineError::MissingPlaceholder);
                }
                let nodes = target.resolve(page, placeholder)?;
                let mut inserted = Vec::new();
                for node in nodes {
                    inserted.extend(callback.apply(page, Some(node))?);
                }
                Ok(inserted)
            }
        }
    }

    /// Whether any argument (transitively) references the iteration
    /// placeholder.
    pub fn uses_placeholder(&self) -> bool {
        match self {
            Action::RemoveNode { target } => target.uses_placeholder(),
            Action::ReplaceNode { target, replacement } => {
                target.uses_placeholder() || replacement.uses_placeholder()
            }
            Action::AddChild { parent, child } => {
                parent.uses_placeholder() || child.uses_placeholder()
            }
            Action::SetAttribute { target, .. }
            | Action::SetInnerHtml { target, .. }
            | Action::ToggleAttribute { target, .. }
            | Action::SetValue { target, .. } => target.uses_placeholder(),
            Action::ForEach { target, callback } => {
                target.uses_placeholder() || callback.uses_placeholder()
            }
        }
    }
}

/// Textual form of a JSON value, the way the DOM would coerce it: strings
/// as-is, everything else in its JSON rendering.
pub(crate) fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
