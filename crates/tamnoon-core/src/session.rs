//! Page session
//!
//! Owns everything scoped to one synced page: the live document, the
//! accumulated Client State and the event-listener registrations. The
//! connection task drives it: inbound frames go through [`Session::apply_message`],
//! fired events come back out as wire messages via [`Session::fire_event`].
//!
//! Listener registrations live for one connection. The connection task
//! rebinds the whole document on every open and tears the list down on
//! every close, so a stale connection can never emit events.

use ego_tree::NodeId;
use tracing::{debug, warn};

use crate::action::Action;
use crate::conn::message::{EventMessage, ServerMessage};
use crate::diff::{apply_diffs, ClientState};
use crate::directive::EventDirective;
use crate::error::DirectiveError;
use crate::page::Page;

struct Registration {
    node: NodeId,
    directive: EventDirective,
}

/// One synced page: document, client state, listener registrations.
pub struct Session {
    page: Page,
    state: ClientState,
    listeners: Vec<Registration>,
}

impl Session {
    pub fn new(page: Page) -> Self {
        Self {
            page,
            state: ClientState::new(),
            listeners: Vec::new(),
        }
    }

    /// Parse markup into a fresh session.
    pub fn from_html(html: &str) -> Self {
        Self::new(Page::parse(html))
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    /// Serialized current document.
    pub fn html(&self) -> String {
        self.page.html()
    }

    pub fn state(&self) -> &ClientState {
        &self.state
    }

    /// Copy of the Client State, for a `set_state` payload.
    pub fn state_snapshot(&self) -> ClientState {
        self.state.clone()
    }

    /// Bind event listeners over the whole document.
    pub fn bind_document(&mut self) {
        let root = self.page.document_root();
        self.bind(&[root]);
    }

    /// Bind event listeners over the given subtrees, roots included — a
    /// replaced top-level element may itself carry a directive class.
    pub fn bind(&mut self, roots: &[NodeId]) {
        for &root in roots {
            for elem in self.page.element_descendants(root) {
                for class in self.page.class_tokens(elem) {
                    match EventDirective::parse(&class) {
                        Ok(directive) => self.listeners.push(Registration {
                            node: elem,
                            directive,
                        }),
                        Err(DirectiveError::NotADirective(_)) => {}
                        Err(e) => warn!(class = %class, error = %e, "malformed event directive"),
                    }
                }
            }
        }
    }

    /// Drop every listener registration.
    pub fn unbind_all(&mut self) {
        self.listeners.clear();
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Fire a DOM event on a node. Returns the outbound messages its bound
    /// directives produce, in binding order; unbound nodes produce nothing.
    pub fn fire_event(&self, node: NodeId, event: &str) -> Vec<EventMessage> {
        self.listeners
            .iter()
            .filter(|r| r.node == node && r.directive.event() == event)
            .map(|r| {
                let value = self.page.value(node);
                let element = self.page.outer_html(node).unwrap_or_default();
                EventMessage::from_directive(&r.directive, value, element)
            })
            .collect()
    }

    /// Apply one inbound frame: actions in array order, then diffs, then
    /// listener binding over whatever markup they inserted. A bad action is
    /// reported and skipped; its siblings still run.
    pub fn apply_message(&mut self, msg: &ServerMessage) {
        if msg.is_empty() {
            debug!("inbound frame carried no diffs or actions");
            return;
        }

        let mut inserted = Vec::new();
        if let Some(actions) = &msg.actions {
            for raw in actions {
                match serde_json::from_value::<Action>(raw.clone()) {
                    Ok(action) => match action.apply(&mut self.page, None) {
                        Ok(mut roots) => inserted.append(&mut roots),
                        Err(e) => warn!(error = %e, "action failed, skipping"),
                    },
                    Err(e) => {
                        warn!(action = %raw, error = %e, "invalid action, skipping")
                    }
                }
            }
        }
        if let Some(diffs) = &msg.diffs {
            inserted.extend(apply_diffs(&mut self.page, &mut self.state, diffs));
        }
        self.bind(&inserted);
    }
}
