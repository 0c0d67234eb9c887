//! Wire message types
//!
//! All frames are JSON text. Outbound traffic is either a control message
//! (`keep_alive`, `sync`, `set_state`) or an event message built from a
//! fired DOM event and its directive. Inbound traffic is a single shape,
//! `{diffs?, actions?}`, with both fields optional.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::diff::ClientState;
use crate::directive::EventDirective;

/// Methods whose trailing directive token names a channel, not a state key.
const CHANNEL_VERBS: [&str; 2] = ["sub", "unsub"];

/// Client → server control frames.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum ControlMessage {
    /// Periodic no-op keeping the connection open.
    KeepAlive,
    /// Request the full initial state, sent on the first connection.
    Sync,
    /// Replay accumulated client state, sent on every reconnection.
    SetState { state: ClientState },
}

/// Client → server frame produced by a fired DOM event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventMessage {
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub element: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<EventAction>,
}

/// Inner message of a `pub` event, handled by the channel's own method.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventAction {
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub element: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

// The trailing directive token is a channel for channel-lifecycle verbs
// and a state key for everything else.
fn split_trailing(method: &str, trailing: Option<String>) -> (Option<String>, Option<String>) {
    match trailing {
        None => (None, None),
        Some(t) if CHANNEL_VERBS.contains(&method) => (Some(t), None),
        Some(t) => (None, Some(t)),
    }
}

impl EventMessage {
    /// Build the outbound frame for a fired event: the directive supplies
    /// routing, the element supplies `value` and its outer markup.
    pub fn from_directive(
        directive: &EventDirective,
        value: Option<String>,
        element: String,
    ) -> Self {
        match directive {
            EventDirective::Forward { method, key, .. } => {
                let (channel, key) = split_trailing(method, key.clone());
                EventMessage {
                    method: method.clone(),
                    value,
                    element,
                    channel,
                    key,
                    action: None,
                }
            }
            EventDirective::Publish {
                channel,
                method,
                key,
                ..
            } => {
                let (inner_channel, inner_key) = split_trailing(method, key.clone());
                EventMessage {
                    method: "pub".to_string(),
                    value: value.clone(),
                    element: element.clone(),
                    channel: Some(channel.clone()),
                    key: None,
                    action: Some(EventAction {
                        method: method.clone(),
                        value,
                        element,
                        channel: inner_channel,
                        key: inner_key,
                    }),
                }
            }
        }
    }
}

/// Any client → server frame.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ClientMessage {
    Control(ControlMessage),
    Event(EventMessage),
}

impl ClientMessage {
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).context("failed to encode outbound message")
    }
}

impl From<ControlMessage> for ClientMessage {
    fn from(msg: ControlMessage) -> Self {
        ClientMessage::Control(msg)
    }
}

impl From<EventMessage> for ClientMessage {
    fn from(msg: EventMessage) -> Self {
        ClientMessage::Event(msg)
    }
}

/// Server → client frame. Actions are kept as raw JSON so one malformed
/// action can be reported and skipped without poisoning its siblings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ServerMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diffs: Option<serde_json::Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actions: Option<Vec<Value>>,
}

impl ServerMessage {
    /// Decode an inbound text frame. `Ok(None)` is a `null` payload, which
    /// the protocol treats as a no-op.
    pub fn decode(text: &str) -> Result<Option<Self>> {
        serde_json::from_str::<Option<Self>>(text).context("failed to decode inbound message")
    }

    pub fn is_empty(&self) -> bool {
        self.diffs.is_none() && self.actions.is_none()
    }
}
