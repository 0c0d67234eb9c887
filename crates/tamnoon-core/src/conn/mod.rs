//! Connection manager
//!
//! Socket lifecycle for a page session: URL derivation, wire messages and
//! the persistent reconnecting task.

pub mod message;
pub mod persistent;
pub mod url;

pub use message::{ClientMessage, ControlMessage, EventAction, EventMessage, ServerMessage};
pub use persistent::{
    spawn_client_task, ClientCommand, ClientEvent, ClientHandle, ConnectionConfig,
    ConnectionStatus,
};
pub use url::socket_url;
