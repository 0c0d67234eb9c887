//! Tamnoon headless client core
//!
//! Client runtime for a server-driven UI framework: a persistent WebSocket
//! to the application server, DOM events forwarded upstream, and
//! server-pushed state diffs and imperative actions applied to an
//! in-memory HTML document.
//!
//! The [`session::Session`] owns one synced page; the connection task in
//! [`conn::persistent`] drives it over the wire.

pub mod action;
pub mod config;
pub mod conn;
pub mod diff;
pub mod directive;
pub mod error;
pub mod page;
pub mod selector;
pub mod session;
pub mod xpath;

pub use action::Action;
pub use config::Config;
pub use conn::{
    spawn_client_task, ClientCommand, ClientEvent, ClientHandle, ConnectionConfig,
    ConnectionStatus, ServerMessage,
};
pub use diff::ClientState;
pub use error::{DirectiveError, EngineError, EngineResult};
pub use page::Page;
pub use selector::{CollectionSelector, SingleSelector};
pub use session::Session;
pub use xpath::XPath;
