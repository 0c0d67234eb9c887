//! Persistent page connection
//!
//! Maintains the long-lived WebSocket to the application server: handshake
//! on open (`sync` first, `set_state` on every reconnect), a keep-alive
//! timer per connection, and indefinite reconnection with a fixed delay.
//! Listener registrations are torn down after every connection ends so a
//! stale connection can never emit events.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use ego_tree::NodeId;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch, Mutex};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};
use url::Url;

use super::message::{ClientMessage, ControlMessage, ServerMessage};
use crate::session::Session;

/// Commands sent to the connection task
#[derive(Debug, Clone)]
pub enum ClientCommand {
    /// Fire a DOM event on a node, sending whatever its directives produce
    FireEvent { node: NodeId, event: String },
    /// Shutdown the connection task
    Shutdown,
}

/// Events emitted by the connection task
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// Connection status changed
    StatusChanged(ConnectionStatus),
    /// An inbound frame mutated the page
    PageUpdated,
    /// Error occurred
    Error(String),
}

/// Connection status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// Not connected, not trying
    Disconnected,
    /// Attempting to connect
    Connecting,
    /// Connected and synced
    Connected,
}

/// Handle to control the connection task
pub struct ClientHandle {
    /// Send commands to the connection task
    pub command_tx: mpsc::Sender<ClientCommand>,
    /// Receive events from the connection task
    pub event_rx: mpsc::Receiver<ClientEvent>,
    /// Watch connection status
    pub status_rx: watch::Receiver<ConnectionStatus>,
}

/// Configuration for the persistent connection
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Socket URL, already derived from the page URL
    pub url: Url,
    /// Keep-alive period
    pub keep_alive_interval: Duration,
    /// Fixed delay between reconnection attempts
    pub reconnect_delay: Duration,
}

impl ConnectionConfig {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            keep_alive_interval: Duration::from_secs(55),
            reconnect_delay: Duration::from_secs(1),
        }
    }
}

/// Spawn the connection task for a session
///
/// Returns a handle to control and monitor the task. The task reconnects
/// indefinitely on disconnection.
pub fn spawn_client_task(config: ConnectionConfig, session: Arc<Mutex<Session>>) -> ClientHandle {
    let (command_tx, command_rx) = mpsc::channel(16);
    let (event_tx, event_rx) = mpsc::channel(64);
    let (status_tx, status_rx) = watch::channel(ConnectionStatus::Disconnected);

    tokio::spawn(client_task_loop(
        config, session, command_rx, event_tx, status_tx,
    ));

    ClientHandle {
        command_tx,
        event_rx,
        status_rx,
    }
}

/// Main task loop with reconnection
async fn client_task_loop(
    config: ConnectionConfig,
    session: Arc<Mutex<Session>>,
    mut command_rx: mpsc::Receiver<ClientCommand>,
    event_tx: mpsc::Sender<ClientEvent>,
    status_tx: watch::Sender<ConnectionStatus>,
) {
    let mut has_connected = false;

    loop {
        let _ = status_tx.send(ConnectionStatus::Connecting);
        let _ = event_tx
            .send(ClientEvent::StatusChanged(ConnectionStatus::Connecting))
            .await;

        let outcome = connect_and_drive(
            &config,
            &session,
            &mut has_connected,
            &mut command_rx,
            &event_tx,
            &status_tx,
        )
        .await;

        // Teardown after every connection end, so no listener survives
        // into the reconnect gap.
        session.lock().await.unbind_all();

        let _ = status_tx.send(ConnectionStatus::Disconnected);
        let _ = event_tx
            .send(ClientEvent::StatusChanged(ConnectionStatus::Disconnected))
            .await;

        match outcome {
            Ok(true) => break,
            Ok(false) => {}
            Err(e) => {
                let _ = event_tx
                    .send(ClientEvent::Error(format!("Connection error: {}", e)))
                    .await;
            }
        }

        // Fixed delay, indefinitely; only a shutdown command interrupts it.
        tokio::select! {
            _ = tokio::time::sleep(config.reconnect_delay) => {}
            cmd = command_rx.recv() => {
                match cmd {
                    Some(ClientCommand::Shutdown) | None => break,
                    Some(ClientCommand::FireEvent { event, .. }) => {
                        debug!(%event, "dropping event fired while disconnected");
                    }
                }
            }
        }
    }
}

/// Connect and drive the session until disconnection or shutdown.
/// Returns `Ok(true)` when the task should shut down.
async fn connect_and_drive(
    config: &ConnectionConfig,
    session: &Arc<Mutex<Session>>,
    has_connected: &mut bool,
    command_rx: &mut mpsc::Receiver<ClientCommand>,
    event_tx: &mpsc::Sender<ClientEvent>,
    status_tx: &watch::Sender<ConnectionStatus>,
) -> Result<bool> {
    let (ws_stream, _) = connect_async(config.url.as_str()).await?;
    let (mut write, mut read) = ws_stream.split();

    // Bind listeners over the whole document, then hand the server its
    // opening frame: sync on the first successful connection, the
    // accumulated client state on every one after.
    let handshake = {
        let mut guard = session.lock().await;
        guard.bind_document();
        if *has_connected {
            ClientMessage::from(ControlMessage::SetState {
                state: guard.state_snapshot(),
            })
        } else {
            ClientMessage::from(ControlMessage::Sync)
        }
    };
    write.send(Message::Text(handshake.encode()?)).await?;
    *has_connected = true;

    let _ = status_tx.send(ConnectionStatus::Connected);
    let _ = event_tx
        .send(ClientEvent::StatusChanged(ConnectionStatus::Connected))
        .await;

    // Per-connection timer; dropped with the connection.
    let mut keep_alive = tokio::time::interval_at(
        tokio::time::Instant::now() + config.keep_alive_interval,
        config.keep_alive_interval,
    );

    loop {
        tokio::select! {
            _ = keep_alive.tick() => {
                let frame = ClientMessage::from(ControlMessage::KeepAlive).encode()?;
                write.send(Message::Text(frame)).await?;
            }

            cmd = command_rx.recv() => {
                match cmd {
                    Some(ClientCommand::FireEvent { node, event }) => {
                        let messages = session.lock().await.fire_event(node, &event);
                        for msg in messages {
                            let frame = ClientMessage::from(msg).encode()?;
                            write.send(Message::Text(frame)).await?;
                        }
                    }
                    Some(ClientCommand::Shutdown) | None => {
                        write.close().await.ok();
                        return Ok(true);
                    }
                }
            }

            frame = read.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        handle_frame(session, &text, event_tx).await;
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        return Ok(false);
                    }
                    Some(Err(e)) => {
                        return Err(e.into());
                    }
                    _ => {}
                }
            }
        }
    }
}

/// Apply one inbound text frame. A malformed frame is dropped whole; no
/// partial application.
async fn handle_frame(session: &Arc<Mutex<Session>>, text: &str, event_tx: &mpsc::Sender<ClientEvent>) {
    match ServerMessage::decode(text) {
        Ok(Some(msg)) => {
            if msg.is_empty() {
                return;
            }
            session.lock().await.apply_message(&msg);
            let _ = event_tx.send(ClientEvent::PageUpdated).await;
        }
        Ok(None) => {}
        Err(e) => {
            warn!(error = %e, "dropping malformed inbound frame");
        }
    }
}
