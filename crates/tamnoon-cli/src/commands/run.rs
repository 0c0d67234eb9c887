//! `run` command - keep a page session synced until interrupted

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::Mutex;
use url::Url;

use tamnoon_core::{
    spawn_client_task, ClientCommand, ClientEvent, Config, ConnectionStatus, Session,
};

use crate::output::Output;

pub async fn run(
    url: String,
    markup: Option<PathBuf>,
    dump: bool,
    config: &Config,
    output: &Output,
) -> Result<()> {
    let page_url = Url::parse(&url).with_context(|| format!("Invalid page URL: {}", url))?;

    let html = match markup {
        Some(path) => std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read markup file: {:?}", path))?,
        None => fetch_page(&page_url).await?,
    };

    let session = Arc::new(Mutex::new(Session::from_html(&html)));
    let conn = config.connection_config(&page_url)?;
    output.message(&format!("Connecting to {}", conn.url));

    let mut handle = spawn_client_task(conn, session.clone());

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                handle.command_tx.send(ClientCommand::Shutdown).await.ok();
                break;
            }
            event = handle.event_rx.recv() => {
                match event {
                    Some(ClientEvent::StatusChanged(status)) => {
                        output.event("status", status_label(status));
                    }
                    Some(ClientEvent::PageUpdated) => {
                        if dump {
                            println!("{}", session.lock().await.html());
                        } else {
                            output.event("page", "updated");
                        }
                    }
                    Some(ClientEvent::Error(e)) => {
                        output.event("error", &e);
                    }
                    None => break,
                }
            }
        }
    }

    output.success("Disconnected");
    Ok(())
}

fn status_label(status: ConnectionStatus) -> &'static str {
    match status {
        ConnectionStatus::Disconnected => "disconnected",
        ConnectionStatus::Connecting => "connecting",
        ConnectionStatus::Connected => "connected",
    }
}

async fn fetch_page(url: &Url) -> Result<String> {
    let response = reqwest::get(url.clone())
        .await
        .with_context(|| format!("Failed to fetch {}", url))?
        .error_for_status()
        .with_context(|| format!("Server rejected request for {}", url))?;
    response
        .text()
        .await
        .with_context(|| format!("Failed to read page body from {}", url))
}
