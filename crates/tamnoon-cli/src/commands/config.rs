//! `config` command - show or set configuration

use anyhow::{Context, Result};

use tamnoon_core::Config;

use crate::output::Output;

pub fn show(output: &Output) -> Result<()> {
    let config = Config::load()?;

    if output.is_json() {
        println!("{}", serde_json::to_string_pretty(&config)?);
    } else {
        println!(
            "page_url:        {}",
            config.page_url.as_deref().unwrap_or("(not set)")
        );
        println!("ws_path:         {}", config.ws_path);
        println!("keep_alive_secs: {}", config.keep_alive_secs);
        println!("reconnect_secs:  {}", config.reconnect_secs);
        println!();
        println!("Config file: {}", Config::config_file_path().display());
    }
    Ok(())
}

pub fn set(key: String, value: String, output: &Output) -> Result<()> {
    let mut config = Config::load()?;

    match key.as_str() {
        "page_url" => {
            config.page_url = if value.is_empty() { None } else { Some(value) };
        }
        "ws_path" => config.ws_path = value,
        "keep_alive_secs" => {
            config.keep_alive_secs = value.parse().context("keep_alive_secs must be a number")?;
        }
        "reconnect_secs" => {
            config.reconnect_secs = value.parse().context("reconnect_secs must be a number")?;
        }
        other => anyhow::bail!(
            "Unknown configuration key: {} (expected page_url, ws_path, keep_alive_secs or reconnect_secs)",
            other
        ),
    }

    config.save()?;
    output.success(&format!("Set {}", key));
    Ok(())
}
