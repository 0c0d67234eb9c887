//! Tamnoon CLI
//!
//! Headless client for Tamnoon server-driven pages: connects to a page's
//! socket endpoint, keeps the in-memory document synced, and offers a few
//! tools around the directive grammar and configuration.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use tamnoon_core::Config;

mod commands;
mod output;

use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "tamnoon")]
#[command(about = "Headless client for Tamnoon server-driven pages")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to a page and keep it synced until interrupted
    Run {
        /// Page URL (falls back to the configured page_url)
        url: Option<String>,
        /// Read initial markup from a file instead of fetching the page
        #[arg(long)]
        markup: Option<PathBuf>,
        /// Print the full document after every server update
        #[arg(long)]
        dump: bool,
    },
    /// Check the event directives declared in a markup file
    Directives {
        /// HTML file to check
        file: PathBuf,
    },
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (page_url, ws_path, keep_alive_secs, reconnect_secs)
        key: String,
        /// Configuration value
        value: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));

    match cli.command {
        Commands::Run { url, markup, dump } => {
            let config = Config::load()?;
            let url = url.or_else(|| config.page_url.clone()).ok_or_else(|| {
                anyhow::anyhow!("No page URL given. Pass one or set page_url in the config.")
            })?;
            commands::run::run(url, markup, dump, &config, &output).await
        }
        Commands::Directives { file } => commands::directives::lint(&file, &output),
        Commands::Config { command } => match command {
            Some(ConfigCommands::Set { key, value }) => commands::config::set(key, value, &output),
            Some(ConfigCommands::Show) | None => commands::config::show(&output),
        },
    }
}
