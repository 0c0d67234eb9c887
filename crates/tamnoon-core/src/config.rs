//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/tamnoon/config.toml)
//! 3. Environment variables (TAMNOON_* prefix)
//!
//! Environment variables take precedence over config file values.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::conn::{socket_url, ConnectionConfig};

/// Environment variable prefix
const ENV_PREFIX: &str = "TAMNOON";

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Page URL to connect to (optional; the CLI can supply it per run)
    #[serde(default)]
    pub page_url: Option<String>,

    /// Path segment the server mounts the socket endpoint on
    #[serde(default = "default_ws_path")]
    pub ws_path: String,

    /// Seconds between keep-alive frames
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,

    /// Seconds between reconnection attempts
    #[serde(default = "default_reconnect_secs")]
    pub reconnect_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            page_url: None,
            ws_path: default_ws_path(),
            keep_alive_secs: default_keep_alive_secs(),
            reconnect_secs: default_reconnect_secs(),
        }
    }
}

impl Config {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (TAMNOON_PAGE_URL, TAMNOON_WS_PATH, ...)
    /// 2. Config file (~/.config/tamnoon/config.toml or TAMNOON_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &PathBuf) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var(format!("{}_PAGE_URL", ENV_PREFIX)) {
            self.page_url = if val.is_empty() { None } else { Some(val) };
        }

        if let Ok(val) = std::env::var(format!("{}_WS_PATH", ENV_PREFIX)) {
            if !val.is_empty() {
                self.ws_path = val;
            }
        }

        if let Ok(val) = std::env::var(format!("{}_KEEP_ALIVE_SECS", ENV_PREFIX)) {
            if let Ok(secs) = val.parse() {
                self.keep_alive_secs = secs;
            }
        }

        if let Ok(val) = std::env::var(format!("{}_RECONNECT_SECS", ENV_PREFIX)) {
            if let Ok(secs) = val.parse() {
                self.reconnect_secs = secs;
            }
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_file_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;
        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with TAMNOON_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tamnoon")
            .join("config.toml")
    }

    /// Build the connection settings for a page URL, deriving the socket
    /// endpoint from it.
    pub fn connection_config(&self, page_url: &Url) -> Result<ConnectionConfig> {
        let url = socket_url(page_url, &self.ws_path)?;
        let mut conn = ConnectionConfig::new(url);
        conn.keep_alive_interval = Duration::from_secs(self.keep_alive_secs);
        conn.reconnect_delay = Duration::from_secs(self.reconnect_secs);
        Ok(conn)
    }
}

fn default_ws_path() -> String {
    "ws".to_string()
}

fn default_keep_alive_secs() -> u64 {
    55
}

fn default_reconnect_secs() -> u64 {
    1
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Mutex to serialize tests that touch environment variables
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// Guard that locks env access and saves/restores env vars
    struct EnvGuard<'a> {
        _lock: std::sync::MutexGuard<'a, ()>,
        saved: Vec<(String, Option<String>)>,
    }

    impl<'a> EnvGuard<'a> {
        fn new(vars: &[&str]) -> Self {
            let lock = ENV_MUTEX.lock().unwrap();
            let saved = vars
                .iter()
                .map(|&name| (name.to_string(), env::var(name).ok()))
                .collect();
            // Clear all the vars
            for name in vars {
                env::remove_var(name);
            }
            Self { _lock: lock, saved }
        }
    }

    impl Drop for EnvGuard<'_> {
        fn drop(&mut self) {
            for (name, value) in &self.saved {
                match value {
                    Some(v) => env::set_var(name, v),
                    None => env::remove_var(name),
                }
            }
        }
    }

    const ENV_VARS: &[&str] = &[
        "TAMNOON_PAGE_URL",
        "TAMNOON_WS_PATH",
        "TAMNOON_KEEP_ALIVE_SECS",
        "TAMNOON_RECONNECT_SECS",
    ];

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.page_url.is_none());
        assert_eq!(config.ws_path, "ws");
        assert_eq!(config.keep_alive_secs, 55);
        assert_eq!(config.reconnect_secs, 1);
    }

    #[test]
    fn test_env_override_page_url() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();

        env::set_var("TAMNOON_PAGE_URL", "http://localhost:4000/app");
        config.apply_env_overrides();
        assert_eq!(
            config.page_url,
            Some("http://localhost:4000/app".to_string())
        );

        // Empty string clears it
        env::set_var("TAMNOON_PAGE_URL", "");
        config.apply_env_overrides();
        assert!(config.page_url.is_none());
    }

    #[test]
    fn test_env_override_timers() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();

        env::set_var("TAMNOON_KEEP_ALIVE_SECS", "10");
        env::set_var("TAMNOON_RECONNECT_SECS", "5");
        config.apply_env_overrides();
        assert_eq!(config.keep_alive_secs, 10);
        assert_eq!(config.reconnect_secs, 5);

        // Unparseable values are ignored
        env::set_var("TAMNOON_KEEP_ALIVE_SECS", "soon");
        config.apply_env_overrides();
        assert_eq!(config.keep_alive_secs, 10);
    }

    #[test]
    fn test_load_from_str() {
        let _guard = EnvGuard::new(ENV_VARS);

        let toml = r#"
            page_url = "http://localhost:4000/"
            ws_path = "socket"
            keep_alive_secs = 30
        "#;

        let config = Config::load_from_str(toml).unwrap();
        assert_eq!(config.page_url, Some("http://localhost:4000/".to_string()));
        assert_eq!(config.ws_path, "socket");
        assert_eq!(config.keep_alive_secs, 30);
        assert_eq!(config.reconnect_secs, 1);
    }

    #[test]
    fn test_load_from_path_missing_file() {
        let _guard = EnvGuard::new(ENV_VARS);

        let path = PathBuf::from("/nonexistent/config.toml");
        let config = Config::load_from_path(&path).unwrap();
        // Should return defaults when file doesn't exist
        assert_eq!(config.ws_path, "ws");
    }

    #[test]
    fn test_connection_config_derives_socket_url() {
        let _guard = EnvGuard::new(ENV_VARS);

        let config = Config::load_from_str("ws_path = \"socket\"").unwrap();
        let page = Url::parse("https://app.example.com/panel").unwrap();
        let conn = config.connection_config(&page).unwrap();
        assert_eq!(conn.url.as_str(), "wss://app.example.com/panel/socket");
        assert_eq!(conn.keep_alive_interval, Duration::from_secs(55));
    }

    #[test]
    fn test_serialization() {
        let _guard = EnvGuard::new(ENV_VARS);

        let config = Config {
            page_url: Some("http://localhost:4000/".to_string()),
            ws_path: "ws".to_string(),
            keep_alive_secs: 55,
            reconnect_secs: 1,
        };

        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("page_url"));
        assert!(toml_str.contains("ws_path"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.page_url, config.page_url);
        assert_eq!(parsed.keep_alive_secs, config.keep_alive_secs);
    }
}
