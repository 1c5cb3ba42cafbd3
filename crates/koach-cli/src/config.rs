//! Configuration file support

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Configuration for koach
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Backend host, e.g. "https://coach.example.com"
    pub host: Option<String>,
    /// API token (alternative to the KOACH_API_TOKEN environment variable)
    pub api_token: Option<String>,
    /// Default user id
    pub user_id: Option<String>,
    /// Default agent to request at turn start
    pub agent: Option<String>,
}

impl Config {
    /// Get the config directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("koach")
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        // Check for KOACH_CONFIG_PATH env var first
        if let Ok(path) = std::env::var("KOACH_CONFIG_PATH") {
            return PathBuf::from(path);
        }
        Self::config_dir().join("config.toml")
    }

    /// Load config from file
    pub fn load() -> Self {
        let path = Self::config_path();
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(&path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("Warning: Failed to parse config file: {}", e);
                    Self::default()
                }
            },
            Err(e) => {
                eprintln!("Warning: Failed to read config file: {}", e);
                Self::default()
            }
        }
    }

    /// Save config to file
    pub fn save(&self) -> std::io::Result<()> {
        let path = Self::config_path();
        let dir = path.parent().unwrap();
        fs::create_dir_all(dir)?;

        let content = toml::to_string_pretty(self).map_err(std::io::Error::other)?;
        fs::write(path, content)
    }

    /// Create a default config file if it doesn't exist
    pub fn init() -> std::io::Result<PathBuf> {
        let path = Self::config_path();
        if path.exists() {
            return Ok(path);
        }

        Config::default().save()?;
        Ok(path)
    }

    /// Get the API token, checking config then the environment
    pub fn get_api_token(&self) -> Option<String> {
        if self.api_token.is_some() {
            return self.api_token.clone();
        }
        std::env::var("KOACH_API_TOKEN").ok()
    }

    /// Get the backend host, checking config then the environment
    pub fn get_host(&self) -> Option<String> {
        if self.host.is_some() {
            return self.host.clone();
        }
        std::env::var("KOACH_HOST").ok()
    }
}

/// Generate example config content
pub fn example_config() -> &'static str {
    r#"# koach configuration file
# Place at ~/.config/koach/config.toml (Linux/Mac) or %APPDATA%\koach\config.toml (Windows)

# Backend host
host = "https://coach.example.com"

# Default user id (optional)
# user_id = "1"

# Default agent to request at turn start (optional)
# agent = "Coach"

# API token (optional - the KOACH_API_TOKEN environment variable is
# recommended instead for security)
# api_token = "..."
"#
}
