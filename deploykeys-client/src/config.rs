use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const API_URL_ENV: &str = "DEPLOYKEYS_API_URL";
pub const LOG_LEVEL_ENV: &str = "DEPLOYKEYS_LOG_LEVEL";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Config {
    pub api_url: String,
    /// Name of the environment variable holding the API token.
    pub token_env: String,
    pub log_level: String,
    pub user_agent: String,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Page size for `keys list` when none is given on the command line.
    #[serde(default)]
    pub default_page_size: Option<u32>,
    #[serde(default)]
    pub trust_invalid_server_cert: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: "https://api.github.com".to_string(),
            token_env: "GITHUB_TOKEN".to_string(),
            log_level: "info".to_string(),
            user_agent: concat!("deploykeys/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout_secs: Some(30),
            default_page_size: None,
            trust_invalid_server_cert: false,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_file_path()?;
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Reads the config at `path`, writing the defaults there if it is missing.
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            info!("Loading config from: {:?}", config_path);
            let contents =
                std::fs::read_to_string(config_path).context("Failed to read config file")?;
            let config: Config =
                serde_json::from_str(&contents).context("Failed to parse config file")?;
            Ok(config)
        } else {
            warn!("Config file not found, using defaults");
            let config = Self::default();
            config.save_to(config_path)?;
            Ok(config)
        }
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        let config_dir = config_path
            .parent()
            .context("Failed to get config directory")?;

        std::fs::create_dir_all(config_dir).context("Failed to create config directory")?;

        let contents = serde_json::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(config_path, contents).context("Failed to write config file")?;

        info!("Config saved to: {:?}", config_path);
        Ok(())
    }

    pub fn config_file_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("Failed to get config directory")?;
        Ok(config_dir.join("deploykeys").join("config.json"))
    }

    /// The API token, read from the variable named by `token_env`.
    pub fn token(&self) -> Option<String> {
        std::env::var(&self.token_env)
            .ok()
            .filter(|t| !t.trim().is_empty())
    }

    fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(API_URL_ENV) {
            self.api_url = url;
        }
        if let Some(level) = lookup(LOG_LEVEL_ENV) {
            self.log_level = level;
        }
    }
}
