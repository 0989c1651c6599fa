use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::db::DEFAULT_EXPIRY_HOURS;
use crate::error::{AppError, Result};
use crate::models::Source;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Cached articles older than this are excluded from default listings.
    /// Rows are purged entirely at twice this age.
    #[serde(default = "default_expiry_hours")]
    pub expiry_hours: i64,

    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    #[serde(default)]
    pub sources: Vec<Source>,
}

fn default_db_path() -> String {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("newswire");
    std::fs::create_dir_all(&data_dir).ok();
    data_dir.join("articles.db").to_string_lossy().to_string()
}

fn default_expiry_hours() -> i64 {
    DEFAULT_EXPIRY_HOURS
}

fn default_fetch_timeout_secs() -> u64 {
    30
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            expiry_hours: default_expiry_hours(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            sources: Vec::new(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save()?;
            Ok(config)
        }
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("newswire")
            .join("config.toml")
    }

    /// The source catalog handed to the pipeline; disabled entries never
    /// reach it.
    pub fn enabled_sources(&self) -> Vec<Source> {
        self.sources.iter().filter(|s| s.enabled).cloned().collect()
    }
}
