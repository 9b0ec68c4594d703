//! Configuration management for flockscan
//!
//! All configuration is loaded from `./config/flockscan.toml`.
//! No hardcoded defaults exist in source code - all defaults are in the config template.

use serde::Deserialize;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration file path relative to working directory
pub const CONFIG_PATH: &str = "./config/flockscan.toml";

/// Default configuration file content - this is the ONLY place defaults exist
pub const DEFAULT_CONFIG: &str = include_str!("../config/flockscan.toml");

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found at {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] io::Error),

    #[error("Failed to parse configuration file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid URL in '{field}': {url}")]
    InvalidUrl { field: String, url: String },

    #[error("Configuration field '{field}' cannot be empty or zero")]
    EmptyRequired { field: String },
}

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub collector: CollectorSection,
    pub enrichment: EnrichmentConfig,
}

/// Profile API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    pub bearer_token: String,
    pub request_timeout_secs: u64,
    /// AboutAccountQuery operation id; empty defers to the cached or captured value
    #[serde(default)]
    pub query_id: String,
}

/// Username collection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CollectorSection {
    /// CSS selector matching one rendered row in the follower/following list
    pub row_selector: String,
    /// Wait after each scroll for new rows to render (milliseconds)
    pub settle_delay_ms: u64,
    /// Consecutive no-growth scrolls before the list is considered exhausted
    pub stall_threshold: u32,
}

impl CollectorSection {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

/// Enrichment pacing and batching configuration
#[derive(Debug, Clone, Deserialize)]
pub struct EnrichmentConfig {
    /// Identifiers per batch before pausing for a continue/stop decision
    pub batch_size: usize,
    /// Delay after every profile request (milliseconds)
    pub request_delay_ms: u64,
}

impl EnrichmentConfig {
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }
}

impl AppConfig {
    /// Load configuration from the default path
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path(Path::new(CONFIG_PATH))
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        match url::Url::parse(&self.api.base_url) {
            Ok(parsed) if parsed.scheme() == "http" || parsed.scheme() == "https" => {}
            _ => {
                return Err(ConfigError::InvalidUrl {
                    field: "api.base_url".to_string(),
                    url: self.api.base_url.clone(),
                });
            }
        }
        if self.api.bearer_token.is_empty() {
            return Err(ConfigError::EmptyRequired {
                field: "api.bearer_token".to_string(),
            });
        }
        if self.api.request_timeout_secs == 0 {
            return Err(ConfigError::EmptyRequired {
                field: "api.request_timeout_secs".to_string(),
            });
        }

        if self.collector.row_selector.is_empty() {
            return Err(ConfigError::EmptyRequired {
                field: "collector.row_selector".to_string(),
            });
        }
        if self.collector.stall_threshold == 0 {
            return Err(ConfigError::EmptyRequired {
                field: "collector.stall_threshold".to_string(),
            });
        }

        if self.enrichment.batch_size == 0 {
            return Err(ConfigError::EmptyRequired {
                field: "enrichment.batch_size".to_string(),
            });
        }

        Ok(())
    }

    /// Create default configuration file at the standard location
    pub fn create_default_config() -> Result<PathBuf, ConfigError> {
        let path = Path::new(CONFIG_PATH);

        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Write default config
        let mut file = fs::File::create(path)?;
        file.write_all(DEFAULT_CONFIG.as_bytes())?;

        Ok(path.to_path_buf())
    }

    /// Check if stdin is a TTY (interactive terminal)
    pub fn is_interactive() -> bool {
        atty::is(atty::Stream::Stdin)
    }

    /// Prompt user to create default config (only in interactive mode)
    pub fn prompt_create_config() -> Result<Option<PathBuf>, ConfigError> {
        if !Self::is_interactive() {
            return Ok(None);
        }

        print!("Configuration file not found. Create default config? [Y/n] ");
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        let input = input.trim().to_lowercase();

        if input.is_empty() || input == "y" || input == "yes" {
            let path = Self::create_default_config()?;
            Ok(Some(path))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_parses() {
        let config: Result<AppConfig, _> = toml::from_str(DEFAULT_CONFIG);
        assert!(config.is_ok(), "Default config should parse: {:?}", config.err());
    }

    #[test]
    fn test_default_config_validates() {
        let config: AppConfig = toml::from_str(DEFAULT_CONFIG).unwrap();
        assert!(config.validate().is_ok(), "Default config should validate");
    }

    #[test]
    fn test_default_pacing_values() {
        let config: AppConfig = toml::from_str(DEFAULT_CONFIG).unwrap();
        assert_eq!(config.enrichment.batch_size, 50);
        assert_eq!(config.enrichment.request_delay(), Duration::from_millis(500));
        assert_eq!(config.collector.settle_delay(), Duration::from_millis(800));
        assert_eq!(config.collector.stall_threshold, 3);
    }

    #[test]
    fn test_empty_query_id_allowed() {
        // Only the enrichment stage itself refuses to start without a query id;
        // an empty value here means "use the cached or captured one".
        let config: AppConfig = toml::from_str(DEFAULT_CONFIG).unwrap();
        assert!(config.api.query_id.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let mut config: AppConfig = toml::from_str(DEFAULT_CONFIG).unwrap();
        config.api.base_url = "ftp://example.com".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidUrl { .. })));
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let mut config: AppConfig = toml::from_str(DEFAULT_CONFIG).unwrap();
        config.enrichment.batch_size = 0;
        assert!(matches!(config.validate(), Err(ConfigError::EmptyRequired { .. })));
    }
}
