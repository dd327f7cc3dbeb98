//! Configuration management for Dropgate
//!
//! Environment-based configuration with defaults, file loading, and
//! validation. Sections mirror the deployment surface: the channels the bot
//! talks to, where snapshots live, access-control knobs, and logging.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

mod error;

pub use error::ConfigError;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Channel wiring (proof, store, data, force-join)
    pub channels: ChannelsConfig,

    /// Snapshot storage configuration
    pub storage: StorageConfig,

    /// Access-control configuration
    pub access: AccessConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Channels the bot forwards into or gates on
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelsConfig {
    /// Review channel receiving proof screenshots (bot must be admin)
    pub proof_channel_id: i64,

    /// Storage channel where uploaded media is persisted
    pub store_channel_id: i64,

    /// Channel receiving operational notices (new users, redemptions).
    /// None disables the notices.
    pub data_channel_id: Option<i64>,

    /// Channel membership required before redeeming codes
    pub force_join_channel_id: i64,

    /// Invite link shown to users who have not joined yet
    pub force_join_link: String,

    /// Base of generated share links, e.g. "https://t.me/MyBot"
    pub link_base: String,
}

/// Snapshot storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the persisted entity collections
    pub data_dir: PathBuf,
}

/// Access-control configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessConfig {
    /// Admins that can never be demoted; implicitly part of the admin set
    pub main_admins: Vec<i64>,

    /// Categories offered when none have been persisted yet
    pub default_categories: Vec<String>,

    /// Generated share/redeem code length
    pub code_length: usize,

    /// How long a proof submission window stays open after opt-in
    #[serde(with = "humantime_serde")]
    pub proof_ttl: Duration,

    /// Maximum entries shown per kind by the owned-uploads listing
    pub listing_limit: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Enable JSON formatting
    pub json_format: bool,

    /// Include target module
    pub with_target: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            channels: ChannelsConfig::default(),
            storage: StorageConfig::default(),
            access: AccessConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ChannelsConfig {
    fn default() -> Self {
        Self {
            proof_channel_id: 0,
            store_channel_id: 0,
            data_channel_id: None,
            force_join_channel_id: 0,
            force_join_link: String::new(),
            link_base: "https://t.me/YourBot".to_string(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
        }
    }
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            main_admins: vec![],
            default_categories: vec![
                "Movies".to_string(),
                "Tools".to_string(),
                "Premium".to_string(),
                "Netflix".to_string(),
                "Amazon Prime".to_string(),
                "Crunchyroll".to_string(),
                "Redeem Code".to_string(),
            ],
            code_length: 10,
            proof_ttl: Duration::from_secs(600),
            listing_limit: 20,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            with_target: true,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Environment variables follow the pattern: DROPGATE_<SECTION>_<KEY>
    /// Example: DROPGATE_CHANNELS_PROOF_CHANNEL_ID=-1001234567890
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        // Channel config
        if let Ok(id) = env::var("DROPGATE_CHANNELS_PROOF_CHANNEL_ID") {
            config.channels.proof_channel_id = id
                .parse()
                .map_err(|e| ConfigError::InvalidValue(format!("Invalid proof channel: {}", e)))?;
        }
        if let Ok(id) = env::var("DROPGATE_CHANNELS_STORE_CHANNEL_ID") {
            config.channels.store_channel_id = id
                .parse()
                .map_err(|e| ConfigError::InvalidValue(format!("Invalid store channel: {}", e)))?;
        }
        if let Ok(id) = env::var("DROPGATE_CHANNELS_DATA_CHANNEL_ID") {
            config.channels.data_channel_id = Some(id.parse().map_err(|e| {
                ConfigError::InvalidValue(format!("Invalid data channel: {}", e))
            })?);
        }
        if let Ok(id) = env::var("DROPGATE_CHANNELS_FORCE_JOIN_CHANNEL_ID") {
            config.channels.force_join_channel_id = id.parse().map_err(|e| {
                ConfigError::InvalidValue(format!("Invalid force-join channel: {}", e))
            })?;
        }
        if let Ok(link) = env::var("DROPGATE_CHANNELS_FORCE_JOIN_LINK") {
            config.channels.force_join_link = link;
        }
        if let Ok(base) = env::var("DROPGATE_CHANNELS_LINK_BASE") {
            config.channels.link_base = base;
        }

        // Storage config
        if let Ok(data_dir) = env::var("DROPGATE_STORAGE_DATA_DIR") {
            config.storage.data_dir = PathBuf::from(data_dir);
        }

        // Access config
        if let Ok(admins) = env::var("DROPGATE_ACCESS_MAIN_ADMINS") {
            config.access.main_admins = admins
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .map(|s| {
                    s.trim().parse().map_err(|e| {
                        ConfigError::InvalidValue(format!("Invalid main admin id: {}", e))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
        }
        if let Ok(len) = env::var("DROPGATE_ACCESS_CODE_LENGTH") {
            config.access.code_length = len
                .parse()
                .map_err(|e| ConfigError::InvalidValue(format!("Invalid code length: {}", e)))?;
        }

        // Logging config
        if let Ok(level) = env::var("DROPGATE_LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Ok(json) = env::var("DROPGATE_LOG_JSON") {
            config.logging.json_format = json
                .parse()
                .map_err(|e| ConfigError::InvalidValue(format!("Invalid JSON flag: {}", e)))?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigError::FileReadError(e.to_string()))?;

        let config: Self =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.access.code_length < 4 {
            return Err(ConfigError::ValidationFailed(
                "code_length must be at least 4".to_string(),
            ));
        }

        if self.access.proof_ttl.is_zero() {
            return Err(ConfigError::ValidationFailed(
                "proof_ttl must be greater than zero".to_string(),
            ));
        }

        if self.access.listing_limit == 0 {
            return Err(ConfigError::ValidationFailed(
                "listing_limit must be greater than 0".to_string(),
            ));
        }

        if self.access.default_categories.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "default_categories must not be empty".to_string(),
            ));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::ValidationFailed(format!(
                "Invalid log level: {}",
                self.logging.level
            )));
        }

        Ok(())
    }

    /// Save configuration to file
    pub fn save_to_file(&self, path: impl AsRef<std::path::Path>) -> Result<(), ConfigError> {
        let contents =
            toml::to_string_pretty(self).map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, contents).map_err(|e| ConfigError::FileWriteError(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.access.code_length, 10);
        assert_eq!(config.access.proof_ttl, Duration::from_secs(600));
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        config.access.code_length = 2;
        assert!(config.validate().is_err());

        config = Config::default();
        config.access.proof_ttl = Duration::ZERO;
        assert!(config.validate().is_err());

        config = Config::default();
        config.access.default_categories.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_log_level_validation() {
        let mut config = Config::default();

        config.logging.level = "invalid".to_string();
        assert!(config.validate().is_err());

        config.logging.level = "debug".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dropgate.toml");

        let mut config = Config::default();
        config.channels.proof_channel_id = -100123;
        config.access.main_admins = vec![7, 11];
        config.save_to_file(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.channels.proof_channel_id, -100123);
        assert_eq!(loaded.access.main_admins, vec![7, 11]);
    }
}
