//! Configuration management for PadLink
//!
//! Configuration comes from defaults, a TOML file, or environment variables,
//! and is validated before use.

use crate::logging::LogLevel;
use crate::session::ActivityDescriptor;
use crate::transport::DeliveryMode;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

mod error;

pub use error::ConfigError;

/// Main application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Activity advertised to the call framework
    pub activity: ActivityConfig,

    /// Session coordinator behavior
    pub session: SessionSettings,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Activity configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityConfig {
    /// Reverse-DNS activity identifier
    pub identifier: String,

    /// Title shown to other participants
    pub title: String,

    /// Optional subtitle
    pub subtitle: Option<String>,
}

/// Session coordinator settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Delivery guarantee requested from the session messenger
    pub delivery_mode: DeliveryMode,

    /// Drop inbound envelopes that are not newer than the latest accepted one
    pub reject_stale_messages: bool,

    /// Send a version announcement after joining a session
    pub announce_version: bool,

    /// Upper bound on a single activation request
    #[serde(with = "humantime_serde")]
    pub activation_timeout: Duration,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Enable JSON formatting
    pub json_format: bool,

    /// Include timestamps
    pub with_timestamp: bool,

    /// Include target module
    pub with_target: bool,
}

impl Default for ActivityConfig {
    fn default() -> Self {
        Self {
            identifier: "net.padlink.controller".to_string(),
            title: "PadLink".to_string(),
            subtitle: Some("Send game controller events over a call.".to_string()),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            delivery_mode: DeliveryMode::Reliable,
            reject_stale_messages: false,
            announce_version: false,
            activation_timeout: Duration::from_secs(10),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            with_timestamp: true,
            with_target: true,
        }
    }
}

impl ActivityConfig {
    /// Activity descriptor handed to the session coordinator
    pub fn descriptor(&self) -> ActivityDescriptor {
        let descriptor = ActivityDescriptor::new(&self.identifier, &self.title);
        match &self.subtitle {
            Some(subtitle) => descriptor.with_subtitle(subtitle),
            None => descriptor,
        }
    }
}

fn parse_env<T>(key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw.parse().map(Some).map_err(|e: T::Err| ConfigError::InvalidValue {
            key,
            reason: e.to_string(),
        }),
        Err(_) => Ok(None),
    }
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Environment variables follow the pattern: PADLINK_<SECTION>_<KEY>
    /// Example: PADLINK_SESSION_REJECT_STALE_MESSAGES=true
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay environment variables on top of this configuration
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        // Activity config
        if let Ok(identifier) = env::var("PADLINK_ACTIVITY_IDENTIFIER") {
            self.activity.identifier = identifier;
        }
        if let Ok(title) = env::var("PADLINK_ACTIVITY_TITLE") {
            self.activity.title = title;
        }
        if let Ok(subtitle) = env::var("PADLINK_ACTIVITY_SUBTITLE") {
            // An empty value removes the subtitle
            self.activity.subtitle = Some(subtitle).filter(|s| !s.trim().is_empty());
        }

        // Session config
        if let Ok(mode) = env::var("PADLINK_SESSION_DELIVERY_MODE") {
            self.session.delivery_mode = match mode.to_lowercase().as_str() {
                "reliable" => DeliveryMode::Reliable,
                "unreliable" => DeliveryMode::Unreliable,
                other => {
                    return Err(ConfigError::InvalidValue {
                        key: "PADLINK_SESSION_DELIVERY_MODE",
                        reason: format!("unknown delivery mode {}", other),
                    })
                }
            };
        }
        if let Some(reject) = parse_env("PADLINK_SESSION_REJECT_STALE_MESSAGES")? {
            self.session.reject_stale_messages = reject;
        }
        if let Some(announce) = parse_env("PADLINK_SESSION_ANNOUNCE_VERSION")? {
            self.session.announce_version = announce;
        }
        if let Ok(timeout) = env::var("PADLINK_SESSION_ACTIVATION_TIMEOUT") {
            self.session.activation_timeout = humantime_serde::re::humantime::parse_duration(&timeout)
                .map_err(|e| ConfigError::InvalidValue {
                    key: "PADLINK_SESSION_ACTIVATION_TIMEOUT",
                    reason: e.to_string(),
                })?;
        }

        // Logging config
        if let Ok(level) = env::var("PADLINK_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(json) = parse_env("PADLINK_LOG_JSON")? {
            self.logging.json_format = json;
        }

        Ok(())
    }

    /// Load configuration from file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Self = toml::from_str(&contents)?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Validate activity config
        let identifier = self.activity.identifier.trim();
        if identifier.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "activity identifier must not be empty".to_string(),
            ));
        }
        if identifier.contains(char::is_whitespace) {
            return Err(ConfigError::ValidationFailed(format!(
                "activity identifier must not contain whitespace: {}",
                identifier
            )));
        }
        if self.activity.title.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "activity title must not be empty".to_string(),
            ));
        }

        // Validate session config
        if self.session.activation_timeout.is_zero() {
            return Err(ConfigError::ValidationFailed(
                "activation_timeout must be greater than 0".to_string(),
            ));
        }

        // Validate logging config
        if self.logging.level.parse::<LogLevel>().is_err() {
            return Err(ConfigError::ValidationFailed(format!(
                "Invalid log level: {}",
                self.logging.level
            )));
        }

        Ok(())
    }

    /// Save configuration to file
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let contents = toml::to_string_pretty(self)?;

        std::fs::write(path, contents).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.session.delivery_mode, DeliveryMode::Reliable);
        assert!(!config.session.reject_stale_messages);
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();

        config.activity.identifier = "  ".to_string();
        assert!(config.validate().is_err());

        config = Config::default();
        config.activity.identifier = "net.padlink bad".to_string();
        assert!(config.validate().is_err());

        config = Config::default();
        config.activity.title = String::new();
        assert!(config.validate().is_err());

        config = Config::default();
        config.session.activation_timeout = Duration::ZERO;
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
    fn test_save_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("padlink.toml");

        let mut config = Config::default();
        config.session.reject_stale_messages = true;
        config.session.activation_timeout = Duration::from_millis(2500);
        config.activity.subtitle = None;
        config.save_to_file(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_human_written_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("padlink.toml");
        std::fs::write(
            &path,
            r#"
[activity]
identifier = "com.example.pads"
title = "Pads"

[session]
delivery_mode = "unreliable"
reject_stale_messages = true
announce_version = true
activation_timeout = "3s"

[logging]
level = "debug"
json_format = true
with_timestamp = false
with_target = false
"#,
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.activity.descriptor().identifier, "com.example.pads");
        assert_eq!(config.activity.subtitle, None);
        assert_eq!(config.session.delivery_mode, DeliveryMode::Unreliable);
        assert_eq!(config.session.activation_timeout, Duration::from_secs(3));
        assert!(config.session.announce_version);
        assert!(config.logging.json_format);
    }

    #[test]
    fn test_subtitle_from_env() {
        // No other test reads this variable.
        let mut config = Config::default();
        env::set_var("PADLINK_ACTIVITY_SUBTITLE", "Couch co-op over a call");
        let applied = config.apply_env();
        let overridden = config.activity.descriptor();

        env::set_var("PADLINK_ACTIVITY_SUBTITLE", "");
        let cleared = config.apply_env().map(|_| config.activity.subtitle.clone());
        env::remove_var("PADLINK_ACTIVITY_SUBTITLE");

        assert!(applied.is_ok());
        assert_eq!(overridden.subtitle.as_deref(), Some("Couch co-op over a call"));
        assert_eq!(overridden.title, Config::default().activity.title);
        assert_eq!(cleared.unwrap(), None);
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let err = Config::from_file("/nonexistent/padlink.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_invalid_file_is_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "[session\nbroken").unwrap();

        let err = Config::from_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
