//! Logging subsystem for PadLink
//!
//! Thin setup layer over `tracing-subscriber`. `RUST_LOG` replaces the
//! configured filter entirely when it is set.

use crate::config::LoggingConfig;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

mod error;
mod level;

pub use error::LoggingError;
pub use level::LogLevel;

/// How the global subscriber is assembled
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub level: LogLevel,
    /// Per-target overrides such as `padlink_core::loopback=warn`
    pub directives: Vec<String>,
    pub with_timestamp: bool,
    pub with_target: bool,
    pub json_format: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            directives: Vec::new(),
            with_timestamp: true,
            with_target: true,
            json_format: false,
        }
    }
}

impl LogConfig {
    pub fn new(level: LogLevel) -> Self {
        Self {
            level,
            ..Default::default()
        }
    }

    pub fn with_timestamp(mut self, enabled: bool) -> Self {
        self.with_timestamp = enabled;
        self
    }

    pub fn with_target(mut self, enabled: bool) -> Self {
        self.with_target = enabled;
        self
    }

    pub fn json_format(mut self, enabled: bool) -> Self {
        self.json_format = enabled;
        self
    }

    /// Override the level for one target
    pub fn target_level(mut self, target: &str, level: LogLevel) -> Self {
        self.directives.push(format!("{}={}", target, level));
        self
    }

    /// Filter used when `RUST_LOG` is not set
    pub fn filter(&self) -> Result<EnvFilter, LoggingError> {
        let mut filter = EnvFilter::new(self.level.as_str());
        for directive in &self.directives {
            let parsed = directive.parse::<Directive>().map_err(|e| {
                LoggingError::InvalidConfiguration(format!(
                    "bad filter directive '{}': {}",
                    directive, e
                ))
            })?;
            filter = filter.add_directive(parsed);
        }
        Ok(filter)
    }
}

impl TryFrom<&LoggingConfig> for LogConfig {
    type Error = LoggingError;

    fn try_from(config: &LoggingConfig) -> Result<Self, Self::Error> {
        Ok(LogConfig::new(config.level.parse()?)
            .with_timestamp(config.with_timestamp)
            .with_target(config.with_target)
            .json_format(config.json_format))
    }
}

/// Install the default subscriber (info, human readable)
pub fn init_logging() -> Result<(), LoggingError> {
    init_logging_with_config(LogConfig::default())
}

/// Install the global subscriber described by `config`
///
/// Fails if a global subscriber is already installed.
///
/// # Example
/// ```
/// use padlink_core::logging::{init_logging_with_config, LogConfig, LogLevel};
///
/// let config = LogConfig::new(LogLevel::Debug)
///     .target_level("padlink_core::loopback", LogLevel::Warn)
///     .with_timestamp(false);
/// init_logging_with_config(config).expect("Failed to initialize logging");
/// ```
pub fn init_logging_with_config(config: LogConfig) -> Result<(), LoggingError> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => config.filter()?,
    };

    let output = match (config.json_format, config.with_timestamp) {
        (true, true) => fmt::layer().json().with_target(config.with_target).boxed(),
        (true, false) => fmt::layer()
            .json()
            .without_time()
            .with_target(config.with_target)
            .boxed(),
        (false, true) => fmt::layer().with_target(config.with_target).boxed(),
        (false, false) => fmt::layer()
            .without_time()
            .with_target(config.with_target)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(output)
        .with(env_filter)
        .try_init()
        .map_err(|e| LoggingError::InitializationFailed(e.to_string()))
}
