//! Migrator configuration
//!
//! Each [`crate::Migrator`] owns its own resolved [`Options`] snapshot. Values
//! come from [`Options::default`], a YAML document or `TARANTOOL_MIGRATOR_*`
//! environment variables, and can be overridden field by field before the
//! migrator is built.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use thiserror::Error;

use crate::backend::Mode;

/// Default name of the tracking space
pub const DEFAULT_MIGRATIONS_SPACE: &str = "migrations";

const ENV_PREFIX: &str = "TARANTOOL_MIGRATOR_";

static SPACE_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("space name pattern is valid")
});

/// Configuration error type
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for field '{field}': '{value}'. Expected: {expected}")]
    InvalidValue {
        field: String,
        value: String,
        expected: String,
    },

    #[error("Configuration validation failed: {message}")]
    ValidationFailed { message: String },

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl ConfigError {
    /// Create an invalid value error
    pub fn invalid_value(
        field: impl Into<String>,
        value: impl Into<String>,
        expected: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            field: field.into(),
            value: value.into(),
            expected: expected.into(),
        }
    }

    /// Create a validation failed error
    pub fn validation_failed(message: impl Into<String>) -> Self {
        Self::ValidationFailed {
            message: message.into(),
        }
    }
}

/// Verbosity of the migrator's own progress events
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Silent,
    Info,
    Debug,
}

impl FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "silent" | "off" => Ok(LogLevel::Silent),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            _ => Err(ConfigError::invalid_value(
                "log_level",
                s,
                "silent, info, or debug",
            )),
        }
    }
}

/// Options shared by every migration of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Name of the space that tracks applied migrations
    pub migrations_space: String,
    /// Instance addresses; opaque to the migrator, kept for the pool owner
    pub instances: Vec<String>,
    /// Wrap "run function + tracking write" in a backend transaction
    pub transactions_enabled: bool,
    /// Preview mode: nothing is written to the store
    pub dry_run: bool,
    /// Routing hint for tracking-space reads
    pub read_mode: Mode,
    /// Routing hint for migration payloads and tracking-space writes
    pub write_mode: Mode,
    /// Verbosity of progress events
    pub log_level: LogLevel,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            migrations_space: DEFAULT_MIGRATIONS_SPACE.to_string(),
            instances: Vec::new(),
            transactions_enabled: false,
            dry_run: false,
            read_mode: Mode::Any,
            write_mode: Mode::Rw,
            log_level: LogLevel::Info,
        }
    }
}

impl Options {
    /// Load options from `TARANTOOL_MIGRATOR_*` environment variables,
    /// falling back to defaults for unset ones
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Options::default();

        let instances = match env::var(format!("{}INSTANCES", ENV_PREFIX)) {
            Ok(raw) => raw
                .split(',')
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
            Err(_) => defaults.instances,
        };

        Ok(Self {
            migrations_space: env::var(format!("{}SPACE", ENV_PREFIX))
                .unwrap_or(defaults.migrations_space),
            instances,
            transactions_enabled: env_bool("TRANSACTIONS", "transactions_enabled")?
                .unwrap_or(defaults.transactions_enabled),
            dry_run: env_bool("DRY_RUN", "dry_run")?.unwrap_or(defaults.dry_run),
            read_mode: env_mode("READ_MODE", "read_mode")?.unwrap_or(defaults.read_mode),
            write_mode: env_mode("WRITE_MODE", "write_mode")?.unwrap_or(defaults.write_mode),
            log_level: match env::var(format!("{}LOG_LEVEL", ENV_PREFIX)) {
                Ok(raw) => raw.parse()?,
                Err(_) => defaults.log_level,
            },
        })
    }

    /// Parse options from a YAML document; missing keys take their defaults
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Check values that end up interpolated into Lua expressions
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !SPACE_NAME.is_match(&self.migrations_space) {
            return Err(ConfigError::invalid_value(
                "migrations_space",
                &self.migrations_space,
                "a Lua identifier ([A-Za-z_][A-Za-z0-9_]*)",
            ));
        }
        if self.instances.iter().any(|i| i.trim().is_empty()) {
            return Err(ConfigError::validation_failed(
                "instance addresses must not be empty",
            ));
        }
        Ok(())
    }

    /// Set the tracking space name
    pub fn with_migrations_space(mut self, space: impl Into<String>) -> Self {
        self.migrations_space = space.into();
        self
    }

    /// Enable or disable transactional wrapping
    pub fn with_transactions(mut self, enabled: bool) -> Self {
        self.transactions_enabled = enabled;
        self
    }

    /// Enable or disable dry-run mode
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Set the verbosity of progress events
    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }
}

fn env_bool(suffix: &str, field: &str) -> Result<Option<bool>, ConfigError> {
    let Ok(raw) = env::var(format!("{}{}", ENV_PREFIX, suffix)) else {
        return Ok(None);
    };
    match raw.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(Some(true)),
        "0" | "false" | "no" | "off" => Ok(Some(false)),
        _ => Err(ConfigError::invalid_value(field, raw, "true or false")),
    }
}

fn env_mode(suffix: &str, field: &str) -> Result<Option<Mode>, ConfigError> {
    let Ok(raw) = env::var(format!("{}{}", ENV_PREFIX, suffix)) else {
        return Ok(None);
    };
    raw.parse::<Mode>().map(Some).map_err(|_| {
        ConfigError::invalid_value(field, raw, "any, rw, ro, prefer_rw, or prefer_ro")
    })
}
