//! Engine configuration.
//!
//! Sources, highest priority first:
//! 1. Environment variables (`PREREQ_*`)
//! 2. A YAML file passed with `--config`
//! 3. Built-in defaults

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::prerequisite::DEFAULT_CACHE_EXPIRY_MS;

pub const ENV_CACHE_EXPIRY_MS: &str = "PREREQ_CACHE_EXPIRY_MS";
pub const ENV_CACHE_ENABLED: &str = "PREREQ_CACHE_ENABLED";
pub const ENV_FAIL_FAST: &str = "PREREQ_FAIL_FAST";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid value '{value}' for {key}")]
    Invalid { key: String, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EngineConfig {
    pub cache: CacheConfig,
    pub runner: RunnerConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Whether cacheable dependencies may reuse earlier passes.
    pub enabled: bool,
    /// Expiry used when a caller does not name one.
    pub default_expiry_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_expiry_ms: DEFAULT_CACHE_EXPIRY_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RunnerConfig {
    /// Stop scheduling tests after the first failure.
    pub fail_fast: bool,
}

impl EngineConfig {
    /// Load from an optional YAML file, then apply environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed, or an
    /// override holds an unparseable value.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load a YAML file without consulting the environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] or [`ConfigError::Parse`].
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    /// Parse YAML content. An empty document yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed YAML.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Apply `PREREQ_*` overrides read through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for values that do not parse.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(value) = lookup(ENV_CACHE_EXPIRY_MS) {
            self.cache.default_expiry_ms = value
                .trim()
                .parse()
                .map_err(|_| invalid(ENV_CACHE_EXPIRY_MS, &value))?;
        }
        if let Some(value) = lookup(ENV_CACHE_ENABLED) {
            self.cache.enabled = parse_flag(ENV_CACHE_ENABLED, &value)?;
        }
        if let Some(value) = lookup(ENV_FAIL_FAST) {
            self.runner.fail_fast = parse_flag(ENV_FAIL_FAST, &value)?;
        }
        Ok(())
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(key, value)),
    }
}

fn invalid(key: &str, value: &str) -> ConfigError {
    ConfigError::Invalid {
        key: key.to_owned(),
        value: value.to_owned(),
    }
}
