//! Configuration management for mediaslots
//!
//! This module provides a layered configuration system that loads settings from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use mediaslots::config::Config;
//!
//! let config = Config::load().expect("Failed to load configuration");
//! println!("Staging server on: {}", config.staging.bind_addr);
//! ```
//!
//! # Environment Variables
//!
//! Configuration can be overridden using environment variables with the pattern:
//! `MEDIASLOTS__<section>__<key>`
//!
//! Examples:
//! - `MEDIASLOTS__ENVIRONMENT=production`
//! - `MEDIASLOTS__STAGING__BIND_ADDR=0.0.0.0:4400`
//! - `MEDIASLOTS__VIDEO__POLL_TIMEOUT_SECS=600`
//!
//! The generation API key is a secret and only read from `GEMINI_API_KEY`
//! (or `GOOGLE_API_KEY`).
//!
//! # Configuration File
//!
//! By default, the configuration is loaded from `config/mediaslots.toml`.
//! This can be overridden using the `MEDIASLOTS_CONFIG` environment variable
//! or the `--config` flag.

mod models;
mod sources;
mod validation;

pub use crate::humanize::ByteSize;
pub use models::{
    ApiConfig, Config, Environment, ImageConfig, KindSettings, PathsConfig, StagingConfig,
    VideoConfig,
};
pub use validation::ValidationError;

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),

    #[error("Missing API credential: set GEMINI_API_KEY (or GOOGLE_API_KEY)")]
    MissingApiKey,
}

impl Config {
    /// Load configuration from all sources (file + environment)
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file is malformed or validation fails.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(None)
    }

    /// Load configuration, preferring `path` over `MEDIASLOTS_CONFIG`
    pub fn load_with(path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let config = sources::load(path)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path, without reading secrets
    ///
    /// Useful for testing with custom configuration files.
    pub fn load_from_path(path: PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// API key, required before any generation work starts
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.api
            .api_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .ok_or(ConfigError::MissingApiKey)
    }
}
