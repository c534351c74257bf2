use super::models::Config;
use config::{ConfigError, Environment, File};
use std::env;
use std::path::PathBuf;

const CONFIG_ENV_VAR: &str = "MEDIASLOTS_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/mediaslots.toml";
const ENV_PREFIX: &str = "MEDIASLOTS";
const ENV_SEPARATOR: &str = "__";
const API_KEY_VARS: [&str; 2] = ["GEMINI_API_KEY", "GOOGLE_API_KEY"];

/// Load configuration from multiple sources with priority:
/// 1. Defaults (embedded in structs)
/// 2. TOML file (explicit path, `MEDIASLOTS_CONFIG`, or the default path)
/// 3. Environment variables from .env file (via dotenvy)
/// 4. System environment variables (highest priority)
pub fn load(explicit_path: Option<PathBuf>) -> Result<Config, ConfigError> {
    // Load .env file if it exists (ignore errors if file doesn't exist)
    let _ = dotenvy::dotenv();

    let config_path = explicit_path.unwrap_or_else(|| {
        env::var(CONFIG_ENV_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
    });

    let mut config = load_from_sources(config_path)?;
    load_secrets(&mut config);

    Ok(config)
}

/// Secrets are never stored in TOML files, only in environment
fn load_secrets(config: &mut Config) {
    config.api.api_key = API_KEY_VARS
        .iter()
        .filter_map(|name| env::var(name).ok())
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty());
}

/// Load configuration from a specific path and environment
pub fn load_from_sources(config_path: PathBuf) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();

    if config_path.exists() {
        tracing::info!("Loading configuration from: {}", config_path.display());
        builder = builder.add_source(File::from(config_path).required(false));
    } else {
        tracing::debug!(
            "Configuration file not found at {}, using defaults and environment overrides",
            config_path.display()
        );
    }

    // MEDIASLOTS__VIDEO__POLL_TIMEOUT_SECS -> video.poll_timeout_secs
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator(ENV_SEPARATOR)
            .separator(ENV_SEPARATOR)
            .try_parsing(true),
    );

    let config = builder.build()?;
    config.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Environment as AppEnvironment;
    use crate::manifest::AspectRatio;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_defaults_only() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nonexistent.toml");

        let config = load_from_sources(config_path).unwrap();
        assert_eq!(config.staging.bind_addr.to_string(), "127.0.0.1:4400");
        assert_eq!(config.image.default_count, 3);
    }

    #[test]
    fn test_load_from_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
environment = "production"

[paths]
public_dir = "site/public"

[api]
max_download_bytes = "50MB"

[image]
default_count = 4
default_aspect = "1:1"

[video]
default_duration = 6
poll_interval_secs = 5
poll_timeout_secs = 60

[staging]
bind_addr = "127.0.0.1:9000"

[staging.slot_pages]
hero = "/"
"services/ai" = "/services/ai"
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = load_from_sources(config_path).unwrap();
        assert_eq!(config.environment, AppEnvironment::Production);
        assert_eq!(config.paths.public_dir, PathBuf::from("site/public"));
        assert_eq!(config.api.max_download_bytes.as_u64(), 50 * 1024 * 1024);
        assert_eq!(config.image.default_count, 4);
        assert_eq!(config.image.default_aspect, AspectRatio::Square);
        assert_eq!(config.video.default_duration.get(), 6);
        assert_eq!(config.video.poll_timeout_secs, 60);
        assert_eq!(config.staging.bind_addr.to_string(), "127.0.0.1:9000");
        assert_eq!(config.staging.slot_pages["services/ai"], "/services/ai");
    }

    #[test]
    fn test_rejects_unknown_duration() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");
        fs::write(&config_path, "[video]\ndefault_duration = 7\n").unwrap();

        assert!(load_from_sources(config_path).is_err());
    }

    // Environment overrides are not exercised here: env::set_var is unsafe
    // in edition 2024 and races with other tests.
}
