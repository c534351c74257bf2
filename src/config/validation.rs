use super::models::Config;
use crate::manifest::MediaKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{kind} default aspect {aspect} is not supported for {kind} generation")]
    UnsupportedDefaultAspect { kind: MediaKind, aspect: String },

    #[error("{field} must be at least 1")]
    ZeroCount { field: &'static str },

    #[error("video.poll_interval_secs must be positive")]
    ZeroPollInterval,

    #[error("video.poll_timeout_secs ({timeout}) must be at least poll_interval_secs ({interval})")]
    TimeoutShorterThanInterval { timeout: u64, interval: u64 },

    #[error("{field} must be positive")]
    ZeroByteLimit { field: &'static str },

    #[error("page route '{route}' for slot '{slot}' must start with '/'")]
    InvalidPageRoute { slot: String, route: String },

    #[error("api.base_url must be an http(s) URL, got '{0}'")]
    InvalidBaseUrl(String),

    #[error("{field} must not be empty")]
    EmptyValue { field: &'static str },
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_api(config)?;
    validate_kinds(config)?;
    validate_poll_policy(config)?;
    validate_staging(config)?;
    Ok(())
}

fn validate_api(config: &Config) -> Result<(), ValidationError> {
    let base = &config.api.base_url;
    if !base.starts_with("http://") && !base.starts_with("https://") {
        return Err(ValidationError::InvalidBaseUrl(base.clone()));
    }

    if config.api.max_download_bytes.as_u64() == 0 {
        return Err(ValidationError::ZeroByteLimit {
            field: "api.max_download_bytes",
        });
    }

    Ok(())
}

/// Defaults must fall inside each kind's closed enumerations
fn validate_kinds(config: &Config) -> Result<(), ValidationError> {
    for kind in [MediaKind::Image, MediaKind::Video] {
        let settings = config.kind_settings(kind);

        if !kind.allows(settings.default_aspect) {
            return Err(ValidationError::UnsupportedDefaultAspect {
                kind,
                aspect: settings.default_aspect.to_string(),
            });
        }

        if settings.default_count == 0 {
            return Err(ValidationError::ZeroCount {
                field: match kind {
                    MediaKind::Image => "image.default_count",
                    MediaKind::Video => "video.default_count",
                },
            });
        }

        if settings.model.trim().is_empty() {
            return Err(ValidationError::EmptyValue {
                field: match kind {
                    MediaKind::Image => "image.model",
                    MediaKind::Video => "video.model",
                },
            });
        }
    }

    Ok(())
}

fn validate_poll_policy(config: &Config) -> Result<(), ValidationError> {
    let video = &config.video;

    if video.poll_interval_secs == 0 {
        return Err(ValidationError::ZeroPollInterval);
    }

    if video.poll_timeout_secs < video.poll_interval_secs {
        return Err(ValidationError::TimeoutShorterThanInterval {
            timeout: video.poll_timeout_secs,
            interval: video.poll_interval_secs,
        });
    }

    Ok(())
}

fn validate_staging(config: &Config) -> Result<(), ValidationError> {
    if config.staging.max_payload_bytes.as_u64() == 0 {
        return Err(ValidationError::ZeroByteLimit {
            field: "staging.max_payload_bytes",
        });
    }

    for (slot, route) in &config.staging.slot_pages {
        if !route.starts_with('/') {
            return Err(ValidationError::InvalidPageRoute {
                slot: slot.clone(),
                route: route.clone(),
            });
        }
    }

    Ok(())
}
