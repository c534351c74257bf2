//! API utility functions
//!
//! Pure, stateless helpers for request processing, kept out of services.rs
//! so they can be unit tested.

use std::path::{Component, Path, PathBuf};

use crate::api::error::ApiError;
use crate::manifest::MediaKind;

/// Parses and validates Content-Type header for application/json
///
/// Accepts `application/json` with or without a charset parameter and
/// rejects look-alikes such as `application/jsonp` or `text/json`.
pub fn parse_content_type(content_type: &str) -> Result<mime::Mime, ApiError> {
    let media_type: mime::Mime = content_type
        .parse()
        .map_err(|_| ApiError::InvalidPayload(format!("invalid Content-Type: {content_type}")))?;

    if media_type.type_() != mime::APPLICATION || media_type.subtype() != mime::JSON {
        return Err(ApiError::InvalidPayload(format!(
            "Content-Type must be application/json, got: {}/{}",
            media_type.type_(),
            media_type.subtype()
        )));
    }

    Ok(media_type)
}

/// Validates that body size does not exceed the maximum allowed size
pub fn validate_body_size(data: &[u8], max_size: usize) -> Result<(), ApiError> {
    if data.len() > max_size {
        return Err(ApiError::PayloadTooLarge(data.len()));
    }
    Ok(())
}

/// `{kind}` path segment; accepts singular and plural forms
pub fn parse_kind(kind: &str) -> Result<MediaKind, ApiError> {
    kind.parse()
        .map_err(|_| ApiError::UnknownKind(kind.to_string()))
}

/// Disk location of a public variant path below `public_dir`
///
/// Returns `None` for paths that would escape the public directory.
pub fn artifact_disk_path(public_dir: &Path, public_path: &str) -> Option<PathBuf> {
    let relative = Path::new(public_path.trim_start_matches('/'));
    let safe = relative
        .components()
        .all(|component| matches!(component, Component::Normal(_)));
    if !safe || relative.as_os_str().is_empty() {
        return None;
    }
    Some(public_dir.join(relative))
}
