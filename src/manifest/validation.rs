use std::collections::HashSet;
use thiserror::Error;
use tracing::warn;

use super::{MANIFEST_VERSION, Manifest, MediaKind};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ManifestValidationError {
    #[error("unsupported manifest version '{0}', expected '1.0'")]
    UnsupportedVersion(String),
    #[error("slot key '{key}' does not match its slot field '{slot}'")]
    SlotKeyMismatch { key: String, slot: String },
    #[error("slot name must not be empty")]
    EmptySlotName,
    #[error("slot '{slot}' uses aspect {aspect}, which {kind} generation does not support")]
    UnsupportedAspect {
        slot: String,
        aspect: String,
        kind: MediaKind,
    },
    #[error("video slot '{0}' is missing its clip duration")]
    MissingDuration(String),
    #[error("slot '{slot}' lists '{filename}' more than once")]
    DuplicateFilename { slot: String, filename: String },
    #[error("slot '{0}' has a file entry without filename or path")]
    IncompleteFile(String),
}

/// Validate a decoded manifest against the rules serde alone cannot express
///
/// A dangling `selected` reference is reported but accepted; resolvers fall
/// through it and deletion is the only operation that repairs it.
pub fn validate(manifest: &Manifest, kind: MediaKind) -> Result<(), ManifestValidationError> {
    if manifest.version != MANIFEST_VERSION {
        return Err(ManifestValidationError::UnsupportedVersion(
            manifest.version.clone(),
        ));
    }

    for (key, slot) in &manifest.slots {
        if key.is_empty() {
            return Err(ManifestValidationError::EmptySlotName);
        }

        if key != &slot.slot {
            return Err(ManifestValidationError::SlotKeyMismatch {
                key: key.clone(),
                slot: slot.slot.clone(),
            });
        }

        if !kind.allows(slot.aspect) {
            return Err(ManifestValidationError::UnsupportedAspect {
                slot: key.clone(),
                aspect: slot.aspect.to_string(),
                kind,
            });
        }

        if kind == MediaKind::Video && slot.duration.is_none() {
            return Err(ManifestValidationError::MissingDuration(key.clone()));
        }

        let mut seen = HashSet::new();
        for file in &slot.files {
            if file.filename.is_empty() || file.path.is_empty() {
                return Err(ManifestValidationError::IncompleteFile(key.clone()));
            }
            if !seen.insert(file.filename.as_str()) {
                return Err(ManifestValidationError::DuplicateFilename {
                    slot: key.clone(),
                    filename: file.filename.clone(),
                });
            }
        }

        if let Some(selected) = &slot.selected {
            if !seen.contains(selected.as_str()) {
                warn!(slot = %key, selected = %selected, "Selected variant is not among the slot's files");
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{AspectRatio, ClipSeconds, GeneratedFile, Slot};
    use chrono::Utc;

    fn sample_manifest() -> Manifest {
        let mut manifest = Manifest::new();
        let mut slot = Slot::new("hero", "prompt", "model", AspectRatio::Landscape);
        slot.files.push(GeneratedFile {
            filename: "hero-001.png".to_string(),
            path: "/generated/images/hero/hero-001.png".to_string(),
            generated_at: Utc::now(),
            duration_seconds: None,
        });
        slot.selected = Some("hero-001.png".to_string());
        manifest.slots.insert("hero".to_string(), slot);
        manifest
    }

    #[test]
    fn test_valid_manifest() {
        assert!(validate(&sample_manifest(), MediaKind::Image).is_ok());
    }

    #[test]
    fn test_rejects_bad_version() {
        let mut manifest = sample_manifest();
        manifest.version = "2.0".to_string();
        assert!(matches!(
            validate(&manifest, MediaKind::Image),
            Err(ManifestValidationError::UnsupportedVersion(_))
        ));
    }

    #[test]
    fn test_rejects_key_mismatch() {
        let mut manifest = sample_manifest();
        manifest.slots.get_mut("hero").unwrap().slot = "banner".to_string();
        assert!(matches!(
            validate(&manifest, MediaKind::Image),
            Err(ManifestValidationError::SlotKeyMismatch { .. })
        ));
    }

    #[test]
    fn test_rejects_duplicate_filenames() {
        let mut manifest = sample_manifest();
        let slot = manifest.slots.get_mut("hero").unwrap();
        let dup = slot.files[0].clone();
        slot.files.push(dup);
        assert!(matches!(
            validate(&manifest, MediaKind::Image),
            Err(ManifestValidationError::DuplicateFilename { .. })
        ));
    }

    #[test]
    fn test_video_rules() {
        let mut manifest = sample_manifest();
        assert!(matches!(
            validate(&manifest, MediaKind::Video),
            Err(ManifestValidationError::MissingDuration(_))
        ));

        let slot = manifest.slots.get_mut("hero").unwrap();
        slot.duration = Some(ClipSeconds::new(8).unwrap());
        assert!(validate(&manifest, MediaKind::Video).is_ok());

        manifest.slots.get_mut("hero").unwrap().aspect = AspectRatio::Square;
        assert!(matches!(
            validate(&manifest, MediaKind::Video),
            Err(ManifestValidationError::UnsupportedAspect { .. })
        ));
    }

    #[test]
    fn test_dangling_selection_is_accepted() {
        let mut manifest = sample_manifest();
        manifest.slots.get_mut("hero").unwrap().selected = Some("gone.png".to_string());
        assert!(validate(&manifest, MediaKind::Image).is_ok());
    }
}
