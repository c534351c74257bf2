//! Slot manifest: the durable record of generated media variants
//!
//! One manifest exists per media kind (images, videos). It maps slot names
//! (named placements on the site such as `hero` or `services/ai`) to the
//! variants generated for them and the variant currently selected for
//! production.
//!
//! ## On-disk format
//!
//! ```json
//! {
//!   "version": "1.0",
//!   "lastUpdated": "2025-01-12T10:00:00Z",
//!   "revision": 4,
//!   "slots": {
//!     "hero": {
//!       "slot": "hero",
//!       "prompt": "Abstract gradient mesh",
//!       "model": "gemini-2.5-flash-image",
//!       "aspect": "16:9",
//!       "createdAt": "2025-01-10T09:00:00Z",
//!       "updatedAt": "2025-01-12T10:00:00Z",
//!       "files": [
//!         { "filename": "hero-001.png", "path": "/generated/images/hero/hero-001.png", "generatedAt": "2025-01-10T09:00:00Z" }
//!       ],
//!       "selected": "hero-001.png"
//!     }
//!   }
//! }
//! ```
//!
//! `revision` is an optimistic-concurrency counter checked on every save
//! (see [`ManifestStore::save`]). Files written without it load as revision 0.

pub mod error;
pub mod naming;
pub mod store;
mod validation;

pub use error::{ManifestError, Result};
pub use store::{FileBackend, ManifestBackend, ManifestStore, MemoryBackend};
pub use validation::ManifestValidationError;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Format tag written into every manifest
pub const MANIFEST_VERSION: &str = "1.0";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseMediaError {
    #[error("unknown media kind '{0}', expected 'image' or 'video'")]
    Kind(String),

    #[error("unknown aspect ratio '{0}', expected one of 16:9, 4:3, 1:1, 9:16")]
    Aspect(String),

    #[error("unsupported clip duration '{0}', expected 5, 6 or 8 seconds")]
    Duration(String),
}

/// Media kind; each kind has its own manifest file and output directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }

    /// File extension of generated artifacts
    pub fn extension(&self) -> &'static str {
        match self {
            MediaKind::Image => "png",
            MediaKind::Video => "mp4",
        }
    }

    /// Aspect ratios the generation backend accepts for this kind
    pub fn allowed_aspects(&self) -> &'static [AspectRatio] {
        match self {
            MediaKind::Image => &[
                AspectRatio::Landscape,
                AspectRatio::Standard,
                AspectRatio::Square,
                AspectRatio::Portrait,
            ],
            MediaKind::Video => &[AspectRatio::Landscape, AspectRatio::Portrait],
        }
    }

    pub fn allows(&self, aspect: AspectRatio) -> bool {
        self.allowed_aspects().contains(&aspect)
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaKind {
    type Err = ParseMediaError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "image" | "images" => Ok(MediaKind::Image),
            "video" | "videos" => Ok(MediaKind::Video),
            _ => Err(ParseMediaError::Kind(s.to_string())),
        }
    }
}

/// Aspect ratio tag stored on a slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum AspectRatio {
    #[serde(rename = "16:9")]
    Landscape,
    #[serde(rename = "4:3")]
    Standard,
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "9:16")]
    Portrait,
}

impl AspectRatio {
    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Landscape => "16:9",
            AspectRatio::Standard => "4:3",
            AspectRatio::Square => "1:1",
            AspectRatio::Portrait => "9:16",
        }
    }

    /// Instruction appended to image prompts; the image API has no aspect parameter
    pub fn prompt_hint(&self) -> &'static str {
        match self {
            AspectRatio::Landscape => "Wide landscape composition, 16:9 aspect ratio.",
            AspectRatio::Standard => "Landscape composition, 4:3 aspect ratio.",
            AspectRatio::Square => "Square composition, 1:1 aspect ratio.",
            AspectRatio::Portrait => "Tall portrait composition, 9:16 aspect ratio.",
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AspectRatio {
    type Err = ParseMediaError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "16:9" => Ok(AspectRatio::Landscape),
            "4:3" => Ok(AspectRatio::Standard),
            "1:1" => Ok(AspectRatio::Square),
            "9:16" => Ok(AspectRatio::Portrait),
            other => Err(ParseMediaError::Aspect(other.to_string())),
        }
    }
}

/// Video clip length; the backend only renders 5, 6 or 8 second clips
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct ClipSeconds(u8);

impl ClipSeconds {
    pub const ALLOWED: [u8; 3] = [5, 6, 8];
    pub const LONGEST: ClipSeconds = ClipSeconds(8);

    pub fn new(seconds: u8) -> std::result::Result<Self, ParseMediaError> {
        if Self::ALLOWED.contains(&seconds) {
            Ok(Self(seconds))
        } else {
            Err(ParseMediaError::Duration(seconds.to_string()))
        }
    }

    pub fn get(&self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for ClipSeconds {
    type Error = ParseMediaError;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ClipSeconds> for u8 {
    fn from(value: ClipSeconds) -> Self {
        value.0
    }
}

impl FromStr for ClipSeconds {
    type Err = ParseMediaError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let seconds = s
            .trim()
            .trim_end_matches('s')
            .parse::<u8>()
            .map_err(|_| ParseMediaError::Duration(s.to_string()))?;
        Self::new(seconds)
    }
}

impl fmt::Display for ClipSeconds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.0)
    }
}

/// One concrete generated artifact
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedFile {
    pub filename: String,
    pub path: String,
    pub generated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<ClipSeconds>,
}

/// A named placement and its generation history
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Slot {
    pub slot: String,
    pub prompt: String,
    pub model: String,
    pub aspect: AspectRatio,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<ClipSeconds>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub files: Vec<GeneratedFile>,
    #[serde(default)]
    pub selected: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_path: Option<String>,
}

impl Slot {
    pub fn new(name: &str, prompt: &str, model: &str, aspect: AspectRatio) -> Self {
        let now = Utc::now();
        Self {
            slot: name.to_string(),
            prompt: prompt.to_string(),
            model: model.to_string(),
            aspect,
            duration: None,
            created_at: now,
            updated_at: now,
            files: Vec::new(),
            selected: None,
            selected_path: None,
        }
    }

    pub fn index_of(&self, filename: &str) -> Option<usize> {
        self.files.iter().position(|f| f.filename == filename)
    }

    /// File named by `selected`, if the reference is not dangling
    pub fn selected_file(&self) -> Option<&GeneratedFile> {
        self.selected
            .as_deref()
            .and_then(|name| self.files.iter().find(|f| f.filename == name))
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.selected.as_deref().and_then(|name| self.index_of(name))
    }

    /// Number the next variant of this slot receives
    pub fn next_sequence(&self) -> u32 {
        naming::next_sequence(self.files.iter().map(|f| f.filename.as_str()))
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Generation settings applied to a slot when a batch starts
#[derive(Debug, Clone)]
pub struct SlotSettings<'a> {
    pub prompt: &'a str,
    pub model: &'a str,
    pub aspect: AspectRatio,
    pub duration: Option<ClipSeconds>,
    /// When false, an existing slot keeps its canonical prompt
    pub persist_prompt: bool,
}

/// Whole-manifest record for one media kind
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub version: String,
    pub last_updated: DateTime<Utc>,
    #[serde(default)]
    pub revision: u64,
    #[serde(default)]
    pub slots: BTreeMap<String, Slot>,
}

impl Default for Manifest {
    fn default() -> Self {
        Self::new()
    }
}

impl Manifest {
    pub fn new() -> Self {
        Self {
            version: MANIFEST_VERSION.to_string(),
            last_updated: Utc::now(),
            revision: 0,
            slots: BTreeMap::new(),
        }
    }

    pub fn slot(&self, name: &str) -> Option<&Slot> {
        self.slots.get(name)
    }

    pub fn slot_mut(&mut self, name: &str) -> Option<&mut Slot> {
        self.slots.get_mut(name)
    }

    fn require_slot(&mut self, name: &str) -> Result<&mut Slot> {
        self.slots
            .get_mut(name)
            .ok_or_else(|| ManifestError::SlotNotFound(name.to_string()))
    }

    /// Create the slot on first use, otherwise apply the new generation settings
    pub fn ensure_slot(&mut self, name: &str, settings: &SlotSettings<'_>) -> &mut Slot {
        let slot = self
            .slots
            .entry(name.to_string())
            .or_insert_with(|| Slot::new(name, settings.prompt, settings.model, settings.aspect));

        if settings.persist_prompt || slot.prompt.is_empty() {
            slot.prompt = settings.prompt.to_string();
        }
        slot.model = settings.model.to_string();
        slot.aspect = settings.aspect;
        if settings.duration.is_some() {
            slot.duration = settings.duration;
        }
        slot.touch();
        slot
    }

    /// Mark `filename` as the production variant of `slot`
    ///
    /// A promoted `selectedPath` belongs to the previous selection and is cleared.
    pub fn select(&mut self, slot: &str, filename: &str) -> Result<&Slot> {
        let entry = self.require_slot(slot)?;
        if entry.index_of(filename).is_none() {
            return Err(ManifestError::VariantNotFound {
                slot: slot.to_string(),
                filename: filename.to_string(),
            });
        }
        if entry.selected.as_deref() != Some(filename) {
            entry.selected_path = None;
        }
        entry.selected = Some(filename.to_string());
        entry.touch();
        Ok(&*entry)
    }

    /// Remove a variant; a selection pointing at it is cleared, not re-pointed
    pub fn remove_variant(&mut self, slot: &str, filename: &str) -> Result<GeneratedFile> {
        let entry = self.require_slot(slot)?;
        let index = entry
            .index_of(filename)
            .ok_or_else(|| ManifestError::VariantNotFound {
                slot: slot.to_string(),
                filename: filename.to_string(),
            })?;

        let removed = entry.files.remove(index);
        if entry.selected.as_deref() == Some(filename) {
            entry.selected = None;
            entry.selected_path = None;
        }
        entry.touch();
        Ok(removed)
    }

    pub fn set_prompt(&mut self, slot: &str, prompt: &str) -> Result<&Slot> {
        let entry = self.require_slot(slot)?;
        entry.prompt = prompt.to_string();
        entry.touch();
        Ok(&*entry)
    }

    /// Slot names with at least one variant, sorted
    pub fn slots_with_files(&self) -> Vec<&str> {
        self.slots
            .iter()
            .filter(|(_, slot)| !slot.files.is_empty())
            .map(|(name, _)| name.as_str())
            .collect()
    }
}
