use thiserror::Error;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored manifest exists but is not valid JSON of the expected shape
    #[error("Corrupt manifest at {location}: {reason}")]
    Corrupt { location: String, reason: String },

    #[error("Manifest was modified concurrently (loaded revision {expected}, stored revision {found})")]
    ConcurrentModification { expected: u64, found: u64 },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Slot not found: {0}")]
    SlotNotFound(String),

    #[error("Variant '{filename}' not found in slot '{slot}'")]
    VariantNotFound { slot: String, filename: String },

    /// Blocking manifest task panicked or was cancelled
    #[error("Manifest task failed: {0}")]
    Task(String),
}

pub type Result<T> = std::result::Result<T, ManifestError>;
