//! Operator-side preview and selection workflow
//!
//! A [`PreviewSession`] holds what the staging bar shows: the last fetched
//! manifest, the slot being viewed and a per-slot variant index. It never
//! touches manifest files; every change goes through a [`StagingClient`].
//!
//! Network failures never poison the session. Operations return them (or
//! record them in [`PreviewSession::last_error`]) and leave the previous
//! state in place.

pub mod client;
pub mod navigation;
pub mod session;

pub use client::{HttpStagingClient, StagingClient};
pub use navigation::{
    NavigationStash, SlotMove, SlotNavigator, preview_mode_from_query, preview_url,
    slot_from_query,
};
pub use session::{PreviewSession, SelectionCommand};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("staging server unreachable: {0}")]
    Transport(String),

    /// Staging server answered with an error body
    #[error("staging server rejected request ({status} {code}): {message}")]
    Rejected {
        status: u16,
        code: String,
        message: String,
    },

    #[error("unexpected response from staging server: {0}")]
    Decode(String),

    #[error("manifest not loaded, call refresh first")]
    NotLoaded,

    #[error("unknown slot: {0}")]
    UnknownSlot(String),

    #[error("slot '{0}' has no variants")]
    EmptySlot(String),
}

pub type Result<T> = std::result::Result<T, SessionError>;

/// Movement through a circular sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Next,
    Prev,
}

impl Direction {
    /// Step `index` within `0..len`, wrapping at both ends
    pub fn step(self, index: usize, len: usize) -> usize {
        if len == 0 {
            return 0;
        }
        let index = index.min(len - 1);
        match self {
            Direction::Next => (index + 1) % len,
            Direction::Prev => (index + len - 1) % len,
        }
    }
}
