// src/error.rs
// Player-facing error taxonomy

use crate::api::ApiError;
use thiserror::Error;

/// Errors the lecture view can surface to the viewer.
///
/// `Fetch` and `NotFound` block entry into playback and come with a retry
/// affordance. `Persistence` never blocks anything. `Playback` is shown inline
/// on the video surface while the session keeps running.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlayerError {
    #[error("Could not reach the server: {0}")]
    Fetch(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Progress could not be saved: {0}")]
    Persistence(String),

    #[error("Video failed to load: {0}")]
    Playback(String),
}

impl PlayerError {
    /// Map an API failure raised while fetching catalog data.
    pub fn from_fetch(err: ApiError) -> Self {
        match err {
            ApiError::NotFound(what) => PlayerError::NotFound(what),
            other => PlayerError::Fetch(other.to_string()),
        }
    }

    /// Map an API failure raised while reading or writing remote progress.
    pub fn from_persistence(err: ApiError) -> Self {
        PlayerError::Persistence(err.to_string())
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, PlayerError::Fetch(_) | PlayerError::NotFound(_))
    }
}
