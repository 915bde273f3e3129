use thiserror::Error;

use crate::core::SlotIndex;

/// Result type for playback operations
pub type PlaybackResult<T> = Result<T, PlaybackError>;

/// Failures surfaced to the listener. None of them crash the session; the
/// engine returns to `Idle` and waits for the next explicit play.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlaybackError {
    /// The delivery request failed or the response was unusable
    #[error("Clip delivery failed: {0}")]
    DeliveryFailure(String),

    /// The server kept returning the slot that just played
    #[error("Received slot {slot} again after {attempts} attempts")]
    DuplicateClip { slot: SlotIndex, attempts: u32 },

    /// Decoding or audio allocation failed
    #[error("Playback resource error: {0}")]
    PlaybackResource(String),

    /// The engine task has stopped
    #[error("Playback session is closed")]
    SessionClosed,
}

impl From<reqwest::Error> for PlaybackError {
    fn from(err: reqwest::Error) -> Self {
        PlaybackError::DeliveryFailure(err.to_string())
    }
}
