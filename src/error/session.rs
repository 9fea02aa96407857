// Session lifecycle error types

use log::error;
use std::fmt;

use super::AudioError;

/// Log a session error with structured context
pub fn log_session_error(err: &SessionError, context: &str) {
    error!(
        "Session error in {}: component=TrainerHandle, message={}",
        context, err
    );
}

/// Session-related errors
///
/// Precondition violations fail a `start()` fast, before any state is
/// mutated. Lifecycle errors report misuse of the handle. Audio errors are
/// wrapped when an output operation fails during start or stop.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionError {
    /// BPM value is invalid (must be > 0)
    BpmInvalid { bpm: u32 },

    /// Slot count is invalid (must be >= 1)
    SlotCountInvalid { slots: usize },

    /// Slot index is outside the current sequence
    SlotIndexOutOfRange { index: usize, len: usize },

    /// Click assets are not loaded; playback cannot start
    ClickAssetsMissing,

    /// No session is running
    NotRunning,

    /// Mutex was poisoned
    LockPoisoned { component: String },

    /// An output operation failed
    Audio(AudioError),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::BpmInvalid { bpm } => {
                write!(f, "BPM must be greater than 0 (got {})", bpm)
            }
            SessionError::SlotCountInvalid { slots } => {
                write!(f, "Slot count must be at least 1 (got {})", slots)
            }
            SessionError::SlotIndexOutOfRange { index, len } => {
                write!(f, "Slot index {} out of range (sequence length {})", index, len)
            }
            SessionError::ClickAssetsMissing => {
                write!(f, "Click assets not loaded; refusing to start playback")
            }
            SessionError::NotRunning => {
                write!(f, "No session running. Call start() first.")
            }
            SessionError::LockPoisoned { component } => {
                write!(f, "Lock poisoned on {}", component)
            }
            SessionError::Audio(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionError::Audio(err) => Some(err),
            _ => None,
        }
    }
}

impl From<AudioError> for SessionError {
    fn from(err: AudioError) -> Self {
        SessionError::Audio(err)
    }
}
