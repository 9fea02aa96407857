// Audio output error types

use log::error;
use std::fmt;

/// Log an audio error with structured context
///
/// Non-blocking; will not panic on failure. Scheduling-path failures are
/// logged here and then skipped over, so the beat and chord logic keeps
/// running even when the device misbehaves.
pub fn log_audio_error(err: &AudioError, context: &str) {
    error!(
        "Audio error in {}: component=ClickOutput, message={}",
        context, err
    );
}

/// Audio-related errors
///
/// These errors cover click output lifecycle (opening and closing the
/// stream) and click scheduling. Lifecycle errors abort the operation that
/// caused them; scheduling errors are non-fatal to the session.
#[derive(Debug, Clone, PartialEq)]
pub enum AudioError {
    /// Click output is already running
    AlreadyRunning,

    /// Click output is not running
    NotRunning,

    /// No default output device was found
    NoOutputDevice,

    /// Failed to open the output stream
    StreamOpenFailed { reason: String },

    /// Click asset files could not be loaded
    AssetLoadFailed { reason: String },

    /// The device rejected a scheduled click (queue full or output gone)
    ScheduleRejected { reason: String },

    /// Mutex was poisoned
    LockPoisoned { component: String },
}

impl fmt::Display for AudioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AudioError::AlreadyRunning => {
                write!(f, "Click output already running. Call stop() first.")
            }
            AudioError::NotRunning => {
                write!(f, "Click output not running. Call start() first.")
            }
            AudioError::NoOutputDevice => {
                write!(f, "No default audio output device found")
            }
            AudioError::StreamOpenFailed { reason } => {
                write!(f, "Failed to open output stream: {}", reason)
            }
            AudioError::AssetLoadFailed { reason } => {
                write!(f, "Failed to load click assets: {}", reason)
            }
            AudioError::ScheduleRejected { reason } => {
                write!(f, "Click schedule rejected: {}", reason)
            }
            AudioError::LockPoisoned { component } => {
                write!(f, "Lock poisoned on {}", component)
            }
        }
    }
}

impl std::error::Error for AudioError {}

impl From<std::io::Error> for AudioError {
    fn from(err: std::io::Error) -> Self {
        AudioError::AssetLoadFailed {
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_error_messages() {
        let err = AudioError::AlreadyRunning;
        assert!(err.to_string().contains("already running"));

        let err = AudioError::NotRunning;
        assert!(err.to_string().contains("not running"));

        let err = AudioError::StreamOpenFailed {
            reason: "test error".to_string(),
        };
        assert_eq!(err.to_string(), "Failed to open output stream: test error");

        let err = AudioError::ScheduleRejected {
            reason: "queue full".to_string(),
        };
        assert!(err.to_string().contains("queue full"));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::other("test io error");
        let audio_err: AudioError = io_err.into();
        match audio_err {
            AudioError::AssetLoadFailed { reason } => {
                assert!(reason.contains("test io error"));
            }
            _ => panic!("Expected AssetLoadFailed"),
        }
    }
}
