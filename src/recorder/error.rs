//! Errors surfaced by the recorder.
//!
//! Only starting a recording can fail from the caller's point of view. Teardown
//! failures are logged inside the recorder and never reach this type.

use thiserror::Error;

/// Failure to start a recording.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecorderError {
    /// No usable input device (missing, unplugged, or not found by name)
    #[error("No microphone available: {0}")]
    Unavailable(String),

    /// The device exists but refused to open or start its stream
    #[error("Microphone access denied: {0}")]
    Denied(String),

    /// The analysis graph could not be built for the acquired stream
    #[error("Failed to open audio analysis: {0}")]
    Analysis(String),

    /// The recorder task is gone
    #[error("Recorder has shut down")]
    Shutdown,
}

impl RecorderError {
    /// Whether calling `start_recording()` again may succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Shutdown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_shutdown_is_final() {
        assert!(RecorderError::Unavailable("unplugged".into()).is_retryable());
        assert!(RecorderError::Denied("blocked".into()).is_retryable());
        assert!(RecorderError::Analysis("bad fft size".into()).is_retryable());
        assert!(!RecorderError::Shutdown.is_retryable());
    }

    #[test]
    fn test_messages_carry_cause() {
        let err = RecorderError::Denied("device busy".into());
        assert_eq!(err.to_string(), "Microphone access denied: device busy");
    }
}
