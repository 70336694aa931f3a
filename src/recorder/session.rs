//! Recording session state machine.
//!
//! A `Session` holds everything observable about one recording attempt: its
//! phase, the elapsed-seconds counter, the latest spectrum snapshot and the
//! encoded chunks captured so far. Every transition goes through one method
//! here; callers decide *when* a transition is attempted, the session decides
//! *whether* it applies. Methods return `false`/`None` for transitions that
//! are not valid from the current phase, which makes misuse a no-op.

use std::fmt;

/// Externally visible recorder status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordingStatus {
    #[default]
    Idle,
    Recording,
    Paused,
    Stopped,
    Cancelled,
}

impl fmt::Display for RecordingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Recording => write!(f, "recording"),
            Self::Paused => write!(f, "paused"),
            Self::Stopped => write!(f, "stopped"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Snapshot of the recorder published to observers after every update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecorderState {
    pub status: RecordingStatus,
    pub elapsed_seconds: u64,
    /// Byte frequency magnitudes, one per analysis bin
    pub spectrum: Vec<u8>,
}

impl RecorderState {
    /// State of a recorder with no session.
    pub fn idle(spectrum_len: usize) -> Self {
        Self {
            status: RecordingStatus::Idle,
            elapsed_seconds: 0,
            spectrum: vec![0; spectrum_len],
        }
    }

    /// True while a session is live, paused or not.
    pub fn is_recording(&self) -> bool {
        matches!(
            self.status,
            RecordingStatus::Recording | RecordingStatus::Paused
        )
    }

    pub fn is_paused(&self) -> bool {
        self.status == RecordingStatus::Paused
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Recording,
    Paused,
    /// Stop requested; waiting for the encoder to flush
    Stopping,
    Stopped,
    /// Terminal. Chunks are dropped on entry and never accepted again.
    Cancelled,
}

/// Result of a pause/resume toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseChange {
    Paused,
    Resumed,
}

/// What finalization of the encoder yields for the completion consumer.
#[derive(Debug, PartialEq, Eq)]
pub enum Completion {
    /// Stopped with audio; every captured chunk, in capture order
    Deliver(Vec<Vec<u8>>),
    /// Stopped before any chunk was captured
    Empty,
    /// Cancelled; nothing is delivered
    Discarded,
}

/// One recording attempt.
#[derive(Debug)]
pub struct Session {
    phase: Phase,
    elapsed_seconds: u64,
    spectrum: Vec<u8>,
    chunks: Vec<Vec<u8>>,
}

impl Session {
    /// Creates a session already in the recording phase.
    pub fn new(spectrum_len: usize) -> Self {
        Self {
            phase: Phase::Recording,
            elapsed_seconds: 0,
            spectrum: vec![0; spectrum_len],
            chunks: Vec::new(),
        }
    }

    pub fn status(&self) -> RecordingStatus {
        match self.phase {
            Phase::Recording => RecordingStatus::Recording,
            Phase::Paused => RecordingStatus::Paused,
            Phase::Stopping | Phase::Stopped => RecordingStatus::Stopped,
            Phase::Cancelled => RecordingStatus::Cancelled,
        }
    }

    /// Whether input should currently be encoded and sampled.
    pub fn is_capturing(&self) -> bool {
        self.phase == Phase::Recording
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.elapsed_seconds
    }

    #[cfg(test)]
    pub fn spectrum(&self) -> &[u8] {
        &self.spectrum
    }

    #[cfg(test)]
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn state(&self) -> RecorderState {
        RecorderState {
            status: self.status(),
            elapsed_seconds: self.elapsed_seconds,
            spectrum: self.spectrum.clone(),
        }
    }

    /// Toggles between recording and paused. `None` from any other phase.
    pub fn toggle_pause(&mut self) -> Option<PauseChange> {
        match self.phase {
            Phase::Recording => {
                self.phase = Phase::Paused;
                Some(PauseChange::Paused)
            }
            Phase::Paused => {
                self.phase = Phase::Recording;
                Some(PauseChange::Resumed)
            }
            _ => None,
        }
    }

    /// Advances the elapsed counter by one second while recording.
    pub fn tick(&mut self) -> bool {
        if self.phase != Phase::Recording {
            return false;
        }
        self.elapsed_seconds += 1;
        true
    }

    /// Replaces the spectrum snapshot while recording.
    pub fn publish_spectrum(&mut self, snapshot: Vec<u8>) -> bool {
        if self.phase != Phase::Recording {
            return false;
        }
        self.spectrum = snapshot;
        true
    }

    /// Appends an encoded chunk.
    ///
    /// Accepted while recording and while the encoder flushes after a stop.
    /// Empty chunks carry no audio and are ignored.
    pub fn append_chunk(&mut self, chunk: Vec<u8>) -> bool {
        if chunk.is_empty() || !matches!(self.phase, Phase::Recording | Phase::Stopping) {
            return false;
        }
        self.chunks.push(chunk);
        true
    }

    /// Requests a stop. Valid from recording or paused.
    pub fn stop(&mut self) -> bool {
        match self.phase {
            Phase::Recording | Phase::Paused => {
                self.phase = Phase::Stopping;
                true
            }
            _ => false,
        }
    }

    /// Cancels the session, discarding every captured chunk.
    pub fn cancel(&mut self) -> bool {
        match self.phase {
            Phase::Recording | Phase::Paused => {
                self.phase = Phase::Cancelled;
                self.chunks = Vec::new();
                true
            }
            _ => false,
        }
    }

    /// Consumes the encoder's completion signal.
    ///
    /// Returns `None` when the session is not waiting for one.
    pub fn finish(&mut self) -> Option<Completion> {
        match self.phase {
            Phase::Stopping => {
                self.phase = Phase::Stopped;
                if self.chunks.is_empty() {
                    Some(Completion::Empty)
                } else {
                    Some(Completion::Deliver(std::mem::take(&mut self.chunks)))
                }
            }
            Phase::Cancelled => Some(Completion::Discarded),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_is_recording_from_zero() {
        let session = Session::new(128);
        assert_eq!(session.status(), RecordingStatus::Recording);
        assert_eq!(session.elapsed_seconds(), 0);
        assert_eq!(session.spectrum().len(), 128);
        assert!(session.is_capturing());
    }

    #[test]
    fn test_pause_freezes_counter_and_spectrum() {
        let mut session = Session::new(4);
        for _ in 0..5 {
            assert!(session.tick());
        }
        assert!(session.publish_spectrum(vec![1, 2, 3, 4]));

        assert_eq!(session.toggle_pause(), Some(PauseChange::Paused));
        for _ in 0..10 {
            assert!(!session.tick());
        }
        assert!(!session.publish_spectrum(vec![9, 9, 9, 9]));
        assert_eq!(session.elapsed_seconds(), 5);
        assert_eq!(session.spectrum(), &[1, 2, 3, 4]);

        assert_eq!(session.toggle_pause(), Some(PauseChange::Resumed));
        assert!(session.tick());
        assert_eq!(session.elapsed_seconds(), 6);
    }

    #[test]
    fn test_chunks_rejected_while_paused() {
        let mut session = Session::new(4);
        assert!(session.append_chunk(vec![1, 2]));
        session.toggle_pause();
        assert!(!session.append_chunk(vec![3, 4]));
        assert_eq!(session.chunk_count(), 1);
    }

    #[test]
    fn test_stop_delivers_chunks_in_order() {
        let mut session = Session::new(4);
        session.append_chunk(vec![1]);
        session.append_chunk(vec![2]);
        assert!(session.stop());
        // Final flush from the encoder lands after the stop request.
        assert!(session.append_chunk(vec![3]));

        assert_eq!(
            session.finish(),
            Some(Completion::Deliver(vec![vec![1], vec![2], vec![3]]))
        );
        assert_eq!(session.status(), RecordingStatus::Stopped);
        assert_eq!(session.finish(), None);
    }

    #[test]
    fn test_stop_without_audio_is_empty() {
        let mut session = Session::new(4);
        assert!(session.stop());
        assert_eq!(session.finish(), Some(Completion::Empty));
    }

    #[test]
    fn test_stop_twice_is_noop() {
        let mut session = Session::new(4);
        assert!(session.stop());
        assert!(!session.stop());
        session.finish();
        assert!(!session.stop());
    }

    #[test]
    fn test_cancel_discards_everything_and_suppresses_delivery() {
        let mut session = Session::new(4);
        session.append_chunk(vec![1, 2, 3]);
        session.toggle_pause();
        assert!(session.cancel());
        assert_eq!(session.chunk_count(), 0);

        // A late flush from the encoder cannot resurrect audio.
        assert!(!session.append_chunk(vec![4, 5]));
        assert_eq!(session.finish(), Some(Completion::Discarded));
        assert_eq!(session.finish(), Some(Completion::Discarded));
        assert_eq!(session.status(), RecordingStatus::Cancelled);
    }

    #[test]
    fn test_terminal_states_reject_controls() {
        let mut session = Session::new(4);
        session.cancel();
        assert!(!session.cancel());
        assert!(!session.stop());
        assert_eq!(session.toggle_pause(), None);
        assert!(!session.tick());
    }

    #[test]
    fn test_empty_chunk_ignored() {
        let mut session = Session::new(4);
        assert!(!session.append_chunk(Vec::new()));
        session.stop();
        assert_eq!(session.finish(), Some(Completion::Empty));
    }

    #[test]
    fn test_state_derived_flags() {
        let mut session = Session::new(2);
        assert!(session.state().is_recording());
        assert!(!session.state().is_paused());
        session.toggle_pause();
        assert!(session.state().is_recording());
        assert!(session.state().is_paused());
        session.stop();
        assert!(!session.state().is_recording());
        assert!(!RecorderState::idle(2).is_recording());
    }
}
