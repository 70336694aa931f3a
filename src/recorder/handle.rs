//! Public control surface of the recorder.

use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use super::actor::{Command, RecorderActor, RecorderSettings};
use super::clip::RecordedClip;
use super::device::CaptureDevice;
use super::error::RecorderError;
use super::session::RecorderState;

/// Voice-note recorder.
///
/// Owns a background task that holds the microphone, encoder, analysis graph
/// and timers for at most one recording at a time. Controls other than
/// `start_recording` return immediately; their effects show up in `state()`.
///
/// Dropping the recorder tears down any active recording without delivering
/// it.
pub struct Recorder {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<RecorderState>,
    task: Option<JoinHandle<()>>,
}

impl Recorder {
    /// Spawns the recorder task on the current tokio runtime.
    ///
    /// `on_complete` is called at most once per recording, with the finished
    /// clip, when a recording that captured audio is stopped.
    pub fn spawn<D, F>(device: D, settings: RecorderSettings, on_complete: F) -> Self
    where
        D: CaptureDevice,
        F: FnMut(RecordedClip) + Send + 'static,
    {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) =
            watch::channel(RecorderState::idle(settings.analyser.fft_size / 2));

        let actor = RecorderActor::new(
            Arc::new(device),
            settings,
            Box::new(on_complete),
            commands_rx,
            state_tx,
        );
        let task = tokio::spawn(actor.run());

        Self {
            commands: commands_tx,
            state: state_rx,
            task: Some(task),
        }
    }

    /// Starts a new recording, tearing down any active one first.
    ///
    /// Resolves once the microphone is live or has failed.
    ///
    /// # Errors
    /// - `Unavailable` / `Denied` if the microphone cannot be opened
    /// - `Analysis` if the analysis settings are invalid
    /// - `Shutdown` if the recorder task has exited
    pub async fn start_recording(&self) -> Result<(), RecorderError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Start { reply })
            .map_err(|_| RecorderError::Shutdown)?;
        response.await.unwrap_or(Err(RecorderError::Shutdown))
    }

    /// Stops the recording and delivers it if any audio was captured.
    pub fn stop_recording(&self) {
        self.send(Command::Stop);
    }

    /// Discards the recording; the completion consumer is not called.
    pub fn cancel_recording(&self) {
        self.send(Command::Cancel);
    }

    /// Toggles between recording and paused.
    pub fn pause_resume(&self) {
        self.send(Command::PauseResume);
    }

    pub fn state(&self) -> RecorderState {
        self.state.borrow().clone()
    }

    pub fn is_recording(&self) -> bool {
        self.state.borrow().is_recording()
    }

    pub fn is_paused(&self) -> bool {
        self.state.borrow().is_paused()
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.state.borrow().elapsed_seconds
    }

    #[allow(dead_code)]
    pub fn spectrum(&self) -> Vec<u8> {
        self.state.borrow().spectrum.clone()
    }

    /// Receiver that is notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<RecorderState> {
        self.state.clone()
    }

    /// Tears down any recording and waits for the task to exit.
    pub async fn shutdown(mut self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!("Recorder task ended abnormally: {}", e);
            }
        }
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            tracing::debug!("Recorder task is gone; command ignored");
        }
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        if self.task.is_some() {
            let _ = self.commands.send(Command::Shutdown);
        }
    }
}
